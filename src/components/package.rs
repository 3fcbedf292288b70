//! System package manager installs: `winget` on Windows, Homebrew on macOS.

use super::ComponentError;
use crate::detection::find_executable;
use crate::{CommandRunner, Os, StructuredCommand};
use std::path::PathBuf;
use std::sync::Arc;

const BREW_LOCATIONS: &[&str] = &["/opt/homebrew/bin/brew", "/usr/local/bin/brew"];

/// Package identifiers of one tool per package manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageRef {
    /// `winget` package id.
    pub winget_id: &'static str,
    /// Homebrew formula.
    pub brew_formula: &'static str,
}

/// Installs packages with the platform's package manager.
///
/// Homebrew refuses to run as root, so on macOS the install runs as the
/// user who invoked `sudo` when one is known.
#[derive(Clone)]
pub struct PackageManager {
    runner: Arc<dyn CommandRunner>,
    os: Os,
    invoking_user: Option<String>,
    brew_fallbacks: Vec<PathBuf>,
}

impl std::fmt::Debug for PackageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageManager")
            .field("os", &self.os)
            .field("invoking_user", &self.invoking_user)
            .finish_non_exhaustive()
    }
}

impl PackageManager {
    /// Package manager for `os`, running brew as `invoking_user` when set.
    pub fn new(runner: Arc<dyn CommandRunner>, os: Os, invoking_user: Option<String>) -> Self {
        Self {
            runner,
            os,
            invoking_user,
            brew_fallbacks: BREW_LOCATIONS.iter().map(PathBuf::from).collect(),
        }
    }

    /// Build the install command for `package`.
    pub(crate) fn install_command(
        &self,
        package: &PackageRef,
    ) -> Result<StructuredCommand, ComponentError> {
        match self.os {
            Os::Windows => Ok(StructuredCommand::new("winget").args([
                "install",
                "--id",
                package.winget_id,
                "--exact",
                "--silent",
                "--accept-package-agreements",
                "--accept-source-agreements",
            ])),
            Os::MacOs => {
                let brew = find_executable("brew", &self.brew_fallbacks).ok_or_else(|| {
                    ComponentError::Unavailable(
                        "Homebrew is not installed; see https://brew.sh".to_string(),
                    )
                })?;
                let brew = brew.to_string_lossy().into_owned();
                let command = match self.invoking_user.as_deref() {
                    Some(user) => StructuredCommand::new("sudo").args([
                        "-u",
                        user,
                        "-H",
                        brew.as_str(),
                        "install",
                        package.brew_formula,
                    ]),
                    None => {
                        tracing::warn!("no invoking user known, running brew as the current user");
                        StructuredCommand::new(brew).args(["install", package.brew_formula])
                    }
                };
                Ok(command.env("HOMEBREW_NO_AUTO_UPDATE", "1"))
            }
        }
    }

    /// Install `package`, failing on a non-zero exit.
    pub async fn install(&self, package: &PackageRef) -> Result<(), ComponentError> {
        let command = self.install_command(package)?;
        tracing::debug!(command = %command, "running package manager");
        let output = self.runner.run(&command).await?;
        if !output.success() {
            return Err(ComponentError::CommandFailed {
                command: command.to_string(),
                code: output.code,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedRunner;
    use crate::CommandOutput;

    const JQ: PackageRef = PackageRef {
        winget_id: "jqlang.jq",
        brew_formula: "jq",
    };

    fn with_brew_at(manager: &mut PackageManager, dir: &tempfile::TempDir) -> String {
        let brew = dir.path().join("brew");
        std::fs::write(&brew, b"").unwrap();
        manager.brew_fallbacks = vec![brew.clone()];
        brew.to_string_lossy().into_owned()
    }

    #[test]
    fn test_winget_command() {
        let runner = Arc::new(ScriptedRunner::new(|_| CommandOutput::ok("")));
        let manager = PackageManager::new(runner, Os::Windows, None);
        let cmd = manager.install_command(&JQ).unwrap();
        assert_eq!(cmd.program, "winget");
        assert_eq!(cmd.args[0..3], ["install", "--id", "jqlang.jq"]);
        assert!(cmd.args.contains(&"--silent".to_string()));
    }

    #[test]
    fn test_brew_runs_as_invoking_user() {
        if which::which("brew").is_ok() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new(|_| CommandOutput::ok("")));
        let mut manager = PackageManager::new(runner, Os::MacOs, Some("alice".to_string()));
        let brew = with_brew_at(&mut manager, &dir);

        let cmd = manager.install_command(&JQ).unwrap();
        assert_eq!(cmd.program, "sudo");
        assert_eq!(cmd.args, vec!["-u", "alice", "-H", brew.as_str(), "install", "jq"]);
        assert!(cmd
            .env_vars
            .contains(&("HOMEBREW_NO_AUTO_UPDATE".to_string(), "1".to_string())));
    }

    #[test]
    fn test_missing_brew_is_unavailable() {
        if which::which("brew").is_ok() {
            return;
        }
        let runner = Arc::new(ScriptedRunner::new(|_| CommandOutput::ok("")));
        let mut manager = PackageManager::new(runner, Os::MacOs, None);
        manager.brew_fallbacks = vec![PathBuf::from("/nonexistent/brew")];
        assert!(matches!(
            manager.install_command(&JQ),
            Err(ComponentError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_install_failure_carries_stderr() {
        let runner = Arc::new(ScriptedRunner::new(|_| {
            CommandOutput::failed(-1978335212, "No package found matching input criteria.\n")
        }));
        let manager = PackageManager::new(runner, Os::Windows, None);
        match manager.install(&JQ).await {
            Err(ComponentError::CommandFailed { stderr, command, .. }) => {
                assert_eq!(stderr, "No package found matching input criteria.");
                assert!(command.starts_with("winget install"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
