//! Administrative privilege check.
//!
//! The gate runs once before anything else. It is never retried: waiting
//! does not change the privileges of a running process.

use crate::{CommandRunner, InstallError, Os, StructuredCommand};
use std::fmt;
use std::sync::Arc;

/// Verifies the process holds administrative rights.
#[derive(Clone)]
pub struct PrivilegeGate {
    runner: Arc<dyn CommandRunner>,
    os: Os,
}

impl fmt::Debug for PrivilegeGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivilegeGate").field("os", &self.os).finish()
    }
}

impl PrivilegeGate {
    /// Create a gate for `os` probing through `runner`.
    pub fn new(runner: Arc<dyn CommandRunner>, os: Os) -> Self {
        Self { runner, os }
    }

    /// Whether the current process is elevated.
    ///
    /// Windows: `net session` only succeeds for administrators.
    /// macOS: `id -u` must print `0`.
    /// A probe that cannot be spawned counts as not elevated.
    pub async fn check(&self) -> bool {
        let probe = self.probe();
        let output = match self.runner.run(&probe).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(command = %probe, error = %e, "privilege probe could not run");
                return false;
            }
        };

        match self.os {
            Os::Windows => output.success(),
            Os::MacOs => output.success() && output.stdout.trim() == "0",
        }
    }

    /// Fail with [`InstallError::Privilege`] unless elevated.
    pub async fn require(&self) -> Result<(), InstallError> {
        if self.check().await {
            tracing::debug!("running with administrative privileges");
            return Ok(());
        }

        let (message, fix) = match self.os {
            Os::Windows => (
                "the installer is not running as Administrator",
                "Re-run from a PowerShell window opened with \"Run as administrator\"",
            ),
            Os::MacOs => (
                "the installer is not running as root",
                "Re-run the installer with sudo",
            ),
        };
        Err(InstallError::Privilege {
            message: message.to_string(),
            fix: fix.to_string(),
        })
    }

    fn probe(&self) -> StructuredCommand {
        match self.os {
            Os::Windows => StructuredCommand::new("net").arg("session"),
            Os::MacOs => StructuredCommand::new("id").arg("-u"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedRunner;
    use crate::CommandOutput;

    #[tokio::test]
    async fn test_windows_admin_passes() {
        let runner = Arc::new(ScriptedRunner::new(|cmd| {
            assert_eq!(cmd.program, "net");
            CommandOutput::ok("There are no entries in the list.")
        }));
        let gate = PrivilegeGate::new(runner, Os::Windows);
        assert!(gate.check().await);
        assert!(gate.require().await.is_ok());
    }

    #[tokio::test]
    async fn test_windows_non_admin_fails() {
        let runner = Arc::new(ScriptedRunner::new(|_| {
            CommandOutput::failed(2, "System error 5 has occurred. Access is denied.")
        }));
        let gate = PrivilegeGate::new(runner, Os::Windows);
        match gate.require().await {
            Err(InstallError::Privilege { fix, .. }) => assert!(fix.contains("administrator")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_macos_root_passes() {
        let runner = Arc::new(ScriptedRunner::new(|_| CommandOutput::ok("0\n")));
        let gate = PrivilegeGate::new(runner, Os::MacOs);
        assert!(gate.check().await);
    }

    #[tokio::test]
    async fn test_macos_regular_user_fails_once() {
        let runner = Arc::new(ScriptedRunner::new(|_| CommandOutput::ok("501\n")));
        let gate = PrivilegeGate::new(runner.clone(), Os::MacOs);
        assert!(matches!(
            gate.require().await,
            Err(InstallError::Privilege { .. })
        ));
        assert_eq!(runner.calls().len(), 1);
    }
}
