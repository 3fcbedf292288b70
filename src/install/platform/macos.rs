//! macOS: package receipts, app bundle removal and `installer -pkg`.

use super::{shell_double_quote, InstallRequest, PlatformInstaller, PriorInstall};
use crate::detection::{check_version, parse_version};
use crate::install::InstallationTarget;
use crate::{CommandOutput, CommandRunner, InstallError, Os, ProductProfile, StructuredCommand};
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const QUARANTINE_ATTRIBUTE: &str = "com.apple.quarantine";

/// Installs `.pkg` packages with the system `installer`.
pub struct MacInstaller {
    runner: Arc<dyn CommandRunner>,
    package_id: String,
    bundle: PathBuf,
    response_file: PathBuf,
}

impl MacInstaller {
    /// Create an installer for the product described by `profile`.
    pub fn new(runner: Arc<dyn CommandRunner>, profile: &ProductProfile) -> Self {
        Self {
            runner,
            package_id: profile.package_id.clone(),
            bundle: profile.macos_bundle.clone(),
            response_file: profile.macos_response_file.clone(),
        }
    }

    fn uninstall_script(&self) -> PathBuf {
        self.bundle.join("Contents/Resources/uninstall.sh")
    }

    async fn receipt(&self) -> Result<Option<PriorInstall>, InstallError> {
        let query = StructuredCommand::new("pkgutil").args(["--pkg-info", self.package_id.as_str()]);
        let output = self
            .runner
            .run(&query)
            .await
            .map_err(|e| InstallError::io("failed to run pkgutil", &e))?;
        if !output.success() {
            return Ok(None);
        }
        Ok(Some(PriorInstall {
            identifier: self.package_id.clone(),
            version: receipt_version(&output.stdout),
            location: None,
        }))
    }

    async fn write_response_file(&self, request: &InstallRequest<'_>) -> Result<(), InstallError> {
        let contents = response_file_contents(request.backend_host, request.auth_token);
        create_private_file(&self.response_file, contents.as_bytes())
            .map_err(|e| InstallError::io("failed to write installer response file", &e))
    }

    async fn remove_response_file(&self) {
        match tokio::fs::remove_file(&self.response_file).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.response_file.display(),
                error = %e,
                "could not remove installer response file"
            ),
        }
    }

    fn uninstall_error(&self, target: &InstallationTarget, message: String) -> InstallError {
        InstallError::Uninstall {
            product: target.product_name.clone(),
            message,
            fix: format!(
                "Remove {} manually, run `sudo pkgutil --forget {}`, then re-run the installer",
                self.bundle.display(),
                self.package_id
            ),
        }
    }
}

/// Create `path` owner-only, replacing whatever entry was there.
///
/// A stale file or symlink is unlinked first and the new file is opened
/// with `create_new`, so the write never follows a link planted at `path`.
fn create_private_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => {
            return Err(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("{} is a directory", path.display()),
            ))
        }
        Ok(_) => std::fs::remove_file(path)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(contents)
}

/// Response file read by the package's postinstall script.
pub(crate) fn response_file_contents(backend_host: &str, auth_token: &str) -> String {
    format!(
        "BACKEND_HOST={}\nAUTH_TOKEN={}\n",
        shell_double_quote(backend_host),
        shell_double_quote(auth_token)
    )
}

/// The `version:` line of `pkgutil --pkg-info` output.
pub(crate) fn receipt_version(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .filter_map(|line| line.trim().strip_prefix("version:"))
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

fn installer_log(command: &str, output: &CommandOutput) -> String {
    format!(
        "$ {}\nexit: {:?}\n--- stdout ---\n{}\n--- stderr ---\n{}\n",
        command, output.code, output.stdout, output.stderr
    )
}

#[async_trait]
impl PlatformInstaller for MacInstaller {
    fn os(&self) -> Os {
        Os::MacOs
    }

    async fn detect(
        &self,
        target: &InstallationTarget,
    ) -> Result<Option<PriorInstall>, InstallError> {
        if let Some(location) = target.locate_executable() {
            let version = match check_version(self.runner.as_ref(), &location).await {
                Ok(output) => parse_version(&output).ok().map(|v| v.to_string()),
                Err(e) => {
                    tracing::debug!(path = %location.display(), error = e.description(), "installed version unreadable");
                    None
                }
            };
            return Ok(Some(PriorInstall {
                identifier: self.package_id.clone(),
                version,
                location: Some(location),
            }));
        }
        self.receipt().await
    }

    async fn uninstall(
        &self,
        target: &InstallationTarget,
        prior: &PriorInstall,
    ) -> Result<(), InstallError> {
        let script = self.uninstall_script();
        if script.exists() {
            let command = StructuredCommand::new("/bin/sh").arg(script.to_string_lossy());
            tracing::debug!(command = %command, "running bundled uninstaller");
            let output = self
                .runner
                .run(&command)
                .await
                .map_err(|e| self.uninstall_error(target, format!("could not run uninstaller: {e}")))?;
            if !output.success() {
                return Err(self.uninstall_error(
                    target,
                    format!(
                        "uninstaller exited with {:?}: {}",
                        output.code,
                        output.stderr.trim()
                    ),
                ));
            }
        } else if self.bundle.exists() {
            tracing::debug!(bundle = %self.bundle.display(), "removing application bundle");
            tokio::fs::remove_dir_all(&self.bundle).await.map_err(|e| {
                self.uninstall_error(target, format!("could not remove {}: {e}", self.bundle.display()))
            })?;
        }

        for candidate in target
            .candidates
            .iter()
            .filter(|path| !path.starts_with(&self.bundle) && path.exists())
        {
            tokio::fs::remove_file(candidate).await.map_err(|e| {
                self.uninstall_error(target, format!("could not remove {}: {e}", candidate.display()))
            })?;
        }

        let forget = StructuredCommand::new("pkgutil").args(["--forget", prior.identifier.as_str()]);
        match self.runner.run(&forget).await {
            Ok(output) if output.success() => {}
            Ok(output) => tracing::debug!(
                stderr = %output.stderr.trim(),
                "pkgutil --forget reported no receipt"
            ),
            Err(e) => tracing::warn!(error = %e, "could not run pkgutil --forget"),
        }
        Ok(())
    }

    async fn install(&self, request: &InstallRequest<'_>) -> Result<(), InstallError> {
        self.write_response_file(request).await?;

        let command = StructuredCommand::new("installer").args([
            "-pkg".to_string(),
            request.package.to_string_lossy().into_owned(),
            "-target".to_string(),
            "/".to_string(),
            "-verboseR".to_string(),
        ]);
        tracing::debug!(command = %command, "running installer");
        let result = self.runner.run(&command).await;
        self.remove_response_file().await;

        let output = result.map_err(|e| InstallError::Install {
            message: format!("could not start installer: {e}"),
            exit_code: None,
            log_path: request.log_path.to_path_buf(),
            fix: "Check that /usr/sbin/installer is available".to_string(),
        })?;

        let log = installer_log(&command.redacted(&[request.auth_token]), &output);
        if let Err(e) = tokio::fs::write(request.log_path, log).await {
            tracing::warn!(path = %request.log_path.display(), error = %e, "could not write install log");
        }

        if !output.success() {
            return Err(InstallError::Install {
                message: format!("installer exited with {:?}", output.code),
                exit_code: output.code,
                log_path: request.log_path.to_path_buf(),
                fix: format!(
                    "Inspect {} and /var/log/install.log for the failing step",
                    request.log_path.display()
                ),
            });
        }
        Ok(())
    }

    async fn clear_download_mark(&self, path: &Path) -> Result<(), InstallError> {
        let command = StructuredCommand::new("xattr").args([
            "-d".to_string(),
            QUARANTINE_ATTRIBUTE.to_string(),
            path.to_string_lossy().into_owned(),
        ]);
        let output = self
            .runner
            .run(&command)
            .await
            .map_err(|e| InstallError::io("failed to run xattr", &e))?;

        if output.success() || output.stderr.contains("No such xattr") {
            return Ok(());
        }
        Err(InstallError::Io {
            message: format!(
                "could not clear quarantine on {}: {}",
                path.display(),
                output.stderr.trim()
            ),
            fix: format!("Run `xattr -d {} <package>` manually", QUARANTINE_ATTRIBUTE),
        })
    }
}
