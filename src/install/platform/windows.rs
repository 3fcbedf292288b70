//! Windows: uninstall registry lookup and `msiexec`.

use super::{msi_property, powershell_literal, InstallRequest, PlatformInstaller, PriorInstall};
use crate::install::InstallationTarget;
use crate::{CommandOutput, CommandRunner, InstallError, Os, StructuredCommand};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

const UNINSTALL_KEYS: &[&str] = &[
    r"HKLM:\SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall\*",
    r"HKLM:\SOFTWARE\WOW6432Node\Microsoft\Windows\CurrentVersion\Uninstall\*",
];

/// msiexec: success, but a reboot is needed to finish.
const ERROR_SUCCESS_REBOOT_REQUIRED: i32 = 3010;

/// MSI property carrying the backend host.
pub const BACKEND_HOST_PROPERTY: &str = "BACKEND_HOST";
/// MSI property carrying the authentication token.
pub const AUTH_TOKEN_PROPERTY: &str = "AUTH_TOKEN";

/// Installs MSI packages with `msiexec`.
pub struct WindowsInstaller {
    runner: Arc<dyn CommandRunner>,
}

impl WindowsInstaller {
    /// Create an installer that runs commands through `runner`.
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    fn powershell(script: String) -> StructuredCommand {
        StructuredCommand::new("powershell").args([
            "-NoProfile".to_string(),
            "-NonInteractive".to_string(),
            "-ExecutionPolicy".to_string(),
            "Bypass".to_string(),
            "-Command".to_string(),
            script,
        ])
    }

    fn registry_query(pattern: &str) -> StructuredCommand {
        let keys = UNINSTALL_KEYS
            .iter()
            .map(|key| powershell_literal(key))
            .collect::<Vec<_>>()
            .join(",");
        let script = format!(
            "$entry = Get-ItemProperty -Path {keys} -ErrorAction SilentlyContinue \
             | Where-Object {{ $_.DisplayName -like {pattern} }} \
             | Select-Object -First 1; \
             if ($entry) {{ $entry.PSChildName + '|' + $entry.DisplayVersion }}",
            keys = keys,
            pattern = powershell_literal(pattern),
        );
        Self::powershell(script)
    }

    fn install_command(request: &InstallRequest<'_>) -> StructuredCommand {
        StructuredCommand::new("msiexec")
            .args([
                "/i".to_string(),
                quote_path(request.package),
                "/qn".to_string(),
                "/norestart".to_string(),
                "/l*v".to_string(),
                quote_path(request.log_path),
                msi_property(BACKEND_HOST_PROPERTY, request.backend_host),
                msi_property(AUTH_TOKEN_PROPERTY, request.auth_token),
            ])
            .verbatim()
    }
}

fn quote_path(path: &Path) -> String {
    format!("\"{}\"", path.display())
}

fn uninstall_succeeded(output: &CommandOutput) -> bool {
    match output.code {
        Some(0) => true,
        Some(ERROR_SUCCESS_REBOOT_REQUIRED) => {
            tracing::warn!("msiexec reports a reboot is required to complete");
            true
        }
        _ => false,
    }
}

/// Parse `ProductCode|DisplayVersion` as printed by the registry query.
pub(crate) fn parse_registry_entry(stdout: &str) -> Option<PriorInstall> {
    let line = stdout.lines().map(str::trim).find(|line| !line.is_empty())?;
    let (code, version) = line.split_once('|').unwrap_or((line, ""));
    let code = code.trim();
    if code.is_empty() {
        return None;
    }
    let version = version.trim();
    Some(PriorInstall {
        identifier: code.to_string(),
        version: (!version.is_empty()).then(|| version.to_string()),
        location: None,
    })
}

#[async_trait]
impl PlatformInstaller for WindowsInstaller {
    fn os(&self) -> Os {
        Os::Windows
    }

    async fn detect(
        &self,
        target: &InstallationTarget,
    ) -> Result<Option<PriorInstall>, InstallError> {
        let query = Self::registry_query(&target.name_pattern);
        let output = self
            .runner
            .run(&query)
            .await
            .map_err(|e| InstallError::io("failed to query installed applications", &e))?;

        if !output.success() {
            return Err(InstallError::Io {
                message: format!(
                    "installed-application query exited with {:?}: {}",
                    output.code,
                    output.stderr.trim()
                ),
                fix: "Check that PowerShell is available and not blocked by policy".to_string(),
            });
        }

        Ok(parse_registry_entry(&output.stdout).map(|mut prior| {
            prior.location = target.locate_executable();
            prior
        }))
    }

    async fn uninstall(
        &self,
        target: &InstallationTarget,
        prior: &PriorInstall,
    ) -> Result<(), InstallError> {
        let code = prior.identifier.as_str();
        if !(code.starts_with('{') && code.ends_with('}')) {
            return Err(InstallError::Uninstall {
                product: target.product_name.clone(),
                message: format!("registry entry {code:?} is not an MSI product code"),
                fix: format!(
                    "Remove {} from Apps & Features, then re-run the installer",
                    target.product_name
                ),
            });
        }

        let command = StructuredCommand::new("msiexec").args(["/x", code, "/qn", "/norestart"]);
        tracing::debug!(command = %command, "running uninstaller");
        let output = self
            .runner
            .run(&command)
            .await
            .map_err(|e| InstallError::Uninstall {
                product: target.product_name.clone(),
                message: format!("could not start msiexec: {e}"),
                fix: "Check that Windows Installer is available".to_string(),
            })?;

        if !uninstall_succeeded(&output) {
            return Err(InstallError::Uninstall {
                product: target.product_name.clone(),
                message: format!("msiexec /x exited with {:?}", output.code),
                fix: format!(
                    "Remove {} from Apps & Features, then re-run the installer",
                    target.product_name
                ),
            });
        }
        Ok(())
    }

    async fn install(&self, request: &InstallRequest<'_>) -> Result<(), InstallError> {
        let command = Self::install_command(request);
        tracing::debug!(
            command = %command.redacted(&[request.auth_token]),
            "running installer"
        );

        let output = self
            .runner
            .run(&command)
            .await
            .map_err(|e| InstallError::Install {
                message: format!("could not start msiexec: {e}"),
                exit_code: None,
                log_path: request.log_path.to_path_buf(),
                fix: "Check that Windows Installer is available".to_string(),
            })?;

        if output.code == Some(ERROR_SUCCESS_REBOOT_REQUIRED) {
            return Err(InstallError::Install {
                message: "msiexec requires a reboot to finish the installation".to_string(),
                exit_code: output.code,
                log_path: request.log_path.to_path_buf(),
                fix: "Reboot, then re-run the installer to verify the agent".to_string(),
            });
        }
        if !output.success() {
            return Err(InstallError::Install {
                message: format!("msiexec exited with {:?}", output.code),
                exit_code: output.code,
                log_path: request.log_path.to_path_buf(),
                fix: format!(
                    "Inspect {} for the failing action",
                    request.log_path.display()
                ),
            });
        }
        Ok(())
    }

    async fn clear_download_mark(&self, path: &Path) -> Result<(), InstallError> {
        let script = format!(
            "Unblock-File -LiteralPath {}",
            powershell_literal(&path.to_string_lossy())
        );
        let output = self
            .runner
            .run(&Self::powershell(script))
            .await
            .map_err(|e| InstallError::io("failed to run Unblock-File", &e))?;

        if !output.success() {
            return Err(InstallError::Io {
                message: format!(
                    "Unblock-File failed for {}: {}",
                    path.display(),
                    output.stderr.trim()
                ),
                fix: "Unblock the downloaded package from its Properties dialog".to_string(),
            });
        }
        Ok(())
    }
}
