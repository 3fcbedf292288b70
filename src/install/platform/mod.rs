//! Native installer capability, one variant per supported OS.
//!
//! The variant is chosen once from the detected platform
//! ([`for_os`]); the installation flow only talks to the trait.

mod macos;
mod windows;

pub use macos::MacInstaller;
pub use windows::WindowsInstaller;

use crate::install::InstallationTarget;
use crate::{CommandRunner, InstallError, Os, ProductProfile};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// An installation found on the machine before this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorInstall {
    /// Registry product code (Windows) or package receipt id (macOS).
    pub identifier: String,
    /// Installed version, when it could be read.
    pub version: Option<String>,
    /// Where the installed executable was found, when known.
    pub location: Option<PathBuf>,
}

/// Inputs for one native install.
#[derive(Debug, Clone, Copy)]
pub struct InstallRequest<'a> {
    /// Downloaded package.
    pub package: &'a Path,
    /// Where the installer log is written.
    pub log_path: &'a Path,
    /// Backend host property.
    pub backend_host: &'a str,
    /// Authentication token property.
    pub auth_token: &'a str,
}

/// Platform-specific install, uninstall and detection mechanics.
#[async_trait]
pub trait PlatformInstaller: Send + Sync {
    /// The operating system this variant drives.
    fn os(&self) -> Os;

    /// Look for an existing installation of `target`.
    async fn detect(&self, target: &InstallationTarget)
        -> Result<Option<PriorInstall>, InstallError>;

    /// Remove `prior` quietly and synchronously.
    ///
    /// Success only means the uninstaller finished; the caller re-queries.
    async fn uninstall(
        &self,
        target: &InstallationTarget,
        prior: &PriorInstall,
    ) -> Result<(), InstallError>;

    /// Run the native installer unattended.
    async fn install(&self, request: &InstallRequest<'_>) -> Result<(), InstallError>;

    /// Clear the downloaded-file mark so the package can be executed.
    async fn clear_download_mark(&self, path: &Path) -> Result<(), InstallError>;
}

/// Select the installer variant for `os`.
pub fn for_os(
    os: Os,
    runner: Arc<dyn CommandRunner>,
    profile: &ProductProfile,
) -> Box<dyn PlatformInstaller> {
    match os {
        Os::Windows => Box::new(WindowsInstaller::new(runner)),
        Os::MacOs => Box::new(MacInstaller::new(runner, profile)),
    }
}

/// Quote an MSI public property as `KEY="value"`, doubling embedded quotes.
///
/// # Example
///
/// ```rust
/// use endpoint_agent_installer::msi_property;
///
/// assert_eq!(msi_property("AUTH_TOKEN", r#"a"b c"#), r#"AUTH_TOKEN="a""b c""#);
/// ```
pub fn msi_property(key: &str, value: &str) -> String {
    format!("{}=\"{}\"", key, value.replace('"', "\"\""))
}

/// Quote a value for a POSIX shell `key="value"` assignment.
pub fn shell_double_quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for ch in value.chars() {
        if matches!(ch, '\\' | '"' | '$' | '`') {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}

/// Quote a PowerShell string literal with single quotes.
pub(crate) fn powershell_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
