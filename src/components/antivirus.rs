//! ClamAV antivirus engine.

use super::{ComponentError, ComponentInstaller, ComponentKind, PackageManager, PackageRef};
use crate::detection::find_executable;
use crate::Os;
use async_trait::async_trait;
use std::path::PathBuf;

const CLAMAV: PackageRef = PackageRef {
    winget_id: "Cisco.ClamAV",
    brew_formula: "clamav",
};

/// Installs the ClamAV engine through the system package manager.
#[derive(Debug, Clone)]
pub struct AntivirusEngineInstaller {
    scanner: String,
    fallbacks: Vec<PathBuf>,
    packages: PackageManager,
}

impl AntivirusEngineInstaller {
    /// Installer for `os` using `packages`.
    ///
    /// ClamAV counts as installed when `clamscan` is on `PATH` or at the
    /// platform's default install location.
    pub fn new(os: Os, packages: PackageManager) -> Self {
        let fallbacks = match os {
            Os::Windows => vec![PathBuf::from(r"C:\Program Files\ClamAV\clamscan.exe")],
            Os::MacOs => vec![
                PathBuf::from("/opt/homebrew/bin/clamscan"),
                PathBuf::from("/usr/local/bin/clamscan"),
            ],
        };
        Self {
            scanner: "clamscan".to_string(),
            fallbacks,
            packages,
        }
    }

    #[cfg(test)]
    fn looking_for(mut self, scanner: &str, fallbacks: Vec<PathBuf>) -> Self {
        self.scanner = scanner.to_string();
        self.fallbacks = fallbacks;
        self
    }
}

#[async_trait]
impl ComponentInstaller for AntivirusEngineInstaller {
    fn kind(&self) -> ComponentKind {
        ComponentKind::AntivirusEngine
    }

    async fn is_installed(&self) -> bool {
        match find_executable(&self.scanner, &self.fallbacks) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "found clamscan");
                true
            }
            None => false,
        }
    }

    async fn install(&self) -> Result<(), ComponentError> {
        self.packages.install(&CLAMAV).await
    }
}
