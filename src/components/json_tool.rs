//! The `jq` prerequisite.

use super::{ComponentError, ComponentInstaller, ComponentKind, PackageManager, PackageRef};
use crate::detection::find_executable;
use crate::Os;
use async_trait::async_trait;
use std::path::PathBuf;

const JQ: PackageRef = PackageRef {
    winget_id: "jqlang.jq",
    brew_formula: "jq",
};

/// Ensures `jq` is on the machine.
#[derive(Debug, Clone)]
pub struct JsonToolInstaller {
    executable: String,
    fallbacks: Vec<PathBuf>,
    packages: PackageManager,
}

impl JsonToolInstaller {
    /// Installer for `os` using `packages`.
    pub fn new(os: Os, packages: PackageManager) -> Self {
        let fallbacks = match os {
            Os::Windows => vec![PathBuf::from(r"C:\Program Files\jq\jq.exe")],
            Os::MacOs => vec![
                PathBuf::from("/opt/homebrew/bin/jq"),
                PathBuf::from("/usr/local/bin/jq"),
            ],
        };
        Self {
            executable: "jq".to_string(),
            fallbacks,
            packages,
        }
    }

    #[cfg(test)]
    fn looking_for(mut self, executable: &str, fallbacks: Vec<PathBuf>) -> Self {
        self.executable = executable.to_string();
        self.fallbacks = fallbacks;
        self
    }
}

#[async_trait]
impl ComponentInstaller for JsonToolInstaller {
    fn kind(&self) -> ComponentKind {
        ComponentKind::JsonTool
    }

    async fn is_installed(&self) -> bool {
        find_executable(&self.executable, &self.fallbacks).is_some()
    }

    async fn install(&self) -> Result<(), ComponentError> {
        self.packages.install(&JQ).await
    }
}
