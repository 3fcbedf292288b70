//! Summary of a completed run.

use crate::components::{ComponentKind, ComponentOutcome};
use crate::Platform;
use semver::Version;
use std::path::{Path, PathBuf};

/// What a successful run installed.
///
/// A run that fails anywhere returns an [`crate::InstallError`] instead;
/// there is no partial-success summary.
///
/// # Example
///
/// ```rust
/// use endpoint_agent_installer::{Arch, ComponentKind, ComponentOutcome, Os, Platform, RunSummary};
/// use semver::Version;
///
/// let summary = RunSummary {
///     platform: Platform { os: Os::MacOs, arch: Arch::Arm64 },
///     version: Version::new(1, 2, 0),
///     prior_version: Some("1.1.0".to_string()),
///     log_path: "/tmp/endpoint-agent-install.log".into(),
///     components: vec![(ComponentKind::JsonTool, ComponentOutcome::Skipped)],
/// };
/// assert!(summary.is_upgrade());
/// assert_eq!(summary.outcome(ComponentKind::JsonTool), Some(ComponentOutcome::Skipped));
/// ```
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Platform the run installed for.
    pub platform: Platform,

    /// Installed and verified agent version.
    pub version: Version,

    /// Version that was replaced, if any.
    pub prior_version: Option<String>,

    /// Install log, retained after the run.
    pub log_path: PathBuf,

    /// Every component the run handled, in the order handled.
    pub components: Vec<(ComponentKind, ComponentOutcome)>,
}

impl RunSummary {
    /// Whether an existing installation was replaced.
    pub fn is_upgrade(&self) -> bool {
        self.prior_version.is_some()
    }

    /// Path of the install log.
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Outcome for `kind`, `None` when the run did not handle it.
    pub fn outcome(&self, kind: ComponentKind) -> Option<ComponentOutcome> {
        self.components
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, outcome)| *outcome)
    }

    /// Components installed by this run.
    pub fn installed_components(&self) -> impl Iterator<Item = ComponentKind> + '_ {
        self.components
            .iter()
            .filter(|(_, outcome)| matches!(outcome, ComponentOutcome::Installed { .. }))
            .map(|(kind, _)| *kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Arch, Os};

    fn summary(prior: Option<&str>) -> RunSummary {
        RunSummary {
            platform: Platform {
                os: Os::Windows,
                arch: Arch::X64,
            },
            version: Version::new(1, 2, 0),
            prior_version: prior.map(str::to_string),
            log_path: PathBuf::from("/tmp/endpoint-agent-install.log"),
            components: vec![
                (ComponentKind::JsonTool, ComponentOutcome::Skipped),
                (
                    ComponentKind::AntivirusEngine,
                    ComponentOutcome::Installed { attempts: 2 },
                ),
            ],
        }
    }

    #[test]
    fn test_fresh_install_is_not_upgrade() {
        assert!(!summary(None).is_upgrade());
        assert!(summary(Some("1.1.0")).is_upgrade());
    }

    #[test]
    fn test_component_lookup() {
        let summary = summary(None);
        assert_eq!(
            summary.outcome(ComponentKind::AntivirusEngine),
            Some(ComponentOutcome::Installed { attempts: 2 })
        );
        assert_eq!(summary.outcome(ComponentKind::BrowserExtension), None);
        assert_eq!(
            summary.installed_components().collect::<Vec<_>>(),
            vec![ComponentKind::AntivirusEngine]
        );
        assert_eq!(summary.log_path(), Path::new("/tmp/endpoint-agent-install.log"));
    }
}
