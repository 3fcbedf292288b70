//! Progress reporting types for installation runs.
//!
//! The orchestrator reports each stage it enters as an [`InstallProgress`]
//! value through a caller-supplied callback.

use crate::components::{ComponentKind, ComponentOutcome};

/// Progress stages of one installation run.
///
/// # Example
///
/// ```rust
/// use endpoint_agent_installer::InstallProgress;
///
/// fn on_progress(progress: InstallProgress) {
///     match &progress {
///         InstallProgress::Downloading { version } => println!("Downloading {version}..."),
///         InstallProgress::Completed { version } => println!("Installed {version}"),
///         other => println!("{}...", other.description()),
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallProgress {
    /// Verifying administrative rights.
    CheckingPrivileges,

    /// Ensuring prerequisite tools are present.
    CheckingPrerequisites,

    /// Querying the release index.
    Resolving,

    /// Downloading the installer package.
    Downloading {
        /// Version being downloaded.
        version: String,
    },

    /// Looking for an existing installation.
    Detecting,

    /// Removing the existing installation.
    Uninstalling {
        /// Version being removed, when known.
        prior_version: Option<String>,
    },

    /// Running the native installer.
    Installing {
        /// Version being installed.
        version: String,
    },

    /// Checking the installed executable reports the expected version.
    Verifying {
        /// Expected version.
        version: String,
    },

    /// The agent is installed and verified.
    Completed {
        /// Verified version.
        version: String,
    },

    /// An optional component is being checked or installed.
    ComponentStarted {
        /// The component.
        component: ComponentKind,
    },

    /// An optional component finished.
    ComponentFinished {
        /// The component.
        component: ComponentKind,
        /// Whether it was installed or already present.
        outcome: ComponentOutcome,
    },
}

impl InstallProgress {
    /// Get a human-readable description of the current progress stage.
    ///
    /// # Example
    ///
    /// ```rust
    /// use endpoint_agent_installer::InstallProgress;
    ///
    /// assert_eq!(InstallProgress::Detecting.description(), "Checking for an existing installation");
    /// ```
    pub fn description(&self) -> &'static str {
        match self {
            Self::CheckingPrivileges => "Checking administrative privileges",
            Self::CheckingPrerequisites => "Checking prerequisites",
            Self::Resolving => "Resolving latest release",
            Self::Downloading { .. } => "Downloading",
            Self::Detecting => "Checking for an existing installation",
            Self::Uninstalling { .. } => "Removing previous installation",
            Self::Installing { .. } => "Installing",
            Self::Verifying { .. } => "Verifying installation",
            Self::Completed { .. } => "Installation complete",
            Self::ComponentStarted { .. } => "Installing component",
            Self::ComponentFinished { .. } => "Component ready",
        }
    }

    /// Check if this progress stage marks the agent as installed.
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}
