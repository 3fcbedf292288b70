//! Error types for installation runs.
//!
//! Every failure that ends a run is an [`InstallError`]. Each variant names
//! the stage that failed and carries an actionable fix suggestion, so the
//! binary can print a specific message before exiting non-zero.

use std::path::PathBuf;
use thiserror::Error;

/// The network fetch behind an [`InstallError::Network`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkOperation {
    /// Latest-release metadata.
    ReleaseIndex,
    /// The installer package.
    Download,
}

impl NetworkOperation {
    /// Stage name reported for a failure of this fetch.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::ReleaseIndex => "Release index fetch",
            Self::Download => "Download",
        }
    }
}

/// Errors that abort an installation run.
///
/// None of these are retried by the orchestrator itself; network and
/// component failures only surface here after their retry budget is spent.
///
/// # Example
///
/// ```rust
/// use endpoint_agent_installer::InstallError;
///
/// fn report(error: &InstallError) {
///     eprintln!("{} failed: {}", error.stage(), error);
///     eprintln!("To fix: {}", error.fix_suggestion());
/// }
/// ```
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InstallError {
    /// The process does not hold administrative rights.
    #[error("Administrative privileges required: {message}")]
    Privilege {
        /// What the privilege probe observed.
        message: String,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// No single release artifact matches this platform.
    #[error("Release resolution failed: {message}")]
    Resolution {
        /// Why resolution failed (no match, malformed index, bad version tag).
        message: String,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// A network operation failed after exhausting its retries.
    #[error("Network error for {url} after {attempts} attempt(s): {message}")]
    Network {
        /// What was being fetched.
        operation: NetworkOperation,
        /// The URL that could not be fetched.
        url: String,
        /// How many attempts were made.
        attempts: u32,
        /// The last underlying error.
        message: String,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// Removing the prior installation failed or left it registered.
    #[error("Uninstall of {product} failed: {message}")]
    Uninstall {
        /// Product being removed.
        product: String,
        /// Description of the failure.
        message: String,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// The native installer reported failure.
    #[error("Installation failed: {message} (log: {})", .log_path.display())]
    Install {
        /// Description of the failure.
        message: String,
        /// Exit code from the installer, if it ran.
        exit_code: Option<i32>,
        /// Captured installer log.
        log_path: PathBuf,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// The installed executable does not report the resolved version.
    #[error("Verification failed: expected version {expected}, got {reported:?}")]
    Verification {
        /// The resolved release version.
        expected: String,
        /// What the installed executable reported (or why nothing was reported).
        reported: String,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// An optional component failed after its retry budget was spent.
    #[error("Component {component} failed after {attempts} attempt(s): {message}")]
    ComponentInstall {
        /// Display name of the component.
        component: String,
        /// How many install attempts were made.
        attempts: u32,
        /// The last underlying error.
        message: String,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// Invocation parameters or environment signals are invalid.
    #[error("Invalid configuration: {message}")]
    Configuration {
        /// What is wrong with the configuration.
        message: String,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// The running operating system is not supported.
    #[error("Platform not supported: {platform}")]
    UnsupportedPlatform {
        /// The detected platform name.
        platform: String,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// A local filesystem or subprocess spawn failure.
    #[error("I/O error: {message}")]
    Io {
        /// Description of the failure.
        message: String,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },
}

impl InstallError {
    /// Get an actionable suggestion for fixing this error.
    ///
    /// # Example
    ///
    /// ```rust
    /// use endpoint_agent_installer::InstallError;
    ///
    /// let error = InstallError::Privilege {
    ///     message: "uid is 501".to_string(),
    ///     fix: "Re-run the installer with sudo".to_string(),
    /// };
    /// assert!(error.fix_suggestion().contains("sudo"));
    /// ```
    pub fn fix_suggestion(&self) -> &str {
        match self {
            Self::Privilege { fix, .. } => fix,
            Self::Resolution { fix, .. } => fix,
            Self::Network { fix, .. } => fix,
            Self::Uninstall { fix, .. } => fix,
            Self::Install { fix, .. } => fix,
            Self::Verification { fix, .. } => fix,
            Self::ComponentInstall { fix, .. } => fix,
            Self::Configuration { fix, .. } => fix,
            Self::UnsupportedPlatform { fix, .. } => fix,
            Self::Io { fix, .. } => fix,
        }
    }

    /// Name of the stage that produced this error.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Privilege { .. } => "Privilege check",
            Self::Resolution { .. } => "Release resolution",
            Self::Network { operation, .. } => operation.stage(),
            Self::Uninstall { .. } => "Uninstall",
            Self::Install { .. } => "Install",
            Self::Verification { .. } => "Verification",
            Self::ComponentInstall { .. } => "Component install",
            Self::Configuration { .. } => "Configuration",
            Self::UnsupportedPlatform { .. } => "Platform detection",
            Self::Io { .. } => "Filesystem",
        }
    }

    /// Log path to surface for diagnosis, when the failure has one.
    pub fn log_path(&self) -> Option<&std::path::Path> {
        match self {
            Self::Install { log_path, .. } => Some(log_path),
            _ => None,
        }
    }

    pub(crate) fn io(context: &str, err: &std::io::Error) -> Self {
        Self::Io {
            message: format!("{context}: {err}"),
            fix: "Check disk space and permissions on the temporary directory".to_string(),
        }
    }
}
