//! Optional components installed after the agent.
//!
//! Every component follows the same contract: an idempotency check, then an
//! install procedure driven by [`RetryExecutor`] under the component's own
//! policy. A component that is already present is never reinstalled.

mod antivirus;
mod browser_extension;
mod json_tool;
mod kind;
mod package;

pub use antivirus::AntivirusEngineInstaller;
pub use browser_extension::{BrowserExtensionInstaller, EXTENSION_SUBDIR, MANIFEST_FILE};
pub use json_tool::JsonToolInstaller;
pub use kind::ComponentKind;
pub use package::{PackageManager, PackageRef};

use crate::{InstallError, RetryExecutor, RetryPolicy, TransportError};
use async_trait::async_trait;
use thiserror::Error;

/// Errors from one component install attempt.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ComponentError {
    /// A package manager or installer command exited non-zero.
    #[error("`{command}` exited with {code:?}: {stderr}")]
    CommandFailed {
        /// The command line that ran.
        command: String,
        /// Its exit code.
        code: Option<i32>,
        /// Trimmed standard error.
        stderr: String,
    },

    /// A required tool is not available.
    #[error("{0}")]
    Unavailable(String),

    /// A download failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The downloaded archive is unreadable or lacks the expected layout.
    #[error("malformed archive: {0}")]
    MalformedArchive(String),

    /// A filesystem operation failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// How a component ended up present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentOutcome {
    /// Already installed; the install procedure did not run.
    Skipped,
    /// Installed by this run.
    Installed {
        /// Attempts it took, including the successful one.
        attempts: u32,
    },
}

impl std::fmt::Display for ComponentOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Skipped => f.write_str("already installed"),
            Self::Installed { attempts: 1 } => f.write_str("installed"),
            Self::Installed { attempts } => write!(f, "installed after {attempts} attempts"),
        }
    }
}

/// An optional, independently installable component.
#[async_trait]
pub trait ComponentInstaller: Send + Sync {
    /// Which component this is.
    fn kind(&self) -> ComponentKind;

    /// Retry policy for [`ComponentInstaller::install`].
    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::component()
    }

    /// Whether the component is already present.
    async fn is_installed(&self) -> bool;

    /// Install the component once.
    async fn install(&self) -> Result<(), ComponentError>;
}

/// Ensure `component` is present.
///
/// Skips when already installed; otherwise retries
/// [`ComponentInstaller::install`] under the component's policy and maps an
/// exhausted budget to [`InstallError::ComponentInstall`].
pub async fn install_component(
    component: &dyn ComponentInstaller,
    retry: &RetryExecutor,
) -> Result<ComponentOutcome, InstallError> {
    let kind = component.kind();
    if component.is_installed().await {
        tracing::info!(component = %kind, "already installed, skipping");
        return Ok(ComponentOutcome::Skipped);
    }

    let policy = component.retry_policy();
    tracing::info!(component = %kind, max_attempts = policy.max_attempts, "installing component");
    let attempts = retry
        .run(kind.display_name(), &policy, |attempt| async move {
            component.install().await.map(|()| attempt)
        })
        .await
        .map_err(|e| InstallError::ComponentInstall {
            component: kind.display_name().to_string(),
            attempts: e.attempts,
            message: e.last_error.to_string(),
            fix: format!(
                "Install {} manually, then re-run the installer",
                kind.display_name()
            ),
        })?;

    tracing::info!(component = %kind, attempts, "component installed");
    Ok(ComponentOutcome::Installed { attempts })
}
