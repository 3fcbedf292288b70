//! # endpoint-agent-installer
//!
//! Installs or upgrades the endpoint agent on Windows and macOS, then the
//! optional companion components (ClamAV antivirus engine, browser
//! extension).
//!
//! A run is strictly sequential:
//!
//! 1. [`PrivilegeGate`] refuses to continue without administrative rights.
//! 2. The `jq` prerequisite is ensured unless skipped.
//! 3. [`ReleaseResolver`] picks the one release asset for this platform.
//! 4. [`ArtifactFetcher`] downloads it into a run-scoped staging directory.
//! 5. [`InstallationManager`] detects and removes a prior install, runs the
//!    native installer and verifies the installed version.
//! 6. Each selected [`ComponentInstaller`] runs, skipping anything already present.
//!
//! Network operations and component installs are retried by
//! [`RetryExecutor`]; nothing else is.
//!
//! ## Example
//!
//! ```rust,no_run
//! use endpoint_agent_installer::{
//!     HttpClient, Orchestrator, Platform, RunConfig, TokioCommandRunner, TokioSleeper,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let config = RunConfig::new("backend.example.com", "token", Platform::current()?);
//!     let orchestrator = Orchestrator::new(
//!         &config,
//!         Arc::new(TokioCommandRunner),
//!         Arc::new(HttpClient::new()?),
//!         Arc::new(TokioSleeper),
//!     );
//!     let summary = orchestrator.run(|p| println!("{}", p.description())).await?;
//!     println!("installed {}", summary.version);
//!     Ok(())
//! }
//! ```

mod components;
mod config;
mod detection;
mod http;
mod install;
mod orchestrator;
mod privilege;
mod process;
mod release;
mod retry;
mod status;

#[cfg(test)]
mod testing;

pub use components::{
    install_component, AntivirusEngineInstaller, BrowserExtensionInstaller, ComponentError,
    ComponentInstaller, ComponentKind, ComponentOutcome, JsonToolInstaller, PackageManager,
    PackageRef, EXTENSION_SUBDIR, MANIFEST_FILE,
};
pub use config::{
    require_value, Arch, InteractionMode, Os, Platform, ProductProfile, RunConfig,
    DEFAULT_EXTENSION_POINTER, DEFAULT_RELEASE_INDEX, LOG_FILE_NAME,
};
pub use detection::{version_matches, DetectionError};
pub use http::{HttpClient, Transport, TransportError};
pub use install::{
    for_os, msi_property, shell_double_quote, InstallError, InstallProgress, InstallRequest,
    InstallState, InstallationManager, InstallationResult, InstallationTarget, MacInstaller,
    NetworkOperation, PlatformInstaller, PriorInstall, WindowsInstaller,
};
pub use orchestrator::Orchestrator;
pub use privilege::PrivilegeGate;
pub use process::{CommandOutput, CommandRunner, StructuredCommand, TokioCommandRunner};
pub use release::{
    asset_suffix, select_asset, strip_version_prefix, ArtifactFetcher, ReleaseArtifact,
    ReleaseAsset, ReleaseMetadata, ReleaseResolver,
};
pub use retry::{Backoff, RetryError, RetryExecutor, RetryPolicy, Sleeper, TokioSleeper};
pub use status::RunSummary;
