//! Installation of the endpoint agent itself.
//!
//! [`InstallationManager`] runs the detect, uninstall, install and verify
//! state machine against a [`PlatformInstaller`] chosen once per run with
//! [`for_os`].
//!
//! # Example
//!
//! ```rust,no_run
//! use endpoint_agent_installer::{
//!     for_os, InstallRequest, InstallationManager, InstallationTarget, Os, ProductProfile,
//!     TokioCommandRunner,
//! };
//! use semver::Version;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let profile = ProductProfile::default();
//!     let runner = Arc::new(TokioCommandRunner);
//!     let platform = for_os(Os::Windows, runner.clone(), &profile);
//!     let manager = InstallationManager::new(platform.as_ref(), runner.as_ref());
//!
//!     let request = InstallRequest {
//!         package: Path::new(r"C:\Temp\agent-1.2.0-x64.msi"),
//!         log_path: Path::new(r"C:\Temp\endpoint-agent-install.log"),
//!         backend_host: "backend.example.com",
//!         auth_token: "token",
//!     };
//!     let target = InstallationTarget::from_profile(&profile, Os::Windows);
//!     let result = manager
//!         .run(target, &Version::new(1, 2, 0), request, |p| println!("{}", p.description()))
//!         .await;
//!     println!("{} ({})", result.status, result.log_path.display());
//! }
//! ```

mod errors;
mod manager;
pub mod platform;
mod progress;
mod target;

pub use errors::{InstallError, NetworkOperation};
pub use manager::{InstallState, InstallationManager, InstallationResult};
pub use platform::{
    for_os, msi_property, shell_double_quote, InstallRequest, MacInstaller, PlatformInstaller,
    PriorInstall, WindowsInstaller,
};
pub use progress::InstallProgress;
pub use target::InstallationTarget;
