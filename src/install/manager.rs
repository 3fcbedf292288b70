//! The installation state machine.
//!
//! `Idle → Detecting → Uninstalling (only with a prior install) → Installing
//! → Verifying → Done`, with any stage able to move to `Failed`. Nothing is
//! retried here and nothing is rolled back: a failure at `Verifying` leaves
//! the new version installed.

use super::platform::{InstallRequest, PlatformInstaller};
use super::{InstallError, InstallProgress, InstallationTarget};
use crate::detection::{check_version, version_matches};
use crate::CommandRunner;
use semver::Version;
use std::path::PathBuf;

/// States of one installation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum InstallState {
    /// Nothing has happened yet.
    Idle,
    /// Looking for a prior installation.
    Detecting,
    /// Removing the prior installation.
    Uninstalling,
    /// Running the native installer.
    Installing,
    /// Checking the installed version.
    Verifying,
    /// Terminal success.
    Done,
    /// Terminal failure.
    Failed,
}

impl InstallState {
    /// Whether no further transition can happen.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// Outcome of a state machine run.
#[derive(Debug)]
pub struct InstallationResult {
    /// Terminal state, `Done` or `Failed`.
    pub status: InstallState,

    /// The resolved release version.
    pub version: Version,

    /// Version of the installation that was replaced, if any.
    pub prior_version: Option<String>,

    /// Captured install log.
    pub log_path: PathBuf,

    /// Every state entered, in order, starting at `Idle`.
    pub history: Vec<InstallState>,

    /// Why the run failed, `None` when `status` is `Done`.
    pub error: Option<InstallError>,
}

impl InstallationResult {
    /// Whether the run ended in `Done`.
    pub fn is_done(&self) -> bool {
        self.status == InstallState::Done
    }

    /// Whether `state` was entered during the run.
    pub fn entered(&self, state: InstallState) -> bool {
        self.history.contains(&state)
    }

    /// Split off the failure, if any.
    pub fn into_result(mut self) -> Result<Self, InstallError> {
        match self.error.take() {
            Some(error) => Err(error),
            None => Ok(self),
        }
    }
}

/// Drives detect, uninstall, install and verify for one target.
pub struct InstallationManager<'a> {
    platform: &'a dyn PlatformInstaller,
    runner: &'a dyn CommandRunner,
}

impl std::fmt::Debug for InstallationManager<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallationManager")
            .field("os", &self.platform.os())
            .finish_non_exhaustive()
    }
}

struct Transitions {
    history: Vec<InstallState>,
}

impl Transitions {
    fn enter(&mut self, next: InstallState) {
        let from = self.current();
        tracing::info!(%from, to = %next, "installation state");
        self.history.push(next);
    }

    fn current(&self) -> InstallState {
        self.history.last().copied().unwrap_or(InstallState::Idle)
    }
}

impl<'a> InstallationManager<'a> {
    /// Create a manager using `platform` for native operations and `runner`
    /// for the version query.
    pub fn new(platform: &'a dyn PlatformInstaller, runner: &'a dyn CommandRunner) -> Self {
        Self { platform, runner }
    }

    /// Run the state machine to a terminal state.
    ///
    /// `expected` is the resolved release version the installed executable
    /// must report.
    pub async fn run<F>(
        &self,
        mut target: InstallationTarget,
        expected: &Version,
        request: InstallRequest<'_>,
        on_progress: F,
    ) -> InstallationResult
    where
        F: Fn(InstallProgress),
    {
        let mut transitions = Transitions {
            history: vec![InstallState::Idle],
        };

        let outcome = self
            .drive(&mut target, expected, &request, &on_progress, &mut transitions)
            .await;

        let error = match outcome {
            Ok(()) => {
                transitions.enter(InstallState::Done);
                on_progress(InstallProgress::Completed {
                    version: expected.to_string(),
                });
                None
            }
            Err(error) => {
                tracing::error!(
                    stage = %transitions.current(),
                    error = %error,
                    "installation failed"
                );
                transitions.enter(InstallState::Failed);
                Some(error)
            }
        };

        InstallationResult {
            status: transitions.current(),
            version: expected.clone(),
            prior_version: target.prior_version,
            log_path: request.log_path.to_path_buf(),
            history: transitions.history,
            error,
        }
    }

    async fn drive(
        &self,
        target: &mut InstallationTarget,
        expected: &Version,
        request: &InstallRequest<'_>,
        on_progress: &dyn Fn(InstallProgress),
        transitions: &mut Transitions,
    ) -> Result<(), InstallError> {
        transitions.enter(InstallState::Detecting);
        on_progress(InstallProgress::Detecting);

        if let Some(prior) = self.platform.detect(target).await? {
            tracing::info!(
                identifier = %prior.identifier,
                version = ?prior.version,
                "found existing installation"
            );
            target.prior_version = prior.version.clone();

            transitions.enter(InstallState::Uninstalling);
            on_progress(InstallProgress::Uninstalling {
                prior_version: prior.version.clone(),
            });
            self.platform.uninstall(target, &prior).await?;

            if let Some(remaining) = self.platform.detect(target).await? {
                return Err(InstallError::Uninstall {
                    product: target.product_name.clone(),
                    message: format!(
                        "{} is still registered after the uninstaller finished",
                        remaining.identifier
                    ),
                    fix: format!(
                        "Remove {} manually, reboot if prompted, then re-run the installer",
                        target.product_name
                    ),
                });
            }
        }

        transitions.enter(InstallState::Installing);
        on_progress(InstallProgress::Installing {
            version: expected.to_string(),
        });
        self.platform.install(request).await?;

        transitions.enter(InstallState::Verifying);
        on_progress(InstallProgress::Verifying {
            version: expected.to_string(),
        });
        self.verify(target, expected).await
    }

    async fn verify(
        &self,
        target: &InstallationTarget,
        expected: &Version,
    ) -> Result<(), InstallError> {
        let expected = expected.to_string();
        let fix = format!(
            "Run the {} executable with --version and compare against {}",
            target.product_name, expected
        );

        let path = target
            .locate_executable()
            .ok_or_else(|| InstallError::Verification {
                expected: expected.clone(),
                reported: "no installed executable at any known location".to_string(),
                fix: fix.clone(),
            })?;

        let output = check_version(self.runner, &path).await.map_err(|e| {
            InstallError::Verification {
                expected: expected.clone(),
                reported: e.description().to_string(),
                fix: fix.clone(),
            }
        })?;

        if !version_matches(&output, &expected) {
            return Err(InstallError::Verification {
                expected,
                reported: output.trim().to_string(),
                fix,
            });
        }

        tracing::info!(path = %path.display(), version = %expected, "installed version verified");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakePlatform, ScriptedRunner};
    use crate::{CommandOutput, Os, ProductProfile};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        target: InstallationTarget,
        log: PathBuf,
        package: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let mut target =
                InstallationTarget::from_profile(&ProductProfile::default(), Os::Windows);
            target.candidates = vec![
                dir.path().join("missing/endpoint-agent.exe"),
                dir.path().join("endpoint-agent.exe"),
            ];
            let log = dir.path().join("install.log");
            let package = dir.path().join("agent-1.2.0-x64.msi");
            Self {
                dir,
                target,
                log,
                package,
            }
        }

        fn request(&self) -> InstallRequest<'_> {
            InstallRequest {
                package: &self.package,
                log_path: &self.log,
                backend_host: "backend.example.com",
                auth_token: "token",
            }
        }

        fn executable(&self) -> PathBuf {
            self.dir.path().join("endpoint-agent.exe")
        }
    }

    fn places_executable(path: PathBuf) -> impl Fn() + Send + Sync {
        move || std::fs::write(&path, b"").unwrap()
    }

    fn reports(version: &'static str) -> ScriptedRunner {
        ScriptedRunner::new(move |_| CommandOutput::ok(format!("Endpoint Agent {version}\n")))
    }

    #[tokio::test]
    async fn test_fresh_install_reaches_done() {
        let fixture = Fixture::new();
        let platform = FakePlatform::fresh().on_install(places_executable(fixture.executable()));
        let runner = reports("1.2.0");
        let manager = InstallationManager::new(&platform, &runner);

        let result = manager
            .run(
                fixture.target.clone(),
                &Version::new(1, 2, 0),
                fixture.request(),
                |_| {},
            )
            .await;

        assert!(result.is_done(), "{:?}", result.error);
        assert_eq!(
            result.history,
            vec![
                InstallState::Idle,
                InstallState::Detecting,
                InstallState::Installing,
                InstallState::Verifying,
                InstallState::Done,
            ]
        );
        assert!(!result.entered(InstallState::Uninstalling));
        assert_eq!(result.log_path, fixture.log);
        assert_eq!(platform.events(), vec!["detect", "install"]);
    }

    #[tokio::test]
    async fn test_prior_install_is_removed_before_install() {
        let fixture = Fixture::new();
        let platform = FakePlatform::fresh()
            .with_prior("1.1.0")
            .on_install(places_executable(fixture.executable()));
        let runner = reports("1.2.0");
        let manager = InstallationManager::new(&platform, &runner);

        let result = manager
            .run(
                fixture.target.clone(),
                &Version::new(1, 2, 0),
                fixture.request(),
                |_| {},
            )
            .await;

        assert!(result.is_done());
        assert_eq!(result.prior_version.as_deref(), Some("1.1.0"));
        assert_eq!(
            platform.events(),
            vec!["detect", "uninstall", "detect", "install"]
        );
    }

    #[tokio::test]
    async fn test_still_registered_after_uninstall_fails_before_install() {
        let fixture = Fixture::new();
        let platform = FakePlatform::fresh().with_prior("1.1.0").sticky();
        let runner = reports("1.2.0");
        let manager = InstallationManager::new(&platform, &runner);

        let result = manager
            .run(
                fixture.target.clone(),
                &Version::new(1, 2, 0),
                fixture.request(),
                |_| {},
            )
            .await;

        assert_eq!(result.status, InstallState::Failed);
        assert!(!result.entered(InstallState::Installing));
        assert!(!platform.events().contains(&"install"));
        assert!(matches!(
            result.into_result(),
            Err(InstallError::Uninstall { .. })
        ));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_install_failure_is_not_retried() {
        let fixture = Fixture::new();
        let platform = FakePlatform::fresh().failing_install(1603);
        let runner = reports("1.2.0");
        let manager = InstallationManager::new(&platform, &runner);

        let result = manager
            .run(
                fixture.target.clone(),
                &Version::new(1, 2, 0),
                fixture.request(),
                |_| {},
            )
            .await;

        assert_eq!(platform.events(), vec!["detect", "install"]);
        assert!(!result.entered(InstallState::Verifying));
        match result.into_result() {
            Err(InstallError::Install { log_path, .. }) => assert_eq!(log_path, fixture.log),
            other => panic!("unexpected result: {:?}", other.map(|r| r.status)),
        }
    }

    #[tokio::test]
    async fn test_verification_rejects_longer_version() {
        let fixture = Fixture::new();
        let platform = FakePlatform::fresh().on_install(places_executable(fixture.executable()));
        let runner = reports("11.2.0");
        let manager = InstallationManager::new(&platform, &runner);

        let result = manager
            .run(
                fixture.target.clone(),
                &Version::new(1, 2, 0),
                fixture.request(),
                |_| {},
            )
            .await;

        assert_eq!(result.status, InstallState::Failed);
        match result.into_result() {
            Err(InstallError::Verification {
                expected, reported, ..
            }) => {
                assert_eq!(expected, "1.2.0");
                assert_eq!(reported, "Endpoint Agent 11.2.0");
            }
            other => panic!("unexpected result: {:?}", other.map(|r| r.status)),
        }
    }

    #[tokio::test]
    async fn test_verification_without_executable_fails() {
        let fixture = Fixture::new();
        let platform = FakePlatform::fresh();
        let runner = reports("1.2.0");
        let manager = InstallationManager::new(&platform, &runner);

        let result = manager
            .run(
                fixture.target.clone(),
                &Version::new(1, 2, 0),
                fixture.request(),
                |_| {},
            )
            .await;

        assert!(matches!(
            result.error,
            Some(InstallError::Verification { .. })
        ));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_progress_follows_states() {
        let fixture = Fixture::new();
        let platform = FakePlatform::fresh()
            .with_prior("1.1.0")
            .on_install(places_executable(fixture.executable()));
        let runner = reports("1.2.0");
        let manager = InstallationManager::new(&platform, &runner);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        manager
            .run(
                fixture.target.clone(),
                &Version::new(1, 2, 0),
                fixture.request(),
                move |p| sink.lock().unwrap().push(p.description()),
            )
            .await;

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                "Checking for an existing installation",
                "Removing previous installation",
                "Installing",
                "Verifying installation",
                "Installation complete",
            ]
        );
    }

    #[test]
    fn test_terminal_states() {
        assert!(InstallState::Done.is_terminal());
        assert!(InstallState::Failed.is_terminal());
        assert!(!InstallState::Verifying.is_terminal());
        assert_eq!(InstallState::Uninstalling.to_string(), "Uninstalling");
    }
}
