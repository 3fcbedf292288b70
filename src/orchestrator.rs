//! One installation run, end to end.
//!
//! Privilege gate, prerequisites, release resolution, download, the
//! installation state machine, then the optional components. Every step
//! waits for the previous one; the first error ends the run.

use crate::components::{
    install_component, AntivirusEngineInstaller, BrowserExtensionInstaller, ComponentInstaller,
    ComponentKind, ComponentOutcome, JsonToolInstaller, PackageManager,
};
use crate::install::{
    for_os, InstallProgress, InstallRequest, InstallationManager, InstallationTarget,
    PlatformInstaller,
};
use crate::release::{ArtifactFetcher, ReleaseResolver};
use crate::{
    CommandRunner, InstallError, PrivilegeGate, RetryExecutor, RunConfig, RunSummary, Sleeper,
    Transport,
};
use std::path::Path;
use std::sync::Arc;

/// Runs the whole installation flow for one [`RunConfig`].
pub struct Orchestrator<'a> {
    config: &'a RunConfig,
    runner: Arc<dyn CommandRunner>,
    transport: Arc<dyn Transport>,
    retry: RetryExecutor,
    platform: Box<dyn PlatformInstaller>,
}

impl std::fmt::Debug for Orchestrator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("platform", &self.config.platform)
            .finish_non_exhaustive()
    }
}

impl<'a> Orchestrator<'a> {
    /// Wire the run's collaborators. The native installer variant is chosen
    /// from the configured platform.
    pub fn new(
        config: &'a RunConfig,
        runner: Arc<dyn CommandRunner>,
        transport: Arc<dyn Transport>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        let platform = for_os(config.platform.os, runner.clone(), &config.product);
        Self {
            config,
            runner,
            transport,
            retry: RetryExecutor::new(sleeper),
            platform,
        }
    }

    /// Replace the native installer variant.
    pub fn with_platform(mut self, platform: Box<dyn PlatformInstaller>) -> Self {
        self.platform = platform;
        self
    }

    /// Execute the run, reporting each stage to `on_progress`.
    pub async fn run<F>(&self, on_progress: F) -> Result<RunSummary, InstallError>
    where
        F: Fn(InstallProgress),
    {
        let config = self.config;
        config.validate()?;
        tracing::info!(platform = %config.platform, "starting installation run");

        on_progress(InstallProgress::CheckingPrivileges);
        PrivilegeGate::new(self.runner.clone(), config.platform.os)
            .require()
            .await?;

        let mut components = Vec::new();
        if config.skip_json_tool {
            tracing::info!("skipping jq prerequisite");
        } else {
            on_progress(InstallProgress::CheckingPrerequisites);
            let jq = JsonToolInstaller::new(config.platform.os, self.packages());
            components.push(self.ensure(&jq, &on_progress).await?);
        }

        on_progress(InstallProgress::Resolving);
        let artifact = ReleaseResolver::new(self.transport.as_ref(), &self.retry)
            .resolve(&config.release_index_url, &config.platform)
            .await?;

        std::fs::create_dir_all(&config.staging_root)
            .map_err(|e| InstallError::io("failed to create staging root", &e))?;
        let staging = tempfile::Builder::new()
            .prefix("endpoint-agent-")
            .tempdir_in(&config.staging_root)
            .map_err(|e| InstallError::io("failed to create staging directory", &e))?;
        tracing::debug!(dir = %staging.path().display(), "staging directory");

        on_progress(InstallProgress::Downloading {
            version: artifact.version.to_string(),
        });
        let package = ArtifactFetcher::new(
            self.transport.as_ref(),
            &self.retry,
            self.platform.as_ref(),
        )
        .fetch(&artifact, staging.path())
        .await?;

        let request = InstallRequest {
            package: &package,
            log_path: &config.log_path,
            backend_host: &config.backend_host,
            auth_token: &config.auth_token,
        };
        let target = InstallationTarget::from_profile(&config.product, config.platform.os);
        let installed = InstallationManager::new(self.platform.as_ref(), self.runner.as_ref())
            .run(target, &artifact.version, request, &on_progress)
            .await
            .into_result()?;

        for component in self.optional_components(staging.path()) {
            components.push(self.ensure(component.as_ref(), &on_progress).await?);
        }

        tracing::info!(version = %installed.version, "installation run complete");
        Ok(RunSummary {
            platform: config.platform.clone(),
            version: installed.version,
            prior_version: installed.prior_version,
            log_path: installed.log_path,
            components,
        })
    }

    fn packages(&self) -> PackageManager {
        PackageManager::new(
            self.runner.clone(),
            self.config.platform.os,
            self.config.invoking_user.clone(),
        )
    }

    fn optional_components(&self, staging: &Path) -> Vec<Box<dyn ComponentInstaller>> {
        let config = self.config;
        let mut selected: Vec<Box<dyn ComponentInstaller>> = Vec::new();
        if config.install_antivirus {
            selected.push(Box::new(AntivirusEngineInstaller::new(
                config.platform.os,
                self.packages(),
            )));
        }
        if config.install_extension {
            selected.push(Box::new(BrowserExtensionInstaller::new(
                self.transport.clone(),
                config.extension_pointer_url.clone(),
                config.product.extension_dir(config.platform.os).clone(),
                staging,
            )));
        }
        selected
    }

    async fn ensure<F>(
        &self,
        component: &dyn ComponentInstaller,
        on_progress: &F,
    ) -> Result<(ComponentKind, ComponentOutcome), InstallError>
    where
        F: Fn(InstallProgress),
    {
        let kind = component.kind();
        on_progress(InstallProgress::ComponentStarted { component: kind });
        let outcome = install_component(component, &self.retry).await?;
        on_progress(InstallProgress::ComponentFinished {
            component: kind,
            outcome,
        });
        Ok((kind, outcome))
    }
}
