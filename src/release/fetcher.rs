//! Artifact download into the staging directory.

use super::ReleaseArtifact;
use crate::install::PlatformInstaller;
use crate::{InstallError, NetworkOperation, RetryExecutor, RetryPolicy, Transport};
use std::path::{Path, PathBuf};

/// Downloads a resolved artifact and clears its downloaded-file mark.
pub struct ArtifactFetcher<'a> {
    transport: &'a dyn Transport,
    retry: &'a RetryExecutor,
    platform: &'a dyn PlatformInstaller,
    policy: RetryPolicy,
}

impl<'a> ArtifactFetcher<'a> {
    /// Fetcher using the network retry policy.
    pub fn new(
        transport: &'a dyn Transport,
        retry: &'a RetryExecutor,
        platform: &'a dyn PlatformInstaller,
    ) -> Self {
        Self {
            transport,
            retry,
            platform,
            policy: RetryPolicy::network(),
        }
    }

    /// Override the retry policy for the download.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Download `artifact` into `staging_dir` and return the local path.
    ///
    /// Every attempt starts from an empty file; a partial file is removed
    /// before the next attempt and after the last one.
    pub async fn fetch(
        &self,
        artifact: &ReleaseArtifact,
        staging_dir: &Path,
    ) -> Result<PathBuf, InstallError> {
        let dest = staging_dir.join(local_file_name(&artifact.file_name));
        let url = artifact.download_url.as_str();
        tracing::info!(%url, dest = %dest.display(), "downloading installer package");

        let result = self
            .retry
            .run("installer download", &self.policy, |_| {
                let dest = dest.clone();
                async move {
                    let outcome = self.transport.download(url, &dest).await;
                    if outcome.is_err() {
                        discard_partial(&dest).await;
                    }
                    outcome
                }
            })
            .await;

        let bytes = result.map_err(|e| InstallError::Network {
            operation: NetworkOperation::Download,
            url: url.to_string(),
            attempts: e.attempts,
            message: e.last_error.to_string(),
            fix: "Check network connectivity and proxy settings, then re-run the installer"
                .to_string(),
        })?;
        tracing::debug!(bytes, "installer package downloaded");

        self.platform.clear_download_mark(&dest).await?;
        Ok(dest)
    }
}

impl std::fmt::Debug for ArtifactFetcher<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactFetcher")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Keep only the final path component of an asset name.
fn local_file_name(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .find(|part| !part.is_empty() && *part != "." && *part != "..")
        .unwrap_or("package");
    base.to_string()
}

async fn discard_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "removed partial download"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "could not remove partial download"),
    }
}
