//! Release index lookup and asset selection.

use crate::{
    Arch, InstallError, NetworkOperation, Os, Platform, RetryExecutor, RetryPolicy, Transport,
};
use semver::Version;
use serde::Deserialize;

/// Latest-release metadata as served by the release index.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseMetadata {
    /// Version tag, possibly prefixed (`v1.2.0`).
    pub tag_name: String,

    /// Downloadable assets in response order.
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

/// One downloadable file of a release.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseAsset {
    /// File name of the asset.
    pub name: String,

    /// Direct download URL.
    pub browser_download_url: String,
}

/// The installer package selected for this platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseArtifact {
    /// Release version with any prefix stripped.
    pub version: Version,
    /// Target operating system.
    pub os: Os,
    /// Target architecture.
    pub arch: Arch,
    /// Where to download the package.
    pub download_url: String,
    /// Asset file name.
    pub file_name: String,
}

/// Asset name suffix for a platform, e.g. `-x64.msi` or `-arm64.pkg`.
///
/// `None` when the architecture is not supported.
pub fn asset_suffix(os: Os, arch: &Arch) -> Option<String> {
    arch.asset_token()
        .map(|token| format!("-{}.{}", token, os.package_extension()))
}

/// Strip one leading version-prefix character (`v` or `V`).
pub fn strip_version_prefix(tag: &str) -> &str {
    let tag = tag.trim();
    tag.strip_prefix(&['v', 'V'][..]).unwrap_or(tag)
}

/// Select the single asset matching `platform` from `release`.
///
/// Zero matches is a resolution failure. When several assets match, the
/// first in response order is taken and the ambiguity is logged.
///
/// # Example
///
/// ```rust
/// use endpoint_agent_installer::{select_asset, Arch, Os, Platform, ReleaseMetadata};
///
/// let release: ReleaseMetadata = serde_json::from_str(r#"{
///     "tag_name": "v1.2.0",
///     "assets": [
///         {"name": "agent-1.2.0-x64.msi", "browser_download_url": "https://example.com/x64.msi"},
///         {"name": "agent-1.2.0-arm64.msi", "browser_download_url": "https://example.com/arm64.msi"}
///     ]
/// }"#).unwrap();
/// let platform = Platform { os: Os::Windows, arch: Arch::X64 };
/// let artifact = select_asset(&release, &platform).unwrap();
/// assert_eq!(artifact.file_name, "agent-1.2.0-x64.msi");
/// assert_eq!(artifact.version.to_string(), "1.2.0");
/// ```
pub fn select_asset(
    release: &ReleaseMetadata,
    platform: &Platform,
) -> Result<ReleaseArtifact, InstallError> {
    let suffix = asset_suffix(platform.os, &platform.arch).ok_or_else(|| unsupported_arch(platform))?;

    let raw_version = strip_version_prefix(&release.tag_name);
    let version = Version::parse(raw_version).map_err(|e| InstallError::Resolution {
        message: format!(
            "release tag {:?} is not a semantic version: {}",
            release.tag_name, e
        ),
        fix: "Check the release index; the latest release tag must look like v1.2.3".to_string(),
    })?;

    let matching: Vec<&ReleaseAsset> = release
        .assets
        .iter()
        .filter(|asset| asset.name.to_ascii_lowercase().ends_with(&suffix))
        .collect();

    let asset = match matching.as_slice() {
        [] => {
            return Err(InstallError::Resolution {
                message: format!(
                    "no asset in release {} ends with {:?}",
                    release.tag_name, suffix
                ),
                fix: format!(
                    "Confirm release {} publishes a package for {}",
                    release.tag_name, platform
                ),
            })
        }
        [only] => *only,
        [first, rest @ ..] => {
            tracing::warn!(
                selected = %first.name,
                ignored = rest.len(),
                %suffix,
                "multiple release assets match this platform, taking the first"
            );
            *first
        }
    };

    Ok(ReleaseArtifact {
        version,
        os: platform.os,
        arch: platform.arch.clone(),
        download_url: asset.browser_download_url.clone(),
        file_name: asset.name.clone(),
    })
}

fn unsupported_arch(platform: &Platform) -> InstallError {
    InstallError::Resolution {
        message: format!("architecture {} is not supported", platform.arch),
        fix: "Install on an x64 or arm64 machine".to_string(),
    }
}

/// Queries the release index for the artifact matching a platform.
pub struct ReleaseResolver<'a> {
    transport: &'a dyn Transport,
    retry: &'a RetryExecutor,
    policy: RetryPolicy,
}

impl<'a> ReleaseResolver<'a> {
    /// Resolver using the network retry policy.
    pub fn new(transport: &'a dyn Transport, retry: &'a RetryExecutor) -> Self {
        Self {
            transport,
            retry,
            policy: RetryPolicy::network(),
        }
    }

    /// Override the retry policy for the metadata fetch.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Fetch the latest release from `index_url` and select the asset for `platform`.
    ///
    /// Unsupported architectures fail before any network access.
    pub async fn resolve(
        &self,
        index_url: &str,
        platform: &Platform,
    ) -> Result<ReleaseArtifact, InstallError> {
        if platform.arch.asset_token().is_none() {
            return Err(unsupported_arch(platform));
        }

        tracing::info!(%index_url, %platform, "resolving latest release");
        let body = self
            .retry
            .run("release index", &self.policy, |_| self.transport.get_text(index_url))
            .await
            .map_err(|e| InstallError::Network {
                operation: NetworkOperation::ReleaseIndex,
                url: index_url.to_string(),
                attempts: e.attempts,
                message: e.last_error.to_string(),
                fix: "Check network connectivity and that the release index is reachable"
                    .to_string(),
            })?;

        let release: ReleaseMetadata =
            serde_json::from_str(&body).map_err(|e| InstallError::Resolution {
                message: format!("release index response is not valid release metadata: {e}"),
                fix: "Check the --release-index URL points at a latest-release endpoint"
                    .to_string(),
            })?;

        let artifact = select_asset(&release, platform)?;
        tracing::info!(
            version = %artifact.version,
            asset = %artifact.file_name,
            "resolved release artifact"
        );
        Ok(artifact)
    }
}

impl std::fmt::Debug for ReleaseResolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleaseResolver")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
