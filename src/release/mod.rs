//! Release resolution and artifact download.
//!
//! [`ReleaseResolver`] turns the release index into the one
//! [`ReleaseArtifact`] for this platform; [`ArtifactFetcher`] downloads it
//! into the run's staging directory.

mod fetcher;
mod resolver;

pub use fetcher::ArtifactFetcher;
pub use resolver::{
    asset_suffix, select_asset, strip_version_prefix, ReleaseArtifact, ReleaseAsset,
    ReleaseMetadata, ReleaseResolver,
};
