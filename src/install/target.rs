//! What is being installed and where it can be found.

use crate::detection::first_existing;
use crate::{Os, ProductProfile};
use std::path::PathBuf;

/// The product as seen by detection and verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallationTarget {
    /// Human-readable product name.
    pub product_name: String,

    /// Pattern matched against the installed-application registry.
    pub name_pattern: String,

    /// Installed executable locations in priority order.
    pub candidates: Vec<PathBuf>,

    /// Version of the installation found by detection, if any.
    pub prior_version: Option<String>,
}

impl InstallationTarget {
    /// Target for `os` built from a product profile.
    pub fn from_profile(profile: &ProductProfile, os: Os) -> Self {
        Self {
            product_name: profile.product_name.clone(),
            name_pattern: profile.name_pattern.clone(),
            candidates: profile.candidates(os).to_vec(),
            prior_version: None,
        }
    }

    /// The first candidate that exists on disk.
    pub fn locate_executable(&self) -> Option<PathBuf> {
        first_existing(&self.candidates)
    }
}
