//! Detection of installed software.
//!
//! - `find_executable`: PATH lookup with fallback locations
//! - `first_existing`: first existing path among ordered candidates
//! - `check_version`: run an executable's `--version` mode
//! - `parse_version` / `version_matches`: interpret version output

mod parser;
mod path_finder;
mod version;

pub use parser::version_matches;
pub(crate) use parser::parse_version;
pub(crate) use path_finder::{find_executable, first_existing};
pub(crate) use version::check_version;

/// Typed reasons a version query failed.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DetectionError {
    /// Permission denied running the executable.
    PermissionDenied,

    /// The executable produced no parsable version.
    VersionParseFailed,

    /// The executable could not be run or exited non-zero.
    IoError,
}

impl DetectionError {
    /// Human-readable description of the error.
    ///
    /// # Example
    ///
    /// ```rust
    /// use endpoint_agent_installer::DetectionError;
    ///
    /// assert_eq!(DetectionError::IoError.description(), "I/O error during detection");
    /// ```
    pub fn description(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "Permission denied",
            Self::VersionParseFailed => "Failed to parse version",
            Self::IoError => "I/O error during detection",
        }
    }
}
