//! Executable lookup: PATH first, then fixed fallback locations.

use std::path::{Path, PathBuf};

/// Find an executable by name.
///
/// Tries the system PATH via the `which` crate, then each of `fallbacks`
/// in order.
pub(crate) fn find_executable(name: &str, fallbacks: &[PathBuf]) -> Option<PathBuf> {
    if let Ok(path) = which::which(name) {
        return Some(path);
    }
    first_existing(fallbacks)
}

/// The first path among `candidates` that exists, in the given order.
pub(crate) fn first_existing<P: AsRef<Path>>(candidates: &[P]) -> Option<PathBuf> {
    candidates
        .iter()
        .map(AsRef::as_ref)
        .find(|path| path.exists())
        .map(Path::to_path_buf)
}
