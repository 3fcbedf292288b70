//! Version query of an installed executable.

use super::DetectionError;
use crate::{CommandRunner, StructuredCommand};
use std::path::Path;

/// Run `<path> --version` and return its output.
///
/// Stdout is preferred, stderr is the fallback. A spawn failure or non-zero
/// exit is an `IoError` (or `PermissionDenied` when the OS says so).
pub(crate) async fn check_version(
    runner: &dyn CommandRunner,
    path: &Path,
) -> Result<String, DetectionError> {
    let command = StructuredCommand::new(path.to_string_lossy()).arg("--version");
    let output = runner.run(&command).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::PermissionDenied {
            DetectionError::PermissionDenied
        } else {
            DetectionError::IoError
        }
    })?;

    if !output.success() {
        return Err(DetectionError::IoError);
    }

    Ok(output.primary_text().to_string())
}
