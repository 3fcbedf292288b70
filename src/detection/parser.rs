//! Version output parsing.

use super::DetectionError;
use regex::Regex;
use semver::Version;
use std::sync::OnceLock;

fn semver_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\d+)\.(\d+)\.(\d+)").expect("Invalid regex pattern"))
}

/// Parse the first semantic version (major.minor.patch) found in CLI output.
///
/// - `Endpoint Agent 1.4.2` -> 1.4.2
/// - `endpoint-agent version 2.0.0 (build 311)` -> 2.0.0
pub(crate) fn parse_version(output: &str) -> Result<Version, DetectionError> {
    let caps = semver_pattern()
        .captures(output)
        .ok_or(DetectionError::VersionParseFailed)?;
    let matched = caps.get(0).ok_or(DetectionError::VersionParseFailed)?;
    Version::parse(matched.as_str()).map_err(|_| DetectionError::VersionParseFailed)
}

/// Whether `expected` occurs in `output` as a whole word.
///
/// A match needs a word boundary (`\b`) on both sides, so surrounding build
/// metadata like `(build 311)` or `+sha.abc` is tolerated while `1.2.0`
/// inside `11.2.0` is not a match. Dots are not word characters, so
/// `1.2.0` still matches inside `1.2.0.1`.
///
/// # Example
///
/// ```rust
/// use endpoint_agent_installer::version_matches;
///
/// assert!(version_matches("Endpoint Agent 1.2.0 (build 311)", "1.2.0"));
/// assert!(!version_matches("Endpoint Agent 11.2.0", "1.2.0"));
/// ```
pub fn version_matches(output: &str, expected: &str) -> bool {
    let expected = expected.trim();
    if expected.is_empty() {
        return false;
    }
    Regex::new(&format!(r"\b{}\b", regex::escape(expected)))
        .map(|re| re.is_match(output))
        .unwrap_or(false)
}
