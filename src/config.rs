//! Run configuration.
//!
//! All ambient facts a run depends on (detected platform, interaction mode,
//! credentials, product locations) are gathered once into a [`RunConfig`]
//! and passed by reference into every component.

use crate::InstallError;
use std::fmt;
use std::path::PathBuf;

/// Default release index (latest release metadata, GitHub API format).
pub const DEFAULT_RELEASE_INDEX: &str =
    "https://api.github.com/repos/endpoint-agent/agent/releases/latest";

/// Default pointer file naming the current browser extension package.
pub const DEFAULT_EXTENSION_POINTER: &str =
    "https://downloads.endpoint-agent.dev/browser-extension/latest.txt";

/// File name of the install log, placed in the system temp directory.
pub const LOG_FILE_NAME: &str = "endpoint-agent-install.log";

/// Operating systems the installer supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
    /// Windows, installed with `msiexec`.
    Windows,
    /// macOS, installed with `installer -pkg`.
    MacOs,
}

impl Os {
    /// Detect the running operating system.
    pub fn current() -> Result<Self, InstallError> {
        Self::from_name(std::env::consts::OS)
    }

    /// Map a `std::env::consts::OS` style name.
    pub fn from_name(name: &str) -> Result<Self, InstallError> {
        match name {
            "windows" => Ok(Self::Windows),
            "macos" => Ok(Self::MacOs),
            other => Err(InstallError::UnsupportedPlatform {
                platform: other.to_string(),
                fix: "Run the installer on Windows or macOS".to_string(),
            }),
        }
    }

    /// Native package extension for release assets.
    pub fn package_extension(&self) -> &'static str {
        match self {
            Self::Windows => "msi",
            Self::MacOs => "pkg",
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Windows => "windows",
            Self::MacOs => "macos",
        })
    }
}

/// CPU architecture, named the way release assets name it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Arch {
    /// 64-bit x86.
    X64,
    /// 64-bit ARM.
    Arm64,
    /// Anything else; resolution always fails for it.
    Unsupported(String),
}

impl Arch {
    /// Detect the running CPU architecture.
    pub fn current() -> Self {
        Self::from_name(std::env::consts::ARCH)
    }

    /// Map a `std::env::consts::ARCH` style name (release-style names are accepted too).
    pub fn from_name(name: &str) -> Self {
        match name {
            "x86_64" | "x64" | "amd64" => Self::X64,
            "aarch64" | "arm64" => Self::Arm64,
            other => Self::Unsupported(other.to_string()),
        }
    }

    /// Asset naming token, `None` for unsupported architectures.
    pub fn asset_token(&self) -> Option<&'static str> {
        match self {
            Self::X64 => Some("x64"),
            Self::Arm64 => Some("arm64"),
            Self::Unsupported(_) => None,
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsupported(name) => f.write_str(name),
            supported => f.write_str(supported.asset_token().unwrap_or_default()),
        }
    }
}

/// Operating system plus architecture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    /// Detected operating system.
    pub os: Os,
    /// Detected CPU architecture.
    pub arch: Arch,
}

impl Platform {
    /// Detect the running platform.
    pub fn current() -> Result<Self, InstallError> {
        Ok(Self {
            os: Os::current()?,
            arch: Arch::current(),
        })
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}

/// Whether the run may prompt the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionMode {
    /// Prompts allowed.
    Interactive,
    /// Never prompt; missing input is an error.
    NonInteractive,
}

impl InteractionMode {
    /// Derive the mode from environment signals.
    ///
    /// `NONINTERACTIVE` forces non-interactive, `INTERACTIVE` forces
    /// interactive, and `CI` implies non-interactive. Setting both force
    /// signals is an error. With no signal the mode follows whether stdin
    /// is a terminal.
    ///
    /// # Example
    ///
    /// ```rust
    /// use endpoint_agent_installer::InteractionMode;
    ///
    /// let env = |key: &str| (key == "CI").then(|| "true".to_string());
    /// let mode = InteractionMode::from_env(env, true).unwrap();
    /// assert_eq!(mode, InteractionMode::NonInteractive);
    /// ```
    pub fn from_env<F>(lookup: F, stdin_is_terminal: bool) -> Result<Self, InstallError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |key: &str| lookup(key).is_some_and(|v| is_truthy(&v));
        let force_non_interactive = set("NONINTERACTIVE");
        let force_interactive = set("INTERACTIVE");

        match (force_non_interactive, force_interactive) {
            (true, true) => Err(InstallError::Configuration {
                message: "NONINTERACTIVE and INTERACTIVE are both set".to_string(),
                fix: "Unset one of NONINTERACTIVE or INTERACTIVE".to_string(),
            }),
            (true, false) => Ok(Self::NonInteractive),
            (false, true) => Ok(Self::Interactive),
            (false, false) if set("CI") => Ok(Self::NonInteractive),
            (false, false) if stdin_is_terminal => Ok(Self::Interactive),
            (false, false) => Ok(Self::NonInteractive),
        }
    }

    /// Whether prompting is allowed.
    pub fn is_interactive(&self) -> bool {
        matches!(self, Self::Interactive)
    }
}

fn is_truthy(value: &str) -> bool {
    let value = value.trim();
    !(value.is_empty() || value == "0" || value.eq_ignore_ascii_case("false"))
}

/// Where the product lives on each platform.
#[derive(Debug, Clone)]
pub struct ProductProfile {
    /// Human-readable product name.
    pub product_name: String,

    /// Pattern matched against installed-application display names
    /// (PowerShell `-like` syntax).
    pub name_pattern: String,

    /// macOS package receipt identifier.
    pub package_id: String,

    /// Installed executable candidates on Windows, in priority order.
    pub windows_candidates: Vec<PathBuf>,

    /// Installed executable candidates on macOS, in priority order.
    pub macos_candidates: Vec<PathBuf>,

    /// macOS application bundle removed on uninstall.
    pub macos_bundle: PathBuf,

    /// macOS response file read by the package's postinstall script.
    pub macos_response_file: PathBuf,

    /// Browser extension install directory on Windows.
    pub windows_extension_dir: PathBuf,

    /// Browser extension install directory on macOS.
    pub macos_extension_dir: PathBuf,
}

impl Default for ProductProfile {
    fn default() -> Self {
        Self {
            product_name: "Endpoint Agent".to_string(),
            name_pattern: "Endpoint Agent*".to_string(),
            package_id: "dev.endpoint-agent.agent".to_string(),
            windows_candidates: vec![
                PathBuf::from(r"C:\Program Files\Endpoint Agent\endpoint-agent.exe"),
                PathBuf::from(r"C:\Program Files (x86)\Endpoint Agent\endpoint-agent.exe"),
            ],
            macos_candidates: vec![
                PathBuf::from("/Applications/Endpoint Agent.app/Contents/MacOS/endpoint-agent"),
                PathBuf::from("/usr/local/bin/endpoint-agent"),
            ],
            macos_bundle: PathBuf::from("/Applications/Endpoint Agent.app"),
            macos_response_file: PathBuf::from(
                "/Library/Application Support/Endpoint Agent/install.conf",
            ),
            windows_extension_dir: PathBuf::from(
                r"C:\Program Files\Endpoint Agent\browser-extension",
            ),
            macos_extension_dir: PathBuf::from(
                "/Library/Application Support/Endpoint Agent/browser-extension",
            ),
        }
    }
}

impl ProductProfile {
    /// Executable candidates for `os`.
    pub fn candidates(&self, os: Os) -> &[PathBuf] {
        match os {
            Os::Windows => &self.windows_candidates,
            Os::MacOs => &self.macos_candidates,
        }
    }

    /// Browser extension directory for `os`.
    pub fn extension_dir(&self, os: Os) -> &PathBuf {
        match os {
            Os::Windows => &self.windows_extension_dir,
            Os::MacOs => &self.macos_extension_dir,
        }
    }
}

/// Immutable configuration for one installation run.
///
/// # Example
///
/// ```rust
/// use endpoint_agent_installer::{Arch, Os, Platform, RunConfig};
///
/// let platform = Platform { os: Os::Windows, arch: Arch::X64 };
/// let config = RunConfig::new("backend.example.com", "token", platform);
/// assert!(!config.install_extension);
/// assert!(config.log_path.ends_with("endpoint-agent-install.log"));
/// ```
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Backend host passed to the agent installer.
    pub backend_host: String,

    /// Authentication token passed to the agent installer.
    pub auth_token: String,

    /// Install the browser extension component.
    pub install_extension: bool,

    /// Install the antivirus engine component.
    pub install_antivirus: bool,

    /// Skip ensuring the auxiliary JSON tool (`jq`).
    pub skip_json_tool: bool,

    /// Whether prompting is allowed.
    pub interaction: InteractionMode,

    /// Detected platform.
    pub platform: Platform,

    /// Release metadata endpoint.
    pub release_index_url: String,

    /// Browser extension pointer file.
    pub extension_pointer_url: String,

    /// Product locations.
    pub product: ProductProfile,

    /// Directory under which the run's staging directory is created.
    pub staging_root: PathBuf,

    /// Deterministic install log location, retained after the run.
    pub log_path: PathBuf,

    /// User who invoked the installer through `sudo`, if any.
    pub invoking_user: Option<String>,
}

impl RunConfig {
    /// Configuration with defaults for everything but credentials and platform.
    pub fn new(
        backend_host: impl Into<String>,
        auth_token: impl Into<String>,
        platform: Platform,
    ) -> Self {
        let temp = std::env::temp_dir();
        Self {
            backend_host: backend_host.into(),
            auth_token: auth_token.into(),
            install_extension: false,
            install_antivirus: false,
            skip_json_tool: false,
            interaction: InteractionMode::NonInteractive,
            platform,
            release_index_url: DEFAULT_RELEASE_INDEX.to_string(),
            extension_pointer_url: DEFAULT_EXTENSION_POINTER.to_string(),
            product: ProductProfile::default(),
            log_path: temp.join(LOG_FILE_NAME),
            staging_root: temp,
            invoking_user: None,
        }
    }

    /// Reject configurations that cannot produce a working install.
    pub fn validate(&self) -> Result<(), InstallError> {
        require_non_empty("backend host", &self.backend_host, "--host or AGENT_HOST")?;
        require_non_empty("authentication token", &self.auth_token, "--token or AGENT_TOKEN")?;
        Ok(())
    }
}

fn require_non_empty(name: &str, value: &str, source: &str) -> Result<(), InstallError> {
    if value.trim().is_empty() {
        return Err(InstallError::Configuration {
            message: format!("{name} is empty"),
            fix: format!("Provide the {name} via {source}"),
        });
    }
    Ok(())
}

/// Use `provided` if present, otherwise prompt when interactive.
///
/// Non-interactive runs fail with a configuration error naming `name`.
pub fn require_value<P>(
    name: &str,
    provided: Option<String>,
    mode: InteractionMode,
    prompt: P,
) -> Result<String, InstallError>
where
    P: FnOnce() -> std::io::Result<String>,
{
    if let Some(value) = provided.filter(|v| !v.trim().is_empty()) {
        return Ok(value);
    }
    if !mode.is_interactive() {
        return Err(InstallError::Configuration {
            message: format!("{name} is required in non-interactive mode"),
            fix: format!("Pass the {name} on the command line or through the environment"),
        });
    }
    let value = prompt().map_err(|e| InstallError::Configuration {
        message: format!("could not read {name}: {e}"),
        fix: format!("Pass the {name} on the command line"),
    })?;
    if value.trim().is_empty() {
        return Err(InstallError::Configuration {
            message: format!("{name} is empty"),
            fix: format!("Enter a non-empty {name}"),
        });
    }
    Ok(value)
}
