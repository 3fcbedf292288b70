//! Simulated Windows machine, release server and clock for end-to-end runs.

#![allow(dead_code)]

use async_trait::async_trait;
use endpoint_agent_installer::{
    Arch, CommandOutput, CommandRunner, Os, Platform, RunConfig, Sleeper, StructuredCommand,
    Transport, TransportError,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

pub const INDEX: &str = "https://releases.example.com/latest";
pub const PACKAGE: &str = "https://downloads.example.com/agent-1.2.0-x64.msi";
pub const POINTER: &str = "https://downloads.example.com/extension/latest.txt";
pub const PRODUCT_CODE: &str = "{6F1C2C1E-1111-4A4A-9C9C-000000000001}";

/// Release index body with the given tag and asset names.
pub fn release_index(tag: &str, assets: &[&str]) -> String {
    let assets: Vec<_> = assets
        .iter()
        .map(|name| {
            serde_json::json!({
                "name": name,
                "browser_download_url": format!("https://downloads.example.com/{name}"),
            })
        })
        .collect();
    serde_json::json!({ "tag_name": tag, "assets": assets }).to_string()
}

/// Run configuration rooted in a scratch directory.
pub fn config(root: &Path) -> RunConfig {
    let platform = Platform {
        os: Os::Windows,
        arch: Arch::X64,
    };
    let mut config = RunConfig::new("backend.example.com", "s3cr3t\"token", platform);
    config.release_index_url = INDEX.to_string();
    config.extension_pointer_url = POINTER.to_string();
    config.skip_json_tool = true;
    config.staging_root = root.join("staging");
    config.log_path = root.join("endpoint-agent-install.log");
    config.product.windows_candidates = vec![root.join("Endpoint Agent/endpoint-agent.exe")];
    config.product.windows_extension_dir = root.join("Endpoint Agent/browser-extension");
    config
}

#[derive(Debug, Default)]
struct MachineState {
    installed: Option<String>,
}

/// A Windows host answering the installer's commands.
///
/// The registry holds at most one product entry; `msiexec /i` registers the
/// package version and places the executable, `msiexec /x` removes both
/// unless the machine is sticky.
pub struct FakeMachine {
    state: Mutex<MachineState>,
    executable: PathBuf,
    package_version: String,
    reported_version: Option<String>,
    admin: bool,
    sticky: bool,
    commands: Mutex<Vec<StructuredCommand>>,
}

impl FakeMachine {
    pub fn new(executable: PathBuf, package_version: &str) -> Self {
        Self {
            state: Mutex::new(MachineState::default()),
            executable,
            package_version: package_version.to_string(),
            reported_version: None,
            admin: true,
            sticky: false,
            commands: Mutex::new(Vec::new()),
        }
    }

    pub fn with_installed(self, version: &str) -> Self {
        self.state.lock().unwrap().installed = Some(version.to_string());
        self.place_executable();
        self
    }

    /// Uninstall exits 0 but leaves the registry entry behind.
    pub fn sticky(mut self) -> Self {
        self.sticky = true;
        self
    }

    pub fn not_admin(mut self) -> Self {
        self.admin = false;
        self
    }

    /// The installed executable reports `version` instead of the package version.
    pub fn reporting(mut self, version: &str) -> Self {
        self.reported_version = Some(version.to_string());
        self
    }

    pub fn installed_version(&self) -> Option<String> {
        self.state.lock().unwrap().installed.clone()
    }

    pub fn commands(&self) -> Vec<StructuredCommand> {
        self.commands.lock().unwrap().clone()
    }

    /// `msiexec` verbs in the order they ran.
    pub fn msiexec_verbs(&self) -> Vec<String> {
        self.commands()
            .into_iter()
            .filter(|c| c.program == "msiexec")
            .filter_map(|c| c.args.first().cloned())
            .collect()
    }

    fn place_executable(&self) {
        std::fs::create_dir_all(self.executable.parent().unwrap()).unwrap();
        std::fs::write(&self.executable, b"MZ").unwrap();
    }

    fn answer(&self, command: &StructuredCommand) -> CommandOutput {
        let mut state = self.state.lock().unwrap();
        match command.program.as_str() {
            "net" if self.admin => CommandOutput::ok("There are no entries in the list."),
            "net" => CommandOutput::failed(2, "System error 5 has occurred.\n\nAccess is denied."),
            "powershell" => {
                let script = command.args.last().cloned().unwrap_or_default();
                if script.starts_with("Unblock-File") {
                    return CommandOutput::ok("");
                }
                match &state.installed {
                    Some(version) => CommandOutput::ok(format!("{PRODUCT_CODE}|{version}\r\n")),
                    None => CommandOutput::ok(""),
                }
            }
            "msiexec" => match command.args.first().map(String::as_str) {
                Some("/x") => {
                    if !self.sticky {
                        state.installed = None;
                        let _ = std::fs::remove_file(&self.executable);
                    }
                    CommandOutput::ok("")
                }
                Some("/i") => {
                    state.installed = Some(self.package_version.clone());
                    drop(state);
                    self.place_executable();
                    CommandOutput::ok("")
                }
                _ => CommandOutput::failed(1639, "invalid command line"),
            },
            program if Path::new(program) == self.executable => {
                let version = self
                    .reported_version
                    .clone()
                    .or_else(|| state.installed.clone())
                    .unwrap_or_default();
                CommandOutput::ok(format!("Endpoint Agent {version}\n"))
            }
            other => CommandOutput::failed(9009, format!("'{other}' is not recognized")),
        }
    }
}

#[async_trait]
impl CommandRunner for FakeMachine {
    async fn run(&self, command: &StructuredCommand) -> std::io::Result<CommandOutput> {
        self.commands.lock().unwrap().push(command.clone());
        Ok(self.answer(command))
    }
}

/// Serves fixed bodies, optionally failing the first requests for a URL.
#[derive(Default)]
pub struct FakeServer {
    bodies: HashMap<String, Vec<u8>>,
    failures: Mutex<HashMap<String, u32>>,
    requests: Mutex<Vec<String>>,
}

impl FakeServer {
    pub fn with_body(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.bodies.insert(url.to_string(), body.into());
        self
    }

    pub fn failing(self, url: &str, count: u32) -> Self {
        self.failures.lock().unwrap().insert(url.to_string(), count);
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn serve(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        self.requests.lock().unwrap().push(url.to_string());
        if let Some(remaining) = self.failures.lock().unwrap().get_mut(url) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(TransportError::Status {
                    status: 502,
                    url: url.to_string(),
                });
            }
        }
        self.bodies.get(url).cloned().ok_or(TransportError::Status {
            status: 404,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl Transport for FakeServer {
    async fn get_text(&self, url: &str) -> Result<String, TransportError> {
        Ok(String::from_utf8_lossy(&self.serve(url)?).into_owned())
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64, TransportError> {
        let body = self.serve(url)?;
        std::fs::write(dest, &body)?;
        Ok(body.len() as u64)
    }
}

/// Records requested sleeps and returns immediately.
#[derive(Default)]
pub struct InstantSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl InstantSleeper {
    pub fn recorded(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for InstantSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}
