//! Test doubles for the subprocess, HTTP, sleep and platform seams.

use crate::install::{InstallRequest, InstallationTarget, PlatformInstaller, PriorInstall};
use crate::{
    CommandOutput, CommandRunner, InstallError, Os, Sleeper, StructuredCommand, Transport,
    TransportError,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

type Handler = Box<dyn Fn(&StructuredCommand) -> CommandOutput + Send + Sync>;

/// Answers every command through a closure and records what ran.
pub(crate) struct ScriptedRunner {
    handler: Handler,
    calls: Mutex<Vec<StructuredCommand>>,
}

impl ScriptedRunner {
    pub(crate) fn new<F>(handler: F) -> Self
    where
        F: Fn(&StructuredCommand) -> CommandOutput + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> Vec<StructuredCommand> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn programs(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.program).collect()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, command: &StructuredCommand) -> std::io::Result<CommandOutput> {
        self.calls.lock().unwrap().push(command.clone());
        Ok((self.handler)(command))
    }
}

/// Records requested sleeps without waiting.
#[derive(Default)]
pub(crate) struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub(crate) fn recorded(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}

/// Serves fixed bodies from memory.
#[derive(Default)]
pub(crate) struct MemoryTransport {
    bodies: HashMap<String, Vec<u8>>,
    failures: Mutex<HashMap<String, u32>>,
    requests: Mutex<Vec<String>>,
}

impl MemoryTransport {
    pub(crate) fn with_body(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.bodies.insert(url.to_string(), body.into());
        self
    }

    /// Answer the first `count` requests for `url` with HTTP 503.
    pub(crate) fn failing(self, url: &str, count: u32) -> Self {
        self.failures.lock().unwrap().insert(url.to_string(), count);
        self
    }

    pub(crate) fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn body(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        self.requests.lock().unwrap().push(url.to_string());
        if let Some(remaining) = self.failures.lock().unwrap().get_mut(url) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(TransportError::Status {
                    status: 503,
                    url: url.to_string(),
                });
            }
        }
        self.bodies
            .get(url)
            .cloned()
            .ok_or_else(|| TransportError::Status {
                status: 404,
                url: url.to_string(),
            })
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn get_text(&self, url: &str) -> Result<String, TransportError> {
        let body = self.body(url)?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64, TransportError> {
        let body = self.body(url)?;
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(dest, &body)?;
        Ok(body.len() as u64)
    }
}

/// In-memory [`PlatformInstaller`] recording the operations it was asked for.
pub(crate) struct FakePlatform {
    installed: Mutex<Option<PriorInstall>>,
    uninstall_removes: bool,
    install_exit: Option<i32>,
    on_install: Box<dyn Fn() + Send + Sync>,
    events: Mutex<Vec<&'static str>>,
}

impl FakePlatform {
    pub(crate) fn fresh() -> Self {
        Self {
            installed: Mutex::new(None),
            uninstall_removes: true,
            install_exit: None,
            on_install: Box::new(|| {}),
            events: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_prior(self, version: &str) -> Self {
        *self.installed.lock().unwrap() = Some(PriorInstall {
            identifier: "{PRODUCT}".to_string(),
            version: Some(version.to_string()),
            location: None,
        });
        self
    }

    /// Uninstall reports success but leaves the product registered.
    pub(crate) fn sticky(mut self) -> Self {
        self.uninstall_removes = false;
        self
    }

    pub(crate) fn failing_install(mut self, code: i32) -> Self {
        self.install_exit = Some(code);
        self
    }

    pub(crate) fn on_install<F: Fn() + Send + Sync + 'static>(mut self, hook: F) -> Self {
        self.on_install = Box::new(hook);
        self
    }

    pub(crate) fn events(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlatformInstaller for FakePlatform {
    fn os(&self) -> Os {
        Os::Windows
    }

    async fn detect(&self, _: &InstallationTarget) -> Result<Option<PriorInstall>, InstallError> {
        self.events.lock().unwrap().push("detect");
        Ok(self.installed.lock().unwrap().clone())
    }

    async fn uninstall(&self, _: &InstallationTarget, _: &PriorInstall) -> Result<(), InstallError> {
        self.events.lock().unwrap().push("uninstall");
        if self.uninstall_removes {
            *self.installed.lock().unwrap() = None;
        }
        Ok(())
    }

    async fn install(&self, request: &InstallRequest<'_>) -> Result<(), InstallError> {
        self.events.lock().unwrap().push("install");
        if let Some(code) = self.install_exit {
            return Err(InstallError::Install {
                message: format!("installer exited with {code}"),
                exit_code: Some(code),
                log_path: request.log_path.to_path_buf(),
                fix: "inspect the log".to_string(),
            });
        }
        (self.on_install)();
        Ok(())
    }

    async fn clear_download_mark(&self, _: &Path) -> Result<(), InstallError> {
        self.events.lock().unwrap().push("clear_mark");
        Ok(())
    }
}
