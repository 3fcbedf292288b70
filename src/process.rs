//! Subprocess invocation.
//!
//! Native installers, uninstallers, version queries and package managers
//! are all described as a [`StructuredCommand`] and executed through a
//! [`CommandRunner`]. Invocations block until the child exits; no timeout is
//! applied, so a hung installer hangs the run.

use async_trait::async_trait;
use std::fmt;
use std::process::Stdio;
use tokio::process::Command;

/// A command for programmatic execution.
///
/// # Example
///
/// ```rust
/// use endpoint_agent_installer::StructuredCommand;
///
/// let cmd = StructuredCommand::new("msiexec")
///     .arg("/x")
///     .arg("{11111111-2222-3333-4444-555555555555}")
///     .arg("/qn");
/// assert_eq!(cmd.program, "msiexec");
/// assert_eq!(cmd.args.len(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredCommand {
    /// The program to execute (e.g., "msiexec", "installer", "powershell").
    pub program: String,

    /// Arguments to pass to the program.
    pub args: Vec<String>,

    /// Environment variables to set before execution (key, value pairs).
    pub env_vars: Vec<(String, String)>,

    /// Pass arguments to the child untouched instead of re-quoting them.
    ///
    /// Only meaningful on Windows, where `msiexec` parses `KEY="value"`
    /// properties itself and breaks on the runtime's default quoting.
    pub verbatim_args: bool,
}

impl StructuredCommand {
    /// Start a command for `program` with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env_vars: Vec::new(),
            verbatim_args: false,
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the child.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// Mark the arguments as pre-quoted.
    pub fn verbatim(mut self) -> Self {
        self.verbatim_args = true;
        self
    }

    /// Render the command line with every occurrence of `secrets` masked.
    pub fn redacted(&self, secrets: &[&str]) -> String {
        let mut line = self.to_string();
        for secret in secrets.iter().filter(|s| !s.is_empty()) {
            line = line.replace(secret, "********");
        }
        line
    }
}

impl fmt::Display for StructuredCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured result of a finished child process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when the child was killed by a signal.
    pub code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// A successful exit with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed exit with the given code and stderr.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Whether the child exited with code zero.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Stdout when non-empty, stderr otherwise.
    ///
    /// Some tools print their version to stderr.
    pub fn primary_text(&self) -> &str {
        if !self.stdout.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        }
    }
}

/// Executes [`StructuredCommand`]s.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command` to completion and capture its output.
    ///
    /// A non-zero exit is not an error here; only failing to spawn is.
    async fn run(&self, command: &StructuredCommand) -> std::io::Result<CommandOutput>;
}

/// [`CommandRunner`] backed by `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioCommandRunner;

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, command: &StructuredCommand) -> std::io::Result<CommandOutput> {
        let mut child = Command::new(&command.program);
        add_args(&mut child, command);
        child
            .envs(command.env_vars.iter().cloned())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = child.output().await?;
        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(windows)]
fn add_args(child: &mut Command, command: &StructuredCommand) {
    if command.verbatim_args {
        for arg in &command.args {
            child.raw_arg(arg);
        }
    } else {
        child.args(&command.args);
    }
}

#[cfg(not(windows))]
fn add_args(child: &mut Command, command: &StructuredCommand) {
    child.args(&command.args);
}
