use anyhow::Context;
use clap::Parser;
use dialoguer::{Input, Password};
use endpoint_agent_installer::{
    require_value, CommandRunner, HttpClient, InstallError, InstallProgress, InteractionMode,
    Orchestrator, Platform, PrivilegeGate, RunConfig, RunSummary, TokioCommandRunner, TokioSleeper,
    DEFAULT_EXTENSION_POINTER, DEFAULT_RELEASE_INDEX,
};
use std::io::IsTerminal;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Install or upgrade the endpoint agent.
///
/// Must run as Administrator (Windows) or root (macOS).
#[derive(Debug, Parser)]
#[command(name = "endpoint-agent-installer", version, about)]
struct Cli {
    /// Backend host the agent reports to.
    #[arg(long, env = "AGENT_HOST")]
    host: Option<String>,

    /// Authentication token for the backend.
    #[arg(long, env = "AGENT_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Also install the browser extension.
    #[arg(long)]
    install_extension: bool,

    /// Also install the ClamAV antivirus engine.
    #[arg(long)]
    install_antivirus: bool,

    /// Do not install jq.
    #[arg(long = "skip-jq")]
    skip_jq: bool,

    /// Latest-release metadata endpoint.
    #[arg(long, value_name = "URL", default_value = DEFAULT_RELEASE_INDEX)]
    release_index: String,

    /// Pointer file naming the browser extension package.
    #[arg(long, value_name = "URL", default_value = DEFAULT_EXTENSION_POINTER)]
    extension_pointer: String,

    /// Log debug output.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(summary) => {
            print_summary(&summary);
            ExitCode::SUCCESS
        }
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "endpoint_agent_installer=debug"
    } else {
        "endpoint_agent_installer=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<RunSummary> {
    let interaction =
        InteractionMode::from_env(|key| std::env::var(key).ok(), std::io::stdin().is_terminal())?;
    let platform = Platform::current()?;
    tracing::debug!(?interaction, %platform, "environment");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let runner: Arc<dyn CommandRunner> = Arc::new(TokioCommandRunner);

    let needs_prompt = cli.host.is_none() || cli.token.is_none();
    if needs_prompt && interaction.is_interactive() {
        // Elevation is checked before prompting for the token.
        runtime.block_on(PrivilegeGate::new(runner.clone(), platform.os).require())?;
    }

    let host = require_value("backend host", cli.host, interaction, || {
        Input::<String>::new()
            .with_prompt("Backend host")
            .interact_text()
            .map_err(std::io::Error::other)
    })?;
    let token = require_value("authentication token", cli.token, interaction, || {
        Password::new()
            .with_prompt("Authentication token")
            .interact()
            .map_err(std::io::Error::other)
    })?;

    let mut config = RunConfig::new(host.trim(), token.trim(), platform);
    config.install_extension = cli.install_extension;
    config.install_antivirus = cli.install_antivirus;
    config.skip_json_tool = cli.skip_jq;
    config.interaction = interaction;
    config.release_index_url = cli.release_index;
    config.extension_pointer_url = cli.extension_pointer;
    config.invoking_user = std::env::var("SUDO_USER")
        .ok()
        .filter(|user| !user.is_empty() && user != "root");

    let transport = HttpClient::new().context("failed to build HTTP client")?;
    let summary = runtime.block_on(async {
        Orchestrator::new(&config, runner, Arc::new(transport), Arc::new(TokioSleeper))
            .run(print_progress)
            .await
    })?;
    Ok(summary)
}

fn print_progress(progress: InstallProgress) {
    match &progress {
        InstallProgress::Downloading { version }
        | InstallProgress::Installing { version }
        | InstallProgress::Completed { version } => {
            println!("==> {} {}", progress.description(), version)
        }
        InstallProgress::Uninstalling {
            prior_version: Some(prior),
        } => println!("==> {} ({})", progress.description(), prior),
        InstallProgress::ComponentStarted { component } => {
            println!("==> Checking {}", component)
        }
        InstallProgress::ComponentFinished { component, outcome } => {
            println!("==> {}: {}", component, outcome)
        }
        other => println!("==> {}", other.description()),
    }
}

fn print_summary(summary: &RunSummary) {
    match &summary.prior_version {
        Some(prior) => println!(
            "\nEndpoint agent upgraded from {} to {} ({})",
            prior, summary.version, summary.platform
        ),
        None => println!(
            "\nEndpoint agent {} installed ({})",
            summary.version, summary.platform
        ),
    }
    for (component, outcome) in &summary.components {
        println!("  {}: {}", component, outcome);
    }
    println!("Install log: {}", summary.log_path().display());
}

fn report(err: &anyhow::Error) {
    match err.downcast_ref::<InstallError>() {
        Some(install) => {
            eprintln!("\n{} failed: {}", install.stage(), install);
            eprintln!("To fix: {}", install.fix_suggestion());
            if let Some(log) = install.log_path() {
                eprintln!("Install log: {}", log.display());
            }
        }
        None => eprintln!("\nError: {:#}", err),
    }
}
