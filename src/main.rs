//! tokendeploy CLI entrypoint.
//!
//! This is the main entrypoint for the tokendeploy command-line tool.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use token_deployer::chain::ChainBackend;
use token_deployer::cli::{Cli, Commands, OutputFormatter};
use token_deployer::config::{
    ConfigParser, ConfigValidator, DeploymentConfig, NetworkConfig, find_config_file,
};
use token_deployer::error::Result;
use token_deployer::orchestrator::{Orchestrator, RunOutcome};
use token_deployer::planner::ActionRequest;
use token_deployer::record::LocalRecordStore;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    let formatter = OutputFormatter::new(cli.output);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(&cli, &formatter)) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{}", formatter.format_error(&e));
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
///
/// Diagnostics go to stderr so that stdout carries only command output.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Main async entry point. Returns whether the command succeeded.
async fn run(cli: &Cli, formatter: &OutputFormatter) -> Result<bool> {
    let Some(request) = cli.command.action_request()? else {
        let show_warnings = matches!(cli.command, Commands::Validate { warnings: true });
        return cmd_validate(cli, show_warnings, formatter);
    };

    cmd_deploy(cli, request, formatter).await
}

/// Validate configuration.
fn cmd_validate(cli: &Cli, show_warnings: bool, formatter: &OutputFormatter) -> Result<bool> {
    let config_file = resolve_config_path(cli.config.as_ref())?;
    info!("Validating configuration: {}", config_file.display());

    let parser = parser_for(&config_file);
    parser.load_dotenv()?;

    let config = parser.load_file(&config_file)?;
    let result = ConfigValidator::new().collect(&config);

    println!("{}", formatter.format_validation(&result, show_warnings));
    Ok(result.is_valid())
}

/// Run one deployment action.
async fn cmd_deploy(cli: &Cli, request: ActionRequest, formatter: &OutputFormatter) -> Result<bool> {
    let (config, network) = load_config(cli)?;

    let deployments_dir = cli
        .deployments_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.execution.deployments_dir));
    let store = LocalRecordStore::new(deployments_dir);

    let backend = ChainBackend::connect(&network, config.execution.request_timeout_secs)?;

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let mut orchestrator = Orchestrator::new(&config, &cli.network, &network, &store)
        .with_dry_run(cli.dry_run)
        .with_cancellation(cancel);
    if let Some(dir) = &cli.credentials_dir {
        orchestrator = orchestrator.with_credentials_dir(dir);
    }

    let outcome = orchestrator.run(request, backend.clients()).await?;

    println!("{}", formatter.format_outcome(&outcome));

    if let RunOutcome::Executed(report) = &outcome
        && let Some(failure) = report.failure()
    {
        eprintln!("{}", formatter.format_error(&failure));
    }

    Ok(outcome.is_success())
}

/// Loads, overrides and validates the configuration, and selects the network.
fn load_config(cli: &Cli) -> Result<(DeploymentConfig, NetworkConfig)> {
    let config_file = resolve_config_path(cli.config.as_ref())?;
    debug!("Using configuration: {}", config_file.display());

    let parser = parser_for(&config_file);
    parser.load_dotenv()?;

    let (config, network) = parser.load_with_env(&config_file, &cli.network)?;

    let result = ConfigValidator::new().validate(&config)?;
    for warning in &result.warnings {
        warn!("{warning}");
    }

    Ok((config, network))
}

/// Creates a parser rooted at the configuration file's directory.
fn parser_for(config_file: &Path) -> ConfigParser {
    ConfigParser::new().with_base_path(config_file.parent().unwrap_or_else(|| Path::new(".")))
}

/// Resolves the configuration file path.
fn resolve_config_path(config_path: Option<&PathBuf>) -> Result<PathBuf> {
    if let Some(path) = config_path {
        return Ok(path.clone());
    }

    let current_dir = std::env::current_dir()?;
    find_config_file(current_dir)
}

/// Cancels the run on Ctrl-C. The current step finishes first.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping before the next step");
            cancel.cancel();
        }
    });
}
