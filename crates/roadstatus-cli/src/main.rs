mod app;
mod format;
mod logging;
mod style;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{ArgAction, Parser};
use roadstatus_core::{load_api_config, Cancellation, RoadStatusClient};
use tokio_util::sync::CancellationToken;

use crate::format::OutputFormat;
use crate::logging::Verbosity;

/// Exit code for bad arguments or unusable configuration.
const USAGE_EXIT_CODE: u8 = 2;

#[derive(Debug, Parser)]
#[command(name = "roadstatus")]
#[command(version, disable_version_flag = true)]
#[command(about = "Show the current status of major roads from the TfL unified API")]
#[command(styles = style::help_styles())]
struct Cli {
    /// Road identifiers to look up (e.g. A2 A406)
    #[arg(value_name = "ROAD_ID")]
    road_ids: Vec<String>,

    /// Print results as a JSON array
    #[arg(short, long)]
    json: bool,

    /// Enable debug logging on stderr
    #[arg(short = 'V', long)]
    verbose: bool,

    /// Only log errors (overridden by --verbose)
    #[arg(short, long)]
    quiet: bool,

    /// Config file with a `TflApi` section (default: ./appsettings.json)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override the API base URL
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    timeout: Option<u64>,

    /// Print version
    #[arg(long, action = ArgAction::Version)]
    version: Option<bool>,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    if cli.road_ids.is_empty() {
        eprintln!("At least one road ID is required.");
        return ExitCode::from(USAGE_EXIT_CODE);
    }

    let verbosity = Verbosity::resolve(cli.verbose, cli.quiet, |var| std::env::var(var).ok());
    if let Err(e) = logging::init_tracing(verbosity) {
        eprintln!("warning: {e:#}");
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(USAGE_EXIT_CODE)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut config =
        load_api_config(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }
    if let Some(timeout) = cli.timeout {
        config.timeout_secs = timeout;
    }
    tracing::debug!(?config, "configuration loaded");

    let client = RoadStatusClient::new(&config).context("failed to create road status client")?;

    let token = CancellationToken::new();
    let on_interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling");
            on_interrupt.cancel();
        }
    });

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    let outcome = app::run(
        &client,
        &cli.road_ids,
        &Cancellation::with_token(token),
        format,
        &mut std::io::stdout(),
        &mut std::io::stderr(),
    )
    .await
    .context("failed to write results")?;

    Ok(ExitCode::from(outcome.exit_code()))
}
