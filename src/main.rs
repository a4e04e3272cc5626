//! mutuals - LinkedIn mutual connections extractor
//!
//! Main entry point for the CLI application.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};

use mutuals::agent::LlmBrowserAgent;
use mutuals::cli;
use mutuals::core::logging;
use mutuals::environment::ChromeEnvironmentProvider;
use mutuals::llm::GeminiClient;
use mutuals::{BatchOrchestrator, Config};

/// Extract LinkedIn mutual connections for every profile in a spreadsheet
#[derive(Parser, Debug)]
#[command(name = "mutuals")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "Examples:\n  mutuals linkedin_profiles.xlsx\n  mutuals contacts.csv --count 5")]
struct Args {
    /// Spreadsheet (.xlsx or .csv) with a column of LinkedIn profile URLs
    file: PathBuf,

    /// Names to extract per profile
    #[arg(long, short = 'n')]
    count: Option<usize>,

    /// Extra attempts per profile after a failed one
    #[arg(long, short = 'r')]
    retries: Option<u32>,

    /// Seconds allowed for one agent run
    #[arg(long, short = 't')]
    timeout: Option<u64>,

    /// Preferred Chrome remote debugging port
    #[arg(long)]
    port: Option<u16>,

    /// Chrome profile directory holding the LinkedIn login
    #[arg(long)]
    profile_dir: Option<PathBuf>,

    /// Path to the Chrome executable
    #[arg(long)]
    chrome: Option<String>,

    /// Enable debug output on the console
    #[arg(long, short = 'd')]
    debug: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Build configuration
    let mut config = Config::load();

    // Apply CLI overrides
    if let Some(count) = args.count {
        config.batch.target_count = count;
    }
    if let Some(retries) = args.retries {
        config.batch.retry_attempts = retries;
    }
    if let Some(timeout) = args.timeout {
        config.batch.task_timeout_secs = timeout;
    }
    if let Some(port) = args.port {
        config.browser.debugging_port = port;
    }
    if let Some(ref dir) = args.profile_dir {
        config.browser.user_data_dir = dir.clone();
    }
    if let Some(ref chrome) = args.chrome {
        config.browser.chrome_path = chrome.clone();
    }

    let _guard = match logging::init(&config.logging, args.debug) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if !args.file.exists() {
        eprintln!("Error: file not found: {}", args.file.display());
        return ExitCode::FAILURE;
    }

    match run(config, args.file).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Run failed");
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config, file: PathBuf) -> anyhow::Result<ExitCode> {
    let log_file = config.logging.file.clone();
    if let Err(e) = config.validate() {
        cli::print_failure(&e, &log_file);
        return Ok(ExitCode::FAILURE);
    }

    cli::print_banner(&config, &file);
    info!(file = %file.display(), version = env!("CARGO_PKG_VERSION"), "Starting run");

    let llm = Arc::new(GeminiClient::from_config(&config)?);
    let agent = Arc::new(LlmBrowserAgent::new(llm, &config.agent));
    let provider = Arc::new(ChromeEnvironmentProvider::new(config.browser.clone(), agent));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing current cleanup");
            let _ = shutdown_tx.send(true);
        }
    });

    let orchestrator = BatchOrchestrator::new(&config.batch, provider).with_shutdown(shutdown_rx);

    match orchestrator.run(&file).await {
        Ok(report) => {
            cli::print_summary(&report, &log_file);
            if report.is_complete() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
        Err(e) => {
            error!(error = %e, fatal = e.is_batch_fatal(), "Batch aborted");
            cli::print_failure(&e, &log_file);
            Ok(ExitCode::FAILURE)
        }
    }
}
