//! gridstream CLI application
//!
//! Runs a local command while draining its output into disk-backed stream
//! caches, follows the streams the way a remote grid client would, and
//! reports the exit status through the completion gate.

use std::process;

use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

use gridstream::cli::{Cli, Commands, handle_run};
use gridstream::config::AppConfig;

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> anyhow::Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize logging based on verbosity
    init_logging(&cli);

    info!("gridstream v{} starting", env!("CARGO_PKG_VERSION"));

    // Load layered configuration
    let config = AppConfig::load(cli.global.config.clone()).await?;

    // Execute the appropriate command
    match cli.command {
        Commands::Run(args) => handle_run(args, config).await,
    }
}

/// Initialize logging based on CLI verbosity settings
fn init_logging(cli: &Cli) {
    let log_level = cli.log_level();

    // Create environment filter
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("gridstream={}", log_level).parse().unwrap());

    // Initialize subscriber
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    }
}
