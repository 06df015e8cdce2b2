//! P1Doks Fetcher CLI application
//!
//! Command-line interface for downloading iRacing setup datapacks from
//! P1Doks. Handles session persistence across runs and files every setup
//! under the right car/track/week folder.

use std::process;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use p1doks_fetcher::cli::{handle_auth, handle_download, handle_mappings, Cli, Commands};
use p1doks_fetcher::errors::Result;

#[tokio::main]
async fn main() {
    let result = run().await;

    // Single exit point for every error path
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();
    init_logging(&cli);

    info!("P1Doks Fetcher v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Download(args) => {
            info!("Executing download command");
            handle_download(args).await
        }
        Commands::Auth(args) => {
            info!("Executing auth command");
            handle_auth(args).await
        }
        Commands::Mappings(args) => {
            info!("Executing mappings command");
            handle_mappings(args).await
        }
    }
}

/// Initialize logging based on CLI verbosity settings
fn init_logging(cli: &Cli) {
    let log_level = cli.log_level();

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("p1doks_fetcher={}", log_level).parse().unwrap());

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(cli.global.very_verbose)
        .init();

    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    }
}
