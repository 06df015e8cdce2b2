//! Command-line argument parsing for P1Doks Fetcher
//!
//! This module defines the CLI structure using clap derive macros:
//! the main download flow, authentication management, and car-mapping
//! maintenance commands.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// P1Doks Fetcher - Download iRacing setups from P1Doks
#[derive(Parser, Debug)]
#[command(
    name = "p1doks_fetcher",
    version,
    about = "Download and organize iRacing setup datapacks from P1Doks",
    long_about = "Downloads setup datapacks from a P1Doks subscription and files them \
under your iRacing setups directory, organized by car, track, and race week."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download this week's setups (the main flow)
    Download(DownloadArgs),

    /// Manage the saved P1Doks session
    Auth(AuthArgs),

    /// Maintain the car name to folder mappings
    Mappings(MappingsArgs),
}

/// Arguments for the download command
#[derive(Args, Debug, Clone)]
pub struct DownloadArgs {
    /// Race week to download (1-12), defaults to an interactive choice
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=12))]
    pub week: Option<u32>,

    /// Series name to download, skipping the series menu
    #[arg(short, long)]
    pub series: Option<String>,

    /// Download everything included in the subscription without prompting
    #[arg(short, long)]
    pub yes: bool,

    /// Override the setups directory for this run
    #[arg(long, value_name = "DIR")]
    pub setups_path: Option<PathBuf>,
}

/// Arguments for authentication management
#[derive(Args, Debug)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub action: AuthAction,
}

/// Authentication actions
#[derive(Subcommand, Debug)]
pub enum AuthAction {
    /// Sign in and save the session for future runs
    Login,

    /// Show the saved session state
    Status,

    /// Clear the saved session
    Logout,
}

/// Arguments for mapping maintenance
#[derive(Args, Debug)]
pub struct MappingsArgs {
    #[command(subcommand)]
    pub action: MappingsAction,
}

/// Mapping maintenance actions
#[derive(Subcommand, Debug)]
pub enum MappingsAction {
    /// Scan the current week's catalog and write a refreshed override mapping
    Generate {
        /// Output file for the generated mapping
        #[arg(short, long, value_name = "FILE", default_value = "p1doks-overrides.json")]
        output: PathBuf,
    },

    /// Resolve one car name against the built-in mappings
    Resolve {
        /// Car name as it appears in the P1Doks catalog
        name: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the logging level based on global arguments
    pub fn log_level(&self) -> tracing::Level {
        if self.global.quiet {
            tracing::Level::ERROR
        } else if self.global.very_verbose {
            tracing::Level::DEBUG
        } else if self.global.verbose {
            tracing::Level::INFO
        } else {
            tracing::Level::WARN
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli_with(global: GlobalArgs) -> Cli {
        Cli {
            global,
            command: Commands::Auth(AuthArgs {
                action: AuthAction::Status,
            }),
        }
    }

    #[test]
    fn test_log_level() {
        let quiet = cli_with(GlobalArgs {
            verbose: false,
            very_verbose: false,
            quiet: true,
        });
        let verbose = cli_with(GlobalArgs {
            verbose: true,
            very_verbose: false,
            quiet: false,
        });
        let default = cli_with(GlobalArgs {
            verbose: false,
            very_verbose: false,
            quiet: false,
        });

        assert_eq!(quiet.log_level(), tracing::Level::ERROR);
        assert_eq!(verbose.log_level(), tracing::Level::INFO);
        assert_eq!(default.log_level(), tracing::Level::WARN);
    }

    #[test]
    fn test_download_week_range_is_validated() {
        use clap::Parser;

        let ok = Cli::try_parse_from(["p1doks_fetcher", "download", "--week", "12"]);
        assert!(ok.is_ok());

        let too_high = Cli::try_parse_from(["p1doks_fetcher", "download", "--week", "13"]);
        assert!(too_high.is_err());
    }

    #[test]
    fn test_mappings_generate_default_output() {
        use clap::Parser;

        let cli = Cli::try_parse_from(["p1doks_fetcher", "mappings", "generate"]).unwrap();
        match cli.command {
            Commands::Mappings(MappingsArgs {
                action: MappingsAction::Generate { output },
            }) => assert_eq!(output, PathBuf::from("p1doks-overrides.json")),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
