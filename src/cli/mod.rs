//! Command-line interface components
//!
//! CLI-specific code for the P1Doks Fetcher application: argument
//! parsing, interactive prompts, and the command handlers that tie the
//! core modules together.

pub mod args;
pub mod commands;
pub mod prompts;

pub use args::{
    AuthAction, AuthArgs, Cli, Commands, DownloadArgs, GlobalArgs, MappingsAction, MappingsArgs,
};
pub use commands::{handle_auth, handle_download, handle_mappings};
