//! scoutsync CLI
//!
//! Keeps directory groups and users in line with the Scoutnet registry.
//!
//! # Commands
//!
//! - `sync-lists` - Sync registry mailing lists to directory groups
//! - `check-users` - Compare registry members with directory users

mod auth;
mod commands;
mod config;
mod http;

use clap::{Parser, Subcommand};
use commands::sync_lists::SyncListsOptions;
use config::{AppConfig, DEFAULT_CONFIG_FILE};
use http::ReqwestClient;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Timeout for every remote request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Scoutnet to directory synchronization.
#[derive(Parser)]
#[command(name = "scoutsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(global = true, short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Log decisions (info level)
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Log everything (debug level)
    #[arg(global = true, long)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync registry mailing lists to directory groups
    SyncLists {
        /// Fetch at most this many lists
        #[arg(short, long)]
        limit: Option<usize>,

        /// Write the fetched lists to this file as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Fetch and build only, do not touch the directory
        #[arg(long)]
        skip_directory: bool,

        /// Dry run - log what would be changed
        #[arg(short = 'n', long)]
        dry_run: bool,
    },

    /// Compare registry members with directory users
    CheckUsers,
}

fn filter(verbose: bool, debug: bool) -> EnvFilter {
    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        "warn"
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(filter(cli.verbose, cli.debug))
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::load(&cli.config)?;
    let client = ReqwestClient::new(REQUEST_TIMEOUT)?;

    match cli.command {
        Commands::SyncLists {
            limit,
            output,
            skip_directory,
            dry_run,
        } => {
            let options = SyncListsOptions {
                limit,
                output: output.as_deref(),
                skip_directory,
                dry_run,
            };
            commands::sync_lists::run(&config, client, &options)?;
        }
        Commands::CheckUsers => {
            commands::check_users::run(&config, client)?;
        }
    }

    Ok(())
}
