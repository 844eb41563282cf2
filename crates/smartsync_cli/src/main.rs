//! SmartSync CLI
//!
//! Command-line tools for inspecting a file-backed SmartSync store.
//!
//! # Commands
//!
//! - `syncs` - List persisted sync states
//! - `show` - Print one sync state as JSON
//! - `soups` - List soups with record and dirty counts
//! - `dirty` - List dirty records of a soup with their pending action
//! - `verify` - Decode every persisted sync state

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// SmartSync command-line store tools.
#[derive(Parser)]
#[command(name = "smartsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
    #[arg(global = true, short, long)]
    store: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List persisted sync states
    Syncs {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print one sync state as JSON
    Show {
        /// Sync id
        id: i64,
    },

    /// List soups with record and dirty counts
    Soups,

    /// List dirty records of a soup
    Dirty {
        /// Soup name
        soup: String,

        /// Maximum number of records to list
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Decode every persisted sync state and report invalid ones
    Verify,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Syncs { format } => {
            let path = cli.store.ok_or("Store path required for syncs")?;
            commands::syncs::run(&path, &format)?;
        }
        Commands::Show { id } => {
            let path = cli.store.ok_or("Store path required for show")?;
            commands::show::run(&path, id)?;
        }
        Commands::Soups => {
            let path = cli.store.ok_or("Store path required for soups")?;
            commands::soups::run(&path)?;
        }
        Commands::Dirty { soup, limit } => {
            let path = cli.store.ok_or("Store path required for dirty")?;
            commands::dirty::run(&path, &soup, limit)?;
        }
        Commands::Verify => {
            let path = cli.store.ok_or("Store path required for verify")?;
            commands::verify::run(&path)?;
        }
        Commands::Version => {
            println!("SmartSync CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("REST API {}", smartsync_engine::DEFAULT_API_VERSION);
        }
    }

    Ok(())
}
