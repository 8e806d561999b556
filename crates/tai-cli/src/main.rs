//! TAI CLI - token economy simulator
//!
//! Command-line interface for running economy scenarios, building whitelist trees and
//! inspecting configuration.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

/// TAI: oracle-gated unlocks, juror staking and prediction markets
///
/// Every contract runs as an independent actor on a simulated asynchronous ledger;
/// scenarios drive them with the same messages a wallet would send.
#[derive(Parser)]
#[command(name = "tai")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path (JSON)
    #[arg(short, long, global = true, env = "TAI_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario file against a fresh deployment
    Simulate {
        /// Scenario file (JSON)
        #[arg(short, long)]
        scenario: PathBuf,

        /// Output format (json, human)
        #[arg(short, long, default_value = "human")]
        format: String,

        /// Include the per-message delivery log in the report
        #[arg(long)]
        log: bool,
    },

    /// Build a whitelist merkle root and per-entry proofs
    Merkle {
        /// Entries file (JSON array of {"address", "quota"})
        #[arg(short, long)]
        entries: PathBuf,

        /// Output format (json, human)
        #[arg(short, long, default_value = "human")]
        format: String,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// List contract error codes
    Codes,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,

    /// Validate a configuration file
    Validate {
        /// Config file to validate
        #[arg(short, long)]
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let logging = commands::load_config(cli.config.clone())
        .map(|c| c.logging)
        .unwrap_or_default();
    let filter = if cli.verbose {
        "debug".to_string()
    } else {
        logging.level
    };
    if logging.json_output {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    match cli.command {
        Commands::Simulate {
            scenario,
            format,
            log,
        } => commands::simulate::run(scenario, format, log, cli.config),
        Commands::Merkle { entries, format } => commands::merkle::run(entries, format),
        Commands::Config { action } => match action {
            ConfigCommands::Show => commands::config::show(cli.config),
            ConfigCommands::Validate { file } => commands::config::validate(file),
        },
        Commands::Codes => commands::config::codes(),
    }
}
