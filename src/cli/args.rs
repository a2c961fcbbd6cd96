//! CLI argument definitions using clap
//!
//! Commands:
//! - nightsweep init --config <path>
//! - nightsweep check --config <path>
//! - nightsweep rehearse --config <path> [--notify]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// nightsweep - maintenance orchestrator for multi-user versioned geodatabases
#[derive(Parser, Debug)]
#[command(name = "nightsweep")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write a starter configuration file
    Init {
        /// Path to configuration file
        #[arg(long, default_value = "./nightsweep.json")]
        config: PathBuf,
    },

    /// Load and validate a configuration file
    Check {
        /// Path to configuration file
        #[arg(long, default_value = "./nightsweep.json")]
        config: PathBuf,
    },

    /// Run the maintenance sequence against the built-in simulation backend
    Rehearse {
        /// Path to configuration file
        #[arg(long, default_value = "./nightsweep.json")]
        config: PathBuf,

        /// Send the end-of-run notification over the configured relay
        /// instead of printing it
        #[arg(long)]
        notify: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
