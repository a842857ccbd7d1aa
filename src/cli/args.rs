//! CLI argument definitions using clap
//!
//! Commands:
//! - flashcfg self-test [--config <path>] [--metrics]
//! - flashcfg keys
//! - flashcfg check-config --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// flashcfg - persistent key/value configuration over a flash record library
#[derive(Parser, Debug)]
#[command(name = "flashcfg")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the store self-test against the in-memory flash library
    SelfTest {
        /// Path to configuration file (defaults apply when omitted)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print store metrics after the run
        #[arg(long)]
        metrics: bool,
    },

    /// List the well-known configuration keys
    Keys,

    /// Validate a configuration file and print the effective configuration
    CheckConfig {
        /// Path to configuration file
        #[arg(long)]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
