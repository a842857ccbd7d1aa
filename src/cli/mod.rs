//! CLI module for flashcfg
//!
//! Provides command-line interface for:
//! - self-test: run the store self-test against the in-memory library
//! - keys: list the well-known configuration keys
//! - check-config: validate a configuration file

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{check_config, keys, run, run_command, self_test};
pub use errors::{CliError, CliErrorCode, CliResult};
