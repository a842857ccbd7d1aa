//! CLI command implementations
//!
//! Every command writes to the given writer so it can be driven from
//! tests; [`run`] wires them to stdout.

use std::io::{self, Write};
use std::path::Path;

use serde_json::json;

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::write_response;
use crate::config::StoreConfig;
use crate::key::well_known;
use crate::store::ConfigStore;

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command, &mut io::stdout())
}

/// Run the appropriate command based on CLI args
pub fn run_command<W: Write>(cmd: Command, out: &mut W) -> CliResult<()> {
    match cmd {
        Command::SelfTest { config, metrics } => self_test(config.as_deref(), metrics, out),
        Command::Keys => keys(out),
        Command::CheckConfig { config } => check_config(&config, out),
    }
}

fn load_config(path: Option<&Path>) -> CliResult<StoreConfig> {
    match path {
        Some(path) => Ok(StoreConfig::load(path)?),
        None => Ok(StoreConfig::default()),
    }
}

/// Run the store self-test on a fresh in-memory flash library
///
/// Prints one line per step followed by PASS or FAIL. A failing run is an
/// error so the process exits non-zero.
pub fn self_test<W: Write>(config: Option<&Path>, metrics: bool, out: &mut W) -> CliResult<()> {
    let config = load_config(config)?;
    let store = ConfigStore::in_memory(config)?;
    store.init()?;

    let report = store.self_test();
    writeln!(out, "{}", report)?;

    if metrics {
        let snapshot: serde_json::Value = serde_json::from_str(&store.metrics_json())?;
        write_response(out, json!({ "metrics": snapshot }))?;
    }

    match report.first_failure() {
        None => Ok(()),
        Some(step) => Err(CliError::self_test_failed(step.name)),
    }
}

/// List the well-known keys as JSON
pub fn keys<W: Write>(out: &mut W) -> CliResult<()> {
    let keys: Vec<serde_json::Value> = well_known::all()
        .iter()
        .map(|(name, key)| {
            json!({
                "name": name,
                "key": format!("0x{:08X}", key.raw()),
                "namespace": key.namespace().map(|ns| ns.as_str()),
                "file_id": key.file_id(),
                "record_key": key.record_key(),
            })
        })
        .collect();
    write_response(out, json!({ "keys": keys }))
}

/// Validate a configuration file and print the effective configuration
pub fn check_config<W: Write>(config: &Path, out: &mut W) -> CliResult<()> {
    let config = StoreConfig::load(config)?;
    write_response(out, serde_json::to_value(&config)?)
}

#[cfg(test)]
mod tests {
    use super::super::errors::CliErrorCode;
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(temp_dir: &TempDir, body: serde_json::Value) -> std::path::PathBuf {
        let config_path = temp_dir.path().join("flashcfg.json");
        fs::write(&config_path, body.to_string()).unwrap();
        config_path
    }

    #[test]
    fn test_self_test_passes_with_defaults() {
        let mut out = Vec::new();
        self_test(None, false, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.trim_end().ends_with("PASS"));
    }

    #[test]
    fn test_self_test_prints_metrics() {
        let mut out = Vec::new();
        self_test(None, true, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let json_line = text.lines().last().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(json_line).unwrap();
        assert_eq!(parsed["status"], "ok");
        assert!(parsed["data"]["metrics"]["writes"].as_u64().unwrap() >= 2);
    }

    #[test]
    fn test_self_test_with_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = write_config(
            &temp_dir,
            json!({ "flash": { "queue_depth": 1, "completion_delay_us": 100 } }),
        );
        let mut out = Vec::new();
        self_test(Some(config_path.as_path()), false, &mut out).unwrap();
    }

    #[test]
    fn test_invalid_config_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = write_config(&temp_dir, json!({ "op_timeout_ms": 0 }));
        let err = check_config(&config_path, &mut Vec::new()).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::ConfigError);
    }

    #[test]
    fn test_missing_config_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("absent.json");
        let err = self_test(Some(missing.as_path()), false, &mut Vec::new()).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::ConfigError);
    }

    #[test]
    fn test_keys_lists_well_known_keys() {
        let mut out = Vec::new();
        keys(&mut out).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&out).unwrap();
        let keys = parsed["data"]["keys"].as_array().unwrap();
        assert_eq!(keys.len(), well_known::all().len());
        assert_eq!(keys[0]["name"], "serial_num");
        assert_eq!(keys[0]["key"], "0x235A0001");
        assert_eq!(keys[0]["namespace"], "provisioning");
    }

    #[test]
    fn test_check_config_prints_effective_values() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = write_config(&temp_dir, json!({ "out_of_space_retries": 3 }));
        let mut out = Vec::new();
        check_config(&config_path, &mut out).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed["data"]["out_of_space_retries"], 3);
        assert_eq!(parsed["data"]["max_value_len"], 1024);
    }
}
