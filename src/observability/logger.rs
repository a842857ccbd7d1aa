//! Structured JSON logger
//!
//! - One log line = one event
//! - Deterministic key ordering: `event`, `severity`, then fields sorted by key
//! - TRACE/INFO/WARN go to stdout, ERROR/FATAL to stderr
//! - Synchronous, no buffering
//!
//! Lines below the minimum severity are dropped. The minimum is read once
//! from `FLASHCFG_LOG` (`trace`, `info`, `warn`, `error`, `fatal`, `off`,
//! default `warn`) and can be changed with [`Logger::set_min_severity`].
//! An observer installed with [`Logger::set_observer`] receives every
//! emitted line.

use std::env;
use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, RwLock};

/// Environment variable holding the minimum severity
pub const LOG_ENV_VAR: &str = "FLASHCFG_LOG";

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Debug-level detail
    Trace = 0,
    /// Normal operations
    Info = 1,
    /// Recoverable issues
    Warn = 2,
    /// Operation failures
    Error = 3,
    /// Store can no longer be trusted
    Fatal = 4,
}

impl Severity {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }

    fn from_u8(level: u8) -> Option<Self> {
        match level {
            0 => Some(Severity::Trace),
            1 => Some(Severity::Info),
            2 => Some(Severity::Warn),
            3 => Some(Severity::Error),
            4 => Some(Severity::Fatal),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Receives each emitted line (without the trailing newline).
pub type LogObserver = Arc<dyn Fn(Severity, &str) + Send + Sync>;

const LEVEL_UNSET: u8 = u8::MAX;
const LEVEL_OFF: u8 = 5;

static MIN_LEVEL: AtomicU8 = AtomicU8::new(LEVEL_UNSET);
static OBSERVER: RwLock<Option<LogObserver>> = RwLock::new(None);

/// Parse a `FLASHCFG_LOG` value. `None` disables logging entirely.
fn parse_level(value: &str) -> Option<Option<Severity>> {
    match value.trim().to_ascii_lowercase().as_str() {
        "trace" => Some(Some(Severity::Trace)),
        "info" => Some(Some(Severity::Info)),
        "warn" => Some(Some(Severity::Warn)),
        "error" => Some(Some(Severity::Error)),
        "fatal" => Some(Some(Severity::Fatal)),
        "off" => Some(None),
        _ => None,
    }
}

fn min_level() -> u8 {
    let level = MIN_LEVEL.load(Ordering::Relaxed);
    if level != LEVEL_UNSET {
        return level;
    }
    let from_env = env::var(LOG_ENV_VAR)
        .ok()
        .and_then(|value| parse_level(&value))
        .unwrap_or(Some(Severity::Warn));
    let level = from_env.map_or(LEVEL_OFF, |severity| severity as u8);
    // A concurrent set_min_severity wins over the environment.
    match MIN_LEVEL.compare_exchange(LEVEL_UNSET, level, Ordering::Relaxed, Ordering::Relaxed) {
        Ok(_) => level,
        Err(current) => current,
    }
}

/// A structured logger that outputs JSON logs
pub struct Logger;

impl Logger {
    /// Set the minimum severity. `None` disables logging.
    pub fn set_min_severity(min: Option<Severity>) {
        let level = min.map_or(LEVEL_OFF, |severity| severity as u8);
        MIN_LEVEL.store(level, Ordering::Relaxed);
    }

    /// Current minimum severity, `None` when logging is off.
    pub fn min_severity() -> Option<Severity> {
        Severity::from_u8(min_level())
    }

    /// Whether a line of this severity would be emitted
    pub fn enabled(severity: Severity) -> bool {
        severity as u8 >= min_level()
    }

    /// Install (or with `None` remove) the observer for emitted lines
    pub fn set_observer(observer: Option<LogObserver>) {
        let mut slot = OBSERVER.write().unwrap_or_else(|e| e.into_inner());
        *slot = observer;
    }

    /// Log an event with the given severity and fields
    ///
    /// Fields are output in deterministic order (alphabetical by key)
    pub fn log(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        if !Self::enabled(severity) {
            return;
        }
        let line = Self::format_line(severity, event, fields);

        if severity >= Severity::Error {
            Self::write_line(&line, &mut io::stderr());
        } else {
            Self::write_line(&line, &mut io::stdout());
        }

        let observer = OBSERVER
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(observer) = observer {
            observer(severity, line.trim_end());
        }
    }

    fn write_line<W: Write>(line: &str, writer: &mut W) {
        // Write atomically (one syscall)
        let _ = writer.write_all(line.as_bytes());
        let _ = writer.flush();
    }

    /// Render one JSON line, including the trailing newline
    fn format_line(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
        let mut output = String::with_capacity(256);

        output.push('{');

        output.push_str("\"event\":\"");
        Self::escape_json_string(&mut output, event);
        output.push('"');

        output.push_str(",\"severity\":\"");
        output.push_str(severity.as_str());
        output.push('"');

        let mut sorted_fields: Vec<_> = fields.iter().collect();
        sorted_fields.sort_by_key(|(k, _)| *k);

        for (key, value) in sorted_fields {
            output.push_str(",\"");
            Self::escape_json_string(&mut output, key);
            output.push_str("\":\"");
            Self::escape_json_string(&mut output, value);
            output.push('"');
        }

        output.push('}');
        output.push('\n');
        output
    }

    /// Escape special characters for JSON strings
    fn escape_json_string(output: &mut String, s: &str) {
        for c in s.chars() {
            match c {
                '"' => output.push_str("\\\""),
                '\\' => output.push_str("\\\\"),
                '\n' => output.push_str("\\n"),
                '\r' => output.push_str("\\r"),
                '\t' => output.push_str("\\t"),
                c if c.is_control() => {
                    output.push_str(&format!("\\u{:04x}", c as u32));
                }
                c => output.push(c),
            }
        }
    }

    /// Log at TRACE level
    pub fn trace(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Trace, event, fields);
    }

    /// Log at INFO level
    pub fn info(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Info, event, fields);
    }

    /// Log at WARN level
    pub fn warn(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Warn, event, fields);
    }

    /// Log at ERROR level
    pub fn error(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Error, event, fields);
    }

    /// Log at FATAL level
    pub fn fatal(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Fatal, event, fields);
    }
}

/// Render a log line without emitting it, for tests
#[cfg(test)]
pub fn capture_log(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
    Logger::format_line(severity, event, fields)
}
