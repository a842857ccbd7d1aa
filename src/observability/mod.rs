//! Observability for the configuration store
//!
//! - Structured logging (JSON lines) with a minimum severity and an
//!   injectable observer
//! - Per-store metrics counters
//! - Typed events and begin/complete scopes
//!
//! ```ignore
//! use flashcfg::observability::{Logger, Event, ObservationScope};
//!
//! Logger::warn(Event::StaleRecordsDetected.as_str(), &[("key", "235B/0007")]);
//!
//! let scope = ObservationScope::new("FACTORY_RESET");
//! // ... do work ...
//! scope.complete();
//! ```

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::{Event, FACTORY_RESET_SCOPE, SELF_TEST_SCOPE, STALE_REPAIR_SCOPE};
pub use logger::{LogObserver, Logger, Severity, LOG_ENV_VAR};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use scope::ObservationScope;

/// Log an event at its natural severity: FATAL for fatal events, INFO
/// otherwise
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    let severity = if event.is_fatal() {
        Severity::Fatal
    } else {
        Severity::Info
    };
    Logger::log(severity, event.as_str(), fields);
}
