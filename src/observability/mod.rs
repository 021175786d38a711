//! Observability for conversion runs
//!
//! - Structured logging (JSON lines on stderr)
//! - Lifecycle events
//! - Scope-based begin/complete tracing (discovery, resolution)
//!
//! Observability never writes to stdout and never changes what is converted.

mod events;
mod logger;
mod scope;

pub use events::Event;
pub use logger::{escape_json_string, Logger, Severity};
pub use scope::ObservationScope;

/// Log a lifecycle event
pub fn log_event(event: Event) {
    log_event_with_fields(event, &[]);
}

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}
