//! Conversion lifecycle events
//!
//! Events are explicit and typed.

use std::fmt;

use super::logger::Severity;

/// Observable events of one conversion run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    /// Configuration loaded and validated
    ConfigLoaded,
    /// Tree files opened and chained
    InputOpened,

    // Resolution
    /// A field never observed a non-null sample
    UnresolvedField,

    // Output
    SchemaWritten,
    /// Container header written
    ContainerHeaderWritten,
    BlockFlushed,
    ContainerClosed,

    ConversionComplete,
    ConversionFailed,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::InputOpened => "INPUT_OPENED",
            Event::UnresolvedField => "UNRESOLVED_FIELD",
            Event::SchemaWritten => "SCHEMA_WRITTEN",
            Event::ContainerHeaderWritten => "CONTAINER_HEADER_WRITTEN",
            Event::BlockFlushed => "BLOCK_FLUSHED",
            Event::ContainerClosed => "CONTAINER_CLOSED",
            Event::ConversionComplete => "CONVERSION_COMPLETE",
            Event::ConversionFailed => "CONVERSION_FAILED",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::BlockFlushed => Severity::Trace,
            Event::UnresolvedField => Severity::Warn,
            Event::ConversionFailed => Severity::Fatal,
            _ => Severity::Info,
        }
    }

    /// Returns true if this event indicates a fatal condition
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
