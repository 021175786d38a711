//! Error types for discovery, resolution and emission
//!
//! Error codes:
//! - WALK_UNSUPPORTED_TYPE (FATAL)
//! - WALK_ELEMENT_TYPE_MISMATCH (FATAL)
//! - WALK_UNRESOLVED_FIELD (DEGRADED)
//! - WALK_INVALID_ARGUMENT (FATAL)
//! - WALK_IO_FAILURE (FATAL)

use std::fmt;
use std::io;

/// Severity levels for walker errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Output is still produced, with a placeholder in place of the field
    Degraded,
    /// The run must stop
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Degraded => write!(f, "DEGRADED"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Walker error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkErrorCode {
    /// Type string is malformed or names nothing the dictionary knows
    UnsupportedType,
    /// A dynamic array element does not match the asserted record type
    ElementTypeMismatch,
    /// Input ran out before a nullable field saw a non-null sample
    UnresolvedField,
    /// Bad argument or configuration at the boundary
    InvalidArgument,
    /// Input cannot be read or output cannot be written
    IoFailure,
}

impl WalkErrorCode {
    /// Returns the stable string code
    pub fn code(&self) -> &'static str {
        match self {
            WalkErrorCode::UnsupportedType => "WALK_UNSUPPORTED_TYPE",
            WalkErrorCode::ElementTypeMismatch => "WALK_ELEMENT_TYPE_MISMATCH",
            WalkErrorCode::UnresolvedField => "WALK_UNRESOLVED_FIELD",
            WalkErrorCode::InvalidArgument => "WALK_INVALID_ARGUMENT",
            WalkErrorCode::IoFailure => "WALK_IO_FAILURE",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            WalkErrorCode::UnresolvedField => Severity::Degraded,
            _ => Severity::Fatal,
        }
    }
}

impl fmt::Display for WalkErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Walker error with context
#[derive(Debug)]
pub struct WalkError {
    /// Error code
    code: WalkErrorCode,
    /// Human-readable message
    message: String,
    /// Optional details (field name, address, ...)
    details: Option<String>,
    /// Underlying IO error if applicable
    source: Option<io::Error>,
}

impl WalkError {
    fn new(code: WalkErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    /// Type string that cannot be turned into a walker
    pub fn unsupported_type(type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        Self::new(
            WalkErrorCode::UnsupportedType,
            format!("Type '{}' not handled", type_name),
        )
    }

    /// Dynamic array element of the wrong runtime class
    pub fn element_type_mismatch(
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::new(
            WalkErrorCode::ElementTypeMismatch,
            format!(
                "Element of type '{}' where '{}' was asserted",
                actual.into(),
                expected.into()
            ),
        )
        .with_details(format!("field: {}", field.into()))
    }

    /// Field that never saw a non-null sample
    pub fn unresolved_field(field: impl Into<String>) -> Self {
        Self::new(
            WalkErrorCode::UnresolvedField,
            "No non-null sample observed; emitted as null",
        )
        .with_details(format!("field: {}", field.into()))
    }

    /// Invalid argument or configuration value
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(WalkErrorCode::InvalidArgument, message)
    }

    /// Input or output failure without an underlying IO error
    pub fn io_failure(message: impl Into<String>) -> Self {
        Self::new(WalkErrorCode::IoFailure, message)
    }

    /// Input or output failure caused by an IO error
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code: WalkErrorCode::IoFailure,
            message: message.into(),
            details: None,
            source: Some(source),
        }
    }

    /// Attach details to the error
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Returns the error code
    pub fn code(&self) -> WalkErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns additional error details
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Returns whether this error must stop the run
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for WalkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        if let Some(ref source) = self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for WalkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<io::Error> for WalkError {
    fn from(e: io::Error) -> Self {
        WalkError::io("Output write failed", e)
    }
}

/// Result type for walker operations
pub type WalkResult<T> = Result<T, WalkError>;
