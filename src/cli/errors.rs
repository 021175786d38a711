//! CLI-specific error types
//!
//! Every CLI error ends the process with exit status 1.

use std::fmt;
use std::io;

use crate::entry::FixtureError;
use crate::errors::{WalkError, WalkErrorCode};

/// CLI error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Bad flag combination or configuration
    ConfigError,
    /// Tree files cannot be opened or parsed
    InputError,
    /// Discovery, resolution or emission failed
    ConversionFailed,
    /// stdout cannot be written
    IoError,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "T2A_CLI_CONFIG_ERROR",
            Self::InputError => "T2A_CLI_INPUT_ERROR",
            Self::ConversionFailed => "T2A_CLI_CONVERSION_FAILED",
            Self::IoError => "T2A_CLI_IO_ERROR",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    pub fn input_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::InputError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    /// Get the error code
    pub fn code(&self) -> CliErrorCode {
        self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<WalkError> for CliError {
    fn from(e: WalkError) -> Self {
        let code = match e.code() {
            WalkErrorCode::InvalidArgument => CliErrorCode::ConfigError,
            _ => CliErrorCode::ConversionFailed,
        };
        Self::new(code, e.to_string())
    }
}

impl From<FixtureError> for CliError {
    fn from(e: FixtureError) -> Self {
        Self::input_error(e.to_string())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walk_errors_keep_their_code_in_message() {
        let err = CliError::from(WalkError::invalid_argument("start (5) must be less than end (5)"));
        assert_eq!(err.code(), CliErrorCode::ConfigError);
        assert!(err.to_string().starts_with("T2A_CLI_CONFIG_ERROR"));
        assert!(err.message().contains("WALK_INVALID_ARGUMENT"));

        let err = CliError::from(WalkError::unsupported_type("Mystery"));
        assert_eq!(err.code(), CliErrorCode::ConversionFailed);
    }

    #[test]
    fn test_fixture_errors_are_input_errors() {
        let err = CliError::from(FixtureError::NoInput);
        assert_eq!(err.code_str(), "T2A_CLI_INPUT_ERROR");
    }
}
