// Configuration error types

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Configuration error code constants
///
/// Error code range: 1201-1203
pub struct ConfigErrorCodes {}

impl ConfigErrorCodes {
    /// A bound code is not representable as a sensor channel identifier
    pub const INVALID_CODE: i32 = 1201;

    /// Tolerance outside (0, 0.5] or not finite
    pub const INVALID_TOLERANCE: i32 = 1202;

    /// The same note name was bound twice
    pub const DUPLICATE_NAME: i32 = 1203;
}

/// Log a configuration error with structured context
pub fn log_config_error(err: &ConfigError, context: &str) {
    error!(
        "Config error in {}: code={}, component=NoteResolver, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Configuration errors
///
/// Surfaced at configuration time, before start(). Configuration failures
/// are fail-fast: startup must not proceed past them.
///
/// Error code range: 1201-1203
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A bound code is not representable as a sensor channel identifier
    /// (must be a finite integral value)
    InvalidCode { name: String, code: f64 },

    /// Tolerance outside (0, 0.5] or not finite
    InvalidTolerance { value: f64 },

    /// The same note name was bound twice
    DuplicateName { name: String },
}

impl ErrorCode for ConfigError {
    fn code(&self) -> i32 {
        match self {
            ConfigError::InvalidCode { .. } => ConfigErrorCodes::INVALID_CODE,
            ConfigError::InvalidTolerance { .. } => ConfigErrorCodes::INVALID_TOLERANCE,
            ConfigError::DuplicateName { .. } => ConfigErrorCodes::DUPLICATE_NAME,
        }
    }

    fn message(&self) -> String {
        match self {
            ConfigError::InvalidCode { name, code } => {
                format!(
                    "Binding {} has invalid code {} (must be a finite integral value)",
                    name, code
                )
            }
            ConfigError::InvalidTolerance { value } => {
                format!("Tolerance {} out of range (0, 0.5]", value)
            }
            ConfigError::DuplicateName { name } => {
                format!("Note name {} bound more than once", name)
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConfigError (code {}): {}", self.code(), self.message())
    }
}

impl std::error::Error for ConfigError {}
