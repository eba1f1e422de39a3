// Port and lifecycle error types

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Port error code constants
///
/// Single source of truth for the numeric codes reported alongside port and
/// lifecycle failures.
///
/// Error code range: 1101-1103
pub struct PortErrorCodes {}

impl PortErrorCodes {
    /// The requested serial device does not exist or cannot be opened
    pub const CANNOT_OPEN: i32 = 1101;

    /// start() was called before any port was configured
    pub const NOT_CONFIGURED: i32 = 1102;

    /// Mutex guarding the shared listener state was poisoned
    pub const LOCK_POISONED: i32 = 1103;
}

/// Log a port error with structured context
pub fn log_port_error(err: &PortError, context: &str) {
    error!(
        "Port error in {}: code={}, component=SignalListener, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Port and lifecycle errors
///
/// These errors cover serial-port configuration and listener lifecycle
/// operations. All of them are fatal to setup: the listener must not be
/// started while any of them is outstanding.
///
/// Error code range: 1101-1103
#[derive(Debug, Clone, PartialEq)]
pub enum PortError {
    /// The requested serial device does not exist or cannot be opened
    CannotOpen { port: String, reason: String },

    /// start() was called before any port was configured
    NotConfigured,

    /// Mutex guarding the shared listener state was poisoned
    LockPoisoned { component: String },
}

impl ErrorCode for PortError {
    fn code(&self) -> i32 {
        match self {
            PortError::CannotOpen { .. } => PortErrorCodes::CANNOT_OPEN,
            PortError::NotConfigured => PortErrorCodes::NOT_CONFIGURED,
            PortError::LockPoisoned { .. } => PortErrorCodes::LOCK_POISONED,
        }
    }

    fn message(&self) -> String {
        match self {
            PortError::CannotOpen { port, reason } => {
                format!("Cannot open port {}: {}", port, reason)
            }
            PortError::NotConfigured => {
                "No port configured. Call set_port() before start().".to_string()
            }
            PortError::LockPoisoned { component } => {
                format!("Lock poisoned on {}", component)
            }
        }
    }
}

impl fmt::Display for PortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PortError (code {}): {}", self.code(), self.message())
    }
}

impl std::error::Error for PortError {}
