//! Error types for OfflineChat
//!
//! Transport command failures never change the session state; they are
//! logged, counted and left for the caller to retry.

use thiserror::Error;

// ----------------------------------------------------------------------------
// Transport Errors
// ----------------------------------------------------------------------------

/// Platform reason code attached to a failed transport command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// Internal radio error
    Internal,
    /// Peer-to-peer is not supported on this device
    Unsupported,
    /// The framework is busy and cannot service the request
    Busy,
    /// Service discovery was requested with no service requests added
    NoServiceRequests,
    /// A code this crate does not know about
    Unknown(i32),
}

impl FailureReason {
    /// Map a platform reason code
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => FailureReason::Internal,
            1 => FailureReason::Unsupported,
            2 => FailureReason::Busy,
            3 => FailureReason::NoServiceRequests,
            other => FailureReason::Unknown(other),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            FailureReason::Internal => 0,
            FailureReason::Unsupported => 1,
            FailureReason::Busy => 2,
            FailureReason::NoServiceRequests => 3,
            FailureReason::Unknown(code) => *code,
        }
    }
}

impl core::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            FailureReason::Unknown(code) => write!(f, "unknown ({code})"),
            known => write!(f, "{known:?} ({})", known.code()),
        }
    }
}

/// Outcome of a failed transport command
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Operation not supported by transport: {operation}")]
    UnsupportedOperation { operation: &'static str },

    #[error("Transport command {operation} failed: {reason}")]
    Failure {
        operation: &'static str,
        reason: FailureReason,
    },
}

impl TransportError {
    pub fn unsupported(operation: &'static str) -> Self {
        TransportError::UnsupportedOperation { operation }
    }

    pub fn failure(operation: &'static str, code: i32) -> Self {
        TransportError::Failure {
            operation,
            reason: FailureReason::from_code(code),
        }
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, TransportError::UnsupportedOperation { .. })
    }
}

// ----------------------------------------------------------------------------
// Configuration Errors
// ----------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("Invalid configuration: {reason}")]
    Invalid { reason: String },
}

// ----------------------------------------------------------------------------
// Session Errors
// ----------------------------------------------------------------------------

/// Errors surfaced to callers of the session API
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session channel closed")]
    ChannelClosed,

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_reason_codes() {
        assert_eq!(FailureReason::from_code(2), FailureReason::Busy);
        assert_eq!(FailureReason::from_code(7), FailureReason::Unknown(7));
        assert_eq!(FailureReason::Busy.code(), 2);
        assert_eq!(FailureReason::Unknown(7).code(), 7);
    }

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::failure("start_discovery", 2);
        assert_eq!(
            err.to_string(),
            "Transport command start_discovery failed: Busy (2)"
        );
        assert!(!err.is_unsupported());
        assert!(TransportError::unsupported("rename_local_device").is_unsupported());
    }
}
