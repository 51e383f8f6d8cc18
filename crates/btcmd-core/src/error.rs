//! Error types for btcmd-core.
//!
//! Two layers of errors exist:
//!
//! - [`Error`] is what a [`Transport`](crate::Transport) operation returns:
//!   a Bluetooth stack failure, a missing adapter, a timeout.
//! - [`TransactionError`] is the outcome of one command transaction. Every
//!   transport failure is folded into exactly one of its variants by the
//!   session, according to the phase in which it happened.
//!
//! # Transaction Failure Semantics
//!
//! | Variant | Raised when | Peripheral released |
//! |---------|-------------|---------------------|
//! | [`TransactionError::ScanTimeout`] | No discovery within the scan window | n/a |
//! | [`TransactionError::ScanFailed`] | The scan could not be started | n/a |
//! | [`TransactionError::ConnectFailed`] | Connect failed or timed out | yes |
//! | [`TransactionError::ServiceDiscoveryFailed`] | Service discovery failed or found nothing | yes |
//! | [`TransactionError::CharacteristicDiscoveryFailed`] | Characteristic discovery failed or no command characteristic | yes |
//! | [`TransactionError::WriteFailed`] | The acknowledged write failed | yes |
//! | [`TransactionError::ReadFailed`] | A response read failed | yes |
//! | [`TransactionError::RadioUnavailable`] | The radio is off, unsupported or unauthorized | yes |
//! | [`TransactionError::Busy`] | Another transaction is in flight | not started |
//! | [`TransactionError::Shutdown`] | The runner stopped before finishing | best effort |
//!
//! None of these are retried automatically. A failed transaction always
//! returns the session to idle, so a fresh `send_command` is accepted.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use btcmd_types::RadioState;

/// Errors raised by transport operations.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Bluetooth Low Energy error.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// No Bluetooth adapter is available on this host.
    #[error("No Bluetooth adapter available")]
    NoAdapter,

    /// Operation attempted while not connected to the peripheral.
    #[error("Not connected to peripheral")]
    NotConnected,

    /// Operation timed out.
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout duration.
        duration: Duration,
    },

    /// The peripheral reported something the session cannot use.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failure injected by the mock transport.
    #[error("Mock failure: {0}")]
    Mock(String),
}

impl Error {
    /// Create a timeout error with operation context.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}

/// Result type alias using btcmd-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a command transaction did not complete.
///
/// `Clone` and serializable so outcomes can be broadcast as events and
/// rendered as JSON by front ends.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[non_exhaustive]
pub enum TransactionError {
    /// No peripheral advertising the service was found in time.
    #[error("No peripheral found within {timeout:?}")]
    ScanTimeout {
        /// The scan window.
        timeout: Duration,
    },

    /// The scan could not be started.
    #[error("Scan failed: {reason}")]
    ScanFailed {
        /// Transport error text.
        reason: String,
    },

    /// Connecting to the discovered peripheral failed.
    #[error("Connect failed: {reason}")]
    ConnectFailed {
        /// Transport error text.
        reason: String,
    },

    /// Service discovery failed or returned no services.
    #[error("Service discovery failed: {reason}")]
    ServiceDiscoveryFailed {
        /// Transport error text.
        reason: String,
    },

    /// Characteristic discovery failed or the command characteristic is missing.
    #[error("Characteristic discovery failed: {reason}")]
    CharacteristicDiscoveryFailed {
        /// Transport error text.
        reason: String,
    },

    /// The acknowledged command write failed.
    #[error("Write to {characteristic} failed: {reason}")]
    WriteFailed {
        /// Characteristic label.
        characteristic: String,
        /// Transport error text.
        reason: String,
    },

    /// Reading a response failed.
    #[error("Read from {characteristic} failed: {reason}")]
    ReadFailed {
        /// Characteristic label.
        characteristic: String,
        /// Transport error text.
        reason: String,
    },

    /// The radio is not powered on.
    #[error("Bluetooth radio unavailable ({state})")]
    RadioUnavailable {
        /// Last reported radio state.
        state: RadioState,
    },

    /// A transaction was already in flight; the command was dropped.
    #[error("Session busy, command ignored")]
    Busy,

    /// The session runner stopped.
    #[error("Session runner shut down")]
    Shutdown,
}

impl TransactionError {
    /// Short machine-friendly name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ScanTimeout { .. } => "scan_timeout",
            Self::ScanFailed { .. } => "scan_failed",
            Self::ConnectFailed { .. } => "connect_failed",
            Self::ServiceDiscoveryFailed { .. } => "service_discovery_failed",
            Self::CharacteristicDiscoveryFailed { .. } => "characteristic_discovery_failed",
            Self::WriteFailed { .. } => "write_failed",
            Self::ReadFailed { .. } => "read_failed",
            Self::RadioUnavailable { .. } => "radio_unavailable",
            Self::Busy => "busy",
            Self::Shutdown => "shutdown",
        }
    }

    /// Whether a fresh attempt could reasonably succeed without user action.
    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            Self::RadioUnavailable { .. } | Self::CharacteristicDiscoveryFailed { .. } | Self::Shutdown
        )
    }
}
