//! Session configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use btcmd_types::{CommandPayload, ServiceDescriptor};

use crate::error::{Error, Result};

/// Default scan window before a transaction gives up.
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(5);
/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
/// Default service/characteristic discovery timeout.
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);
/// Default write timeout.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);
/// Default read timeout.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for a command session.
///
/// The scan window, payload and descriptor shape the transaction itself.
/// The per-operation timeouts bound how long the runner waits for each
/// transport call before reporting it as failed.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use btcmd_core::SessionConfig;
/// use btcmd_types::CommandPayload;
///
/// let config = SessionConfig::default()
///     .scan_timeout(Duration::from_secs(10))
///     .payload(CommandPayload::from_text("status"))
///     .auto_start_on_ready(false);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// How long to scan before giving up.
    pub scan_timeout: Duration,
    /// Timeout for establishing the connection.
    pub connect_timeout: Duration,
    /// Timeout for each service or characteristic discovery.
    pub discovery_timeout: Duration,
    /// Timeout for the acknowledged command write.
    pub write_timeout: Duration,
    /// Timeout for each response read.
    pub read_timeout: Duration,
    /// Start one transaction when the radio first reports powered on.
    pub auto_start_on_ready: bool,
    /// Bytes written to the command characteristic.
    pub payload: CommandPayload,
    /// Service and characteristic UUIDs.
    pub descriptor: ServiceDescriptor,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            auto_start_on_ready: true,
            payload: CommandPayload::default(),
            descriptor: ServiceDescriptor::PROVISIONING,
        }
    }
}

impl SessionConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the scan window.
    #[must_use]
    pub fn scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    /// Set the connect timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the discovery timeout.
    #[must_use]
    pub fn discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    /// Set the write timeout.
    #[must_use]
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the read timeout.
    #[must_use]
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Enable or disable the automatic first transaction.
    #[must_use]
    pub fn auto_start_on_ready(mut self, enabled: bool) -> Self {
        self.auto_start_on_ready = enabled;
        self
    }

    /// Set the command payload.
    #[must_use]
    pub fn payload(mut self, payload: CommandPayload) -> Self {
        self.payload = payload;
        self
    }

    /// Target a different service/characteristic set.
    #[must_use]
    pub fn descriptor(mut self, descriptor: ServiceDescriptor) -> Self {
        self.descriptor = descriptor;
        self
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - any timeout is zero
    /// - the payload is empty
    /// - the command and response characteristics share a UUID
    pub fn validate(&self) -> Result<()> {
        let timeouts = [
            ("scan_timeout", self.scan_timeout),
            ("connect_timeout", self.connect_timeout),
            ("discovery_timeout", self.discovery_timeout),
            ("write_timeout", self.write_timeout),
            ("read_timeout", self.read_timeout),
        ];
        for (name, timeout) in timeouts {
            if timeout.is_zero() {
                return Err(Error::invalid_config(format!("{name} must be > 0")));
            }
        }
        if self.payload.is_empty() {
            return Err(Error::invalid_config("payload must not be empty"));
        }
        if self.descriptor.command == self.descriptor.response {
            return Err(Error::invalid_config(
                "command and response characteristics must differ",
            ));
        }
        Ok(())
    }
}
