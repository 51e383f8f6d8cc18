//! Transport adapter abstraction.
//!
//! The session never talks to a Bluetooth stack directly. It drives an
//! implementation of [`Transport`], which is either the btleplug-backed
//! [`BleTransport`](crate::ble::BleTransport) or the scripted
//! [`MockTransport`](crate::mock::MockTransport) used in tests.
//!
//! Every operation is asynchronous. The runner awaits them off the session
//! task and feeds their completions back to the session one at a time.

use std::fmt::Debug;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use btcmd_types::{CommandPayload, RadioState, ResponsePayload};

use crate::error::Result;

/// A discovered GATT service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceHandle {
    /// Service UUID.
    pub uuid: Uuid,
}

impl ServiceHandle {
    /// Create a handle for the given service UUID.
    pub fn new(uuid: Uuid) -> Self {
        Self { uuid }
    }
}

/// Operations a characteristic supports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CharacteristicProperties {
    /// Supports reads.
    pub read: bool,
    /// Supports acknowledged writes.
    pub write: bool,
    /// Supports unacknowledged writes.
    pub write_without_response: bool,
    /// Supports notifications.
    pub notify: bool,
}

impl CharacteristicProperties {
    /// Read-only characteristic.
    pub const READ: Self = Self {
        read: true,
        write: false,
        write_without_response: false,
        notify: false,
    };

    /// Write-only characteristic.
    pub const WRITE: Self = Self {
        read: false,
        write: true,
        write_without_response: false,
        notify: false,
    };
}

/// A discovered GATT characteristic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CharacteristicHandle {
    /// Characteristic UUID.
    pub uuid: Uuid,
    /// UUID of the service that owns it.
    pub service: Uuid,
    /// Supported operations.
    pub properties: CharacteristicProperties,
}

impl CharacteristicHandle {
    /// Create a handle with explicit properties.
    pub fn new(uuid: Uuid, service: Uuid, properties: CharacteristicProperties) -> Self {
        Self {
            uuid,
            service,
            properties,
        }
    }
}

/// Stream of radio state changes.
pub type RadioStateStream = BoxStream<'static, RadioState>;

/// Stream of peripherals discovered by a scan.
pub type DiscoveryStream<P> = BoxStream<'static, P>;

/// Radio/transport adapter driven by the session.
///
/// Implementations wrap a platform's central role. The session relies on
/// the following contract:
///
/// - [`stop_scan`](Transport::stop_scan) and [`disconnect`](Transport::disconnect)
///   are idempotent and safe to call at any time.
/// - [`write_value`](Transport::write_value) returns only after the
///   peripheral acknowledged the write.
/// - The stream returned by [`start_scan`](Transport::start_scan) yields
///   only peripherals advertising the requested service; it may yield none,
///   one or many.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Opaque handle to a remote peripheral.
    type Peripheral: Clone + Debug + Send + Sync + 'static;

    /// Observe radio state changes.
    ///
    /// The stream should start with the current state when it is known.
    async fn radio_states(&self) -> Result<RadioStateStream>;

    /// Start a passive scan filtered to `service`.
    async fn start_scan(&self, service: Uuid) -> Result<DiscoveryStream<Self::Peripheral>>;

    /// Stop scanning.
    async fn stop_scan(&self) -> Result<()>;

    /// Connect to a peripheral.
    async fn connect(&self, peripheral: &Self::Peripheral) -> Result<()>;

    /// Discover the given services on a connected peripheral.
    async fn discover_services(
        &self,
        peripheral: &Self::Peripheral,
        services: &[Uuid],
    ) -> Result<Vec<ServiceHandle>>;

    /// Discover the characteristics of one service.
    async fn discover_characteristics(
        &self,
        peripheral: &Self::Peripheral,
        service: &ServiceHandle,
    ) -> Result<Vec<CharacteristicHandle>>;

    /// Write with acknowledgement.
    async fn write_value(
        &self,
        peripheral: &Self::Peripheral,
        characteristic: &CharacteristicHandle,
        payload: &CommandPayload,
    ) -> Result<()>;

    /// Read a characteristic value.
    async fn read_value(
        &self,
        peripheral: &Self::Peripheral,
        characteristic: &CharacteristicHandle,
    ) -> Result<ResponsePayload>;

    /// Disconnect from a peripheral (best effort).
    async fn disconnect(&self, peripheral: &Self::Peripheral) -> Result<()>;

    /// Human-readable label for logs.
    fn peripheral_label(&self, peripheral: &Self::Peripheral) -> String {
        format!("{:?}", peripheral)
    }
}
