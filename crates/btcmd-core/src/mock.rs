//! Mock transport for testing.
//!
//! [`MockTransport`] implements [`Transport`] entirely in memory so the
//! session and runner can be exercised without BLE hardware.
//!
//! # Features
//!
//! - **Scripted peripherals**: choose what a scan discovers and when
//! - **Failure injection**: make any [`MockOperation`] fail with a message
//! - **Latency simulation**: delay connects and GATT operations
//! - **Call accounting**: count every transport call for assertions

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use tokio::sync::{Mutex, watch};
use uuid::Uuid;

use btcmd_types::uuids::{COMMAND_CHARACTERISTIC, PROVISIONING_SERVICE, RESPONSE_CHARACTERISTIC};
use btcmd_types::{CommandPayload, RadioState, ResponsePayload};

use crate::error::{Error, Result};
use crate::transport::{
    CharacteristicHandle, CharacteristicProperties, DiscoveryStream, RadioStateStream,
    ServiceHandle, Transport,
};

/// A simulated peripheral.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MockPeripheral {
    /// Stable identifier.
    pub id: String,
    /// Advertised local name.
    pub name: Option<String>,
    /// Service UUID in the advertisement.
    pub advertises: Uuid,
}

impl MockPeripheral {
    /// A peripheral advertising the provisioning service.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            advertises: PROVISIONING_SERVICE,
        }
    }

    /// Set the advertised name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Advertise a different service.
    #[must_use]
    pub fn advertising(mut self, service: Uuid) -> Self {
        self.advertises = service;
        self
    }
}

/// Transport operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    StartScan,
    Connect,
    DiscoverServices,
    DiscoverCharacteristics,
    Write,
    Read,
    Disconnect,
}

#[derive(Debug, Default)]
struct CallCounts {
    start_scan: AtomicU32,
    stop_scan: AtomicU32,
    connect: AtomicU32,
    discover_services: AtomicU32,
    discover_characteristics: AtomicU32,
    write: AtomicU32,
    read: AtomicU32,
    disconnect: AtomicU32,
}

/// In-memory [`Transport`].
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use btcmd_core::{MockTransport, SessionConfig, SessionRunner};
///
/// #[tokio::main]
/// async fn main() {
///     let transport = Arc::new(MockTransport::builder().response(b"OK".to_vec()).build());
///     let config = SessionConfig::default().auto_start_on_ready(false);
///     let handle = SessionRunner::spawn(Arc::clone(&transport), config).unwrap();
///
///     let report = handle.transact().await.unwrap();
///     assert_eq!(report.responses[0].payload.as_bytes(), b"OK");
///     assert_eq!(transport.write_count(), 1);
///     handle.shutdown().await;
/// }
/// ```
pub struct MockTransport {
    radio: watch::Sender<RadioState>,
    peripherals: Vec<MockPeripheral>,
    advertise_delay: Duration,
    services: Vec<Uuid>,
    characteristics: Vec<CharacteristicHandle>,
    responses: Mutex<VecDeque<ResponsePayload>>,
    written: Mutex<Vec<CommandPayload>>,
    failures: HashMap<MockOperation, String>,
    connect_latency: Duration,
    latency: Duration,
    connected: AtomicBool,
    calls: CallCounts,
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("radio", &*self.radio.borrow())
            .field("peripherals", &self.peripherals)
            .field("connected", &self.connected.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// A powered-on radio with one provisioning peripheral.
    pub fn new() -> Self {
        MockTransportBuilder::new().build()
    }

    /// Start building a customised mock.
    pub fn builder() -> MockTransportBuilder {
        MockTransportBuilder::new()
    }

    /// Report a new radio state to every subscriber.
    pub fn set_radio_state(&self, state: RadioState) {
        self.radio.send_replace(state);
    }

    /// Queue a value for the next response read.
    pub async fn push_response(&self, response: impl Into<ResponsePayload>) {
        self.responses.lock().await.push_back(response.into());
    }

    /// Payloads written so far, in order.
    pub async fn written(&self) -> Vec<CommandPayload> {
        self.written.lock().await.clone()
    }

    /// Whether a connection is currently open.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    pub fn start_scan_count(&self) -> u32 {
        self.calls.start_scan.load(Ordering::Relaxed)
    }

    pub fn stop_scan_count(&self) -> u32 {
        self.calls.stop_scan.load(Ordering::Relaxed)
    }

    pub fn connect_count(&self) -> u32 {
        self.calls.connect.load(Ordering::Relaxed)
    }

    pub fn discover_services_count(&self) -> u32 {
        self.calls.discover_services.load(Ordering::Relaxed)
    }

    pub fn discover_characteristics_count(&self) -> u32 {
        self.calls.discover_characteristics.load(Ordering::Relaxed)
    }

    pub fn write_count(&self) -> u32 {
        self.calls.write.load(Ordering::Relaxed)
    }

    pub fn read_count(&self) -> u32 {
        self.calls.read.load(Ordering::Relaxed)
    }

    pub fn disconnect_count(&self) -> u32 {
        self.calls.disconnect.load(Ordering::Relaxed)
    }

    fn check(&self, operation: MockOperation) -> Result<()> {
        match self.failures.get(&operation) {
            Some(message) => Err(Error::Mock(message.clone())),
            None => Ok(()),
        }
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn require_connection(&self) -> Result<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Peripheral = MockPeripheral;

    async fn radio_states(&self) -> Result<RadioStateStream> {
        let mut rx = self.radio.subscribe();
        let initial = *rx.borrow_and_update();
        let changes = stream::unfold(rx, |mut rx| async move {
            rx.changed().await.ok()?;
            let state = *rx.borrow_and_update();
            Some((state, rx))
        });
        Ok(stream::once(async move { initial }).chain(changes).boxed())
    }

    async fn start_scan(&self, service: Uuid) -> Result<DiscoveryStream<MockPeripheral>> {
        self.calls.start_scan.fetch_add(1, Ordering::Relaxed);
        self.check(MockOperation::StartScan)?;

        let delay = self.advertise_delay;
        let matching: Vec<MockPeripheral> = self
            .peripherals
            .iter()
            .filter(|p| p.advertises == service)
            .cloned()
            .collect();
        Ok(stream::iter(matching)
            .then(move |peripheral| async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                peripheral
            })
            .boxed())
    }

    async fn stop_scan(&self) -> Result<()> {
        self.calls.stop_scan.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn connect(&self, _peripheral: &MockPeripheral) -> Result<()> {
        self.calls.connect.fetch_add(1, Ordering::Relaxed);
        if !self.connect_latency.is_zero() {
            tokio::time::sleep(self.connect_latency).await;
        }
        self.check(MockOperation::Connect)?;
        self.connected.store(true, Ordering::Relaxed);
        Ok(())
    }

    async fn discover_services(
        &self,
        _peripheral: &MockPeripheral,
        services: &[Uuid],
    ) -> Result<Vec<ServiceHandle>> {
        self.calls.discover_services.fetch_add(1, Ordering::Relaxed);
        self.simulate_latency().await;
        self.require_connection()?;
        self.check(MockOperation::DiscoverServices)?;
        Ok(self
            .services
            .iter()
            .filter(|uuid| services.is_empty() || services.contains(uuid))
            .map(|uuid| ServiceHandle::new(*uuid))
            .collect())
    }

    async fn discover_characteristics(
        &self,
        _peripheral: &MockPeripheral,
        service: &ServiceHandle,
    ) -> Result<Vec<CharacteristicHandle>> {
        self.calls
            .discover_characteristics
            .fetch_add(1, Ordering::Relaxed);
        self.simulate_latency().await;
        self.require_connection()?;
        self.check(MockOperation::DiscoverCharacteristics)?;
        Ok(self
            .characteristics
            .iter()
            .filter(|c| c.service == service.uuid)
            .cloned()
            .collect())
    }

    async fn write_value(
        &self,
        _peripheral: &MockPeripheral,
        _characteristic: &CharacteristicHandle,
        payload: &CommandPayload,
    ) -> Result<()> {
        self.calls.write.fetch_add(1, Ordering::Relaxed);
        self.simulate_latency().await;
        self.require_connection()?;
        self.check(MockOperation::Write)?;
        self.written.lock().await.push(payload.clone());
        Ok(())
    }

    async fn read_value(
        &self,
        _peripheral: &MockPeripheral,
        _characteristic: &CharacteristicHandle,
    ) -> Result<ResponsePayload> {
        self.calls.read.fetch_add(1, Ordering::Relaxed);
        self.simulate_latency().await;
        self.require_connection()?;
        self.check(MockOperation::Read)?;
        Ok(self.responses.lock().await.pop_front().unwrap_or_default())
    }

    async fn disconnect(&self, _peripheral: &MockPeripheral) -> Result<()> {
        self.calls.disconnect.fetch_add(1, Ordering::Relaxed);
        self.connected.store(false, Ordering::Relaxed);
        self.check(MockOperation::Disconnect)
    }

    fn peripheral_label(&self, peripheral: &MockPeripheral) -> String {
        match &peripheral.name {
            Some(name) => format!("{} ({})", name, peripheral.id),
            None => peripheral.id.clone(),
        }
    }
}

/// Builder for [`MockTransport`].
#[derive(Debug, Clone)]
pub struct MockTransportBuilder {
    radio_state: RadioState,
    peripherals: Vec<MockPeripheral>,
    advertise_delay: Duration,
    services: Vec<Uuid>,
    characteristics: Vec<CharacteristicHandle>,
    responses: VecDeque<ResponsePayload>,
    failures: HashMap<MockOperation, String>,
    connect_latency: Duration,
    latency: Duration,
}

impl Default for MockTransportBuilder {
    fn default() -> Self {
        Self {
            radio_state: RadioState::PoweredOn,
            peripherals: vec![MockPeripheral::new("MOCK-0001").with_name("Provisioner")],
            advertise_delay: Duration::ZERO,
            services: vec![PROVISIONING_SERVICE],
            characteristics: vec![
                CharacteristicHandle::new(
                    COMMAND_CHARACTERISTIC,
                    PROVISIONING_SERVICE,
                    CharacteristicProperties::WRITE,
                ),
                CharacteristicHandle::new(
                    RESPONSE_CHARACTERISTIC,
                    PROVISIONING_SERVICE,
                    CharacteristicProperties::READ,
                ),
            ],
            responses: VecDeque::new(),
            failures: HashMap::new(),
            connect_latency: Duration::ZERO,
            latency: Duration::ZERO,
        }
    }
}

impl MockTransportBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Initial radio state.
    #[must_use]
    pub fn radio_state(mut self, state: RadioState) -> Self {
        self.radio_state = state;
        self
    }

    /// Replace the peripherals a scan can discover.
    #[must_use]
    pub fn peripherals(mut self, peripherals: Vec<MockPeripheral>) -> Self {
        self.peripherals = peripherals;
        self
    }

    /// Add a discoverable peripheral.
    #[must_use]
    pub fn peripheral(mut self, peripheral: MockPeripheral) -> Self {
        self.peripherals.push(peripheral);
        self
    }

    /// Delay before each advertisement is reported.
    #[must_use]
    pub fn advertise_delay(mut self, delay: Duration) -> Self {
        self.advertise_delay = delay;
        self
    }

    /// Services present on the peripheral.
    #[must_use]
    pub fn services(mut self, services: Vec<Uuid>) -> Self {
        self.services = services;
        self
    }

    /// Characteristics present on the peripheral.
    #[must_use]
    pub fn characteristics(mut self, characteristics: Vec<CharacteristicHandle>) -> Self {
        self.characteristics = characteristics;
        self
    }

    /// Queue a response value; reads consume them in order.
    #[must_use]
    pub fn response(mut self, response: impl Into<ResponsePayload>) -> Self {
        self.responses.push_back(response.into());
        self
    }

    /// Make `operation` fail with `message`.
    #[must_use]
    pub fn fail(mut self, operation: MockOperation, message: impl Into<String>) -> Self {
        self.failures.insert(operation, message.into());
        self
    }

    /// Delay every connect.
    #[must_use]
    pub fn connect_latency(mut self, latency: Duration) -> Self {
        self.connect_latency = latency;
        self
    }

    /// Delay every discovery, write and read.
    #[must_use]
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Build the transport.
    #[must_use]
    pub fn build(self) -> MockTransport {
        let (radio, _) = watch::channel(self.radio_state);
        MockTransport {
            radio,
            peripherals: self.peripherals,
            advertise_delay: self.advertise_delay,
            services: self.services,
            characteristics: self.characteristics,
            responses: Mutex::new(self.responses),
            written: Mutex::new(Vec::new()),
            failures: self.failures,
            connect_latency: self.connect_latency,
            latency: self.latency,
            connected: AtomicBool::new(false),
            calls: CallCounts::default(),
        }
    }
}
