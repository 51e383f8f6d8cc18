//! btleplug-backed [`Transport`].
//!
//! Scans use a service-filtered [`ScanFilter`] and the adapter's
//! [`CentralEvent`] stream. Advertisements are checked against the
//! requested service again before being reported, since some platforms
//! ignore the filter.
//!
//! btleplug does not push adapter power changes on every platform, so the
//! radio state stream polls [`Central::adapter_state`] and reports changes.

use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, CentralState, CharPropFlags, Characteristic, Manager as _,
    Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use futures::stream;
use tracing::{debug, info};
use uuid::Uuid;

use btcmd_types::{CommandPayload, RadioState, ResponsePayload, name_from_uuid};

use crate::error::{Error, Result};
use crate::transport::{
    CharacteristicHandle, CharacteristicProperties, DiscoveryStream, RadioStateStream,
    ServiceHandle, Transport,
};
use crate::util::create_identifier;

/// Default interval between adapter state polls.
pub const DEFAULT_STATE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Get the first available Bluetooth adapter.
pub async fn get_adapter() -> Result<Adapter> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;

    adapters.into_iter().next().ok_or(Error::NoAdapter)
}

/// Map btleplug's adapter state onto [`RadioState`].
pub fn radio_state_from(state: CentralState) -> RadioState {
    match state {
        CentralState::PoweredOn => RadioState::PoweredOn,
        CentralState::PoweredOff => RadioState::PoweredOff,
        _ => RadioState::Unknown,
    }
}

/// Map btleplug's characteristic flags onto [`CharacteristicProperties`].
pub fn properties_from(flags: CharPropFlags) -> CharacteristicProperties {
    CharacteristicProperties {
        read: flags.contains(CharPropFlags::READ),
        write: flags.contains(CharPropFlags::WRITE),
        write_without_response: flags.contains(CharPropFlags::WRITE_WITHOUT_RESPONSE),
        notify: flags.contains(CharPropFlags::NOTIFY),
    }
}

fn handle_from(characteristic: &Characteristic) -> CharacteristicHandle {
    CharacteristicHandle::new(
        characteristic.uuid,
        characteristic.service_uuid,
        properties_from(characteristic.properties),
    )
}

/// [`Transport`] over the host's Bluetooth adapter.
#[derive(Debug, Clone)]
pub struct BleTransport {
    adapter: Adapter,
    state_poll_interval: Duration,
}

impl BleTransport {
    /// Use the first adapter on this host.
    pub async fn new() -> Result<Self> {
        Ok(Self::from_adapter(get_adapter().await?))
    }

    /// Use a specific adapter.
    pub fn from_adapter(adapter: Adapter) -> Self {
        Self {
            adapter,
            state_poll_interval: DEFAULT_STATE_POLL_INTERVAL,
        }
    }

    /// Set how often the adapter state is polled.
    #[must_use]
    pub fn state_poll_interval(mut self, interval: Duration) -> Self {
        self.state_poll_interval = interval;
        self
    }

    /// The underlying adapter.
    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    fn find_characteristic(
        peripheral: &Peripheral,
        handle: &CharacteristicHandle,
    ) -> Result<Characteristic> {
        peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == handle.uuid && c.service_uuid == handle.service)
            .ok_or_else(|| {
                Error::InvalidData(format!(
                    "characteristic {} not found on service {}",
                    handle.uuid, handle.service
                ))
            })
    }
}

#[async_trait]
impl Transport for BleTransport {
    type Peripheral = Peripheral;

    async fn radio_states(&self) -> Result<RadioStateStream> {
        let adapter = self.adapter.clone();
        let interval = self.state_poll_interval;
        let states = stream::unfold(
            (adapter, None::<RadioState>),
            move |(adapter, last)| async move {
                loop {
                    if last.is_some() {
                        tokio::time::sleep(interval).await;
                    }
                    let state = match adapter.adapter_state().await {
                        Ok(state) => radio_state_from(state),
                        Err(e) => {
                            debug!("adapter_state() failed: {}", e);
                            RadioState::Unknown
                        }
                    };
                    if last != Some(state) {
                        return Some((state, (adapter, Some(state))));
                    }
                }
            },
        );
        Ok(states.boxed())
    }

    #[tracing::instrument(level = "debug", skip_all, fields(service = %service))]
    async fn start_scan(&self, service: Uuid) -> Result<DiscoveryStream<Peripheral>> {
        let events = self.adapter.events().await?;
        self.adapter
            .start_scan(ScanFilter {
                services: vec![service],
            })
            .await?;
        info!("Scanning for service {}", service);

        let adapter = self.adapter.clone();
        let discovered = events.filter_map(move |event| {
            let adapter = adapter.clone();
            async move {
                let id = match event {
                    CentralEvent::DeviceDiscovered(id) => id,
                    CentralEvent::ServicesAdvertisement { id, .. } => id,
                    _ => return None,
                };
                let peripheral = adapter.peripheral(&id).await.ok()?;
                let properties = peripheral.properties().await.ok()??;
                if !properties.services.contains(&service) {
                    return None;
                }
                debug!(
                    "Advertisement from {:?} rssi={:?}",
                    properties.local_name, properties.rssi
                );
                Some(peripheral)
            }
        });
        Ok(discovered.boxed())
    }

    async fn stop_scan(&self) -> Result<()> {
        self.adapter.stop_scan().await?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip_all, fields(peripheral = ?peripheral.id()))]
    async fn connect(&self, peripheral: &Peripheral) -> Result<()> {
        peripheral.connect().await?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip_all, fields(peripheral = ?peripheral.id()))]
    async fn discover_services(
        &self,
        peripheral: &Peripheral,
        services: &[Uuid],
    ) -> Result<Vec<ServiceHandle>> {
        if !peripheral.is_connected().await? {
            return Err(Error::NotConnected);
        }
        peripheral.discover_services().await?;
        let found: Vec<ServiceHandle> = peripheral
            .services()
            .into_iter()
            .filter(|s| services.is_empty() || services.contains(&s.uuid))
            .map(|s| ServiceHandle::new(s.uuid))
            .collect();
        debug!("Found {} matching service(s)", found.len());
        Ok(found)
    }

    async fn discover_characteristics(
        &self,
        peripheral: &Peripheral,
        service: &ServiceHandle,
    ) -> Result<Vec<CharacteristicHandle>> {
        // btleplug resolves characteristics together with services.
        let service = peripheral
            .services()
            .into_iter()
            .find(|s| s.uuid == service.uuid)
            .ok_or_else(|| Error::InvalidData(format!("service {} not discovered", service.uuid)))?;
        Ok(service.characteristics.iter().map(handle_from).collect())
    }

    #[tracing::instrument(level = "debug", skip_all, fields(characteristic = %name_from_uuid(&characteristic.uuid), len = payload.len()))]
    async fn write_value(
        &self,
        peripheral: &Peripheral,
        characteristic: &CharacteristicHandle,
        payload: &CommandPayload,
    ) -> Result<()> {
        let target = Self::find_characteristic(peripheral, characteristic)?;
        peripheral
            .write(&target, payload.as_bytes(), WriteType::WithResponse)
            .await?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip_all, fields(characteristic = %name_from_uuid(&characteristic.uuid)))]
    async fn read_value(
        &self,
        peripheral: &Peripheral,
        characteristic: &CharacteristicHandle,
    ) -> Result<ResponsePayload> {
        let target = Self::find_characteristic(peripheral, characteristic)?;
        let data = peripheral.read(&target).await?;
        Ok(ResponsePayload::from(data))
    }

    #[tracing::instrument(level = "debug", skip_all, fields(peripheral = ?peripheral.id()))]
    async fn disconnect(&self, peripheral: &Peripheral) -> Result<()> {
        if peripheral.is_connected().await? {
            peripheral.disconnect().await?;
        }
        Ok(())
    }

    fn peripheral_label(&self, peripheral: &Peripheral) -> String {
        create_identifier(&peripheral.address().to_string(), &peripheral.id())
    }
}
