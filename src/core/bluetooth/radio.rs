//! The actuation seam between the bridge controller and the platform radio.
//! The controller only ever speaks `RadioLink`; the bluest-backed
//! implementation lives here, and tests substitute a scripted one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use bluest::{Adapter, AdapterEvent, Characteristic, Device, Service};
use futures_util::StreamExt;
use log::{info, warn};
use tokio::sync::mpsc;

use crate::core::bluetooth::connection::LinkOps;
use crate::core::bluetooth::error::RadioError;
use crate::core::bluetooth::event::RadioEvent;
use crate::core::bluetooth::notification::NotificationHandler;
use crate::core::bluetooth::scanner::ScanTask;
use crate::core::bluetooth::types::{CharacteristicRef, ServiceRef, SpeakerId};

pub(crate) type DeviceMap = Arc<Mutex<HashMap<SpeakerId, Device>>>;
pub(crate) type ServiceMap = Arc<Mutex<HashMap<u64, Service>>>;
pub(crate) type CharacteristicMap = Arc<Mutex<HashMap<u64, Characteristic>>>;

/// Radio primitives the controller may request.
///
/// Calls are fire-and-forget from the controller's point of view: every
/// asynchronous outcome (discovery, connection, resolution, values) comes
/// back as a [`RadioEvent`]. An `Err` here means the request itself could
/// not be issued; the controller logs it and moves on.
#[async_trait]
pub trait RadioLink: Send + Sync {
    async fn start_scan(&self) -> Result<()>;
    async fn stop_scan(&self) -> Result<()>;
    async fn connect(&self, id: &SpeakerId) -> Result<()>;
    async fn disconnect(&self, id: &SpeakerId) -> Result<()>;
    async fn enumerate_services(&self, id: &SpeakerId) -> Result<()>;
    async fn enumerate_characteristics(&self, id: &SpeakerId, service: ServiceRef) -> Result<()>;
    async fn subscribe(&self, id: &SpeakerId, characteristic: CharacteristicRef) -> Result<()>;
    async fn write_without_response(
        &self,
        characteristic: CharacteristicRef,
        payload: &[u8],
    ) -> Result<()>;
}

/// Production radio backed by the platform's single BLE central adapter.
pub struct BluestRadio {
    adapter: Adapter,
    events: mpsc::UnboundedSender<RadioEvent>,
    devices: DeviceMap,
    link: LinkOps,
    notifications: NotificationHandler,
    scanner: tokio::sync::Mutex<ScanTask>,
}

impl BluestRadio {
    /// Acquires the system adapter and starts the power-state watcher.
    /// Returns the radio plus the event stream the controller consumes.
    pub async fn init() -> Result<(Arc<Self>, mpsc::UnboundedReceiver<RadioEvent>)> {
        let adapter = Adapter::default()
            .await
            .ok_or_else(|| anyhow!("no bluetooth adapter found"))?;
        let (events, events_rx) = mpsc::unbounded_channel();

        let services: ServiceMap = Arc::new(Mutex::new(HashMap::new()));
        let characteristics: CharacteristicMap = Arc::new(Mutex::new(HashMap::new()));
        let link = LinkOps::new(
            adapter.clone(),
            events.clone(),
            services,
            characteristics,
        );
        let radio = Arc::new(Self {
            adapter: adapter.clone(),
            events: events.clone(),
            devices: Arc::new(Mutex::new(HashMap::new())),
            link,
            notifications: NotificationHandler::new(events.clone()),
            scanner: tokio::sync::Mutex::new(ScanTask::new()),
        });

        radio.spawn_power_watcher();
        Ok((radio, events_rx))
    }

    /// Follows the adapter's availability, which is the platform's power
    /// signal: unavailable means the radio is off.
    fn spawn_power_watcher(&self) {
        let adapter = self.adapter.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            if adapter.wait_available().await.is_ok() {
                info!("bluetooth adapter is available");
                let _ = events.send(RadioEvent::PowerChanged { powered_on: true });
            }
            match adapter.events().await {
                Ok(mut stream) => {
                    while let Some(event) = stream.next().await {
                        let powered_on = matches!(event, Ok(AdapterEvent::Available));
                        let _ = events.send(RadioEvent::PowerChanged { powered_on });
                    }
                }
                Err(e) => warn!("adapter event stream unavailable: {e}"),
            }
            info!("adapter event stream ended");
        });
    }

    fn device_for(&self, id: &SpeakerId) -> Result<Device> {
        let devices = self.devices.lock().unwrap();
        devices
            .get(id)
            .cloned()
            .ok_or_else(|| RadioError::UnknownPeripheral(id.to_string()).into())
    }
}

#[async_trait]
impl RadioLink for BluestRadio {
    async fn start_scan(&self) -> Result<()> {
        self.scanner.lock().await.start(
            self.adapter.clone(),
            self.devices.clone(),
            self.events.clone(),
        );
        Ok(())
    }

    async fn stop_scan(&self) -> Result<()> {
        self.scanner.lock().await.stop().await;
        Ok(())
    }

    async fn connect(&self, id: &SpeakerId) -> Result<()> {
        let device = self.device_for(id)?;
        self.link.connect(id, &device).await;
        Ok(())
    }

    async fn disconnect(&self, id: &SpeakerId) -> Result<()> {
        let device = self.device_for(id)?;
        self.link.disconnect(id, &device).await;
        Ok(())
    }

    async fn enumerate_services(&self, id: &SpeakerId) -> Result<()> {
        let device = self.device_for(id)?;
        self.link.resolve_services(id, &device).await;
        Ok(())
    }

    async fn enumerate_characteristics(&self, id: &SpeakerId, service: ServiceRef) -> Result<()> {
        self.link.resolve_characteristics(id, service).await;
        Ok(())
    }

    async fn subscribe(&self, id: &SpeakerId, characteristic: CharacteristicRef) -> Result<()> {
        let device = self.device_for(id)?;
        let characteristic = self
            .link
            .characteristic(characteristic)
            .ok_or_else(|| anyhow!("unknown characteristic handle"))?;
        self.notifications.subscribe(id.clone(), device, characteristic);
        Ok(())
    }

    async fn write_without_response(
        &self,
        characteristic: CharacteristicRef,
        payload: &[u8],
    ) -> Result<()> {
        let characteristic = self
            .link
            .characteristic(characteristic)
            .ok_or_else(|| anyhow!("unknown characteristic handle"))?;
        characteristic.write_without_response(payload).await?;
        Ok(())
    }
}
