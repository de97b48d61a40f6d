//! Connection handling and GATT enumeration for the bluest backend.
//! Connect, disconnect, and the service/characteristic walks all report
//! their outcomes as radio events; nothing here returns results across the
//! controller boundary.

use std::sync::atomic::{AtomicU64, Ordering};

use bluest::{Adapter, ConnectionEvent, Device};
use futures_util::StreamExt;
use log::{info, warn};
use tokio::sync::mpsc;

use crate::core::bluetooth::error::RadioError;
use crate::core::bluetooth::event::RadioEvent;
use crate::core::bluetooth::radio::{CharacteristicMap, ServiceMap};
use crate::core::bluetooth::types::{CharacteristicRef, ServiceRef, SpeakerId};

pub(crate) struct LinkOps {
    adapter: Adapter,
    events: mpsc::UnboundedSender<RadioEvent>,
    services: ServiceMap,
    characteristics: CharacteristicMap,
    next_handle: AtomicU64,
}

impl LinkOps {
    pub fn new(
        adapter: Adapter,
        events: mpsc::UnboundedSender<RadioEvent>,
        services: ServiceMap,
        characteristics: CharacteristicMap,
    ) -> Self {
        Self {
            adapter,
            events,
            services,
            characteristics,
            next_handle: AtomicU64::new(1),
        }
    }

    /// Requests a platform-level connection. The outcome arrives as a
    /// `Connected` or `ConnectFailed` event; no timeout is imposed here.
    pub async fn connect(&self, id: &SpeakerId, device: &Device) {
        if device.is_connected().await {
            info!("peripheral {id} already connected");
            let _ = self.events.send(RadioEvent::Connected { id: id.clone() });
            return;
        }

        info!("initiating connection to {id}");
        match self.adapter.connect_device(device).await {
            Ok(()) => {
                self.watch_link(id.clone(), device.clone());
                let _ = self.events.send(RadioEvent::Connected { id: id.clone() });
            }
            Err(e) => {
                warn!("failed to connect to {id}: {e}");
                let _ = self.events.send(RadioEvent::ConnectFailed {
                    id: id.clone(),
                    reason: RadioError::Link(e.to_string()),
                });
            }
        }
    }

    /// Tears down the link. A peripheral that is already gone makes this a
    /// no-op.
    pub async fn disconnect(&self, id: &SpeakerId, device: &Device) {
        if !device.is_connected().await {
            info!("peripheral {id} not connected");
            return;
        }

        match self.adapter.disconnect_device(device).await {
            Ok(()) => {
                info!("disconnected from {id}");
                let _ = self.events.send(RadioEvent::Disconnected {
                    id: id.clone(),
                    reason: None,
                });
            }
            Err(e) => warn!("failed to disconnect from {id}: {e}"),
        }
    }

    /// Enumerates all services, unfiltered. An error or an empty peripheral
    /// produces no event; the binding upstream simply stays unbound.
    pub async fn resolve_services(&self, id: &SpeakerId, device: &Device) {
        let services = match device.services().await {
            Ok(services) => services,
            Err(e) => {
                warn!("service discovery failed for {id}: {e}");
                return;
            }
        };

        let mut resolved = Vec::with_capacity(services.len());
        for service in services {
            let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
            let uuid = service.uuid();
            self.services.lock().unwrap().insert(handle, service);
            resolved.push(ServiceRef { handle, uuid });
        }
        info!("resolved {} services on {id}", resolved.len());
        let _ = self.events.send(RadioEvent::ServicesResolved {
            id: id.clone(),
            services: resolved,
        });
    }

    /// Enumerates the characteristics of one resolved service, unfiltered.
    pub async fn resolve_characteristics(&self, id: &SpeakerId, service_ref: ServiceRef) {
        let service = {
            let services = self.services.lock().unwrap();
            services.get(&service_ref.handle).cloned()
        };
        let Some(service) = service else {
            warn!("characteristic discovery for unknown service handle {}", service_ref.handle);
            return;
        };

        let characteristics = match service.characteristics().await {
            Ok(characteristics) => characteristics,
            Err(e) => {
                warn!(
                    "characteristic discovery failed for service {}: {e}",
                    service_ref.uuid
                );
                return;
            }
        };

        let mut resolved = Vec::with_capacity(characteristics.len());
        for characteristic in characteristics {
            let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
            let uuid = characteristic.uuid();
            self.characteristics
                .lock()
                .unwrap()
                .insert(handle, characteristic);
            resolved.push(CharacteristicRef { handle, uuid });
        }
        info!(
            "resolved {} characteristics under service {} on {id}",
            resolved.len(),
            service_ref.uuid
        );
        let _ = self.events.send(RadioEvent::CharacteristicsResolved {
            id: id.clone(),
            characteristics: resolved,
        });
    }

    /// Watches the platform connection events for the device and surfaces
    /// link loss. Fires for requested disconnects too; the controller
    /// ignores events for peripherals it no longer tracks.
    fn watch_link(&self, id: SpeakerId, device: Device) {
        let adapter = self.adapter.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let mut stream = match adapter.device_connection_events(&device).await {
                Ok(stream) => stream,
                Err(e) => {
                    warn!("link watcher unavailable for {id}: {e}");
                    return;
                }
            };
            while let Some(event) = stream.next().await {
                if matches!(event, ConnectionEvent::Disconnected) {
                    info!("peripheral {id} link lost");
                    let _ = events.send(RadioEvent::Disconnected {
                        id: id.clone(),
                        reason: Some(RadioError::Link("connection lost".into())),
                    });
                    break;
                }
            }
        });
    }

    pub fn characteristic(&self, characteristic: CharacteristicRef) -> Option<bluest::Characteristic> {
        let characteristics = self.characteristics.lock().unwrap();
        characteristics.get(&characteristic.handle).cloned()
    }
}
