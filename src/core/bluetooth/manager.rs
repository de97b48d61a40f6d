//! The bridge controller: single owner of all radio state.
//! One task serializes every caller request and every radio callback, then
//! publishes an immutable snapshot after each observable change. Nothing in
//! here returns an error to the caller; failures are logged and reflected
//! in the snapshot.

use std::sync::Arc;

use chrono::Local;
use log::{debug, error, info, warn};
use tokio::sync::{mpsc, watch};

use crate::config::BridgeConfig;
use crate::core::bluetooth::commands::{CommandChannel, SpeakerCommand};
use crate::core::bluetooth::discovery::DiscoveryEngine;
use crate::core::bluetooth::event::{ControlRequest, RadioEvent};
use crate::core::bluetooth::radio::RadioLink;
use crate::core::bluetooth::registry::SpeakerRegistry;
use crate::core::bluetooth::session::ConnectionSession;
use crate::core::bluetooth::types::{BridgeSnapshot, ReceivedValue, SpeakerId};

/// Caller-facing handle to the bridge controller.
///
/// All methods are fire-and-forget and non-blocking; outcomes are observed
/// through the snapshot channel. Handles are cheap to clone.
#[derive(Clone)]
pub struct BridgeHandle {
    requests: mpsc::UnboundedSender<ControlRequest>,
    snapshot: watch::Receiver<BridgeSnapshot>,
}

impl BridgeHandle {
    pub fn start_scanning(&self) {
        self.request(ControlRequest::StartScanning);
    }

    pub fn stop_scanning(&self) {
        self.request(ControlRequest::StopScanning);
    }

    pub fn clear_discovered(&self) {
        self.request(ControlRequest::ClearDiscovered);
    }

    pub fn connect_to_device(&self, id: SpeakerId) {
        self.request(ControlRequest::Connect { id });
    }

    pub fn disconnect_to_device(&self) {
        self.request(ControlRequest::Disconnect);
    }

    pub fn set_volume(&self, level: u8) {
        self.request(ControlRequest::SetVolume { level });
    }

    pub fn shutdown(&self) {
        self.request(ControlRequest::Shutdown);
    }

    /// The current published state.
    pub fn snapshot(&self) -> BridgeSnapshot {
        self.snapshot.borrow().clone()
    }

    /// A receiver that observes every published state change.
    pub fn subscribe(&self) -> watch::Receiver<BridgeSnapshot> {
        self.snapshot.clone()
    }

    fn request(&self, request: ControlRequest) {
        // The controller may already be gone; callers observe outcomes
        // through the snapshot, never through errors.
        let _ = self.requests.send(request);
    }
}

/// Owns the registry, the session, and the radio; runs as a single task.
pub struct BridgeController {
    radio: Arc<dyn RadioLink>,
    config: BridgeConfig,
    registry: SpeakerRegistry,
    session: ConnectionSession,
    discovery: DiscoveryEngine,
    commands: CommandChannel,
    powered_on: bool,
    scanning: bool,
    last_received: Option<ReceivedValue>,
    requests: mpsc::UnboundedReceiver<ControlRequest>,
    events: mpsc::UnboundedReceiver<RadioEvent>,
    publisher: watch::Sender<BridgeSnapshot>,
}

impl BridgeController {
    /// Spawns the controller task over a radio and its event stream, and
    /// returns the caller-facing handle.
    pub fn spawn(
        radio: Arc<dyn RadioLink>,
        events: mpsc::UnboundedReceiver<RadioEvent>,
        config: BridgeConfig,
    ) -> BridgeHandle {
        let (requests_tx, requests_rx) = mpsc::unbounded_channel();
        let (publisher, snapshot) = watch::channel(BridgeSnapshot::default());

        let discovery = DiscoveryEngine::new(
            radio.clone(),
            config.input_char_uuid,
            config.output_char_uuid,
        );
        let commands = CommandChannel::new(radio.clone());
        let controller = Self {
            radio,
            config,
            registry: SpeakerRegistry::new(),
            session: ConnectionSession::new(),
            discovery,
            commands,
            powered_on: false,
            scanning: false,
            last_received: None,
            requests: requests_rx,
            events,
            publisher,
        };
        tokio::spawn(controller.run());

        BridgeHandle {
            requests: requests_tx,
            snapshot,
        }
    }

    async fn run(mut self) {
        info!("bridge controller started");
        loop {
            tokio::select! {
                request = self.requests.recv() => match request {
                    Some(request) => {
                        if self.handle_request(request).await {
                            break;
                        }
                    }
                    None => break,
                },
                event = self.events.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => break,
                },
            }
        }
        info!("bridge controller stopped");
    }

    /// Returns true when the caller asked the controller to stop.
    async fn handle_request(&mut self, request: ControlRequest) -> bool {
        match request {
            ControlRequest::StartScanning => self.start_scanning().await,
            ControlRequest::StopScanning => self.stop_scanning().await,
            ControlRequest::ClearDiscovered => {
                self.registry.clear();
                self.publish();
            }
            ControlRequest::Connect { id } => self.connect(id).await,
            ControlRequest::Disconnect => self.disconnect().await,
            ControlRequest::SetVolume { level } => {
                self.commands
                    .send(&self.session, SpeakerCommand::SetVolume(level))
                    .await;
                // The dropped counter may have moved.
                self.publish();
            }
            ControlRequest::Shutdown => return true,
        }
        false
    }

    async fn handle_event(&mut self, event: RadioEvent) {
        match event {
            RadioEvent::PowerChanged { powered_on } => self.power_changed(powered_on),
            RadioEvent::Discovered {
                id,
                name,
                address,
                rssi,
            } => self.discovered(id, name, address, rssi).await,
            RadioEvent::Connected { id } => self.peripheral_connected(id).await,
            RadioEvent::ConnectFailed { id, reason } => {
                warn!("connection to {id} failed: {reason}");
                if self.session.clear_if(&id) {
                    self.publish();
                }
            }
            RadioEvent::Disconnected { id, reason } => {
                match &reason {
                    Some(reason) => warn!("peripheral {id} disconnected: {reason}"),
                    None => info!("peripheral {id} disconnected"),
                }
                if self.session.clear_if(&id) {
                    self.publish();
                }
            }
            RadioEvent::ServicesResolved { id, services } => {
                if self.session.connected() == Some(&id) {
                    self.discovery.services_resolved(&id, &services).await;
                }
            }
            RadioEvent::CharacteristicsResolved {
                id,
                characteristics,
            } => {
                if self.session.connected() == Some(&id) {
                    self.discovery
                        .characteristics_resolved(&id, &characteristics, self.session.binding_mut())
                        .await;
                }
            }
            RadioEvent::ValueReceived { id, payload } => self.value_received(id, payload),
        }
    }

    async fn start_scanning(&mut self) {
        if !self.powered_on {
            warn!("scan requested while radio is powered off; ignoring");
            return;
        }
        if self.scanning {
            debug!("already scanning");
            return;
        }
        if let Err(e) = self.radio.start_scan().await {
            error!("failed to start scanning: {e}");
            return;
        }
        self.scanning = true;
        self.publish();
    }

    async fn stop_scanning(&mut self) {
        // Idempotent: stopping an idle radio changes nothing.
        if let Err(e) = self.radio.stop_scan().await {
            error!("failed to stop scanning: {e}");
        }
        if self.scanning {
            self.scanning = false;
            self.publish();
        }
    }

    async fn connect(&mut self, id: SpeakerId) {
        if !self.powered_on {
            warn!("connect requested while radio is powered off; ignoring");
            return;
        }
        if self.registry.get(&id).is_none() {
            warn!("connect requested for unknown peripheral {id}; ignoring");
            return;
        }

        // One live link at a time: release the previous target before
        // dialing the next.
        if let Some(previous) = self.session.begin_connect(id.clone()) {
            info!("releasing previous peripheral {previous}");
            if let Err(e) = self.radio.disconnect(&previous).await {
                warn!("failed to release {previous}: {e}");
            }
        }

        if let Err(e) = self.radio.connect(&id).await {
            error!("failed to request connection to {id}: {e}");
            self.session.clear_if(&id);
        }
        self.publish();
    }

    async fn disconnect(&mut self) {
        let Some(id) = self.session.take_target() else {
            info!("disconnect requested with no active peripheral");
            return;
        };
        if let Err(e) = self.radio.disconnect(&id).await {
            warn!("failed to disconnect from {id}: {e}");
        }
        self.publish();
    }

    fn power_changed(&mut self, powered_on: bool) {
        if self.powered_on == powered_on {
            return;
        }
        self.powered_on = powered_on;
        info!("radio power {}", if powered_on { "on" } else { "off" });
        if !powered_on {
            // Loss of radio power is an implicit scan stop and disconnect;
            // the platform has already torn the link down.
            self.scanning = false;
            if let Some(id) = self.session.take_target() {
                info!("peripheral {id} released by power loss");
            }
        }
        self.publish();
    }

    async fn discovered(
        &mut self,
        id: SpeakerId,
        name: Option<String>,
        address: Option<String>,
        rssi: Option<i16>,
    ) {
        if let (Some(floor), Some(rssi)) = (self.config.min_rssi, rssi) {
            if rssi < floor {
                debug!("ignoring {id}: rssi {rssi} below floor {floor}");
                return;
            }
        }
        if let Some(name) = &name {
            if !name.starts_with(&self.config.name_prefix) {
                debug!(
                    "ignoring {name}: does not match prefix {:?}",
                    self.config.name_prefix
                );
                return;
            }
        }

        let Some(admitted) = self.registry.admit(id, name, address, rssi) else {
            return;
        };
        info!("discovered speaker {:?} ({})", admitted.name, admitted.id);
        let auto_connect =
            self.config.auto_connect_name.as_deref() == Some(admitted.name.as_str());
        let id = admitted.id.clone();
        self.publish();

        if auto_connect {
            info!("auto-connecting to {id}");
            self.connect(id).await;
        }
    }

    async fn peripheral_connected(&mut self, id: SpeakerId) {
        if !self.session.mark_connected(&id) {
            debug!("ignoring connect callback for non-pending peripheral {id}");
            return;
        }
        info!("connected to {id}");
        self.publish();
        self.discovery.discover_all(&id).await;
    }

    fn value_received(&mut self, id: SpeakerId, payload: Vec<u8>) {
        if self.session.connected() != Some(&id) {
            debug!("ignoring value from non-active peripheral {id}");
            return;
        }
        match String::from_utf8(payload) {
            Ok(text) => {
                info!("value received: {text}");
                self.last_received = Some(ReceivedValue {
                    text,
                    received_at: Local::now().to_rfc3339(),
                });
                self.publish();
            }
            Err(_) => debug!("ignoring non-utf8 payload from {id}"),
        }
    }

    fn publish(&self) {
        let snapshot = BridgeSnapshot {
            powered_on: self.powered_on,
            scanning: self.scanning,
            speakers: self.registry.speakers().to_vec(),
            connected: self.session.connected().cloned(),
            last_received: self.last_received.clone(),
            dropped_commands: self.commands.dropped(),
        };
        self.publisher.send_if_modified(|current| {
            if *current == snapshot {
                return false;
            }
            *current = snapshot;
            true
        });
    }
}
