//! End-to-end tests for the bridge controller against a scripted radio.
//! The mock records every radio call and the tests inject event sequences,
//! asserting on the published snapshots — the same surface a UI observes.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use uuid::Uuid;

use whispr_bridge::config::BridgeConfig;
use whispr_bridge::core::bluetooth::constants::{
    UUID_SPEAKER_INPUT_CHAR, UUID_SPEAKER_OUTPUT_CHAR,
};
use whispr_bridge::core::bluetooth::event::RadioEvent;
use whispr_bridge::core::bluetooth::radio::RadioLink;
use whispr_bridge::core::bluetooth::types::{BridgeSnapshot, CharacteristicRef, ServiceRef, SpeakerId};
use whispr_bridge::core::bluetooth::{BridgeController, BridgeHandle};

#[derive(Debug, Clone, PartialEq)]
enum RadioCall {
    StartScan,
    StopScan,
    Connect(SpeakerId),
    Disconnect(SpeakerId),
    EnumerateServices(SpeakerId),
    EnumerateCharacteristics(u64),
    Subscribe(u64),
    Write(u64, Vec<u8>),
}

/// Accepts every request and records it; all outcomes are injected by the
/// tests through the event channel, exactly as the platform would.
#[derive(Debug, Default)]
struct MockRadio {
    calls: Mutex<Vec<RadioCall>>,
}

impl MockRadio {
    fn calls(&self) -> Vec<RadioCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: RadioCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl RadioLink for MockRadio {
    async fn start_scan(&self) -> Result<()> {
        self.record(RadioCall::StartScan);
        Ok(())
    }

    async fn stop_scan(&self) -> Result<()> {
        self.record(RadioCall::StopScan);
        Ok(())
    }

    async fn connect(&self, id: &SpeakerId) -> Result<()> {
        self.record(RadioCall::Connect(id.clone()));
        Ok(())
    }

    async fn disconnect(&self, id: &SpeakerId) -> Result<()> {
        self.record(RadioCall::Disconnect(id.clone()));
        Ok(())
    }

    async fn enumerate_services(&self, id: &SpeakerId) -> Result<()> {
        self.record(RadioCall::EnumerateServices(id.clone()));
        Ok(())
    }

    async fn enumerate_characteristics(&self, _id: &SpeakerId, service: ServiceRef) -> Result<()> {
        self.record(RadioCall::EnumerateCharacteristics(service.handle));
        Ok(())
    }

    async fn subscribe(&self, _id: &SpeakerId, characteristic: CharacteristicRef) -> Result<()> {
        self.record(RadioCall::Subscribe(characteristic.handle));
        Ok(())
    }

    async fn write_without_response(
        &self,
        characteristic: CharacteristicRef,
        payload: &[u8],
    ) -> Result<()> {
        self.record(RadioCall::Write(characteristic.handle, payload.to_vec()));
        Ok(())
    }
}

struct Harness {
    radio: Arc<MockRadio>,
    handle: BridgeHandle,
    events: mpsc::UnboundedSender<RadioEvent>,
}

fn harness(config: BridgeConfig) -> Harness {
    let radio = Arc::new(MockRadio::default());
    let (events, events_rx) = mpsc::unbounded_channel();
    let handle = BridgeController::spawn(radio.clone(), events_rx, config);
    Harness {
        radio,
        handle,
        events,
    }
}

fn speaker(n: u32) -> SpeakerId {
    SpeakerId(format!("peripheral-{n}"))
}

impl Harness {
    fn power_on(&self) {
        self.events
            .send(RadioEvent::PowerChanged { powered_on: true })
            .unwrap();
    }

    fn power_off(&self) {
        self.events
            .send(RadioEvent::PowerChanged { powered_on: false })
            .unwrap();
    }

    fn discover(&self, id: SpeakerId, name: &str, rssi: i16) {
        self.events
            .send(RadioEvent::Discovered {
                id,
                name: Some(name.to_string()),
                address: None,
                rssi: Some(rssi),
            })
            .unwrap();
    }

    fn connected(&self, id: SpeakerId) {
        self.events.send(RadioEvent::Connected { id }).unwrap();
    }

    async fn wait_snapshot(
        &self,
        what: &str,
        predicate: impl Fn(&BridgeSnapshot) -> bool,
    ) -> BridgeSnapshot {
        let mut snapshots = self.handle.subscribe();
        timeout(Duration::from_secs(2), async {
            loop {
                let current = snapshots.borrow_and_update().clone();
                if predicate(&current) {
                    return current;
                }
                snapshots.changed().await.expect("controller stopped");
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
    }

    async fn wait_calls(
        &self,
        what: &str,
        predicate: impl Fn(&[RadioCall]) -> bool,
    ) -> Vec<RadioCall> {
        timeout(Duration::from_secs(2), async {
            loop {
                let calls = self.radio.calls();
                if predicate(&calls) {
                    return calls;
                }
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
    }

    /// Lets in-flight requests and events drain before a negative assertion.
    async fn settle(&self) {
        sleep(Duration::from_millis(50)).await;
    }

    /// Drives the full happy path up to a connected speaker with both
    /// channels bound: input on handle 10, output on handle 11.
    async fn connect_and_bind(&self, id: SpeakerId, name: &str) {
        self.discover(id.clone(), name, -40);
        self.wait_snapshot("speaker listed", |s| !s.speakers.is_empty())
            .await;
        self.handle.connect_to_device(id.clone());
        self.wait_calls("connect issued", |calls| {
            calls.contains(&RadioCall::Connect(id.clone()))
        })
        .await;
        self.connected(id.clone());
        self.wait_calls("service enumeration", |calls| {
            calls.contains(&RadioCall::EnumerateServices(id.clone()))
        })
        .await;

        self.events
            .send(RadioEvent::ServicesResolved {
                id: id.clone(),
                services: vec![ServiceRef {
                    handle: 1,
                    uuid: Uuid::from_u128(1),
                }],
            })
            .unwrap();
        self.wait_calls("characteristic enumeration", |calls| {
            calls.contains(&RadioCall::EnumerateCharacteristics(1))
        })
        .await;

        self.events
            .send(RadioEvent::CharacteristicsResolved {
                id: id.clone(),
                characteristics: vec![
                    CharacteristicRef {
                        handle: 10,
                        uuid: UUID_SPEAKER_INPUT_CHAR,
                    },
                    CharacteristicRef {
                        handle: 11,
                        uuid: UUID_SPEAKER_OUTPUT_CHAR,
                    },
                    CharacteristicRef {
                        handle: 12,
                        uuid: Uuid::from_u128(0xdead_beef),
                    },
                ],
            })
            .unwrap();
        self.wait_calls("output subscription", |calls| {
            calls.contains(&RadioCall::Subscribe(11))
        })
        .await;
    }
}

#[tokio::test]
async fn registry_counts_distinct_names_and_keeps_first_rssi() {
    let h = harness(BridgeConfig::permissive());
    h.power_on();
    h.handle.start_scanning();

    h.discover(speaker(1), "Kitchen", -40);
    h.discover(speaker(2), "Bedroom", -50);
    h.discover(speaker(3), "Kitchen", -80); // repeat name, stronger id
    h.discover(speaker(4), "Garage", -60);
    h.events
        .send(RadioEvent::Discovered {
            id: speaker(5),
            name: None,
            address: None,
            rssi: Some(-30),
        })
        .unwrap();

    let snapshot = h
        .wait_snapshot("three distinct speakers", |s| s.speakers.len() == 3)
        .await;
    let names: Vec<&str> = snapshot.speakers.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["Kitchen", "Bedroom", "Garage"]);
    assert_eq!(snapshot.speakers[0].rssi, Some(-40));
    assert_eq!(snapshot.speakers[0].id, speaker(1));

    h.settle().await;
    assert_eq!(h.handle.snapshot().speakers.len(), 3);
}

#[tokio::test]
async fn disconnect_before_connected_callback_leaves_no_partial_state() {
    let h = harness(BridgeConfig::permissive());
    h.power_on();
    h.handle.start_scanning();
    h.discover(speaker(1), "Kitchen", -40);
    h.wait_snapshot("speaker listed", |s| !s.speakers.is_empty())
        .await;

    h.handle.connect_to_device(speaker(1));
    h.wait_calls("connect issued", |calls| {
        calls.contains(&RadioCall::Connect(speaker(1)))
    })
    .await;

    // Tear down before the connected callback ever fires.
    h.handle.disconnect_to_device();
    h.wait_calls("disconnect issued", |calls| {
        calls.contains(&RadioCall::Disconnect(speaker(1)))
    })
    .await;
    assert_eq!(h.handle.snapshot().connected, None);

    // The late callback is stale and must not resurrect the session.
    h.connected(speaker(1));
    h.settle().await;
    assert_eq!(h.handle.snapshot().connected, None);
    assert!(
        !h.radio
            .calls()
            .contains(&RadioCall::EnumerateServices(speaker(1)))
    );
}

#[tokio::test]
async fn volume_before_discovery_completes_is_a_silent_noop() {
    let h = harness(BridgeConfig::permissive());
    h.power_on();
    h.handle.start_scanning();
    h.discover(speaker(1), "Kitchen", -40);
    h.wait_snapshot("speaker listed", |s| !s.speakers.is_empty())
        .await;
    h.handle.connect_to_device(speaker(1));
    h.wait_calls("connect issued", |calls| {
        calls.contains(&RadioCall::Connect(speaker(1)))
    })
    .await;
    h.connected(speaker(1));
    h.wait_snapshot("connected", |s| s.connected.is_some()).await;

    // Connected, but no characteristics resolved yet.
    h.handle.set_volume(20);
    let snapshot = h
        .wait_snapshot("dropped command counted", |s| s.dropped_commands == 1)
        .await;

    assert_eq!(snapshot.connected, Some(speaker(1)));
    assert!(
        !h.radio
            .calls()
            .iter()
            .any(|call| matches!(call, RadioCall::Write(..)))
    );
}

#[tokio::test]
async fn power_off_while_scanning_implies_scan_stop_and_disconnect() {
    let h = harness(BridgeConfig::permissive());
    h.power_on();
    h.handle.start_scanning();
    h.wait_snapshot("scanning", |s| s.scanning).await;
    h.connect_and_bind(speaker(1), "Kitchen").await;

    h.power_off();
    let snapshot = h
        .wait_snapshot("powered off", |s| !s.powered_on)
        .await;
    assert!(!snapshot.scanning);
    assert_eq!(snapshot.connected, None);

    // With the radio off, scan requests are dropped silently.
    let scans_before = h
        .radio
        .calls()
        .iter()
        .filter(|call| **call == RadioCall::StartScan)
        .count();
    h.handle.start_scanning();
    h.settle().await;
    let scans_after = h
        .radio
        .calls()
        .iter()
        .filter(|call| **call == RadioCall::StartScan)
        .count();
    assert_eq!(scans_before, scans_after);
}

#[tokio::test]
async fn discovery_binds_the_two_known_uuids_and_ignores_the_rest() {
    let h = harness(BridgeConfig::permissive());
    h.power_on();
    h.handle.start_scanning();
    h.connect_and_bind(speaker(1), "Kitchen").await;

    let calls = h.radio.calls();
    let subscriptions: Vec<&RadioCall> = calls
        .iter()
        .filter(|call| matches!(call, RadioCall::Subscribe(_)))
        .collect();
    assert_eq!(subscriptions, vec![&RadioCall::Subscribe(11)]);

    // The bound input channel carries the volume byte, fire-and-forget.
    h.handle.set_volume(42);
    h.wait_calls("volume write", |calls| {
        calls.contains(&RadioCall::Write(10, vec![42]))
    })
    .await;
    assert_eq!(h.handle.snapshot().dropped_commands, 0);
}

#[tokio::test]
async fn stop_scanning_and_disconnect_are_idempotent() {
    let h = harness(BridgeConfig::permissive());
    h.power_on();
    h.handle.start_scanning();
    h.wait_snapshot("scanning", |s| s.scanning).await;

    h.handle.stop_scanning();
    let first = h.wait_snapshot("scan stopped", |s| !s.scanning).await;

    h.handle.stop_scanning();
    h.settle().await;
    assert_eq!(h.handle.snapshot(), first);

    // Disconnect with no peripheral: no radio call, no state change.
    h.handle.disconnect_to_device();
    h.settle().await;
    assert_eq!(h.handle.snapshot(), first);
    assert!(
        !h.radio
            .calls()
            .iter()
            .any(|call| matches!(call, RadioCall::Disconnect(_)))
    );
}

#[tokio::test]
async fn scanning_requires_radio_power() {
    let h = harness(BridgeConfig::permissive());

    h.handle.start_scanning();
    h.settle().await;

    assert!(h.radio.calls().is_empty());
    assert!(!h.handle.snapshot().scanning);
}

#[tokio::test]
async fn connecting_elsewhere_releases_the_previous_peripheral_first() {
    let h = harness(BridgeConfig::permissive());
    h.power_on();
    h.handle.start_scanning();
    h.connect_and_bind(speaker(1), "Kitchen").await;
    h.discover(speaker(2), "Bedroom", -50);
    h.wait_snapshot("second speaker listed", |s| s.speakers.len() == 2)
        .await;

    h.handle.connect_to_device(speaker(2));
    let calls = h
        .wait_calls("second connect", |calls| {
            calls.contains(&RadioCall::Connect(speaker(2)))
        })
        .await;

    let release = calls
        .iter()
        .position(|call| *call == RadioCall::Disconnect(speaker(1)))
        .expect("previous peripheral released");
    let dial = calls
        .iter()
        .position(|call| *call == RadioCall::Connect(speaker(2)))
        .expect("new peripheral dialed");
    assert!(release < dial, "release must precede the new dial");
    h.wait_snapshot("previous link released", |s| s.connected.is_none())
        .await;
}

#[tokio::test]
async fn name_prefix_filter_gates_the_registry() {
    let h = harness(BridgeConfig::default());
    h.power_on();
    h.handle.start_scanning();

    h.discover(speaker(1), "WhisprSpeaker Kitchen", -40);
    h.discover(speaker(2), "SomeOtherDevice", -30);

    let snapshot = h
        .wait_snapshot("prefixed speaker listed", |s| !s.speakers.is_empty())
        .await;
    assert_eq!(snapshot.speakers.len(), 1);
    h.settle().await;
    let names: Vec<String> = h
        .handle
        .snapshot()
        .speakers
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(names, ["WhisprSpeaker Kitchen"]);
}

#[tokio::test]
async fn weak_advertisements_fall_below_the_rssi_floor() {
    let config = BridgeConfig {
        min_rssi: Some(-70),
        ..BridgeConfig::permissive()
    };
    let h = harness(config);
    h.power_on();
    h.handle.start_scanning();

    h.discover(speaker(1), "Kitchen", -85);
    h.discover(speaker(2), "Bedroom", -55);

    let snapshot = h
        .wait_snapshot("strong speaker listed", |s| !s.speakers.is_empty())
        .await;
    assert_eq!(snapshot.speakers.len(), 1);
    h.settle().await;
    let names: Vec<String> = h
        .handle
        .snapshot()
        .speakers
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(names, ["Bedroom"]);
}

#[tokio::test]
async fn auto_connect_dials_the_configured_speaker() {
    let config = BridgeConfig {
        auto_connect_name: Some("Kitchen".to_string()),
        ..BridgeConfig::permissive()
    };
    let h = harness(config);
    h.power_on();
    h.handle.start_scanning();

    h.discover(speaker(1), "Bedroom", -50);
    h.discover(speaker(2), "Kitchen", -40);

    let calls = h
        .wait_calls("auto connect", |calls| {
            calls.contains(&RadioCall::Connect(speaker(2)))
        })
        .await;
    assert!(!calls.contains(&RadioCall::Connect(speaker(1))));
}

#[tokio::test]
async fn output_values_decode_as_utf8_and_binary_is_skipped() {
    let h = harness(BridgeConfig::permissive());
    h.power_on();
    h.handle.start_scanning();
    h.connect_and_bind(speaker(1), "Kitchen").await;

    h.events
        .send(RadioEvent::ValueReceived {
            id: speaker(1),
            payload: b"vol:42".to_vec(),
        })
        .unwrap();
    let snapshot = h
        .wait_snapshot("value surfaced", |s| s.last_received.is_some())
        .await;
    assert_eq!(
        snapshot.last_received.as_ref().map(|v| v.text.as_str()),
        Some("vol:42")
    );

    // Malformed payloads are skipped without disturbing the last value.
    h.events
        .send(RadioEvent::ValueReceived {
            id: speaker(1),
            payload: vec![0xff, 0xfe, 0xfd],
        })
        .unwrap();
    h.settle().await;
    assert_eq!(
        h.handle
            .snapshot()
            .last_received
            .map(|v| v.text),
        Some("vol:42".to_string())
    );
}

#[tokio::test]
async fn unexpected_disconnect_clears_the_bindings() {
    let h = harness(BridgeConfig::permissive());
    h.power_on();
    h.handle.start_scanning();
    h.connect_and_bind(speaker(1), "Kitchen").await;

    h.events
        .send(RadioEvent::Disconnected {
            id: speaker(1),
            reason: Some(whispr_bridge::core::bluetooth::RadioError::Link(
                "connection lost".into(),
            )),
        })
        .unwrap();
    h.wait_snapshot("disconnected", |s| s.connected.is_none())
        .await;

    // The binding is gone with the session: sends drop again.
    h.handle.set_volume(10);
    h.wait_snapshot("dropped command counted", |s| s.dropped_commands == 1)
        .await;
    assert!(
        !h.radio
            .calls()
            .iter()
            .any(|call| matches!(call, RadioCall::Write(..)))
    );
}

#[tokio::test]
async fn clear_discovered_is_caller_owned_reset() {
    let h = harness(BridgeConfig::permissive());
    h.power_on();
    h.handle.start_scanning();
    h.discover(speaker(1), "Kitchen", -40);
    h.wait_snapshot("speaker listed", |s| !s.speakers.is_empty())
        .await;

    // Scanning again does not clear the registry by itself.
    h.handle.stop_scanning();
    h.handle.start_scanning();
    h.settle().await;
    assert_eq!(h.handle.snapshot().speakers.len(), 1);

    h.handle.clear_discovered();
    h.wait_snapshot("registry cleared", |s| s.speakers.is_empty())
        .await;

    // After a reset the same name is admitted again.
    h.discover(speaker(1), "Kitchen", -45);
    let snapshot = h
        .wait_snapshot("re-admitted", |s| !s.speakers.is_empty())
        .await;
    assert_eq!(snapshot.speakers[0].rssi, Some(-45));
}
