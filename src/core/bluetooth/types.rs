//! Defines shared data structures for the bluetooth module.

use std::fmt;

use serde::Serialize;
use uuid::Uuid;

/// Opaque, platform-assigned identity of a peripheral.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SpeakerId(pub String);

impl fmt::Display for SpeakerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Represents a discovered speaker admitted to the registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveredSpeaker {
    /// Platform-specific unique identifier for the device (especially important on macOS)
    pub id: SpeakerId,
    /// The advertised name of the speaker
    pub name: String,
    /// The address of the device (MAC address on most platforms, may be absent on macOS)
    pub address: Option<String>,
    /// The signal strength (RSSI) at first discovery
    pub rssi: Option<i16>,
}

/// Backend handle for a resolved GATT service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceRef {
    pub handle: u64,
    pub uuid: Uuid,
}

/// Backend handle for a resolved GATT characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacteristicRef {
    pub handle: u64,
    pub uuid: Uuid,
}

/// A value pushed by the speaker on the output channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReceivedValue {
    pub text: String,
    /// RFC 3339 local timestamp of arrival.
    pub received_at: String,
}

/// Immutable view of the bridge state published to observers.
///
/// Snapshots are whole values: observers clone them and never touch the
/// controller's mutable state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BridgeSnapshot {
    /// Whether the platform radio is powered on.
    pub powered_on: bool,
    /// Whether a scan is in progress.
    pub scanning: bool,
    /// Discovered speakers, oldest first.
    pub speakers: Vec<DiscoveredSpeaker>,
    /// Identity of the currently connected speaker, if any.
    pub connected: Option<SpeakerId>,
    /// Most recent value decoded from the output channel.
    pub last_received: Option<ReceivedValue>,
    /// Commands dropped by the no-op guard since startup.
    pub dropped_commands: u64,
}
