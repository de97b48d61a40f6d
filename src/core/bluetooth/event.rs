//! Event and request unions for the bridge controller.
//! Every callback the platform radio delivers is one `RadioEvent` variant,
//! and every caller-facing operation is one `ControlRequest` variant; both
//! flow over channels into the single controller task.

use crate::core::bluetooth::error::RadioError;
use crate::core::bluetooth::types::{CharacteristicRef, ServiceRef, SpeakerId};

/// Asynchronous callbacks from the radio backend.
#[derive(Debug, Clone, PartialEq)]
pub enum RadioEvent {
    /// Radio power state pushed by the platform.
    PowerChanged { powered_on: bool },
    /// An advertisement was seen while scanning.
    Discovered {
        id: SpeakerId,
        name: Option<String>,
        address: Option<String>,
        rssi: Option<i16>,
    },
    /// A requested connection is established.
    Connected { id: SpeakerId },
    /// A requested connection could not be established.
    ConnectFailed { id: SpeakerId, reason: RadioError },
    /// The link to a peripheral is gone, whether requested or not.
    Disconnected {
        id: SpeakerId,
        reason: Option<RadioError>,
    },
    /// Service enumeration finished for a peripheral.
    ServicesResolved {
        id: SpeakerId,
        services: Vec<ServiceRef>,
    },
    /// Characteristic enumeration finished for one service.
    CharacteristicsResolved {
        id: SpeakerId,
        characteristics: Vec<CharacteristicRef>,
    },
    /// The output channel pushed a value.
    ValueReceived { id: SpeakerId, payload: Vec<u8> },
}

/// Fire-and-forget requests from the caller.
///
/// None of these produce a return value; outcomes are observed through the
/// published snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlRequest {
    StartScanning,
    StopScanning,
    /// Reset the discovered-speaker list. The registry never clears itself;
    /// the caller owns the reset policy.
    ClearDiscovered,
    Connect { id: SpeakerId },
    Disconnect,
    SetVolume { level: u8 },
    Shutdown,
}
