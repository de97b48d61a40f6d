//! Bluetooth functionality for the Whispr speaker bridge
//! This module handles all bluetooth operations including scanning,
//! connecting, resolving the speaker's control channels, and sending
//! control values.

pub mod commands;
mod connection;
pub mod constants;
pub mod discovery;
pub mod error;
pub mod event;
pub mod manager;
mod notification;
pub mod radio;
pub mod registry;
mod scanner;
pub mod session;
pub mod types;

// Re-export types that should be publicly accessible
pub use commands::{CommandChannel, SpeakerCommand};
pub use discovery::DiscoveryEngine;
pub use error::RadioError;
pub use event::{ControlRequest, RadioEvent};
pub use manager::{BridgeController, BridgeHandle};
pub use radio::{BluestRadio, RadioLink};
pub use registry::SpeakerRegistry;
pub use session::{CharacteristicBinding, ConnectionSession, LinkState};
pub use types::{
    BridgeSnapshot, CharacteristicRef, DiscoveredSpeaker, ReceivedValue, ServiceRef, SpeakerId,
};
