//! Whispr speaker bridge library
//! Discovers, connects to, and remotely controls Whispr BLE speakers.
//! The caller-facing surface is [`BridgeHandle`]: fire-and-forget requests
//! in, immutable state snapshots out.

// Module declarations
pub mod config;
pub mod core;
pub mod logging;

// Re-export the main entry points
pub use crate::config::BridgeConfig;
pub use crate::core::bluetooth::types::{BridgeSnapshot, DiscoveredSpeaker, SpeakerId};
pub use crate::core::bluetooth::{BluestRadio, BridgeController, BridgeHandle};
