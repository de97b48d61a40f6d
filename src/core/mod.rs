//! Core functionality for the Whispr speaker bridge
//! This module contains the core functionality for interfacing with Whispr
//! speaker peripherals.

pub mod bluetooth;

// Re-export commonly used types
pub use bluetooth::{BridgeController, BridgeHandle};
