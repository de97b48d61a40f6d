//! Constants used throughout the application
//! This module contains the constant values of the speaker wire contract:
//! GATT UUIDs, naming conventions, and discovery defaults.

use uuid::Uuid;

/// Advertised-name prefix of production Whispr speakers.
pub const SPEAKER_NAME_PREFIX: &str = "WhisprSpeaker";

/// The UUID of the Whispr speaker control service.
pub const UUID_SPEAKER_SERVICE: Uuid = Uuid::from_u128(0xc0f6f394_fde3_46f6_827c_104034304184);

/// The UUID of the speaker input characteristic (control writes).
pub const UUID_SPEAKER_INPUT_CHAR: Uuid = Uuid::from_u128(0x214a8dd4_04cf_48e5_bb1d_f6018e28d7a2);

/// The UUID of the speaker output characteristic (status notifications).
pub const UUID_SPEAKER_OUTPUT_CHAR: Uuid = Uuid::from_u128(0x643954a4_a6cc_455c_825c_499190ce7db0);
