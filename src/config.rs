//! Bridge configuration, loaded from a JSON file with defaults when the
//! file is absent.

use std::path::Path;

use anyhow::Result;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio::fs;
use uuid::Uuid;

use crate::core::bluetooth::constants::{
    SPEAKER_NAME_PREFIX, UUID_SPEAKER_INPUT_CHAR, UUID_SPEAKER_OUTPUT_CHAR,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Advertised-name prefix a peripheral must carry to be listed.
    /// An empty prefix admits every named peripheral.
    pub name_prefix: String,

    /// Connect automatically when a speaker with exactly this name is
    /// discovered.
    pub auto_connect_name: Option<String>,

    /// Discoveries weaker than this floor (dBm) are ignored.
    pub min_rssi: Option<i16>,

    /// Write channel for control values. Overridable for bench units
    /// flashed with non-production UUIDs.
    pub input_char_uuid: Uuid,

    /// Notify channel for speaker status text.
    pub output_char_uuid: Uuid,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            name_prefix: SPEAKER_NAME_PREFIX.to_string(),
            auto_connect_name: None,
            min_rssi: None,
            input_char_uuid: UUID_SPEAKER_INPUT_CHAR,
            output_char_uuid: UUID_SPEAKER_OUTPUT_CHAR,
        }
    }
}

impl BridgeConfig {
    /// Loads the config from `path`, falling back to defaults when the
    /// file does not exist.
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("config file not found at {path:?}, using defaults");
            return Ok(Self::default());
        }

        let config_json = fs::read_to_string(path).await?;
        let config: Self = serde_json::from_str(&config_json)?;

        info!("config loaded from {path:?}");
        Ok(config)
    }

    /// A config that lists every named peripheral, regardless of prefix.
    pub fn permissive() -> Self {
        Self {
            name_prefix: String::new(),
            ..Self::default()
        }
    }
}
