//! Walks the GATT hierarchy of a newly connected speaker and binds the two
//! well-known control channels.

use std::sync::Arc;

use log::{debug, info, warn};
use uuid::Uuid;

use crate::core::bluetooth::radio::RadioLink;
use crate::core::bluetooth::session::CharacteristicBinding;
use crate::core::bluetooth::types::{CharacteristicRef, ServiceRef, SpeakerId};

/// Resolves the speaker's input and output channels after a connection.
///
/// The walk is deliberately unfiltered: all services are enumerated, then
/// all characteristics per service, and only the UUID comparison at the end
/// decides what binds. Unmatched characteristics are ignored, not errors.
pub struct DiscoveryEngine {
    radio: Arc<dyn RadioLink>,
    input_uuid: Uuid,
    output_uuid: Uuid,
}

impl DiscoveryEngine {
    pub fn new(radio: Arc<dyn RadioLink>, input_uuid: Uuid, output_uuid: Uuid) -> Self {
        Self {
            radio,
            input_uuid,
            output_uuid,
        }
    }

    /// Kicks off a full service enumeration on the peripheral.
    pub async fn discover_all(&self, id: &SpeakerId) {
        if let Err(e) = self.radio.enumerate_services(id).await {
            warn!("service discovery failed for {id}: {e}");
        }
    }

    /// Fans characteristic enumeration out over every resolved service.
    pub async fn services_resolved(&self, id: &SpeakerId, services: &[ServiceRef]) {
        for service in services {
            if let Err(e) = self.radio.enumerate_characteristics(id, *service).await {
                warn!("characteristic discovery failed for service {}: {e}", service.uuid);
            }
        }
    }

    /// Binds recognized channels into `binding`. The output channel is
    /// additionally subscribed for value-change notifications.
    pub async fn characteristics_resolved(
        &self,
        id: &SpeakerId,
        characteristics: &[CharacteristicRef],
        binding: &mut CharacteristicBinding,
    ) {
        for characteristic in characteristics {
            if characteristic.uuid == self.input_uuid {
                info!("bound input channel {}", characteristic.uuid);
                binding.input = Some(*characteristic);
            } else if characteristic.uuid == self.output_uuid {
                info!("bound output channel {}", characteristic.uuid);
                binding.output = Some(*characteristic);
                if let Err(e) = self.radio.subscribe(id, *characteristic).await {
                    warn!("failed to subscribe to output channel: {e}");
                }
            } else {
                debug!("ignoring characteristic {}", characteristic.uuid);
            }
        }
    }
}
