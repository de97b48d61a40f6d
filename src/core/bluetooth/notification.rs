//! Notification handling for the speaker's output channel.
//! Each subscription runs as a spawned task pumping the characteristic's
//! notify stream into `ValueReceived` events.

use bluest::{Characteristic, Device};
use futures_util::StreamExt;
use log::{error, info};
use tokio::sync::mpsc;

use crate::core::bluetooth::error::RadioError;
use crate::core::bluetooth::event::RadioEvent;
use crate::core::bluetooth::types::SpeakerId;

#[derive(Clone)]
pub(crate) struct NotificationHandler {
    events: mpsc::UnboundedSender<RadioEvent>,
}

impl NotificationHandler {
    pub fn new(events: mpsc::UnboundedSender<RadioEvent>) -> Self {
        Self { events }
    }

    /// Subscribes to value-change notifications and starts the pump task.
    pub fn subscribe(&self, id: SpeakerId, device: Device, characteristic: Characteristic) {
        let events = self.events.clone();
        tokio::spawn(async move {
            Self::pump(id, device, characteristic, events).await;
        });
    }

    async fn pump(
        id: SpeakerId,
        device: Device,
        characteristic: Characteristic,
        events: mpsc::UnboundedSender<RadioEvent>,
    ) {
        info!("subscribing to notifications on {}", characteristic.uuid());
        match characteristic.notify().await {
            Ok(mut notification_stream) => {
                info!("notification state changed to notifying");
                while let Some(result) = notification_stream.next().await {
                    match result {
                        Ok(value) => {
                            let _ = events.send(RadioEvent::ValueReceived {
                                id: id.clone(),
                                payload: value,
                            });
                        }
                        Err(e) => {
                            error!("error in notification stream: {e}");
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                error!("failed to subscribe to notifications: {e}");
                return;
            }
        }

        info!("notification stream ended");
        // The stream closing is how some platforms report link loss.
        if !device.is_connected().await {
            let _ = events.send(RadioEvent::Disconnected {
                id,
                reason: Some(RadioError::Link("notification stream closed".into())),
            });
        }
    }
}
