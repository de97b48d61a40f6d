//! Speaker commands and the single actuation surface that carries them to
//! the bound input channel.

use std::sync::Arc;

use log::{debug, warn};

use crate::core::bluetooth::radio::RadioLink;
use crate::core::bluetooth::session::ConnectionSession;

/// Control values understood by the speaker's input characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakerCommand {
    /// Absolute volume level, one unstructured byte.
    SetVolume(u8),
}

impl SpeakerCommand {
    /// Convert the command to its wire representation.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::SetVolume(level) => vec![*level],
        }
    }
}

/// Outbound command path.
///
/// All guards fail silent: a command with no connected speaker or no bound
/// input channel is dropped, logged, and counted — never surfaced as an
/// error, never queued, never retried. Writes go out without response;
/// delivery is best-effort radio transmission.
pub struct CommandChannel {
    radio: Arc<dyn RadioLink>,
    dropped: u64,
}

impl CommandChannel {
    pub fn new(radio: Arc<dyn RadioLink>) -> Self {
        Self { radio, dropped: 0 }
    }

    pub async fn send(&mut self, session: &ConnectionSession, command: SpeakerCommand) {
        let Some(id) = session.connected() else {
            warn!("dropping {command:?}: no connected speaker");
            self.dropped += 1;
            return;
        };
        let Some(input) = session.binding().input else {
            warn!("dropping {command:?}: input channel not bound");
            self.dropped += 1;
            return;
        };

        debug!("sending {command:?} to {id}");
        if let Err(e) = self.radio.write_without_response(input, &command.to_bytes()).await {
            warn!("write failed for {command:?}: {e}");
            self.dropped += 1;
        }
    }

    /// Commands dropped by the guards since startup.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bluetooth::constants::UUID_SPEAKER_INPUT_CHAR;
    use crate::core::bluetooth::radio::testing::{RecordedCall, RecordingRadio};
    use crate::core::bluetooth::types::{CharacteristicRef, SpeakerId};

    #[test]
    fn volume_is_one_unstructured_byte() {
        assert_eq!(SpeakerCommand::SetVolume(0).to_bytes(), vec![0]);
        assert_eq!(SpeakerCommand::SetVolume(20).to_bytes(), vec![20]);
        assert_eq!(SpeakerCommand::SetVolume(255).to_bytes(), vec![255]);
    }

    #[tokio::test]
    async fn send_without_session_is_a_counted_noop() {
        let radio = Arc::new(RecordingRadio::default());
        let mut channel = CommandChannel::new(radio.clone());
        let session = ConnectionSession::new();

        channel.send(&session, SpeakerCommand::SetVolume(7)).await;

        assert!(radio.calls().is_empty());
        assert_eq!(channel.dropped(), 1);
    }

    #[tokio::test]
    async fn send_without_input_binding_is_a_counted_noop() {
        let radio = Arc::new(RecordingRadio::default());
        let mut channel = CommandChannel::new(radio.clone());
        let id = SpeakerId("speaker".into());
        let mut session = ConnectionSession::new();
        session.begin_connect(id.clone());
        session.mark_connected(&id);

        channel.send(&session, SpeakerCommand::SetVolume(7)).await;

        assert!(radio.calls().is_empty());
        assert_eq!(channel.dropped(), 1);
    }

    #[tokio::test]
    async fn send_writes_to_the_bound_input_channel() {
        let radio = Arc::new(RecordingRadio::default());
        let mut channel = CommandChannel::new(radio.clone());
        let id = SpeakerId("speaker".into());
        let mut session = ConnectionSession::new();
        session.begin_connect(id.clone());
        session.mark_connected(&id);
        session.binding_mut().input = Some(CharacteristicRef {
            handle: 10,
            uuid: UUID_SPEAKER_INPUT_CHAR,
        });

        channel.send(&session, SpeakerCommand::SetVolume(42)).await;

        assert_eq!(radio.calls(), vec![RecordedCall::Write(10, vec![42])]);
        assert_eq!(channel.dropped(), 0);
    }
}
