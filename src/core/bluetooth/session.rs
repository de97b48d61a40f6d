//! The single active peripheral link and its resolved control channels.

use crate::core::bluetooth::types::{CharacteristicRef, SpeakerId};

/// Link lifecycle of the one active peripheral.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LinkState {
    #[default]
    Disconnected,
    Connecting(SpeakerId),
    Connected(SpeakerId),
}

/// The two logical control channels of a connected speaker.
///
/// Both start unbound on every connection attempt and are populated during
/// characteristic discovery. Command sends against an unbound input channel
/// are no-ops by contract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CharacteristicBinding {
    /// Write channel for control values.
    pub input: Option<CharacteristicRef>,
    /// Notify channel for speaker status text.
    pub output: Option<CharacteristicRef>,
}

impl CharacteristicBinding {
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Owns the at-most-one active peripheral connection.
///
/// The controller is the sole holder of a session, which makes the
/// single-active-peripheral rule a structural invariant rather than a
/// convention. Every transition out of a link resets the characteristic
/// binding so no stale handle survives a link change.
#[derive(Debug, Default)]
pub struct ConnectionSession {
    state: LinkState,
    binding: CharacteristicBinding,
}

impl ConnectionSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts dialing `id`. Returns the previously pending or active
    /// target, which the caller must release first.
    pub fn begin_connect(&mut self, id: SpeakerId) -> Option<SpeakerId> {
        let previous = self.take_target();
        self.state = LinkState::Connecting(id);
        previous
    }

    /// Marks the pending target as connected. Callbacks for any other
    /// peripheral are stale and refused.
    pub fn mark_connected(&mut self, id: &SpeakerId) -> bool {
        match &self.state {
            LinkState::Connecting(pending) if pending == id => {
                self.state = LinkState::Connected(id.clone());
                true
            }
            _ => false,
        }
    }

    /// Clears all link state if `id` is the current target.
    pub fn clear_if(&mut self, id: &SpeakerId) -> bool {
        if self.target() == Some(id) {
            self.take_target();
            true
        } else {
            false
        }
    }

    /// Releases the current target, if any, and unbinds both channels.
    pub fn take_target(&mut self) -> Option<SpeakerId> {
        self.binding.clear();
        match std::mem::take(&mut self.state) {
            LinkState::Disconnected => None,
            LinkState::Connecting(id) | LinkState::Connected(id) => Some(id),
        }
    }

    /// The peripheral currently pending or connected.
    pub fn target(&self) -> Option<&SpeakerId> {
        match &self.state {
            LinkState::Disconnected => None,
            LinkState::Connecting(id) | LinkState::Connected(id) => Some(id),
        }
    }

    /// The peripheral with an established link, if any.
    pub fn connected(&self) -> Option<&SpeakerId> {
        match &self.state {
            LinkState::Connected(id) => Some(id),
            _ => None,
        }
    }

    pub fn binding(&self) -> &CharacteristicBinding {
        &self.binding
    }

    pub fn binding_mut(&mut self) -> &mut CharacteristicBinding {
        &mut self.binding
    }
}
