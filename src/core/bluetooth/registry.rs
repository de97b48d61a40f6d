//! Accumulates the deduplicated, display-ready list of discovered speakers
//! for the current scan session.

use std::collections::HashSet;

use crate::core::bluetooth::types::{DiscoveredSpeaker, SpeakerId};

/// Insertion-ordered set of discovered speakers, deduplicated by exact
/// advertised name.
///
/// Nameless advertisements are never admitted. A repeat discovery under a
/// known name is dropped whole; the stored signal strength is not
/// refreshed. The registry never clears itself — the owner decides when a
/// fresh scan session starts.
#[derive(Debug, Default)]
pub struct SpeakerRegistry {
    speakers: Vec<DiscoveredSpeaker>,
    names: HashSet<String>,
}

impl SpeakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits a discovery if it carries a name not seen before, returning
    /// the stored entry.
    pub fn admit(
        &mut self,
        id: SpeakerId,
        name: Option<String>,
        address: Option<String>,
        rssi: Option<i16>,
    ) -> Option<&DiscoveredSpeaker> {
        let name = name?;
        if !self.names.insert(name.clone()) {
            return None;
        }
        self.speakers.push(DiscoveredSpeaker {
            id,
            name,
            address,
            rssi,
        });
        self.speakers.last()
    }

    pub fn get(&self, id: &SpeakerId) -> Option<&DiscoveredSpeaker> {
        self.speakers.iter().find(|speaker| &speaker.id == id)
    }

    /// Discovered speakers in discovery order, oldest first.
    pub fn speakers(&self) -> &[DiscoveredSpeaker] {
        &self.speakers
    }

    pub fn len(&self) -> usize {
        self.speakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.speakers.is_empty()
    }

    pub fn clear(&mut self) {
        self.speakers.clear();
        self.names.clear();
    }
}
