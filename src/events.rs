//! Event types for PetalVoice

use crate::backend::HandleId;
use crate::source::SourceId;

/// Something the manager did on behalf of a source.
///
/// Drained with [`VoiceManager::poll_events`](crate::VoiceManager::poll_events).
#[derive(Debug, Clone, PartialEq)]
pub enum VoiceEvent {
    /// A voice was assigned and playback started
    Started { source_id: SourceId, voice: HandleId },
    /// A play request was dropped: no free voice, or the content could not
    /// be attached
    Dropped { source_id: SourceId },
    /// A stopped voice went back to the pool
    Reclaimed { source_id: SourceId, voice: HandleId },
    /// A looping stream ran dry and was rewound
    Looped { source_id: SourceId, voice: HandleId },
}

impl VoiceEvent {
    pub fn source_id(&self) -> SourceId {
        match self {
            Self::Started { source_id, .. }
            | Self::Dropped { source_id }
            | Self::Reclaimed { source_id, .. }
            | Self::Looped { source_id, .. } => *source_id,
        }
    }
}
