//! Audio backend abstraction layer
//!
//! This trait is the capability surface the voice manager consumes. It mirrors
//! an OpenAL-style API: voices (sources) and buffers are opaque integer
//! handles generated by the backend, buffers are either bound directly to a
//! voice or queued on it for streaming, and the backend owns all mixing.
//!
//! Implementations are expected to be cheap to call from several threads; the
//! manager serializes its own bookkeeping but calls the backend from both game
//! threads and the update ticker.

mod simulated;

pub use simulated::SimulatedBackend;

use crate::math::Vec3;
use std::fmt;
use std::num::NonZeroU32;

/// Opaque backend handle for a voice or a buffer.
///
/// Handles are never zero, so "no handle" is always spelled `Option::None`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(NonZeroU32);

impl HandleId {
    /// Wraps a raw backend handle. Returns `None` for the zero handle.
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Playback state as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    Playing,
    Paused,
    Stopped,
}

/// Layout of PCM bytes handed to [`AudioBackend::upload_buffer_data`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcmFormat {
    Mono8,
    Mono16,
    Stereo8,
    Stereo16,
}

impl PcmFormat {
    /// Picks the layout for a channel count and bit depth.
    pub fn from_channels(channels: u16, bits: u16) -> Option<Self> {
        match (channels, bits) {
            (1, 8) => Some(Self::Mono8),
            (1, 16) => Some(Self::Mono16),
            (2, 8) => Some(Self::Stereo8),
            (2, 16) => Some(Self::Stereo16),
            _ => None,
        }
    }

    pub fn channels(self) -> u16 {
        match self {
            Self::Mono8 | Self::Mono16 => 1,
            Self::Stereo8 | Self::Stereo16 => 2,
        }
    }

    pub fn bytes_per_sample(self) -> usize {
        match self {
            Self::Mono8 | Self::Stereo8 => 1,
            Self::Mono16 | Self::Stereo16 => 2,
        }
    }

    /// Size of one frame (one sample for every channel) in bytes.
    pub fn frame_size(self) -> usize {
        self.bytes_per_sample() * self.channels() as usize
    }
}

/// Per-voice parameter kinds. Also the members of the dirty set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    Position,
    Direction,
    Velocity,
    Pitch,
    Volume,
    Looping,
    Relative,
    ConeInnerAngle,
    ConeOuterAngle,
    ReferenceDistance,
    MaxDistance,
}

/// A per-voice parameter together with its value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VoiceParam {
    Position(Vec3),
    Direction(Vec3),
    Velocity(Vec3),
    Pitch(f32),
    Volume(f32),
    Looping(bool),
    /// Position is interpreted relative to the listener
    Relative(bool),
    ConeInnerAngle(f32),
    ConeOuterAngle(f32),
    ReferenceDistance(f32),
    MaxDistance(f32),
}

impl VoiceParam {
    pub fn kind(&self) -> ParamKind {
        match self {
            Self::Position(_) => ParamKind::Position,
            Self::Direction(_) => ParamKind::Direction,
            Self::Velocity(_) => ParamKind::Velocity,
            Self::Pitch(_) => ParamKind::Pitch,
            Self::Volume(_) => ParamKind::Volume,
            Self::Looping(_) => ParamKind::Looping,
            Self::Relative(_) => ParamKind::Relative,
            Self::ConeInnerAngle(_) => ParamKind::ConeInnerAngle,
            Self::ConeOuterAngle(_) => ParamKind::ConeOuterAngle,
            Self::ReferenceDistance(_) => ParamKind::ReferenceDistance,
            Self::MaxDistance(_) => ParamKind::MaxDistance,
        }
    }
}

/// Listener parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ListenerParam {
    Position(Vec3),
    Velocity(Vec3),
    Orientation { at: Vec3, up: Vec3 },
    Volume(f32),
}

/// Core audio backend trait
///
/// Every call is assumed to succeed or to degrade gracefully on its own; the
/// manager performs no retries. Only context creation reports failure.
pub trait AudioBackend: Send + Sync {
    // === Context ===

    /// Open the device and make a context current
    fn create_context(&self) -> bool;

    fn destroy_context(&self);

    // === Handles ===

    /// Generate a voice. `None` when the backend ran out of voices.
    fn gen_voice(&self) -> Option<HandleId>;

    /// Generate a buffer. `None` when the backend ran out of memory.
    fn gen_buffer(&self) -> Option<HandleId>;

    fn delete_voice(&self, voice: HandleId);

    fn delete_buffer(&self, buffer: HandleId);

    // === Transport ===

    fn play(&self, voice: HandleId);

    fn pause(&self, voice: HandleId);

    /// Stop the voice. Every buffer queued on it becomes processed.
    fn stop(&self, voice: HandleId);

    fn voice_state(&self, voice: HandleId) -> VoiceState;

    // === Buffers ===

    /// Number of queued buffers that have finished playing
    fn processed_buffer_count(&self, voice: HandleId) -> usize;

    fn queue_buffer(&self, voice: HandleId, buffer: HandleId);

    /// Remove the oldest processed buffer from the voice queue
    fn unqueue_buffer(&self, voice: HandleId) -> Option<HandleId>;

    /// Bind a single buffer to the voice, or clear the binding (and the queue)
    fn bind_buffer(&self, voice: HandleId, buffer: Option<HandleId>);

    fn upload_buffer_data(&self, buffer: HandleId, format: PcmFormat, data: &[u8], sample_rate: u32);

    // === Parameters ===

    fn set_voice_param(&self, voice: HandleId, param: VoiceParam);

    fn set_listener_param(&self, param: ListenerParam);

    // === Info ===

    /// Get the backend name (e.g., "OpenAL", "Simulated")
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_never_a_handle() {
        assert!(HandleId::new(0).is_none());
        assert_eq!(HandleId::new(7).map(HandleId::get), Some(7));
    }

    #[test]
    fn pcm_format_frame_sizes() {
        assert_eq!(PcmFormat::Mono8.frame_size(), 1);
        assert_eq!(PcmFormat::Mono16.frame_size(), 2);
        assert_eq!(PcmFormat::Stereo16.frame_size(), 4);
        assert_eq!(PcmFormat::from_channels(2, 16), Some(PcmFormat::Stereo16));
        assert_eq!(PcmFormat::from_channels(6, 16), None);
    }

    #[test]
    fn voice_param_kind_matches_variant() {
        assert_eq!(VoiceParam::Pitch(1.0).kind(), ParamKind::Pitch);
        assert_eq!(VoiceParam::Relative(true).kind(), ParamKind::Relative);
        assert_eq!(
            VoiceParam::Direction(Vec3::X).kind(),
            ParamKind::Direction
        );
    }
}
