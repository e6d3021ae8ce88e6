//! Configuration for PetalVoice

use crate::error::{PetalVoiceError, Result};
use std::ops::RangeInclusive;
use std::time::Duration;

/// Default number of hardware voices.
pub const MAX_SOURCE: usize = 32;
/// Default number of streaming buffers a single voice may hold.
pub const MAX_BUFFER_COUNT: usize = 5;
/// Default size of the shared streaming buffer pool.
pub const MAX_BUFFER_STREAMING: usize = MAX_BUFFER_COUNT * MAX_SOURCE;
/// Default streaming chunk size in bytes.
pub const STREAMING_CHUNK_SIZE: usize = 32 * 1024;
/// Default interval between two `update()` sweeps.
pub const UPDATE_INTERVAL: Duration = Duration::from_millis(50);

pub const MIN_PITCH: f32 = 0.5;
pub const MAX_PITCH: f32 = 2.0;
pub const MIN_VOLUME: f32 = 0.0;
pub const MAX_VOLUME: f32 = 1.0;

/// Capacity limits and tunables for a [`VoiceManager`](crate::VoiceManager).
#[derive(Debug, Clone)]
pub struct VoicePoolDesc {
    /// Number of hardware voices generated at startup
    pub max_sources: usize,
    /// Buffers queued on one streaming voice
    pub buffers_per_stream: usize,
    /// Streaming buffers generated at startup, shared by all streaming voices
    pub streaming_pool_size: usize,
    /// Bytes pulled from a provider per streaming buffer
    pub chunk_size: usize,
    /// Interval used by [`UpdateTicker`](crate::UpdateTicker)
    pub update_interval: Duration,
    /// Accepted pitch values; anything outside is rejected by the setter
    pub pitch_range: RangeInclusive<f32>,
    /// Accepted volume values; anything outside is rejected by the setter
    pub volume_range: RangeInclusive<f32>,
}

impl Default for VoicePoolDesc {
    fn default() -> Self {
        Self {
            max_sources: MAX_SOURCE,
            buffers_per_stream: MAX_BUFFER_COUNT,
            streaming_pool_size: MAX_BUFFER_STREAMING,
            chunk_size: STREAMING_CHUNK_SIZE,
            update_interval: UPDATE_INTERVAL,
            pitch_range: MIN_PITCH..=MAX_PITCH,
            volume_range: MIN_VOLUME..=MAX_VOLUME,
        }
    }
}

impl VoicePoolDesc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the voice count and resizes the streaming pool to match.
    pub fn max_sources(mut self, max: usize) -> Self {
        self.max_sources = max;
        self.streaming_pool_size = self.buffers_per_stream * max;
        self
    }

    /// Sets the per-voice buffer count and resizes the streaming pool to match.
    pub fn buffers_per_stream(mut self, count: usize) -> Self {
        self.buffers_per_stream = count;
        self.streaming_pool_size = count * self.max_sources;
        self
    }

    pub fn streaming_pool_size(mut self, size: usize) -> Self {
        self.streaming_pool_size = size;
        self
    }

    pub fn chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes;
        self
    }

    pub fn update_interval(mut self, interval: Duration) -> Self {
        self.update_interval = interval;
        self
    }

    pub fn pitch_range(mut self, range: RangeInclusive<f32>) -> Self {
        self.pitch_range = range;
        self
    }

    pub fn volume_range(mut self, range: RangeInclusive<f32>) -> Self {
        self.volume_range = range;
        self
    }

    /// Checks that the descriptor describes a usable pool.
    pub fn validate(&self) -> Result<()> {
        if self.max_sources == 0 {
            return Err(PetalVoiceError::Configuration(
                "max_sources must be greater than 0".to_string(),
            ));
        }

        if self.buffers_per_stream == 0 {
            return Err(PetalVoiceError::Configuration(
                "buffers_per_stream must be greater than 0".to_string(),
            ));
        }

        if self.streaming_pool_size < self.buffers_per_stream {
            return Err(PetalVoiceError::Configuration(format!(
                "streaming_pool_size ({}) cannot hold one stream of {} buffers",
                self.streaming_pool_size, self.buffers_per_stream
            )));
        }

        if self.chunk_size == 0 {
            return Err(PetalVoiceError::Configuration(
                "chunk_size must be greater than 0".to_string(),
            ));
        }

        if self.update_interval.is_zero() {
            return Err(PetalVoiceError::Configuration(
                "update_interval must be greater than 0".to_string(),
            ));
        }

        for (name, range) in [("pitch", &self.pitch_range), ("volume", &self.volume_range)] {
            if range.is_empty() || !range.start().is_finite() || !range.end().is_finite() {
                return Err(PetalVoiceError::Configuration(format!(
                    "{} range {:?} is empty or not finite",
                    name, range
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_compiled_limits() {
        let desc = VoicePoolDesc::default();
        assert_eq!(desc.max_sources, 32);
        assert_eq!(desc.buffers_per_stream, 5);
        assert_eq!(desc.streaming_pool_size, 160);
        assert_eq!(desc.update_interval, Duration::from_millis(50));
        assert!(desc.validate().is_ok());
    }

    #[test]
    fn builder_keeps_streaming_pool_proportional() {
        let desc = VoicePoolDesc::new().max_sources(4).buffers_per_stream(3);
        assert_eq!(desc.streaming_pool_size, 12);

        let desc = desc.streaming_pool_size(6);
        assert_eq!(desc.streaming_pool_size, 6);
        assert!(desc.validate().is_ok());
    }

    #[test]
    fn validate_rejects_unusable_descriptors() {
        assert!(VoicePoolDesc::new().max_sources(0).validate().is_err());
        assert!(
            VoicePoolDesc::new()
                .buffers_per_stream(4)
                .streaming_pool_size(3)
                .validate()
                .is_err()
        );
        assert!(VoicePoolDesc::new().chunk_size(0).validate().is_err());
        assert!(
            VoicePoolDesc::new()
                .update_interval(Duration::ZERO)
                .validate()
                .is_err()
        );
        assert!(VoicePoolDesc::new().pitch_range(2.0..=0.5).validate().is_err());
    }
}
