//! Content providers and decoding.
//!
//! Streaming content is fed through the [`Data`] trait: the filler asks for
//! fixed-size chunks of raw PCM and rewinds the provider when a looping stream
//! runs dry. [`MemoryData`] serves PCM already in memory; [`SymphoniaData`]
//! decodes a file on the fly. [`load_static`] decodes a whole file into a
//! static [`Audio`](crate::Audio).

mod load_options;
mod resampler;
mod symphonia_loader;

pub use load_options::LoadOptions;
pub use resampler::AudioResampler;
pub use symphonia_loader::{SymphoniaData, load_static, open_streaming};

use crate::error::Result;
use std::sync::Arc;

/// Source of raw PCM for a streaming voice.
///
/// Implemented by decoders. The bytes returned must be in the layout given by
/// the owning content's [`AudioInfo`](crate::AudioInfo).
pub trait Data: Send {
    /// Rewind to the start of the stream.
    fn reset(&mut self);

    /// Fill `buf` with the next bytes of the stream and return how many were
    /// written. `Ok(0)` means end of stream. Errors are treated the same way
    /// by the filler.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Release the underlying stream. Called once, when the content is
    /// disposed; the provider is not read again afterwards.
    fn close(&mut self);
}

/// A provider over PCM bytes held in memory.
#[derive(Debug, Clone)]
pub struct MemoryData {
    bytes: Arc<[u8]>,
    cursor: usize,
}

impl MemoryData {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
            cursor: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Bytes not read yet.
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.cursor
    }
}

impl Data for MemoryData {
    fn reset(&mut self) {
        self.cursor = 0;
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.remaining().min(buf.len());
        buf[..n].copy_from_slice(&self.bytes[self.cursor..self.cursor + n]);
        self.cursor += n;
        Ok(n)
    }

    fn close(&mut self) {
        self.cursor = self.bytes.len();
    }
}

/// Convert interleaved f32 samples to signed 16-bit little-endian PCM.
pub(crate) fn f32_to_pcm16(samples: &[f32], out: &mut Vec<u8>) {
    out.reserve(samples.len() * 2);
    for &sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        out.extend_from_slice(&value.to_le_bytes());
    }
}
