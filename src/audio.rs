//! Playable content: fully decoded static clips and provider-fed streams.

use crate::audio_data::Data;
use crate::backend::{AudioBackend, HandleId, PcmFormat};
use crate::context::AudioContext;
use crate::error::{PetalVoiceError, Result};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Format information shared by both kinds of content.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioInfo {
    pub format: PcmFormat,
    pub sample_rate: u32,
    pub duration: Duration,
}

impl AudioInfo {
    pub fn new(format: PcmFormat, sample_rate: u32, duration: Duration) -> Self {
        Self {
            format,
            sample_rate,
            duration,
        }
    }

    /// Info for `len` bytes of PCM in the given layout.
    pub fn for_pcm(format: PcmFormat, sample_rate: u32, len: usize) -> Self {
        let frames = len / format.frame_size();
        let duration = if sample_rate == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(frames as f64 / sample_rate as f64)
        };
        Self::new(format, sample_rate, duration)
    }

    pub fn duration_ms(&self) -> u128 {
        self.duration.as_millis()
    }
}

/// A piece of content that sources can play.
///
/// Shared by every [`AudioSource`](crate::AudioSource) that references it.
/// Must be [disposed](Audio::dispose) through the context that played it to
/// release its hardware buffer or close its provider.
pub struct Audio {
    id: Uuid,
    info: AudioInfo,
    content: AudioContent,
}

/// The two kinds of content, matched exhaustively wherever content is
/// attached to, refilled on, or detached from a voice.
pub enum AudioContent {
    Static(StaticAudio),
    Streaming(StreamingAudio),
}

impl Audio {
    /// Content decoded up front. The PCM is uploaded to one hardware buffer
    /// the first time it plays, after which the host copy is dropped.
    pub fn from_static(info: AudioInfo, pcm: Vec<u8>) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            info,
            content: AudioContent::Static(StaticAudio {
                inner: Mutex::new(StaticInner {
                    buffer: None,
                    pcm: Some(pcm),
                    bindings: 0,
                    disposed: false,
                }),
            }),
        })
    }

    /// Content pulled chunk by chunk from a provider while it plays.
    pub fn from_streaming(info: AudioInfo, data: Box<dyn Data>) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            info,
            content: AudioContent::Streaming(StreamingAudio {
                inner: Mutex::new(StreamingInner {
                    data,
                    attached_to: None,
                    closed: false,
                }),
            }),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn info(&self) -> &AudioInfo {
        &self.info
    }

    pub fn content(&self) -> &AudioContent {
        &self.content
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self.content, AudioContent::Streaming(_))
    }

    /// Release what the content holds: the static buffer is deleted, the
    /// streaming provider is closed.
    ///
    /// # Errors
    ///
    /// Fails while the content is still attached to a voice; stop and let the
    /// manager reclaim those voices first.
    pub fn dispose(&self, ctx: &AudioContext) -> Result<()> {
        match &self.content {
            AudioContent::Static(audio) => audio.dispose(ctx.backend(), self.id),
            AudioContent::Streaming(audio) => audio.dispose(self.id),
        }
    }
}

impl fmt::Debug for Audio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.content {
            AudioContent::Static(_) => "Static",
            AudioContent::Streaming(_) => "Streaming",
        };
        f.debug_struct("Audio")
            .field("id", &self.id)
            .field("kind", &kind)
            .field("info", &self.info)
            .finish()
    }
}

// === Static ===

struct StaticInner {
    buffer: Option<HandleId>,
    pcm: Option<Vec<u8>>,
    bindings: usize,
    disposed: bool,
}

pub struct StaticAudio {
    inner: Mutex<StaticInner>,
}

impl StaticAudio {
    /// Hardware buffer holding the clip, uploading it on first use.
    ///
    /// Returns `None` once the clip is disposed, or when the backend cannot
    /// generate a buffer.
    pub(crate) fn bind(&self, backend: &dyn AudioBackend, info: &AudioInfo) -> Option<HandleId> {
        let mut inner = self.inner.lock();
        if inner.disposed {
            return None;
        }
        let buffer = match inner.buffer {
            Some(buffer) => buffer,
            None => {
                // Not uploaded yet, so the host copy is still there
                let pcm = inner.pcm.as_ref()?;
                let buffer = backend.gen_buffer()?;
                backend.upload_buffer_data(buffer, info.format, pcm, info.sample_rate);
                log::debug!("Uploaded {} bytes of static audio into buffer {}", pcm.len(), buffer);
                inner.pcm = None;
                inner.buffer = Some(buffer);
                buffer
            }
        };
        inner.bindings += 1;
        Some(buffer)
    }

    pub(crate) fn unbind(&self) {
        let mut inner = self.inner.lock();
        inner.bindings = inner.bindings.saturating_sub(1);
    }

    /// Buffer the clip lives in, once uploaded.
    pub fn buffer(&self) -> Option<HandleId> {
        self.inner.lock().buffer
    }

    /// Whether the host-side PCM is still held.
    pub fn has_host_copy(&self) -> bool {
        self.inner.lock().pcm.is_some()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.lock().disposed
    }

    fn dispose(&self, backend: &dyn AudioBackend, id: Uuid) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.bindings > 0 {
            return Err(PetalVoiceError::Engine(format!(
                "Audio {} is still bound to {} voices",
                id, inner.bindings
            )));
        }
        if let Some(buffer) = inner.buffer.take() {
            backend.delete_buffer(buffer);
        }
        inner.pcm = None;
        inner.disposed = true;
        Ok(())
    }
}

// === Streaming ===

struct StreamingInner {
    data: Box<dyn Data>,
    attached_to: Option<HandleId>,
    closed: bool,
}

pub struct StreamingAudio {
    inner: Mutex<StreamingInner>,
}

impl StreamingAudio {
    /// Reserve the stream for one voice. A stream has a single read cursor,
    /// so it cannot feed two voices at once.
    pub(crate) fn claim(&self, voice: HandleId) -> bool {
        let mut inner = self.inner.lock();
        if inner.closed {
            return false;
        }
        match inner.attached_to {
            Some(owner) if owner != voice => false,
            _ => {
                inner.attached_to = Some(voice);
                true
            }
        }
    }

    /// Give the stream up and rewind it for the next voice.
    pub(crate) fn release(&self, voice: HandleId) {
        let mut inner = self.inner.lock();
        if inner.attached_to == Some(voice) {
            inner.attached_to = None;
            if !inner.closed {
                inner.data.reset();
            }
        }
    }

    /// Pull the next chunk. Provider failures read as end of stream.
    pub(crate) fn read_chunk(&self, buf: &mut [u8]) -> usize {
        let mut inner = self.inner.lock();
        if inner.closed {
            return 0;
        }
        match inner.data.read(buf) {
            Ok(n) => n.min(buf.len()),
            Err(e) => {
                log::warn!("Streaming provider read failed, treating as end of stream: {}", e);
                0
            }
        }
    }

    pub(crate) fn rewind(&self) {
        let mut inner = self.inner.lock();
        if !inner.closed {
            inner.data.reset();
        }
    }

    /// Voice currently fed by this stream.
    pub fn attached_to(&self) -> Option<HandleId> {
        self.inner.lock().attached_to
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    fn dispose(&self, id: Uuid) -> Result<()> {
        let mut inner = self.inner.lock();
        if let Some(voice) = inner.attached_to {
            return Err(PetalVoiceError::Engine(format!(
                "Audio {} is still streaming on voice {}",
                id, voice
            )));
        }
        if !inner.closed {
            inner.data.close();
            inner.closed = true;
        }
        Ok(())
    }
}
