//! Moves content onto voices: binds static clips, keeps streaming queues fed.

use crate::audio::{Audio, AudioContent};
use crate::backend::{AudioBackend, HandleId};
use crate::pool::HandlePool;

/// Attach, refill and detach for both kinds of content.
///
/// Owns the scratch buffer chunks are read into, so it lives inside the
/// manager's table lock together with the buffer pool it borrows from.
#[derive(Debug)]
pub(crate) struct StreamingFiller {
    buffers_per_stream: usize,
    scratch: Vec<u8>,
}

impl StreamingFiller {
    pub(crate) fn new(chunk_size: usize, buffers_per_stream: usize) -> Self {
        Self {
            buffers_per_stream,
            scratch: vec![0; chunk_size],
        }
    }

    /// Put `audio` on `voice`.
    ///
    /// Returns the streaming buffers now queued on the voice (empty for a
    /// static clip), or `None` when the content could not be attached.
    pub(crate) fn attach(
        &mut self,
        backend: &dyn AudioBackend,
        voice: HandleId,
        audio: &Audio,
        pool: &mut HandlePool,
    ) -> Option<Vec<HandleId>> {
        match audio.content() {
            AudioContent::Static(clip) => {
                let Some(buffer) = clip.bind(backend, audio.info()) else {
                    log::warn!("No buffer available for static audio {}", audio.id());
                    return None;
                };
                backend.bind_buffer(voice, Some(buffer));
                Some(Vec::new())
            }
            AudioContent::Streaming(stream) => {
                if !stream.claim(voice) {
                    log::warn!(
                        "Audio {} is already streaming on voice {:?}; refusing voice {}",
                        audio.id(),
                        stream.attached_to(),
                        voice
                    );
                    return None;
                }

                // Drop whatever a previous static clip left bound
                backend.bind_buffer(voice, None);

                let info = audio.info();
                let mut held = Vec::with_capacity(self.buffers_per_stream);
                while held.len() < self.buffers_per_stream {
                    let Some(buffer) = pool.acquire() else {
                        log::debug!("Streaming pool exhausted after {} buffers", held.len());
                        break;
                    };
                    let n = stream.read_chunk(&mut self.scratch);
                    if n == 0 {
                        pool.release(buffer);
                        break;
                    }
                    backend.upload_buffer_data(buffer, info.format, &self.scratch[..n], info.sample_rate);
                    backend.queue_buffer(voice, buffer);
                    held.push(buffer);
                }

                log::debug!("Queued {} streaming buffers on voice {}", held.len(), voice);
                Some(held)
            }
        }
    }

    /// Recycle the buffers the voice finished playing.
    ///
    /// Returns how many times a looping stream was rewound.
    pub(crate) fn refill(
        &mut self,
        backend: &dyn AudioBackend,
        voice: HandleId,
        audio: &Audio,
        looping: bool,
        held: &mut Vec<HandleId>,
        pool: &mut HandlePool,
    ) -> usize {
        let stream = match audio.content() {
            AudioContent::Static(_) => return 0,
            AudioContent::Streaming(stream) => stream,
        };

        let info = audio.info();
        let mut loops = 0;
        for _ in 0..backend.processed_buffer_count(voice) {
            let Some(buffer) = backend.unqueue_buffer(voice) else {
                break;
            };
            held.retain(|b| *b != buffer);

            let mut n = stream.read_chunk(&mut self.scratch);
            if n == 0 && looping {
                stream.rewind();
                loops += 1;
                n = stream.read_chunk(&mut self.scratch);
            }

            if n > 0 {
                backend.upload_buffer_data(buffer, info.format, &self.scratch[..n], info.sample_rate);
                backend.queue_buffer(voice, buffer);
                held.push(buffer);
            } else {
                // End of stream: the queue shrinks until the voice stops
                pool.release(buffer);
            }
        }
        loops
    }

    /// Take `audio` off `voice`, stopping it and returning every buffer it
    /// held to the pool.
    pub(crate) fn detach(
        &mut self,
        backend: &dyn AudioBackend,
        voice: HandleId,
        audio: &Audio,
        held: Vec<HandleId>,
        pool: &mut HandlePool,
    ) {
        backend.stop(voice);
        match audio.content() {
            AudioContent::Static(clip) => {
                backend.bind_buffer(voice, None);
                clip.unbind();
            }
            AudioContent::Streaming(stream) => {
                // Stopping marked every queued buffer processed
                for _ in 0..held.len() {
                    backend.unqueue_buffer(voice);
                }
                backend.bind_buffer(voice, None);
                for buffer in held {
                    pool.release(buffer);
                }
                stream.release(voice);
            }
        }
    }
}
