//! The voice manager: assigns pooled hardware voices to sources, keeps them
//! in sync with the sources' parameters, and takes them back once they stop.
//!
//! # Locking
//!
//! Each [`AudioSource`] has its own lock; the manager has one table lock over
//! both pools and the active voice table. When both are needed the source
//! lock is always taken first. `pause`/`resume`/`stop` only take the source
//! lock, so they never wait on a sweep over other sources.

use crate::audio::Audio;
use crate::backend::{AudioBackend, HandleId, ListenerParam, VoiceState};
use crate::config::VoicePoolDesc;
use crate::context::AudioContext;
use crate::error::{PetalVoiceError, Result};
use crate::events::VoiceEvent;
use crate::filler::StreamingFiller;
use crate::listener::Listener;
use crate::pool::{HandleKind, HandlePool};
use crate::source::{ALL_PARAMS, AudioSource, DirtyParams, SourceState, dirty_kinds};
use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// A voice checked out of the pool.
#[derive(Debug)]
struct ActiveVoice {
    source: Arc<AudioSource>,
    /// Streaming buffers queued on the voice; empty for static content
    buffers: Vec<HandleId>,
}

#[derive(Debug)]
struct VoiceTable {
    voices: HandlePool,
    buffers: HandlePool,
    active: HashMap<HandleId, ActiveVoice>,
    filler: StreamingFiller,
    shut_down: bool,
}

/// Pooled voice manager.
///
/// Share it behind an `Arc`: game threads call the transport methods while an
/// [`UpdateTicker`](crate::UpdateTicker) (or the game loop) calls
/// [`update`](Self::update).
pub struct VoiceManager {
    desc: VoicePoolDesc,
    table: Mutex<VoiceTable>,
    event_sender: Sender<VoiceEvent>,
    event_receiver: Receiver<VoiceEvent>,
}

impl VoiceManager {
    /// Validate `desc` and generate both pools through the context's backend.
    ///
    /// # Errors
    ///
    /// [`PetalVoiceError::Configuration`] for an invalid descriptor,
    /// [`PetalVoiceError::Backend`] if the context is closed or the backend
    /// could not generate a single voice.
    pub fn new(ctx: &AudioContext, desc: VoicePoolDesc) -> Result<Self> {
        desc.validate()?;

        if !ctx.is_open() {
            return Err(PetalVoiceError::Backend(
                "Cannot create voice pools on a closed context".to_string(),
            ));
        }

        let backend = ctx.backend();
        let mut voices = HandlePool::fill(HandleKind::Voice, backend, desc.max_sources);
        if voices.capacity() == 0 {
            voices.drain(backend);
            return Err(PetalVoiceError::Backend(format!(
                "{} backend generated no voices",
                backend.name()
            )));
        }
        let buffers = HandlePool::fill(HandleKind::Buffer, backend, desc.streaming_pool_size);

        let (event_sender, event_receiver) = unbounded();

        log::info!(
            "VoiceManager ready: {} voices, {} streaming buffers ({} per stream)",
            voices.capacity(),
            buffers.capacity(),
            desc.buffers_per_stream
        );

        Ok(Self {
            table: Mutex::new(VoiceTable {
                voices,
                buffers,
                active: HashMap::new(),
                filler: StreamingFiller::new(desc.chunk_size, desc.buffers_per_stream),
                shut_down: false,
            }),
            desc,
            event_sender,
            event_receiver,
        })
    }

    /// Create a source whose pitch and volume setters accept the ranges
    /// configured in the descriptor.
    pub fn source(&self, audio: Arc<Audio>) -> Arc<AudioSource> {
        AudioSource::with_ranges(
            audio,
            self.desc.pitch_range.clone(),
            self.desc.volume_range.clone(),
        )
    }

    /// Start `source` from the beginning.
    ///
    /// A source without a voice gets one from the pool; when none is free the
    /// request is dropped. A source that already has a voice is stopped,
    /// detached and restarted on the same voice.
    pub fn play(&self, ctx: &AudioContext, source: &Arc<AudioSource>) {
        let backend = ctx.backend();
        let mut s = source.lock();
        let mut table = self.table.lock();
        if table.shut_down {
            log::warn!("play({}) after shutdown ignored", source.id());
            return;
        }
        let VoiceTable {
            voices,
            buffers,
            active,
            filler,
            ..
        } = &mut *table;

        let voice = match s.voice {
            Some(voice) => {
                if let Some(previous) = active.remove(&voice) {
                    filler.detach(
                        backend,
                        voice,
                        previous.source.audio(),
                        previous.buffers,
                        buffers,
                    );
                }
                log::debug!("Restarting {} on voice {}", source.id(), voice);
                voice
            }
            None => match voices.acquire() {
                Some(voice) => voice,
                None => {
                    log::debug!("No free voice, dropping play({})", source.id());
                    self.emit(VoiceEvent::Dropped {
                        source_id: source.id(),
                    });
                    return;
                }
            },
        };

        let streaming = source.audio().is_streaming();
        for kind in ALL_PARAMS {
            backend.set_voice_param(voice, s.param(kind, streaming));
        }
        s.dirty = DirtyParams::empty();

        match filler.attach(backend, voice, source.audio(), buffers) {
            Some(held) => {
                active.insert(
                    voice,
                    ActiveVoice {
                        source: Arc::clone(source),
                        buffers: held,
                    },
                );
                s.voice = Some(voice);
                backend.play(voice);
                log::debug!("{} playing on voice {}", source.id(), voice);
                self.emit(VoiceEvent::Started {
                    source_id: source.id(),
                    voice,
                });
            }
            None => {
                voices.release(voice);
                s.voice = None;
                self.emit(VoiceEvent::Dropped {
                    source_id: source.id(),
                });
            }
        }
    }

    /// Pause a playing source. Anything else is left alone.
    pub fn pause(&self, ctx: &AudioContext, source: &AudioSource) {
        let s = source.lock();
        if let Some(voice) = s.voice {
            let backend = ctx.backend();
            if backend.voice_state(voice) == VoiceState::Playing {
                backend.pause(voice);
            }
        }
    }

    /// Resume a paused source. Anything else is left alone.
    pub fn resume(&self, ctx: &AudioContext, source: &AudioSource) {
        let s = source.lock();
        if let Some(voice) = s.voice {
            let backend = ctx.backend();
            if backend.voice_state(voice) == VoiceState::Paused {
                backend.play(voice);
            }
        }
    }

    /// Stop a source. Its voice goes back to the pool on the next
    /// [`update`](Self::update).
    pub fn stop(&self, ctx: &AudioContext, source: &AudioSource) {
        let s = source.lock();
        if let Some(voice) = s.voice {
            let backend = ctx.backend();
            if backend.voice_state(voice) != VoiceState::Stopped {
                backend.stop(voice);
            }
        }
    }

    /// Backend state of the source's voice; `Stopped` when it has none.
    pub fn state(&self, ctx: &AudioContext, source: &AudioSource) -> VoiceState {
        match source.voice() {
            Some(voice) => ctx.backend().voice_state(voice),
            None => VoiceState::Stopped,
        }
    }

    pub fn pause_all(&self, ctx: &AudioContext) {
        for source in self.active_sources() {
            self.pause(ctx, &source);
        }
    }

    pub fn resume_all(&self, ctx: &AudioContext) {
        for source in self.active_sources() {
            self.resume(ctx, &source);
        }
    }

    pub fn stop_all(&self, ctx: &AudioContext) {
        for source in self.active_sources() {
            self.stop(ctx, &source);
        }
    }

    /// One maintenance sweep over the active voices.
    ///
    /// Stopped voices are reclaimed. Playing and paused voices receive the
    /// parameters changed since the last sweep, and streaming voices get their
    /// processed buffers refilled.
    pub fn update(&self, ctx: &AudioContext) {
        let backend = ctx.backend();
        let snapshot: Vec<(HandleId, Arc<AudioSource>)> = self
            .table
            .lock()
            .active
            .iter()
            .map(|(voice, entry)| (*voice, Arc::clone(&entry.source)))
            .collect();

        for (voice, source) in snapshot {
            let mut s = source.lock();
            // Reclaimed or handed elsewhere since the snapshot
            if s.voice != Some(voice) {
                continue;
            }

            if backend.voice_state(voice) == VoiceState::Stopped {
                let mut table = self.table.lock();
                self.reclaim(backend, &mut table, &source, &mut s, voice);
                continue;
            }

            let streaming = source.audio().is_streaming();
            for kind in dirty_kinds(s.take_dirty()) {
                backend.set_voice_param(voice, s.param(kind, streaming));
            }

            if streaming {
                let mut table = self.table.lock();
                let VoiceTable {
                    buffers,
                    active,
                    filler,
                    ..
                } = &mut *table;
                if let Some(entry) = active.get_mut(&voice) {
                    let loops = filler.refill(
                        backend,
                        voice,
                        source.audio(),
                        s.looping,
                        &mut entry.buffers,
                        buffers,
                    );
                    for _ in 0..loops {
                        self.emit(VoiceEvent::Looped {
                            source_id: source.id(),
                            voice,
                        });
                    }
                }
            }
        }
    }

    /// Stop `source` and return its voice to the pool right away, instead of
    /// waiting for the next sweep. Call this before dropping a source or
    /// disposing of its content.
    pub fn release(&self, ctx: &AudioContext, source: &AudioSource) {
        let mut s = source.lock();
        if let Some(voice) = s.voice {
            let mut table = self.table.lock();
            self.reclaim(ctx.backend(), &mut table, source, &mut s, voice);
        }
    }

    /// Reclaim every voice and delete all pooled handles.
    ///
    /// The manager accepts no more `play` calls afterwards. Must run before
    /// the context is shut down.
    pub fn shutdown(&self, ctx: &AudioContext) {
        {
            let mut table = self.table.lock();
            if table.shut_down {
                return;
            }
            // No voice can be checked out past this point
            table.shut_down = true;
        }

        for source in self.active_sources() {
            self.release(ctx, &source);
        }

        let backend = ctx.backend();
        let mut table = self.table.lock();
        table.voices.drain(backend);
        table.buffers.drain(backend);
        log::info!("VoiceManager shut down");
    }

    /// Push every listener parameter. A volume outside the configured range
    /// is skipped.
    pub fn apply_listener(&self, ctx: &AudioContext, listener: &Listener) {
        let backend = ctx.backend();
        for param in listener.params() {
            if let ListenerParam::Volume(volume) = param {
                if !self.desc.volume_range.contains(&volume) {
                    log::debug!("Listener volume {} out of range; not applied", volume);
                    continue;
                }
            }
            backend.set_listener_param(param);
        }
    }

    /// Drain the events raised since the last call.
    pub fn poll_events(&self) -> Vec<VoiceEvent> {
        self.event_receiver.try_iter().collect()
    }

    pub fn free_voices(&self) -> usize {
        self.table.lock().voices.available()
    }

    pub fn free_buffers(&self) -> usize {
        self.table.lock().buffers.available()
    }

    pub fn active_voices(&self) -> usize {
        self.table.lock().active.len()
    }

    pub fn desc(&self) -> &VoicePoolDesc {
        &self.desc
    }

    fn active_sources(&self) -> Vec<Arc<AudioSource>> {
        self.table
            .lock()
            .active
            .values()
            .map(|entry| Arc::clone(&entry.source))
            .collect()
    }

    /// Detach the content, drop the table entry and return the voice. Needs
    /// both the source lock and the table lock.
    fn reclaim(
        &self,
        backend: &dyn AudioBackend,
        table: &mut VoiceTable,
        source: &AudioSource,
        s: &mut SourceState,
        voice: HandleId,
    ) {
        let VoiceTable {
            voices,
            buffers,
            active,
            filler,
            ..
        } = table;

        let Some(entry) = active.remove(&voice) else {
            return;
        };
        filler.detach(backend, voice, entry.source.audio(), entry.buffers, buffers);
        voices.release(voice);
        s.voice = None;

        log::debug!("Reclaimed voice {} from {}", voice, source.id());
        self.emit(VoiceEvent::Reclaimed {
            source_id: source.id(),
            voice,
        });
    }

    fn emit(&self, event: VoiceEvent) {
        // The receiver lives as long as the manager
        let _ = self.event_sender.send(event);
    }
}

impl Drop for VoiceManager {
    fn drop(&mut self) {
        let table = self.table.get_mut();
        if !table.shut_down {
            log::warn!(
                "VoiceManager dropped without shutdown; {} voices and {} buffers leak",
                table.voices.capacity(),
                table.buffers.capacity()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioInfo;
    use crate::backend::{ParamKind, PcmFormat, SimulatedBackend, VoiceParam};
    use crate::math::Vec3;

    fn setup(max_sources: usize) -> (SimulatedBackend, AudioContext, VoiceManager) {
        let _ = env_logger::builder().is_test(true).try_init();
        let backend = SimulatedBackend::new();
        let ctx = AudioContext::init(backend.clone()).unwrap();
        let desc = VoicePoolDesc::new()
            .max_sources(max_sources)
            .buffers_per_stream(2)
            .chunk_size(8);
        let manager = VoiceManager::new(&ctx, desc).unwrap();
        (backend, ctx, manager)
    }

    fn clip() -> Arc<AudioSource> {
        let info = AudioInfo::for_pcm(PcmFormat::Mono16, 8000, 64);
        AudioSource::new(Audio::from_static(info, vec![0; 64]))
    }

    #[test]
    fn play_assigns_voice_and_pushes_everything() {
        let (backend, ctx, manager) = setup(2);
        let source = clip();
        source.set_volume(0.5);

        manager.play(&ctx, &source);
        let voice = source.voice().unwrap();
        assert_eq!(backend.state_of(voice), Some(VoiceState::Playing));
        assert_eq!(backend.param_pushes(voice), ALL_PARAMS.len());
        assert_eq!(
            backend.param(voice, ParamKind::Volume),
            Some(VoiceParam::Volume(0.5))
        );
        assert!(source.dirty().is_empty());
        assert_eq!(manager.free_voices(), 1);
        assert_eq!(
            manager.poll_events(),
            vec![VoiceEvent::Started {
                source_id: source.id(),
                voice
            }]
        );
    }

    #[test]
    fn update_pushes_only_dirty_params() {
        let (backend, ctx, manager) = setup(1);
        let source = clip();
        manager.play(&ctx, &source);
        let voice = source.voice().unwrap();
        let base = backend.param_pushes(voice);

        source.set_position(Vec3::new(1.0, 0.0, 0.0));
        manager.update(&ctx);
        assert_eq!(backend.param_pushes(voice), base + 1);
        manager.update(&ctx);
        assert_eq!(backend.param_pushes(voice), base + 1);
    }

    #[test]
    fn stopped_voice_is_reclaimed() {
        let (backend, ctx, manager) = setup(1);
        let source = clip();
        manager.play(&ctx, &source);
        let voice = source.voice().unwrap();

        backend.finish(voice);
        manager.update(&ctx);
        assert!(source.voice().is_none());
        assert_eq!(manager.free_voices(), 1);
        assert_eq!(manager.active_voices(), 0);
    }

    #[test]
    fn release_reclaims_immediately() {
        let (_backend, ctx, manager) = setup(1);
        let source = clip();
        manager.play(&ctx, &source);
        manager.release(&ctx, &source);
        assert!(source.voice().is_none());
        assert_eq!(manager.free_voices(), 1);
    }

    #[test]
    fn listener_volume_is_range_checked() {
        let (backend, ctx, manager) = setup(1);
        manager.apply_listener(&ctx, &Listener::new().volume(3.0));
        let pushed = backend.listener_params();
        assert_eq!(pushed.len(), 3);
        assert!(!pushed.iter().any(|p| matches!(p, ListenerParam::Volume(_))));
    }

    #[test]
    fn shutdown_deletes_all_handles() {
        let (backend, ctx, manager) = setup(2);
        let source = clip();
        manager.play(&ctx, &source);
        manager.shutdown(&ctx);
        assert_eq!(backend.live_voices(), 0);
        // Only the static clip's own buffer remains until it is disposed
        assert_eq!(backend.live_buffers(), 1);
        source.audio().dispose(&ctx).unwrap();
        assert_eq!(backend.live_buffers(), 0);

        manager.play(&ctx, &source);
        assert!(source.voice().is_none());
    }

    #[test]
    fn sources_follow_configured_ranges() {
        let backend = SimulatedBackend::new();
        let ctx = AudioContext::init(backend).unwrap();
        let desc = VoicePoolDesc::new()
            .max_sources(1)
            .pitch_range(0.25..=4.0)
            .volume_range(0.0..=2.0);
        let manager = VoiceManager::new(&ctx, desc).unwrap();

        let info = AudioInfo::for_pcm(PcmFormat::Mono16, 8000, 64);
        let audio = Audio::from_static(info, vec![0; 64]);
        let source = manager.source(audio.clone());
        assert!(source.set_pitch(3.0));
        assert!(source.set_volume(1.5));
        assert!(!source.set_pitch(5.0));

        let plain = AudioSource::new(audio);
        assert!(!plain.set_pitch(3.0));
        manager.shutdown(&ctx);
    }

    #[test]
    fn disposed_clip_cannot_play_again() {
        let (backend, ctx, manager) = setup(1);
        let source = clip();
        manager.play(&ctx, &source);
        manager.release(&ctx, &source);
        source.audio().dispose(&ctx).unwrap();
        manager.poll_events();

        manager.play(&ctx, &source);
        assert!(source.voice().is_none());
        assert_eq!(manager.free_voices(), 1);
        assert_eq!(
            manager.poll_events(),
            vec![VoiceEvent::Dropped {
                source_id: source.id()
            }]
        );

        manager.shutdown(&ctx);
        assert_eq!(backend.live_buffers(), 0);
        assert_eq!(backend.live_voices(), 0);
    }

    #[test]
    fn shutdown_racing_play_deletes_every_voice() {
        let _ = env_logger::builder().is_test(true).try_init();
        let backend = SimulatedBackend::new();
        let ctx = Arc::new(AudioContext::init(backend.clone()).unwrap());
        let manager = Arc::new(VoiceManager::new(&ctx, VoicePoolDesc::new().max_sources(64)).unwrap());
        let info = AudioInfo::for_pcm(PcmFormat::Mono16, 8000, 64);
        let audio = Audio::from_static(info, vec![0; 64]);

        let player = {
            let ctx = ctx.clone();
            let manager = manager.clone();
            let audio = audio.clone();
            std::thread::spawn(move || {
                for _ in 0..64 {
                    manager.play(&ctx, &AudioSource::new(audio.clone()));
                }
            })
        };
        manager.shutdown(&ctx);
        player.join().unwrap();

        assert_eq!(backend.live_voices(), 0);
        assert_eq!(manager.active_voices(), 0);
        assert!(audio.dispose(&ctx).is_ok());
    }

    #[test]
    fn invalid_desc_is_rejected() {
        let backend = SimulatedBackend::new();
        let ctx = AudioContext::init(backend).unwrap();
        let err = VoiceManager::new(&ctx, VoicePoolDesc::new().max_sources(0));
        assert!(matches!(err, Err(PetalVoiceError::Configuration(_))));
    }
}
