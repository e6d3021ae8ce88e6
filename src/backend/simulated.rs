//! Headless backend that tracks handles, queues and parameters without
//! producing sound.
//!
//! Playback never advances on its own: the host decides when queued buffers
//! finish ([`SimulatedBackend::consume`]) and when a bound buffer reaches its
//! end ([`SimulatedBackend::finish`]). This makes it suitable for servers with
//! no audio device and for deterministic tests of the voice manager.

use super::{AudioBackend, HandleId, ListenerParam, ParamKind, PcmFormat, VoiceParam, VoiceState};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

#[derive(Debug)]
struct SimVoice {
    state: VoiceState,
    queued: VecDeque<HandleId>,
    processed: VecDeque<HandleId>,
    bound: Option<HandleId>,
    params: HashMap<ParamKind, VoiceParam>,
    param_pushes: usize,
}

impl SimVoice {
    fn new() -> Self {
        Self {
            state: VoiceState::Stopped,
            queued: VecDeque::new(),
            processed: VecDeque::new(),
            bound: None,
            params: HashMap::new(),
            param_pushes: 0,
        }
    }

    fn has_content(&self) -> bool {
        self.bound.is_some() || !self.queued.is_empty()
    }
}

#[derive(Debug, Default)]
struct SimBuffer {
    len: usize,
    format: Option<PcmFormat>,
    sample_rate: u32,
    uploads: usize,
}

#[derive(Debug, Default)]
struct SimState {
    context_open: bool,
    refuse_context: bool,
    next_handle: u32,
    voice_limit: Option<usize>,
    voices: HashMap<HandleId, SimVoice>,
    buffers: HashMap<HandleId, SimBuffer>,
    listener: Vec<ListenerParam>,
    commands: usize,
}

impl SimState {
    fn next_handle(&mut self) -> Option<HandleId> {
        self.next_handle = self.next_handle.checked_add(1)?;
        HandleId::new(self.next_handle)
    }
}

/// A backend with no device behind it. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct SimulatedBackend {
    inner: Arc<Mutex<SimState>>,
}

impl SimulatedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend that generates at most `limit` voices.
    pub fn with_voice_limit(limit: usize) -> Self {
        let backend = Self::new();
        backend.inner.lock().voice_limit = Some(limit);
        backend
    }

    /// A backend whose context creation always fails.
    pub fn unavailable() -> Self {
        let backend = Self::new();
        backend.inner.lock().refuse_context = true;
        backend
    }

    // === Playback driving ===

    /// Mark up to `count` queued buffers of `voice` as played. A playing voice
    /// whose queue runs dry stops, as a real device does on underrun.
    ///
    /// Returns the number of buffers that moved to the processed list.
    pub fn consume(&self, voice: HandleId, count: usize) -> usize {
        let mut state = self.inner.lock();
        let Some(v) = state.voices.get_mut(&voice) else {
            return 0;
        };
        if v.state != VoiceState::Playing {
            return 0;
        }

        let mut moved = 0;
        while moved < count {
            let Some(buffer) = v.queued.pop_front() else {
                break;
            };
            v.processed.push_back(buffer);
            moved += 1;
        }

        if v.queued.is_empty() && v.bound.is_none() {
            v.state = VoiceState::Stopped;
        }
        moved
    }

    /// Let a voice reach the end of whatever it plays.
    pub fn finish(&self, voice: HandleId) {
        let mut state = self.inner.lock();
        if let Some(v) = state.voices.get_mut(&voice) {
            let drained: Vec<_> = v.queued.drain(..).collect();
            v.processed.extend(drained);
            v.state = VoiceState::Stopped;
        }
    }

    // === Inspection ===

    pub fn context_open(&self) -> bool {
        self.inner.lock().context_open
    }

    /// Number of state-changing calls received (queries are not counted).
    pub fn command_count(&self) -> usize {
        self.inner.lock().commands
    }

    pub fn live_voices(&self) -> usize {
        self.inner.lock().voices.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.inner.lock().buffers.len()
    }

    pub fn state_of(&self, voice: HandleId) -> Option<VoiceState> {
        self.inner.lock().voices.get(&voice).map(|v| v.state)
    }

    pub fn queued_buffers(&self, voice: HandleId) -> Vec<HandleId> {
        self.inner
            .lock()
            .voices
            .get(&voice)
            .map(|v| v.queued.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn processed_buffers(&self, voice: HandleId) -> Vec<HandleId> {
        self.inner
            .lock()
            .voices
            .get(&voice)
            .map(|v| v.processed.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn bound_buffer(&self, voice: HandleId) -> Option<HandleId> {
        self.inner.lock().voices.get(&voice).and_then(|v| v.bound)
    }

    /// Last value pushed for a parameter of a voice.
    pub fn param(&self, voice: HandleId, kind: ParamKind) -> Option<VoiceParam> {
        self.inner
            .lock()
            .voices
            .get(&voice)
            .and_then(|v| v.params.get(&kind).copied())
    }

    /// Total parameter pushes received by a voice.
    pub fn param_pushes(&self, voice: HandleId) -> usize {
        self.inner
            .lock()
            .voices
            .get(&voice)
            .map_or(0, |v| v.param_pushes)
    }

    /// Byte length of the last upload into a buffer.
    pub fn buffer_len(&self, buffer: HandleId) -> Option<usize> {
        self.inner.lock().buffers.get(&buffer).map(|b| b.len)
    }

    pub fn buffer_format(&self, buffer: HandleId) -> Option<(PcmFormat, u32)> {
        self.inner
            .lock()
            .buffers
            .get(&buffer)
            .and_then(|b| b.format.map(|f| (f, b.sample_rate)))
    }

    pub fn upload_count(&self, buffer: HandleId) -> usize {
        self.inner.lock().buffers.get(&buffer).map_or(0, |b| b.uploads)
    }

    /// Every listener parameter pushed so far, oldest first.
    pub fn listener_params(&self) -> Vec<ListenerParam> {
        self.inner.lock().listener.clone()
    }
}

impl AudioBackend for SimulatedBackend {
    fn create_context(&self) -> bool {
        let mut state = self.inner.lock();
        if state.refuse_context {
            return false;
        }
        state.context_open = true;
        true
    }

    fn destroy_context(&self) {
        let mut state = self.inner.lock();
        if !state.voices.is_empty() || !state.buffers.is_empty() {
            log::warn!(
                "Simulated context destroyed with {} voices and {} buffers still alive",
                state.voices.len(),
                state.buffers.len()
            );
        }
        state.context_open = false;
    }

    fn gen_voice(&self) -> Option<HandleId> {
        let mut state = self.inner.lock();
        if !state.context_open {
            return None;
        }
        if state.voice_limit.is_some_and(|limit| state.voices.len() >= limit) {
            return None;
        }
        let handle = state.next_handle()?;
        state.voices.insert(handle, SimVoice::new());
        state.commands += 1;
        Some(handle)
    }

    fn gen_buffer(&self) -> Option<HandleId> {
        let mut state = self.inner.lock();
        if !state.context_open {
            return None;
        }
        let handle = state.next_handle()?;
        state.buffers.insert(handle, SimBuffer::default());
        state.commands += 1;
        Some(handle)
    }

    fn delete_voice(&self, voice: HandleId) {
        let mut state = self.inner.lock();
        state.voices.remove(&voice);
        state.commands += 1;
    }

    fn delete_buffer(&self, buffer: HandleId) {
        let mut state = self.inner.lock();
        state.buffers.remove(&buffer);
        state.commands += 1;
    }

    fn play(&self, voice: HandleId) {
        let mut state = self.inner.lock();
        state.commands += 1;
        let Some(v) = state.voices.get_mut(&voice) else {
            return;
        };
        if v.state == VoiceState::Stopped {
            // A stopped voice replays its whole queue from the start.
            let rewound: Vec<_> = v.processed.drain(..).collect();
            for buffer in rewound.into_iter().rev() {
                v.queued.push_front(buffer);
            }
        }
        v.state = if v.has_content() {
            VoiceState::Playing
        } else {
            VoiceState::Stopped
        };
    }

    fn pause(&self, voice: HandleId) {
        let mut state = self.inner.lock();
        state.commands += 1;
        if let Some(v) = state.voices.get_mut(&voice) {
            if v.state == VoiceState::Playing {
                v.state = VoiceState::Paused;
            }
        }
    }

    fn stop(&self, voice: HandleId) {
        let mut state = self.inner.lock();
        state.commands += 1;
        if let Some(v) = state.voices.get_mut(&voice) {
            let drained: Vec<_> = v.queued.drain(..).collect();
            v.processed.extend(drained);
            v.state = VoiceState::Stopped;
        }
    }

    fn voice_state(&self, voice: HandleId) -> VoiceState {
        self.inner
            .lock()
            .voices
            .get(&voice)
            .map_or(VoiceState::Stopped, |v| v.state)
    }

    fn processed_buffer_count(&self, voice: HandleId) -> usize {
        self.inner
            .lock()
            .voices
            .get(&voice)
            .map_or(0, |v| v.processed.len())
    }

    fn queue_buffer(&self, voice: HandleId, buffer: HandleId) {
        let mut state = self.inner.lock();
        state.commands += 1;
        if let Some(v) = state.voices.get_mut(&voice) {
            v.queued.push_back(buffer);
        }
    }

    fn unqueue_buffer(&self, voice: HandleId) -> Option<HandleId> {
        let mut state = self.inner.lock();
        state.commands += 1;
        state.voices.get_mut(&voice)?.processed.pop_front()
    }

    fn bind_buffer(&self, voice: HandleId, buffer: Option<HandleId>) {
        let mut state = self.inner.lock();
        state.commands += 1;
        if let Some(v) = state.voices.get_mut(&voice) {
            v.queued.clear();
            v.processed.clear();
            v.bound = buffer;
        }
    }

    fn upload_buffer_data(
        &self,
        buffer: HandleId,
        format: PcmFormat,
        data: &[u8],
        sample_rate: u32,
    ) {
        let mut state = self.inner.lock();
        state.commands += 1;
        if let Some(b) = state.buffers.get_mut(&buffer) {
            b.len = data.len();
            b.format = Some(format);
            b.sample_rate = sample_rate;
            b.uploads += 1;
        }
    }

    fn set_voice_param(&self, voice: HandleId, param: VoiceParam) {
        let mut state = self.inner.lock();
        state.commands += 1;
        if let Some(v) = state.voices.get_mut(&voice) {
            v.params.insert(param.kind(), param);
            v.param_pushes += 1;
        }
    }

    fn set_listener_param(&self, param: ListenerParam) {
        let mut state = self.inner.lock();
        state.commands += 1;
        state.listener.push(param);
    }

    fn name(&self) -> &'static str {
        "Simulated"
    }
}
