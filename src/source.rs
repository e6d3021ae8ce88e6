//! Logical audio sources.
//!
//! An [`AudioSource`] is what game logic holds on to: the desired playback
//! parameters of one sound, whether or not a hardware voice currently backs
//! it. Setters only raise a dirty bit when the value actually changes; the
//! manager pushes dirty parameters to the voice on the next update sweep.

use crate::audio::Audio;
use crate::backend::{HandleId, ParamKind, VoiceParam};
use crate::config::{MAX_PITCH, MAX_VOLUME, MIN_PITCH, MIN_VOLUME};
use crate::math::Vec3;
use bitflags::bitflags;
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

bitflags! {
    /// Parameters changed since they were last pushed to the voice.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct DirtyParams: u16 {
        const POSITION           = 1 << 0;
        const DIRECTION          = 1 << 1;
        const VELOCITY           = 1 << 2;
        const PITCH              = 1 << 3;
        const VOLUME             = 1 << 4;
        const LOOPING            = 1 << 5;
        const RELATIVE           = 1 << 6;
        const CONE_INNER_ANGLE   = 1 << 7;
        const CONE_OUTER_ANGLE   = 1 << 8;
        const REFERENCE_DISTANCE = 1 << 9;
        const MAX_DISTANCE       = 1 << 10;
    }
}

impl From<ParamKind> for DirtyParams {
    fn from(kind: ParamKind) -> Self {
        match kind {
            ParamKind::Position => Self::POSITION,
            ParamKind::Direction => Self::DIRECTION,
            ParamKind::Velocity => Self::VELOCITY,
            ParamKind::Pitch => Self::PITCH,
            ParamKind::Volume => Self::VOLUME,
            ParamKind::Looping => Self::LOOPING,
            ParamKind::Relative => Self::RELATIVE,
            ParamKind::ConeInnerAngle => Self::CONE_INNER_ANGLE,
            ParamKind::ConeOuterAngle => Self::CONE_OUTER_ANGLE,
            ParamKind::ReferenceDistance => Self::REFERENCE_DISTANCE,
            ParamKind::MaxDistance => Self::MAX_DISTANCE,
        }
    }
}

/// Identity of a logical source, used in events and logs.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SourceId(u64);

impl SourceId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SourceId({})", self.0)
    }
}

/// Desired parameters of a source plus the voice binding.
#[derive(Debug)]
pub(crate) struct SourceState {
    pub(crate) position: Vec3,
    pub(crate) direction: Vec3,
    pub(crate) velocity: Vec3,
    pub(crate) pitch: f32,
    pub(crate) volume: f32,
    pub(crate) looping: bool,
    pub(crate) directional: bool,
    pub(crate) positional: bool,
    pub(crate) inner_angle: f32,
    pub(crate) outer_angle: f32,
    pub(crate) distance: f32,
    pub(crate) max_distance: f32,
    pub(crate) dirty: DirtyParams,
    pub(crate) voice: Option<HandleId>,
    pitch_range: RangeInclusive<f32>,
    volume_range: RangeInclusive<f32>,
}

impl SourceState {
    fn new(pitch_range: RangeInclusive<f32>, volume_range: RangeInclusive<f32>) -> Self {
        Self {
            position: Vec3::ZERO,
            direction: Vec3::ZERO,
            velocity: Vec3::ZERO,
            pitch: 1.0,
            volume: 1.0,
            looping: false,
            directional: false,
            positional: true,
            inner_angle: 360.0,
            outer_angle: 360.0,
            distance: 1.0,
            max_distance: f32::MAX,
            dirty: DirtyParams::empty(),
            voice: None,
            pitch_range,
            volume_range,
        }
    }

    /// Value of one parameter as the voice should receive it.
    ///
    /// Looping is only forwarded for static content: streaming content loops
    /// by rewinding its provider, and a looping voice would never drain.
    pub(crate) fn param(&self, kind: ParamKind, streaming: bool) -> VoiceParam {
        match kind {
            ParamKind::Position => {
                VoiceParam::Position(if self.positional { self.position } else { Vec3::ZERO })
            }
            ParamKind::Direction => {
                VoiceParam::Direction(if self.directional { self.direction } else { Vec3::ZERO })
            }
            ParamKind::Velocity => VoiceParam::Velocity(self.velocity),
            ParamKind::Pitch => VoiceParam::Pitch(self.pitch),
            ParamKind::Volume => VoiceParam::Volume(self.volume),
            ParamKind::Looping => VoiceParam::Looping(self.looping && !streaming),
            ParamKind::Relative => VoiceParam::Relative(!self.positional),
            ParamKind::ConeInnerAngle => VoiceParam::ConeInnerAngle(self.inner_angle),
            ParamKind::ConeOuterAngle => VoiceParam::ConeOuterAngle(self.outer_angle),
            ParamKind::ReferenceDistance => VoiceParam::ReferenceDistance(self.distance),
            ParamKind::MaxDistance => VoiceParam::MaxDistance(self.max_distance),
        }
    }

    /// Take the dirty set, leaving it empty.
    pub(crate) fn take_dirty(&mut self) -> DirtyParams {
        std::mem::take(&mut self.dirty)
    }

    fn mark(&mut self, flag: DirtyParams) {
        self.dirty.insert(flag);
    }
}

pub(crate) const ALL_PARAMS: [ParamKind; 11] = [
    ParamKind::Position,
    ParamKind::Direction,
    ParamKind::Velocity,
    ParamKind::Pitch,
    ParamKind::Volume,
    ParamKind::Looping,
    ParamKind::Relative,
    ParamKind::ConeInnerAngle,
    ParamKind::ConeOuterAngle,
    ParamKind::ReferenceDistance,
    ParamKind::MaxDistance,
];

/// Kinds contained in a dirty set, in push order.
pub(crate) fn dirty_kinds(dirty: DirtyParams) -> impl Iterator<Item = ParamKind> {
    ALL_PARAMS
        .into_iter()
        .filter(move |kind| dirty.contains(DirtyParams::from(*kind)))
}

/// A sound the game wants to control.
///
/// Cheap to share: game threads keep an `Arc<AudioSource>` and call setters
/// while the manager reads the same state from its update sweep. The internal
/// lock also serializes transport calls on one source.
pub struct AudioSource {
    id: SourceId,
    audio: Arc<Audio>,
    pub(crate) state: Mutex<SourceState>,
}

impl fmt::Debug for AudioSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioSource")
            .field("id", &self.id)
            .field("audio", &self.audio.id())
            .finish()
    }
}

macro_rules! write_if_different {
    ($state:ident . $field:ident = $value:expr, $flag:expr) => {{
        let value = $value;
        if $state.$field != value {
            $state.$field = value;
            $state.mark($flag);
        }
    }};
}

impl AudioSource {
    /// Create a source with the default pitch and volume ranges.
    pub fn new(audio: Arc<Audio>) -> Arc<Self> {
        Self::with_ranges(audio, MIN_PITCH..=MAX_PITCH, MIN_VOLUME..=MAX_VOLUME)
    }

    /// Create a source whose setters accept the given ranges.
    pub fn with_ranges(
        audio: Arc<Audio>,
        pitch_range: RangeInclusive<f32>,
        volume_range: RangeInclusive<f32>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: SourceId::next(),
            audio,
            state: Mutex::new(SourceState::new(pitch_range, volume_range)),
        })
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    pub fn audio(&self) -> &Arc<Audio> {
        &self.audio
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, SourceState> {
        self.state.lock()
    }

    /// Voice currently backing this source, if any.
    pub fn voice(&self) -> Option<HandleId> {
        self.state.lock().voice
    }

    /// Parameters waiting for the next update sweep.
    pub fn dirty(&self) -> DirtyParams {
        self.state.lock().dirty
    }

    // === Setters ===

    pub fn set_position(&self, position: Vec3) {
        let mut s = self.state.lock();
        write_if_different!(s.position = position, DirtyParams::POSITION);
    }

    pub fn set_direction(&self, direction: Vec3) {
        let mut s = self.state.lock();
        write_if_different!(s.direction = direction, DirtyParams::DIRECTION);
    }

    pub fn set_velocity(&self, velocity: Vec3) {
        let mut s = self.state.lock();
        write_if_different!(s.velocity = velocity, DirtyParams::VELOCITY);
    }

    /// Set the pitch multiplier. Values outside the pitch range are rejected
    /// and leave the source untouched; returns whether the value was accepted.
    pub fn set_pitch(&self, pitch: f32) -> bool {
        let mut s = self.state.lock();
        if !s.pitch_range.contains(&pitch) {
            log::debug!("{} rejected pitch {}", self.id, pitch);
            return false;
        }
        write_if_different!(s.pitch = pitch, DirtyParams::PITCH);
        true
    }

    /// Set the gain. Values outside the volume range are rejected and leave
    /// the source untouched; returns whether the value was accepted.
    pub fn set_volume(&self, volume: f32) -> bool {
        let mut s = self.state.lock();
        if !s.volume_range.contains(&volume) {
            log::debug!("{} rejected volume {}", self.id, volume);
            return false;
        }
        write_if_different!(s.volume = volume, DirtyParams::VOLUME);
        true
    }

    pub fn set_looping(&self, looping: bool) {
        let mut s = self.state.lock();
        write_if_different!(s.looping = looping, DirtyParams::LOOPING);
    }

    /// A directional source emits along its direction within its cone.
    pub fn set_directional(&self, directional: bool) {
        let mut s = self.state.lock();
        write_if_different!(s.directional = directional, DirtyParams::DIRECTION);
    }

    /// A non-positional source plays at the listener (no attenuation).
    pub fn set_positional(&self, positional: bool) {
        let mut s = self.state.lock();
        if s.positional != positional {
            s.positional = positional;
            s.mark(DirtyParams::RELATIVE | DirtyParams::POSITION);
        }
    }

    pub fn set_inner_angle(&self, degrees: f32) {
        let mut s = self.state.lock();
        write_if_different!(s.inner_angle = degrees, DirtyParams::CONE_INNER_ANGLE);
    }

    pub fn set_outer_angle(&self, degrees: f32) {
        let mut s = self.state.lock();
        write_if_different!(s.outer_angle = degrees, DirtyParams::CONE_OUTER_ANGLE);
    }

    /// Distance under which the volume is not attenuated.
    pub fn set_distance(&self, distance: f32) {
        let mut s = self.state.lock();
        write_if_different!(s.distance = distance, DirtyParams::REFERENCE_DISTANCE);
    }

    pub fn set_max_distance(&self, distance: f32) {
        let mut s = self.state.lock();
        write_if_different!(s.max_distance = distance, DirtyParams::MAX_DISTANCE);
    }

    // === Getters ===

    pub fn position(&self) -> Vec3 {
        self.state.lock().position
    }

    pub fn direction(&self) -> Vec3 {
        self.state.lock().direction
    }

    pub fn velocity(&self) -> Vec3 {
        self.state.lock().velocity
    }

    pub fn pitch(&self) -> f32 {
        self.state.lock().pitch
    }

    pub fn volume(&self) -> f32 {
        self.state.lock().volume
    }

    pub fn is_looping(&self) -> bool {
        self.state.lock().looping
    }

    pub fn is_directional(&self) -> bool {
        self.state.lock().directional
    }

    pub fn is_positional(&self) -> bool {
        self.state.lock().positional
    }

    pub fn inner_angle(&self) -> f32 {
        self.state.lock().inner_angle
    }

    pub fn outer_angle(&self) -> f32 {
        self.state.lock().outer_angle
    }

    pub fn distance(&self) -> f32 {
        self.state.lock().distance
    }

    pub fn max_distance(&self) -> f32 {
        self.state.lock().max_distance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{Audio, AudioInfo};
    use crate::backend::PcmFormat;
    use std::time::Duration;

    fn source() -> Arc<AudioSource> {
        let info = AudioInfo::new(PcmFormat::Mono16, 22050, Duration::from_millis(10));
        AudioSource::new(Audio::from_static(info, vec![0; 64]))
    }

    #[test]
    fn new_source_is_clean_and_unassigned() {
        let s = source();
        assert!(s.dirty().is_empty());
        assert!(s.voice().is_none());
        assert_eq!(s.pitch(), 1.0);
        assert_eq!(s.volume(), 1.0);
    }

    #[test]
    fn setters_only_mark_real_changes() {
        let s = source();
        s.set_position(Vec3::ZERO);
        s.set_looping(false);
        assert!(s.dirty().is_empty());

        s.set_position(Vec3::new(1.0, 2.0, 3.0));
        s.set_looping(true);
        assert_eq!(s.dirty(), DirtyParams::POSITION | DirtyParams::LOOPING);
    }

    #[test]
    fn out_of_range_pitch_and_volume_are_rejected() {
        let s = source();
        assert!(!s.set_pitch(0.4));
        assert!(!s.set_pitch(2.5));
        assert!(!s.set_volume(-0.1));
        assert!(!s.set_volume(1.5));
        assert_eq!(s.pitch(), 1.0);
        assert_eq!(s.volume(), 1.0);
        assert!(s.dirty().is_empty());

        assert!(s.set_pitch(2.0));
        assert!(s.set_volume(0.0));
        assert_eq!(s.dirty(), DirtyParams::PITCH | DirtyParams::VOLUME);
    }

    #[test]
    fn non_positional_source_sits_on_the_listener() {
        let s = source();
        s.set_position(Vec3::X);
        s.set_positional(false);
        let state = s.lock();
        assert!(state.dirty.contains(DirtyParams::RELATIVE));
        assert_eq!(
            state.param(ParamKind::Position, false),
            VoiceParam::Position(Vec3::ZERO)
        );
        assert_eq!(
            state.param(ParamKind::Relative, false),
            VoiceParam::Relative(true)
        );
    }

    #[test]
    fn streaming_voices_never_loop_in_hardware() {
        let s = source();
        s.set_looping(true);
        let state = s.lock();
        assert_eq!(
            state.param(ParamKind::Looping, true),
            VoiceParam::Looping(false)
        );
        assert_eq!(
            state.param(ParamKind::Looping, false),
            VoiceParam::Looping(true)
        );
    }

    #[test]
    fn dirty_kinds_follow_flags() {
        let kinds: Vec<_> = dirty_kinds(DirtyParams::VOLUME | DirtyParams::POSITION).collect();
        assert_eq!(kinds, vec![ParamKind::Position, ParamKind::Volume]);
        assert_eq!(dirty_kinds(DirtyParams::all()).count(), ALL_PARAMS.len());
    }
}
