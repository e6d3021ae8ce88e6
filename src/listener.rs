use crate::backend::ListenerParam;
use crate::math::{Orientation, Vec3};

/// The single point sources are heard from.
///
/// A plain value: build it, then push it with
/// [`VoiceManager::apply_listener`](crate::VoiceManager::apply_listener)
/// whenever the camera moves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Listener {
    pub position: Vec3,
    pub velocity: Vec3,
    pub orientation: Orientation,
    pub volume: f32,
}

impl Default for Listener {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            orientation: Orientation::identity(),
            volume: 1.0,
        }
    }
}

impl Listener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn velocity(mut self, velocity: Vec3) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    /// Parameters in the order they are pushed.
    pub(crate) fn params(&self) -> [ListenerParam; 4] {
        [
            ListenerParam::Position(self.position),
            ListenerParam::Velocity(self.velocity),
            ListenerParam::Orientation {
                at: self.orientation.at,
                up: self.orientation.up,
            },
            ListenerParam::Volume(self.volume),
        ]
    }
}
