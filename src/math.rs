//! Math types for PetalVoice

pub use glam::Vec3;

/// Facing of the listener: the "at" vector and the "up" vector, as backends
/// expect them for the listener orientation parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Orientation {
    pub at: Vec3,
    pub up: Vec3,
}

impl Orientation {
    pub fn new(at: Vec3, up: Vec3) -> Self {
        Self { at, up }
    }

    /// Facing down -Z with +Y up.
    pub fn identity() -> Self {
        Self {
            at: -Vec3::Z,
            up: Vec3::Y,
        }
    }

    /// Orientation looking from `position` towards `target`, keeping `up`.
    pub fn look_at(position: Vec3, target: Vec3, up: Vec3) -> Self {
        let at = (target - position).normalize_or_zero();
        Self { at, up }
    }

    pub fn right(&self) -> Vec3 {
        self.at.cross(self.up).normalize_or_zero()
    }
}

impl Default for Orientation {
    fn default() -> Self {
        Self::identity()
    }
}
