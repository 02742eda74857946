//! Snap and bounds policy.
//!
//! Pure functions over explicit configuration. Nothing here reads the host.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use bdth_memory::Transform;

/// Grid spacing for snapped movement, clamped to `[MIN, MAX]`.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(from = "f32", into = "f32")]
pub struct GridIncrement(f32);

impl GridIncrement {
    pub const MIN: f32 = 0.001;
    pub const MAX: f32 = 10.0;
    pub const DEFAULT: f32 = 0.05;

    /// Clamp `value` into range. Non-finite input falls back to the default.
    pub fn new(value: f32) -> Self {
        if value.is_finite() {
            Self(value.clamp(Self::MIN, Self::MAX))
        } else {
            Self(Self::DEFAULT)
        }
    }

    #[inline]
    pub fn get(self) -> f32 {
        self.0
    }
}

impl Default for GridIncrement {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl From<f32> for GridIncrement {
    fn from(value: f32) -> Self {
        Self::new(value)
    }
}

impl From<GridIncrement> for f32 {
    fn from(grid: GridIncrement) -> Self {
        grid.0
    }
}

/// A transform change expressed in the axes of the active coordinate frame.
///
/// `rotation` is a scaled axis in radians.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct DeltaTransform {
    pub translation: Vec3,
    pub rotation: Vec3,
}

impl DeltaTransform {
    pub const ZERO: Self = Self {
        translation: Vec3::ZERO,
        rotation: Vec3::ZERO,
    };

    pub fn translation(translation: Vec3) -> Self {
        Self {
            translation,
            rotation: Vec3::ZERO,
        }
    }

    pub fn rotation(rotation: Vec3) -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.translation == Vec3::ZERO && self.rotation == Vec3::ZERO
    }
}

/// Round a value to the nearest multiple of `step`.
///
/// Idempotent: snapping a snapped value returns it unchanged, including
/// where f32 cannot represent the exact grid multiple.
pub fn snap_value(value: f32, step: f32) -> f32 {
    if !(step > 0.0) || !value.is_finite() {
        return value;
    }
    // Settles within two passes
    let mut snapped = round_to_step(value, step);
    for _ in 0..3 {
        let again = round_to_step(snapped, step);
        if again == snapped {
            break;
        }
        snapped = again;
    }
    snapped
}

#[inline]
fn round_to_step(value: f32, step: f32) -> f32 {
    let step = f64::from(step);
    ((f64::from(value) / step).round() * step) as f32
}

/// Snap each translation component to the grid. Rotation passes through.
pub fn quantize(delta: DeltaTransform, grid: GridIncrement) -> DeltaTransform {
    let step = grid.get();
    DeltaTransform {
        translation: Vec3::new(
            snap_value(delta.translation.x, step),
            snap_value(delta.translation.y, step),
            snap_value(delta.translation.z, step),
        ),
        rotation: delta.rotation,
    }
}

/// Snap each rotation component to `increment_degrees`. Translation passes
/// through.
pub fn quantize_rotation(delta: DeltaTransform, increment_degrees: f32) -> DeltaTransform {
    let step = increment_degrees.to_radians();
    DeltaTransform {
        translation: delta.translation,
        rotation: Vec3::new(
            snap_value(delta.rotation.x, step),
            snap_value(delta.rotation.y, step),
            snap_value(delta.rotation.z, step),
        ),
    }
}

/// Snap configuration for one interaction frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SnapPolicy {
    /// Snap translation to `grid`
    pub enabled: bool,
    pub grid: GridIncrement,
    /// Rotation snap in degrees. Rotation is never snapped without it.
    pub rotation_increment: Option<f32>,
}

impl SnapPolicy {
    pub fn new(enabled: bool, grid: GridIncrement) -> Self {
        Self {
            enabled,
            grid,
            rotation_increment: None,
        }
    }

    /// Apply the configured snapping to a raw delta.
    pub fn apply(&self, delta: DeltaTransform) -> DeltaTransform {
        if !self.enabled {
            return delta;
        }
        let delta = quantize(delta, self.grid);
        match self.rotation_increment {
            Some(increment) if increment > 0.0 => quantize_rotation(delta, increment),
            _ => delta,
        }
    }

    /// Whether `candidate` needs the host's restriction bypass to be legal.
    ///
    /// Placement bounds belong to the host and are not modelled here; the
    /// user's restriction toggle alone decides legality, so this never
    /// vetoes a move.
    pub fn requires_restriction_bypass(&self, _candidate: &Transform) -> bool {
        false
    }
}
