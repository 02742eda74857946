//! Host-side value types

use glam::{Quat, Vec3};
use serde::Serialize;

/// Position and rotation of a housing item, as stored by the host.
///
/// Used both as the per-frame read snapshot and as the write payload.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    #[inline]
    pub const fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    #[inline]
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
        }
    }

    /// Set position (builder pattern)
    #[inline]
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    /// Set rotation (builder pattern)
    #[inline]
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }
}

/// Editing state of the host's housing session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum LayoutMode {
    /// Not in layout editing at all
    #[default]
    None,
    Move,
    Rotate,
    Store,
    Place,
    Remove,
    /// A value this build does not know about
    Other(u32),
}

impl LayoutMode {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Self::None,
            1 => Self::Move,
            2 => Self::Rotate,
            3 => Self::Store,
            4 => Self::Place,
            6 => Self::Remove,
            other => Self::Other(other),
        }
    }

    pub fn to_raw(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Move => 1,
            Self::Rotate => 2,
            Self::Store => 3,
            Self::Place => 4,
            Self::Remove => 6,
            Self::Other(raw) => raw,
        }
    }

    /// Whether the host is in any layout editing mode.
    pub fn is_active(self) -> bool {
        self != Self::None
    }
}

/// Host panels whose visibility this tool can toggle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuxPanel {
    FurnishingList,
    Inventory,
}

impl AuxPanel {
    pub const ALL: [AuxPanel; 2] = [AuxPanel::FurnishingList, AuxPanel::Inventory];
}
