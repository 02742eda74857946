//! Transform gizmo.
//!
//! Turns pointer drags on axis, plane and ring handles into transform
//! deltas and writes them to the selected host item.

mod engine;

pub use engine::{compose, GizmoEngine, InteractionSession};

use glam::{Quat, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use bdth_memory::Transform;

use crate::viewport::{point_to_segment_dist, Viewport};

/// Pointer distance, in pixels, within which a handle counts as hit.
pub const HIT_THRESHOLD_PX: f32 = 12.0;
/// Offset of a plane handle's centre along each of its axes, as a fraction
/// of the axis length.
const PLANE_HANDLE_OFFSET: f32 = 0.3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn unit(self) -> Vec3 {
        match self {
            Axis::X => Vec3::X,
            Axis::Y => Vec3::Y,
            Axis::Z => Vec3::Z,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Plane {
    XY,
    XZ,
    YZ,
}

impl Plane {
    pub const ALL: [Plane; 3] = [Plane::XY, Plane::XZ, Plane::YZ];

    /// The two axes spanning the plane.
    pub fn axes(self) -> (Axis, Axis) {
        match self {
            Plane::XY => (Axis::X, Axis::Y),
            Plane::XZ => (Axis::X, Axis::Z),
            Plane::YZ => (Axis::Y, Axis::Z),
        }
    }
}

/// The part of the gizmo being dragged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum GizmoHandle {
    /// Move along one axis
    Axis(Axis),
    /// Move within a plane
    Plane(Plane),
    /// Rotate about one axis
    Ring(Axis),
}

/// Basis used to interpret a drag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordinateFrame {
    /// The item's own axes
    Local,
    /// The host's fixed world axes
    #[default]
    World,
}

impl CoordinateFrame {
    pub fn toggle(self) -> Self {
        match self {
            CoordinateFrame::Local => CoordinateFrame::World,
            CoordinateFrame::World => CoordinateFrame::Local,
        }
    }

    /// Rotation taking frame axes to world axes for `transform`.
    pub fn basis(self, transform: &Transform) -> Quat {
        match self {
            CoordinateFrame::Local => transform.rotation,
            CoordinateFrame::World => Quat::IDENTITY,
        }
    }
}

/// Find the translate handle under the pointer.
///
/// Axis handles are segments of `axis_length` world units from the item's
/// position; plane handles are points between two axes. The closest handle
/// within [`HIT_THRESHOLD_PX`] wins.
pub fn hit_test(
    transform: &Transform,
    frame: CoordinateFrame,
    viewport: &Viewport,
    pointer: Vec2,
    axis_length: f32,
) -> Option<GizmoHandle> {
    let basis = frame.basis(transform);
    let origin = transform.position;
    let origin_screen = viewport.world_to_screen(origin)?;

    let mut best: Option<(GizmoHandle, f32)> = None;
    let mut consider = |handle: GizmoHandle, dist: f32| {
        if dist < HIT_THRESHOLD_PX && best.map_or(true, |(_, d)| dist < d) {
            best = Some((handle, dist));
        }
    };

    for axis in Axis::ALL {
        let tip = origin + basis * axis.unit() * axis_length;
        if let Some(tip_screen) = viewport.world_to_screen(tip) {
            consider(
                GizmoHandle::Axis(axis),
                point_to_segment_dist(pointer, origin_screen, tip_screen),
            );
        }
    }

    for plane in Plane::ALL {
        let (a, b) = plane.axes();
        let centre = origin + basis * (a.unit() + b.unit()) * axis_length * PLANE_HANDLE_OFFSET;
        if let Some(centre_screen) = viewport.world_to_screen(centre) {
            consider(GizmoHandle::Plane(plane), (pointer - centre_screen).length());
        }
    }

    best.map(|(handle, _)| handle)
}
