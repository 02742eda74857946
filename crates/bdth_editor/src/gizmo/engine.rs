//! Gizmo interaction state machine.
//!
//! ```text
//!          begin (gate permitted)
//!   Idle ─────────────────────────▶ Dragging
//!    ▲                                │ update: write origin ∘ delta
//!    └──── end / cancel / stale ◀─────┘
//! ```
//!
//! Every update recomputes the delta from the drag origin, so writes are
//! absolute with respect to the origin snapshot rather than accumulated.

use glam::{Quat, Vec2};

use bdth_memory::{ForeignHandle, ForeignMemoryView, ProcessMemory, Transform, Unavailable};

use super::{CoordinateFrame, GizmoHandle};
use crate::error::DragError;
use crate::gate;
use crate::snap::{DeltaTransform, SnapPolicy};
use crate::viewport::Viewport;

/// Screen vectors shorter than this are treated as degenerate.
const MIN_SCREEN_LEN: f32 = 1.0e-3;

/// An in-progress drag.
#[derive(Clone, Debug, PartialEq)]
pub struct InteractionSession {
    pub handle: GizmoHandle,
    /// Item handle, refreshed on every successful update
    pub item: ForeignHandle,
    /// Transform snapshot taken at `begin`
    pub origin: Transform,
    pub origin_pointer: Vec2,
    /// Last delta written to the host, if any
    pub last_applied: Option<DeltaTransform>,
}

/// Apply `delta`, expressed in `frame` axes, to `origin`.
pub fn compose(origin: &Transform, delta: &DeltaTransform, frame: CoordinateFrame) -> Transform {
    let basis = frame.basis(origin);
    let position = origin.position + basis * delta.translation;

    let rotation = if delta.rotation == glam::Vec3::ZERO {
        origin.rotation
    } else {
        let spin = Quat::from_scaled_axis(delta.rotation);
        match frame {
            CoordinateFrame::World => (spin * origin.rotation).normalize(),
            CoordinateFrame::Local => (origin.rotation * spin).normalize(),
        }
    };

    Transform::new(position, rotation)
}

/// Drives drags from pointer input to host writes.
#[derive(Debug, Default)]
pub struct GizmoEngine {
    frame: CoordinateFrame,
    session: Option<InteractionSession>,
}

impl GizmoEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_frame(frame: CoordinateFrame) -> Self {
        Self {
            frame,
            session: None,
        }
    }

    #[inline]
    pub fn frame(&self) -> CoordinateFrame {
        self.frame
    }

    /// Change the frame. An in-progress drag keeps what it already wrote;
    /// only later updates use the new frame.
    pub fn set_frame(&mut self, frame: CoordinateFrame) {
        self.frame = frame;
    }

    pub fn toggle_frame(&mut self) -> CoordinateFrame {
        self.frame = self.frame.toggle();
        log::debug!("Gizmo frame: {:?}", self.frame);
        self.frame
    }

    #[inline]
    pub fn is_dragging(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&InteractionSession> {
        self.session.as_ref()
    }

    /// Start dragging `handle`. Stays idle if the gate is blocked, a drag is
    /// already running, or the item's transform cannot be read.
    pub fn begin<M: ProcessMemory>(
        &mut self,
        view: &ForeignMemoryView<M>,
        handle: GizmoHandle,
        pointer: Vec2,
    ) -> bool {
        if self.session.is_some() {
            log::debug!("Ignoring begin on {:?}: drag already active", handle);
            return false;
        }

        let item = match gate::check(view) {
            gate::GateStatus::Permitted { item } => item,
            gate::GateStatus::Blocked(reason) => {
                log::debug!("Drag blocked: {}", reason.message());
                return false;
            }
        };

        let origin = match view.read_transform(&item) {
            Ok(origin) => origin,
            Err(err) => {
                log::warn!("Cannot snapshot {:?}: {}", item, err);
                return false;
            }
        };

        log::debug!("Drag {:?} started on {:?} in {:?}", handle, item, self.frame);
        self.session = Some(InteractionSession {
            handle,
            item,
            origin,
            origin_pointer: pointer,
            last_applied: None,
        });
        true
    }

    /// Recompute the delta for `pointer`, snap it, and write the result.
    ///
    /// Returns `Ok(None)` when idle. If the selection is gone or the gate no
    /// longer permits interaction, the drag is dropped without writing.
    pub fn update<M: ProcessMemory>(
        &mut self,
        view: &mut ForeignMemoryView<M>,
        viewport: &Viewport,
        pointer: Vec2,
        policy: &SnapPolicy,
    ) -> Result<Option<DeltaTransform>, DragError> {
        let Some(mut session) = self.session.take() else {
            return Ok(None);
        };

        let item = match Self::reresolve(view, &session) {
            Ok(item) => item,
            Err(err) => {
                log::warn!("Drag dropped: {}", err);
                return Err(err);
            }
        };

        let raw = self.raw_delta(&session, viewport, pointer);
        let delta = policy.apply(raw);
        let candidate = compose(&session.origin, &delta, self.frame);

        if policy.requires_restriction_bypass(&candidate) && !view.restriction_flag().unwrap_or(false) {
            log::warn!("Move of {:?} relies on host placement bounds", item);
        }

        if let Err(err) = view.write_transform(&item, &candidate) {
            log::warn!("Drag dropped: {}", err);
            return Err(err.into());
        }

        session.item = item;
        session.last_applied = Some(delta);
        self.session = Some(session);
        Ok(Some(delta))
    }

    /// Finish the drag, keeping whatever was last written.
    pub fn end(&mut self) -> Option<DeltaTransform> {
        let session = self.session.take()?;
        log::debug!("Drag {:?} ended", session.handle);
        session.last_applied
    }

    /// Abort the drag and restore the origin transform in the host.
    ///
    /// Nothing is written if the selection changed or the gate now blocks.
    pub fn cancel<M: ProcessMemory>(
        &mut self,
        view: &mut ForeignMemoryView<M>,
    ) -> Result<(), DragError> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        log::debug!("Drag {:?} cancelled", session.handle);

        if session.last_applied.is_none() {
            return Ok(());
        }

        let item = Self::reresolve(view, &session)?;
        Ok(view.write_transform(&item, &session.origin)?)
    }

    /// Resolve the active item again, make sure it is the one being dragged
    /// and that the gate still permits editing it.
    fn reresolve<M: ProcessMemory>(
        view: &ForeignMemoryView<M>,
        session: &InteractionSession,
    ) -> Result<ForeignHandle, DragError> {
        let item = view.read_active_item()?.ok_or(Unavailable::NoActiveItem)?;
        if item.address() != session.item.address() {
            return Err(Unavailable::SelectionChanged {
                was: session.item.address(),
                now: item.address(),
            }
            .into());
        }
        match gate::check(view) {
            gate::GateStatus::Permitted { item: permitted } if permitted.address() == item.address() => Ok(item),
            gate::GateStatus::Permitted { item: permitted } => Err(Unavailable::SelectionChanged {
                was: item.address(),
                now: permitted.address(),
            }
            .into()),
            gate::GateStatus::Blocked(reason) => Err(DragError::Blocked(reason)),
        }
    }

    /// Unsnapped delta for the pointer's displacement since `begin`.
    fn raw_delta(
        &self,
        session: &InteractionSession,
        viewport: &Viewport,
        pointer: Vec2,
    ) -> DeltaTransform {
        let basis = self.frame.basis(&session.origin);
        let origin = session.origin.position;
        let Some((origin_screen, origin_depth)) = viewport.project(origin) else {
            return DeltaTransform::ZERO;
        };
        // Screen vector covered by one world unit along a frame axis
        let screen_axis = |axis: super::Axis| {
            viewport
                .world_to_screen(origin + basis * axis.unit())
                .map(|tip| tip - origin_screen)
        };
        let displacement = pointer - session.origin_pointer;

        match session.handle {
            GizmoHandle::Axis(axis) => {
                let Some(along) = screen_axis(axis) else {
                    return DeltaTransform::ZERO;
                };
                let len_sq = along.length_squared();
                if len_sq < MIN_SCREEN_LEN {
                    return DeltaTransform::ZERO;
                }
                let amount = displacement.dot(along) / len_sq;
                DeltaTransform::translation(axis.unit() * amount)
            }
            GizmoHandle::Plane(plane) => {
                let (a, b) = plane.axes();
                let (Some(sa), Some(sb)) = (screen_axis(a), screen_axis(b)) else {
                    return DeltaTransform::ZERO;
                };
                // Solve displacement = u * sa + v * sb
                let det = sa.perp_dot(sb);
                if det.abs() < MIN_SCREEN_LEN {
                    return DeltaTransform::ZERO;
                }
                let u = displacement.perp_dot(sb) / det;
                let v = sa.perp_dot(displacement) / det;
                DeltaTransform::translation(a.unit() * u + b.unit() * v)
            }
            GizmoHandle::Ring(axis) => {
                let from = session.origin_pointer - origin_screen;
                let to = pointer - origin_screen;
                if from.length() < MIN_SCREEN_LEN || to.length() < MIN_SCREEN_LEN {
                    return DeltaTransform::ZERO;
                }
                // Screen y points down, so a positive perp_dot is a clockwise sweep
                let counter_clockwise = -from.perp_dot(to).atan2(from.dot(to));
                let towards_viewer = viewport
                    .project(origin + basis * axis.unit())
                    .map_or(true, |(_, depth)| depth <= origin_depth);
                let angle = if towards_viewer {
                    counter_clockwise
                } else {
                    -counter_clockwise
                };
                DeltaTransform::rotation(axis.unit() * angle)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gizmo::{Axis, Plane};
    use crate::snap::GridIncrement;
    use approx::assert_relative_eq;
    use bdth_memory::{HostLayout, LayoutMode, MemoryImage, SimulatedHost};
    use glam::{Mat4, Vec3};

    /// 100 pixels per world unit, camera looking down -Z, item at the origin
    fn ortho() -> Viewport {
        Viewport::new(
            Mat4::orthographic_rh(-4.0, 4.0, -3.0, 3.0, -100.0, 100.0),
            Vec2::new(800.0, 600.0),
        )
    }

    const CENTRE: Vec2 = Vec2::new(400.0, 300.0);

    fn setup(origin: Transform) -> (ForeignMemoryView<MemoryImage>, u64) {
        let mut host = SimulatedHost::new(&HostLayout::default());
        let item = host.spawn_item(origin);
        host.set_mode(LayoutMode::Rotate);
        host.select(Some(item));
        (ForeignMemoryView::new(host.into_image(), HostLayout::default()), item)
    }

    fn stored(view: &ForeignMemoryView<MemoryImage>) -> Transform {
        // Reads the currently selected item
        let item = view.read_active_item().unwrap().unwrap();
        view.read_transform(&item).unwrap()
    }

    fn no_snap() -> SnapPolicy {
        SnapPolicy::new(false, GridIncrement::default())
    }

    #[test]
    fn test_axis_drag_world() {
        let (mut view, _) = setup(Transform::IDENTITY);
        let mut engine = GizmoEngine::new();

        assert!(engine.begin(&view, GizmoHandle::Axis(Axis::X), CENTRE));
        let delta = engine
            .update(&mut view, &ortho(), CENTRE + Vec2::new(50.0, 20.0), &no_snap())
            .unwrap()
            .unwrap();

        assert_relative_eq!(delta.translation.x, 0.5, epsilon = 1e-4);
        assert_eq!(delta.translation.y, 0.0);
        assert_relative_eq!(stored(&view).position.x, 0.5, epsilon = 1e-4);
    }

    #[test]
    fn test_axis_drag_local_follows_item_rotation() {
        // Rolled a quarter turn about Z, so local X is world +Y
        let origin = Transform::IDENTITY.with_rotation(Quat::from_rotation_z(std::f32::consts::FRAC_PI_2));
        let (mut view, _) = setup(origin);
        let mut engine = GizmoEngine::with_frame(CoordinateFrame::Local);

        assert!(engine.begin(&view, GizmoHandle::Axis(Axis::X), CENTRE));
        // Drag 30 px up the screen, i.e. along world +Y
        engine
            .update(&mut view, &ortho(), CENTRE - Vec2::new(0.0, 30.0), &no_snap())
            .unwrap();

        let position = stored(&view).position;
        assert_relative_eq!(position.x, 0.0, epsilon = 1e-4);
        assert_relative_eq!(position.y, 0.3, epsilon = 1e-4);
    }

    #[test]
    fn test_plane_drag() {
        let (mut view, _) = setup(Transform::IDENTITY);
        let mut engine = GizmoEngine::new();

        assert!(engine.begin(&view, GizmoHandle::Plane(Plane::XY), CENTRE));
        engine
            .update(&mut view, &ortho(), CENTRE + Vec2::new(25.0, -40.0), &no_snap())
            .unwrap();

        let position = stored(&view).position;
        assert_relative_eq!(position.x, 0.25, epsilon = 1e-4);
        assert_relative_eq!(position.y, 0.40, epsilon = 1e-4);
        assert_eq!(position.z, 0.0);
    }

    #[test]
    fn test_ring_drag_quarter_turn() {
        let (mut view, _) = setup(Transform::IDENTITY);
        let mut engine = GizmoEngine::new();

        // Start right of the centre, sweep to above it
        assert!(engine.begin(&view, GizmoHandle::Ring(Axis::Z), CENTRE + Vec2::new(100.0, 0.0)));
        engine
            .update(&mut view, &ortho(), CENTRE - Vec2::new(0.0, 100.0), &no_snap())
            .unwrap();

        let rotation = stored(&view).rotation;
        let x_axis = rotation * Vec3::X;
        assert_relative_eq!(x_axis.x, 0.0, epsilon = 1e-4);
        assert_relative_eq!(x_axis.y, 1.0, epsilon = 1e-4);
        assert_eq!(stored(&view).position, Vec3::ZERO);
    }

    #[test]
    fn test_snapped_axis_drag() {
        let (mut view, _) = setup(Transform::IDENTITY);
        let mut engine = GizmoEngine::new();
        let policy = SnapPolicy::new(true, GridIncrement::new(0.05));

        assert!(engine.begin(&view, GizmoHandle::Axis(Axis::X), CENTRE));
        engine
            .update(&mut view, &ortho(), CENTRE + Vec2::new(12.0, 0.0), &policy)
            .unwrap();

        let position = stored(&view).position;
        assert_relative_eq!(position.x, 0.10, epsilon = 1e-5);
        assert_eq!(position.y, 0.0);
        assert_eq!(position.z, 0.0);
    }

    #[test]
    fn test_begin_blocked_stays_idle() {
        let mut host = SimulatedHost::new(&HostLayout::default());
        let item = host.spawn_item(Transform::IDENTITY);
        host.set_mode(LayoutMode::Move);
        host.select(Some(item));
        let mut view = ForeignMemoryView::new(host.into_image(), HostLayout::default());
        let mut engine = GizmoEngine::new();

        assert!(!engine.begin(&view, GizmoHandle::Axis(Axis::X), CENTRE));
        assert!(!engine.is_dragging());
        assert_eq!(
            engine.update(&mut view, &ortho(), CENTRE + Vec2::splat(40.0), &no_snap()),
            Ok(None)
        );
        assert!(view.memory().writes().is_empty());
    }

    #[test]
    fn test_cancel_restores_origin() {
        let origin = Transform::new(Vec3::new(1.5, -2.25, 3.0), Quat::from_rotation_y(0.7));
        let (mut view, _) = setup(origin);
        let mut engine = GizmoEngine::new();

        assert!(engine.begin(&view, GizmoHandle::Plane(Plane::XY), CENTRE));
        engine
            .update(&mut view, &ortho(), CENTRE + Vec2::new(33.0, 17.0), &no_snap())
            .unwrap();
        assert_ne!(stored(&view), origin);

        engine.cancel(&mut view).unwrap();

        assert!(!engine.is_dragging());
        assert_eq!(stored(&view), origin);
    }

    #[test]
    fn test_cancel_without_update_writes_nothing() {
        let (mut view, _) = setup(Transform::IDENTITY);
        let mut engine = GizmoEngine::new();

        assert!(engine.begin(&view, GizmoHandle::Axis(Axis::Y), CENTRE));
        engine.cancel(&mut view).unwrap();

        assert!(view.memory().writes().is_empty());
    }

    #[test]
    fn test_end_keeps_last_delta() {
        let origin = Transform::from_position(Vec3::new(10.0, 0.0, -4.0));
        let (mut view, _) = setup(origin);
        let mut engine = GizmoEngine::new();
        let policy = SnapPolicy::new(true, GridIncrement::new(0.1));

        assert!(engine.begin(&view, GizmoHandle::Axis(Axis::Y), CENTRE));
        engine
            .update(&mut view, &ortho(), CENTRE - Vec2::new(0.0, 10.0), &policy)
            .unwrap();
        let last = engine
            .update(&mut view, &ortho(), CENTRE - Vec2::new(0.0, 57.0), &policy)
            .unwrap()
            .unwrap();
        let writes = view.memory().writes().len();

        assert_eq!(engine.end(), Some(last));
        assert_eq!(stored(&view), compose(&origin, &last, CoordinateFrame::World));
        assert_eq!(view.memory().writes().len(), writes);
    }

    #[test]
    fn test_deselect_mid_drag_goes_idle() {
        let (mut view, _) = setup(Transform::IDENTITY);
        let mut engine = GizmoEngine::new();
        assert!(engine.begin(&view, GizmoHandle::Axis(Axis::X), CENTRE));

        let housing = view.housing().unwrap().address();
        view.memory_mut().poke_u64(housing + 0x28, 0);

        let result = engine.update(&mut view, &ortho(), CENTRE + Vec2::new(30.0, 0.0), &no_snap());
        assert_eq!(result, Err(DragError::Unavailable(Unavailable::NoActiveItem)));
        assert!(!engine.is_dragging());
        assert!(view.memory().writes().is_empty());
    }

    #[test]
    fn test_selection_swap_mid_drag_goes_idle() {
        let mut host = SimulatedHost::new(&HostLayout::default());
        let first = host.spawn_item(Transform::IDENTITY);
        let second = host.spawn_item(Transform::IDENTITY);
        host.set_mode(LayoutMode::Rotate);
        host.select(Some(first));
        let housing = host.housing_address();
        let mut view = ForeignMemoryView::new(host.into_image(), HostLayout::default());
        let mut engine = GizmoEngine::new();
        assert!(engine.begin(&view, GizmoHandle::Axis(Axis::X), CENTRE));

        view.memory_mut().poke_u64(housing + 0x28, second);

        let result = engine.update(&mut view, &ortho(), CENTRE + Vec2::new(30.0, 0.0), &no_snap());
        assert_eq!(
            result,
            Err(DragError::Unavailable(Unavailable::SelectionChanged { was: first, now: second }))
        );
        assert!(!engine.is_dragging());
    }

    #[test]
    fn test_leaving_rotate_mid_drag_goes_idle() {
        let (mut view, _) = setup(Transform::IDENTITY);
        let mut engine = GizmoEngine::new();
        assert!(engine.begin(&view, GizmoHandle::Axis(Axis::X), CENTRE));
        engine
            .update(&mut view, &ortho(), CENTRE + Vec2::new(20.0, 0.0), &no_snap())
            .unwrap();
        let writes = view.memory().writes().len();

        let housing = view.housing().unwrap().address();
        view.memory_mut().poke_u32(housing + 0x20, LayoutMode::Move.to_raw());

        let result = engine.update(&mut view, &ortho(), CENTRE + Vec2::new(50.0, 0.0), &no_snap());
        assert_eq!(result, Err(DragError::Blocked(gate::BlockReason::NoRotateSelection)));
        assert!(!engine.is_dragging());
        assert_eq!(view.memory().writes().len(), writes);
        assert_relative_eq!(stored(&view).position.x, 0.2, epsilon = 1e-5);
    }

    #[test]
    fn test_cancel_after_layout_mode_exit_does_not_write() {
        let (mut view, _) = setup(Transform::IDENTITY);
        let mut engine = GizmoEngine::new();
        assert!(engine.begin(&view, GizmoHandle::Axis(Axis::X), CENTRE));
        engine
            .update(&mut view, &ortho(), CENTRE + Vec2::new(20.0, 0.0), &no_snap())
            .unwrap();
        let writes = view.memory().writes().len();

        let housing = view.housing().unwrap().address();
        view.memory_mut().poke_u32(housing + 0x20, LayoutMode::None.to_raw());

        assert_eq!(
            engine.cancel(&mut view),
            Err(DragError::Blocked(gate::BlockReason::LayoutModeInactive))
        );
        assert!(!engine.is_dragging());
        assert_eq!(view.memory().writes().len(), writes);
    }

    #[test]
    fn test_frame_toggle_mid_drag_affects_later_updates_only() {
        let origin = Transform::IDENTITY.with_rotation(Quat::from_rotation_z(std::f32::consts::FRAC_PI_2));
        let (mut view, _) = setup(origin);
        let mut engine = GizmoEngine::new();

        assert!(engine.begin(&view, GizmoHandle::Axis(Axis::X), CENTRE));
        engine
            .update(&mut view, &ortho(), CENTRE + Vec2::new(20.0, 0.0), &no_snap())
            .unwrap();
        let committed = stored(&view);
        assert_relative_eq!(committed.position.x, 0.2, epsilon = 1e-4);

        engine.toggle_frame();
        assert_eq!(stored(&view), committed);

        engine
            .update(&mut view, &ortho(), CENTRE - Vec2::new(0.0, 20.0), &no_snap())
            .unwrap();
        let position = stored(&view).position;
        assert_relative_eq!(position.x, 0.0, epsilon = 1e-4);
        assert_relative_eq!(position.y, 0.2, epsilon = 1e-4);
    }

    #[test]
    fn test_compose_zero_is_identity() {
        let origin = Transform::new(Vec3::new(0.1, 0.2, 0.3), Quat::from_rotation_x(0.4));
        assert_eq!(compose(&origin, &DeltaTransform::ZERO, CoordinateFrame::Local), origin);
        assert_eq!(compose(&origin, &DeltaTransform::ZERO, CoordinateFrame::World), origin);
    }
}
