//! Direct numeric input for the selected item.
//!
//! Position is edited per axis, rotation as yaw about the host's up axis.
//! Every write goes through a freshly gated handle.

use glam::{EulerRot, Quat, Vec3};
use serde::Serialize;

use bdth_memory::{ForeignHandle, ForeignMemoryView, ProcessMemory, Transform};

use crate::error::{ControlError, ControlResult};
use crate::gate::{self, GateStatus};
use crate::snap::{snap_value, SnapPolicy};

/// Yaw step, in degrees, when no rotation increment is configured.
pub const DEFAULT_YAW_STEP: f32 = 1.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ControlField {
    X,
    Y,
    Z,
    Yaw,
}

impl ControlField {
    pub const ALL: [ControlField; 4] = [Self::X, Self::Y, Self::Z, Self::Yaw];
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepDirection {
    Increase,
    Decrease,
}

impl StepDirection {
    fn sign(self) -> f32 {
        match self {
            Self::Increase => 1.0,
            Self::Decrease => -1.0,
        }
    }
}

/// Displayed values of the selected item.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ItemControls {
    pub position: Vec3,
    pub yaw_degrees: f32,
}

impl ItemControls {
    pub fn from_transform(transform: &Transform) -> Self {
        let (yaw, _, _) = transform.rotation.to_euler(EulerRot::YXZ);
        Self {
            position: transform.position,
            yaw_degrees: yaw.to_degrees(),
        }
    }

    pub fn get(&self, field: ControlField) -> f32 {
        match field {
            ControlField::X => self.position.x,
            ControlField::Y => self.position.y,
            ControlField::Z => self.position.z,
            ControlField::Yaw => self.yaw_degrees,
        }
    }

    /// Read the selected item's values.
    pub fn read<M: ProcessMemory>(view: &ForeignMemoryView<M>) -> ControlResult<Self> {
        let item = permitted_item(view)?;
        Ok(Self::from_transform(&view.read_transform(&item)?))
    }

    /// Move `field` by one increment: the grid for positions, the rotation
    /// increment for yaw.
    pub fn step<M: ProcessMemory>(
        view: &mut ForeignMemoryView<M>,
        field: ControlField,
        direction: StepDirection,
        policy: &SnapPolicy,
    ) -> ControlResult<Self> {
        let step = match field {
            ControlField::Yaw => policy.rotation_increment.unwrap_or(DEFAULT_YAW_STEP),
            _ => policy.grid.get(),
        };
        Self::modify(view, field, policy, |current| current + direction.sign() * step)
    }

    /// Assign `field`. Snapped to the grid when snapping is enabled.
    pub fn set<M: ProcessMemory>(
        view: &mut ForeignMemoryView<M>,
        field: ControlField,
        value: f32,
        policy: &SnapPolicy,
    ) -> ControlResult<Self> {
        Self::modify(view, field, policy, |_| value)
    }

    fn modify<M: ProcessMemory>(
        view: &mut ForeignMemoryView<M>,
        field: ControlField,
        policy: &SnapPolicy,
        edit: impl FnOnce(f32) -> f32,
    ) -> ControlResult<Self> {
        let item = permitted_item(view)?;
        let current = view.read_transform(&item)?;
        let value = edit(Self::from_transform(&current).get(field));
        let value = snap_field(field, value, policy);
        if !value.is_finite() {
            return Ok(Self::from_transform(&current));
        }

        let mut next = current;
        match field {
            ControlField::X => next.position.x = value,
            ControlField::Y => next.position.y = value,
            ControlField::Z => next.position.z = value,
            ControlField::Yaw => {
                let (_, pitch, roll) = current.rotation.to_euler(EulerRot::YXZ);
                next.rotation = Quat::from_euler(EulerRot::YXZ, value.to_radians(), pitch, roll);
            }
        }

        view.write_transform(&item, &next)?;
        log::debug!("Set {:?} of {:?} to {}", field, item, value);
        Ok(Self::from_transform(&next))
    }
}

fn snap_field(field: ControlField, value: f32, policy: &SnapPolicy) -> f32 {
    if !policy.enabled {
        return value;
    }
    match field {
        ControlField::Yaw => match policy.rotation_increment {
            Some(increment) => snap_value(value, increment),
            None => value,
        },
        _ => snap_value(value, policy.grid.get()),
    }
}

fn permitted_item<M: ProcessMemory>(view: &ForeignMemoryView<M>) -> ControlResult<ForeignHandle> {
    match gate::check(view) {
        GateStatus::Permitted { item } => Ok(item),
        GateStatus::Blocked(reason) => Err(ControlError::Blocked(reason)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::BlockReason;
    use crate::snap::GridIncrement;
    use approx::assert_relative_eq;
    use bdth_memory::{HostLayout, LayoutMode, MemoryImage, SimulatedHost};

    fn view_with(transform: Transform) -> (ForeignMemoryView<MemoryImage>, u64) {
        let mut host = SimulatedHost::new(&HostLayout::default());
        let item = host.spawn_item(transform);
        host.set_mode(LayoutMode::Rotate);
        host.select(Some(item));
        (ForeignMemoryView::new(host.into_image(), HostLayout::default()), item)
    }

    #[test]
    fn test_read_yaw() {
        let transform = Transform::new(
            Vec3::new(1.0, 2.0, 3.0),
            Quat::from_rotation_y(90f32.to_radians()),
        );
        let (view, _) = view_with(transform);
        let controls = ItemControls::read(&view).unwrap();
        assert_eq!(controls.position, Vec3::new(1.0, 2.0, 3.0));
        assert_relative_eq!(controls.yaw_degrees, 90.0, epsilon = 1e-3);
    }

    #[test]
    fn test_step_by_grid() {
        let (mut view, _) = view_with(Transform::from_position(Vec3::new(1.0, 0.0, 0.0)));
        let policy = SnapPolicy::new(false, GridIncrement::new(0.25));

        ItemControls::step(&mut view, ControlField::X, StepDirection::Increase, &policy).unwrap();
        let controls =
            ItemControls::step(&mut view, ControlField::Z, StepDirection::Decrease, &policy).unwrap();

        assert_relative_eq!(controls.position.x, 1.25);
        assert_relative_eq!(controls.position.z, -0.25);
        assert_eq!(ItemControls::read(&view).unwrap(), controls);
    }

    #[test]
    fn test_set_snaps_when_enabled() {
        let (mut view, _) = view_with(Transform::IDENTITY);
        let snapped = SnapPolicy::new(true, GridIncrement::new(0.05));
        let free = SnapPolicy::new(false, GridIncrement::new(0.05));

        let controls = ItemControls::set(&mut view, ControlField::Y, 1.23, &snapped).unwrap();
        assert_relative_eq!(controls.position.y, 1.25, epsilon = 1e-5);

        let controls = ItemControls::set(&mut view, ControlField::Y, 1.23, &free).unwrap();
        assert_eq!(controls.position.y, 1.23);
    }

    #[test]
    fn test_set_yaw_keeps_position() {
        let (mut view, _) = view_with(Transform::from_position(Vec3::new(4.0, 5.0, 6.0)));
        let policy = SnapPolicy::default();

        let controls = ItemControls::set(&mut view, ControlField::Yaw, -45.0, &policy).unwrap();
        assert_relative_eq!(controls.yaw_degrees, -45.0, epsilon = 1e-3);
        assert_eq!(controls.position, Vec3::new(4.0, 5.0, 6.0));
    }

    #[test]
    fn test_blocked_writes_nothing() {
        let mut host = SimulatedHost::new(&HostLayout::default());
        let item = host.spawn_item(Transform::IDENTITY);
        host.set_mode(LayoutMode::Place);
        host.select(Some(item));
        let mut view = ForeignMemoryView::new(host.into_image(), HostLayout::default());

        let result = ItemControls::set(&mut view, ControlField::X, 2.0, &SnapPolicy::default());
        assert!(matches!(
            result,
            Err(ControlError::Blocked(BlockReason::NoRotateSelection))
        ));
        assert!(view.memory().writes().is_empty());
    }
}
