//! Control panel facade.
//!
//! What the presentation layer calls into: toggles that persist to the
//! settings store and mirror into the host, plus pointer forwarding to the
//! gizmo engine. Holds no per-frame host state.

use glam::Vec2;

use bdth_memory::{AuxPanel, ForeignMemoryView, ProcessMemory, Unavailable};

use crate::commands::{CommandDispatch, ITEM_LIST_COMMAND};
use crate::controls::ItemControls;
use crate::error::{ControlError, ControlResult};
use crate::gate::{self, GateStatus};
use crate::gizmo::{self, CoordinateFrame, GizmoEngine, GizmoHandle};
use crate::settings::{Settings, SettingsStore};
use crate::snap::{DeltaTransform, GridIncrement};
use crate::viewport::Viewport;

/// World length of the gizmo's translate axes.
pub const DEFAULT_AXIS_LENGTH: f32 = 1.0;

/// What the panel shows this frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PanelStatus {
    pub gate: GateStatus,
    /// Values of the selected item, when interaction is permitted
    pub controls: Option<ItemControls>,
    pub frame: CoordinateFrame,
    pub dragging: Option<GizmoHandle>,
}

impl PanelStatus {
    /// Text to show instead of the controls, if any.
    pub fn message(&self) -> Option<&'static str> {
        self.gate.reason().map(|reason| reason.message())
    }
}

pub struct ControlPanel<S, D> {
    store: S,
    dispatch: D,
    engine: GizmoEngine,
    axis_length: f32,
}

impl<S: SettingsStore, D: CommandDispatch> ControlPanel<S, D> {
    pub fn new(store: S, dispatch: D) -> Self {
        Self {
            store,
            dispatch,
            engine: GizmoEngine::new(),
            axis_length: DEFAULT_AXIS_LENGTH,
        }
    }

    pub fn settings(&self) -> &Settings {
        self.store.settings()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatch
    }

    pub fn engine(&self) -> &GizmoEngine {
        &self.engine
    }

    pub fn set_axis_length(&mut self, length: f32) {
        if length.is_finite() && length > 0.0 {
            self.axis_length = length;
        }
    }

    /// Evaluate the gate and read what the panel displays.
    pub fn status<M: ProcessMemory>(&self, view: &ForeignMemoryView<M>) -> PanelStatus {
        let gate = gate::check(view);
        let controls = gate
            .item()
            .and_then(|item| view.read_transform(&item).ok())
            .map(|transform| ItemControls::from_transform(&transform));
        PanelStatus {
            gate,
            controls,
            frame: self.engine.frame(),
            dragging: self.engine.session().map(|session| session.handle),
        }
    }

    fn update_settings(&mut self, edit: impl FnOnce(&mut Settings)) -> ControlResult<()> {
        edit(self.store.settings_mut());
        self.store.save()?;
        Ok(())
    }

    /// Persist and save, then report the host write.
    fn persist_then<E>(
        &mut self,
        edit: impl FnOnce(&mut Settings),
        written: Result<(), E>,
    ) -> ControlResult<()>
    where
        E: std::fmt::Display,
        ControlError: From<E>,
    {
        self.update_settings(edit)?;
        if let Err(err) = &written {
            log::warn!("Host write failed, preference kept: {}", err);
        }
        Ok(written?)
    }

    /// Toggle the host's placement restriction bypass.
    pub fn set_place_anywhere<M: ProcessMemory>(
        &mut self,
        view: &mut ForeignMemoryView<M>,
        enabled: bool,
    ) -> ControlResult<()> {
        let written = view.set_restriction_flag(enabled);
        self.persist_then(|s| s.place_anywhere = enabled, written)
    }

    /// Turning the gizmo off cancels any drag, restoring the item's origin.
    pub fn set_use_gizmo<M: ProcessMemory>(
        &mut self,
        view: &mut ForeignMemoryView<M>,
        enabled: bool,
    ) -> ControlResult<()> {
        let written = if enabled { Ok(()) } else { self.engine.cancel(view) };
        self.persist_then(|s| s.use_gizmo = enabled, written)
    }

    pub fn set_snap(&mut self, enabled: bool) -> ControlResult<()> {
        self.update_settings(|s| s.do_snap = enabled)
    }

    /// Store a new grid increment, clamped into range.
    pub fn set_grid_increment(&mut self, value: f32) -> ControlResult<GridIncrement> {
        let grid = GridIncrement::new(value);
        self.update_settings(|s| s.grid_increment = grid)?;
        Ok(grid)
    }

    pub fn set_rotation_increment(&mut self, degrees: Option<f32>) -> ControlResult<()> {
        let degrees = degrees.filter(|d| d.is_finite() && *d > 0.0);
        self.update_settings(|s| s.rotation_increment = degrees)
    }

    /// Flip between local and world axes. Not persisted.
    pub fn toggle_frame(&mut self) -> CoordinateFrame {
        self.engine.toggle_frame()
    }

    pub fn set_furnishing_list_visible<M: ProcessMemory>(
        &mut self,
        view: &mut ForeignMemoryView<M>,
        visible: bool,
    ) -> ControlResult<()> {
        let written = view.set_aux_panel_visible(AuxPanel::FurnishingList, visible);
        self.persist_then(|s| s.display_furnishing_list = visible, written)
    }

    pub fn set_inventory_visible<M: ProcessMemory>(
        &mut self,
        view: &mut ForeignMemoryView<M>,
        visible: bool,
    ) -> ControlResult<()> {
        let written = view.set_aux_panel_visible(AuxPanel::Inventory, visible);
        self.persist_then(|s| s.display_inventory = visible, written)
    }

    pub fn set_auto_visible(&mut self, enabled: bool) -> ControlResult<()> {
        self.update_settings(|s| s.auto_visible = enabled)
    }

    pub fn open_item_list(&mut self) {
        self.dispatch.dispatch(ITEM_LIST_COMMAND);
    }

    /// Re-apply persisted host-side toggles after attaching.
    ///
    /// Every write is attempted; the first failure is returned.
    pub fn apply_startup<M: ProcessMemory>(
        &mut self,
        view: &mut ForeignMemoryView<M>,
    ) -> ControlResult<()> {
        let settings = self.store.settings().clone();
        let results = [
            view.set_restriction_flag(settings.place_anywhere),
            view.set_aux_panel_visible(AuxPanel::FurnishingList, settings.display_furnishing_list),
            view.set_aux_panel_visible(AuxPanel::Inventory, settings.display_inventory),
        ];
        log::info!(
            "Applied startup settings (place anywhere: {})",
            settings.place_anywhere
        );
        results
            .into_iter()
            .collect::<Result<Vec<()>, Unavailable>>()
            .map(|_| ())
            .map_err(ControlError::from)
    }

    /// Begin a drag on whatever translate handle is under the pointer.
    pub fn pointer_down<M: ProcessMemory>(
        &mut self,
        view: &ForeignMemoryView<M>,
        viewport: &Viewport,
        pointer: Vec2,
    ) -> Option<GizmoHandle> {
        if !self.store.settings().use_gizmo {
            return None;
        }
        let item = gate::check(view).item()?;
        let transform = view.read_transform(&item).ok()?;
        let handle = gizmo::hit_test(&transform, self.engine.frame(), viewport, pointer, self.axis_length)?;
        self.begin_handle(view, handle, pointer).then_some(handle)
    }

    /// Begin a drag on an explicit handle, e.g. a rotation ring.
    pub fn begin_handle<M: ProcessMemory>(
        &mut self,
        view: &ForeignMemoryView<M>,
        handle: GizmoHandle,
        pointer: Vec2,
    ) -> bool {
        self.store.settings().use_gizmo && self.engine.begin(view, handle, pointer)
    }

    pub fn pointer_move<M: ProcessMemory>(
        &mut self,
        view: &mut ForeignMemoryView<M>,
        viewport: &Viewport,
        pointer: Vec2,
    ) -> ControlResult<Option<DeltaTransform>> {
        let policy = self.store.settings().snap_policy();
        Ok(self.engine.update(view, viewport, pointer, &policy)?)
    }

    pub fn pointer_up(&mut self) -> Option<DeltaTransform> {
        self.engine.end()
    }

    pub fn cancel_drag<M: ProcessMemory>(
        &mut self,
        view: &mut ForeignMemoryView<M>,
    ) -> ControlResult<()> {
        Ok(self.engine.cancel(view)?)
    }
}
