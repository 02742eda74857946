//! Debug snapshot of everything the tool can see in the host.

use serde::Serialize;

use bdth_memory::{AuxPanel, ForeignMemoryView, LayoutMode, ProcessMemory, Transform};

use crate::controls::ItemControls;
use crate::gate::{self, GateStatus};
use crate::gizmo::{CoordinateFrame, GizmoEngine, GizmoHandle};
use crate::settings::Settings;

/// Host and engine state at one instant.
///
/// Unreadable values are `None` rather than errors.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DebugReport {
    pub attached: bool,
    pub epoch: u32,
    pub mode: Option<LayoutMode>,
    pub gate: GateStatus,
    pub block_message: Option<&'static str>,
    pub active_item: Option<u64>,
    pub transform: Option<Transform>,
    pub controls: Option<ItemControls>,
    pub restriction_flag: Option<bool>,
    pub gamepad_active: Option<bool>,
    pub furnishing_list_visible: Option<bool>,
    pub inventory_visible: Option<bool>,
    pub frame: CoordinateFrame,
    pub dragging: Option<GizmoHandle>,
    pub settings: Settings,
}

impl DebugReport {
    pub fn capture<M: ProcessMemory>(
        view: &ForeignMemoryView<M>,
        settings: &Settings,
        engine: &GizmoEngine,
    ) -> Self {
        let gate = gate::check(view);
        let item = view.read_active_item().ok().flatten();
        let transform = item.and_then(|item| view.read_transform(&item).ok());

        Self {
            attached: view.is_attached(),
            epoch: view.epoch(),
            mode: view.read_mode().ok(),
            gate,
            block_message: gate.reason().map(|reason| reason.message()),
            active_item: item.map(|item| item.address()),
            transform,
            controls: transform.as_ref().map(ItemControls::from_transform),
            restriction_flag: view.restriction_flag().ok(),
            gamepad_active: view.gamepad_active().ok(),
            furnishing_list_visible: view.aux_panel_visible(AuxPanel::FurnishingList).ok(),
            inventory_visible: view.aux_panel_visible(AuxPanel::Inventory).ok(),
            frame: engine.frame(),
            dragging: engine.session().map(|session| session.handle),
            settings: settings.clone(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
