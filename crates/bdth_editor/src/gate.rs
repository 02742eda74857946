//! Mode/state gate.
//!
//! Decides once per frame whether item interaction is allowed. Holds no
//! state: the inputs are read fresh and the verdict is a pure function of
//! them.

use serde::Serialize;

use bdth_memory::{ForeignHandle, ForeignMemoryView, LayoutMode, ProcessMemory};

/// Why interaction is currently not allowed.
///
/// Variants are listed in priority order. An earlier reason always hides a
/// later one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    /// The host is not in layout editing mode
    LayoutModeInactive,
    /// An unsupported input device is active
    UnsupportedInputDevice,
    /// Nothing selected, or the host is in a mode other than rotate
    NoRotateSelection,
}

impl BlockReason {
    /// User-facing text for the reason.
    pub fn message(&self) -> &'static str {
        match self {
            Self::LayoutModeInactive => "Start layout mode",
            Self::UnsupportedInputDevice => "Unsupported input device",
            Self::NoRotateSelection => "Select an item in rotate mode",
        }
    }
}

/// Gate verdict for the current frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    Permitted { item: ForeignHandle },
    Blocked(BlockReason),
}

impl GateStatus {
    pub fn is_permitted(&self) -> bool {
        matches!(self, Self::Permitted { .. })
    }

    /// Handle of the selected item when permitted.
    pub fn item(&self) -> Option<ForeignHandle> {
        match self {
            Self::Permitted { item } => Some(*item),
            Self::Blocked(_) => None,
        }
    }

    pub fn reason(&self) -> Option<BlockReason> {
        match self {
            Self::Permitted { .. } => None,
            Self::Blocked(reason) => Some(*reason),
        }
    }
}

/// Everything the gate looks at, read in one pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GateInputs {
    pub mode: LayoutMode,
    pub gamepad_active: bool,
    pub active_item: Option<ForeignHandle>,
}

impl GateInputs {
    /// Read the gate inputs from the host.
    ///
    /// Unreadable values degrade to their blocking default: no layout mode,
    /// no selection. An unreadable device flag counts as not active.
    pub fn read<M: ProcessMemory>(view: &ForeignMemoryView<M>) -> Self {
        let mode = view.read_mode().unwrap_or_else(|err| {
            log::debug!("Layout mode unavailable: {}", err);
            LayoutMode::None
        });
        let gamepad_active = view.gamepad_active().unwrap_or(false);
        let active_item = view.read_active_item().unwrap_or_else(|err| {
            log::debug!("Active item unavailable: {}", err);
            None
        });

        Self {
            mode,
            gamepad_active,
            active_item,
        }
    }
}

/// Evaluate the gate. Checks run in priority order.
pub fn evaluate(inputs: &GateInputs) -> GateStatus {
    if !inputs.mode.is_active() {
        return GateStatus::Blocked(BlockReason::LayoutModeInactive);
    }
    if inputs.gamepad_active {
        return GateStatus::Blocked(BlockReason::UnsupportedInputDevice);
    }
    match (inputs.active_item, inputs.mode) {
        (Some(item), LayoutMode::Rotate) => GateStatus::Permitted { item },
        _ => GateStatus::Blocked(BlockReason::NoRotateSelection),
    }
}

/// Read and evaluate in one step.
pub fn check<M: ProcessMemory>(view: &ForeignMemoryView<M>) -> GateStatus {
    evaluate(&GateInputs::read(view))
}
