//! BDTH Placement Editor
//!
//! Interactive placement of housing items inside a running host process.
//!
//! ## Features
//!
//! - **Mode Gate**: Decides each frame whether items may be edited, and why not
//! - **Transform Gizmo**: Axis, plane and ring drags in local or world axes
//! - **Snapping**: Grid-quantized movement with optional rotation increments
//! - **Item Controls**: Direct numeric input for position and yaw
//! - **Control Panel**: Persisted toggles mirrored into the host
//! - **Debug Report**: JSON snapshot of everything the tool can see
//!
//! ## Architecture
//!
//! Each frame runs the same pipeline:
//!
//! ```text
//! Gate → Snapshot → Pointer Delta → Snap → Compose → ForeignMemoryView write
//! ```
//!
//! Host memory is only touched through [`bdth_memory::ForeignMemoryView`],
//! which re-validates every handle on use.

pub mod commands;
pub mod controls;
pub mod debug;
pub mod error;
pub mod gate;
pub mod gizmo;
pub mod panel;
pub mod settings;
pub mod snap;
pub mod viewport;

// Re-export commonly used types
pub use commands::{CommandDispatch, LogDispatch, RecordingDispatch, ITEM_LIST_COMMAND};

pub use controls::{ControlField, ItemControls, StepDirection};

pub use debug::DebugReport;

pub use error::{ControlError, ControlResult, DragError};

pub use gate::{BlockReason, GateInputs, GateStatus};

pub use gizmo::{
    compose,
    hit_test,
    Axis,
    CoordinateFrame,
    GizmoEngine,
    GizmoHandle,
    InteractionSession,
    Plane,
};

pub use panel::{ControlPanel, PanelStatus};

pub use settings::{FileSettingsStore, MemorySettingsStore, Settings, SettingsError, SettingsStore};

pub use snap::{quantize, quantize_rotation, DeltaTransform, GridIncrement, SnapPolicy};

pub use viewport::Viewport;
