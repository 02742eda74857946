use thiserror::Error;

use bdth_memory::Unavailable;

use crate::gate::BlockReason;
use crate::settings::SettingsError;

/// Why a drag update or cancel stopped without writing.
///
/// Either way the engine is back to idle.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DragError {
    /// The gate stopped permitting interaction mid-drag
    #[error("drag blocked: {}", .0.message())]
    Blocked(BlockReason),
    #[error(transparent)]
    Unavailable(#[from] Unavailable),
}

/// Errors surfaced by the control panel and item controls.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("interaction blocked: {}", .0.message())]
    Blocked(BlockReason),
    #[error(transparent)]
    Unavailable(#[from] Unavailable),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

impl From<DragError> for ControlError {
    fn from(err: DragError) -> Self {
        match err {
            DragError::Blocked(reason) => Self::Blocked(reason),
            DragError::Unavailable(err) => Self::Unavailable(err),
        }
    }
}

impl ControlError {
    /// True for errors the next frame may clear on its own.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Blocked(_) | Self::Unavailable(_))
    }
}

pub type ControlResult<T> = Result<T, ControlError>;
