//! Error type for foreign memory access

use thiserror::Error;

use crate::handle::StructKind;

/// Foreign memory could not be reached, or a handle no longer points at the
/// structure it was resolved for.
///
/// Always recoverable: callers fall back to a disabled state and resolve
/// again on the next frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Unavailable {
    /// No process is attached
    #[error("host process is not attached")]
    Detached,

    /// An intermediate pointer in an offset chain was null
    #[error("null pointer at step {step} of offset chain from {base:#x}")]
    NullPointer { base: u64, step: usize },

    /// The backend refused the read or write
    #[error("cannot access {len} bytes at {address:#x}")]
    AccessFault { address: u64, len: usize },

    /// The sentinel at the handle's address did not match
    #[error("{kind} at {address:#x} failed tag check: expected {expected:#x}, found {found:#x}")]
    TagMismatch {
        kind: StructKind,
        address: u64,
        expected: u32,
        found: u32,
    },

    /// The handle was resolved under an earlier attachment
    #[error("handle from epoch {handle} is stale (current epoch {current})")]
    StaleHandle { handle: u32, current: u32 },

    /// The handle names a different kind of structure than the operation needs
    #[error("expected a {expected} handle, got {found}")]
    WrongKind { expected: StructKind, found: StructKind },

    /// No item is selected in the host
    #[error("no active item")]
    NoActiveItem,

    /// The selected item changed since the handle was resolved
    #[error("active item moved from {was:#x} to {now:#x}")]
    SelectionChanged { was: u64, now: u64 },
}

/// Result type for foreign memory operations
pub type Result<T> = std::result::Result<T, Unavailable>;
