//! Versioned handles into the host's address space
//!
//! A handle is only ever a claim. Every use goes back through
//! [`ForeignMemoryView::validate`](crate::ForeignMemoryView::validate), which
//! checks the attach epoch and the structure's sentinel before any bytes are
//! trusted.

use std::fmt;

use serde::Serialize;

/// The kind of host structure a handle was resolved for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StructKind {
    /// Housing manager holding the layout mode and active item pointer
    Housing,
    /// A placed housing item
    Item,
    /// Block holding the placement-restriction bypass flag
    Restriction,
    /// Block holding the input-device flag
    Input,
    /// Furnishing list panel
    FurnishingList,
    /// Inventory panel
    Inventory,
}

impl fmt::Display for StructKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Housing => "housing manager",
            Self::Item => "housing item",
            Self::Restriction => "restriction block",
            Self::Input => "input block",
            Self::FurnishingList => "furnishing list panel",
            Self::Inventory => "inventory panel",
        };
        f.write_str(name)
    }
}

/// An opaque, versioned reference to a structure in the host process.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ForeignHandle {
    address: u64,
    kind: StructKind,
    epoch: u32,
}

impl ForeignHandle {
    pub(crate) const fn new(address: u64, kind: StructKind, epoch: u32) -> Self {
        Self { address, kind, epoch }
    }

    /// Base address of the structure in the host.
    #[inline]
    pub const fn address(&self) -> u64 {
        self.address
    }

    #[inline]
    pub const fn kind(&self) -> StructKind {
        self.kind
    }

    /// Attach epoch the handle was resolved under.
    #[inline]
    pub const fn epoch(&self) -> u32 {
        self.epoch
    }

    /// Address of a field inside the structure.
    #[inline]
    pub const fn field(&self, offset: u64) -> u64 {
        self.address.wrapping_add(offset)
    }
}

impl fmt::Debug for ForeignHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ForeignHandle<{}>({:#x}e{})", self.kind, self.address, self.epoch)
    }
}
