//! # bdth_memory - Host Process Memory Access
//!
//! Typed, re-validated access to the housing structures of a running host
//! process:
//! - Backends: `/proc/<pid>/mem` on Linux, and an in-process [`MemoryImage`]
//! - Offset chains resolved into versioned [`ForeignHandle`]s
//! - Sentinel checks on every dereference
//! - Transform, layout mode, restriction flag and panel visibility views
//!
//! Nothing here retries or caches across frames. A failed access yields
//! [`Unavailable`] and the caller tries again next frame.

pub mod chain;
pub mod error;
pub mod handle;
pub mod image;
pub mod layout;
#[cfg(target_os = "linux")]
pub mod process;
pub mod sim;
pub mod transform;
pub mod view;

pub use chain::OffsetChain;
pub use error::{Result, Unavailable};
pub use handle::{ForeignHandle, StructKind};
pub use image::MemoryImage;
pub use layout::{FlagLayout, HostLayout, HousingLayout, ItemLayout, LayoutError, PanelLayouts, Sentinel};
#[cfg(target_os = "linux")]
pub use process::ProcMemory;
pub use sim::SimulatedHost;
pub use transform::{AuxPanel, LayoutMode, Transform};
pub use view::ForeignMemoryView;

/// Raw byte access to another process's address space.
///
/// A `read` that fails leaves no meaningful data in `buf`. A `write` that
/// fails must not leave the range partially written: backends check the
/// whole range before writing and restore the previous bytes if a write
/// still fails partway. [`ProcMemory`] logs a warning when that restore
/// itself fails, the one case where a partial write can remain.
pub trait ProcessMemory {
    /// Whether the backend is currently attached to a live process.
    fn is_attached(&self) -> bool;

    /// Read `buf.len()` bytes starting at `address`.
    fn read(&self, address: u64, buf: &mut [u8]) -> Result<()>;

    /// Write all of `data` starting at `address`.
    fn write(&mut self, address: u64, data: &[u8]) -> Result<()>;

    /// Read a pointer-sized value.
    fn read_u64(&self, address: u64) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read(address, &mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    /// Read a 32-bit value.
    fn read_u32(&self, address: u64) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read(address, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    /// Read a single byte.
    fn read_u8(&self, address: u64) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read(address, &mut buf)?;
        Ok(buf[0])
    }
}

impl<M: ProcessMemory + ?Sized> ProcessMemory for Box<M> {
    fn is_attached(&self) -> bool {
        (**self).is_attached()
    }

    fn read(&self, address: u64, buf: &mut [u8]) -> Result<()> {
        (**self).read(address, buf)
    }

    fn write(&mut self, address: u64, data: &[u8]) -> Result<()> {
        (**self).write(address, data)
    }
}

pub mod prelude {
    pub use crate::{ForeignHandle, ForeignMemoryView, HostLayout, MemoryImage, ProcessMemory};
    pub use crate::{AuxPanel, LayoutMode, OffsetChain, StructKind, Transform, Unavailable};
}
