//! In-process memory image
//!
//! A sparse set of mapped regions standing in for a host process. Used for
//! tests, offline replay of captured layouts, and dry runs of the tool
//! without a live host.

use std::collections::BTreeMap;

use crate::{ProcessMemory, Result, Unavailable};

/// A single write that reached the image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteRecord {
    pub address: u64,
    pub data: Vec<u8>,
}

/// Sparse, bounds-checked memory image.
#[derive(Clone, Debug)]
pub struct MemoryImage {
    /// Mapped regions keyed by base address
    regions: BTreeMap<u64, Vec<u8>>,
    attached: bool,
    /// Every successful write, in order
    writes: Vec<WriteRecord>,
}

impl Default for MemoryImage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryImage {
    /// Create an empty, attached image
    pub fn new() -> Self {
        Self {
            regions: BTreeMap::new(),
            attached: true,
            writes: Vec::new(),
        }
    }

    /// Map a zeroed region. An existing region at the same base is replaced.
    pub fn map(&mut self, base: u64, len: usize) -> &mut Self {
        self.regions.insert(base, vec![0; len]);
        self
    }

    /// Unmap the region starting at `base`, as if the host freed it.
    pub fn unmap(&mut self, base: u64) -> bool {
        self.regions.remove(&base).is_some()
    }

    pub fn detach(&mut self) {
        self.attached = false;
    }

    pub fn attach(&mut self) {
        self.attached = true;
    }

    /// Writes performed through [`ProcessMemory::write`], oldest first.
    pub fn writes(&self) -> &[WriteRecord] {
        &self.writes
    }

    pub fn clear_writes(&mut self) {
        self.writes.clear();
    }

    /// Locate the region slice covering `[address, address + len)`.
    fn span(&self, address: u64, len: usize) -> Option<(u64, usize)> {
        let (base, bytes) = self.regions.range(..=address).next_back()?;
        let start = usize::try_from(address - base).ok()?;
        let end = start.checked_add(len)?;
        (end <= bytes.len()).then_some((*base, start))
    }

    /// Copy bytes out of the image without going through the attach check.
    pub fn peek(&self, address: u64, len: usize) -> Option<Vec<u8>> {
        let (base, start) = self.span(address, len)?;
        self.regions.get(&base).map(|bytes| bytes[start..start + len].to_vec())
    }

    pub fn peek_f32s<const N: usize>(&self, address: u64) -> Option<[f32; N]> {
        let bytes = self.peek(address, N * 4)?;
        let mut out = [0.0f32; N];
        for (value, chunk) in out.iter_mut().zip(bytes.chunks_exact(4)) {
            *value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Some(out)
    }

    /// Place fixture bytes into the image. Not recorded as a write.
    ///
    /// # Panics
    ///
    /// Panics if the range is not fully mapped.
    pub fn poke(&mut self, address: u64, data: &[u8]) -> &mut Self {
        let (base, start) = self
            .span(address, data.len())
            .unwrap_or_else(|| panic!("poke outside mapped memory at {address:#x}"));
        if let Some(bytes) = self.regions.get_mut(&base) {
            bytes[start..start + data.len()].copy_from_slice(data);
        }
        self
    }

    pub fn poke_u64(&mut self, address: u64, value: u64) -> &mut Self {
        self.poke(address, &value.to_le_bytes())
    }

    pub fn poke_u32(&mut self, address: u64, value: u32) -> &mut Self {
        self.poke(address, &value.to_le_bytes())
    }

    pub fn poke_u8(&mut self, address: u64, value: u8) -> &mut Self {
        self.poke(address, &[value])
    }

    pub fn poke_f32s(&mut self, address: u64, values: &[f32]) -> &mut Self {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.poke(address, &bytes)
    }
}

impl ProcessMemory for MemoryImage {
    fn is_attached(&self) -> bool {
        self.attached
    }

    fn read(&self, address: u64, buf: &mut [u8]) -> Result<()> {
        if !self.attached {
            return Err(Unavailable::Detached);
        }
        let fault = Unavailable::AccessFault {
            address,
            len: buf.len(),
        };
        let (base, start) = self.span(address, buf.len()).ok_or(fault.clone())?;
        let bytes = self.regions.get(&base).ok_or(fault)?;
        buf.copy_from_slice(&bytes[start..start + buf.len()]);
        Ok(())
    }

    fn write(&mut self, address: u64, data: &[u8]) -> Result<()> {
        if !self.attached {
            return Err(Unavailable::Detached);
        }
        let fault = Unavailable::AccessFault {
            address,
            len: data.len(),
        };
        // Bounds are checked before any byte changes
        let (base, start) = self.span(address, data.len()).ok_or(fault.clone())?;
        let bytes = self.regions.get_mut(&base).ok_or(fault)?;
        bytes[start..start + data.len()].copy_from_slice(data);
        self.writes.push(WriteRecord {
            address,
            data: data.to_vec(),
        });
        Ok(())
    }
}
