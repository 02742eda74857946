//! Pointer chains from a static base address

use serde::{Deserialize, Serialize};

use crate::{ProcessMemory, Result, Unavailable};

/// A fixed sequence of base + offset dereferences.
///
/// Resolution starts by reading the pointer stored at `base`. Each offset is
/// then added to the current pointer and the result dereferenced again. The
/// final pointer is the structure address.
///
/// ```text
/// base ─deref─▶ p0 ─(+off0) deref─▶ p1 ─(+off1) deref─▶ structure
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetChain {
    pub base: u64,
    #[serde(default)]
    pub offsets: Vec<u64>,
}

impl OffsetChain {
    pub fn new(base: u64) -> Self {
        Self {
            base,
            offsets: Vec::new(),
        }
    }

    /// Append a dereference step (builder pattern)
    pub fn then(mut self, offset: u64) -> Self {
        self.offsets.push(offset);
        self
    }

    /// Walk the chain, failing on the first null pointer.
    pub fn resolve<M: ProcessMemory + ?Sized>(&self, memory: &M) -> Result<u64> {
        if !memory.is_attached() {
            return Err(Unavailable::Detached);
        }

        let mut pointer = memory.read_u64(self.base)?;
        if pointer == 0 {
            return Err(Unavailable::NullPointer {
                base: self.base,
                step: 0,
            });
        }

        for (index, offset) in self.offsets.iter().enumerate() {
            pointer = memory.read_u64(pointer.wrapping_add(*offset))?;
            if pointer == 0 {
                return Err(Unavailable::NullPointer {
                    base: self.base,
                    step: index + 1,
                });
            }
        }

        Ok(pointer)
    }
}
