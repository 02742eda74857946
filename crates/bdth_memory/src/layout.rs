//! Host memory layout description
//!
//! Offsets move with every host update, so they live in data rather than
//! code. A layout file overrides the built-in reference layout.
//!
//! # Example Layout File
//!
//! ```toml
//! version = "7.1"
//!
//! [housing]
//! chain = { base = 0x1000_0000, offsets = [] }
//! sentinel = { offset = 0x0, expected = 0x4855_5347 }
//! mode_offset = 0x20
//! active_item_offset = 0x28
//!
//! [item]
//! sentinel = { offset = 0x0, expected = 0x4954_454D }
//! position_offset = 0x50
//! rotation_offset = 0x60
//!
//! [restriction]
//! chain = { base = 0x1000_0010 }
//! sentinel = { offset = 0x0, expected = 0x504C_4143 }
//! flag_offset = 0x10
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chain::OffsetChain;
use crate::handle::StructKind;
use crate::transform::AuxPanel;

/// Errors loading a layout file
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("failed to read layout file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse layout file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("item position and rotation fields overlap")]
    OverlappingItemFields,

    #[error("item transform span of {len:#x} bytes exceeds {max:#x}")]
    TransformSpanTooLarge { len: u64, max: u64 },
}

/// Tag that identifies a structure kind: a 32-bit value at a fixed offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentinel {
    pub offset: u64,
    pub expected: u32,
}

/// Housing manager: layout mode and active item pointer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HousingLayout {
    pub chain: OffsetChain,
    pub sentinel: Sentinel,
    /// u32 layout mode
    pub mode_offset: u64,
    /// Pointer to the selected item, null when nothing is selected
    pub active_item_offset: u64,
}

/// Placed item. Reached through the housing manager, so no chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemLayout {
    pub sentinel: Sentinel,
    /// Three f32
    pub position_offset: u64,
    /// Four f32, quaternion x y z w
    pub rotation_offset: u64,
}

impl ItemLayout {
    pub const POSITION_LEN: u64 = 12;
    pub const ROTATION_LEN: u64 = 16;
    /// Largest span rewritten per transform write
    pub const MAX_TRANSFORM_SPAN: u64 = 0x100;

    /// Byte range covering both transform fields, relative to the item base.
    pub fn transform_span(&self) -> (u64, u64) {
        let start = self.position_offset.min(self.rotation_offset);
        let end = (self.position_offset + Self::POSITION_LEN)
            .max(self.rotation_offset + Self::ROTATION_LEN);
        (start, end)
    }
}

/// A single byte flag inside a structure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagLayout {
    pub chain: OffsetChain,
    pub sentinel: Sentinel,
    pub flag_offset: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelLayouts {
    pub furnishing_list: FlagLayout,
    pub inventory: FlagLayout,
}

/// Complete description of where this tool finds things in the host.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostLayout {
    /// Host version the offsets were taken from
    #[serde(default)]
    pub version: String,
    pub housing: HousingLayout,
    pub item: ItemLayout,
    pub restriction: FlagLayout,
    pub input: FlagLayout,
    pub panels: PanelLayouts,
}

impl Default for HostLayout {
    /// The reference layout, also used by test fixtures.
    fn default() -> Self {
        Self {
            version: String::from("reference"),
            housing: HousingLayout {
                chain: OffsetChain::new(0x1000_0000),
                sentinel: Sentinel { offset: 0x0, expected: 0x4855_5347 },
                mode_offset: 0x20,
                active_item_offset: 0x28,
            },
            item: ItemLayout {
                sentinel: Sentinel { offset: 0x0, expected: 0x4954_454D },
                position_offset: 0x50,
                rotation_offset: 0x60,
            },
            restriction: FlagLayout {
                chain: OffsetChain::new(0x1000_0010),
                sentinel: Sentinel { offset: 0x0, expected: 0x504C_4143 },
                flag_offset: 0x10,
            },
            input: FlagLayout {
                chain: OffsetChain::new(0x1000_0018),
                sentinel: Sentinel { offset: 0x0, expected: 0x494E_5054 },
                flag_offset: 0x8,
            },
            panels: PanelLayouts {
                furnishing_list: FlagLayout {
                    chain: OffsetChain::new(0x1000_0020),
                    sentinel: Sentinel { offset: 0x0, expected: 0x4655_524E },
                    flag_offset: 0x30,
                },
                inventory: FlagLayout {
                    chain: OffsetChain::new(0x1000_0028),
                    sentinel: Sentinel { offset: 0x0, expected: 0x494E_5659 },
                    flag_offset: 0x30,
                },
            },
        }
    }
}

impl HostLayout {
    /// Parse and validate a layout from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, LayoutError> {
        let layout: Self = toml::from_str(text)?;
        layout.validate()?;
        Ok(layout)
    }

    /// Load a layout file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LayoutError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let layout = Self::from_toml_str(&text)?;
        log::info!("Loaded host layout {:?} from {:?}", layout.version, path);
        Ok(layout)
    }

    pub fn validate(&self) -> Result<(), LayoutError> {
        let pos = self.item.position_offset..self.item.position_offset + ItemLayout::POSITION_LEN;
        let rot = self.item.rotation_offset..self.item.rotation_offset + ItemLayout::ROTATION_LEN;
        if pos.start < rot.end && rot.start < pos.end {
            return Err(LayoutError::OverlappingItemFields);
        }
        let (start, end) = self.item.transform_span();
        if end - start > ItemLayout::MAX_TRANSFORM_SPAN {
            return Err(LayoutError::TransformSpanTooLarge {
                len: end - start,
                max: ItemLayout::MAX_TRANSFORM_SPAN,
            });
        }
        Ok(())
    }

    pub fn panel(&self, panel: AuxPanel) -> &FlagLayout {
        match panel {
            AuxPanel::FurnishingList => &self.panels.furnishing_list,
            AuxPanel::Inventory => &self.panels.inventory,
        }
    }

    /// Structure kind for a panel's handle.
    pub fn panel_kind(panel: AuxPanel) -> StructKind {
        match panel {
            AuxPanel::FurnishingList => StructKind::FurnishingList,
            AuxPanel::Inventory => StructKind::Inventory,
        }
    }
}
