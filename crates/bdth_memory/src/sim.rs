//! Simulated host built from a layout
//!
//! Lays out a [`MemoryImage`] so that every chain in a [`HostLayout`]
//! resolves, every sentinel matches, and items can be spawned and selected.
//! Backs the test suites and the binary's `--simulate` mode.

use crate::chain::OffsetChain;
use crate::image::MemoryImage;
use crate::layout::{FlagLayout, HostLayout, Sentinel};
use crate::transform::{AuxPanel, LayoutMode, Transform};

/// Size of every simulated structure block
const BLOCK_SIZE: usize = 0x1000;
/// First address handed out for structure blocks
const HEAP_BASE: u64 = 0x4000_0000;

pub struct SimulatedHost {
    layout: HostLayout,
    image: MemoryImage,
    next_block: u64,
    housing: u64,
    restriction: u64,
    input: u64,
    furnishing_list: u64,
    inventory: u64,
}

impl SimulatedHost {
    pub fn new(layout: &HostLayout) -> Self {
        let mut host = Self {
            layout: layout.clone(),
            image: MemoryImage::new(),
            next_block: HEAP_BASE,
            housing: 0,
            restriction: 0,
            input: 0,
            furnishing_list: 0,
            inventory: 0,
        };

        host.housing = host.build_chain(&layout.housing.chain, layout.housing.sentinel);
        host.restriction = host.build_flag(&layout.restriction);
        host.input = host.build_flag(&layout.input);
        host.furnishing_list = host.build_flag(&layout.panels.furnishing_list);
        host.inventory = host.build_flag(&layout.panels.inventory);
        host
    }

    fn alloc(&mut self) -> u64 {
        let address = self.next_block;
        self.image.map(address, BLOCK_SIZE);
        self.next_block += BLOCK_SIZE as u64;
        address
    }

    fn alloc_tagged(&mut self, sentinel: Sentinel) -> u64 {
        let address = self.alloc();
        self.image.poke_u32(address + sentinel.offset, sentinel.expected);
        address
    }

    /// Map every slot the chain passes through and point it at a fresh block.
    fn build_chain(&mut self, chain: &OffsetChain, sentinel: Sentinel) -> u64 {
        let target = self.alloc_tagged(sentinel);
        self.image.map(chain.base, 8);

        let mut slot = chain.base;
        for offset in &chain.offsets {
            let node = self.alloc();
            self.image.poke_u64(slot, node);
            slot = node + offset;
        }
        self.image.poke_u64(slot, target);
        target
    }

    fn build_flag(&mut self, flag: &FlagLayout) -> u64 {
        self.build_chain(&flag.chain, flag.sentinel)
    }

    pub fn layout(&self) -> &HostLayout {
        &self.layout
    }

    pub fn image(&self) -> &MemoryImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut MemoryImage {
        &mut self.image
    }

    pub fn into_image(self) -> MemoryImage {
        self.image
    }

    /// Address of the housing manager block.
    pub fn housing_address(&self) -> u64 {
        self.housing
    }

    pub fn set_mode(&mut self, mode: LayoutMode) {
        let address = self.housing + self.layout.housing.mode_offset;
        self.image.poke_u32(address, mode.to_raw());
    }

    /// Place a new tagged item and return its address.
    pub fn spawn_item(&mut self, transform: Transform) -> u64 {
        let address = self.alloc_tagged(self.layout.item.sentinel);
        self.poke_transform(address, &transform);
        address
    }

    pub fn poke_transform(&mut self, item: u64, transform: &Transform) {
        let item_layout = &self.layout.item;
        let position = item + item_layout.position_offset;
        let rotation = item + item_layout.rotation_offset;
        self.image.poke_f32s(position, &transform.position.to_array());
        self.image.poke_f32s(rotation, &transform.rotation.to_array());
    }

    /// Transform currently stored at an item, read without validation.
    pub fn item_transform(&self, item: u64) -> Option<Transform> {
        let item_layout = &self.layout.item;
        let position = self
            .image
            .peek_f32s::<3>(item + item_layout.position_offset)?;
        let rotation = self
            .image
            .peek_f32s::<4>(item + item_layout.rotation_offset)?;
        Some(Transform::new(
            glam::Vec3::from_array(position),
            glam::Quat::from_array(rotation),
        ))
    }

    pub fn select(&mut self, item: Option<u64>) {
        let address = self.housing + self.layout.housing.active_item_offset;
        self.image.poke_u64(address, item.unwrap_or(0));
    }

    pub fn set_gamepad(&mut self, active: bool) {
        let address = self.input + self.layout.input.flag_offset;
        self.image.poke_u8(address, u8::from(active));
    }

    pub fn set_panel_visible(&mut self, panel: AuxPanel, visible: bool) {
        let base = match panel {
            AuxPanel::FurnishingList => self.furnishing_list,
            AuxPanel::Inventory => self.inventory,
        };
        let address = base + self.layout.panel(panel).flag_offset;
        self.image.poke_u8(address, u8::from(visible));
    }

    pub fn restriction_flag(&self) -> Option<bool> {
        let address = self.restriction + self.layout.restriction.flag_offset;
        self.image.peek(address, 1).map(|bytes| bytes[0] != 0)
    }
}
