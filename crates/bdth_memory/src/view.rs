//! Typed, re-validated views over host memory
//!
//! Every public operation resolves or validates before touching bytes:
//!
//! ```text
//! attached? ─▶ epoch current? ─▶ sentinel matches? ─▶ read / write
//! ```
//!
//! A failure at any stage yields [`Unavailable`]; nothing is partially read
//! or written.

use crate::chain::OffsetChain;
use crate::error::{Result, Unavailable};
use crate::handle::{ForeignHandle, StructKind};
use crate::layout::{FlagLayout, HostLayout, ItemLayout, Sentinel};
use crate::transform::{AuxPanel, LayoutMode, Transform};
use crate::ProcessMemory;

/// Adapter between raw process memory and the host's housing structures.
pub struct ForeignMemoryView<M> {
    memory: M,
    layout: HostLayout,
    /// Bumped on every reattach so older handles go stale
    epoch: u32,
}

impl<M: ProcessMemory> ForeignMemoryView<M> {
    pub fn new(memory: M, layout: HostLayout) -> Self {
        Self {
            memory,
            layout,
            epoch: 1,
        }
    }

    /// Swap in a new backend, invalidating every outstanding handle.
    /// Returns the previous backend.
    pub fn reattach(&mut self, memory: M) -> M {
        self.epoch = self.epoch.wrapping_add(1);
        log::info!("Reattached host memory (epoch {})", self.epoch);
        std::mem::replace(&mut self.memory, memory)
    }

    #[inline]
    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    #[inline]
    pub fn layout(&self) -> &HostLayout {
        &self.layout
    }

    #[inline]
    pub fn memory(&self) -> &M {
        &self.memory
    }

    #[inline]
    pub fn memory_mut(&mut self) -> &mut M {
        &mut self.memory
    }

    pub fn is_attached(&self) -> bool {
        self.memory.is_attached()
    }

    /// Walk an offset chain to a structure address.
    pub fn resolve(&self, chain: &OffsetChain) -> Result<u64> {
        chain.resolve(&self.memory)
    }

    /// Resolve a chain and tag-check the structure it lands on.
    pub fn resolve_struct(
        &self,
        kind: StructKind,
        chain: &OffsetChain,
        sentinel: Sentinel,
    ) -> Result<ForeignHandle> {
        let address = self.resolve(chain)?;
        let handle = ForeignHandle::new(address, kind, self.epoch);
        self.check_tag(&handle, sentinel)?;
        Ok(handle)
    }

    /// Re-check that a handle still names a live structure of its kind.
    pub fn validate(&self, handle: &ForeignHandle) -> Result<()> {
        if !self.memory.is_attached() {
            return Err(Unavailable::Detached);
        }
        if handle.epoch() != self.epoch {
            return Err(Unavailable::StaleHandle {
                handle: handle.epoch(),
                current: self.epoch,
            });
        }
        self.check_tag(handle, self.sentinel_for(handle.kind()))
    }

    fn sentinel_for(&self, kind: StructKind) -> Sentinel {
        match kind {
            StructKind::Housing => self.layout.housing.sentinel,
            StructKind::Item => self.layout.item.sentinel,
            StructKind::Restriction => self.layout.restriction.sentinel,
            StructKind::Input => self.layout.input.sentinel,
            StructKind::FurnishingList => self.layout.panels.furnishing_list.sentinel,
            StructKind::Inventory => self.layout.panels.inventory.sentinel,
        }
    }

    fn check_tag(&self, handle: &ForeignHandle, sentinel: Sentinel) -> Result<()> {
        let found = self.memory.read_u32(handle.field(sentinel.offset))?;
        if found != sentinel.expected {
            log::debug!("Tag check failed for {:?}: {:#x}", handle, found);
            return Err(Unavailable::TagMismatch {
                kind: handle.kind(),
                address: handle.address(),
                expected: sentinel.expected,
                found,
            });
        }
        Ok(())
    }

    fn expect_kind(handle: &ForeignHandle, expected: StructKind) -> Result<()> {
        if handle.kind() != expected {
            return Err(Unavailable::WrongKind {
                expected,
                found: handle.kind(),
            });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Housing manager
    // ------------------------------------------------------------------

    pub fn housing(&self) -> Result<ForeignHandle> {
        let housing = &self.layout.housing;
        self.resolve_struct(StructKind::Housing, &housing.chain, housing.sentinel)
    }

    pub fn read_mode(&self) -> Result<LayoutMode> {
        let housing = self.housing()?;
        let raw = self
            .memory
            .read_u32(housing.field(self.layout.housing.mode_offset))?;
        Ok(LayoutMode::from_raw(raw))
    }

    /// The selected item, or `None` when nothing is selected.
    pub fn read_active_item(&self) -> Result<Option<ForeignHandle>> {
        let housing = self.housing()?;
        let pointer = self
            .memory
            .read_u64(housing.field(self.layout.housing.active_item_offset))?;
        if pointer == 0 {
            return Ok(None);
        }
        let item = ForeignHandle::new(pointer, StructKind::Item, self.epoch);
        self.check_tag(&item, self.layout.item.sentinel)?;
        Ok(Some(item))
    }

    // ------------------------------------------------------------------
    // Item transform
    // ------------------------------------------------------------------

    fn read_span(&self, handle: &ForeignHandle) -> Result<(u64, Vec<u8>)> {
        let (start, end) = self.layout.item.transform_span();
        let mut buf = vec![0u8; (end - start) as usize];
        self.memory.read(handle.field(start), &mut buf)?;
        Ok((start, buf))
    }

    pub fn read_transform(&self, handle: &ForeignHandle) -> Result<Transform> {
        Self::expect_kind(handle, StructKind::Item)?;
        self.validate(handle)?;

        let item = &self.layout.item;
        let (start, buf) = self.read_span(handle)?;
        let pos = (item.position_offset - start) as usize;
        let rot = (item.rotation_offset - start) as usize;

        let position: [f32; 3] =
            bytemuck::pod_read_unaligned(&buf[pos..pos + ItemLayout::POSITION_LEN as usize]);
        let rotation: [f32; 4] =
            bytemuck::pod_read_unaligned(&buf[rot..rot + ItemLayout::ROTATION_LEN as usize]);

        Ok(Transform::new(
            glam::Vec3::from_array(position),
            glam::Quat::from_array(rotation),
        ))
    }

    /// Write position and rotation in a single span write.
    ///
    /// Bytes inside the span that are not position or rotation are read
    /// first and written back unchanged.
    pub fn write_transform(&mut self, handle: &ForeignHandle, transform: &Transform) -> Result<()> {
        Self::expect_kind(handle, StructKind::Item)?;
        self.validate(handle)?;

        let item = &self.layout.item;
        let (start, mut buf) = self.read_span(handle)?;
        let pos = (item.position_offset - start) as usize;
        let rot = (item.rotation_offset - start) as usize;

        let position = transform.position.to_array();
        let rotation = transform.rotation.to_array();
        buf[pos..pos + ItemLayout::POSITION_LEN as usize]
            .copy_from_slice(bytemuck::bytes_of(&position));
        buf[rot..rot + ItemLayout::ROTATION_LEN as usize]
            .copy_from_slice(bytemuck::bytes_of(&rotation));

        self.memory.write(handle.field(start), &buf)
    }

    // ------------------------------------------------------------------
    // Flags
    // ------------------------------------------------------------------

    fn flag_handle(&self, kind: StructKind, flag: &FlagLayout) -> Result<ForeignHandle> {
        self.resolve_struct(kind, &flag.chain, flag.sentinel)
    }

    fn read_flag(&self, kind: StructKind, flag: &FlagLayout) -> Result<bool> {
        let handle = self.flag_handle(kind, flag)?;
        Ok(self.memory.read_u8(handle.field(flag.flag_offset))? != 0)
    }

    fn write_flag(&mut self, kind: StructKind, flag: &FlagLayout, value: bool) -> Result<()> {
        let handle = self.flag_handle(kind, flag)?;
        self.memory
            .write(handle.field(flag.flag_offset), &[u8::from(value)])
    }

    /// Whether the host's placement-bounds checks are currently bypassed.
    pub fn restriction_flag(&self) -> Result<bool> {
        self.read_flag(StructKind::Restriction, &self.layout.restriction)
    }

    pub fn set_restriction_flag(&mut self, bypass: bool) -> Result<()> {
        let flag = self.layout.restriction.clone();
        self.write_flag(StructKind::Restriction, &flag, bypass)?;
        log::info!("Placement restriction bypass {}", if bypass { "on" } else { "off" });
        Ok(())
    }

    /// Opaque host signal that an unsupported input device is in use.
    pub fn gamepad_active(&self) -> Result<bool> {
        self.read_flag(StructKind::Input, &self.layout.input)
    }

    pub fn aux_panel_visible(&self, panel: AuxPanel) -> Result<bool> {
        self.read_flag(HostLayout::panel_kind(panel), self.layout.panel(panel))
    }

    pub fn set_aux_panel_visible(&mut self, panel: AuxPanel, visible: bool) -> Result<()> {
        let flag = self.layout.panel(panel).clone();
        self.write_flag(HostLayout::panel_kind(panel), &flag, visible)?;
        log::debug!("{:?} visible = {}", panel, visible);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedHost;
    use crate::MemoryImage;
    use approx::assert_relative_eq;
    use glam::{Quat, Vec3};

    fn host_with_item() -> (SimulatedHost, u64) {
        let mut host = SimulatedHost::new(&HostLayout::default());
        let item = host.spawn_item(Transform::new(
            Vec3::new(1.0, 2.0, 3.0),
            Quat::from_rotation_y(0.5),
        ));
        host.set_mode(LayoutMode::Rotate);
        host.select(Some(item));
        (host, item)
    }

    fn view(host: SimulatedHost) -> ForeignMemoryView<MemoryImage> {
        ForeignMemoryView::new(host.into_image(), HostLayout::default())
    }

    #[test]
    fn test_read_mode_and_item() {
        let (host, item) = host_with_item();
        let view = view(host);

        assert_eq!(view.read_mode(), Ok(LayoutMode::Rotate));
        let handle = view.read_active_item().unwrap().unwrap();
        assert_eq!(handle.address(), item);
        assert_eq!(handle.kind(), StructKind::Item);
    }

    #[test]
    fn test_no_selection() {
        let mut host = SimulatedHost::new(&HostLayout::default());
        host.set_mode(LayoutMode::Rotate);
        let view = view(host);
        assert_eq!(view.read_active_item(), Ok(None));
    }

    #[test]
    fn test_read_transform() {
        let (host, _) = host_with_item();
        let view = view(host);
        let handle = view.read_active_item().unwrap().unwrap();

        let transform = view.read_transform(&handle).unwrap();
        assert_relative_eq!(transform.position.x, 1.0);
        assert_relative_eq!(transform.position.z, 3.0);
        assert!(transform.rotation.abs_diff_eq(Quat::from_rotation_y(0.5), 1e-6));
    }

    #[test]
    fn test_write_preserves_padding() {
        let (mut host, item) = host_with_item();
        // Bytes between position (0x50..0x5C) and rotation (0x60..0x70)
        host.image_mut().poke(item + 0x5C, &[0xAB, 0xCD, 0xEF, 0x01]);
        let mut view = view(host);
        let handle = view.read_active_item().unwrap().unwrap();

        let moved = Transform::from_position(Vec3::new(9.0, 8.0, 7.0));
        view.write_transform(&handle, &moved).unwrap();

        assert_eq!(view.memory().peek(item + 0x5C, 4), Some(vec![0xAB, 0xCD, 0xEF, 0x01]));
        assert_eq!(view.memory().peek_f32s::<3>(item + 0x50), Some([9.0, 8.0, 7.0]));
        assert_eq!(view.memory().writes().len(), 1);
    }

    #[test]
    fn test_tag_mismatch_blocks_every_operation() {
        let (mut host, item) = host_with_item();
        let before = host.image().peek(item, 0x100);
        let mut view = view(host);
        let handle = view.read_active_item().unwrap().unwrap();

        // Host reuses the slot for something else
        view.memory_mut().poke_u32(item, 0xDEAD_BEEF);

        assert!(matches!(
            view.read_transform(&handle),
            Err(Unavailable::TagMismatch { kind: StructKind::Item, .. })
        ));
        assert!(matches!(
            view.write_transform(&handle, &Transform::IDENTITY),
            Err(Unavailable::TagMismatch { .. })
        ));
        assert!(view.read_active_item().is_err());
        assert!(view.memory().writes().is_empty());

        let mut after = view.memory().peek(item, 0x100).unwrap();
        after[..4].copy_from_slice(&before.as_ref().unwrap()[..4]);
        assert_eq!(Some(after), before);
    }

    #[test]
    fn test_flag_tag_mismatch_blocks_every_flag_operation() {
        let (host, _) = host_with_item();
        let mut view = view(host);
        let layout = view.layout().clone();
        for flag in [
            &layout.restriction,
            &layout.input,
            &layout.panels.furnishing_list,
            &layout.panels.inventory,
        ] {
            let address = view.resolve(&flag.chain).unwrap();
            view.memory_mut().poke_u32(address + flag.sentinel.offset, 0xDEAD_BEEF);
        }

        let mismatch = |result: Result<bool>, kind: StructKind| {
            assert!(
                matches!(result, Err(Unavailable::TagMismatch { kind: k, .. }) if k == kind),
                "{kind}: {result:?}"
            );
        };
        mismatch(view.restriction_flag(), StructKind::Restriction);
        mismatch(view.gamepad_active(), StructKind::Input);
        mismatch(view.aux_panel_visible(AuxPanel::FurnishingList), StructKind::FurnishingList);
        mismatch(view.aux_panel_visible(AuxPanel::Inventory), StructKind::Inventory);

        assert!(matches!(
            view.set_restriction_flag(true),
            Err(Unavailable::TagMismatch { kind: StructKind::Restriction, .. })
        ));
        assert!(matches!(
            view.set_aux_panel_visible(AuxPanel::FurnishingList, true),
            Err(Unavailable::TagMismatch { kind: StructKind::FurnishingList, .. })
        ));
        assert!(matches!(
            view.set_aux_panel_visible(AuxPanel::Inventory, true),
            Err(Unavailable::TagMismatch { kind: StructKind::Inventory, .. })
        ));
        assert!(view.memory().writes().is_empty());

        // Flag bytes untouched
        let restriction = view.resolve(&layout.restriction.chain).unwrap();
        assert_eq!(
            view.memory().peek(restriction + layout.restriction.flag_offset, 1),
            Some(vec![0])
        );
    }

    #[test]
    fn test_stale_handle_after_reattach() {
        let (host, _) = host_with_item();
        let image = host.image().clone();
        let mut view = view(host);
        let handle = view.read_active_item().unwrap().unwrap();

        view.reattach(image);

        assert_eq!(
            view.read_transform(&handle),
            Err(Unavailable::StaleHandle { handle: 1, current: 2 })
        );
        assert!(view.read_active_item().unwrap().is_some());
    }

    #[test]
    fn test_freed_item_is_unavailable() {
        let (mut host, item) = host_with_item();
        host.image_mut().unmap(item);
        let view = view(host);

        assert!(matches!(
            view.read_active_item(),
            Err(Unavailable::AccessFault { .. })
        ));
    }

    #[test]
    fn test_wrong_kind_rejected() {
        let (host, _) = host_with_item();
        let view = view(host);
        let housing = view.housing().unwrap();
        assert_eq!(
            view.read_transform(&housing),
            Err(Unavailable::WrongKind {
                expected: StructKind::Item,
                found: StructKind::Housing
            })
        );
    }

    #[test]
    fn test_restriction_flag_writes_are_separate() {
        let (host, _) = host_with_item();
        let mut view = view(host);

        view.set_restriction_flag(true).unwrap();
        assert_eq!(view.restriction_flag(), Ok(true));
        view.set_restriction_flag(false).unwrap();
        assert_eq!(view.restriction_flag(), Ok(false));

        let writes = view.memory().writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].data, vec![1]);
        assert_eq!(writes[1].data, vec![0]);
    }

    #[test]
    fn test_panels_and_input() {
        let (mut host, _) = host_with_item();
        host.set_gamepad(true);
        let mut view = view(host);

        assert_eq!(view.gamepad_active(), Ok(true));
        assert_eq!(view.aux_panel_visible(AuxPanel::Inventory), Ok(false));
        view.set_aux_panel_visible(AuxPanel::Inventory, true).unwrap();
        assert_eq!(view.aux_panel_visible(AuxPanel::Inventory), Ok(true));
        assert_eq!(view.aux_panel_visible(AuxPanel::FurnishingList), Ok(false));
    }

    #[test]
    fn test_detached_everything_unavailable() {
        let (mut host, _) = host_with_item();
        host.image_mut().detach();
        let mut view = view(host);

        assert_eq!(view.read_mode(), Err(Unavailable::Detached));
        assert_eq!(view.set_restriction_flag(true), Err(Unavailable::Detached));
        assert_eq!(view.gamepad_active(), Err(Unavailable::Detached));
    }
}
