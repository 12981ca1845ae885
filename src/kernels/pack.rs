//! Pack tiles out of Dest, one PACR per face.

use super::TensorShape;
use crate::addrmod::{AddrModPack, AddrModSlot, PackZField};
use crate::dest::{DestBank, DestLifecycle};
use crate::isa::{ops, Instr, InstructionSink};
use crate::mop::MopTemplate;
use crate::thread::ThreadContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackTile {
    pub shape: TensorShape,
}

impl PackTile {
    /// Pack a face, then move to the next one.
    pub const NEXT_FACE: AddrModSlot = AddrModSlot::ADDR_MOD_0;
    /// Pack the last face and rewind.
    pub const REWIND: AddrModSlot = AddrModSlot::ADDR_MOD_1;

    pub fn new(shape: TensorShape) -> Self {
        debug_assert!(shape.validate().is_ok(), "invalid tile shape {:?}", shape);
        Self { shape }
    }

    pub fn addr_mods() -> [(AddrModSlot, AddrModPack); 2] {
        [
            (Self::NEXT_FACE, AddrModPack::new().z_src(PackZField::incr(1))),
            (Self::REWIND, AddrModPack::new().z_src(PackZField::clear())),
        ]
    }

    fn pacr(slot: AddrModSlot, last: bool) -> Instr {
        ops::pacr(slot.field(), 0, 0, 0, false, last)
    }

    /// One PACR per face; the last one closes the tile.
    pub fn mop(&self) -> MopTemplate {
        let faces = u32::from(self.shape.total_faces());
        let last = Self::pacr(Self::REWIND, true);
        MopTemplate::new(1, faces, Self::pacr(Self::NEXT_FACE, false))
            .with_last_inner_loop_instr(last)
            .with_last_outer_loop_instr(last)
    }

    pub fn init(&self, ctx: &mut ThreadContext) {
        let spec = ctx.arch.spec();
        for (slot, am) in Self::addr_mods() {
            am.configure(slot, spec, ctx);
        }
        ctx.program_mop(self.mop());
    }

    /// Point pack at tile `tile` of `bank`.
    pub fn set_src_read_addr(&self, ctx: &mut ThreadContext, bank: &DestBank, tile: u32) {
        let row = bank.base_row + tile * self.shape.dest_rows();
        debug_assert!(bank.contains_row(row), "tile {} past the end of {}", tile, bank);
        let reg = ctx.arch.spec().pack_dest_offset();
        ctx.issue(ops::setc16(reg, row as u16));
    }

    pub fn run_tile(&self, ctx: &mut ThreadContext, bank: &DestBank, tile: u32) {
        self.set_src_read_addr(ctx, bank, tile);
        ctx.run_mop();
    }
}

/// Wait for a written bank, pack `tiles` tiles out of it and hand it back.
pub fn run_pack_tiles(ctx: &mut ThreadContext, dest: &mut DestLifecycle, kernel: &PackTile, tiles: u32) {
    let bank = dest.acquire_for_read(ctx);
    for tile in 0..tiles {
        kernel.run_tile(ctx, &bank, tile);
    }
    dest.release_after_read(ctx);
}
