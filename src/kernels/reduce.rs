//! Column max reduction through a replayed GMPOOL block.
//!
//! A 32x32 tile arrives in Src as faces 0..=3. Faces 0 and 2 reduce into
//! row 0 of Dest face 0, faces 1 and 3 into row 0 of Dest face 1. The four
//! GMPOOLs doing this are recorded once into the FPU half of the replay
//! buffer and played back per tile with a single trigger.

use crate::addrmod::{AddrMod, AddrModSlot, DestField, SrcField};
use crate::arch::tensix_spec::FACE_R_DIM;
use crate::dest::{DestBank, DestLifecycle, TileDims};
use crate::isa::params::{p_gpool, p_setrwc};
use crate::isa::{ops, Instr, InstructionSink};
use crate::replay::{ReplayPartition, ReplayWindow};
use crate::thread::ThreadContext;

/// Reduce-max over the rows of a 32x32 tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReduceMax {
    window: ReplayWindow,
}

impl ReduceMax {
    /// Pool, then step to the right-hand Dest face.
    pub const NEXT_FACE: AddrModSlot = AddrModSlot::ADDR_MOD_3;
    /// Pool, then return to the left-hand Dest face.
    pub const WRAP: AddrModSlot = AddrModSlot::ADDR_MOD_4;

    pub const BLOCK_LEN: u32 = 4;

    /// Place the block at the start of the FPU partition.
    pub fn new(ctx: &ThreadContext) -> Self {
        Self {
            window: ctx.replay.window_in(ReplayPartition::Fpu, 0, Self::BLOCK_LEN),
        }
    }

    pub fn window(&self) -> ReplayWindow {
        self.window
    }

    pub fn addr_mods() -> [(AddrModSlot, AddrMod); 2] {
        let face = FACE_R_DIM as u8;
        [
            (
                Self::NEXT_FACE,
                AddrMod::new()
                    .srca(SrcField::incr(face))
                    .dest(DestField::incr(FACE_R_DIM as u16)),
            ),
            (
                Self::WRAP,
                AddrMod::new().srca(SrcField::incr(face)).dest(DestField::clear()),
            ),
        ]
    }

    /// The recorded block, in issue order.
    pub fn block() -> [Instr; 4] {
        let pool = |mode: u32, slot: AddrModSlot| ops::gmpool(0, mode, slot.field(), 0);
        [
            pool(p_gpool::OVERWRITE, Self::NEXT_FACE),
            pool(p_gpool::OVERWRITE, Self::WRAP),
            pool(p_gpool::MAX_ACCUMULATE, Self::NEXT_FACE),
            pool(p_gpool::MAX_ACCUMULATE, Self::WRAP),
        ]
    }

    /// Commit the address modes and record the block.
    pub fn init(&self, ctx: &mut ThreadContext) {
        let spec = ctx.arch.spec();
        for (slot, am) in Self::addr_mods() {
            am.configure(slot, spec, ctx);
        }
        ctx.record(self.window, |rec| {
            for instr in Self::block() {
                rec.issue(instr);
            }
        });
        log::debug!("{}: reduce max recorded into {}", ctx.arch, self.window);
    }

    /// Reduce one tile into `bank`.
    pub fn run_tile(&self, ctx: &mut ThreadContext, bank: &DestBank, tile: u32) {
        let row = bank.base_row + tile * TileDims::Tile32x32.rows();
        debug_assert!(bank.contains_row(row), "tile {} past the end of {}", tile, bank);
        let reg = ctx.arch.spec().math_dest_offset();
        ctx.issue(ops::setc16(reg, row as u16));
        ctx.replay(self.window);
        ctx.issue(ops::setrwc(p_setrwc::CLR_A, 0, 0, 0, 0, p_setrwc::SET_ABD));
    }
}

/// Acquire a bank, reduce `tiles` tiles into it and release it to pack.
pub fn run_reduce_tiles(ctx: &mut ThreadContext, dest: &mut DestLifecycle, kernel: &ReduceMax, tiles: u32) {
    let bank = dest.acquire_for_write(ctx);
    for tile in 0..tiles {
        kernel.run_tile(ctx, &bank, tile);
    }
    dest.release_after_write(ctx);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::tensix_spec::REPLAY_FPU_OFFSET;
    use crate::arch::Arch;
    use crate::isa::{Decoded, Opcode};
    use crate::thread::ThreadId;

    #[test]
    fn test_block_lives_in_fpu_partition() {
        let ctx = ThreadContext::new(ThreadId::Math, Arch::WormholeB0);
        let reduce = ReduceMax::new(&ctx);
        assert_eq!(reduce.window().start(), REPLAY_FPU_OFFSET);
        assert_eq!(reduce.window().len(), ReduceMax::BLOCK_LEN);
    }

    #[test]
    fn test_block_alternates_faces() {
        let modes: Vec<(u32, u32)> = ReduceMax::block()
            .iter()
            .map(|i| match i.decode().unwrap() {
                Decoded::Fpu { args, .. } => (args.instr_mod, args.addr_mode),
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(modes, vec![(0, 3), (0, 4), (1, 3), (1, 4)]);
    }

    #[test]
    fn test_tiles_replay_one_trigger_each() {
        let mut ctx = ThreadContext::new(ThreadId::Math, Arch::WormholeB0);
        let reduce = ReduceMax::new(&ctx);
        reduce.init(&mut ctx);
        let bank = ctx_bank();
        for tile in 0..3 {
            reduce.run_tile(&mut ctx, &bank, tile);
        }
        let program = ctx.finish();

        // One load plus three playbacks.
        assert_eq!(program.count_opcode(Opcode::Replay), 4);
        assert_eq!(program.count_opcode(Opcode::GmPool), 4);
    }

    fn ctx_bank() -> DestBank {
        DestBank {
            index: 0,
            base_row: 0,
            rows: 512,
            owner: None,
            epoch: 0,
        }
    }
}
