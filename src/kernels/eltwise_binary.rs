//! Element-wise binary math (add, sub, mul) over Dest tiles.
//!
//! One MOP run covers one tile. The outer loop walks faces; the inner loop
//! walks the FPU passes of a face, repeated once per fidelity phase for
//! high-fidelity multiplies. Three address modes drive the counters:
//!
//! | Slot | Role |
//! |---|---|
//! | 0 | next 8 rows of Src and Dest |
//! | 1 | rewind to the face start, next fidelity phase |
//! | 2 | advance Dest to the next face, fidelity back to 0 |
//!
//! The per-face end op releases the Src banks so the next face is read
//! from the start of Src. Column and scalar broadcasts keep SrcB across
//! faces: the end op only releases SrcA and the tile loop drops SrcB. A
//! column broadcast MOP covers one row of faces and runs once per face row.
//!
//! # Usage
//!
//! ```ignore
//! let add = EltwiseBinary::new(EltwiseBinaryType::Add, TensorShape::TILE_32X32);
//! add.init(&mut math);
//! run_eltwise_tiles(&mut math, &mut dest, &add, 2);
//! ```

use super::TensorShape;
use crate::addrmod::{AddrMod, AddrModSlot, DestField, FidelityField, SrcField};
use crate::arch::tensix_spec::{FACE_R_DIM, MAX_FPU_ROWS};
use crate::dest::{DestBank, DestLifecycle};
use crate::isa::params::{p_elwise, p_setrwc};
use crate::isa::{ops, Instr, InstructionSink};
use crate::mop::MopTemplate;
use crate::thread::ThreadContext;
use std::fmt;

/// Multiplier precision: how many passes over the mantissa bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MathFidelity {
    #[default]
    LoFi,
    HiFi2,
    HiFi3,
    HiFi4,
}

impl MathFidelity {
    pub const fn phases(self) -> u32 {
        match self {
            MathFidelity::LoFi => 1,
            MathFidelity::HiFi2 => 2,
            MathFidelity::HiFi3 => 3,
            MathFidelity::HiFi4 => 4,
        }
    }
}

/// How SrcB is spread over SrcA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BroadcastType {
    #[default]
    None,
    /// Column 0 of each SrcB row fills the row.
    Col,
    /// One SrcB row fills every row.
    Row,
    /// One SrcB element fills the face.
    Scalar,
}

impl BroadcastType {
    pub const fn instr_mod(self) -> u32 {
        match self {
            BroadcastType::None => p_elwise::SRCB_NO_BCAST,
            BroadcastType::Col => p_elwise::SRCB_BCAST_COL,
            BroadcastType::Row => p_elwise::SRCB_BCAST_ROW,
            BroadcastType::Scalar => p_elwise::SRCB_BCAST_ALL,
        }
    }

    /// True if SrcB advances with the rows.
    const fn walks_srcb(self) -> bool {
        matches!(self, BroadcastType::None | BroadcastType::Col)
    }

    /// True if one SrcB bank feeds more than one face.
    const fn holds_srcb(self) -> bool {
        matches!(self, BroadcastType::Col | BroadcastType::Scalar)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EltwiseBinaryType {
    Add,
    Sub,
    Mul,
}

impl fmt::Display for EltwiseBinaryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EltwiseBinaryType::Add => "add",
            EltwiseBinaryType::Sub => "sub",
            EltwiseBinaryType::Mul => "mul",
        })
    }
}

/// One configured eltwise-binary variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EltwiseBinary {
    pub op: EltwiseBinaryType,
    pub broadcast: BroadcastType,
    pub fidelity: MathFidelity,
    pub shape: TensorShape,
}

impl EltwiseBinary {
    pub const BODY: AddrModSlot = AddrModSlot::ADDR_MOD_0;
    pub const NEXT_PHASE: AddrModSlot = AddrModSlot::ADDR_MOD_1;
    pub const NEXT_FACE: AddrModSlot = AddrModSlot::ADDR_MOD_2;

    pub fn new(op: EltwiseBinaryType, shape: TensorShape) -> Self {
        debug_assert!(shape.validate().is_ok(), "invalid tile shape {:?}", shape);
        Self {
            op,
            broadcast: BroadcastType::None,
            fidelity: MathFidelity::LoFi,
            shape,
        }
    }

    pub fn with_broadcast(mut self, broadcast: BroadcastType) -> Self {
        self.broadcast = broadcast;
        self
    }

    pub fn with_fidelity(mut self, fidelity: MathFidelity) -> Self {
        self.fidelity = fidelity;
        self
    }

    /// Fidelity phases the loop runs. Only multiplies have more than one.
    pub fn phases(&self) -> u32 {
        match self.op {
            EltwiseBinaryType::Mul => self.fidelity.phases(),
            _ => 1,
        }
    }

    /// Dest rows skipped after the FPU passes of a short face.
    fn face_pad(&self) -> u32 {
        FACE_R_DIM - self.shape.fpu_ops_per_face() * MAX_FPU_ROWS
    }

    fn instr(&self, slot: AddrModSlot) -> Instr {
        let (instr_mod, addr_mode) = (self.broadcast.instr_mod(), slot.field());
        match self.op {
            EltwiseBinaryType::Add => ops::elwadd(0, 0, instr_mod, addr_mode, 0),
            EltwiseBinaryType::Sub => ops::elwsub(0, 0, instr_mod, addr_mode, 0),
            EltwiseBinaryType::Mul => ops::elwmul(0, 0, instr_mod, addr_mode, 0),
        }
    }

    /// Address modes this variant needs, by slot.
    pub fn addr_mods(&self) -> [(AddrModSlot, AddrMod); 3] {
        let rows = MAX_FPU_ROWS as u8;
        let srcb_incr = if self.broadcast.walks_srcb() { rows } else { 0 };

        let body = AddrMod::new()
            .srca(SrcField::incr(rows))
            .srcb(SrcField::incr(srcb_incr))
            .dest(DestField::incr(MAX_FPU_ROWS as u16));
        let next_phase = AddrMod::new()
            .srca(SrcField::clear())
            .srcb(SrcField::clear())
            .dest(DestField::new(0, false, true, false))
            .fidelity(FidelityField::incr(1));
        let next_face = AddrMod::new()
            .srca(SrcField::incr(rows))
            .srcb(SrcField::incr(srcb_incr))
            .dest(DestField::incr((MAX_FPU_ROWS + self.face_pad()) as u16).with_c_to_cr())
            .fidelity(FidelityField::clear());

        [
            (Self::BODY, body),
            (Self::NEXT_PHASE, next_phase),
            (Self::NEXT_FACE, next_face),
        ]
    }

    /// MOP runs per tile.
    pub fn mop_runs(&self) -> u32 {
        match self.broadcast {
            BroadcastType::Col => u32::from(self.shape.num_faces_r_dim),
            _ => 1,
        }
    }

    /// Loop program for one tile, or one face row under column broadcast.
    pub fn mop(&self) -> MopTemplate {
        let faces = u32::from(self.shape.total_faces()) / self.mop_runs();
        let passes = self.shape.fpu_ops_per_face();
        let clear_src = if self.broadcast.holds_srcb() {
            p_setrwc::CLR_A
        } else {
            p_setrwc::CLR_AB
        };
        let end = ops::setrwc(clear_src, 0, 0, 0, 0, p_setrwc::SET_AB);

        let template = if self.phases() == 1 {
            let body = self.instr(Self::BODY);
            let template = MopTemplate::new(faces, passes, body);
            let pad = self.face_pad();
            if pad > 0 {
                template.with_loop_op1(ops::incrwc(0, pad, 0, 0))
            } else {
                template
            }
        } else {
            // Each inner iteration is one fidelity phase over the whole face.
            let rewind = self.instr(Self::NEXT_PHASE);
            let advance = self.instr(Self::NEXT_FACE);
            let template = if passes == 1 {
                MopTemplate::new(faces, self.phases(), rewind)
            } else {
                MopTemplate::with_two_ops(faces, self.phases(), self.instr(Self::BODY), rewind)
            };
            template
                .with_last_inner_loop_instr(advance)
                .with_last_outer_loop_instr(advance)
        };
        template.with_end_op(end)
    }

    /// Commit the address modes and load the MOP.
    pub fn init(&self, ctx: &mut ThreadContext) {
        let spec = ctx.arch.spec();
        for (slot, am) in self.addr_mods() {
            am.configure(slot, spec, ctx);
        }
        ctx.program_mop(self.mop());
        log::debug!(
            "{}: eltwise {} init ({:?}, {:?}, {} faces)",
            ctx.arch,
            self.op,
            self.broadcast,
            self.fidelity,
            self.shape.total_faces()
        );
    }

    /// Point math at tile `tile` of `bank`.
    pub fn set_dst_write_addr(&self, ctx: &mut ThreadContext, bank: &DestBank, tile: u32) {
        let row = bank.base_row + tile * self.shape.dest_rows();
        debug_assert!(bank.contains_row(row), "tile {} past the end of {}", tile, bank);
        let reg = ctx.arch.spec().math_dest_offset();
        ctx.issue(ops::setc16(reg, row as u16));
    }

    /// Run one tile into `bank`.
    pub fn run_tile(&self, ctx: &mut ThreadContext, bank: &DestBank, tile: u32) {
        self.set_dst_write_addr(ctx, bank, tile);
        match self.broadcast {
            BroadcastType::Col => {
                // Each face row has its own SrcB column.
                for _ in 0..self.mop_runs() {
                    ctx.run_mop();
                    ctx.issue(ops::setrwc(p_setrwc::CLR_B, 0, 0, 0, 0, 0));
                }
                ctx.issue(ops::setrwc(p_setrwc::CLR_NONE, 0, 0, 0, 0, p_setrwc::SET_D));
            }
            BroadcastType::Scalar => {
                ctx.run_mop();
                ctx.issue(ops::setrwc(p_setrwc::CLR_B, 0, 0, 0, 0, p_setrwc::SET_BD));
            }
            BroadcastType::None | BroadcastType::Row => {
                ctx.run_mop();
                ctx.issue(ops::setrwc(p_setrwc::CLR_NONE, 0, 0, 0, 0, p_setrwc::SET_D));
            }
        }
    }
}

/// Acquire a bank, compute `tiles` tiles into it and release it to pack.
pub fn run_eltwise_tiles(ctx: &mut ThreadContext, dest: &mut DestLifecycle, kernel: &EltwiseBinary, tiles: u32) {
    debug_assert!(
        tiles <= dest.max_tiles(false, kernel.shape.tile_dims()),
        "{} tiles do not fit one bank",
        tiles
    );
    let bank = dest.acquire_for_write(ctx);
    for tile in 0..tiles {
        kernel.run_tile(ctx, &bank, tile);
    }
    dest.release_after_write(ctx);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::Arch;
    use crate::dest::{DestClient, DstSync};
    use crate::isa::{Decoded, FpuOp, Opcode, ThreadOp};
    use crate::thread::ThreadId;

    fn decoded(instrs: &[Instr]) -> Vec<Decoded> {
        instrs.iter().map(|i| i.decode().unwrap()).collect()
    }

    #[test]
    fn test_lofi_add_loop_shape() {
        let add = EltwiseBinary::new(EltwiseBinaryType::Add, TensorShape::TILE_32X32);
        let mop = add.mop();
        assert_eq!((mop.outer(), mop.inner()), (4, 2));
        // Two FPU passes plus the Src release per face.
        assert_eq!(mop.issued_len(), 12);

        let stream = decoded(&mop.expand());
        let releases = stream
            .iter()
            .filter(|d| matches!(d, Decoded::SetRwc { clear_ab: p_setrwc::CLR_AB, .. }))
            .count();
        assert_eq!(releases, 4);
    }

    #[test]
    fn test_partial_face_pads_dest() {
        let add = EltwiseBinary::new(EltwiseBinaryType::Add, TensorShape::new(4, 2, 2));
        let mop = add.mop();
        assert_eq!(mop.inner(), 1);
        let (_, op1) = mop.loop_ops();
        assert_eq!(op1.decode().unwrap(), Decoded::IncRwc { cr: 0, d: 8, b: 0, a: 0 });
    }

    #[test]
    fn test_hifi_mul_runs_every_phase() {
        let mul = EltwiseBinary::new(EltwiseBinaryType::Mul, TensorShape::TILE_32X32)
            .with_fidelity(MathFidelity::HiFi4);
        let mop = mul.mop();
        assert_eq!((mop.outer(), mop.inner()), (4, 4));

        let stream = decoded(&mop.expand());
        let per_face: Vec<_> = stream[..9].to_vec();
        let modes: Vec<u32> = per_face
            .iter()
            .filter_map(|d| match d {
                Decoded::Fpu { op: FpuOp::ElwMul, args } => Some(args.addr_mode),
                _ => None,
            })
            .collect();
        assert_eq!(modes, vec![0, 1, 0, 1, 0, 1, 0, 2]);
    }

    #[test]
    fn test_add_ignores_fidelity() {
        let add = EltwiseBinary::new(EltwiseBinaryType::Add, TensorShape::TILE_32X32)
            .with_fidelity(MathFidelity::HiFi4);
        assert_eq!(add.phases(), 1);
        assert_eq!(add.mop().inner(), 2);
    }

    #[test]
    fn test_row_broadcast_rereads_srcb_row() {
        let add = EltwiseBinary::new(EltwiseBinaryType::Add, TensorShape::TILE_32X32)
            .with_broadcast(BroadcastType::Row);
        let [(_, body), _, _] = add.addr_mods();
        assert_eq!(body.srcb.incr, 0);
        // Every face brings its own SrcB row.
        let (end, _) = add.mop().end_ops();
        assert!(matches!(
            end.decode().unwrap(),
            Decoded::SetRwc { clear_ab: p_setrwc::CLR_AB, .. }
        ));
    }

    #[test]
    fn test_scalar_broadcast_holds_srcb() {
        let add = EltwiseBinary::new(EltwiseBinaryType::Add, TensorShape::TILE_32X32)
            .with_broadcast(BroadcastType::Scalar);
        let (end, _) = add.mop().end_ops();
        assert!(matches!(
            end.decode().unwrap(),
            Decoded::SetRwc { clear_ab: p_setrwc::CLR_A, .. }
        ));
        assert_eq!(add.mop().outer(), 4);
    }

    #[test]
    fn test_col_broadcast_runs_per_face_row() {
        let add = EltwiseBinary::new(EltwiseBinaryType::Add, TensorShape::TILE_32X32)
            .with_broadcast(BroadcastType::Col);
        let mop = add.mop();
        assert_eq!(add.mop_runs(), 2);
        assert_eq!((mop.outer(), mop.inner()), (2, 2));
        let (end, _) = mop.end_ops();
        assert!(matches!(
            end.decode().unwrap(),
            Decoded::SetRwc { clear_ab: p_setrwc::CLR_A, .. }
        ));

        let mut ctx = ThreadContext::new(ThreadId::Math, Arch::WormholeB0);
        let mut dest = DestLifecycle::native(Arch::WormholeB0, DestClient::Math, DstSync::Half);
        dest.sync_init(&mut ctx);
        add.init(&mut ctx);
        run_eltwise_tiles(&mut ctx, &mut dest, &add, 1);
        let program = ctx.finish();

        assert_eq!(program.count_opcode(Opcode::Mop), 2);
        let stream = decoded(&program.instructions().collect::<Vec<_>>());
        let srcb_drops = stream
            .iter()
            .filter(|d| matches!(d, Decoded::SetRwc { clear_ab: p_setrwc::CLR_B, .. }))
            .count();
        assert_eq!(srcb_drops, 2);
    }

    #[test]
    fn test_col_broadcast_hifi_overrides_last_pass() {
        let mul = EltwiseBinary::new(EltwiseBinaryType::Mul, TensorShape::TILE_32X32)
            .with_broadcast(BroadcastType::Col)
            .with_fidelity(MathFidelity::HiFi2);
        let mop = mul.mop();
        assert_eq!((mop.outer(), mop.inner()), (2, 2));

        let modes: Vec<u32> = decoded(&mop.expand())
            .iter()
            .filter_map(|d| match d {
                Decoded::Fpu { op: FpuOp::ElwMul, args } => Some(args.addr_mode),
                _ => None,
            })
            .collect();
        // Rewind after the first phase, advance a face after the last.
        assert_eq!(modes, vec![0, 1, 0, 2, 0, 1, 0, 2]);
    }

    #[test]
    fn test_next_face_steps_full_face() {
        let mul = EltwiseBinary::new(EltwiseBinaryType::Mul, TensorShape::new(8, 2, 2))
            .with_fidelity(MathFidelity::HiFi2);
        let [_, _, (_, next_face)] = mul.addr_mods();
        assert_eq!(next_face.dest.incr, 16);
        assert!(next_face.dest.c_to_cr);
        assert!(next_face.fidelity.clr);
    }

    #[test]
    fn test_init_commits_modes_then_mop() {
        let mut ctx = ThreadContext::new(ThreadId::Math, Arch::WormholeB0);
        let add = EltwiseBinary::new(EltwiseBinaryType::Add, TensorShape::TILE_32X32);
        add.init(&mut ctx);
        let program = ctx.finish();

        assert_eq!(program.count_opcode(Opcode::SetC16), 12);
        assert!(program.ops().iter().any(|op| matches!(op, ThreadOp::WriteMopConfig(_))));
    }
}
