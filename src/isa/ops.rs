//! Instruction constructors.
//!
//! One `const fn` per instruction so kernels can build words in `const`
//! items, e.g. `const BODY: Instr = ops::elwadd(0, 0, 0, ADDR_MOD_0, 0);`.

use super::encoding::{layout, Instr, InstrBuilder, Opcode};

#[inline]
pub const fn nop() -> Instr {
    Instr::NOP
}

// ============================================================================
// Sequencer and Replay
// ============================================================================

/// Run the programmed MOP. `count_minus_one` only applies to the unpack
/// template; `zmask_lo16` is the low half of its skip mask.
#[inline]
pub const fn mop(template: u32, count_minus_one: u32, zmask_lo16: u32) -> Instr {
    InstrBuilder::new(Opcode::Mop)
        .set(layout::mop::TEMPLATE, template)
        .set(layout::mop::LOOP_COUNT, count_minus_one)
        .set(layout::mop::ZMASK_LO16, zmask_lo16)
        .build()
}

/// Supply the high half of the unpack template's skip mask.
#[inline]
pub const fn mop_cfg(zmask_hi16: u32) -> Instr {
    InstrBuilder::new(Opcode::MopCfg)
        .set(layout::mop_cfg::ZMASK_HI16, zmask_hi16)
        .build()
}

/// Record (`load_mode`) or play back a replay window.
#[inline]
pub const fn replay(start: u32, len: u32, exec_while_loading: bool, load_mode: bool) -> Instr {
    InstrBuilder::new(Opcode::Replay)
        .set(layout::replay::START, start)
        .set(layout::replay::LEN, len)
        .flag(layout::replay::EXEC_WHILE_LOADING, exec_while_loading)
        .flag(layout::replay::LOAD_MODE, load_mode)
        .build()
}

// ============================================================================
// Configuration
// ============================================================================

/// Write a 16-bit value into a thread config register.
#[inline]
pub const fn setc16(reg: u8, value: u16) -> Instr {
    InstrBuilder::new(Opcode::SetC16)
        .set(layout::setc16::REG, reg as u32)
        .set(layout::setc16::VALUE, value as u32)
        .build()
}

// ============================================================================
// Synchronisation
// ============================================================================

#[inline]
pub const fn seminit(max: u32, init: u32, sem_sel: u32) -> Instr {
    InstrBuilder::new(Opcode::SemInit)
        .set(layout::sem::MAX, max)
        .set(layout::sem::INIT, init)
        .set(layout::sem::SEL, sem_sel)
        .build()
}

#[inline]
pub const fn sempost(sem_sel: u32) -> Instr {
    InstrBuilder::new(Opcode::SemPost)
        .set(layout::sem::SEL, sem_sel)
        .build()
}

#[inline]
pub const fn semget(sem_sel: u32) -> Instr {
    InstrBuilder::new(Opcode::SemGet)
        .set(layout::sem::SEL, sem_sel)
        .build()
}

/// Hold `stall_res` while the selected semaphores meet `cond`.
#[inline]
pub const fn semwait(stall_res: u32, sem_sel: u32, cond: u32) -> Instr {
    InstrBuilder::new(Opcode::SemWait)
        .set(layout::sem::STALL_RES, stall_res)
        .set(layout::sem::SEL, sem_sel)
        .set(layout::sem::COND, cond)
        .build()
}

/// Hold `stall_res` until every unit in `wait_res` is idle.
#[inline]
pub const fn stallwait(stall_res: u32, wait_res: u32) -> Instr {
    InstrBuilder::new(Opcode::StallWait)
        .set(layout::stallwait::STALL_RES, stall_res)
        .set(layout::stallwait::WAIT_RES, wait_res)
        .build()
}

/// Mark this client done with its Dest bank (`dest_done`), clear source
/// valids (`src_clear`) or reset client state (`reset`).
#[inline]
pub const fn cleardvalid(src_clear: u32, dest_done: u32, reset: u32) -> Instr {
    InstrBuilder::new(Opcode::ClearDvalid)
        .set(layout::dvalid::SRC_CLEAR, src_clear)
        .set(layout::dvalid::DEST_DONE, dest_done)
        .set(layout::dvalid::RESET, reset)
        .build()
}

#[inline]
pub const fn setdvalid(src_set: u32) -> Instr {
    InstrBuilder::new(Opcode::SetDvalid)
        .set(layout::dvalid::SRC_SET, src_set)
        .build()
}

// ============================================================================
// Read-Write Counters
// ============================================================================

/// Set the SrcA/SrcB/Dest counters selected by `mask` (`p_setrwc::SET_*`).
#[inline]
pub const fn setrwc(clear_ab: u32, cr: u32, d: u32, b: u32, a: u32, mask: u32) -> Instr {
    InstrBuilder::new(Opcode::SetRwc)
        .set(layout::rwc::CLEAR_AB, clear_ab)
        .set(layout::rwc::CR, cr)
        .set(layout::rwc::D, d)
        .set(layout::rwc::B, b)
        .set(layout::rwc::A, a)
        .set(layout::rwc::MASK, mask)
        .build()
}

/// Increment the SrcA/SrcB/Dest counters.
#[inline]
pub const fn incrwc(cr: u32, d: u32, b: u32, a: u32) -> Instr {
    InstrBuilder::new(Opcode::IncRwc)
        .set(layout::rwc::CR, cr)
        .set(layout::rwc::D, d)
        .set(layout::rwc::B, b)
        .set(layout::rwc::A, a)
        .build()
}

// ============================================================================
// FPU
// ============================================================================

#[inline]
const fn fpu(
    opcode: Opcode,
    clear_dvalid: u32,
    dest_accum: u32,
    instr_mod: u32,
    addr_mode: u32,
    dst: u32,
) -> Instr {
    InstrBuilder::new(opcode)
        .set(layout::fpu::CLEAR_DVALID, clear_dvalid)
        .set(layout::fpu::DEST_ACCUM, dest_accum)
        .set(layout::fpu::INSTR_MOD, instr_mod)
        .set(layout::fpu::ADDR_MODE, addr_mode)
        .set(layout::fpu::DST, dst)
        .build()
}

#[inline]
pub const fn elwadd(clear_dvalid: u32, dest_accum: u32, instr_mod: u32, addr_mode: u32, dst: u32) -> Instr {
    fpu(Opcode::ElwAdd, clear_dvalid, dest_accum, instr_mod, addr_mode, dst)
}

#[inline]
pub const fn elwsub(clear_dvalid: u32, dest_accum: u32, instr_mod: u32, addr_mode: u32, dst: u32) -> Instr {
    fpu(Opcode::ElwSub, clear_dvalid, dest_accum, instr_mod, addr_mode, dst)
}

#[inline]
pub const fn elwmul(clear_dvalid: u32, dest_accum: u32, instr_mod: u32, addr_mode: u32, dst: u32) -> Instr {
    fpu(Opcode::ElwMul, clear_dvalid, dest_accum, instr_mod, addr_mode, dst)
}

#[inline]
pub const fn mvmul(clear_dvalid: u32, instr_mod: u32, addr_mode: u32, dst: u32) -> Instr {
    fpu(Opcode::MvMul, clear_dvalid, 0, instr_mod, addr_mode, dst)
}

/// Column-wise max pool of SrcA into one Dest row.
#[inline]
pub const fn gmpool(clear_dvalid: u32, instr_mod: u32, addr_mode: u32, dst: u32) -> Instr {
    fpu(Opcode::GmPool, clear_dvalid, 0, instr_mod, addr_mode, dst)
}

/// Zero part of Dest (`p_zeroacc::CLR_*`).
#[inline]
pub const fn zeroacc(clear_mode: u32, addr_mode: u32, dst: u32) -> Instr {
    InstrBuilder::new(Opcode::ZeroAcc)
        .set(layout::zeroacc::CLEAR_MODE, clear_mode)
        .set(layout::zeroacc::ADDR_MODE, addr_mode)
        .set(layout::zeroacc::DST, dst)
        .build()
}

// ============================================================================
// Pack
// ============================================================================

/// Pack one face out of Dest.
#[inline]
pub const fn pacr(
    addr_mode: u32,
    zero_write: u32,
    pack_sel: u32,
    concat: u32,
    flush: bool,
    last: bool,
) -> Instr {
    InstrBuilder::new(Opcode::Pacr)
        .set(layout::pacr::ADDR_MODE, addr_mode)
        .set(layout::pacr::ZERO_WRITE, zero_write)
        .set(layout::pacr::PACK_SEL, pack_sel)
        .set(layout::pacr::CONCAT, concat)
        .flag(layout::pacr::FLUSH, flush)
        .flag(layout::pacr::LAST, last)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::params::{p_stall, p_setrwc, semaphore};

    #[test]
    fn test_known_words() {
        // SEMWAIT(STALL_MATH|STALL_SFPU|STALL_SYNC, MATH_PACK, STALL_ON_MAX)
        let stall = p_stall::STALL_MATH | p_stall::STALL_SFPU | p_stall::STALL_SYNC;
        let w = semwait(stall, semaphore::t6_sem(semaphore::MATH_PACK), p_stall::STALL_ON_MAX);
        assert_eq!(w.word(), 0xa600_0000 | (stall << 15) | (0x2 << 2) | 0x2);

        assert_eq!(setc16(48, 512).word(), 0xb230_0200);
        assert_eq!(seminit(2, 0, 2).word(), 0xa320_0008);
        assert_eq!(mop(1, 0, 0).word(), 0x0180_0000);
    }

    #[test]
    fn test_setrwc_fields() {
        let w = setrwc(p_setrwc::CLR_AB, p_setrwc::CR_AB, 0, 0, 0, p_setrwc::SET_AB);
        assert_eq!(w.word(), 0x3700_0000 | (3 << 22) | (3 << 18) | 3);
    }

    #[test]
    fn test_const_construction() {
        const BODY: Instr = elwadd(0, 0, 0, 0, 0);
        assert_eq!(BODY.word(), 0x2800_0000);
    }
}
