//! Instruction decoding.
//!
//! Turns a raw [`Instr`] back into a structured [`Decoded`] value. The
//! simulator executes `Decoded` operations and tests use it to read back
//! what kernels committed.

use super::encoding::{layout, Instr, Opcode};
use thiserror::Error;

/// Errors that can occur while decoding instruction words.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Opcode byte not in the supported set.
    #[error("unknown opcode 0x{opcode:02x} in word 0x{word:08x}")]
    UnknownOpcode {
        /// The opcode byte.
        opcode: u8,
        /// The full word.
        word: u32,
    },

    /// Byte stream length is not a multiple of the word size.
    #[error("truncated instruction stream: {len} bytes is not a multiple of 4")]
    Truncated {
        /// Length of the stream.
        len: usize,
    },
}

/// Element-wise and matrix FPU operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FpuOp {
    ElwAdd,
    ElwSub,
    ElwMul,
    MvMul,
    GmPool,
}

/// Operand fields shared by every FPU instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FpuArgs {
    pub clear_dvalid: u32,
    pub dest_accum: bool,
    pub instr_mod: u32,
    pub addr_mode: u32,
    pub dst: u32,
}

/// A decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded {
    Nop,
    Mop {
        template: u32,
        count_minus_one: u32,
        zmask_lo16: u32,
    },
    MopCfg {
        zmask_hi16: u32,
    },
    Replay {
        start: u32,
        len: u32,
        exec_while_loading: bool,
        load_mode: bool,
    },
    SetC16 {
        reg: u8,
        value: u16,
    },
    SemInit {
        max: u32,
        init: u32,
        sem_sel: u32,
    },
    SemPost {
        sem_sel: u32,
    },
    SemGet {
        sem_sel: u32,
    },
    SemWait {
        stall_res: u32,
        sem_sel: u32,
        cond: u32,
    },
    StallWait {
        stall_res: u32,
        wait_res: u32,
    },
    SetRwc {
        clear_ab: u32,
        cr: u32,
        d: u32,
        b: u32,
        a: u32,
        mask: u32,
    },
    IncRwc {
        cr: u32,
        d: u32,
        b: u32,
        a: u32,
    },
    Fpu {
        op: FpuOp,
        args: FpuArgs,
    },
    ZeroAcc {
        clear_mode: u32,
        addr_mode: u32,
        dst: u32,
    },
    Pacr {
        addr_mode: u32,
        zero_write: u32,
        pack_sel: u32,
        concat: u32,
        flush: bool,
        last: bool,
    },
    ClearDvalid {
        src_clear: u32,
        dest_done: u32,
        reset: u32,
    },
    SetDvalid {
        src_set: u32,
    },
}

impl Instr {
    /// Decode this word.
    pub fn decode(self) -> Result<Decoded, DecodeError> {
        let op = self.opcode().ok_or(DecodeError::UnknownOpcode {
            opcode: self.opcode_byte(),
            word: self.word(),
        })?;

        let fpu = |op: FpuOp| Decoded::Fpu {
            op,
            args: FpuArgs {
                clear_dvalid: self.get(layout::fpu::CLEAR_DVALID),
                dest_accum: self.get(layout::fpu::DEST_ACCUM) != 0,
                instr_mod: self.get(layout::fpu::INSTR_MOD),
                addr_mode: self.get(layout::fpu::ADDR_MODE),
                dst: self.get(layout::fpu::DST),
            },
        };

        Ok(match op {
            Opcode::Nop => Decoded::Nop,
            Opcode::Mop => Decoded::Mop {
                template: self.get(layout::mop::TEMPLATE),
                count_minus_one: self.get(layout::mop::LOOP_COUNT),
                zmask_lo16: self.get(layout::mop::ZMASK_LO16),
            },
            Opcode::MopCfg => Decoded::MopCfg {
                zmask_hi16: self.get(layout::mop_cfg::ZMASK_HI16),
            },
            Opcode::Replay => Decoded::Replay {
                start: self.get(layout::replay::START),
                len: self.get(layout::replay::LEN),
                exec_while_loading: self.get(layout::replay::EXEC_WHILE_LOADING) != 0,
                load_mode: self.get(layout::replay::LOAD_MODE) != 0,
            },
            Opcode::SetC16 => Decoded::SetC16 {
                reg: self.get(layout::setc16::REG) as u8,
                value: self.get(layout::setc16::VALUE) as u16,
            },
            Opcode::SemInit => Decoded::SemInit {
                max: self.get(layout::sem::MAX),
                init: self.get(layout::sem::INIT),
                sem_sel: self.get(layout::sem::SEL),
            },
            Opcode::SemPost => Decoded::SemPost {
                sem_sel: self.get(layout::sem::SEL),
            },
            Opcode::SemGet => Decoded::SemGet {
                sem_sel: self.get(layout::sem::SEL),
            },
            Opcode::SemWait => Decoded::SemWait {
                stall_res: self.get(layout::sem::STALL_RES),
                sem_sel: self.get(layout::sem::SEL),
                cond: self.get(layout::sem::COND),
            },
            Opcode::StallWait => Decoded::StallWait {
                stall_res: self.get(layout::stallwait::STALL_RES),
                wait_res: self.get(layout::stallwait::WAIT_RES),
            },
            Opcode::SetRwc => Decoded::SetRwc {
                clear_ab: self.get(layout::rwc::CLEAR_AB),
                cr: self.get(layout::rwc::CR),
                d: self.get(layout::rwc::D),
                b: self.get(layout::rwc::B),
                a: self.get(layout::rwc::A),
                mask: self.get(layout::rwc::MASK),
            },
            Opcode::IncRwc => Decoded::IncRwc {
                cr: self.get(layout::rwc::CR),
                d: self.get(layout::rwc::D),
                b: self.get(layout::rwc::B),
                a: self.get(layout::rwc::A),
            },
            Opcode::ElwAdd => fpu(FpuOp::ElwAdd),
            Opcode::ElwSub => fpu(FpuOp::ElwSub),
            Opcode::ElwMul => fpu(FpuOp::ElwMul),
            Opcode::MvMul => fpu(FpuOp::MvMul),
            Opcode::GmPool => fpu(FpuOp::GmPool),
            Opcode::ZeroAcc => Decoded::ZeroAcc {
                clear_mode: self.get(layout::zeroacc::CLEAR_MODE),
                addr_mode: self.get(layout::zeroacc::ADDR_MODE),
                dst: self.get(layout::zeroacc::DST),
            },
            Opcode::Pacr => Decoded::Pacr {
                addr_mode: self.get(layout::pacr::ADDR_MODE),
                zero_write: self.get(layout::pacr::ZERO_WRITE),
                pack_sel: self.get(layout::pacr::PACK_SEL),
                concat: self.get(layout::pacr::CONCAT),
                flush: self.get(layout::pacr::FLUSH) != 0,
                last: self.get(layout::pacr::LAST) != 0,
            },
            Opcode::ClearDvalid => Decoded::ClearDvalid {
                src_clear: self.get(layout::dvalid::SRC_CLEAR),
                dest_done: self.get(layout::dvalid::DEST_DONE),
                reset: self.get(layout::dvalid::RESET),
            },
            Opcode::SetDvalid => Decoded::SetDvalid {
                src_set: self.get(layout::dvalid::SRC_SET),
            },
        })
    }
}
