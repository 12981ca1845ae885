//! Named parameter values for instruction fields.
//!
//! Grouped the way kernels spell them: `p_stall::MATH`, `p_setrwc::CLR_AB`,
//! `semaphore::MATH_PACK`.

/// Stall targets (`stall_res`) and wait resources (`wait_res`).
pub mod p_stall {
    // Stall targets: which pipeline is held.
    pub const STALL_TDMA: u32 = 0x1;
    pub const STALL_SYNC: u32 = 0x2;
    pub const STALL_PACK: u32 = 0x4;
    pub const STALL_UNPACK: u32 = 0x8;
    pub const STALL_MATH: u32 = 0x40;
    pub const STALL_CFG: u32 = 0x80;
    pub const STALL_SFPU: u32 = 0x100;

    // Wait resources: what must go idle.
    pub const NONE: u32 = 0x0;
    pub const THCON: u32 = 0x1;
    pub const UNPACK0: u32 = 0x2;
    pub const UNPACK1: u32 = 0x4;
    pub const PACK0: u32 = 0x8;
    pub const PACK: u32 = 0x78;
    pub const MATH: u32 = 0x80;
    /// Quasar: the issuing client owns its current Dest bank.
    pub const WAIT_DEST_DVALID: u32 = 0x100;
    pub const SRCA_VLD: u32 = 0x400;
    pub const SRCB_VLD: u32 = 0x800;
    pub const TRISC_CFG: u32 = 0x2000;
    pub const WAIT_SFPU: u32 = 0x4000;

    // SEMWAIT conditions.
    /// Stall while the semaphore reads zero.
    pub const STALL_ON_ZERO: u32 = 0x1;
    /// Stall while the semaphore reads its maximum.
    pub const STALL_ON_MAX: u32 = 0x2;
}

/// Read-write counter selectors for SETRWC / INCRWC.
pub mod p_setrwc {
    pub const CLR_NONE: u32 = 0x0;
    pub const CLR_A: u32 = 0x1;
    pub const CLR_B: u32 = 0x2;
    pub const CLR_AB: u32 = 0x3;

    pub const SET_A: u32 = 0x1;
    pub const SET_B: u32 = 0x2;
    pub const SET_AB: u32 = 0x3;
    pub const SET_D: u32 = 0x4;
    pub const SET_AD: u32 = 0x5;
    pub const SET_BD: u32 = 0x6;
    pub const SET_ABD: u32 = 0x7;
    pub const SET_F: u32 = 0x8;
    pub const SET_ABD_F: u32 = 0xf;

    pub const CR_A: u32 = 0x1;
    pub const CR_B: u32 = 0x2;
    pub const CR_AB: u32 = 0x3;
    pub const CR_D: u32 = 0x4;
    pub const CR_AD: u32 = 0x5;
    pub const CR_BD: u32 = 0x6;
    pub const CR_ABD: u32 = 0x7;
    pub const C_TO_CR_MODE: u32 = 0x8;
}

/// Semaphore indices.
pub mod semaphore {
    /// Math and pack hand-off of Dest banks.
    pub const MATH_PACK: u8 = 1;
    pub const UNPACK_TO_DEST: u8 = 2;
    pub const UNPACK_OPERAND_SYNC: u8 = 3;
    pub const PACK_DONE: u8 = 4;
    pub const UNPACK_SYNC: u8 = 5;
    pub const UNPACK_MATH_DONE: u8 = 6;
    pub const MATH_DONE: u8 = 7;

    /// Select mask for semaphore `index` in SEM* instructions.
    #[inline]
    pub const fn t6_sem(index: u8) -> u32 {
        1 << index
    }
}

/// Dest dvalid client bits and source-valid clear bits.
pub mod p_cleardvalid {
    pub const UNPACK_TO_DEST: u32 = 0b0001;
    pub const FPU: u32 = 0b0010;
    pub const SFPU: u32 = 0b0100;
    pub const PACK: u32 = 0b1000;
    pub const ALL_CLIENTS: u32 = 0b1111;

    pub const CLR_SRCA_VLD: u32 = 0x1;
    pub const CLR_SRCB_VLD: u32 = 0x2;
}

/// ZEROACC clear modes.
pub mod p_zeroacc {
    /// One 16-row block selected by `dst`.
    pub const CLR_16: u32 = 0x1;
    /// One Dest half selected by `dst & 1`.
    pub const CLR_HALF: u32 = 0x2;
    /// All of Dest.
    pub const CLR_ALL: u32 = 0x3;
}

/// Operand-B broadcast modes (`instr_mod` of element-wise FPU ops).
pub mod p_elwise {
    pub const SRCB_NO_BCAST: u32 = 0x0;
    pub const SRCB_BCAST_COL: u32 = 0x1;
    pub const SRCB_BCAST_ROW: u32 = 0x2;
    pub const SRCB_BCAST_ALL: u32 = 0x3;

    /// `clear_dvalid` value releasing both source operands.
    pub const CLR_SRC_AB: u32 = 0x3;
}

/// GMPOOL result handling (`instr_mod`).
pub mod p_gpool {
    /// Write the pooled row over Dest.
    pub const OVERWRITE: u32 = 0x0;
    /// Keep the larger of Dest and the pooled row.
    pub const MAX_ACCUMULATE: u32 = 0x1;
}

/// MOP template selectors.
pub mod p_mop {
    /// Unpack template: zmask-driven single loop.
    pub const UNPACK_TEMPLATE: u32 = 0;
    /// Double-nested loop template.
    pub const LOOP_TEMPLATE: u32 = 1;
}
