//! Tensix core specification constants.
//!
//! Geometry and sizing values shared by every chip generation. Register
//! addresses live in the per-generation maps at the bottom of this file.

// ============================================================================
// Dest Register File
// ============================================================================

/// Rows in the full Dest register file (16-bit datum mode).
pub const DEST_REGISTER_FULL_SIZE: u32 = 1024;

/// Rows in one double-buffer half of Dest.
pub const DEST_REGISTER_HALF_SIZE: u32 = DEST_REGISTER_FULL_SIZE / 2;

/// Columns per Dest row (one face row).
pub const DEST_COLUMNS: usize = 16;

// ============================================================================
// Faces and Tiles
// ============================================================================

/// Rows in a full face.
pub const FACE_R_DIM: u32 = 16;

/// Columns in a face. Fixed by the datapath width.
pub const FACE_C_DIM: u32 = 16;

/// Rows the FPU processes per primitive instruction.
pub const MAX_FPU_ROWS: u32 = 8;

/// log2 of [`MAX_FPU_ROWS`].
pub const MAX_FPU_ROWS_LOG2: u32 = 3;

/// Rows held by SrcA and SrcB.
pub const SRC_ROWS: usize = 64;

// ============================================================================
// Sequencer and Replay
// ============================================================================

/// Words in the MOP configuration register set.
pub const MOP_CFG_WORDS: usize = 9;

/// Largest encodable MOP outer/inner loop count.
pub const MOP_MAX_LOOP_COUNT: u32 = 127;

/// Largest iteration count of the unpack template (one zmask bit each).
pub const MOP_MAX_UNPACK_COUNT: u32 = 32;

/// Replay buffer entries per thread on Wormhole and Blackhole.
pub const REPLAY_BUFFER_CAPACITY: u32 = 32;

/// Replay buffer entries per thread on Quasar.
pub const QUASAR_REPLAY_BUFFER_CAPACITY: u32 = 64;

/// Largest replay capacity across generations, used for `const` checks.
pub const REPLAY_MAX_CAPACITY: u32 = QUASAR_REPLAY_BUFFER_CAPACITY;

/// First replay entry owned by the FPU; entries below belong to the SFPU.
pub const REPLAY_FPU_OFFSET: u32 = 16;

// ============================================================================
// Semaphores
// ============================================================================

/// Hardware semaphores per core.
pub const NUM_SEMAPHORES: usize = 8;

/// Largest value a semaphore can be initialised to or count up to.
pub const SEMAPHORE_MAX_VALUE: u32 = 15;

// ============================================================================
// Config Register Maps
// ============================================================================

/// Thread config register indices for Wormhole B0 and Blackhole.
pub mod wormhole_cfg {
    /// SrcA/SrcB address-mode words, one per slot.
    pub const ADDR_MOD_AB_SEC0: u8 = 12;
    /// Dest/fidelity address-mode words, one per slot.
    pub const ADDR_MOD_DST_SEC0: u8 = 20;
    /// Bias address-mode words, one per slot.
    pub const ADDR_MOD_BIAS_SEC0: u8 = 28;
    /// Pack Y source/destination words attached to the math slots.
    pub const ADDR_MOD_PACK_Y_SEC0: u8 = 36;
    /// Pack Y/Z words, pack slots 0..=3.
    pub const ADDR_MOD_PACK_SEC0: u8 = 44;
    /// Math-side Dest base row.
    pub const DEST_TARGET_REG_CFG_MATH_OFFSET: u8 = 48;
    /// Pack-side Dest base row.
    pub const DEST_TARGET_REG_CFG_PACK_OFFSET: u8 = 49;
    /// Dvalid chain control, one word per client.
    pub const DEST_DVALID_CTRL_SEC0: u8 = 52;
}

/// Thread config register indices for Quasar.
pub mod quasar_cfg {
    pub const ADDR_MOD_AB_SEC0: u8 = 32;
    pub const ADDR_MOD_DST_SEC0: u8 = 40;
    pub const ADDR_MOD_BIAS_SEC0: u8 = 48;
    pub const ADDR_MOD_PACK_Y_SEC0: u8 = 56;
    pub const ADDR_MOD_PACK_SEC0: u8 = 64;
    pub const DEST_TARGET_REG_CFG_MATH_OFFSET: u8 = 72;
    pub const DEST_TARGET_REG_CFG_PACK_OFFSET: u8 = 73;
    pub const DEST_DVALID_CTRL_SEC0: u8 = 76;
}
