//! Architecture specification trait and per-generation implementations.
//!
//! Code that needs a register address or a size asks the active
//! [`ArchSpec`] instead of hardcoding Wormhole values, so the same kernel
//! builder emits correct words for Blackhole and Quasar.
//!
//! # Example
//!
//! ```ignore
//! use tensix_llk::arch::{Arch, ArchSpec};
//!
//! let spec = Arch::WormholeB0.spec();
//! assert_eq!(spec.replay_capacity(), 32);
//! assert_eq!(spec.dest_half_rows(), 512);
//! ```

use super::tensix_spec::{self, quasar_cfg, wormhole_cfg};
use super::HandshakeKind;

/// Architecture parameters for one Tensix generation.
pub trait ArchSpec: Send + Sync + std::fmt::Debug {
    // ========================================================================
    // Identity
    // ========================================================================

    /// Architecture name for display.
    fn name(&self) -> &'static str;

    /// Which primitive guards Dest bank hand-off.
    fn handshake(&self) -> HandshakeKind;

    /// Number of instruction-fetch threads driving the core.
    fn thread_count(&self) -> usize;

    // ========================================================================
    // Sizing
    // ========================================================================

    /// Rows in the whole Dest register file.
    fn dest_rows(&self) -> u32 {
        tensix_spec::DEST_REGISTER_FULL_SIZE
    }

    /// Rows in one double-buffer bank.
    fn dest_half_rows(&self) -> u32 {
        self.dest_rows() / 2
    }

    /// Replay buffer entries available to one thread.
    fn replay_capacity(&self) -> u32;

    /// Largest MOP outer/inner loop count.
    fn max_loop_count(&self) -> u32 {
        tensix_spec::MOP_MAX_LOOP_COUNT
    }

    // ========================================================================
    // Config Register Map
    // ========================================================================

    /// SrcA/SrcB address-mode register for `slot`.
    fn addr_mod_src(&self, slot: u8) -> u8;

    /// Dest/fidelity address-mode register for `slot`.
    fn addr_mod_dest(&self, slot: u8) -> u8;

    /// Bias address-mode register for `slot`.
    fn addr_mod_bias(&self, slot: u8) -> u8;

    /// Pack Y source/destination register attached to math `slot`.
    fn addr_mod_pack_y(&self, slot: u8) -> u8;

    /// Pack Y/Z register for pack `slot` (0..=3).
    fn addr_mod_pack(&self, slot: u8) -> u8;

    /// Register holding the math-side Dest base row.
    fn math_dest_offset(&self) -> u8;

    /// Register holding the pack-side Dest base row.
    fn pack_dest_offset(&self) -> u8;

    /// Dvalid chain control register for the client with bit index `client`.
    fn dvalid_ctrl(&self, client: u8) -> u8;
}

// ============================================================================
// Wormhole B0
// ============================================================================

/// Wormhole B0: semaphore hand-off, three threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct WormholeB0Config;

impl ArchSpec for WormholeB0Config {
    fn name(&self) -> &'static str {
        "Wormhole B0"
    }

    fn handshake(&self) -> HandshakeKind {
        HandshakeKind::Semaphore
    }

    fn thread_count(&self) -> usize {
        3
    }

    fn replay_capacity(&self) -> u32 {
        tensix_spec::REPLAY_BUFFER_CAPACITY
    }

    fn addr_mod_src(&self, slot: u8) -> u8 {
        wormhole_cfg::ADDR_MOD_AB_SEC0 + slot
    }

    fn addr_mod_dest(&self, slot: u8) -> u8 {
        wormhole_cfg::ADDR_MOD_DST_SEC0 + slot
    }

    fn addr_mod_bias(&self, slot: u8) -> u8 {
        wormhole_cfg::ADDR_MOD_BIAS_SEC0 + slot
    }

    fn addr_mod_pack_y(&self, slot: u8) -> u8 {
        wormhole_cfg::ADDR_MOD_PACK_Y_SEC0 + slot
    }

    fn addr_mod_pack(&self, slot: u8) -> u8 {
        wormhole_cfg::ADDR_MOD_PACK_SEC0 + slot
    }

    fn math_dest_offset(&self) -> u8 {
        wormhole_cfg::DEST_TARGET_REG_CFG_MATH_OFFSET
    }

    fn pack_dest_offset(&self) -> u8 {
        wormhole_cfg::DEST_TARGET_REG_CFG_PACK_OFFSET
    }

    fn dvalid_ctrl(&self, client: u8) -> u8 {
        wormhole_cfg::DEST_DVALID_CTRL_SEC0 + client
    }
}

// ============================================================================
// Blackhole
// ============================================================================

/// Blackhole: same hand-off and register map as Wormhole B0.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlackholeConfig;

impl ArchSpec for BlackholeConfig {
    fn name(&self) -> &'static str {
        "Blackhole"
    }

    fn handshake(&self) -> HandshakeKind {
        HandshakeKind::Semaphore
    }

    fn thread_count(&self) -> usize {
        3
    }

    fn replay_capacity(&self) -> u32 {
        tensix_spec::REPLAY_BUFFER_CAPACITY
    }

    fn addr_mod_src(&self, slot: u8) -> u8 {
        WormholeB0Config.addr_mod_src(slot)
    }

    fn addr_mod_dest(&self, slot: u8) -> u8 {
        WormholeB0Config.addr_mod_dest(slot)
    }

    fn addr_mod_bias(&self, slot: u8) -> u8 {
        WormholeB0Config.addr_mod_bias(slot)
    }

    fn addr_mod_pack_y(&self, slot: u8) -> u8 {
        WormholeB0Config.addr_mod_pack_y(slot)
    }

    fn addr_mod_pack(&self, slot: u8) -> u8 {
        WormholeB0Config.addr_mod_pack(slot)
    }

    fn math_dest_offset(&self) -> u8 {
        WormholeB0Config.math_dest_offset()
    }

    fn pack_dest_offset(&self) -> u8 {
        WormholeB0Config.pack_dest_offset()
    }

    fn dvalid_ctrl(&self, client: u8) -> u8 {
        WormholeB0Config.dvalid_ctrl(client)
    }
}

// ============================================================================
// Quasar
// ============================================================================

/// Quasar: per-client dvalid chain, separate SFPU thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuasarConfig;

impl ArchSpec for QuasarConfig {
    fn name(&self) -> &'static str {
        "Quasar"
    }

    fn handshake(&self) -> HandshakeKind {
        HandshakeKind::DataValid
    }

    fn thread_count(&self) -> usize {
        4
    }

    fn replay_capacity(&self) -> u32 {
        tensix_spec::QUASAR_REPLAY_BUFFER_CAPACITY
    }

    fn addr_mod_src(&self, slot: u8) -> u8 {
        quasar_cfg::ADDR_MOD_AB_SEC0 + slot
    }

    fn addr_mod_dest(&self, slot: u8) -> u8 {
        quasar_cfg::ADDR_MOD_DST_SEC0 + slot
    }

    fn addr_mod_bias(&self, slot: u8) -> u8 {
        quasar_cfg::ADDR_MOD_BIAS_SEC0 + slot
    }

    fn addr_mod_pack_y(&self, slot: u8) -> u8 {
        quasar_cfg::ADDR_MOD_PACK_Y_SEC0 + slot
    }

    fn addr_mod_pack(&self, slot: u8) -> u8 {
        quasar_cfg::ADDR_MOD_PACK_SEC0 + slot
    }

    fn math_dest_offset(&self) -> u8 {
        quasar_cfg::DEST_TARGET_REG_CFG_MATH_OFFSET
    }

    fn pack_dest_offset(&self) -> u8 {
        quasar_cfg::DEST_TARGET_REG_CFG_PACK_OFFSET
    }

    fn dvalid_ctrl(&self, client: u8) -> u8 {
        quasar_cfg::DEST_DVALID_CTRL_SEC0 + client
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wormhole_blackhole_share_register_map() {
        let wh = WormholeB0Config;
        let bh = BlackholeConfig;
        for slot in 0..8 {
            assert_eq!(wh.addr_mod_src(slot), bh.addr_mod_src(slot));
            assert_eq!(wh.addr_mod_dest(slot), bh.addr_mod_dest(slot));
            assert_eq!(wh.addr_mod_bias(slot), bh.addr_mod_bias(slot));
        }
        assert_eq!(wh.math_dest_offset(), bh.math_dest_offset());
    }

    #[test]
    fn test_register_families_do_not_overlap() {
        for spec in [&WormholeB0Config as &dyn ArchSpec, &QuasarConfig] {
            let mut seen = std::collections::HashSet::new();
            for slot in 0..8 {
                assert!(seen.insert(spec.addr_mod_src(slot)));
                assert!(seen.insert(spec.addr_mod_dest(slot)));
                assert!(seen.insert(spec.addr_mod_bias(slot)));
                assert!(seen.insert(spec.addr_mod_pack_y(slot)));
            }
            for slot in 0..4 {
                assert!(seen.insert(spec.addr_mod_pack(slot)));
                assert!(seen.insert(spec.dvalid_ctrl(slot)));
            }
            assert!(seen.insert(spec.math_dest_offset()));
            assert!(seen.insert(spec.pack_dest_offset()));
        }
    }

    #[test]
    fn test_handshake_per_generation() {
        assert_eq!(WormholeB0Config.handshake(), HandshakeKind::Semaphore);
        assert_eq!(BlackholeConfig.handshake(), HandshakeKind::Semaphore);
        assert_eq!(QuasarConfig.handshake(), HandshakeKind::DataValid);
        assert_eq!(QuasarConfig.thread_count(), 4);
    }

    #[test]
    fn test_replay_capacity_per_generation() {
        assert_eq!(WormholeB0Config.replay_capacity(), 32);
        assert_eq!(BlackholeConfig.replay_capacity(), 32);
        assert_eq!(QuasarConfig.replay_capacity(), 64);
        assert!(QuasarConfig.replay_capacity() <= tensix_spec::REPLAY_MAX_CAPACITY);
    }
}
