//! Address-mode register bank.
//!
//! Eight hardware slots describe how the SrcA, SrcB, Dest, fidelity and
//! bias counters move after each FPU instruction. A kernel declares what it
//! wants with [`AddrMod`] and commits it to a slot with
//! [`AddrMod::configure`]; FPU instructions then name the slot in their
//! `addr_mode` field.
//!
//! Pack slots (0..=3) carry a separate Y/Z layout, see [`AddrModPack`].
//!
//! # Usage
//!
//! ```ignore
//! use tensix_llk::addrmod::{AddrMod, AddrModSlot, DestField, SrcField};
//!
//! AddrMod::new()
//!     .srca(SrcField::incr(8))
//!     .srcb(SrcField::incr(8))
//!     .dest(DestField::incr(8))
//!     .configure(AddrModSlot::ADDR_MOD_0, arch.spec(), &mut sink);
//! ```

pub mod fields;
pub mod pack;

pub use fields::{
    AddrModField, BiasField, DestField, FidelityField, PackYField, PackZField, SrcField,
};
pub use pack::AddrModPack;

use crate::arch::ArchSpec;
use crate::isa::{ops, InstructionSink};
use std::fmt;

/// Number of address-mode slots.
pub const NUM_ADDR_MOD_SLOTS: u8 = 8;

/// Number of slots with a pack Y/Z layout.
pub const NUM_PACK_ADDR_MOD_SLOTS: u8 = 4;

/// Index of one address-mode slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AddrModSlot(u8);

impl AddrModSlot {
    pub const ADDR_MOD_0: Self = Self(0);
    pub const ADDR_MOD_1: Self = Self(1);
    pub const ADDR_MOD_2: Self = Self(2);
    pub const ADDR_MOD_3: Self = Self(3);
    pub const ADDR_MOD_4: Self = Self(4);
    pub const ADDR_MOD_5: Self = Self(5);
    pub const ADDR_MOD_6: Self = Self(6);
    pub const ADDR_MOD_7: Self = Self(7);

    #[inline]
    pub const fn new(index: u8) -> Self {
        debug_assert!(index < NUM_ADDR_MOD_SLOTS, "address-mode slot out of range");
        Self(index & (NUM_ADDR_MOD_SLOTS - 1))
    }

    #[inline]
    pub const fn index(self) -> u8 {
        self.0
    }

    /// Value for an instruction's `addr_mode` field.
    #[inline]
    pub const fn field(self) -> u32 {
        self.0 as u32
    }

    /// True if this slot also has a pack Y/Z register.
    #[inline]
    pub const fn is_pack_slot(self) -> bool {
        self.0 < NUM_PACK_ADDR_MOD_SLOTS
    }
}

impl fmt::Display for AddrModSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ADDR_MOD_{}", self.0)
    }
}

/// Packed register words for one math slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AddrModWords {
    /// `srca | srcb << 8`
    pub src: u16,
    /// `dest | fidelity << 13`
    pub dest: u16,
    /// `bias`
    pub bias: u16,
    /// `pack_ysrc | pack_ydst << 6`
    pub pack_y: u16,
}

/// Declarative address-mode request for one math slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AddrMod {
    pub srca: SrcField,
    pub srcb: SrcField,
    pub dest: DestField,
    pub fidelity: FidelityField,
    pub bias: BiasField,
    pub pack_ysrc: PackYField,
    pub pack_ydst: PackYField,
}

impl AddrMod {
    /// All counters hold their value.
    #[inline]
    pub const fn new() -> Self {
        Self {
            srca: SrcField::new(0, false, false),
            srcb: SrcField::new(0, false, false),
            dest: DestField::new(0, false, false, false),
            fidelity: FidelityField::new(0, false),
            bias: BiasField::new(0, false),
            pack_ysrc: PackYField::new(0, false, false),
            pack_ydst: PackYField::new(0, false, false),
        }
    }

    #[inline]
    pub const fn srca(self, srca: SrcField) -> Self {
        Self { srca, ..self }
    }

    #[inline]
    pub const fn srcb(self, srcb: SrcField) -> Self {
        Self { srcb, ..self }
    }

    #[inline]
    pub const fn dest(self, dest: DestField) -> Self {
        Self { dest, ..self }
    }

    #[inline]
    pub const fn fidelity(self, fidelity: FidelityField) -> Self {
        Self { fidelity, ..self }
    }

    #[inline]
    pub const fn bias(self, bias: BiasField) -> Self {
        Self { bias, ..self }
    }

    #[inline]
    pub const fn pack_ysrc(self, pack_ysrc: PackYField) -> Self {
        Self { pack_ysrc, ..self }
    }

    #[inline]
    pub const fn pack_ydst(self, pack_ydst: PackYField) -> Self {
        Self { pack_ydst, ..self }
    }

    /// Pack into the slot's register words.
    #[inline]
    pub const fn words(&self) -> AddrModWords {
        AddrModWords {
            src: self.srca.val() | (self.srcb.val() << 8),
            dest: self.dest.val() | (self.fidelity.val() << 13),
            bias: self.bias.val(),
            pack_y: self.pack_ysrc.val() | (self.pack_ydst.val() << 6),
        }
    }

    /// Recover the request from committed register words.
    pub fn from_words(words: AddrModWords) -> Self {
        Self {
            srca: SrcField::decode(words.src & 0xff),
            srcb: SrcField::decode(words.src >> 8),
            dest: DestField::decode(words.dest & 0x1fff),
            fidelity: FidelityField::decode(words.dest >> 13),
            bias: BiasField::decode(words.bias),
            pack_ysrc: PackYField::decode(words.pack_y & 0x3f),
            pack_ydst: PackYField::decode((words.pack_y >> 6) & 0x3f),
        }
    }

    /// Commit this request to `slot`.
    pub fn configure(&self, slot: AddrModSlot, arch: &dyn ArchSpec, sink: &mut impl InstructionSink) {
        let words = self.words();
        let s = slot.index();
        log::debug!("{}: {} <- {:?}", arch.name(), slot, words);
        sink.issue(ops::setc16(arch.addr_mod_src(s), words.src));
        sink.issue(ops::setc16(arch.addr_mod_dest(s), words.dest));
        sink.issue(ops::setc16(arch.addr_mod_bias(s), words.bias));
        sink.issue(ops::setc16(arch.addr_mod_pack_y(s), words.pack_y));
    }

    /// Read a slot back through a config-register accessor.
    pub fn read_back(slot: AddrModSlot, arch: &dyn ArchSpec, read: impl Fn(u8) -> u16) -> Self {
        let s = slot.index();
        Self::from_words(AddrModWords {
            src: read(arch.addr_mod_src(s)),
            dest: read(arch.addr_mod_dest(s)),
            bias: read(arch.addr_mod_bias(s)),
            pack_y: read(arch.addr_mod_pack_y(s)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::Arch;
    use crate::isa::{Decoded, ThreadProgram};
    use std::collections::HashMap;

    /// Apply every SETC16 in a program to a register map.
    fn commit(prog: &ThreadProgram) -> HashMap<u8, u16> {
        let mut regs = HashMap::new();
        for instr in prog.instructions() {
            if let Ok(Decoded::SetC16 { reg, value }) = instr.decode() {
                regs.insert(reg, value);
            }
        }
        regs
    }

    #[test]
    fn test_slot_display_and_field() {
        assert_eq!(AddrModSlot::ADDR_MOD_3.to_string(), "ADDR_MOD_3");
        assert_eq!(AddrModSlot::new(7).field(), 7);
        assert!(AddrModSlot::ADDR_MOD_3.is_pack_slot());
        assert!(!AddrModSlot::ADDR_MOD_4.is_pack_slot());
    }

    #[test]
    fn test_words_layout() {
        let am = AddrMod::new()
            .srca(SrcField::incr(8))
            .srcb(SrcField::clear())
            .dest(DestField::incr(8).with_cr())
            .fidelity(FidelityField::incr(1))
            .bias(BiasField::incr(2));
        let w = am.words();
        assert_eq!(w.src, 8 | (0x80 << 8));
        assert_eq!(w.dest, (8 | 1 << 10) | (1 << 13));
        assert_eq!(w.bias, 2);
        assert_eq!(w.pack_y, 0);
    }

    #[test]
    fn test_configure_emits_one_write_per_register() {
        let arch = Arch::WormholeB0.spec();
        let mut prog = ThreadProgram::new();
        AddrMod::new()
            .dest(DestField::incr(16))
            .configure(AddrModSlot::ADDR_MOD_2, arch, &mut prog);

        let regs = commit(&prog);
        assert_eq!(prog.len(), 4);
        assert_eq!(regs[&arch.addr_mod_dest(2)], 16);
        assert_eq!(regs[&arch.addr_mod_src(2)], 0);
    }

    #[test]
    fn test_round_trip_boundaries() {
        let extremes = [
            AddrMod::new(),
            AddrMod::new()
                .srca(SrcField::new(63, true, true))
                .srcb(SrcField::new(63, true, true))
                .dest(DestField::new(1023, true, true, true))
                .fidelity(FidelityField::new(3, true))
                .bias(BiasField::new(15, true))
                .pack_ysrc(PackYField::new(15, true, true))
                .pack_ydst(PackYField::new(15, true, true)),
            AddrMod::new()
                .srca(SrcField::new(1, false, true))
                .srcb(SrcField::new(0, true, false))
                .dest(DestField::new(1, false, false, true)),
        ];

        for arch in Arch::ALL {
            for (i, am) in extremes.iter().enumerate() {
                let slot = AddrModSlot::new(i as u8 + 5);
                let mut prog = ThreadProgram::new();
                am.configure(slot, arch.spec(), &mut prog);
                let regs = commit(&prog);
                let back = AddrMod::read_back(slot, arch.spec(), |r| regs.get(&r).copied().unwrap_or(0));
                assert_eq!(&back, am, "{} slot {}", arch, slot);
            }
        }
    }

    #[test]
    fn test_slots_are_independent() {
        let arch = Arch::Blackhole.spec();
        let mut prog = ThreadProgram::new();
        let a = AddrMod::new().srca(SrcField::incr(4));
        let b = AddrMod::new().srca(SrcField::incr(9));
        a.configure(AddrModSlot::ADDR_MOD_0, arch, &mut prog);
        b.configure(AddrModSlot::ADDR_MOD_1, arch, &mut prog);
        let regs = commit(&prog);
        let read = |r: u8| regs.get(&r).copied().unwrap_or(0);
        assert_eq!(AddrMod::read_back(AddrModSlot::ADDR_MOD_0, arch, read), a);
        assert_eq!(AddrMod::read_back(AddrModSlot::ADDR_MOD_1, arch, read), b);
    }
}
