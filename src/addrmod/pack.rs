//! Pack address modes.
//!
//! Pack slots 0..=3 use a Y/Z layout instead of the math layout:
//! `y_src | y_dst << 6 | z_src << 12 | z_dst << 14`.

use super::fields::{AddrModField, PackYField, PackZField};
use super::AddrModSlot;
use crate::arch::ArchSpec;
use crate::isa::{ops, InstructionSink};

/// Declarative request for one pack slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AddrModPack {
    pub y_src: PackYField,
    pub y_dst: PackYField,
    pub z_src: PackZField,
    pub z_dst: PackZField,
}

impl AddrModPack {
    #[inline]
    pub const fn new() -> Self {
        Self {
            y_src: PackYField::new(0, false, false),
            y_dst: PackYField::new(0, false, false),
            z_src: PackZField::new(0, false),
            z_dst: PackZField::new(0, false),
        }
    }

    #[inline]
    pub const fn y_src(self, y_src: PackYField) -> Self {
        Self { y_src, ..self }
    }

    #[inline]
    pub const fn y_dst(self, y_dst: PackYField) -> Self {
        Self { y_dst, ..self }
    }

    #[inline]
    pub const fn z_src(self, z_src: PackZField) -> Self {
        Self { z_src, ..self }
    }

    #[inline]
    pub const fn z_dst(self, z_dst: PackZField) -> Self {
        Self { z_dst, ..self }
    }

    #[inline]
    pub const fn word(&self) -> u16 {
        self.y_src.val() | (self.y_dst.val() << 6) | (self.z_src.val() << 12) | (self.z_dst.val() << 14)
    }

    pub fn from_word(word: u16) -> Self {
        Self {
            y_src: PackYField::decode(word & 0x3f),
            y_dst: PackYField::decode((word >> 6) & 0x3f),
            z_src: PackZField::decode((word >> 12) & 0x3),
            z_dst: PackZField::decode((word >> 14) & 0x3),
        }
    }

    /// Commit to pack `slot`, which must be one of the first four.
    pub fn configure(&self, slot: AddrModSlot, arch: &dyn ArchSpec, sink: &mut impl InstructionSink) {
        debug_assert!(slot.is_pack_slot(), "pack address modes only exist in slots 0..=3");
        log::debug!("{}: pack {} <- 0x{:04x}", arch.name(), slot, self.word());
        sink.issue(ops::setc16(arch.addr_mod_pack(slot.index() & 0x3), self.word()));
    }

    pub fn read_back(slot: AddrModSlot, arch: &dyn ArchSpec, read: impl Fn(u8) -> u16) -> Self {
        Self::from_word(read(arch.addr_mod_pack(slot.index() & 0x3)))
    }
}
