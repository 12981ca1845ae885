//! Tensix instruction words and the field builder used to encode them.
//!
//! Every Tensix instruction is one 32-bit word:
//!
//! | Bits    | Content                     |
//! |---------|-----------------------------|
//! | 31:24   | Opcode                      |
//! | 23:0    | Opcode-specific parameters  |
//!
//! Parameter layouts are described once as [`Field`] constants in
//! [`layout`] and shared by the encoders in [`super::ops`] and the decoder
//! in [`super::decode`].

use std::fmt;

/// Number of parameter bits below the opcode.
pub const PARAM_BITS: u32 = 24;

/// Mask for the parameter bits.
pub const PARAM_MASK: u32 = (1 << PARAM_BITS) - 1;

/// Tensix opcodes used by the kernel core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Mop = 0x01,
    Nop = 0x02,
    MopCfg = 0x03,
    Replay = 0x04,
    ZeroAcc = 0x10,
    MvMul = 0x26,
    ElwMul = 0x27,
    ElwAdd = 0x28,
    ElwSub = 0x30,
    GmPool = 0x33,
    ClearDvalid = 0x36,
    SetRwc = 0x37,
    IncRwc = 0x38,
    Pacr = 0x41,
    SetDvalid = 0x57,
    StallWait = 0xa2,
    SemInit = 0xa3,
    SemPost = 0xa4,
    SemGet = 0xa5,
    SemWait = 0xa6,
    SetC16 = 0xb2,
}

impl Opcode {
    /// Look up an opcode byte.
    pub const fn from_u8(byte: u8) -> Option<Self> {
        Some(match byte {
            0x01 => Opcode::Mop,
            0x02 => Opcode::Nop,
            0x03 => Opcode::MopCfg,
            0x04 => Opcode::Replay,
            0x10 => Opcode::ZeroAcc,
            0x26 => Opcode::MvMul,
            0x27 => Opcode::ElwMul,
            0x28 => Opcode::ElwAdd,
            0x30 => Opcode::ElwSub,
            0x33 => Opcode::GmPool,
            0x36 => Opcode::ClearDvalid,
            0x37 => Opcode::SetRwc,
            0x38 => Opcode::IncRwc,
            0x41 => Opcode::Pacr,
            0x57 => Opcode::SetDvalid,
            0xa2 => Opcode::StallWait,
            0xa3 => Opcode::SemInit,
            0xa4 => Opcode::SemPost,
            0xa5 => Opcode::SemGet,
            0xa6 => Opcode::SemWait,
            0xb2 => Opcode::SetC16,
            _ => return None,
        })
    }

    /// Assembly mnemonic.
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Mop => "MOP",
            Opcode::Nop => "NOP",
            Opcode::MopCfg => "MOP_CFG",
            Opcode::Replay => "REPLAY",
            Opcode::ZeroAcc => "ZEROACC",
            Opcode::MvMul => "MVMUL",
            Opcode::ElwMul => "ELWMUL",
            Opcode::ElwAdd => "ELWADD",
            Opcode::ElwSub => "ELWSUB",
            Opcode::GmPool => "GMPOOL",
            Opcode::ClearDvalid => "CLEARDVALID",
            Opcode::SetRwc => "SETRWC",
            Opcode::IncRwc => "INCRWC",
            Opcode::Pacr => "PACR",
            Opcode::SetDvalid => "SETDVALID",
            Opcode::StallWait => "STALLWAIT",
            Opcode::SemInit => "SEMINIT",
            Opcode::SemPost => "SEMPOST",
            Opcode::SemGet => "SEMGET",
            Opcode::SemWait => "SEMWAIT",
            Opcode::SetC16 => "SETC16",
        }
    }

    /// True for instructions that run on the FPU and consume an address mode.
    pub const fn is_fpu(self) -> bool {
        matches!(
            self,
            Opcode::ElwAdd | Opcode::ElwSub | Opcode::ElwMul | Opcode::MvMul | Opcode::GmPool
        )
    }
}

/// A fixed-width bit field inside the 24 parameter bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Position of the least significant bit.
    pub shift: u32,
    /// Width in bits.
    pub width: u32,
}

impl Field {
    #[inline]
    pub const fn new(shift: u32, width: u32) -> Self {
        Self { shift, width }
    }

    /// Mask of the field, right-aligned.
    #[inline]
    pub const fn mask(self) -> u32 {
        (1u32 << self.width) - 1
    }

    /// Largest value the field can hold.
    #[inline]
    pub const fn max(self) -> u32 {
        self.mask()
    }

    /// True when `value` fits without truncation.
    #[inline]
    pub const fn fits(self, value: u32) -> bool {
        value <= self.mask()
    }
}

/// One encoded Tensix instruction.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Instr(u32);

impl Default for Instr {
    fn default() -> Self {
        Self::NOP
    }
}

impl Instr {
    /// The canonical no-op.
    pub const NOP: Instr = Instr((Opcode::Nop as u32) << PARAM_BITS);

    /// Wrap a raw instruction word.
    #[inline]
    pub const fn from_word(word: u32) -> Self {
        Self(word)
    }

    /// The raw instruction word.
    #[inline]
    pub const fn word(self) -> u32 {
        self.0
    }

    /// Opcode byte.
    #[inline]
    pub const fn opcode_byte(self) -> u8 {
        (self.0 >> PARAM_BITS) as u8
    }

    /// Decoded opcode, if known.
    #[inline]
    pub const fn opcode(self) -> Option<Opcode> {
        Opcode::from_u8(self.opcode_byte())
    }

    /// Parameter bits.
    #[inline]
    pub const fn params(self) -> u32 {
        self.0 & PARAM_MASK
    }

    /// Extract a parameter field.
    #[inline]
    pub const fn get(self, field: Field) -> u32 {
        (self.0 >> field.shift) & field.mask()
    }

    /// True for a NOP word of any parameter value.
    #[inline]
    pub const fn is_nop(self) -> bool {
        self.opcode_byte() == Opcode::Nop as u8
    }
}

impl fmt::Debug for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instr({})", self)
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.opcode() {
            Some(op) => write!(f, "{} 0x{:06x}", op.mnemonic(), self.params()),
            None => write!(f, "?{:02x} 0x{:06x}", self.opcode_byte(), self.params()),
        }
    }
}

impl From<Instr> for u32 {
    fn from(instr: Instr) -> Self {
        instr.0
    }
}

/// Builder over the fixed-width parameter fields of one opcode.
///
/// Values wider than their field trip a debug assertion; release builds
/// mask them, which is what the hardware sees.
#[derive(Debug, Clone, Copy)]
pub struct InstrBuilder {
    word: u32,
}

impl InstrBuilder {
    #[inline]
    pub const fn new(opcode: Opcode) -> Self {
        Self {
            word: (opcode as u32) << PARAM_BITS,
        }
    }

    /// Set a field.
    #[inline]
    pub const fn set(self, field: Field, value: u32) -> Self {
        debug_assert!(field.fits(value), "instruction field value exceeds its width");
        Self {
            word: self.word | ((value & field.mask()) << field.shift),
        }
    }

    /// Set a single-bit field from a flag.
    #[inline]
    pub const fn flag(self, field: Field, value: bool) -> Self {
        self.set(field, value as u32)
    }

    #[inline]
    pub const fn build(self) -> Instr {
        Instr(self.word)
    }
}

/// Parameter layouts, one submodule per opcode family.
pub mod layout {
    use super::Field;

    pub mod mop {
        use super::Field;
        pub const TEMPLATE: Field = Field::new(23, 1);
        pub const LOOP_COUNT: Field = Field::new(16, 7);
        pub const ZMASK_LO16: Field = Field::new(0, 16);
    }

    pub mod mop_cfg {
        use super::Field;
        pub const ZMASK_HI16: Field = Field::new(0, 16);
    }

    pub mod replay {
        use super::Field;
        pub const START: Field = Field::new(14, 10);
        pub const LEN: Field = Field::new(4, 10);
        pub const EXEC_WHILE_LOADING: Field = Field::new(1, 1);
        pub const LOAD_MODE: Field = Field::new(0, 1);
    }

    pub mod setc16 {
        use super::Field;
        pub const REG: Field = Field::new(16, 8);
        pub const VALUE: Field = Field::new(0, 16);
    }

    pub mod sem {
        use super::Field;
        pub const MAX: Field = Field::new(20, 4);
        pub const INIT: Field = Field::new(16, 4);
        pub const STALL_RES: Field = Field::new(15, 9);
        pub const SEL: Field = Field::new(2, 8);
        pub const COND: Field = Field::new(0, 2);
    }

    pub mod stallwait {
        use super::Field;
        pub const STALL_RES: Field = Field::new(15, 9);
        pub const WAIT_RES: Field = Field::new(0, 15);
    }

    pub mod rwc {
        use super::Field;
        pub const CLEAR_AB: Field = Field::new(22, 2);
        pub const CR: Field = Field::new(18, 4);
        pub const D: Field = Field::new(14, 4);
        pub const B: Field = Field::new(10, 4);
        pub const A: Field = Field::new(6, 4);
        pub const MASK: Field = Field::new(0, 6);
    }

    pub mod fpu {
        use super::Field;
        pub const CLEAR_DVALID: Field = Field::new(22, 2);
        pub const DEST_ACCUM: Field = Field::new(21, 1);
        pub const INSTR_MOD: Field = Field::new(19, 2);
        pub const ADDR_MODE: Field = Field::new(14, 5);
        pub const DST: Field = Field::new(0, 14);
    }

    pub mod zeroacc {
        use super::Field;
        pub const CLEAR_MODE: Field = Field::new(19, 5);
        pub const ADDR_MODE: Field = Field::new(15, 2);
        pub const DST: Field = Field::new(0, 15);
    }

    pub mod pacr {
        use super::Field;
        pub const ADDR_MODE: Field = Field::new(15, 2);
        pub const ZERO_WRITE: Field = Field::new(12, 3);
        pub const PACK_SEL: Field = Field::new(8, 4);
        pub const CONCAT: Field = Field::new(4, 3);
        pub const FLUSH: Field = Field::new(1, 1);
        pub const LAST: Field = Field::new(0, 1);
    }

    pub mod dvalid {
        use super::Field;
        pub const SRC_CLEAR: Field = Field::new(22, 2);
        pub const DEST_DONE: Field = Field::new(8, 4);
        pub const RESET: Field = Field::new(0, 4);
        pub const SRC_SET: Field = Field::new(0, 2);
    }

    /// Fields of one opcode family must not overlap each other.
    #[cfg(test)]
    pub(crate) fn overlaps(fields: &[Field]) -> bool {
        let mut used = 0u32;
        for f in fields {
            let bits = f.mask() << f.shift;
            if used & bits != 0 || f.shift + f.width > super::PARAM_BITS {
                return true;
            }
            used |= bits;
        }
        false
    }
}
