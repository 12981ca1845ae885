//! Per-register address-mode fields.
//!
//! Each field is an `{increment, clear, carriage-return}` request packed
//! into a fixed number of bits. Runtime constructors debug-assert the
//! increment range and the hardware-visible encoding masks it; the
//! `incr_const` constructors reject out-of-range values at compile time.

/// A packed address-mode field.
pub trait AddrModField: Copy + Default + PartialEq + std::fmt::Debug {
    /// Bits the packed value occupies.
    const WIDTH: u32;

    /// Largest increment the field encodes.
    const INCR_MAX: u16;

    /// Packed bits as committed to the slot register.
    fn encode(self) -> u16;

    /// Recover the request from packed bits.
    fn decode(bits: u16) -> Self;
}

// ============================================================================
// Source operands (SrcA / SrcB)
// ============================================================================

/// SrcA or SrcB pointer update: `incr[5:0] | cr<<6 | clr<<7`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SrcField {
    pub incr: u8,
    pub clr: bool,
    pub cr: bool,
}

impl SrcField {
    #[inline]
    pub const fn new(incr: u8, clr: bool, cr: bool) -> Self {
        debug_assert!(incr <= 63, "src increment exceeds 6 bits");
        Self { incr, clr, cr }
    }

    #[inline]
    pub const fn incr(incr: u8) -> Self {
        Self::new(incr, false, false)
    }

    /// Increment checked at compile time.
    #[inline]
    pub const fn incr_const<const N: u8>() -> Self {
        const { assert!(N <= 63, "src increment exceeds 6 bits") };
        Self::new(N, false, false)
    }

    /// Reset the pointer to zero.
    #[inline]
    pub const fn clear() -> Self {
        Self::new(0, true, false)
    }

    /// Also apply the increment to the carriage-return counter.
    #[inline]
    pub const fn with_cr(self) -> Self {
        Self { cr: true, ..self }
    }

    #[inline]
    pub const fn val(self) -> u16 {
        (self.incr as u16 & 0x3f) | ((self.cr as u16) << 6) | ((self.clr as u16) << 7)
    }
}

impl AddrModField for SrcField {
    const WIDTH: u32 = 8;
    const INCR_MAX: u16 = 63;

    fn encode(self) -> u16 {
        self.val()
    }

    fn decode(bits: u16) -> Self {
        Self {
            incr: (bits & 0x3f) as u8,
            cr: bits & (1 << 6) != 0,
            clr: bits & (1 << 7) != 0,
        }
    }
}

// ============================================================================
// Destination
// ============================================================================

/// Dest pointer update: `incr[9:0] | cr<<10 | clr<<11 | c_to_cr<<12`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DestField {
    pub incr: u16,
    pub clr: bool,
    pub cr: bool,
    /// Copy the updated counter into the carriage-return counter.
    pub c_to_cr: bool,
}

impl DestField {
    #[inline]
    pub const fn new(incr: u16, clr: bool, cr: bool, c_to_cr: bool) -> Self {
        debug_assert!(incr <= 1023, "dest increment exceeds 10 bits");
        Self { incr, clr, cr, c_to_cr }
    }

    #[inline]
    pub const fn incr(incr: u16) -> Self {
        Self::new(incr, false, false, false)
    }

    #[inline]
    pub const fn incr_const<const N: u16>() -> Self {
        const { assert!(N <= 1023, "dest increment exceeds 10 bits") };
        Self::new(N, false, false, false)
    }

    #[inline]
    pub const fn clear() -> Self {
        Self::new(0, true, false, false)
    }

    #[inline]
    pub const fn with_cr(self) -> Self {
        Self { cr: true, ..self }
    }

    #[inline]
    pub const fn with_c_to_cr(self) -> Self {
        Self { c_to_cr: true, ..self }
    }

    #[inline]
    pub const fn val(self) -> u16 {
        (self.incr & 0x3ff)
            | ((self.cr as u16) << 10)
            | ((self.clr as u16) << 11)
            | ((self.c_to_cr as u16) << 12)
    }
}

impl AddrModField for DestField {
    const WIDTH: u32 = 13;
    const INCR_MAX: u16 = 1023;

    fn encode(self) -> u16 {
        self.val()
    }

    fn decode(bits: u16) -> Self {
        Self {
            incr: bits & 0x3ff,
            cr: bits & (1 << 10) != 0,
            clr: bits & (1 << 11) != 0,
            c_to_cr: bits & (1 << 12) != 0,
        }
    }
}

// ============================================================================
// Fidelity and Bias
// ============================================================================

/// Fidelity phase counter update: `incr[1:0] | clr<<2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FidelityField {
    pub incr: u8,
    pub clr: bool,
}

impl FidelityField {
    #[inline]
    pub const fn new(incr: u8, clr: bool) -> Self {
        debug_assert!(incr <= 3, "fidelity increment exceeds 2 bits");
        Self { incr, clr }
    }

    #[inline]
    pub const fn incr(incr: u8) -> Self {
        Self::new(incr, false)
    }

    #[inline]
    pub const fn clear() -> Self {
        Self::new(0, true)
    }

    #[inline]
    pub const fn val(self) -> u16 {
        (self.incr as u16 & 0x3) | ((self.clr as u16) << 2)
    }
}

impl AddrModField for FidelityField {
    const WIDTH: u32 = 3;
    const INCR_MAX: u16 = 3;

    fn encode(self) -> u16 {
        self.val()
    }

    fn decode(bits: u16) -> Self {
        Self {
            incr: (bits & 0x3) as u8,
            clr: bits & (1 << 2) != 0,
        }
    }
}

/// Bias counter update: `incr[3:0] | clr<<4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BiasField {
    pub incr: u8,
    pub clr: bool,
}

impl BiasField {
    #[inline]
    pub const fn new(incr: u8, clr: bool) -> Self {
        debug_assert!(incr <= 15, "bias increment exceeds 4 bits");
        Self { incr, clr }
    }

    #[inline]
    pub const fn incr(incr: u8) -> Self {
        Self::new(incr, false)
    }

    #[inline]
    pub const fn clear() -> Self {
        Self::new(0, true)
    }

    #[inline]
    pub const fn val(self) -> u16 {
        (self.incr as u16 & 0xf) | ((self.clr as u16) << 4)
    }
}

impl AddrModField for BiasField {
    const WIDTH: u32 = 5;
    const INCR_MAX: u16 = 15;

    fn encode(self) -> u16 {
        self.val()
    }

    fn decode(bits: u16) -> Self {
        Self {
            incr: (bits & 0xf) as u8,
            clr: bits & (1 << 4) != 0,
        }
    }
}

// ============================================================================
// Pack Y / Z
// ============================================================================

/// Pack Y counter update: `incr[3:0] | cr<<4 | clr<<5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PackYField {
    pub incr: u8,
    pub clr: bool,
    pub cr: bool,
}

impl PackYField {
    #[inline]
    pub const fn new(incr: u8, clr: bool, cr: bool) -> Self {
        debug_assert!(incr <= 15, "pack y increment exceeds 4 bits");
        Self { incr, clr, cr }
    }

    #[inline]
    pub const fn incr(incr: u8) -> Self {
        Self::new(incr, false, false)
    }

    #[inline]
    pub const fn clear() -> Self {
        Self::new(0, true, false)
    }

    #[inline]
    pub const fn with_cr(self) -> Self {
        Self { cr: true, ..self }
    }

    #[inline]
    pub const fn val(self) -> u16 {
        (self.incr as u16 & 0xf) | ((self.cr as u16) << 4) | ((self.clr as u16) << 5)
    }
}

impl AddrModField for PackYField {
    const WIDTH: u32 = 6;
    const INCR_MAX: u16 = 15;

    fn encode(self) -> u16 {
        self.val()
    }

    fn decode(bits: u16) -> Self {
        Self {
            incr: (bits & 0xf) as u8,
            cr: bits & (1 << 4) != 0,
            clr: bits & (1 << 5) != 0,
        }
    }
}

/// Pack Z (face) counter update: `incr[0] | clr<<1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PackZField {
    pub incr: u8,
    pub clr: bool,
}

impl PackZField {
    #[inline]
    pub const fn new(incr: u8, clr: bool) -> Self {
        debug_assert!(incr <= 1, "pack z increment exceeds 1 bit");
        Self { incr, clr }
    }

    #[inline]
    pub const fn incr(incr: u8) -> Self {
        Self::new(incr, false)
    }

    #[inline]
    pub const fn clear() -> Self {
        Self::new(0, true)
    }

    #[inline]
    pub const fn val(self) -> u16 {
        (self.incr as u16 & 0x1) | ((self.clr as u16) << 1)
    }
}

impl AddrModField for PackZField {
    const WIDTH: u32 = 2;
    const INCR_MAX: u16 = 1;

    fn encode(self) -> u16 {
        self.val()
    }

    fn decode(bits: u16) -> Self {
        Self {
            incr: (bits & 0x1) as u8,
            clr: bits & (1 << 1) != 0,
        }
    }
}
