//! Dest banks and bank selection.

use super::{DestClient, DstSync};
use crate::arch::ArchSpec;
use std::fmt;

/// One bank of the Dest register file as seen by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DestBank {
    /// 0 or 1 in Half mode, always 0 in Full mode.
    pub index: u8,
    /// First Dest row of the bank.
    pub base_row: u32,
    /// Rows in the bank.
    pub rows: u32,
    /// Client holding the bank, `None` once released.
    pub owner: Option<DestClient>,
    /// How many times this client has acquired this bank.
    pub epoch: u32,
}

impl DestBank {
    /// True if `row` falls inside this bank.
    pub fn contains_row(&self, row: u32) -> bool {
        row >= self.base_row && row < self.base_row + self.rows
    }
}

impl fmt::Display for DestBank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bank{}@{}", self.index, self.base_row)?;
        if let Some(owner) = self.owner {
            write!(f, " ({})", owner)?;
        }
        Ok(())
    }
}

/// Round-robin bank selector: period 2 in Half mode, fixed in Full mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BankSelect {
    mode: DstSync,
    index: u8,
    half_rows: u32,
}

impl BankSelect {
    pub fn new(mode: DstSync, arch: &dyn ArchSpec) -> Self {
        Self {
            mode,
            index: 0,
            half_rows: arch.dest_half_rows(),
        }
    }

    #[inline]
    pub fn index(&self) -> u8 {
        self.index
    }

    /// Base row of the selected bank.
    #[inline]
    pub fn base_row(&self) -> u32 {
        self.index as u32 * self.half_rows
    }

    /// Rows in each bank.
    #[inline]
    pub fn bank_rows(&self) -> u32 {
        match self.mode {
            DstSync::Half => self.half_rows,
            DstSync::Full => self.half_rows * 2,
        }
    }

    /// Advance to the next bank. No-op in Full mode.
    pub fn flip(&mut self) {
        if self.mode == DstSync::Half {
            self.index = 1 - self.index;
        }
    }

    pub fn reset(&mut self) {
        self.index = 0;
    }
}

/// Rows of one tile in Dest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TileDims {
    #[default]
    Tile32x32,
    Tile32x16,
    Tile16x16,
}

impl TileDims {
    /// log2 of the Dest rows one tile occupies.
    pub const fn rows_log2(self) -> u32 {
        match self {
            TileDims::Tile32x32 => 6,
            TileDims::Tile32x16 => 5,
            TileDims::Tile16x16 => 4,
        }
    }

    pub const fn rows(self) -> u32 {
        1 << self.rows_log2()
    }
}

/// Tiles one bank can hold.
///
/// 32-bit accumulation halves the capacity.
pub fn max_tiles(arch: &dyn ArchSpec, mode: DstSync, fp32_accumulate: bool, dims: TileDims) -> u32 {
    let mut rows = match mode {
        DstSync::Half => arch.dest_half_rows(),
        DstSync::Full => arch.dest_rows(),
    };
    if fp32_accumulate {
        rows >>= 1;
    }
    rows >> dims.rows_log2()
}
