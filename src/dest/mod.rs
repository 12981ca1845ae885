//! Destination-register lifecycle.
//!
//! Dest is shared by every thread of a Tensix core. In [`DstSync::Half`]
//! mode it is split into two banks so math can fill one while pack drains
//! the other; in [`DstSync::Full`] mode the whole file is one bank and the
//! two phases serialize.
//!
//! Ownership moves between threads only through a [`Handshake`]: the
//! MATH_PACK semaphore on Wormhole and Blackhole, or a dvalid chain on
//! Quasar.
//!
//! # Usage
//!
//! ```ignore
//! use tensix_llk::dest::{DestClient, DestLifecycle, DstSync, Handshake};
//!
//! let mut math = DestLifecycle::new(arch, DestClient::Math, DstSync::Half, Handshake::Semaphore);
//! math.sync_init(&mut sink);
//! let bank = math.acquire_for_write(&mut sink);
//! // ... emit FPU work at bank.base_row ...
//! math.release_after_write(&mut sink);
//! ```

pub mod bank;
pub mod handshake;
pub mod lifecycle;

pub use bank::{max_tiles, BankSelect, DestBank, TileDims};
pub use handshake::{DvalidChain, Handshake, DVALID_CTRL_HALF};
pub use lifecycle::DestLifecycle;

use crate::isa::params::{p_cleardvalid, p_stall};
use std::fmt;

/// Dest buffering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DstSync {
    /// Two banks, producer and consumer overlap.
    #[default]
    Half,
    /// One bank, producer and consumer serialize.
    Full,
}

impl DstSync {
    /// Banks in this mode.
    pub const fn bank_count(self) -> u32 {
        match self {
            DstSync::Half => 2,
            DstSync::Full => 1,
        }
    }
}

/// A thread that touches Dest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DestClient {
    Unpack,
    Math,
    Sfpu,
    Pack,
}

impl DestClient {
    /// Hardware chain order.
    pub const ALL: [DestClient; 4] = [
        DestClient::Unpack,
        DestClient::Math,
        DestClient::Sfpu,
        DestClient::Pack,
    ];

    /// Bit of this client in dvalid masks.
    pub const fn dvalid_bit(self) -> u32 {
        match self {
            DestClient::Unpack => p_cleardvalid::UNPACK_TO_DEST,
            DestClient::Math => p_cleardvalid::FPU,
            DestClient::Sfpu => p_cleardvalid::SFPU,
            DestClient::Pack => p_cleardvalid::PACK,
        }
    }

    pub const fn bit_index(self) -> u8 {
        match self {
            DestClient::Unpack => 0,
            DestClient::Math => 1,
            DestClient::Sfpu => 2,
            DestClient::Pack => 3,
        }
    }

    pub fn from_bit_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    /// Stall resource that parks this client's thread.
    pub const fn stall_target(self) -> u32 {
        match self {
            DestClient::Unpack => p_stall::STALL_UNPACK,
            DestClient::Math => p_stall::STALL_MATH,
            DestClient::Sfpu => p_stall::STALL_SFPU,
            DestClient::Pack => p_stall::STALL_PACK,
        }
    }

    /// True for clients that read Dest out rather than write into it.
    pub const fn is_consumer(self) -> bool {
        matches!(self, DestClient::Pack)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            DestClient::Unpack => "unpack",
            DestClient::Math => "math",
            DestClient::Sfpu => "sfpu",
            DestClient::Pack => "pack",
        }
    }
}

impl fmt::Display for DestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
