//! Thread-level Tensix simulator.
//!
//! Runs the programs kernels emit, one op per unblocked thread per step,
//! against a model of the parts the hand-off protocols touch: semaphores,
//! dvalid ownership, config registers, read/write counters, Src and Dest.
//! It exists to check protocol properties (no read before signal, correct
//! bank alternation, no deadlock) rather than cycle timing or numerics.
//!
//! # Usage
//!
//! ```ignore
//! use tensix_llk::sim::TensixCore;
//! use tensix_llk::thread::ThreadId;
//!
//! let mut core = TensixCore::for_arch(Arch::WormholeB0);
//! core.load(ThreadId::Math, math.finish())?;
//! core.load(ThreadId::Pack, pack.finish())?;
//! let summary = core.run()?;
//! assert!(core.hazards().is_empty());
//! ```

pub mod core;
pub mod deadlock;
pub mod execute;
pub mod hazard;
pub mod regs;
pub mod stats;
pub mod sync;
pub mod thread;

pub use self::core::TensixCore;
pub use deadlock::{DeadlockCycle, DeadlockDetector, WaitTarget};
pub use hazard::{DestHazard, HazardKind};
pub use regs::{Face, Row};
pub use stats::{StatsSummary, ThreadStats};
pub use sync::{Semaphore, SemaphoreStats};

use crate::arch::Arch;
use crate::isa::DecodeError;
use crate::mop::MopCountError;
use crate::thread::ThreadId;
use std::fmt;
use thiserror::Error;

/// Ways a simulation can fail.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SimError {
    /// Threads wait on each other in a cycle.
    #[error("deadlock: {0}")]
    Deadlock(DeadlockCycle),

    /// Every live thread is blocked on something nobody will signal.
    #[error("stalled: {}", format_blocked(.0))]
    Stalled(Vec<(ThreadId, WaitTarget)>),

    #[error("step limit of {steps} reached")]
    StepLimit { steps: u64 },

    #[error("{thread}: replay window {start}+{len} exceeds capacity {capacity}")]
    ReplayOutOfRange {
        thread: ThreadId,
        start: u32,
        len: u32,
        capacity: u32,
    },

    /// A `MOP` trigger asked for counts the sequencer cannot run.
    #[error("{thread}: MOP {source}")]
    MopCountOutOfRange {
        thread: ThreadId,
        #[source]
        source: MopCountError,
    },

    #[error("{thread}: {source}")]
    Decode {
        thread: ThreadId,
        #[source]
        source: DecodeError,
    },

    #[error("{arch} has no {thread} thread")]
    NoSuchThread { thread: ThreadId, arch: Arch },
}

fn format_blocked(blocked: &[(ThreadId, WaitTarget)]) -> String {
    blocked
        .iter()
        .map(|(t, w)| format!("{} waits for {}", t, w))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub steps: u64,
    pub stats: StatsSummary,
    /// Dest hazards recorded along the way
    pub hazards: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.stats)?;
        if self.hazards > 0 {
            write!(f, "{} Dest hazards", self.hazards)?;
        }
        Ok(())
    }
}
