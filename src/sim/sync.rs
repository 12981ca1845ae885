//! Shared hand-off state: the semaphore bank and the dvalid chain.
//!
//! # Semaphore Model
//!
//! Eight 4-bit counters shared by all threads:
//! - `SEMINIT` sets value and max
//! - `SEMPOST` increments, saturating at 15 (max only matters to waiters)
//! - `SEMGET` decrements, saturating at 0
//! - `SEMWAIT` stalls while the value is zero or at max
//!
//! # Dvalid Model
//!
//! Every client keeps a pointer to the bank it works on next, and every
//! bank records which chain stage owns it. A client proceeds when the bank
//! under its pointer is at its stage; `CLEARDVALID` hands the bank to the
//! next stage and, in Half mode, moves the client to the other bank.

use crate::arch::tensix_spec::{NUM_SEMAPHORES, SEMAPHORE_MAX_VALUE};
use crate::dest::{DestClient, DvalidChain, DVALID_CTRL_HALF};

// ============================================================================
// Semaphores
// ============================================================================

/// Statistics for a single semaphore.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SemaphoreStats {
    /// `SEMPOST`s applied
    pub posts: u64,
    /// `SEMGET`s applied
    pub gets: u64,
    /// Waits that completed
    pub waits: u64,
    /// Steps threads spent blocked on this semaphore
    pub stall_steps: u64,
    /// Waits that blocked at least once
    pub contended_waits: u64,
    /// Longest single wait
    pub max_stall: u64,
    current_stall: u64,
}

impl SemaphoreStats {
    /// Record a blocked step.
    pub fn record_stall(&mut self) {
        self.current_stall += 1;
        self.stall_steps += 1;
    }

    /// Record a wait that passed.
    pub fn record_wait(&mut self) {
        self.waits += 1;
        if self.current_stall > 0 {
            self.contended_waits += 1;
            self.max_stall = self.max_stall.max(self.current_stall);
        }
        self.current_stall = 0;
    }

    pub fn current_stall(&self) -> u64 {
        self.current_stall
    }
}

/// One hardware semaphore.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Semaphore {
    pub value: u32,
    pub max: u32,
}

/// All semaphores of a core.
#[derive(Debug, Clone, Default)]
pub struct SemaphoreBank {
    sems: [Semaphore; NUM_SEMAPHORES],
    stats: [SemaphoreStats; NUM_SEMAPHORES],
}

impl SemaphoreBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, index: u8) -> Semaphore {
        self.sems[index as usize % NUM_SEMAPHORES]
    }

    pub fn stats(&self, index: u8) -> &SemaphoreStats {
        &self.stats[index as usize % NUM_SEMAPHORES]
    }

    pub fn stats_mut(&mut self, index: u8) -> &mut SemaphoreStats {
        &mut self.stats[index as usize % NUM_SEMAPHORES]
    }

    pub fn all_stats(&self) -> &[SemaphoreStats] {
        &self.stats
    }

    pub fn init(&mut self, index: u8, max: u32, value: u32) {
        self.sems[index as usize % NUM_SEMAPHORES] = Semaphore { value, max };
    }

    pub fn post(&mut self, index: u8) {
        let i = index as usize % NUM_SEMAPHORES;
        self.sems[i].value = (self.sems[i].value + 1).min(SEMAPHORE_MAX_VALUE);
        self.stats[i].posts += 1;
    }

    pub fn take(&mut self, index: u8) {
        let i = index as usize % NUM_SEMAPHORES;
        self.sems[i].value = self.sems[i].value.saturating_sub(1);
        self.stats[i].gets += 1;
    }
}

/// Semaphore indices selected by a `t6_sem` mask.
pub fn selected(mask: u32) -> impl Iterator<Item = u8> {
    (0..NUM_SEMAPHORES as u8).filter(move |i| mask & (1 << i) != 0)
}

// ============================================================================
// Dvalid chain
// ============================================================================

/// Core-wide dvalid state.
#[derive(Debug, Clone, Default)]
pub struct DvalidState {
    chain: Option<DvalidChain>,
    half: bool,
    pointer: [u8; 4],
    stage: [usize; 2],
}

impl DvalidState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chain(&self) -> Option<&DvalidChain> {
        self.chain.as_ref()
    }

    pub fn is_half(&self) -> bool {
        self.half
    }

    /// Apply one client's control word. Returns true if the chain changed.
    pub fn configure(&mut self, client: DestClient, word: u16) -> bool {
        let chain = DvalidChain::from_mask(u32::from(word) & 0xf);
        let half = word & DVALID_CTRL_HALF != 0;
        self.pointer[client.bit_index() as usize] = 0;

        let changed = self.chain.as_ref() != Some(&chain) || self.half != half;
        if changed {
            if self.chain.is_some() {
                log::warn!("dvalid chain reconfigured by {}: {}", client, chain);
            }
            self.chain = Some(chain);
            self.half = half;
            self.stage = [0; 2];
            self.pointer = [0; 4];
        }
        changed
    }

    /// Bank `client` works on next.
    pub fn bank_of(&self, client: DestClient) -> u8 {
        self.pointer[client.bit_index() as usize]
    }

    /// Client currently owning `bank`.
    pub fn owner(&self, bank: u8) -> Option<DestClient> {
        let chain = self.chain.as_ref()?;
        chain.clients().get(self.stage[bank as usize & 1]).copied()
    }

    /// True if `client` may touch the bank under its pointer.
    pub fn owns(&self, client: DestClient) -> bool {
        self.owner(self.bank_of(client)) == Some(client)
    }

    /// `client` is done with its bank.
    pub fn done(&mut self, client: DestClient) -> Option<u8> {
        let bank = self.bank_of(client);
        let len = self.chain.as_ref().map_or(0, DvalidChain::len);
        if len == 0 || !self.owns(client) {
            log::warn!("{} cleared dvalid on bank {} it does not own", client, bank);
            return None;
        }
        let stage = &mut self.stage[bank as usize];
        *stage = (*stage + 1) % len;
        if self.half {
            self.pointer[client.bit_index() as usize] = 1 - bank;
        }
        Some(bank)
    }

    /// Reset the pointers of the clients in `mask`; a full reset also
    /// returns every bank to the head of the chain.
    pub fn reset(&mut self, mask: u32) {
        for client in DestClient::ALL {
            if mask & client.dvalid_bit() != 0 {
                self.pointer[client.bit_index() as usize] = 0;
            }
        }
        let chain_mask = self.chain.as_ref().map_or(0, DvalidChain::mask);
        if chain_mask != 0 && mask & chain_mask == chain_mask {
            self.stage = [0; 2];
        }
    }
}
