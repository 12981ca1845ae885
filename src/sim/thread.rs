//! Per-thread simulator state.
//!
//! Instructions flow through three stages, as on hardware:
//!
//! ```text
//! program --> MOP expander --> replay unit --> execute
//! ```
//!
//! The MOP expander turns a `MOP` trigger into its loop body; the replay
//! unit captures instructions while a `REPLAY` load is open and plays
//! windows back. Played-back instructions skip both stages.

use super::deadlock::WaitTarget;
use super::regs::Rwc;
use super::stats::ThreadStats;
use crate::arch::tensix_spec::REPLAY_MAX_CAPACITY;
use crate::isa::{Decoded, Instr, ThreadOp, ThreadProgram};
use crate::mop::{MopConfig, MopCountError, MopProgram};
use crate::thread::ThreadId;
use std::collections::VecDeque;

/// Number of thread config registers.
pub const CFG_REGS: usize = 256;

/// Where a fetched op came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Program,
    Mop,
    Replay,
}

/// An open replay load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capture {
    pub next: u32,
    pub remaining: u32,
    pub exec: bool,
}

/// One thread of the core.
#[derive(Debug, Clone)]
pub struct ThreadState {
    pub id: ThreadId,
    program: VecDeque<ThreadOp>,
    mop_queue: VecDeque<Instr>,
    replay_queue: VecDeque<Instr>,
    cfg: Vec<u16>,
    mop_cfg: MopConfig,
    zmask_hi: u32,
    replay_mem: Vec<Instr>,
    replay_capacity: u32,
    pub capture: Option<Capture>,
    pub rwc: Rwc,
    trace: Vec<Instr>,
    pub stats: ThreadStats,
    /// Set while the thread is blocked.
    pub waiting: Option<WaitTarget>,
    loaded: bool,
}

impl ThreadState {
    pub fn new(id: ThreadId, replay_capacity: u32) -> Self {
        Self {
            id,
            program: VecDeque::new(),
            mop_queue: VecDeque::new(),
            replay_queue: VecDeque::new(),
            cfg: vec![0; CFG_REGS],
            mop_cfg: MopConfig::default(),
            zmask_hi: 0,
            replay_mem: vec![Instr::NOP; REPLAY_MAX_CAPACITY as usize],
            replay_capacity,
            capture: None,
            rwc: Rwc::default(),
            trace: Vec::new(),
            stats: ThreadStats::default(),
            waiting: None,
            loaded: false,
        }
    }

    /// Append a program to this thread's stream.
    pub fn load(&mut self, program: ThreadProgram) {
        self.program.extend(program.ops().iter().cloned());
        self.loaded = true;
        self.stats.finished_at = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// True once every queue is drained.
    pub fn is_finished(&self) -> bool {
        self.program.is_empty() && self.mop_queue.is_empty() && self.replay_queue.is_empty()
    }

    /// Next op, highest-priority queue first.
    pub fn fetch(&mut self) -> Option<(Source, ThreadOp)> {
        if let Some(i) = self.replay_queue.pop_front() {
            return Some((Source::Replay, ThreadOp::Issue(i)));
        }
        if let Some(i) = self.mop_queue.pop_front() {
            return Some((Source::Mop, ThreadOp::Issue(i)));
        }
        self.program.pop_front().map(|op| (Source::Program, op))
    }

    /// Put a blocked op back where it came from.
    pub fn unfetch(&mut self, source: Source, op: ThreadOp) {
        match (source, op) {
            (Source::Replay, ThreadOp::Issue(i)) => self.replay_queue.push_front(i),
            (Source::Mop, ThreadOp::Issue(i)) => self.mop_queue.push_front(i),
            (_, op) => self.program.push_front(op),
        }
    }

    // ========================================================================
    // Config registers
    // ========================================================================

    pub fn cfg(&self, reg: u8) -> u16 {
        self.cfg[reg as usize]
    }

    pub fn set_cfg(&mut self, reg: u8, value: u16) {
        self.cfg[reg as usize] = value;
    }

    // ========================================================================
    // MOP expander
    // ========================================================================

    pub fn set_mop_config(&mut self, config: MopConfig) {
        self.mop_cfg = config;
    }

    pub fn mop_config(&self) -> &MopConfig {
        &self.mop_cfg
    }

    pub fn set_zmask_hi(&mut self, hi: u32) {
        self.zmask_hi = hi;
    }

    /// Expand a MOP trigger ahead of everything queued.
    pub fn expand_mop(
        &mut self,
        template: u32,
        count_minus_one: u32,
        zmask_lo16: u32,
    ) -> Result<(), MopCountError> {
        let program = MopProgram::from_config(template, &self.mop_cfg);
        let count = count_minus_one + 1;
        program.check_counts(count)?;
        let zmask = (self.zmask_hi << 16) | zmask_lo16;
        for instr in program.expand(count, zmask).into_iter().rev() {
            self.mop_queue.push_front(instr);
        }
        self.stats.mop_runs += 1;
        Ok(())
    }

    // ========================================================================
    // Replay unit
    // ========================================================================

    pub fn replay_capacity(&self) -> u32 {
        self.replay_capacity
    }

    /// Store one captured instruction; closes the load when full.
    pub fn capture(&mut self, instr: Instr) {
        if let Some(cap) = self.capture.as_mut() {
            self.replay_mem[cap.next as usize] = instr;
            cap.next += 1;
            cap.remaining -= 1;
            self.stats.recorded += 1;
            if cap.remaining == 0 {
                self.capture = None;
            }
        }
    }

    /// Queue `len` instructions from replay memory.
    pub fn play(&mut self, start: u32, len: u32) {
        let window = &self.replay_mem[start as usize..(start + len) as usize];
        for &instr in window.iter().rev() {
            self.replay_queue.push_front(instr);
        }
        self.stats.replays += 1;
    }

    pub fn replay_memory(&self) -> &[Instr] {
        &self.replay_mem[..self.replay_capacity as usize]
    }

    // ========================================================================
    // Trace and inspection
    // ========================================================================

    pub fn record_trace(&mut self, instr: Instr) {
        self.trace.push(instr);
    }

    pub fn trace(&self) -> &[Instr] {
        &self.trace
    }

    /// Everything this thread may still execute, with MOP and replay
    /// triggers expanded against the current configuration.
    pub fn pending(&self) -> Vec<Decoded> {
        let mut out = Vec::new();
        let issued = self
            .replay_queue
            .iter()
            .chain(self.mop_queue.iter())
            .copied()
            .chain(self.program.iter().filter_map(|op| match op {
                ThreadOp::Issue(i) => Some(*i),
                _ => None,
            }));
        for instr in issued {
            let Ok(decoded) = instr.decode() else {
                continue;
            };
            match decoded {
                Decoded::Mop { template, count_minus_one, zmask_lo16 } => {
                    let program = MopProgram::from_config(template, &self.mop_cfg);
                    let count = count_minus_one + 1;
                    if program.check_counts(count).is_err() {
                        continue;
                    }
                    let zmask = (self.zmask_hi << 16) | zmask_lo16;
                    out.extend(
                        program
                            .expand(count, zmask)
                            .into_iter()
                            .filter_map(|i| i.decode().ok()),
                    );
                }
                Decoded::Replay { start, len, load_mode: false, .. }
                    if start + len <= self.replay_capacity =>
                {
                    out.extend(
                        self.replay_mem[start as usize..(start + len) as usize]
                            .iter()
                            .filter_map(|i| i.decode().ok()),
                    );
                }
                other => out.push(other),
            }
        }
        out
    }
}
