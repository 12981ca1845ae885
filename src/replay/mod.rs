//! Replay buffer.
//!
//! Each thread owns a small instruction memory. `record` loads a window
//! once; `replay` plays it back with a single trigger, and a MOP body can
//! embed the trigger so the window runs inside a hardware loop.
//!
//! The buffer is split between the SFPU (entries below
//! [`REPLAY_FPU_OFFSET`]) and the FPU (the rest). Window bounds are
//! asserted in debug builds and at compile time for [`ReplayWindow::fixed`];
//! release builds emit exactly what they are given.
//!
//! # Usage
//!
//! ```ignore
//! use tensix_llk::replay::{ReplayBuffer, ReplayWindow};
//!
//! let window = ReplayWindow::fixed::<16, 4>();
//! replay.record(window, &mut sink, |s| {
//!     for _ in 0..4 {
//!         s.issue(ops::gmpool(0, 0, 0, 0));
//!     }
//! });
//! replay.replay(window, &mut sink);
//! ```

use crate::arch::tensix_spec::{REPLAY_FPU_OFFSET, REPLAY_MAX_CAPACITY};
use crate::arch::ArchSpec;
use crate::isa::{ops, HostWait, Instr, InstructionSink};
use crate::mop::MopConfig;
use smallvec::SmallVec;
use std::fmt;

/// A contiguous range of replay buffer entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReplayWindow {
    start: u32,
    len: u32,
}

impl ReplayWindow {
    #[inline]
    pub const fn new(start: u32, len: u32) -> Self {
        debug_assert!(len > 0, "replay window must not be empty");
        debug_assert!(start + len <= REPLAY_MAX_CAPACITY, "replay window past end of buffer");
        Self { start, len }
    }

    /// Window checked at compile time.
    #[inline]
    pub const fn fixed<const START: u32, const LEN: u32>() -> Self {
        const {
            assert!(LEN > 0, "replay window must not be empty");
            assert!(START + LEN <= REPLAY_MAX_CAPACITY, "replay window past end of buffer");
        };
        Self { start: START, len: LEN }
    }

    #[inline]
    pub const fn start(self) -> u32 {
        self.start
    }

    #[inline]
    pub const fn len(self) -> u32 {
        self.len
    }

    /// One past the last entry.
    #[inline]
    pub const fn end(self) -> u32 {
        self.start + self.len
    }

    #[inline]
    pub const fn overlaps(self, other: ReplayWindow) -> bool {
        self.start < other.end() && other.start < self.end()
    }

    /// Playback trigger, usable as a MOP body instruction.
    #[inline]
    pub const fn trigger(self) -> Instr {
        ops::replay(self.start, self.len, false, false)
    }
}

impl fmt::Display for ReplayWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "replay[{}..{}]", self.start, self.end())
    }
}

/// Which execution unit's half of the buffer a window lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayPartition {
    Sfpu,
    Fpu,
}

/// Host-side view of one thread's replay buffer.
#[derive(Debug, Clone)]
pub struct ReplayBuffer {
    capacity: u32,
    live: SmallVec<[ReplayWindow; 4]>,
    records: u64,
    replays: u64,
}

impl ReplayBuffer {
    pub fn new(arch: &dyn ArchSpec) -> Self {
        Self::with_capacity(arch.replay_capacity())
    }

    pub fn with_capacity(capacity: u32) -> Self {
        Self {
            capacity,
            live: SmallVec::new(),
            records: 0,
            replays: 0,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Entries available to one partition.
    pub fn partition_range(&self, partition: ReplayPartition) -> std::ops::Range<u32> {
        match partition {
            ReplayPartition::Sfpu => 0..REPLAY_FPU_OFFSET,
            ReplayPartition::Fpu => REPLAY_FPU_OFFSET..self.capacity,
        }
    }

    /// Window of `len` entries at `offset` within a partition.
    pub fn window_in(&self, partition: ReplayPartition, offset: u32, len: u32) -> ReplayWindow {
        let range = self.partition_range(partition);
        let window = ReplayWindow::new(range.start + offset, len);
        debug_assert!(window.end() <= range.end, "{} leaves its partition", window);
        window
    }

    /// Windows recorded so far.
    pub fn live_windows(&self) -> &[ReplayWindow] {
        &self.live
    }

    pub fn is_live(&self, window: ReplayWindow) -> bool {
        self.live.contains(&window)
    }

    /// Record `body` into `window` without executing it.
    pub fn record<S, F>(&mut self, window: ReplayWindow, sink: &mut S, body: F)
    where
        S: InstructionSink,
        F: FnOnce(&mut Recorder<'_, S>),
    {
        self.load(window, false, sink, body)
    }

    /// Record `body` into `window` and execute it while loading.
    pub fn record_and_execute<S, F>(&mut self, window: ReplayWindow, sink: &mut S, body: F)
    where
        S: InstructionSink,
        F: FnOnce(&mut Recorder<'_, S>),
    {
        self.load(window, true, sink, body)
    }

    fn load<S, F>(&mut self, window: ReplayWindow, exec: bool, sink: &mut S, body: F)
    where
        S: InstructionSink,
        F: FnOnce(&mut Recorder<'_, S>),
    {
        debug_assert!(
            window.end() <= self.capacity,
            "{} exceeds replay capacity {}",
            window,
            self.capacity
        );

        for &other in &self.live {
            if other != window && other.overlaps(window) {
                log::warn!("recording {} over live window {}", window, other);
            }
        }

        sink.issue(ops::replay(window.start, window.len, exec, true));
        let mut recorder = Recorder { sink, emitted: 0 };
        body(&mut recorder);
        debug_assert_eq!(
            recorder.emitted, window.len,
            "{} recorded {} instructions",
            window, recorder.emitted
        );

        self.live.retain(|w| !w.overlaps(window));
        self.live.push(window);
        self.records += 1;
        log::debug!("recorded {} (exec_while_loading={})", window, exec);
    }

    /// Play `window` back once.
    pub fn replay(&mut self, window: ReplayWindow, sink: &mut impl InstructionSink) {
        debug_assert!(self.is_live(window), "{} replayed before it was recorded", window);
        sink.issue(window.trigger());
        self.replays += 1;
    }

    /// Play `window` back `times` times.
    pub fn replay_n(&mut self, window: ReplayWindow, times: u32, sink: &mut impl InstructionSink) {
        for _ in 0..times {
            self.replay(window, sink);
        }
    }

    /// Forget every live window.
    pub fn reset(&mut self) {
        self.live.clear();
    }

    /// (records, replays) issued through this buffer.
    pub fn counts(&self) -> (u64, u64) {
        (self.records, self.replays)
    }
}

/// Sink handed to a recording body; counts what it emits.
pub struct Recorder<'a, S: InstructionSink> {
    sink: &'a mut S,
    emitted: u32,
}

impl<S: InstructionSink> Recorder<'_, S> {
    /// Instructions emitted so far.
    pub fn emitted(&self) -> u32 {
        self.emitted
    }
}

impl<S: InstructionSink> InstructionSink for Recorder<'_, S> {
    fn issue(&mut self, instr: Instr) {
        self.emitted += 1;
        self.sink.issue(instr);
    }

    fn write_mop_config(&mut self, config: &MopConfig) {
        debug_assert!(false, "MOP configuration cannot be recorded into a replay window");
        self.sink.write_mop_config(config);
    }

    fn host_wait(&mut self, wait: HostWait) {
        debug_assert!(false, "host waits cannot be recorded into a replay window");
        self.sink.host_wait(wait);
    }
}
