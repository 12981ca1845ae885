//! Per-thread kernel context.
//!
//! A Tensix core runs one instruction stream per thread. [`ThreadContext`]
//! bundles everything a kernel needs to build one of those streams: the
//! program being emitted, the thread's MOP slot and its replay buffer.

use crate::arch::Arch;
use crate::dest::DestClient;
use crate::isa::{HostWait, Instr, InstructionSink, ThreadProgram};
use crate::mop::{MopConfig, MopProgram, SequencerSlot};
use crate::replay::{Recorder, ReplayBuffer, ReplayWindow};
use std::fmt;

/// Hardware thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ThreadId {
    Unpack,
    Math,
    Sfpu,
    Pack,
}

impl ThreadId {
    pub const ALL: [ThreadId; 4] = [ThreadId::Unpack, ThreadId::Math, ThreadId::Sfpu, ThreadId::Pack];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Dest client this thread acts as.
    pub const fn dest_client(self) -> DestClient {
        match self {
            ThreadId::Unpack => DestClient::Unpack,
            ThreadId::Math => DestClient::Math,
            ThreadId::Sfpu => DestClient::Sfpu,
            ThreadId::Pack => DestClient::Pack,
        }
    }

    /// True if `arch` has a dedicated instruction stream for this thread.
    pub fn exists_on(self, arch: Arch) -> bool {
        self != ThreadId::Sfpu || arch.spec().thread_count() > 3
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            ThreadId::Unpack => "unpack",
            ThreadId::Math => "math",
            ThreadId::Sfpu => "sfpu",
            ThreadId::Pack => "pack",
        }
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything one thread's kernel emits through.
#[derive(Debug, Clone)]
pub struct ThreadContext {
    pub id: ThreadId,
    pub arch: Arch,
    pub program: ThreadProgram,
    pub sequencer: SequencerSlot,
    pub replay: ReplayBuffer,
}

impl ThreadContext {
    pub fn new(id: ThreadId, arch: Arch) -> Self {
        debug_assert!(id.exists_on(arch), "{} has no {} thread", arch, id);
        Self {
            id,
            arch,
            program: ThreadProgram::new(),
            sequencer: SequencerSlot::new(),
            replay: ReplayBuffer::new(arch.spec()),
        }
    }

    /// Replace the resident MOP program.
    pub fn program_mop(&mut self, program: impl Into<MopProgram>) -> Option<MopProgram> {
        self.sequencer.program(program, &mut self.program)
    }

    /// Run the resident loop template.
    pub fn run_mop(&mut self) {
        self.sequencer.run(&mut self.program)
    }

    /// Run the resident unpack template `count` times.
    pub fn run_unpack_mop(&mut self, count: u32, zmask: u32) {
        self.sequencer.run_unpack(count, zmask, &mut self.program)
    }

    /// Record `body` into `window`.
    pub fn record<F>(&mut self, window: ReplayWindow, body: F)
    where
        F: FnOnce(&mut Recorder<'_, ThreadProgram>),
    {
        self.replay.record(window, &mut self.program, body)
    }

    /// Record `body` into `window`, executing it as it is loaded.
    pub fn record_and_execute<F>(&mut self, window: ReplayWindow, body: F)
    where
        F: FnOnce(&mut Recorder<'_, ThreadProgram>),
    {
        self.replay.record_and_execute(window, &mut self.program, body)
    }

    pub fn replay(&mut self, window: ReplayWindow) {
        self.replay.replay(window, &mut self.program)
    }

    /// Hand the emitted program over, leaving the context empty.
    pub fn finish(&mut self) -> ThreadProgram {
        self.sequencer.drain(&mut self.program);
        self.program.take()
    }
}

impl InstructionSink for ThreadContext {
    fn issue(&mut self, instr: Instr) {
        self.program.issue(instr)
    }

    fn write_mop_config(&mut self, config: &MopConfig) {
        self.program.write_mop_config(config)
    }

    fn host_wait(&mut self, wait: HostWait) {
        self.program.host_wait(wait)
    }
}
