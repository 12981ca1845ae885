//! Owned sequencer slot.
//!
//! Each thread has exactly one set of MOP configuration registers.
//! [`SequencerSlot`] is the host-side owner of that set: programming
//! replaces whatever was there and hands the previous program back, and
//! the run instructions are only emitted through it.
//!
//! ```text
//! Unprogrammed --program--> Programmed --run--> Running
//!                               ^                  |
//!                               +---drain/program--+
//! ```

use super::{MopConfig, MopProgram};
use crate::isa::params::p_mop;
use crate::isa::{ops, HostWait, InstructionSink};
use std::fmt;

/// Host-side view of the sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SequencerState {
    #[default]
    Unprogrammed,
    Programmed,
    /// A run was issued and has not been waited on.
    Running,
}

impl fmt::Display for SequencerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SequencerState::Unprogrammed => "unprogrammed",
            SequencerState::Programmed => "programmed",
            SequencerState::Running => "running",
        };
        f.write_str(s)
    }
}

/// One thread's resident MOP slot.
#[derive(Debug, Clone, Default)]
pub struct SequencerSlot {
    state: SequencerState,
    program: Option<MopProgram>,
    programs: u64,
    runs: u64,
}

impl SequencerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    /// The resident program, if any.
    pub fn current(&self) -> Option<&MopProgram> {
        self.program.as_ref()
    }

    /// Register image of the resident program.
    pub fn config(&self) -> Option<MopConfig> {
        self.program.as_ref().map(MopProgram::config)
    }

    /// Commit `program`, returning the one it replaces.
    ///
    /// Waits for the expander to go idle before writing, so a previous run
    /// is never overwritten mid-flight.
    pub fn program(
        &mut self,
        program: impl Into<MopProgram>,
        sink: &mut impl InstructionSink,
    ) -> Option<MopProgram> {
        let program = program.into();
        let config = program.config();
        sink.host_wait(HostWait::MopIdle);
        sink.write_mop_config(&config);
        log::debug!("MOP slot programmed: {:?}", config);

        self.programs += 1;
        self.state = SequencerState::Programmed;
        self.program.replace(program)
    }

    /// Run the resident loop template.
    pub fn run(&mut self, sink: &mut impl InstructionSink) {
        debug_assert!(
            matches!(self.program, Some(MopProgram::Loop(_))),
            "run() needs a loop template, slot is {}",
            self.state
        );
        sink.issue(ops::mop(p_mop::LOOP_TEMPLATE, 0, 0));
        self.runs += 1;
        self.state = SequencerState::Running;
    }

    /// Run the resident unpack template for `count` iterations.
    pub fn run_unpack(&mut self, count: u32, zmask: u32, sink: &mut impl InstructionSink) {
        debug_assert!(
            matches!(self.program, Some(MopProgram::Unpack(_))),
            "run_unpack() needs an unpack template, slot is {}",
            self.state
        );
        debug_assert!(count >= 1, "unpack MOP needs at least one iteration");
        sink.issue(ops::mop_cfg(zmask >> 16));
        sink.issue(ops::mop(
            p_mop::UNPACK_TEMPLATE,
            count.saturating_sub(1),
            zmask & 0xffff,
        ));
        self.runs += 1;
        self.state = SequencerState::Running;
    }

    /// Wait for the last run to finish.
    pub fn drain(&mut self, sink: &mut impl InstructionSink) {
        if self.state == SequencerState::Running {
            sink.host_wait(HostWait::MopIdle);
            self.state = SequencerState::Programmed;
        }
    }

    /// (programs, runs) issued through this slot.
    pub fn counts(&self) -> (u64, u64) {
        (self.programs, self.runs)
    }
}
