//! Instruction sinks.
//!
//! Everything in the kernel core emits through [`InstructionSink`] instead
//! of writing to a hardware FIFO directly. Firmware builds drain a
//! [`ThreadProgram`] into the thread's instruction buffer; tests hand the
//! same program to the simulator or count it with [`CountingSink`].

use super::encoding::{Instr, Opcode};
use crate::mop::MopConfig;
use std::fmt;

/// Host-side waits performed by the thread's RISC-V controller rather than
/// by a Tensix instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostWait {
    /// Poll until the semaphore reads zero.
    SemaphoreZero { sem: u8 },
    /// Poll until the thread's MOP expander is idle.
    MopIdle,
}

impl fmt::Display for HostWait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostWait::SemaphoreZero { sem } => write!(f, "wait sem{} == 0", sem),
            HostWait::MopIdle => write!(f, "wait mop idle"),
        }
    }
}

/// One step of a thread's program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadOp {
    /// Push an instruction into the Tensix instruction buffer.
    Issue(Instr),
    /// Store the nine MOP configuration words.
    WriteMopConfig(MopConfig),
    /// Block the controller.
    HostWait(HostWait),
}

/// Destination for emitted instructions.
pub trait InstructionSink {
    /// Issue one Tensix instruction.
    fn issue(&mut self, instr: Instr);

    /// Write the MOP configuration registers.
    fn write_mop_config(&mut self, config: &MopConfig);

    /// Block the controller until `wait` is satisfied.
    fn host_wait(&mut self, wait: HostWait);

    /// Issue several instructions in order.
    fn issue_all(&mut self, instrs: &[Instr]) {
        for &instr in instrs {
            self.issue(instr);
        }
    }
}

impl<S: InstructionSink + ?Sized> InstructionSink for &mut S {
    fn issue(&mut self, instr: Instr) {
        (**self).issue(instr)
    }

    fn write_mop_config(&mut self, config: &MopConfig) {
        (**self).write_mop_config(config)
    }

    fn host_wait(&mut self, wait: HostWait) {
        (**self).host_wait(wait)
    }
}

/// A recorded per-thread program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadProgram {
    ops: Vec<ThreadOp>,
}

impl ThreadProgram {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded steps.
    pub fn ops(&self) -> &[ThreadOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Just the issued instructions, in order.
    pub fn instructions(&self) -> impl Iterator<Item = Instr> + '_ {
        self.ops.iter().filter_map(|op| match op {
            ThreadOp::Issue(instr) => Some(*instr),
            _ => None,
        })
    }

    /// Number of issued instructions with the given opcode.
    pub fn count_opcode(&self, opcode: Opcode) -> usize {
        self.instructions()
            .filter(|i| i.opcode() == Some(opcode))
            .count()
    }

    /// Append another program.
    pub fn extend(&mut self, other: ThreadProgram) {
        self.ops.extend(other.ops);
    }

    /// Take the recorded steps, leaving the program empty.
    pub fn take(&mut self) -> ThreadProgram {
        ThreadProgram {
            ops: std::mem::take(&mut self.ops),
        }
    }
}

impl InstructionSink for ThreadProgram {
    fn issue(&mut self, instr: Instr) {
        self.ops.push(ThreadOp::Issue(instr));
    }

    fn write_mop_config(&mut self, config: &MopConfig) {
        self.ops.push(ThreadOp::WriteMopConfig(*config));
    }

    fn host_wait(&mut self, wait: HostWait) {
        self.ops.push(ThreadOp::HostWait(wait));
    }
}

impl From<Vec<ThreadOp>> for ThreadProgram {
    fn from(ops: Vec<ThreadOp>) -> Self {
        Self { ops }
    }
}

/// Sink that only counts what it receives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CountingSink {
    pub instructions: usize,
    pub mop_configs: usize,
    pub host_waits: usize,
}

impl InstructionSink for CountingSink {
    fn issue(&mut self, _instr: Instr) {
        self.instructions += 1;
    }

    fn write_mop_config(&mut self, _config: &MopConfig) {
        self.mop_configs += 1;
    }

    fn host_wait(&mut self, _wait: HostWait) {
        self.host_waits += 1;
    }
}
