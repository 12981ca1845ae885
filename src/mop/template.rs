//! Double-nested loop template.
//!
//! The sequencer runs, for each outer iteration:
//!
//! ```text
//! start_op                       (skipped when NOP)
//! repeat inner:
//!     loop_op0
//!     loop_op1                   (skipped when NOP)
//! end_op0, end_op1               (each skipped when NOP)
//! ```
//!
//! On the last inner iteration the final body instruction is replaced by
//! `last_inner`, or by `last_outer` on the last inner iteration of the last
//! outer iteration. Kernels use the two overrides to clear or advance
//! counters at face and tile boundaries without unrolling the loop.

use super::MopConfig;
use crate::arch::tensix_spec::MOP_MAX_LOOP_COUNT;
use crate::isa::Instr;

/// Loop template descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MopTemplate {
    outer: u32,
    inner: u32,
    loop_op0: Instr,
    loop_op1: Instr,
    start_op: Instr,
    end_op0: Instr,
    end_op1: Instr,
    last_inner: Instr,
    last_outer: Instr,
}

impl MopTemplate {
    /// Single-instruction body.
    pub fn new(outer: u32, inner: u32, loop_op: Instr) -> Self {
        debug_assert!(
            (1..=MOP_MAX_LOOP_COUNT).contains(&outer),
            "MOP outer loop count {} outside 1..={}",
            outer,
            MOP_MAX_LOOP_COUNT
        );
        debug_assert!(
            (1..=MOP_MAX_LOOP_COUNT).contains(&inner),
            "MOP inner loop count {} outside 1..={}",
            inner,
            MOP_MAX_LOOP_COUNT
        );
        Self {
            outer,
            inner,
            loop_op0: loop_op,
            loop_op1: Instr::NOP,
            start_op: Instr::NOP,
            end_op0: Instr::NOP,
            end_op1: Instr::NOP,
            last_inner: loop_op,
            last_outer: loop_op,
        }
    }

    /// Two-instruction body. Overrides default to `loop_op1`.
    pub fn with_two_ops(outer: u32, inner: u32, loop_op0: Instr, loop_op1: Instr) -> Self {
        Self::new(outer, inner, loop_op0).with_loop_op1(loop_op1)
    }

    /// Add a second body instruction. Overrides still at their default
    /// follow it, since they replace the final body instruction.
    pub fn with_loop_op1(mut self, op: Instr) -> Self {
        let tail = self.tail_op();
        if self.last_inner == tail {
            self.last_inner = op;
        }
        if self.last_outer == tail {
            self.last_outer = op;
        }
        self.loop_op1 = op;
        self
    }

    /// Instruction issued before each outer iteration.
    pub fn with_start_op(mut self, op: Instr) -> Self {
        self.start_op = op;
        self
    }

    /// Instruction issued after each outer iteration.
    pub fn with_end_op(mut self, op: Instr) -> Self {
        self.end_op0 = op;
        self
    }

    pub fn with_end_ops(mut self, op0: Instr, op1: Instr) -> Self {
        self.end_op0 = op0;
        self.end_op1 = op1;
        self
    }

    /// Replacement for the final body instruction of each inner loop.
    pub fn with_last_inner_loop_instr(mut self, op: Instr) -> Self {
        self.last_inner = op;
        self
    }

    /// Replacement for the final body instruction of the whole program.
    pub fn with_last_outer_loop_instr(mut self, op: Instr) -> Self {
        self.last_outer = op;
        self
    }

    pub fn outer(&self) -> u32 {
        self.outer
    }

    pub fn inner(&self) -> u32 {
        self.inner
    }

    pub fn loop_ops(&self) -> (Instr, Instr) {
        (self.loop_op0, self.loop_op1)
    }

    pub fn start_op(&self) -> Instr {
        self.start_op
    }

    pub fn end_ops(&self) -> (Instr, Instr) {
        (self.end_op0, self.end_op1)
    }

    pub fn last_ops(&self) -> (Instr, Instr) {
        (self.last_inner, self.last_outer)
    }

    fn tail_op(&self) -> Instr {
        if self.loop_op1.is_nop() {
            self.loop_op0
        } else {
            self.loop_op1
        }
    }

    fn body_width(&self) -> u32 {
        if self.loop_op1.is_nop() {
            1
        } else {
            2
        }
    }

    /// Body instructions issued by one run.
    pub fn body_len(&self) -> u32 {
        self.outer * self.inner * self.body_width()
    }

    /// Edge instructions (start and end ops) issued by one run.
    pub fn edge_len(&self) -> u32 {
        let per_outer = [self.start_op, self.end_op0, self.end_op1]
            .iter()
            .filter(|op| !op.is_nop())
            .count() as u32;
        self.outer * per_outer
    }

    /// Total instructions issued by one run.
    pub fn issued_len(&self) -> u32 {
        self.body_len() + self.edge_len()
    }

    /// The exact instruction stream one run issues.
    pub fn expand(&self) -> Vec<Instr> {
        let mut out = Vec::with_capacity(self.issued_len() as usize);
        let two_ops = !self.loop_op1.is_nop();

        for o in 0..self.outer {
            let last_outer = o + 1 == self.outer;
            if !self.start_op.is_nop() {
                out.push(self.start_op);
            }
            for i in 0..self.inner {
                let tail = if i + 1 == self.inner {
                    if last_outer {
                        self.last_outer
                    } else {
                        self.last_inner
                    }
                } else {
                    self.tail_op()
                };
                if two_ops {
                    out.push(self.loop_op0);
                }
                out.push(tail);
            }
            for end in [self.end_op0, self.end_op1] {
                if !end.is_nop() {
                    out.push(end);
                }
            }
        }
        out
    }

    /// Sequencer register image.
    pub fn config(&self) -> MopConfig {
        MopConfig::new([
            self.outer,
            self.inner,
            self.start_op.word(),
            self.end_op0.word(),
            self.end_op1.word(),
            self.loop_op0.word(),
            self.loop_op1.word(),
            self.last_inner.word(),
            self.last_outer.word(),
        ])
    }

    /// Interpret a register image as a loop template.
    pub fn from_config(config: &MopConfig) -> Self {
        let w = config.words();
        Self {
            outer: w[0],
            inner: w[1],
            start_op: Instr::from_word(w[2]),
            end_op0: Instr::from_word(w[3]),
            end_op1: Instr::from_word(w[4]),
            loop_op0: Instr::from_word(w[5]),
            loop_op1: Instr::from_word(w[6]),
            last_inner: Instr::from_word(w[7]),
            last_outer: Instr::from_word(w[8]),
        }
    }
}
