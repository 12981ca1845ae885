//! MOP program compiler.
//!
//! A MOP (micro-operation) program is a nested-loop instruction schedule
//! held in each thread's sequencer registers. One `MOP` instruction makes
//! the hardware expand the whole schedule without further fetches.
//!
//! - [`MopTemplate`]: the outer x inner loop with start/end ops and
//!   last-iteration overrides
//! - [`UnpackMopTemplate`]: the zmask-driven unpack loop
//! - [`MopProgram`]: either of the two, as committed to a slot
//! - [`SequencerSlot`]: the owned per-thread slot
//!
//! # Usage
//!
//! ```ignore
//! use tensix_llk::mop::{MopTemplate, SequencerSlot};
//!
//! let tmpl = MopTemplate::new(4, 2, body).with_end_op(clear_src);
//! slot.program(tmpl, &mut sink);
//! slot.run(&mut sink);
//! ```

pub mod sequencer;
pub mod template;
pub mod unpack_template;

pub use sequencer::{SequencerSlot, SequencerState};
pub use template::MopTemplate;
pub use unpack_template::UnpackMopTemplate;

use crate::arch::tensix_spec::{MOP_CFG_WORDS, MOP_MAX_LOOP_COUNT, MOP_MAX_UNPACK_COUNT};
use crate::isa::Instr;
use thiserror::Error;

/// The nine sequencer configuration words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MopConfig([u32; MOP_CFG_WORDS]);

impl MopConfig {
    #[inline]
    pub const fn new(words: [u32; MOP_CFG_WORDS]) -> Self {
        Self(words)
    }

    #[inline]
    pub const fn words(&self) -> &[u32; MOP_CFG_WORDS] {
        &self.0
    }
}

/// A loop count the sequencer cannot run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{counter} count {count} outside 1..={max}")]
pub struct MopCountError {
    pub counter: &'static str,
    pub count: u32,
    pub max: u32,
}

fn check_count(counter: &'static str, count: u32, max: u32) -> Result<(), MopCountError> {
    if (1..=max).contains(&count) {
        Ok(())
    } else {
        Err(MopCountError { counter, count, max })
    }
}

/// A program as committed to the sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MopProgram {
    Loop(MopTemplate),
    Unpack(UnpackMopTemplate),
}

impl MopProgram {
    /// Template selector used by the run instruction.
    pub const fn template_id(&self) -> u32 {
        match self {
            MopProgram::Unpack(_) => crate::isa::params::p_mop::UNPACK_TEMPLATE,
            MopProgram::Loop(_) => crate::isa::params::p_mop::LOOP_TEMPLATE,
        }
    }

    pub fn config(&self) -> MopConfig {
        match self {
            MopProgram::Loop(t) => t.config(),
            MopProgram::Unpack(t) => t.config(),
        }
    }

    /// Decode a register image the way the `template` selector would.
    pub fn from_config(template: u32, config: &MopConfig) -> Self {
        if template == crate::isa::params::p_mop::LOOP_TEMPLATE {
            MopProgram::Loop(MopTemplate::from_config(config))
        } else {
            MopProgram::Unpack(UnpackMopTemplate::from_config(config))
        }
    }

    /// Check the counts one run with `count` iterations would use.
    ///
    /// Register images written outside [`SequencerSlot`] can hold any
    /// counts, and the unpack count comes from the run instruction.
    pub fn check_counts(&self, count: u32) -> Result<(), MopCountError> {
        match self {
            MopProgram::Loop(t) => {
                check_count("outer", t.outer(), MOP_MAX_LOOP_COUNT)?;
                check_count("inner", t.inner(), MOP_MAX_LOOP_COUNT)
            }
            MopProgram::Unpack(_) => check_count("unpack", count, MOP_MAX_UNPACK_COUNT),
        }
    }

    /// Instructions issued by one run. `count` and `zmask` only apply to
    /// the unpack template.
    pub fn expand(&self, count: u32, zmask: u32) -> Vec<Instr> {
        match self {
            MopProgram::Loop(t) => t.expand(),
            MopProgram::Unpack(t) => t.expand(count, zmask),
        }
    }
}

impl From<MopTemplate> for MopProgram {
    fn from(t: MopTemplate) -> Self {
        MopProgram::Loop(t)
    }
}

impl From<UnpackMopTemplate> for MopProgram {
    fn from(t: UnpackMopTemplate) -> Self {
        MopProgram::Unpack(t)
    }
}
