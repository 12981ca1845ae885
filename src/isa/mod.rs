//! Tensix instruction encoding.
//!
//! A small DSL over fixed-width fields: [`encoding`] defines words and
//! field layouts, [`ops`] builds each instruction, [`decode`] reverses the
//! process. Kernels emit through an [`InstructionSink`].
//!
//! # Usage
//!
//! ```ignore
//! use tensix_llk::isa::{ops, params::p_stall, InstructionSink, ThreadProgram};
//!
//! let mut prog = ThreadProgram::new();
//! prog.issue(ops::stallwait(p_stall::STALL_CFG, p_stall::MATH));
//! ```

pub mod decode;
pub mod encoding;
pub mod ops;
pub mod params;
pub mod sink;
pub mod stream;

pub use decode::{DecodeError, Decoded, FpuArgs, FpuOp};
pub use encoding::{Field, Instr, InstrBuilder, Opcode};
pub use sink::{CountingSink, HostWait, InstructionSink, ThreadOp, ThreadProgram};
pub use stream::{decode_stream, encode_stream};
