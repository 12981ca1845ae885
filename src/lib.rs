//! tensix-llk library
//!
//! Kernel-side infrastructure for Tensix cores: the address-mode register
//! bank, the replay buffer, the MOP sequencer compiler and the Dest
//! lifecycle manager, plus a thread-level simulator to run what they emit.

pub mod addrmod;
pub mod arch;
pub mod config;
pub mod dest;
pub mod isa;
pub mod kernels;
pub mod mop;
pub mod replay;
pub mod sim;
pub mod thread;
