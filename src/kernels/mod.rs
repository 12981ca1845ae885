//! Reference kernels built on the core infrastructure.
//!
//! Each kernel commits its address modes and loads its MOP or replay
//! block once in `init`, then emits a handful of words per tile. The
//! `run_*_tiles` helpers wrap a batch of tiles in one Dest acquire and
//! release.
//!
//! # Usage
//!
//! ```ignore
//! use tensix_llk::kernels::{run_eltwise_tiles, run_pack_tiles, EltwiseBinary, EltwiseBinaryType, PackTile, TensorShape};
//!
//! let add = EltwiseBinary::new(EltwiseBinaryType::Add, TensorShape::TILE_32X32);
//! add.init(&mut math);
//! run_eltwise_tiles(&mut math, &mut math_dest, &add, 1);
//!
//! let pack = PackTile::new(TensorShape::TILE_32X32);
//! pack.init(&mut packer);
//! run_pack_tiles(&mut packer, &mut pack_dest, &pack, 1);
//! ```

pub mod eltwise_binary;
pub mod pack;
pub mod reduce;
pub mod tensor_shape;

pub use eltwise_binary::{
    run_eltwise_tiles, BroadcastType, EltwiseBinary, EltwiseBinaryType, MathFidelity,
};
pub use pack::{run_pack_tiles, PackTile};
pub use reduce::{run_reduce_tiles, ReduceMax};
pub use tensor_shape::{ShapeError, TensorShape};
