//! Tile geometry as a grid of faces.

use crate::arch::tensix_spec::{FACE_C_DIM, FACE_R_DIM, MAX_FPU_ROWS};
use crate::dest::TileDims;
use thiserror::Error;

/// Invalid tile geometry.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ShapeError {
    #[error("face_r_dim must be 1, 2, 4, 8 or 16, got {0}")]
    FaceRows(u8),

    #[error("face_c_dim must be 16, got {0}")]
    FaceCols(u8),

    #[error("a tile holds 1, 2 or 4 faces, got {0}")]
    FaceCount(u8),
}

/// A tile: `num_faces_r_dim x num_faces_c_dim` faces of
/// `face_r_dim x face_c_dim` elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TensorShape {
    pub face_r_dim: u8,
    pub face_c_dim: u8,
    pub num_faces_r_dim: u8,
    pub num_faces_c_dim: u8,
}

impl Default for TensorShape {
    fn default() -> Self {
        Self::TILE_32X32
    }
}

impl TensorShape {
    pub const TILE_32X32: Self = Self::new(16, 2, 2);
    pub const TILE_32X16: Self = Self::new(16, 2, 1);
    pub const TILE_16X16: Self = Self::new(16, 1, 1);

    pub const fn new(face_r_dim: u8, num_faces_r_dim: u8, num_faces_c_dim: u8) -> Self {
        Self {
            face_r_dim,
            face_c_dim: FACE_C_DIM as u8,
            num_faces_r_dim,
            num_faces_c_dim,
        }
    }

    /// Checked constructor.
    pub fn try_new(face_r_dim: u8, num_faces_r_dim: u8, num_faces_c_dim: u8) -> Result<Self, ShapeError> {
        let shape = Self::new(face_r_dim, num_faces_r_dim, num_faces_c_dim);
        shape.validate()?;
        Ok(shape)
    }

    /// Shapes whose kernels depend on face positions must pass this.
    pub fn validate(&self) -> Result<(), ShapeError> {
        if !matches!(self.face_r_dim, 1 | 2 | 4 | 8 | 16) {
            return Err(ShapeError::FaceRows(self.face_r_dim));
        }
        if u32::from(self.face_c_dim) != FACE_C_DIM {
            return Err(ShapeError::FaceCols(self.face_c_dim));
        }
        let faces = self.total_faces();
        if !matches!(faces, 1 | 2 | 4) {
            return Err(ShapeError::FaceCount(faces));
        }
        Ok(())
    }

    pub const fn total_faces(&self) -> u8 {
        self.num_faces_r_dim.saturating_mul(self.num_faces_c_dim)
    }

    pub const fn total_rows(&self) -> u16 {
        self.face_r_dim as u16 * self.num_faces_r_dim as u16
    }

    pub const fn total_cols(&self) -> u16 {
        self.face_c_dim as u16 * self.num_faces_c_dim as u16
    }

    /// Faces shorter than the FPU's eight rows.
    pub const fn is_partial_face(&self) -> bool {
        (self.face_r_dim as u32) < MAX_FPU_ROWS
    }

    /// FPU instructions needed to cover one face.
    pub const fn fpu_ops_per_face(&self) -> u32 {
        let ops = self.face_r_dim as u32 / MAX_FPU_ROWS;
        if ops == 0 {
            1
        } else {
            ops
        }
    }

    /// Dest footprint: every face occupies a full 16-row slot.
    pub const fn tile_dims(&self) -> TileDims {
        match self.total_faces() {
            4 => TileDims::Tile32x32,
            2 => TileDims::Tile32x16,
            _ => TileDims::Tile16x16,
        }
    }

    /// Dest rows one tile occupies.
    pub const fn dest_rows(&self) -> u32 {
        self.total_faces() as u32 * FACE_R_DIM
    }
}
