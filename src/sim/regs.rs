//! Register files and read/write counters.
//!
//! Src registers stand in for the unpacker: each holds a queue of faces.
//! Releasing a Src bank (`SETRWC` with `CLR_A`/`CLR_B`) retires the rows
//! the FPU walked through since the last release, at least one face.

use crate::addrmod::{AddrMod, AddrModPack};
use crate::arch::tensix_spec::{DEST_COLUMNS, FACE_R_DIM, SRC_ROWS};
use crate::isa::params::p_setrwc;

/// One Dest/Src row.
pub type Row = [f32; DEST_COLUMNS];

/// A 16x16 face as produced by one PACR.
pub type Face = [Row; FACE_R_DIM as usize];

// ============================================================================
// Counters
// ============================================================================

/// Address counter with its carriage-return shadow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counter {
    pub value: u32,
    pub cr: u32,
}

impl Counter {
    /// Apply one address-mode update.
    pub fn apply(&mut self, incr: u32, clr: bool, cr: bool, c_to_cr: bool) {
        if clr {
            self.value = 0;
            self.cr = 0;
        } else if cr {
            self.cr = self.cr.wrapping_add(incr);
            self.value = self.cr;
        } else if c_to_cr {
            self.value = self.value.wrapping_add(incr);
            self.cr = self.value;
        } else {
            self.value = self.value.wrapping_add(incr);
        }
    }

    pub fn set(&mut self, value: u32) {
        self.value = value;
        self.cr = value;
    }
}

/// Every counter one thread moves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rwc {
    pub srca: Counter,
    pub srcb: Counter,
    pub dest: Counter,
    pub fidelity: Counter,
    pub bias: Counter,
    pub pack_ysrc: Counter,
    pub pack_ydst: Counter,
    pub pack_zsrc: Counter,
    pub pack_zdst: Counter,
}

impl Rwc {
    /// Post-instruction update for FPU instructions.
    pub fn apply_math(&mut self, am: &AddrMod) {
        self.srca.apply(am.srca.incr as u32, am.srca.clr, am.srca.cr, false);
        self.srcb.apply(am.srcb.incr as u32, am.srcb.clr, am.srcb.cr, false);
        self.dest
            .apply(am.dest.incr as u32, am.dest.clr, am.dest.cr, am.dest.c_to_cr);
        self.fidelity
            .apply(am.fidelity.incr as u32, am.fidelity.clr, false, false);
        self.bias.apply(am.bias.incr as u32, am.bias.clr, false, false);
    }

    /// Post-instruction update for PACR.
    pub fn apply_pack(&mut self, am: &AddrModPack) {
        self.pack_ysrc
            .apply(am.y_src.incr as u32, am.y_src.clr, am.y_src.cr, false);
        self.pack_ydst
            .apply(am.y_dst.incr as u32, am.y_dst.clr, am.y_dst.cr, false);
        self.pack_zsrc.apply(am.z_src.incr as u32, am.z_src.clr, false, false);
        self.pack_zdst.apply(am.z_dst.incr as u32, am.z_dst.clr, false, false);
    }

    /// `SETRWC` counter writes. Src release is handled by the caller.
    pub fn set(&mut self, d: u32, b: u32, a: u32, mask: u32) {
        if mask & p_setrwc::SET_A != 0 {
            self.srca.set(a);
        }
        if mask & p_setrwc::SET_B != 0 {
            self.srcb.set(b);
        }
        if mask & p_setrwc::SET_D != 0 {
            self.dest.set(d);
        }
        if mask & p_setrwc::SET_F != 0 {
            self.fidelity.set(0);
        }
    }

    /// `INCRWC`: carriage-return counters add to their shadow.
    pub fn incr(&mut self, cr: u32, d: u32, b: u32, a: u32) {
        self.srca.apply(a, false, cr & p_setrwc::CR_A != 0, false);
        self.srcb.apply(b, false, cr & p_setrwc::CR_B != 0, false);
        self.dest.apply(d, false, cr & p_setrwc::CR_D != 0, false);
    }
}

// ============================================================================
// Register files
// ============================================================================

/// Dest register file.
#[derive(Debug, Clone)]
pub struct DestFile {
    rows: Vec<Row>,
}

impl DestFile {
    pub fn new(rows: u32) -> Self {
        Self {
            rows: vec![[0.0; DEST_COLUMNS]; rows as usize],
        }
    }

    pub fn len(&self) -> u32 {
        self.rows.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row `index`, wrapping at the end of the file.
    pub fn row(&self, index: u32) -> &Row {
        &self.rows[(index % self.len()) as usize]
    }

    pub fn row_mut(&mut self, index: u32) -> &mut Row {
        let n = self.len();
        &mut self.rows[(index % n) as usize]
    }

    /// Zero `count` rows starting at `start`.
    pub fn clear(&mut self, start: u32, count: u32) {
        for r in start..start + count {
            *self.row_mut(r) = [0.0; DEST_COLUMNS];
        }
    }

    /// Copy one face out.
    pub fn face(&self, start: u32) -> Face {
        let mut face = [[0.0; DEST_COLUMNS]; FACE_R_DIM as usize];
        for (i, row) in face.iter_mut().enumerate() {
            *row = *self.row(start + i as u32);
        }
        face
    }
}

/// SrcA or SrcB: a queue of faces fed by the unpacker.
#[derive(Debug, Clone)]
pub struct SrcFile {
    rows: Vec<Row>,
    base: u32,
}

impl Default for SrcFile {
    fn default() -> Self {
        Self {
            rows: vec![[0.0; DEST_COLUMNS]; SRC_ROWS],
            base: 0,
        }
    }
}

impl SrcFile {
    /// Replace the contents. Rows are padded to whole faces.
    pub fn load(&mut self, rows: &[Row]) {
        self.rows = rows.to_vec();
        let face = FACE_R_DIM as usize;
        let padded = rows.len().div_ceil(face).max(1) * face;
        self.rows.resize(padded, [0.0; DEST_COLUMNS]);
        self.base = 0;
    }

    /// Fill every row with `value`.
    pub fn fill(&mut self, value: f32) {
        for row in &mut self.rows {
            *row = [value; DEST_COLUMNS];
        }
        self.base = 0;
    }

    /// Row at `offset` past the current bank start.
    pub fn row(&self, offset: u32) -> &Row {
        let n = self.rows.len() as u32;
        &self.rows[((self.base + offset) % n) as usize]
    }

    /// Release the bank: retire the rows consumed so far.
    pub fn release(&mut self, consumed: u32) {
        let face = FACE_R_DIM;
        let faces = consumed.div_ceil(face).max(1);
        self.base = (self.base + faces * face) % self.rows.len() as u32;
    }

    pub fn base(&self) -> u32 {
        self.base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addrmod::{DestField, FidelityField, SrcField};

    #[test]
    fn test_counter_modes() {
        let mut c = Counter::default();
        c.apply(8, false, false, false);
        assert_eq!(c, Counter { value: 8, cr: 0 });
        c.apply(0, false, true, false);
        assert_eq!(c, Counter { value: 0, cr: 0 });
        c.apply(8, false, false, false);
        c.apply(8, false, false, true);
        assert_eq!(c, Counter { value: 16, cr: 16 });
        c.apply(4, false, true, false);
        assert_eq!(c, Counter { value: 20, cr: 20 });
        c.apply(5, true, false, false);
        assert_eq!(c, Counter::default());
    }

    #[test]
    fn test_apply_math_addr_mod() {
        let am = AddrMod::new()
            .srca(SrcField::incr(8))
            .srcb(SrcField::clear())
            .dest(DestField::incr(8).with_c_to_cr())
            .fidelity(FidelityField::incr(1));
        let mut rwc = Rwc::default();
        rwc.srcb.set(5);
        rwc.apply_math(&am);
        rwc.apply_math(&am);
        assert_eq!(rwc.srca.value, 16);
        assert_eq!(rwc.srcb.value, 0);
        assert_eq!(rwc.dest, Counter { value: 16, cr: 16 });
        assert_eq!(rwc.fidelity.value, 2);
    }

    #[test]
    fn test_setrwc_mask() {
        let mut rwc = Rwc::default();
        rwc.srca.set(3);
        rwc.dest.set(7);
        rwc.fidelity.set(2);
        rwc.set(0, 0, 0, p_setrwc::SET_A | p_setrwc::SET_F);
        assert_eq!(rwc.srca.value, 0);
        assert_eq!(rwc.dest.value, 7);
        assert_eq!(rwc.fidelity.value, 0);
    }

    #[test]
    fn test_src_release_retires_faces() {
        let mut src = SrcFile::default();
        let rows: Vec<Row> = (0..64).map(|i| [i as f32; 16]).collect();
        src.load(&rows);
        assert_eq!(src.row(3)[0], 3.0);
        src.release(16);
        assert_eq!(src.row(0)[0], 16.0);
        src.release(0);
        assert_eq!(src.base(), 32);
        src.release(40);
        assert_eq!(src.base(), 16);
    }

    #[test]
    fn test_dest_face_and_clear() {
        let mut dest = DestFile::new(1024);
        dest.row_mut(512)[0] = 1.5;
        assert_eq!(dest.face(512)[0][0], 1.5);
        dest.clear(512, 512);
        assert_eq!(dest.row(512)[0], 0.0);
    }
}
