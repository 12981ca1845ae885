//! Zmask-driven unpack template.
//!
//! A single loop of `count` iterations. Bit `i` of the 32-bit zmask picks
//! the path for iteration `i`:
//!
//! | zmask bit | issued                                         |
//! |-----------|------------------------------------------------|
//! | 0         | A0 (A0..A3 with halo), then B if unpacking B   |
//! | 1         | skip_a, then skip_b if unpacking B             |
//!
//! The low half of the zmask travels in the MOP instruction itself, the
//! high half in a preceding MOP_CFG.

use super::MopConfig;
use crate::arch::tensix_spec::MOP_MAX_UNPACK_COUNT;
use crate::isa::Instr;

const FLAG_UNPACK_B: u32 = 1 << 0;
const FLAG_HALO: u32 = 1 << 1;

/// Unpack template descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnpackMopTemplate {
    unpack_b: bool,
    halo: bool,
    a: [Instr; 4],
    b: Instr,
    skip_a: Instr,
    skip_b: Instr,
}

impl UnpackMopTemplate {
    /// Template issuing `a0` per iteration and `skip_a` on masked ones.
    pub fn new(a0: Instr, skip_a: Instr) -> Self {
        Self {
            unpack_b: false,
            halo: false,
            a: [a0, Instr::NOP, Instr::NOP, Instr::NOP],
            b: Instr::NOP,
            skip_a,
            skip_b: Instr::NOP,
        }
    }

    /// Full constructor in register order.
    #[allow(clippy::too_many_arguments)]
    pub fn with_all(
        unpack_b: bool,
        halo: bool,
        a0: Instr,
        a1: Instr,
        a2: Instr,
        a3: Instr,
        skip_a: Instr,
        b: Instr,
        skip_b: Instr,
    ) -> Self {
        Self {
            unpack_b,
            halo,
            a: [a0, a1, a2, a3],
            b,
            skip_a,
            skip_b,
        }
    }

    /// Also unpack operand B each iteration.
    pub fn with_b(mut self, b: Instr, skip_b: Instr) -> Self {
        self.unpack_b = true;
        self.b = b;
        self.skip_b = skip_b;
        self
    }

    /// Issue four A instructions per unmasked iteration.
    pub fn with_halo(mut self, a1: Instr, a2: Instr, a3: Instr) -> Self {
        self.halo = true;
        self.a[1] = a1;
        self.a[2] = a2;
        self.a[3] = a3;
        self
    }

    pub fn unpacks_b(&self) -> bool {
        self.unpack_b
    }

    pub fn is_halo(&self) -> bool {
        self.halo
    }

    /// Instructions issued for `count` iterations under `zmask`.
    pub fn expand(&self, count: u32, zmask: u32) -> Vec<Instr> {
        debug_assert!(
            (1..=MOP_MAX_UNPACK_COUNT).contains(&count),
            "unpack MOP count {} outside 1..={}",
            count,
            MOP_MAX_UNPACK_COUNT
        );
        let mut out = Vec::new();
        for i in 0..count.min(MOP_MAX_UNPACK_COUNT) {
            if zmask & (1 << i) == 0 {
                let a_count = if self.halo { 4 } else { 1 };
                out.extend_from_slice(&self.a[..a_count]);
                if self.unpack_b {
                    out.push(self.b);
                }
            } else {
                out.push(self.skip_a);
                if self.unpack_b {
                    out.push(self.skip_b);
                }
            }
        }
        out
    }

    /// Sequencer register image.
    pub fn config(&self) -> MopConfig {
        let mut flags = 0;
        if self.unpack_b {
            flags |= FLAG_UNPACK_B;
        }
        if self.halo {
            flags |= FLAG_HALO;
        }
        MopConfig::new([
            0,
            flags,
            self.b.word(),
            self.a[0].word(),
            self.a[1].word(),
            self.a[2].word(),
            self.a[3].word(),
            self.skip_a.word(),
            self.skip_b.word(),
        ])
    }

    /// Interpret a register image as an unpack template.
    pub fn from_config(config: &MopConfig) -> Self {
        let w = config.words();
        Self {
            unpack_b: w[1] & FLAG_UNPACK_B != 0,
            halo: w[1] & FLAG_HALO != 0,
            b: Instr::from_word(w[2]),
            a: [
                Instr::from_word(w[3]),
                Instr::from_word(w[4]),
                Instr::from_word(w[5]),
                Instr::from_word(w[6]),
            ],
            skip_a: Instr::from_word(w[7]),
            skip_b: Instr::from_word(w[8]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::ops;

    fn a() -> Instr {
        ops::replay(0, 4, false, false)
    }

    fn skip() -> Instr {
        ops::incrwc(0, 0, 0, 1)
    }

    #[test]
    fn test_unmasked_iterations() {
        let t = UnpackMopTemplate::new(a(), skip());
        assert_eq!(t.expand(3, 0), vec![a(), a(), a()]);
    }

    #[test]
    fn test_zmask_selects_skip_path() {
        let skip_b = ops::incrwc(0, 0, 1, 0);
        let t = UnpackMopTemplate::new(a(), skip()).with_b(ops::sempost(1), skip_b);
        let stream = t.expand(4, 0b0101);
        assert_eq!(
            stream,
            vec![skip(), skip_b, a(), ops::sempost(1), skip(), skip_b, a(), ops::sempost(1)]
        );
    }

    #[test]
    fn test_halo_issues_four_a_instructions() {
        let (a1, a2, a3) = (ops::nop(), ops::sempost(1), ops::semget(1));
        let t = UnpackMopTemplate::new(a(), skip()).with_halo(a1, a2, a3);
        assert_eq!(t.expand(1, 0), vec![a(), a1, a2, a3]);
        assert_eq!(t.expand(1, 1), vec![skip()]);
    }

    #[test]
    fn test_high_zmask_bits() {
        let t = UnpackMopTemplate::new(a(), skip());
        let stream = t.expand(32, 1 << 31);
        assert_eq!(stream.len(), 32);
        assert_eq!(stream[31], skip());
        assert!(stream[..31].iter().all(|&i| i == a()));
    }

    #[test]
    fn test_config_round_trip() {
        let t = UnpackMopTemplate::with_all(
            true,
            true,
            a(),
            ops::nop(),
            ops::sempost(1),
            ops::semget(1),
            skip(),
            ops::incrwc(0, 0, 4, 0),
            ops::incrwc(0, 0, 4, 0),
        );
        let config = t.config();
        assert_eq!(config.words()[1], 0b11);
        assert_eq!(UnpackMopTemplate::from_config(&config), t);
    }
}
