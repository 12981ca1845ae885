//! Tensix chip generations.
//!
//! - [`Arch`]: which generation a kernel is built for
//! - [`ArchSpec`]: the generation's sizes and config register map
//! - [`tensix_spec`]: shared geometry constants

pub mod arch_config;
pub mod tensix_spec;

pub use arch_config::{ArchSpec, BlackholeConfig, QuasarConfig, WormholeB0Config};

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Primitive used to hand Dest banks between threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakeKind {
    /// Counting semaphore shared by math and pack.
    Semaphore,
    /// Ordered per-client data-valid chain.
    DataValid,
}

/// Tensix chip generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Arch {
    #[default]
    WormholeB0,
    Blackhole,
    Quasar,
}

impl Arch {
    /// All supported generations.
    pub const ALL: [Arch; 3] = [Arch::WormholeB0, Arch::Blackhole, Arch::Quasar];

    /// The generation's specification.
    pub fn spec(self) -> &'static dyn ArchSpec {
        match self {
            Arch::WormholeB0 => &WormholeB0Config,
            Arch::Blackhole => &BlackholeConfig,
            Arch::Quasar => &QuasarConfig,
        }
    }

    /// Short identifier used in config files.
    pub const fn as_str(self) -> &'static str {
        match self {
            Arch::WormholeB0 => "wormhole_b0",
            Arch::Blackhole => "blackhole",
            Arch::Quasar => "quasar",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.spec().name())
    }
}

/// Error returned when an architecture name is not recognised.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown architecture '{0}' (expected wormhole_b0, blackhole or quasar)")]
pub struct UnknownArch(pub String);

impl FromStr for Arch {
    type Err = UnknownArch;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wormhole_b0" | "wormhole" | "wh" => Ok(Arch::WormholeB0),
            "blackhole" | "bh" => Ok(Arch::Blackhole),
            "quasar" | "qsr" => Ok(Arch::Quasar),
            _ => Err(UnknownArch(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_arch_names() {
        assert_eq!("wormhole_b0".parse::<Arch>(), Ok(Arch::WormholeB0));
        assert_eq!("BH".parse::<Arch>(), Ok(Arch::Blackhole));
        assert_eq!(" quasar ".parse::<Arch>(), Ok(Arch::Quasar));
        assert!("grayskull".parse::<Arch>().is_err());
    }

    #[test]
    fn test_as_str_round_trips() {
        for arch in Arch::ALL {
            assert_eq!(arch.as_str().parse::<Arch>(), Ok(arch));
        }
    }

    #[test]
    fn test_display_uses_spec_name() {
        assert_eq!(Arch::Quasar.to_string(), "Quasar");
        assert_eq!(Arch::WormholeB0.to_string(), "Wormhole B0");
    }
}
