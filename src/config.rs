//! Configuration management for tensix-llk.
//!
//! Configuration is loaded from multiple sources in priority order:
//! 1. Environment variables (TENSIX_ARCH, TENSIX_MAX_STEPS, etc.)
//! 2. Project-local config file (`./tensix-llk.toml`)
//! 3. User config file (`~/.config/tensix-llk/config.toml`)
//! 4. Built-in defaults
//!
//! Only the simulator reads configuration. Kernel emission is fully
//! determined by its arguments.
//!
//! # Config File Format
//!
//! ```toml
//! # tensix-llk.toml
//!
//! # Generation to simulate: wormhole_b0, blackhole or quasar
//! arch = "quasar"
//!
//! # Abort a run after this many scheduler steps
//! max_steps = 1000000
//! ```

use crate::arch::Arch;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Global cached configuration.
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Default scheduler step budget.
pub const DEFAULT_MAX_STEPS: u64 = 1_000_000;

/// tensix-llk configuration as written in files.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Generation to simulate.
    pub arch: Option<String>,

    /// Scheduler steps before a run is abandoned.
    pub max_steps: Option<u64>,

    /// Build a wait-for graph when every thread is blocked.
    pub deadlock_detection: Option<bool>,

    /// Track Dest section ownership and report hand-off violations.
    pub hazard_checks: Option<bool>,

    /// Log every executed instruction at trace level.
    pub trace: Option<bool>,
}

/// Resolved simulator settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimConfig {
    pub arch: Arch,
    pub max_steps: u64,
    pub deadlock_detection: bool,
    pub hazard_checks: bool,
    pub trace: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            arch: Arch::default(),
            max_steps: DEFAULT_MAX_STEPS,
            deadlock_detection: true,
            hazard_checks: true,
            trace: false,
        }
    }
}

impl SimConfig {
    /// Defaults for `arch`.
    pub fn for_arch(arch: Arch) -> Self {
        Self {
            arch,
            ..Self::default()
        }
    }

    /// No bookkeeping beyond execution itself.
    pub fn fast(arch: Arch) -> Self {
        Self {
            arch,
            max_steps: DEFAULT_MAX_STEPS,
            deadlock_detection: false,
            hazard_checks: false,
            trace: false,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables
    /// 2. Project-local `tensix-llk.toml`
    /// 3. User config `~/.config/tensix-llk/config.toml`
    /// 4. Defaults
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(user_config) = Self::load_user_config() {
            config.merge(user_config);
        }

        if let Some(local_config) = Self::load_local_config() {
            config.merge(local_config);
        }

        config.apply_env_overrides();

        config
    }

    /// Get the cached global configuration.
    ///
    /// Loads configuration on first call and caches it.
    pub fn get() -> &'static Config {
        CONFIG.get_or_init(|| {
            let config = Self::load();
            log::debug!("Loaded configuration: {:?}", config);
            config
        })
    }

    /// Configured generation, falling back to Wormhole B0.
    pub fn arch(&self) -> Arch {
        match self.arch.as_deref() {
            None => Arch::default(),
            Some(name) => name.parse().unwrap_or_else(|e| {
                log::warn!("{}; using {}", e, Arch::default());
                Arch::default()
            }),
        }
    }

    /// Resolve into simulator settings.
    pub fn sim_config(&self) -> SimConfig {
        let defaults = SimConfig::default();
        SimConfig {
            arch: self.arch(),
            max_steps: self.max_steps.unwrap_or(defaults.max_steps),
            deadlock_detection: self.deadlock_detection.unwrap_or(defaults.deadlock_detection),
            hazard_checks: self.hazard_checks.unwrap_or(defaults.hazard_checks),
            trace: self.trace.unwrap_or(defaults.trace),
        }
    }

    /// Load user configuration from ~/.config/tensix-llk/config.toml
    fn load_user_config() -> Option<Self> {
        let config_path = Self::user_config_path()?;
        Self::load_from_file(&config_path)
    }

    /// Load project-local configuration from ./tensix-llk.toml
    fn load_local_config() -> Option<Self> {
        let local_path = Path::new("tensix-llk.toml");
        if let Some(config) = Self::load_from_file(local_path) {
            return Some(config);
        }

        if let Ok(manifest_dir) = std::env::var("CARGO_MANIFEST_DIR") {
            let project_path = Path::new(&manifest_dir).join("tensix-llk.toml");
            if let Some(config) = Self::load_from_file(&project_path) {
                return Some(config);
            }
        }

        None
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    log::info!("Loaded config from {}", path.display());
                    Some(config)
                }
                Err(e) => {
                    log::warn!("Failed to parse {}: {}", path.display(), e);
                    None
                }
            },
            Err(e) => {
                log::warn!("Failed to read {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Merge another config into this one.
    /// Only overrides fields that are Some in the other config.
    fn merge(&mut self, other: Self) {
        if other.arch.is_some() {
            self.arch = other.arch;
        }
        if other.max_steps.is_some() {
            self.max_steps = other.max_steps;
        }
        if other.deadlock_detection.is_some() {
            self.deadlock_detection = other.deadlock_detection;
        }
        if other.hazard_checks.is_some() {
            self.hazard_checks = other.hazard_checks;
        }
        if other.trace.is_some() {
            self.trace = other.trace;
        }
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(arch) = std::env::var("TENSIX_ARCH") {
            log::info!("Using TENSIX_ARCH from environment: {}", arch);
            self.arch = Some(arch);
        }
        if let Some(steps) = env_parse::<u64>("TENSIX_MAX_STEPS") {
            self.max_steps = Some(steps);
        }
        if let Some(flag) = env_flag("TENSIX_DEADLOCK_DETECTION") {
            self.deadlock_detection = Some(flag);
        }
        if let Some(flag) = env_flag("TENSIX_HAZARD_CHECKS") {
            self.hazard_checks = Some(flag);
        }
        if let Some(flag) = env_flag("TENSIX_TRACE") {
            self.trace = Some(flag);
        }
    }

    /// Get the path to the user config file (for display/creation).
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("tensix-llk").join("config.toml"))
    }

    /// Generate a sample config file content.
    pub fn sample_config() -> String {
        r#"# tensix-llk configuration
# Place this file at ~/.config/tensix-llk/config.toml or ./tensix-llk.toml

# Generation to simulate: wormhole_b0, blackhole or quasar
arch = "wormhole_b0"

# Abort a simulation after this many scheduler steps
# max_steps = 1000000

# Report wait-for cycles when every thread is blocked
# deadlock_detection = true

# Flag reads of unreleased Dest banks and overwrites of undrained ones
# hazard_checks = true

# Log every executed instruction (needs RUST_LOG=trace)
# trace = false
"#
        .to_string()
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(v) => {
            log::info!("Using {} from environment: {}", name, raw);
            Some(v)
        }
        Err(_) => {
            log::warn!("Ignoring {}={}: not a valid value", name, raw);
            None
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            log::warn!("Ignoring {}={}: expected a boolean", name, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let sim = Config::default().sim_config();
        assert_eq!(sim, SimConfig::default());
        assert_eq!(sim.arch, Arch::WormholeB0);
        assert_eq!(sim.max_steps, DEFAULT_MAX_STEPS);
        assert!(sim.deadlock_detection);
        assert!(sim.hazard_checks);
        assert!(!sim.trace);
    }

    #[test]
    fn test_config_merge() {
        let mut base = Config {
            arch: Some("blackhole".to_string()),
            max_steps: Some(10),
            hazard_checks: Some(false),
            ..Config::default()
        };

        let overlay = Config {
            arch: None,
            max_steps: Some(20),
            trace: Some(true),
            ..Config::default()
        };

        base.merge(overlay);

        assert_eq!(base.arch.as_deref(), Some("blackhole"));
        assert_eq!(base.max_steps, Some(20));
        assert_eq!(base.hazard_checks, Some(false));
        assert_eq!(base.trace, Some(true));
        assert_eq!(base.deadlock_detection, None);

        let sim = base.sim_config();
        assert_eq!(sim.arch, Arch::Blackhole);
        assert!(!sim.hazard_checks);
        assert!(sim.deadlock_detection);
    }

    #[test]
    fn test_unknown_arch_falls_back() {
        let config = Config {
            arch: Some("grayskull".to_string()),
            ..Config::default()
        };
        assert_eq!(config.arch(), Arch::WormholeB0);
    }

    #[test]
    fn test_sample_config_parses() {
        let sample = Config::sample_config();
        let config: Config = toml::from_str(&sample).expect("Sample config should parse");
        assert_eq!(config.arch(), Arch::WormholeB0);
    }

    #[test]
    fn test_parse_partial_file() {
        let config: Config = toml::from_str("arch = \"qsr\"\ntrace = true\n").unwrap();
        let sim = config.sim_config();
        assert_eq!(sim.arch, Arch::Quasar);
        assert!(sim.trace);
        assert_eq!(sim.max_steps, DEFAULT_MAX_STEPS);
    }

    #[test]
    fn test_fast_preset() {
        let fast = SimConfig::fast(Arch::Quasar);
        assert!(!fast.deadlock_detection);
        assert!(!fast.hazard_checks);
        assert_eq!(fast.arch, Arch::Quasar);
    }
}
