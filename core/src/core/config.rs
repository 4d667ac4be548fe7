//! Machine and address-space tuning, loadable from TOML.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::ConfigError;

/// Frame timing and scheduler knobs shared by every CPU of a machine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Video frames per emulated second.
    pub frames_per_second: f64,
    /// Number of round-robin passes over the CPU list per frame. Higher
    /// values tighten cross-CPU latency at the cost of more context switches.
    pub slices_per_frame: u32,
    /// Frames without a watchdog kick before the machine resets. `None` uses
    /// two seconds worth of frames.
    pub watchdog_frames: Option<u32>,
    /// Arm the watchdog at reset. Boards that never kick it leave this off.
    pub watchdog_enabled: bool,
    /// Keep the per-frame list of executed slices for inspection.
    pub record_slices: bool,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            frames_per_second: 60.0,
            slices_per_frame: 1,
            watchdog_frames: None,
            watchdog_enabled: false,
            record_slices: true,
        }
    }
}

impl MachineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.frames_per_second.is_finite() || self.frames_per_second <= 0.0 {
            return Err(ConfigError::InvalidFrameRate(self.frames_per_second));
        }
        if self.slices_per_frame == 0 {
            return Err(ConfigError::ZeroSlices);
        }
        if self.watchdog_frames == Some(0) {
            return Err(ConfigError::ZeroWatchdogPeriod);
        }
        Ok(())
    }

    /// Watchdog period in frames.
    pub fn watchdog_period(&self) -> u32 {
        self.watchdog_frames
            .unwrap_or_else(|| (self.frames_per_second * 2.0).round().max(1.0) as u32)
    }
}

/// Behaviour of an address space for accesses no range claims.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpaceConfig {
    /// Value returned by unmapped reads.
    pub open_bus: u8,
    /// Emit a debug event for every unmapped access.
    pub log_unmapped: bool,
}

impl Default for SpaceConfig {
    fn default() -> Self {
        Self {
            open_bus: 0xFF,
            log_unmapped: false,
        }
    }
}

/// Both halves of a machine config file:
///
/// ```toml
/// frames_per_second = 60.0
/// slices_per_frame = 4
///
/// [space]
/// open_bus = 0x00
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    #[serde(flatten)]
    pub machine: MachineConfig,
    pub space: SpaceConfig,
}

impl ConfigFile {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let file: Self = toml::from_str(text)?;
        file.machine.validate()?;
        Ok(file)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}
