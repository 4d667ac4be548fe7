use thiserror::Error;

use crate::core::bus::CpuId;
use crate::cpu::CpuFamily;

/// Rejected machine description. Raised while a machine is being built or
/// when a handler or bank is installed at runtime.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{space}: range {start:#x}-{end:#x} is inverted")]
    InvertedRange {
        space: String,
        start: u32,
        end: u32,
    },

    #[error("{space}: range {start:#x}-{end:#x} exceeds the {bits}-bit address bus")]
    RangeBeyondBus {
        space: String,
        start: u32,
        end: u32,
        bits: u8,
    },

    #[error("unknown memory region {0}")]
    UnknownRegion(usize),

    #[error("{space}: range {start:#x}-{end:#x} needs {needed} bytes of region '{region}' (size {size})")]
    RegionTooSmall {
        space: String,
        start: u32,
        end: u32,
        region: String,
        needed: usize,
        size: usize,
    },

    #[error("unknown bank slot {0}")]
    UnknownBank(usize),

    #[error("{space}: bank window {start:#x}-{end:#x} is larger than the {bank_size}-byte bank")]
    BankWindowTooLarge {
        space: String,
        start: u32,
        end: u32,
        bank_size: usize,
    },

    #[error("bank slot {slot}: {count} banks of {bank_size} bytes at {base:#x} overrun region '{region}' (size {size})")]
    BankGeometry {
        slot: usize,
        region: String,
        base: usize,
        bank_size: usize,
        count: usize,
        size: usize,
    },

    #[error("no CPU core available for {0:?}")]
    UnsupportedFamily(CpuFamily),

    #[error("{cpu}: clock must be non-zero")]
    ZeroClock { cpu: CpuId },

    #[error("{cpu}: {clock_hz} Hz at {fps} frames/s leaves no cycles per frame")]
    NoCyclesPerFrame { cpu: CpuId, clock_hz: u64, fps: f64 },

    #[error("frames per second must be finite and positive, got {0}")]
    InvalidFrameRate(f64),

    #[error("slices per frame must be at least 1")]
    ZeroSlices,

    #[error("watchdog period must be at least 1 frame")]
    ZeroWatchdogPeriod,

    #[error("machine declares no CPUs")]
    NoCpus,

    #[error("unknown CPU {0}")]
    UnknownCpu(CpuId),

    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("config I/O: {0}")]
    Io(#[from] std::io::Error),
}

/// Rejected snapshot. A failed restore leaves the target unchanged.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("bad context magic")]
    BadMagic,

    #[error("context belongs to {found:?}, expected {expected:?}")]
    FamilyMismatch {
        expected: CpuFamily,
        found: CpuFamily,
    },

    #[error("unknown family tag {0:#04x}")]
    UnknownFamily(u8),

    #[error("context version {found}, expected {expected}")]
    VersionMismatch { expected: u8, found: u8 },

    #[error("context payload is {found} bytes, expected {expected}")]
    SizeMismatch { expected: usize, found: usize },

    #[error("field value {value:#x} out of range for {field}")]
    InvalidField { field: &'static str, value: u32 },

    #[error("snapshot has {found} CPUs, machine has {expected}")]
    CpuCount { expected: usize, found: usize },

    #[error("snapshot region '{name}' is {found} bytes, machine has {expected}")]
    RegionSize {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("snapshot region '{0}' does not exist in this machine")]
    UnknownRegion(String),

    #[error("snapshot has {found} bank slots, machine has {expected}")]
    BankCount { expected: usize, found: usize },

    #[error("not a machine snapshot (format '{0}')")]
    Format(String),

    #[error("snapshot I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot encoding: {0}")]
    Json(#[from] serde_json::Error),
}

/// Scheduling failure inside a frame.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("{cpu} consumed no cycles from a budget of {requested}")]
    Stalled { cpu: CpuId, requested: u32 },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
