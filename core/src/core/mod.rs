pub mod bus;
pub mod config;
pub mod error;
pub mod machine;

pub use bus::{Bus, CpuId, InputLine, LineEvent, LineState};
pub use config::{ConfigFile, MachineConfig, SpaceConfig};
pub use error::{ConfigError, Error, Result, ScheduleError, StateError};
pub use machine::Machine;
