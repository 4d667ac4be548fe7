pub mod core;
pub mod cpu;
pub mod device;
pub mod memory;
pub mod system;

pub mod prelude {
    pub use crate::core::machine::Machine;
    pub use crate::core::{Bus, CpuId, InputLine, LineState, MachineConfig, SpaceConfig};
    pub use crate::cpu::{CpuCore, CpuFamily, I8085};
    pub use crate::memory::{Access, BankSlot, RegionId};
    pub use crate::system::{Board, CpuDescriptor, Emulator, EmulatorBuilder, SpaceKind};
}
