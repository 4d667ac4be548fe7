//! Multi-CPU machine: board, interrupt routing, frame scheduling and save
//! states.

pub mod board;
pub mod emulator;
pub mod interrupt;
pub mod save;
pub mod scheduler;

pub use board::{Board, CpuControl, DeferredAction, Watchdog};
pub use emulator::{CpuDescriptor, Emulator, EmulatorBuilder, FrameHook, ResetHook, SpaceKind};
pub use interrupt::{DEFAULT_VECTOR, InterruptRouter, MAX_IRQ_LINES};
pub use save::{CpuSnapshot, MachineSnapshot, RegionSnapshot};
pub use scheduler::{
    InterruptGenerator, InterruptRequest, ScheduleSlice, ignore_interrupt, interrupt, nmi_interrupt,
};
