use std::io::{Read, Write};

use crate::core::bus::CpuId;
use crate::core::error::{ScheduleError, StateError};
use crate::cpu::CpuCore;

/// Machine-agnostic interface for emulated systems.
///
/// Each board implements this, usually by delegating to its
/// [`crate::system::Emulator`], so the runner can drive any registered
/// machine without knowing its devices or driver state type.
pub trait Machine {
    /// Short name used on the command line.
    fn name(&self) -> &str;

    fn frames_per_second(&self) -> f64;

    /// Run one frame of emulation.
    fn run_frame(&mut self) -> Result<(), ScheduleError>;

    /// Reset the machine to its initial power-on state.
    fn reset(&mut self);

    fn current_frame(&self) -> u64;

    fn cpu_count(&self) -> usize;

    fn cpu(&self, cpu: CpuId) -> Option<&dyn CpuCore>;

    /// Cycles run by `cpu` since the last reset.
    fn total_cycles(&self, cpu: CpuId) -> u64;

    fn save_state(&self, writer: &mut dyn Write) -> Result<(), StateError>;

    fn load_state(&mut self, reader: &mut dyn Read) -> Result<(), StateError>;
}
