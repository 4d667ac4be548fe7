use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::core::bus::{Bus, InputLine, LineState};
use crate::core::error::{ConfigError, StateError};

// Re-export state types
pub mod state;
pub use state::{ContextReader, ContextWriter, CpuStateTrait, I8085State};

// Intel 8085 (and 8080 compatibility mode)
pub mod i8085;
pub use i8085::I8085;

/// Register id understood by every core: the PC of the last instruction fetched.
pub const REG_PREVIOUS_PC: i32 = -1;

/// Callback used to obtain the vector during an interrupt acknowledge. When
/// installed it takes precedence over the vector the bus supplies.
pub type IrqCallback = Box<dyn FnMut(InputLine) -> u32>;

/// Processor families a machine may declare.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CpuFamily {
    I8080,
    I8085,
    Z80,
    M6502,
    M6809,
    M68000,
    I8039,
}

impl CpuFamily {
    /// Stable tag written into context blobs.
    pub fn tag(self) -> u8 {
        match self {
            CpuFamily::I8080 => 0x01,
            CpuFamily::I8085 => 0x02,
            CpuFamily::Z80 => 0x03,
            CpuFamily::M6502 => 0x04,
            CpuFamily::M6809 => 0x05,
            CpuFamily::M68000 => 0x06,
            CpuFamily::I8039 => 0x07,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0x01 => CpuFamily::I8080,
            0x02 => CpuFamily::I8085,
            0x03 => CpuFamily::Z80,
            0x04 => CpuFamily::M6502,
            0x05 => CpuFamily::M6809,
            0x06 => CpuFamily::M68000,
            0x07 => CpuFamily::I8039,
            _ => return None,
        })
    }

    /// Width of the program address bus.
    pub fn program_bits(self) -> u8 {
        match self {
            CpuFamily::M68000 => 24,
            CpuFamily::I8039 => 12,
            _ => 16,
        }
    }

    /// Width of the I/O port bus (0 when I/O is memory-mapped).
    pub fn io_bits(self) -> u8 {
        match self {
            CpuFamily::I8080 | CpuFamily::I8085 | CpuFamily::I8039 => 8,
            CpuFamily::Z80 => 16,
            _ => 0,
        }
    }

    /// Build the core that emulates this family.
    pub fn create_core(self) -> Result<Box<dyn CpuCore>, ConfigError> {
        match self {
            CpuFamily::I8085 => Ok(Box::new(I8085::new())),
            CpuFamily::I8080 => Ok(Box::new(I8085::new_8080())),
            other => Err(ConfigError::UnsupportedFamily(other)),
        }
    }
}

/// Descriptive text a core reports about itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InfoField {
    Name,
    Family,
    Version,
    Credits,
    /// Flag register rendered one character per bit.
    Flags,
    /// One register rendered as `NAME:VALUE`.
    Register(i32),
}

/// Contract between the scheduler and a processor emulation.
///
/// A core owns its registers and nothing else. All memory, I/O and interrupt
/// traffic flows through the [`Bus`] handed to [`CpuCore::execute`], so one
/// core type can be instantiated any number of times in a machine.
pub trait CpuCore {
    fn family(&self) -> CpuFamily;

    /// Power-on reset: registers to documented reset values, halt and
    /// pending interrupt state cleared.
    fn reset(&mut self);

    /// Run whole instructions until at least `cycles` have elapsed and return
    /// the number consumed, which may overshoot by part of one instruction.
    /// Returns early only when the bus requests a yield, and never returns 0
    /// for a non-zero budget.
    fn execute(&mut self, bus: &mut dyn Bus, cycles: u32) -> u32;

    /// Serialize all architectural state into a self-describing blob.
    fn context(&self) -> Vec<u8>;

    /// Restore from a blob made by [`CpuCore::context`]. Either every field is
    /// restored or, on error, the core is left untouched.
    fn set_context(&mut self, blob: &[u8]) -> Result<(), StateError>;

    fn pc(&self) -> u32;
    fn set_pc(&mut self, pc: u32);
    fn sp(&self) -> u32;
    fn set_sp(&mut self, sp: u32);

    /// Read a register by family-specific id or [`REG_PREVIOUS_PC`].
    fn reg(&self, id: i32) -> u32;
    fn set_reg(&mut self, id: i32, value: u32);

    fn set_nmi_line(&mut self, state: LineState);
    fn set_irq_line(&mut self, line: u8, state: LineState);
    fn set_irq_callback(&mut self, callback: Option<IrqCallback>);

    /// True while the core idles waiting for an interrupt (HLT, WAI, ...).
    fn is_halted(&self) -> bool;

    fn info(&self, field: InfoField) -> String;

    /// Disassemble the instruction at `pc` into `out` and return its length.
    /// Reads go through [`Bus::peek`] and never disturb devices.
    fn dasm(&self, bus: &mut dyn Bus, pc: u32, out: &mut String) -> u32;

    fn state_save(&self, writer: &mut dyn Write) -> Result<(), StateError> {
        writer.write_all(&self.context())?;
        Ok(())
    }

    fn state_load(&mut self, reader: &mut dyn Read) -> Result<(), StateError> {
        let blob = state::read_context(reader)?;
        self.set_context(&blob)
    }
}
