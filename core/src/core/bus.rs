use serde::{Deserialize, Serialize};

/// Identifies a CPU within a machine (index in declaration order).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CpuId(pub usize);

impl std::fmt::Display for CpuId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cpu{}", self.0)
    }
}

/// Requested state of an interrupt input.
///
/// `Hold` behaves like `Assert` until the CPU acknowledges the line, at which
/// point the router releases it. `Pulse` asserts and releases within the same
/// instruction boundary, which only latches on edge-sensitive inputs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LineState {
    #[default]
    Clear,
    Assert,
    Hold,
    Pulse,
}

impl LineState {
    #[inline]
    pub fn is_active(self) -> bool {
        !matches!(self, LineState::Clear)
    }
}

/// An interrupt input of a CPU.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputLine {
    Nmi,
    Irq(u8),
}

/// A line transition waiting for the target CPU's next instruction boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineEvent {
    pub line: InputLine,
    pub state: LineState,
}

/// Everything a CPU core sees of the machine while it executes.
///
/// Addresses are widened to `u32` so one trait serves every family; each core
/// masks to its own bus width. Memory and I/O accesses may run device
/// handlers and so take `&mut self`.
pub trait Bus {
    fn read(&mut self, addr: u32) -> u8;
    fn write(&mut self, addr: u32, data: u8);

    /// Read from the I/O port space.
    /// Default maps to memory read; override for CPUs with separate I/O.
    fn io_read(&mut self, port: u32) -> u8 {
        self.read(port)
    }

    /// Write to the I/O port space.
    /// Default maps to memory write; override for CPUs with separate I/O.
    fn io_write(&mut self, port: u32, data: u8) {
        self.write(port, data)
    }

    /// Side-effect free read for disassemblers and debuggers.
    fn peek(&mut self, addr: u32) -> u8 {
        self.read(addr)
    }

    /// Called by the core before every opcode fetch and interrupt check.
    fn instruction_boundary(&mut self) {}

    /// Next queued line transition for the executing CPU, oldest first.
    fn next_line_event(&mut self) -> Option<LineEvent> {
        None
    }

    /// Interrupt acknowledge cycle for `line`. Returns the vector supplied by
    /// the interrupting device, if any.
    fn acknowledge(&mut self, _line: InputLine) -> Option<u32> {
        None
    }

    /// True when the executing CPU must end its slice at the next boundary.
    fn yield_requested(&self) -> bool {
        false
    }
}
