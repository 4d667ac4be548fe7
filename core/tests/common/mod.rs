#![allow(dead_code)]

use std::collections::VecDeque;

use marquee_core::core::{Bus, InputLine, LineEvent, LineState};

/// Minimal bus for testing: flat 64KB read/write memory, logged port I/O and
/// a queue of line events delivered at the next instruction boundary.
pub struct TestBus {
    pub memory: [u8; 0x10000],
    pub ports: [u8; 0x100],
    pub io_writes: Vec<(u8, u8)>,
    pub io_reads: Vec<u8>,
    pub events: VecDeque<LineEvent>,
    /// Vector supplied during an INTR acknowledge.
    pub ack_vector: Option<u32>,
    pub acks: Vec<InputLine>,
    pub boundaries: u32,
    pub yield_now: bool,
}

impl TestBus {
    pub fn new() -> Self {
        Self {
            memory: [0; 0x10000],
            ports: [0; 0x100],
            io_writes: Vec::new(),
            io_reads: Vec::new(),
            events: VecDeque::new(),
            ack_vector: None,
            acks: Vec::new(),
            boundaries: 0,
            yield_now: false,
        }
    }

    pub fn load(&mut self, addr: u16, data: &[u8]) {
        let start = addr as usize;
        self.memory[start..start + data.len()].copy_from_slice(data);
    }

    pub fn line(&mut self, line: InputLine, state: LineState) {
        self.events.push_back(LineEvent { line, state });
    }
}

impl Bus for TestBus {
    fn read(&mut self, addr: u32) -> u8 {
        self.memory[(addr & 0xFFFF) as usize]
    }

    fn write(&mut self, addr: u32, data: u8) {
        self.memory[(addr & 0xFFFF) as usize] = data;
    }

    fn io_read(&mut self, port: u32) -> u8 {
        self.io_reads.push(port as u8);
        self.ports[(port & 0xFF) as usize]
    }

    fn io_write(&mut self, port: u32, data: u8) {
        self.io_writes.push((port as u8, data));
    }

    fn instruction_boundary(&mut self) {
        self.boundaries += 1;
    }

    fn next_line_event(&mut self) -> Option<LineEvent> {
        self.events.pop_front()
    }

    fn acknowledge(&mut self, line: InputLine) -> Option<u32> {
        self.acks.push(line);
        match line {
            InputLine::Nmi => None,
            InputLine::Irq(_) => self.ack_vector,
        }
    }

    fn yield_requested(&self) -> bool {
        self.yield_now
    }
}

// =============================================================================
// Machine-level helpers
// =============================================================================

use std::cell::RefCell;
use std::rc::Rc;

use marquee_core::cpu::{ContextReader, ContextWriter, CpuCore, CpuFamily, InfoField, IrqCallback};
use marquee_core::memory::RegionId;
use marquee_core::system::{CpuDescriptor, EmulatorBuilder};

pub const ROM_SIZE: usize = 0x2000;
pub const RAM_BASE: u32 = 0x2000;
pub const RAM_SIZE: usize = 0x400;

/// Build a ROM image from `(address, bytes)` pieces; the rest is NOP.
pub fn rom_image(pieces: &[(u16, &[u8])]) -> Vec<u8> {
    let mut rom = vec![0u8; ROM_SIZE];
    for &(addr, bytes) in pieces {
        let start = addr as usize;
        rom[start..start + bytes.len()].copy_from_slice(bytes);
    }
    rom
}

/// An 8085 with `rom` at 0x0000-0x1FFF and 1KB of RAM at 0x2000.
pub fn i8085_cpu<S>(
    builder: &mut EmulatorBuilder<S>,
    name: &str,
    rom: Vec<u8>,
    clock_hz: u64,
) -> (CpuDescriptor<S>, RegionId, RegionId) {
    let rom = builder.rom(&format!("{name}_rom"), rom);
    let ram = builder.ram(&format!("{name}_ram"), RAM_SIZE);
    let mut desc = CpuDescriptor::new(CpuFamily::I8085, clock_hz);
    desc.program
        .rom(0x0000, ROM_SIZE as u32 - 1, rom, 0)
        .unwrap()
        .ram(RAM_BASE, RAM_BASE + RAM_SIZE as u32 - 1, ram, 0)
        .unwrap();
    (desc, rom, ram)
}

/// Scripted core: each "instruction" costs the next entry of `costs`.
/// `pc` counts executed instructions.
pub struct MockCore {
    pub family: CpuFamily,
    pub costs: Vec<u32>,
    pub stall: bool,
    pub executed: u32,
    pub lines: Rc<RefCell<Vec<LineEvent>>>,
}

impl MockCore {
    pub fn new(costs: Vec<u32>) -> Self {
        Self {
            family: CpuFamily::Z80,
            costs,
            stall: false,
            executed: 0,
            lines: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn stalled() -> Self {
        let mut core = Self::new(vec![4]);
        core.stall = true;
        core
    }
}

impl CpuCore for MockCore {
    fn family(&self) -> CpuFamily {
        self.family
    }

    fn reset(&mut self) {
        self.executed = 0;
    }

    fn execute(&mut self, bus: &mut dyn Bus, cycles: u32) -> u32 {
        if self.stall {
            return 0;
        }
        let mut consumed = 0;
        while consumed < cycles {
            bus.instruction_boundary();
            while let Some(event) = bus.next_line_event() {
                self.lines.borrow_mut().push(event);
            }
            consumed += self.costs[self.executed as usize % self.costs.len()];
            self.executed += 1;
            if bus.yield_requested() {
                break;
            }
        }
        consumed
    }

    fn context(&self) -> Vec<u8> {
        let mut w = ContextWriter::new(self.family, 1);
        w.u32(self.executed);
        w.finish()
    }

    fn set_context(&mut self, blob: &[u8]) -> Result<(), marquee_core::core::StateError> {
        let mut r = ContextReader::open(blob, self.family, 1, 4)?;
        let executed = r.u32()?;
        r.finish()?;
        self.executed = executed;
        Ok(())
    }

    fn pc(&self) -> u32 {
        self.executed
    }

    fn set_pc(&mut self, pc: u32) {
        self.executed = pc;
    }

    fn sp(&self) -> u32 {
        0
    }

    fn set_sp(&mut self, _sp: u32) {}

    fn reg(&self, _id: i32) -> u32 {
        0
    }

    fn set_reg(&mut self, _id: i32, _value: u32) {}

    fn set_nmi_line(&mut self, _state: LineState) {}

    fn set_irq_line(&mut self, _line: u8, _state: LineState) {}

    fn set_irq_callback(&mut self, _callback: Option<IrqCallback>) {}

    fn is_halted(&self) -> bool {
        false
    }

    fn info(&self, _field: InfoField) -> String {
        "mock".to_string()
    }

    fn dasm(&self, _bus: &mut dyn Bus, _pc: u32, out: &mut String) -> u32 {
        out.push_str("???");
        1
    }
}
