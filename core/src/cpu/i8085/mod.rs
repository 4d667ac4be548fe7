mod alu;
mod branch;
mod dasm;
mod load_store;

pub use dasm::disassemble;

use tracing::{debug, warn};

use crate::core::bus::{Bus, InputLine, LineEvent, LineState};
use crate::core::error::StateError;
use crate::cpu::{
    CpuCore, CpuFamily, InfoField, IrqCallback, REG_PREVIOUS_PC,
    state::{ContextReader, ContextWriter, CpuStateTrait, I8085State},
};

#[repr(u8)]
#[derive(Copy, Clone, Debug)]
pub enum Flag {
    S = 0x80,  // Sign
    Z = 0x40,  // Zero
    X5 = 0x20, // 16-bit increment/decrement overflow (8085 only)
    AC = 0x10, // Auxiliary carry
    P = 0x04,  // Parity (even)
    V = 0x02,  // Signed overflow (8085 only; reads as 1 on the 8080)
    CY = 0x01, // Carry
}

/// Which chip the core behaves as.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Variant {
    I8085,
    /// Original 8080 timing and opcode map: no RIM/SIM, no TRAP or RST
    /// inputs, undocumented 8085 opcodes decode as NOP/JMP/CALL/RET aliases.
    I8080,
}

// Interrupt input numbers for `set_irq_line`.
pub const INTR_LINE: u8 = 0;
pub const RST55_LINE: u8 = 1;
pub const RST65_LINE: u8 = 2;
pub const RST75_LINE: u8 = 3;

// Pending-interrupt bits, as reported by the `Ireq` register.
pub const IRQ_TRAP: u8 = 0x01;
pub const IRQ_RST55: u8 = 0x02;
pub const IRQ_RST65: u8 = 0x04;
pub const IRQ_RST75: u8 = 0x08;
pub const IRQ_INTR: u8 = 0x10;

// SIM mask bits (set = masked).
pub const MASK_RST55: u8 = 0x01;
pub const MASK_RST65: u8 = 0x02;
pub const MASK_RST75: u8 = 0x04;

/// Vector used for INTR when neither the bus nor a callback supplies one: RST 7.
pub const DEFAULT_INTR_VECTOR: u32 = 0xFF;

const TRAP_VECTOR: u16 = 0x0024;
const RST55_VECTOR: u16 = 0x002C;
const RST65_VECTOR: u16 = 0x0034;
const RST75_VECTOR: u16 = 0x003C;

/// Cycles burned per boundary while halted.
const HALT_CYCLES: u32 = 4;

const CONTEXT_VERSION: u8 = 1;
const CONTEXT_PAYLOAD_LEN: usize = 24;

/// Register ids for [`CpuCore::reg`] / [`CpuCore::set_reg`].
#[repr(i32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Reg {
    Pc = 1,
    Sp,
    Af,
    Bc,
    De,
    Hl,
    Halt,
    Im,
    /// Pending inputs as a bitmask of the `IRQ_*` constants. INTR is bit
    /// 0x10, not a 0xFF sentinel.
    Ireq,
    Ie,
    Sod,
    Sid,
    TrapState,
    IntrState,
    Rst55State,
    Rst65State,
    Rst75State,
}

impl Reg {
    pub fn from_id(id: i32) -> Option<Self> {
        use Reg::*;
        const ALL: [Reg; 17] = [
            Pc, Sp, Af, Bc, De, Hl, Halt, Im, Ireq, Ie, Sod, Sid, TrapState, IntrState,
            Rst55State, Rst65State, Rst75State,
        ];
        ALL.into_iter().find(|r| *r as i32 == id)
    }

    fn name(self) -> &'static str {
        match self {
            Reg::Pc => "PC",
            Reg::Sp => "SP",
            Reg::Af => "AF",
            Reg::Bc => "BC",
            Reg::De => "DE",
            Reg::Hl => "HL",
            Reg::Halt => "HALT",
            Reg::Im => "IM",
            Reg::Ireq => "IREQ",
            Reg::Ie => "IE",
            Reg::Sod => "SOD",
            Reg::Sid => "SID",
            Reg::TrapState => "TRAP",
            Reg::IntrState => "INTR",
            Reg::Rst55State => "RST55",
            Reg::Rst65State => "RST65",
            Reg::Rst75State => "RST75",
        }
    }
}

#[rustfmt::skip]
static CYCLES_8085: [u8; 256] = [
//  0   1   2   3   4   5   6   7   8   9   A   B   C   D   E   F
    4, 10,  7,  6,  4,  4,  7,  4, 10, 10,  7,  6,  4,  4,  7,  4, // 0x00
    7, 10,  7,  6,  4,  4,  7,  4, 10, 10,  7,  6,  4,  4,  7,  4, // 0x10
    4, 10, 16,  6,  4,  4,  7,  4, 10, 10, 16,  6,  4,  4,  7,  4, // 0x20
    4, 10, 13,  6, 10, 10, 10,  4, 10, 10, 13,  6,  4,  4,  7,  4, // 0x30
    4,  4,  4,  4,  4,  4,  7,  4,  4,  4,  4,  4,  4,  4,  7,  4, // 0x40
    4,  4,  4,  4,  4,  4,  7,  4,  4,  4,  4,  4,  4,  4,  7,  4, // 0x50
    4,  4,  4,  4,  4,  4,  7,  4,  4,  4,  4,  4,  4,  4,  7,  4, // 0x60
    7,  7,  7,  7,  7,  7,  5,  7,  4,  4,  4,  4,  4,  4,  7,  4, // 0x70
    4,  4,  4,  4,  4,  4,  7,  4,  4,  4,  4,  4,  4,  4,  7,  4, // 0x80
    4,  4,  4,  4,  4,  4,  7,  4,  4,  4,  4,  4,  4,  4,  7,  4, // 0x90
    4,  4,  4,  4,  4,  4,  7,  4,  4,  4,  4,  4,  4,  4,  7,  4, // 0xA0
    4,  4,  4,  4,  4,  4,  7,  4,  4,  4,  4,  4,  4,  4,  7,  4, // 0xB0
    6, 10,  7, 10,  9, 12,  7, 12,  6, 10,  7,  6,  9, 18,  7, 12, // 0xC0
    6, 10,  7, 10,  9, 12,  7, 12,  6, 10,  7, 10,  9,  7,  7, 12, // 0xD0
    6, 10,  7, 16,  9, 12,  7, 12,  6,  6,  7,  4,  9, 10,  7, 12, // 0xE0
    6, 10,  7,  4,  9, 12,  7, 12,  6,  6,  7,  4,  9,  7,  7, 12, // 0xF0
];

#[rustfmt::skip]
static CYCLES_8080: [u8; 256] = [
//  0   1   2   3   4   5   6   7   8   9   A   B   C   D   E   F
    4, 10,  7,  5,  5,  5,  7,  4,  4, 10,  7,  5,  5,  5,  7,  4, // 0x00
    4, 10,  7,  5,  5,  5,  7,  4,  4, 10,  7,  5,  5,  5,  7,  4, // 0x10
    4, 10, 16,  5,  5,  5,  7,  4,  4, 10, 16,  5,  5,  5,  7,  4, // 0x20
    4, 10, 13,  5, 10, 10, 10,  4,  4, 10, 13,  5,  5,  5,  7,  4, // 0x30
    5,  5,  5,  5,  5,  5,  7,  5,  5,  5,  5,  5,  5,  5,  7,  5, // 0x40
    5,  5,  5,  5,  5,  5,  7,  5,  5,  5,  5,  5,  5,  5,  7,  5, // 0x50
    5,  5,  5,  5,  5,  5,  7,  5,  5,  5,  5,  5,  5,  5,  7,  5, // 0x60
    7,  7,  7,  7,  7,  7,  7,  7,  5,  5,  5,  5,  5,  5,  7,  5, // 0x70
    4,  4,  4,  4,  4,  4,  7,  4,  4,  4,  4,  4,  4,  4,  7,  4, // 0x80
    4,  4,  4,  4,  4,  4,  7,  4,  4,  4,  4,  4,  4,  4,  7,  4, // 0x90
    4,  4,  4,  4,  4,  4,  7,  4,  4,  4,  4,  4,  4,  4,  7,  4, // 0xA0
    4,  4,  4,  4,  4,  4,  7,  4,  4,  4,  4,  4,  4,  4,  7,  4, // 0xB0
    5, 10, 10, 10, 11, 11,  7, 11,  5, 10, 10, 10, 11, 17,  7, 11, // 0xC0
    5, 10, 10, 10, 11, 11,  7, 11,  5, 10, 10, 10, 11, 17,  7, 11, // 0xD0
    5, 10, 10, 18, 11, 11,  7, 11,  5,  5, 10,  4, 11, 17,  7, 11, // 0xE0
    5, 10, 10,  4, 11, 11,  7, 11,  5,  5, 10,  4, 11, 17,  7, 11, // 0xF0
];

/// Base cycle count of `opcode` (the not-taken cost for conditional branches).
pub fn base_cycles(variant: Variant, opcode: u8) -> u32 {
    match variant {
        Variant::I8085 => CYCLES_8085[opcode as usize] as u32,
        Variant::I8080 => CYCLES_8080[opcode as usize] as u32,
    }
}

pub struct I8085 {
    // Registers
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub sp: u16,
    pub pc: u16,
    pub prev_pc: u16,

    pub variant: Variant,

    // Execution state
    pub halted: bool,
    pub ie: bool,
    /// EI takes effect after the following instruction.
    pub ei_delay: bool,

    // Interrupt state
    pub im: u8,
    /// Edge-triggered requests (TRAP, RST 7.5) held until serviced.
    pub latched: u8,
    /// Level-triggered inputs (INTR, RST 5.5, RST 6.5) as currently driven.
    pub levels: u8,
    pub(crate) trap_input: bool,
    pub(crate) rst75_input: bool,

    // Serial pins
    pub sid: bool,
    pub sod: bool,

    irq_callback: Option<IrqCallback>,
    sod_callback: Option<Box<dyn FnMut(bool)>>,
}

impl Default for I8085 {
    fn default() -> Self {
        Self::new()
    }
}

impl I8085 {
    pub fn new() -> Self {
        Self::with_variant(Variant::I8085)
    }

    pub fn new_8080() -> Self {
        Self::with_variant(Variant::I8080)
    }

    pub fn with_variant(variant: Variant) -> Self {
        let mut cpu = Self {
            a: 0,
            f: 0,
            b: 0,
            c: 0,
            d: 0,
            e: 0,
            h: 0,
            l: 0,
            sp: 0,
            pc: 0,
            prev_pc: 0,
            variant,
            halted: false,
            ie: false,
            ei_delay: false,
            im: 0,
            latched: 0,
            levels: 0,
            trap_input: false,
            rst75_input: false,
            sid: false,
            sod: false,
            irq_callback: None,
            sod_callback: None,
        };
        cpu.reset_registers();
        cpu
    }

    /// Install a callback fired whenever SIM changes the SOD pin.
    pub fn set_sod_callback(&mut self, callback: Option<Box<dyn FnMut(bool)>>) {
        self.sod_callback = callback;
    }

    /// Drive the SID input pin, sampled by RIM.
    pub fn set_sid(&mut self, level: bool) {
        self.sid = level;
    }

    /// Union of latched edges and asserted levels.
    #[inline]
    pub fn pending(&self) -> u8 {
        self.latched | self.levels
    }

    fn reset_registers(&mut self) {
        self.a = 0;
        self.f = 0;
        self.store_flags(0);
        self.b = 0;
        self.c = 0;
        self.d = 0;
        self.e = 0;
        self.h = 0;
        self.l = 0;
        self.sp = 0;
        self.pc = 0;
        self.prev_pc = 0;
        self.halted = false;
        self.ie = false;
        self.ei_delay = false;
        self.im = match self.variant {
            Variant::I8085 => MASK_RST55 | MASK_RST65 | MASK_RST75,
            Variant::I8080 => 0,
        };
        self.latched = 0;
        self.sod = false;
    }

    // --- Flag helpers ---

    #[inline]
    pub(crate) fn set_flag(&mut self, flag: Flag, set: bool) {
        if set {
            self.f |= flag as u8;
        } else {
            self.f &= !(flag as u8);
        }
        self.store_flags(self.f);
    }

    #[inline]
    pub(crate) fn flag_set(&self, flag: Flag) -> bool {
        self.f & (flag as u8) != 0
    }

    /// Write the whole flag register, forcing the fixed 8080 bits.
    #[inline]
    pub(crate) fn store_flags(&mut self, f: u8) {
        self.f = match self.variant {
            Variant::I8085 => f,
            Variant::I8080 => (f & 0xD5) | 0x02,
        };
    }

    // --- Register pairs ---

    #[inline]
    pub fn bc(&self) -> u16 {
        u16::from_be_bytes([self.b, self.c])
    }

    #[inline]
    pub fn de(&self) -> u16 {
        u16::from_be_bytes([self.d, self.e])
    }

    #[inline]
    pub fn hl(&self) -> u16 {
        u16::from_be_bytes([self.h, self.l])
    }

    #[inline]
    pub(crate) fn set_bc(&mut self, v: u16) {
        [self.b, self.c] = v.to_be_bytes();
    }

    #[inline]
    pub(crate) fn set_de(&mut self, v: u16) {
        [self.d, self.e] = v.to_be_bytes();
    }

    #[inline]
    pub(crate) fn set_hl(&mut self, v: u16) {
        [self.h, self.l] = v.to_be_bytes();
    }

    /// Register pair by opcode field: 0=BC 1=DE 2=HL 3=SP.
    pub(crate) fn rp(&self, n: u8) -> u16 {
        match n & 3 {
            0 => self.bc(),
            1 => self.de(),
            2 => self.hl(),
            _ => self.sp,
        }
    }

    pub(crate) fn set_rp(&mut self, n: u8, v: u16) {
        match n & 3 {
            0 => self.set_bc(v),
            1 => self.set_de(v),
            2 => self.set_hl(v),
            _ => self.sp = v,
        }
    }

    /// 8-bit register by opcode field: B C D E H L M A. M goes through the bus.
    pub(crate) fn read_reg8(&mut self, bus: &mut dyn Bus, r: u8) -> u8 {
        match r & 7 {
            0 => self.b,
            1 => self.c,
            2 => self.d,
            3 => self.e,
            4 => self.h,
            5 => self.l,
            6 => bus.read(self.hl() as u32),
            _ => self.a,
        }
    }

    pub(crate) fn write_reg8(&mut self, bus: &mut dyn Bus, r: u8, v: u8) {
        match r & 7 {
            0 => self.b = v,
            1 => self.c = v,
            2 => self.d = v,
            3 => self.e = v,
            4 => self.h = v,
            5 => self.l = v,
            6 => bus.write(self.hl() as u32, v),
            _ => self.a = v,
        }
    }

    // --- Memory ---

    #[inline]
    pub(crate) fn fetch_byte(&mut self, bus: &mut dyn Bus) -> u8 {
        let v = bus.read(self.pc as u32);
        self.pc = self.pc.wrapping_add(1);
        v
    }

    #[inline]
    pub(crate) fn fetch_word(&mut self, bus: &mut dyn Bus) -> u16 {
        let lo = self.fetch_byte(bus);
        let hi = self.fetch_byte(bus);
        u16::from_le_bytes([lo, hi])
    }

    #[inline]
    pub(crate) fn read_word(bus: &mut dyn Bus, addr: u16) -> u16 {
        let lo = bus.read(addr as u32);
        let hi = bus.read(addr.wrapping_add(1) as u32);
        u16::from_le_bytes([lo, hi])
    }

    #[inline]
    pub(crate) fn write_word(bus: &mut dyn Bus, addr: u16, v: u16) {
        let [lo, hi] = v.to_le_bytes();
        bus.write(addr as u32, lo);
        bus.write(addr.wrapping_add(1) as u32, hi);
    }

    pub(crate) fn push(&mut self, bus: &mut dyn Bus, v: u16) {
        let [lo, hi] = v.to_le_bytes();
        self.sp = self.sp.wrapping_sub(1);
        bus.write(self.sp as u32, hi);
        self.sp = self.sp.wrapping_sub(1);
        bus.write(self.sp as u32, lo);
    }

    pub(crate) fn pop(&mut self, bus: &mut dyn Bus) -> u16 {
        let lo = bus.read(self.sp as u32);
        self.sp = self.sp.wrapping_add(1);
        let hi = bus.read(self.sp as u32);
        self.sp = self.sp.wrapping_add(1);
        u16::from_le_bytes([lo, hi])
    }

    // --- Interrupt inputs ---

    pub(crate) fn apply_line_event(&mut self, event: LineEvent) {
        match event.line {
            InputLine::Nmi => self.drive_nmi(event.state),
            InputLine::Irq(line) => self.drive_irq(line, event.state),
        }
    }

    fn drive_nmi(&mut self, state: LineState) {
        if self.variant == Variant::I8080 {
            debug!("i8080: no TRAP input, ignoring NMI");
            return;
        }
        let level = state.is_active();
        if level && !self.trap_input {
            self.latched |= IRQ_TRAP;
        }
        self.trap_input = level && state != LineState::Pulse;
    }

    fn drive_irq(&mut self, line: u8, state: LineState) {
        let level = state.is_active() && state != LineState::Pulse;
        match (self.variant, line) {
            (_, INTR_LINE) => self.set_level(IRQ_INTR, level),
            (Variant::I8085, RST55_LINE) => self.set_level(IRQ_RST55, level),
            (Variant::I8085, RST65_LINE) => self.set_level(IRQ_RST65, level),
            (Variant::I8085, RST75_LINE) => {
                if state.is_active() && !self.rst75_input {
                    self.latched |= IRQ_RST75;
                }
                self.rst75_input = level;
            }
            _ => warn!(line, variant = ?self.variant, "no such interrupt input"),
        }
    }

    fn set_level(&mut self, bit: u8, level: bool) {
        if level {
            self.levels |= bit;
        } else {
            self.levels &= !bit;
        }
    }

    /// Service the highest-priority acceptable request, returning its cost.
    ///
    /// Priority: TRAP, RST 7.5, RST 6.5, RST 5.5, INTR. TRAP ignores IE and
    /// the EI delay; everything else needs IE set and, for the RST inputs,
    /// the SIM mask bit clear.
    fn check_interrupts(&mut self, bus: &mut dyn Bus) -> Option<u32> {
        if self.latched & IRQ_TRAP != 0 {
            self.latched &= !IRQ_TRAP;
            bus.acknowledge(InputLine::Nmi);
            return Some(self.enter_interrupt(bus, TRAP_VECTOR));
        }
        if self.ei_delay {
            self.ei_delay = false;
            return None;
        }
        if !self.ie {
            return None;
        }
        if self.variant == Variant::I8085 {
            if self.latched & IRQ_RST75 != 0 && self.im & MASK_RST75 == 0 {
                self.latched &= !IRQ_RST75;
                bus.acknowledge(InputLine::Irq(RST75_LINE));
                return Some(self.enter_interrupt(bus, RST75_VECTOR));
            }
            if self.levels & IRQ_RST65 != 0 && self.im & MASK_RST65 == 0 {
                bus.acknowledge(InputLine::Irq(RST65_LINE));
                return Some(self.enter_interrupt(bus, RST65_VECTOR));
            }
            if self.levels & IRQ_RST55 != 0 && self.im & MASK_RST55 == 0 {
                bus.acknowledge(InputLine::Irq(RST55_LINE));
                return Some(self.enter_interrupt(bus, RST55_VECTOR));
            }
        }
        if self.levels & IRQ_INTR != 0 {
            let supplied = bus.acknowledge(InputLine::Irq(INTR_LINE));
            let vector = match self.irq_callback.as_mut() {
                Some(callback) => callback(InputLine::Irq(INTR_LINE)),
                None => supplied.unwrap_or(DEFAULT_INTR_VECTOR),
            };
            return Some(self.enter_intr(bus, vector));
        }
        None
    }

    /// Internally vectored entry (TRAP, RST 5.5/6.5/7.5).
    fn enter_interrupt(&mut self, bus: &mut dyn Bus, vector: u16) -> u32 {
        self.halted = false;
        self.ie = false;
        self.push(bus, self.pc);
        self.pc = vector;
        match self.variant {
            Variant::I8085 => 12,
            Variant::I8080 => 11,
        }
    }

    /// INTR entry: the acknowledge cycle jams an instruction onto the bus.
    /// `0xCDnnnn` is CALL nnnn, `0xC3nnnn` is JMP nnnn, anything else is
    /// the single-byte opcode in the low byte (normally an RST).
    fn enter_intr(&mut self, bus: &mut dyn Bus, vector: u32) -> u32 {
        self.halted = false;
        self.ie = false;
        self.ei_delay = false;
        let target = vector as u16;
        match vector & 0x00FF_0000 {
            0x00CD_0000 => {
                self.push(bus, self.pc);
                self.pc = target;
                base_cycles(self.variant, 0xCD)
            }
            0x00C3_0000 => {
                self.pc = target;
                base_cycles(self.variant, 0xC3)
            }
            _ => {
                let opcode = vector as u8;
                if opcode & 0xC7 == 0xC7 {
                    self.push(bus, self.pc);
                    self.pc = (opcode & 0x38) as u16;
                    base_cycles(self.variant, opcode)
                } else {
                    self.execute_instruction(bus, opcode)
                }
            }
        }
    }

    // --- RIM / SIM ---

    /// RIM: A = SID, I7.5, I6.5, I5.5, IE, M7.5, M6.5, M5.5.
    pub(crate) fn op_rim(&mut self) {
        let mut v = self.im & 0x07;
        if self.ie {
            v |= 0x08;
        }
        if self.levels & IRQ_RST55 != 0 {
            v |= 0x10;
        }
        if self.levels & IRQ_RST65 != 0 {
            v |= 0x20;
        }
        if self.latched & IRQ_RST75 != 0 {
            v |= 0x40;
        }
        if self.sid {
            v |= 0x80;
        }
        self.a = v;
    }

    /// SIM: bit 3 enables the mask write, bit 4 resets the RST 7.5 latch,
    /// bit 6 enables the serial output write from bit 7.
    pub(crate) fn op_sim(&mut self) {
        let v = self.a;
        if v & 0x08 != 0 {
            self.im = v & 0x07;
        }
        if v & 0x10 != 0 {
            self.latched &= !IRQ_RST75;
        }
        if v & 0x40 != 0 {
            self.sod = v & 0x80 != 0;
            let sod = self.sod;
            if let Some(callback) = self.sod_callback.as_mut() {
                callback(sod);
            }
        }
    }

    // --- Execution ---

    /// Run one instruction or interrupt entry and return its cost.
    pub fn step(&mut self, bus: &mut dyn Bus) -> u32 {
        bus.instruction_boundary();
        while let Some(event) = bus.next_line_event() {
            self.apply_line_event(event);
        }
        if let Some(cycles) = self.check_interrupts(bus) {
            return cycles;
        }
        if self.halted {
            return HALT_CYCLES;
        }
        self.prev_pc = self.pc;
        let opcode = self.fetch_byte(bus);
        self.execute_instruction(bus, opcode)
    }

    pub(crate) fn execute_instruction(&mut self, bus: &mut dyn Bus, opcode: u8) -> u32 {
        let is_8080 = self.variant == Variant::I8080;
        let mut cycles = base_cycles(self.variant, opcode);
        match opcode {
            0x00 => {}

            // ===== 16-bit loads and stores =====
            0x01 | 0x11 | 0x21 | 0x31 => self.op_lxi(bus, opcode >> 4),
            0x02 | 0x12 => self.op_stax(bus, opcode >> 4),
            0x0A | 0x1A => self.op_ldax(bus, opcode >> 4),
            0x22 => self.op_shld(bus),
            0x2A => self.op_lhld(bus),
            0x32 => self.op_sta(bus),
            0x3A => self.op_lda(bus),

            // ===== 16-bit arithmetic =====
            0x03 | 0x13 | 0x23 | 0x33 => self.op_inx(opcode >> 4),
            0x0B | 0x1B | 0x2B | 0x3B => self.op_dcx(opcode >> 4),
            0x09 | 0x19 | 0x29 | 0x39 => self.perform_dad(self.rp(opcode >> 4)),

            // ===== 8-bit increment / decrement / immediate =====
            0x04 | 0x0C | 0x14 | 0x1C | 0x24 | 0x2C | 0x34 | 0x3C => {
                self.op_inr(bus, opcode >> 3);
            }
            0x05 | 0x0D | 0x15 | 0x1D | 0x25 | 0x2D | 0x35 | 0x3D => {
                self.op_dcr(bus, opcode >> 3);
            }
            0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x36 | 0x3E => {
                self.op_mvi(bus, opcode >> 3);
            }

            // ===== Accumulator and carry =====
            0x07 => self.perform_rlc(),
            0x0F => self.perform_rrc(),
            0x17 => self.perform_ral(),
            0x1F => self.perform_rar(),
            0x27 => self.perform_daa(),
            0x2F => self.a = !self.a,
            0x37 => self.set_flag(Flag::CY, true),
            0x3F => {
                let cy = !self.flag_set(Flag::CY);
                self.set_flag(Flag::CY, cy);
            }

            // ===== 8085 extensions (NOP on the 8080) =====
            0x08 | 0x10 | 0x18 | 0x20 | 0x28 | 0x30 | 0x38 if is_8080 => {}
            0x08 => self.perform_dsub(),
            0x10 => self.perform_arhl(),
            0x18 => self.perform_rdel(),
            0x20 => self.op_rim(),
            0x28 => self.op_ldhi(bus),
            0x30 => self.op_sim(),
            0x38 => self.op_ldsi(bus),

            // ===== HLT and MOV =====
            0x76 => self.halted = true,
            0x40..=0x7F => self.op_mov(bus, opcode >> 3, opcode),

            // ===== Accumulator ALU =====
            0x80..=0xBF => {
                let v = self.read_reg8(bus, opcode);
                self.perform_alu(opcode >> 3, v);
            }
            0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => {
                let v = self.fetch_byte(bus);
                self.perform_alu(opcode >> 3, v);
            }

            // ===== Jumps =====
            0xC3 => self.op_jmp(bus),
            0xCB if is_8080 => self.op_jmp(bus),
            0xC2 | 0xCA | 0xD2 | 0xDA | 0xE2 | 0xEA | 0xF2 | 0xFA => {
                cycles += self.op_jcc(bus, opcode >> 3);
            }
            0xE9 => self.pc = self.hl(),
            0xDD | 0xED | 0xFD if is_8080 => self.op_call(bus),
            0xDD => cycles += self.op_jx5(bus, false),
            0xFD => cycles += self.op_jx5(bus, true),

            // ===== Calls and returns =====
            0xCD => self.op_call(bus),
            0xC4 | 0xCC | 0xD4 | 0xDC | 0xE4 | 0xEC | 0xF4 | 0xFC => {
                cycles += self.op_ccc(bus, opcode >> 3);
            }
            0xC9 => self.op_ret(bus),
            0xD9 if is_8080 => self.op_ret(bus),
            0xC0 | 0xC8 | 0xD0 | 0xD8 | 0xE0 | 0xE8 | 0xF0 | 0xF8 => {
                cycles += self.op_rcc(bus, opcode >> 3);
            }
            0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => {
                self.op_rst(bus, opcode & 0x38);
            }
            0xCB => cycles += self.op_rstv(bus),

            // ===== Stack =====
            0xC5 | 0xD5 | 0xE5 | 0xF5 => self.op_push(bus, opcode >> 4),
            0xC1 | 0xD1 | 0xE1 | 0xF1 => self.op_pop(bus, opcode >> 4),
            0xE3 => self.op_xthl(bus),
            0xF9 => self.sp = self.hl(),

            // ===== Exchange and DE-indirect =====
            0xEB => self.op_xchg(),
            0xD9 => self.op_shlx(bus),
            0xED => self.op_lhlx(bus),

            // ===== I/O and interrupt control =====
            0xD3 => self.op_out(bus),
            0xDB => self.op_in(bus),
            0xF3 => {
                self.ie = false;
                self.ei_delay = false;
            }
            0xFB => {
                self.ie = true;
                self.ei_delay = true;
            }
        }
        cycles
    }

    fn decode_context(&self, blob: &[u8]) -> Result<I8085, StateError> {
        let mut r = ContextReader::open(blob, self.family(), CONTEXT_VERSION, CONTEXT_PAYLOAD_LEN)?;
        let mut cpu = I8085::with_variant(self.variant);
        cpu.a = r.u8()?;
        cpu.f = r.u8()?;
        cpu.b = r.u8()?;
        cpu.c = r.u8()?;
        cpu.d = r.u8()?;
        cpu.e = r.u8()?;
        cpu.h = r.u8()?;
        cpu.l = r.u8()?;
        cpu.sp = r.u16()?;
        cpu.pc = r.u16()?;
        cpu.prev_pc = r.u16()?;
        cpu.halted = r.bool("halted")?;
        cpu.ie = r.bool("ie")?;
        cpu.ei_delay = r.bool("ei_delay")?;
        cpu.im = r.u8()?;
        cpu.latched = r.u8()?;
        cpu.levels = r.u8()?;
        cpu.trap_input = r.bool("trap_input")?;
        cpu.rst75_input = r.bool("rst75_input")?;
        cpu.sid = r.bool("sid")?;
        cpu.sod = r.bool("sod")?;
        r.finish()?;

        if cpu.im & !0x07 != 0 {
            return Err(StateError::InvalidField {
                field: "im",
                value: cpu.im as u32,
            });
        }
        if cpu.latched & !(IRQ_TRAP | IRQ_RST75) != 0 {
            return Err(StateError::InvalidField {
                field: "latched",
                value: cpu.latched as u32,
            });
        }
        if cpu.levels & !(IRQ_INTR | IRQ_RST55 | IRQ_RST65) != 0 {
            return Err(StateError::InvalidField {
                field: "levels",
                value: cpu.levels as u32,
            });
        }
        Ok(cpu)
    }

    fn flags_string(&self) -> String {
        const NAMES: [(Flag, char); 7] = [
            (Flag::S, 'S'),
            (Flag::Z, 'Z'),
            (Flag::X5, 'X'),
            (Flag::AC, 'H'),
            (Flag::P, 'P'),
            (Flag::V, 'V'),
            (Flag::CY, 'C'),
        ];
        let mut s = String::with_capacity(8);
        for (i, (flag, name)) in NAMES.iter().enumerate() {
            if i == 4 {
                s.push('.');
            }
            s.push(if self.flag_set(*flag) { *name } else { '.' });
        }
        s
    }
}

impl CpuCore for I8085 {
    fn family(&self) -> CpuFamily {
        match self.variant {
            Variant::I8085 => CpuFamily::I8085,
            Variant::I8080 => CpuFamily::I8080,
        }
    }

    fn reset(&mut self) {
        self.reset_registers();
    }

    fn execute(&mut self, bus: &mut dyn Bus, cycles: u32) -> u32 {
        let mut consumed = 0;
        while consumed < cycles {
            let idle = self.halted;
            consumed += self.step(bus);
            if bus.yield_requested() {
                break;
            }
            // A halted step that found nothing to service: no line can change
            // before the slice ends, so idle out the rest in one go.
            if idle && self.halted && consumed < cycles {
                consumed += (cycles - consumed).div_ceil(HALT_CYCLES) * HALT_CYCLES;
            }
        }
        consumed
    }

    fn context(&self) -> Vec<u8> {
        let mut w = ContextWriter::new(self.family(), CONTEXT_VERSION);
        w.u8(self.a)
            .u8(self.f)
            .u8(self.b)
            .u8(self.c)
            .u8(self.d)
            .u8(self.e)
            .u8(self.h)
            .u8(self.l)
            .u16(self.sp)
            .u16(self.pc)
            .u16(self.prev_pc)
            .bool(self.halted)
            .bool(self.ie)
            .bool(self.ei_delay)
            .u8(self.im)
            .u8(self.latched)
            .u8(self.levels)
            .bool(self.trap_input)
            .bool(self.rst75_input)
            .bool(self.sid)
            .bool(self.sod);
        w.finish()
    }

    fn set_context(&mut self, blob: &[u8]) -> Result<(), StateError> {
        let cpu = self.decode_context(blob)?;
        self.a = cpu.a;
        self.f = cpu.f;
        self.b = cpu.b;
        self.c = cpu.c;
        self.d = cpu.d;
        self.e = cpu.e;
        self.h = cpu.h;
        self.l = cpu.l;
        self.sp = cpu.sp;
        self.pc = cpu.pc;
        self.prev_pc = cpu.prev_pc;
        self.halted = cpu.halted;
        self.ie = cpu.ie;
        self.ei_delay = cpu.ei_delay;
        self.im = cpu.im;
        self.latched = cpu.latched;
        self.levels = cpu.levels;
        self.trap_input = cpu.trap_input;
        self.rst75_input = cpu.rst75_input;
        self.sid = cpu.sid;
        self.sod = cpu.sod;
        Ok(())
    }

    fn pc(&self) -> u32 {
        self.pc as u32
    }

    fn set_pc(&mut self, pc: u32) {
        self.pc = pc as u16;
    }

    fn sp(&self) -> u32 {
        self.sp as u32
    }

    fn set_sp(&mut self, sp: u32) {
        self.sp = sp as u16;
    }

    fn reg(&self, id: i32) -> u32 {
        if id == REG_PREVIOUS_PC {
            return self.prev_pc as u32;
        }
        let Some(reg) = Reg::from_id(id) else {
            return 0;
        };
        match reg {
            Reg::Pc => self.pc as u32,
            Reg::Sp => self.sp as u32,
            Reg::Af => u16::from_be_bytes([self.a, self.f]) as u32,
            Reg::Bc => self.bc() as u32,
            Reg::De => self.de() as u32,
            Reg::Hl => self.hl() as u32,
            Reg::Halt => self.halted as u32,
            Reg::Im => self.im as u32,
            Reg::Ireq => self.pending() as u32,
            Reg::Ie => self.ie as u32,
            Reg::Sod => self.sod as u32,
            Reg::Sid => self.sid as u32,
            Reg::TrapState => self.trap_input as u32,
            Reg::IntrState => (self.levels & IRQ_INTR != 0) as u32,
            Reg::Rst55State => (self.levels & IRQ_RST55 != 0) as u32,
            Reg::Rst65State => (self.levels & IRQ_RST65 != 0) as u32,
            Reg::Rst75State => self.rst75_input as u32,
        }
    }

    fn set_reg(&mut self, id: i32, value: u32) {
        if id == REG_PREVIOUS_PC {
            self.prev_pc = value as u16;
            return;
        }
        let Some(reg) = Reg::from_id(id) else {
            return;
        };
        let line = |value: u32| {
            if value != 0 {
                LineState::Assert
            } else {
                LineState::Clear
            }
        };
        match reg {
            Reg::Pc => self.pc = value as u16,
            Reg::Sp => self.sp = value as u16,
            Reg::Af => {
                let [a, f] = (value as u16).to_be_bytes();
                self.a = a;
                self.store_flags(f);
            }
            Reg::Bc => self.set_bc(value as u16),
            Reg::De => self.set_de(value as u16),
            Reg::Hl => self.set_hl(value as u16),
            Reg::Halt => self.halted = value != 0,
            Reg::Im => self.im = value as u8 & 0x07,
            Reg::Ireq => {
                self.latched = value as u8 & (IRQ_TRAP | IRQ_RST75);
                self.levels = value as u8 & (IRQ_INTR | IRQ_RST55 | IRQ_RST65);
            }
            Reg::Ie => self.ie = value != 0,
            Reg::Sod => self.sod = value != 0,
            Reg::Sid => self.sid = value != 0,
            Reg::TrapState => self.drive_nmi(line(value)),
            Reg::IntrState => self.drive_irq(INTR_LINE, line(value)),
            Reg::Rst55State => self.drive_irq(RST55_LINE, line(value)),
            Reg::Rst65State => self.drive_irq(RST65_LINE, line(value)),
            Reg::Rst75State => self.drive_irq(RST75_LINE, line(value)),
        }
    }

    fn set_nmi_line(&mut self, state: LineState) {
        self.drive_nmi(state);
    }

    fn set_irq_line(&mut self, line: u8, state: LineState) {
        self.drive_irq(line, state);
    }

    fn set_irq_callback(&mut self, callback: Option<IrqCallback>) {
        self.irq_callback = callback;
    }

    fn is_halted(&self) -> bool {
        self.halted
    }

    fn info(&self, field: InfoField) -> String {
        match field {
            InfoField::Name => match self.variant {
                Variant::I8085 => "8085A".to_string(),
                Variant::I8080 => "8080".to_string(),
            },
            InfoField::Family => "Intel 8080".to_string(),
            InfoField::Version => "1.1".to_string(),
            InfoField::Credits => "marquee 8080/8085 core".to_string(),
            InfoField::Flags => self.flags_string(),
            InfoField::Register(REG_PREVIOUS_PC) => format!("PREVPC:{:04X}", self.prev_pc),
            InfoField::Register(id) => match Reg::from_id(id) {
                Some(reg @ (Reg::Halt | Reg::Ie | Reg::Sod | Reg::Sid)) => {
                    format!("{}:{}", reg.name(), self.reg(id))
                }
                Some(reg @ (Reg::Im | Reg::Ireq)) => format!("{}:{:02X}", reg.name(), self.reg(id)),
                Some(reg @ (Reg::Pc | Reg::Sp | Reg::Af | Reg::Bc | Reg::De | Reg::Hl)) => {
                    format!("{}:{:04X}", reg.name(), self.reg(id))
                }
                Some(reg) => format!("{}:{}", reg.name(), self.reg(id)),
                None => String::new(),
            },
        }
    }

    fn dasm(&self, bus: &mut dyn Bus, pc: u32, out: &mut String) -> u32 {
        disassemble(self.variant, pc as u16, |addr| bus.peek(addr as u32), out)
    }
}

impl CpuStateTrait for I8085 {
    type Snapshot = I8085State;

    fn snapshot(&self) -> I8085State {
        I8085State {
            a: self.a,
            f: self.f,
            b: self.b,
            c: self.c,
            d: self.d,
            e: self.e,
            h: self.h,
            l: self.l,
            sp: self.sp,
            pc: self.pc,
            ie: self.ie,
            halted: self.halted,
            im: self.im,
            pending: self.pending(),
        }
    }
}
