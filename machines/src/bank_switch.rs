use std::io::{Read, Write};

use tracing::trace;

use marquee_core::core::{ConfigError, ConfigFile, CpuId, Machine, ScheduleError, StateError};
use marquee_core::cpu::{CpuCore, CpuFamily};
use marquee_core::memory::{Access, BankSlot, RegionId};
use marquee_core::system::{Board, CpuDescriptor, Emulator, EmulatorBuilder};

use crate::registry::MachineEntry;

// ---------------------------------------------------------------------------
// Memory map
//
//   0000-1FFF  fixed ROM
//   2000-23FF  RAM
//   4000-4FFF  banked ROM window, four 4KB banks
//   port 10    bank select (low two bits)
//   port 20    watchdog kick
// ---------------------------------------------------------------------------

pub const CPU: CpuId = CpuId(0);
pub const CLOCK: u64 = 2_000_000;

pub const BANK_COUNT: usize = 4;
pub const BANK_SIZE: usize = 0x1000;

const BANK_SELECT_PORT: u32 = 0x10;
const WATCHDOG_PORT: u32 = 0x20;

/// Walks B from 0 upward: select bank `B & 3`, call into the window and
/// store the byte it returns at $2000+B, then kick the watchdog.
const MAIN_LOOP: &[u8] = &[
    0x31, 0x00, 0x24, // LXI SP,$2400
    0x06, 0x00, // MVI B,0
    0x78, // loop: MOV A,B
    0xE6, 0x03, // ANI 3
    0xD3, 0x10, // OUT $10
    0xCD, 0x00, 0x40, // CALL $4000
    0x68, // MOV L,B
    0x26, 0x20, // MVI H,$20
    0x77, // MOV M,A
    0xD3, 0x20, // OUT $20
    0x04, // INR B
    0xC3, 0x05, 0x00, // JMP loop
];

/// Value the routine in bank `index` returns.
pub fn bank_signature(index: usize) -> u8 {
    0xA0 + index as u8
}

fn banked_rom() -> Vec<u8> {
    let mut rom = vec![0u8; BANK_COUNT * BANK_SIZE];
    for (i, bank) in rom.chunks_mut(BANK_SIZE).enumerate() {
        // MVI A,sig; RET
        bank[..3].copy_from_slice(&[0x3E, bank_signature(i), 0xC9]);
    }
    rom
}

/// Single 8085 with a banked ROM window and a watchdog it must keep kicking.
pub struct BankSwitchSystem {
    emu: Emulator<()>,
    ram: RegionId,
    slot: BankSlot,
}

impl BankSwitchSystem {
    pub fn new(file: &ConfigFile) -> Result<Self, ConfigError> {
        let mut builder = EmulatorBuilder::new(file.machine.clone(), ());

        let mut fixed = vec![0u8; 0x2000];
        fixed[..MAIN_LOOP.len()].copy_from_slice(MAIN_LOOP);
        let rom = builder.rom("rom", fixed);
        let ram = builder.ram("ram", 0x400);
        let banked = builder.rom("banked", banked_rom());
        let slot = builder.bank(banked, 0, BANK_SIZE, BANK_COUNT);

        let mut desc = CpuDescriptor::new(CpuFamily::I8085, CLOCK);
        desc.program.set_config(file.space.clone());
        desc.program
            .rom(0x0000, 0x1FFF, rom, 0)?
            .ram(0x2000, 0x23FF, ram, 0)?
            .bank(0x4000, 0x4FFF, slot, Access::Read)?;
        desc.io
            .write_handler(BANK_SELECT_PORT, BANK_SELECT_PORT, move |board: &mut Board<()>, _, data| {
                trace!(bank = data & 3, "bank select");
                board.select_bank(slot, (data & 3) as usize);
            })?
            .write_handler(WATCHDOG_PORT, WATCHDOG_PORT, |board: &mut Board<()>, _, _| {
                board.watchdog_reset();
            })?;
        builder.cpu(desc);
        builder.on_reset(move |board| board.select_bank(slot, 0));

        Ok(Self {
            emu: builder.build()?,
            ram,
            slot,
        })
    }

    pub fn emulator(&self) -> &Emulator<()> {
        &self.emu
    }

    pub fn ram(&self) -> &[u8] {
        self.emu.board().region(self.ram)
    }

    pub fn current_bank(&self) -> usize {
        self.emu.board().current_bank(self.slot)
    }
}

impl Machine for BankSwitchSystem {
    fn name(&self) -> &str {
        "bankswitch"
    }

    fn frames_per_second(&self) -> f64 {
        self.emu.config().frames_per_second
    }

    fn run_frame(&mut self) -> Result<(), ScheduleError> {
        self.emu.run_frame()
    }

    fn reset(&mut self) {
        self.emu.reset();
    }

    fn current_frame(&self) -> u64 {
        self.emu.current_frame()
    }

    fn cpu_count(&self) -> usize {
        self.emu.cpu_count()
    }

    fn cpu(&self, cpu: CpuId) -> Option<&dyn CpuCore> {
        self.emu.cpu(cpu)
    }

    fn total_cycles(&self, cpu: CpuId) -> u64 {
        self.emu.total_cycles(cpu)
    }

    fn save_state(&self, writer: &mut dyn Write) -> Result<(), StateError> {
        self.emu.save_state(writer)
    }

    fn load_state(&mut self, reader: &mut dyn Read) -> Result<(), StateError> {
        self.emu.load_state(reader)
    }
}

// ---------------------------------------------------------------------------
// Machine registry
// ---------------------------------------------------------------------------

fn create_machine(file: &ConfigFile) -> Result<Box<dyn Machine>, ConfigError> {
    Ok(Box::new(BankSwitchSystem::new(file)?))
}

inventory::submit! {
    MachineEntry::new("bankswitch", "8085 calling into a four-way banked ROM window", create_machine)
}
