use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use tracing::debug;

use marquee_core::core::{
    ConfigError, ConfigFile, CpuId, LineState, Machine, ScheduleError, StateError,
};
use marquee_core::cpu::{CpuCore, CpuFamily};
use marquee_core::device::Latch;
use marquee_core::memory::RegionId;
use marquee_core::system::{Board, CpuDescriptor, Emulator, EmulatorBuilder, interrupt};

use crate::registry::MachineEntry;

// ---------------------------------------------------------------------------
// Memory map (both CPUs)
//
//   0000-1FFF  ROM
//   2000-23FF  RAM
//   port 00    sound command latch (main writes, sound reads)
// ---------------------------------------------------------------------------

pub const MAIN_CPU: CpuId = CpuId(0);
pub const SOUND_CPU: CpuId = CpuId(1);

pub const MAIN_CLOCK: u64 = 3_072_000;
pub const SOUND_CLOCK: u64 = 1_789_772;

const ROM_SIZE: usize = 0x2000;
const RAM_SIZE: usize = 0x400;
const LATCH_PORT: u32 = 0x00;

/// Idle loop shared by both CPUs: set up the stack, enable interrupts and
/// wait in HLT.
const IDLE_LOOP: &[u8] = &[
    0x31, 0x00, 0x24, // LXI SP,$2400
    0xFB, // EI
    0x76, // HLT
    0xC3, 0x04, 0x00, // JMP $0004
];

/// Main RST 7 handler: bump the command counter at $2000 and send it.
const MAIN_ISR: &[u8] = &[
    0xF5, // PUSH PSW
    0x3A, 0x00, 0x20, // LDA $2000
    0x3C, // INR A
    0x32, 0x00, 0x20, // STA $2000
    0xD3, 0x00, // OUT $00
    0xF1, // POP PSW
    0xFB, // EI
    0xC9, // RET
];

/// Sound RST 7 handler: store the command at $2000, count it at $2001.
const SOUND_ISR: &[u8] = &[
    0xF5, // PUSH PSW
    0xDB, 0x00, // IN $00
    0x32, 0x00, 0x20, // STA $2000
    0x3A, 0x01, 0x20, // LDA $2001
    0x3C, // INR A
    0x32, 0x01, 0x20, // STA $2001
    0xF1, // POP PSW
    0xFB, // EI
    0xC9, // RET
];

fn program(isr: &[u8]) -> Vec<u8> {
    let mut rom = vec![0u8; ROM_SIZE];
    rom[..IDLE_LOOP.len()].copy_from_slice(IDLE_LOOP);
    rom[0x38..0x38 + isr.len()].copy_from_slice(isr);
    rom
}

/// Driver state: the latch between the two CPUs.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SoundLatchState {
    pub latch: Latch,
    /// Commands written by the main CPU since reset.
    pub commands: u32,
}

/// Two-CPU board: an 8085 main CPU taking a frame interrupt and posting
/// a command byte to an 8080 sound CPU through a latch.
///
/// A latch write raises the sound CPU's interrupt and asks the scheduler to
/// bring the sound CPU up to the main CPU's local time, so the command is
/// consumed inside the same frame.
pub struct SoundLatchSystem {
    emu: Emulator<SoundLatchState>,
    main_ram: RegionId,
    sound_ram: RegionId,
}

impl SoundLatchSystem {
    pub fn new(file: &ConfigFile) -> Result<Self, ConfigError> {
        let mut builder = EmulatorBuilder::new(file.machine.clone(), SoundLatchState::default());

        let main_rom = builder.rom("main_rom", program(MAIN_ISR));
        let main_ram = builder.ram("main_ram", RAM_SIZE);
        let mut main = CpuDescriptor::new(CpuFamily::I8085, MAIN_CLOCK);
        main.program.set_config(file.space.clone());
        main.program
            .rom(0x0000, 0x1FFF, main_rom, 0)?
            .ram(0x2000, 0x23FF, main_ram, 0)?;
        main.io
            .write_handler(LATCH_PORT, LATCH_PORT, |board: &mut Board<SoundLatchState>, _, data| {
                board.state.latch.write(data);
                board.state.commands += 1;
                debug!(data, "sound command");
                board.set_irq_line(SOUND_CPU, 0, LineState::Hold);
                board.synchronize(SOUND_CPU);
            })?;
        builder.cpu(main.interrupt(interrupt, 1));

        let sound_rom = builder.rom("sound_rom", program(SOUND_ISR));
        let sound_ram = builder.ram("sound_ram", RAM_SIZE);
        let mut sound = CpuDescriptor::new(CpuFamily::I8080, SOUND_CLOCK);
        sound.program.set_config(file.space.clone());
        sound
            .program
            .rom(0x0000, 0x1FFF, sound_rom, 0)?
            .ram(0x2000, 0x23FF, sound_ram, 0)?;
        sound
            .io
            .read_handler(LATCH_PORT, LATCH_PORT, |board: &mut Board<SoundLatchState>, _| {
                board.state.latch.read()
            })?;
        builder.cpu(sound);
        builder.on_reset(|board| board.state = SoundLatchState::default());

        Ok(Self {
            emu: builder.build()?,
            main_ram,
            sound_ram,
        })
    }

    pub fn emulator(&self) -> &Emulator<SoundLatchState> {
        &self.emu
    }

    /// Frame interrupts the main CPU has serviced.
    pub fn main_count(&self) -> u8 {
        self.emu.board().region(self.main_ram)[0]
    }

    /// Commands the sound CPU has serviced.
    pub fn sound_count(&self) -> u8 {
        self.emu.board().region(self.sound_ram)[1]
    }

    /// Last command the sound CPU read from the latch.
    pub fn last_command(&self) -> u8 {
        self.emu.board().region(self.sound_ram)[0]
    }
}

impl Machine for SoundLatchSystem {
    fn name(&self) -> &str {
        "soundlatch"
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
    Ok(Box::new(SoundLatchSystem::new(file)?))
}

inventory::submit! {
    MachineEntry::new("soundlatch", "8085 main CPU feeding an 8080 sound CPU through a latch", create_machine)
}
