use marquee_core::core::{ConfigError, CpuId, MachineConfig, SpaceConfig};
use marquee_core::cpu::CpuFamily;
use marquee_core::memory::ReadTarget;
use marquee_core::system::{Board, CpuDescriptor, Emulator, EmulatorBuilder, SpaceKind};
mod common;
use common::{RAM_BASE, i8085_cpu, rom_image};

#[derive(Default)]
struct Log {
    reads: u32,
    writes: Vec<(u32, u8)>,
}

const CPU: CpuId = CpuId(0);

fn machine(map: impl FnOnce(&mut CpuDescriptor<Log>)) -> Emulator<Log> {
    let mut builder = EmulatorBuilder::new(MachineConfig::default(), Log::default());
    let rom = rom_image(&[(0x0000, &[0x11, 0x22, 0x33])]);
    let (mut desc, _, _) = i8085_cpu(&mut builder, "main", rom, 1_000_000);
    map(&mut desc);
    builder.cpu(desc);
    builder.build().unwrap()
}

// =============================================================================
// Plain memory
// =============================================================================

#[test]
fn test_rom_reads_and_drops_writes() {
    let mut emu = machine(|_| {});
    assert_eq!(emu.read(CPU, SpaceKind::Program, 0x0001).unwrap(), 0x22);
    emu.write(CPU, SpaceKind::Program, 0x0001, 0x99).unwrap();
    assert_eq!(emu.read(CPU, SpaceKind::Program, 0x0001).unwrap(), 0x22);
}

#[test]
fn test_ram_writes_land_in_region() {
    let mut emu = machine(|_| {});
    emu.write(CPU, SpaceKind::Program, RAM_BASE + 5, 0xAB).unwrap();
    assert_eq!(emu.read(CPU, SpaceKind::Program, RAM_BASE + 5).unwrap(), 0xAB);
    let ram = emu.board().regions().iter().find(|(_, r)| r.name == "main_ram").unwrap().0;
    assert_eq!(emu.board().region(ram)[5], 0xAB);
}

#[test]
fn test_address_masked_to_bus_width() {
    let mut emu = machine(|_| {});
    assert_eq!(emu.read(CPU, SpaceKind::Program, 0x1_0002).unwrap(), 0x33);
}

// =============================================================================
// Unmapped accesses
// =============================================================================

#[test]
fn test_unmapped_read_is_open_bus() {
    let mut emu = machine(|_| {});
    assert_eq!(emu.read(CPU, SpaceKind::Program, 0x8000).unwrap(), 0xFF);
    assert_eq!(emu.read(CPU, SpaceKind::Io, 0x42).unwrap(), 0xFF);
    // Unmapped writes vanish.
    emu.write(CPU, SpaceKind::Program, 0x8000, 0x12).unwrap();
    assert_eq!(emu.read(CPU, SpaceKind::Program, 0x8000).unwrap(), 0xFF);
}

#[test]
fn test_open_bus_is_configurable() {
    let mut emu = machine(|desc| {
        desc.program.set_config(SpaceConfig {
            open_bus: 0x00,
            log_unmapped: true,
        });
    });
    assert_eq!(emu.read(CPU, SpaceKind::Program, 0x8000).unwrap(), 0x00);
    assert_eq!(emu.peek(CPU, SpaceKind::Program, 0x8000).unwrap(), 0x00);
}

#[test]
fn test_constant_target() {
    let mut emu = machine(|desc| {
        desc.io.map_read(0x10, 0x13, ReadTarget::Constant(0x5A)).unwrap();
    });
    assert_eq!(emu.read(CPU, SpaceKind::Io, 0x12).unwrap(), 0x5A);
    assert_eq!(emu.peek(CPU, SpaceKind::Io, 0x13).unwrap(), 0x5A);
}

// =============================================================================
// Handlers
// =============================================================================

#[test]
fn test_handler_receives_offset_from_range_start() {
    let mut emu = machine(|desc| {
        desc.program
            .read_handler(0x5000, 0x5007, |_: &mut Board<Log>, offset| offset as u8 + 0x40)
            .unwrap()
            .write_handler(0x5000, 0x5007, |board: &mut Board<Log>, offset, data| {
                board.state.writes.push((offset, data))
            })
            .unwrap();
    });
    assert_eq!(emu.read(CPU, SpaceKind::Program, 0x5003).unwrap(), 0x43);
    emu.write(CPU, SpaceKind::Program, 0x5006, 0x77).unwrap();
    assert_eq!(emu.state().writes, vec![(6, 0x77)]);
}

#[test]
fn test_last_declared_range_wins() {
    let mut emu = machine(|desc| {
        desc.program
            .read_handler(0x4000, 0x40FF, |_: &mut Board<Log>, _| 1)
            .unwrap()
            .read_handler(0x4080, 0x408F, |_: &mut Board<Log>, _| 2)
            .unwrap();
    });
    assert_eq!(emu.read(CPU, SpaceKind::Program, 0x407F).unwrap(), 1);
    assert_eq!(emu.read(CPU, SpaceKind::Program, 0x4080).unwrap(), 2);
    assert_eq!(emu.read(CPU, SpaceKind::Program, 0x408F).unwrap(), 2);
    assert_eq!(emu.read(CPU, SpaceKind::Program, 0x4090).unwrap(), 1);
}

#[test]
fn test_later_handler_overrides_ram() {
    let mut emu = machine(|_| {});
    emu.write(CPU, SpaceKind::Program, RAM_BASE, 0x11).unwrap();
    emu.install_read_handler(CPU, SpaceKind::Program, RAM_BASE, RAM_BASE, |_, _| 0xEE)
        .unwrap();
    assert_eq!(emu.read(CPU, SpaceKind::Program, RAM_BASE).unwrap(), 0xEE);
    // Neighbouring RAM is still RAM.
    emu.write(CPU, SpaceKind::Program, RAM_BASE + 1, 0x22).unwrap();
    assert_eq!(emu.read(CPU, SpaceKind::Program, RAM_BASE + 1).unwrap(), 0x22);
}

#[test]
fn test_handler_offset_relative_to_its_own_range_after_override() {
    let mut emu = machine(|desc| {
        desc.program
            .read_handler(0x6000, 0x60FF, |_: &mut Board<Log>, offset| offset as u8)
            .unwrap()
            .read_handler(0x6010, 0x601F, |_: &mut Board<Log>, offset| 0x80 | offset as u8)
            .unwrap();
    });
    assert_eq!(emu.read(CPU, SpaceKind::Program, 0x6012).unwrap(), 0x82);
    // The wider range resumes past the override and keeps its own origin.
    assert_eq!(emu.read(CPU, SpaceKind::Program, 0x6020).unwrap(), 0x20);
}

#[test]
fn test_peek_skips_handlers() {
    let mut emu = machine(|desc| {
        desc.program
            .read_handler(0x7000, 0x7000, |board: &mut Board<Log>, _| {
                board.state.reads += 1;
                0x12
            })
            .unwrap();
    });
    assert_eq!(emu.peek(CPU, SpaceKind::Program, 0x7000).unwrap(), 0xFF);
    assert_eq!(emu.state().reads, 0);
    assert_eq!(emu.read(CPU, SpaceKind::Program, 0x7000).unwrap(), 0x12);
    assert_eq!(emu.state().reads, 1);
    assert_eq!(emu.peek(CPU, SpaceKind::Program, 0x0000).unwrap(), 0x11);
}

#[test]
fn test_cpu_port_io_reaches_handlers() {
    // MVI A,$5A; OUT $10; IN $11; STA $2000; HLT
    let program = [0x3E, 0x5A, 0xD3, 0x10, 0xDB, 0x11, 0x32, 0x00, 0x20, 0x76];
    let mut builder = EmulatorBuilder::new(MachineConfig::default(), Log::default());
    let (mut desc, _, ram) = i8085_cpu(&mut builder, "main", rom_image(&[(0, &program)]), 1_000_000);
    desc.io
        .write_handler(0x10, 0x10, |board: &mut Board<Log>, offset, data| {
            board.state.writes.push((offset, data))
        })
        .unwrap()
        .read_handler(0x11, 0x11, |_: &mut Board<Log>, _| 0xC3)
        .unwrap();
    builder.cpu(desc);
    let mut emu = builder.build().unwrap();
    emu.execute_cpu(CPU, 100).unwrap();
    assert_eq!(emu.state().writes, vec![(0, 0x5A)]);
    assert_eq!(emu.board().region(ram)[0], 0xC3);
}

#[test]
fn test_unknown_cpu_access_rejected() {
    let mut emu = machine(|_| {});
    assert!(matches!(
        emu.read(CpuId(3), SpaceKind::Program, 0),
        Err(ConfigError::UnknownCpu(CpuId(3)))
    ));
    assert!(emu.install_read_handler(CpuId(3), SpaceKind::Io, 0, 0, |_, _| 0).is_err());
}

// =============================================================================
// Mapping errors
// =============================================================================

#[test]
fn test_inverted_range_rejected() {
    let mut desc: CpuDescriptor<()> = CpuDescriptor::new(CpuFamily::I8085, 1_000_000);
    let err = desc.program.map_read(0x2000, 0x1000, ReadTarget::Nop).err().unwrap();
    assert!(matches!(err, ConfigError::InvertedRange { start: 0x2000, end: 0x1000, .. }));
}

#[test]
fn test_range_beyond_bus_rejected() {
    let mut desc: CpuDescriptor<()> = CpuDescriptor::new(CpuFamily::I8085, 1_000_000);
    let err = desc.io.map_read(0x00, 0x100, ReadTarget::Nop).err().unwrap();
    assert!(matches!(err, ConfigError::RangeBeyondBus { bits: 8, .. }));
    assert!(desc.program.map_read(0x0000, 0xFFFF, ReadTarget::Nop).is_ok());
}

#[test]
fn test_region_too_small_rejected_at_build() {
    let mut builder = EmulatorBuilder::new(MachineConfig::default(), ());
    let rom = builder.rom("tiny", vec![0; 0x100]);
    let mut desc = CpuDescriptor::new(CpuFamily::I8085, 1_000_000);
    desc.program.rom(0x0000, 0x01FF, rom, 0).unwrap();
    builder.cpu(desc);
    let err = builder.build().err().unwrap();
    assert!(matches!(
        err,
        ConfigError::RegionTooSmall { needed: 0x200, size: 0x100, .. }
    ));
}

#[test]
fn test_unknown_region_rejected_at_build() {
    let mut builder = EmulatorBuilder::new(MachineConfig::default(), ());
    let mut desc = CpuDescriptor::new(CpuFamily::I8085, 1_000_000);
    desc.program
        .rom(0x0000, 0x00FF, marquee_core::memory::RegionId(9), 0)
        .unwrap();
    builder.cpu(desc);
    assert!(matches!(builder.build(), Err(ConfigError::UnknownRegion(9))));
}

#[test]
fn test_declared_ranges_kept_in_order() {
    let mut desc: CpuDescriptor<()> = CpuDescriptor::new(CpuFamily::I8085, 1_000_000);
    desc.program
        .map_read(0x1000, 0x1FFF, ReadTarget::Nop)
        .unwrap()
        .map_read(0x0000, 0x0FFF, ReadTarget::Constant(0))
        .unwrap();
    let ranges: Vec<_> = desc.program.read_ranges().collect();
    assert_eq!(ranges, vec![(0x1000, 0x1FFF), (0x0000, 0x0FFF)]);
}
