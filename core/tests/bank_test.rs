use marquee_core::core::{ConfigError, CpuId, LineState, MachineConfig};
use marquee_core::cpu::CpuFamily;
use marquee_core::cpu::i8085::Reg;
use marquee_core::memory::{Access, BankSlot, RegionId};
use marquee_core::system::{Board, CpuDescriptor, Emulator, EmulatorBuilder, SpaceKind};
mod common;
use common::{i8085_cpu, rom_image};

const CPU: CpuId = CpuId(0);

/// 8085 with two 256-byte banks of RAM windowed at 0x8000 and a bank
/// select register at 0x7FFF.
fn banked_machine(program: &[u8]) -> (Emulator<()>, BankSlot, RegionId) {
    let mut builder = EmulatorBuilder::new(MachineConfig::default(), ());
    let banked = builder.ram("banked", 0x200);
    let slot = builder.bank(banked, 0, 0x100, 2);
    let (mut desc, _, _) = i8085_cpu(&mut builder, "main", rom_image(&[(0, program)]), 1_000_000);
    desc.program
        .bank(0x8000, 0x80FF, slot, Access::ReadWrite)
        .unwrap()
        .write_handler(0x7FFF, 0x7FFF, move |board: &mut Board<()>, _, data| {
            board.select_bank(slot, data as usize)
        })
        .unwrap();
    builder.cpu(desc);
    (builder.build().unwrap(), slot, banked)
}

// =============================================================================
// Selection
// =============================================================================

#[test]
fn test_select_outside_execution_is_immediate() {
    let (mut emu, slot, banked) = banked_machine(&[0x76]);
    emu.board_mut().region_mut(banked)[0x100] = 0x55;
    assert_eq!(emu.read(CPU, SpaceKind::Program, 0x8000).unwrap(), 0x00);
    emu.select_bank(slot, 1);
    assert_eq!(emu.board().current_bank(slot), 1);
    assert_eq!(emu.read(CPU, SpaceKind::Program, 0x8000).unwrap(), 0x55);
}

#[test]
fn test_window_writes_reach_selected_bank() {
    let (mut emu, slot, banked) = banked_machine(&[0x76]);
    emu.select_bank(slot, 1);
    emu.write(CPU, SpaceKind::Program, 0x8010, 0xA5).unwrap();
    assert_eq!(emu.board().region(banked)[0x110], 0xA5);
    assert_eq!(emu.board().region(banked)[0x010], 0x00);
}

#[test]
fn test_out_of_range_index_wraps() {
    let (mut emu, slot, _) = banked_machine(&[0x76]);
    emu.select_bank(slot, 3);
    assert_eq!(emu.board().current_bank(slot), 1);
    emu.select_bank(slot, 4);
    assert_eq!(emu.board().current_bank(slot), 0);
}

// =============================================================================
// Switches made by an instruction take effect at the next one
// =============================================================================

#[test]
fn test_switch_lands_at_next_instruction_boundary() {
    // LXI H,$AA01   ; L selects bank 1, H is the data byte
    // SHLD $7FFF    ; select register, then 0x8000 in the same instruction
    // LDA $8000     ; next instruction sees bank 1
    // HLT
    let program = [0x21, 0x01, 0xAA, 0x22, 0xFF, 0x7F, 0x3A, 0x00, 0x80, 0x76];
    let (mut emu, slot, banked) = banked_machine(&program);
    emu.board_mut().region_mut(banked)[0x100] = 0x55;

    emu.execute_cpu(CPU, 100).unwrap();

    assert_eq!(emu.board().current_bank(slot), 1);
    // The second SHLD byte went to the bank that was current when the
    // instruction started.
    assert_eq!(emu.board().region(banked)[0x000], 0xAA);
    assert_eq!(emu.board().region(banked)[0x100], 0x55);
    let a = emu.cpu(CPU).unwrap().reg(Reg::Af as i32) >> 8;
    assert_eq!(a, 0x55);
}

#[test]
fn test_board_select_outside_execution_is_immediate() {
    let (mut emu, slot, _) = banked_machine(&[0x76]);
    emu.board_mut().select_bank(slot, 1);
    assert_eq!(emu.board().current_bank(slot), 1);
}

#[test]
fn test_switch_by_last_instruction_of_slice_is_committed() {
    // MVI A,$01 ; STA $7FFF ; HLT
    let program = [0x3E, 0x01, 0x32, 0xFF, 0x7F, 0x76];
    let (mut emu, slot, _) = banked_machine(&program);
    // 7 + 13 cycles: the slice ends right after the select.
    emu.execute_cpu(CPU, 20).unwrap();
    assert_eq!(emu.cpu(CPU).unwrap().pc(), 5);
    assert_eq!(emu.board().current_bank(slot), 1);
}

#[test]
fn test_board_select_survives_save_state() {
    let (mut a, slot, _) = banked_machine(&[0x76]);
    a.board_mut().select_bank(slot, 1);
    let mut blob = Vec::new();
    a.save_state(&mut blob).unwrap();

    let (mut b, slot_b, _) = banked_machine(&[0x76]);
    b.load_state(&mut blob.as_slice()).unwrap();
    a.execute_cpu(CPU, 4).unwrap();
    b.execute_cpu(CPU, 4).unwrap();
    assert_eq!(a.board().current_bank(slot), 1);
    assert_eq!(b.board().current_bank(slot_b), 1);
}

#[test]
fn test_board_select_lands_while_every_cpu_halted() {
    let (mut emu, slot, _) = banked_machine(&[0x76]);
    emu.board_mut().set_halt_line(CPU, LineState::Assert);
    emu.board_mut().select_bank(slot, 1);
    emu.run_frames(3).unwrap();
    assert_eq!(emu.board().current_bank(slot), 1);
}

#[test]
fn test_reset_hook_selects_initial_bank() {
    let mut builder = EmulatorBuilder::new(MachineConfig::default(), ());
    let banked = builder.rom("banked", vec![0; 0x4000]);
    let slot = builder.bank(banked, 0, 0x1000, 4);
    let (mut desc, _, _) = i8085_cpu(&mut builder, "main", rom_image(&[]), 1_000_000);
    desc.program.bank(0x4000, 0x4FFF, slot, Access::Read).unwrap();
    builder.cpu(desc);
    builder.on_reset(move |board| board.select_bank(slot, 2));
    let mut emu = builder.build().unwrap();
    assert_eq!(emu.board().current_bank(slot), 2);

    emu.select_bank(slot, 0);
    emu.reset();
    assert_eq!(emu.board().current_bank(slot), 2);
}

// =============================================================================
// Runtime installation and geometry errors
// =============================================================================

#[test]
fn test_install_bank_at_runtime() {
    let (mut emu, slot, banked) = banked_machine(&[0x76]);
    emu.board_mut().region_mut(banked)[0x004] = 0x99;
    emu.install_bank(CPU, SpaceKind::Program, Access::Read, slot, 0x9000, 0x90FF)
        .unwrap();
    assert_eq!(emu.read(CPU, SpaceKind::Program, 0x9004).unwrap(), 0x99);
}

#[test]
fn test_install_bank_window_too_large() {
    let (mut emu, slot, _) = banked_machine(&[0x76]);
    let err = emu
        .install_bank(CPU, SpaceKind::Program, Access::Read, slot, 0x9000, 0x91FF)
        .unwrap_err();
    assert!(matches!(err, ConfigError::BankWindowTooLarge { bank_size: 0x100, .. }));
    let err = emu
        .install_bank(CPU, SpaceKind::Program, Access::Read, BankSlot(7), 0x9000, 0x90FF)
        .unwrap_err();
    assert!(matches!(err, ConfigError::UnknownBank(7)));
}

#[test]
fn test_bank_overrunning_region_rejected() {
    let mut builder = EmulatorBuilder::new(MachineConfig::default(), ());
    let region = builder.ram("banked", 0x300);
    builder.bank(region, 0x100, 0x100, 3);
    builder.cpu(CpuDescriptor::new(CpuFamily::I8085, 1_000_000));
    let err = builder.build().err().unwrap();
    assert!(matches!(
        err,
        ConfigError::BankGeometry { slot: 0, count: 3, size: 0x300, .. }
    ));
}

#[test]
fn test_declared_window_larger_than_bank_rejected() {
    let mut builder = EmulatorBuilder::new(MachineConfig::default(), ());
    let region = builder.ram("banked", 0x200);
    let slot = builder.bank(region, 0, 0x100, 2);
    let mut desc = CpuDescriptor::new(CpuFamily::I8085, 1_000_000);
    desc.program.bank(0x8000, 0x81FF, slot, Access::ReadWrite).unwrap();
    builder.cpu(desc);
    assert!(matches!(
        builder.build(),
        Err(ConfigError::BankWindowTooLarge { start: 0x8000, end: 0x81FF, .. })
    ));
}
