use marquee_core::cpu::i8085::{Flag, I8085};
mod common;
use common::TestBus;

fn flag(cpu: &I8085, f: Flag) -> bool {
    cpu.f & (f as u8) != 0
}

// =============================================================================
// ADD / ADC / ADI
// =============================================================================

#[test]
fn test_add_b() {
    let mut cpu = I8085::new();
    let mut bus = TestBus::new();
    cpu.a = 0x15;
    cpu.b = 0x30;
    bus.load(0, &[0x80]); // ADD B
    let cycles = cpu.step(&mut bus);
    assert_eq!(cycles, 4);
    assert_eq!(cpu.a, 0x45);
    assert!(!flag(&cpu, Flag::CY));
    assert!(!flag(&cpu, Flag::AC));
    assert!(!flag(&cpu, Flag::P)); // three bits set
}

#[test]
fn test_add_carry_out() {
    let mut cpu = I8085::new();
    let mut bus = TestBus::new();
    cpu.a = 0xF0;
    cpu.b = 0x20;
    bus.load(0, &[0x80]);
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x10);
    assert!(flag(&cpu, Flag::CY));
}

#[test]
fn test_add_aux_carry() {
    let mut cpu = I8085::new();
    let mut bus = TestBus::new();
    cpu.a = 0x0F;
    cpu.c = 0x01;
    bus.load(0, &[0x81]); // ADD C
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x10);
    assert!(flag(&cpu, Flag::AC));
    assert!(!flag(&cpu, Flag::CY));
}

#[test]
fn test_add_signed_overflow_sets_v() {
    let mut cpu = I8085::new();
    let mut bus = TestBus::new();
    cpu.a = 0x7F;
    bus.load(0, &[0xC6, 0x01]); // ADI 01
    let cycles = cpu.step(&mut bus);
    assert_eq!(cycles, 7);
    assert_eq!(cpu.a, 0x80);
    assert!(flag(&cpu, Flag::V));
    assert!(flag(&cpu, Flag::S));
}

#[test]
fn test_adc_uses_carry() {
    let mut cpu = I8085::new();
    let mut bus = TestBus::new();
    cpu.a = 0x10;
    cpu.d = 0x05;
    cpu.f = Flag::CY as u8;
    bus.load(0, &[0x8A]); // ADC D
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x16);
    assert!(!flag(&cpu, Flag::CY));
}

#[test]
fn test_add_m_reads_through_hl() {
    let mut cpu = I8085::new();
    let mut bus = TestBus::new();
    cpu.a = 0x01;
    cpu.h = 0x30;
    cpu.l = 0x00;
    bus.memory[0x3000] = 0x41;
    bus.load(0, &[0x86]); // ADD M
    let cycles = cpu.step(&mut bus);
    assert_eq!(cycles, 7);
    assert_eq!(cpu.a, 0x42);
}

// =============================================================================
// SUB / SBB / CMP
// =============================================================================

#[test]
fn test_sub_equal_gives_zero() {
    let mut cpu = I8085::new();
    let mut bus = TestBus::new();
    cpu.a = 0x10;
    cpu.b = 0x10;
    bus.load(0, &[0x90]); // SUB B
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x00);
    assert!(flag(&cpu, Flag::Z));
    assert!(flag(&cpu, Flag::P));
    assert!(!flag(&cpu, Flag::CY));
    // No borrow out of bit 3: the adder carries.
    assert!(flag(&cpu, Flag::AC));
}

#[test]
fn test_sui_borrow() {
    let mut cpu = I8085::new();
    let mut bus = TestBus::new();
    cpu.a = 0x00;
    bus.load(0, &[0xD6, 0x01]); // SUI 01
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0xFF);
    assert!(flag(&cpu, Flag::CY));
    assert!(flag(&cpu, Flag::S));
    assert!(flag(&cpu, Flag::P));
    assert!(!flag(&cpu, Flag::AC));
}

#[test]
fn test_sbb_uses_borrow() {
    let mut cpu = I8085::new();
    let mut bus = TestBus::new();
    cpu.a = 0x10;
    cpu.e = 0x05;
    cpu.f = Flag::CY as u8;
    bus.load(0, &[0x9B]); // SBB E
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x0A);
}

#[test]
fn test_cpi_leaves_accumulator() {
    let mut cpu = I8085::new();
    let mut bus = TestBus::new();
    cpu.a = 0x05;
    bus.load(0, &[0xFE, 0x05, 0xFE, 0x06]); // CPI 05; CPI 06
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x05);
    assert!(flag(&cpu, Flag::Z));
    assert!(!flag(&cpu, Flag::CY));
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x05);
    assert!(!flag(&cpu, Flag::Z));
    assert!(flag(&cpu, Flag::CY));
}

// =============================================================================
// Logical
// =============================================================================

#[test]
fn test_ani_sets_aux_carry_on_8085() {
    let mut cpu = I8085::new();
    let mut bus = TestBus::new();
    cpu.a = 0xF0;
    cpu.f = Flag::CY as u8;
    bus.load(0, &[0xE6, 0x30]); // ANI 30
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x30);
    assert!(flag(&cpu, Flag::AC));
    assert!(!flag(&cpu, Flag::CY));
}

#[test]
fn test_ani_aux_carry_on_8080_follows_bit3() {
    let mut cpu = I8085::new_8080();
    let mut bus = TestBus::new();
    cpu.a = 0xF0;
    bus.load(0, &[0xE6, 0x30, 0xE6, 0x08]); // ANI 30; ANI 08
    cpu.step(&mut bus);
    assert!(!flag(&cpu, Flag::AC));
    cpu.a = 0xF0;
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x00);
    assert!(flag(&cpu, Flag::AC));
    assert!(flag(&cpu, Flag::Z));
}

#[test]
fn test_xra_a_clears() {
    let mut cpu = I8085::new();
    let mut bus = TestBus::new();
    cpu.a = 0x5A;
    cpu.f = (Flag::CY as u8) | (Flag::AC as u8);
    bus.load(0, &[0xAF]); // XRA A
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0);
    assert!(flag(&cpu, Flag::Z));
    assert!(flag(&cpu, Flag::P));
    assert!(!flag(&cpu, Flag::CY));
    assert!(!flag(&cpu, Flag::AC));
}

#[test]
fn test_ora_sets_sign() {
    let mut cpu = I8085::new();
    let mut bus = TestBus::new();
    cpu.a = 0x01;
    cpu.h = 0x80;
    bus.load(0, &[0xB4]); // ORA H
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x81);
    assert!(flag(&cpu, Flag::S));
    assert!(flag(&cpu, Flag::P));
}

// =============================================================================
// INR / DCR
// =============================================================================

#[test]
fn test_inr_wraps_and_keeps_carry() {
    let mut cpu = I8085::new();
    let mut bus = TestBus::new();
    cpu.b = 0xFF;
    cpu.f = Flag::CY as u8;
    bus.load(0, &[0x04]); // INR B
    let cycles = cpu.step(&mut bus);
    assert_eq!(cycles, 4);
    assert_eq!(cpu.b, 0x00);
    assert!(flag(&cpu, Flag::Z));
    assert!(flag(&cpu, Flag::AC));
    assert!(flag(&cpu, Flag::CY));
}

#[test]
fn test_dcr_aux_carry() {
    let mut cpu = I8085::new();
    let mut bus = TestBus::new();
    cpu.b = 0x01;
    cpu.c = 0x00;
    bus.load(0, &[0x05, 0x0D]); // DCR B; DCR C
    cpu.step(&mut bus);
    assert_eq!(cpu.b, 0x00);
    assert!(flag(&cpu, Flag::Z));
    assert!(flag(&cpu, Flag::AC));
    cpu.step(&mut bus);
    assert_eq!(cpu.c, 0xFF);
    assert!(!flag(&cpu, Flag::AC));
    assert!(flag(&cpu, Flag::S));
}

#[test]
fn test_inr_m_is_read_modify_write() {
    let mut cpu = I8085::new();
    let mut bus = TestBus::new();
    cpu.h = 0x40;
    cpu.l = 0x10;
    bus.memory[0x4010] = 0x7F;
    bus.load(0, &[0x34]); // INR M
    let cycles = cpu.step(&mut bus);
    assert_eq!(cycles, 10);
    assert_eq!(bus.memory[0x4010], 0x80);
    assert!(flag(&cpu, Flag::V));
}

// =============================================================================
// 16-bit
// =============================================================================

#[test]
fn test_inx_wrap_sets_x5_on_8085() {
    let mut cpu = I8085::new();
    let mut bus = TestBus::new();
    cpu.h = 0xFF;
    cpu.l = 0xFF;
    bus.load(0, &[0x23, 0x23]); // INX H; INX H
    let cycles = cpu.step(&mut bus);
    assert_eq!(cycles, 6);
    assert_eq!(cpu.hl(), 0x0000);
    assert!(flag(&cpu, Flag::X5));
    cpu.step(&mut bus);
    assert_eq!(cpu.hl(), 0x0001);
    assert!(!flag(&cpu, Flag::X5));
}

#[test]
fn test_inx_leaves_flags_on_8080() {
    let mut cpu = I8085::new_8080();
    let mut bus = TestBus::new();
    cpu.b = 0xFF;
    cpu.c = 0xFF;
    let before = cpu.f;
    bus.load(0, &[0x03]); // INX B
    let cycles = cpu.step(&mut bus);
    assert_eq!(cycles, 5);
    assert_eq!(cpu.bc(), 0);
    assert_eq!(cpu.f, before);
}

#[test]
fn test_dcx_wrap_sets_x5() {
    let mut cpu = I8085::new();
    let mut bus = TestBus::new();
    bus.load(0, &[0x1B]); // DCX D
    cpu.step(&mut bus);
    assert_eq!(cpu.de(), 0xFFFF);
    assert!(flag(&cpu, Flag::X5));
}

#[test]
fn test_dad_carry() {
    let mut cpu = I8085::new();
    let mut bus = TestBus::new();
    cpu.h = 0xFF;
    cpu.l = 0xFF;
    cpu.c = 0x01;
    bus.load(0, &[0x09]); // DAD B
    let cycles = cpu.step(&mut bus);
    assert_eq!(cycles, 10);
    assert_eq!(cpu.hl(), 0x0000);
    assert!(flag(&cpu, Flag::CY));
}

#[test]
fn test_dsub_zero_covers_whole_word() {
    let mut cpu = I8085::new();
    let mut bus = TestBus::new();
    cpu.h = 0x01;
    cpu.l = 0x00;
    cpu.b = 0x00;
    cpu.c = 0x01;
    bus.load(0, &[0x08]); // DSUB
    cpu.step(&mut bus);
    assert_eq!(cpu.hl(), 0x00FF);
    // High byte is zero but the word is not.
    assert!(!flag(&cpu, Flag::Z));
    assert!(!flag(&cpu, Flag::CY));
}

#[test]
fn test_dsub_equal() {
    let mut cpu = I8085::new();
    let mut bus = TestBus::new();
    cpu.h = 0x12;
    cpu.l = 0x34;
    cpu.b = 0x12;
    cpu.c = 0x34;
    bus.load(0, &[0x08]);
    cpu.step(&mut bus);
    assert_eq!(cpu.hl(), 0);
    assert!(flag(&cpu, Flag::Z));
}

#[test]
fn test_arhl_keeps_sign() {
    let mut cpu = I8085::new();
    let mut bus = TestBus::new();
    cpu.h = 0x80;
    cpu.l = 0x01;
    bus.load(0, &[0x10]); // ARHL
    cpu.step(&mut bus);
    assert_eq!(cpu.hl(), 0xC000);
    assert!(flag(&cpu, Flag::CY));
}

#[test]
fn test_rdel_rotates_through_carry() {
    let mut cpu = I8085::new();
    let mut bus = TestBus::new();
    cpu.d = 0x80;
    cpu.e = 0x00;
    bus.load(0, &[0x18]); // RDEL
    cpu.step(&mut bus);
    assert_eq!(cpu.de(), 0x0000);
    assert!(flag(&cpu, Flag::CY));
    assert!(flag(&cpu, Flag::V));
}

#[test]
fn test_8085_extensions_are_nops_on_8080() {
    let mut cpu = I8085::new_8080();
    let mut bus = TestBus::new();
    cpu.h = 0x80;
    cpu.l = 0x01;
    bus.load(0, &[0x10, 0x08]); // ARHL, DSUB on an 8085
    assert_eq!(cpu.step(&mut bus), 4);
    assert_eq!(cpu.step(&mut bus), 4);
    assert_eq!(cpu.hl(), 0x8001);
    assert_eq!(cpu.pc, 2);
}

// =============================================================================
// Rotates, DAA, carry
// =============================================================================

#[test]
fn test_rlc() {
    let mut cpu = I8085::new();
    let mut bus = TestBus::new();
    cpu.a = 0x81;
    bus.load(0, &[0x07]); // RLC
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x03);
    assert!(flag(&cpu, Flag::CY));
}

#[test]
fn test_rar() {
    let mut cpu = I8085::new();
    let mut bus = TestBus::new();
    cpu.a = 0x01;
    bus.load(0, &[0x1F, 0x1F]); // RAR; RAR
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x00);
    assert!(flag(&cpu, Flag::CY));
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x80);
    assert!(!flag(&cpu, Flag::CY));
}

#[test]
fn test_daa_after_bcd_add() {
    let mut cpu = I8085::new();
    let mut bus = TestBus::new();
    cpu.a = 0x09;
    bus.load(0, &[0xC6, 0x08, 0x27]); // ADI 08; DAA
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x11);
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x17);
    assert!(!flag(&cpu, Flag::CY));
}

#[test]
fn test_daa_decimal_carry() {
    let mut cpu = I8085::new();
    let mut bus = TestBus::new();
    cpu.a = 0x99;
    bus.load(0, &[0xC6, 0x01, 0x27]); // ADI 01; DAA
    cpu.step(&mut bus);
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x00);
    assert!(flag(&cpu, Flag::CY));
    assert!(flag(&cpu, Flag::Z));
}

#[test]
fn test_cma_stc_cmc() {
    let mut cpu = I8085::new();
    let mut bus = TestBus::new();
    cpu.a = 0x0F;
    bus.load(0, &[0x2F, 0x37, 0x3F]); // CMA; STC; CMC
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0xF0);
    cpu.step(&mut bus);
    assert!(flag(&cpu, Flag::CY));
    cpu.step(&mut bus);
    assert!(!flag(&cpu, Flag::CY));
}

#[test]
fn test_8080_flag_register_fixed_bits() {
    let mut cpu = I8085::new_8080();
    let mut bus = TestBus::new();
    cpu.a = 0x7F;
    bus.load(0, &[0xC6, 0x01]); // ADI 01 overflows
    cpu.step(&mut bus);
    // Bit 1 always reads 1, bits 3 and 5 always 0.
    assert_eq!(cpu.f & 0x02, 0x02);
    assert_eq!(cpu.f & 0x28, 0x00);
}
