use marquee_core::cpu::CpuCore;
use marquee_core::cpu::i8085::{I8085, Variant, disassemble};
mod common;
use common::TestBus;

fn dasm(variant: Variant, bytes: &[u8]) -> (String, u32) {
    let mut out = String::new();
    let len = disassemble(variant, 0, |addr| bytes.get(addr as usize).copied().unwrap_or(0), &mut out);
    (out, len)
}

#[test]
fn test_operand_formats() {
    assert_eq!(dasm(Variant::I8085, &[0x00]), ("NOP".to_string(), 1));
    assert_eq!(dasm(Variant::I8085, &[0x3E, 0x05]), ("MVI  A,$05".to_string(), 2));
    assert_eq!(dasm(Variant::I8085, &[0xC3, 0x34, 0x12]), ("JMP  $1234".to_string(), 3));
    assert_eq!(dasm(Variant::I8085, &[0x21, 0x34, 0x12]), ("LXI  H,$1234".to_string(), 3));
    assert_eq!(dasm(Variant::I8085, &[0xCD, 0x00, 0x80]), ("CALL $8000".to_string(), 3));
    assert_eq!(dasm(Variant::I8085, &[0xD3, 0x08]), ("OUT  $08".to_string(), 2));
}

#[test]
fn test_register_forms() {
    assert_eq!(dasm(Variant::I8085, &[0x7E]).0, "MOV  A,M");
    assert_eq!(dasm(Variant::I8085, &[0x80]).0, "ADD  B");
    assert_eq!(dasm(Variant::I8085, &[0xBF]).0, "CMP  A");
    assert_eq!(dasm(Variant::I8085, &[0xF5]).0, "PUSH PSW");
    assert_eq!(dasm(Variant::I8085, &[0x31, 0x00, 0x20]).0, "LXI  SP,$2000");
    assert_eq!(dasm(Variant::I8085, &[0xFF]).0, "RST  7");
    assert_eq!(dasm(Variant::I8085, &[0xC2, 0x00, 0x10]).0, "JNZ  $1000");
    assert_eq!(dasm(Variant::I8085, &[0xE8]).0, "RPE");
}

#[test]
fn test_8085_only_opcodes_per_variant() {
    assert_eq!(dasm(Variant::I8085, &[0x20]).0, "RIM");
    assert_eq!(dasm(Variant::I8080, &[0x20]).0, "NOP");
    assert_eq!(dasm(Variant::I8085, &[0xCB]), ("RSTV".to_string(), 1));
    assert_eq!(dasm(Variant::I8080, &[0xCB, 0x00, 0x10]), ("JMP  $1000".to_string(), 3));
    assert_eq!(dasm(Variant::I8085, &[0xED]), ("LHLX".to_string(), 1));
    assert_eq!(dasm(Variant::I8080, &[0xED, 0x00, 0x10]), ("CALL $1000".to_string(), 3));
    assert_eq!(dasm(Variant::I8085, &[0x28, 0x10]).0, "LDHI $10");
}

#[test]
fn test_lengths_match_execution() {
    // Every non-control opcode advances PC by its disassembled length.
    for op in 0u8..=0xFF {
        let (_, len) = dasm(Variant::I8085, &[op, 0x00, 0x00]);
        assert!((1..=3).contains(&len), "opcode {op:#04x}");
    }
    let mut cpu = I8085::new();
    let mut bus = TestBus::new();
    bus.load(0, &[0x3E, 0x01, 0x01, 0x00, 0x00, 0x32, 0x00, 0x40]);
    for _ in 0..3 {
        let pc = cpu.pc;
        let mut text = String::new();
        let len = cpu.dasm(&mut bus, pc as u32, &mut text);
        cpu.step(&mut bus);
        assert_eq!(cpu.pc, pc + len as u16, "{text}");
    }
}
