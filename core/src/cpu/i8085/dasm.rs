use std::fmt::Write;

use super::Variant;

const REG: [&str; 8] = ["B", "C", "D", "E", "H", "L", "M", "A"];
const RP: [&str; 4] = ["B", "D", "H", "SP"];
const RP_PSW: [&str; 4] = ["B", "D", "H", "PSW"];
const CC: [&str; 8] = ["NZ", "Z", "NC", "C", "PO", "PE", "P", "M"];
const ALU: [&str; 8] = ["ADD", "ADC", "SUB", "SBB", "ANA", "XRA", "ORA", "CMP"];
const ALU_IMM: [&str; 8] = ["ADI", "ACI", "SUI", "SBI", "ANI", "XRI", "ORI", "CPI"];

/// Operand shape following an opcode.
enum Operand {
    None,
    Byte,
    Word,
}

/// Disassemble one instruction in Intel mnemonics. `read` supplies bytes
/// starting at `pc`. Returns the instruction length in bytes.
pub fn disassemble(
    variant: Variant,
    pc: u16,
    mut read: impl FnMut(u16) -> u8,
    out: &mut String,
) -> u32 {
    let op = read(pc);
    let y = ((op >> 3) & 7) as usize;
    let z = (op & 7) as usize;
    let p = ((op >> 4) & 3) as usize;
    let is_8080 = variant == Variant::I8080;

    let (text, operand): (String, Operand) = match op {
        0x00 => ("NOP".into(), Operand::None),
        0x08 | 0x10 | 0x18 | 0x20 | 0x28 | 0x30 | 0x38 if is_8080 => {
            ("NOP".into(), Operand::None)
        }
        0x08 => ("DSUB".into(), Operand::None),
        0x10 => ("ARHL".into(), Operand::None),
        0x18 => ("RDEL".into(), Operand::None),
        0x20 => ("RIM".into(), Operand::None),
        0x28 => ("LDHI".into(), Operand::Byte),
        0x30 => ("SIM".into(), Operand::None),
        0x38 => ("LDSI".into(), Operand::Byte),
        0x01 | 0x11 | 0x21 | 0x31 => (format!("LXI  {},", RP[p]), Operand::Word),
        0x02 | 0x12 => (format!("STAX {}", RP[p]), Operand::None),
        0x0A | 0x1A => (format!("LDAX {}", RP[p]), Operand::None),
        0x22 => ("SHLD".into(), Operand::Word),
        0x2A => ("LHLD".into(), Operand::Word),
        0x32 => ("STA".into(), Operand::Word),
        0x3A => ("LDA".into(), Operand::Word),
        0x03 | 0x13 | 0x23 | 0x33 => (format!("INX  {}", RP[p]), Operand::None),
        0x0B | 0x1B | 0x2B | 0x3B => (format!("DCX  {}", RP[p]), Operand::None),
        0x09 | 0x19 | 0x29 | 0x39 => (format!("DAD  {}", RP[p]), Operand::None),
        0x04 | 0x0C | 0x14 | 0x1C | 0x24 | 0x2C | 0x34 | 0x3C => {
            (format!("INR  {}", REG[y]), Operand::None)
        }
        0x05 | 0x0D | 0x15 | 0x1D | 0x25 | 0x2D | 0x35 | 0x3D => {
            (format!("DCR  {}", REG[y]), Operand::None)
        }
        0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x36 | 0x3E => {
            (format!("MVI  {},", REG[y]), Operand::Byte)
        }
        0x07 => ("RLC".into(), Operand::None),
        0x0F => ("RRC".into(), Operand::None),
        0x17 => ("RAL".into(), Operand::None),
        0x1F => ("RAR".into(), Operand::None),
        0x27 => ("DAA".into(), Operand::None),
        0x2F => ("CMA".into(), Operand::None),
        0x37 => ("STC".into(), Operand::None),
        0x3F => ("CMC".into(), Operand::None),
        0x76 => ("HLT".into(), Operand::None),
        0x40..=0x7F => (format!("MOV  {},{}", REG[y], REG[z]), Operand::None),
        0x80..=0xBF => (format!("{}  {}", ALU[y], REG[z]), Operand::None),
        0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => {
            (ALU_IMM[y].into(), Operand::Byte)
        }
        0xC0 | 0xC8 | 0xD0 | 0xD8 | 0xE0 | 0xE8 | 0xF0 | 0xF8 => {
            (format!("R{}", CC[y]), Operand::None)
        }
        0xC2 | 0xCA | 0xD2 | 0xDA | 0xE2 | 0xEA | 0xF2 | 0xFA => {
            (format!("J{}", CC[y]), Operand::Word)
        }
        0xC4 | 0xCC | 0xD4 | 0xDC | 0xE4 | 0xEC | 0xF4 | 0xFC => {
            (format!("C{}", CC[y]), Operand::Word)
        }
        0xC1 | 0xD1 | 0xE1 | 0xF1 => (format!("POP  {}", RP_PSW[p]), Operand::None),
        0xC5 | 0xD5 | 0xE5 | 0xF5 => (format!("PUSH {}", RP_PSW[p]), Operand::None),
        0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => {
            (format!("RST  {y}"), Operand::None)
        }
        0xC3 => ("JMP".into(), Operand::Word),
        0xCB if is_8080 => ("JMP".into(), Operand::Word),
        0xCB => ("RSTV".into(), Operand::None),
        0xC9 => ("RET".into(), Operand::None),
        0xD9 if is_8080 => ("RET".into(), Operand::None),
        0xD9 => ("SHLX".into(), Operand::None),
        0xCD => ("CALL".into(), Operand::Word),
        0xDD | 0xED | 0xFD if is_8080 => ("CALL".into(), Operand::Word),
        0xDD => ("JNX5".into(), Operand::Word),
        0xED => ("LHLX".into(), Operand::None),
        0xFD => ("JX5".into(), Operand::Word),
        0xD3 => ("OUT".into(), Operand::Byte),
        0xDB => ("IN".into(), Operand::Byte),
        0xE3 => ("XTHL".into(), Operand::None),
        0xE9 => ("PCHL".into(), Operand::None),
        0xEB => ("XCHG".into(), Operand::None),
        0xF3 => ("DI".into(), Operand::None),
        0xF9 => ("SPHL".into(), Operand::None),
        0xFB => ("EI".into(), Operand::None),
    };

    out.push_str(&text);
    let separator = if text.ends_with(',') {
        ""
    } else if text.len() < 5 {
        &"     "[text.len()..]
    } else {
        " "
    };
    match operand {
        Operand::None => 1,
        Operand::Byte => {
            let _ = write!(out, "{separator}${:02X}", read(pc.wrapping_add(1)));
            2
        }
        Operand::Word => {
            let lo = read(pc.wrapping_add(1));
            let hi = read(pc.wrapping_add(2));
            let _ = write!(out, "{separator}${:04X}", u16::from_le_bytes([lo, hi]));
            3
        }
    }
}
