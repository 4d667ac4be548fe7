use super::{Flag, I8085, Variant};
use crate::core::bus::Bus;

impl I8085 {
    // === Helpers ===

    /// Condition by opcode field: NZ Z NC C PO PE P M.
    pub(crate) fn condition(&self, cc: u8) -> bool {
        match cc & 7 {
            0 => !self.flag_set(Flag::Z),
            1 => self.flag_set(Flag::Z),
            2 => !self.flag_set(Flag::CY),
            3 => self.flag_set(Flag::CY),
            4 => !self.flag_set(Flag::P),
            5 => self.flag_set(Flag::P),
            6 => !self.flag_set(Flag::S),
            _ => self.flag_set(Flag::S),
        }
    }

    /// Extra cycles a taken Jcc costs over the table value.
    fn jump_taken_cycles(&self) -> u32 {
        match self.variant {
            Variant::I8085 => 3,
            Variant::I8080 => 0,
        }
    }

    // === Jumps ===

    /// JMP a16 (0xC3).
    pub(crate) fn op_jmp(&mut self, bus: &mut dyn Bus) {
        self.pc = self.fetch_word(bus);
    }

    /// Jcc a16. Returns the extra cycles when taken.
    pub(crate) fn op_jcc(&mut self, bus: &mut dyn Bus, cc: u8) -> u32 {
        let target = self.fetch_word(bus);
        if self.condition(cc) {
            self.pc = target;
            self.jump_taken_cycles()
        } else {
            0
        }
    }

    /// JNX5 / JX5 a16 (0xDD / 0xFD, 8085 undocumented).
    pub(crate) fn op_jx5(&mut self, bus: &mut dyn Bus, when_set: bool) -> u32 {
        let target = self.fetch_word(bus);
        if self.flag_set(Flag::X5) == when_set {
            self.pc = target;
            self.jump_taken_cycles()
        } else {
            0
        }
    }

    // === Calls ===

    /// CALL a16 (0xCD).
    pub(crate) fn op_call(&mut self, bus: &mut dyn Bus) {
        let target = self.fetch_word(bus);
        self.push(bus, self.pc);
        self.pc = target;
    }

    /// Ccc a16. 8085: 9 cycles not taken, 18 taken. 8080: 11 / 17.
    pub(crate) fn op_ccc(&mut self, bus: &mut dyn Bus, cc: u8) -> u32 {
        let target = self.fetch_word(bus);
        if !self.condition(cc) {
            return 0;
        }
        self.push(bus, self.pc);
        self.pc = target;
        match self.variant {
            Variant::I8085 => 9,
            Variant::I8080 => 6,
        }
    }

    /// RST n: call to n * 8.
    pub(crate) fn op_rst(&mut self, bus: &mut dyn Bus, vector: u8) {
        self.push(bus, self.pc);
        self.pc = vector as u16;
    }

    /// RSTV (0xCB, 8085 undocumented): RST 8 (0x40) when V is set.
    pub(crate) fn op_rstv(&mut self, bus: &mut dyn Bus) -> u32 {
        if !self.flag_set(Flag::V) {
            return 0;
        }
        self.op_rst(bus, 0x40);
        6
    }

    // === Returns ===

    /// RET (0xC9).
    pub(crate) fn op_ret(&mut self, bus: &mut dyn Bus) {
        self.pc = self.pop(bus);
    }

    /// Rcc. 6 extra cycles when taken on both chips.
    pub(crate) fn op_rcc(&mut self, bus: &mut dyn Bus, cc: u8) -> u32 {
        if !self.condition(cc) {
            return 0;
        }
        self.pc = self.pop(bus);
        6
    }

    // === Stack ===

    /// PUSH rp, where pair 3 is PSW (A and flags).
    pub(crate) fn op_push(&mut self, bus: &mut dyn Bus, rp: u8) {
        let v = match rp & 3 {
            3 => u16::from_be_bytes([self.a, self.f]),
            n => self.rp(n),
        };
        self.push(bus, v);
    }

    /// POP rp. POP PSW on the 8080 forces the fixed flag bits.
    pub(crate) fn op_pop(&mut self, bus: &mut dyn Bus, rp: u8) {
        let v = self.pop(bus);
        match rp & 3 {
            3 => {
                let [a, f] = v.to_be_bytes();
                self.a = a;
                self.store_flags(f);
            }
            n => self.set_rp(n, v),
        }
    }

    /// XTHL (0xE3): exchange HL with the word at SP.
    pub(crate) fn op_xthl(&mut self, bus: &mut dyn Bus) {
        let v = Self::read_word(bus, self.sp);
        Self::write_word(bus, self.sp, self.hl());
        self.set_hl(v);
    }
}
