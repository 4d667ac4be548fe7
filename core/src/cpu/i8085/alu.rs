use super::{Flag, I8085, Variant};
use crate::core::bus::Bus;

const S: u8 = Flag::S as u8;
const Z: u8 = Flag::Z as u8;
const X5: u8 = Flag::X5 as u8;
const AC: u8 = Flag::AC as u8;
const P: u8 = Flag::P as u8;
const V: u8 = Flag::V as u8;
const CY: u8 = Flag::CY as u8;

impl I8085 {
    /// Sign, zero and even-parity flags of `value`.
    #[inline]
    pub(crate) fn szp(value: u8) -> u8 {
        let mut f = value & S;
        if value == 0 {
            f |= Z;
        }
        if value.count_ones() % 2 == 0 {
            f |= P;
        }
        f
    }

    /// 8-bit add with carry-in. Returns (result, S Z AC P V CY).
    pub(crate) fn add8(a: u8, value: u8, carry: bool) -> (u8, u8) {
        let wide = a as u16 + value as u16 + carry as u16;
        let r = wide as u8;
        let mut f = Self::szp(r);
        if wide > 0xFF {
            f |= CY;
        }
        if (a ^ value ^ r) & 0x10 != 0 {
            f |= AC;
        }
        if !(a ^ value) & (a ^ r) & 0x80 != 0 {
            f |= V;
        }
        (r, f)
    }

    /// 8-bit subtract with borrow-in. AC follows the hardware adder: it is
    /// the carry out of bit 3 of `a + !value + !borrow`.
    pub(crate) fn sub8(a: u8, value: u8, borrow: bool) -> (u8, u8) {
        let wide = (a as u16).wrapping_sub(value as u16).wrapping_sub(borrow as u16);
        let r = wide as u8;
        let mut f = Self::szp(r);
        if wide > 0xFF {
            f |= CY;
        }
        if (a ^ !value ^ r) & 0x10 != 0 {
            f |= AC;
        }
        if (a ^ value) & (a ^ r) & 0x80 != 0 {
            f |= V;
        }
        (r, f)
    }

    /// ALU group by opcode field: ADD ADC SUB SBB ANA XRA ORA CMP.
    pub(crate) fn perform_alu(&mut self, op: u8, value: u8) {
        let carry = self.flag_set(Flag::CY);
        let keep = self.f & X5;
        match op & 7 {
            0 => self.perform_add(value, false),
            1 => self.perform_add(value, carry),
            2 => self.perform_sub(value, false),
            3 => self.perform_sub(value, carry),
            4 => {
                let a = self.a;
                self.a &= value;
                let ac = match self.variant {
                    Variant::I8085 => true,
                    Variant::I8080 => (a | value) & 0x08 != 0,
                };
                self.store_flags(Self::szp(self.a) | (if ac { AC } else { 0 }) | keep);
            }
            5 => {
                self.a ^= value;
                self.store_flags(Self::szp(self.a) | keep);
            }
            6 => {
                self.a |= value;
                self.store_flags(Self::szp(self.a) | keep);
            }
            _ => {
                let (_, f) = Self::sub8(self.a, value, false);
                self.store_flags(f | keep);
            }
        }
    }

    pub(crate) fn perform_add(&mut self, value: u8, carry: bool) {
        let (r, f) = Self::add8(self.a, value, carry);
        self.a = r;
        self.store_flags(f | (self.f & X5));
    }

    pub(crate) fn perform_sub(&mut self, value: u8, borrow: bool) {
        let (r, f) = Self::sub8(self.a, value, borrow);
        self.a = r;
        self.store_flags(f | (self.f & X5));
    }

    /// INR: S Z AC P V affected, CY preserved.
    pub(crate) fn perform_inr(&mut self, value: u8) -> u8 {
        let r = value.wrapping_add(1);
        let mut f = Self::szp(r) | (self.f & (CY | X5));
        if r & 0x0F == 0 {
            f |= AC;
        }
        if r == 0x80 {
            f |= V;
        }
        self.store_flags(f);
        r
    }

    /// DCR: S Z AC P V affected, CY preserved. AC is set unless the low
    /// nibble borrowed.
    pub(crate) fn perform_dcr(&mut self, value: u8) -> u8 {
        let r = value.wrapping_sub(1);
        let mut f = Self::szp(r) | (self.f & (CY | X5));
        if r & 0x0F != 0x0F {
            f |= AC;
        }
        if r == 0x7F {
            f |= V;
        }
        self.store_flags(f);
        r
    }

    pub(crate) fn op_inr(&mut self, bus: &mut dyn Bus, r: u8) {
        let v = self.read_reg8(bus, r);
        let v = self.perform_inr(v);
        self.write_reg8(bus, r, v);
    }

    pub(crate) fn op_dcr(&mut self, bus: &mut dyn Bus, r: u8) {
        let v = self.read_reg8(bus, r);
        let v = self.perform_dcr(v);
        self.write_reg8(bus, r, v);
    }

    // --- 16-bit ---

    /// INX: no flags on the 8080; X5 reports the wrap to zero on the 8085.
    pub(crate) fn op_inx(&mut self, rp: u8) {
        let r = self.rp(rp).wrapping_add(1);
        self.set_rp(rp, r);
        if self.variant == Variant::I8085 {
            self.set_flag(Flag::X5, r == 0);
        }
    }

    /// DCX: X5 reports the wrap to 0xFFFF on the 8085.
    pub(crate) fn op_dcx(&mut self, rp: u8) {
        let r = self.rp(rp).wrapping_sub(1);
        self.set_rp(rp, r);
        if self.variant == Variant::I8085 {
            self.set_flag(Flag::X5, r == 0xFFFF);
        }
    }

    /// DAD: HL += operand, only CY affected.
    pub(crate) fn perform_dad(&mut self, operand: u16) {
        let (r, carry) = self.hl().overflowing_add(operand);
        self.set_hl(r);
        self.set_flag(Flag::CY, carry);
    }

    /// DSUB (8085 undocumented): HL -= BC as two chained byte subtractions.
    /// Flags come from the high byte; Z covers the whole word.
    pub(crate) fn perform_dsub(&mut self) {
        let (lo, f_lo) = Self::sub8(self.l, self.c, false);
        let (hi, mut f) = Self::sub8(self.h, self.b, f_lo & CY != 0);
        if lo != 0 {
            f &= !Z;
        }
        self.l = lo;
        self.h = hi;
        self.store_flags(f | (self.f & X5));
    }

    /// ARHL (8085 undocumented): arithmetic shift right of HL into CY.
    pub(crate) fn perform_arhl(&mut self) {
        let hl = self.hl();
        self.set_flag(Flag::CY, hl & 1 != 0);
        self.set_hl(((hl as i16) >> 1) as u16);
    }

    /// RDEL (8085 undocumented): rotate DE left through CY. V reports a
    /// change of bit 15.
    pub(crate) fn perform_rdel(&mut self) {
        let de = self.de();
        let r = (de << 1) | self.flag_set(Flag::CY) as u16;
        self.set_de(r);
        self.set_flag(Flag::CY, de & 0x8000 != 0);
        self.set_flag(Flag::V, (de ^ r) & 0x8000 != 0);
    }

    // --- Rotates (only CY affected) ---

    pub(crate) fn perform_rlc(&mut self) {
        self.a = self.a.rotate_left(1);
        self.set_flag(Flag::CY, self.a & 0x01 != 0);
    }

    pub(crate) fn perform_rrc(&mut self) {
        self.a = self.a.rotate_right(1);
        self.set_flag(Flag::CY, self.a & 0x80 != 0);
    }

    pub(crate) fn perform_ral(&mut self) {
        let carry = self.a & 0x80 != 0;
        self.a = (self.a << 1) | self.flag_set(Flag::CY) as u8;
        self.set_flag(Flag::CY, carry);
    }

    pub(crate) fn perform_rar(&mut self) {
        let carry = self.a & 0x01 != 0;
        self.a = (self.a >> 1) | ((self.flag_set(Flag::CY) as u8) << 7);
        self.set_flag(Flag::CY, carry);
    }

    // --- BCD ---

    /// DAA: add 0x06 when the low nibble is over 9 or AC is set, then 0x60
    /// when the value is over 0x99 or CY is set. CY is never cleared.
    pub(crate) fn perform_daa(&mut self) {
        let a = self.a;
        let mut correction = 0u8;
        let mut carry = self.flag_set(Flag::CY);
        if a & 0x0F > 0x09 || self.flag_set(Flag::AC) {
            correction |= 0x06;
        }
        if a > 0x99 || carry {
            correction |= 0x60;
            carry = true;
        }
        let r = a.wrapping_add(correction);
        let mut f = Self::szp(r) | (self.f & X5);
        if carry {
            f |= CY;
        }
        if (a & 0x0F) + (correction & 0x0F) > 0x0F {
            f |= AC;
        }
        self.a = r;
        self.store_flags(f);
    }
}
