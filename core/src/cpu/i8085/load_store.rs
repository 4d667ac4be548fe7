use super::I8085;
use crate::core::bus::Bus;

impl I8085 {
    // --- Register moves ---

    /// MOV dst,src (0x40-0x7F except 0x76). Either side may be M.
    pub(crate) fn op_mov(&mut self, bus: &mut dyn Bus, dst: u8, src: u8) {
        let v = self.read_reg8(bus, src);
        self.write_reg8(bus, dst, v);
    }

    /// MVI r,d8.
    pub(crate) fn op_mvi(&mut self, bus: &mut dyn Bus, r: u8) {
        let v = self.fetch_byte(bus);
        self.write_reg8(bus, r, v);
    }

    /// LXI rp,d16.
    pub(crate) fn op_lxi(&mut self, bus: &mut dyn Bus, rp: u8) {
        let v = self.fetch_word(bus);
        self.set_rp(rp, v);
    }

    /// XCHG (0xEB): swap DE and HL.
    pub(crate) fn op_xchg(&mut self) {
        std::mem::swap(&mut self.d, &mut self.h);
        std::mem::swap(&mut self.e, &mut self.l);
    }

    // --- Accumulator indirect / direct ---

    /// STAX B / STAX D.
    pub(crate) fn op_stax(&mut self, bus: &mut dyn Bus, rp: u8) {
        bus.write(self.rp(rp & 1) as u32, self.a);
    }

    /// LDAX B / LDAX D.
    pub(crate) fn op_ldax(&mut self, bus: &mut dyn Bus, rp: u8) {
        self.a = bus.read(self.rp(rp & 1) as u32);
    }

    /// STA a16 (0x32).
    pub(crate) fn op_sta(&mut self, bus: &mut dyn Bus) {
        let addr = self.fetch_word(bus);
        bus.write(addr as u32, self.a);
    }

    /// LDA a16 (0x3A).
    pub(crate) fn op_lda(&mut self, bus: &mut dyn Bus) {
        let addr = self.fetch_word(bus);
        self.a = bus.read(addr as u32);
    }

    // --- HL direct ---

    /// SHLD a16 (0x22): L to a16, H to a16+1.
    pub(crate) fn op_shld(&mut self, bus: &mut dyn Bus) {
        let addr = self.fetch_word(bus);
        Self::write_word(bus, addr, self.hl());
    }

    /// LHLD a16 (0x2A).
    pub(crate) fn op_lhld(&mut self, bus: &mut dyn Bus) {
        let addr = self.fetch_word(bus);
        let v = Self::read_word(bus, addr);
        self.set_hl(v);
    }

    // --- 8085 undocumented DE addressing ---

    /// SHLX (0xD9): store HL at (DE).
    pub(crate) fn op_shlx(&mut self, bus: &mut dyn Bus) {
        Self::write_word(bus, self.de(), self.hl());
    }

    /// LHLX (0xED): load HL from (DE).
    pub(crate) fn op_lhlx(&mut self, bus: &mut dyn Bus) {
        let v = Self::read_word(bus, self.de());
        self.set_hl(v);
    }

    /// LDHI d8 (0x28): DE = HL + d8.
    pub(crate) fn op_ldhi(&mut self, bus: &mut dyn Bus) {
        let offset = self.fetch_byte(bus) as u16;
        self.set_de(self.hl().wrapping_add(offset));
    }

    /// LDSI d8 (0x38): DE = SP + d8.
    pub(crate) fn op_ldsi(&mut self, bus: &mut dyn Bus) {
        let offset = self.fetch_byte(bus) as u16;
        self.set_de(self.sp.wrapping_add(offset));
    }

    // --- Port I/O ---

    /// OUT d8 (0xD3).
    pub(crate) fn op_out(&mut self, bus: &mut dyn Bus) {
        let port = self.fetch_byte(bus);
        bus.io_write(port as u32, self.a);
    }

    /// IN d8 (0xDB).
    pub(crate) fn op_in(&mut self, bus: &mut dyn Bus) {
        let port = self.fetch_byte(bus);
        self.a = bus.io_read(port as u32);
    }
}
