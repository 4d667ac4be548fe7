use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use marquee_core::core::Bus;
use marquee_core::cpu::I8085;
use serde::{Deserialize, Serialize};

// --- TracingBus: flat 64KB memory and 256 ports, every access recorded ---

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BusOp {
    Read,
    Write,
    IoRead,
    IoWrite,
}

impl BusOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BusOp::Read => "read",
            BusOp::Write => "write",
            BusOp::IoRead => "in",
            BusOp::IoWrite => "out",
        }
    }
}

#[derive(Clone, Debug)]
pub struct BusCycle {
    pub addr: u16,
    pub data: u8,
    pub op: BusOp,
}

pub struct TracingBus {
    pub memory: [u8; 0x10000],
    pub cycles: Vec<BusCycle>,
    /// Values returned by successive port reads; 0xFF once empty.
    pub port_queue: VecDeque<u8>,
}

impl TracingBus {
    pub fn new() -> Self {
        Self {
            memory: [0; 0x10000],
            cycles: Vec::new(),
            port_queue: VecDeque::new(),
        }
    }

    pub fn load(&mut self, addr: u16, data: &[u8]) {
        let start = addr as usize;
        self.memory[start..start + data.len()].copy_from_slice(data);
    }

    pub fn clear_cycles(&mut self) {
        self.cycles.clear();
    }

    /// Recorded accesses in vector-file form.
    pub fn trace(&self) -> Vec<(u16, u8, String)> {
        self.cycles
            .iter()
            .map(|c| (c.addr, c.data, c.op.as_str().to_string()))
            .collect()
    }
}

impl Default for TracingBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for TracingBus {
    fn read(&mut self, addr: u32) -> u8 {
        let addr = addr as u16;
        let data = self.memory[addr as usize];
        self.cycles.push(BusCycle {
            addr,
            data,
            op: BusOp::Read,
        });
        data
    }

    fn write(&mut self, addr: u32, data: u8) {
        let addr = addr as u16;
        self.memory[addr as usize] = data;
        self.cycles.push(BusCycle {
            addr,
            data,
            op: BusOp::Write,
        });
    }

    fn io_read(&mut self, port: u32) -> u8 {
        let data = self.port_queue.pop_front().unwrap_or(0xFF);
        self.cycles.push(BusCycle {
            addr: port as u16 & 0xFF,
            data,
            op: BusOp::IoRead,
        });
        data
    }

    fn io_write(&mut self, port: u32, data: u8) {
        self.cycles.push(BusCycle {
            addr: port as u16 & 0xFF,
            data,
            op: BusOp::IoWrite,
        });
    }

    fn peek(&mut self, addr: u32) -> u8 {
        self.memory[(addr & 0xFFFF) as usize]
    }
}

// --- I8085 JSON test vector types ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct I8085TestCase {
    pub name: String,
    pub initial: I8085CpuState,
    #[serde(rename = "final")]
    pub final_state: I8085CpuState,
    /// Port read data, consumed in order.
    #[serde(default)]
    pub ports: Vec<u8>,
    pub cycles: u32,
    pub bus: Vec<(u16, u8, String)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct I8085CpuState {
    pub pc: u16,
    pub sp: u16,
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub ie: bool,
    pub ei_delay: bool,
    pub halted: bool,
    pub im: u8,
    pub sod: bool,
    pub ram: Vec<(u16, u8)>,
}

impl I8085CpuState {
    /// Registers of `cpu`; `ram` is left empty for the caller to fill.
    pub fn capture(cpu: &I8085) -> Self {
        Self {
            pc: cpu.pc,
            sp: cpu.sp,
            a: cpu.a,
            f: cpu.f,
            b: cpu.b,
            c: cpu.c,
            d: cpu.d,
            e: cpu.e,
            h: cpu.h,
            l: cpu.l,
            ie: cpu.ie,
            ei_delay: cpu.ei_delay,
            halted: cpu.halted,
            im: cpu.im,
            sod: cpu.sod,
            ram: Vec::new(),
        }
    }

    pub fn apply(&self, cpu: &mut I8085) {
        cpu.pc = self.pc;
        cpu.sp = self.sp;
        cpu.a = self.a;
        cpu.f = self.f;
        cpu.b = self.b;
        cpu.c = self.c;
        cpu.d = self.d;
        cpu.e = self.e;
        cpu.h = self.h;
        cpu.l = self.l;
        cpu.ie = self.ie;
        cpu.ei_delay = self.ei_delay;
        cpu.halted = self.halted;
        cpu.im = self.im;
        cpu.sod = self.sod;
    }
}

// --- Vector files: gzip-compressed JSON arrays ---

pub fn write_vectors(path: &Path, tests: &[I8085TestCase]) -> std::io::Result<()> {
    let file = BufWriter::new(File::create(path)?);
    let mut gz = GzEncoder::new(file, Compression::default());
    serde_json::to_writer(&mut gz, tests)?;
    gz.finish()?.flush()
}

pub fn read_vectors(path: &Path) -> std::io::Result<Vec<I8085TestCase>> {
    let mut json = String::new();
    GzDecoder::new(BufReader::new(File::open(path)?)).read_to_string(&mut json)?;
    Ok(serde_json::from_str(&json)?)
}
