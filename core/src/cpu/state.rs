//! CPU state snapshot types and the binary context format.
//!
//! A context blob is an 8-byte header followed by a little-endian payload:
//!
//! | offset | size | field                     |
//! |--------|------|---------------------------|
//! | 0      | 4    | magic `MQCX`              |
//! | 4      | 1    | family tag                |
//! | 5      | 1    | layout version            |
//! | 6      | 2    | payload length            |

use std::io::Read;

use crate::core::error::StateError;
use crate::cpu::CpuFamily;

pub const CONTEXT_MAGIC: [u8; 4] = *b"MQCX";
pub const CONTEXT_HEADER_LEN: usize = 8;

/// Trait for CPU types that can provide state snapshots
pub trait CpuStateTrait {
    type Snapshot;
    fn snapshot(&self) -> Self::Snapshot;
}

/// I8085 CPU state snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct I8085State {
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub sp: u16,
    pub pc: u16,
    pub ie: bool,     // Interrupt enable flip-flop
    pub halted: bool, // Idling after HLT
    pub im: u8,       // SIM mask bits (M5.5, M6.5, M7.5)
    pub pending: u8,  // Latched edges and asserted levels
}

/// Builds a context blob field by field.
pub struct ContextWriter {
    buf: Vec<u8>,
}

impl ContextWriter {
    pub fn new(family: CpuFamily, version: u8) -> Self {
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(&CONTEXT_MAGIC);
        buf.push(family.tag());
        buf.push(version);
        buf.extend_from_slice(&[0, 0]);
        Self { buf }
    }

    pub fn u8(&mut self, value: u8) -> &mut Self {
        self.buf.push(value);
        self
    }

    pub fn bool(&mut self, value: bool) -> &mut Self {
        self.u8(value as u8)
    }

    pub fn u16(&mut self, value: u16) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn u32(&mut self, value: u32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn finish(mut self) -> Vec<u8> {
        let len = (self.buf.len() - CONTEXT_HEADER_LEN) as u16;
        self.buf[6..8].copy_from_slice(&len.to_le_bytes());
        self.buf
    }
}

/// Walks the payload of a validated context blob.
///
/// Cores decode every field into locals first and only assign once
/// [`ContextReader::finish`] succeeds.
pub struct ContextReader<'a> {
    payload: &'a [u8],
    pos: usize,
}

impl<'a> ContextReader<'a> {
    /// Check the header against the expected family, version and payload
    /// size before any field is read.
    pub fn open(
        blob: &'a [u8],
        family: CpuFamily,
        version: u8,
        payload_len: usize,
    ) -> Result<Self, StateError> {
        if blob.len() < CONTEXT_HEADER_LEN || blob[0..4] != CONTEXT_MAGIC {
            return Err(StateError::BadMagic);
        }
        let found = CpuFamily::from_tag(blob[4]).ok_or(StateError::UnknownFamily(blob[4]))?;
        if found != family {
            return Err(StateError::FamilyMismatch {
                expected: family,
                found,
            });
        }
        if blob[5] != version {
            return Err(StateError::VersionMismatch {
                expected: version,
                found: blob[5],
            });
        }
        let declared = u16::from_le_bytes([blob[6], blob[7]]) as usize;
        let payload = &blob[CONTEXT_HEADER_LEN..];
        if declared != payload_len || payload.len() != payload_len {
            return Err(StateError::SizeMismatch {
                expected: payload_len,
                found: payload.len(),
            });
        }
        Ok(Self { payload, pos: 0 })
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], StateError> {
        let end = self.pos + n;
        let payload = self.payload;
        let bytes = payload
            .get(self.pos..end)
            .ok_or(StateError::SizeMismatch {
                expected: end,
                found: payload.len(),
            })?;
        self.pos = end;
        Ok(bytes)
    }

    pub fn u8(&mut self) -> Result<u8, StateError> {
        Ok(self.take(1)?[0])
    }

    pub fn bool(&mut self, field: &'static str) -> Result<bool, StateError> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(StateError::InvalidField {
                field,
                value: value as u32,
            }),
        }
    }

    pub fn u16(&mut self) -> Result<u16, StateError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn u32(&mut self) -> Result<u32, StateError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Fails unless every payload byte was consumed.
    pub fn finish(self) -> Result<(), StateError> {
        if self.pos != self.payload.len() {
            return Err(StateError::SizeMismatch {
                expected: self.pos,
                found: self.payload.len(),
            });
        }
        Ok(())
    }
}

/// Read exactly one context blob (header plus declared payload) from a stream.
pub fn read_context(reader: &mut dyn Read) -> Result<Vec<u8>, StateError> {
    let mut blob = vec![0u8; CONTEXT_HEADER_LEN];
    reader.read_exact(&mut blob)?;
    if blob[0..4] != CONTEXT_MAGIC {
        return Err(StateError::BadMagic);
    }
    let len = u16::from_le_bytes([blob[6], blob[7]]) as usize;
    blob.resize(CONTEXT_HEADER_LEN + len, 0);
    reader.read_exact(&mut blob[CONTEXT_HEADER_LEN..])?;
    Ok(blob)
}
