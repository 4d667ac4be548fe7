use tracing::debug;

use crate::core::config::SpaceConfig;
use crate::core::error::ConfigError;
use crate::memory::bank::{BankController, BankSlot};
use crate::memory::region::{RegionId, Regions};
use crate::system::board::Board;

/// Device read callback. `offset` is relative to the start of the range the
/// handler was mapped at.
pub trait ReadHandler<S> {
    fn read(&mut self, board: &mut Board<S>, offset: u32) -> u8;
}

impl<S, F> ReadHandler<S> for F
where
    F: FnMut(&mut Board<S>, u32) -> u8,
{
    fn read(&mut self, board: &mut Board<S>, offset: u32) -> u8 {
        self(board, offset)
    }
}

/// Device write callback. `offset` is relative to the start of the range.
pub trait WriteHandler<S> {
    fn write(&mut self, board: &mut Board<S>, offset: u32, data: u8);
}

impl<S, F> WriteHandler<S> for F
where
    F: FnMut(&mut Board<S>, u32, u8),
{
    fn write(&mut self, board: &mut Board<S>, offset: u32, data: u8) {
        self(board, offset, data)
    }
}

/// What a read range resolves to.
pub enum ReadTarget<S> {
    /// Bytes of a region starting at `offset`.
    Memory { region: RegionId, offset: usize },
    /// The committed bank of a slot.
    Bank(BankSlot),
    Handler(Box<dyn ReadHandler<S>>),
    /// Fixed value (unconnected pull-ups, ID bytes).
    Constant(u8),
    /// Reads return the open-bus value.
    Nop,
}

/// What a write range resolves to.
pub enum WriteTarget<S> {
    Memory { region: RegionId, offset: usize },
    Bank(BankSlot),
    Handler(Box<dyn WriteHandler<S>>),
    /// Writes are discarded (ROM).
    Nop,
}

/// Which table(s) a mapping goes into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    ReadWrite,
}

struct Range<T> {
    start: u32,
    end: u32,
    target: T,
}

/// Maximal run of addresses resolved by one range.
#[derive(Clone, Copy, Debug)]
struct Segment {
    start: u32,
    end: u32,
    range: usize,
}

/// Ranges in declaration order plus a flattened, sorted segment list.
/// Where ranges overlap the one declared last wins.
struct RangeTable<T> {
    ranges: Vec<Range<T>>,
    segments: Vec<Segment>,
}

impl<T> RangeTable<T> {
    fn new() -> Self {
        Self {
            ranges: Vec::new(),
            segments: Vec::new(),
        }
    }

    fn insert(&mut self, start: u32, end: u32, target: T) {
        self.ranges.push(Range { start, end, target });
        self.rebuild();
    }

    fn rebuild(&mut self) {
        let mut cuts: Vec<u64> = Vec::with_capacity(self.ranges.len() * 2);
        for r in &self.ranges {
            cuts.push(r.start as u64);
            cuts.push(r.end as u64 + 1);
        }
        cuts.sort_unstable();
        cuts.dedup();

        self.segments.clear();
        for w in cuts.windows(2) {
            let (lo, hi) = (w[0], w[1] - 1);
            let owner = self
                .ranges
                .iter()
                .rposition(|r| r.start as u64 <= lo && hi <= r.end as u64);
            let Some(range) = owner else { continue };
            match self.segments.last_mut() {
                Some(last) if last.range == range && last.end as u64 + 1 == lo => {
                    last.end = hi as u32;
                }
                _ => self.segments.push(Segment {
                    start: lo as u32,
                    end: hi as u32,
                    range,
                }),
            }
        }
    }

    #[inline]
    fn lookup(&self, addr: u32) -> Option<usize> {
        let i = self.segments.partition_point(|s| s.end < addr);
        let seg = self.segments.get(i)?;
        (seg.start <= addr).then_some(seg.range)
    }
}

/// One CPU-visible address space (program or I/O).
pub struct AddressSpace<S> {
    name: String,
    address_bits: u8,
    mask: u32,
    config: SpaceConfig,
    reads: RangeTable<ReadTarget<S>>,
    writes: RangeTable<WriteTarget<S>>,
}

impl<S> AddressSpace<S> {
    pub fn new(name: impl Into<String>, address_bits: u8) -> Self {
        let address_bits = address_bits.clamp(1, 32);
        let mask = if address_bits == 32 {
            u32::MAX
        } else {
            (1u32 << address_bits) - 1
        };
        Self {
            name: name.into(),
            address_bits,
            mask,
            config: SpaceConfig::default(),
            reads: RangeTable::new(),
            writes: RangeTable::new(),
        }
    }

    pub fn with_config(mut self, config: SpaceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn set_config(&mut self, config: SpaceConfig) {
        self.config = config;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address_bits(&self) -> u8 {
        self.address_bits
    }

    pub fn config(&self) -> &SpaceConfig {
        &self.config
    }

    fn check_range(&self, start: u32, end: u32) -> Result<(), ConfigError> {
        if start > end {
            return Err(ConfigError::InvertedRange {
                space: self.name.clone(),
                start,
                end,
            });
        }
        if end > self.mask {
            return Err(ConfigError::RangeBeyondBus {
                space: self.name.clone(),
                start,
                end,
                bits: self.address_bits,
            });
        }
        Ok(())
    }

    // --- Mapping ---

    pub fn map_read(&mut self, start: u32, end: u32, target: ReadTarget<S>) -> Result<&mut Self, ConfigError> {
        self.check_range(start, end)?;
        self.reads.insert(start, end, target);
        Ok(self)
    }

    pub fn map_write(&mut self, start: u32, end: u32, target: WriteTarget<S>) -> Result<&mut Self, ConfigError> {
        self.check_range(start, end)?;
        self.writes.insert(start, end, target);
        Ok(self)
    }

    /// Read-only view of `region` from `offset`; writes are dropped.
    pub fn rom(&mut self, start: u32, end: u32, region: RegionId, offset: usize) -> Result<&mut Self, ConfigError> {
        self.map_read(start, end, ReadTarget::Memory { region, offset })?
            .map_write(start, end, WriteTarget::Nop)
    }

    /// Read/write view of `region` from `offset`.
    pub fn ram(&mut self, start: u32, end: u32, region: RegionId, offset: usize) -> Result<&mut Self, ConfigError> {
        self.map_read(start, end, ReadTarget::Memory { region, offset })?
            .map_write(start, end, WriteTarget::Memory { region, offset })
    }

    /// Window onto the committed bank of `slot`.
    pub fn bank(&mut self, start: u32, end: u32, slot: BankSlot, access: Access) -> Result<&mut Self, ConfigError> {
        if matches!(access, Access::Read | Access::ReadWrite) {
            self.map_read(start, end, ReadTarget::Bank(slot))?;
        }
        if matches!(access, Access::Write | Access::ReadWrite) {
            self.map_write(start, end, WriteTarget::Bank(slot))?;
        }
        Ok(self)
    }

    pub fn read_handler(
        &mut self,
        start: u32,
        end: u32,
        handler: impl FnMut(&mut Board<S>, u32) -> u8 + 'static,
    ) -> Result<&mut Self, ConfigError> {
        self.map_read(start, end, ReadTarget::Handler(Box::new(handler)))
    }

    pub fn write_handler(
        &mut self,
        start: u32,
        end: u32,
        handler: impl FnMut(&mut Board<S>, u32, u8) + 'static,
    ) -> Result<&mut Self, ConfigError> {
        self.map_write(start, end, WriteTarget::Handler(Box::new(handler)))
    }

    /// Declared read ranges in declaration order.
    pub fn read_ranges(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.reads.ranges.iter().map(|r| (r.start, r.end))
    }

    /// Declared write ranges in declaration order.
    pub fn write_ranges(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.writes.ranges.iter().map(|r| (r.start, r.end))
    }

    /// Check every memory and bank mapping against the machine's regions.
    pub fn validate(&self, regions: &Regions, banks: &BankController) -> Result<(), ConfigError> {
        let memory = self.reads.ranges.iter().filter_map(|r| match r.target {
            ReadTarget::Memory { region, offset } => Some((r.start, r.end, region, offset)),
            _ => None,
        });
        let memory = memory.chain(self.writes.ranges.iter().filter_map(|r| match r.target {
            WriteTarget::Memory { region, offset } => Some((r.start, r.end, region, offset)),
            _ => None,
        }));
        for (start, end, region, offset) in memory {
            let data = regions
                .get(region)
                .ok_or(ConfigError::UnknownRegion(region.0))?;
            let needed = offset + (end - start) as usize + 1;
            if needed > data.data.len() {
                return Err(ConfigError::RegionTooSmall {
                    space: self.name.clone(),
                    start,
                    end,
                    region: data.name.clone(),
                    needed,
                    size: data.data.len(),
                });
            }
        }

        let windows = self.reads.ranges.iter().filter_map(|r| match r.target {
            ReadTarget::Bank(slot) => Some((r.start, r.end, slot)),
            _ => None,
        });
        let windows = windows.chain(self.writes.ranges.iter().filter_map(|r| match r.target {
            WriteTarget::Bank(slot) => Some((r.start, r.end, slot)),
            _ => None,
        }));
        for (start, end, slot) in windows {
            let bank_size = banks.bank_size(slot).ok_or(ConfigError::UnknownBank(slot.0))?;
            if (end - start) as usize + 1 > bank_size {
                return Err(ConfigError::BankWindowTooLarge {
                    space: self.name.clone(),
                    start,
                    end,
                    bank_size,
                });
            }
        }
        Ok(())
    }

    // --- Dispatch ---

    pub fn read(&mut self, board: &mut Board<S>, addr: u32) -> u8 {
        let addr = addr & self.mask;
        let Some(index) = self.reads.lookup(addr) else {
            if self.config.log_unmapped {
                debug!(space = %self.name, addr = format_args!("{addr:#06x}"), "unmapped read");
            }
            return self.config.open_bus;
        };
        let open_bus = self.config.open_bus;
        let range = &mut self.reads.ranges[index];
        let offset = addr - range.start;
        match &mut range.target {
            ReadTarget::Memory { region, offset: base } => board
                .regions
                .byte(*region, *base + offset as usize)
                .unwrap_or(open_bus),
            ReadTarget::Bank(slot) => board
                .banks
                .locate(*slot, offset)
                .and_then(|(region, index)| board.regions.byte(region, index))
                .unwrap_or(open_bus),
            ReadTarget::Handler(handler) => handler.read(board, offset),
            ReadTarget::Constant(value) => *value,
            ReadTarget::Nop => open_bus,
        }
    }

    pub fn write(&mut self, board: &mut Board<S>, addr: u32, data: u8) {
        let addr = addr & self.mask;
        let Some(index) = self.writes.lookup(addr) else {
            if self.config.log_unmapped {
                debug!(
                    space = %self.name,
                    addr = format_args!("{addr:#06x}"),
                    data = format_args!("{data:#04x}"),
                    "unmapped write"
                );
            }
            return;
        };
        let range = &mut self.writes.ranges[index];
        let offset = addr - range.start;
        match &mut range.target {
            WriteTarget::Memory { region, offset: base } => {
                board.regions.set_byte(*region, *base + offset as usize, data);
            }
            WriteTarget::Bank(slot) => {
                if let Some((region, index)) = board.banks.locate(*slot, offset) {
                    board.regions.set_byte(region, index, data);
                }
            }
            WriteTarget::Handler(handler) => handler.write(board, offset, data),
            WriteTarget::Nop => {}
        }
    }

    /// Read without side effects: handlers are not called and report open bus.
    pub fn peek(&self, board: &Board<S>, addr: u32) -> u8 {
        let addr = addr & self.mask;
        let open_bus = self.config.open_bus;
        let Some(index) = self.reads.lookup(addr) else {
            return open_bus;
        };
        let range = &self.reads.ranges[index];
        let offset = addr - range.start;
        match &range.target {
            ReadTarget::Memory { region, offset: base } => board
                .regions
                .byte(*region, *base + offset as usize)
                .unwrap_or(open_bus),
            ReadTarget::Bank(slot) => board
                .banks
                .locate(*slot, offset)
                .and_then(|(region, index)| board.regions.byte(region, index))
                .unwrap_or(open_bus),
            ReadTarget::Constant(value) => *value,
            ReadTarget::Handler(_) | ReadTarget::Nop => open_bus,
        }
    }
}
