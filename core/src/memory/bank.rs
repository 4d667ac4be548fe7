use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::error::ConfigError;
use crate::memory::region::{RegionId, Regions};

/// Handle to a switchable window declared with [`BankController::add`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BankSlot(pub usize);

#[derive(Clone, Debug)]
struct Bank {
    region: RegionId,
    base: usize,
    bank_size: usize,
    count: usize,
    current: usize,
    pending: Option<usize>,
}

impl Bank {
    fn offset(&self) -> usize {
        self.base + self.current * self.bank_size
    }
}

/// Switchable windows onto regions.
///
/// A select made while a CPU executes is deferred until the next
/// instruction boundary, so an access sequence already under way keeps
/// seeing the bank it started with.
#[derive(Default)]
pub struct BankController {
    banks: Vec<Bank>,
    dirty: bool,
}

impl BankController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `count` banks of `bank_size` bytes starting at `base` in `region`.
    pub fn add(&mut self, region: RegionId, base: usize, bank_size: usize, count: usize) -> BankSlot {
        let slot = BankSlot(self.banks.len());
        self.banks.push(Bank {
            region,
            base,
            bank_size,
            count: count.max(1),
            current: 0,
            pending: None,
        });
        slot
    }

    pub fn len(&self) -> usize {
        self.banks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.banks.is_empty()
    }

    /// Check every bank fits inside its region.
    pub fn validate(&self, regions: &Regions) -> Result<(), ConfigError> {
        for (slot, bank) in self.banks.iter().enumerate() {
            let region = regions
                .get(bank.region)
                .ok_or(ConfigError::UnknownRegion(bank.region.0))?;
            let end = bank.base + bank.bank_size * bank.count;
            if bank.bank_size == 0 || end > region.data.len() {
                return Err(ConfigError::BankGeometry {
                    slot,
                    region: region.name.clone(),
                    base: bank.base,
                    bank_size: bank.bank_size,
                    count: bank.count,
                    size: region.data.len(),
                });
            }
        }
        Ok(())
    }

    pub fn bank_size(&self, slot: BankSlot) -> Option<usize> {
        self.banks.get(slot.0).map(|b| b.bank_size)
    }

    /// Index of the committed bank.
    pub fn current(&self, slot: BankSlot) -> usize {
        self.banks.get(slot.0).map_or(0, |b| b.current)
    }

    /// Request a bank change, applied at the next [`BankController::commit`].
    /// Out-of-range indices wrap modulo the bank count.
    pub fn select(&mut self, slot: BankSlot, index: usize) {
        let Some(bank) = self.banks.get_mut(slot.0) else {
            warn!(slot = slot.0, "select on unknown bank slot");
            return;
        };
        bank.pending = Some(Self::masked(slot, bank.count, index));
        self.dirty = true;
    }

    /// Change bank right away. Only safe outside CPU execution.
    pub fn select_now(&mut self, slot: BankSlot, index: usize) {
        let Some(bank) = self.banks.get_mut(slot.0) else {
            warn!(slot = slot.0, "select on unknown bank slot");
            return;
        };
        bank.current = Self::masked(slot, bank.count, index);
        bank.pending = None;
    }

    fn masked(slot: BankSlot, count: usize, index: usize) -> usize {
        if index >= count {
            warn!(slot = slot.0, index, count, "bank index out of range, wrapping");
        }
        index % count
    }

    #[inline]
    pub fn has_pending(&self) -> bool {
        self.dirty
    }

    /// Apply every deferred select.
    pub fn commit(&mut self) {
        if !self.dirty {
            return;
        }
        for (slot, bank) in self.banks.iter_mut().enumerate() {
            if let Some(index) = bank.pending.take() {
                if index != bank.current {
                    debug!(slot, from = bank.current, to = index, "bank switch");
                }
                bank.current = index;
            }
        }
        self.dirty = false;
    }

    /// Region and byte offset of `offset` within the committed bank.
    #[inline]
    pub(crate) fn locate(&self, slot: BankSlot, offset: u32) -> Option<(RegionId, usize)> {
        let bank = self.banks.get(slot.0)?;
        Some((bank.region, bank.offset() + offset as usize))
    }

    /// Committed index of every slot, for save states.
    pub fn selections(&self) -> Vec<usize> {
        self.banks.iter().map(|b| b.current).collect()
    }

    pub(crate) fn restore(&mut self, selections: &[usize]) {
        for (bank, &index) in self.banks.iter_mut().zip(selections) {
            bank.current = index % bank.count;
            bank.pending = None;
        }
        self.dirty = false;
    }
}
