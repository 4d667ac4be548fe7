//! Regions, switchable banks and per-CPU address spaces.

pub mod bank;
pub mod region;
pub mod space;

pub use bank::{BankController, BankSlot};
pub use region::{MemoryRegion, RegionId, Regions};
pub use space::{Access, AddressSpace, ReadHandler, ReadTarget, WriteHandler, WriteTarget};
