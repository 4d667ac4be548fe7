//! Whole-machine save states: gzip-compressed JSON.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::error::StateError;
use crate::cpu::CpuFamily;
use crate::system::board::{CpuControl, Watchdog};
use crate::system::emulator::Emulator;
use crate::system::interrupt::InterruptRouter;

pub const SNAPSHOT_FORMAT: &str = "marquee-state";
pub const SNAPSHOT_VERSION: u8 = 1;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CpuSnapshot {
    pub family: CpuFamily,
    /// Opaque blob from [`crate::cpu::CpuCore::context`].
    pub context: Vec<u8>,
    pub frame_cycles: u64,
    pub total_cycles: u64,
    pub control: CpuControl,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegionSnapshot {
    pub name: String,
    pub data: Vec<u8>,
}

/// Everything needed to resume a machine at a frame boundary.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MachineSnapshot {
    pub format: String,
    pub version: u8,
    pub frame: u64,
    pub cpus: Vec<CpuSnapshot>,
    pub banks: Vec<usize>,
    pub interrupts: InterruptRouter,
    /// RAM regions only; ROM is reloaded by the driver.
    pub regions: Vec<RegionSnapshot>,
    pub watchdog: Watchdog,
    /// Driver state.
    pub device: serde_json::Value,
}

impl<S: Serialize + DeserializeOwned> Emulator<S> {
    pub fn snapshot(&self) -> Result<MachineSnapshot, StateError> {
        let cpus = self
            .cpus
            .iter()
            .zip(&self.board.control)
            .map(|(slot, control)| CpuSnapshot {
                family: slot.core.family(),
                context: slot.core.context(),
                frame_cycles: slot.frame_cycles,
                total_cycles: slot.total_cycles,
                control: *control,
            })
            .collect();
        let regions = self
            .board
            .regions
            .iter()
            .filter(|(_, r)| r.saved)
            .map(|(_, r)| RegionSnapshot {
                name: r.name.clone(),
                data: r.data.clone(),
            })
            .collect();
        Ok(MachineSnapshot {
            format: SNAPSHOT_FORMAT.to_string(),
            version: SNAPSHOT_VERSION,
            frame: self.board.frame,
            cpus,
            banks: self.board.banks.selections(),
            interrupts: self.board.interrupts.clone(),
            regions,
            watchdog: self.board.watchdog,
            device: serde_json::to_value(&self.board.state)?,
        })
    }

    /// Restore a snapshot. Every part is checked before anything changes,
    /// so a rejected snapshot leaves the machine as it was.
    pub fn restore(&mut self, snap: MachineSnapshot) -> Result<(), StateError> {
        if snap.format != SNAPSHOT_FORMAT {
            return Err(StateError::Format(snap.format));
        }
        if snap.version != SNAPSHOT_VERSION {
            return Err(StateError::VersionMismatch {
                expected: SNAPSHOT_VERSION,
                found: snap.version,
            });
        }
        if snap.cpus.len() != self.cpus.len() || snap.interrupts.cpu_count() != self.cpus.len() {
            return Err(StateError::CpuCount {
                expected: self.cpus.len(),
                found: snap.cpus.len(),
            });
        }
        for (slot, cpu) in self.cpus.iter().zip(&snap.cpus) {
            if slot.core.family() != cpu.family {
                return Err(StateError::FamilyMismatch {
                    expected: slot.core.family(),
                    found: cpu.family,
                });
            }
        }
        if snap.banks.len() != self.board.banks.len() {
            return Err(StateError::BankCount {
                expected: self.board.banks.len(),
                found: snap.banks.len(),
            });
        }
        for saved in &snap.regions {
            let Some((_, region)) = self
                .board
                .regions
                .iter()
                .find(|(_, r)| r.saved && r.name == saved.name)
            else {
                return Err(StateError::UnknownRegion(saved.name.clone()));
            };
            if region.data.len() != saved.data.len() {
                return Err(StateError::RegionSize {
                    name: saved.name.clone(),
                    expected: region.data.len(),
                    found: saved.data.len(),
                });
            }
        }
        let device: S = serde_json::from_value(snap.device)?;

        // Contexts last among the fallible steps; undo on the first refusal.
        let previous: Vec<Vec<u8>> = self.cpus.iter().map(|s| s.core.context()).collect();
        for i in 0..self.cpus.len() {
            if let Err(err) = self.cpus[i].core.set_context(&snap.cpus[i].context) {
                for (slot, blob) in self.cpus.iter_mut().zip(&previous).take(i) {
                    if slot.core.set_context(blob).is_err() {
                        warn!("could not roll back CPU context");
                    }
                }
                return Err(err);
            }
        }

        for ((slot, control), cpu) in self.cpus.iter_mut().zip(&mut self.board.control).zip(&snap.cpus) {
            slot.frame_cycles = cpu.frame_cycles;
            slot.total_cycles = cpu.total_cycles;
            *control = cpu.control;
        }
        for saved in snap.regions {
            if let Some(region) = self
                .board
                .regions
                .iter_mut()
                .find(|r| r.saved && r.name == saved.name)
            {
                region.data = saved.data;
            }
        }
        self.board.banks.restore(&snap.banks);
        self.board.interrupts = snap.interrupts;
        self.board.watchdog = snap.watchdog;
        self.board.frame = snap.frame;
        self.board.state = device;
        self.board.deferred.clear();
        Ok(())
    }

    pub fn save_state(&self, writer: &mut dyn Write) -> Result<(), StateError> {
        let snap = self.snapshot()?;
        let mut encoder = GzEncoder::new(writer, Compression::default());
        serde_json::to_writer(&mut encoder, &snap)?;
        encoder.finish()?;
        info!(frame = snap.frame, cpus = snap.cpus.len(), "state saved");
        Ok(())
    }

    pub fn load_state(&mut self, reader: &mut dyn Read) -> Result<(), StateError> {
        let snap: MachineSnapshot = serde_json::from_reader(GzDecoder::new(reader))?;
        let frame = snap.frame;
        self.restore(snap)?;
        info!(frame, "state loaded");
        Ok(())
    }
}
