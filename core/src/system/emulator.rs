use tracing::{info, trace, warn};

use crate::core::bus::{CpuId, InputLine, LineState};
use crate::core::config::MachineConfig;
use crate::core::error::{ConfigError, ScheduleError};
use crate::cpu::{CpuCore, CpuFamily};
use crate::memory::bank::{BankController, BankSlot};
use crate::memory::region::{RegionId, Regions};
use crate::memory::space::{Access, AddressSpace};
use crate::system::board::{Board, CpuBus, CpuControl, SyncRequest, Watchdog};
use crate::system::scheduler::{
    self, InterruptGenerator, InterruptRequest, ScheduleSlice, cycles_per_frame, slice_target,
};

/// Called once per frame after the last slice (video update, input latch).
pub type FrameHook<S> = Box<dyn FnMut(&mut Board<S>)>;

/// Called after every machine reset (initial bank selects, latch defaults).
pub type ResetHook<S> = Box<dyn FnMut(&mut Board<S>)>;

/// Which address space of a CPU.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpaceKind {
    Program,
    Io,
}

/// Static description of one CPU in a machine.
pub struct CpuDescriptor<S> {
    family: CpuFamily,
    core: Option<Box<dyn CpuCore>>,
    pub clock_hz: u64,
    pub program: AddressSpace<S>,
    pub io: AddressSpace<S>,
    pub interrupt: Option<InterruptGenerator<S>>,
    pub interrupts_per_frame: u32,
}

impl<S> CpuDescriptor<S> {
    /// A CPU of a built-in family. Address spaces start empty at the
    /// family's bus widths.
    pub fn new(family: CpuFamily, clock_hz: u64) -> Self {
        Self {
            family,
            core: None,
            clock_hz,
            program: AddressSpace::new("program", family.program_bits()),
            io: AddressSpace::new("io", family.io_bits().max(8)),
            interrupt: None,
            interrupts_per_frame: 0,
        }
    }

    /// A CPU driven by an externally supplied core.
    pub fn with_core(core: Box<dyn CpuCore>, clock_hz: u64) -> Self {
        let mut desc = Self::new(core.family(), clock_hz);
        desc.core = Some(core);
        desc
    }

    pub fn family(&self) -> CpuFamily {
        self.family
    }

    /// Fire `generator` `per_frame` times a frame.
    pub fn interrupt(mut self, generator: InterruptGenerator<S>, per_frame: u32) -> Self {
        self.interrupt = Some(generator);
        self.interrupts_per_frame = per_frame;
        self
    }
}

/// Collects regions, banks and CPUs, then validates them into an [`Emulator`].
pub struct EmulatorBuilder<S> {
    config: MachineConfig,
    state: S,
    regions: Regions,
    banks: BankController,
    cpus: Vec<CpuDescriptor<S>>,
    frame_hook: Option<FrameHook<S>>,
    reset_hook: Option<ResetHook<S>>,
}

impl<S> EmulatorBuilder<S> {
    pub fn new(config: MachineConfig, state: S) -> Self {
        Self {
            config,
            state,
            regions: Regions::new(),
            banks: BankController::new(),
            cpus: Vec::new(),
            frame_hook: None,
            reset_hook: None,
        }
    }

    /// Region that is saved with machine state.
    pub fn ram(&mut self, name: &str, size: usize) -> RegionId {
        self.regions.add(name, vec![0; size], true)
    }

    /// Region that is not saved with machine state.
    pub fn rom(&mut self, name: &str, data: Vec<u8>) -> RegionId {
        self.regions.add(name, data, false)
    }

    pub fn bank(&mut self, region: RegionId, base: usize, bank_size: usize, count: usize) -> BankSlot {
        self.banks.add(region, base, bank_size, count)
    }

    pub fn cpu(&mut self, desc: CpuDescriptor<S>) -> CpuId {
        self.cpus.push(desc);
        CpuId(self.cpus.len() - 1)
    }

    pub fn on_frame(&mut self, hook: impl FnMut(&mut Board<S>) + 'static) {
        self.frame_hook = Some(Box::new(hook));
    }

    pub fn on_reset(&mut self, hook: impl FnMut(&mut Board<S>) + 'static) {
        self.reset_hook = Some(Box::new(hook));
    }

    pub fn build(self) -> Result<Emulator<S>, ConfigError> {
        self.config.validate()?;
        if self.cpus.is_empty() {
            return Err(ConfigError::NoCpus);
        }
        self.banks.validate(&self.regions)?;

        let mut cpus = Vec::with_capacity(self.cpus.len());
        for (i, desc) in self.cpus.into_iter().enumerate() {
            let id = CpuId(i);
            if desc.clock_hz == 0 {
                return Err(ConfigError::ZeroClock { cpu: id });
            }
            let per_frame = cycles_per_frame(desc.clock_hz, self.config.frames_per_second);
            if per_frame == 0 {
                return Err(ConfigError::NoCyclesPerFrame {
                    cpu: id,
                    clock_hz: desc.clock_hz,
                    fps: self.config.frames_per_second,
                });
            }
            desc.program.validate(&self.regions, &self.banks)?;
            desc.io.validate(&self.regions, &self.banks)?;
            let core = match desc.core {
                Some(core) => core,
                None => desc.family.create_core()?,
            };
            cpus.push(CpuSlot {
                core,
                program: desc.program,
                io: desc.io,
                clock_hz: desc.clock_hz,
                cycles_per_frame: per_frame,
                frame_cycles: 0,
                total_cycles: 0,
                interrupt: desc.interrupt,
                interrupts_per_frame: desc.interrupts_per_frame,
            });
        }

        let board = Board::new(self.state, self.regions, self.banks, cpus.len());
        let mut emulator = Emulator {
            config: self.config,
            cpus,
            board,
            slices: Vec::new(),
            running: Vec::new(),
            current_slice: 0,
            frame_hook: self.frame_hook,
            reset_hook: self.reset_hook,
        };
        emulator.reset();
        Ok(emulator)
    }
}

pub(crate) struct CpuSlot<S> {
    pub core: Box<dyn CpuCore>,
    pub program: AddressSpace<S>,
    pub io: AddressSpace<S>,
    pub clock_hz: u64,
    pub cycles_per_frame: u64,
    /// Cycles run since the start of the frame.
    pub frame_cycles: u64,
    pub total_cycles: u64,
    pub interrupt: Option<InterruptGenerator<S>>,
    pub interrupts_per_frame: u32,
}

/// A machine: CPUs, their address spaces and the board they share, run
/// frame by frame.
///
/// Each frame is cut into `slices_per_frame` passes. In pass `k` every CPU,
/// in declaration order, runs until it reaches `k + 1` slices worth of its
/// frame budget. An instruction that overshoots a slice shortens the next
/// one, so a frame never runs more than one instruction past its budget.
pub struct Emulator<S> {
    pub(crate) config: MachineConfig,
    pub(crate) cpus: Vec<CpuSlot<S>>,
    pub(crate) board: Board<S>,
    slices: Vec<ScheduleSlice>,
    running: Vec<CpuId>,
    current_slice: u32,
    frame_hook: Option<FrameHook<S>>,
    reset_hook: Option<ResetHook<S>>,
}

impl<S> Emulator<S> {
    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn board(&self) -> &Board<S> {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut Board<S> {
        &mut self.board
    }

    pub fn state(&self) -> &S {
        &self.board.state
    }

    pub fn state_mut(&mut self) -> &mut S {
        &mut self.board.state
    }

    pub fn cpu_count(&self) -> usize {
        self.cpus.len()
    }

    pub fn cpu(&self, cpu: CpuId) -> Option<&dyn CpuCore> {
        self.cpus.get(cpu.0).map(|s| s.core.as_ref())
    }

    pub fn cpu_mut(&mut self, cpu: CpuId) -> Option<&mut (dyn CpuCore + 'static)> {
        self.cpus.get_mut(cpu.0).map(|s| s.core.as_mut())
    }

    pub fn clock_hz(&self, cpu: CpuId) -> u64 {
        self.cpus.get(cpu.0).map_or(0, |s| s.clock_hz)
    }

    pub fn cycles_per_frame(&self, cpu: CpuId) -> u64 {
        self.cpus.get(cpu.0).map_or(0, |s| s.cycles_per_frame)
    }

    /// Cycles run in the current frame.
    pub fn frame_cycles(&self, cpu: CpuId) -> u64 {
        self.cpus.get(cpu.0).map_or(0, |s| s.frame_cycles)
    }

    /// Cycles left before the CPU reaches the end of its frame budget.
    pub fn cycles_left_in_frame(&self, cpu: CpuId) -> u64 {
        self.cpus
            .get(cpu.0)
            .map_or(0, |s| s.cycles_per_frame.saturating_sub(s.frame_cycles))
    }

    /// Cycles run since the last reset.
    pub fn total_cycles(&self, cpu: CpuId) -> u64 {
        self.cpus.get(cpu.0).map_or(0, |s| s.total_cycles)
    }

    pub fn current_frame(&self) -> u64 {
        self.board.frame
    }

    /// Slices executed during the last frame (empty unless `record_slices`).
    pub fn last_slices(&self) -> &[ScheduleSlice] {
        &self.slices
    }

    // --- Runtime mapping ---

    pub fn space_mut(&mut self, cpu: CpuId, space: SpaceKind) -> Result<&mut AddressSpace<S>, ConfigError> {
        let slot = self.cpus.get_mut(cpu.0).ok_or(ConfigError::UnknownCpu(cpu))?;
        Ok(match space {
            SpaceKind::Program => &mut slot.program,
            SpaceKind::Io => &mut slot.io,
        })
    }

    /// Install (or override) a read handler. The newest mapping wins where
    /// ranges overlap.
    pub fn install_read_handler(
        &mut self,
        cpu: CpuId,
        space: SpaceKind,
        start: u32,
        end: u32,
        handler: impl FnMut(&mut Board<S>, u32) -> u8 + 'static,
    ) -> Result<(), ConfigError> {
        self.space_mut(cpu, space)?.read_handler(start, end, handler)?;
        Ok(())
    }

    pub fn install_write_handler(
        &mut self,
        cpu: CpuId,
        space: SpaceKind,
        start: u32,
        end: u32,
        handler: impl FnMut(&mut Board<S>, u32, u8) + 'static,
    ) -> Result<(), ConfigError> {
        self.space_mut(cpu, space)?.write_handler(start, end, handler)?;
        Ok(())
    }

    /// Map a bank window at runtime.
    pub fn install_bank(
        &mut self,
        cpu: CpuId,
        space: SpaceKind,
        access: Access,
        slot: BankSlot,
        start: u32,
        end: u32,
    ) -> Result<(), ConfigError> {
        let bank_size = self
            .board
            .banks
            .bank_size(slot)
            .ok_or(ConfigError::UnknownBank(slot.0))?;
        let target = self.space_mut(cpu, space)?;
        if end >= start && (end - start) as usize + 1 > bank_size {
            return Err(ConfigError::BankWindowTooLarge {
                space: target.name().to_string(),
                start,
                end,
                bank_size,
            });
        }
        target.bank(start, end, slot, access)?;
        Ok(())
    }

    /// Read through `cpu`'s view of a space from outside execution (debugger,
    /// driver init). Handlers run as for a CPU access.
    pub fn read(&mut self, cpu: CpuId, space: SpaceKind, addr: u32) -> Result<u8, ConfigError> {
        let slot = self.cpus.get_mut(cpu.0).ok_or(ConfigError::UnknownCpu(cpu))?;
        let target = match space {
            SpaceKind::Program => &mut slot.program,
            SpaceKind::Io => &mut slot.io,
        };
        Ok(target.read(&mut self.board, addr))
    }

    pub fn write(&mut self, cpu: CpuId, space: SpaceKind, addr: u32, data: u8) -> Result<(), ConfigError> {
        let slot = self.cpus.get_mut(cpu.0).ok_or(ConfigError::UnknownCpu(cpu))?;
        let target = match space {
            SpaceKind::Program => &mut slot.program,
            SpaceKind::Io => &mut slot.io,
        };
        target.write(&mut self.board, addr, data);
        Ok(())
    }

    /// Side-effect free read; handler ranges report open bus.
    pub fn peek(&self, cpu: CpuId, space: SpaceKind, addr: u32) -> Result<u8, ConfigError> {
        let slot = self.cpus.get(cpu.0).ok_or(ConfigError::UnknownCpu(cpu))?;
        let target = match space {
            SpaceKind::Program => &slot.program,
            SpaceKind::Io => &slot.io,
        };
        Ok(target.peek(&self.board, addr))
    }

    /// Switch a bank right away (driver code outside CPU execution).
    pub fn select_bank(&mut self, slot: BankSlot, index: usize) {
        self.board.banks.select_now(slot, index);
    }

    // --- Lines ---

    pub fn set_irq_line(&mut self, cpu: CpuId, line: u8, state: LineState) {
        self.board.interrupts.set_line(cpu, InputLine::Irq(line), state);
    }

    pub fn set_nmi_line(&mut self, cpu: CpuId, state: LineState) {
        self.board.interrupts.set_line(cpu, InputLine::Nmi, state);
    }

    pub fn set_halt_line(&mut self, cpu: CpuId, state: LineState) {
        self.board.set_halt_line(cpu, state);
    }

    pub fn set_reset_line(&mut self, cpu: CpuId, state: LineState) {
        self.board.set_reset_line(cpu, state);
    }

    // --- Reset ---

    /// Machine reset: every core reset, lines cleared, watchdog re-armed
    /// per config, then the reset hook.
    pub fn reset(&mut self) {
        for slot in &mut self.cpus {
            slot.core.reset();
            slot.frame_cycles = 0;
            slot.total_cycles = 0;
        }
        self.board.interrupts.reset();
        for ctrl in &mut self.board.control {
            *ctrl = CpuControl::default();
        }
        self.board.sync = SyncRequest::default();
        self.board.deferred.clear();
        self.board.banks.commit();

        let period = self.config.watchdog_period();
        self.board.watchdog = Watchdog {
            period,
            remaining: self.config.watchdog_enabled.then_some(period),
        };

        if let Some(hook) = self.reset_hook.as_mut() {
            hook(&mut self.board);
        }
        self.board.banks.commit();
        info!(cpus = self.cpus.len(), "machine reset");
    }

    // --- Execution ---

    /// Run one CPU directly for `cycles`, outside the frame loop (debugger
    /// stepping, tests). Sync requests made meanwhile are dropped, deferred
    /// actions run afterwards.
    pub fn execute_cpu(&mut self, cpu: CpuId, cycles: u32) -> Result<u32, ScheduleError> {
        if cpu.0 >= self.cpus.len() || cycles == 0 {
            return Ok(0);
        }
        let consumed = self.execute_slice(cpu, cycles);
        if consumed == 0 {
            return Err(ScheduleError::Stalled {
                cpu,
                requested: cycles,
            });
        }
        self.cpus[cpu.0].total_cycles += consumed as u64;
        self.board.sync = SyncRequest::default();
        self.run_deferred();
        Ok(consumed)
    }

    /// Run `n` frames, stopping at the first scheduling error.
    pub fn run_frames(&mut self, n: u64) -> Result<(), ScheduleError> {
        for _ in 0..n {
            self.run_frame()?;
        }
        Ok(())
    }

    /// Run one video frame.
    pub fn run_frame(&mut self) -> Result<(), ScheduleError> {
        self.slices.clear();
        // Overshoot is carried between slices of a frame, never across frames.
        for slot in &mut self.cpus {
            slot.frame_cycles = 0;
        }
        // Work queued outside execution (frame hook, driver code) runs first.
        self.run_deferred();
        self.board.sync = SyncRequest::default();

        for k in 0..self.config.slices_per_frame {
            self.current_slice = k;
            for i in 0..self.cpus.len() {
                let cpu = CpuId(i);
                let target = self.slice_target(cpu, k);
                self.run_cpu_until(cpu, target)?;
            }
            self.run_deferred();
            self.fire_interrupts(k);
        }
        self.end_frame();
        Ok(())
    }

    fn slice_target(&self, cpu: CpuId, k: u32) -> u64 {
        slice_target(
            self.cpus[cpu.0].cycles_per_frame,
            k as u64 + 1,
            self.config.slices_per_frame as u64,
        )
    }

    fn run_cpu_until(&mut self, cpu: CpuId, target: u64) -> Result<(), ScheduleError> {
        self.running.push(cpu);
        let result = self.run_cpu_inner(cpu, target);
        self.running.pop();
        result
    }

    fn run_cpu_inner(&mut self, cpu: CpuId, target: u64) -> Result<(), ScheduleError> {
        loop {
            self.apply_control(cpu);
            let done = self.cpus[cpu.0].frame_cycles;
            if done >= target {
                return Ok(());
            }
            let budget = u32::try_from(target - done).unwrap_or(u32::MAX);
            if self.board.control[cpu.0].is_suspended() {
                self.advance_idle(cpu, budget);
                return Ok(());
            }

            let consumed = self.execute_slice(cpu, budget);
            if consumed == 0 {
                return Err(ScheduleError::Stalled {
                    cpu,
                    requested: budget,
                });
            }
            let slot = &mut self.cpus[cpu.0];
            slot.frame_cycles += consumed as u64;
            slot.total_cycles += consumed as u64;
            self.record(cpu, budget, consumed, false);
            trace!(%cpu, slice = self.current_slice, budget, consumed, "slice");

            let request = std::mem::take(&mut self.board.sync);
            if request.spin {
                self.board.control[cpu.0].spinning = true;
                // Only assertions from now on wake it.
                self.board.interrupts.take_wake(cpu);
            }
            self.catch_up(cpu, &request)?;
            if request.forfeit {
                let done = self.cpus[cpu.0].frame_cycles;
                if done < target {
                    let rest = u32::try_from(target - done).unwrap_or(u32::MAX);
                    self.advance_idle(cpu, rest);
                }
                return Ok(());
            }
        }
    }

    fn execute_slice(&mut self, cpu: CpuId, budget: u32) -> u32 {
        self.board.active = Some(cpu);
        let slot = &mut self.cpus[cpu.0];
        let mut bus = CpuBus {
            cpu,
            program: &mut slot.program,
            io: &mut slot.io,
            board: &mut self.board,
        };
        let consumed = slot.core.execute(&mut bus, budget);
        // The last instruction of the slice has completed.
        self.board.banks.commit();
        self.board.active = None;
        consumed
    }

    /// Bring the CPUs named in `request` up to `cpu`'s local time, then run
    /// deferred actions.
    fn catch_up(&mut self, cpu: CpuId, request: &SyncRequest) -> Result<(), ScheduleError> {
        let targets: Vec<CpuId> = if request.all {
            (0..self.cpus.len()).map(CpuId).collect()
        } else {
            request.targets.clone()
        };
        for other in targets {
            if other == cpu || other.0 >= self.cpus.len() || self.running.contains(&other) {
                continue;
            }
            let local = scheduler::local_time(
                self.cpus[cpu.0].frame_cycles,
                self.cpus[cpu.0].cycles_per_frame,
                self.cpus[other.0].cycles_per_frame,
            )
            .min(self.slice_target(other, self.current_slice));
            self.run_cpu_until(other, local)?;
        }
        if self.running.len() == 1 {
            self.run_deferred();
        }
        Ok(())
    }

    fn run_deferred(&mut self) {
        while !self.board.deferred.is_empty() {
            let actions = std::mem::take(&mut self.board.deferred);
            for action in actions {
                action(&mut self.board);
            }
        }
    }

    fn advance_idle(&mut self, cpu: CpuId, cycles: u32) {
        let slot = &mut self.cpus[cpu.0];
        slot.frame_cycles += cycles as u64;
        slot.total_cycles += cycles as u64;
        self.record(cpu, cycles, cycles, true);
    }

    fn record(&mut self, cpu: CpuId, requested: u32, consumed: u32, idle: bool) {
        if self.config.record_slices {
            self.slices.push(ScheduleSlice {
                frame: self.board.frame,
                slice: self.current_slice,
                cpu,
                requested,
                consumed,
                idle,
            });
        }
    }

    /// Apply reset pulses and end spin-until-interrupt before `cpu` runs.
    fn apply_control(&mut self, cpu: CpuId) {
        let ctrl = &mut self.board.control[cpu.0];
        if ctrl.reset_pending {
            ctrl.reset_pending = false;
            self.cpus[cpu.0].core.reset();
            info!(%cpu, "CPU reset");
        }
        let ctrl = &mut self.board.control[cpu.0];
        if ctrl.spinning && self.board.interrupts.take_wake(cpu) {
            ctrl.spinning = false;
        }
    }

    fn fire_interrupts(&mut self, k: u32) {
        let slices = self.config.slices_per_frame as u64;
        for i in 0..self.cpus.len() {
            let Some(generator) = self.cpus[i].interrupt else {
                continue;
            };
            let per_frame = self.cpus[i].interrupts_per_frame as u64;
            let cpu = CpuId(i);
            for _ in 0..scheduler::interrupts_due(k as u64, per_frame, slices) {
                let ctrl = self.board.control[i];
                if ctrl.halt || ctrl.reset {
                    continue;
                }
                match generator(&mut self.board, cpu) {
                    InterruptRequest::None => {}
                    InterruptRequest::Nmi => {
                        self.board.interrupts.set_line(cpu, InputLine::Nmi, LineState::Pulse);
                    }
                    InterruptRequest::Irq { line, vector } => {
                        if let Some(vector) = vector {
                            self.board.interrupts.set_line_vector(cpu, line, vector);
                        }
                        self.board
                            .interrupts
                            .set_line(cpu, InputLine::Irq(line), LineState::Hold);
                    }
                }
            }
        }
    }

    fn end_frame(&mut self) {
        if let Some(hook) = self.frame_hook.as_mut() {
            hook(&mut self.board);
        }
        self.run_deferred();
        if self.board.watchdog.tick() {
            warn!(frame = self.board.frame, "watchdog expired, resetting machine");
            self.reset();
        }
        self.board.frame += 1;
    }
}
