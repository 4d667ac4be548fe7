use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::bus::{Bus, CpuId, InputLine, LineEvent, LineState};
use crate::memory::bank::{BankController, BankSlot};
use crate::memory::region::{RegionId, Regions};
use crate::memory::space::AddressSpace;
use crate::system::interrupt::InterruptRouter;

/// Deferred work run by the scheduler once every other CPU has caught up
/// with the CPU that queued it.
pub type DeferredAction<S> = Box<dyn FnOnce(&mut Board<S>)>;

/// Scheduler-side control lines of one CPU.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuControl {
    /// HALT input held: the CPU is suspended, time still advances.
    pub halt: bool,
    /// RESET input held: the CPU is suspended until released.
    pub reset: bool,
    /// A reset pulse waiting to be applied before the CPU next runs.
    pub reset_pending: bool,
    /// Idling until any of its lines is asserted.
    pub spinning: bool,
}

impl CpuControl {
    pub fn is_suspended(&self) -> bool {
        self.halt || self.reset || self.spinning
    }
}

/// Requests a handler makes of the scheduler while its CPU is executing.
#[derive(Default)]
pub(crate) struct SyncRequest {
    /// End the current `execute` call at the next instruction boundary.
    pub yield_now: bool,
    /// Give up the rest of the slice.
    pub forfeit: bool,
    /// Suspend the CPU until an interrupt line is asserted.
    pub spin: bool,
    /// CPUs to bring up to the yielding CPU's local time.
    pub targets: Vec<CpuId>,
    /// Bring every other CPU up to local time.
    pub all: bool,
}

/// Frame counter that resets the machine unless kicked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watchdog {
    pub period: u32,
    pub remaining: Option<u32>,
}

impl Watchdog {
    pub fn kick(&mut self) {
        self.remaining = Some(self.period);
    }

    pub fn disarm(&mut self) {
        self.remaining = None;
    }

    /// Count one frame. True when the counter ran out.
    pub fn tick(&mut self) -> bool {
        match self.remaining {
            Some(0) | Some(1) => {
                self.remaining = None;
                true
            }
            Some(n) => {
                self.remaining = Some(n - 1);
                false
            }
            None => false,
        }
    }
}

/// Everything device handlers can reach: driver state, memory regions,
/// banks, interrupt lines and scheduler requests.
pub struct Board<S> {
    /// Driver-defined device state (latches, video registers, inputs, ...).
    pub state: S,
    pub(crate) regions: Regions,
    pub(crate) banks: BankController,
    pub(crate) interrupts: InterruptRouter,
    pub(crate) control: Vec<CpuControl>,
    pub(crate) sync: SyncRequest,
    pub(crate) deferred: Vec<DeferredAction<S>>,
    pub(crate) watchdog: Watchdog,
    pub(crate) active: Option<CpuId>,
    pub(crate) frame: u64,
}

impl<S> Board<S> {
    pub(crate) fn new(state: S, regions: Regions, banks: BankController, cpu_count: usize) -> Self {
        Self {
            state,
            regions,
            banks,
            interrupts: InterruptRouter::new(cpu_count),
            control: vec![CpuControl::default(); cpu_count],
            sync: SyncRequest::default(),
            deferred: Vec::new(),
            watchdog: Watchdog::default(),
            active: None,
            frame: 0,
        }
    }

    // --- Memory ---

    pub fn regions(&self) -> &Regions {
        &self.regions
    }

    /// Bytes of a region. Unknown ids yield an empty slice.
    pub fn region(&self, id: RegionId) -> &[u8] {
        self.regions.data(id).unwrap_or(&[])
    }

    pub fn region_mut(&mut self, id: RegionId) -> &mut [u8] {
        self.regions.data_mut(id).unwrap_or(&mut [])
    }

    /// Switch a bank. Inside a handler the change lands at the next
    /// instruction boundary; outside execution it is immediate.
    pub fn select_bank(&mut self, slot: BankSlot, index: usize) {
        if self.active.is_some() {
            self.banks.select(slot, index);
        } else {
            self.banks.select_now(slot, index);
        }
    }

    pub fn current_bank(&self, slot: BankSlot) -> usize {
        self.banks.current(slot)
    }

    // --- Interrupts ---

    pub fn interrupts(&self) -> &InterruptRouter {
        &self.interrupts
    }

    pub fn interrupts_mut(&mut self) -> &mut InterruptRouter {
        &mut self.interrupts
    }

    pub fn set_irq_line(&mut self, cpu: CpuId, line: u8, state: LineState) {
        self.interrupts.set_line(cpu, InputLine::Irq(line), state);
    }

    pub fn set_nmi_line(&mut self, cpu: CpuId, state: LineState) {
        self.interrupts.set_line(cpu, InputLine::Nmi, state);
    }

    /// Driver write to the interrupt-enable latch of the executing CPU
    /// (CPU 0 outside execution).
    pub fn interrupt_enable_w(&mut self, data: u8) {
        let cpu = self.active.unwrap_or(CpuId(0));
        self.interrupts.set_interrupt_enable(cpu, data & 1 != 0);
    }

    /// Driver write to the interrupt-vector latch of the executing CPU
    /// (CPU 0 outside execution).
    pub fn interrupt_vector_w(&mut self, data: u8) {
        let cpu = self.active.unwrap_or(CpuId(0));
        self.interrupts.set_interrupt_vector(cpu, data as u32);
    }

    // --- Scheduling ---

    /// CPU whose instruction is currently executing, if any.
    pub fn active_cpu(&self) -> Option<CpuId> {
        self.active
    }

    pub fn current_frame(&self) -> u64 {
        self.frame
    }

    /// Bring `cpu` up to the executing CPU's local time before the executing
    /// CPU continues.
    pub fn synchronize(&mut self, cpu: CpuId) {
        self.sync.yield_now = true;
        if !self.sync.targets.contains(&cpu) {
            self.sync.targets.push(cpu);
        }
    }

    /// Run `action` once every other CPU has caught up with the executing
    /// CPU. Outside execution it runs at the end of the current slice pass.
    pub fn defer(&mut self, action: impl FnOnce(&mut Board<S>) + 'static) {
        self.sync.yield_now = true;
        self.sync.all = true;
        self.deferred.push(Box::new(action));
    }

    /// Give up the rest of the executing CPU's slice.
    pub fn yield_slice(&mut self) {
        self.sync.yield_now = true;
        self.sync.forfeit = true;
    }

    /// Suspend the executing CPU until one of its interrupt lines is asserted.
    pub fn spin_until_interrupt(&mut self) {
        self.sync.yield_now = true;
        self.sync.spin = true;
    }

    // --- CPU control lines ---

    pub fn control(&self, cpu: CpuId) -> Option<&CpuControl> {
        self.control.get(cpu.0)
    }

    /// HALT input: `Assert`/`Hold` suspends the CPU, `Clear` resumes it.
    pub fn set_halt_line(&mut self, cpu: CpuId, state: LineState) {
        let Some(ctrl) = self.control.get_mut(cpu.0) else {
            warn!(%cpu, "halt line for unknown CPU ignored");
            return;
        };
        match state {
            LineState::Assert | LineState::Hold => ctrl.halt = true,
            LineState::Clear => ctrl.halt = false,
            LineState::Pulse => {}
        }
        if self.active == Some(cpu) && ctrl.halt {
            self.sync.yield_now = true;
        }
    }

    /// RESET input: `Assert`/`Hold` resets and holds the CPU, `Clear`
    /// releases it, `Pulse` resets it and lets it run on.
    pub fn set_reset_line(&mut self, cpu: CpuId, state: LineState) {
        let Some(ctrl) = self.control.get_mut(cpu.0) else {
            warn!(%cpu, "reset line for unknown CPU ignored");
            return;
        };
        match state {
            LineState::Assert | LineState::Hold => {
                ctrl.reset = true;
                ctrl.reset_pending = true;
            }
            LineState::Pulse => ctrl.reset_pending = true,
            LineState::Clear => ctrl.reset = false,
        }
        if self.active == Some(cpu) && ctrl.reset_pending {
            self.sync.yield_now = true;
        }
    }

    // --- Watchdog ---

    /// Kick the watchdog. The first kick arms it.
    pub fn watchdog_reset(&mut self) {
        if self.watchdog.remaining.is_none() {
            info!(frames = self.watchdog.period, "watchdog armed");
        }
        self.watchdog.kick();
    }

    pub fn watchdog(&self) -> &Watchdog {
        &self.watchdog
    }
}

/// Bus view of one CPU: its two address spaces plus the board.
pub(crate) struct CpuBus<'a, S> {
    pub cpu: CpuId,
    pub program: &'a mut AddressSpace<S>,
    pub io: &'a mut AddressSpace<S>,
    pub board: &'a mut Board<S>,
}

impl<S> Bus for CpuBus<'_, S> {
    fn read(&mut self, addr: u32) -> u8 {
        self.program.read(self.board, addr)
    }

    fn write(&mut self, addr: u32, data: u8) {
        self.program.write(self.board, addr, data)
    }

    fn io_read(&mut self, port: u32) -> u8 {
        self.io.read(self.board, port)
    }

    fn io_write(&mut self, port: u32, data: u8) {
        self.io.write(self.board, port, data)
    }

    fn peek(&mut self, addr: u32) -> u8 {
        self.program.peek(self.board, addr)
    }

    fn instruction_boundary(&mut self) {
        if self.board.banks.has_pending() {
            self.board.banks.commit();
        }
    }

    fn next_line_event(&mut self) -> Option<LineEvent> {
        self.board.interrupts.next_event(self.cpu)
    }

    fn acknowledge(&mut self, line: InputLine) -> Option<u32> {
        self.board.interrupts.acknowledge(self.cpu, line)
    }

    fn yield_requested(&self) -> bool {
        self.board.sync.yield_now
    }
}
