//! Routes interrupt line changes from devices to CPU cores.
//!
//! Devices never touch a core directly. A line change is recorded here and
//! queued; the target core drains its queue at its next instruction
//! boundary, even when the change was made by a handler running on that
//! same CPU.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::bus::{CpuId, InputLine, LineEvent, LineState};

/// IRQ inputs tracked per CPU.
pub const MAX_IRQ_LINES: usize = 8;

/// Interrupt vector used until a driver writes one: RST 7 / `0xFF`.
pub const DEFAULT_VECTOR: u32 = 0xFF;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct LineSlot {
    state: LineState,
    vector: u32,
}

impl Default for LineSlot {
    fn default() -> Self {
        Self {
            state: LineState::Clear,
            vector: DEFAULT_VECTOR,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct CpuLines {
    nmi: LineState,
    irq: [LineSlot; MAX_IRQ_LINES],
    /// Driver-controlled gate for the per-frame interrupt generator.
    enabled: bool,
    /// Vector the per-frame generator supplies.
    vector: u32,
    queue: VecDeque<LineEvent>,
    /// Set when a line is asserted, consumed by the scheduler to end
    /// spin-until-interrupt.
    wake: bool,
}

impl Default for CpuLines {
    fn default() -> Self {
        Self {
            nmi: LineState::Clear,
            irq: [LineSlot::default(); MAX_IRQ_LINES],
            enabled: true,
            vector: DEFAULT_VECTOR,
            queue: VecDeque::new(),
            wake: false,
        }
    }
}

/// Per-CPU line states, vectors and delivery queues.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InterruptRouter {
    cpus: Vec<CpuLines>,
}

impl InterruptRouter {
    pub fn new(cpu_count: usize) -> Self {
        Self {
            cpus: vec![CpuLines::default(); cpu_count],
        }
    }

    pub fn cpu_count(&self) -> usize {
        self.cpus.len()
    }

    /// Back to power-on state: all lines clear, generators enabled.
    pub fn reset(&mut self) {
        let count = self.cpus.len();
        self.cpus = vec![CpuLines::default(); count];
    }

    fn lines_mut(&mut self, cpu: CpuId) -> Option<&mut CpuLines> {
        let lines = self.cpus.get_mut(cpu.0);
        if lines.is_none() {
            warn!(%cpu, "interrupt for unknown CPU ignored");
        }
        lines
    }

    /// Drive `line` of `cpu`. Delivery happens at the CPU's next instruction
    /// boundary.
    pub fn set_line(&mut self, cpu: CpuId, line: InputLine, state: LineState) {
        let Some(lines) = self.lines_mut(cpu) else { return };
        // A pulse leaves nothing asserted once delivered.
        let recorded = match state {
            LineState::Pulse => LineState::Clear,
            other => other,
        };
        match line {
            InputLine::Nmi => lines.nmi = recorded,
            InputLine::Irq(n) => match lines.irq.get_mut(n as usize) {
                Some(slot) => slot.state = recorded,
                None => {
                    warn!(%cpu, line = n, "IRQ line out of range ignored");
                    return;
                }
            },
        }
        if state.is_active() {
            lines.wake = true;
        }
        lines.queue.push_back(LineEvent { line, state });
        debug!(%cpu, ?line, ?state, "interrupt line");
    }

    /// Assert `line`, optionally latching the vector its device will supply.
    pub fn assert_line(&mut self, cpu: CpuId, line: InputLine, vector: Option<u32>) {
        if let (Some(vector), InputLine::Irq(n)) = (vector, line) {
            self.set_line_vector(cpu, n, vector);
        }
        self.set_line(cpu, line, LineState::Assert);
    }

    pub fn clear_line(&mut self, cpu: CpuId, line: InputLine) {
        self.set_line(cpu, line, LineState::Clear);
    }

    pub fn set_line_vector(&mut self, cpu: CpuId, line: u8, vector: u32) {
        let Some(lines) = self.lines_mut(cpu) else { return };
        match lines.irq.get_mut(line as usize) {
            Some(slot) => slot.vector = vector,
            None => warn!(%cpu, line, "IRQ line out of range ignored"),
        }
    }

    pub fn line_state(&self, cpu: CpuId, line: InputLine) -> LineState {
        let Some(lines) = self.cpus.get(cpu.0) else {
            return LineState::Clear;
        };
        match line {
            InputLine::Nmi => lines.nmi,
            InputLine::Irq(n) => lines.irq.get(n as usize).map_or(LineState::Clear, |s| s.state),
        }
    }

    pub fn line_vector(&self, cpu: CpuId, line: u8) -> u32 {
        self.cpus
            .get(cpu.0)
            .and_then(|l| l.irq.get(line as usize))
            .map_or(DEFAULT_VECTOR, |s| s.vector)
    }

    /// Gate the per-frame interrupt generator. Disabling also drops any
    /// asserted line.
    pub fn set_interrupt_enable(&mut self, cpu: CpuId, enabled: bool) {
        let Some(lines) = self.lines_mut(cpu) else { return };
        lines.enabled = enabled;
        if !enabled {
            self.clear_pending(cpu);
        }
    }

    pub fn interrupt_enable(&self, cpu: CpuId) -> bool {
        self.cpus.get(cpu.0).is_some_and(|l| l.enabled)
    }

    /// Change the generator's vector. A change drops any asserted line so a
    /// stale vector is never delivered.
    pub fn set_interrupt_vector(&mut self, cpu: CpuId, vector: u32) {
        let Some(lines) = self.lines_mut(cpu) else { return };
        if lines.vector != vector {
            lines.vector = vector;
            self.clear_pending(cpu);
        }
    }

    pub fn interrupt_vector(&self, cpu: CpuId) -> u32 {
        self.cpus.get(cpu.0).map_or(DEFAULT_VECTOR, |l| l.vector)
    }

    /// Clear every asserted line of `cpu`.
    pub fn clear_pending(&mut self, cpu: CpuId) {
        let Some(lines) = self.cpus.get(cpu.0) else { return };
        let mut active: Vec<InputLine> = Vec::new();
        if lines.nmi.is_active() {
            active.push(InputLine::Nmi);
        }
        for (n, slot) in lines.irq.iter().enumerate() {
            if slot.state.is_active() {
                active.push(InputLine::Irq(n as u8));
            }
        }
        for line in active {
            self.clear_line(cpu, line);
        }
    }

    /// Oldest undelivered line change for `cpu`.
    pub(crate) fn next_event(&mut self, cpu: CpuId) -> Option<LineEvent> {
        self.cpus.get_mut(cpu.0)?.queue.pop_front()
    }

    /// Acknowledge cycle: a `Hold` line is released and the line's vector
    /// returned.
    pub(crate) fn acknowledge(&mut self, cpu: CpuId, line: InputLine) -> Option<u32> {
        let held = self.line_state(cpu, line) == LineState::Hold;
        if held {
            self.clear_line(cpu, line);
        }
        match line {
            InputLine::Nmi => None,
            InputLine::Irq(n) => Some(self.line_vector(cpu, n)),
        }
    }

    pub(crate) fn take_wake(&mut self, cpu: CpuId) -> bool {
        self.cpus
            .get_mut(cpu.0)
            .is_some_and(|l| std::mem::take(&mut l.wake))
    }
}
