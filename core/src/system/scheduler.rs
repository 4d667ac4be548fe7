//! Frame slicing arithmetic and per-frame interrupt generators.

use serde::{Deserialize, Serialize};

use crate::core::bus::CpuId;
use crate::system::board::Board;

/// One `execute` call (or idle stretch) made by the scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSlice {
    pub frame: u64,
    pub slice: u32,
    pub cpu: CpuId,
    pub requested: u32,
    pub consumed: u32,
    /// The CPU was suspended (halt, reset, spin) or gave up its slice and
    /// time advanced without executing.
    pub idle: bool,
}

/// What a per-frame generator asks the router to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterruptRequest {
    None,
    /// Pulse the NMI input.
    Nmi,
    /// Hold an IRQ line until acknowledged, optionally with a vector.
    Irq { line: u8, vector: Option<u32> },
}

/// Called `interrupts_per_frame` times a frame, spread evenly over the slices.
pub type InterruptGenerator<S> = fn(&mut Board<S>, CpuId) -> InterruptRequest;

/// Standard IRQ generator: line 0 with the driver-written vector, gated by
/// the driver's interrupt enable.
pub fn interrupt<S>(board: &mut Board<S>, cpu: CpuId) -> InterruptRequest {
    if !board.interrupts().interrupt_enable(cpu) {
        return InterruptRequest::None;
    }
    InterruptRequest::Irq {
        line: 0,
        vector: Some(board.interrupts().interrupt_vector(cpu)),
    }
}

/// NMI generator, gated by the driver's interrupt enable.
pub fn nmi_interrupt<S>(board: &mut Board<S>, cpu: CpuId) -> InterruptRequest {
    if !board.interrupts().interrupt_enable(cpu) {
        return InterruptRequest::None;
    }
    InterruptRequest::Nmi
}

pub fn ignore_interrupt<S>(_board: &mut Board<S>, _cpu: CpuId) -> InterruptRequest {
    InterruptRequest::None
}

/// Cycles per frame for a clock, rounded to nearest.
pub fn cycles_per_frame(clock_hz: u64, frames_per_second: f64) -> u64 {
    (clock_hz as f64 / frames_per_second).round() as u64
}

/// Frame-relative cycle count a CPU must reach by the end of slice
/// `end_slice - 1`. The last slice always lands exactly on `per_frame`.
#[inline]
pub fn slice_target(per_frame: u64, end_slice: u64, slices: u64) -> u64 {
    (per_frame as u128 * end_slice as u128 / slices as u128) as u64
}

/// How many generator calls fall at the end of slice `k`.
#[inline]
pub fn interrupts_due(k: u64, per_frame: u64, slices: u64) -> u64 {
    (k + 1) * per_frame / slices - k * per_frame / slices
}

/// Where CPU `to` should be when CPU `from` has run `from_cycles` of its frame.
#[inline]
pub fn local_time(from_cycles: u64, from_per_frame: u64, to_per_frame: u64) -> u64 {
    if from_per_frame == 0 {
        return 0;
    }
    (from_cycles as u128 * to_per_frame as u128 / from_per_frame as u128) as u64
}
