//! Beacon edge capture.
//!
//! The phototransistor comparator drives a GPIO whose rising-edge ISR
//! timestamps the edge with the free-running microsecond clock and pushes
//! the raw 32-bit value into the [`CaptureQueue`](crate::events::CaptureQueue).
//! The ISR does no arithmetic and never blocks.  If the service loop
//! falls behind and the queue is full, the edge is dropped and counted.
//!
//! Periods are computed in the service loop with wrapping subtraction, so
//! the 32-bit timestamp rolling over between two edges is harmless.

use heapless::spsc::Producer;

use crate::events::{CAPTURE_QUEUE_CAP, InterruptSignals};

/// Tick rate of capture timestamps.  `esp_timer` counts microseconds.
pub const CAPTURE_CLOCK_HZ: u32 = 1_000_000;

/// Two consecutive accepted edges and the period between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSample {
    pub last_edge_ticks: u32,
    pub this_edge_ticks: u32,
    pub period_ticks: u32,
}

impl CaptureSample {
    pub fn between(last_edge_ticks: u32, this_edge_ticks: u32) -> Self {
        Self {
            last_edge_ticks,
            this_edge_ticks,
            period_ticks: this_edge_ticks.wrapping_sub(last_edge_ticks),
        }
    }

    /// Integer frequency for this period, `None` for a zero period.
    pub fn frequency_hz(&self) -> Option<u32> {
        CAPTURE_CLOCK_HZ.checked_div(self.period_ticks)
    }
}

/// Edge ISR body.  Returns `false` when the edge was dropped.
pub fn on_capture_edge(
    edges: &mut Producer<'_, u32, CAPTURE_QUEUE_CAP>,
    signals: &InterruptSignals,
    ticks: u32,
) -> bool {
    if edges.enqueue(ticks).is_ok() {
        true
    } else {
        signals.note_capture_overrun();
        false
    }
}

/// Everything the capture ISR touches, handed over as its callback argument.
pub struct CaptureIsrContext {
    edges: Producer<'static, u32, CAPTURE_QUEUE_CAP>,
    signals: &'static InterruptSignals,
}

impl CaptureIsrContext {
    pub fn new(
        edges: Producer<'static, u32, CAPTURE_QUEUE_CAP>,
        signals: &'static InterruptSignals,
    ) -> Self {
        Self { edges, signals }
    }

    pub fn edge(&mut self, ticks: u32) -> bool {
        on_capture_edge(&mut self.edges, self.signals, ticks)
    }
}

/// GPIO ISR trampoline.  `arg` is a leaked `*mut CaptureIsrContext`.
///
/// # Safety
///
/// `arg` must point to a live `CaptureIsrContext` that no other context
/// accesses.  The capture line is the only user of it.
#[cfg(target_os = "espidf")]
pub unsafe extern "C" fn capture_isr(arg: *mut core::ffi::c_void) {
    // Microseconds since boot, truncated: the period math wraps.
    let ticks = unsafe { esp_idf_svc::sys::esp_timer_get_time() } as u32;
    // SAFETY: caller contract above.
    let ctx = unsafe { &mut *(arg as *mut CaptureIsrContext) };
    ctx.edge(ticks);
}
