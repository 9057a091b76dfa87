//! Interrupt → service-loop signalling.
//!
//! Interrupt handlers never make decisions.  They only publish a marker or
//! a raw timestamp, and the service loop applies the effects:
//!
//! ```text
//! ┌──────────────────┐  AtomicBool   ┌──────────────┐
//! │ one-shot expiry  │──────────────▶│              │
//! │ line sensor ISR  │──────────────▶│  Main Loop   │
//! │ duty-poll timer  │──────────────▶│  (consumer)  │
//! │ capture edge ISR │──spsc Queue──▶│              │
//! └──────────────────┘               └──────────────┘
//! ```
//!
//! Nothing here is a process-wide singleton.  The firmware leaks one
//! [`InterruptSignals`] and one [`CaptureQueue`] at boot and hands their
//! addresses to the ISRs as callback arguments.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use heapless::spsc::{Consumer, Queue};

/// Capacity of the edge timestamp queue.
pub const CAPTURE_QUEUE_CAP: usize = 32;

/// Raw capture timestamps, ISR (producer) → service loop (consumer).
pub type CaptureQueue = Queue<u32, CAPTURE_QUEUE_CAP>;

/// Flags and counters written from interrupt context.
///
/// Every field is a single word, so no access can tear.
#[derive(Debug, Default)]
pub struct InterruptSignals {
    watchdog_expired: AtomicBool,
    line_detected: AtomicBool,
    duty_tick: AtomicBool,
    capture_overruns: AtomicU32,
}

impl InterruptSignals {
    pub const fn new() -> Self {
        Self {
            watchdog_expired: AtomicBool::new(false),
            line_detected: AtomicBool::new(false),
            duty_tick: AtomicBool::new(false),
            capture_overruns: AtomicU32::new(0),
        }
    }

    // ── Watchdog one-shot ─────────────────────────────────────

    /// ISR side: the one-shot countdown reached zero.
    pub fn raise_watchdog(&self) {
        self.watchdog_expired.store(true, Ordering::Release);
    }

    /// Discard a latched expiry.  Only valid once the countdown is stopped.
    pub fn clear_watchdog(&self) {
        self.watchdog_expired.store(false, Ordering::Release);
    }

    pub fn take_watchdog(&self) -> bool {
        self.watchdog_expired.swap(false, Ordering::AcqRel)
    }

    // ── Line sensor ───────────────────────────────────────────

    pub fn raise_line(&self) {
        self.line_detected.store(true, Ordering::Release);
    }

    pub fn clear_line(&self) {
        self.line_detected.store(false, Ordering::Release);
    }

    pub fn take_line(&self) -> bool {
        self.line_detected.swap(false, Ordering::AcqRel)
    }

    // ── Duty poll tick ────────────────────────────────────────

    pub fn raise_duty_tick(&self) {
        self.duty_tick.store(true, Ordering::Release);
    }

    pub fn take_duty_tick(&self) -> bool {
        self.duty_tick.swap(false, Ordering::AcqRel)
    }

    // ── Capture overruns ──────────────────────────────────────

    /// ISR side: an edge was dropped because the queue was full.
    pub fn note_capture_overrun(&self) {
        self.capture_overruns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn capture_overruns(&self) -> u32 {
        self.capture_overruns.load(Ordering::Relaxed)
    }
}

/// Work items the service loop pulls out of interrupt context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// The command watchdog countdown expired.
    WatchdogExpired,
    /// The line sensor fired.
    LineDetected,
    /// A beacon edge was captured at this timestamp (capture-clock ticks).
    CaptureEdge(u32),
    /// The A/D duty input is due for a poll.
    DutyPollTick,
}

/// Next pending event, highest priority first.
///
/// Watchdog expiry and line detection are safety stops and always win over
/// queued edges, which in turn win over the duty poll.
pub fn next_event(
    signals: &InterruptSignals,
    edges: &mut Consumer<'_, u32, CAPTURE_QUEUE_CAP>,
) -> Option<Event> {
    if signals.take_watchdog() {
        return Some(Event::WatchdogExpired);
    }
    if signals.take_line() {
        return Some(Event::LineDetected);
    }
    if let Some(ticks) = edges.dequeue() {
        return Some(Event::CaptureEdge(ticks));
    }
    if signals.take_duty_tick() {
        return Some(Event::DutyPollTick);
    }
    None
}

/// Drain every pending event into `handler`, in priority order.
pub fn drain_events(
    signals: &InterruptSignals,
    edges: &mut Consumer<'_, u32, CAPTURE_QUEUE_CAP>,
    mut handler: impl FnMut(Event),
) {
    while let Some(event) = next_event(signals, edges) {
        handler(event);
    }
}
