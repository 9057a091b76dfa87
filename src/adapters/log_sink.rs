//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured motion events to the
//! ESP-IDF logger (UART / USB-CDC in production).

use log::{debug, info, warn};

use crate::app::events::{AppEvent, MotionTelemetry};
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started(state) => info!("START | initial_state={:?}", state),
            AppEvent::Dispatched(op) => info!("CMD   | {} (0x{:02X})", op, op.byte()),
            AppEvent::UnknownOpcode(raw) => warn!("CMD   | unknown 0x{:02X}, ignored", raw),
            AppEvent::SentinelIgnored => debug!("CMD   | sentinel, ignored"),
            AppEvent::StateChanged { from, to } => info!("STATE | {:?} -> {:?}", from, to),
            AppEvent::WatchdogArmed { timeout_ms } => info!("WDT   | armed {} ms", timeout_ms),
            AppEvent::Stopped(cause) => info!("STOP  | {:?}", cause),
            AppEvent::ContinueAligning {
                averaged_hz,
                publications,
            } => info!("BEACON| avg={}Hz #{} keep sweeping", averaged_hz, publications),
            AppEvent::BeaconConverged { instant_hz } => info!("BEACON| converged at {}Hz", instant_hz),
            AppEvent::RunEnded => info!("RUN   | ended"),
            AppEvent::DutyScaleChanged(pct) => info!("DUTY  | scale={}%", pct),
        }
    }
}

/// One-line status report.
pub fn log_telemetry(t: &MotionTelemetry) {
    info!(
        "TELEM | state={:?} | last={:?} | wdt={} | gate={} | scale={}% | \
         beacon avg={}Hz n={} glitches={} | requests={}",
        t.state,
        t.last_opcode,
        if t.watchdog_armed { "ARMED" } else { "off" },
        if t.dispatch_gate_open { "open" } else { "CLOSED" },
        t.duty_scale,
        t.beacon_averaged_hz,
        t.beacon_samples,
        t.capture_glitches,
        t.next_requests,
    );
}

/// Decides when the next status report is due, by elapsed wall time
/// rather than loop iterations.
#[derive(Debug, Clone, Copy)]
pub struct TelemetryPacer {
    period_ms: u32,
    last_ms: u32,
}

impl TelemetryPacer {
    pub fn new(period_ms: u32, now_ms: u32) -> Self {
        Self {
            period_ms,
            last_ms: now_ms,
        }
    }

    /// `true` once per elapsed period.  Tolerates the millisecond counter
    /// wrapping.
    pub fn due(&mut self, now_ms: u32) -> bool {
        if now_ms.wrapping_sub(self.last_ms) < self.period_ms {
            return false;
        }
        self.last_ms = now_ms;
        true
    }
}
