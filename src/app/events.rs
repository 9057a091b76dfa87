//! Outbound application events.
//!
//! The [`MotionService`](super::service::MotionService) emits these through
//! the [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them (serial log, link status byte, test
//! recorder).

use super::commands::Opcode;
use super::service::MotionState;

/// Why a motion ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCause {
    /// Explicit Stop / EndRun, or superseded by a new command.
    Commanded,
    /// Watchdog countdown expired.
    WatchdogFired,
    /// Beacon frequency fell inside the tolerance band.
    BeaconConverged,
    /// Line sensor fired during DriveToLine.
    LineReached,
}

/// Structured events emitted by the motion core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEvent {
    /// The service has started (carries the initial state).
    Started(MotionState),

    /// A command was dispatched.
    Dispatched(Opcode),

    /// An unrecognised opcode byte was ignored.
    UnknownOpcode(u8),

    /// The idle/sentinel byte was discarded.
    SentinelIgnored,

    /// The motion state machine moved.
    StateChanged { from: MotionState, to: MotionState },

    /// The watchdog was armed for the command in flight.
    WatchdogArmed { timeout_ms: u32 },

    /// Motion stopped.
    Stopped(StopCause),

    /// Alignment step published an average and will keep sweeping.
    ContinueAligning { averaged_hz: u32, publications: u32 },

    /// Beacon found in band.
    BeaconConverged { instant_hz: u32 },

    /// EndRun received; no further command requests will be sent.
    RunEnded,

    /// The A/D scaling value changed.
    DutyScaleChanged(u8),
}

/// A point-in-time telemetry snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionTelemetry {
    pub state: MotionState,
    pub last_opcode: Option<Opcode>,
    pub watchdog_armed: bool,
    pub dispatch_gate_open: bool,
    pub duty_scale: u8,
    pub beacon_averaged_hz: u32,
    pub beacon_samples: u32,
    pub capture_glitches: u32,
    pub next_requests: u32,
}
