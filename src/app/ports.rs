//! Port traits: the hexagonal boundary between motion logic and hardware.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ MotionService (domain)
//! ```
//!
//! Driven adapters (drivetrain, one-shot timer, interrupt gates, link,
//! event sinks) implement these traits.  The
//! [`MotionService`](super::service::MotionService) consumes them via
//! generics, so the dispatcher never touches registers directly and runs
//! unchanged against the recording mocks in `tests/`.

use super::commands::{Direction, Rotation};

// ───────────────────────────────────────────────────────────────
// Actuator port (domain → motors)
// ───────────────────────────────────────────────────────────────

/// Actuation primitives.
pub trait ActuatorPort {
    /// Drive both wheels in `direction` at `duty` percent (0–100).
    fn drive(&mut self, duty: u8, direction: Direction);

    /// Spin in place at `duty` percent.
    fn start_rotation(&mut self, rotation: Rotation, duty: u8);

    /// Zero duty and pull both direction lines low.
    ///
    /// Idempotent; called from normal flow and from the watchdog and
    /// beacon-converged safety paths.
    fn stop(&mut self);
}

// ───────────────────────────────────────────────────────────────
// One-shot countdown (domain → hardware timer)
// ───────────────────────────────────────────────────────────────

/// Hardware one-shot countdown backing the command watchdog.
///
/// Expiry is reported out-of-band (interrupt flag), never through this
/// trait.
pub trait OneShotPort {
    /// (Re)load the countdown with `timeout_ms` and start it.
    fn start_once(&mut self, timeout_ms: u32);

    /// Stop the countdown.  After this returns the hardware can no longer
    /// raise an expiry for the previous load.
    fn cancel(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Sensor interrupt gates
// ───────────────────────────────────────────────────────────────

/// Enables for the two sensor interrupts the dispatcher controls.
pub trait SensorGatePort {
    fn enable_capture(&mut self);
    fn disable_capture(&mut self);
    fn enable_line_sensor(&mut self);
    fn disable_line_sensor(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Link flow control (domain → link collaborator)
// ───────────────────────────────────────────────────────────────

/// Outbound "request next command" signal.
pub trait LinkPort {
    fn request_next(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Event sink (domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Combined hardware bound
// ───────────────────────────────────────────────────────────────

/// Everything the dispatcher drives on the robot side of the boundary.
pub trait MotionHardware: ActuatorPort + OneShotPort + SensorGatePort {}

impl<T: ActuatorPort + OneShotPort + SensorGatePort> MotionHardware for T {}
