//! Motion service: the hexagonal core.
//!
//! [`MotionService`] is the command dispatcher.  It owns the motion state
//! machine, the dispatch gate, the command watchdog and the beacon
//! detector.  All I/O flows through port traits injected at call sites, so
//! the whole service runs against mock adapters in tests.
//!
//! ```text
//!  command byte ──▶ ┌─────────────────────────────┐ ──▶ ActuatorPort
//!  interrupts   ──▶ │        MotionService        │ ──▶ OneShotPort
//!                   │ dispatch · watchdog · beacon│ ──▶ SensorGatePort
//!                   └─────────────────────────────┘ ──▶ LinkPort / EventSink
//! ```
//!
//! ## Flow control
//!
//! Every dispatch of a real or unknown opcode ends with exactly one
//! `request_next()` once its side effects are applied, unless EndRun has
//! closed the [`DispatchGate`].  The sentinel byte produces nothing.
//!
//! ## Exclusivity
//!
//! The robot has one motor system, so a new command always supersedes the
//! motion in flight: the watchdog is cancelled and both sensor interrupts
//! are masked before the new primitive starts.

use heapless::Deque;
use heapless::spsc::Consumer;
use log::{debug, info, warn};

use crate::config::{CommandTable, MotionConfig, Primitive};
use crate::drivers::watchdog::CommandWatchdog;
use crate::error::ConfigError;
use crate::events::{self, CAPTURE_QUEUE_CAP, Event, InterruptSignals};
use crate::sensors::beacon::{BeaconDetector, DetectorVerdict, SharedEstimate};
use crate::sensors::duty_input::DutyInput;

use super::commands::{Decoded, Direction, Opcode, Rotation, decode};
use super::events::{AppEvent, MotionTelemetry, StopCause};
use super::ports::{EventSink, LinkPort, MotionHardware};

/// Depth of the internal self-event queue.
const SELF_EVENT_CAP: usize = 4;

// ───────────────────────────────────────────────────────────────
// State
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionState {
    /// Nothing moving.
    Idle,
    /// A rotation or drive is in progress.
    Executing,
    /// Sweeping toward the beacon.
    Converging,
}

/// Flow-control gate.  Closed only by EndRun, reopened by [`MotionService::reset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchGate {
    post_next_enabled: bool,
}

impl DispatchGate {
    pub const fn open() -> Self {
        Self {
            post_next_enabled: true,
        }
    }

    pub fn is_open(&self) -> bool {
        self.post_next_enabled
    }

    fn close(&mut self) {
        self.post_next_enabled = false;
    }
}

/// The primitive currently driving the wheels, with its unscaled duty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActiveMotion {
    None,
    Rotate { rotation: Rotation, duty: u8 },
    Drive { direction: Direction, duty: u8 },
    Align,
    LineSeek { duty: u8 },
}

/// Work the service posts to itself, run after interrupt events drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SelfEvent {
    ContinueAlign,
}

// ───────────────────────────────────────────────────────────────
// MotionService
// ───────────────────────────────────────────────────────────────

pub struct MotionService {
    config: MotionConfig,
    table: CommandTable,
    state: MotionState,
    gate: DispatchGate,
    active: ActiveMotion,
    watchdog: CommandWatchdog,
    detector: BeaconDetector,
    self_events: Deque<SelfEvent, SELF_EVENT_CAP>,
    /// A/D scaling, percent applied to every commanded duty.
    duty_scale: u8,
    last_opcode: Option<Opcode>,
    next_requests: u32,
    estimate_out: Option<&'static SharedEstimate>,
}

impl MotionService {
    /// Construct the service from a validated config.  Nothing is driven
    /// until the first command.
    pub fn new(config: MotionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let table = CommandTable::new(&config);
        let detector = BeaconDetector::new(&config);
        Ok(Self {
            config,
            table,
            state: MotionState::Idle,
            gate: DispatchGate::open(),
            active: ActiveMotion::None,
            watchdog: CommandWatchdog::new(),
            detector,
            self_events: Deque::new(),
            duty_scale: 100,
            last_opcode: None,
            next_requests: 0,
            estimate_out: None,
        })
    }

    /// Publish the beacon estimate here after every accepted edge.
    pub fn attach_estimate(&mut self, shared: &'static SharedEstimate) {
        self.estimate_out = Some(shared);
    }

    // ── Lifecycle ─────────────────────────────────────────────

    pub fn start(&mut self, sink: &mut impl EventSink) {
        sink.emit(&AppEvent::Started(self.state));
        info!("MotionService started in {:?}", self.state);
    }

    /// Reinitialise the dispatcher: stop, disarm everything and reopen
    /// the dispatch gate.
    pub fn reset(&mut self, hw: &mut impl MotionHardware, sink: &mut impl EventSink) {
        self.end_motion(hw);
        hw.stop();
        self.self_events.clear();
        self.gate = DispatchGate::open();
        self.last_opcode = None;
        self.set_state(MotionState::Idle, sink);
        info!("MotionService reset, dispatch gate open");
    }

    // ── Command intake ────────────────────────────────────────

    /// Handle one raw byte from the link.
    pub fn dispatch_byte(
        &mut self,
        byte: u8,
        hw: &mut impl MotionHardware,
        link: &mut impl LinkPort,
        sink: &mut impl EventSink,
    ) {
        match decode(byte) {
            Decoded::Command(op) => self.dispatch(op, hw, link, sink),
            Decoded::Sentinel => {
                debug!("dispatch: sentinel 0x{:02X} ignored", byte);
                sink.emit(&AppEvent::SentinelIgnored);
            }
            Decoded::Unknown(raw) => {
                warn!("dispatch: unknown opcode 0x{:02X}", raw);
                sink.emit(&AppEvent::UnknownOpcode(raw));
                self.request_next(link);
            }
        }
    }

    /// Execute one command.
    pub fn dispatch(
        &mut self,
        op: Opcode,
        hw: &mut impl MotionHardware,
        link: &mut impl LinkPort,
        sink: &mut impl EventSink,
    ) {
        info!("dispatch: {}", op);
        self.end_motion(hw);
        self.last_opcode = Some(op);
        sink.emit(&AppEvent::Dispatched(op));

        let spec = self.table.lookup(op);
        if let Some(timeout_ms) = spec.watchdog_ms {
            self.watchdog.arm(hw, timeout_ms);
            sink.emit(&AppEvent::WatchdogArmed { timeout_ms });
        }

        match spec.primitive {
            Primitive::Stop => {
                hw.stop();
                self.set_state(MotionState::Idle, sink);
                sink.emit(&AppEvent::Stopped(StopCause::Commanded));
            }
            Primitive::EndRun => {
                hw.stop();
                self.gate.close();
                self.set_state(MotionState::Idle, sink);
                sink.emit(&AppEvent::Stopped(StopCause::Commanded));
                sink.emit(&AppEvent::RunEnded);
                info!("dispatch: run ended, no further command requests");
            }
            Primitive::Rotate { rotation, duty } => {
                self.active = ActiveMotion::Rotate { rotation, duty };
                hw.start_rotation(rotation, self.scaled(duty));
                self.set_state(MotionState::Executing, sink);
            }
            Primitive::Drive { direction, duty } => {
                self.active = ActiveMotion::Drive { direction, duty };
                hw.drive(self.scaled(duty), direction);
                self.set_state(MotionState::Executing, sink);
            }
            Primitive::AlignToBeacon => {
                self.active = ActiveMotion::Align;
                self.rotate_toward_beacon(hw);
                self.detector.start();
                self.publish_estimate();
                hw.enable_capture();
                self.set_state(MotionState::Converging, sink);
            }
            Primitive::DriveToLine { duty } => {
                self.active = ActiveMotion::LineSeek { duty };
                hw.enable_line_sensor();
                hw.drive(self.scaled(duty), Direction::Forward);
                self.set_state(MotionState::Executing, sink);
            }
        }

        self.request_next(link);
    }

    // ── Interrupt-driven completions ──────────────────────────

    /// The command watchdog expired.  Forces the safe state.
    pub fn on_watchdog_expired(&mut self, hw: &mut impl MotionHardware, sink: &mut impl EventSink) {
        if !self.watchdog.on_expiry() {
            return;
        }
        self.halt(hw, StopCause::WatchdogFired, sink);
    }

    /// The line sensor fired.  Completes a drive-to-line.
    pub fn on_line_detected(&mut self, hw: &mut impl MotionHardware, sink: &mut impl EventSink) {
        if !matches!(self.active, ActiveMotion::LineSeek { .. }) {
            debug!("line: edge outside drive-to-line ignored");
            return;
        }
        self.halt(hw, StopCause::LineReached, sink);
    }

    /// Feed one captured beacon edge.
    pub fn on_capture_edge(
        &mut self,
        ticks: u32,
        hw: &mut impl MotionHardware,
        sink: &mut impl EventSink,
    ) -> DetectorVerdict {
        if self.state != MotionState::Converging {
            return DetectorVerdict::Inactive;
        }
        let verdict = self.detector.on_edge(ticks);
        match verdict {
            DetectorVerdict::Converged { instant_hz } => {
                info!("beacon: converged at {} Hz", instant_hz);
                sink.emit(&AppEvent::BeaconConverged { instant_hz });
                self.halt(hw, StopCause::BeaconConverged, sink);
            }
            DetectorVerdict::Continue { averaged_hz } => {
                hw.disable_capture();
                let publications = self.detector.estimate().publications;
                debug!("beacon: avg {} Hz, keep sweeping", averaged_hz);
                sink.emit(&AppEvent::ContinueAligning {
                    averaged_hz,
                    publications,
                });
                if !self.self_events.iter().any(|e| *e == SelfEvent::ContinueAlign) {
                    // Cannot overflow: at most one ContinueAlign is pending.
                    let _ = self.self_events.push_back(SelfEvent::ContinueAlign);
                }
            }
            DetectorVerdict::WarmingUp => {}
            DetectorVerdict::Inactive | DetectorVerdict::Primed | DetectorVerdict::Glitch => {
                return verdict;
            }
        }
        self.publish_estimate();
        verdict
    }

    /// Run queued self-events.
    pub fn run_self_events(&mut self, hw: &mut impl MotionHardware) {
        while let Some(event) = self.self_events.pop_front() {
            match event {
                SelfEvent::ContinueAlign => {
                    if self.state != MotionState::Converging {
                        continue;
                    }
                    self.rotate_toward_beacon(hw);
                    self.detector.rearm();
                    hw.enable_capture();
                }
            }
        }
    }

    /// Apply a new A/D duty scale to the motion in progress.
    pub fn on_duty_poll(&mut self, scale: u8, hw: &mut impl MotionHardware, sink: &mut impl EventSink) {
        let scale = scale.min(100);
        if scale == self.duty_scale {
            return;
        }
        self.duty_scale = scale;
        sink.emit(&AppEvent::DutyScaleChanged(scale));
        match self.active {
            ActiveMotion::None => {}
            ActiveMotion::Rotate { rotation, duty } => hw.start_rotation(rotation, self.scaled(duty)),
            ActiveMotion::Drive { direction, duty } => hw.drive(self.scaled(duty), direction),
            ActiveMotion::LineSeek { duty } => hw.drive(self.scaled(duty), Direction::Forward),
            ActiveMotion::Align => self.rotate_toward_beacon(hw),
        }
    }

    /// Handle everything interrupts have posted, then the self-events.
    ///
    /// Returns the number of interrupt events handled.
    pub fn poll(
        &mut self,
        signals: &InterruptSignals,
        edges: &mut Consumer<'_, u32, CAPTURE_QUEUE_CAP>,
        duty: &DutyInput,
        hw: &mut impl MotionHardware,
        sink: &mut impl EventSink,
    ) -> usize {
        let mut handled = 0;
        events::drain_events(signals, edges, |event| {
            handled += 1;
            match event {
                Event::WatchdogExpired => self.on_watchdog_expired(hw, sink),
                Event::LineDetected => self.on_line_detected(hw, sink),
                Event::CaptureEdge(ticks) => {
                    self.on_capture_edge(ticks, hw, sink);
                }
                Event::DutyPollTick => self.on_duty_poll(duty.load(), hw, sink),
            }
        });
        self.run_self_events(hw);
        handled
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> MotionState {
        self.state
    }

    pub fn gate_open(&self) -> bool {
        self.gate.is_open()
    }

    pub fn duty_scale(&self) -> u8 {
        self.duty_scale
    }

    pub fn watchdog(&self) -> &CommandWatchdog {
        &self.watchdog
    }

    pub fn detector(&self) -> &BeaconDetector {
        &self.detector
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    /// Flow-control requests sent since boot.
    pub fn next_requests(&self) -> u32 {
        self.next_requests
    }

    pub fn telemetry(&self) -> MotionTelemetry {
        let est = self.detector.estimate();
        MotionTelemetry {
            state: self.state,
            last_opcode: self.last_opcode,
            watchdog_armed: self.watchdog.is_armed(),
            dispatch_gate_open: self.gate.is_open(),
            duty_scale: self.duty_scale,
            beacon_averaged_hz: est.averaged_hz,
            beacon_samples: est.sample_count,
            capture_glitches: self.detector.glitches(),
            next_requests: self.next_requests,
        }
    }

    // ── Internal ──────────────────────────────────────────────

    fn scaled(&self, duty: u8) -> u8 {
        (u16::from(duty) * u16::from(self.duty_scale) / 100) as u8
    }

    fn rotate_toward_beacon(&self, hw: &mut impl MotionHardware) {
        hw.start_rotation(self.config.align_rotation, self.scaled(self.config.align_duty_percent));
    }

    /// Tear down whatever the previous command left armed.  Does not stop
    /// the wheels.
    fn end_motion(&mut self, hw: &mut impl MotionHardware) {
        self.watchdog.cancel(hw);
        self.detector.stop();
        hw.disable_capture();
        hw.disable_line_sensor();
        self.self_events.clear();
        self.active = ActiveMotion::None;
    }

    /// Safety stop from an interrupt-driven completion.
    fn halt(&mut self, hw: &mut impl MotionHardware, cause: StopCause, sink: &mut impl EventSink) {
        self.end_motion(hw);
        hw.stop();
        self.set_state(MotionState::Idle, sink);
        sink.emit(&AppEvent::Stopped(cause));
    }

    fn request_next(&mut self, link: &mut impl LinkPort) {
        if self.gate.is_open() {
            link.request_next();
            self.next_requests = self.next_requests.wrapping_add(1);
        }
    }

    fn publish_estimate(&self) {
        if let Some(shared) = self.estimate_out {
            shared.publish(self.detector.estimate());
        }
    }

    fn set_state(&mut self, to: MotionState, sink: &mut impl EventSink) {
        let from = self.state;
        if from != to {
            self.state = to;
            sink.emit(&AppEvent::StateChanged { from, to });
        }
    }
}
