//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! Owns the drivetrain and the watchdog one-shot and exposes them, plus
//! the sensor interrupt masks, through [`ActuatorPort`], [`OneShotPort`]
//! and [`SensorGatePort`].  This is the only module in the system that
//! touches actual hardware.  On non-espidf targets the interrupt masks
//! are no-op stubs and only the bookkeeping runs.

use embedded_hal::digital::OutputPin;

use crate::app::commands::{Direction, Rotation};
use crate::app::ports::{ActuatorPort, OneShotPort, SensorGatePort};
use crate::drivers::drivetrain::DriveTrain;
use crate::drivers::hw_init;
use crate::drivers::pwm::PwmOutput;
use crate::events::InterruptSignals;
use crate::pins;

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter<'a, D: OutputPin, P: PwmOutput, T: OneShotPort> {
    drivetrain: DriveTrain<D, P>,
    timer: T,
    signals: &'a InterruptSignals,
    capture_enabled: bool,
    line_enabled: bool,
}

impl<'a, D: OutputPin, P: PwmOutput, T: OneShotPort> HardwareAdapter<'a, D, P, T> {
    pub fn new(drivetrain: DriveTrain<D, P>, timer: T, signals: &'a InterruptSignals) -> Self {
        Self {
            drivetrain,
            timer,
            signals,
            capture_enabled: false,
            line_enabled: false,
        }
    }

    pub fn drivetrain(&self) -> &DriveTrain<D, P> {
        &self.drivetrain
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }

    pub fn capture_enabled(&self) -> bool {
        self.capture_enabled
    }

    pub fn line_enabled(&self) -> bool {
        self.line_enabled
    }
}

// ── ActuatorPort implementation ───────────────────────────────

impl<D: OutputPin, P: PwmOutput, T: OneShotPort> ActuatorPort for HardwareAdapter<'_, D, P, T> {
    fn drive(&mut self, duty: u8, direction: Direction) {
        self.drivetrain.drive(duty, direction);
    }

    fn start_rotation(&mut self, rotation: Rotation, duty: u8) {
        self.drivetrain.start_rotation(rotation, duty);
    }

    fn stop(&mut self) {
        self.drivetrain.stop();
    }
}

// ── OneShotPort implementation ────────────────────────────────

impl<D: OutputPin, P: PwmOutput, T: OneShotPort> OneShotPort for HardwareAdapter<'_, D, P, T> {
    fn start_once(&mut self, timeout_ms: u32) {
        self.timer.start_once(timeout_ms);
    }

    fn cancel(&mut self) {
        self.timer.cancel();
    }
}

// ── SensorGatePort implementation ─────────────────────────────

impl<D: OutputPin, P: PwmOutput, T: OneShotPort> SensorGatePort for HardwareAdapter<'_, D, P, T> {
    fn enable_capture(&mut self) {
        hw_init::gpio_irq_enable(pins::BEACON_CAPTURE_GPIO, true);
        self.capture_enabled = true;
    }

    fn disable_capture(&mut self) {
        hw_init::gpio_irq_enable(pins::BEACON_CAPTURE_GPIO, false);
        self.capture_enabled = false;
    }

    fn enable_line_sensor(&mut self) {
        // A line crossed before this command must not complete it.
        self.signals.clear_line();
        hw_init::gpio_irq_enable(pins::LINE_SENSOR_GPIO, true);
        self.line_enabled = true;
    }

    fn disable_line_sensor(&mut self) {
        hw_init::gpio_irq_enable(pins::LINE_SENSOR_GPIO, false);
        self.signals.clear_line();
        self.line_enabled = false;
    }
}
