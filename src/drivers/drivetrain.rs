//! Two-wheel drivetrain: the actuation primitives.
//!
//! Each wheel is an H-bridge channel with a PWM speed input and a
//! direction line (LOW = forward, HIGH = reverse).  Direction is always
//! written before duty so a wheel never briefly runs the wrong way at the
//! new speed.
//!
//! ## Safety contract
//!
//! [`DriveTrain::stop`] is idempotent and never gives up half way: both
//! wheels are driven to 0 % with both direction lines low even when one
//! channel reports a write error.  It is the only actuator write on the
//! watchdog and beacon-converged paths.

use embedded_hal::digital::OutputPin;
use log::{debug, warn};

use crate::app::commands::{Direction, Rotation};
use crate::app::ports::ActuatorPort;
use crate::drivers::pwm::{PwmGenerator, PwmOutput};
use crate::error::ActuatorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveState {
    Stopped,
    Driving { duty: u8, direction: Direction },
    Rotating { duty: u8, rotation: Rotation },
}

/// One motor channel.
pub struct Wheel<D: OutputPin, P: PwmOutput> {
    dir: D,
    pwm: PwmGenerator<P>,
}

impl<D: OutputPin, P: PwmOutput> Wheel<D, P> {
    pub fn new(dir: D, pwm: PwmGenerator<P>) -> Self {
        Self { dir, pwm }
    }

    fn set(&mut self, duty: u8, direction: Direction) -> Result<(), ActuatorError> {
        let res = match direction {
            Direction::Forward => self.dir.set_low(),
            Direction::Reverse => self.dir.set_high(),
        };
        res.map_err(|_| ActuatorError::DirectionWriteFailed)?;
        self.pwm.set_duty(duty)
    }

    fn stop(&mut self) -> Result<(), ActuatorError> {
        // Duty first: the wheel must not see a direction flip at speed.
        let duty = self.pwm.set_duty(0);
        let dir = self
            .dir
            .set_low()
            .map_err(|_| ActuatorError::DirectionWriteFailed);
        duty.and(dir)
    }

    pub fn direction_line(&self) -> &D {
        &self.dir
    }

    pub fn pwm(&self) -> &PwmGenerator<P> {
        &self.pwm
    }
}

pub struct DriveTrain<D: OutputPin, P: PwmOutput> {
    left: Wheel<D, P>,
    right: Wheel<D, P>,
    state: DriveState,
    write_errors: u32,
}

impl<D: OutputPin, P: PwmOutput> DriveTrain<D, P> {
    /// Take ownership of both wheels and put them in the safe state.
    pub fn new(left: Wheel<D, P>, right: Wheel<D, P>) -> Self {
        let mut dt = Self {
            left,
            right,
            state: DriveState::Stopped,
            write_errors: 0,
        };
        dt.stop();
        dt
    }

    pub fn state(&self) -> DriveState {
        self.state
    }

    pub fn is_moving(&self) -> bool {
        !matches!(self.state, DriveState::Stopped)
    }

    pub fn left(&self) -> &Wheel<D, P> {
        &self.left
    }

    pub fn right(&self) -> &Wheel<D, P> {
        &self.right
    }

    /// Actuator writes that failed since boot.
    pub fn write_errors(&self) -> u32 {
        self.write_errors
    }

    fn set_wheels(&mut self, duty: u8, left: Direction, right: Direction) -> Result<(), ActuatorError> {
        self.left.set(duty, left)?;
        self.right.set(duty, right)
    }

    fn check(&mut self, res: Result<(), ActuatorError>, what: &str) -> bool {
        match res {
            Ok(()) => true,
            Err(e) => {
                self.write_errors = self.write_errors.saturating_add(1);
                warn!("drivetrain: {} failed: {}", what, e);
                false
            }
        }
    }
}

impl<D: OutputPin, P: PwmOutput> ActuatorPort for DriveTrain<D, P> {
    fn drive(&mut self, duty: u8, direction: Direction) {
        let duty = duty.min(100);
        if duty == 0 {
            self.stop();
            return;
        }
        let res = self.set_wheels(duty, direction, direction);
        if self.check(res, "drive") {
            debug!("drivetrain: drive {:?} @ {}%", direction, duty);
            self.state = DriveState::Driving { duty, direction };
        } else {
            self.stop();
        }
    }

    fn start_rotation(&mut self, rotation: Rotation, duty: u8) {
        let duty = duty.min(100);
        if duty == 0 {
            self.stop();
            return;
        }
        let (left, right) = match rotation {
            Rotation::Clockwise => (Direction::Forward, Direction::Reverse),
            Rotation::CounterClockwise => (Direction::Reverse, Direction::Forward),
        };
        let res = self.set_wheels(duty, left, right);
        if self.check(res, "rotate") {
            debug!("drivetrain: rotate {:?} @ {}%", rotation, duty);
            self.state = DriveState::Rotating { duty, rotation };
        } else {
            self.stop();
        }
    }

    fn stop(&mut self) {
        let l = self.left.stop();
        let r = self.right.stop();
        self.check(l, "stop left");
        self.check(r, "stop right");
        self.state = DriveState::Stopped;
    }
}
