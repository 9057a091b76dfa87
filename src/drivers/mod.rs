//! Actuator drivers, hardware initialisation, and timer helpers.

pub mod drivetrain;
pub mod hw_init;
pub mod hw_timer;
pub mod pwm;
pub mod watchdog;
