//! Sensor inputs: beacon edge capture and detection, the line sensor,
//! and the duty-scaling potentiometer.

pub mod beacon;
pub mod capture;
pub mod duty_input;
pub mod line;
