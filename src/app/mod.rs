//! Application core: pure motion logic, zero I/O.
//!
//! This module contains the command dispatcher and the motion state
//! machine. All interaction with hardware happens through **port traits**
//! defined in [`ports`], keeping this layer fully testable without real
//! peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
