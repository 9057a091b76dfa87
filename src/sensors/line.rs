//! Tape/line reflectance sensor.
//!
//! A rising edge on the comparator output means the robot is over the
//! line.  The ISR only raises a flag; the service loop decides whether a
//! drive-to-line is in progress.

use crate::events::InterruptSignals;

pub fn on_line_edge(signals: &InterruptSignals) {
    signals.raise_line();
}

/// GPIO ISR trampoline.  `arg` is the leaked `&'static InterruptSignals`.
///
/// # Safety
///
/// `arg` must point to an `InterruptSignals` that lives for the rest of
/// the program.
#[cfg(target_os = "espidf")]
pub unsafe extern "C" fn line_isr(arg: *mut core::ffi::c_void) {
    // SAFETY: caller contract above; only atomics are touched.
    let signals = unsafe { &*(arg as *const InterruptSignals) };
    on_line_edge(signals);
}
