//! Speed-scaling potentiometer.
//!
//! The A/D converter is polled on a fixed cadence (see
//! [`DutyPollTimer`](crate::drivers::hw_timer::DutyPollTimer)).  Each
//! reading is turned into a 0–100 % scale and stored in a [`DutyInput`]
//! cell that the service loop applies to the motion in progress.

use core::sync::atomic::{AtomicU8, Ordering};

use crate::drivers::hw_init;
use crate::events::InterruptSignals;

/// Integer conversion of a raw reading to a 0–100 % scale.
///
/// Readings above `full_scale` clamp to 100.
pub fn pot_to_duty(raw: u16, full_scale: u16) -> u8 {
    if full_scale == 0 {
        return 100;
    }
    let raw = u32::from(raw.min(full_scale));
    (100 * raw / u32::from(full_scale)) as u8
}

/// Latest duty scale, written by the A/D collaborator.
#[derive(Debug)]
pub struct DutyInput {
    percent: AtomicU8,
}

impl Default for DutyInput {
    fn default() -> Self {
        Self::new()
    }
}

impl DutyInput {
    /// Starts at 100 % (no scaling) until the first reading lands.
    pub const fn new() -> Self {
        Self {
            percent: AtomicU8::new(100),
        }
    }

    /// Convert and store a raw reading.  Returns the stored percentage.
    pub fn store_raw(&self, raw: u16, full_scale: u16) -> u8 {
        let pct = pot_to_duty(raw, full_scale);
        self.store(pct);
        pct
    }

    pub fn store(&self, percent: u8) {
        self.percent.store(percent.min(100), Ordering::Relaxed);
    }

    pub fn load(&self) -> u8 {
        self.percent.load(Ordering::Relaxed)
    }
}

/// The A/D side: reads the pot, publishes the scale, flags the loop.
///
/// Runs in the duty-poll timer task, never in the service loop.
#[derive(Debug)]
pub struct DutySampler<'a> {
    input: DutyInput,
    signals: &'a InterruptSignals,
    full_scale: u16,
}

impl<'a> DutySampler<'a> {
    pub fn new(signals: &'a InterruptSignals, full_scale: u16) -> Self {
        Self {
            input: DutyInput::new(),
            signals,
            full_scale,
        }
    }

    /// Take one reading.  Returns the stored percentage.
    pub fn sample(&self) -> u8 {
        let raw = hw_init::adc1_read(hw_init::ADC1_CH_DUTY_POT);
        self.publish_raw(raw)
    }

    /// Publish an already-converted raw reading.
    pub fn publish_raw(&self, raw: u16) -> u8 {
        let pct = self.input.store_raw(raw, self.full_scale);
        self.signals.raise_duty_tick();
        pct
    }

    pub fn input(&self) -> &DutyInput {
        &self.input
    }
}
