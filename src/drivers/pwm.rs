//! PWM generator.
//!
//! Converts a duty-cycle percentage into a comparator threshold against a
//! fixed load (half period, the counter runs up/down).  The generator
//! drives its output high when the counter passes the compare value on the
//! way up and low on the way down, so a lower threshold means a longer
//! high time:
//!
//! ```text
//! compare = load - percent * load / 100
//! ```
//!
//! 0 % and 100 % never program a compare value.  The generator action is
//! switched to "force low" / "force high" instead, which avoids the
//! glitch a compare value of 0 or `load` produces at the counter turnaround.

use crate::drivers::hw_init;
use crate::error::ActuatorError;

/// What the generator does at the compare events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorAction {
    /// Output held low for the whole period.
    ForceLow,
    /// Output held high for the whole period.
    ForceHigh,
    /// Normal operation: high on compare-up, low on compare-down.
    Compare,
}

/// Hardware side of one PWM channel.
pub trait PwmOutput {
    fn set_load(&mut self, load: u16) -> Result<(), ActuatorError>;
    fn set_action(&mut self, action: GeneratorAction) -> Result<(), ActuatorError>;
    fn set_compare(&mut self, compare: u16) -> Result<(), ActuatorError>;
}

/// Last programmed comparator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PwmState {
    ForcedLow,
    ForcedHigh,
    Compare(u16),
}

/// Compare threshold for `percent` (1–99) against `load`.
pub fn compare_for(percent: u8, load: u16) -> u16 {
    let load32 = u32::from(load);
    (load32 - u32::from(percent) * load32 / 100) as u16
}

/// Comparator load for a period, in PWM-clock ticks (up/down count halves it).
pub fn load_for_period(period_us: u32, pwm_clock_hz: u32) -> u16 {
    let ticks = u64::from(period_us) * u64::from(pwm_clock_hz) / 1_000_000;
    (ticks / 2).min(u64::from(u16::MAX)) as u16
}

pub struct PwmGenerator<P: PwmOutput> {
    out: P,
    load: u16,
    duty: u8,
    state: PwmState,
}

impl<P: PwmOutput> PwmGenerator<P> {
    /// Program the load and start at 0 % duty.
    pub fn new(mut out: P, load: u16) -> Result<Self, ActuatorError> {
        out.set_load(load)?;
        out.set_action(GeneratorAction::ForceLow)?;
        Ok(Self {
            out,
            load,
            duty: 0,
            state: PwmState::ForcedLow,
        })
    }

    /// Set the duty cycle, 0–100 %.  Values above 100 clamp.
    pub fn set_duty(&mut self, percent: u8) -> Result<(), ActuatorError> {
        let percent = percent.min(100);
        let state = match percent {
            0 => {
                self.out.set_action(GeneratorAction::ForceLow)?;
                PwmState::ForcedLow
            }
            100 => {
                self.out.set_action(GeneratorAction::ForceHigh)?;
                PwmState::ForcedHigh
            }
            p => {
                let compare = compare_for(p, self.load);
                self.out.set_action(GeneratorAction::Compare)?;
                self.out.set_compare(compare)?;
                PwmState::Compare(compare)
            }
        };
        self.duty = percent;
        self.state = state;
        Ok(())
    }

    /// Change the period and re-apply the current duty against the new load.
    pub fn set_period_us(&mut self, period_us: u32, pwm_clock_hz: u32) -> Result<(), ActuatorError> {
        let load = load_for_period(period_us, pwm_clock_hz);
        self.out.set_load(load)?;
        self.load = load;
        self.set_duty(self.duty)
    }

    pub fn duty(&self) -> u8 {
        self.duty
    }

    pub fn load(&self) -> u16 {
        self.load
    }

    pub fn state(&self) -> PwmState {
        self.state
    }

    pub fn output(&self) -> &P {
        &self.out
    }
}

// ---------------------------------------------------------------------------
// LEDC-backed channel
// ---------------------------------------------------------------------------

/// [`PwmOutput`] on an ESP32 LEDC channel.
///
/// LEDC has no up/down comparator, so the comparator state is translated
/// into an equivalent high time at the channel's duty resolution, and the
/// load into the timer frequency: `pwm_clock_hz / (2 * load)`.  On host
/// builds the register writes are no-ops and only the translation runs.
pub struct LedcPwm {
    channel: u32,
    pwm_clock_hz: u32,
    /// Frequency the LEDC timer was last tuned to, 0 before the first load.
    freq_hz: u32,
    load: u16,
    action: GeneratorAction,
    compare: u16,
    /// Last duty written to the LEDC channel, in resolution steps.
    written: u32,
}

impl LedcPwm {
    pub fn new(channel: u32, pwm_clock_hz: u32) -> Self {
        Self {
            channel,
            pwm_clock_hz,
            freq_hz: 0,
            load: 0,
            action: GeneratorAction::ForceLow,
            compare: 0,
            written: 0,
        }
    }

    pub fn written_duty(&self) -> u32 {
        self.written
    }

    pub fn freq_hz(&self) -> u32 {
        self.freq_hz
    }

    fn flush(&mut self) {
        let max = hw_init::LEDC_DUTY_MAX;
        let duty = match self.action {
            GeneratorAction::ForceLow => 0,
            GeneratorAction::ForceHigh => max,
            GeneratorAction::Compare if self.load == 0 => 0,
            GeneratorAction::Compare => {
                let high = u32::from(self.load.saturating_sub(self.compare));
                high * max / u32::from(self.load)
            }
        };
        hw_init::ledc_set(self.channel, duty);
        self.written = duty;
    }
}

impl PwmOutput for LedcPwm {
    fn set_load(&mut self, load: u16) -> Result<(), ActuatorError> {
        let freq_hz = self
            .pwm_clock_hz
            .checked_div(2 * u32::from(load))
            .unwrap_or_default();
        if freq_hz == 0 {
            return Err(ActuatorError::PwmWriteFailed);
        }
        // Both wheels share the timer; only retune on an actual change.
        if freq_hz != self.freq_hz {
            if !hw_init::ledc_timer_freq(freq_hz) {
                return Err(ActuatorError::PwmWriteFailed);
            }
            self.freq_hz = freq_hz;
        }
        self.load = load;
        Ok(())
    }

    fn set_action(&mut self, action: GeneratorAction) -> Result<(), ActuatorError> {
        self.action = action;
        if action != GeneratorAction::Compare {
            self.flush();
        }
        Ok(())
    }

    fn set_compare(&mut self, compare: u16) -> Result<(), ActuatorError> {
        self.compare = compare;
        self.flush();
        Ok(())
    }
}
