//! Motion configuration and the opcode → action table.
//!
//! All tunable parameters of the motion core live in [`MotionConfig`].
//! Defaults are compiled in; the firmware may override them from a
//! JSON blob baked into the image (see [`MotionConfig::from_json`]).
//!
//! [`CommandTable`] lifts the per-opcode constants (duty, direction,
//! watchdog timeout) out of the dispatcher so dispatch is a table lookup.

use serde::{Deserialize, Serialize};

use crate::app::commands::{Direction, Opcode, Rotation};
use crate::drivers::pwm::load_for_period;
use crate::error::ConfigError;

/// Core motion configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MotionConfig {
    // --- PWM ---
    /// PWM period in microseconds.
    pub pwm_period_us: u32,
    /// PWM module clock (system clock / divider), Hz.
    pub pwm_clock_hz: u32,

    // --- Duties (0-100%) ---
    pub rotate_duty_percent: u8,
    pub drive_half_duty_percent: u8,
    pub drive_full_duty_percent: u8,
    /// Duty used while sweeping toward the beacon.
    pub align_duty_percent: u8,
    /// Sense of the beacon search sweep.
    pub align_rotation: Rotation,
    pub line_seek_duty_percent: u8,

    // --- Watchdog ---
    pub rotate_90_timeout_ms: u32,
    pub rotate_45_timeout_ms: u32,
    /// Upper bound on one alignment attempt. `None` keeps alignment
    /// unbounded (runs until convergence, Stop or EndRun).
    pub align_timeout_ms: Option<u32>,

    // --- Beacon ---
    pub beacon_target_hz: u32,
    /// Half-width of the acceptance band, percent of target.
    pub beacon_tolerance_percent: u8,
    /// Accepted samples discarded before the band test starts.
    pub beacon_warmup_samples: u32,
    /// Instantaneous frequencies above this are capture glitches.
    pub beacon_max_sane_hz: u32,

    // --- A/D duty scaling ---
    pub duty_poll_interval_ms: u32,
    /// Full-scale A/D reading (12-bit converter).
    pub pot_full_scale: u16,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            // PWM: 1 kHz from a 40 MHz / 32 clock
            pwm_period_us: 1000,
            pwm_clock_hz: 1_250_000,

            // Duties
            rotate_duty_percent: 60,
            drive_half_duty_percent: 50,
            drive_full_duty_percent: 100,
            align_duty_percent: 45,
            align_rotation: Rotation::CounterClockwise,
            line_seek_duty_percent: 100,

            // Watchdog
            rotate_90_timeout_ms: 1500,
            rotate_45_timeout_ms: 750,
            align_timeout_ms: None,

            // Beacon
            beacon_target_hz: 1950,
            beacon_tolerance_percent: 20,
            beacon_warmup_samples: 4,
            beacon_max_sane_hz: 10_000,

            // A/D
            duty_poll_interval_ms: 100, // 10 Hz
            pot_full_scale: 4095,
        }
    }
}

impl MotionConfig {
    /// Parse and validate a JSON config.  Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|_| ConfigError::Malformed)?;
        config.validate()?;
        Ok(config)
    }

    /// Range-check every field.  Invalid values are rejected, not clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let duties = [
            ("rotate_duty_percent", self.rotate_duty_percent),
            ("drive_half_duty_percent", self.drive_half_duty_percent),
            ("drive_full_duty_percent", self.drive_full_duty_percent),
            ("align_duty_percent", self.align_duty_percent),
            ("line_seek_duty_percent", self.line_seek_duty_percent),
        ];
        for (field, duty) in duties {
            if duty == 0 || duty > 100 {
                return Err(ConfigError::ValidationFailed(field));
            }
        }
        if self.pwm_period_us == 0 || self.pwm_clock_hz == 0 {
            return Err(ConfigError::ValidationFailed("pwm_period_us"));
        }
        // The comparator is 16 bits wide and counts up/down.
        let half_period = u64::from(self.pwm_period_us) * u64::from(self.pwm_clock_hz) / 2_000_000;
        if half_period == 0 || half_period > u64::from(u16::MAX) {
            return Err(ConfigError::ValidationFailed("pwm_clock_hz"));
        }
        // The LEDC timer is programmed in whole hertz.
        if self.pwm_freq_hz() == 0 {
            return Err(ConfigError::ValidationFailed("pwm_period_us"));
        }
        if self.rotate_90_timeout_ms == 0 || self.rotate_45_timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed("rotate_timeout_ms"));
        }
        if self.rotate_90_timeout_ms <= self.rotate_45_timeout_ms {
            return Err(ConfigError::ValidationFailed("rotate_90_timeout_ms"));
        }
        if self.align_timeout_ms == Some(0) {
            return Err(ConfigError::ValidationFailed("align_timeout_ms"));
        }
        if self.beacon_target_hz == 0 || self.beacon_target_hz >= self.beacon_max_sane_hz {
            return Err(ConfigError::ValidationFailed("beacon_target_hz"));
        }
        if self.beacon_tolerance_percent >= 100 {
            return Err(ConfigError::ValidationFailed("beacon_tolerance_percent"));
        }
        if self.duty_poll_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed("duty_poll_interval_ms"));
        }
        if self.pot_full_scale == 0 {
            return Err(ConfigError::ValidationFailed("pot_full_scale"));
        }
        Ok(())
    }

    /// Comparator load value: one half period in PWM ticks (up/down count).
    pub fn pwm_load_ticks(&self) -> u16 {
        load_for_period(self.pwm_period_us, self.pwm_clock_hz)
    }

    /// PWM frequency the drive timer runs at, Hz.
    pub fn pwm_freq_hz(&self) -> u32 {
        self.pwm_clock_hz
            .checked_div(2 * u32::from(self.pwm_load_ticks()))
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Command table
// ---------------------------------------------------------------------------

/// Actuation primitive an opcode maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Stop,
    EndRun,
    Rotate { rotation: Rotation, duty: u8 },
    Drive { direction: Direction, duty: u8 },
    AlignToBeacon,
    DriveToLine { duty: u8 },
}

/// One row of the command table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    pub primitive: Primitive,
    /// Watchdog timeout armed before the primitive runs.
    pub watchdog_ms: Option<u32>,
}

/// Opcode → (primitive, watchdog timeout), built once from config.
#[derive(Debug, Clone)]
pub struct CommandTable {
    rows: [CommandSpec; Opcode::ALL.len()],
}

impl CommandTable {
    pub fn new(config: &MotionConfig) -> Self {
        let rows = Opcode::ALL.map(|op| Self::row(op, config));
        Self { rows }
    }

    /// Look up the row for `op`.
    pub fn lookup(&self, op: Opcode) -> CommandSpec {
        self.rows[op.index()]
    }

    fn row(op: Opcode, c: &MotionConfig) -> CommandSpec {
        let rotate = |rotation, timeout| CommandSpec {
            primitive: Primitive::Rotate {
                rotation,
                duty: c.rotate_duty_percent,
            },
            watchdog_ms: Some(timeout),
        };
        let drive = |direction, duty| CommandSpec {
            primitive: Primitive::Drive { direction, duty },
            watchdog_ms: None,
        };
        match op {
            Opcode::Stop => CommandSpec {
                primitive: Primitive::Stop,
                watchdog_ms: None,
            },
            Opcode::EndRun => CommandSpec {
                primitive: Primitive::EndRun,
                watchdog_ms: None,
            },
            Opcode::RotateCw90 => rotate(Rotation::Clockwise, c.rotate_90_timeout_ms),
            Opcode::RotateCw45 => rotate(Rotation::Clockwise, c.rotate_45_timeout_ms),
            Opcode::RotateCcw90 => rotate(Rotation::CounterClockwise, c.rotate_90_timeout_ms),
            Opcode::RotateCcw45 => rotate(Rotation::CounterClockwise, c.rotate_45_timeout_ms),
            Opcode::DriveForwardHalf => drive(Direction::Forward, c.drive_half_duty_percent),
            Opcode::DriveForwardFull => drive(Direction::Forward, c.drive_full_duty_percent),
            Opcode::DriveReverseHalf => drive(Direction::Reverse, c.drive_half_duty_percent),
            Opcode::DriveReverseFull => drive(Direction::Reverse, c.drive_full_duty_percent),
            Opcode::AlignToBeacon => CommandSpec {
                primitive: Primitive::AlignToBeacon,
                watchdog_ms: c.align_timeout_ms,
            },
            Opcode::DriveToLine => CommandSpec {
                primitive: Primitive::DriveToLine {
                    duty: c.line_seek_duty_percent,
                },
                watchdog_ms: None,
            },
        }
    }
}
