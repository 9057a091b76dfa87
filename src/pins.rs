//! GPIO / peripheral pin assignments for the BeaconBot motor board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Drive motors (two PWM + direction H-bridge channels)
// ---------------------------------------------------------------------------

/// LEDC PWM output, left wheel.
pub const LEFT_PWM_GPIO: i32 = 1;
/// Direction line, left wheel: HIGH = reverse.
pub const LEFT_DIR_GPIO: i32 = 2;
/// LEDC PWM output, right wheel.
pub const RIGHT_PWM_GPIO: i32 = 3;
/// Direction line, right wheel: HIGH = reverse.
pub const RIGHT_DIR_GPIO: i32 = 4;

// ---------------------------------------------------------------------------
// Sensors
// ---------------------------------------------------------------------------

/// IR beacon phototransistor, comparator output.  Rising edges captured.
pub const BEACON_CAPTURE_GPIO: i32 = 5;
/// Tape/line reflectance sensor, comparator output.  Rising edge = line.
pub const LINE_SENSOR_GPIO: i32 = 6;

/// Speed-scaling potentiometer, ADC1 channel 6 (GPIO 7 on ESP32-S3).
pub const DUTY_POT_ADC_GPIO: i32 = 7;

// ---------------------------------------------------------------------------
// PWM configuration
// ---------------------------------------------------------------------------

/// LEDC timer resolution (bits).
pub const PWM_RESOLUTION_BITS: u32 = 10;
