//! Countdown and tick timers built on ESP-IDF's `esp_timer` API.
//!
//! - [`EspOneShot`]: the hardware one-shot behind the command watchdog.
//! - [`DutyPollTimer`]: periodic tick that samples the duty pot.
//! - [`SimOneShot`]: simulated one-shot driven by [`SimOneShot::advance`],
//!   used on host builds and in tests.
//!
//! Timer callbacks execute in the ESP timer task context.  They never call
//! into the service; they only raise flags in [`InterruptSignals`].

use crate::app::ports::OneShotPort;
use crate::events::InterruptSignals;
use crate::sensors::duty_input::DutySampler;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use crate::drivers::hw_init::HwInitError;

// ── Simulated one-shot ────────────────────────────────────────

/// Software one-shot over a simulated millisecond clock.
#[derive(Debug)]
pub struct SimOneShot<'a> {
    signals: &'a InterruptSignals,
    remaining_ms: Option<u32>,
    starts: u32,
}

impl<'a> SimOneShot<'a> {
    pub fn new(signals: &'a InterruptSignals) -> Self {
        Self {
            signals,
            remaining_ms: None,
            starts: 0,
        }
    }

    /// Move simulated time forward.  Raises the expiry flag when the
    /// countdown reaches zero, then stops (no reload).
    pub fn advance(&mut self, ms: u32) {
        if let Some(rem) = self.remaining_ms {
            if ms >= rem {
                self.remaining_ms = None;
                self.signals.raise_watchdog();
            } else {
                self.remaining_ms = Some(rem - ms);
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.remaining_ms.is_some()
    }

    pub fn remaining_ms(&self) -> Option<u32> {
        self.remaining_ms
    }

    /// Number of `start_once` calls since creation.
    pub fn starts(&self) -> u32 {
        self.starts
    }
}

impl OneShotPort for SimOneShot<'_> {
    fn start_once(&mut self, timeout_ms: u32) {
        self.remaining_ms = Some(timeout_ms);
        self.starts += 1;
    }

    fn cancel(&mut self) {
        self.remaining_ms = None;
        self.signals.clear_watchdog();
    }
}

// ── esp_timer one-shot ────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe extern "C" fn watchdog_expired_cb(arg: *mut core::ffi::c_void) {
    // SAFETY: `arg` is the leaked &'static InterruptSignals given to
    // EspOneShot::new(); only atomics are touched.
    let signals = unsafe { &*(arg as *const InterruptSignals) };
    signals.raise_watchdog();
}

/// Hardware one-shot backing the command watchdog.
#[cfg(target_os = "espidf")]
pub struct EspOneShot {
    handle: esp_timer_handle_t,
    signals: &'static InterruptSignals,
}

#[cfg(target_os = "espidf")]
impl EspOneShot {
    pub fn new(signals: &'static InterruptSignals) -> Result<Self, HwInitError> {
        let args = esp_timer_create_args_t {
            callback: Some(watchdog_expired_cb),
            arg: signals as *const InterruptSignals as *mut core::ffi::c_void,
            dispatch_method: esp_timer_dispatch_t_ESP_TIMER_TASK,
            name: c"cmd_wdt".as_ptr(),
            skip_unhandled_events: false,
        };
        let mut handle: esp_timer_handle_t = core::ptr::null_mut();
        // SAFETY: args outlives the call; `signals` is 'static.
        let ret = unsafe { esp_timer_create(&args, &mut handle) };
        if ret != ESP_OK {
            return Err(HwInitError::TimerCreateFailed(ret));
        }
        log::info!("hw_timer: command watchdog one-shot created");
        Ok(Self { handle, signals })
    }
}

#[cfg(target_os = "espidf")]
impl OneShotPort for EspOneShot {
    fn start_once(&mut self, timeout_ms: u32) {
        // SAFETY: handle was created in new() and is never deleted.
        let ret = unsafe { esp_timer_start_once(self.handle, u64::from(timeout_ms) * 1000) };
        if ret != ESP_OK {
            log::error!("hw_timer: one-shot start failed (rc={})", ret);
        }
    }

    fn cancel(&mut self) {
        // ESP_ERR_INVALID_STATE just means the timer was not running.
        // SAFETY: handle was created in new() and is never deleted.
        unsafe {
            esp_timer_stop(self.handle);
        }
        self.signals.clear_watchdog();
    }
}

// ── Duty poll tick ────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe extern "C" fn duty_tick_cb(arg: *mut core::ffi::c_void) {
    // SAFETY: `arg` is the leaked &'static DutySampler given to
    // DutyPollTimer::start(); sample() only touches atomics and the ADC,
    // which is read from this task alone.
    let sampler = unsafe { &*(arg as *const DutySampler<'static>) };
    sampler.sample();
}

/// Periodic timer that samples the duty pot and flags the service loop.
pub struct DutyPollTimer {
    #[cfg(target_os = "espidf")]
    handle: esp_timer_handle_t,
    interval_ms: u32,
}

impl DutyPollTimer {
    /// Start ticking every `interval_ms`.
    #[cfg(target_os = "espidf")]
    pub fn start(sampler: &'static DutySampler<'static>, interval_ms: u32) -> Result<Self, HwInitError> {
        let args = esp_timer_create_args_t {
            callback: Some(duty_tick_cb),
            arg: sampler as *const DutySampler<'static> as *mut core::ffi::c_void,
            dispatch_method: esp_timer_dispatch_t_ESP_TIMER_TASK,
            name: c"duty_poll".as_ptr(),
            skip_unhandled_events: true,
        };
        let mut handle: esp_timer_handle_t = core::ptr::null_mut();
        // SAFETY: args outlives the call; `sampler` is 'static.
        unsafe {
            let ret = esp_timer_create(&args, &mut handle);
            if ret != ESP_OK {
                return Err(HwInitError::TimerCreateFailed(ret));
            }
            let ret = esp_timer_start_periodic(handle, u64::from(interval_ms) * 1000);
            if ret != ESP_OK {
                return Err(HwInitError::TimerCreateFailed(ret));
            }
        }
        log::info!("hw_timer: duty poll every {} ms", interval_ms);
        Ok(Self { handle, interval_ms })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn start(_sampler: &DutySampler<'_>, interval_ms: u32) -> Result<Self, crate::drivers::hw_init::HwInitError> {
        log::info!("hw_timer(sim): duty poll not started ({} ms)", interval_ms);
        Ok(Self { interval_ms })
    }

    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }

    pub fn stop(&mut self) {
        #[cfg(target_os = "espidf")]
        // SAFETY: handle was created in start().
        unsafe {
            esp_timer_stop(self.handle);
        }
    }
}
