//! Command watchdog: the timeout supervisor for bounded motions.
//!
//! ```text
//!            arm(t)             expiry
//! Disarmed ─────────▶ Armed(t) ─────────▶ Fired ──▶ Disarmed
//!     ▲                  │ arm(t')  ▲
//!     └──── cancel ──────┘──────────┘ (count restarts)
//! ```
//!
//! The countdown itself lives behind [`OneShotPort`].  Implementations
//! stop the hardware and discard any latched expiry on `cancel()`, so the
//! supervisor only has to track which timeout (if any) is in flight.
//! Firing is an expected outcome, not an error.

use log::{debug, info};

use crate::app::ports::OneShotPort;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogState {
    Disarmed,
    Armed { timeout_ms: u32 },
}

#[derive(Debug)]
pub struct CommandWatchdog {
    state: WatchdogState,
    fires: u32,
    stale_expiries: u32,
}

impl Default for CommandWatchdog {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandWatchdog {
    pub const fn new() -> Self {
        Self {
            state: WatchdogState::Disarmed,
            fires: 0,
            stale_expiries: 0,
        }
    }

    /// Load `timeout_ms` and start counting.
    ///
    /// Re-arming an armed watchdog restarts the count from `timeout_ms`.
    /// The previous load is cancelled first, so at most one expiry can
    /// ever be pending.
    pub fn arm(&mut self, timer: &mut impl OneShotPort, timeout_ms: u32) {
        timer.cancel();
        timer.start_once(timeout_ms);
        if let WatchdogState::Armed { timeout_ms: prev } = self.state {
            debug!("watchdog: re-armed {} ms (was {} ms)", timeout_ms, prev);
        }
        self.state = WatchdogState::Armed { timeout_ms };
    }

    /// Disarm.  No expiry is delivered for the cancelled load.
    pub fn cancel(&mut self, timer: &mut impl OneShotPort) {
        if self.is_armed() {
            timer.cancel();
            self.state = WatchdogState::Disarmed;
        }
    }

    /// Account for an expiry reported by the hardware.
    ///
    /// Returns `true` exactly once per arm.  An expiry while disarmed can
    /// only be a leftover from a cancelled load and is dropped.
    pub fn on_expiry(&mut self) -> bool {
        match self.state {
            WatchdogState::Armed { timeout_ms } => {
                self.state = WatchdogState::Disarmed;
                self.fires = self.fires.wrapping_add(1);
                info!("watchdog: fired after {} ms", timeout_ms);
                true
            }
            WatchdogState::Disarmed => {
                self.stale_expiries = self.stale_expiries.wrapping_add(1);
                debug!("watchdog: stale expiry ignored");
                false
            }
        }
    }

    pub fn state(&self) -> WatchdogState {
        self.state
    }

    pub fn is_armed(&self) -> bool {
        matches!(self.state, WatchdogState::Armed { .. })
    }

    /// Total fires since boot.
    pub fn fires(&self) -> u32 {
        self.fires
    }

    pub fn stale_expiries(&self) -> u32 {
        self.stale_expiries
    }
}
