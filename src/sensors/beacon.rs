//! IR beacon detector.
//!
//! Turns captured edge timestamps into an integer frequency estimate and
//! decides, sample by sample, whether the robot is pointing at the beacon.
//!
//! ```text
//!            start()                  in band
//!  Idle ───────────────▶ Sampling ──────────────▶ Converged (stop)
//!                          │  ▲
//!          out of band     │  │  rearm()
//!          (publish avg)   ▼  │  (after "continue aligning")
//!                         Paused
//! ```
//!
//! ## Estimate
//!
//! Every accepted sample adds `instant_hz` to `running_sum_hz`.  When a
//! post-warm-up sample lands outside the band the window average is
//! published and the window restarts.  Memory and per-edge work are O(1).
//!
//! ## Glitches
//!
//! A zero period, or one implying more than `max_sane_hz`, is discarded.
//! It does not advance `last_edge`, so the next real edge is measured
//! against the last accepted one.

use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use log::{debug, trace};

use crate::config::MotionConfig;
use crate::sensors::capture::CaptureSample;

// ───────────────────────────────────────────────────────────────
// Tolerance band
// ───────────────────────────────────────────────────────────────

/// Inclusive acceptance range around the target frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToleranceBand {
    pub lo_hz: u32,
    pub hi_hz: u32,
}

impl ToleranceBand {
    /// `target ± percent %`, integer arithmetic.
    pub fn around(target_hz: u32, percent: u8) -> Self {
        let pct = u64::from(percent.min(100));
        let target = u64::from(target_hz);
        Self {
            lo_hz: (target * (100 - pct) / 100) as u32,
            hi_hz: (target * (100 + pct) / 100).min(u64::from(u32::MAX)) as u32,
        }
    }

    pub fn contains(&self, hz: u32) -> bool {
        (self.lo_hz..=self.hi_hz).contains(&hz)
    }
}

// ───────────────────────────────────────────────────────────────
// Frequency estimate
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrequencyEstimate {
    /// Frequency of the most recent accepted sample.
    pub instant_hz: u32,
    /// Sum of `instant_hz` over the current window.
    pub running_sum_hz: u32,
    /// Accepted samples since the detector was started.
    pub sample_count: u32,
    /// Accepted samples in the current window.
    pub window_count: u32,
    /// Last published window average.
    pub averaged_hz: u32,
    /// Number of averages published since start.
    pub publications: u32,
}

impl FrequencyEstimate {
    fn accumulate(&mut self, hz: u32) {
        self.instant_hz = hz;
        self.running_sum_hz = self.running_sum_hz.saturating_add(hz);
        self.sample_count = self.sample_count.saturating_add(1);
        self.window_count += 1;
    }

    /// Publish the window average and open a new window.
    fn publish(&mut self) -> u32 {
        if self.window_count > 0 {
            self.averaged_hz = self.running_sum_hz / self.window_count;
        }
        self.running_sum_hz = 0;
        self.window_count = 0;
        self.publications = self.publications.wrapping_add(1);
        self.averaged_hz
    }
}

/// Latest estimate, readable from any context without tearing the
/// sum/count pair.
pub struct SharedEstimate {
    inner: Mutex<CriticalSectionRawMutex, Cell<FrequencyEstimate>>,
}

impl Default for SharedEstimate {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedEstimate {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(Cell::new(FrequencyEstimate {
                instant_hz: 0,
                running_sum_hz: 0,
                sample_count: 0,
                window_count: 0,
                averaged_hz: 0,
                publications: 0,
            })),
        }
    }

    pub fn publish(&self, estimate: FrequencyEstimate) {
        self.inner.lock(|cell| cell.set(estimate));
    }

    pub fn snapshot(&self) -> FrequencyEstimate {
        self.inner.lock(|cell| cell.get())
    }
}

// ───────────────────────────────────────────────────────────────
// Detector
// ───────────────────────────────────────────────────────────────

/// Outcome of feeding one edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorVerdict {
    /// Not sampling; the edge was discarded.
    Inactive,
    /// First edge after (re)arming; only the timestamp was recorded.
    Primed,
    /// Zero or implausible period; nothing updated.
    Glitch,
    /// Accepted, but still inside the warm-up window.
    WarmingUp,
    /// In band.  Sampling has stopped.
    Converged { instant_hz: u32 },
    /// Out of band.  An average was published and sampling is paused
    /// until [`BeaconDetector::rearm`].
    Continue { averaged_hz: u32 },
}

#[derive(Debug)]
pub struct BeaconDetector {
    band: ToleranceBand,
    warmup_samples: u32,
    max_sane_hz: u32,
    sampling: bool,
    last_edge: Option<u32>,
    last_sample: Option<CaptureSample>,
    estimate: FrequencyEstimate,
    glitches: u32,
}

impl BeaconDetector {
    pub fn new(config: &MotionConfig) -> Self {
        Self {
            band: ToleranceBand::around(config.beacon_target_hz, config.beacon_tolerance_percent),
            warmup_samples: config.beacon_warmup_samples,
            max_sane_hz: config.beacon_max_sane_hz,
            sampling: false,
            last_edge: None,
            last_sample: None,
            estimate: FrequencyEstimate::default(),
            glitches: 0,
        }
    }

    /// Begin a new alignment attempt from a clean estimate.
    pub fn start(&mut self) {
        self.estimate = FrequencyEstimate::default();
        self.last_edge = None;
        self.last_sample = None;
        self.glitches = 0;
        self.sampling = true;
        debug!(
            "beacon: searching {}..={} Hz",
            self.band.lo_hz, self.band.hi_hz
        );
    }

    /// Resume after a "continue aligning" step.  The estimate carries over;
    /// the next edge only re-primes the period measurement.
    pub fn rearm(&mut self) {
        self.last_edge = None;
        self.sampling = true;
    }

    /// Stop sampling.  The estimate stays readable.
    pub fn stop(&mut self) {
        self.sampling = false;
        self.last_edge = None;
    }

    pub fn is_sampling(&self) -> bool {
        self.sampling
    }

    /// Feed one captured edge timestamp.
    pub fn on_edge(&mut self, ticks: u32) -> DetectorVerdict {
        if !self.sampling {
            return DetectorVerdict::Inactive;
        }
        let Some(last) = self.last_edge else {
            self.last_edge = Some(ticks);
            return DetectorVerdict::Primed;
        };

        let sample = CaptureSample::between(last, ticks);
        let instant_hz = match sample.frequency_hz() {
            Some(hz) if hz <= self.max_sane_hz => hz,
            _ => {
                self.glitches = self.glitches.wrapping_add(1);
                trace!("beacon: glitch, period {} ticks", sample.period_ticks);
                return DetectorVerdict::Glitch;
            }
        };

        self.last_edge = Some(ticks);
        self.last_sample = Some(sample);
        self.estimate.accumulate(instant_hz);

        if self.estimate.sample_count <= self.warmup_samples {
            return DetectorVerdict::WarmingUp;
        }

        if self.band.contains(instant_hz) {
            self.stop();
            DetectorVerdict::Converged { instant_hz }
        } else {
            let averaged_hz = self.estimate.publish();
            self.sampling = false;
            DetectorVerdict::Continue { averaged_hz }
        }
    }

    pub fn estimate(&self) -> FrequencyEstimate {
        self.estimate
    }

    pub fn last_sample(&self) -> Option<CaptureSample> {
        self.last_sample
    }

    pub fn band(&self) -> ToleranceBand {
        self.band
    }

    /// Glitches rejected since the last `start()`.
    pub fn glitches(&self) -> u32 {
        self.glitches
    }
}
