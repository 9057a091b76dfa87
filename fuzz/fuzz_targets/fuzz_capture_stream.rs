//! Fuzz target: `BeaconDetector::on_edge`
//!
//! Interprets the input as little-endian 16-bit edge spacings and checks
//! that the detector never accepts an impossible frequency, never panics
//! on wraparound or zero periods, and stops sampling on every verdict
//! that ends a sweep step.
//!
//! cargo fuzz run fuzz_capture_stream

#![no_main]

use libfuzzer_sys::fuzz_target;

use beaconbot::config::MotionConfig;
use beaconbot::sensors::beacon::{BeaconDetector, DetectorVerdict};

fuzz_target!(|data: &[u8]| {
    let config = MotionConfig::default();
    let mut det = BeaconDetector::new(&config);
    det.start();

    let mut t = u32::MAX - 50_000;
    for chunk in data.chunks_exact(2) {
        t = t.wrapping_add(u32::from(u16::from_le_bytes([chunk[0], chunk[1]])));
        match det.on_edge(t) {
            DetectorVerdict::Converged { instant_hz } => {
                assert!(det.band().contains(instant_hz));
                assert!(!det.is_sampling());
                det.start();
            }
            DetectorVerdict::Continue { averaged_hz } => {
                assert!(!det.is_sampling());
                assert!(averaged_hz <= config.beacon_max_sane_hz);
                det.rearm();
            }
            DetectorVerdict::Inactive => unreachable!("detector is always sampling here"),
            DetectorVerdict::Primed | DetectorVerdict::Glitch | DetectorVerdict::WarmingUp => {}
        }
        let est = det.estimate();
        if est.sample_count > 0 {
            assert!(est.instant_hz <= config.beacon_max_sane_hz);
        }
    }
});
