//! Watchdog timeout supervisor integration tests.
//!
//! Time is simulated with `MockHardware::advance`, which raises the expiry
//! flag exactly like the esp_timer callback does.  Every expiry is then
//! delivered through `MotionService::poll`, the same path the firmware
//! service loop takes.

use beaconbot::app::commands::Opcode;
use beaconbot::app::events::StopCause;
use beaconbot::app::service::{MotionService, MotionState};
use beaconbot::config::MotionConfig;
use beaconbot::drivers::watchdog::WatchdogState;
use beaconbot::events::{CaptureQueue, InterruptSignals};
use beaconbot::sensors::duty_input::DutyInput;

use super::mock_hw::{Call, Rig};

#[test]
fn expiry_stops_rotation_and_goes_idle() {
    let signals = InterruptSignals::new();
    let duty = DutyInput::new();
    let mut queue = CaptureQueue::new();
    let (_edge_in, mut edges) = queue.split();
    let mut app = MotionService::new(MotionConfig::default()).expect("valid config");
    let mut rig = Rig::new();

    app.dispatch(Opcode::RotateCw90, &mut rig.hw, &mut rig.link, &mut rig.sink);
    rig.hw.advance(1499, &signals);
    assert_eq!(app.poll(&signals, &mut edges, &duty, &mut rig.hw, &mut rig.sink), 0);
    assert_eq!(app.state(), MotionState::Executing);

    rig.hw.advance(1, &signals);
    assert_eq!(app.poll(&signals, &mut edges, &duty, &mut rig.hw, &mut rig.sink), 1);
    assert_eq!(rig.hw.last_motion(), Some(Call::Stop));
    assert_eq!(app.state(), MotionState::Idle);
    assert_eq!(app.watchdog().state(), WatchdogState::Disarmed);
    assert_eq!(app.watchdog().fires(), 1);
    assert_eq!(rig.sink.stops_for(StopCause::WatchdogFired), 1);
    // Expiry is not a dispatch: the request count is untouched.
    assert_eq!(rig.link.requests, 1);
}

#[test]
fn stop_before_expiry_means_it_never_fires() {
    let signals = InterruptSignals::new();
    let duty = DutyInput::new();
    let mut queue = CaptureQueue::new();
    let (_edge_in, mut edges) = queue.split();
    let mut app = MotionService::new(MotionConfig::default()).expect("valid config");
    let mut rig = Rig::new();

    app.dispatch(Opcode::RotateCcw90, &mut rig.hw, &mut rig.link, &mut rig.sink);
    rig.hw.advance(1000, &signals);
    app.dispatch(Opcode::Stop, &mut rig.hw, &mut rig.link, &mut rig.sink);
    assert_eq!(rig.hw.count(Call::CancelTimer), 2, "arm clears, stop cancels");

    rig.hw.advance(10_000, &signals);
    assert_eq!(app.poll(&signals, &mut edges, &duty, &mut rig.hw, &mut rig.sink), 0);
    assert_eq!(app.watchdog().fires(), 0);
    assert_eq!(rig.sink.stops_for(StopCause::WatchdogFired), 0);
}

#[test]
fn rearm_restarts_the_countdown() {
    let signals = InterruptSignals::new();
    let duty = DutyInput::new();
    let mut queue = CaptureQueue::new();
    let (_edge_in, mut edges) = queue.split();
    let mut app = MotionService::new(MotionConfig::default()).expect("valid config");
    let mut rig = Rig::new();

    app.dispatch(Opcode::RotateCw90, &mut rig.hw, &mut rig.link, &mut rig.sink);
    rig.hw.advance(1000, &signals);
    app.dispatch(Opcode::RotateCw90, &mut rig.hw, &mut rig.link, &mut rig.sink);

    // 1000 + 1000 ms is past the first deadline but not the second.
    rig.hw.advance(1000, &signals);
    assert_eq!(app.poll(&signals, &mut edges, &duty, &mut rig.hw, &mut rig.sink), 0);
    assert!(app.watchdog().is_armed());

    rig.hw.advance(500, &signals);
    app.poll(&signals, &mut edges, &duty, &mut rig.hw, &mut rig.sink);
    assert_eq!(app.watchdog().fires(), 1);
    assert_eq!(rig.sink.stops_for(StopCause::WatchdogFired), 1);
}

#[test]
fn shorter_rotation_supersedes_longer_timeout() {
    let signals = InterruptSignals::new();
    let duty = DutyInput::new();
    let mut queue = CaptureQueue::new();
    let (_edge_in, mut edges) = queue.split();
    let mut app = MotionService::new(MotionConfig::default()).expect("valid config");
    let mut rig = Rig::new();

    app.dispatch(Opcode::RotateCw90, &mut rig.hw, &mut rig.link, &mut rig.sink);
    app.dispatch(Opcode::RotateCw45, &mut rig.hw, &mut rig.link, &mut rig.sink);
    assert_eq!(
        app.watchdog().state(),
        WatchdogState::Armed { timeout_ms: 750 }
    );
    rig.hw.advance(750, &signals);
    app.poll(&signals, &mut edges, &duty, &mut rig.hw, &mut rig.sink);
    assert_eq!(app.state(), MotionState::Idle);
    assert_eq!(app.watchdog().fires(), 1);
}

#[test]
fn leftover_expiry_while_disarmed_is_dropped() {
    let signals = InterruptSignals::new();
    let duty = DutyInput::new();
    let mut queue = CaptureQueue::new();
    let (_edge_in, mut edges) = queue.split();
    let mut app = MotionService::new(MotionConfig::default()).expect("valid config");
    let mut rig = Rig::new();

    app.dispatch(Opcode::DriveForwardHalf, &mut rig.hw, &mut rig.link, &mut rig.sink);
    rig.hw.clear();
    signals.raise_watchdog();

    assert_eq!(app.poll(&signals, &mut edges, &duty, &mut rig.hw, &mut rig.sink), 1);
    assert_eq!(app.watchdog().stale_expiries(), 1);
    assert_eq!(rig.hw.stops(), 0, "drive keeps going");
    assert_eq!(app.state(), MotionState::Executing);
}

#[test]
fn align_has_no_timeout_by_default() {
    let mut app = MotionService::new(MotionConfig::default()).expect("valid config");
    let mut rig = Rig::new();

    app.dispatch(Opcode::AlignToBeacon, &mut rig.hw, &mut rig.link, &mut rig.sink);
    assert!(!app.watchdog().is_armed());
    assert!(!rig.hw.calls().iter().any(|c| matches!(c, Call::StartOnce(_))));
}

#[test]
fn configured_align_timeout_bounds_the_sweep() {
    let signals = InterruptSignals::new();
    let duty = DutyInput::new();
    let mut queue = CaptureQueue::new();
    let (_edge_in, mut edges) = queue.split();
    let config = MotionConfig {
        align_timeout_ms: Some(5000),
        ..MotionConfig::default()
    };
    let mut app = MotionService::new(config).expect("valid config");
    let mut rig = Rig::new();

    app.dispatch(Opcode::AlignToBeacon, &mut rig.hw, &mut rig.link, &mut rig.sink);
    assert_eq!(rig.hw.count(Call::StartOnce(5000)), 1);
    assert!(rig.hw.capture_enabled);

    rig.hw.advance(5000, &signals);
    app.poll(&signals, &mut edges, &duty, &mut rig.hw, &mut rig.sink);
    assert!(!rig.hw.capture_enabled);
    assert!(!app.detector().is_sampling());
    assert_eq!(app.state(), MotionState::Idle);
    assert_eq!(rig.sink.stops_for(StopCause::WatchdogFired), 1);
}

#[test]
fn new_command_while_aligning_cancels_timeout_and_capture() {
    let config = MotionConfig {
        align_timeout_ms: Some(5000),
        ..MotionConfig::default()
    };
    let mut app = MotionService::new(config).expect("valid config");
    let mut rig = Rig::new();

    app.dispatch(Opcode::AlignToBeacon, &mut rig.hw, &mut rig.link, &mut rig.sink);
    app.dispatch(Opcode::DriveReverseHalf, &mut rig.hw, &mut rig.link, &mut rig.sink);
    assert!(!rig.hw.capture_enabled);
    assert_eq!(rig.hw.timer_remaining_ms, None);
    assert!(!app.watchdog().is_armed());
    assert_eq!(app.state(), MotionState::Executing);
}
