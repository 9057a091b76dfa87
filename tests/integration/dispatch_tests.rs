//! Command dispatcher integration tests.
//!
//! Exercises `MotionService` dispatch, flow control and the dispatch gate
//! through mock port adapters.

use beaconbot::app::commands::{Direction, Opcode, Rotation, SENTINEL_BYTE};
use beaconbot::app::events::{AppEvent, StopCause};
use beaconbot::app::service::{MotionService, MotionState};
use beaconbot::config::MotionConfig;

use super::mock_hw::{Call, Rig};

fn service() -> MotionService {
    MotionService::new(MotionConfig::default()).expect("valid config")
}

fn dispatch(app: &mut MotionService, rig: &mut Rig, op: Opcode) {
    app.dispatch(op, &mut rig.hw, &mut rig.link, &mut rig.sink);
}

// ── Rotations ─────────────────────────────────────────────────

#[test]
fn rotate_cw90_arms_90_timeout_then_rotates_clockwise() {
    let mut app = service();
    let mut rig = Rig::new();

    dispatch(&mut app, &mut rig, Opcode::RotateCw90);

    let armed = rig.hw.position(Call::StartOnce(1500)).expect("watchdog armed");
    let rotated = rig
        .hw
        .position(Call::Rotate {
            rotation: Rotation::Clockwise,
            duty: 60,
        })
        .expect("rotation started");
    assert!(armed < rotated, "watchdog must be armed before the rotation starts");
    assert_eq!(app.state(), MotionState::Executing);
    assert!(app.watchdog().is_armed());
    assert!(rig.sink.contains(&AppEvent::WatchdogArmed { timeout_ms: 1500 }));
}

#[test]
fn rotate_45_gets_the_shorter_timeout() {
    let mut app = service();
    let mut rig = Rig::new();

    dispatch(&mut app, &mut rig, Opcode::RotateCcw45);
    assert_eq!(rig.hw.count(Call::StartOnce(750)), 1);
    assert_eq!(
        rig.hw.last_motion(),
        Some(Call::Rotate {
            rotation: Rotation::CounterClockwise,
            duty: 60
        })
    );
}

// ── Drives ────────────────────────────────────────────────────

#[test]
fn drives_never_arm_the_watchdog() {
    for (op, duty, direction) in [
        (Opcode::DriveForwardHalf, 50, Direction::Forward),
        (Opcode::DriveForwardFull, 100, Direction::Forward),
        (Opcode::DriveReverseHalf, 50, Direction::Reverse),
        (Opcode::DriveReverseFull, 100, Direction::Reverse),
    ] {
        let mut app = service();
        let mut rig = Rig::new();
        dispatch(&mut app, &mut rig, op);

        assert_eq!(rig.hw.last_motion(), Some(Call::Drive { duty, direction }), "{op}");
        assert!(
            !rig.hw.calls().iter().any(|c| matches!(c, Call::StartOnce(_))),
            "{op} must not arm the watchdog"
        );
        assert!(!app.watchdog().is_armed());
    }
}

#[test]
fn drive_to_line_enables_sensor_and_drives_full() {
    let mut app = service();
    let mut rig = Rig::new();

    dispatch(&mut app, &mut rig, Opcode::DriveToLine);
    assert!(rig.hw.line_enabled);
    assert_eq!(
        rig.hw.last_motion(),
        Some(Call::Drive {
            duty: 100,
            direction: Direction::Forward
        })
    );
    assert_eq!(app.state(), MotionState::Executing);

    app.on_line_detected(&mut rig.hw, &mut rig.sink);
    assert_eq!(rig.hw.last_motion(), Some(Call::Stop));
    assert!(!rig.hw.line_enabled);
    assert_eq!(app.state(), MotionState::Idle);
    assert_eq!(rig.sink.stops_for(StopCause::LineReached), 1);
    // Completion is not a dispatch: no extra request.
    assert_eq!(rig.link.requests, 1);
}

// ── Stop / EndRun ─────────────────────────────────────────────

#[test]
fn stop_halts_a_drive() {
    let mut app = service();
    let mut rig = Rig::new();

    dispatch(&mut app, &mut rig, Opcode::DriveReverseFull);
    dispatch(&mut app, &mut rig, Opcode::Stop);
    assert_eq!(rig.hw.last_motion(), Some(Call::Stop));
    assert_eq!(app.state(), MotionState::Idle);
    assert_eq!(rig.link.requests, 2);
}

#[test]
fn end_run_stops_and_closes_the_gate() {
    let mut app = service();
    let mut rig = Rig::new();

    dispatch(&mut app, &mut rig, Opcode::DriveForwardFull);
    dispatch(&mut app, &mut rig, Opcode::EndRun);
    assert_eq!(rig.hw.last_motion(), Some(Call::Stop));
    assert!(!app.gate_open());
    assert!(rig.sink.contains(&AppEvent::RunEnded));
    assert_eq!(rig.link.requests, 1, "EndRun itself sends no request");

    for op in Opcode::ALL {
        dispatch(&mut app, &mut rig, op);
    }
    app.dispatch_byte(0x7E, &mut rig.hw, &mut rig.link, &mut rig.sink);
    assert_eq!(rig.link.requests, 1, "gate stays closed until reset");
}

#[test]
fn reset_reopens_the_gate() {
    let mut app = service();
    let mut rig = Rig::new();

    dispatch(&mut app, &mut rig, Opcode::EndRun);
    app.reset(&mut rig.hw, &mut rig.sink);
    dispatch(&mut app, &mut rig, Opcode::RotateCw45);
    assert_eq!(rig.link.requests, 1);
}

// ── Flow control ──────────────────────────────────────────────

#[test]
fn one_request_per_dispatch_except_end_run() {
    for op in Opcode::ALL {
        let mut app = service();
        let mut rig = Rig::new();
        dispatch(&mut app, &mut rig, op);
        let expected = u32::from(op != Opcode::EndRun);
        assert_eq!(rig.link.requests, expected, "{op}");
        assert_eq!(app.next_requests(), expected, "{op}");
    }
}

#[test]
fn request_is_the_last_side_effect() {
    for op in Opcode::ALL.into_iter().filter(|op| *op != Opcode::EndRun) {
        let mut app = service();
        let mut rig = Rig::new();
        dispatch(&mut app, &mut rig, op);
        assert_eq!(rig.hw.calls().last(), Some(&Call::RequestNext), "{op}");
    }
}

#[test]
fn unknown_opcode_is_a_noop_that_still_requests() {
    let mut app = service();
    let mut rig = Rig::new();

    app.dispatch_byte(0x7E, &mut rig.hw, &mut rig.link, &mut rig.sink);
    assert_eq!(rig.hw.calls(), vec![Call::RequestNext]);
    assert_eq!(app.state(), MotionState::Idle);
    assert!(rig.sink.contains(&AppEvent::UnknownOpcode(0x7E)));
}

#[test]
fn unknown_opcode_does_not_disturb_motion_in_flight() {
    let mut app = service();
    let mut rig = Rig::new();

    dispatch(&mut app, &mut rig, Opcode::RotateCw90);
    app.dispatch_byte(0x01, &mut rig.hw, &mut rig.link, &mut rig.sink);
    assert!(app.watchdog().is_armed());
    assert_eq!(app.state(), MotionState::Executing);
    assert_eq!(rig.link.requests, 2);
}

#[test]
fn sentinel_byte_is_not_a_command() {
    let mut app = service();
    let mut rig = Rig::new();

    app.dispatch_byte(SENTINEL_BYTE, &mut rig.hw, &mut rig.link, &mut rig.sink);
    assert!(rig.hw.calls().is_empty());
    assert_eq!(rig.link.requests, 0);
    assert!(rig.sink.contains(&AppEvent::SentinelIgnored));
}

#[test]
fn wire_bytes_dispatch_like_opcodes() {
    let mut app = service();
    let mut rig = Rig::new();

    app.dispatch_byte(0x03, &mut rig.hw, &mut rig.link, &mut rig.sink);
    assert_eq!(rig.hw.count(Call::StartOnce(750)), 1);
    assert_eq!(app.telemetry().last_opcode, Some(Opcode::RotateCw45));
}

// ── Exclusivity ───────────────────────────────────────────────

#[test]
fn new_command_supersedes_rotation() {
    let mut app = service();
    let mut rig = Rig::new();

    dispatch(&mut app, &mut rig, Opcode::RotateCw90);
    dispatch(&mut app, &mut rig, Opcode::DriveForwardHalf);
    assert!(!app.watchdog().is_armed());
    assert_eq!(rig.hw.timer_remaining_ms, None);
    assert_eq!(
        rig.hw.last_motion(),
        Some(Call::Drive {
            duty: 50,
            direction: Direction::Forward
        })
    );
}

#[test]
fn state_changes_are_reported() {
    let mut app = service();
    let mut rig = Rig::new();

    app.start(&mut rig.sink);
    dispatch(&mut app, &mut rig, Opcode::AlignToBeacon);
    dispatch(&mut app, &mut rig, Opcode::Stop);
    assert_eq!(rig.sink.events[0], AppEvent::Started(MotionState::Idle));
    assert!(rig.sink.contains(&AppEvent::StateChanged {
        from: MotionState::Idle,
        to: MotionState::Converging
    }));
    assert!(rig.sink.contains(&AppEvent::StateChanged {
        from: MotionState::Converging,
        to: MotionState::Idle
    }));
}

// ── Duty scaling ──────────────────────────────────────────────

#[test]
fn duty_scale_applies_to_new_and_running_motion() {
    let mut app = service();
    let mut rig = Rig::new();

    app.on_duty_poll(50, &mut rig.hw, &mut rig.sink);
    dispatch(&mut app, &mut rig, Opcode::RotateCw90);
    assert_eq!(
        rig.hw.last_motion(),
        Some(Call::Rotate {
            rotation: Rotation::Clockwise,
            duty: 30
        })
    );

    app.on_duty_poll(100, &mut rig.hw, &mut rig.sink);
    assert_eq!(
        rig.hw.last_motion(),
        Some(Call::Rotate {
            rotation: Rotation::Clockwise,
            duty: 60
        })
    );
    assert!(rig.sink.contains(&AppEvent::DutyScaleChanged(50)));
}

#[test]
fn duty_scale_change_while_idle_moves_nothing() {
    let mut app = service();
    let mut rig = Rig::new();

    app.on_duty_poll(20, &mut rig.hw, &mut rig.sink);
    assert!(rig.hw.calls().is_empty());
    assert_eq!(app.duty_scale(), 20);
}
