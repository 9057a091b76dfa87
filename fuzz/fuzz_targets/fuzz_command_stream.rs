//! Fuzz target: `MotionService::dispatch_byte`
//!
//! Feeds arbitrary command bytes into the dispatcher and asserts that the
//! flow-control count matches the stream and that the wheels are never
//! left moving after a Stop or EndRun.
//!
//! cargo fuzz run fuzz_command_stream

#![no_main]

use libfuzzer_sys::fuzz_target;

use beaconbot::app::commands::{Direction, Opcode, Rotation, SENTINEL_BYTE};
use beaconbot::app::events::AppEvent;
use beaconbot::app::ports::{ActuatorPort, EventSink, LinkPort, OneShotPort, SensorGatePort};
use beaconbot::app::service::{MotionService, MotionState};
use beaconbot::config::MotionConfig;

#[derive(Default)]
struct Hw {
    moving: bool,
    timer_armed: bool,
}

impl ActuatorPort for Hw {
    fn drive(&mut self, duty: u8, _direction: Direction) {
        self.moving = duty > 0;
    }
    fn start_rotation(&mut self, _rotation: Rotation, duty: u8) {
        self.moving = duty > 0;
    }
    fn stop(&mut self) {
        self.moving = false;
    }
}

impl OneShotPort for Hw {
    fn start_once(&mut self, _timeout_ms: u32) {
        self.timer_armed = true;
    }
    fn cancel(&mut self) {
        self.timer_armed = false;
    }
}

impl SensorGatePort for Hw {
    fn enable_capture(&mut self) {}
    fn disable_capture(&mut self) {}
    fn enable_line_sensor(&mut self) {}
    fn disable_line_sensor(&mut self) {}
}

struct Link(u32);

impl LinkPort for Link {
    fn request_next(&mut self) {
        self.0 += 1;
    }
}

struct Sink;

impl EventSink for Sink {
    fn emit(&mut self, _event: &AppEvent) {}
}

fuzz_target!(|data: &[u8]| {
    let mut app = MotionService::new(MotionConfig::default()).expect("default config is valid");
    let mut hw = Hw::default();
    let mut link = Link(0);
    let mut expected = 0u32;

    for &b in data {
        let before = link.0;
        app.dispatch_byte(b, &mut hw, &mut link, &mut Sink);

        if app.gate_open() && b != SENTINEL_BYTE {
            expected += 1;
        }
        assert!(link.0 - before <= 1, "at most one request per byte");

        if b == Opcode::Stop.byte() || b == Opcode::EndRun.byte() {
            assert!(!hw.moving, "stop must leave the wheels idle");
            assert!(!hw.timer_armed, "stop must leave the watchdog disarmed");
            assert_eq!(app.state(), MotionState::Idle);
        }
        assert_eq!(app.watchdog().is_armed(), hw.timer_armed);
    }
    assert_eq!(link.0, expected);
});
