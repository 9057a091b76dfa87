//! End-to-end tests through the real `HardwareAdapter`.
//!
//! Direction lines are embedded-hal mock pins, the PWM channels are the
//! LEDC translation layer (register writes are no-ops on host) and the
//! watchdog runs on `SimOneShot`.  Commands arrive through
//! `LinkChannels` exactly as the firmware loop receives them.

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, OutputPin};

use beaconbot::adapters::hardware::HardwareAdapter;
use beaconbot::adapters::link::{ChannelLink, LinkChannels, LinkSignal};
use beaconbot::app::commands::{Direction, Opcode, Rotation};
use beaconbot::app::events::StopCause;
use beaconbot::app::service::{MotionService, MotionState};
use beaconbot::config::MotionConfig;
use beaconbot::drivers::drivetrain::{DriveState, DriveTrain, Wheel};
use beaconbot::drivers::hw_init::{LEDC_CH_LEFT, LEDC_CH_RIGHT, LEDC_DUTY_MAX};
use beaconbot::drivers::hw_timer::SimOneShot;
use beaconbot::drivers::pwm::{LedcPwm, PwmGenerator, PwmState, compare_for};
use beaconbot::events::{CaptureQueue, InterruptSignals};
use beaconbot::sensors::duty_input::DutySampler;

use super::mock_hw::RecordingSink;

#[derive(Debug, Default)]
struct DirPin {
    high: bool,
}

impl ErrorType for DirPin {
    type Error = Infallible;
}

impl OutputPin for DirPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.high = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.high = true;
        Ok(())
    }
}

type Board<'a> = HardwareAdapter<'a, DirPin, LedcPwm, SimOneShot<'a>>;

fn board<'a>(signals: &'a InterruptSignals, config: &MotionConfig) -> Board<'a> {
    let load = config.pwm_load_ticks();
    let wheel = |channel| {
        Wheel::new(
            DirPin::default(),
            PwmGenerator::new(LedcPwm::new(channel, config.pwm_clock_hz), load).expect("ledc"),
        )
    };
    let drivetrain = DriveTrain::new(wheel(LEDC_CH_LEFT), wheel(LEDC_CH_RIGHT));
    HardwareAdapter::new(drivetrain, SimOneShot::new(signals), signals)
}

fn wheel_lines(hw: &Board<'_>) -> (bool, bool) {
    let dt = hw.drivetrain();
    (dt.left().direction_line().high, dt.right().direction_line().high)
}

#[test]
fn rotation_runs_until_watchdog_stops_it() {
    let signals = InterruptSignals::new();
    let config = MotionConfig::default();
    let sampler = DutySampler::new(&signals, config.pot_full_scale);
    let mut queue = CaptureQueue::new();
    let (_edge_in, mut edges) = queue.split();
    let channels = LinkChannels::new();
    let mut link = ChannelLink::new(&channels);
    let mut sink = RecordingSink::new();
    let mut hw = board(&signals, &config);
    let mut app = MotionService::new(config.clone()).expect("valid config");

    assert!(channels.deliver_command(Opcode::RotateCw90.byte()));
    let byte = channels.next_command().expect("command queued");
    app.dispatch_byte(byte, &mut hw, &mut link, &mut sink);

    // Clockwise: left forward (line low), right reverse (line high).
    assert_eq!(wheel_lines(&hw), (false, true));
    let load = config.pwm_load_ticks();
    assert_eq!(
        hw.drivetrain().left().pwm().state(),
        PwmState::Compare(compare_for(60, load))
    );
    assert_eq!(
        hw.drivetrain().state(),
        DriveState::Rotating {
            duty: 60,
            rotation: Rotation::Clockwise
        }
    );
    assert_eq!(hw.timer().remaining_ms(), Some(1500));
    assert!(matches!(channels.take_request(), Some(LinkSignal::RequestNext)));

    hw.timer_mut().advance(1500);
    app.poll(&signals, &mut edges, sampler.input(), &mut hw, &mut sink);

    assert_eq!(hw.drivetrain().state(), DriveState::Stopped);
    assert_eq!(wheel_lines(&hw), (false, false));
    assert_eq!(hw.drivetrain().left().pwm().output().written_duty(), 0);
    assert_eq!(hw.drivetrain().right().pwm().output().written_duty(), 0);
    assert_eq!(sink.stops_for(StopCause::WatchdogFired), 1);
    assert!(channels.take_request().is_none(), "no request after expiry");
}

#[test]
fn configured_period_reaches_ledc_timer() {
    let signals = InterruptSignals::new();
    let config = MotionConfig {
        pwm_period_us: 2000,
        ..MotionConfig::default()
    };
    let channels = LinkChannels::new();
    let mut link = ChannelLink::new(&channels);
    let mut sink = RecordingSink::new();
    let mut hw = board(&signals, &config);
    let mut app = MotionService::new(config.clone()).expect("valid config");

    app.dispatch(Opcode::DriveForwardHalf, &mut hw, &mut link, &mut sink);

    let left = hw.drivetrain().left().pwm();
    assert_eq!(left.load(), 1250);
    assert_eq!(left.output().freq_hz(), 500);
    assert_eq!(hw.drivetrain().right().pwm().output().freq_hz(), 500);
    // Half duty at 500 Hz is still half the LEDC range.
    assert!(left.output().written_duty().abs_diff(LEDC_DUTY_MAX / 2) <= 2);

    let default_hw = board(&signals, &MotionConfig::default());
    assert_eq!(default_hw.drivetrain().left().pwm().output().freq_hz(), 1000);
}

#[test]
fn full_drive_forces_outputs_high() {
    let signals = InterruptSignals::new();
    let config = MotionConfig::default();
    let channels = LinkChannels::new();
    let mut link = ChannelLink::new(&channels);
    let mut sink = RecordingSink::new();
    let mut hw = board(&signals, &config);
    let mut app = MotionService::new(config).expect("valid config");

    app.dispatch(Opcode::DriveReverseFull, &mut hw, &mut link, &mut sink);
    assert_eq!(wheel_lines(&hw), (true, true));
    assert_eq!(hw.drivetrain().left().pwm().state(), PwmState::ForcedHigh);
    assert_eq!(hw.drivetrain().right().pwm().output().written_duty(), LEDC_DUTY_MAX);
    assert!(!hw.timer().is_running());
    assert_eq!(link.sent(), 1);
}

#[test]
fn line_crossed_before_the_command_is_ignored() {
    let signals = InterruptSignals::new();
    let config = MotionConfig::default();
    let sampler = DutySampler::new(&signals, config.pot_full_scale);
    let mut queue = CaptureQueue::new();
    let (_edge_in, mut edges) = queue.split();
    let channels = LinkChannels::new();
    let mut link = ChannelLink::new(&channels);
    let mut sink = RecordingSink::new();
    let mut hw = board(&signals, &config);
    let mut app = MotionService::new(config).expect("valid config");

    // Stale edge latched while the sensor was masked.
    signals.raise_line();
    app.dispatch(Opcode::DriveToLine, &mut hw, &mut link, &mut sink);
    assert!(hw.line_enabled());
    assert_eq!(app.poll(&signals, &mut edges, sampler.input(), &mut hw, &mut sink), 0);
    assert_eq!(
        hw.drivetrain().state(),
        DriveState::Driving {
            duty: 100,
            direction: Direction::Forward
        }
    );

    signals.raise_line();
    app.poll(&signals, &mut edges, sampler.input(), &mut hw, &mut sink);
    assert_eq!(hw.drivetrain().state(), DriveState::Stopped);
    assert!(!hw.line_enabled());
    assert_eq!(sink.stops_for(StopCause::LineReached), 1);
    assert_eq!(app.state(), MotionState::Idle);
}

#[test]
fn pot_reading_rescales_running_drive() {
    let signals = InterruptSignals::new();
    let config = MotionConfig::default();
    let sampler = DutySampler::new(&signals, config.pot_full_scale);
    let mut queue = CaptureQueue::new();
    let (_edge_in, mut edges) = queue.split();
    let channels = LinkChannels::new();
    let mut link = ChannelLink::new(&channels);
    let mut sink = RecordingSink::new();
    let mut hw = board(&signals, &config);
    let mut app = MotionService::new(config).expect("valid config");

    app.dispatch(Opcode::DriveForwardFull, &mut hw, &mut link, &mut sink);
    assert_eq!(sampler.publish_raw(2048), 50);
    assert_eq!(app.poll(&signals, &mut edges, sampler.input(), &mut hw, &mut sink), 1);

    assert_eq!(app.duty_scale(), 50);
    assert_eq!(
        hw.drivetrain().state(),
        DriveState::Driving {
            duty: 50,
            direction: Direction::Forward
        }
    );
}

#[test]
fn end_run_silences_the_link() {
    let signals = InterruptSignals::new();
    let config = MotionConfig::default();
    let channels = LinkChannels::new();
    let mut link = ChannelLink::new(&channels);
    let mut sink = RecordingSink::new();
    let mut hw = board(&signals, &config);
    let mut app = MotionService::new(config).expect("valid config");

    for op in [Opcode::DriveForwardHalf, Opcode::EndRun, Opcode::RotateCw45] {
        assert!(channels.deliver_command(op.byte()));
        if let Some(byte) = channels.next_command() {
            app.dispatch_byte(byte, &mut hw, &mut link, &mut sink);
        }
    }
    assert_eq!(link.sent(), 1);
    assert!(matches!(channels.take_request(), Some(LinkSignal::RequestNext)));
    assert!(channels.take_request().is_none());
    assert_eq!(hw.drivetrain().state(), DriveState::Stopped);
}

#[test]
fn alignment_gates_the_capture_interrupt() {
    let signals = InterruptSignals::new();
    let config = MotionConfig::default();
    let channels = LinkChannels::new();
    let mut link = ChannelLink::new(&channels);
    let mut sink = RecordingSink::new();
    let mut hw = board(&signals, &config);
    let mut app = MotionService::new(config).expect("valid config");

    app.dispatch(Opcode::AlignToBeacon, &mut hw, &mut link, &mut sink);
    assert!(hw.capture_enabled());
    assert_eq!(wheel_lines(&hw), (true, false), "counter-clockwise sweep");

    app.dispatch(Opcode::Stop, &mut hw, &mut link, &mut sink);
    assert!(!hw.capture_enabled());
    assert!(!hw.drivetrain().is_moving());
}
