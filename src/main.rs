//! BeaconBot firmware entry point.
//!
//! Hexagonal architecture with interrupt-signalled, run-to-completion
//! execution.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter          ChannelLink       LogEventSink       │
//! │  (Actuator+OneShot+Gate)  (LinkPort)        (EventSink)        │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │             MotionService (pure logic)                 │    │
//! │  │  Dispatcher · Watchdog · Beacon detector               │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  ISRs: capture edge · line sensor · one-shot · duty poll       │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything the ISRs share with the loop is leaked once at boot and
//! handed to them as callback arguments.
#![deny(unused_must_use)]

use std::io::Read;

use anyhow::Result;
use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::gpio::{AnyOutputPin, Output, OutputPin, PinDriver};
use esp_idf_hal::peripherals::Peripherals;
use log::{error, info, warn};

use beaconbot::adapters::hardware::HardwareAdapter;
use beaconbot::adapters::link::{ChannelLink, LinkChannels, LinkSignal};
use beaconbot::adapters::log_sink::{LogEventSink, TelemetryPacer, log_telemetry};
use beaconbot::app::service::MotionService;
use beaconbot::config::MotionConfig;
use beaconbot::drivers::drivetrain::{DriveTrain, Wheel};
use beaconbot::drivers::hw_init::{self, LEDC_CH_LEFT, LEDC_CH_RIGHT};
use beaconbot::drivers::hw_timer::{DutyPollTimer, EspOneShot};
use beaconbot::drivers::pwm::{LedcPwm, PwmGenerator};
use beaconbot::error::Error;
use beaconbot::events::{CaptureQueue, InterruptSignals};
use beaconbot::pins;
use beaconbot::sensors::beacon::SharedEstimate;
use beaconbot::sensors::capture::{CaptureIsrContext, capture_isr};
use beaconbot::sensors::duty_input::DutySampler;
use beaconbot::sensors::line::line_isr;

/// Interval between status reports.
const TELEMETRY_PERIOD_MS: u32 = 1000;

type DirLine = PinDriver<'static, AnyOutputPin, Output>;

// ── Config ────────────────────────────────────────────────────

fn load_config() -> MotionConfig {
    match MotionConfig::from_json(include_str!("../config/motion.json")) {
        Ok(cfg) => {
            info!("Config loaded from image");
            cfg
        }
        Err(e) => {
            warn!("Baked-in config rejected ({}), using defaults", e);
            MotionConfig::default()
        }
    }
}

// ── Console link ──────────────────────────────────────────────
//
// Stand-in for the SPI link service: every byte on the console UART is a
// command, every flow-control request is echoed back as `>`.

fn spawn_console_link(channels: &'static LinkChannels) -> Result<()> {
    std::thread::Builder::new()
        .name("link".into())
        .stack_size(4096)
        .spawn(move || {
            let mut stdin = std::io::stdin();
            let mut byte = [0u8; 1];
            loop {
                while let Some(LinkSignal::RequestNext) = channels.take_request() {
                    println!(">");
                }
                match stdin.read(&mut byte) {
                    Ok(1) => {
                        if !channels.deliver_command(byte[0]) {
                            warn!("link: command 0x{:02X} dropped, loop busy", byte[0]);
                        }
                    }
                    _ => FreeRtos::delay_ms(10),
                }
            }
        })?;
    Ok(())
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  BeaconBot v{}                       ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let config = load_config();

    // ── 2. Peripherals ────────────────────────────────────────
    if let Err(e) = hw_init::init_peripherals(config.pwm_freq_hz()) {
        error!("HAL init failed: {}", e);
        return Err(Error::from(e).into());
    }
    let peripherals = Peripherals::take()?;
    let left_dir: DirLine = PinDriver::output(peripherals.pins.gpio2.downgrade_output())?;
    let right_dir: DirLine = PinDriver::output(peripherals.pins.gpio4.downgrade_output())?;

    // ── 3. Shared ISR state (leaked, lives forever) ───────────
    let signals: &'static InterruptSignals = Box::leak(Box::new(InterruptSignals::new()));
    let queue: &'static mut CaptureQueue = Box::leak(Box::new(CaptureQueue::new()));
    let (edge_producer, mut edges) = queue.split();
    let capture_ctx: &'static mut CaptureIsrContext =
        Box::leak(Box::new(CaptureIsrContext::new(edge_producer, signals)));
    let estimate: &'static SharedEstimate = Box::leak(Box::new(SharedEstimate::new()));
    let sampler: &'static DutySampler<'static> =
        Box::leak(Box::new(DutySampler::new(signals, config.pot_full_scale)));
    let link_channels: &'static LinkChannels = Box::leak(Box::new(LinkChannels::new()));

    hw_init::attach_isr(
        pins::BEACON_CAPTURE_GPIO,
        capture_isr,
        core::ptr::from_mut(capture_ctx).cast(),
    )
    .map_err(Error::from)?;
    hw_init::attach_isr(
        pins::LINE_SENSOR_GPIO,
        line_isr,
        core::ptr::from_ref(signals).cast_mut().cast(),
    )
    .map_err(Error::from)?;

    // ── 4. Adapters ───────────────────────────────────────────
    let load = config.pwm_load_ticks();
    let left = Wheel::new(
        left_dir,
        PwmGenerator::new(LedcPwm::new(LEDC_CH_LEFT, config.pwm_clock_hz), load).map_err(Error::from)?,
    );
    let right = Wheel::new(
        right_dir,
        PwmGenerator::new(LedcPwm::new(LEDC_CH_RIGHT, config.pwm_clock_hz), load).map_err(Error::from)?,
    );
    let one_shot = EspOneShot::new(signals).map_err(Error::from)?;
    let mut hw = HardwareAdapter::new(DriveTrain::new(left, right), one_shot, signals);

    let mut link = ChannelLink::new(link_channels);
    let mut log_sink = LogEventSink::new();

    let _duty_timer = DutyPollTimer::start(sampler, config.duty_poll_interval_ms).map_err(Error::from)?;
    spawn_console_link(link_channels)?;

    // ── 5. Motion service ─────────────────────────────────────
    let mut app = MotionService::new(config).map_err(Error::from)?;
    app.attach_estimate(estimate);
    app.start(&mut log_sink);

    info!("System ready. Entering service loop.");

    // ── 6. Service loop ───────────────────────────────────────
    let mut pacer = TelemetryPacer::new(TELEMETRY_PERIOD_MS, hw_init::uptime_ms());
    loop {
        // Interrupt work and self-events first, then at most one command.
        app.poll(signals, &mut edges, sampler.input(), &mut hw, &mut log_sink);

        if let Some(byte) = link_channels.next_command() {
            app.dispatch_byte(byte, &mut hw, &mut link, &mut log_sink);
        }

        if pacer.due(hw_init::uptime_ms()) {
            log_telemetry(&app.telemetry());
            let est = estimate.snapshot();
            if est.sample_count > 0 {
                info!(
                    "BEACON| instant={}Hz avg={}Hz n={} overruns={}",
                    est.instant_hz,
                    est.averaged_hz,
                    est.sample_count,
                    signals.capture_overruns()
                );
            }
            if link.dropped() > 0 {
                warn!("link: {} requests dropped so far", link.dropped());
            }
        }

        FreeRtos::delay_ms(1);
    }
}
