//! Minimal dashboard: attaches to the in-memory fake adapter and prints
//! every telemetry change for a few seconds.
//!
//! Run with:
//!   cargo run --example fake-dash
//!
//! The same output from the CLI:
//!   cargo run --features cli -- --format pretty monitor fake --duration 3s

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashcan::session::{Endpoint, Session, SessionConfig, SessionObserver};
use dashcan::signal::{ParkDistanceKind, SteeringInput, TelemetrySink};

struct Dash;

impl TelemetrySink for Dash {
    fn on_rpm_changed(&mut self, _old: i32, new: i32) {
        println!("rpm        {new:>5}");
    }

    fn on_speed_changed(&mut self, _old: i32, new: i32) {
        println!("speed      {new:>5} km/h");
    }

    fn on_temperature_changed(&mut self, _old: i32, new: i32) {
        println!("coolant    {new:>5} C");
    }

    fn on_park_distance_changed(&mut self, _kind: ParkDistanceKind, sensors: [u8; 4]) {
        println!("pdc        {sensors:?}");
    }

    fn on_steering_input_triggered(&mut self, kind: SteeringInput) {
        println!("button     {kind:?}");
    }

    fn on_error(&mut self, msg: &str) {
        eprintln!("{msg}");
    }
}

struct Status;

impl SessionObserver for Status {
    fn on_connected(&self, label: &str) {
        eprintln!("Connected to {label}");
    }

    fn on_disconnected(&self) {
        eprintln!("Disconnected");
    }

    fn on_timeout(&self) {
        eprintln!("Adapter went quiet");
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = SessionConfig::default();
    let mut session = Session::connect(
        &Endpoint::Fake,
        &config.signal_decoder().ids(),
        config,
        Arc::new(Status),
    )?;
    let mut dispatcher = session.dispatcher(Dash);

    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline {
        session.step(&mut dispatcher)?;
    }

    eprintln!("{} frames received", session.frames_received());
    session.stop();
    Ok(())
}
