//! Connect to a rover, start it and print ten seconds of telemetry.
//!
//! Run with:
//!   cargo run --example bridge -- /dev/ttyAMA0
//!
//! The path may also be a socket served by the `sim-device` example.

use std::thread;
use std::time::{Duration, Instant};

use rovlink::session::{connect, PollOutcome, SessionConfig};
use rovlink::transport::SerialOptions;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let port = std::env::args()
        .nth(1)
        .ok_or("usage: bridge <PORT>")?;

    let mut session = connect(&port, &SerialOptions::default(), SessionConfig::default())?;
    session.on_any(|delivery| {
        println!(
            "#{} {} {:?}",
            delivery.sequence,
            delivery.record.category(),
            delivery.record
        );
    });
    session.start()?;

    let until = Instant::now() + Duration::from_secs(10);
    while Instant::now() < until {
        if session.poll()? == PollOutcome::Idle {
            thread::sleep(Duration::from_millis(5));
        }
    }

    session.shutdown()?;
    eprintln!("{:?}", session.stats());
    Ok(())
}
