//! Simulated rover on a Unix socket. Serves one host until it disconnects.
//!
//! Run with:
//!   cargo run --example sim-device --features device
//!
//! In another terminal:
//!   cargo run --example bridge -- /tmp/rovlink-sim-<pid>/rover.sock

use std::fs;
use std::thread;
use std::time::{Duration, Instant};

use rovlink::device::{DeviceConfig, DeviceController, DeviceError, DeviceLink, SimRover};
use rovlink::transport::UnixLinkListener;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sock_dir = std::env::temp_dir().join(format!("rovlink-sim-{}", std::process::id()));
    fs::create_dir_all(&sock_dir)?;
    let sock_path = sock_dir.join("rover.sock");

    let listener = UnixLinkListener::bind(&sock_path)?;
    eprintln!("Simulated rover on {}", sock_path.display());

    let stream = listener.accept()?;
    let writer = stream.try_clone()?;
    let rover = SimRover::new();
    let controller = DeviceController::new(DeviceConfig::default(), rover.collaborators());
    let mut link = DeviceLink::new(stream, writer, controller);

    let start = Instant::now();
    loop {
        let now_ms = start.elapsed().as_millis() as u32;
        match link.step(now_ms) {
            Ok(()) => thread::sleep(Duration::from_millis(10)),
            Err(DeviceError::Disconnected) => {
                eprintln!("Host disconnected");
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    drop(listener);
    let _ = fs::remove_dir_all(&sock_dir);
    Ok(())
}
