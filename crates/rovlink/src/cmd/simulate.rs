use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};

use rovlink_device::{DeviceConfig, DeviceController, DeviceError, DeviceLink, SimRover};
use rovlink_transport::UnixLinkListener;
use tracing::info;

use crate::cmd::signal::install_ctrlc_handler;
use crate::cmd::SimulateArgs;
use crate::exit::{device_error, transport_error, CliResult, SUCCESS};

pub fn run(args: SimulateArgs) -> CliResult<i32> {
    let running = install_ctrlc_handler()?;
    let listener =
        UnixLinkListener::bind(&args.socket).map_err(|err| transport_error("bind failed", err))?;
    let tick = Duration::from_millis(args.tick_ms.max(1));
    let config = DeviceConfig {
        name: args.name.clone(),
        ..DeviceConfig::default()
    };
    let start = Instant::now();

    while running.load(Ordering::SeqCst) {
        let stream = listener
            .accept()
            .map_err(|err| transport_error("accept failed", err))?;
        let writer = stream
            .try_clone()
            .map_err(|err| transport_error("accept failed", err))?;

        let rover = SimRover::new();
        let controller = DeviceController::new(config.clone(), rover.collaborators());
        let mut link = DeviceLink::new(stream, writer, controller);
        info!(name = %config.name, "host attached to simulated rover");

        while running.load(Ordering::SeqCst) {
            match link.step(device_millis(start)) {
                Ok(()) => thread::sleep(tick),
                Err(DeviceError::Disconnected) => {
                    info!("host detached from simulated rover");
                    break;
                }
                Err(err) => return Err(device_error("device loop failed", err)),
            }
        }

        if args.once {
            break;
        }
    }

    Ok(SUCCESS)
}

/// Device clock: milliseconds since the simulator started, wrapping like the
/// firmware's `millis()`.
fn device_millis(start: Instant) -> u32 {
    start.elapsed().as_millis() as u32
}
