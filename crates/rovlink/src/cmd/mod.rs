use clap::{Args, Subcommand};
use std::path::PathBuf;

use rovlink_transport::DEFAULT_BAUD;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod bridge;
pub mod decode;
pub mod send;
pub mod signal;
pub mod simulate;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect to a rover, start it and print its telemetry.
    Bridge(BridgeArgs),
    /// Send one command to a rover.
    Send(SendArgs),
    /// Decode a captured byte stream.
    Decode(DecodeArgs),
    /// Serve a simulated rover on a Unix socket.
    Simulate(SimulateArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Bridge(args) => bridge::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Simulate(args) => simulate::run(args),
        Command::Version(args) => version::run(args),
    }
}

/// Options shared by every command that opens a link.
#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Serial device or simulator socket.
    #[arg(env = "ROVLINK_PORT")]
    pub port: PathBuf,
    /// Serial line rate.
    #[arg(long, default_value_t = DEFAULT_BAUD)]
    pub baud: u32,
    /// Handshake timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
    /// Name announced in the identify command.
    #[arg(long, default_value = rovlink_session::DEFAULT_HOST_NAME)]
    pub name: String,
}

#[derive(Args, Debug)]
pub struct BridgeArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Only print these categories (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub categories: Option<Vec<String>>,
    /// Exit after printing N records.
    #[arg(long)]
    pub count: Option<usize>,
    /// Print link counters on exit.
    #[arg(long)]
    pub stats: bool,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Wait for the device acknowledgement and print it.
    #[arg(long)]
    pub wait_ack: bool,
    /// Maximum time to wait for the acknowledgement (e.g. 2s, 500ms).
    #[arg(long, default_value = "2s")]
    pub ack_timeout: String,
    #[command(subcommand)]
    pub command: SendCommand,
}

#[derive(Subcommand, Debug)]
pub enum SendCommand {
    /// Arm motors and servos.
    Activate,
    /// Stop and disarm motors and servos.
    Deactivate,
    /// Restart the rover.
    Restart,
    /// Turn periodic reports on or off.
    Reporting {
        #[arg(value_parser = ["on", "off"])]
        state: String,
    },
    /// Zero encoders and re-initialise sensors.
    ResetSensors,
    /// Set left and right motor commands.
    Motors {
        #[arg(allow_negative_numbers = true)]
        left: f64,
        #[arg(allow_negative_numbers = true)]
        right: f64,
    },
    /// Move one servo.
    Servo { index: u32, position: i32 },
    /// Return one servo to its default position.
    ServoDefault { index: u32 },
    /// Set obstacle thresholds in millimetres.
    Thresholds {
        front_upper: u32,
        back_upper: u32,
        front_lower: u32,
        back_lower: u32,
    },
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Capture file. Reads stdin when omitted.
    pub file: Option<PathBuf>,
    /// Positions carried by a servo record.
    #[arg(long, default_value_t = rovlink_records::DEFAULT_SERVO_COUNT)]
    pub servo_count: usize,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Socket path to bind.
    pub socket: PathBuf,
    /// Name reported in the ready record.
    #[arg(long, default_value = rovlink_device::DEFAULT_DEVICE_NAME)]
    pub name: String,
    /// Control loop period in milliseconds.
    #[arg(long, default_value_t = 10)]
    pub tick_ms: u64,
    /// Exit after the first host disconnects.
    #[arg(long)]
    pub once: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
