//! Typed records and commands for the rover link.
//!
//! Frames carry positional text fields; this crate gives each category one
//! canonical schema and converts between frames and typed values in both
//! directions. [`RecordRegistry`] is the host-side dispatcher that maps a
//! category token to its parser.

pub mod command;
pub mod config;
pub mod error;
pub(crate) mod fields;
pub mod record;
pub mod registry;
pub mod state;

pub use command::{ActiveMode, Command, HostStatus, RangeLimits, ReportingMode, SpeedGains};
pub use config::{RecordConfig, DEFAULT_SERVO_COUNT};
pub use error::{RecordError, Result};
pub use record::{
    Ack, AckStatus, EncoderReport, ForceReport, HotspotRequest, ImuReport, PowerReport,
    Quaternion, RangeReport, RawRecord, Ready, Record, SafetyReport, ServoReport,
    ShutdownRequest, Vector3,
};
pub use registry::{ParseFn, RecordRegistry};
pub use state::{RoverState, SafetyFlags};
