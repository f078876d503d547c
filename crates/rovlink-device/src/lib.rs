//! Device side of the rover link.
//!
//! [`DeviceController`] turns host commands into actuator calls and sensor
//! samples into telemetry records, with every motor output passing through
//! the [`Interlock`]. [`DeviceLink`] attaches a controller to a byte stream;
//! [`sim::SimRover`] supplies simulated collaborators for tests and the
//! `rovlink simulate` command.

pub mod collaborators;
pub mod config;
pub mod controller;
pub mod error;
pub mod interlock;
pub mod link;
pub mod sim;

pub use collaborators::{
    Actuator, ActuatorError, BumperReading, Collaborators, EncoderReading, ForceReading,
    ImuReading, MotorOutput, PowerReading, RangeReading, Sensor, SensorError, ServoOutput,
};
pub use config::{
    DeviceConfig, ReportIntervals, DEFAULT_DEVICE_NAME, DEFAULT_SERVO_POSITION, MAX_MOTOR_COMMAND,
};
pub use controller::{DeviceController, Outbound};
pub use error::{DeviceError, Result};
pub use interlock::{Interlock, Motion, ObstacleThresholds, RangeWindow};
pub use link::DeviceLink;
pub use sim::SimRover;
