//! Interfaces to the rover's sensors and actuators.
//!
//! Drivers live outside this crate. The controller only sees these traits,
//! so the same control loop runs against hardware, the simulator in
//! [`crate::sim`], or test doubles.

use rovlink_records::Vector3;

/// Errors a sensor can report instead of a reading.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SensorError {
    #[error("sensor not responding")]
    NotResponding,
    #[error("sensor reported device status {0}")]
    Status(i32),
}

/// Errors an actuator can report instead of applying a value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActuatorError {
    #[error("actuator is in standby")]
    Standby,
    #[error("actuator not responding")]
    NotResponding,
}

pub trait Sensor {
    type Reading;

    /// Take one reading.
    fn sample(&mut self) -> Result<Self::Reading, SensorError>;

    /// Zero accumulated state such as encoder counts.
    fn reset(&mut self) {}

    /// Driver status without taking a reading.
    fn healthy(&self) -> bool {
        true
    }
}

pub trait Actuator {
    type Value;

    /// Apply a value. Returns the value actually applied, which may be
    /// clamped by the driver.
    fn command(&mut self, value: Self::Value) -> Result<Self::Value, ActuatorError>;

    /// Enter or leave low-power standby.
    fn standby(&mut self, standby: bool);
}

/// One time-of-flight measurement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RangeReading {
    pub range_mm: i32,
    /// Ranging status; 4 and above means the measurement is unusable.
    pub range_status: u32,
    /// Sensor health; nonzero means the sensor is faulted.
    pub device_status: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BumperReading {
    pub left: bool,
    pub right: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EncoderReading {
    pub left_ticks: i64,
    pub right_ticks: i64,
    pub left_speed: f64,
    pub right_speed: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ImuReading {
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
    pub gyro: Vector3,
    pub linear_accel: Vector3,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForceReading {
    pub left: u32,
    pub right: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PowerReading {
    pub current_ma: f64,
    pub power_mw: f64,
    pub load_voltage: f64,
}

/// Output for the two drive channels, each in -255..=255.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MotorOutput {
    pub left: f64,
    pub right: f64,
}

impl MotorOutput {
    pub const ZERO: MotorOutput = MotorOutput {
        left: 0.0,
        right: 0.0,
    };

    pub fn new(left: f64, right: f64) -> Self {
        Self { left, right }
    }

    pub fn is_zero(&self) -> bool {
        self.left == 0.0 && self.right == 0.0
    }

    pub fn is_finite(&self) -> bool {
        self.left.is_finite() && self.right.is_finite()
    }

    /// Limit both channels to `-limit..=limit`.
    pub fn clamped(self, limit: f64) -> Self {
        Self {
            left: self.left.clamp(-limit, limit),
            right: self.right.clamp(-limit, limit),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServoOutput {
    pub index: u32,
    pub position: i32,
}

/// The full set of collaborators a controller drives.
pub struct Collaborators {
    pub front_range: Box<dyn Sensor<Reading = RangeReading>>,
    pub back_range: Box<dyn Sensor<Reading = RangeReading>>,
    pub bumpers: Box<dyn Sensor<Reading = BumperReading>>,
    pub encoders: Box<dyn Sensor<Reading = EncoderReading>>,
    pub imu: Box<dyn Sensor<Reading = ImuReading>>,
    pub force: Box<dyn Sensor<Reading = ForceReading>>,
    pub power: Box<dyn Sensor<Reading = PowerReading>>,
    pub motors: Box<dyn Actuator<Value = MotorOutput>>,
    pub servos: Box<dyn Actuator<Value = ServoOutput>>,
}

impl Collaborators {
    /// Reset every sensor's accumulated state.
    pub fn reset_sensors(&mut self) {
        self.front_range.reset();
        self.back_range.reset();
        self.bumpers.reset();
        self.encoders.reset();
        self.imu.reset();
        self.force.reset();
        self.power.reset();
    }
}
