use rovlink_frame::{category, Field, Frame, OutgoingFrame, Token};
use serde::Serialize;

use crate::config::RecordConfig;
use crate::error::Result;
use crate::fields::FieldReader;
use crate::state::{RoverState, SafetyFlags};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Quaternion {
    /// Orientation from Euler angles in radians.
    pub fn from_euler(roll: f64, pitch: f64, yaw: f64) -> Self {
        let (sy, cy) = (yaw * 0.5).sin_cos();
        let (sr, cr) = (roll * 0.5).sin_cos();
        let (sp, cp) = (pitch * 0.5).sin_cos();
        Self {
            w: cy * cr * cp + sy * sr * sp,
            x: cy * sr * cp - sy * cr * sp,
            y: cy * cr * sp + sy * sr * cp,
            z: sy * cr * cp - cy * sr * sp,
        }
    }
}

/// Wheel encoder counts and speeds (`enc`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncoderReport {
    pub time_ms: u32,
    pub left_ticks: i64,
    pub right_ticks: i64,
    /// Ticks per second.
    pub left_speed: f64,
    pub right_speed: f64,
}

impl EncoderReport {
    pub const FIELDS: usize = 5;

    pub fn parse(frame: &Frame) -> Result<Self> {
        let f = FieldReader::new(frame);
        Ok(Self {
            time_ms: f.parse(0)?,
            left_ticks: f.parse(1)?,
            right_ticks: f.parse(2)?,
            left_speed: f.parse(3)?,
            right_speed: f.parse(4)?,
        })
    }

    pub fn to_frame(&self) -> Result<OutgoingFrame> {
        Ok(OutgoingFrame::new(
            category::ENCODER,
            vec![
                self.time_ms.into(),
                self.left_ticks.into(),
                self.right_ticks.into(),
                self.left_speed.into(),
                self.right_speed.into(),
            ],
        )?)
    }
}

/// Front and back time-of-flight ranges (`lox`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeReport {
    pub time_ms: u32,
    pub front_mm: i32,
    pub back_mm: i32,
    pub front_range_status: u32,
    pub back_range_status: u32,
    pub front_device_status: i32,
    pub back_device_status: i32,
}

impl RangeReport {
    pub const FIELDS: usize = 7;

    pub fn parse(frame: &Frame) -> Result<Self> {
        let f = FieldReader::new(frame);
        Ok(Self {
            time_ms: f.parse(0)?,
            front_mm: f.parse(1)?,
            back_mm: f.parse(2)?,
            front_range_status: f.parse(3)?,
            back_range_status: f.parse(4)?,
            front_device_status: f.parse(5)?,
            back_device_status: f.parse(6)?,
        })
    }

    pub fn to_frame(&self) -> Result<OutgoingFrame> {
        Ok(OutgoingFrame::new(
            category::TOF,
            vec![
                self.time_ms.into(),
                self.front_mm.into(),
                self.back_mm.into(),
                self.front_range_status.into(),
                self.back_range_status.into(),
                self.front_device_status.into(),
                self.back_device_status.into(),
            ],
        )?)
    }
}

/// IMU orientation, angular rate and linear acceleration (`bno`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImuReport {
    pub time_ms: u32,
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
    pub gyro: Vector3,
    pub linear_accel: Vector3,
}

impl ImuReport {
    pub const FIELDS: usize = 10;

    pub fn parse(frame: &Frame) -> Result<Self> {
        let f = FieldReader::new(frame);
        Ok(Self {
            time_ms: f.parse(0)?,
            yaw: f.parse(1)?,
            pitch: f.parse(2)?,
            roll: f.parse(3)?,
            gyro: Vector3 {
                x: f.parse(4)?,
                y: f.parse(5)?,
                z: f.parse(6)?,
            },
            linear_accel: Vector3 {
                x: f.parse(7)?,
                y: f.parse(8)?,
                z: f.parse(9)?,
            },
        })
    }

    pub fn orientation(&self) -> Quaternion {
        Quaternion::from_euler(self.roll, self.pitch, self.yaw)
    }

    pub fn to_frame(&self) -> Result<OutgoingFrame> {
        Ok(OutgoingFrame::new(
            category::IMU,
            vec![
                self.time_ms.into(),
                self.yaw.into(),
                self.pitch.into(),
                self.roll.into(),
                self.gyro.x.into(),
                self.gyro.y.into(),
                self.gyro.z.into(),
                self.linear_accel.x.into(),
                self.linear_accel.y.into(),
                self.linear_accel.z.into(),
            ],
        )?)
    }
}

/// Bumper force sensor readings (`fsr`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForceReport {
    pub time_ms: u32,
    pub left: u32,
    pub right: u32,
}

impl ForceReport {
    pub const FIELDS: usize = 3;

    pub fn parse(frame: &Frame) -> Result<Self> {
        let f = FieldReader::new(frame);
        Ok(Self {
            time_ms: f.parse(0)?,
            left: f.parse(1)?,
            right: f.parse(2)?,
        })
    }

    pub fn to_frame(&self) -> Result<OutgoingFrame> {
        Ok(OutgoingFrame::new(
            category::FSR,
            vec![self.time_ms.into(), self.left.into(), self.right.into()],
        )?)
    }
}

/// Battery monitor readings (`ina`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PowerReport {
    pub time_ms: u32,
    pub current_ma: f64,
    pub power_mw: f64,
    pub load_voltage: f64,
}

impl PowerReport {
    pub const FIELDS: usize = 4;

    pub fn parse(frame: &Frame) -> Result<Self> {
        let f = FieldReader::new(frame);
        Ok(Self {
            time_ms: f.parse(0)?,
            current_ma: f.parse(1)?,
            power_mw: f.parse(2)?,
            load_voltage: f.parse(3)?,
        })
    }

    pub fn to_frame(&self) -> Result<OutgoingFrame> {
        Ok(OutgoingFrame::new(
            category::POWER,
            vec![
                self.time_ms.into(),
                self.current_ma.into(),
                self.power_mw.into(),
                self.load_voltage.into(),
            ],
        )?)
    }
}

/// Outcome code the device attaches to an acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AckStatus {
    Ok,
    UnknownCategory,
    BadField,
    Inactive,
    /// The actuator refused or failed to apply the command.
    ActuatorFault,
    Other(i32),
}

impl AckStatus {
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Ok,
            1 => Self::UnknownCategory,
            2 => Self::BadField,
            3 => Self::Inactive,
            4 => Self::ActuatorFault,
            other => Self::Other(other),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::UnknownCategory => 1,
            Self::BadField => 2,
            Self::Inactive => 3,
            Self::ActuatorFault => 4,
            Self::Other(code) => code,
        }
    }

    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

/// Device acknowledgement of one host packet (`txrx`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ack {
    pub packet_num: u32,
    pub status: AckStatus,
}

impl Ack {
    pub const FIELDS: usize = 2;

    pub fn parse(frame: &Frame) -> Result<Self> {
        let f = FieldReader::new(frame);
        Ok(Self {
            packet_num: f.parse(0)?,
            status: AckStatus::from_code(f.parse(1)?),
        })
    }

    pub fn to_frame(&self) -> Result<OutgoingFrame> {
        Ok(OutgoingFrame::new(
            category::ACK,
            vec![self.packet_num.into(), self.status.code().into()],
        )?)
    }
}

/// Safety flags and rover mode (`safe`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SafetyReport {
    pub time_ms: u32,
    pub flags: SafetyFlags,
    pub state: RoverState,
}

impl SafetyReport {
    pub const FIELDS: usize = 12;

    pub fn parse(frame: &Frame) -> Result<Self> {
        let f = FieldReader::new(frame);
        let mut flags = [false; 8];
        for (offset, flag) in flags.iter_mut().enumerate() {
            *flag = f.flag(1 + offset)?;
        }
        Ok(Self {
            time_ms: f.parse(0)?,
            flags: SafetyFlags::from_array(flags),
            state: RoverState {
                active: f.flag(9)?,
                reporting_enabled: f.flag(10)?,
                speed_control_enabled: f.flag(11)?,
            },
        })
    }

    pub fn to_frame(&self) -> Result<OutgoingFrame> {
        let mut fields: Vec<Field> = Vec::with_capacity(Self::FIELDS);
        fields.push(self.time_ms.into());
        fields.extend(self.flags.to_array().into_iter().map(Field::from));
        fields.push(self.state.active.into());
        fields.push(self.state.reporting_enabled.into());
        fields.push(self.state.speed_control_enabled.into());
        Ok(OutgoingFrame::new(category::SAFETY, fields)?)
    }
}

/// Commanded servo positions (`servo`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServoReport {
    pub time_ms: u32,
    pub positions: Vec<i32>,
}

impl ServoReport {
    pub fn parse(frame: &Frame, config: &RecordConfig) -> Result<Self> {
        let f = FieldReader::new(frame);
        let positions = (1..=config.servo_count)
            .map(|index| f.parse(index))
            .collect::<Result<Vec<i32>>>()?;
        Ok(Self {
            time_ms: f.parse(0)?,
            positions,
        })
    }

    pub fn to_frame(&self) -> Result<OutgoingFrame> {
        let mut fields: Vec<Field> = Vec::with_capacity(1 + self.positions.len());
        fields.push(self.time_ms.into());
        fields.extend(self.positions.iter().copied().map(Field::from));
        Ok(OutgoingFrame::new(category::SERVO, fields)?)
    }
}

/// Identification reply (`ready`). The first one accepted starts the time
/// base.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ready {
    pub time_ms: u32,
    pub name: String,
}

impl Ready {
    pub const FIELDS: usize = 2;

    pub fn parse(frame: &Frame) -> Result<Self> {
        let f = FieldReader::new(frame);
        Ok(Self {
            time_ms: f.parse(0)?,
            name: f.text(1)?,
        })
    }

    pub fn to_frame(&self) -> Result<OutgoingFrame> {
        Ok(OutgoingFrame::new(
            category::READY,
            vec![self.time_ms.into(), Token::new(self.name.as_str())?.into()],
        )?)
    }
}

/// Device asks the host to power off (`shutdown`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShutdownRequest {
    pub name: String,
}

impl ShutdownRequest {
    pub const FIELDS: usize = 1;

    pub fn parse(frame: &Frame) -> Result<Self> {
        Ok(Self {
            name: FieldReader::new(frame).text(0)?,
        })
    }

    pub fn to_frame(&self) -> Result<OutgoingFrame> {
        Ok(OutgoingFrame::new(
            category::SHUTDOWN,
            vec![Token::new(self.name.as_str())?.into()],
        )?)
    }
}

/// Device asks the host to change its wifi hotspot mode (`wifi`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HotspotRequest {
    pub mode: i32,
}

impl HotspotRequest {
    pub const FIELDS: usize = 1;

    pub fn parse(frame: &Frame) -> Result<Self> {
        Ok(Self {
            mode: FieldReader::new(frame).parse(0)?,
        })
    }

    pub fn to_frame(&self) -> Result<OutgoingFrame> {
        Ok(OutgoingFrame::new(
            category::HOTSPOT,
            vec![self.mode.into()],
        )?)
    }
}

/// Fields of a category handled by a caller-registered parser.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawRecord {
    pub category: String,
    pub fields: Vec<String>,
}

impl RawRecord {
    pub fn from_frame(frame: &Frame) -> Self {
        Self {
            category: frame.category.clone(),
            fields: frame.fields().to_vec(),
        }
    }
}

/// A decoded device → host record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Encoder(EncoderReport),
    Range(RangeReport),
    Imu(ImuReport),
    Force(ForceReport),
    Power(PowerReport),
    Ack(Ack),
    Safety(SafetyReport),
    Servo(ServoReport),
    Ready(Ready),
    Shutdown(ShutdownRequest),
    Hotspot(HotspotRequest),
    Raw(RawRecord),
}

impl Record {
    /// Category token this record travels under.
    pub fn category(&self) -> &str {
        match self {
            Record::Encoder(_) => category::ENCODER,
            Record::Range(_) => category::TOF,
            Record::Imu(_) => category::IMU,
            Record::Force(_) => category::FSR,
            Record::Power(_) => category::POWER,
            Record::Ack(_) => category::ACK,
            Record::Safety(_) => category::SAFETY,
            Record::Servo(_) => category::SERVO,
            Record::Ready(_) => category::READY,
            Record::Shutdown(_) => category::SHUTDOWN,
            Record::Hotspot(_) => category::HOTSPOT,
            Record::Raw(raw) => &raw.category,
        }
    }

    /// Device timestamp, for records that carry one.
    pub fn time_ms(&self) -> Option<u32> {
        match self {
            Record::Encoder(r) => Some(r.time_ms),
            Record::Range(r) => Some(r.time_ms),
            Record::Imu(r) => Some(r.time_ms),
            Record::Force(r) => Some(r.time_ms),
            Record::Power(r) => Some(r.time_ms),
            Record::Safety(r) => Some(r.time_ms),
            Record::Servo(r) => Some(r.time_ms),
            Record::Ready(r) => Some(r.time_ms),
            Record::Ack(_) | Record::Shutdown(_) | Record::Hotspot(_) | Record::Raw(_) => None,
        }
    }

    pub fn to_frame(&self) -> Result<OutgoingFrame> {
        match self {
            Record::Encoder(r) => r.to_frame(),
            Record::Range(r) => r.to_frame(),
            Record::Imu(r) => r.to_frame(),
            Record::Force(r) => r.to_frame(),
            Record::Power(r) => r.to_frame(),
            Record::Ack(r) => r.to_frame(),
            Record::Safety(r) => r.to_frame(),
            Record::Servo(r) => r.to_frame(),
            Record::Ready(r) => r.to_frame(),
            Record::Shutdown(r) => r.to_frame(),
            Record::Hotspot(r) => r.to_frame(),
            Record::Raw(raw) => {
                let fields = raw
                    .fields
                    .iter()
                    .map(|f| Token::new(f.as_str()).map(Field::from))
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(OutgoingFrame::new(&raw.category, fields)?)
            }
        }
    }
}
