use rovlink_frame::{category, Field, Frame, OutgoingFrame, Token};
use serde::Serialize;

use crate::error::{RecordError, Result};
use crate::fields::FieldReader;

/// Argument of the `<>` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActiveMode {
    Deactivate,
    Activate,
    Restart,
}

/// Argument of the `[]` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportingMode {
    Off,
    On,
    ResetSensors,
}

macro_rules! mode_codes {
    ($ty:ident { $($variant:ident = $code:literal),+ $(,)? }) => {
        impl $ty {
            pub fn code(self) -> u8 {
                match self {
                    $(Self::$variant => $code,)+
                }
            }

            pub fn from_code(code: u8) -> Option<Self> {
                match code {
                    $($code => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

mode_codes!(ActiveMode {
    Deactivate = 0,
    Activate = 1,
    Restart = 2,
});
mode_codes!(ReportingMode {
    Off = 0,
    On = 1,
    ResetSensors = 2,
});

/// Gains for the two wheel speed controllers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SpeedGains {
    pub kp_a: f64,
    pub ki_a: f64,
    pub kd_a: f64,
    pub kp_b: f64,
    pub ki_b: f64,
    pub kd_b: f64,
    pub speed_k_a: f64,
    pub speed_k_b: f64,
}

impl SpeedGains {
    fn to_array(self) -> [f64; 8] {
        [
            self.kp_a,
            self.ki_a,
            self.kd_a,
            self.kp_b,
            self.ki_b,
            self.kd_b,
            self.speed_k_a,
            self.speed_k_b,
        ]
    }
}

/// Obstacle range limits, in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RangeLimits {
    pub front_upper: u32,
    pub back_upper: u32,
    pub front_lower: u32,
    pub back_lower: u32,
}

/// Status the host reports to the device display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostStatus {
    pub ip: String,
    pub hostname: String,
    pub date: String,
    pub power_button: u32,
    pub hotspot: u32,
}

/// A host → device command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    Identify { name: String },
    Active { mode: ActiveMode },
    Reporting { mode: ReportingMode },
    Motors { left: f64, right: f64 },
    Servo { index: u32, position: i32 },
    ServoDefault { index: u32 },
    SpeedGains(SpeedGains),
    Thresholds(RangeLimits),
    HostStatus(HostStatus),
}

impl Command {
    pub fn identify(name: impl Into<String>) -> Self {
        Self::Identify { name: name.into() }
    }

    pub fn activate() -> Self {
        Self::Active {
            mode: ActiveMode::Activate,
        }
    }

    pub fn deactivate() -> Self {
        Self::Active {
            mode: ActiveMode::Deactivate,
        }
    }

    pub fn restart() -> Self {
        Self::Active {
            mode: ActiveMode::Restart,
        }
    }

    pub fn reporting(enabled: bool) -> Self {
        Self::Reporting {
            mode: if enabled {
                ReportingMode::On
            } else {
                ReportingMode::Off
            },
        }
    }

    pub fn reset_sensors() -> Self {
        Self::Reporting {
            mode: ReportingMode::ResetSensors,
        }
    }

    pub fn motors(left: f64, right: f64) -> Self {
        Self::Motors { left, right }
    }

    pub fn servo(index: u32, position: i32) -> Self {
        Self::Servo { index, position }
    }

    pub fn servo_default(index: u32) -> Self {
        Self::ServoDefault { index }
    }

    pub fn category(&self) -> &'static str {
        match self {
            Command::Identify { .. } => category::IDENTIFY,
            Command::Active { .. } => category::ACTIVE,
            Command::Reporting { .. } => category::REPORTING,
            Command::Motors { .. } => category::MOTORS,
            Command::Servo { .. } => category::SERVO_SET,
            Command::ServoDefault { .. } => category::SERVO_DEFAULT,
            Command::SpeedGains(_) => category::SPEED_GAINS,
            Command::Thresholds(_) => category::THRESHOLDS,
            Command::HostStatus(_) => category::HOST_STATUS,
        }
    }

    pub fn to_frame(&self) -> Result<OutgoingFrame> {
        let fields: Vec<Field> = match self {
            Command::Identify { name } => vec![Token::new(name.as_str())?.into()],
            Command::Active { mode } => vec![mode.code().into()],
            Command::Reporting { mode } => vec![mode.code().into()],
            Command::Motors { left, right } => vec![(*left).into(), (*right).into()],
            Command::Servo { index, position } => vec![(*index).into(), (*position).into()],
            Command::ServoDefault { index } => vec![(*index).into()],
            Command::SpeedGains(gains) => gains.to_array().into_iter().map(Field::from).collect(),
            Command::Thresholds(limits) => vec![
                limits.front_upper.into(),
                limits.back_upper.into(),
                limits.front_lower.into(),
                limits.back_lower.into(),
            ],
            Command::HostStatus(status) => vec![
                Token::new(status.ip.as_str())?.into(),
                Token::new(status.hostname.as_str())?.into(),
                Token::new(status.date.as_str())?.into(),
                status.power_button.into(),
                status.hotspot.into(),
            ],
        };
        Ok(OutgoingFrame::new(self.category(), fields)?)
    }

    /// Parse a command frame, as the device does.
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        let f = FieldReader::new(frame);
        let command = match frame.category.as_str() {
            category::IDENTIFY => Command::Identify { name: f.text(0)? },
            category::ACTIVE => Command::Active {
                mode: ActiveMode::from_code(f.parse(0)?).ok_or_else(|| f.invalid(0))?,
            },
            category::REPORTING => Command::Reporting {
                mode: ReportingMode::from_code(f.parse(0)?).ok_or_else(|| f.invalid(0))?,
            },
            category::MOTORS => Command::Motors {
                left: f.finite(0)?,
                right: f.finite(1)?,
            },
            category::SERVO_SET => Command::Servo {
                index: f.parse(0)?,
                position: f.parse(1)?,
            },
            category::SERVO_DEFAULT => Command::ServoDefault { index: f.parse(0)? },
            category::SPEED_GAINS => Command::SpeedGains(SpeedGains {
                kp_a: f.finite(0)?,
                ki_a: f.finite(1)?,
                kd_a: f.finite(2)?,
                kp_b: f.finite(3)?,
                ki_b: f.finite(4)?,
                kd_b: f.finite(5)?,
                speed_k_a: f.finite(6)?,
                speed_k_b: f.finite(7)?,
            }),
            category::THRESHOLDS => Command::Thresholds(RangeLimits {
                front_upper: f.parse(0)?,
                back_upper: f.parse(1)?,
                front_lower: f.parse(2)?,
                back_lower: f.parse(3)?,
            }),
            category::HOST_STATUS => Command::HostStatus(HostStatus {
                ip: f.text(0)?,
                hostname: f.text(1)?,
                date: f.text(2)?,
                power_button: f.parse(3)?,
                hotspot: f.parse(4)?,
            }),
            other => return Err(RecordError::UnknownCategory(other.to_string())),
        };
        Ok(command)
    }
}
