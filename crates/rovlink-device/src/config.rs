use rovlink_records::DEFAULT_SERVO_COUNT;

use crate::interlock::ObstacleThresholds;

/// Name the device reports in its ready record.
pub const DEFAULT_DEVICE_NAME: &str = "rover6";
pub const DEFAULT_SERVO_POSITION: i32 = 90;
pub const MAX_MOTOR_COMMAND: f64 = 255.0;

/// Milliseconds between reports of each telemetry category.
///
/// A zero interval disables that report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportIntervals {
    pub encoder_ms: u32,
    pub force_ms: u32,
    pub power_ms: u32,
    pub imu_ms: u32,
    pub range_ms: u32,
    pub safety_ms: u32,
    pub servo_ms: u32,
}

impl Default for ReportIntervals {
    fn default() -> Self {
        Self {
            encoder_ms: 30,
            force_ms: 30,
            power_ms: 30,
            imu_ms: 100,
            range_ms: 150,
            safety_ms: 500,
            servo_ms: 1000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub name: String,
    pub servo_count: usize,
    /// Position `sd` moves a servo to.
    pub servo_default_position: i32,
    pub thresholds: ObstacleThresholds,
    pub intervals: ReportIntervals,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_DEVICE_NAME.to_string(),
            servo_count: DEFAULT_SERVO_COUNT,
            servo_default_position: DEFAULT_SERVO_POSITION,
            thresholds: ObstacleThresholds::default(),
            intervals: ReportIntervals::default(),
        }
    }
}
