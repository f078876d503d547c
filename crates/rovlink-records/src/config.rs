/// Number of PWM servo channels on the rover's driver board.
pub const DEFAULT_SERVO_COUNT: usize = 16;

/// Shape parameters for categories whose field count is not fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordConfig {
    /// Positions carried by a `servo` record.
    pub servo_count: usize,
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            servo_count: DEFAULT_SERVO_COUNT,
        }
    }
}
