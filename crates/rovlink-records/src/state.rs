use serde::{Deserialize, Serialize};

/// Conditions that gate motion on the rover.
///
/// All false at power-up. Each flag has one writer on the device: the sensor
/// step that measures it, or the arming step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyFlags {
    pub left_bump: bool,
    pub right_bump: bool,
    pub front_obstacle: bool,
    pub back_obstacle: bool,
    pub front_sensor_ok: bool,
    pub back_sensor_ok: bool,
    pub servos_armed: bool,
    pub motors_armed: bool,
}

impl SafetyFlags {
    /// Flags in wire order.
    pub fn to_array(self) -> [bool; 8] {
        [
            self.left_bump,
            self.right_bump,
            self.front_obstacle,
            self.back_obstacle,
            self.front_sensor_ok,
            self.back_sensor_ok,
            self.servos_armed,
            self.motors_armed,
        ]
    }

    pub fn from_array(flags: [bool; 8]) -> Self {
        Self {
            left_bump: flags[0],
            right_bump: flags[1],
            front_obstacle: flags[2],
            back_obstacle: flags[3],
            front_sensor_ok: flags[4],
            back_sensor_ok: flags[5],
            servos_armed: flags[6],
            motors_armed: flags[7],
        }
    }
}

/// Operating mode, changed only by host commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoverState {
    pub active: bool,
    pub reporting_enabled: bool,
    pub speed_control_enabled: bool,
}
