//! Category tokens.
//!
//! Device → host tokens carry telemetry and replies; host → device tokens are
//! commands. The two sets are disjoint.

/// Wheel encoder ticks and speeds.
pub const ENCODER: &str = "enc";
/// Front and back time-of-flight ranges.
pub const TOF: &str = "lox";
/// IMU orientation, rates and linear acceleration.
pub const IMU: &str = "bno";
/// Bumper force sensors.
pub const FSR: &str = "fsr";
/// Battery current, power and voltage.
pub const POWER: &str = "ina";
/// Acknowledgement of a received command.
pub const ACK: &str = "txrx";
/// Safety flags and rover mode.
pub const SAFETY: &str = "safe";
/// Servo positions.
pub const SERVO: &str = "servo";
/// Identification reply; starts the time base.
pub const READY: &str = "ready";
/// Device asks the host to power off.
pub const SHUTDOWN: &str = "shutdown";
/// Device asks the host to switch its wifi hotspot mode.
pub const HOTSPOT: &str = "wifi";

/// Identification query.
pub const IDENTIFY: &str = "?";
/// Activate, deactivate or restart.
pub const ACTIVE: &str = "<>";
/// Reporting on/off and sensor reset.
pub const REPORTING: &str = "[]";
/// Motor commands.
pub const MOTORS: &str = "m";
/// Single servo position.
pub const SERVO_SET: &str = "s";
/// Single servo to its default position.
pub const SERVO_DEFAULT: &str = "sd";
/// Speed controller gains.
pub const SPEED_GAINS: &str = "ks";
/// Obstacle range thresholds.
pub const THRESHOLDS: &str = "thr";
/// Host status report.
pub const HOST_STATUS: &str = "rpi";

pub const TELEMETRY: [&str; 11] = [
    ENCODER, TOF, IMU, FSR, POWER, ACK, SAFETY, SERVO, READY, SHUTDOWN, HOTSPOT,
];

pub const COMMANDS: [&str; 9] = [
    IDENTIFY,
    ACTIVE,
    REPORTING,
    MOTORS,
    SERVO_SET,
    SERVO_DEFAULT,
    SPEED_GAINS,
    THRESHOLDS,
    HOST_STATUS,
];

/// Human-readable name for a category token.
pub fn category_name(token: &str) -> &'static str {
    match token {
        ENCODER => "ENCODER",
        TOF => "TOF",
        IMU => "IMU",
        FSR => "FSR",
        POWER => "POWER",
        ACK => "ACK",
        SAFETY => "SAFETY",
        SERVO => "SERVO",
        READY => "READY",
        SHUTDOWN => "SHUTDOWN",
        HOTSPOT => "HOTSPOT",
        IDENTIFY => "IDENTIFY",
        ACTIVE => "ACTIVE",
        REPORTING => "REPORTING",
        MOTORS => "MOTORS",
        SERVO_SET => "SERVO_SET",
        SERVO_DEFAULT => "SERVO_DEFAULT",
        SPEED_GAINS => "SPEED_GAINS",
        THRESHOLDS => "THRESHOLDS",
        HOST_STATUS => "HOST_STATUS",
        _ => "UNKNOWN",
    }
}

pub fn is_command(token: &str) -> bool {
    COMMANDS.contains(&token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_sets_are_disjoint() {
        for token in TELEMETRY {
            assert!(!is_command(token), "{token} is in both sets");
        }
    }

    #[test]
    fn every_token_has_a_name() {
        for token in TELEMETRY.iter().chain(COMMANDS.iter()) {
            assert_ne!(category_name(token), "UNKNOWN", "{token}");
        }
        assert_eq!(category_name("ir"), "UNKNOWN");
    }
}
