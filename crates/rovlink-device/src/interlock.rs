//! Motion interlock.
//!
//! Tracks the safety flags and decides, every control tick, whether the
//! motors may move and in which direction. The distance sensor facing away
//! from the direction of travel is not sampled while moving, but its health
//! is still checked every tick.

use rovlink_records::{RangeLimits, RoverState, SafetyFlags};
use tracing::{debug, warn};

use crate::collaborators::{BumperReading, MotorOutput, RangeReading, Sensor, SensorError};

/// Range statuses at or above this mark an unusable measurement.
pub const RANGE_STATUS_LIMIT: u32 = 4;
pub const DEFAULT_LOWER_MM: u32 = 100;
pub const DEFAULT_UPPER_MM: u32 = 0xffff;

/// Distances outside `lower_mm..=upper_mm` count as an obstacle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeWindow {
    pub lower_mm: u32,
    pub upper_mm: u32,
}

impl RangeWindow {
    pub fn is_obstacle(&self, reading: &RangeReading) -> bool {
        if reading.range_status >= RANGE_STATUS_LIMIT {
            return true;
        }
        match u32::try_from(reading.range_mm) {
            Ok(mm) => mm < self.lower_mm || mm > self.upper_mm,
            Err(_) => true,
        }
    }
}

impl Default for RangeWindow {
    fn default() -> Self {
        Self {
            lower_mm: DEFAULT_LOWER_MM,
            upper_mm: DEFAULT_UPPER_MM,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObstacleThresholds {
    pub front: RangeWindow,
    pub back: RangeWindow,
}

impl From<RangeLimits> for ObstacleThresholds {
    fn from(limits: RangeLimits) -> Self {
        Self {
            front: RangeWindow {
                lower_mm: limits.front_lower,
                upper_mm: limits.front_upper,
            },
            back: RangeWindow {
                lower_mm: limits.back_lower,
                upper_mm: limits.back_upper,
            },
        }
    }
}

/// Net direction of travel, from the sign of `left + right`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Motion {
    #[default]
    Stationary,
    Forward,
    Reverse,
}

impl Motion {
    pub fn of(output: MotorOutput) -> Self {
        let net = output.left + output.right;
        if net > 0.0 {
            Motion::Forward
        } else if net < 0.0 {
            Motion::Reverse
        } else {
            Motion::Stationary
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Front,
    Back,
}

#[derive(Debug, Clone, Default)]
pub struct Interlock {
    flags: SafetyFlags,
    thresholds: ObstacleThresholds,
    front: Option<RangeReading>,
    back: Option<RangeReading>,
}

impl Interlock {
    pub fn new(thresholds: ObstacleThresholds) -> Self {
        Self {
            thresholds,
            ..Self::default()
        }
    }

    pub fn flags(&self) -> SafetyFlags {
        self.flags
    }

    pub fn thresholds(&self) -> ObstacleThresholds {
        self.thresholds
    }

    pub fn set_thresholds(&mut self, thresholds: ObstacleThresholds) {
        debug!(?thresholds, "obstacle thresholds updated");
        self.thresholds = thresholds;
    }

    pub fn safe_to_move(&self) -> bool {
        let f = &self.flags;
        f.servos_armed && f.motors_armed && f.front_sensor_ok && f.back_sensor_ok
    }

    pub fn obstacle_ahead(&self) -> bool {
        let f = &self.flags;
        f.left_bump || f.right_bump || f.front_obstacle
    }

    pub fn obstacle_behind(&self) -> bool {
        self.flags.back_obstacle
    }

    /// Whether an obstacle blocks travel in `motion`.
    pub fn blocked(&self, motion: Motion) -> bool {
        match motion {
            Motion::Forward => self.obstacle_ahead(),
            Motion::Reverse => self.obstacle_behind(),
            Motion::Stationary => false,
        }
    }

    pub fn set_bumpers(&mut self, reading: BumperReading) {
        self.flags.left_bump = reading.left;
        self.flags.right_bump = reading.right;
    }

    /// Sample the distance sensors that matter for `motion`.
    ///
    /// Moving forward samples only the front sensor and moving in reverse only
    /// the back one; the other side's obstacle flag keeps its value and its
    /// health comes from the driver status. Stationary samples both.
    pub fn sample_ranges(
        &mut self,
        motion: Motion,
        front: &mut dyn Sensor<Reading = RangeReading>,
        back: &mut dyn Sensor<Reading = RangeReading>,
    ) {
        if motion != Motion::Reverse {
            self.record_range(Side::Front, front.sample());
        } else {
            self.record_health(Side::Front, front.healthy());
        }
        if motion != Motion::Forward {
            self.record_range(Side::Back, back.sample());
        } else {
            self.record_health(Side::Back, back.healthy());
        }
    }

    /// Latest front and back measurements.
    pub fn ranges(&self) -> (Option<RangeReading>, Option<RangeReading>) {
        (self.front, self.back)
    }

    /// Set `servos_armed`. Returns whether the flag changed.
    pub fn set_servos_armed(&mut self, armed: bool) -> bool {
        let changed = self.flags.servos_armed != armed;
        self.flags.servos_armed = armed;
        changed
    }

    /// Set `motors_armed`. Returns whether the flag changed.
    pub fn set_motors_armed(&mut self, armed: bool) -> bool {
        let changed = self.flags.motors_armed != armed;
        self.flags.motors_armed = armed;
        changed
    }

    /// Motor output allowed for a requested output.
    pub fn gate(&self, state: &RoverState, requested: MotorOutput) -> MotorOutput {
        if requested.is_zero() {
            return requested;
        }
        if !requested.is_finite() {
            warn!(?requested, "non-finite motor command dropped");
            return MotorOutput::ZERO;
        }
        if !state.active {
            debug!("motor command ignored while inactive");
            return MotorOutput::ZERO;
        }
        if !self.safe_to_move() {
            warn!(flags = ?self.flags, "motor command blocked: not safe to move");
            return MotorOutput::ZERO;
        }
        let motion = Motion::of(requested);
        if self.blocked(motion) {
            warn!(?motion, "motor command blocked by obstacle");
            return MotorOutput::ZERO;
        }
        requested
    }

    /// Forget measurements and sensor-owned flags. Arming is kept.
    pub fn clear_sensors(&mut self) {
        let armed = (self.flags.servos_armed, self.flags.motors_armed);
        self.flags = SafetyFlags {
            servos_armed: armed.0,
            motors_armed: armed.1,
            ..SafetyFlags::default()
        };
        self.front = None;
        self.back = None;
    }

    fn record_health(&mut self, side: Side, ok: bool) {
        let flag = match side {
            Side::Front => &mut self.flags.front_sensor_ok,
            Side::Back => &mut self.flags.back_sensor_ok,
        };
        if *flag && !ok {
            warn!(?side, "distance sensor reports a fault");
        }
        *flag = ok;
    }

    fn record_range(&mut self, side: Side, sample: Result<RangeReading, SensorError>) {
        let (ok, obstacle, reading) = match sample {
            Ok(reading) => {
                let window = match side {
                    Side::Front => self.thresholds.front,
                    Side::Back => self.thresholds.back,
                };
                (
                    reading.device_status == 0,
                    window.is_obstacle(&reading),
                    Some(reading),
                )
            }
            Err(err) => {
                warn!(?side, error = %err, "distance sensor sample failed");
                (false, true, None)
            }
        };
        match side {
            Side::Front => {
                self.flags.front_sensor_ok = ok;
                self.flags.front_obstacle = obstacle;
                if reading.is_some() {
                    self.front = reading;
                }
            }
            Side::Back => {
                self.flags.back_sensor_ok = ok;
                self.flags.back_obstacle = obstacle;
                if reading.is_some() {
                    self.back = reading;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedRange {
        reading: Result<RangeReading, SensorError>,
        samples: u32,
    }

    impl FixedRange {
        fn at(range_mm: i32) -> Self {
            Self {
                reading: Ok(RangeReading {
                    range_mm,
                    ..RangeReading::default()
                }),
                samples: 0,
            }
        }
    }

    impl Sensor for FixedRange {
        type Reading = RangeReading;

        fn sample(&mut self) -> Result<RangeReading, SensorError> {
            self.samples += 1;
            self.reading.clone()
        }

        fn healthy(&self) -> bool {
            matches!(&self.reading, Ok(r) if r.device_status == 0)
        }
    }

    fn armed() -> Interlock {
        let mut interlock = Interlock::default();
        interlock.set_servos_armed(true);
        interlock.set_motors_armed(true);
        interlock
    }

    fn active() -> RoverState {
        RoverState {
            active: true,
            ..RoverState::default()
        }
    }

    #[test]
    fn rules_follow_the_flags() {
        let mut interlock = armed();
        assert!(!interlock.safe_to_move());

        let mut front = FixedRange::at(500);
        let mut back = FixedRange::at(500);
        interlock.sample_ranges(Motion::Stationary, &mut front, &mut back);
        assert!(interlock.safe_to_move());
        assert!(!interlock.obstacle_ahead());

        interlock.set_bumpers(BumperReading {
            left: false,
            right: true,
        });
        assert!(interlock.obstacle_ahead());
        assert!(!interlock.obstacle_behind());
    }

    #[test]
    fn windows_and_status_mark_obstacles() {
        let window = RangeWindow::default();
        let at = |range_mm, range_status| RangeReading {
            range_mm,
            range_status,
            device_status: 0,
        };
        assert!(window.is_obstacle(&at(99, 0)));
        assert!(!window.is_obstacle(&at(100, 0)));
        assert!(window.is_obstacle(&at(500, 4)));
        assert!(window.is_obstacle(&at(-1, 0)));
        assert!(!window.is_obstacle(&at(0xffff, 3)));
    }

    #[test]
    fn reversing_samples_only_the_back_sensor() {
        let mut interlock = armed();
        let mut front = FixedRange::at(50);
        let mut back = FixedRange::at(500);
        interlock.sample_ranges(Motion::Stationary, &mut front, &mut back);
        assert!(interlock.flags().front_obstacle);

        front.reading = Ok(RangeReading {
            range_mm: 800,
            ..RangeReading::default()
        });
        back.reading = Ok(RangeReading {
            range_mm: 20,
            ..RangeReading::default()
        });
        interlock.sample_ranges(Motion::Reverse, &mut front, &mut back);

        assert_eq!(front.samples, 1);
        assert_eq!(back.samples, 2);
        assert!(interlock.flags().front_obstacle);
        assert!(interlock.flags().back_obstacle);
        assert!(interlock.flags().front_sensor_ok);
    }

    #[test]
    fn forward_samples_only_the_front_sensor() {
        let mut interlock = armed();
        let mut front = FixedRange::at(500);
        let mut back = FixedRange::at(10);
        interlock.sample_ranges(Motion::Forward, &mut front, &mut back);

        assert_eq!((front.samples, back.samples), (1, 0));
        assert!(!interlock.flags().back_obstacle);
        assert!(interlock.flags().back_sensor_ok);
        assert!(interlock.safe_to_move());
    }

    #[test]
    fn failing_rear_sensor_is_noticed_while_moving_forward() {
        let mut interlock = armed();
        let mut front = FixedRange::at(500);
        let mut back = FixedRange::at(500);
        interlock.sample_ranges(Motion::Stationary, &mut front, &mut back);
        assert!(interlock.safe_to_move());

        back.reading = Err(SensorError::NotResponding);
        interlock.sample_ranges(Motion::Forward, &mut front, &mut back);

        assert_eq!(back.samples, 1);
        let flags = interlock.flags();
        assert!(!flags.back_sensor_ok);
        assert!(!flags.back_obstacle);
        assert!(!interlock.safe_to_move());
        assert_eq!(
            interlock.gate(&active(), MotorOutput::new(100.0, 100.0)),
            MotorOutput::ZERO
        );
    }

    #[test]
    fn failed_sample_is_unhealthy_and_blocking() {
        let mut interlock = armed();
        let mut front = FixedRange {
            reading: Err(SensorError::NotResponding),
            samples: 0,
        };
        let mut back = FixedRange::at(500);
        interlock.sample_ranges(Motion::Stationary, &mut front, &mut back);

        let flags = interlock.flags();
        assert!(!flags.front_sensor_ok);
        assert!(flags.front_obstacle);
        assert_eq!(interlock.ranges().0, None);
    }

    #[test]
    fn arming_reports_only_transitions() {
        let mut interlock = Interlock::default();
        assert!(interlock.set_motors_armed(true));
        assert!(!interlock.set_motors_armed(true));
        assert!(interlock.set_motors_armed(false));
    }

    #[test]
    fn gate_zeroes_blocked_direction_only() {
        let mut interlock = armed();
        let mut front = FixedRange::at(50);
        let mut back = FixedRange::at(500);
        interlock.sample_ranges(Motion::Stationary, &mut front, &mut back);
        // a front obstacle does not make the front sensor unhealthy
        assert!(interlock.safe_to_move());

        let state = active();
        assert_eq!(
            interlock.gate(&state, MotorOutput::new(100.0, 100.0)),
            MotorOutput::ZERO
        );
        assert_eq!(
            interlock.gate(&state, MotorOutput::new(-80.0, -80.0)),
            MotorOutput::new(-80.0, -80.0)
        );
        assert_eq!(
            interlock.gate(&RoverState::default(), MotorOutput::new(-80.0, -80.0)),
            MotorOutput::ZERO
        );
    }

    #[test]
    fn gate_drops_non_finite_requests() {
        let mut interlock = armed();
        let mut front = FixedRange::at(50);
        let mut back = FixedRange::at(500);
        interlock.sample_ranges(Motion::Stationary, &mut front, &mut back);

        let state = active();
        for requested in [
            MotorOutput::new(f64::NAN, 255.0),
            MotorOutput::new(-255.0, f64::INFINITY),
            MotorOutput::new(f64::NEG_INFINITY, 0.0),
        ] {
            assert_eq!(interlock.gate(&state, requested), MotorOutput::ZERO);
        }
    }

    #[test]
    fn thresholds_come_from_range_limits() {
        let thresholds = ObstacleThresholds::from(RangeLimits {
            front_upper: 2000,
            back_upper: 1500,
            front_lower: 120,
            back_lower: 80,
        });
        assert_eq!(thresholds.front.lower_mm, 120);
        assert_eq!(thresholds.back.upper_mm, 1500);
    }

    #[test]
    fn motion_is_sign_of_net_output() {
        assert_eq!(Motion::of(MotorOutput::new(100.0, -50.0)), Motion::Forward);
        assert_eq!(Motion::of(MotorOutput::new(-100.0, 50.0)), Motion::Reverse);
        assert_eq!(Motion::of(MotorOutput::new(100.0, -100.0)), Motion::Stationary);
    }
}
