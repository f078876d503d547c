//! A simulated rover.
//!
//! [`SimRover`] hands out collaborators that share one in-memory world:
//! encoders integrate the applied motor output, ranges and bumpers are set
//! from outside, and the most recent actuator calls are logged for
//! inspection.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use rovlink_records::Vector3;

use crate::collaborators::{
    Actuator, ActuatorError, BumperReading, Collaborators, EncoderReading, ForceReading,
    ImuReading, MotorOutput, PowerReading, RangeReading, Sensor, SensorError, ServoOutput,
};
use crate::config::MAX_MOTOR_COMMAND;

/// Encoder ticks per sample per unit of motor command.
const TICKS_PER_COMMAND: f64 = 0.2;
const SUPPLY_VOLTAGE: f64 = 7.4;
const IDLE_CURRENT_MA: f64 = 120.0;
/// Actuator calls kept per log; older entries are dropped.
pub const LOG_CAPACITY: usize = 256;

fn push_capped<T>(log: &mut VecDeque<T>, value: T) {
    if log.len() == LOG_CAPACITY {
        log.pop_front();
    }
    log.push_back(value);
}

#[derive(Debug)]
struct World {
    front: Result<RangeReading, SensorError>,
    back: Result<RangeReading, SensorError>,
    bumpers: BumperReading,
    motors: MotorOutput,
    motor_log: VecDeque<MotorOutput>,
    servo_log: VecDeque<ServoOutput>,
    front_samples: u32,
    back_samples: u32,
    left_ticks: f64,
    right_ticks: f64,
    yaw: f64,
    motors_standby: bool,
    servos_standby: bool,
    servos_responding: bool,
    standby_calls: u32,
    resets: u32,
}

impl Default for World {
    fn default() -> Self {
        let clear = RangeReading {
            range_mm: 500,
            range_status: 0,
            device_status: 0,
        };
        Self {
            front: Ok(clear),
            back: Ok(clear),
            bumpers: BumperReading::default(),
            motors: MotorOutput::ZERO,
            motor_log: VecDeque::new(),
            servo_log: VecDeque::new(),
            front_samples: 0,
            back_samples: 0,
            left_ticks: 0.0,
            right_ticks: 0.0,
            yaw: 0.0,
            motors_standby: true,
            servos_standby: true,
            servos_responding: true,
            standby_calls: 0,
            resets: 0,
        }
    }
}

/// Handle on the simulated world. Clones share it.
#[derive(Debug, Clone, Default)]
pub struct SimRover {
    world: Rc<RefCell<World>>,
}

impl SimRover {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collaborators wired to this world.
    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            front_range: Box::new(SimRange {
                rover: self.clone(),
                front: true,
            }),
            back_range: Box::new(SimRange {
                rover: self.clone(),
                front: false,
            }),
            bumpers: Box::new(SimBumpers(self.clone())),
            encoders: Box::new(SimEncoders(self.clone())),
            imu: Box::new(SimImu(self.clone())),
            force: Box::new(SimForce(self.clone())),
            power: Box::new(SimPower(self.clone())),
            motors: Box::new(SimMotors(self.clone())),
            servos: Box::new(SimServos(self.clone())),
        }
    }

    pub fn set_front(&self, reading: Result<RangeReading, SensorError>) {
        self.world.borrow_mut().front = reading;
    }

    pub fn set_back(&self, reading: Result<RangeReading, SensorError>) {
        self.world.borrow_mut().back = reading;
    }

    /// Put the front range at `range_mm` with a good status.
    pub fn set_front_mm(&self, range_mm: i32) {
        self.set_front(Ok(RangeReading {
            range_mm,
            ..RangeReading::default()
        }));
    }

    pub fn set_back_mm(&self, range_mm: i32) {
        self.set_back(Ok(RangeReading {
            range_mm,
            ..RangeReading::default()
        }));
    }

    pub fn set_bumpers(&self, left: bool, right: bool) {
        self.world.borrow_mut().bumpers = BumperReading { left, right };
    }

    /// Make the servo driver stop answering, or answer again.
    pub fn set_servos_responding(&self, responding: bool) {
        self.world.borrow_mut().servos_responding = responding;
    }

    /// Most recent motor commands, oldest first.
    pub fn motor_log(&self) -> Vec<MotorOutput> {
        self.world.borrow().motor_log.iter().copied().collect()
    }

    pub fn servo_log(&self) -> Vec<ServoOutput> {
        self.world.borrow().servo_log.iter().copied().collect()
    }

    pub fn motors(&self) -> MotorOutput {
        self.world.borrow().motors
    }

    /// Front and back sample counts.
    pub fn samples(&self) -> (u32, u32) {
        let world = self.world.borrow();
        (world.front_samples, world.back_samples)
    }

    /// Motor and servo standby state.
    pub fn standby(&self) -> (bool, bool) {
        let world = self.world.borrow();
        (world.motors_standby, world.servos_standby)
    }

    pub fn standby_calls(&self) -> u32 {
        self.world.borrow().standby_calls
    }

    pub fn resets(&self) -> u32 {
        self.world.borrow().resets
    }
}

struct SimRange {
    rover: SimRover,
    front: bool,
}

impl Sensor for SimRange {
    type Reading = RangeReading;

    fn sample(&mut self) -> Result<RangeReading, SensorError> {
        let mut world = self.rover.world.borrow_mut();
        if self.front {
            world.front_samples += 1;
            world.front.clone()
        } else {
            world.back_samples += 1;
            world.back.clone()
        }
    }

    fn healthy(&self) -> bool {
        let world = self.rover.world.borrow();
        let status = if self.front { &world.front } else { &world.back };
        matches!(status, Ok(r) if r.device_status == 0)
    }
}

struct SimBumpers(SimRover);

impl Sensor for SimBumpers {
    type Reading = BumperReading;

    fn sample(&mut self) -> Result<BumperReading, SensorError> {
        Ok(self.0.world.borrow().bumpers)
    }
}

struct SimEncoders(SimRover);

impl Sensor for SimEncoders {
    type Reading = EncoderReading;

    fn sample(&mut self) -> Result<EncoderReading, SensorError> {
        let mut world = self.0.world.borrow_mut();
        let left_speed = world.motors.left * TICKS_PER_COMMAND;
        let right_speed = world.motors.right * TICKS_PER_COMMAND;
        world.left_ticks += left_speed;
        world.right_ticks += right_speed;
        Ok(EncoderReading {
            left_ticks: world.left_ticks as i64,
            right_ticks: world.right_ticks as i64,
            left_speed,
            right_speed,
        })
    }

    fn reset(&mut self) {
        let mut world = self.0.world.borrow_mut();
        world.left_ticks = 0.0;
        world.right_ticks = 0.0;
        world.resets += 1;
    }
}

struct SimImu(SimRover);

impl Sensor for SimImu {
    type Reading = ImuReading;

    fn sample(&mut self) -> Result<ImuReading, SensorError> {
        let mut world = self.0.world.borrow_mut();
        let turn = (world.motors.right - world.motors.left) / MAX_MOTOR_COMMAND;
        world.yaw = (world.yaw + turn).rem_euclid(360.0);
        Ok(ImuReading {
            yaw: world.yaw,
            gyro: Vector3 {
                x: 0.0,
                y: 0.0,
                z: turn,
            },
            ..ImuReading::default()
        })
    }
}

struct SimForce(SimRover);

impl Sensor for SimForce {
    type Reading = ForceReading;

    fn sample(&mut self) -> Result<ForceReading, SensorError> {
        let bumpers = self.0.world.borrow().bumpers;
        let press = |hit: bool| if hit { 800 } else { 0 };
        Ok(ForceReading {
            left: press(bumpers.left),
            right: press(bumpers.right),
        })
    }
}

struct SimPower(SimRover);

impl Sensor for SimPower {
    type Reading = PowerReading;

    fn sample(&mut self) -> Result<PowerReading, SensorError> {
        let motors = self.0.world.borrow().motors;
        let current_ma = IDLE_CURRENT_MA + 2.0 * (motors.left.abs() + motors.right.abs());
        Ok(PowerReading {
            current_ma,
            power_mw: current_ma * SUPPLY_VOLTAGE,
            load_voltage: SUPPLY_VOLTAGE,
        })
    }
}

struct SimMotors(SimRover);

impl Actuator for SimMotors {
    type Value = MotorOutput;

    fn command(&mut self, value: MotorOutput) -> Result<MotorOutput, ActuatorError> {
        let mut world = self.0.world.borrow_mut();
        if world.motors_standby && !value.is_zero() {
            return Err(ActuatorError::Standby);
        }
        let applied = value.clamped(MAX_MOTOR_COMMAND);
        world.motors = applied;
        push_capped(&mut world.motor_log, applied);
        Ok(applied)
    }

    fn standby(&mut self, standby: bool) {
        let mut world = self.0.world.borrow_mut();
        world.motors_standby = standby;
        world.standby_calls += 1;
    }
}

struct SimServos(SimRover);

impl Actuator for SimServos {
    type Value = ServoOutput;

    fn command(&mut self, value: ServoOutput) -> Result<ServoOutput, ActuatorError> {
        let mut world = self.0.world.borrow_mut();
        if world.servos_standby {
            return Err(ActuatorError::Standby);
        }
        if !world.servos_responding {
            return Err(ActuatorError::NotResponding);
        }
        let applied = ServoOutput {
            position: value.position.clamp(0, 180),
            ..value
        };
        push_capped(&mut world.servo_log, applied);
        Ok(applied)
    }

    fn standby(&mut self, standby: bool) {
        let mut world = self.0.world.borrow_mut();
        world.servos_standby = standby;
        world.standby_calls += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoders_follow_applied_motors() {
        let rover = SimRover::new();
        let mut hw = rover.collaborators();
        hw.motors.standby(false);
        hw.motors.command(MotorOutput::new(100.0, -50.0)).unwrap();

        hw.encoders.sample().unwrap();
        let reading = hw.encoders.sample().unwrap();
        assert_eq!((reading.left_ticks, reading.right_ticks), (40, -20));

        hw.encoders.reset();
        assert_eq!(hw.encoders.sample().unwrap().left_ticks, 20);
    }

    #[test]
    fn motors_refuse_motion_in_standby() {
        let rover = SimRover::new();
        let mut hw = rover.collaborators();
        assert_eq!(
            hw.motors.command(MotorOutput::new(10.0, 10.0)),
            Err(ActuatorError::Standby)
        );
        assert_eq!(hw.motors.command(MotorOutput::ZERO), Ok(MotorOutput::ZERO));
    }

    #[test]
    fn actuator_logs_keep_only_recent_calls() {
        let rover = SimRover::new();
        let mut hw = rover.collaborators();
        hw.motors.standby(false);
        hw.servos.standby(false);
        for i in 0..LOG_CAPACITY + 10 {
            let speed = i as f64 / 10.0;
            hw.motors.command(MotorOutput::new(speed, speed)).unwrap();
            hw.servos
                .command(ServoOutput {
                    index: 0,
                    position: (i % 180) as i32,
                })
                .unwrap();
        }

        let motors = rover.motor_log();
        assert_eq!(motors.len(), LOG_CAPACITY);
        assert_eq!(motors[0], MotorOutput::new(1.0, 1.0));
        let last = (LOG_CAPACITY + 9) as f64 / 10.0;
        assert_eq!(motors.last(), Some(&MotorOutput::new(last, last)));
        assert_eq!(rover.servo_log().len(), LOG_CAPACITY);
    }
}
