use std::collections::VecDeque;

use rovlink_frame::{Frame, OutgoingFrame};
use rovlink_records::{
    Ack, AckStatus, ActiveMode, Command, EncoderReport, ForceReport, HostStatus, ImuReport,
    PowerReport, RangeReport, Ready, RecordError, ReportingMode, RoverState, SafetyFlags,
    SafetyReport, ServoReport, SpeedGains,
};
use tracing::{debug, info, warn};

use crate::collaborators::{BumperReading, Collaborators, MotorOutput, Sensor, ServoOutput};
use crate::config::{DeviceConfig, MAX_MOTOR_COMMAND};
use crate::error::Result;
use crate::interlock::{Interlock, Motion};

/// Something the controller wants written to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Frame(OutgoingFrame),
    /// Free text, written as a plain log line outside any frame.
    Log(String),
}

#[derive(Debug, Default)]
struct ReportTimers {
    encoder: Option<u32>,
    force: Option<u32>,
    power: Option<u32>,
    imu: Option<u32>,
    range: Option<u32>,
    safety: Option<u32>,
    servo: Option<u32>,
}

fn due(last: &mut Option<u32>, now_ms: u32, interval_ms: u32) -> bool {
    if interval_ms == 0 {
        return false;
    }
    let ready = last.map_or(true, |t| now_ms.wrapping_sub(t) >= interval_ms);
    if ready {
        *last = Some(now_ms);
    }
    ready
}

/// Device half of the rover link.
///
/// Commands are applied as they arrive, except motor commands, which queue
/// until the next [`tick`](Self::tick) so they pass through the interlock
/// after that tick's sensor reads.
pub struct DeviceController {
    config: DeviceConfig,
    hw: Collaborators,
    interlock: Interlock,
    state: RoverState,
    applied: MotorOutput,
    motion: Motion,
    pending: VecDeque<MotorOutput>,
    servo_positions: Vec<i32>,
    gains: Option<SpeedGains>,
    host_status: Option<HostStatus>,
    timers: ReportTimers,
}

impl DeviceController {
    pub fn new(config: DeviceConfig, hw: Collaborators) -> Self {
        Self {
            interlock: Interlock::new(config.thresholds),
            servo_positions: vec![config.servo_default_position; config.servo_count],
            config,
            hw,
            state: RoverState::default(),
            applied: MotorOutput::ZERO,
            motion: Motion::Stationary,
            pending: VecDeque::new(),
            gains: None,
            host_status: None,
            timers: ReportTimers::default(),
        }
    }

    /// Handle one frame from the host.
    ///
    /// Identification queries get a ready record; every other frame gets an
    /// ack carrying its sequence number.
    pub fn handle_frame(
        &mut self,
        frame: &Frame,
        now_ms: u32,
        out: &mut Vec<Outbound>,
    ) -> Result<()> {
        let status = match Command::from_frame(frame) {
            Ok(Command::Identify { name }) => {
                info!(host = %name, "identify received");
                let ready = Ready {
                    time_ms: now_ms,
                    name: self.config.name.clone(),
                };
                out.push(Outbound::Frame(ready.to_frame()?));
                return Ok(());
            }
            Ok(command) => self.apply(command),
            Err(RecordError::UnknownCategory(category)) => {
                warn!(%category, sequence = frame.sequence, "unknown command");
                AckStatus::UnknownCategory
            }
            Err(err) => {
                warn!(error = %err, sequence = frame.sequence, "malformed command");
                AckStatus::BadField
            }
        };

        let ack = Ack {
            packet_num: frame.sequence,
            status,
        };
        out.push(Outbound::Frame(ack.to_frame()?));
        Ok(())
    }

    /// One control-loop iteration: read the safety sensors, stop if the
    /// direction of travel is blocked, apply queued motor commands, then send
    /// whatever reports are due.
    pub fn tick(&mut self, now_ms: u32, out: &mut Vec<Outbound>) -> Result<()> {
        match self.hw.bumpers.sample() {
            Ok(reading) => self.interlock.set_bumpers(reading),
            Err(err) => {
                warn!(error = %err, "bumper read failed");
                self.interlock.set_bumpers(BumperReading {
                    left: true,
                    right: true,
                });
            }
        }
        self.interlock.sample_ranges(
            self.motion,
            self.hw.front_range.as_mut(),
            self.hw.back_range.as_mut(),
        );

        let cause = if self.interlock.blocked(self.motion) {
            Some("obstacle")
        } else if self.motion != Motion::Stationary && !self.interlock.safe_to_move() {
            Some("unsafe")
        } else {
            None
        };
        if let Some(cause) = cause {
            warn!(motion = ?self.motion, flags = ?self.interlock.flags(), cause, "hard stop");
            let line = format!("hard stop: {cause} while moving {:?}", self.motion);
            out.push(Outbound::Log(line));
            self.write_motors(MotorOutput::ZERO);
        }

        while let Some(requested) = self.pending.pop_front() {
            let allowed = self.interlock.gate(&self.state, requested);
            self.write_motors(allowed);
        }

        if self.state.reporting_enabled {
            self.report(now_ms, out)?;
        }
        Ok(())
    }

    /// Deactivate and stop reporting.
    pub fn shutdown(&mut self) {
        self.set_active(false);
        self.state.reporting_enabled = false;
    }

    pub fn state(&self) -> RoverState {
        self.state
    }

    pub fn flags(&self) -> SafetyFlags {
        self.interlock.flags()
    }

    pub fn interlock(&self) -> &Interlock {
        &self.interlock
    }

    pub fn applied_motors(&self) -> MotorOutput {
        self.applied
    }

    pub fn motion(&self) -> Motion {
        self.motion
    }

    pub fn servo_positions(&self) -> &[i32] {
        &self.servo_positions
    }

    pub fn gains(&self) -> Option<&SpeedGains> {
        self.gains.as_ref()
    }

    pub fn host_status(&self) -> Option<&HostStatus> {
        self.host_status.as_ref()
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    fn apply(&mut self, command: Command) -> AckStatus {
        match command {
            Command::Identify { .. } => AckStatus::Ok,
            Command::Active { mode } => {
                match mode {
                    ActiveMode::Deactivate => self.set_active(false),
                    ActiveMode::Activate => self.set_active(true),
                    ActiveMode::Restart => {
                        info!("soft restart");
                        self.set_active(false);
                        self.interlock.clear_sensors();
                        self.hw.reset_sensors();
                        self.set_active(true);
                    }
                }
                AckStatus::Ok
            }
            Command::Reporting { mode } => {
                match mode {
                    ReportingMode::Off => self.state.reporting_enabled = false,
                    ReportingMode::On => {
                        self.state.reporting_enabled = true;
                        self.timers = ReportTimers::default();
                    }
                    ReportingMode::ResetSensors => {
                        debug!("resetting sensors");
                        self.hw.reset_sensors();
                    }
                }
                AckStatus::Ok
            }
            Command::Motors { left, right } => {
                if !self.state.active {
                    return AckStatus::Inactive;
                }
                self.pending
                    .push_back(MotorOutput::new(left, right).clamped(MAX_MOTOR_COMMAND));
                AckStatus::Ok
            }
            Command::Servo { index, position } => self.write_servo(index, position),
            Command::ServoDefault { index } => {
                self.write_servo(index, self.config.servo_default_position)
            }
            Command::SpeedGains(gains) => {
                self.state.speed_control_enabled = gains != SpeedGains::default();
                self.gains = Some(gains);
                AckStatus::Ok
            }
            Command::Thresholds(limits) => {
                self.interlock.set_thresholds(limits.into());
                AckStatus::Ok
            }
            Command::HostStatus(status) => {
                info!(ip = %status.ip, hostname = %status.hostname, "host status");
                self.host_status = Some(status);
                AckStatus::Ok
            }
        }
    }

    fn set_active(&mut self, active: bool) {
        if self.state.active == active {
            return;
        }
        self.state.active = active;
        self.pending.clear();
        self.write_motors(MotorOutput::ZERO);

        if self.interlock.set_servos_armed(active) {
            self.hw.servos.standby(!active);
        }
        if self.interlock.set_motors_armed(active) {
            self.hw.motors.standby(!active);
        }
        if active {
            self.hw.encoders.reset();
            self.timers = ReportTimers::default();
        }
        info!(active, "rover mode changed");
    }

    fn write_motors(&mut self, output: MotorOutput) {
        self.applied = match self.hw.motors.command(output) {
            Ok(applied) => applied,
            Err(err) => {
                warn!(error = %err, ?output, "motor command failed");
                MotorOutput::ZERO
            }
        };
        self.motion = Motion::of(self.applied);
    }

    fn write_servo(&mut self, index: u32, position: i32) -> AckStatus {
        if !self.state.active {
            return AckStatus::Inactive;
        }
        if !self.interlock.safe_to_move() {
            warn!(index, flags = ?self.interlock.flags(), "servo command blocked: not safe to move");
            return AckStatus::Inactive;
        }
        let Some(slot) = usize::try_from(index)
            .ok()
            .filter(|&i| i < self.servo_positions.len())
        else {
            warn!(index, "servo index out of range");
            return AckStatus::BadField;
        };
        match self.hw.servos.command(ServoOutput { index, position }) {
            Ok(applied) => {
                self.servo_positions[slot] = applied.position;
                AckStatus::Ok
            }
            Err(err) => {
                warn!(index, error = %err, "servo command failed");
                AckStatus::ActuatorFault
            }
        }
    }

    fn report(&mut self, now_ms: u32, out: &mut Vec<Outbound>) -> Result<()> {
        let iv = self.config.intervals;
        let t = now_ms;

        if due(&mut self.timers.encoder, t, iv.encoder_ms) {
            if let Some(r) = sample(self.hw.encoders.as_mut(), "encoder", out) {
                let report = EncoderReport {
                    time_ms: t,
                    left_ticks: r.left_ticks,
                    right_ticks: r.right_ticks,
                    left_speed: r.left_speed,
                    right_speed: r.right_speed,
                };
                out.push(Outbound::Frame(report.to_frame()?));
            }
        }
        if due(&mut self.timers.force, t, iv.force_ms) {
            if let Some(r) = sample(self.hw.force.as_mut(), "force", out) {
                let report = ForceReport {
                    time_ms: t,
                    left: r.left,
                    right: r.right,
                };
                out.push(Outbound::Frame(report.to_frame()?));
            }
        }
        if due(&mut self.timers.power, t, iv.power_ms) {
            if let Some(r) = sample(self.hw.power.as_mut(), "power", out) {
                let report = PowerReport {
                    time_ms: t,
                    current_ma: r.current_ma,
                    power_mw: r.power_mw,
                    load_voltage: r.load_voltage,
                };
                out.push(Outbound::Frame(report.to_frame()?));
            }
        }
        if due(&mut self.timers.imu, t, iv.imu_ms) {
            if let Some(r) = sample(self.hw.imu.as_mut(), "imu", out) {
                let report = ImuReport {
                    time_ms: t,
                    yaw: r.yaw,
                    pitch: r.pitch,
                    roll: r.roll,
                    gyro: r.gyro,
                    linear_accel: r.linear_accel,
                };
                out.push(Outbound::Frame(report.to_frame()?));
            }
        }
        if due(&mut self.timers.range, t, iv.range_ms) {
            // readings come from the interlock's last samples
            if let (Some(front), Some(back)) = self.interlock.ranges() {
                let report = RangeReport {
                    time_ms: t,
                    front_mm: front.range_mm,
                    back_mm: back.range_mm,
                    front_range_status: front.range_status,
                    back_range_status: back.range_status,
                    front_device_status: front.device_status,
                    back_device_status: back.device_status,
                };
                out.push(Outbound::Frame(report.to_frame()?));
            }
        }
        if due(&mut self.timers.safety, t, iv.safety_ms) {
            let report = SafetyReport {
                time_ms: t,
                flags: self.interlock.flags(),
                state: self.state,
            };
            out.push(Outbound::Frame(report.to_frame()?));
        }
        if due(&mut self.timers.servo, t, iv.servo_ms) {
            let report = ServoReport {
                time_ms: t,
                positions: self.servo_positions.clone(),
            };
            out.push(Outbound::Frame(report.to_frame()?));
        }
        Ok(())
    }
}

fn sample<T>(
    sensor: &mut dyn Sensor<Reading = T>,
    what: &str,
    out: &mut Vec<Outbound>,
) -> Option<T> {
    match sensor.sample() {
        Ok(reading) => Some(reading),
        Err(err) => {
            warn!(sensor = what, error = %err, "sensor read failed");
            out.push(Outbound::Log(format!("{what} sensor: {err}")));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;
    use rovlink_frame::{decode_frame, encode_frame};
    use rovlink_records::RangeLimits;

    use super::*;
    use crate::collaborators::SensorError;
    use crate::config::ReportIntervals;
    use crate::sim::SimRover;

    fn command_frame(sequence: u32, command: &Command) -> Frame {
        let mut buf = BytesMut::new();
        encode_frame(sequence, &command.to_frame().unwrap(), &mut buf);
        decode_frame(&buf[2..buf.len() - 1]).unwrap()
    }

    fn controller(rover: &SimRover) -> DeviceController {
        DeviceController::new(DeviceConfig::default(), rover.collaborators())
    }

    fn send(device: &mut DeviceController, sequence: u32, command: Command) -> Vec<Outbound> {
        let mut out = Vec::new();
        device
            .handle_frame(&command_frame(sequence, &command), 0, &mut out)
            .unwrap();
        out
    }

    fn ack(sequence: u32, status: AckStatus) -> Outbound {
        Outbound::Frame(
            Ack {
                packet_num: sequence,
                status,
            }
            .to_frame()
            .unwrap(),
        )
    }

    fn categories(out: &[Outbound]) -> Vec<&str> {
        out.iter()
            .filter_map(|o| match o {
                Outbound::Frame(f) => Some(f.category()),
                Outbound::Log(_) => None,
            })
            .collect()
    }

    /// Active, sampled once while stationary, and moving forward.
    fn moving_forward(rover: &SimRover) -> DeviceController {
        let mut device = controller(rover);
        send(&mut device, 0, Command::activate());
        device.tick(0, &mut Vec::new()).unwrap();
        send(&mut device, 1, Command::motors(100.0, 100.0));
        device.tick(10, &mut Vec::new()).unwrap();
        assert_eq!(device.motion(), Motion::Forward);
        device
    }

    #[test]
    fn identify_gets_ready_reply() {
        let rover = SimRover::new();
        let mut device = controller(&rover);
        let mut out = Vec::new();
        device
            .handle_frame(&command_frame(0, &Command::identify("rover6")), 1234, &mut out)
            .unwrap();

        let ready = Ready {
            time_ms: 1234,
            name: "rover6".into(),
        };
        assert_eq!(out, vec![Outbound::Frame(ready.to_frame().unwrap())]);
    }

    #[test]
    fn commands_are_acked_with_their_sequence_number() {
        let rover = SimRover::new();
        let mut device = controller(&rover);

        assert_eq!(
            send(&mut device, 7, Command::motors(10.0, 10.0)),
            vec![ack(7, AckStatus::Inactive)]
        );
        assert_eq!(
            send(&mut device, 8, Command::activate()),
            vec![ack(8, AckStatus::Ok)]
        );
        device.tick(0, &mut Vec::new()).unwrap();
        assert_eq!(
            send(&mut device, 9, Command::servo(99, 10)),
            vec![ack(9, AckStatus::BadField)]
        );

        let mut out = Vec::new();
        let unknown = Frame::new(10, "zz", vec!["1".into()]);
        device.handle_frame(&unknown, 0, &mut out).unwrap();
        assert_eq!(out, vec![ack(10, AckStatus::UnknownCategory)]);

        let mut out = Vec::new();
        let short = Frame::new(11, "m", vec!["1.0".into()]);
        device.handle_frame(&short, 0, &mut out).unwrap();
        assert_eq!(out, vec![ack(11, AckStatus::BadField)]);
    }

    #[test]
    fn arming_touches_hardware_only_on_transitions() {
        let rover = SimRover::new();
        let mut device = controller(&rover);

        send(&mut device, 0, Command::activate());
        assert_eq!(rover.standby_calls(), 2);
        assert_eq!(rover.standby(), (false, false));

        send(&mut device, 1, Command::activate());
        assert_eq!(rover.standby_calls(), 2);

        send(&mut device, 2, Command::deactivate());
        assert_eq!(rover.standby_calls(), 4);
        assert_eq!(rover.standby(), (true, true));
        assert!(!device.flags().motors_armed);
    }

    #[test]
    fn hard_stop_zeroes_motors_before_queued_commands() {
        let rover = SimRover::new();
        let mut device = moving_forward(&rover);
        let before = rover.motor_log().len();

        rover.set_front_mm(40);
        send(&mut device, 2, Command::motors(120.0, 120.0));
        send(&mut device, 3, Command::motors(-90.0, -90.0));
        device.tick(20, &mut Vec::new()).unwrap();

        let issued = &rover.motor_log()[before..];
        assert_eq!(
            issued,
            [
                MotorOutput::ZERO,
                MotorOutput::ZERO,
                MotorOutput::new(-90.0, -90.0)
            ]
        );
        assert!(device.flags().front_obstacle);
        assert_eq!(device.motion(), Motion::Reverse);
    }

    #[test]
    fn non_finite_motor_command_is_refused() {
        let rover = SimRover::new();
        let mut device = controller(&rover);
        send(&mut device, 0, Command::activate());
        rover.set_front_mm(40);
        device.tick(0, &mut Vec::new()).unwrap();
        assert!(device.flags().front_obstacle);

        let mut out = Vec::new();
        let nan = Frame::new(1, "m", vec!["NaN".into(), "255".into()]);
        device.handle_frame(&nan, 0, &mut out).unwrap();
        assert_eq!(out, vec![ack(1, AckStatus::BadField)]);

        device.tick(10, &mut Vec::new()).unwrap();
        assert_eq!(rover.motors(), MotorOutput::ZERO);
        assert_eq!(device.motion(), Motion::Stationary);
    }

    #[test]
    fn rear_sensor_fault_stops_forward_motion() {
        let rover = SimRover::new();
        let mut device = moving_forward(&rover);

        rover.set_back(Err(SensorError::NotResponding));
        let mut out = Vec::new();
        device.tick(20, &mut out).unwrap();

        assert!(!device.flags().back_sensor_ok);
        assert!(!device.flags().back_obstacle);
        assert_eq!(rover.motors(), MotorOutput::ZERO);
        assert_eq!(device.motion(), Motion::Stationary);
        assert!(matches!(&out[..], [Outbound::Log(line)] if line.starts_with("hard stop: unsafe")));
    }

    #[test]
    fn bumper_hit_stops_forward_motion() {
        let rover = SimRover::new();
        let mut device = moving_forward(&rover);

        rover.set_bumpers(true, false);
        let mut out = Vec::new();
        device.tick(20, &mut out).unwrap();

        assert_eq!(rover.motors(), MotorOutput::ZERO);
        assert!(matches!(&out[..], [Outbound::Log(line)] if line.starts_with("hard stop")));
    }

    #[test]
    fn reversing_tick_leaves_front_flag_alone() {
        let rover = SimRover::new();
        let mut device = controller(&rover);
        send(&mut device, 0, Command::activate());
        rover.set_front_mm(40);
        device.tick(0, &mut Vec::new()).unwrap();
        assert!(device.flags().front_obstacle);

        send(&mut device, 1, Command::motors(-100.0, -100.0));
        device.tick(10, &mut Vec::new()).unwrap();
        assert_eq!(device.motion(), Motion::Reverse);

        rover.set_front_mm(500);
        let samples = rover.samples();
        device.tick(20, &mut Vec::new()).unwrap();

        assert_eq!(rover.samples(), (samples.0, samples.1 + 1));
        assert!(device.flags().front_obstacle);
        assert!(device.flags().front_sensor_ok);
    }

    #[test]
    fn unhealthy_sensor_blocks_motion() {
        let rover = SimRover::new();
        let mut device = controller(&rover);
        send(&mut device, 0, Command::activate());
        rover.set_back(Err(SensorError::NotResponding));
        device.tick(0, &mut Vec::new()).unwrap();
        assert!(!device.interlock().safe_to_move());

        send(&mut device, 1, Command::motors(100.0, 100.0));
        device.tick(10, &mut Vec::new()).unwrap();
        assert_eq!(rover.motors(), MotorOutput::ZERO);
    }

    #[test]
    fn deactivate_neutralizes_outputs() {
        let rover = SimRover::new();
        let mut device = moving_forward(&rover);
        send(&mut device, 2, Command::deactivate());

        assert_eq!(rover.motors(), MotorOutput::ZERO);
        assert!(!device.state().active);
    }

    #[test]
    fn servo_commands_track_positions() {
        let rover = SimRover::new();
        let mut device = controller(&rover);
        send(&mut device, 0, Command::activate());
        device.tick(0, &mut Vec::new()).unwrap();

        assert_eq!(send(&mut device, 1, Command::servo(3, 200)), vec![ack(1, AckStatus::Ok)]);
        assert_eq!(device.servo_positions()[3], 180);
        send(&mut device, 2, Command::servo_default(3));
        assert_eq!(device.servo_positions()[3], 90);
        assert_eq!(rover.servo_log().len(), 2);
    }

    #[test]
    fn servo_driver_fault_is_acked_as_actuator_fault() {
        let rover = SimRover::new();
        let mut device = controller(&rover);
        send(&mut device, 0, Command::activate());
        device.tick(0, &mut Vec::new()).unwrap();
        rover.set_servos_responding(false);

        assert_eq!(
            send(&mut device, 1, Command::servo(2, 30)),
            vec![ack(1, AckStatus::ActuatorFault)]
        );
        assert_eq!(device.servo_positions()[2], DeviceConfig::default().servo_default_position);
    }

    #[test]
    fn servo_commands_wait_for_healthy_sensors() {
        let rover = SimRover::new();
        let mut device = controller(&rover);
        send(&mut device, 0, Command::activate());
        // no tick yet: sensor health is unknown
        assert_eq!(
            send(&mut device, 1, Command::servo(3, 45)),
            vec![ack(1, AckStatus::Inactive)]
        );

        rover.set_front(Err(SensorError::NotResponding));
        device.tick(0, &mut Vec::new()).unwrap();
        assert_eq!(
            send(&mut device, 2, Command::servo(3, 45)),
            vec![ack(2, AckStatus::Inactive)]
        );
        assert_eq!(
            send(&mut device, 3, Command::servo_default(3)),
            vec![ack(3, AckStatus::Inactive)]
        );
        assert!(rover.servo_log().is_empty());
    }

    #[test]
    fn settings_commands_update_state() {
        let rover = SimRover::new();
        let mut device = controller(&rover);

        send(
            &mut device,
            0,
            Command::Thresholds(RangeLimits {
                front_upper: 1000,
                back_upper: 1000,
                front_lower: 200,
                back_lower: 150,
            }),
        );
        assert_eq!(device.interlock().thresholds().front.lower_mm, 200);

        let gains = SpeedGains {
            kp_a: 1.0,
            ..SpeedGains::default()
        };
        send(&mut device, 1, Command::SpeedGains(gains));
        assert!(device.state().speed_control_enabled);
        assert_eq!(device.gains(), Some(&gains));
    }

    #[test]
    fn restart_resets_sensors_and_stays_active() {
        let rover = SimRover::new();
        let mut device = controller(&rover);
        send(&mut device, 0, Command::activate());
        let resets = rover.resets();

        send(&mut device, 1, Command::restart());
        assert!(device.state().active);
        assert!(rover.resets() > resets);
    }

    #[test]
    fn reports_follow_their_intervals() {
        let rover = SimRover::new();
        let config = DeviceConfig {
            intervals: ReportIntervals {
                safety_ms: 100,
                servo_ms: 0,
                ..ReportIntervals::default()
            },
            ..DeviceConfig::default()
        };
        let mut device = DeviceController::new(config, rover.collaborators());
        send(&mut device, 0, Command::reporting(true));

        let mut out = Vec::new();
        device.tick(0, &mut out).unwrap();
        assert_eq!(
            categories(&out),
            ["enc", "fsr", "ina", "bno", "lox", "safe"]
        );

        let mut out = Vec::new();
        device.tick(10, &mut out).unwrap();
        assert!(out.is_empty());

        let mut out = Vec::new();
        device.tick(30, &mut out).unwrap();
        assert_eq!(categories(&out), ["enc", "fsr", "ina"]);
    }

    #[test]
    fn nothing_is_reported_while_reporting_is_off() {
        let rover = SimRover::new();
        let mut device = controller(&rover);
        let mut out = Vec::new();
        device.tick(0, &mut out).unwrap();
        assert!(out.is_empty());
    }
}
