use std::cell::RefCell;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use rovlink_records::{Ack, Command, RangeLimits, Record};
use rovlink_session::{connect, HandshakeConfig, LinkSession, PollOutcome, SessionConfig};
use rovlink_transport::{LinkStream, SerialOptions};
use tracing::info;

use crate::cmd::{LinkArgs, SendArgs, SendCommand};
use crate::exit::{session_error, CliError, CliResult, FAILURE, SUCCESS, TIMEOUT, USAGE};
use crate::output::{print_record, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let ack_timeout = parse_duration(&args.ack_timeout)?;
    let command = to_command(&args.command);
    let mut session = connect_link(&args.link)?;

    let acks: Rc<RefCell<Vec<Ack>>> = Rc::default();
    let sink = acks.clone();
    session.on("txrx", move |delivery| {
        if let Record::Ack(ack) = &delivery.record {
            sink.borrow_mut().push(ack.clone());
        }
    });

    let sequence = session
        .send(&command)
        .map_err(|err| session_error("send failed", err))?;
    info!(sequence, category = command.category(), "command sent");

    if !args.wait_ack {
        return Ok(SUCCESS);
    }

    let deadline = Instant::now() + ack_timeout;
    loop {
        let outcome = session
            .poll()
            .map_err(|err| session_error("receive failed", err))?;

        if let Some(ack) = take_ack(&acks, sequence) {
            print_record(sequence, None, &Record::Ack(ack.clone()), format);
            if ack.status.is_ok() {
                return Ok(SUCCESS);
            }
            return Err(CliError::new(
                FAILURE,
                format!(
                    "device rejected packet {sequence} with status {}",
                    ack.status.code()
                ),
            ));
        }

        if Instant::now() >= deadline {
            return Err(CliError::new(
                TIMEOUT,
                format!("no acknowledgement for packet {sequence} within {ack_timeout:?}"),
            ));
        }
        if outcome == PollOutcome::Idle {
            thread::sleep(Duration::from_millis(5));
        }
    }
}

/// Open the link and complete the ready handshake.
pub fn connect_link(args: &LinkArgs) -> CliResult<LinkSession<LinkStream, LinkStream>> {
    let timeout = parse_duration(&args.timeout)?;
    let serial = SerialOptions {
        baud: args.baud,
        ..SerialOptions::default()
    };
    let config = SessionConfig {
        handshake: HandshakeConfig {
            timeout,
            name: args.name.clone(),
            ..HandshakeConfig::default()
        },
        ..SessionConfig::default()
    };
    connect(&args.port, &serial, config).map_err(|err| session_error("connect failed", err))
}

fn take_ack(acks: &RefCell<Vec<Ack>>, sequence: u32) -> Option<Ack> {
    let mut acks = acks.borrow_mut();
    let index = acks.iter().position(|ack| ack.packet_num == sequence)?;
    Some(acks.swap_remove(index))
}

fn to_command(command: &SendCommand) -> Command {
    match command {
        SendCommand::Activate => Command::activate(),
        SendCommand::Deactivate => Command::deactivate(),
        SendCommand::Restart => Command::restart(),
        SendCommand::Reporting { state } => Command::reporting(state == "on"),
        SendCommand::ResetSensors => Command::reset_sensors(),
        SendCommand::Motors { left, right } => Command::motors(*left, *right),
        SendCommand::Servo { index, position } => Command::servo(*index, *position),
        SendCommand::ServoDefault { index } => Command::servo_default(*index),
        SendCommand::Thresholds {
            front_upper,
            back_upper,
            front_lower,
            back_lower,
        } => Command::Thresholds(RangeLimits {
            front_upper: *front_upper,
            back_upper: *back_upper,
            front_lower: *front_lower,
            back_lower: *back_lower,
        }),
    }
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

#[cfg(test)]
mod tests {
    use rovlink_records::AckStatus;

    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
    }

    #[test]
    fn ack_is_matched_by_packet_number() {
        let acks = RefCell::new(vec![
            Ack {
                packet_num: 3,
                status: AckStatus::Ok,
            },
            Ack {
                packet_num: 4,
                status: AckStatus::Inactive,
            },
        ]);
        assert_eq!(take_ack(&acks, 5), None);
        assert_eq!(take_ack(&acks, 4).unwrap().status, AckStatus::Inactive);
        assert_eq!(acks.borrow().len(), 1);
    }

    #[test]
    fn thresholds_keep_argument_order() {
        let command = to_command(&SendCommand::Thresholds {
            front_upper: 800,
            back_upper: 700,
            front_lower: 120,
            back_lower: 110,
        });
        assert_eq!(
            command,
            Command::Thresholds(RangeLimits {
                front_upper: 800,
                back_upper: 700,
                front_lower: 120,
                back_lower: 110,
            })
        );
    }
}
