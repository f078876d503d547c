use std::io::{ErrorKind, Write};

use rovlink_frame::{
    FrameConfig, FrameError, FrameReader, FrameWriter, SequenceTracker, START0, START1, STOP,
};
use rovlink_transport::PollRead;
use tracing::{debug, warn};

use crate::controller::{DeviceController, Outbound};
use crate::error::{DeviceError, Result};

/// A [`DeviceController`] attached to a byte stream.
///
/// Each [`step`](Self::step) handles every frame already received, runs one
/// control tick and writes out what the controller produced.
pub struct DeviceLink<R, W> {
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
    sequence: SequenceTracker,
    controller: DeviceController,
    outbox: Vec<Outbound>,
}

impl<R: PollRead, W: Write> DeviceLink<R, W> {
    pub fn new(reader: R, writer: W, controller: DeviceController) -> Self {
        Self::with_config(reader, writer, controller, FrameConfig::default())
    }

    pub fn with_config(
        reader: R,
        writer: W,
        controller: DeviceController,
        config: FrameConfig,
    ) -> Self {
        Self {
            reader: FrameReader::with_config(reader, config.clone()),
            writer: FrameWriter::with_config(writer, config),
            sequence: SequenceTracker::new(),
            controller,
            outbox: Vec::new(),
        }
    }

    /// Run one loop iteration at device time `now_ms`.
    ///
    /// Returns [`DeviceError::Disconnected`] once the host is gone; the
    /// controller is shut down first.
    pub fn step(&mut self, now_ms: u32) -> Result<()> {
        loop {
            match self.reader.poll_frame() {
                Ok(Some(frame)) => {
                    self.sequence.observe(frame.sequence);
                    self.controller
                        .handle_frame(&frame, now_ms, &mut self.outbox)?;
                }
                Ok(None) => break,
                Err(err) if err.is_recoverable() => {
                    warn!(error = %err, "dropping bad frame from host");
                }
                Err(err) => return Err(self.disconnect(err)),
            }
        }

        self.controller.tick(now_ms, &mut self.outbox)?;
        self.flush()
    }

    pub fn controller(&self) -> &DeviceController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut DeviceController {
        &mut self.controller
    }

    pub fn sequence(&self) -> &SequenceTracker {
        &self.sequence
    }

    fn flush(&mut self) -> Result<()> {
        let mut outbox = std::mem::take(&mut self.outbox);
        for item in outbox.drain(..) {
            let written = match item {
                Outbound::Frame(frame) => {
                    let sequence = self.sequence.next_send();
                    self.writer.send(sequence, &frame)
                }
                Outbound::Log(line) => self.write_log_line(&line),
            };
            if let Err(err) = written {
                return Err(self.disconnect(err));
            }
        }
        self.outbox = outbox;
        Ok(())
    }

    fn write_log_line(&mut self, line: &str) -> rovlink_frame::Result<()> {
        let mut bytes: Vec<u8> = line
            .bytes()
            .map(|b| match b {
                START0 | START1 | STOP => b' ',
                other => other,
            })
            .collect();
        bytes.push(STOP);
        debug!(line, "device log line");
        self.writer.get_mut().write_all(&bytes)?;
        self.writer.flush()
    }

    fn disconnect(&mut self, err: FrameError) -> DeviceError {
        let closed = match &err {
            FrameError::ConnectionClosed => true,
            FrameError::Io(io) => matches!(
                io.kind(),
                ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::UnexpectedEof
            ),
            _ => false,
        };
        self.controller.shutdown();
        if closed {
            DeviceError::Disconnected
        } else {
            DeviceError::Frame(err)
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::Write;
    use std::os::unix::net::UnixStream;

    use bytes::BytesMut;
    use rovlink_frame::encode_frame;
    use rovlink_records::Command;

    use super::*;
    use crate::config::DeviceConfig;
    use crate::sim::SimRover;

    fn link(rover: &SimRover) -> (DeviceLink<UnixStream, UnixStream>, UnixStream) {
        let (device, host) = UnixStream::pair().unwrap();
        let writer = device.try_clone().unwrap();
        let controller = DeviceController::new(DeviceConfig::default(), rover.collaborators());
        (DeviceLink::new(device, writer, controller), host)
    }

    fn send(host: &mut UnixStream, sequence: u32, command: &Command) {
        let mut buf = BytesMut::new();
        encode_frame(sequence, &command.to_frame().unwrap(), &mut buf);
        host.write_all(&buf).unwrap();
    }

    #[test]
    fn answers_identify_with_ready() {
        let rover = SimRover::new();
        let (mut link, mut host) = link(&rover);
        send(&mut host, 0, &Command::identify("rover6"));

        link.step(250).unwrap();

        let mut reader = FrameReader::new(host);
        let frame = reader.poll_frame().unwrap().unwrap();
        assert_eq!(frame.sequence, 0);
        assert_eq!(frame.category, "ready");
        assert_eq!(frame.fields(), ["250", "rover6"]);
        assert_eq!(link.sequence().recv_count(), 1);
    }

    #[test]
    fn log_lines_travel_outside_frames() {
        let rover = SimRover::new();
        let (mut link, mut host) = link(&rover);
        send(&mut host, 0, &Command::activate());
        link.step(0).unwrap();
        send(&mut host, 1, &Command::motors(50.0, 50.0));
        link.step(10).unwrap();

        rover.set_front_mm(40);
        link.step(20).unwrap();
        assert_eq!(rover.motors().left, 0.0);

        let mut reader = FrameReader::new(host);
        let mut acks = 0;
        while let Some(frame) = reader.poll_frame().unwrap() {
            assert_eq!(frame.category, "txrx");
            acks += 1;
        }
        assert_eq!(acks, 2);
        assert_eq!(reader.log_lines(), 1);
    }

    #[test]
    fn closed_host_shuts_the_controller_down() {
        let rover = SimRover::new();
        let (mut link, mut host) = link(&rover);
        send(&mut host, 0, &Command::activate());
        link.step(0).unwrap();
        assert!(link.controller().state().active);

        drop(host);
        assert!(matches!(link.step(10), Err(DeviceError::Disconnected)));
        assert!(!link.controller().state().active);
    }
}
