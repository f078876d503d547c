use std::collections::HashMap;
use std::io::Write;
use std::time::SystemTime;

use rovlink_frame::{Frame, FrameConfig, FrameError, FrameReader, FrameWriter, SequenceTracker};
use rovlink_records::{Command, Record, RecordConfig, RecordError, RecordRegistry};
use rovlink_transport::PollRead;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::{Result, SessionError};
use crate::handshake::HandshakeConfig;
use crate::timebase::TimeBridge;

/// Configuration for a link session.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub frame: FrameConfig,
    pub records: RecordConfig,
    pub handshake: HandshakeConfig,
}

/// A record handed to consumers.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub sequence: u32,
    /// Device timestamp mapped onto the host clock, or the receive time for
    /// records without a timestamp.
    pub host_time: SystemTime,
    pub record: Record,
}

/// What a single [`LinkSession::poll`] call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// No complete frame was available.
    Idle,
    /// The first ready record arrived and set the time base.
    Synced { device_ms: u32, name: String },
    /// A record was handed to consumers.
    Delivered { category: String },
    /// A record parsed but was held back because the time base is not set.
    Withheld { category: String },
    /// A frame failed the byte-level checks.
    Rejected,
    /// A frame passed the byte-level checks but its category or fields did
    /// not parse.
    Dropped,
}

/// Host-side link counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkStats {
    pub frames_accepted: u64,
    pub frames_rejected: u64,
    pub frames_dropped: u64,
    pub unknown_categories: u64,
    pub sequence_gaps: u64,
    pub withheld: u64,
    pub device_rejections: u64,
    pub log_lines: u64,
    pub commands_sent: u64,
}

type Handler = Box<dyn FnMut(&Delivery)>;

/// One host end of the rover link.
///
/// Owns the read and write halves of the stream, the sequence counters, the
/// time base and the registered consumers. Everything runs on the caller's
/// thread: [`poll`](Self::poll) never blocks and handles at most one frame.
pub struct LinkSession<R, W, C = SystemClock> {
    pub(crate) reader: FrameReader<R>,
    pub(crate) writer: FrameWriter<W>,
    pub(crate) clock: C,
    pub(crate) sequence: SequenceTracker,
    pub(crate) time: TimeBridge,
    pub(crate) config: SessionConfig,
    registry: RecordRegistry,
    handlers: HashMap<String, Vec<Handler>>,
    any_handlers: Vec<Handler>,
    stats: LinkStats,
    closed: bool,
}

impl<R: PollRead, W: Write> LinkSession<R, W, SystemClock> {
    pub fn new(reader: R, writer: W, config: SessionConfig) -> Self {
        Self::with_clock(reader, writer, config, SystemClock)
    }
}

impl<R: PollRead, W: Write, C: Clock> LinkSession<R, W, C> {
    pub fn with_clock(reader: R, writer: W, config: SessionConfig, clock: C) -> Self {
        Self {
            reader: FrameReader::with_config(reader, config.frame.clone()),
            writer: FrameWriter::with_config(writer, config.frame.clone()),
            clock,
            sequence: SequenceTracker::new(),
            time: TimeBridge::default(),
            registry: RecordRegistry::standard(config.records),
            config,
            handlers: HashMap::new(),
            any_handlers: Vec::new(),
            stats: LinkStats::default(),
            closed: false,
        }
    }

    /// Register a consumer for one category.
    pub fn on<F>(&mut self, category: &str, handler: F)
    where
        F: FnMut(&Delivery) + 'static,
    {
        self.handlers
            .entry(category.to_string())
            .or_default()
            .push(Box::new(handler));
    }

    /// Register a consumer for every category.
    pub fn on_any<F>(&mut self, handler: F)
    where
        F: FnMut(&Delivery) + 'static,
    {
        self.any_handlers.push(Box::new(handler));
    }

    /// Replace the record registry, e.g. to add custom categories.
    pub fn set_registry(&mut self, registry: RecordRegistry) {
        self.registry = registry;
    }

    /// Encode and write one command immediately. Returns its sequence number.
    pub fn send(&mut self, command: &Command) -> Result<u32> {
        self.ensure_open()?;
        self.write_command(command)
    }

    fn write_command(&mut self, command: &Command) -> Result<u32> {
        let frame = command.to_frame()?;
        let sequence = self.sequence.next_send();
        self.writer.send(sequence, &frame).map_err(map_frame_error)?;
        self.stats.commands_sent += 1;
        debug!(sequence, category = command.category(), "command sent");
        Ok(sequence)
    }

    /// Handle at most one frame.
    pub fn poll(&mut self) -> Result<PollOutcome> {
        self.ensure_open()?;
        match self.reader.poll_frame() {
            Ok(None) => Ok(PollOutcome::Idle),
            Ok(Some(frame)) => Ok(self.handle_frame(frame)),
            Err(err) if err.is_recoverable() => {
                self.stats.frames_rejected += 1;
                error!(error = %err, "frame rejected");
                Ok(PollOutcome::Rejected)
            }
            Err(err) => Err(map_frame_error(err)),
        }
    }

    /// Reset sensors, activate the rover and turn reporting on.
    pub fn start(&mut self) -> Result<()> {
        self.send(&Command::reset_sensors())?;
        self.send(&Command::activate())?;
        self.send(&Command::reporting(true))?;
        info!("rover started");
        Ok(())
    }

    /// Deactivate the rover, stop reporting and discard buffered input.
    ///
    /// The session is closed even when a step fails: every step is still
    /// attempted and the first error is returned. After this every `send`
    /// and `poll` fails with [`SessionError::Closed`]. Calling it again is a
    /// no-op.
    pub fn shutdown(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let deactivated = self.write_command(&Command::deactivate());
        let silenced = self.write_command(&Command::reporting(false));
        let drained = match self.reader.drain() {
            Ok(dropped) => Ok(dropped),
            Err(FrameError::ConnectionClosed) => Ok(0),
            Err(err) => Err(SessionError::Frame(err)),
        };

        deactivated?;
        silenced?;
        let dropped = drained?;
        info!(dropped, "link session shut down");
        Ok(())
    }

    /// Forget the sequence counters and the time base.
    pub fn reset(&mut self) {
        self.sequence.reset();
        self.time.reset();
        info!("link session reset");
    }

    pub fn stats(&self) -> LinkStats {
        LinkStats {
            log_lines: self.reader.log_lines(),
            ..self.stats
        }
    }

    pub fn time_bridge(&self) -> &TimeBridge {
        &self.time
    }

    pub fn sequence(&self) -> &SequenceTracker {
        &self.sequence
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(SessionError::Closed);
        }
        Ok(())
    }

    fn handle_frame(&mut self, frame: Frame) -> PollOutcome {
        self.stats.frames_accepted += 1;
        if self.sequence.observe(frame.sequence).is_some() {
            self.stats.sequence_gaps += 1;
        }

        let record = match self.registry.parse(&frame) {
            Ok(record) => record,
            Err(RecordError::UnknownCategory(category)) => {
                self.stats.unknown_categories += 1;
                debug!(%category, "ignoring frame with unknown category");
                return PollOutcome::Dropped;
            }
            Err(err) => {
                self.stats.frames_dropped += 1;
                warn!(error = %err, sequence = frame.sequence, "dropping unparsable frame");
                return PollOutcome::Dropped;
            }
        };

        if let Record::Ack(ack) = &record {
            if !ack.status.is_ok() {
                self.stats.device_rejections += 1;
                error!(
                    packet = ack.packet_num,
                    status = ack.status.code(),
                    "device failed to handle packet"
                );
            }
        }

        let mut synced = None;
        if let Record::Ready(ready) = &record {
            if self.time.sync(ready.time_ms, self.clock.wall()) {
                info!(name = %ready.name, device_ms = ready.time_ms, "device ready");
                synced = Some((ready.time_ms, ready.name.clone()));
            }
        }

        if !self.time.is_synced() {
            self.stats.withheld += 1;
            return PollOutcome::Withheld {
                category: frame.category,
            };
        }

        let host_time = record
            .time_ms()
            .and_then(|t| self.time.to_host(t))
            .unwrap_or_else(|| self.clock.wall());
        let delivery = Delivery {
            sequence: frame.sequence,
            host_time,
            record,
        };
        if let Some(handlers) = self.handlers.get_mut(&frame.category) {
            for handler in handlers.iter_mut() {
                handler(&delivery);
            }
        }
        for handler in self.any_handlers.iter_mut() {
            handler(&delivery);
        }

        match synced {
            Some((device_ms, name)) => PollOutcome::Synced { device_ms, name },
            None => PollOutcome::Delivered {
                category: frame.category,
            },
        }
    }
}

fn map_frame_error(err: FrameError) -> SessionError {
    match err {
        FrameError::ConnectionClosed => SessionError::Disconnected,
        other => SessionError::Frame(other),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::io::Cursor;
    use std::rc::Rc;
    use std::time::Duration;

    use bytes::BytesMut;
    use rovlink_frame::{encode_frame, OutgoingFrame};
    use rovlink_records::{Ack, AckStatus, ForceReport, Ready};

    use super::*;
    use crate::clock::ManualClock;

    fn push(wire: &mut BytesMut, seq: u32, frame: OutgoingFrame) {
        encode_frame(seq, &frame, wire);
    }

    fn ready(time_ms: u32) -> OutgoingFrame {
        Ready {
            time_ms,
            name: "rover6".into(),
        }
        .to_frame()
        .unwrap()
    }

    fn force(time_ms: u32) -> OutgoingFrame {
        ForceReport {
            time_ms,
            left: 1,
            right: 2,
        }
        .to_frame()
        .unwrap()
    }

    fn session(wire: BytesMut) -> LinkSession<Cursor<Vec<u8>>, Vec<u8>, ManualClock> {
        LinkSession::with_clock(
            Cursor::new(wire.to_vec()),
            Vec::new(),
            SessionConfig::default(),
            ManualClock::default(),
        )
    }

    fn sent_frames(session: LinkSession<Cursor<Vec<u8>>, Vec<u8>, ManualClock>) -> Vec<Frame> {
        let bytes = session.writer.into_inner();
        let mut reader = FrameReader::new(Cursor::new(bytes));
        let mut frames = Vec::new();
        while let Some(frame) = reader.poll_frame().unwrap() {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn telemetry_before_ready_is_withheld() {
        let mut wire = BytesMut::new();
        push(&mut wire, 0, force(10));
        push(&mut wire, 1, ready(1000));
        push(&mut wire, 2, force(1500));
        let mut session = session(wire);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        session.on("fsr", move |d| sink.borrow_mut().push(d.clone()));

        assert_eq!(
            session.poll().unwrap(),
            PollOutcome::Withheld {
                category: "fsr".into()
            }
        );
        assert_eq!(
            session.poll().unwrap(),
            PollOutcome::Synced {
                device_ms: 1000,
                name: "rover6".into()
            }
        );
        assert_eq!(
            session.poll().unwrap(),
            PollOutcome::Delivered {
                category: "fsr".into()
            }
        );
        assert_eq!(session.poll().unwrap(), PollOutcome::Idle);

        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        let epoch = session.clock().wall();
        assert_eq!(seen[0].host_time, epoch + Duration::from_millis(500));
        assert_eq!(session.stats().withheld, 1);
        assert_eq!(session.sequence().recv_count(), 3);
    }

    #[test]
    fn byte_level_failures_do_not_advance_sequence() {
        let mut wire = BytesMut::new();
        push(&mut wire, 0, ready(0));
        let mut bad = BytesMut::new();
        push(&mut bad, 1, force(1));
        let flip = bad.len() - 4;
        bad[flip] ^= 0x02;
        wire.extend_from_slice(&bad);
        push(&mut wire, 1, force(2));
        let mut session = session(wire);

        session.poll().unwrap();
        assert_eq!(session.poll().unwrap(), PollOutcome::Rejected);
        assert_eq!(session.sequence().recv_count(), 1);
        assert!(matches!(
            session.poll().unwrap(),
            PollOutcome::Delivered { .. }
        ));
        assert_eq!(session.stats().sequence_gaps, 0);
        assert_eq!(session.stats().frames_rejected, 1);
    }

    #[test]
    fn parse_failures_still_advance_sequence() {
        let mut wire = BytesMut::new();
        push(&mut wire, 0, ready(0));
        push(
            &mut wire,
            1,
            OutgoingFrame::new("fsr", vec![1u32.into()]).unwrap(),
        );
        push(&mut wire, 2, OutgoingFrame::new("ir", vec![]).unwrap());
        push(&mut wire, 3, force(5));
        let mut session = session(wire);

        session.poll().unwrap();
        assert_eq!(session.poll().unwrap(), PollOutcome::Dropped);
        assert_eq!(session.poll().unwrap(), PollOutcome::Dropped);
        assert!(matches!(
            session.poll().unwrap(),
            PollOutcome::Delivered { .. }
        ));

        let stats = session.stats();
        assert_eq!(stats.sequence_gaps, 0);
        assert_eq!(stats.frames_dropped, 1);
        assert_eq!(stats.unknown_categories, 1);
        assert_eq!(stats.frames_accepted, 4);
    }

    #[test]
    fn sequence_jump_is_counted_once() {
        let mut wire = BytesMut::new();
        push(&mut wire, 0, ready(0));
        push(&mut wire, 6, force(1));
        push(&mut wire, 7, force(2));
        let mut session = session(wire);

        while session.poll().unwrap() != PollOutcome::Idle {}
        assert_eq!(session.stats().sequence_gaps, 1);
        assert_eq!(session.sequence().recv_count(), 8);
    }

    #[test]
    fn any_handler_sees_every_delivery_and_nacks_are_counted() {
        let mut wire = BytesMut::new();
        push(&mut wire, 0, ready(0));
        push(
            &mut wire,
            1,
            Ack {
                packet_num: 4,
                status: AckStatus::BadField,
            }
            .to_frame()
            .unwrap(),
        );
        let mut session = session(wire);
        let count = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&count);
        session.on_any(move |_| *counter.borrow_mut() += 1);

        while session.poll().unwrap() != PollOutcome::Idle {}
        assert_eq!(*count.borrow(), 2);
        assert_eq!(session.stats().device_rejections, 1);
    }

    #[test]
    fn start_sends_bridge_startup_sequence() {
        let mut session = session(BytesMut::new());
        session.start().unwrap();

        let frames = sent_frames(session);
        let summary: Vec<(u32, &str, &str)> = frames
            .iter()
            .map(|f| (f.sequence, f.category.as_str(), f.field(0).unwrap()))
            .collect();
        assert_eq!(summary, vec![(0, "[]", "2"), (1, "<>", "1"), (2, "[]", "1")]);
    }

    #[test]
    fn shutdown_closes_the_session() {
        let mut wire = BytesMut::new();
        push(&mut wire, 0, ready(0));
        push(&mut wire, 1, force(1));
        let mut session = session(wire);

        session.shutdown().unwrap();
        assert!(session.is_closed());
        assert!(matches!(session.poll(), Err(SessionError::Closed)));
        assert!(matches!(
            session.send(&Command::activate()),
            Err(SessionError::Closed)
        ));
        session.shutdown().unwrap();

        let frames = sent_frames(session);
        let categories: Vec<(&str, &str)> = frames
            .iter()
            .map(|f| (f.category.as_str(), f.field(0).unwrap()))
            .collect();
        assert_eq!(categories, vec![("<>", "0"), ("[]", "0")]);
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failed_shutdown_still_closes_the_session() {
        let mut session = LinkSession::with_clock(
            Cursor::new(Vec::new()),
            BrokenPipe,
            SessionConfig::default(),
            ManualClock::default(),
        );

        assert!(session.shutdown().is_err());
        assert!(session.is_closed());
        assert_eq!(session.stats().commands_sent, 0);
        assert!(matches!(
            session.send(&Command::activate()),
            Err(SessionError::Closed)
        ));
        session.shutdown().unwrap();
    }

    #[test]
    fn reset_clears_counters_and_time_base() {
        let mut wire = BytesMut::new();
        push(&mut wire, 0, ready(0));
        let mut session = session(wire);
        session.poll().unwrap();
        session.send(&Command::activate()).unwrap();

        session.reset();
        assert!(!session.time_bridge().is_synced());
        assert_eq!(session.sequence().send_count(), 0);
        assert_eq!(session.sequence().recv_count(), 0);
    }

    #[test]
    fn closed_stream_is_disconnected() {
        let (device, host) = std::os::unix::net::UnixStream::pair().unwrap();
        let writer = host.try_clone().unwrap();
        let mut session = LinkSession::new(host, writer, SessionConfig::default());
        drop(device);

        assert!(matches!(session.poll(), Err(SessionError::Disconnected)));
    }
}
