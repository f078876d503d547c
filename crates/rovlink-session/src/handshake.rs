use std::io::Write;
use std::time::Duration;

use rovlink_records::Command;
use rovlink_transport::PollRead;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::{Result, SessionError};
use crate::session::{LinkSession, PollOutcome};

/// Name the host announces in its identify command.
pub const DEFAULT_HOST_NAME: &str = "rover6";

/// Frames handled per poll pass before the loop checks its timers again.
const MAX_FRAMES_PER_PASS: usize = 64;

/// Configuration for the ready handshake.
#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    /// Give up after this long without a ready record.
    pub timeout: Duration,
    /// Re-send the identify command at this interval.
    pub retry_interval: Duration,
    /// Sleep between poll passes.
    pub poll_interval: Duration,
    /// Name sent with the identify command.
    pub name: String,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            retry_interval: Duration::from_secs(1),
            poll_interval: Duration::from_millis(10),
            name: DEFAULT_HOST_NAME.to_string(),
        }
    }
}

/// Result of a successful handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResult {
    /// Name the device reported in its ready record.
    pub device_name: String,
    /// Device clock at the ready record.
    pub device_ms: u32,
    /// Identify commands sent, including the first.
    pub queries: u32,
    pub elapsed: Duration,
}

impl<R: PollRead, W: Write, C: Clock> LinkSession<R, W, C> {
    /// Query the device until it answers with a ready record.
    ///
    /// Frames that arrive meanwhile are parsed and sequenced but withheld
    /// from consumers. Returns immediately if the time base is already set.
    pub fn handshake(&mut self) -> Result<HandshakeResult> {
        if let Some(base) = self.time.base() {
            return Ok(HandshakeResult {
                device_name: String::new(),
                device_ms: base.device_ms,
                queries: 0,
                elapsed: Duration::ZERO,
            });
        }

        let config = self.config.handshake.clone();
        let identify = Command::identify(config.name.as_str());
        let start = self.clock.now();

        self.send(&identify)?;
        let mut queries = 1;
        let mut last_query = start;
        debug!(name = %config.name, "identify sent");

        loop {
            for _ in 0..MAX_FRAMES_PER_PASS {
                match self.poll()? {
                    PollOutcome::Idle => break,
                    PollOutcome::Synced { device_ms, name } => {
                        let elapsed = self.clock.now().duration_since(start);
                        info!(device = %name, queries, ?elapsed, "handshake complete");
                        return Ok(HandshakeResult {
                            device_name: name,
                            device_ms,
                            queries,
                            elapsed,
                        });
                    }
                    _ => {}
                }
            }

            let now = self.clock.now();
            if now.duration_since(start) >= config.timeout {
                warn!(queries, timeout = ?config.timeout, "device never reported ready");
                return Err(SessionError::HandshakeTimeout(config.timeout));
            }
            if now.duration_since(last_query) >= config.retry_interval {
                self.send(&identify)?;
                queries += 1;
                // anchored to the first query; restarts from now after a stall
                last_query += config.retry_interval;
                if now.duration_since(last_query) >= config.retry_interval {
                    last_query = now;
                }
                debug!(queries, "identify re-sent");
            }
            self.clock.sleep(config.poll_interval);
        }
    }
}
