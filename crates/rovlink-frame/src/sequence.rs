use tracing::warn;

/// A received sequence number that did not match the local count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceGap {
    pub expected: u32,
    pub received: u32,
}

/// Independent send and receive packet counters.
///
/// The receive side never waits or reorders: a mismatch is reported once and
/// the local count jumps to whatever the peer sent.
#[derive(Debug, Default, Clone)]
pub struct SequenceTracker {
    send_count: u32,
    recv_count: u32,
    gaps: u64,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence number for the next outgoing frame.
    pub fn next_send(&mut self) -> u32 {
        let seq = self.send_count;
        self.send_count = self.send_count.wrapping_add(1);
        seq
    }

    /// Record a frame that passed the byte-level checks.
    pub fn observe(&mut self, received: u32) -> Option<SequenceGap> {
        let gap = (received != self.recv_count).then(|| {
            warn!(
                expected = self.recv_count,
                received, "packet number does not match local count"
            );
            self.gaps += 1;
            SequenceGap {
                expected: self.recv_count,
                received,
            }
        });
        self.recv_count = received.wrapping_add(1);
        gap
    }

    pub fn send_count(&self) -> u32 {
        self.send_count
    }

    pub fn recv_count(&self) -> u32 {
        self.recv_count
    }

    /// Gaps observed since the last reset.
    pub fn gaps(&self) -> u64 {
        self.gaps
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
