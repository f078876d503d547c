//! Host-side session over the rover link.
//!
//! A [`LinkSession`] owns both halves of the byte stream. It sends commands
//! with increasing sequence numbers, tracks the device's sequence numbers,
//! runs the ready handshake that fixes the device time base, and hands
//! parsed records to registered consumers once that time base exists.

pub mod clock;
#[cfg(unix)]
pub mod connector;
pub mod error;
pub mod handshake;
pub mod session;
pub mod timebase;

pub use clock::{Clock, ManualClock, SystemClock};
#[cfg(unix)]
pub use connector::connect;
pub use error::{Result, SessionError};
pub use handshake::{HandshakeConfig, HandshakeResult, DEFAULT_HOST_NAME};
pub use session::{Delivery, LinkSession, LinkStats, PollOutcome, SessionConfig};
pub use timebase::{TimeBase, TimeBridge};
