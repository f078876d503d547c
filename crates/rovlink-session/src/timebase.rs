use std::time::{Duration, SystemTime};

use tracing::info;

/// Pairing of one host instant with one device millisecond count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBase {
    pub host_epoch: SystemTime,
    pub device_ms: u32,
}

impl TimeBase {
    pub fn new(host_epoch: SystemTime, device_ms: u32) -> Self {
        Self {
            host_epoch,
            device_ms,
        }
    }

    /// Host time of a device timestamp. Timestamps older than the handshake
    /// map to before the epoch.
    pub fn to_host(&self, device_ms: u32) -> SystemTime {
        let delta = i64::from(device_ms) - i64::from(self.device_ms);
        let offset = Duration::from_millis(delta.unsigned_abs());
        if delta >= 0 {
            self.host_epoch + offset
        } else {
            self.host_epoch - offset
        }
    }
}

/// Device-relative time to host time, once the device has said hello.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimeBridge {
    #[default]
    Unsynced,
    Synced(TimeBase),
}

impl TimeBridge {
    /// Set the time base from the first ready record. Later calls are
    /// ignored until [`reset`](Self::reset). Returns whether this call synced.
    pub fn sync(&mut self, device_ms: u32, host_now: SystemTime) -> bool {
        match self {
            TimeBridge::Synced(_) => false,
            TimeBridge::Unsynced => {
                info!(device_ms, "device time base established");
                *self = TimeBridge::Synced(TimeBase::new(host_now, device_ms));
                true
            }
        }
    }

    pub fn is_synced(&self) -> bool {
        matches!(self, TimeBridge::Synced(_))
    }

    pub fn base(&self) -> Option<TimeBase> {
        match self {
            TimeBridge::Synced(base) => Some(*base),
            TimeBridge::Unsynced => None,
        }
    }

    pub fn to_host(&self, device_ms: u32) -> Option<SystemTime> {
        self.base().map(|base| base.to_host(device_ms))
    }

    pub fn reset(&mut self) {
        *self = TimeBridge::Unsynced;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn epoch() -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000)
    }

    #[test]
    fn device_offsets_map_onto_host_epoch() {
        let base = TimeBase::new(epoch(), 1000);
        assert_eq!(base.to_host(1000), epoch());
        assert_eq!(base.to_host(1500), epoch() + Duration::from_millis(500));
        assert_eq!(base.to_host(400), epoch() - Duration::from_millis(600));
    }

    #[test]
    fn first_sync_wins() {
        let mut bridge = TimeBridge::default();
        assert_eq!(bridge.to_host(5), None);

        assert!(bridge.sync(1000, epoch()));
        assert!(!bridge.sync(9000, epoch() + Duration::from_secs(60)));
        assert_eq!(bridge.base(), Some(TimeBase::new(epoch(), 1000)));
    }

    #[test]
    fn reset_returns_to_unsynced() {
        let mut bridge = TimeBridge::default();
        bridge.sync(1, epoch());
        bridge.reset();
        assert!(!bridge.is_synced());
        assert!(bridge.sync(2, epoch()));
    }
}
