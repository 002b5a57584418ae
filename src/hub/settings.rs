//! Per-connection limits and keepalive timing.

use std::time::Duration;

use super::registry::OverflowPolicy;

/// Limits applied to every connection the hub serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// How long the read pump waits for a pong before giving up.
    pub pong_wait: Duration,
    /// Largest inbound frame accepted, in bytes.
    pub max_frame_bytes: usize,
    /// Capacity of the outbound queue.
    pub outbound_capacity: usize,
    /// Fan-out behaviour when the outbound queue is full.
    pub overflow_policy: OverflowPolicy,
}

impl ConnectionSettings {
    /// Interval between keepalive pings: nine tenths of [`Self::pong_wait`].
    #[must_use]
    pub fn ping_interval(&self) -> Duration {
        (self.pong_wait * 9 / 10).max(Duration::from_millis(1))
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            pong_wait: Duration::from_secs(10),
            max_frame_bytes: 1024,
            outbound_capacity: 64,
            overflow_policy: OverflowPolicy::default(),
        }
    }
}
