//! Keep-alive tracker for UDP subscribers.
//!
//! Subscribers are keyed by the UDP address feed datagrams are sent to. The
//! client sends its `PING`s from that same socket, so the source address of a
//! ping identifies the stream it keeps alive. Pings from addresses that never
//! subscribed are ignored.
//!
//! Time is measured with `Instant`; the `*_at` variants take the current time
//! explicitly so expiry can be tested without sleeping.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Default keep-alive timeout.
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(5);

/// Last ping time per tracked data address.
pub struct PingMonitor {
    last_seen: HashMap<SocketAddr, Instant>,
    timeout: Duration,
}

impl PingMonitor {
    /// Empty monitor expiring addresses silent for longer than `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            last_seen: HashMap::new(),
            timeout,
        }
    }

    /// Start tracking `addr` (or refresh it) as of `now`.
    pub fn track_at(&mut self, addr: SocketAddr, now: Instant) {
        self.last_seen.insert(addr, now);
    }

    /// Start tracking `addr` as of now.
    pub fn track(&mut self, addr: SocketAddr) {
        self.track_at(addr, Instant::now());
    }

    /// Record a ping from `addr`. Returns `false` for untracked addresses.
    pub fn update_ping_at(&mut self, addr: SocketAddr, now: Instant) -> bool {
        match self.last_seen.get_mut(&addr) {
            Some(last) => {
                *last = now;
                true
            }
            None => false,
        }
    }

    /// Record a ping from `addr` as of now.
    pub fn update_ping(&mut self, addr: SocketAddr) -> bool {
        self.update_ping_at(addr, Instant::now())
    }

    /// Stop tracking `addr`.
    pub fn forget(&mut self, addr: &SocketAddr) -> bool {
        self.last_seen.remove(addr).is_some()
    }

    /// Remove and return every address silent for longer than the timeout.
    pub fn check_timeouts_at(&mut self, now: Instant) -> Vec<SocketAddr> {
        let timeout = self.timeout;
        let mut timed_out = Vec::new();
        self.last_seen.retain(|addr, last| {
            if now.saturating_duration_since(*last) > timeout {
                timed_out.push(*addr);
                false
            } else {
                true
            }
        });
        timed_out
    }

    /// Expire addresses that went silent, as of now.
    pub fn check_timeouts(&mut self) -> Vec<SocketAddr> {
        self.check_timeouts_at(Instant::now())
    }

    /// Whether `addr` is tracked.
    pub fn is_tracked(&self, addr: &SocketAddr) -> bool {
        self.last_seen.contains_key(addr)
    }

    /// Number of tracked addresses.
    pub fn len(&self) -> usize {
        self.last_seen.len()
    }

    /// Whether nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.last_seen.is_empty()
    }
}

impl Default for PingMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_PING_TIMEOUT)
    }
}
