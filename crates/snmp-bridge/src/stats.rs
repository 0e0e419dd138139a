// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Gateway statistics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Counters shared by every gateway task.
#[derive(Debug)]
pub struct GatewayStats {
    /// Request datagrams received.
    pub requests_received: AtomicU64,

    /// Replies sent back to requesters.
    pub requests_forwarded: AtomicU64,

    /// Request datagrams dropped (decode, encode, forward failures).
    pub requests_dropped: AtomicU64,

    /// Upstream round-trips that hit the deadline.
    pub forward_timeouts: AtomicU64,

    /// Trap datagrams received.
    pub traps_received: AtomicU64,

    /// Traps relayed to the management station.
    pub traps_relayed: AtomicU64,

    /// Traps dropped (undecodable, not a trap, or nothing to translate).
    pub traps_dropped: AtomicU64,

    /// InformRequests answered with a Response.
    pub informs_acked: AtomicU64,

    /// Heartbeats sent.
    pub heartbeats_sent: AtomicU64,

    /// Vehicle events received over HTTP.
    pub vehicle_events: AtomicU64,

    /// Send or receive failures.
    pub errors: AtomicU64,

    /// Gateway start time.
    pub started: Instant,
}

impl Default for GatewayStats {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayStats {
    pub fn new() -> Self {
        Self {
            requests_received: AtomicU64::new(0),
            requests_forwarded: AtomicU64::new(0),
            requests_dropped: AtomicU64::new(0),
            forward_timeouts: AtomicU64::new(0),
            traps_received: AtomicU64::new(0),
            traps_relayed: AtomicU64::new(0),
            traps_dropped: AtomicU64::new(0),
            informs_acked: AtomicU64::new(0),
            heartbeats_sent: AtomicU64::new(0),
            vehicle_events: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    /// Increment a counter.
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Gateway uptime in hundredths of a second, as carried by `sysUpTime.0`.
    pub fn uptime_ticks(&self) -> u32 {
        // TimeTicks wraps after ~497 days.
        (self.started.elapsed().as_millis() / 10) as u32
    }

    /// Get snapshot of current stats.
    pub fn snapshot(&self) -> GatewayStatsSnapshot {
        GatewayStatsSnapshot {
            requests_received: self.requests_received.load(Ordering::Relaxed),
            requests_forwarded: self.requests_forwarded.load(Ordering::Relaxed),
            requests_dropped: self.requests_dropped.load(Ordering::Relaxed),
            forward_timeouts: self.forward_timeouts.load(Ordering::Relaxed),
            traps_received: self.traps_received.load(Ordering::Relaxed),
            traps_relayed: self.traps_relayed.load(Ordering::Relaxed),
            traps_dropped: self.traps_dropped.load(Ordering::Relaxed),
            informs_acked: self.informs_acked.load(Ordering::Relaxed),
            heartbeats_sent: self.heartbeats_sent.load(Ordering::Relaxed),
            vehicle_events: self.vehicle_events.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            uptime_secs: self.started.elapsed().as_secs(),
        }
    }
}

/// Snapshot of gateway statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatewayStatsSnapshot {
    pub requests_received: u64,
    pub requests_forwarded: u64,
    pub requests_dropped: u64,
    pub forward_timeouts: u64,
    pub traps_received: u64,
    pub traps_relayed: u64,
    pub traps_dropped: u64,
    pub informs_acked: u64,
    pub heartbeats_sent: u64,
    pub vehicle_events: u64,
    pub errors: u64,
    pub uptime_secs: u64,
}

impl GatewayStatsSnapshot {
    /// Proxied requests per second.
    pub fn requests_per_second(&self) -> f64 {
        if self.uptime_secs > 0 {
            self.requests_forwarded as f64 / self.uptime_secs as f64
        } else {
            0.0
        }
    }
}
