//! Metrics collection and reporting for the VLAN tenancy controller.
//!
//! Lock-free counters updated from the packet-in path, plus a latency
//! histogram for the decision procedure.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/* ---------------------------------------------------------------- *
 * Simple Counter
 * ---------------------------------------------------------------- */

#[derive(Debug)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    pub fn increment(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl Default for Counter {
    fn default() -> Self {
        Self::new()
    }
}

/* ---------------------------------------------------------------- *
 * Gauge
 * ---------------------------------------------------------------- */

#[derive(Debug)]
pub struct Gauge {
    value: AtomicU64,
}

impl Gauge {
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    pub fn increment(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement(&self) {
        // Saturate at zero rather than wrapping.
        let _ = self
            .value
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
    }

    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl Default for Gauge {
    fn default() -> Self {
        Self::new()
    }
}

/* ---------------------------------------------------------------- *
 * Histogram
 * ---------------------------------------------------------------- */

#[derive(Debug)]
pub struct Histogram {
    buckets: Vec<AtomicU64>,
    boundaries: Vec<u64>,
    overflow: AtomicU64,
    sum: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    /// `boundaries` are inclusive upper bounds in ascending order.
    pub fn new(boundaries: Vec<u64>) -> Self {
        let buckets = (0..boundaries.len())
            .map(|_| AtomicU64::new(0))
            .collect();

        Self {
            buckets,
            boundaries,
            overflow: AtomicU64::new(0),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    pub fn observe(&self, value: u64) {
        self.sum.fetch_add(value, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        match self.boundaries.iter().position(|&b| value <= b) {
            Some(idx) => {
                self.buckets[idx].fetch_add(1, Ordering::Relaxed);
            }
            None => {
                self.overflow.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn average(&self) -> f64 {
        let c = self.count.load(Ordering::Relaxed);
        if c == 0 {
            0.0
        } else {
            self.sum.load(Ordering::Relaxed) as f64 / c as f64
        }
    }

    pub fn counts(&self) -> Vec<(u64, u64)> {
        self.boundaries
            .iter()
            .zip(self.buckets.iter())
            .map(|(&b, bucket)| (b, bucket.load(Ordering::Relaxed)))
            .collect()
    }

    pub fn overflow(&self) -> u64 {
        self.overflow.load(Ordering::Relaxed)
    }
}

/* ---------------------------------------------------------------- *
 * Aggregate controller metrics
 * ---------------------------------------------------------------- */

#[derive(Debug)]
pub struct ControllerMetrics {
    pub packet_ins: Counter,
    pub truncated: Counter,
    pub control_frames: Counter,
    pub malformed: Counter,
    /// Untagged frames flooded without consulting the learning table.
    pub fallback_floods: Counter,
    pub tenant_drops: Counter,
    pub unicast_decisions: Counter,
    pub flood_decisions: Counter,
    pub rules_installed: Counter,
    pub packet_outs: Counter,
    pub active_sessions: Gauge,
    /// Decision latency in microseconds.
    pub decision_time_us: Histogram,
}

impl ControllerMetrics {
    pub fn new() -> Self {
        Self {
            packet_ins: Counter::new(),
            truncated: Counter::new(),
            control_frames: Counter::new(),
            malformed: Counter::new(),
            fallback_floods: Counter::new(),
            tenant_drops: Counter::new(),
            unicast_decisions: Counter::new(),
            flood_decisions: Counter::new(),
            rules_installed: Counter::new(),
            packet_outs: Counter::new(),
            active_sessions: Gauge::new(),
            decision_time_us: Histogram::new(vec![1, 10, 100, 1_000, 10_000]),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            packet_ins: self.packet_ins.value(),
            truncated: self.truncated.value(),
            control_frames: self.control_frames.value(),
            malformed: self.malformed.value(),
            fallback_floods: self.fallback_floods.value(),
            tenant_drops: self.tenant_drops.value(),
            unicast_decisions: self.unicast_decisions.value(),
            flood_decisions: self.flood_decisions.value(),
            rules_installed: self.rules_installed.value(),
            packet_outs: self.packet_outs.value(),
            active_sessions: self.active_sessions.value(),
            avg_decision_time_us: self.decision_time_us.average(),
            decision_time_us_buckets: self.decision_time_us.counts(),
            decision_time_us_overflow: self.decision_time_us.overflow(),
        }
    }
}

impl Default for ControllerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`ControllerMetrics`], for reporting.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub packet_ins: u64,
    pub truncated: u64,
    pub control_frames: u64,
    pub malformed: u64,
    pub fallback_floods: u64,
    pub tenant_drops: u64,
    pub unicast_decisions: u64,
    pub flood_decisions: u64,
    pub rules_installed: u64,
    pub packet_outs: u64,
    pub active_sessions: u64,
    pub avg_decision_time_us: f64,
    /// `(upper bound, count)` per latency bucket.
    pub decision_time_us_buckets: Vec<(u64, u64)>,
    pub decision_time_us_overflow: u64,
}
