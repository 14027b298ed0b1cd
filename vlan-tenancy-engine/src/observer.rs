//! Hooks invoked once a packet-in has reached its terminal state.

use log::{debug, info};
use std::sync::Arc;
use std::time::Duration;

use vlan_tenancy_common::{command::PacketIn, metrics::ControllerMetrics};

use crate::decision::{Branch, Terminal, Verdict};

pub trait DecisionObserver: Send + Sync {
    fn on_verdict(&self, event: &PacketIn, verdict: &Verdict, elapsed: Duration);
}

/// Logs every decision; rule installs at info level, the rest at debug.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl DecisionObserver for LogObserver {
    fn on_verdict(&self, event: &PacketIn, verdict: &Verdict, elapsed: Duration) {
        if let Branch::Malformed { captured, required } = verdict.branch {
            debug!(
                "switch {} in_port {}: discarding malformed frame, {} of {} header bytes",
                event.switch_id, event.in_port, captured, required
            );
            return;
        }

        let (src, dst) = match &verdict.frame {
            Some(frame) => (frame.src.to_string(), frame.dst.to_string()),
            None => ("-".to_string(), "-".to_string()),
        };

        match verdict.terminal() {
            Terminal::RuleInstalled => info!(
                "switch {} in_port {}: {} -> {} via {}, actions {:?}",
                event.switch_id,
                event.in_port,
                src,
                dst,
                verdict.branch,
                verdict.actions()
            ),
            _ => debug!(
                "switch {} in_port {}: {} -> {} via {}, actions {:?} ({}us)",
                event.switch_id,
                event.in_port,
                src,
                dst,
                verdict.branch,
                verdict.actions(),
                elapsed.as_micros()
            ),
        }
    }
}

/// Feeds [`ControllerMetrics`].
#[derive(Debug, Clone)]
pub struct MetricsObserver {
    metrics: Arc<ControllerMetrics>,
}

impl MetricsObserver {
    pub fn new(metrics: Arc<ControllerMetrics>) -> Self {
        Self { metrics }
    }
}

impl DecisionObserver for MetricsObserver {
    fn on_verdict(&self, event: &PacketIn, verdict: &Verdict, elapsed: Duration) {
        let m = &self.metrics;
        m.packet_ins.increment();
        m.decision_time_us.observe(elapsed.as_micros() as u64);
        if event.captured_len() < event.declared_len() {
            m.truncated.increment();
        }

        match verdict.branch {
            Branch::Control => m.control_frames.increment(),
            Branch::Malformed { .. } => m.malformed.increment(),
            Branch::FloodAccessSwitch
            | Branch::FloodTrunkIngress
            | Branch::FloodUnknownDestination => m.fallback_floods.increment(),
            Branch::TenantMismatch => m.tenant_drops.increment(),
            Branch::Unicast(_) => m.unicast_decisions.increment(),
            Branch::Flood(_) => m.flood_decisions.increment(),
        }

        if verdict.flow_mod().is_some() {
            m.rules_installed.increment();
        }
        if verdict.packet_out().is_some() {
            m.packet_outs.increment();
        }
    }
}

/// Fans a verdict out to several observers, in order.
#[derive(Default, Clone)]
pub struct ChainObserver {
    observers: Vec<Arc<dyn DecisionObserver>>,
}

impl ChainObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, observer: Arc<dyn DecisionObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn push(&mut self, observer: Arc<dyn DecisionObserver>) {
        self.observers.push(observer);
    }
}

impl DecisionObserver for ChainObserver {
    fn on_verdict(&self, event: &PacketIn, verdict: &Verdict, elapsed: Duration) {
        for observer in &self.observers {
            observer.on_verdict(event, verdict, elapsed);
        }
    }
}
