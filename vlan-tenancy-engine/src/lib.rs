//! Packet-in decision engine for VLAN-based multi-tenant L2 switching.
//!
//! This crate holds the controller's decision core: the VLAN membership
//! directory, the per-switch MAC learning table, the decision procedure
//! that turns a packet-in into flow rules or one-shot forwards, and the
//! [`Controller`] that wires them to a [`Gateway`].

use log::info;
use std::sync::Arc;
use std::time::Instant;

use vlan_tenancy_common::{command::PacketIn, metrics::ControllerMetrics, types::SwitchId};

mod decision;
mod directory;
mod gateway;
mod learning;
mod observer;

pub use decision::{Branch, Engine, Regime, Target, Terminal, Verdict};
pub use directory::VlanDirectory;
pub use gateway::{Gateway, RecordingGateway};
pub use learning::MacLearningTable;
pub use observer::{ChainObserver, DecisionObserver, LogObserver, MetricsObserver};

/// Ties the decision engine to the control channel.
///
/// Every packet-in is decided synchronously; the resulting commands go to
/// the gateway in order, then observers see the final verdict.
pub struct Controller {
    engine: Engine,
    gateway: Arc<dyn Gateway>,
    observer: ChainObserver,
    metrics: Arc<ControllerMetrics>,
}

impl Controller {
    pub fn new(engine: Engine, gateway: Arc<dyn Gateway>) -> Self {
        let metrics = Arc::new(ControllerMetrics::new());
        let observer = ChainObserver::new()
            .with(Arc::new(LogObserver))
            .with(Arc::new(MetricsObserver::new(Arc::clone(&metrics))));

        Self {
            engine,
            gateway,
            observer,
            metrics,
        }
    }

    /// Add an observer after the built-in logging and metrics observers.
    pub fn with_observer(mut self, observer: Arc<dyn DecisionObserver>) -> Self {
        self.observer.push(observer);
        self
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn metrics(&self) -> &Arc<ControllerMetrics> {
        &self.metrics
    }

    /// Install the table-miss rule on a newly connected switch.
    pub fn switch_connected(&self, switch: SwitchId) {
        info!("switch {} connected, installing table-miss rule", switch);
        self.gateway.install_rule(self.engine.table_miss(switch));
        self.metrics.rules_installed.increment();
    }

    /// Decide what to do with a packet-in and send the result to the switch.
    pub fn packet_in(&self, event: &PacketIn) -> Verdict {
        let start = Instant::now();
        let verdict = self.engine.handle_packet_in(event);
        let elapsed = start.elapsed();

        for command in &verdict.commands {
            self.gateway.send(command.clone());
        }
        self.observer.on_verdict(event, &verdict, elapsed);
        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use vlan_tenancy_common::{
        command::{Command, TABLE_MISS_PRIORITY},
        frame,
        types::{Mac, PortNo, VlanId},
    };

    #[derive(Default)]
    struct CountingObserver(AtomicUsize);

    impl DecisionObserver for CountingObserver {
        fn on_verdict(&self, _: &PacketIn, _: &Verdict, _: Duration) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct BranchRecorder(Mutex<Vec<Branch>>);

    impl DecisionObserver for BranchRecorder {
        fn on_verdict(&self, _: &PacketIn, verdict: &Verdict, _: Duration) {
            self.0.lock().unwrap().push(verdict.branch);
        }
    }

    fn controller() -> (Controller, Arc<RecordingGateway>) {
        let directory = VlanDirectory::new(
            vec![
                (Mac([0, 0, 0, 0, 0, 1]), VlanId::new(10).unwrap()),
                (Mac([0, 0, 0, 0, 0, 2]), VlanId::new(10).unwrap()),
            ],
            vec![(SwitchId(1), vec![PortNo(1)])],
        )
        .unwrap();
        let engine = Engine::new(Arc::new(directory), Arc::new(MacLearningTable::new()));
        let gateway = Arc::new(RecordingGateway::new());
        (Controller::new(engine, gateway.clone()), gateway)
    }

    #[test]
    fn test_switch_connected_installs_table_miss() {
        let (controller, gateway) = controller();
        controller.switch_connected(SwitchId(7));

        let commands = gateway.take();
        assert_eq!(commands.len(), 1);
        match &commands[0] {
            Command::FlowMod(flow) => {
                assert_eq!(flow.switch_id, SwitchId(7));
                assert_eq!(flow.priority, TABLE_MISS_PRIORITY);
                assert!(flow.r#match.is_empty());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_packet_in_sends_commands_and_notifies() {
        let (controller, gateway) = controller();
        let counter = Arc::new(CountingObserver::default());
        let controller = controller.with_observer(counter.clone());

        let data = frame::build(
            Mac([0, 0, 0, 0, 0, 2]),
            Mac([0, 0, 0, 0, 0, 1]),
            None,
            0x0800,
            b"",
        );
        let verdict = controller.packet_in(&PacketIn::new(SwitchId(1), PortNo(4), data));

        assert_eq!(verdict.branch, Branch::Flood(Regime::TrunkAccess));
        assert_eq!(gateway.take(), verdict.commands);
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);

        let snap = controller.metrics().snapshot();
        assert_eq!(snap.packet_ins, 1);
        assert_eq!(snap.flood_decisions, 1);
        assert_eq!(snap.packet_outs, 1);
        assert_eq!(snap.rules_installed, 0);
    }

    #[test]
    fn test_control_frames_emit_nothing() {
        let (controller, gateway) = controller();
        let lldp = frame::build(Mac::BROADCAST, Mac([0, 0, 0, 0, 0, 1]), None, 0x88cc, b"");
        let verdict = controller.packet_in(&PacketIn::new(SwitchId(1), PortNo(2), lldp));

        assert_eq!(verdict.terminal(), Terminal::Discarded);
        assert!(gateway.is_empty());
        assert_eq!(controller.metrics().snapshot().control_frames, 1);
    }

    #[test]
    fn test_malformed_details_reach_observers() {
        let (controller, gateway) = controller();
        let recorder = Arc::new(BranchRecorder::default());
        let controller = controller.with_observer(recorder.clone());

        controller.packet_in(&PacketIn::new(SwitchId(1), PortNo(3), vec![0u8; 9]));

        assert!(gateway.is_empty());
        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec![Branch::Malformed {
                captured: 9,
                required: frame::ETH_HDR_LEN
            }]
        );
        assert_eq!(controller.metrics().snapshot().malformed, 1);
    }
}
