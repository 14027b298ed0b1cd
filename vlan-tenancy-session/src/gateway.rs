//! A gateway backed by a bounded tokio channel.

use log::{trace, warn};
use tokio::sync::mpsc::{self, error::TrySendError};

use vlan_tenancy_common::command::{Command, FlowMod, PacketOut};
use vlan_tenancy_engine::Gateway;

/// Hands commands to an outbound queue without ever waiting.
///
/// A full or closed queue drops the command with a warning.
#[derive(Debug, Clone)]
pub struct ChannelGateway {
    sender: mpsc::Sender<Command>,
}

impl ChannelGateway {
    /// Create a gateway and the receiver the wire layer drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Command>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    fn enqueue(&self, command: Command) {
        let switch = command.switch_id();
        match self.sender.try_send(command) {
            Ok(()) => trace!("[switch {}] command queued", switch),
            Err(TrySendError::Full(command)) => {
                warn!("[switch {}] outbound queue full, dropping {:?}", switch, command)
            }
            Err(TrySendError::Closed(_)) => {
                warn!("[switch {}] outbound queue closed, dropping command", switch)
            }
        }
    }
}

impl Gateway for ChannelGateway {
    fn install_rule(&self, flow: FlowMod) {
        self.enqueue(Command::FlowMod(flow));
    }

    fn forward(&self, packet: PacketOut) {
        self.enqueue(Command::PacketOut(packet));
    }
}
