//! Outbound side of the control channel.
//!
//! The engine never waits on a switch: sending is fire-and-forget, and a
//! gateway that cannot deliver a command reports it on its own.

use std::sync::{Mutex, PoisonError};

use vlan_tenancy_common::command::{Command, FlowMod, PacketOut};

pub trait Gateway: Send + Sync {
    /// Install a flow rule on the switch named in `flow`.
    fn install_rule(&self, flow: FlowMod);

    /// Forward one frame on the switch named in `packet`.
    fn forward(&self, packet: PacketOut);

    fn send(&self, command: Command) {
        match command {
            Command::FlowMod(flow) => self.install_rule(flow),
            Command::PacketOut(packet) => self.forward(packet),
        }
    }
}

/// A gateway that keeps every command in memory.
#[derive(Debug, Default)]
pub struct RecordingGateway {
    commands: Mutex<Vec<Command>>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything recorded so far.
    pub fn take(&self) -> Vec<Command> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Command>> {
        self.commands.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Gateway for RecordingGateway {
    fn install_rule(&self, flow: FlowMod) {
        self.lock().push(Command::FlowMod(flow));
    }

    fn forward(&self, packet: PacketOut) {
        self.lock().push(Command::PacketOut(packet));
    }
}
