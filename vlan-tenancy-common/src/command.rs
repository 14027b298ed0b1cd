//! Controller messages exchanged with a switch.
//!
//! `PacketIn` is what a switch reports for a frame it could not forward on
//! its own; `FlowMod` and `PacketOut` are what the controller answers with.
//! Encoding these onto the wire is the job of the channel layer.

use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::types::{BufferId, Mac, PortNo, SwitchId, VlanMatch, ETH_TYPE_8021Q, OFPCML_NO_BUFFER};

/// Priority of the table-miss rule.
pub const TABLE_MISS_PRIORITY: u16 = 0;

/// Priority of rules installed for learned destinations.
pub const FORWARDING_PRIORITY: u16 = 1;

/// Where an output action sends the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutPort {
    /// A physical port on the switch.
    Physical(PortNo),
    /// All ports except the ingress port.
    Flood,
    /// Back through the ingress port.
    InPort,
    /// To the controller, with at most `max_len` bytes of the frame.
    Controller { max_len: u16 },
}

impl fmt::Display for OutPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutPort::Physical(port) => write!(f, "{port}"),
            OutPort::Flood => write!(f, "flood"),
            OutPort::InPort => write!(f, "in_port"),
            OutPort::Controller { max_len } => write!(f, "controller:{max_len:#x}"),
        }
    }
}

/// A single step in an ordered action list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Remove the outermost VLAN tag.
    PopVlan,
    /// Insert a new outermost VLAN tag.
    PushVlan { ethertype: u16 },
    /// Rewrite the VLAN id of the outermost tag.
    SetVlanVid(VlanMatch),
    /// Send the frame out.
    Output(OutPort),
}

impl Action {
    pub fn push_vlan() -> Self {
        Action::PushVlan {
            ethertype: ETH_TYPE_8021Q,
        }
    }
}

/// Match predicate of a flow rule. Absent fields are wildcards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_port: Option<PortNo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eth_dst: Option<Mac>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan_vid: Option<VlanMatch>,
}

impl Match {
    pub fn is_empty(&self) -> bool {
        *self == Match::default()
    }
}

/// Install a flow rule on a switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowMod {
    pub switch_id: SwitchId,
    pub priority: u16,
    #[serde(rename = "match")]
    pub r#match: Match,
    pub actions: Vec<Action>,
    /// Buffered frame to release through the new rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_id: Option<BufferId>,
}

impl FlowMod {
    /// The lowest-priority rule sending every unmatched frame to the
    /// controller in full.
    pub fn table_miss(switch_id: SwitchId) -> Self {
        Self {
            switch_id,
            priority: TABLE_MISS_PRIORITY,
            r#match: Match::default(),
            actions: vec![Action::Output(OutPort::Controller {
                max_len: OFPCML_NO_BUFFER,
            })],
            buffer_id: None,
        }
    }
}

/// Forward one frame, either held in a switch buffer or carried inline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketOut {
    pub switch_id: SwitchId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_id: Option<BufferId>,
    pub in_port: PortNo,
    pub actions: Vec<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Bytes>,
}

impl PacketOut {
    /// Builds a one-shot forward for the frame reported by `event`.
    ///
    /// The payload is attached only when the switch did not buffer the frame.
    pub fn for_event(event: &PacketIn, actions: Vec<Action>) -> Self {
        Self {
            switch_id: event.switch_id,
            buffer_id: event.buffer_id,
            in_port: event.in_port,
            actions,
            data: match event.buffer_id {
                Some(_) => None,
                None => Some(event.data.clone()),
            },
        }
    }
}

/// A command sent from the controller to a switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    FlowMod(FlowMod),
    PacketOut(PacketOut),
}

impl Command {
    pub fn switch_id(&self) -> SwitchId {
        match self {
            Command::FlowMod(m) => m.switch_id,
            Command::PacketOut(p) => p.switch_id,
        }
    }

    pub fn actions(&self) -> &[Action] {
        match self {
            Command::FlowMod(m) => &m.actions,
            Command::PacketOut(p) => &p.actions,
        }
    }
}

/// A frame reported by a switch because no rule matched it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketIn {
    pub switch_id: SwitchId,
    pub in_port: PortNo,
    /// Captures taken straight off the switch may carry the raw no-buffer
    /// sentinel instead of `null`.
    #[serde(default, deserialize_with = "buffer_from_wire")]
    pub buffer_id: Option<BufferId>,
    /// Length of the frame as seen by the switch. Defaults to the captured
    /// length when absent.
    #[serde(default)]
    pub total_len: Option<u16>,
    pub data: Bytes,
}

fn buffer_from_wire<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<BufferId>, D::Error> {
    Ok(Option::<u32>::deserialize(deserializer)?.and_then(BufferId::from_wire))
}

impl PacketIn {
    pub fn new(switch_id: SwitchId, in_port: PortNo, data: impl Into<Bytes>) -> Self {
        Self {
            switch_id,
            in_port,
            buffer_id: None,
            total_len: None,
            data: data.into(),
        }
    }

    pub fn with_buffer(mut self, buffer_id: BufferId) -> Self {
        self.buffer_id = Some(buffer_id);
        self
    }

    pub fn with_total_len(mut self, total_len: u16) -> Self {
        self.total_len = Some(total_len);
        self
    }

    pub fn captured_len(&self) -> usize {
        self.data.len()
    }

    pub fn declared_len(&self) -> usize {
        self.total_len.map_or(self.data.len(), usize::from)
    }
}
