//! Packet-in decision procedure.
//!
//! Every frame a switch cannot forward by itself ends up here and leaves as
//! one of three terminal outcomes: discarded, rule installed, or forwarded
//! once. The order of the checks is significant:
//!
//! 1. discovery frames are dropped silently;
//! 2. untagged frames the tenancy rules cannot place are flooded without
//!    learning (plain access switch, trunk ingress, or unknown destination);
//! 3. the source is learned;
//! 4. the destination is resolved to a learned port or left unresolved;
//! 5. frames crossing tenants get an empty action list;
//! 6. the tagging regime of the ingress port picks match and actions;
//! 7. unicast decisions are installed as rules, unresolved ones are only
//!    forwarded once.

use std::fmt;
use std::sync::Arc;

use vlan_tenancy_common::{
    command::{Action, Command, FlowMod, Match, OutPort, PacketIn, PacketOut, FORWARDING_PRIORITY},
    frame::{self, Classified, FrameDescriptor},
    types::{PortNo, SwitchId, VlanId, VlanMatch},
    Error,
};

use crate::directory::VlanDirectory;
use crate::learning::MacLearningTable;

/// How the ingress port relates to VLAN trunking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Regime {
    /// The switch has no trunk ports; frames pass through as they are.
    AccessSwitch,
    /// The frame entered on a trunk port and leaves untagged.
    TrunkIngress,
    /// The frame entered on an access port of a trunk-capable switch and
    /// leaves tagged with the source's tenant VLAN.
    TrunkAccess,
}

/// Where the frame should go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// The destination was learned on this port.
    Unicast(PortNo),
    /// The destination is unknown on this switch.
    Unresolved,
}

impl Target {
    pub fn out_port(self) -> OutPort {
        match self {
            Target::Unicast(port) => OutPort::Physical(port),
            Target::Unresolved => OutPort::Flood,
        }
    }
}

/// The branch of the decision procedure that produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Branch {
    Control,
    /// The frame was too short to classify.
    Malformed { captured: usize, required: usize },
    /// Untagged frame on a switch without trunks.
    FloodAccessSwitch,
    /// Untagged frame arriving on a trunk port; sent back toward the trunk.
    FloodTrunkIngress,
    /// Untagged frame for a host with no tenant VLAN.
    FloodUnknownDestination,
    TenantMismatch,
    Unicast(Regime),
    Flood(Regime),
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Branch::Control => write!(f, "control"),
            Branch::Malformed { captured, required } => {
                write!(f, "malformed ({captured} of {required} bytes)")
            }
            Branch::FloodAccessSwitch => write!(f, "flood (access switch)"),
            Branch::FloodTrunkIngress => write!(f, "flood (trunk ingress)"),
            Branch::FloodUnknownDestination => write!(f, "flood (unknown destination)"),
            Branch::TenantMismatch => write!(f, "tenant mismatch"),
            Branch::Unicast(regime) => write!(f, "unicast ({regime:?})"),
            Branch::Flood(regime) => write!(f, "flood ({regime:?})"),
        }
    }
}

/// Terminal state reached for a packet-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    Discarded,
    RuleInstalled,
    OneShotForwarded,
}

/// Outcome of the decision procedure for one packet-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub branch: Branch,
    /// The classified frame; absent for discarded frames.
    pub frame: Option<FrameDescriptor>,
    /// Commands for the ingress switch, in emission order.
    pub commands: Vec<Command>,
}

impl Verdict {
    fn discarded(branch: Branch) -> Self {
        Self {
            branch,
            frame: None,
            commands: Vec::new(),
        }
    }

    pub fn terminal(&self) -> Terminal {
        if self.commands.is_empty() {
            Terminal::Discarded
        } else if self.flow_mod().is_some() {
            Terminal::RuleInstalled
        } else {
            Terminal::OneShotForwarded
        }
    }

    pub fn flow_mod(&self) -> Option<&FlowMod> {
        self.commands.iter().find_map(|c| match c {
            Command::FlowMod(m) => Some(m),
            _ => None,
        })
    }

    pub fn packet_out(&self) -> Option<&PacketOut> {
        self.commands.iter().find_map(|c| match c {
            Command::PacketOut(p) => Some(p),
            _ => None,
        })
    }

    /// Actions applied to the frame itself, whichever command carries them.
    pub fn actions(&self) -> &[Action] {
        self.commands.first().map(Command::actions).unwrap_or(&[])
    }
}

/// Match and leading actions for one tagging regime. The output action is
/// appended separately since only it depends on the target.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TagTransform {
    rule_match: Match,
    actions: Vec<Action>,
}

impl TagTransform {
    fn select(regime: Regime, frame: &FrameDescriptor, src_vlan: VlanId, dst_vlan: VlanId) -> Self {
        match regime {
            Regime::TrunkIngress => Self {
                rule_match: Match {
                    vlan_vid: Some(VlanMatch::tagged(dst_vlan)),
                    eth_dst: Some(frame.dst),
                    ..Match::default()
                },
                actions: vec![Action::PopVlan],
            },
            Regime::TrunkAccess => Self {
                rule_match: Match {
                    in_port: Some(frame.in_port),
                    eth_dst: Some(frame.dst),
                    ..Match::default()
                },
                actions: vec![
                    Action::push_vlan(),
                    Action::SetVlanVid(VlanMatch::tagged(src_vlan)),
                ],
            },
            Regime::AccessSwitch => Self {
                rule_match: Match {
                    eth_dst: Some(frame.dst),
                    vlan_vid: Some(VlanMatch::tagged(dst_vlan)),
                    ..Match::default()
                },
                actions: Vec::new(),
            },
        }
    }

    fn with_output(mut self, target: Target) -> (Match, Vec<Action>) {
        self.actions.push(Action::Output(target.out_port()));
        (self.rule_match, self.actions)
    }
}

/// The packet-in decision engine.
///
/// Shares the directory read-only and the learning table with every other
/// engine handle, so it can be cloned into per-switch workers.
#[derive(Debug, Clone)]
pub struct Engine {
    directory: Arc<VlanDirectory>,
    table: Arc<MacLearningTable>,
}

impl Engine {
    pub fn new(directory: Arc<VlanDirectory>, table: Arc<MacLearningTable>) -> Self {
        Self { directory, table }
    }

    pub fn table(&self) -> &MacLearningTable {
        &self.table
    }

    /// Rule to install when a switch connects.
    pub fn table_miss(&self, switch: SwitchId) -> FlowMod {
        FlowMod::table_miss(switch)
    }

    /// Run the decision procedure for one packet-in.
    pub fn handle_packet_in(&self, event: &PacketIn) -> Verdict {
        match frame::classify(event) {
            Ok(Classified::Frame(frame)) => self.decide(event, frame),
            Ok(Classified::Control) => Verdict::discarded(Branch::Control),
            Err(Error::MalformedFrame { captured, required }) => {
                Verdict::discarded(Branch::Malformed { captured, required })
            }
            Err(_) => Verdict::discarded(Branch::Malformed {
                captured: event.captured_len(),
                required: frame::ETH_HDR_LEN,
            }),
        }
    }

    fn decide(&self, event: &PacketIn, frame: FrameDescriptor) -> Verdict {
        let switch = frame.switch_id;
        let trunk_capable = self.directory.is_trunk_capable(switch);
        let on_trunk = self.directory.is_trunk_port(switch, frame.in_port);

        if !frame.is_tagged() {
            let fallback = if !trunk_capable {
                Some((Branch::FloodAccessSwitch, OutPort::Flood))
            } else if on_trunk {
                Some((Branch::FloodTrunkIngress, OutPort::InPort))
            } else if self.directory.vlan_of(&frame.dst).is_none() {
                Some((Branch::FloodUnknownDestination, OutPort::Flood))
            } else {
                None
            };
            if let Some((branch, out)) = fallback {
                let out = PacketOut::for_event(event, vec![Action::Output(out)]);
                return Self::verdict(branch, frame, vec![Command::PacketOut(out)]);
            }
        }

        self.table.learn(switch, frame.src, frame.in_port);
        let target = match self.table.lookup(switch, &frame.dst) {
            Some(port) => Target::Unicast(port),
            None => Target::Unresolved,
        };

        let (src_vlan, dst_vlan) = match (
            self.directory.vlan_of(&frame.src),
            self.directory.vlan_of(&frame.dst),
        ) {
            (Some(src), Some(dst)) if src == dst => (src, dst),
            _ => {
                let out = PacketOut::for_event(event, Vec::new());
                return Self::verdict(Branch::TenantMismatch, frame, vec![Command::PacketOut(out)]);
            }
        };

        let regime = if !trunk_capable {
            Regime::AccessSwitch
        } else if on_trunk {
            Regime::TrunkIngress
        } else {
            Regime::TrunkAccess
        };
        let (rule_match, actions) =
            TagTransform::select(regime, &frame, src_vlan, dst_vlan).with_output(target);

        match target {
            Target::Unicast(_) => {
                let mut commands = vec![Command::FlowMod(FlowMod {
                    switch_id: switch,
                    priority: FORWARDING_PRIORITY,
                    r#match: rule_match,
                    actions: actions.clone(),
                    buffer_id: event.buffer_id,
                })];
                // A buffered frame is released by the rule itself.
                if event.buffer_id.is_none() {
                    commands.push(Command::PacketOut(PacketOut::for_event(event, actions)));
                }
                Self::verdict(Branch::Unicast(regime), frame, commands)
            }
            Target::Unresolved => {
                let out = PacketOut::for_event(event, actions);
                Self::verdict(Branch::Flood(regime), frame, vec![Command::PacketOut(out)])
            }
        }
    }

    fn verdict(branch: Branch, frame: FrameDescriptor, commands: Vec<Command>) -> Verdict {
        Verdict {
            branch,
            frame: Some(frame),
            commands,
        }
    }
}
