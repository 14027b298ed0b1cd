//! Switch session plumbing for the VLAN tenancy controller.
//!
//! Each connected switch gets its own session: a bounded queue of
//! packet-in events drained in order by a dedicated tokio task. Commands
//! produced by the controller leave through a [`ChannelGateway`], whose
//! receiving end is what a wire encoder would drain.

mod gateway;
mod hub;

pub use gateway::ChannelGateway;
pub use hub::SessionHub;
