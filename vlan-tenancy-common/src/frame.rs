//! Ethernet frame classification.
//!
//! Turns the payload of a packet-in into a [`FrameDescriptor`], or reports
//! that the frame belongs to a discovery protocol and must be ignored.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use log::debug;

use crate::command::PacketIn;
use crate::error::Error;
use crate::types::{
    BufferId, Mac, PortNo, SwitchId, VlanMatch, ETH_TYPE_8021Q, ETH_TYPE_LLDP,
};

/// Length of an untagged Ethernet header.
pub const ETH_HDR_LEN: usize = 14;

/// Length of an 802.1Q tag.
pub const VLAN_TAG_LEN: usize = 4;

/// Structured view of a frame reported by a switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameDescriptor {
    pub switch_id: SwitchId,
    pub in_port: PortNo,
    pub src: Mac,
    pub dst: Mac,
    /// Outermost VLAN tag, if the frame carries one.
    pub vlan: Option<VlanMatch>,
    /// Ethertype after any VLAN tag.
    pub ethertype: u16,
    /// The switch captured fewer bytes than the frame holds.
    pub truncated: bool,
    pub buffer_id: Option<BufferId>,
    /// Raw frame, present only when the switch did not buffer it.
    pub payload: Option<Bytes>,
}

impl FrameDescriptor {
    pub fn is_tagged(&self) -> bool {
        self.vlan.is_some()
    }
}

/// Result of classifying a packet-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
    /// A data frame for the decision engine.
    Frame(FrameDescriptor),
    /// A control/discovery frame to be silently discarded.
    Control,
}

/// Classify the frame carried by `event`.
///
/// Truncated captures are accepted as long as the Ethernet header (and the
/// VLAN tag, when announced) is complete.
pub fn classify(event: &PacketIn) -> Result<Classified, Error> {
    let captured = event.captured_len();
    let declared = event.declared_len();
    let truncated = captured < declared;
    if truncated {
        debug!("packet truncated: only {} of {} bytes", captured, declared);
    }

    let mut buf = &event.data[..];
    if buf.remaining() < ETH_HDR_LEN {
        return Err(Error::MalformedFrame {
            captured,
            required: ETH_HDR_LEN,
        });
    }

    let dst = read_mac(&mut buf);
    let src = read_mac(&mut buf);
    let outer = buf.get_u16();

    let (vlan, ethertype) = if outer == ETH_TYPE_8021Q {
        if buf.remaining() < VLAN_TAG_LEN {
            return Err(Error::MalformedFrame {
                captured,
                required: ETH_HDR_LEN + VLAN_TAG_LEN,
            });
        }
        let tci = buf.get_u16();
        (Some(VlanMatch::tagged_raw(tci & 0x0fff)), buf.get_u16())
    } else {
        (None, outer)
    };

    if outer == ETH_TYPE_LLDP || ethertype == ETH_TYPE_LLDP {
        return Ok(Classified::Control);
    }

    Ok(Classified::Frame(FrameDescriptor {
        switch_id: event.switch_id,
        in_port: event.in_port,
        src,
        dst,
        vlan,
        ethertype,
        truncated,
        buffer_id: event.buffer_id,
        payload: match event.buffer_id {
            Some(_) => None,
            None => Some(event.data.clone()),
        },
    }))
}

fn read_mac(buf: &mut impl Buf) -> Mac {
    let mut octets = [0u8; 6];
    buf.copy_to_slice(&mut octets);
    Mac(octets)
}

/* ---------------------------------------------------------------- *
 * Frame construction
 * ---------------------------------------------------------------- */

/// Build an Ethernet frame, optionally carrying an 802.1Q tag.
pub fn build(dst: Mac, src: Mac, vlan: Option<VlanMatch>, ethertype: u16, body: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(ETH_HDR_LEN + VLAN_TAG_LEN + body.len());
    buf.put_slice(&dst.0);
    buf.put_slice(&src.0);
    if let Some(tag) = vlan {
        buf.put_u16(ETH_TYPE_8021Q);
        buf.put_u16(tag.vid());
    }
    buf.put_u16(ethertype);
    buf.put_slice(body);
    buf.freeze()
}

/// Insert an outermost 802.1Q tag, as a push-tag plus set-VLAN action pair
/// would on the switch. Returns `None` when the frame has no full header.
pub fn push_vlan(frame: &[u8], tag: VlanMatch) -> Option<Bytes> {
    if frame.len() < ETH_HDR_LEN {
        return None;
    }
    let mut buf = BytesMut::with_capacity(frame.len() + VLAN_TAG_LEN);
    buf.put_slice(&frame[..12]);
    buf.put_u16(ETH_TYPE_8021Q);
    buf.put_u16(tag.vid());
    buf.put_slice(&frame[12..]);
    Some(buf.freeze())
}

/// Remove the outermost 802.1Q tag. Returns `None` when the frame is not
/// tagged.
pub fn pop_vlan(frame: &[u8]) -> Option<Bytes> {
    if frame.len() < ETH_HDR_LEN + VLAN_TAG_LEN {
        return None;
    }
    if u16::from_be_bytes([frame[12], frame[13]]) != ETH_TYPE_8021Q {
        return None;
    }
    let mut buf = BytesMut::with_capacity(frame.len() - VLAN_TAG_LEN);
    buf.put_slice(&frame[..12]);
    buf.put_slice(&frame[12 + VLAN_TAG_LEN..]);
    Some(buf.freeze())
}
