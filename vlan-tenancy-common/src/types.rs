//! Value types shared between the classifier, the decision engine and the
//! session layer.
//!
//! The numeric identifiers mirror what a switch reports over the control
//! channel and must keep their wire meaning when serialised.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// First reserved port number; everything at or above it is a logical port.
pub const OFPP_MAX: u32 = 0xffff_ff00;

/// Ask the switch not to buffer frames sent to the controller.
pub const OFPCML_NO_BUFFER: u16 = 0xffff;

/// Wire sentinel for "frame not buffered on the switch".
pub const OFP_NO_BUFFER: u32 = 0xffff_ffff;

/// Tag-present bit carried alongside the 12-bit VLAN id.
pub const OFPVID_PRESENT: u16 = 0x1000;

/// 802.1Q tag protocol identifier.
pub const ETH_TYPE_8021Q: u16 = 0x8100;

/// Link Layer Discovery Protocol.
pub const ETH_TYPE_LLDP: u16 = 0x88cc;

/// Identity of a switch (datapath id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SwitchId(pub u64);

impl fmt::Display for SwitchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016}", self.0)
    }
}

impl FromStr for SwitchId {
    type Err = Error;

    /// Accepts decimal or `0x`-prefixed hexadecimal datapath ids.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u64::from_str_radix(hex, 16),
            None => s.parse::<u64>(),
        };
        parsed
            .map(SwitchId)
            .map_err(|_| Error::Config(format!("invalid switch id: {s}")))
    }
}

/// A switch port number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortNo(pub u32);

impl PortNo {
    /// Whether the number can name a physical port.
    pub fn is_physical(self) -> bool {
        self.0 != 0 && self.0 < OFPP_MAX
    }
}

impl fmt::Display for PortNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle of a frame held in a switch buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BufferId(pub u32);

impl BufferId {
    /// Converts the wire value, mapping the no-buffer sentinel to `None`.
    pub fn from_wire(raw: u32) -> Option<Self> {
        (raw != OFP_NO_BUFFER).then_some(BufferId(raw))
    }
}

/// An Ethernet MAC address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Mac(pub [u8; 6]);

impl Mac {
    /// The broadcast address.
    pub const BROADCAST: Mac = Mac([0xff; 6]);
}

impl From<[u8; 6]> for Mac {
    fn from(value: [u8; 6]) -> Self {
        Mac(value)
    }
}

impl FromStr for Mac {
    type Err = Error;

    /// Parses `aa:bb:cc:dd:ee:ff` or `aa-bb-cc-dd-ee-ff`, any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidMac(s.to_string());
        let sep = if s.contains('-') { '-' } else { ':' };

        let mut octets = [0u8; 6];
        let mut parts = s.split(sep);
        for octet in octets.iter_mut() {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 {
                return Err(invalid());
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Mac(octets))
    }
}

impl TryFrom<String> for Mac {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Mac> for String {
    fn from(mac: Mac) -> Self {
        mac.to_string()
    }
}

impl fmt::Display for Mac {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// A tenant VLAN id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct VlanId(u16);

impl VlanId {
    pub const MIN: u16 = 1;
    pub const MAX: u16 = 4094;

    /// Creates a tenant VLAN id, rejecting the reserved values 0 and 4095.
    pub fn new(vid: u16) -> Result<Self, Error> {
        if (Self::MIN..=Self::MAX).contains(&vid) {
            Ok(VlanId(vid))
        } else {
            Err(Error::InvalidVlan(vid))
        }
    }

    pub fn get(self) -> u16 {
        self.0
    }
}

impl TryFrom<u16> for VlanId {
    type Error = Error;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        VlanId::new(value)
    }
}

impl From<VlanId> for u16 {
    fn from(vid: VlanId) -> u16 {
        vid.0
    }
}

impl fmt::Display for VlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A VLAN id as carried in a match field or set-field action: the 12-bit
/// id combined with the tag-present bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VlanMatch(u16);

impl VlanMatch {
    /// A present tag carrying `vid`.
    pub fn tagged(vid: VlanId) -> Self {
        VlanMatch(OFPVID_PRESENT | vid.get())
    }

    /// A present tag carrying a raw 12-bit id, including 0.
    pub fn tagged_raw(vid: u16) -> Self {
        VlanMatch(OFPVID_PRESENT | (vid & 0x0fff))
    }

    pub fn wire(self) -> u16 {
        self.0
    }

    pub fn vid(self) -> u16 {
        self.0 & 0x0fff
    }

    pub fn is_present(self) -> bool {
        self.0 & OFPVID_PRESENT != 0
    }
}

impl From<VlanId> for VlanMatch {
    fn from(vid: VlanId) -> Self {
        VlanMatch::tagged(vid)
    }
}

impl fmt::Display for VlanMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_present() {
            write!(f, "{}(tagged)", self.vid())
        } else {
            write!(f, "untagged")
        }
    }
}
