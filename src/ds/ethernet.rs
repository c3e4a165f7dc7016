use byteorder::{BigEndian, ReadBytesExt};
use std::convert::TryFrom;
use std::io::Cursor;
use std::net::Ipv4Addr;

use super::super::err::*;
use super::hw_addr::MacAddr;

pub const ETH_TYPE_IPV4: u16 = 0x0800;
pub const ETH_TYPE_ARP: u16 = 0x0806;
pub const ETH_TYPE_VLAN: u16 = 0x8100;
pub const ETH_TYPE_IPV6: u16 = 0x86dd;
pub const ETH_TYPE_LLDP: u16 = 0x88cc;

/// dst + src + ethertype
pub const ETHERNET_HEADER_LEN: usize = 14;
const VLAN_TAG_LEN: usize = 4;
const IPV4_MIN_HEADER_LEN: usize = 20;

/// Layer 3 summary of an IPv4 packet.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Ipv4Summary {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub protocol: u8,
}

/// The parts of an Ethernet frame a learning switch looks at.
#[derive(Debug, PartialEq, Clone)]
pub struct EthernetFrame {
    pub dst: MacAddr,
    pub src: MacAddr,
    /// ethertype of the payload, after any 802.1Q tag
    pub ethertype: u16,
    pub vlan: Option<u16>,
    pub ipv4: Option<Ipv4Summary>,
}

impl EthernetFrame {
    pub fn is_lldp(&self) -> bool {
        self.ethertype == ETH_TYPE_LLDP
    }
}

impl<'a> TryFrom<&'a [u8]> for EthernetFrame {
    type Error = Error;
    fn try_from(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() < ETHERNET_HEADER_LEN {
            bail!(ErrorKind::MalformedPacket(format!(
                "frame of {} bytes is shorter than an Ethernet header",
                bytes.len()
            )));
        }
        let dst = MacAddr::from_slice(&bytes[0..6])?;
        let src = MacAddr::from_slice(&bytes[6..12])?;

        let mut cursor = Cursor::new(&bytes[12..]);
        let mut ethertype = cursor.read_u16::<BigEndian>()?;
        let mut payload_start = ETHERNET_HEADER_LEN;
        let mut vlan = None;
        if ethertype == ETH_TYPE_VLAN {
            if bytes.len() < ETHERNET_HEADER_LEN + VLAN_TAG_LEN {
                bail!(ErrorKind::MalformedPacket(
                    "truncated 802.1Q tag".to_string()
                ));
            }
            vlan = Some(cursor.read_u16::<BigEndian>()? & 0x0fff);
            ethertype = cursor.read_u16::<BigEndian>()?;
            payload_start += VLAN_TAG_LEN;
        }

        let ipv4 = if ethertype == ETH_TYPE_IPV4 {
            parse_ipv4(&bytes[payload_start..])
        } else {
            None
        };

        Ok(EthernetFrame {
            dst,
            src,
            ethertype,
            vlan,
            ipv4,
        })
    }
}

/// Higher layers are optional: a short or odd IPv4 header yields `None`
/// rather than failing the whole frame.
fn parse_ipv4(bytes: &[u8]) -> Option<Ipv4Summary> {
    if bytes.len() < IPV4_MIN_HEADER_LEN || bytes[0] >> 4 != 4 {
        return None;
    }
    Some(Ipv4Summary {
        src: Ipv4Addr::new(bytes[12], bytes[13], bytes[14], bytes[15]),
        dst: Ipv4Addr::new(bytes[16], bytes[17], bytes[18], bytes[19]),
        protocol: bytes[9],
    })
}

#[cfg(test)]
pub(crate) fn test_frame(dst: MacAddr, src: MacAddr, ethertype: u16) -> Vec<u8> {
    let mut frame = Vec::with_capacity(60);
    frame.extend_from_slice(&dst.octets());
    frame.extend_from_slice(&src.octets());
    frame.extend_from_slice(&ethertype.to_be_bytes());
    frame.resize(60, 0);
    frame
}
