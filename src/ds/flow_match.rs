use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use num_traits::FromPrimitive;
use std::convert::TryFrom;
use std::io::Cursor;

use super::super::err::*;
use super::hw_addr::{MacAddr, ETHERNET_ADDRESS_LENGTH};
use super::{sub_slice, write_pad, Encode};

/// Length of the fixed `ofp_match` header (type + length).
pub const MATCH_HEADER_LENGTH: usize = 4;
const OXM_HEADER_LENGTH: usize = 4;

/// Fields to match against flows
#[derive(Debug, PartialEq, Clone, Default)]
pub struct Match {
    fields: Vec<OxmField>,
    /* On the wire: type (OXM), length excluding trailing padding, the OXM
     * TLVs, then zero padding so the whole ofp_match is a multiple of 8.
     */
}

impl Match {
    /// Matches every packet.
    pub fn all() -> Self {
        Match { fields: Vec::new() }
    }

    pub fn with_fields(fields: Vec<OxmField>) -> Self {
        Match { fields }
    }

    pub fn fields(&self) -> &[OxmField] {
        &self.fields
    }

    pub fn push(&mut self, field: OxmField) {
        self.fields.push(field);
    }

    pub fn in_port(&self) -> Option<u32> {
        self.fields.iter().find_map(|f| match f {
            OxmField::InPort(port) => Some(*port),
            _ => None,
        })
    }

    pub fn eth_dst(&self) -> Option<MacAddr> {
        self.fields.iter().find_map(|f| match f {
            OxmField::EthDst(addr, None) => Some(*addr),
            _ => None,
        })
    }

    pub fn eth_src(&self) -> Option<MacAddr> {
        self.fields.iter().find_map(|f| match f {
            OxmField::EthSrc(addr, None) => Some(*addr),
            _ => None,
        })
    }

    /// length field as written on the wire (header + TLVs, no padding)
    pub fn wire_len(&self) -> usize {
        MATCH_HEADER_LENGTH + self.fields.iter().map(OxmField::wire_len).sum::<usize>()
    }

    /// Reads the length of the match starting at `bytes` including the
    /// trailing padding.
    pub fn padded_len(bytes: &[u8]) -> Result<usize> {
        let header = sub_slice(bytes, 0, MATCH_HEADER_LENGTH, stringify!(Match))?;
        let len = Cursor::new(&header[2..]).read_u16::<BigEndian>()? as usize;
        if len < MATCH_HEADER_LENGTH {
            bail!(ErrorKind::IllegalValue(len as u64, stringify!(Match)));
        }
        Ok(padded(len))
    }
}

fn padded(len: usize) -> usize {
    (len + 7) / 8 * 8
}

impl<'a> TryFrom<&'a [u8]> for Match {
    type Error = Error;
    fn try_from(bytes: &'a [u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let ttype_raw = cursor.read_u16::<BigEndian>()?;
        let ttype = MatchType::from_u16(ttype_raw).ok_or_else(|| {
            Error::from(ErrorKind::UnknownValue(ttype_raw as u64, stringify!(MatchType)))
        })?;
        if ttype != MatchType::OXM {
            bail!(ErrorKind::UnsupportedValue(ttype_raw as u64, stringify!(MatchType)));
        }
        let length = cursor.read_u16::<BigEndian>()? as usize;
        if length < MATCH_HEADER_LENGTH {
            bail!(ErrorKind::IllegalValue(length as u64, stringify!(Match)));
        }

        let mut fields = Vec::new();
        let mut pos = MATCH_HEADER_LENGTH;
        while pos < length {
            let header_slice = sub_slice(bytes, pos, OXM_HEADER_LENGTH, stringify!(OxmTlvHeader))?;
            let tlv_header = OxmTlvHeader(Cursor::new(header_slice).read_u32::<BigEndian>()?);
            let value_len = tlv_header.get_length() as usize;
            let value = sub_slice(bytes, pos + OXM_HEADER_LENGTH, value_len, stringify!(OxmField))?;
            fields.push(OxmField::decode(tlv_header, value)?);
            pos += OXM_HEADER_LENGTH + value_len;
        }
        if pos != length {
            bail!(ErrorKind::InvalidSliceLength(length, pos, stringify!(Match)));
        }

        Ok(Match { fields })
    }
}

impl Encode for Match {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
        let length = self.wire_len();
        buf.write_u16::<BigEndian>(MatchType::OXM as u16)?;
        buf.write_u16::<BigEndian>(length as u16)?;
        for field in &self.fields {
            field.encode(buf)?;
        }
        write_pad(buf, padded(length) - length);
        Ok(())
    }
}

/// The match type indicates the match structure (set of fields that compose the
/// match) in use. The match type is placed in the type field at the beginning
/// of all match structures. The "OpenFlow Extensible Match" type corresponds
/// to OXM TLV format described below and must be supported by all OpenFlow
/// switches.
#[derive(Primitive, PartialEq, Debug, Clone, Copy)]
enum MatchType {
    /// Deprecated.
    Standard = 0,
    /// OpenFlow Extensible Match
    OXM = 1,
}

bitfield! {
    pub struct OxmTlvHeader(u32);
    impl Debug;

    u32;
    pub get_length, set_length: 7, 0;
    pub get_hasmask, set_hasmask: 8, 8;
    pub get_oxm_field, set_oxm_field: 15, 9;
    pub get_oxm_class, set_oxm_class: 31, 16;
}

impl OxmTlvHeader {
    fn basic(field: OfbMatchFields, hasmask: bool, length: usize) -> Self {
        let mut header = OxmTlvHeader(0);
        header.set_oxm_class(OxmClass::OpenFlowBasic as u32);
        header.set_oxm_field(field as u32);
        header.set_hasmask(hasmask as u32);
        header.set_length(length as u32);
        header
    }
}

impl Clone for OxmTlvHeader {
    fn clone(&self) -> Self {
        *self
    }
}

impl Copy for OxmTlvHeader {}

impl PartialEq for OxmTlvHeader {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

/// OXM Class IDs.
/// The high order bit differentiate reserved classes from member classes.
/// Classes 0x0000 to 0x7FFF are member classes, allocated by ONF.
/// Classes 0x8000 to 0xFFFE are reserved classes, reserved for standardisation.
#[derive(Primitive, PartialEq, Debug, Clone, Copy)]
enum OxmClass {
    /// Backward compatibility with NXM
    Nxm0 = 0x0000,
    /// Backward compatibility with NXM
    Nxm1 = 0x0001,
    /// Basic class for OpenFlow
    OpenFlowBasic = 0x8000,
    /// Experimenter class
    Experimenter = 0xFFFF,
}

/// OXM flow match field types for OpenFlow basic class.
#[derive(Primitive, PartialEq, Debug, Clone, Copy)]
pub enum OfbMatchFields {
    /// Switch input port.
    InPort = 0,
    /// Switch physical input port.
    InPhyPort = 1,
    /// Metadata passed between tables.
    Metadata = 2,
    /// Ethernet destination address.
    EthDst = 3,
    /// Ethernet source address.
    EthSrc = 4,
    /// Ethernet frame type.
    EthType = 5,
    /// VLAN id.
    VlanVid = 6,
    /// VLAN priority.
    VlanPcp = 7,
    /// IP DSCP (6 bits in ToS field).
    IpDscp = 8,
    /// IP ECN (2 bits in ToS field).
    IpEcn = 9,
    /// IP protocol.
    IpProto = 10,
    /// IPv4 source address.
    IPv4Src = 11,
    /// IPv4 destination address.
    IPv4Dst = 12,
    /// TCP source port.
    TcpSrc = 13,
    /// TCP destination port.
    TcpDst = 14,
    /// UDP source port.
    UdpSrc = 15,
    /// UDP destination port.
    UdpDst = 16,
    /// SCTP source port.
    SctpSrc = 17,
    /// SCTP destination port.
    SctpDst = 18,
    /// ICMP type.
    IcmpV4Type = 19,
    /// ICMP code.
    IcmpV4Code = 20,
    /// ARP opcode.
    ArpOp = 21,
    /// ARP source IPv4 address.
    ArpSpa = 22,
    /// ARP target IPv4 address.
    ArpTpa = 23,
    /// ARP source hardware address.
    ArpSha = 24,
    /// ARP target hardware address.
    ArpTha = 25,
    /// IPv6 source address.
    IPv6Src = 26,
    /// IPv6 destination address.
    IPv6Dst = 27,
    /// IPv6 Flow Label
    IPv6FLabel = 28,
    /// ICMPv6 type.
    IcmpV6Type = 29,
    /// ICMPv6 code.
    IcmpV6Code = 30,
    /// Target address for ND.
    IPv6NdTarget = 31,
    /// Source link-layer for ND.
    IPv6NdSll = 32,
    /// Target link-layer for ND.
    IPv6NdTll = 33,
    /// MPLS label.
    MplsLabel = 34,
    /// MPLS TC.
    MplsTc = 35,
    /// MPLS BoS bit.
    MplsBos = 36,
    /// PBB I-SID.
    PbbISid = 37,
    /// Logical Port Metadata.
    TunnelId = 38,
    /// IPv6 Extension Header pseudo-field
    IPv6ExtHdr = 39,
}

/// One OXM TLV. The fields a learning switch needs are decoded, the
/// rest are carried through untouched.
#[derive(Debug, PartialEq, Clone)]
pub enum OxmField {
    InPort(u32),
    EthDst(MacAddr, Option<MacAddr>),
    EthSrc(MacAddr, Option<MacAddr>),
    EthType(u16),
    Other {
        header: OxmTlvHeader,
        value: Vec<u8>,
    },
}

impl OxmField {
    fn decode(tlv_header: OxmTlvHeader, value: &[u8]) -> Result<Self> {
        let class = OxmClass::from_u32(tlv_header.get_oxm_class());
        let field = OfbMatchFields::from_u32(tlv_header.get_oxm_field());
        let masked = tlv_header.get_hasmask() == 1;

        if class != Some(OxmClass::OpenFlowBasic) {
            return Ok(OxmField::Other {
                header: tlv_header,
                value: value.to_vec(),
            });
        }

        let expect = |len: usize| -> Result<()> {
            if value.len() != len {
                bail!(ErrorKind::InvalidSliceLength(len, value.len(), stringify!(OxmField)));
            }
            Ok(())
        };

        Ok(match field {
            Some(OfbMatchFields::InPort) => {
                expect(4)?;
                OxmField::InPort(Cursor::new(value).read_u32::<BigEndian>()?)
            }
            Some(OfbMatchFields::EthDst) | Some(OfbMatchFields::EthSrc) => {
                let (addr, mask) = if masked {
                    expect(2 * ETHERNET_ADDRESS_LENGTH)?;
                    (
                        MacAddr::from_slice(value)?,
                        Some(MacAddr::from_slice(&value[ETHERNET_ADDRESS_LENGTH..])?),
                    )
                } else {
                    expect(ETHERNET_ADDRESS_LENGTH)?;
                    (MacAddr::from_slice(value)?, None)
                };
                if field == Some(OfbMatchFields::EthDst) {
                    OxmField::EthDst(addr, mask)
                } else {
                    OxmField::EthSrc(addr, mask)
                }
            }
            Some(OfbMatchFields::EthType) => {
                expect(2)?;
                OxmField::EthType(Cursor::new(value).read_u16::<BigEndian>()?)
            }
            _ => OxmField::Other {
                header: tlv_header,
                value: value.to_vec(),
            },
        })
    }

    fn value_len(&self) -> usize {
        match self {
            OxmField::InPort(_) => 4,
            OxmField::EthDst(_, mask) | OxmField::EthSrc(_, mask) => {
                ETHERNET_ADDRESS_LENGTH * if mask.is_some() { 2 } else { 1 }
            }
            OxmField::EthType(_) => 2,
            OxmField::Other { value, .. } => value.len(),
        }
    }

    fn wire_len(&self) -> usize {
        OXM_HEADER_LENGTH + self.value_len()
    }
}

impl Encode for OxmField {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
        let len = self.value_len();
        match self {
            OxmField::InPort(port) => {
                let header = OxmTlvHeader::basic(OfbMatchFields::InPort, false, len);
                buf.write_u32::<BigEndian>(header.0)?;
                buf.write_u32::<BigEndian>(*port)?;
            }
            OxmField::EthDst(addr, mask) | OxmField::EthSrc(addr, mask) => {
                let field = if let OxmField::EthDst(..) = self {
                    OfbMatchFields::EthDst
                } else {
                    OfbMatchFields::EthSrc
                };
                buf.write_u32::<BigEndian>(OxmTlvHeader::basic(field, mask.is_some(), len).0)?;
                buf.extend_from_slice(&addr.octets());
                if let Some(mask) = mask {
                    buf.extend_from_slice(&mask.octets());
                }
            }
            OxmField::EthType(ethertype) => {
                let header = OxmTlvHeader::basic(OfbMatchFields::EthType, false, len);
                buf.write_u32::<BigEndian>(header.0)?;
                buf.write_u16::<BigEndian>(*ethertype)?;
            }
            OxmField::Other { header, value } => {
                buf.write_u32::<BigEndian>(header.0)?;
                buf.extend_from_slice(value);
            }
        }
        Ok(())
    }
}
