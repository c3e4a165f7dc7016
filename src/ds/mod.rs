use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use num_traits::FromPrimitive;
use std::convert::TryFrom;
use std::io::Cursor;

use super::err::*;

pub mod actions;
pub mod codec;
pub mod error_msg;
pub mod ethernet;
pub mod features;
pub mod flow_instructions;
pub mod flow_match;
pub mod flow_mod;
pub mod flow_removed;
pub mod hello;
pub mod hw_addr;
pub mod multipart;
pub mod packet_in;
pub mod packet_out;
pub mod port_status;
pub mod ports;
pub mod switch_config;

/// Serialises a wire structure onto the end of `buf`.
pub trait Encode {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<()>;
}

/// defines an OpenFlow message
/// header + payload
#[derive(Getters, Debug, PartialEq, Clone)]
pub struct OfMsg {
    #[getset(get = "pub")]
    header: Header,
    #[getset(get = "pub")]
    payload: OfPayload,
}

impl OfMsg {
    pub fn new(header: Header, payload: OfPayload) -> Self {
        OfMsg { header, payload }
    }

    /// Builds an outgoing message. The header length is filled in by
    /// [`codec::encode`] once the body size is known.
    pub fn generate(version: Version, xid: u32, payload: OfPayload) -> Self {
        OfMsg {
            header: Header {
                version,
                ttype: payload.ttype(),
                length: HEADER_LENGTH as u16,
                xid,
            },
            payload,
        }
    }

    pub fn into_payload(self) -> OfPayload {
        self.payload
    }
}

/// OpenFlow message header length is 8 bytes.
pub const HEADER_LENGTH: usize = 8;

/// OpenFlow header struct.
#[derive(CopyGetters, Debug, PartialEq, Clone)]
pub struct Header {
    /// OpenFlow version identifier
    #[getset(get_copy = "pub")]
    version: Version,
    /// OpenFlow message type
    #[getset(get_copy = "pub")]
    ttype: Type,
    /// length of message including this header
    #[getset(get_copy = "pub")]
    length: u16,
    /// Transaction id associated with this packet.
    /// Replies use the same id as was in the request
    /// to facilitate pairing.
    #[getset(get_copy = "pub")]
    xid: u32,
}

impl Header {
    pub fn new(version: Version, ttype: Type, length: u16, xid: u32) -> Self {
        Header {
            version,
            ttype,
            length,
            xid,
        }
    }

    /// returns the length of the payload in bytes
    pub fn payload_length(&self) -> u16 {
        self.length.saturating_sub(HEADER_LENGTH as u16)
    }
}

impl<'a> TryFrom<&'a [u8]> for Header {
    type Error = Error;
    fn try_from(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() < HEADER_LENGTH {
            bail!(ErrorKind::InvalidSliceLength(
                HEADER_LENGTH,
                bytes.len(),
                stringify!(Header),
            ));
        }
        let mut cursor = Cursor::new(bytes);

        let version_raw = cursor.read_u8()?;
        let version = Version::from_u8(version_raw).ok_or_else(|| {
            Error::from(ErrorKind::UnknownValue(
                version_raw as u64,
                stringify!(Version),
            ))
        })?;

        let ttype_raw = cursor.read_u8()?;
        let ttype = Type::from_u8(ttype_raw).ok_or_else(|| {
            Error::from(ErrorKind::UnknownValue(ttype_raw as u64, stringify!(Type)))
        })?;

        Ok(Header {
            version,
            ttype,
            length: cursor.read_u16::<BigEndian>()?,
            xid: cursor.read_u32::<BigEndian>()?,
        })
    }
}

impl Encode for Header {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.write_u8(self.version as u8)?;
        buf.write_u8(self.ttype as u8)?;
        buf.write_u16::<BigEndian>(self.length)?;
        buf.write_u32::<BigEndian>(self.xid)?;
        Ok(())
    }
}

/// OpenFlow Version enum.
#[derive(Primitive, PartialEq, Eq, PartialOrd, Ord, Debug, Clone, Copy, Hash)]
pub enum Version {
    /// indicates OpenFlow version 1.0
    V1_0 = 0x01,
    /// indicates OpenFlow version 1.1
    V1_1 = 0x02,
    /// indicates OpenFlow version 1.2
    V1_2 = 0x03,
    /// indicates OpenFlow version 1.3
    V1_3 = 0x04,
    /// indicates OpenFlow version 1.4
    V1_4 = 0x05,
    /// indicates OpenFlow version 1.5
    V1_5 = 0x06,
}

/// Enum of OpenFlow message types.
#[derive(Primitive, PartialEq, Eq, Debug, Clone, Copy, Hash)]
pub enum Type {
    /* Immutable messages. */
    /// Hello message sent by switch and controller
    /// directly after establishing a connection.
    /// Symmetric message.
    Hello = 0,
    /// Symmetric message
    Error = 1,
    /// Symmetric message
    EchoRequest = 2,
    /// Symmetric message
    EchoReply = 3,
    /// Symmetric message
    Experimenter = 4,

    /* Switch configuration messages. */
    /// Controller/switch message
    FeaturesRequest = 5,
    /// Controller/switch message
    FeaturesReply = 6,
    /// Controller/switch message
    GetConfigRequest = 7,
    /// Controller/switch message
    GetConfigReply = 8,
    /// Controller/switch message
    SetConfig = 9,

    /* Asynchronous messages. */
    /// Async message
    PacketIn = 10,
    /// Async message
    FlowRemoved = 11,
    /// Async message
    PortStatus = 12,

    /* Controller command messages. */
    /// Controller/switch message
    PacketOut = 13,
    /// Controller/switch message
    FlowMod = 14,
    /// Controller/switch message
    GroupMod = 15,
    /// Controller/switch message
    PortMod = 16,
    /// Controller/switch message
    TableMod = 17,

    /* Multipart messages. */
    /// Controller/switch message
    MultipartRequest = 18,
    /// Controller/switch message
    MultipartReply = 19,

    /* Barrier messages. */
    /// Controller/switch message
    BarrierRequest = 20,
    /// Controller/switch message
    BarrierReply = 21,

    /* Queue Configuration messages. */
    /// Controller/switch message
    QueueGetConfigRequest = 22,
    /// Controller/switch message
    QueueGetConfigReply = 23,
    /* Controller role change request messages. */
    /// Controller/switch message
    RoleRequest = 24,
    /// Controller/switch message
    RoleReply = 25,

    /* Asynchronous message configuration. */
    /// Controller/switch message
    GetAsyncRequest = 26,
    /// Controller/switch message
    GetAsyncReply = 27,
    /// Controller/switch message
    SetAsync = 28,

    /* Meters and rate limiters configuration messages. */
    /// Controller/switch message
    MeterMod = 29,
}

/// Message bodies the controller understands.
#[derive(Debug, PartialEq, Clone)]
pub enum OfPayload {
    Hello(hello::Hello),
    Error(error_msg::ErrorMsg),
    EchoRequest(Vec<u8>),
    EchoReply(Vec<u8>),

    FeaturesRequest,
    FeaturesReply(features::SwitchFeatures),
    SetConfig(switch_config::SwitchConfig),

    PacketIn(packet_in::PacketIn),
    FlowRemoved(flow_removed::FlowRemoved),
    PortStatus(port_status::PortStatus),

    PacketOut(packet_out::PacketOut),
    FlowMod(flow_mod::FlowMod),

    MultipartRequest(multipart::MultipartRequest),
    MultipartReply(multipart::MultipartReply),

    BarrierRequest,
    BarrierReply,
}

impl OfPayload {
    pub fn ttype(&self) -> Type {
        match self {
            OfPayload::Hello(_) => Type::Hello,
            OfPayload::Error(_) => Type::Error,
            OfPayload::EchoRequest(_) => Type::EchoRequest,
            OfPayload::EchoReply(_) => Type::EchoReply,
            OfPayload::FeaturesRequest => Type::FeaturesRequest,
            OfPayload::FeaturesReply(_) => Type::FeaturesReply,
            OfPayload::SetConfig(_) => Type::SetConfig,
            OfPayload::PacketIn(_) => Type::PacketIn,
            OfPayload::FlowRemoved(_) => Type::FlowRemoved,
            OfPayload::PortStatus(_) => Type::PortStatus,
            OfPayload::PacketOut(_) => Type::PacketOut,
            OfPayload::FlowMod(_) => Type::FlowMod,
            OfPayload::MultipartRequest(_) => Type::MultipartRequest,
            OfPayload::MultipartReply(_) => Type::MultipartReply,
            OfPayload::BarrierRequest => Type::BarrierRequest,
            OfPayload::BarrierReply => Type::BarrierReply,
        }
    }

    /// Decodes a message body of the given type.
    pub fn decode(ttype: Type, body: &[u8]) -> Result<Self> {
        Ok(match ttype {
            Type::Hello => OfPayload::Hello(hello::Hello::try_from(body)?),
            Type::Error => OfPayload::Error(error_msg::ErrorMsg::try_from(body)?),
            Type::EchoRequest => OfPayload::EchoRequest(body.to_vec()),
            Type::EchoReply => OfPayload::EchoReply(body.to_vec()),
            Type::FeaturesRequest => OfPayload::FeaturesRequest,
            Type::FeaturesReply => {
                OfPayload::FeaturesReply(features::SwitchFeatures::try_from(body)?)
            }
            Type::SetConfig => OfPayload::SetConfig(switch_config::SwitchConfig::try_from(body)?),
            Type::PacketIn => OfPayload::PacketIn(packet_in::PacketIn::try_from(body)?),
            Type::FlowRemoved => {
                OfPayload::FlowRemoved(flow_removed::FlowRemoved::try_from(body)?)
            }
            Type::PortStatus => OfPayload::PortStatus(port_status::PortStatus::try_from(body)?),
            Type::PacketOut => OfPayload::PacketOut(packet_out::PacketOut::try_from(body)?),
            Type::FlowMod => OfPayload::FlowMod(flow_mod::FlowMod::try_from(body)?),
            Type::MultipartRequest => {
                OfPayload::MultipartRequest(multipart::MultipartRequest::try_from(body)?)
            }
            Type::MultipartReply => {
                OfPayload::MultipartReply(multipart::MultipartReply::try_from(body)?)
            }
            Type::BarrierRequest => OfPayload::BarrierRequest,
            Type::BarrierReply => OfPayload::BarrierReply,
            other => bail!(ErrorKind::UnsupportedValue(other as u64, stringify!(Type))),
        })
    }
}

impl Encode for OfPayload {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
        match self {
            OfPayload::Hello(hello) => hello.encode(buf),
            OfPayload::Error(err) => err.encode(buf),
            OfPayload::EchoRequest(data) | OfPayload::EchoReply(data) => {
                buf.extend_from_slice(data);
                Ok(())
            }
            OfPayload::FeaturesRequest | OfPayload::BarrierRequest | OfPayload::BarrierReply => {
                Ok(())
            }
            OfPayload::FeaturesReply(features) => features.encode(buf),
            OfPayload::SetConfig(config) => config.encode(buf),
            OfPayload::PacketIn(packet_in) => packet_in.encode(buf),
            OfPayload::FlowRemoved(removed) => removed.encode(buf),
            OfPayload::PortStatus(status) => status.encode(buf),
            OfPayload::PacketOut(packet_out) => packet_out.encode(buf),
            OfPayload::FlowMod(flow_mod) => flow_mod.encode(buf),
            OfPayload::MultipartRequest(request) => request.encode(buf),
            OfPayload::MultipartReply(reply) => reply.encode(buf),
        }
    }
}

/// Writes `count` zero bytes of padding.
pub(crate) fn write_pad(buf: &mut Vec<u8>, count: usize) {
    buf.resize(buf.len() + count, 0);
}

/// Borrows `len` bytes at `start` or fails with `InvalidSliceLength`.
pub(crate) fn sub_slice<'a>(
    bytes: &'a [u8],
    start: usize,
    len: usize,
    ttype: &'static str,
) -> Result<&'a [u8]> {
    bytes.get(start..start + len).ok_or_else(|| {
        Error::from(ErrorKind::InvalidSliceLength(
            start + len,
            bytes.len(),
            ttype,
        ))
    })
}
