use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use num_traits::FromPrimitive;
use std::convert::TryFrom;
use std::io::Cursor;

use super::super::err::*;
use super::ports::{Port, PORT_LENGTH};
use super::{write_pad, Encode};

/// type + flags + 4 bytes padding
const MULTIPART_HEADER_LEN: usize = 8;

#[derive(Primitive, PartialEq, Debug, Clone, Copy)]
pub enum MultipartType {
    /// Description of this OpenFlow switch.
    Desc = 0,
    /// Individual flow statistics.
    Flow = 1,
    /// Aggregate flow statistics.
    Aggregate = 2,
    /// Flow table statistics.
    Table = 3,
    /// Port statistics.
    PortStats = 4,
    /// Queue statistics for a port
    Queue = 5,
    /// Group counter statistics.
    Group = 6,
    /// Group description.
    GroupDesc = 7,
    /// Group features.
    GroupFeatures = 8,
    /// Meter statistics.
    Meter = 9,
    /// Meter configuration.
    MeterConfig = 10,
    /// Meter features.
    MeterFeatures = 11,
    /// Table features.
    TableFeatures = 12,
    /// Port description.
    PortDesc = 13,
    /// Experimenter extension.
    Experimenter = 0xffff,
}

bitflags! {
    pub struct MultipartFlags: u16 {
        /// More requests/replies to follow.
        const MORE = 1 << 0;
    }
}

fn read_multipart_header(bytes: &[u8]) -> Result<(MultipartType, MultipartFlags)> {
    let mut cursor = Cursor::new(bytes);
    let raw_ttype = cursor.read_u16::<BigEndian>()?;
    let ttype = MultipartType::from_u16(raw_ttype).ok_or_else(|| {
        Error::from(ErrorKind::UnknownValue(raw_ttype as u64, stringify!(MultipartType)))
    })?;
    let flags = MultipartFlags::from_bits_truncate(cursor.read_u16::<BigEndian>()?);
    if bytes.len() < MULTIPART_HEADER_LEN {
        bail!(ErrorKind::InvalidSliceLength(
            MULTIPART_HEADER_LEN,
            bytes.len(),
            stringify!(MultipartType),
        ));
    }
    Ok((ttype, flags))
}

fn write_multipart_header(
    buf: &mut Vec<u8>,
    ttype: MultipartType,
    flags: MultipartFlags,
) -> Result<()> {
    buf.write_u16::<BigEndian>(ttype as u16)?;
    buf.write_u16::<BigEndian>(flags.bits())?;
    write_pad(buf, 4);
    Ok(())
}

/// Body of OFPT_MULTIPART_REQUEST. Only the port description request is
/// issued by the controller.
#[derive(Debug, PartialEq, Clone)]
pub enum MultipartRequest {
    PortDesc,
}

impl<'a> TryFrom<&'a [u8]> for MultipartRequest {
    type Error = Error;
    fn try_from(bytes: &'a [u8]) -> Result<Self> {
        match read_multipart_header(bytes)? {
            (MultipartType::PortDesc, _) => Ok(MultipartRequest::PortDesc),
            (other, _) => bail!(ErrorKind::UnsupportedValue(
                other as u64,
                stringify!(MultipartType),
            )),
        }
    }
}

impl Encode for MultipartRequest {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
        match self {
            MultipartRequest::PortDesc => {
                write_multipart_header(buf, MultipartType::PortDesc, MultipartFlags::empty())
            }
        }
    }
}

/// Body of OFPT_MULTIPART_REPLY.
#[derive(Debug, PartialEq, Clone)]
pub struct MultipartReply {
    pub flags: MultipartFlags,
    pub body: MultipartReplyBody,
}

#[derive(Debug, PartialEq, Clone)]
pub enum MultipartReplyBody {
    PortDesc(Vec<Port>),
}

impl MultipartReply {
    /// more parts of this reply follow
    pub fn more(&self) -> bool {
        self.flags.contains(MultipartFlags::MORE)
    }
}

impl<'a> TryFrom<&'a [u8]> for MultipartReply {
    type Error = Error;
    fn try_from(bytes: &'a [u8]) -> Result<Self> {
        let (ttype, flags) = read_multipart_header(bytes)?;
        match ttype {
            MultipartType::PortDesc => {
                let body = &bytes[MULTIPART_HEADER_LEN..];
                if body.len() % PORT_LENGTH != 0 {
                    bail!(ErrorKind::InvalidSliceLength(
                        body.len() / PORT_LENGTH * PORT_LENGTH + PORT_LENGTH,
                        body.len(),
                        stringify!(MultipartReplyBody),
                    ));
                }
                let ports = body
                    .chunks(PORT_LENGTH)
                    .map(Port::try_from)
                    .collect::<Result<Vec<_>>>()?;
                Ok(MultipartReply {
                    flags,
                    body: MultipartReplyBody::PortDesc(ports),
                })
            }
            other => bail!(ErrorKind::UnsupportedValue(
                other as u64,
                stringify!(MultipartType),
            )),
        }
    }
}

impl Encode for MultipartReply {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
        match &self.body {
            MultipartReplyBody::PortDesc(ports) => {
                write_multipart_header(buf, MultipartType::PortDesc, self.flags)?;
                for port in ports {
                    port.encode(buf)?;
                }
                Ok(())
            }
        }
    }
}
