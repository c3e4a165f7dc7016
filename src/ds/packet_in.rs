use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use num_traits::FromPrimitive;
use std::convert::TryFrom;
use std::io::Cursor;

use super::super::err::*;
use super::flow_match::Match;
use super::{sub_slice, write_pad, Encode};

/// buffer_id value meaning the packet is not buffered on the switch
pub const NO_BUFFER: u32 = 0xffffffff;

/// fixed part before the match
const PACKET_IN_FIXED_LEN: usize = 16;

/// Body of OFPT_PACKET_IN.
#[derive(Debug, PartialEq, Clone)]
pub struct PacketIn {
    pub buffer_id: u32,
    pub total_len: u16,
    pub reason: InReason,
    pub table_id: u8,
    pub cookie: u64,
    pub mmatch: Match,
    //pad 2 bytes
    pub ethernet_frame: Vec<u8>,
}

impl PacketIn {
    pub fn buffer(&self) -> Option<u32> {
        if self.buffer_id == NO_BUFFER {
            None
        } else {
            Some(self.buffer_id)
        }
    }
}

impl<'a> TryFrom<&'a [u8]> for PacketIn {
    type Error = Error;
    fn try_from(bytes: &'a [u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let buffer_id = cursor.read_u32::<BigEndian>()?;
        let total_len = cursor.read_u16::<BigEndian>()?;
        let reason_raw = cursor.read_u8()?;
        let reason = InReason::from_u8(reason_raw).ok_or_else(|| {
            Error::from(ErrorKind::UnknownValue(reason_raw as u64, stringify!(InReason)))
        })?;
        let table_id = cursor.read_u8()?;
        let cookie = cursor.read_u64::<BigEndian>()?;

        let match_bytes = &bytes[PACKET_IN_FIXED_LEN..];
        let match_len = Match::padded_len(match_bytes)?;
        let mmatch = Match::try_from(sub_slice(match_bytes, 0, match_len, stringify!(Match))?)?;

        let frame_start = PACKET_IN_FIXED_LEN + match_len + 2; // 2 bytes padding
        if bytes.len() < frame_start {
            bail!(ErrorKind::InvalidSliceLength(
                frame_start,
                bytes.len(),
                stringify!(PacketIn),
            ));
        }

        Ok(PacketIn {
            buffer_id,
            total_len,
            reason,
            table_id,
            cookie,
            mmatch,
            ethernet_frame: bytes[frame_start..].to_vec(),
        })
    }
}

impl Encode for PacketIn {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.write_u32::<BigEndian>(self.buffer_id)?;
        buf.write_u16::<BigEndian>(self.total_len)?;
        buf.write_u8(self.reason as u8)?;
        buf.write_u8(self.table_id)?;
        buf.write_u64::<BigEndian>(self.cookie)?;
        self.mmatch.encode(buf)?;
        write_pad(buf, 2);
        buf.extend_from_slice(&self.ethernet_frame);
        Ok(())
    }
}

/// Why is this packet being sent to the controller?
#[derive(Primitive, PartialEq, Debug, Clone, Copy)]
pub enum InReason {
    /// No matching flow (table-miss flow entry).
    NoMatch = 0,
    /// Action explicitly output to controller.
    Action = 1,
    /// Packet has invalid TTL
    InvalidTtl = 2,
}
