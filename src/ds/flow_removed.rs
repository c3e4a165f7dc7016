use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use num_traits::FromPrimitive;
use std::convert::TryFrom;
use std::io::Cursor;

use super::super::err::*;
use super::flow_match::Match;
use super::{sub_slice, Encode};

const FLOW_REMOVED_FIXED_LEN: usize = 40;

/// Body of OFPT_FLOW_REMOVED.
#[derive(Debug, PartialEq, Clone)]
pub struct FlowRemoved {
    pub cookie: u64,

    pub priority: u16,
    pub reason: FlowRemovedReason,
    pub table_id: u8,

    pub duration_sec: u32,
    pub duration_nsec: u32,

    pub idle_timeout: u16,
    pub hard_timeout: u16,

    pub packet_count: u64,
    pub byte_count: u64,

    pub mmatch: Match,
}

impl<'a> TryFrom<&'a [u8]> for FlowRemoved {
    type Error = Error;
    fn try_from(bytes: &'a [u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let cookie = cursor.read_u64::<BigEndian>()?;
        let priority = cursor.read_u16::<BigEndian>()?;
        let reason_raw = cursor.read_u8()?;
        let reason = FlowRemovedReason::from_u8(reason_raw).ok_or_else(|| {
            Error::from(ErrorKind::UnknownValue(
                reason_raw as u64,
                stringify!(FlowRemovedReason),
            ))
        })?;
        let table_id = cursor.read_u8()?;
        let duration_sec = cursor.read_u32::<BigEndian>()?;
        let duration_nsec = cursor.read_u32::<BigEndian>()?;
        let idle_timeout = cursor.read_u16::<BigEndian>()?;
        let hard_timeout = cursor.read_u16::<BigEndian>()?;
        let packet_count = cursor.read_u64::<BigEndian>()?;
        let byte_count = cursor.read_u64::<BigEndian>()?;

        let match_bytes = &bytes[FLOW_REMOVED_FIXED_LEN..];
        let match_len = Match::padded_len(match_bytes)?;
        let mmatch = Match::try_from(sub_slice(match_bytes, 0, match_len, stringify!(Match))?)?;

        Ok(FlowRemoved {
            cookie,
            priority,
            reason,
            table_id,
            duration_sec,
            duration_nsec,
            idle_timeout,
            hard_timeout,
            packet_count,
            byte_count,
            mmatch,
        })
    }
}

impl Encode for FlowRemoved {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.write_u64::<BigEndian>(self.cookie)?;
        buf.write_u16::<BigEndian>(self.priority)?;
        buf.write_u8(self.reason as u8)?;
        buf.write_u8(self.table_id)?;
        buf.write_u32::<BigEndian>(self.duration_sec)?;
        buf.write_u32::<BigEndian>(self.duration_nsec)?;
        buf.write_u16::<BigEndian>(self.idle_timeout)?;
        buf.write_u16::<BigEndian>(self.hard_timeout)?;
        buf.write_u64::<BigEndian>(self.packet_count)?;
        buf.write_u64::<BigEndian>(self.byte_count)?;
        self.mmatch.encode(buf)
    }
}

/// Why was this flow removed?
#[derive(Primitive, PartialEq, Debug, Clone, Copy)]
pub enum FlowRemovedReason {
    /// Flow idle time exceeded idle_timeout.
    IdleTimeout = 0,
    /// Time exceeded hard_timeout.
    HardTimeout = 1,
    /// Evicted by a DELETE flow mod.
    Delete = 2,
    /// Group was removed.
    GroupDelete = 3,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ds::flow_match::OxmField;

    #[test]
    fn idle_timeout_removal_decodes() {
        let removed = FlowRemoved {
            cookie: 0x10,
            priority: 10,
            reason: FlowRemovedReason::IdleTimeout,
            table_id: 0,
            duration_sec: 31,
            duration_nsec: 0,
            idle_timeout: 30,
            hard_timeout: 0,
            packet_count: 4,
            byte_count: 392,
            mmatch: Match::with_fields(vec![OxmField::InPort(2)]),
        };
        let mut buf = Vec::new();
        removed.encode(&mut buf).unwrap();
        assert_eq!(buf[10], 0);
        let decoded = FlowRemoved::try_from(&buf[..]).unwrap();
        assert_eq!(decoded.mmatch.in_port(), Some(2));
        assert_eq!(decoded.reason, FlowRemovedReason::IdleTimeout);
    }
}
