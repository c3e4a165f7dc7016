use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::convert::TryFrom;
use std::io::Cursor;

use super::super::err::*;
use super::Encode;

/// Body of OFPT_SET_CONFIG / OFPT_GET_CONFIG_REPLY.
#[derive(Debug, PartialEq, Clone)]
pub struct SwitchConfig {
    pub flags: ConfigFlags,
    /// bytes of a table-miss packet sent to the controller
    pub miss_send_len: u16,
}

impl<'a> TryFrom<&'a [u8]> for SwitchConfig {
    type Error = Error;
    fn try_from(bytes: &'a [u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let flags = ConfigFlags::from_bits_truncate(cursor.read_u16::<BigEndian>()?);
        let miss_send_len = cursor.read_u16::<BigEndian>()?;
        Ok(SwitchConfig {
            flags,
            miss_send_len,
        })
    }
}

impl Encode for SwitchConfig {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.write_u16::<BigEndian>(self.flags.bits())?;
        buf.write_u16::<BigEndian>(self.miss_send_len)?;
        Ok(())
    }
}

bitflags! {
    /// Handling of IP fragments.
    pub struct ConfigFlags: u16 {
        /// No special handling for fragments.
        const FRAG_NORMAL = 0;
        /// Drop fragments.
        const FRAG_DROP = 1 << 0;
        /// Reassemble (only if OFPC_IP_REASM set).
        const FRAG_REASM = 1 << 1;
        const FRAG_MASK = 3;
    }
}
