use byteorder::{ReadBytesExt, WriteBytesExt};
use num_traits::FromPrimitive;
use std::convert::TryFrom;
use std::io::Cursor;

use super::super::err::*;
use super::ports::Port;
use super::{sub_slice, write_pad, Encode};

/// Body of OFPT_PORT_STATUS.
#[derive(Debug, PartialEq, Clone)]
pub struct PortStatus {
    pub reason: PortReason,
    //pad 7 bytes
    pub desc: Port,
}

impl<'a> TryFrom<&'a [u8]> for PortStatus {
    type Error = Error;
    fn try_from(bytes: &'a [u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let reason_raw = cursor.read_u8()?;
        let reason = PortReason::from_u8(reason_raw).ok_or_else(|| {
            Error::from(ErrorKind::UnknownValue(reason_raw as u64, stringify!(PortReason)))
        })?;
        let desc_bytes = sub_slice(
            bytes,
            8,
            bytes.len().saturating_sub(8),
            stringify!(PortStatus),
        )?;
        let desc = Port::try_from(desc_bytes)?;

        Ok(PortStatus { reason, desc })
    }
}

impl Encode for PortStatus {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.write_u8(self.reason as u8)?;
        write_pad(buf, 7);
        self.desc.encode(buf)
    }
}

/// What changed about the physical port
#[derive(Primitive, PartialEq, Debug, Clone, Copy)]
pub enum PortReason {
    /// The port was added.
    Add = 0,
    /// The port was removed.
    Delete = 1,
    /// Some attribute of the port has changed.
    Modify = 2,
}
