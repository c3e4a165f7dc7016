use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use num_traits::FromPrimitive;
use std::convert::TryFrom;
use std::io::Cursor;

use super::super::err::*;
use super::Encode;

/// Body of OFPT_ERROR.
#[derive(Debug, PartialEq, Clone)]
pub struct ErrorMsg {
    pub ttype: u16,
    pub code: u16,
    /// at least the first 64 bytes of the failed request
    pub data: Vec<u8>,
}

impl ErrorMsg {
    pub fn hello_failed(code: HelloFailedCode, reason: &str) -> Self {
        ErrorMsg {
            ttype: ErrorType::HelloFailed as u16,
            code: code as u16,
            data: reason.as_bytes().to_vec(),
        }
    }

    pub fn error_type(&self) -> Option<ErrorType> {
        ErrorType::from_u16(self.ttype)
    }
}

impl<'a> TryFrom<&'a [u8]> for ErrorMsg {
    type Error = Error;
    fn try_from(bytes: &'a [u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let ttype = cursor.read_u16::<BigEndian>()?;
        let code = cursor.read_u16::<BigEndian>()?;
        Ok(ErrorMsg {
            ttype,
            code,
            data: bytes[4..].to_vec(),
        })
    }
}

impl Encode for ErrorMsg {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.write_u16::<BigEndian>(self.ttype)?;
        buf.write_u16::<BigEndian>(self.code)?;
        buf.extend_from_slice(&self.data);
        Ok(())
    }
}

/// Values for the error message type field.
#[derive(Primitive, PartialEq, Debug, Clone, Copy)]
pub enum ErrorType {
    /// Hello protocol failed.
    HelloFailed = 0,
    /// Request was not understood.
    BadRequest = 1,
    /// Error in action description.
    BadAction = 2,
    /// Error in instruction list.
    BadInstruction = 3,
    /// Error in match.
    BadMatch = 4,
    /// Problem modifying flow entry.
    FlowModFailed = 5,
    /// Problem modifying group entry.
    GroupModFailed = 6,
    /// Port mod request failed.
    PortModFailed = 7,
    /// Table mod request failed.
    TableModFailed = 8,
    /// Queue operation failed.
    QueueOpFailed = 9,
    /// Switch config request failed.
    SwitchConfigFailed = 10,
    /// Controller Role request failed.
    RoleRequestFailed = 11,
    /// Error in meter.
    MeterModFailed = 12,
    /// Setting table features failed.
    TableFeaturesFailed = 13,
    /// Experimenter error messages.
    Experimenter = 0xffff,
}

/// Codes for HELLO_FAILED.
#[derive(Primitive, PartialEq, Debug, Clone, Copy)]
pub enum HelloFailedCode {
    /// No compatible version.
    Incompatible = 0,
    /// Permissions error.
    EPerm = 1,
}
