use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use num_traits::FromPrimitive;
use std::convert::TryFrom;
use std::io::Cursor;

use super::super::err::*;
use super::flow_instructions::Instruction;
use super::flow_match::Match;
use super::packet_in::NO_BUFFER;
use super::ports::{PortNo, PortNumber};
use super::{sub_slice, write_pad, Encode};

/// fixed part before the match
pub const FLOW_MOD_FIXED_LEN: usize = 40;

/// Wildcard group for deletes.
pub const GROUP_ANY: u32 = 0xffffffff;

/// Body of OFPT_FLOW_MOD.
#[derive(Debug, PartialEq, Clone)]
pub struct FlowMod {
    pub cookie: u64,
    pub cookie_mask: u64,
    pub table_id: u8,
    pub command: FlowModCommand,
    pub idle_timeout: u16,
    pub hard_timeout: u16,
    pub priority: u16,
    pub buffer_id: u32,
    pub out_port: PortNumber,
    pub out_group: u32,
    pub flags: FlowModFlags,
    //pad 2 bytes
    pub mmatch: Match,
    pub instructions: Vec<Instruction>,
}

impl FlowMod {
    /// OFPFC_ADD skeleton: no buffer, no output filter.
    pub fn add(table_id: u8, priority: u16, mmatch: Match, instructions: Vec<Instruction>) -> Self {
        FlowMod {
            cookie: 0,
            cookie_mask: 0,
            table_id,
            command: FlowModCommand::Add,
            idle_timeout: 0,
            hard_timeout: 0,
            priority,
            buffer_id: NO_BUFFER,
            out_port: PortNumber::Reserved(PortNo::Any),
            out_group: GROUP_ANY,
            flags: FlowModFlags::empty(),
            mmatch,
            instructions,
        }
    }

    /// OFPFC_DELETE of every flow whose cookie matches under `cookie_mask`
    /// and which outputs to `out_port`.
    pub fn delete(table_id: u8, cookie: u64, cookie_mask: u64, out_port: PortNumber) -> Self {
        FlowMod {
            cookie,
            cookie_mask,
            table_id,
            command: FlowModCommand::Delete,
            idle_timeout: 0,
            hard_timeout: 0,
            priority: 0,
            buffer_id: NO_BUFFER,
            out_port,
            out_group: GROUP_ANY,
            flags: FlowModFlags::empty(),
            mmatch: Match::all(),
            instructions: Vec::new(),
        }
    }
}

impl<'a> TryFrom<&'a [u8]> for FlowMod {
    type Error = Error;
    fn try_from(bytes: &'a [u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let cookie = cursor.read_u64::<BigEndian>()?;
        let cookie_mask = cursor.read_u64::<BigEndian>()?;
        let table_id = cursor.read_u8()?;
        let command_raw = cursor.read_u8()?;
        let command = FlowModCommand::from_u8(command_raw).ok_or_else(|| {
            Error::from(ErrorKind::UnknownValue(command_raw as u64, stringify!(FlowModCommand)))
        })?;
        let idle_timeout = cursor.read_u16::<BigEndian>()?;
        let hard_timeout = cursor.read_u16::<BigEndian>()?;
        let priority = cursor.read_u16::<BigEndian>()?;
        let buffer_id = cursor.read_u32::<BigEndian>()?;
        let out_port = PortNumber::try_from(cursor.read_u32::<BigEndian>()?)?;
        let out_group = cursor.read_u32::<BigEndian>()?;
        let flags = FlowModFlags::from_bits_truncate(cursor.read_u16::<BigEndian>()?);

        let match_bytes = bytes.get(FLOW_MOD_FIXED_LEN..).ok_or_else(|| {
            Error::from(ErrorKind::InvalidSliceLength(
                FLOW_MOD_FIXED_LEN,
                bytes.len(),
                stringify!(FlowMod),
            ))
        })?;
        let match_len = Match::padded_len(match_bytes)?;
        let mmatch = Match::try_from(sub_slice(match_bytes, 0, match_len, stringify!(Match))?)?;
        let instructions = Instruction::decode_list(&match_bytes[match_len..])?;

        Ok(FlowMod {
            cookie,
            cookie_mask,
            table_id,
            command,
            idle_timeout,
            hard_timeout,
            priority,
            buffer_id,
            out_port,
            out_group,
            flags,
            mmatch,
            instructions,
        })
    }
}

impl Encode for FlowMod {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.write_u64::<BigEndian>(self.cookie)?;
        buf.write_u64::<BigEndian>(self.cookie_mask)?;
        buf.write_u8(self.table_id)?;
        buf.write_u8(self.command as u8)?;
        buf.write_u16::<BigEndian>(self.idle_timeout)?;
        buf.write_u16::<BigEndian>(self.hard_timeout)?;
        buf.write_u16::<BigEndian>(self.priority)?;
        buf.write_u32::<BigEndian>(self.buffer_id)?;
        buf.write_u32::<BigEndian>(u32::from(self.out_port))?;
        buf.write_u32::<BigEndian>(self.out_group)?;
        buf.write_u16::<BigEndian>(self.flags.bits())?;
        write_pad(buf, 2);
        self.mmatch.encode(buf)?;
        for instruction in &self.instructions {
            instruction.encode(buf)?;
        }
        Ok(())
    }
}

#[derive(Primitive, PartialEq, Debug, Clone, Copy)]
pub enum FlowModCommand {
    /// New flow.
    Add = 0,
    /// Modify all matching flows.
    Modify = 1,
    /// Modify entry strictly matching wildcards and
    /// priority.
    ModifyStrict = 2,
    /// Delete all matching flows.
    Delete = 3,
    /// Delete entry strictly matching wildcards and
    /// priority.
    DeleteStrict = 4,
}

bitflags! {
    pub struct FlowModFlags: u16 {
        /// Send flow removed message when flow
        /// expires or is deleted.
        const SEND_FLOW_REM = 1 << 0;
        /// Check for overlapping entries first.
        const CHECK_OVERLAP = 1 << 1;
        /// Reset flow packet and byte counts.
        const RESET_COUNTS = 1 << 2;
        /// Don't keep track of packet count.
        const NO_PKT_COUNTS = 1 << 3;
        /// Don't keep track of byte count.
        const NO_BYT_COUNTS = 1 << 4;
    }
}
