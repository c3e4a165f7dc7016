use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::convert::TryFrom;
use std::io::Cursor;

use super::super::err::*;
use super::actions::{calc_actions_len, Action};
use super::packet_in::NO_BUFFER;
use super::ports::PortNumber;
use super::{sub_slice, write_pad, Encode};

pub const PACKET_OUT_LEN: usize = 16;

/// Body of OFPT_PACKET_OUT.
#[derive(Debug, PartialEq, Clone)]
pub struct PacketOut {
    pub buffer_id: u32,
    pub in_port: PortNumber,
    //actions_len u16, pad 6 bytes
    pub actions: Vec<Action>,
    /// only meaningful when buffer_id is NO_BUFFER
    pub data: Vec<u8>,
}

impl PacketOut {
    pub fn new(buffer_id: u32, in_port: PortNumber, actions: Vec<Action>, data: Vec<u8>) -> Self {
        PacketOut {
            buffer_id,
            in_port,
            actions,
            data,
        }
    }

    /// Packet-out for a packet-in: reference the switch buffer when there is
    /// one, otherwise carry the frame inline.
    pub fn for_packet(
        buffer: Option<u32>,
        in_port: PortNumber,
        actions: Vec<Action>,
        frame: &[u8],
    ) -> Self {
        match buffer {
            Some(buffer_id) => PacketOut::new(buffer_id, in_port, actions, Vec::new()),
            None => PacketOut::new(NO_BUFFER, in_port, actions, frame.to_vec()),
        }
    }
}

impl<'a> TryFrom<&'a [u8]> for PacketOut {
    type Error = Error;
    fn try_from(bytes: &'a [u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let buffer_id = cursor.read_u32::<BigEndian>()?;
        let in_port = PortNumber::try_from(cursor.read_u32::<BigEndian>()?)?;
        let actions_len = cursor.read_u16::<BigEndian>()? as usize;
        let action_bytes = sub_slice(bytes, PACKET_OUT_LEN, actions_len, stringify!(PacketOut))?;
        let actions = Action::decode_list(action_bytes)?;

        Ok(PacketOut {
            buffer_id,
            in_port,
            actions,
            data: bytes[PACKET_OUT_LEN + actions_len..].to_vec(),
        })
    }
}

impl Encode for PacketOut {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.write_u32::<BigEndian>(self.buffer_id)?;
        buf.write_u32::<BigEndian>(u32::from(self.in_port))?;
        buf.write_u16::<BigEndian>(calc_actions_len(&self.actions) as u16)?;
        write_pad(buf, 6);
        for action in &self.actions {
            action.encode(buf)?;
        }
        buf.extend_from_slice(&self.data);
        Ok(())
    }
}
