use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use num_traits::FromPrimitive;
use std::convert::TryFrom;
use std::io::Cursor;

use super::super::err::*;
use super::ports::PortNumber;
use super::{sub_slice, write_pad, Encode};

#[derive(Primitive, Debug, PartialEq, Clone, Copy)]
pub enum ActionType {
    /// Output to switch port.
    Output = 0,
    /// Copy TTL "outwards" -- from next-to-outermost to outermost
    CopyTtlOut = 11,
    /// Copy TTL "inwards" -- from outermost to next-to-outermost
    CopyTtlIn = 12,
    /// MPLS TTL
    SetMplsTtl = 15,
    /// Decrement MPLS TTL
    DecMplsTtl = 16,
    /// Push a new VLAN tag
    PushVlan = 17,
    /// Pop the outer VLAN tag
    PopVlan = 18,
    /// Push a new MPLS tag
    PushMpls = 19,
    /// Pop the outer MPLS tag
    PopMpls = 20,
    /// Set queue id when outputting to a port
    SetQueue = 21,
    /// Apply group.
    Group = 22,
    /// IP TTL.
    SetNwTtl = 23,
    /// Decrement IP TTL.
    DecNwTtl = 24,
    /// Set a header field using OXM TLV format.
    SetField = 25,
    /// Push a new PBB service tag (I-TAG)
    PushPbb = 26,
    /// Pop the outer PBB service tag (I-TAG)
    PopPbb = 27,
}

pub const ACTION_HEADER_LEN: usize = 4;
pub const ACTION_OUTPUT_LEN: usize = 16;

/// `max_len` telling the switch to send the whole packet to the
/// controller without buffering it.
pub const CONTROLLER_MAX_LEN_NO_BUFFER: u16 = 0xffff;

#[derive(Debug, PartialEq, Clone)]
pub enum Action {
    Output { port: PortNumber, max_len: u16 },
}

impl Action {
    pub fn output(port: PortNumber) -> Self {
        Action::Output { port, max_len: 0 }
    }

    pub fn ttype(&self) -> ActionType {
        match self {
            Action::Output { .. } => ActionType::Output,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Action::Output { .. } => ACTION_OUTPUT_LEN,
        }
    }

    /// physical port this action outputs to, if any
    pub fn output_port(&self) -> Option<u32> {
        match self {
            Action::Output {
                port: PortNumber::NormalPort(port),
                ..
            } => Some(*port),
            _ => None,
        }
    }

    /// Decodes a list of actions filling exactly `bytes`.
    pub fn decode_list(bytes: &[u8]) -> Result<Vec<Action>> {
        let mut actions = Vec::new();
        let mut pos = 0;
        while pos < bytes.len() {
            let header = sub_slice(bytes, pos, ACTION_HEADER_LEN, stringify!(Action))?;
            let len = Cursor::new(&header[2..]).read_u16::<BigEndian>()? as usize;
            if len < ACTION_HEADER_LEN {
                bail!(ErrorKind::IllegalValue(len as u64, stringify!(Action)));
            }
            actions.push(Action::try_from(sub_slice(bytes, pos, len, stringify!(Action))?)?);
            pos += len;
        }
        Ok(actions)
    }
}

pub fn calc_actions_len(actions: &[Action]) -> usize {
    actions.iter().map(Action::len).sum()
}

impl<'a> TryFrom<&'a [u8]> for Action {
    type Error = Error;
    fn try_from(bytes: &'a [u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let raw_ttype = cursor.read_u16::<BigEndian>()?;
        let ttype = ActionType::from_u16(raw_ttype).ok_or_else(|| {
            Error::from(ErrorKind::UnknownValue(raw_ttype as u64, stringify!(ActionType)))
        })?;
        let len = cursor.read_u16::<BigEndian>()? as usize;
        match ttype {
            ActionType::Output => {
                if len != ACTION_OUTPUT_LEN {
                    bail!(ErrorKind::InvalidSliceLength(
                        ACTION_OUTPUT_LEN,
                        len,
                        stringify!(Action)
                    ));
                }
                let port = PortNumber::try_from(cursor.read_u32::<BigEndian>()?)?;
                let max_len = cursor.read_u16::<BigEndian>()?;
                Ok(Action::Output { port, max_len })
            }
            other => bail!(ErrorKind::UnsupportedValue(other as u64, stringify!(ActionType))),
        }
    }
}

impl Encode for Action {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.write_u16::<BigEndian>(self.ttype() as u16)?;
        buf.write_u16::<BigEndian>(self.len() as u16)?;
        match self {
            Action::Output { port, max_len } => {
                buf.write_u32::<BigEndian>(u32::from(*port))?;
                buf.write_u16::<BigEndian>(*max_len)?;
                write_pad(buf, 6);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ds::ports::PortNo;

    #[test]
    fn output_to_controller_layout() {
        let action = Action::Output {
            port: PortNumber::Reserved(PortNo::Controller),
            max_len: CONTROLLER_MAX_LEN_NO_BUFFER,
        };
        let mut buf = Vec::new();
        action.encode(&mut buf).unwrap();
        assert_eq!(
            buf,
            vec![0, 0, 0, 16, 0xff, 0xff, 0xff, 0xfd, 0xff, 0xff, 0, 0, 0, 0, 0, 0]
        );
        assert_eq!(action.output_port(), None);
    }

    #[test]
    fn decodes_action_list() {
        let mut buf = Vec::new();
        Action::output(PortNumber::NormalPort(1)).encode(&mut buf).unwrap();
        Action::output(PortNumber::NormalPort(4)).encode(&mut buf).unwrap();
        let actions = Action::decode_list(&buf).unwrap();
        let ports: Vec<_> = actions.iter().filter_map(Action::output_port).collect();
        assert_eq!(ports, vec![1, 4]);
    }

    #[test]
    fn unsupported_action_types_are_rejected() {
        // OFPAT_POP_VLAN, len 8
        let buf = vec![0, 18, 0, 8, 0, 0, 0, 0];
        match Action::decode_list(&buf).unwrap_err().kind() {
            ErrorKind::UnsupportedValue(18, _) => (),
            other => panic!("unexpected error {:?}", other),
        }
    }
}
