use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use num_traits::FromPrimitive;
use std::convert::TryFrom;
use std::io::Cursor;

use super::super::err::*;
use super::actions::{calc_actions_len, Action};
use super::{sub_slice, write_pad, Encode};

#[derive(Primitive, Debug, PartialEq, Clone, Copy)]
pub enum InstructionType {
    /// Setup the next table in the lookup pipeline
    GotoTable = 1,
    /// Setup the metadata field for use later in pipeline
    WriteMetadata = 2,
    /// Write the action(s) onto the datapath action set
    WriteActions = 3,
    /// Applies the action(s) immediately
    ApplyActions = 4,
    /// Clears all actions from the datapath
    /// action set
    ClearActions = 5,
    /// Apply meter (rate limiter)
    Meter = 6,
    /// Experimenter instruction
    Experimenter = 0xFFFF,
}

/// type + len + 4 bytes padding
pub const INSTRUCTION_ACTIONS_HEADER_LEN: usize = 8;

#[derive(Debug, PartialEq, Clone)]
pub enum Instruction {
    ApplyActions(Vec<Action>),
}

impl Instruction {
    pub fn ttype(&self) -> InstructionType {
        match self {
            Instruction::ApplyActions(_) => InstructionType::ApplyActions,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Instruction::ApplyActions(actions) => {
                INSTRUCTION_ACTIONS_HEADER_LEN + calc_actions_len(actions)
            }
        }
    }

    pub fn actions(&self) -> &[Action] {
        match self {
            Instruction::ApplyActions(actions) => actions,
        }
    }

    /// Decodes instructions filling exactly `bytes`.
    pub fn decode_list(bytes: &[u8]) -> Result<Vec<Instruction>> {
        let mut instructions = Vec::new();
        let mut pos = 0;
        while pos < bytes.len() {
            let header = sub_slice(bytes, pos, 4, stringify!(Instruction))?;
            let len = Cursor::new(&header[2..]).read_u16::<BigEndian>()? as usize;
            if len < 4 {
                bail!(ErrorKind::IllegalValue(len as u64, stringify!(Instruction)));
            }
            let slice = sub_slice(bytes, pos, len, stringify!(Instruction))?;
            instructions.push(Instruction::try_from(slice)?);
            pos += len;
        }
        Ok(instructions)
    }
}

impl<'a> TryFrom<&'a [u8]> for Instruction {
    type Error = Error;
    fn try_from(bytes: &'a [u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let raw_ttype = cursor.read_u16::<BigEndian>()?;
        let ttype = InstructionType::from_u16(raw_ttype).ok_or_else(|| {
            Error::from(ErrorKind::UnknownValue(
                raw_ttype as u64,
                stringify!(InstructionType),
            ))
        })?;
        match ttype {
            InstructionType::ApplyActions => {
                if bytes.len() < INSTRUCTION_ACTIONS_HEADER_LEN {
                    bail!(ErrorKind::InvalidSliceLength(
                        INSTRUCTION_ACTIONS_HEADER_LEN,
                        bytes.len(),
                        stringify!(Instruction),
                    ));
                }
                let actions = Action::decode_list(&bytes[INSTRUCTION_ACTIONS_HEADER_LEN..])?;
                Ok(Instruction::ApplyActions(actions))
            }
            other => bail!(ErrorKind::UnsupportedValue(
                other as u64,
                stringify!(InstructionType),
            )),
        }
    }
}

impl Encode for Instruction {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.write_u16::<BigEndian>(self.ttype() as u16)?;
        buf.write_u16::<BigEndian>(self.len() as u16)?;
        match self {
            Instruction::ApplyActions(actions) => {
                write_pad(buf, 4);
                for action in actions {
                    action.encode(buf)?;
                }
            }
        }
        Ok(())
    }
}
