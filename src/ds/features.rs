use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::convert::TryFrom;
use std::io::{Cursor, Seek, SeekFrom};

use super::super::err::*;
use super::{write_pad, Encode};

pub const FEATURES_LENGTH: usize = 24;

/// Body of OFPT_FEATURES_REPLY.
#[derive(Debug, PartialEq, Clone)]
pub struct SwitchFeatures {
    pub datapath_id: u64,
    pub n_buffers: u32,
    pub n_tables: u8,
    pub auxiliary_id: u8,
    //pad 2 bytes
    pub capabilities: Capabilities,
    pub reserved: u32,
}

impl<'a> TryFrom<&'a [u8]> for SwitchFeatures {
    type Error = Error;
    fn try_from(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() < FEATURES_LENGTH {
            bail!(ErrorKind::InvalidSliceLength(
                FEATURES_LENGTH,
                bytes.len(),
                stringify!(SwitchFeatures),
            ));
        }
        let mut cursor = Cursor::new(bytes);

        let datapath_id = cursor.read_u64::<BigEndian>()?;
        let n_buffers = cursor.read_u32::<BigEndian>()?;
        let n_tables = cursor.read_u8()?;
        let auxiliary_id = cursor.read_u8()?;
        cursor.seek(SeekFrom::Current(2))?; // pad 2 bytes
        let capabilities = Capabilities::from_bits_truncate(cursor.read_u32::<BigEndian>()?);
        let reserved = cursor.read_u32::<BigEndian>()?;

        Ok(SwitchFeatures {
            datapath_id,
            n_buffers,
            n_tables,
            auxiliary_id,
            capabilities,
            reserved,
        })
    }
}

impl Encode for SwitchFeatures {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.write_u64::<BigEndian>(self.datapath_id)?;
        buf.write_u32::<BigEndian>(self.n_buffers)?;
        buf.write_u8(self.n_tables)?;
        buf.write_u8(self.auxiliary_id)?;
        write_pad(buf, 2);
        buf.write_u32::<BigEndian>(self.capabilities.bits())?;
        buf.write_u32::<BigEndian>(self.reserved)?;
        Ok(())
    }
}

bitflags! {
    /* Capabilities supported by the datapath. */
    pub struct Capabilities: u32 {
        /// Flow statistics.
        const FLOW_STATS = 1 << 0;
        /// Table statistics.
        const TABLE_STATS = 1 << 1;
        /// Port statistics.
        const PORT_STATS = 1 << 2;
        /// Group statistics.
        const GROUP_STATS = 1 << 3;
        /// Can reassemble IP fragments.
        const IP_REASM = 1 << 5;
        /// Queue statistics.
        const QUEUE_STATS = 1 << 6;
        /// Switch will block looping ports.
        const PORT_BLOCKED = 1 << 8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_datapath_id_and_capabilities() {
        let bytes = [
            0, 0, 0, 0, 0, 0, 0, 0x2a, // datapath id
            0, 0, 1, 0, // n_buffers
            254, 0, 0, 0, // n_tables, aux id, pad
            0, 0, 0x01, 0x07, // capabilities
            0, 0, 0, 0,
        ];
        let features = SwitchFeatures::try_from(&bytes[..]).unwrap();
        assert_eq!(features.datapath_id, 42);
        assert_eq!(features.n_buffers, 256);
        assert_eq!(features.n_tables, 254);
        assert!(features.capabilities.contains(Capabilities::PORT_BLOCKED));
        assert!(features.capabilities.contains(Capabilities::FLOW_STATS));
    }

    #[test]
    fn short_body_is_rejected() {
        assert!(SwitchFeatures::try_from(&[0u8; 10][..]).is_err());
    }
}
