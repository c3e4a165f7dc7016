use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use num_traits::FromPrimitive;
use std::convert::TryFrom;
use std::io::{Cursor, Seek, SeekFrom};

use super::super::err::*;
use super::hw_addr::MacAddr;
use super::{sub_slice, write_pad, Encode};

/// A port as it appears in match fields and actions: either a physical
/// port number or one of the reserved logical ports.
#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy)]
pub enum PortNumber {
    Reserved(PortNo),
    NormalPort(u32),
}

impl PortNumber {
    pub fn is_reserved(&self) -> bool {
        matches!(self, PortNumber::Reserved(_))
    }
}

impl TryFrom<u32> for PortNumber {
    type Error = Error;
    fn try_from(port_no: u32) -> Result<Self> {
        if port_no == 0 {
            bail!(ErrorKind::IllegalValue(0, stringify!(PortNumber)));
        }
        Ok(match PortNo::from_u32(port_no) {
            Some(port) => PortNumber::Reserved(port),
            None => PortNumber::NormalPort(port_no),
        })
    }
}

impl From<PortNumber> for u32 {
    fn from(port: PortNumber) -> u32 {
        match port {
            PortNumber::Reserved(port_no) => port_no as u32,
            PortNumber::NormalPort(port_no) => port_no,
        }
    }
}

/// Port numbering. Ports are numbered starting from 1.
#[repr(u32)]
#[derive(Primitive, PartialEq, Eq, Hash, Debug, Clone, Copy)]
pub enum PortNo {
    /* Maximum number of physical and logical switch ports. */
    Max = 0xffffff00u32,
    /* Reserved OpenFlow Port (fake output "ports"). */
    /// Send the packet out the input port. This
    /// reserved port must be explicitly used
    /// in order to send back out of the input
    /// port.
    InPort = 0xfffffff8u32,
    /// Submit the packet to the first flow table
    /// NB: This destination port can only be
    /// used in packet-out messages.
    Table = 0xfffffff9u32,
    /// Process with normal L2/L3 switching.
    Normal = 0xfffffffau32,
    /// All physical ports in VLAN, except input
    /// port and those blocked or link down.
    Flood = 0xfffffffbu32,
    /// All physical ports except input port.
    All = 0xfffffffcu32,
    /// Send to controller.
    Controller = 0xfffffffdu32,
    /// Local openflow "port".
    Local = 0xfffffffeu32,
    /// Wildcard port used only for flow mod
    /// (delete) and flow stats requests. Selects
    /// all flows regardless of output port
    /// (including flows with no output port).
    Any = 0xffffffffu32,
}

/// Physical ports are numbered below `PortNo::Max`.
pub fn is_physical(port_no: u32) -> bool {
    port_no != 0 && port_no < PortNo::Max as u32
}

/// Size of an `ofp_port` description.
pub const PORT_LENGTH: usize = 64;
const PORT_NAME_LENGTH: usize = 16;

/// Description of a switch port (`ofp_port`).
#[derive(Debug, PartialEq, Clone)]
pub struct Port {
    pub port_no: u32,
    //pad 4 bytes
    pub hw_addr: MacAddr,
    //pad 2 bytes
    pub name: String,
    pub config: PortConfig,
    pub state: PortState,
    pub curr: PortFeatures,
    pub advertised: PortFeatures,
    pub supported: PortFeatures,
    pub peer: PortFeatures,
    pub curr_speed: u32,
    pub max_speed: u32,
}

impl Port {
    /// Administratively up and link up.
    pub fn is_up(&self) -> bool {
        !self.config.contains(PortConfig::PORT_DOWN) && !self.state.contains(PortState::LINK_DOWN)
    }

    /// Eligible as a flood target.
    pub fn can_flood(&self) -> bool {
        self.is_up()
            && is_physical(self.port_no)
            && !self.config.contains(PortConfig::NO_FWD)
            && !self.state.contains(PortState::BLOCKED)
    }
}

impl<'a> TryFrom<&'a [u8]> for Port {
    type Error = Error;
    fn try_from(bytes: &'a [u8]) -> Result<Self> {
        let bytes = sub_slice(bytes, 0, PORT_LENGTH, stringify!(Port))?;
        let mut cursor = Cursor::new(bytes);
        let port_no = cursor.read_u32::<BigEndian>()?;
        cursor.seek(SeekFrom::Current(4))?; // pad 4 bytes
        let hw_addr = MacAddr::from_slice(&bytes[8..14])?;
        let raw_name = &bytes[16..16 + PORT_NAME_LENGTH];
        let name_len = raw_name
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(PORT_NAME_LENGTH);
        let name = String::from_utf8_lossy(&raw_name[..name_len]).into_owned();
        cursor.seek(SeekFrom::Start(32))?;

        Ok(Port {
            port_no,
            hw_addr,
            name,
            config: PortConfig::from_bits_truncate(cursor.read_u32::<BigEndian>()?),
            state: PortState::from_bits_truncate(cursor.read_u32::<BigEndian>()?),
            curr: PortFeatures::from_bits_truncate(cursor.read_u32::<BigEndian>()?),
            advertised: PortFeatures::from_bits_truncate(cursor.read_u32::<BigEndian>()?),
            supported: PortFeatures::from_bits_truncate(cursor.read_u32::<BigEndian>()?),
            peer: PortFeatures::from_bits_truncate(cursor.read_u32::<BigEndian>()?),
            curr_speed: cursor.read_u32::<BigEndian>()?,
            max_speed: cursor.read_u32::<BigEndian>()?,
        })
    }
}

impl Encode for Port {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.write_u32::<BigEndian>(self.port_no)?;
        write_pad(buf, 4);
        buf.extend_from_slice(&self.hw_addr.octets());
        write_pad(buf, 2);
        let mut name = [0u8; PORT_NAME_LENGTH];
        // keep a terminating NUL
        let len = self.name.len().min(PORT_NAME_LENGTH - 1);
        name[..len].copy_from_slice(&self.name.as_bytes()[..len]);
        buf.extend_from_slice(&name);
        buf.write_u32::<BigEndian>(self.config.bits())?;
        buf.write_u32::<BigEndian>(self.state.bits())?;
        buf.write_u32::<BigEndian>(self.curr.bits())?;
        buf.write_u32::<BigEndian>(self.advertised.bits())?;
        buf.write_u32::<BigEndian>(self.supported.bits())?;
        buf.write_u32::<BigEndian>(self.peer.bits())?;
        buf.write_u32::<BigEndian>(self.curr_speed)?;
        buf.write_u32::<BigEndian>(self.max_speed)?;
        Ok(())
    }
}

bitflags! {
    /// Flags to indicate behavior of the physical port.
    pub struct PortConfig: u32 {
        /// Port is administratively down.
        const PORT_DOWN = 1 << 0;
        /// Drop all packets received by port.
        const NO_RECV = 1 << 2;
        /// Drop packets forwarded to port.
        const NO_FWD = 1 << 5;
        /// Do not send packet-in msgs for port.
        const NO_PACKET_IN = 1 << 6;
    }
}

bitflags! {
    /// Current state of the physical port.
    pub struct PortState: u32 {
        /// No physical link present.
        const LINK_DOWN = 1 << 0;
        /// Port is blocked.
        const BLOCKED = 1 << 1;
        /// Live for Fast Failover Group.
        const LIVE = 1 << 2;
    }
}

bitflags! {
    /// Features of ports available in a datapath.
    pub struct PortFeatures: u32 {
        const RATE_10MB_HD = 1 << 0;
        const RATE_10MB_FD = 1 << 1;
        const RATE_100MB_HD = 1 << 2;
        const RATE_100MB_FD = 1 << 3;
        const RATE_1GB_HD = 1 << 4;
        const RATE_1GB_FD = 1 << 5;
        const RATE_10GB_FD = 1 << 6;
        const RATE_40GB_FD = 1 << 7;
        const RATE_100GB_FD = 1 << 8;
        const RATE_1TB_FD = 1 << 9;
        const OTHER = 1 << 10;
        const COPPER = 1 << 11;
        const FIBER = 1 << 12;
        const AUTONEG = 1 << 13;
        const PAUSE = 1 << 14;
        const PAUSE_ASYM = 1 << 15;
    }
}

#[cfg(test)]
pub(crate) fn test_port(port_no: u32, up: bool) -> Port {
    Port {
        port_no,
        hw_addr: MacAddr([0x0a, 0, 0, 0, 0, port_no as u8]),
        name: format!("s1-eth{}", port_no),
        config: PortConfig::empty(),
        state: if up {
            PortState::LIVE
        } else {
            PortState::LINK_DOWN
        },
        curr: PortFeatures::RATE_10GB_FD | PortFeatures::COPPER,
        advertised: PortFeatures::empty(),
        supported: PortFeatures::empty(),
        peer: PortFeatures::empty(),
        curr_speed: 10_000_000,
        max_speed: 0,
    }
}
