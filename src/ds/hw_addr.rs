use std::fmt;

use super::super::err::*;

/// length of ethernet address in bytes (6)
pub const ETHERNET_ADDRESS_LENGTH: usize = 6;

/// 48-bit IEEE 802 MAC address.
#[derive(PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord, Default)]
pub struct MacAddr(pub [u8; ETHERNET_ADDRESS_LENGTH]);

impl MacAddr {
    pub const BROADCAST: MacAddr = MacAddr([0xff; ETHERNET_ADDRESS_LENGTH]);

    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        if slice.len() < ETHERNET_ADDRESS_LENGTH {
            bail!(ErrorKind::InvalidSliceLength(
                ETHERNET_ADDRESS_LENGTH,
                slice.len(),
                stringify!(MacAddr),
            ));
        }
        let mut addr = [0u8; ETHERNET_ADDRESS_LENGTH];
        addr.copy_from_slice(&slice[..ETHERNET_ADDRESS_LENGTH]);
        Ok(MacAddr(addr))
    }

    pub fn octets(&self) -> [u8; ETHERNET_ADDRESS_LENGTH] {
        self.0
    }

    pub fn is_broadcast(&self) -> bool {
        *self == MacAddr::BROADCAST
    }

    /// group bit set (includes broadcast)
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let o = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

impl fmt::Debug for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl From<[u8; ETHERNET_ADDRESS_LENGTH]> for MacAddr {
    fn from(octets: [u8; ETHERNET_ADDRESS_LENGTH]) -> Self {
        MacAddr(octets)
    }
}
