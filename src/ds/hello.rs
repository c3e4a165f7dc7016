use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use num_traits::FromPrimitive;
use std::convert::TryFrom;
use std::io::Cursor;

use super::super::err::*;
use super::{sub_slice, write_pad, Encode, Version};

/// Hello element types.
#[derive(Primitive, PartialEq, Debug, Clone, Copy)]
pub enum HelloElemType {
    /// Bitmap of version supported.
    VersionBitmap = 1,
}

#[derive(Debug, PartialEq, Clone)]
pub enum HelloElement {
    VersionBitmap(Vec<u32>),
    Unknown { ttype: u16, data: Vec<u8> },
}

/// Body of OFPT_HELLO.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct Hello {
    pub elements: Vec<HelloElement>,
}

impl Hello {
    /// Hello advertising exactly the given versions.
    pub fn with_versions(versions: &[Version]) -> Self {
        let mut bitmap = vec![0u32];
        for version in versions {
            let bit = *version as usize;
            if bitmap.len() <= bit / 32 {
                bitmap.resize(bit / 32 + 1, 0);
            }
            bitmap[bit / 32] |= 1 << (bit % 32);
        }
        Hello {
            elements: vec![HelloElement::VersionBitmap(bitmap)],
        }
    }

    pub fn bitmap(&self) -> Option<&[u32]> {
        self.elements.iter().find_map(|e| match e {
            HelloElement::VersionBitmap(bitmap) => Some(&bitmap[..]),
            _ => None,
        })
    }

    /// Picks the version both sides speak. With a bitmap from the peer the
    /// result is `ours` when the peer lists it, otherwise the highest version
    /// the peer lists; without one it is the lower of the two header versions.
    pub fn negotiate(&self, header_version: Version, ours: Version) -> Version {
        match self.bitmap() {
            Some(bitmap) => {
                let listed = |v: Version| {
                    let bit = v as usize;
                    bitmap
                        .get(bit / 32)
                        .map_or(false, |word| word & (1 << (bit % 32)) != 0)
                };
                if listed(ours) {
                    return ours;
                }
                (1..=0x06u8)
                    .rev()
                    .filter_map(Version::from_u8)
                    .find(|v| listed(*v))
                    .unwrap_or(header_version)
            }
            None => header_version.min(ours),
        }
    }
}

impl<'a> TryFrom<&'a [u8]> for Hello {
    type Error = Error;
    fn try_from(bytes: &'a [u8]) -> Result<Self> {
        let mut elements = Vec::new();
        let mut pos = 0;
        // trailing bytes shorter than an element header are padding
        while pos + 4 <= bytes.len() {
            let mut cursor = Cursor::new(&bytes[pos..]);
            let ttype = cursor.read_u16::<BigEndian>()?;
            let len = cursor.read_u16::<BigEndian>()? as usize;
            if len < 4 {
                bail!(ErrorKind::IllegalValue(len as u64, stringify!(HelloElement)));
            }
            let data = sub_slice(bytes, pos + 4, len - 4, stringify!(HelloElement))?;
            let element = match HelloElemType::from_u16(ttype) {
                Some(HelloElemType::VersionBitmap) => {
                    let mut cursor = Cursor::new(data);
                    let mut bitmap = Vec::with_capacity(data.len() / 4);
                    for _ in 0..data.len() / 4 {
                        bitmap.push(cursor.read_u32::<BigEndian>()?);
                    }
                    HelloElement::VersionBitmap(bitmap)
                }
                None => HelloElement::Unknown {
                    ttype,
                    data: data.to_vec(),
                },
            };
            elements.push(element);
            pos += (len + 7) / 8 * 8;
        }
        Ok(Hello { elements })
    }
}

impl Encode for Hello {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
        for element in &self.elements {
            let (ttype, data) = match element {
                HelloElement::VersionBitmap(bitmap) => {
                    let mut data = Vec::with_capacity(bitmap.len() * 4);
                    for word in bitmap {
                        data.write_u32::<BigEndian>(*word)?;
                    }
                    (HelloElemType::VersionBitmap as u16, data)
                }
                HelloElement::Unknown { ttype, data } => (*ttype, data.clone()),
            };
            let len = 4 + data.len();
            buf.write_u16::<BigEndian>(ttype)?;
            buf.write_u16::<BigEndian>(len as u16)?;
            buf.extend_from_slice(&data);
            write_pad(buf, (len + 7) / 8 * 8 - len);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_bitmap_for_1_3() {
        let hello = Hello::with_versions(&[Version::V1_3]);
        let mut buf = Vec::new();
        hello.encode(&mut buf).unwrap();
        assert_eq!(buf, vec![0, 1, 0, 8, 0, 0, 0, 0x10]);
        assert_eq!(Hello::try_from(&buf[..]).unwrap(), hello);
    }

    #[test]
    fn negotiation_prefers_our_version_when_listed() {
        let theirs = Hello::with_versions(&[Version::V1_0, Version::V1_3, Version::V1_4]);
        assert_eq!(theirs.negotiate(Version::V1_4, Version::V1_3), Version::V1_3);
    }

    #[test]
    fn negotiation_without_our_version_yields_their_best() {
        let theirs = Hello::with_versions(&[Version::V1_0]);
        assert_eq!(theirs.negotiate(Version::V1_0, Version::V1_3), Version::V1_0);
    }

    #[test]
    fn negotiation_without_bitmap_takes_minimum() {
        let empty = Hello::default();
        assert_eq!(empty.negotiate(Version::V1_4, Version::V1_3), Version::V1_3);
        assert_eq!(empty.negotiate(Version::V1_0, Version::V1_3), Version::V1_0);
    }
}
