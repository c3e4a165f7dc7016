//! Length-prefixed framing of OpenFlow messages on a byte stream.
//!
//! A stream can fail in two ways. A frame whose header is sound but whose
//! body cannot be understood is `MalformedMessage`: the frame is consumed and
//! the stream stays usable. A header that cannot be trusted to delimit the
//! next frame is `FramingCorruption`, after which nothing more can be read.

use byteorder::{BigEndian, ByteOrder};
use num_traits::FromPrimitive;
use std::convert::TryFrom;

use super::super::err::*;
use super::{Encode, Header, OfMsg, OfPayload, Version, HEADER_LENGTH};

/// Largest frame the 16 bit length field can describe.
pub const MAX_FRAME_LENGTH: usize = u16::MAX as usize;

/// Result of a decode attempt on a buffer.
#[derive(Debug, PartialEq)]
pub enum Decoded {
    /// a message and the number of bytes it occupied
    Message(OfMsg, usize),
    NeedMoreData,
}

/// Total length of the frame at the front of `bytes`, once its header is in.
fn frame_length(bytes: &[u8]) -> Result<Option<usize>> {
    if bytes.len() < HEADER_LENGTH {
        return Ok(None);
    }
    if Version::from_u8(bytes[0]).is_none() {
        bail!(ErrorKind::FramingCorruption(format!(
            "unknown version byte 0x{:02x}",
            bytes[0]
        )));
    }
    let length = BigEndian::read_u16(&bytes[2..4]) as usize;
    if length < HEADER_LENGTH {
        bail!(ErrorKind::FramingCorruption(format!(
            "declared length {} is shorter than the header",
            length
        )));
    }
    Ok(Some(length))
}

/// Decodes one complete frame. `frame` is exactly the declared length.
fn decode_frame(frame: &[u8]) -> Result<OfMsg> {
    let header = Header::try_from(frame)
        .chain_err(|| ErrorKind::MalformedMessage("unreadable header".to_string()))?;
    let payload = OfPayload::decode(header.ttype(), &frame[HEADER_LENGTH..]).chain_err(|| {
        ErrorKind::MalformedMessage(format!(
            "{:?} body of {} bytes (xid {})",
            header.ttype(),
            frame.len() - HEADER_LENGTH,
            header.xid()
        ))
    })?;
    Ok(OfMsg::new(header, payload))
}

/// Decodes the first message in `bytes`.
pub fn decode(bytes: &[u8]) -> Result<Decoded> {
    let length = match frame_length(bytes)? {
        Some(length) if bytes.len() >= length => length,
        _ => return Ok(Decoded::NeedMoreData),
    };
    let msg = decode_frame(&bytes[..length])?;
    Ok(Decoded::Message(msg, length))
}

/// Size of the frame `payload` would be sent in.
pub fn encoded_len(payload: &OfPayload) -> Result<usize> {
    let mut body = Vec::new();
    payload.encode(&mut body)?;
    Ok(HEADER_LENGTH + body.len())
}

/// Serialises a message, filling in the header length.
pub fn encode(msg: &OfMsg) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    msg.payload().encode(&mut body)?;
    let total = HEADER_LENGTH + body.len();
    if total > MAX_FRAME_LENGTH {
        bail!(ErrorKind::FrameTooLarge(total));
    }

    let header = Header::new(
        msg.header().version(),
        msg.payload().ttype(),
        total as u16,
        msg.header().xid(),
    );
    let mut buf = Vec::with_capacity(total);
    header.encode(&mut buf)?;
    buf.extend_from_slice(&body);
    Ok(buf)
}

/// Accumulates stream reads and yields whole messages.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        FrameDecoder::default()
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// bytes received but not yet returned as a message
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Next complete message, `None` while a frame is still partial.
    ///
    /// A `MalformedMessage` error has already consumed its frame, so the
    /// caller may keep calling. After `FramingCorruption` the decoder is
    /// unusable.
    pub fn next_frame(&mut self) -> Result<Option<OfMsg>> {
        let length = match frame_length(&self.buf)? {
            Some(length) if self.buf.len() >= length => length,
            _ => return Ok(None),
        };
        let frame: Vec<u8> = self.buf.drain(..length).collect();
        decode_frame(&frame).map(Some)
    }

    /// Called at end of stream.
    pub fn finish(&self) -> Result<()> {
        if self.buf.is_empty() {
            Ok(())
        } else {
            bail!(ErrorKind::FramingCorruption(format!(
                "stream ended inside a frame ({} bytes buffered)",
                self.buf.len()
            )))
        }
    }
}
