//! Packet framing.
//!
//! Every message on the link, in either direction, is wrapped in the same frame.
//! Payloads of up to 255 bytes use a one-byte length prefix:
//!
//! | Field     | Size | Description |
//! |-----------|------|-------------|
//! | `start`   | 1    | [`SHORT_START`] (`0x02`). |
//! | `len`     | 1    | Payload length. |
//! | `payload` | n    | Command id followed by command data. |
//! | `crc16`   | 2    | Big-endian [`crc16`] of `payload`. |
//! | `end`     | 1    | [`END`] (`0x03`). |
//!
//! Longer payloads replace the start marker with [`LONG_START`] (`0x03`) and carry
//! a two-byte big-endian length, for a framing overhead of six bytes instead of five.

use crate::{
    END, LONG_START, SHORT_START,
    crc::crc16,
    decode::{DecodeError, DecodeErrorKind},
    encode::{Encode, EncodeError},
};

/// Largest payload that still fits a one-byte length prefix.
pub const MAX_SHORT_PAYLOAD: usize = u8::MAX as usize;

/// Largest payload that fits a two-byte length prefix.
pub const MAX_PAYLOAD: usize = u16::MAX as usize;

/// Size of the complete frame around a payload of `payload_len` bytes.
pub const fn packet_size(payload_len: usize) -> usize {
    payload_len
        + if payload_len > MAX_SHORT_PAYLOAD {
            6
        } else {
            5
        }
}

/// Writes the frame for a `payload_len` byte payload into `data`.
///
/// `payload_fn` fills in the payload region; the checksum is computed over
/// whatever it wrote.
pub(crate) fn frame_packet(payload_len: usize, data: &mut [u8], payload_fn: impl FnOnce(&mut [u8])) {
    let offset = if payload_len > MAX_SHORT_PAYLOAD {
        data[0] = LONG_START;
        (payload_len as u16).encode(&mut data[1..]);
        3
    } else {
        data[0] = SHORT_START;
        data[1] = payload_len as u8;
        2
    };
    let crc_offset = offset + payload_len;

    payload_fn(&mut data[offset..crc_offset]);

    crc16(&data[offset..crc_offset]).encode(&mut data[crc_offset..]);
    data[crc_offset + 2] = END;
}

/// A raw payload ready to be framed.
///
/// The payload must begin with the command id. Use the typed packets in
/// [`commands`](crate::commands) for the commands this crate knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    payload: &'a [u8],
}

impl<'a> Frame<'a> {
    /// Wraps a payload.
    ///
    /// # Errors
    ///
    /// Returns an [`EncodeError`] if the payload is empty or longer than
    /// [`MAX_PAYLOAD`] bytes.
    pub fn new(payload: &'a [u8]) -> Result<Self, EncodeError> {
        if payload.is_empty() {
            return Err(EncodeError::EmptyPayload);
        }
        if payload.len() > MAX_PAYLOAD {
            return Err(EncodeError::PayloadTooLarge { len: payload.len() });
        }

        Ok(Self { payload })
    }

    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }
}

impl Encode for Frame<'_> {
    fn size(&self) -> usize {
        packet_size(self.payload.len())
    }

    fn encode(&self, data: &mut [u8]) {
        frame_packet(self.payload.len(), data, |buf| buf.copy_from_slice(self.payload));
    }
}

/// Frames `payload` into `out`, returning the number of bytes written.
///
/// # Errors
///
/// Fails if the payload cannot be framed or if `out` is too small for the packet.
pub fn encode_packet(payload: &[u8], out: &mut [u8]) -> Result<usize, EncodeError> {
    let frame = Frame::new(payload)?;
    let size = frame.size();

    if out.len() < size {
        return Err(EncodeError::BufferTooSmall {
            required: size,
            available: out.len(),
        });
    }

    frame.encode(out);
    Ok(size)
}

/// Start marker and length prefix of a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// Index of the first payload byte.
    pub payload_offset: usize,
    /// Declared payload length.
    pub payload_len: usize,
}

impl PacketHeader {
    /// Parses the header at the front of `window`.
    ///
    /// Returns `Ok(None)` while the length prefix has not been fully received.
    ///
    /// # Errors
    ///
    /// Fails if the first byte is not a start marker, if the declared payload is
    /// empty, or if the whole packet would not fit in `capacity` bytes. The last
    /// check keeps a corrupted length prefix from stalling the receiver while it
    /// waits for data that will never arrive.
    pub fn parse(window: &[u8], capacity: usize) -> Result<Option<Self>, DecodeError> {
        let Some(&start) = window.first() else {
            return Ok(None);
        };

        let header = match start {
            SHORT_START => {
                let Some(&len) = window.get(1) else {
                    return Ok(None);
                };
                Self {
                    payload_offset: 2,
                    payload_len: len as usize,
                }
            }
            LONG_START => {
                let Some(len) = window.get(1..3) else {
                    return Ok(None);
                };
                Self {
                    payload_offset: 3,
                    payload_len: u16::from_be_bytes([len[0], len[1]]) as usize,
                }
            }
            _ => return Err(DecodeError::new::<Self>(DecodeErrorKind::InvalidHeader)),
        };

        if header.payload_len == 0 {
            return Err(DecodeError::new::<Self>(DecodeErrorKind::EmptyPayload));
        }

        let size = header.packet_size();
        if size > capacity {
            return Err(DecodeError::new::<Self>(DecodeErrorKind::Oversized {
                size,
                capacity,
            }));
        }

        Ok(Some(header))
    }

    /// Size of the whole packet, including framing.
    pub fn packet_size(&self) -> usize {
        self.payload_offset + self.payload_len + 3
    }
}

/// A validated packet at the front of a receive window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet<'a> {
    payload: &'a [u8],
    size: usize,
}

impl<'a> Packet<'a> {
    /// Payload bytes, starting with the command id.
    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    /// Command id of the payload.
    pub fn command(&self) -> u8 {
        self.payload[0]
    }

    /// Number of window bytes the packet occupies.
    pub fn size(&self) -> usize {
        self.size
    }
}

/// Decodes the packet at the front of `window`.
///
/// `capacity` bounds the declared packet size (see [`PacketHeader::parse`]).
///
/// # Errors
///
/// - [`DecodeErrorKind::UnexpectedEnd`] if the window does not yet hold the whole packet.
/// - [`DecodeErrorKind::UnexpectedByte`] if the end marker is wrong. The checksum is
///   not computed in that case.
/// - [`DecodeErrorKind::Checksum`] if the CRC16 does not match the payload.
/// - Any header error from [`PacketHeader::parse`].
pub fn decode_packet(window: &[u8], capacity: usize) -> Result<Packet<'_>, DecodeError> {
    let header = PacketHeader::parse(window, capacity)?
        .ok_or_else(|| DecodeError::new::<Packet>(DecodeErrorKind::UnexpectedEnd))?;

    let size = header.packet_size();
    let packet = window
        .get(..size)
        .ok_or_else(|| DecodeError::new::<Packet>(DecodeErrorKind::UnexpectedEnd))?;

    let end = packet[size - 1];
    if end != END {
        return Err(DecodeError::new::<Packet>(DecodeErrorKind::UnexpectedByte {
            name: "end",
            value: end,
            expected: &[END],
        }));
    }

    let crc_offset = header.payload_offset + header.payload_len;
    let payload = &packet[header.payload_offset..crc_offset];

    let expected = crc16(payload);
    let value = u16::from_be_bytes([packet[crc_offset], packet[crc_offset + 1]]);
    if value != expected {
        return Err(DecodeError::new::<Packet>(DecodeErrorKind::Checksum {
            value,
            expected,
        }));
    }

    Ok(Packet { payload, size })
}
