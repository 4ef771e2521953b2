//! Implementation of the VESC UART packet protocol in Rust.
//!
//! This crate is structured around two key traits: [`Encode`] and [`Decode`].
//! Outgoing command packets implement [`Encode`], while fields of controller
//! responses implement [`Decode`]. On top of those sit the [`Framer`], which
//! reassembles validated payloads out of an unreliable byte stream, and
//! [`Telemetry`], which interprets those payloads.

#![no_std]

pub mod commands;
pub mod packet;
pub mod telemetry;

mod crc;
mod decode;
mod encode;
mod framer;
mod ring;
mod version;

pub use crc::{VESC_CRC16, crc16};
pub use decode::{Decode, DecodeError, DecodeErrorKind};
pub use encode::{Encode, EncodeError};
pub use framer::{DEFAULT_STAGING_SIZE, Framer, FramerStats};
pub use packet::{decode_packet, encode_packet};
pub use ring::RingBuffer;
pub use telemetry::{Reply, Telemetry};
pub use version::FirmwareVersion;

/// Start marker of a packet with a one-byte length prefix.
pub const SHORT_START: u8 = 0x02;

/// Start marker of a packet with a two-byte length prefix.
pub const LONG_START: u8 = 0x03;

/// Marker terminating every packet.
pub const END: u8 = 0x03;

/// Smallest possible packet: start, length, one payload byte, CRC16 and end.
pub const MIN_PACKET_SIZE: usize = 6;
