use log::{debug, trace};

use crate::{
    LONG_START, MIN_PACKET_SIZE, SHORT_START,
    decode::DecodeErrorKind,
    packet::{PacketHeader, decode_packet},
};

/// Staging buffer size used when none is given.
pub const DEFAULT_STAGING_SIZE: usize = 128;

/// Counters describing what a [`Framer`] has seen so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FramerStats {
    /// Packets that passed the end marker and checksum checks.
    pub packets: u64,
    /// Candidate packets rejected for a bad end marker or length prefix.
    pub framing_errors: u64,
    /// Candidate packets rejected for a bad checksum.
    pub checksum_errors: u64,
    /// Candidate packets whose declared size exceeded the staging buffer.
    pub oversized: u64,
    /// Bytes dropped while searching for a packet start.
    pub discarded_bytes: u64,
}

#[inline]
const fn is_start(byte: u8) -> bool {
    byte == SHORT_START || byte == LONG_START
}

/// Incremental packet reassembler.
///
/// Bytes are fed one at a time as the transport yields them. While the staging
/// buffer is empty the framer is *seeking* and drops every byte that cannot start
/// a packet. Once a start marker arrives, bytes are *accumulated* until the
/// declared packet size is reached, at which point the packet is validated.
///
/// A packet that fails validation does not cost the whole buffer. The framer
/// drops bytes only up to the next `0x02`/`0x03` in the buffer and retries from
/// there. The same applies to a length prefix declaring more than `N` bytes,
/// which is rejected as soon as it is received.
///
/// `N` is the staging buffer capacity and bounds the largest accepted packet.
#[derive(Debug, Clone)]
pub struct Framer<const N: usize = DEFAULT_STAGING_SIZE> {
    buf: [u8; N],
    len: usize,
    stats: FramerStats,
}

impl<const N: usize> Framer<N> {
    pub const fn new() -> Self {
        const { assert!(N >= MIN_PACKET_SIZE, "Staging buffer cannot hold a packet") };

        Self {
            buf: [0; N],
            len: 0,
            stats: FramerStats {
                packets: 0,
                framing_errors: 0,
                checksum_errors: 0,
                oversized: 0,
                discarded_bytes: 0,
            },
        }
    }

    /// Number of bytes held in the staging buffer.
    pub fn buffered(&self) -> usize {
        self.len
    }

    /// Returns `true` while no packet start has been seen.
    pub fn is_seeking(&self) -> bool {
        self.len == 0
    }

    pub fn stats(&self) -> FramerStats {
        self.stats
    }

    /// Drops everything buffered and goes back to seeking.
    pub fn reset(&mut self) {
        self.len = 0;
    }

    /// Feeds one byte, calling `on_packet` with the payload of every packet it completes.
    ///
    /// Returns the number of packets delivered, which can exceed one when a
    /// resynchronization uncovers packets that were already buffered.
    pub fn push(&mut self, byte: u8, mut on_packet: impl FnMut(&[u8])) -> usize {
        if self.len == N {
            self.stats.framing_errors += 1;
            self.resync();
        }

        if self.len == 0 && !is_start(byte) {
            trace!("Dropping byte {:#04x} while seeking packet start", byte);
            self.stats.discarded_bytes += 1;
            return 0;
        }

        self.buf[self.len] = byte;
        self.len += 1;

        self.process(&mut on_packet)
    }

    /// Feeds a run of bytes. See [`push`](Framer::push).
    pub fn extend(&mut self, bytes: &[u8], mut on_packet: impl FnMut(&[u8])) -> usize {
        bytes
            .iter()
            .map(|&byte| self.push(byte, &mut on_packet))
            .sum()
    }

    fn process(&mut self, on_packet: &mut impl FnMut(&[u8])) -> usize {
        let mut delivered = 0;

        while self.len > 0 {
            // Bytes left behind a consumed packet are noise until the next start marker.
            let noise = self.buf[..self.len]
                .iter()
                .position(|&b| is_start(b))
                .unwrap_or(self.len);
            if noise > 0 {
                trace!("Dropping {} bytes while seeking packet start", noise);
                self.discard(noise);
                continue;
            }

            let header = match PacketHeader::parse(&self.buf[..self.len], N) {
                Ok(Some(header)) => header,
                Ok(None) => break,
                Err(e) => {
                    debug!("Resynchronizing after bad header: {}", e);
                    if matches!(e.kind(), DecodeErrorKind::Oversized { .. }) {
                        self.stats.oversized += 1;
                    } else {
                        self.stats.framing_errors += 1;
                    }
                    self.resync();
                    continue;
                }
            };

            if self.len < MIN_PACKET_SIZE || self.len < header.packet_size() {
                break;
            }

            match decode_packet(&self.buf[..self.len], N) {
                Ok(packet) => {
                    let size = packet.size();
                    on_packet(packet.payload());

                    self.stats.packets += 1;
                    delivered += 1;
                    self.consume(size);
                }
                Err(e) => {
                    debug!("Resynchronizing after rejected packet: {}", e);
                    if matches!(e.kind(), DecodeErrorKind::Checksum { .. }) {
                        self.stats.checksum_errors += 1;
                    } else {
                        self.stats.framing_errors += 1;
                    }
                    self.resync();
                }
            }
        }

        delivered
    }

    /// Drops bytes up to the next candidate start marker after index 0, or
    /// everything if there is none.
    fn resync(&mut self) {
        match self.buf[1..self.len].iter().position(|&b| is_start(b)) {
            Some(offset) => self.discard(offset + 1),
            None => self.discard(self.len),
        }
    }

    fn discard(&mut self, count: usize) {
        self.stats.discarded_bytes += count as u64;
        self.consume(count);
    }

    fn consume(&mut self, count: usize) {
        self.buf.copy_within(count..self.len, 0);
        self.len -= count;
    }
}

impl<const N: usize> Default for Framer<N> {
    fn default() -> Self {
        Self::new()
    }
}
