use tracing::trace;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::constant::MAX_PAYLOAD_LEN;
use crate::error::{Error, Result};

/// MySQL packet header (zero-copy)
///
/// Layout matches MySQL wire protocol:
/// - length: 3 bytes (little-endian, payload length)
/// - sequence_id: 1 byte
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable, IntoBytes)]
pub struct PacketHeader {
    pub length: [u8; 3],
    pub sequence_id: u8,
}

impl PacketHeader {
    pub fn encode(length: usize, sequence_id: u8) -> Self {
        let len = u32::to_le_bytes(length as u32);
        Self {
            length: [len[0], len[1], len[2]],
            sequence_id,
        }
    }

    pub fn length(&self) -> usize {
        u32::from_le_bytes([self.length[0], self.length[1], self.length[2], 0]) as usize
    }

    /// Returns `None` if fewer than 4 bytes are available
    pub fn peek(data: &[u8]) -> Option<&Self> {
        Self::ref_from_prefix(data).ok().map(|(header, _)| header)
    }
}

/// One logical packet: the payload of one or more physical frames
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Sequence number of the first frame
    pub sequence_id: u8,
    /// Number of physical frames the payload was reassembled from
    pub frames: usize,
    pub payload: Vec<u8>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Framed {
    Packet(Packet),
    NeedMoreData,
}

/// Reassembles logical packets from a byte stream.
///
/// Only complete frames are removed from the input. A frame whose payload is exactly
/// `MAX_PAYLOAD_LEN` long is held until the frame that ends the packet arrives.
#[derive(Debug, Default)]
pub struct PacketFramer {
    partial: Option<Packet>,
}

impl PacketFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether continuation frames are buffered waiting for the rest of the packet
    pub fn has_partial(&self) -> bool {
        self.partial.is_some()
    }

    /// Drop a partially reassembled packet
    pub fn reset(&mut self) {
        self.partial = None;
    }

    pub fn decode(&mut self, src: &mut Vec<u8>) -> Result<Framed> {
        let mut consumed = 0;
        let result = loop {
            let Some(header) = PacketHeader::peek(&src[consumed..]) else {
                break Framed::NeedMoreData;
            };
            let length = header.length();
            let sequence_id = header.sequence_id;
            let start = consumed + 4;
            let Some(frame) = src.get(start..start + length) else {
                break Framed::NeedMoreData;
            };
            consumed = start + length;
            trace!(length, sequence_id, "frame");

            let packet = match self.partial.take() {
                None => Packet {
                    sequence_id,
                    frames: 1,
                    payload: frame.to_vec(),
                },
                Some(mut packet) => {
                    let expected = packet.sequence_id.wrapping_add(packet.frames as u8);
                    if sequence_id != expected {
                        src.drain(..consumed);
                        return Err(Error::PacketOutOfOrder {
                            expected,
                            actual: sequence_id,
                        });
                    }
                    packet.frames += 1;
                    packet.payload.extend_from_slice(frame);
                    packet
                }
            };

            if length == MAX_PAYLOAD_LEN {
                self.partial = Some(packet);
                continue;
            }
            break Framed::Packet(packet);
        };
        src.drain(..consumed);
        Ok(result)
    }
}

/// Validates sequence numbers across the packets of one exchange
#[derive(Debug, Clone, Copy)]
pub struct Sequencer {
    expected: u8,
}

impl Sequencer {
    pub fn new(base: u8) -> Self {
        Self { expected: base }
    }

    pub fn expected(&self) -> u8 {
        self.expected
    }

    pub fn check(&mut self, packet: &Packet) -> Result<()> {
        if packet.sequence_id != self.expected {
            return Err(Error::PacketOutOfOrder {
                expected: self.expected,
                actual: packet.sequence_id,
            });
        }
        self.expected = self.expected.wrapping_add(packet.frames as u8);
        Ok(())
    }
}

/// Helper function to write packet header
#[inline]
pub fn write_packet_header(out: &mut Vec<u8>, sequence_id: u8, payload_length: usize) {
    out.extend_from_slice(PacketHeader::encode(payload_length, sequence_id).as_bytes());
}

/// Append `payload` split into frames of at most `MAX_PAYLOAD_LEN` bytes.
///
/// A payload that is an exact multiple of the frame size ends with an empty frame.
/// Returns the sequence number after the last frame.
pub fn frame_packets(out: &mut Vec<u8>, payload: &[u8], sequence_id: u8) -> u8 {
    let mut sequence_id = sequence_id;
    let mut rest = payload;
    loop {
        let (chunk, tail) = rest.split_at(rest.len().min(MAX_PAYLOAD_LEN));
        write_packet_header(out, sequence_id, chunk.len());
        out.extend_from_slice(chunk);
        sequence_id = sequence_id.wrapping_add(1);
        if chunk.len() < MAX_PAYLOAD_LEN {
            return sequence_id;
        }
        rest = tail;
    }
}
