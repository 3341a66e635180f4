use tracing::trace;
use zerocopy::IntoBytes;

use crate::constant::MAX_PAYLOAD_LEN;
use crate::protocol::packet::{PacketHeader, frame_packets};

/// Reusable buffers for one outbound message
#[derive(Debug)]
pub struct BufferSet {
    /// Outbound payload.
    /// It always has at least 4 bytes which is reserved for the first packet header.
    /// Layout: [4-byte header space][payload that is possibly larger than 16MB]
    write_buffer: Vec<u8>,

    /// Framed copy of a payload too large for one frame
    frame_buffer: Vec<u8>,
}

impl BufferSet {
    pub fn new() -> Self {
        Self {
            write_buffer: vec![0; 4],
            frame_buffer: Vec::new(),
        }
    }

    /// Clear the write buffer, reserve 4 bytes for the header, and return mutable access.
    #[inline]
    pub fn new_write_buffer(&mut self) -> &mut Vec<u8> {
        self.write_buffer.clear();
        self.write_buffer.extend_from_slice(&[0u8; 4]);
        &mut self.write_buffer
    }

    #[inline]
    pub fn write_buffer(&self) -> &[u8] {
        &self.write_buffer
    }

    #[inline]
    pub fn payload_len(&self) -> usize {
        self.write_buffer.len().saturating_sub(4)
    }

    /// Frame the payload for sending.
    ///
    /// A payload that fits one frame gets its header written into the reserved space and is
    /// returned in place. Larger payloads are split into a separate buffer. Returns the bytes
    /// to send and the next sequence number.
    #[tracing::instrument(skip_all)]
    pub fn frame(&mut self, sequence_id: u8) -> (&[u8], u8) {
        let payload_len = self.payload_len();
        if payload_len < MAX_PAYLOAD_LEN {
            let header = PacketHeader::encode(payload_len, sequence_id);
            if let Some(reserved) = self.write_buffer.get_mut(..4) {
                reserved.copy_from_slice(header.as_bytes());
            }
            trace!(payload_len, sequence_id, "single frame");
            return (&self.write_buffer, sequence_id.wrapping_add(1));
        }
        self.frame_buffer.clear();
        let payload = self.write_buffer.get(4..).unwrap_or_default();
        let next = frame_packets(&mut self.frame_buffer, payload, sequence_id);
        trace!(
            payload_len,
            frames = next.wrapping_sub(sequence_id),
            "split frames"
        );
        (&self.frame_buffer, next)
    }
}

impl Default for BufferSet {
    fn default() -> Self {
        Self::new()
    }
}
