//! Response state machine.
//!
//! [`ResponseDecoder`] turns the packets of one server response into [`ServerMessage`]s, one
//! message per call. Bytes are supplied by the caller. When they run out the decoder reports
//! [`Decoded::NeedMoreData`] and resumes from the same state on the next call.

use std::sync::Arc;

use auto_impl::auto_impl;
use tracing::{debug, trace};

use crate::codec::{DecodeContext, Protocol};
use crate::constant::MAX_PAYLOAD_LEN;
use crate::error::{Error, Result};
use crate::nightly::cold_path;
use crate::opts::Opts;
use crate::protocol::column_definition::{ColumnDefinition, ColumnDefinitionBytes, ColumnDefinitions};
use crate::protocol::packet::{Framed, PacketFramer, Sequencer};
use crate::protocol::primitive::read_int_lenenc;
use crate::protocol::response::{
    ErrPayload, ErrPayloadBytes, OkPayload, OkPayloadBytes, is_ok_shaped, read_eof_packet,
};
use crate::row::Row;

/// What the next packet is expected to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// OK, ERR, LOCAL INFILE request or column count
    AwaitingHeader,
    AwaitingColumnDefinition { remaining: usize },
    /// Only without `CLIENT_DEPRECATE_EOF`
    AwaitingColumnDefinitionsEof,
    AwaitingRowOrTerminator,
    Done,
}

impl DecoderState {
    fn describe(self) -> &'static str {
        match self {
            DecoderState::AwaitingHeader => "awaiting a response header",
            DecoderState::AwaitingColumnDefinition { .. } => "awaiting a column definition",
            DecoderState::AwaitingColumnDefinitionsEof => "awaiting the end of column definitions",
            DecoderState::AwaitingRowOrTerminator => "awaiting a row",
            DecoderState::Done => "done",
        }
    }
}

/// One decoded unit of a response
#[derive(Debug)]
pub enum ServerMessage {
    /// Statement without a result set
    Ok(OkPayload),
    /// The response ends here
    ServerError(ErrPayload),
    /// The server asks for the contents of `filename`
    LocalInfile { filename: String },
    ColumnDefinition(ColumnDefinition),
    Row(Row),
    /// Result set terminator (EOF or OK)
    End(OkPayload),
}

#[derive(Debug)]
pub enum Decoded {
    NeedMoreData,
    Message(ServerMessage),
    Finished,
}

/// Event callbacks for [`ResponseDecoder::drive`]
#[auto_impl(&mut, Box)]
pub trait ResponseHandler {
    fn no_result_set(&mut self, ok: OkPayload) -> Result<()>;

    fn local_infile(&mut self, filename: &str) -> Result<()> {
        Err(Error::Unsupported(format!(
            "LOCAL INFILE request for '{filename}'"
        )))
    }

    fn column(&mut self, _column: &ColumnDefinition) -> Result<()> {
        Ok(())
    }

    fn row(&mut self, row: Row) -> Result<()>;

    fn resultset_end(&mut self, eof: OkPayload) -> Result<()>;
}

/// Collects every row and the last OK or terminator
#[derive(Debug, Default)]
pub struct CollectHandler {
    pub rows: Vec<Row>,
    pub ok: Option<OkPayload>,
}

impl ResponseHandler for CollectHandler {
    fn no_result_set(&mut self, ok: OkPayload) -> Result<()> {
        self.ok = Some(ok);
        Ok(())
    }

    fn row(&mut self, row: Row) -> Result<()> {
        self.rows.push(row);
        Ok(())
    }

    fn resultset_end(&mut self, eof: OkPayload) -> Result<()> {
        self.ok = Some(eof);
        Ok(())
    }
}

/// Decoder for one response to COM_QUERY or COM_STMT_EXECUTE
#[derive(Debug)]
pub struct ResponseDecoder {
    state: DecoderState,
    ctx: DecodeContext,
    deprecate_eof: bool,
    framer: PacketFramer,
    sequencer: Sequencer,
    pending: Vec<ColumnDefinition>,
    columns: Arc<ColumnDefinitions>,
}

impl ResponseDecoder {
    /// `base_sequence` is the sequence number of the first response packet
    pub fn new(protocol: Protocol, opts: &Opts, base_sequence: u8) -> Self {
        Self {
            state: DecoderState::AwaitingHeader,
            ctx: opts.decode_context(protocol),
            deprecate_eof: opts.deprecate_eof(),
            framer: PacketFramer::new(),
            sequencer: Sequencer::new(base_sequence),
            pending: Vec::new(),
            columns: Arc::default(),
        }
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    pub fn protocol(&self) -> Protocol {
        self.ctx.protocol
    }

    pub fn is_done(&self) -> bool {
        self.state == DecoderState::Done
    }

    /// Column definitions of the current result set, empty until all of them arrived
    pub fn columns(&self) -> &Arc<ColumnDefinitions> {
        &self.columns
    }

    /// Sequence number the next packet must carry
    pub fn next_sequence(&self) -> u8 {
        self.sequencer.expected()
    }

    fn violation(&self, byte: u8) -> Error {
        cold_path();
        Error::UnexpectedPacket {
            state: self.state.describe(),
            byte,
        }
    }

    fn server_error(&mut self, payload: &[u8]) -> Result<ServerMessage> {
        let err = ErrPayload::try_from(ErrPayloadBytes(payload))?;
        debug!(code = err.error_code, sql_state = %err.sql_state, "server error");
        self.transition(DecoderState::Done);
        Ok(ServerMessage::ServerError(err))
    }

    fn transition(&mut self, next: DecoderState) {
        trace!(from = ?self.state, to = ?next, "transition");
        self.state = next;
    }

    /// Done, or back to the header when another result follows
    fn finish_result(&mut self, ok: &OkPayload) {
        self.columns = Arc::default();
        if ok.more_results_exist() {
            self.transition(DecoderState::AwaitingHeader);
        } else {
            self.transition(DecoderState::Done);
        }
    }

    fn start_rows(&mut self) {
        self.columns = Arc::new(ColumnDefinitions::new(std::mem::take(&mut self.pending)));
        self.transition(DecoderState::AwaitingRowOrTerminator);
    }

    /// A 0xFE packet in the row stream that ends the result set.
    ///
    /// Binary rows start with 0x00, so 0xFE always terminates. A text row may start with
    /// 0xFE when its first value is at least 2^24 bytes long, which needs a payload of at
    /// least 9 bytes.
    fn is_terminator(&self, payload: &[u8]) -> bool {
        match self.ctx.protocol {
            Protocol::Binary => true,
            Protocol::Text if payload.len() < 9 => true,
            Protocol::Text => {
                self.deprecate_eof && payload.len() < MAX_PAYLOAD_LEN && is_ok_shaped(payload)
            }
        }
    }

    fn read_terminator(&self, payload: &[u8]) -> Result<OkPayload> {
        if self.deprecate_eof {
            OkPayload::try_from(OkPayloadBytes(payload))
        } else {
            Ok(OkPayload::from_eof(read_eof_packet(payload)?))
        }
    }

    /// Apply one complete packet payload.
    ///
    /// Returns `None` for packets that carry no message: the column count and the EOF after
    /// column definitions.
    pub fn decode_packet(&mut self, payload: Vec<u8>) -> Result<Option<ServerMessage>> {
        let result = self.apply(payload);
        if result.is_err() {
            self.transition(DecoderState::Done);
        }
        result
    }

    fn apply(&mut self, payload: Vec<u8>) -> Result<Option<ServerMessage>> {
        let Some(&first) = payload.first() else {
            cold_path();
            return Err(Error::InvalidPacket);
        };
        if first == 0xFF && self.state != DecoderState::Done {
            return self.server_error(&payload).map(Some);
        }

        match self.state {
            DecoderState::AwaitingHeader => match first {
                0x00 => {
                    let ok = OkPayload::try_from(OkPayloadBytes(&payload))?;
                    self.finish_result(&ok);
                    Ok(Some(ServerMessage::Ok(ok)))
                }
                0xFB => {
                    let filename = String::from_utf8_lossy(&payload[1..]).into_owned();
                    self.transition(DecoderState::Done);
                    Ok(Some(ServerMessage::LocalInfile { filename }))
                }
                _ => {
                    let (count, _) = read_int_lenenc(&payload)?;
                    let count = usize::try_from(count).map_err(|_| Error::InvalidPacket)?;
                    if count == 0 {
                        return Err(self.violation(first));
                    }
                    trace!(count, "result set");
                    self.pending = Vec::with_capacity(count.min(1024));
                    self.transition(DecoderState::AwaitingColumnDefinition { remaining: count });
                    Ok(None)
                }
            },
            DecoderState::AwaitingColumnDefinition { remaining } => {
                let column = ColumnDefinition::try_from(ColumnDefinitionBytes(&payload))?;
                self.pending.push(column.clone());
                match remaining - 1 {
                    0 if self.deprecate_eof => self.start_rows(),
                    0 => self.transition(DecoderState::AwaitingColumnDefinitionsEof),
                    remaining => {
                        self.state = DecoderState::AwaitingColumnDefinition { remaining }
                    }
                }
                Ok(Some(ServerMessage::ColumnDefinition(column)))
            }
            DecoderState::AwaitingColumnDefinitionsEof => {
                if first != 0xFE || payload.len() >= 9 {
                    return Err(self.violation(first));
                }
                self.start_rows();
                Ok(None)
            }
            DecoderState::AwaitingRowOrTerminator => {
                if first == 0xFE && self.is_terminator(&payload) {
                    let ok = self.read_terminator(&payload)?;
                    self.finish_result(&ok);
                    return Ok(Some(ServerMessage::End(ok)));
                }
                if self.ctx.protocol == Protocol::Binary && first != 0x00 {
                    return Err(self.violation(first));
                }
                let row = Row::new(payload, Arc::clone(&self.columns), self.ctx)?;
                Ok(Some(ServerMessage::Row(row)))
            }
            DecoderState::Done => Err(self.violation(first)),
        }
    }

    /// Decode the next message from `src`.
    ///
    /// Complete frames are removed from `src`. Incomplete input is left in place.
    pub fn poll(&mut self, src: &mut Vec<u8>) -> Result<Decoded> {
        loop {
            if self.state == DecoderState::Done {
                return Ok(Decoded::Finished);
            }
            let packet = match self.framer.decode(src) {
                Ok(Framed::Packet(packet)) => packet,
                Ok(Framed::NeedMoreData) => return Ok(Decoded::NeedMoreData),
                Err(e) => {
                    self.transition(DecoderState::Done);
                    return Err(e);
                }
            };
            if let Err(e) = self.sequencer.check(&packet) {
                self.transition(DecoderState::Done);
                return Err(e);
            }
            if let Some(message) = self.decode_packet(packet.payload)? {
                return Ok(Decoded::Message(message));
            }
        }
    }

    /// Feed every available message to `handler`.
    ///
    /// Returns `true` once the response is complete. A server error is returned as
    /// `Error::ServerError`.
    pub fn drive<H: ResponseHandler>(&mut self, src: &mut Vec<u8>, mut handler: H) -> Result<bool> {
        loop {
            match self.poll(src)? {
                Decoded::NeedMoreData => return Ok(false),
                Decoded::Finished => return Ok(true),
                Decoded::Message(message) => match message {
                    ServerMessage::Ok(ok) => handler.no_result_set(ok)?,
                    ServerMessage::ServerError(err) => return Err(Error::ServerError(err)),
                    ServerMessage::LocalInfile { filename } => handler.local_infile(&filename)?,
                    ServerMessage::ColumnDefinition(column) => handler.column(&column)?,
                    ServerMessage::Row(row) => handler.row(row)?,
                    ServerMessage::End(eof) => handler.resultset_end(eof)?,
                },
            }
        }
    }

    /// Stop decoding this response.
    ///
    /// Buffered continuation frames and pending column definitions are dropped. Bytes still
    /// in the caller's input belong to this response and should be discarded or drained by
    /// the caller.
    #[tracing::instrument(skip_all)]
    pub fn abandon(&mut self) {
        debug!(
            state = ?self.state,
            partial = self.framer.has_partial(),
            "abandoning response"
        );
        self.framer.reset();
        self.pending.clear();
        self.columns = Arc::default();
        self.state = DecoderState::Done;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constant::{CapabilityFlags, ServerStatusFlags};

    fn opts(deprecate_eof: bool) -> Opts {
        let mut opts = Opts::default();
        opts.capabilities
            .set(CapabilityFlags::CLIENT_DEPRECATE_EOF, deprecate_eof);
        opts
    }

    fn ok_packet(header: u8, status: ServerStatusFlags) -> Vec<u8> {
        let mut payload = vec![header, 0, 0];
        payload.extend_from_slice(&status.bits().to_le_bytes());
        payload.extend_from_slice(&[0, 0]);
        payload
    }

    #[test]
    fn test_ok_without_result_set() {
        let mut decoder = ResponseDecoder::new(Protocol::Text, &opts(true), 1);
        let message = decoder
            .decode_packet(ok_packet(0x00, ServerStatusFlags::SERVER_STATUS_AUTOCOMMIT))
            .unwrap();
        assert!(matches!(message, Some(ServerMessage::Ok(_))));
        assert!(decoder.is_done());
    }

    #[test]
    fn test_zero_column_count_is_violation() {
        let mut decoder = ResponseDecoder::new(Protocol::Text, &opts(true), 1);
        // 0xFC 0x00 0x00 encodes zero columns
        let err = decoder.decode_packet(vec![0xFC, 0x00, 0x00]).unwrap_err();
        assert!(matches!(err, Error::UnexpectedPacket { byte: 0xFC, .. }));
        assert!(decoder.is_done());
    }

    #[test]
    fn test_local_infile() {
        let mut decoder = ResponseDecoder::new(Protocol::Text, &opts(true), 1);
        let mut payload = vec![0xFB];
        payload.extend_from_slice(b"/tmp/data.csv");
        let Some(ServerMessage::LocalInfile { filename }) = decoder.decode_packet(payload).unwrap()
        else {
            panic!("expected a LOCAL INFILE request");
        };
        assert_eq!(filename, "/tmp/data.csv");
        assert!(decoder.is_done());
    }

    #[test]
    fn test_packet_after_done_is_violation() {
        let mut decoder = ResponseDecoder::new(Protocol::Text, &opts(true), 1);
        decoder
            .decode_packet(ok_packet(0x00, ServerStatusFlags::empty()))
            .unwrap();
        assert!(matches!(
            decoder.decode_packet(ok_packet(0x00, ServerStatusFlags::empty())),
            Err(Error::UnexpectedPacket { state: "done", .. })
        ));
    }

    #[test]
    fn test_text_row_starting_with_fe_is_a_row() {
        let decoder = ResponseDecoder::new(Protocol::Text, &opts(true), 1);
        // first value claims 2^24 or more bytes: only possible in a full-size packet
        let mut row = vec![0xFE];
        row.extend_from_slice(&(MAX_PAYLOAD_LEN as u64 + 1).to_le_bytes());
        row.resize(MAX_PAYLOAD_LEN, b'x');
        assert!(!decoder.is_terminator(&row));
        assert!(decoder.is_terminator(&ok_packet(0xFE, ServerStatusFlags::empty())));
    }

    #[test]
    fn test_abandon() {
        let mut decoder = ResponseDecoder::new(Protocol::Binary, &opts(true), 1);
        decoder.decode_packet(vec![0x02]).unwrap();
        decoder.abandon();
        assert!(decoder.is_done());
        assert!(decoder.columns().is_empty());
        let mut src = vec![1, 0, 0, 2, 0x00];
        assert!(matches!(decoder.poll(&mut src).unwrap(), Decoded::Finished));
    }
}
