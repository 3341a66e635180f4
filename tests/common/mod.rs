//! Hand-built server packets

#![allow(dead_code)]

use zero_mysql_codec::constant::{ColumnFlags, ColumnType, ServerStatusFlags};
use zero_mysql_codec::protocol::packet::frame_packets;
use zero_mysql_codec::protocol::primitive::{write_bytes_lenenc, write_int_lenenc, write_lenenc_null};
use zero_mysql_codec::{Decoded, ResponseDecoder, ServerMessage};

/// Server-to-client byte stream with consecutive sequence ids
pub struct Wire {
    pub bytes: Vec<u8>,
    seq: u8,
}

impl Wire {
    pub fn new(seq: u8) -> Self {
        Self {
            bytes: Vec::new(),
            seq,
        }
    }

    pub fn packet(&mut self, payload: &[u8]) -> &mut Self {
        self.seq = frame_packets(&mut self.bytes, payload, self.seq);
        self
    }

    pub fn column_count(&mut self, count: u64) -> &mut Self {
        let mut payload = Vec::new();
        write_int_lenenc(&mut payload, count);
        self.packet(&payload)
    }

    pub fn column(&mut self, name: &str, column_type: ColumnType, flags: ColumnFlags) -> &mut Self {
        self.packet(&column_definition(name, column_type, flags))
    }

    pub fn text_row(&mut self, values: &[Option<&str>]) -> &mut Self {
        let mut payload = Vec::new();
        for value in values {
            match value {
                Some(value) => write_bytes_lenenc(&mut payload, value.as_bytes()),
                None => write_lenenc_null(&mut payload),
            }
        }
        self.packet(&payload)
    }

    pub fn eof(&mut self, status: ServerStatusFlags) -> &mut Self {
        let mut payload = vec![0xFE, 0, 0];
        payload.extend_from_slice(&status.bits().to_le_bytes());
        self.packet(&payload)
    }

    pub fn ok(&mut self, header: u8, affected_rows: u64, status: ServerStatusFlags) -> &mut Self {
        self.packet(&ok_payload(header, affected_rows, status, ""))
    }

    pub fn ok_with_info(
        &mut self,
        header: u8,
        affected_rows: u64,
        status: ServerStatusFlags,
        info: &str,
    ) -> &mut Self {
        self.packet(&ok_payload(header, affected_rows, status, info))
    }

    pub fn err(&mut self, code: u16, sql_state: &str, message: &str) -> &mut Self {
        let mut payload = vec![0xFF];
        payload.extend_from_slice(&code.to_le_bytes());
        payload.push(b'#');
        payload.extend_from_slice(sql_state.as_bytes());
        payload.extend_from_slice(message.as_bytes());
        self.packet(&payload)
    }

    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.bytes)
    }
}

pub fn ok_payload(
    header: u8,
    affected_rows: u64,
    status: ServerStatusFlags,
    info: &str,
) -> Vec<u8> {
    let mut payload = vec![header];
    write_int_lenenc(&mut payload, affected_rows);
    write_int_lenenc(&mut payload, 0);
    payload.extend_from_slice(&status.bits().to_le_bytes());
    payload.extend_from_slice(&[0, 0]);
    payload.extend_from_slice(info.as_bytes());
    payload
}

pub fn column_definition(name: &str, column_type: ColumnType, flags: ColumnFlags) -> Vec<u8> {
    let mut payload = Vec::new();
    for field in ["def", "test", "t", "t", name, name] {
        write_bytes_lenenc(&mut payload, field.as_bytes());
    }
    let charset: u16 = if column_type.is_string() || column_type.is_blob() {
        45
    } else {
        63
    };
    payload.push(0x0c);
    payload.extend_from_slice(&charset.to_le_bytes());
    payload.extend_from_slice(&20u32.to_le_bytes());
    payload.push(column_type as u8);
    payload.extend_from_slice(&flags.bits().to_le_bytes());
    payload.push(0);
    payload.extend_from_slice(&[0, 0]);
    payload
}

/// Route decoder traces to the test output
pub fn init_tracing() {
    // another test may have installed it already
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing_subscriber::filter::LevelFilter::TRACE)
        .try_init();
}

/// Poll until the response is finished. Panics if the input runs out first.
pub fn collect(decoder: &mut ResponseDecoder, src: &mut Vec<u8>) -> Vec<ServerMessage> {
    let mut messages = Vec::new();
    loop {
        match decoder.poll(src).unwrap() {
            Decoded::Message(message) => messages.push(message),
            Decoded::Finished => return messages,
            Decoded::NeedMoreData => panic!("response ended early"),
        }
    }
}

pub fn kind(message: &ServerMessage) -> &'static str {
    match message {
        ServerMessage::Ok(_) => "ok",
        ServerMessage::ServerError(_) => "error",
        ServerMessage::LocalInfile { .. } => "local_infile",
        ServerMessage::ColumnDefinition(_) => "column",
        ServerMessage::Row(_) => "row",
        ServerMessage::End(_) => "end",
    }
}

pub fn kinds(messages: &[ServerMessage]) -> Vec<&'static str> {
    messages.iter().map(kind).collect()
}
