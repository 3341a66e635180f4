mod common;

use common::{Wire, collect, init_tracing, kinds};
use pretty_assertions::assert_eq;
use zero_mysql_codec::constant::{
    CapabilityFlags, ColumnFlags, ColumnType, MAX_PAYLOAD_LEN, ServerStatusFlags,
};
use zero_mysql_codec::error::Error;
use zero_mysql_codec::protocol::CollectHandler;
use zero_mysql_codec::protocol::primitive::write_bytes_lenenc;
use zero_mysql_codec::{Decoded, Opts, Protocol, ResponseDecoder, ServerMessage};

fn opts(deprecate_eof: bool) -> Opts {
    let mut opts = Opts::default();
    opts.capabilities
        .set(CapabilityFlags::CLIENT_DEPRECATE_EOF, deprecate_eof);
    opts
}

fn users(wire: &mut Wire) -> &mut Wire {
    wire.column_count(3)
        .column("id", ColumnType::MYSQL_TYPE_LONG, ColumnFlags::NOT_NULL_FLAG)
        .column("name", ColumnType::MYSQL_TYPE_VAR_STRING, ColumnFlags::empty())
        .column("note", ColumnType::MYSQL_TYPE_VAR_STRING, ColumnFlags::empty())
}

fn user_rows(wire: &mut Wire) -> &mut Wire {
    wire.text_row(&[Some("1"), Some("alice"), None])
        .text_row(&[Some("2"), Some("bob"), Some("hi")])
}

#[test]
fn text_result_set_with_eof_packets() {
    let mut wire = Wire::new(1);
    users(&mut wire).eof(ServerStatusFlags::empty());
    user_rows(&mut wire).eof(ServerStatusFlags::SERVER_STATUS_AUTOCOMMIT);
    let mut src = wire.take();

    let mut decoder = ResponseDecoder::new(Protocol::Text, &opts(false), 1);
    let messages = collect(&mut decoder, &mut src);
    assert_eq!(
        kinds(&messages),
        ["column", "column", "column", "row", "row", "end"]
    );
    assert!(src.is_empty());
    // count, 3 columns, EOF, 2 rows, EOF
    assert_eq!(decoder.next_sequence(), 9);

    let mut messages = messages.into_iter();
    let Some(ServerMessage::ColumnDefinition(first)) = messages.next() else {
        panic!("expected a column definition");
    };
    assert_eq!(first.name_alias, "id");
    assert_eq!(first.schema, "test");

    let Some(ServerMessage::Row(mut row)) = messages.nth(2) else {
        panic!("expected a row");
    };
    assert_eq!(row.get::<i32>(0).unwrap(), 1);
    assert_eq!(row.get::<String>(1).unwrap(), "alice");
    assert_eq!(row.get::<Option<String>>(2).unwrap(), None);

    let Some(ServerMessage::Row(mut row)) = messages.next() else {
        panic!("expected a row");
    };
    assert_eq!(row.get_by_name::<String>("note").unwrap(), "hi");

    let Some(ServerMessage::End(end)) = messages.next() else {
        panic!("expected the terminator");
    };
    assert!(
        end.status_flags
            .contains(ServerStatusFlags::SERVER_STATUS_AUTOCOMMIT)
    );
}

#[test]
fn text_result_set_with_ok_terminator() {
    let mut wire = Wire::new(1);
    users(&mut wire);
    user_rows(&mut wire).ok(0xFE, 0, ServerStatusFlags::SERVER_STATUS_IN_TRANS);
    let mut src = wire.take();

    let mut decoder = ResponseDecoder::new(Protocol::Text, &opts(true), 1);
    let messages = collect(&mut decoder, &mut src);
    assert_eq!(
        kinds(&messages),
        ["column", "column", "column", "row", "row", "end"]
    );
    let Some(ServerMessage::End(end)) = messages.last() else {
        panic!("expected the terminator");
    };
    assert!(
        end.status_flags
            .contains(ServerStatusFlags::SERVER_STATUS_IN_TRANS)
    );
    assert_eq!(decoder.columns().len(), 0);
}

#[test]
fn columns_available_while_reading_rows() {
    let mut wire = Wire::new(1);
    users(&mut wire);
    let mut src = wire.take();

    let mut decoder = ResponseDecoder::new(Protocol::Text, &opts(true), 1);
    for _ in 0..3 {
        assert!(matches!(
            decoder.poll(&mut src).unwrap(),
            Decoded::Message(ServerMessage::ColumnDefinition(_))
        ));
    }
    assert!(matches!(
        decoder.poll(&mut src).unwrap(),
        Decoded::NeedMoreData
    ));
    assert_eq!(decoder.columns().len(), 3);
    assert_eq!(decoder.columns().index_of("NAME"), Some(1));
}

#[test]
fn server_error_ends_response() {
    let mut src = Wire::new(1)
        .err(1064, "42000", "You have an error in your SQL syntax")
        .take();

    let mut decoder = ResponseDecoder::new(Protocol::Text, &opts(true), 1);
    let Decoded::Message(ServerMessage::ServerError(err)) = decoder.poll(&mut src).unwrap() else {
        panic!("expected a server error");
    };
    assert_eq!(err.error_code, 1064);
    assert_eq!(err.sql_state, "42000");
    assert_eq!(err.message, "You have an error in your SQL syntax");
    assert!(matches!(
        decoder.poll(&mut src).unwrap(),
        Decoded::Finished
    ));
}

#[test]
fn server_error_between_rows() {
    let mut wire = Wire::new(1);
    wire.column_count(1)
        .column("n", ColumnType::MYSQL_TYPE_LONGLONG, ColumnFlags::empty())
        .text_row(&[Some("1")])
        .err(1317, "70100", "Query execution was interrupted");
    let mut src = wire.take();

    let mut decoder = ResponseDecoder::new(Protocol::Text, &opts(true), 1);
    let messages = collect(&mut decoder, &mut src);
    assert_eq!(kinds(&messages), ["column", "row", "error"]);
    assert!(decoder.is_done());
}

#[test]
fn multiple_results() {
    init_tracing();
    let mut wire = Wire::new(1);
    wire.ok(0x00, 3, ServerStatusFlags::SERVER_MORE_RESULTS_EXISTS)
        .column_count(1)
        .column("n", ColumnType::MYSQL_TYPE_LONGLONG, ColumnFlags::empty())
        .text_row(&[Some("42")])
        .ok(0xFE, 0, ServerStatusFlags::SERVER_MORE_RESULTS_EXISTS)
        .ok(0x00, 0, ServerStatusFlags::empty());
    let mut src = wire.take();

    let mut decoder = ResponseDecoder::new(Protocol::Text, &opts(true), 1);
    let messages = collect(&mut decoder, &mut src);
    assert_eq!(kinds(&messages), ["ok", "column", "row", "end", "ok"]);
    let Some(ServerMessage::Ok(first)) = messages.first() else {
        panic!("expected an OK");
    };
    assert_eq!(first.affected_rows, 3);
    assert!(src.is_empty());
}

#[test]
fn byte_at_a_time() {
    init_tracing();
    let mut wire = Wire::new(1);
    users(&mut wire).eof(ServerStatusFlags::empty());
    user_rows(&mut wire).eof(ServerStatusFlags::empty());
    let input = wire.take();

    let mut decoder = ResponseDecoder::new(Protocol::Text, &opts(false), 1);
    let mut src = Vec::new();
    let mut messages = Vec::new();
    let mut need_more = 0;
    for byte in input {
        src.push(byte);
        loop {
            match decoder.poll(&mut src).unwrap() {
                Decoded::Message(message) => messages.push(message),
                Decoded::NeedMoreData => {
                    need_more += 1;
                    break;
                }
                Decoded::Finished => break,
            }
        }
    }
    assert!(decoder.is_done());
    assert!(need_more > 0);
    assert_eq!(
        kinds(&messages),
        ["column", "column", "column", "row", "row", "end"]
    );
}

#[test]
fn sequence_mismatch() {
    let mut src = Wire::new(2)
        .ok(0x00, 0, ServerStatusFlags::empty())
        .take();

    let mut decoder = ResponseDecoder::new(Protocol::Text, &opts(true), 1);
    assert!(matches!(
        decoder.poll(&mut src),
        Err(Error::PacketOutOfOrder {
            expected: 1,
            actual: 2
        })
    ));
    assert!(decoder.is_done());
}

#[test]
fn missing_eof_after_columns() {
    let mut wire = Wire::new(1);
    wire.column_count(1)
        .column("n", ColumnType::MYSQL_TYPE_LONGLONG, ColumnFlags::empty())
        .text_row(&[Some("1")]);
    let mut src = wire.take();

    let mut decoder = ResponseDecoder::new(Protocol::Text, &opts(false), 1);
    assert!(matches!(
        decoder.poll(&mut src).unwrap(),
        Decoded::Message(ServerMessage::ColumnDefinition(_))
    ));
    assert!(matches!(
        decoder.poll(&mut src),
        Err(Error::UnexpectedPacket { .. })
    ));
    assert!(decoder.is_done());
}

#[test]
fn binary_result_set() {
    let mut wire = Wire::new(1);
    wire.column_count(2)
        .column("id", ColumnType::MYSQL_TYPE_LONGLONG, ColumnFlags::empty())
        .column("name", ColumnType::MYSQL_TYPE_VAR_STRING, ColumnFlags::empty());

    let mut row = vec![0x00, 0x00];
    row.extend_from_slice(&7i64.to_le_bytes());
    write_bytes_lenenc(&mut row, b"hey");
    wire.packet(&row);

    // column 1 NULL: bit 1 + 2
    let mut row = vec![0x00, 0b0000_1000];
    row.extend_from_slice(&8i64.to_le_bytes());
    wire.packet(&row);

    wire.ok(0xFE, 0, ServerStatusFlags::empty());
    let mut src = wire.take();

    let mut decoder = ResponseDecoder::new(Protocol::Binary, &opts(true), 1);
    let messages = collect(&mut decoder, &mut src);
    assert_eq!(kinds(&messages), ["column", "column", "row", "row", "end"]);

    let mut rows = messages.into_iter().filter_map(|message| match message {
        ServerMessage::Row(row) => Some(row),
        _ => None,
    });
    let mut first = rows.next().unwrap();
    assert_eq!(first.get::<String>(1).unwrap(), "hey");
    assert_eq!(first.get::<i64>(0).unwrap(), 7);
    let mut second = rows.next().unwrap();
    assert_eq!(second.get::<i64>(0).unwrap(), 8);
    assert_eq!(second.get::<Option<String>>(1).unwrap(), None);
}

#[test]
fn binary_row_with_bad_header() {
    let mut wire = Wire::new(1);
    wire.column_count(1)
        .column("id", ColumnType::MYSQL_TYPE_LONGLONG, ColumnFlags::empty())
        .packet(&[0x03, 0x00, 1, 0, 0, 0, 0, 0, 0, 0]);
    let mut src = wire.take();

    let mut decoder = ResponseDecoder::new(Protocol::Binary, &opts(true), 1);
    assert!(matches!(
        decoder.poll(&mut src).unwrap(),
        Decoded::Message(ServerMessage::ColumnDefinition(_))
    ));
    assert!(matches!(
        decoder.poll(&mut src),
        Err(Error::UnexpectedPacket { byte: 0x03, .. })
    ));
}

#[test]
fn row_spanning_continuation_frames() {
    let big = "x".repeat(MAX_PAYLOAD_LEN);
    let mut wire = Wire::new(1);
    wire.column_count(1)
        .column("doc", ColumnType::MYSQL_TYPE_LONG_BLOB, ColumnFlags::empty())
        .text_row(&[Some(big.as_str())])
        .ok(0xFE, 0, ServerStatusFlags::empty());
    let mut src = wire.take();

    let mut decoder = ResponseDecoder::new(Protocol::Text, &opts(true), 1);
    let messages = collect(&mut decoder, &mut src);
    assert_eq!(kinds(&messages), ["column", "row", "end"]);
    // count, column, 2 row frames, terminator
    assert_eq!(decoder.next_sequence(), 6);

    let Some(ServerMessage::Row(mut row)) = messages.into_iter().nth(1) else {
        panic!("expected a row");
    };
    assert_eq!(row.raw(0).unwrap().map(<[u8]>::len), Some(MAX_PAYLOAD_LEN));
}

#[test]
fn text_row_starting_with_fe_is_not_a_terminator() {
    // the first value needs the 8-byte length prefix, which starts with 0xFE
    let big = "y".repeat(1 << 24);
    let mut wire = Wire::new(1);
    wire.column_count(1)
        .column("doc", ColumnType::MYSQL_TYPE_LONG_BLOB, ColumnFlags::empty())
        .text_row(&[Some(big.as_str())])
        .ok(0xFE, 0, ServerStatusFlags::empty());
    let mut src = wire.take();

    let mut decoder = ResponseDecoder::new(Protocol::Text, &opts(true), 1);
    let messages = collect(&mut decoder, &mut src);
    assert_eq!(kinds(&messages), ["column", "row", "end"]);
    let Some(ServerMessage::Row(row)) = messages.into_iter().nth(1) else {
        panic!("expected a row");
    };
    assert_eq!(row.payload().first(), Some(&0xFE));
}

#[test]
fn long_ok_terminator() {
    // affected_rows needs a 3-byte lenenc, which pushes the OK past 9 bytes
    let mut wire = Wire::new(1);
    wire.column_count(1)
        .column("n", ColumnType::MYSQL_TYPE_LONGLONG, ColumnFlags::empty())
        .text_row(&[Some("5")])
        .ok_with_info(0xFE, 300, ServerStatusFlags::SERVER_STATUS_AUTOCOMMIT, "info text");
    let mut src = wire.take();

    let mut decoder = ResponseDecoder::new(Protocol::Text, &opts(true), 1);
    let messages = collect(&mut decoder, &mut src);
    assert_eq!(kinds(&messages), ["column", "row", "end"]);
    let Some(ServerMessage::End(end)) = messages.last() else {
        panic!("expected the terminator");
    };
    assert_eq!(end.affected_rows, 300);
    assert_eq!(end.info, "info text");
}

#[test]
fn long_fe_packet_without_ok_shape_is_a_row() {
    // 0xFF cannot start a lenenc integer, so this is no OK packet
    let mut packet = vec![0xFE];
    packet.extend_from_slice(&[0xFF; 8]);
    packet.extend_from_slice(b"xyz");

    for deprecate_eof in [true, false] {
        let mut wire = Wire::new(1);
        wire.column_count(1)
            .column("doc", ColumnType::MYSQL_TYPE_LONG_BLOB, ColumnFlags::empty());
        if !deprecate_eof {
            wire.eof(ServerStatusFlags::empty());
        }
        wire.packet(&packet);
        let mut src = wire.take();

        let mut decoder = ResponseDecoder::new(Protocol::Text, &opts(deprecate_eof), 1);
        assert!(matches!(
            decoder.poll(&mut src).unwrap(),
            Decoded::Message(ServerMessage::ColumnDefinition(_))
        ));
        let Decoded::Message(ServerMessage::Row(mut row)) = decoder.poll(&mut src).unwrap() else {
            panic!("expected a row");
        };
        assert!(matches!(row.raw(0), Err(Error::UnexpectedEof)));
        assert!(!decoder.is_done());
    }
}

#[test]
fn long_ok_shaped_packet_is_a_row_without_deprecate_eof() {
    // a 3-byte value behind an 8-byte length prefix
    let mut packet = vec![0xFE];
    packet.extend_from_slice(&3u64.to_le_bytes());
    packet.extend_from_slice(b"abc");

    let mut wire = Wire::new(1);
    wire.column_count(1)
        .column("doc", ColumnType::MYSQL_TYPE_LONG_BLOB, ColumnFlags::empty())
        .eof(ServerStatusFlags::empty())
        .packet(&packet)
        .eof(ServerStatusFlags::empty());
    let mut src = wire.take();

    let mut decoder = ResponseDecoder::new(Protocol::Text, &opts(false), 1);
    let messages = collect(&mut decoder, &mut src);
    assert_eq!(kinds(&messages), ["column", "row", "end"]);
    let Some(ServerMessage::Row(mut row)) = messages.into_iter().nth(1) else {
        panic!("expected a row");
    };
    assert_eq!(row.raw(0).unwrap(), Some(&b"abc"[..]));
}

#[test]
fn drive_collects_rows() {
    let mut wire = Wire::new(1);
    users(&mut wire);
    user_rows(&mut wire).ok(0xFE, 0, ServerStatusFlags::empty());
    let mut input = wire.take();
    let last = input.split_off(input.len() - 1);

    let mut decoder = ResponseDecoder::new(Protocol::Text, &opts(true), 1);
    let mut handler = CollectHandler::default();
    assert!(!decoder.drive(&mut input, &mut handler).unwrap());
    assert_eq!(handler.rows.len(), 2);
    assert!(handler.ok.is_none());

    input.extend_from_slice(&last);
    assert!(decoder.drive(&mut input, &mut handler).unwrap());
    assert!(handler.ok.is_some());
    assert_eq!(handler.rows[1].get::<i64>(0).unwrap(), 2);
}

#[test]
fn drive_reports_server_error() {
    let mut src = Wire::new(1)
        .err(1146, "42S02", "Table 'test.t' doesn't exist")
        .take();

    let mut decoder = ResponseDecoder::new(Protocol::Text, &opts(true), 1);
    let mut handler = CollectHandler::default();
    let Err(Error::ServerError(err)) = decoder.drive(&mut src, &mut handler) else {
        panic!("expected a server error");
    };
    assert_eq!(err.error_code, 1146);
    assert!(decoder.is_done());
}

#[test]
fn drive_rejects_local_infile_by_default() {
    let mut src = Wire::new(1).packet(b"\xfbdata.csv").take();

    let mut decoder = ResponseDecoder::new(Protocol::Text, &opts(true), 1);
    let mut handler = CollectHandler::default();
    assert!(matches!(
        decoder.drive(&mut src, &mut handler),
        Err(Error::Unsupported(_))
    ));
}

#[test]
fn abandon_mid_result_set() {
    init_tracing();
    let big = "z".repeat(MAX_PAYLOAD_LEN);
    let mut wire = Wire::new(1);
    wire.column_count(1)
        .column("doc", ColumnType::MYSQL_TYPE_LONG_BLOB, ColumnFlags::empty())
        .text_row(&[Some("a")])
        .text_row(&[Some(big.as_str())]);
    let mut src = wire.take();
    // keep the first frame of the large row only
    src.truncate(src.len() - 8);

    let mut decoder = ResponseDecoder::new(Protocol::Text, &opts(true), 1);
    assert_eq!(kinds(&[
        unwrap_message(decoder.poll(&mut src).unwrap()),
        unwrap_message(decoder.poll(&mut src).unwrap()),
    ]), ["column", "row"]);
    assert!(matches!(
        decoder.poll(&mut src).unwrap(),
        Decoded::NeedMoreData
    ));

    decoder.abandon();
    assert!(decoder.is_done());
    assert!(decoder.columns().is_empty());
    assert!(matches!(
        decoder.poll(&mut src).unwrap(),
        Decoded::Finished
    ));
}

fn unwrap_message(decoded: Decoded) -> ServerMessage {
    match decoded {
        Decoded::Message(message) => message,
        other => panic!("expected a message, got {other:?}"),
    }
}
