//! Connection lifecycle tests against a scripted loopback server.
//!
//! The mock accepts one connection per scripted session, performs the
//! handshake, then answers each COM_QUERY/COM_PING with the next canned
//! response stream.

// Canned payloads are tiny; every length fits the 3-byte frame field
#![allow(clippy::cast_possible_truncation)]

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use sphinxql_client::protocol::{
    PacketHeader, PacketWriter, capabilities::DEFAULT_CLIENT_FLAGS, server_status,
};
use sphinxql_client::{
    ConnectionErrorKind, Error, FieldType, SearchdConfig, SearchdConnection, Value,
};

const AUTOCOMMIT: u16 = server_status::SERVER_STATUS_AUTOCOMMIT;
const MORE: u16 = server_status::SERVER_MORE_RESULTS_EXISTS | AUTOCOMMIT;

/// One accepted connection: the canned response stream per client command.
type Script = Vec<Vec<u8>>;

fn spawn_mock(sessions: Vec<Script>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock listener");
    let addr = listener.local_addr().expect("mock listener addr");

    thread::spawn(move || {
        for script in sessions {
            let (mut stream, _) = match listener.accept() {
                Ok(pair) => pair,
                Err(_) => return,
            };
            serve_session(&mut stream, &script);
        }
    });

    addr
}

fn serve_session(stream: &mut TcpStream, script: &[Vec<u8>]) {
    stream.write_all(&handshake_packet()).expect("send handshake");
    if read_client_packet(stream).is_none() {
        return;
    }
    stream
        .write_all(&ok_packet(2, 0, AUTOCOMMIT))
        .expect("send connect ok");

    for response in script {
        match read_client_packet(stream) {
            // COM_QUIT ends the session early
            Some(cmd) if cmd.first() == Some(&0x01) => return,
            Some(_) => stream.write_all(response).expect("send response"),
            None => return,
        }
    }

    // Linger for the COM_QUIT (or EOF) that close/drop produces.
    let _ = read_client_packet(stream);
}

fn read_client_packet(stream: &mut TcpStream) -> Option<Vec<u8>> {
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).ok()?;
    let parsed = PacketHeader::parse(header);
    let mut payload = vec![0u8; parsed.payload_length as usize];
    stream.read_exact(&mut payload).ok()?;
    Some(payload)
}

fn frame(seq: u8, payload: &[u8]) -> Vec<u8> {
    let header = PacketHeader {
        payload_length: payload.len() as u32,
        sequence_id: seq,
    };
    let mut packet = header.encode().to_vec();
    packet.extend_from_slice(payload);
    packet
}

fn handshake_packet() -> Vec<u8> {
    let caps = DEFAULT_CLIENT_FLAGS;
    let mut w = PacketWriter::new();
    w.write_u8(10); // protocol version
    w.write_null_string("3.5.1 (mock searchd)");
    w.write_u32_le(7); // connection id
    w.write_bytes(b"abcdefgh"); // scramble part 1
    w.write_u8(0); // filler
    w.write_u16_le((caps & 0xFFFF) as u16);
    w.write_u8(33); // charset
    w.write_u16_le(AUTOCOMMIT);
    w.write_u16_le((caps >> 16) as u16);
    w.write_u8(0); // auth data length
    w.write_zeros(10); // reserved
    w.write_bytes(b"ijklmnopqrst\0"); // scramble part 2
    frame(0, w.as_bytes())
}

fn ok_packet(seq: u8, affected: u64, status: u16) -> Vec<u8> {
    let mut w = PacketWriter::new();
    w.write_u8(0x00);
    w.write_lenenc_int(affected);
    w.write_lenenc_int(0); // last insert id
    w.write_u16_le(status);
    w.write_u16_le(0); // warnings
    frame(seq, w.as_bytes())
}

fn eof_packet(seq: u8, status: u16) -> Vec<u8> {
    let mut w = PacketWriter::new();
    w.write_u8(0xFE);
    w.write_u16_le(0); // warnings
    w.write_u16_le(status);
    frame(seq, w.as_bytes())
}

fn err_packet(seq: u8, code: u16, message: &str) -> Vec<u8> {
    let mut w = PacketWriter::new();
    w.write_u8(0xFF);
    w.write_u16_le(code);
    w.write_bytes(b"#42000");
    w.write_bytes(message.as_bytes());
    frame(seq, w.as_bytes())
}

fn column_def_packet(seq: u8, name: &str, column_type: FieldType) -> Vec<u8> {
    let mut w = PacketWriter::new();
    w.write_lenenc_string("def");
    w.write_lenenc_string("");
    w.write_lenenc_string("idx");
    w.write_lenenc_string("idx");
    w.write_lenenc_string(name);
    w.write_lenenc_string(name);
    w.write_lenenc_int(0x0C);
    w.write_u16_le(63); // charset: binary
    w.write_u32_le(255);
    w.write_u8(column_type as u8);
    w.write_u16_le(0); // flags
    w.write_u8(0); // decimals
    w.write_u16_le(0); // filler
    frame(seq, w.as_bytes())
}

fn row_packet(seq: u8, cells: &[Option<&[u8]>]) -> Vec<u8> {
    let mut w = PacketWriter::new();
    for cell in cells {
        match cell {
            Some(raw) => w.write_lenenc_bytes(raw),
            None => w.write_u8(0xFB),
        }
    }
    frame(seq, w.as_bytes())
}

/// A complete buffered result set: column count, definitions, EOF, rows, EOF.
fn result_set(
    columns: &[(&str, FieldType)],
    rows: &[&[Option<&[u8]>]],
    final_status: u16,
) -> Vec<u8> {
    let mut stream = Vec::new();
    let mut seq = 1u8;

    let mut head = PacketWriter::new();
    head.write_lenenc_int(columns.len() as u64);
    stream.extend_from_slice(&frame(seq, head.as_bytes()));

    for (name, column_type) in columns {
        seq = seq.wrapping_add(1);
        stream.extend_from_slice(&column_def_packet(seq, name, *column_type));
    }

    seq = seq.wrapping_add(1);
    stream.extend_from_slice(&eof_packet(seq, AUTOCOMMIT));

    for row in rows {
        seq = seq.wrapping_add(1);
        stream.extend_from_slice(&row_packet(seq, row));
    }

    seq = seq.wrapping_add(1);
    stream.extend_from_slice(&eof_packet(seq, final_status));

    stream
}

fn config_for(addr: SocketAddr) -> SearchdConfig {
    SearchdConfig::new()
        .host(addr.ip().to_string())
        .port(addr.port())
        .connect_timeout(Duration::from_secs(5))
}

#[test]
fn connect_decodes_typed_columns() {
    let response = result_set(
        &[
            ("tiny_attr", FieldType::Tiny),
            ("weight", FieldType::Double),
            ("price", FieldType::NewDecimal),
            ("payload", FieldType::Blob),
            ("missing", FieldType::VarString),
        ],
        &[&[
            Some(b"7"),
            Some(b"3.5"),
            Some(b"12345678901234567890.5"),
            Some(&[b'a', 0, b'b', 0, b'c']),
            None,
        ]],
        AUTOCOMMIT,
    );
    let addr = spawn_mock(vec![vec![response]]);

    let mut conn = SearchdConnection::connect(config_for(addr)).expect("connect");
    assert!(conn.connected());
    assert_eq!(conn.server_version(), Some("3.5.1 (mock searchd)"));
    assert_eq!(conn.connection_id(), Some(7));

    let tables = conn.query("SELECT * FROM idx").expect("query");
    assert_eq!(tables.len(), 1);
    let table = &tables[0];
    assert_eq!(table.len(), 1);

    let row = &table.rows()[0];
    assert_eq!(row.get_by_name("tiny_attr"), Some(&Value::Int(7)));
    assert_eq!(row.get_by_name("weight"), Some(&Value::Double(3.5)));
    assert_eq!(
        row.get_by_name("price"),
        Some(&Value::Decimal("12345678901234567890.5".to_string()))
    );
    assert_eq!(
        row.get_by_name("payload"),
        Some(&Value::Bytes(vec![b'a', 0, b'b', 0, b'c']))
    );
    assert_eq!(row.get_by_name("missing"), Some(&Value::Null));

    assert!(conn.close());
}

#[test]
fn open_on_open_connection_is_a_no_op_and_queries_still_work() {
    let response = result_set(
        &[("id", FieldType::LongLong)],
        &[&[Some(b"1")]],
        AUTOCOMMIT,
    );
    let addr = spawn_mock(vec![vec![response]]);

    let mut conn = SearchdConnection::connect(config_for(addr)).expect("connect");
    assert!(!conn.open().expect("reopen"), "open on an open connection");

    let tables = conn.query("SELECT id FROM idx").expect("query after no-op open");
    assert_eq!(tables.len(), 1);

    assert!(conn.close());
    assert!(!conn.close());
    assert!(matches!(
        conn.execute("SELECT 1"),
        Err(Error::Connection(c)) if c.kind == ConnectionErrorKind::ClosedMisuse
    ));
}

#[test]
fn multi_statement_yields_one_table_per_select() {
    let mut response = Vec::new();
    response.extend_from_slice(&result_set(
        &[("id", FieldType::LongLong)],
        &[&[Some(b"1")]],
        MORE,
    ));
    response.extend_from_slice(&ok_packet(1, 3, MORE)); // the UPDATE
    response.extend_from_slice(&result_set(
        &[("id", FieldType::LongLong)],
        &[&[Some(b"2")]],
        AUTOCOMMIT,
    ));
    let addr = spawn_mock(vec![vec![response]]);

    let mut conn = SearchdConnection::connect(config_for(addr)).expect("connect");
    let tables = conn
        .query("SELECT 1; UPDATE idx SET x = 1 WHERE id = 1; SELECT 2")
        .expect("multi query");

    assert_eq!(tables.len(), 2, "UPDATE must not contribute a table");
    assert_eq!(tables[0].rows()[0].get_by_name("id"), Some(&Value::Int(1)));
    assert_eq!(tables[1].rows()[0].get_by_name("id"), Some(&Value::Int(2)));

    // Row shape is uniform and ordered within each table.
    for table in &tables {
        for row in table {
            let names: Vec<_> = row.column_names().collect();
            assert_eq!(names, vec!["id"]);
        }
    }
}

#[test]
fn execute_returns_last_reported_affected_rows() {
    let mut response = Vec::new();
    response.extend_from_slice(&ok_packet(1, 5, MORE));
    response.extend_from_slice(&ok_packet(2, 2, AUTOCOMMIT));
    let addr = spawn_mock(vec![vec![response]]);

    let mut conn = SearchdConnection::connect(config_for(addr)).expect("connect");
    let affected = conn
        .execute("UPDATE idx SET x = 1; DELETE FROM idx WHERE id IN (1, 2)")
        .expect("execute");
    assert_eq!(affected, 2, "last statement's count, not the sum");
}

#[test]
fn query_with_no_result_sets_is_empty() {
    let addr = spawn_mock(vec![vec![ok_packet(1, 4, AUTOCOMMIT)]]);

    let mut conn = SearchdConnection::connect(config_for(addr)).expect("connect");
    let tables = conn.query("UPDATE idx SET x = 1").expect("query");
    assert!(tables.is_empty());
}

#[test]
fn submission_failure_carries_native_diagnostics() {
    let addr = spawn_mock(vec![vec![err_packet(
        1,
        1064,
        "sphinxql: syntax error, unexpected IDENT near 'SELEKT 1'",
    )]]);

    let mut conn = SearchdConnection::connect(config_for(addr)).expect("connect");
    let err = conn.query("SELEKT 1").unwrap_err();
    match err {
        Error::Connection(c) => {
            assert_eq!(c.kind, ConnectionErrorKind::Submit);
            assert_eq!(c.code(), Some(1064));
            let pattern = regex::Regex::new(r"^.+\. Error \d+: .+$").unwrap();
            assert!(pattern.is_match(&c.to_string()), "got: {c}");
            assert!(c.to_string().starts_with("Failed to execute statement(s). Error 1064:"));
        }
        other => panic!("expected connection error, got {other:?}"),
    }
}

#[test]
fn mid_iteration_failure_discards_collected_tables() {
    let mut response = Vec::new();
    response.extend_from_slice(&result_set(
        &[("id", FieldType::LongLong)],
        &[&[Some(b"1")]],
        MORE,
    ));
    response.extend_from_slice(&err_packet(1, 1047, "unknown command"));
    let addr = spawn_mock(vec![vec![response]]);

    let mut conn = SearchdConnection::connect(config_for(addr)).expect("connect");
    let err = conn.query("SELECT 1; BROKEN").unwrap_err();
    match err {
        Error::Connection(c) => {
            assert_eq!(c.kind, ConnectionErrorKind::ResultIteration);
            assert!(c.to_string().starts_with("Query execution failed. Error 1047:"));
        }
        other => panic!("expected connection error, got {other:?}"),
    }
}

#[test]
fn ping_round_trips() {
    let addr = spawn_mock(vec![vec![ok_packet(1, 0, AUTOCOMMIT)]]);

    let mut conn = SearchdConnection::connect(config_for(addr)).expect("connect");
    conn.ping().expect("ping");
}

#[test]
fn server_refusing_connect_surfaces_handshake_error() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            let _ = stream.write_all(&err_packet(0, 1040, "maxed out connections"));
        }
    });

    let err = SearchdConnection::connect(config_for(addr)).unwrap_err();
    match err {
        Error::Connection(c) => {
            assert_eq!(c.kind, ConnectionErrorKind::Connect);
            assert_eq!(c.code(), Some(1040));
            assert!(c.to_string().starts_with("Unable to connect to searchd. Error 1040:"));
        }
        other => panic!("expected connection error, got {other:?}"),
    }
}

#[test]
fn unreachable_endpoint_fails_with_client_diagnostic() {
    // Bind then drop to get a port with nothing listening.
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("addr").port()
    };

    let config = SearchdConfig::new()
        .host("127.0.0.1")
        .port(port)
        .connect_timeout(Duration::from_secs(2));
    let err = SearchdConnection::connect(config).unwrap_err();
    match err {
        Error::Connection(c) => {
            assert_eq!(c.kind, ConnectionErrorKind::Connect);
            assert_eq!(c.code(), Some(2003));
            let pattern = regex::Regex::new(r"^Unable to connect to searchd\. Error 2003: .+$").unwrap();
            assert!(pattern.is_match(&c.to_string()), "got: {c}");
        }
        other => panic!("expected connection error, got {other:?}"),
    }
}

#[test]
fn dropping_an_open_connection_sends_quit() {
    let addr = spawn_mock(vec![vec![]]);
    {
        let conn = SearchdConnection::connect(config_for(addr)).expect("connect");
        assert!(conn.connected());
        // Dropped here while still open; the session teardown must not panic.
    }
}
