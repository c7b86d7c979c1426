//! The searchd connection.
//!
//! Implements the connection lifecycle (open, close, drop) and the shared
//! execution core behind `execute` and `query`: submit SQL over COM_QUERY,
//! then walk the chained result sets the server buffers for a
//! multi-statement submission.

// Packet payloads are bounded at 16MB - 1 and always fit in u32
#![allow(clippy::cast_possible_truncation)]

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;

use sphinxql_core::{
    ColumnInfo, ConnectionError, ConnectionErrorKind, Error, Result, ResultTable, Row, Value,
};

use crate::config::SearchdConfig;
use crate::protocol::writer::build_packet_from_payload;
use crate::protocol::{
    Command, EofPacket, ErrPacket, MAX_PACKET_SIZE, OkPacket, PacketHeader, PacketReader,
    PacketType, PacketWriter, capabilities, client_errors, server_status,
};
use crate::types::{ColumnDef, FieldType, decode_value, interpolate};

const MSG_INIT: &str = "Unable to initialize client";
const MSG_CONNECT: &str = "Unable to connect to searchd";
const MSG_CLOSED: &str = "Cannot execute query on a closed connection";
const MSG_SUBMIT: &str = "Failed to execute statement(s)";
const MSG_ITERATION: &str = "Query execution failed";

/// A connection to a SphinxQL endpoint.
///
/// Fully synchronous: every operation blocks the calling thread until the
/// server responds, and `&mut self` enforces one logical caller at a time.
/// Dropping a still-open connection releases the underlying session the same
/// way `close` does.
pub struct SearchdConnection {
    config: SearchdConfig,
    /// The native session; `Some` exactly while connected.
    session: Option<Session>,
}

impl std::fmt::Debug for SearchdConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchdConnection")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("connected", &self.session.is_some())
            .finish_non_exhaustive()
    }
}

impl SearchdConnection {
    /// Create a connection in the not-connected state.
    pub fn new(config: SearchdConfig) -> Self {
        Self {
            config,
            session: None,
        }
    }

    /// Create a connection and open it immediately.
    pub fn connect(config: SearchdConfig) -> Result<Self> {
        let mut conn = Self::new(config);
        conn.open()?;
        Ok(conn)
    }

    /// Open the connection.
    ///
    /// Returns `Ok(false)` without touching the socket if already open.
    pub fn open(&mut self) -> Result<bool> {
        if self.session.is_some() {
            return Ok(false);
        }
        self.session = Some(Session::open(&self.config)?);
        Ok(true)
    }

    /// Close the connection.
    ///
    /// Returns `false` without any action if not open. Never fails: the
    /// session teardown is best-effort.
    pub fn close(&mut self) -> bool {
        self.session.take().is_some()
    }

    /// Check if the connection is open.
    pub fn connected(&self) -> bool {
        self.session.is_some()
    }

    /// The configured host.
    pub fn host(&self) -> &str {
        &self.config.host
    }

    /// The configured port.
    pub fn port(&self) -> u16 {
        self.config.port
    }

    /// Server version string from the handshake, while connected.
    pub fn server_version(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.server_version.as_str())
    }

    /// Connection id assigned by the server, while connected.
    pub fn connection_id(&self) -> Option<u32> {
        self.session.as_ref().map(|s| s.connection_id)
    }

    /// Submit one or more `;`-separated statements without capturing rows.
    ///
    /// Returns the affected-row count the server last reported for the
    /// submission. For multi-statement batches this is the final
    /// statement's count, not a sum.
    pub fn execute(&mut self, sql: &str) -> Result<u64> {
        let session = self.session.as_mut().ok_or_else(closed_error)?;
        session.send_query(sql)?;

        let mut first = true;
        loop {
            let _ = session.read_statement_result(first)?;
            first = false;
            if !session.more_results() {
                break;
            }
        }
        Ok(session.affected_rows)
    }

    /// Submit one or more `;`-separated statements and capture every result
    /// set.
    ///
    /// Each result-producing statement contributes one [`ResultTable`], in
    /// statement order; statements with no result set contribute nothing. A
    /// failure while iterating discards everything collected so far.
    pub fn query(&mut self, sql: &str) -> Result<Vec<ResultTable>> {
        let session = self.session.as_mut().ok_or_else(closed_error)?;
        session.send_query(sql)?;

        let mut tables = Vec::new();
        let mut first = true;
        loop {
            if let Some(table) = session.read_statement_result(first)? {
                tables.push(table);
            }
            first = false;
            if !session.more_results() {
                break;
            }
        }
        tracing::trace!(tables = tables.len(), "query complete");
        Ok(tables)
    }

    /// `execute` with `?`-placeholder interpolation.
    pub fn execute_with(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        self.execute(&interpolate(sql, params))
    }

    /// `query` with `?`-placeholder interpolation.
    pub fn query_with(&mut self, sql: &str, params: &[Value]) -> Result<Vec<ResultTable>> {
        self.query(&interpolate(sql, params))
    }

    /// Round-trip a COM_PING to check the session is alive.
    pub fn ping(&mut self) -> Result<()> {
        let session = self.session.as_mut().ok_or_else(closed_error)?;
        session.sequence_id = 0;

        let mut writer = PacketWriter::new();
        writer.write_u8(Command::Ping as u8);
        session.write_packet(
            writer.as_bytes(),
            ConnectionErrorKind::Disconnected,
            "Ping failed",
        )?;

        let payload = session.read_packet(ConnectionErrorKind::Disconnected, "Ping failed")?;
        if payload.first() == Some(&0x00) {
            Ok(())
        } else {
            Err(Error::Connection(ConnectionError::plain(
                ConnectionErrorKind::Disconnected,
                "Ping failed",
            )))
        }
    }
}

fn closed_error() -> Error {
    Error::Connection(ConnectionError::plain(
        ConnectionErrorKind::ClosedMisuse,
        MSG_CLOSED,
    ))
}

fn lost_connection(kind: ConnectionErrorKind, context: &str, e: &std::io::Error) -> Error {
    Error::Connection(ConnectionError::server(
        kind,
        context,
        client_errors::CR_SERVER_LOST,
        format!("Lost connection to server ({e})"),
    ))
}

/// A packet the server was not allowed to send at this point of the
/// exchange. Surfaced under the failing operation's own message.
fn malformed(kind: ConnectionErrorKind, context: &str, what: &str) -> Error {
    tracing::debug!(what, "malformed server packet");
    Error::Connection(ConnectionError::plain(kind, context))
}

/// Server handshake fields this client keeps.
#[derive(Debug)]
struct ServerHandshake {
    capabilities: u32,
    server_version: String,
    connection_id: u32,
}

/// The native session: socket plus wire-protocol state.
///
/// Exists exactly while the connection is open. Its `Drop` impl is the
/// single release routine every exit path funnels through.
struct Session {
    stream: TcpStream,
    sequence_id: u8,
    /// Negotiated client capability flags
    capabilities: u32,
    /// Status flags from the most recent OK/EOF packet
    status_flags: u16,
    /// Affected-row count the server last reported
    affected_rows: u64,
    server_version: String,
    connection_id: u32,
}

impl Drop for Session {
    fn drop(&mut self) {
        let quit = crate::protocol::build_command_packet(Command::Quit as u8, &[], 0);
        if let Err(e) = self.stream.write_all(&quit) {
            tracing::debug!(error = %e, "COM_QUIT not delivered during close");
        }
        tracing::debug!(connection_id = self.connection_id, "session closed");
    }
}

impl Session {
    /// Establish the session: TCP connect, then the credential-less
    /// handshake (empty username, zero-length auth response, no schema,
    /// multi-statement capability).
    fn open(config: &SearchdConfig) -> Result<Self> {
        let addr = config
            .endpoint()
            .to_socket_addrs()
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or_else(|| {
                Error::Connection(ConnectionError::plain(ConnectionErrorKind::Init, MSG_INIT))
            })?;

        let stream = TcpStream::connect_timeout(&addr, config.connect_timeout).map_err(|e| {
            Error::Connection(ConnectionError::server(
                ConnectionErrorKind::Connect,
                MSG_CONNECT,
                client_errors::CR_CONN_HOST_ERROR,
                format!("Can't connect to server on '{}' ({})", config.endpoint(), e),
            ))
        })?;

        stream.set_nodelay(true).ok();
        stream.set_read_timeout(Some(config.connect_timeout)).ok();
        stream.set_write_timeout(Some(config.connect_timeout)).ok();

        let mut session = Self {
            stream,
            sequence_id: 0,
            capabilities: 0,
            status_flags: 0,
            affected_rows: 0,
            server_version: String::new(),
            connection_id: 0,
        };

        let handshake = session.read_handshake()?;
        session.capabilities = capabilities::DEFAULT_CLIENT_FLAGS & handshake.capabilities;
        session.server_version = handshake.server_version;
        session.connection_id = handshake.connection_id;

        session.send_handshake_response(config)?;
        session.read_connect_result()?;

        tracing::debug!(
            server_version = %session.server_version,
            connection_id = session.connection_id,
            "connected"
        );
        Ok(session)
    }

    /// Read and parse the server's initial handshake packet.
    fn read_handshake(&mut self) -> Result<ServerHandshake> {
        let payload = self.read_packet(ConnectionErrorKind::Connect, MSG_CONNECT)?;

        // A server refusing the connection answers with ERR instead of a
        // handshake.
        if payload.first() == Some(&0xFF) {
            let err = ErrPacket::parse(&payload).ok_or_else(|| {
                malformed(
                    ConnectionErrorKind::Connect,
                    MSG_CONNECT,
                    "handshake error packet",
                )
            })?;
            return Err(Error::Connection(ConnectionError::server(
                ConnectionErrorKind::Connect,
                MSG_CONNECT,
                err.error_code,
                err.error_message,
            )));
        }

        let mut reader = PacketReader::new(&payload);
        let protocol_version = reader.read_u8().ok_or_else(|| {
            malformed(
                ConnectionErrorKind::Connect,
                MSG_CONNECT,
                "handshake protocol version",
            )
        })?;
        if protocol_version != 10 {
            return Err(Error::Connection(ConnectionError::plain(
                ConnectionErrorKind::Connect,
                format!("Unsupported handshake protocol version {protocol_version}"),
            )));
        }

        let server_version = reader.read_null_string().ok_or_else(|| {
            malformed(
                ConnectionErrorKind::Connect,
                MSG_CONNECT,
                "handshake server version",
            )
        })?;
        let connection_id = reader.read_u32_le().ok_or_else(|| {
            malformed(
                ConnectionErrorKind::Connect,
                MSG_CONNECT,
                "handshake connection id",
            )
        })?;

        // Auth plugin data part 1 and the filler byte; a credential-less
        // client never uses the scramble.
        reader.skip(9);

        let caps_lower = reader.read_u16_le().unwrap_or(0);
        let _charset = reader.read_u8();
        let _status_flags = reader.read_u16_le();
        let caps_upper = reader.read_u16_le().unwrap_or(0);
        let server_caps = u32::from(caps_lower) | (u32::from(caps_upper) << 16);
        // The rest of the packet (auth data length, reserved bytes, scramble
        // part 2, plugin name) only matters for authenticating clients.

        Ok(ServerHandshake {
            capabilities: server_caps,
            server_version,
            connection_id,
        })
    }

    /// Send the handshake response: negotiated flags, empty username,
    /// zero-length auth answer, no default schema.
    fn send_handshake_response(&mut self, config: &SearchdConfig) -> Result<()> {
        let mut writer = PacketWriter::new();

        writer.write_u32_le(self.capabilities);
        writer.write_u32_le(config.max_packet_size);
        writer.write_u8(config.charset);
        writer.write_zeros(23);
        writer.write_null_string("");
        // Zero-length auth response; doubles as the empty-string terminator
        // for pre-4.1 servers.
        writer.write_u8(0);

        self.write_packet(writer.as_bytes(), ConnectionErrorKind::Connect, MSG_CONNECT)
    }

    /// Read the packet that settles the connection attempt.
    fn read_connect_result(&mut self) -> Result<()> {
        let payload = self.read_packet(ConnectionErrorKind::Connect, MSG_CONNECT)?;
        if payload.is_empty() {
            return Err(malformed(
                ConnectionErrorKind::Connect,
                MSG_CONNECT,
                "empty connect response",
            ));
        }

        match PacketType::classify(&payload) {
            PacketType::Ok => {
                if let Some(ok) = OkPacket::parse(&payload) {
                    self.status_flags = ok.status_flags;
                }
                Ok(())
            }
            PacketType::Error => {
                let err = ErrPacket::parse(&payload).ok_or_else(|| {
                    malformed(
                        ConnectionErrorKind::Connect,
                        MSG_CONNECT,
                        "connect error packet",
                    )
                })?;
                Err(Error::Connection(ConnectionError::server(
                    ConnectionErrorKind::Connect,
                    MSG_CONNECT,
                    err.error_code,
                    err.error_message,
                )))
            }
            // EOF here is an auth-switch request; search daemons never send
            // one and this client carries no credentials to answer it with.
            _ => Err(Error::Connection(ConnectionError::plain(
                ConnectionErrorKind::Connect,
                "Server requested an authentication exchange, which this client does not support",
            ))),
        }
    }

    /// Submit the statement text as one COM_QUERY.
    fn send_query(&mut self, sql: &str) -> Result<()> {
        self.sequence_id = 0;

        let mut writer = PacketWriter::with_capacity(1 + sql.len());
        writer.write_u8(Command::Query as u8);
        writer.write_bytes(sql.as_bytes());
        self.write_packet(writer.as_bytes(), ConnectionErrorKind::Submit, MSG_SUBMIT)
    }

    /// Whether the server announced another buffered result set.
    fn more_results(&self) -> bool {
        self.status_flags & server_status::SERVER_MORE_RESULTS_EXISTS != 0
    }

    /// Consume one statement's outcome from the stream.
    ///
    /// Returns `Some` for a decoded result set, `None` for a statement that
    /// produced none (its OK packet still updates the affected-row count and
    /// status flags). An ERR packet maps to a submission failure for the
    /// first statement and an iteration failure afterwards.
    fn read_statement_result(&mut self, first: bool) -> Result<Option<ResultTable>> {
        let (kind, context) = if first {
            (ConnectionErrorKind::Submit, MSG_SUBMIT)
        } else {
            (ConnectionErrorKind::ResultIteration, MSG_ITERATION)
        };

        let payload = self.read_packet(kind, context)?;
        if payload.is_empty() {
            return Err(malformed(kind, context, "empty statement response"));
        }

        match PacketType::classify(&payload) {
            PacketType::Ok => {
                if let Some(ok) = OkPacket::parse(&payload) {
                    self.affected_rows = ok.affected_rows;
                    self.status_flags = ok.status_flags;
                }
                Ok(None)
            }
            PacketType::Error => {
                let err = ErrPacket::parse(&payload)
                    .ok_or_else(|| malformed(kind, context, "statement error packet"))?;
                Err(Error::Connection(ConnectionError::server(
                    kind,
                    context,
                    err.error_code,
                    err.error_message,
                )))
            }
            PacketType::LocalInfile => Err(Error::Connection(ConnectionError::plain(
                kind,
                "LOCAL INFILE is not supported",
            ))),
            PacketType::Eof | PacketType::Data => self.read_result_table(&payload).map(Some),
        }
    }

    /// Decode one buffered result set: column metadata, then every row.
    fn read_result_table(&mut self, first_packet: &[u8]) -> Result<ResultTable> {
        let mut reader = PacketReader::new(first_packet);
        let column_count = reader.read_lenenc_int().ok_or_else(|| {
            malformed(
                ConnectionErrorKind::ResultIteration,
                MSG_ITERATION,
                "column count",
            )
        })? as usize;

        let mut columns = Vec::with_capacity(column_count);
        for _ in 0..column_count {
            let payload = self.read_packet(ConnectionErrorKind::ResultIteration, MSG_ITERATION)?;
            columns.push(parse_column_def(&payload)?);
        }

        // Without CLIENT_DEPRECATE_EOF the metadata block closes with an EOF
        // packet.
        if self.capabilities & capabilities::CLIENT_DEPRECATE_EOF == 0 {
            self.read_packet(ConnectionErrorKind::ResultIteration, MSG_ITERATION)?;
        }

        let info = Arc::new(ColumnInfo::new(
            columns.iter().map(|c| c.name.clone()).collect(),
        ));

        let mut rows = Vec::new();
        loop {
            let payload = self.read_packet(ConnectionErrorKind::ResultIteration, MSG_ITERATION)?;
            if payload.is_empty() {
                return Err(malformed(
                    ConnectionErrorKind::ResultIteration,
                    MSG_ITERATION,
                    "empty row packet",
                ));
            }

            match PacketType::classify(&payload) {
                PacketType::Eof => {
                    if let Some(eof) = EofPacket::parse(&payload) {
                        self.status_flags = eof.status_flags;
                    }
                    break;
                }
                PacketType::Error => {
                    let err = ErrPacket::parse(&payload).ok_or_else(|| {
                        malformed(
                            ConnectionErrorKind::ResultIteration,
                            MSG_ITERATION,
                            "row error packet",
                        )
                    })?;
                    return Err(Error::Connection(ConnectionError::server(
                        ConnectionErrorKind::ResultIteration,
                        MSG_ITERATION,
                        err.error_code,
                        err.error_message,
                    )));
                }
                // A leading 0x00 is a legitimate row whose first cell is a
                // zero-length string; rows only end at EOF since
                // CLIENT_DEPRECATE_EOF is never negotiated.
                _ => rows.push(parse_text_row(&payload, &columns, &info)),
            }
        }

        // What the server "last reported" for a SELECT is its row count.
        self.affected_rows = rows.len() as u64;

        Ok(ResultTable::new(info, rows))
    }

    /// Read one complete packet, reassembling continuation packets when the
    /// payload hits the 16MB - 1 framing limit.
    fn read_packet(&mut self, kind: ConnectionErrorKind, context: &str) -> Result<Vec<u8>> {
        let mut payload = Vec::new();
        loop {
            let mut header_buf = [0u8; 4];
            self.stream
                .read_exact(&mut header_buf)
                .map_err(|e| lost_connection(kind, context, &e))?;

            let header = PacketHeader::parse(header_buf);
            let chunk_len = header.payload_length as usize;
            self.sequence_id = header.sequence_id.wrapping_add(1);

            if chunk_len > 0 {
                let start = payload.len();
                payload.resize(start + chunk_len, 0);
                self.stream
                    .read_exact(&mut payload[start..])
                    .map_err(|e| lost_connection(kind, context, &e))?;
            }

            if chunk_len < MAX_PACKET_SIZE {
                break;
            }
        }
        Ok(payload)
    }

    /// Frame and send one packet.
    fn write_packet(
        &mut self,
        payload: &[u8],
        kind: ConnectionErrorKind,
        context: &str,
    ) -> Result<()> {
        let packet = build_packet_from_payload(payload, self.sequence_id);
        self.sequence_id = self.sequence_id.wrapping_add(1);

        self.stream
            .write_all(&packet)
            .map_err(|e| lost_connection(kind, context, &e))?;
        self.stream
            .flush()
            .map_err(|e| lost_connection(kind, context, &e))?;
        Ok(())
    }
}

/// Parse a column definition packet into its metadata.
fn parse_column_def(data: &[u8]) -> Result<ColumnDef> {
    let mut reader = PacketReader::new(data);
    let bad = |what| malformed(ConnectionErrorKind::ResultIteration, MSG_ITERATION, what);

    let catalog = reader.read_lenenc_string().ok_or_else(|| bad("column catalog"))?;
    let schema = reader.read_lenenc_string().ok_or_else(|| bad("column schema"))?;
    let table = reader.read_lenenc_string().ok_or_else(|| bad("column table"))?;
    let org_table = reader
        .read_lenenc_string()
        .ok_or_else(|| bad("column org_table"))?;
    let name = reader.read_lenenc_string().ok_or_else(|| bad("column name"))?;
    let org_name = reader
        .read_lenenc_string()
        .ok_or_else(|| bad("column org_name"))?;

    // Length of the fixed-size tail
    let _fixed_len = reader.read_lenenc_int();

    let charset = reader.read_u16_le().ok_or_else(|| bad("column charset"))?;
    let column_length = reader.read_u32_le().ok_or_else(|| bad("column length"))?;
    let column_type =
        FieldType::from_u8(reader.read_u8().ok_or_else(|| bad("column type"))?);
    let flags = reader.read_u16_le().ok_or_else(|| bad("column flags"))?;
    let decimals = reader.read_u8().ok_or_else(|| bad("column decimals"))?;

    Ok(ColumnDef {
        catalog,
        schema,
        table,
        org_table,
        name,
        org_name,
        charset,
        column_length,
        column_type,
        flags,
        decimals,
    })
}

/// Decode one text-protocol row: per cell, the 0xFB NULL marker or a
/// length-encoded byte string handed to the column's decoder.
fn parse_text_row(data: &[u8], columns: &[ColumnDef], info: &Arc<ColumnInfo>) -> Row {
    let mut reader = PacketReader::new(data);
    let mut values = Vec::with_capacity(columns.len());

    for col in columns {
        if reader.peek() == Some(0xFB) {
            reader.skip(1);
            values.push(Value::Null);
        } else if let Some(raw) = reader.read_lenenc_bytes() {
            values.push(decode_value(col.column_type, raw));
        } else {
            values.push(Value::Null);
        }
    }

    Row::with_columns(Arc::clone(info), values)
}
