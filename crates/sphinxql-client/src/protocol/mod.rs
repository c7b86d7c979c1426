//! MySQL wire protocol plumbing.
//!
//! Every unit on the wire is a packet: a 3-byte little-endian payload
//! length, a 1-byte sequence number, then the payload. Payloads of
//! 16MB - 1 or more are split across packets and reassembled by the
//! reader side.

pub mod reader;
pub mod writer;

pub use reader::PacketReader;
pub use writer::{PacketWriter, build_command_packet};

/// Largest payload one packet frame can carry (2^24 - 1 bytes).
pub const MAX_PACKET_SIZE: usize = 0xFF_FF_FF;

/// Capability flag bits exchanged during the handshake.
pub mod capabilities {
    pub const CLIENT_LONG_PASSWORD: u32 = 0x0000_0001;
    pub const CLIENT_LONG_FLAG: u32 = 0x0000_0004;
    pub const CLIENT_PROTOCOL_41: u32 = 0x0000_0200;
    pub const CLIENT_SECURE_CONNECTION: u32 = 0x0000_8000;
    pub const CLIENT_MULTI_STATEMENTS: u32 = 0x0001_0000;
    pub const CLIENT_MULTI_RESULTS: u32 = 0x0002_0000;
    pub const CLIENT_DEPRECATE_EOF: u32 = 0x0100_0000;

    /// What this client asks for: the 4.1 protocol with multi-statement
    /// submission and chained result sets. No schema selection, no auth
    /// plugins, no TLS.
    pub const DEFAULT_CLIENT_FLAGS: u32 = CLIENT_LONG_PASSWORD
        | CLIENT_LONG_FLAG
        | CLIENT_PROTOCOL_41
        | CLIENT_SECURE_CONNECTION
        | CLIENT_MULTI_STATEMENTS
        | CLIENT_MULTI_RESULTS;
}

/// The command codes (COM_xxx) search daemons answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    /// Quit connection
    Quit = 0x01,
    /// Text protocol query
    Query = 0x03,
    /// Ping server
    Ping = 0x0e,
}

/// Status flag bits carried in OK and EOF packets.
pub mod server_status {
    pub const SERVER_STATUS_AUTOCOMMIT: u16 = 0x0002;
    /// Another buffered result set follows this one.
    pub const SERVER_MORE_RESULTS_EXISTS: u16 = 0x0008;
}

/// Character set codes used in the handshake.
pub mod charset {
    pub const UTF8_GENERAL_CI: u8 = 33;
    pub const BINARY: u8 = 63;

    pub const DEFAULT_CHARSET: u8 = UTF8_GENERAL_CI;
}

/// Client-side diagnostic codes, matching the numbering MySQL client
/// libraries report for socket-level failures.
pub mod client_errors {
    /// Can't connect to the server host
    pub const CR_CONN_HOST_ERROR: u16 = 2003;
    /// Connection dropped mid-session
    pub const CR_SERVER_LOST: u16 = 2013;
}

/// The 4-byte frame header preceding every packet payload.
#[derive(Debug, Clone, Copy)]
pub struct PacketHeader {
    /// Payload length (3 bytes on the wire, max 16MB - 1)
    pub payload_length: u32,
    /// Sequence number (wraps at 255)
    pub sequence_id: u8,
}

impl PacketHeader {
    /// Frame header size in bytes.
    pub const SIZE: usize = 4;

    /// Decode a frame header.
    pub fn parse(bytes: [u8; 4]) -> Self {
        let [lo, mid, hi, sequence_id] = bytes;
        Self {
            payload_length: u32::from_le_bytes([lo, mid, hi, 0]),
            sequence_id,
        }
    }

    /// Encode the frame header.
    pub fn encode(self) -> [u8; 4] {
        let [lo, mid, hi, _] = self.payload_length.to_le_bytes();
        [lo, mid, hi, self.sequence_id]
    }
}

/// What kind of packet a payload is, judged from its leading byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    /// OK packet (0x00)
    Ok,
    /// Error packet (0xFF)
    Error,
    /// EOF packet (0xFE, and shorter than 9 bytes)
    Eof,
    /// Local infile request (0xFB)
    LocalInfile,
    /// Anything else: column count, column definition, row
    Data,
}

impl PacketType {
    /// Classify a packet payload.
    ///
    /// An 0xFE first byte only means EOF when the payload is shorter than
    /// 9 bytes; otherwise it is the prefix of an 8-byte length-encoded
    /// integer and the packet is data.
    pub fn classify(payload: &[u8]) -> Self {
        match payload.first() {
            Some(0x00) => PacketType::Ok,
            Some(0xFF) => PacketType::Error,
            Some(0xFE) if payload.len() < 9 => PacketType::Eof,
            Some(0xFB) => PacketType::LocalInfile,
            _ => PacketType::Data,
        }
    }
}

/// Decoded OK packet.
#[derive(Debug, Clone)]
pub struct OkPacket {
    pub affected_rows: u64,
    pub last_insert_id: u64,
    pub status_flags: u16,
    pub warnings: u16,
    /// Human-readable info string, often empty
    pub info: String,
}

impl OkPacket {
    /// Decode an OK payload: 0x00 marker, two length-encoded integers
    /// (affected rows, last insert id), status flags, warning count, and
    /// an optional trailing info string.
    pub fn parse(payload: &[u8]) -> Option<Self> {
        let mut r = PacketReader::new(payload);
        if r.peek() == Some(0x00) {
            r.skip(1);
        }
        Some(Self {
            affected_rows: r.read_lenenc_int()?,
            last_insert_id: r.read_lenenc_int()?,
            status_flags: r.read_u16_le()?,
            warnings: r.read_u16_le()?,
            info: r.read_rest_string(),
        })
    }
}

/// Decoded ERR packet.
#[derive(Debug, Clone)]
pub struct ErrPacket {
    pub error_code: u16,
    /// 5-character SQL state, empty when the server sent none
    pub sql_state: String,
    pub error_message: String,
}

impl ErrPacket {
    /// Decode an ERR payload: 0xFF marker, error code, optional
    /// '#'-prefixed SQL state, then the message.
    pub fn parse(payload: &[u8]) -> Option<Self> {
        let mut r = PacketReader::new(payload);
        if r.peek() == Some(0xFF) {
            r.skip(1);
        }
        let error_code = r.read_u16_le()?;
        let sql_state = if r.peek() == Some(b'#') {
            r.skip(1);
            r.read_string(5)?
        } else {
            String::new()
        };
        Some(Self {
            error_code,
            sql_state,
            error_message: r.read_rest_string(),
        })
    }
}

/// Decoded EOF packet.
#[derive(Debug, Clone, Copy)]
pub struct EofPacket {
    pub warnings: u16,
    pub status_flags: u16,
}

impl EofPacket {
    /// Decode an EOF payload: 0xFE marker, warning count, status flags.
    pub fn parse(payload: &[u8]) -> Option<Self> {
        let mut r = PacketReader::new(payload);
        if r.peek() == Some(0xFE) {
            r.skip(1);
        }
        Some(Self {
            warnings: r.read_u16_le()?,
            status_flags: r.read_u16_le()?,
        })
    }
}
