//! Error types for sphinxql operations.

use std::fmt;

/// The primary error type for all sphinxql operations.
#[derive(Debug)]
pub enum Error {
    /// Connection-related errors (connect, misuse, query submission,
    /// result iteration)
    Connection(ConnectionError),
    /// Typed value extraction errors
    Type(TypeError),
}

/// The sole domain error raised by the driver itself.
///
/// Failures that originate on the server (or in the socket layer) carry a
/// [`ServerError`] with the native error code, so callers can match on
/// structured fields instead of parsing the formatted message.
#[derive(Debug)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
    pub server: Option<ServerError>,
}

/// What stage of the connection lifecycle produced a [`ConnectionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Failed to set up the client before any server contact
    Init,
    /// Failed to establish the connection or complete the handshake
    Connect,
    /// execute/query called on a connection that is not open
    ClosedMisuse,
    /// The server rejected the statement submission
    Submit,
    /// A failure while advancing through buffered result sets
    ResultIteration,
    /// The connection dropped mid-session
    Disconnected,
}

/// Native diagnostic attached to server-originated failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerError {
    /// Server (or client-library) error code, e.g. 1064 for a parse error
    pub code: u16,
    /// Server-provided description
    pub message: String,
}

impl ConnectionError {
    /// A misuse or internal-invariant error with no native diagnostic.
    pub fn plain(kind: ConnectionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            server: None,
        }
    }

    /// A failure carrying the native error code and description.
    pub fn server(
        kind: ConnectionErrorKind,
        message: impl Into<String>,
        code: u16,
        description: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            server: Some(ServerError {
                code,
                message: description.into(),
            }),
        }
    }

    /// The native error code, if this failure carried one.
    pub fn code(&self) -> Option<u16> {
        self.server.as_ref().map(|s| s.code)
    }
}

/// A typed value extraction failed.
#[derive(Debug)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
}

impl Error {
    /// Whether this failure means the session is gone and a caller would
    /// have to reconnect.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Connect | ConnectionErrorKind::Disconnected,
                ..
            })
        )
    }

    /// The native error code, if any.
    pub fn server_code(&self) -> Option<u16> {
        match self {
            Error::Connection(c) => c.code(),
            Error::Type(_) => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connection(e) => write!(f, "{e}"),
            Error::Type(e) => write!(f, "{e}"),
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.server {
            Some(s) => write!(f, "{}. Error {}: {}", self.message, s.code, s.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.column {
            Some(col) => write!(
                f,
                "column '{col}': expected {}, got {}",
                self.expected, self.actual
            ),
            None => write!(f, "expected {}, got {}", self.expected, self.actual),
        }
    }
}

impl std::error::Error for Error {}

impl From<ConnectionError> for Error {
    fn from(err: ConnectionError) -> Self {
        Error::Connection(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

/// Result type alias for sphinxql operations.
pub type Result<T> = std::result::Result<T, Error>;
