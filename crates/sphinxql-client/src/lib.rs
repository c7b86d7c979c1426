//! Synchronous SphinxQL driver for search daemons speaking the MySQL wire
//! protocol (Sphinx `searchd`, Manticore).
//!
//! This crate implements the text query path of the MySQL wire protocol from
//! scratch on `std::net::TcpStream`. It provides:
//!
//! - Packet framing with sequence numbers
//! - A credential-less handshake (search daemons ignore authentication)
//! - Multi-statement submission and multi-result iteration
//! - Type conversion from wire column types to [`sphinxql_core::Value`]
//! - A SphinxQL statement builder
//!
//! # MySQL Protocol Overview
//!
//! MySQL uses a packet-based protocol with:
//! - 3-byte payload length + 1-byte sequence number header
//! - Packets over 16MB are split
//! - One buffered result set per result-producing statement, chained via the
//!   `SERVER_MORE_RESULTS_EXISTS` status flag
//!
//! # Example
//!
//! ```rust,ignore
//! use sphinxql_client::{SearchdConfig, SearchdConnection};
//!
//! let config = SearchdConfig::new().host("localhost").port(9306);
//! let mut conn = SearchdConnection::connect(config)?;
//! let results = conn.query("SELECT id, title FROM articles WHERE MATCH('rust')")?;
//! ```

pub mod config;
pub mod connection;
pub mod protocol;
pub mod query;
pub mod types;

pub use config::SearchdConfig;
pub use connection::SearchdConnection;
pub use query::{InsertQuery, Order, SearchQuery, UpdateQuery, delete_from};
pub use sphinxql_core::{
    ColumnInfo, ConnectionError, ConnectionErrorKind, Error, ResultTable, Result, Row, Value,
};
pub use types::{ColumnDef, FieldType};
