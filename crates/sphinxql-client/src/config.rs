//! Connection configuration.

use std::time::Duration;

/// Configuration for a `searchd` connection.
///
/// Search daemons ignore credentials and have no schema concept, so the
/// whole configuration is an endpoint plus socket tuning.
#[derive(Debug, Clone)]
pub struct SearchdConfig {
    /// Hostname or IP address
    pub host: String,
    /// SphinxQL listener port (Sphinx defaults to 9306)
    pub port: u16,
    /// Character set byte sent in the handshake response
    pub charset: u8,
    /// Connection and per-operation socket timeout
    pub connect_timeout: Duration,
    /// Max packet size advertised to the server
    pub max_packet_size: u32,
}

impl Default for SearchdConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 9306,
            charset: crate::protocol::charset::DEFAULT_CHARSET,
            connect_timeout: Duration::from_secs(30),
            max_packet_size: 16 * 1024 * 1024,
        }
    }
}

impl SearchdConfig {
    /// Start from the defaults (localhost:9306, utf8, 30s timeout).
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Character set byte sent in the handshake response.
    pub fn charset(mut self, charset: u8) -> Self {
        self.charset = charset;
        self
    }

    /// Timeout applied to connect and to every socket read/write.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Max packet size advertised to the server.
    pub fn max_packet_size(mut self, size: u32) -> Self {
        self.max_packet_size = size;
        self
    }

    /// The `host:port` endpoint string.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
