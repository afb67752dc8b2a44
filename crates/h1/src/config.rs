//! Per-connection settings.
//!
//! The bootstrap code owns these values and may load them from any serde
//! format; missing fields fall back to their defaults.

use serde::Deserialize;

/// Default maximum size of a buffered request body, in bytes.
pub const DEFAULT_MAX_BODY_SIZE: usize = 1_000_000;

/// Default initial capacity of the inbound read buffer.
pub const DEFAULT_READ_BUFFER_CAPACITY: usize = 8 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Largest request body, in bytes, that is buffered before dispatch.
    ///
    /// A larger body closes the connection without a response. Transfer-chunked
    /// bodies are streamed to the responder and not subject to this limit.
    pub max_body_size: usize,
    pub read_buffer_capacity: usize,
    /// Serve further requests on the connection when the client allows it.
    pub keep_alive: bool,
}

impl ConnectionConfig {
    #[must_use]
    pub fn with_max_body_size(mut self, max_body_size: usize) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    #[must_use]
    pub fn with_read_buffer_capacity(mut self, read_buffer_capacity: usize) -> Self {
        self.read_buffer_capacity = read_buffer_capacity;
        self
    }

    #[must_use]
    pub fn with_keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self { max_body_size: DEFAULT_MAX_BODY_SIZE, read_buffer_capacity: DEFAULT_READ_BUFFER_CAPACITY, keep_alive: true }
    }
}
