/// Address used when none is configured: all interfaces, port 5034.
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:5034";

/// Raw messages buffered between peers and the coordinator before peers
/// start waiting on it.
pub const DEFAULT_MESSAGE_CAPACITY: usize = 1024;

/// Longest accepted protocol line, delimiter excluded.
pub const DEFAULT_MAX_LINE_BYTES: usize = 64 * 1024;

/// Runtime settings for a [`crate::server::Server`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub listen_addr: String,
    pub message_capacity: usize,
    pub max_line_bytes: usize,
}

impl Config {
    pub fn with_listen_addr(listen_addr: impl Into<String>) -> Self {
        Self {
            listen_addr: listen_addr.into(),
            ..Self::default()
        }
    }

    /// Fills in defaults for values left empty or zero.
    pub fn normalized(mut self) -> Self {
        if self.listen_addr.trim().is_empty() {
            self.listen_addr = DEFAULT_LISTEN_ADDR.to_string();
        }
        if self.message_capacity == 0 {
            self.message_capacity = DEFAULT_MESSAGE_CAPACITY;
        }
        if self.max_line_bytes == 0 {
            self.max_line_bytes = DEFAULT_MAX_LINE_BYTES;
        }
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            message_capacity: DEFAULT_MESSAGE_CAPACITY,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }
}
