//! Hub configuration

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::protocol::constants::*;

/// Hub configuration options
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Broadcaster name; names the control socket and prefixes listener endpoints
    pub name: String,

    /// Directory holding the control socket and listener sockets
    pub socket_dir: PathBuf,

    /// Per-listener send timeout inside a broadcast
    pub send_timeout: Duration,

    /// Largest control frame body accepted before the connection is dropped
    pub max_frame_size: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_BROADCASTER_NAME.to_string(),
            socket_dir: std::env::temp_dir(),
            send_timeout: DEFAULT_SEND_TIMEOUT,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl HubConfig {
    /// Create a config for a named hub
    pub fn new(name: impl Into<String>) -> Self {
        Self::default().name(name)
    }

    /// Load configuration from the environment (and `.env`, if present).
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `MIDI_SPY_HUB_NAME` | `name` |
    /// | `MIDI_SPY_SOCKET_DIR` | `socket_dir` |
    /// | `MIDI_SPY_SEND_TIMEOUT_MS` | `send_timeout` |
    /// | `MIDI_SPY_MAX_FRAME_SIZE` | `max_frame_size` |
    ///
    /// Unset variables keep their defaults; set but unparsable ones are an
    /// error.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Ok(name) = std::env::var("MIDI_SPY_HUB_NAME") {
            config = config.name(name);
        }
        if let Ok(dir) = std::env::var("MIDI_SPY_SOCKET_DIR") {
            config = config.socket_dir(dir);
        }
        if let Some(ms) = parse_env::<u64>("MIDI_SPY_SEND_TIMEOUT_MS")? {
            config = config.send_timeout(Duration::from_millis(ms));
        }
        if let Some(size) = parse_env::<usize>("MIDI_SPY_MAX_FRAME_SIZE")? {
            config = config.max_frame_size(size);
        }

        Ok(config)
    }

    /// Set the broadcaster name. An empty name becomes "Unknown Broadcaster".
    pub fn name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.name = if name.is_empty() {
            UNKNOWN_BROADCASTER_NAME.to_string()
        } else {
            name
        };
        self
    }

    /// Set the socket directory
    pub fn socket_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.socket_dir = dir.into();
        self
    }

    /// Set the per-send timeout (at least 1ms)
    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout.max(Duration::from_millis(1));
        self
    }

    /// Set the maximum control frame body size
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Path of the hub's control socket
    pub fn control_socket_path(&self) -> PathBuf {
        self.socket_dir.join(&self.name)
    }
}

/// Parse an optional environment variable, failing on malformed values
fn parse_env<T: FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("{key}={value:?} is not valid"))),
        Err(_) => Ok(None),
    }
}
