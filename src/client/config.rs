//! Listener client configuration

use std::path::PathBuf;
use std::time::Duration;

use crate::protocol::constants::DEFAULT_BROADCASTER_NAME;

/// Listener client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Name of the hub to attach to
    pub hub_name: String,

    /// Directory holding the hub's control socket
    pub socket_dir: PathBuf,

    /// How long to wait for a reply from the hub
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            hub_name: DEFAULT_BROADCASTER_NAME.to_string(),
            socket_dir: std::env::temp_dir(),
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl ClientConfig {
    /// Create a config for the named hub
    pub fn new(hub_name: impl Into<String>) -> Self {
        Self {
            hub_name: hub_name.into(),
            ..Default::default()
        }
    }

    /// Set the socket directory
    pub fn socket_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.socket_dir = dir.into();
        self
    }

    /// Set the reply timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Path of the hub's control socket
    pub fn control_socket_path(&self) -> PathBuf {
        self.socket_dir.join(&self.hub_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config() {
        let config = ClientConfig::new("spy")
            .socket_dir("/run/midi")
            .request_timeout(Duration::from_millis(200));

        assert_eq!(config.control_socket_path(), PathBuf::from("/run/midi/spy"));
        assert_eq!(config.request_timeout, Duration::from_millis(200));
    }
}
