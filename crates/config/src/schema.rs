//! Config schema types.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LobbyConfig {
    pub server: ServerConfig,
}

/// Listener and shutdown settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind. Defaults to all interfaces.
    pub bind: String,

    pub port: u16,

    /// How long to wait for the listener to drain after a termination
    /// signal before giving up.
    pub shutdown_grace_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 8080,
            shutdown_grace_secs: 5,
        }
    }
}

impl ServerConfig {
    pub fn shutdown_grace(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.shutdown_grace_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_server_section_keeps_defaults() {
        let cfg: LobbyConfig = toml::from_str("[server]\nport = 9000\n").unwrap();
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.server.bind, "0.0.0.0");
        assert_eq!(cfg.server.shutdown_grace_secs, 5);
    }

    #[test]
    fn empty_document_is_default() {
        let cfg: LobbyConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, LobbyConfig::default());
    }
}
