//! Server configuration.
//!
//! Values can be overridden via environment variables for flexible deployment.

use std::net::SocketAddr;
use std::time::Duration;

use tracing::info;

use crate::protocol::DEFAULT_MAX_MESSAGE_SIZE;

/// Default listening port.
pub const DEFAULT_PORT: u16 = 15432;

/// Server configuration shared by the listener and every session.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the listener binds to.
    pub listen_addr: SocketAddr,
    /// Largest message body accepted from a client, in bytes.
    pub max_message_size: usize,
    /// Reported as the `server_version` parameter at startup.
    pub server_version: String,
    /// Reported as the `TimeZone` parameter at startup.
    pub time_zone: String,
    /// Close sessions that stay silent this long between messages.
    pub idle_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            server_version: "14".to_string(),
            time_zone: "UTC".to_string(),
            idle_timeout: None,
        }
    }
}

impl ServerConfig {
    /// Defaults, overridden by `PGBRIDGE_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            listen_addr: std::env::var("PGBRIDGE_LISTEN_ADDR")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.listen_addr),
            max_message_size: std::env::var("PGBRIDGE_MAX_MESSAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_message_size),
            server_version: std::env::var("PGBRIDGE_SERVER_VERSION")
                .unwrap_or(defaults.server_version),
            time_zone: std::env::var("PGBRIDGE_TIME_ZONE").unwrap_or(defaults.time_zone),
            idle_timeout: std::env::var("PGBRIDGE_IDLE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|&secs| secs > 0)
                .map(Duration::from_secs),
        }
    }

    /// Parameters announced with ParameterStatus after startup, in the order
    /// they are sent.
    pub fn status_parameters(&self) -> [(&'static str, &str); 5] {
        [
            ("server_version", self.server_version.as_str()),
            ("server_encoding", "UTF8"),
            ("client_encoding", "UTF8"),
            ("DateStyle", "ISO"),
            ("TimeZone", self.time_zone.as_str()),
        ]
    }

    /// Log configuration on startup
    pub fn log_config(&self) {
        info!(
            "Server config: listen={}, max_message_size={}KB, server_version={}, idle_timeout={:?}",
            self.listen_addr,
            self.max_message_size / 1024,
            self.server_version,
            self.idle_timeout
        );
    }
}
