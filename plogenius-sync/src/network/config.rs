//! Connection Configuration
//!
//! Endpoint, identity and tuning for one table client. Loadable from
//! environment variables for the terminal client.

use std::time::Duration;

use rand::Rng;
use thiserror::Error;

use crate::network::backoff::ReconnectPolicy;
use crate::table::log::DEFAULT_LOG_CAPACITY;

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Environment variable present but unparseable.
    #[error("invalid value for {var}: {value:?}")]
    InvalidVar {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
    },
    /// Scheme other than ws/wss.
    #[error("unsupported scheme {0:?}, expected ws or wss")]
    UnsupportedScheme(String),
    /// Room not matching `\w+`.
    #[error("invalid room name {0:?}: only letters, digits and underscores")]
    InvalidRoom(String),
    /// Empty host.
    #[error("host must not be empty")]
    EmptyHost,
    /// Zero log capacity.
    #[error("log capacity must be positive")]
    ZeroLogCapacity,
}

/// Table client configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// `ws` or `wss`.
    pub scheme: String,
    /// Authority host.
    pub host: String,
    /// Authority port.
    pub port: u16,
    /// Path before the room segment.
    pub path_prefix: String,
    /// Table room.
    pub room: String,
    /// This client's identifier.
    pub user_id: String,
    /// Retained message log entries.
    pub log_capacity: usize,
    /// Outbound queue depth.
    pub outgoing_capacity: usize,
    /// Reconnect behaviour.
    pub reconnect: ReconnectPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            scheme: "ws".to_string(),
            host: "localhost".to_string(),
            port: 8000,
            path_prefix: "/ws/poker".to_string(),
            room: "table1".to_string(),
            user_id: generate_user_id(),
            log_capacity: DEFAULT_LOG_CAPACITY,
            outgoing_capacity: 64,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

/// Ephemeral client id, `player` plus a random number below 1000.
/// Not unique across sessions; the authority resolves collisions.
pub fn generate_user_id() -> String {
    format!("player{}", rand::thread_rng().gen_range(0..1000))
}

impl SyncConfig {
    /// Defaults pointed at `host:port`.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Create config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(scheme) = lookup("PLOGENIUS_SCHEME") {
            config.scheme = scheme;
        }
        if let Some(host) = lookup("PLOGENIUS_HOST") {
            config.host = host;
        }
        if let Some(port) = parse_var(&lookup, "PLOGENIUS_PORT")? {
            config.port = port;
        }
        if let Some(room) = lookup("PLOGENIUS_ROOM") {
            config.room = room;
        }
        if let Some(user_id) = lookup("PLOGENIUS_USER_ID") {
            config.user_id = user_id;
        }
        if let Some(capacity) = parse_var(&lookup, "PLOGENIUS_LOG_CAPACITY")? {
            config.log_capacity = capacity;
        }
        if let Some(millis) = parse_var::<u64, _>(&lookup, "PLOGENIUS_RECONNECT_DELAY_MS")? {
            config.reconnect.initial_delay = Duration::from_millis(millis);
        }
        if let Some(raw) = lookup("PLOGENIUS_RECONNECT_MAX_ATTEMPTS") {
            config.reconnect.max_attempts = match raw.trim() {
                "" | "none" | "unlimited" => None,
                n => Some(n.parse().map_err(|_| ConfigError::InvalidVar {
                    var: "PLOGENIUS_RECONNECT_MAX_ATTEMPTS",
                    value: raw.clone(),
                })?),
            };
        }

        config.validate()?;
        Ok(config)
    }

    /// Check invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheme != "ws" && self.scheme != "wss" {
            return Err(ConfigError::UnsupportedScheme(self.scheme.clone()));
        }
        if self.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        let room_ok = !self.room.is_empty()
            && self.room.chars().all(|c| c.is_alphanumeric() || c == '_');
        if !room_ok {
            return Err(ConfigError::InvalidRoom(self.room.clone()));
        }
        if self.log_capacity == 0 {
            return Err(ConfigError::ZeroLogCapacity);
        }
        Ok(())
    }

    /// WebSocket URL for this room.
    pub fn endpoint(&self) -> String {
        format!(
            "{}://{}:{}{}/{}/",
            self.scheme,
            self.host,
            self.port,
            self.path_prefix.trim_end_matches('/'),
            self.room
        )
    }
}

fn parse_var<T, F>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => match value.trim().parse() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(ConfigError::InvalidVar { var, value }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_endpoint() {
        let config = SyncConfig::default();
        assert_eq!(config.endpoint(), "ws://localhost:8000/ws/poker/table1/");
        assert!(config.user_id.starts_with("player"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = SyncConfig::from_lookup(lookup_from(&[
            ("PLOGENIUS_SCHEME", "wss"),
            ("PLOGENIUS_HOST", "plo.example"),
            ("PLOGENIUS_PORT", "443"),
            ("PLOGENIUS_ROOM", "hu_2"),
            ("PLOGENIUS_USER_ID", "player42"),
            ("PLOGENIUS_LOG_CAPACITY", "20"),
            ("PLOGENIUS_RECONNECT_DELAY_MS", "500"),
            ("PLOGENIUS_RECONNECT_MAX_ATTEMPTS", "unlimited"),
        ]))
        .unwrap();

        assert_eq!(config.endpoint(), "wss://plo.example:443/ws/poker/hu_2/");
        assert_eq!(config.user_id, "player42");
        assert_eq!(config.log_capacity, 20);
        assert_eq!(config.reconnect.initial_delay, Duration::from_millis(500));
        assert_eq!(config.reconnect.max_attempts, None);
    }

    #[test]
    fn test_invalid_values() {
        let err = SyncConfig::from_lookup(lookup_from(&[("PLOGENIUS_PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidVar { var: "PLOGENIUS_PORT", .. }));

        let err = SyncConfig::from_lookup(lookup_from(&[("PLOGENIUS_ROOM", "table/1")])).unwrap_err();
        assert_eq!(err, ConfigError::InvalidRoom("table/1".to_string()));

        let err = SyncConfig::from_lookup(lookup_from(&[("PLOGENIUS_SCHEME", "http")])).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedScheme(_)));

        let err = SyncConfig::from_lookup(lookup_from(&[("PLOGENIUS_LOG_CAPACITY", "0")])).unwrap_err();
        assert_eq!(err, ConfigError::ZeroLogCapacity);
    }
}
