//! Configuration types.

use std::path::PathBuf;

use crate::error::ConfigError;

/// Service configuration, read from `NEXUS_*` environment variables.
#[derive(Debug, Clone)]
pub struct NexusConfig {
    /// Profile database file.
    pub db_path: PathBuf,
    /// Port for the HTTP/WebSocket surface.
    pub http_port: u16,
    /// Public origin the identity provider redirects back to.
    pub public_origin: String,
    /// OAuth provider name handed to the identity provider.
    pub oauth_provider: String,
    /// File backing the intended-role staging slot.
    pub staging_path: PathBuf,
    /// Directory for rolling log files. Stderr only when unset.
    pub log_dir: Option<PathBuf>,
    /// Capacity of the controller's command queue.
    pub command_queue: usize,
}

impl Default for NexusConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/nexus.db"),
            http_port: 8080,
            public_origin: "http://localhost:8080".to_string(),
            oauth_provider: "google".to_string(),
            staging_path: PathBuf::from("./data/intended_role.json"),
            log_dir: None,
            command_queue: 64,
        }
    }
}

impl NexusConfig {
    /// Build the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let http_port = match lookup("NEXUS_HTTP_PORT") {
            Some(raw) => parse_value("NEXUS_HTTP_PORT", &raw)?,
            None => defaults.http_port,
        };

        let command_queue: usize = match lookup("NEXUS_COMMAND_QUEUE") {
            Some(raw) => parse_value("NEXUS_COMMAND_QUEUE", &raw)?,
            None => defaults.command_queue,
        };
        if command_queue == 0 {
            return Err(ConfigError::InvalidValue {
                key: "NEXUS_COMMAND_QUEUE".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        let public_origin = lookup("NEXUS_PUBLIC_ORIGIN")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or(defaults.public_origin);

        Ok(Self {
            db_path: lookup("NEXUS_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            http_port,
            public_origin,
            oauth_provider: lookup("NEXUS_OAUTH_PROVIDER").unwrap_or(defaults.oauth_provider),
            staging_path: lookup("NEXUS_STAGING_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.staging_path),
            log_dir: lookup("NEXUS_LOG_DIR")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            command_queue,
        })
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("{raw:?}: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_set() {
        let config = NexusConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.oauth_provider, "google");
        assert_eq!(config.public_origin, "http://localhost:8080");
        assert!(config.log_dir.is_none());
        assert_eq!(config.command_queue, 64);
    }

    #[test]
    fn overrides_are_applied() {
        let config = NexusConfig::from_lookup(lookup_from(&[
            ("NEXUS_HTTP_PORT", "9090"),
            ("NEXUS_PUBLIC_ORIGIN", "https://nexus.example.com/"),
            ("NEXUS_DB_PATH", "/tmp/n.db"),
            ("NEXUS_LOG_DIR", "/var/log/nexus"),
        ]))
        .unwrap();
        assert_eq!(config.http_port, 9090);
        // Trailing slash is trimmed so redirect targets join cleanly
        assert_eq!(config.public_origin, "https://nexus.example.com");
        assert_eq!(config.db_path, PathBuf::from("/tmp/n.db"));
        assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/nexus")));
    }

    #[test]
    fn invalid_port_is_rejected() {
        let err = NexusConfig::from_lookup(lookup_from(&[("NEXUS_HTTP_PORT", "eighty")]))
            .unwrap_err();
        match err {
            ConfigError::InvalidValue { key, .. } => assert_eq!(key, "NEXUS_HTTP_PORT"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn zero_queue_is_rejected() {
        assert!(NexusConfig::from_lookup(lookup_from(&[("NEXUS_COMMAND_QUEUE", "0")])).is_err());
    }

    #[test]
    fn blank_log_dir_means_stderr_only() {
        let config = NexusConfig::from_lookup(lookup_from(&[("NEXUS_LOG_DIR", "  ")])).unwrap();
        assert!(config.log_dir.is_none());
    }
}
