//! Server configuration loaded from TOML and the environment.

use std::path::Path;
use std::time::Duration;

use derive_getters::Getters;
use derive_more::{Display, Error};
use family_tracker::DispatchSettings;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Environment variable that overrides [`ServerConfig::database_path`].
pub const DB_ENV_VAR: &str = "FAMILY_TRACKER_DB";

/// Settings for the store, the HTTP listener, and the dispatcher.
///
/// Every field has a default, so an empty file is a valid configuration:
///
/// ```toml
/// database_path = "family_tracker.db"
/// host = "127.0.0.1"
/// port = 3000
/// lock_timeout_ms = 2000
/// max_attempts = 5
/// busy_timeout_ms = 5000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct ServerConfig {
    /// SQLite database file.
    #[serde(default = "default_database_path")]
    database_path: String,
    /// Address to bind.
    #[serde(default = "default_host")]
    host: String,
    /// Port to bind.
    #[serde(default = "default_port")]
    port: u16,
    /// Per-tracker lock wait, in milliseconds.
    #[serde(default = "default_lock_timeout_ms")]
    lock_timeout_ms: u64,
    /// Compare-and-swap attempts per action.
    #[serde(default = "default_max_attempts")]
    max_attempts: u32,
    /// How long SQLite waits on a locked database file, in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    busy_timeout_ms: u64,
}

fn default_database_path() -> String {
    "family_tracker.db".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_lock_timeout_ms() -> u64 {
    2000
}

fn default_max_attempts() -> u32 {
    5
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            host: default_host(),
            port: default_port(),
            lock_timeout_ms: default_lock_timeout_ms(),
            max_attempts: default_max_attempts(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;
        info!(database_path = %config.database_path, "Config loaded successfully");
        Ok(config)
    }

    /// Resolves configuration: file (or defaults), then environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `path` is given and cannot be loaded.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        Ok(config.with_env())
    }

    /// Applies [`DB_ENV_VAR`] when set and non-empty.
    pub fn with_env(self) -> Self {
        match std::env::var(DB_ENV_VAR) {
            Ok(path) if !path.trim().is_empty() => {
                debug!(path = %path, "Database path from environment");
                self.with_database_path(path)
            }
            _ => self,
        }
    }

    /// Overrides the database path.
    pub fn with_database_path(mut self, database_path: impl Into<String>) -> Self {
        self.database_path = database_path.into();
        self
    }

    /// Overrides the listen address.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Overrides the listen port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// SQLite busy timeout as a duration.
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Dispatcher budgets derived from this configuration.
    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings::default()
            .with_lock_timeout(Duration::from_millis(self.lock_timeout_ms))
            .with_max_attempts(self.max_attempts)
    }
}

/// Configuration error with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_uses_defaults() {
        let config: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.port(), &3000);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = 8080\nmax_attempts = 9").unwrap();
        let config = ServerConfig::from_file(file.path()).unwrap();
        assert_eq!(*config.port(), 8080);
        assert_eq!(config.database_path(), "family_tracker.db");
        assert_eq!(*config.dispatch_settings().max_attempts(), 9);
        assert_eq!(
            *config.dispatch_settings().lock_timeout(),
            Duration::from_millis(2000)
        );
        assert_eq!(config.busy_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn busy_timeout_is_configurable() {
        let config: ServerConfig = toml::from_str("busy_timeout_ms = 250").unwrap();
        assert_eq!(config.busy_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = ServerConfig::from_file("/nonexistent/family_tracker.toml").unwrap_err();
        assert!(err.message.contains("Failed to read"));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = \"high\"").unwrap();
        let err = ServerConfig::from_file(file.path()).unwrap_err();
        assert!(err.message.contains("Failed to parse"));
    }
}
