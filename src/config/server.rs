use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Longest accepted session lifetime, one year.
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    /// How long a login session stays valid.
    pub session_ttl_hours: i64,
    /// Adds the `Secure` attribute to the session cookie. Enable behind TLS.
    pub cookie_secure: bool,
}

impl ServerConfig {
    /// Loads configuration from a TOML file. Missing keys fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: ServerConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_SESSION_TTL_HOURS).contains(&self.session_ttl_hours) {
            return Err(Error::Config(format!(
                "session_ttl_hours must be between 1 and {MAX_SESSION_TTL_HOURS}"
            )));
        }
        Ok(())
    }

    /// Session lifetime as a duration. Fails instead of overflowing.
    pub fn session_ttl(&self) -> Result<Duration> {
        Duration::try_hours(self.session_ttl_hours)
            .ok_or_else(|| Error::Config("session_ttl_hours is out of range".to_string()))
    }

    /// Session lifetime in seconds, for the cookie `Max-Age`.
    pub fn session_ttl_seconds(&self) -> Result<i64> {
        self.session_ttl_hours
            .checked_mul(3600)
            .ok_or_else(|| Error::Config("session_ttl_hours is out of range".to_string()))
    }

    pub fn socket_addr(&self) -> std::result::Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("storerate.db")
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            data_dir: PathBuf::from("./data"),
            session_ttl_hours: 24,
            cookie_secure: false,
        }
    }
}
