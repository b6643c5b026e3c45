//! Configuration for the responder.
//!
//! A `ServerConfig` is built once at startup, validated, and handed to the
//! responder. It never changes afterwards.

use crate::error::ConfigError;
use http::StatusCode;
use serde::{Serialize, Serializer};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Immutable startup configuration.
#[derive(Debug, Clone, Serialize)]
pub struct ServerConfig {
    /// Host name or address to bind
    host: String,

    /// Port to bind
    port: u16,

    /// Artificial delay before every response
    delay_seconds: u64,

    /// Status code of the canned response
    #[serde(serialize_with = "serialize_status")]
    status_code: StatusCode,

    /// File holding the canned response body (read per request)
    body_path: PathBuf,
}

fn serialize_status<S: Serializer>(status: &StatusCode, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u16(status.as_u16())
}

impl ServerConfig {
    /// Build and validate a configuration.
    ///
    /// The body file is not touched here; it may be created or replaced after
    /// the server has started.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        delay_seconds: u64,
        status_code: u16,
        body_path: impl Into<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let host = host.into();
        let body_path = body_path.into();

        if host.trim().is_empty() {
            return Err(ConfigError::MissingField("host"));
        }
        if port == 0 {
            return Err(ConfigError::InvalidPort(port));
        }
        if !(100..=599).contains(&status_code) {
            return Err(ConfigError::InvalidStatus(status_code));
        }
        let status_code =
            StatusCode::from_u16(status_code).map_err(|_| ConfigError::InvalidStatus(status_code))?;
        if body_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingField("body path"));
        }

        Ok(Self {
            host,
            port,
            delay_seconds,
            status_code,
            body_path,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn delay_seconds(&self) -> u64 {
        self.delay_seconds
    }

    /// Delay applied before each response is written.
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_seconds)
    }

    pub fn status(&self) -> StatusCode {
        self.status_code
    }

    pub fn body_path(&self) -> &Path {
        &self.body_path
    }

    /// `host:port`, bracketing IPv6 literals.
    pub fn bind_addr(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Render the effective configuration as YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}
