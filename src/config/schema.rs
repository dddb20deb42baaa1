//! Configuration schema interpreted by the server itself.
//!
//! Apps decode their own sections from [`Settings`](super::Settings); only the
//! keys below drive the orchestrator.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use strum_macros::{Display, EnumString};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 5_000;

/// Root of the keys the orchestrator reads.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub server: ServerConfig,

    /// Default logger.
    pub logger: LoggerConfig,

    /// Named auxiliary loggers.
    pub loggers: BTreeMap<String, LoggerConfig>,

    pub reporting: ReportingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    /// Grace period for in-flight requests during shutdown.
    pub shutdown_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT_MS,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn socket_addr(&self) -> Option<SocketAddr> {
        self.bind_address().parse().ok()
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

/// Rendering of log lines.
///
/// Parsed case-insensitively, from config files and `LOG_FORMAT` alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Display, EnumString)]
#[serde(try_from = "String")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LogFormat {
    #[default]
    #[strum(to_string = "json", serialize = "structured")]
    Json,

    #[strum(to_string = "text", serialize = "plain")]
    Text,
}

impl TryFrom<String> for LogFormat {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value
            .trim()
            .parse()
            .map_err(|_| format!("unknown log format `{value}`, expected `json` or `text`"))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Minimum severity (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,

    /// Append to this file instead of stdout.
    pub file: Option<PathBuf>,

    pub formatter: LogFormat,

    /// Force ANSI colours, even when writing to a file.
    pub color: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            formatter: LogFormat::default(),
            color: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportingConfig {
    /// Endpoint of the error-reporting service. Reporting is off when unset.
    pub dsn: Option<String>,
    pub timeout_ms: u64,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            dsn: None,
            timeout_ms: 5_000,
        }
    }
}

impl ReportingConfig {
    /// The DSN, ignoring blank values.
    pub fn dsn(&self) -> Option<&str> {
        self.dsn.as_deref().map(str::trim).filter(|dsn| !dsn.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_port_defaults_to_8080() {
        let config: CoreConfig = toml::from_str("[server]\nhost = \"127.0.0.1\"").unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.bind_address(), "127.0.0.1:8080");
        assert_eq!(config.server.shutdown_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_named_loggers() {
        let config: CoreConfig = toml::from_str(
            r#"
            [logger]
            level = "warn"

            [loggers.audit]
            level = "debug"
            file = "/var/log/audit.log"
            formatter = "plain"
            "#,
        )
        .unwrap();

        assert_eq!(config.logger.level, "warn");
        let audit = &config.loggers["audit"];
        assert_eq!(audit.formatter, LogFormat::Text);
        assert_eq!(audit.file.as_deref(), Some(std::path::Path::new("/var/log/audit.log")));
    }

    #[test]
    fn test_log_format_from_str() {
        assert_eq!(LogFormat::from_str("JSON").unwrap(), LogFormat::Json);
        assert_eq!(LogFormat::from_str("structured").unwrap(), LogFormat::Json);
        assert_eq!(LogFormat::from_str("text").unwrap(), LogFormat::Text);
        assert!(LogFormat::from_str("xml").is_err());
    }

    #[test]
    fn test_log_format_deserializes_through_from_str() {
        let config: LoggerConfig = toml::from_str("formatter = \"JSON\"").unwrap();
        assert_eq!(config.formatter, LogFormat::Json);

        let config: LoggerConfig = toml::from_str("formatter = \"Plain\"").unwrap();
        assert_eq!(config.formatter, LogFormat::Text);

        let err = toml::from_str::<LoggerConfig>("formatter = \"xml\"").unwrap_err();
        assert!(err.to_string().contains("unknown log format `xml`"));
    }

    #[test]
    fn test_blank_dsn_is_unset() {
        let reporting = ReportingConfig {
            dsn: Some("  ".to_string()),
            ..Default::default()
        };
        assert_eq!(reporting.dsn(), None);
    }
}
