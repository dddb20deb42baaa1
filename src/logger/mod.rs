//! Logger registry
//!
//! One default logger plus any number of named loggers, each with its own
//! level, output target and format. Every logger is an independent
//! `tracing` dispatcher, built once from configuration and never
//! reconfigured; a different setup requires a new registry.
//!
//! ```toml
//! [logger]
//! level = "info"
//! formatter = "json"
//!
//! [loggers.audit]
//! level = "debug"
//! file = "/var/log/app/audit.log"
//! formatter = "text"
//! ```

mod hook;

pub use hook::ReportingLayer;

use crate::config::{CoreConfig, LogFormat, LoggerConfig};
use crate::reporter::ErrorReporter;
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{Dispatch, Level};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::{Registry, fmt};

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("Invalid level `{level}` for logger {logger}")]
    InvalidLevel { logger: String, level: String },

    #[error("Unable to open log file {path:?} for logger {logger}: {source}")]
    OpenFile {
        logger: String,
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A configured logger
///
/// Events are routed to it by running code inside [`Logger::in_scope`], or
/// through the convenience methods for one-off messages.
#[derive(Clone)]
pub struct Logger {
    name: Option<String>,
    level: Level,
    format: LogFormat,
    dispatch: Dispatch,
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("level", &self.level)
            .field("format", &self.format)
            .finish()
    }
}

impl Logger {
    fn build(
        name: Option<&str>,
        config: &LoggerConfig,
        reporter: Option<Arc<dyn ErrorReporter>>,
    ) -> Result<Self, LoggerError> {
        let label = name.unwrap_or("default").to_string();
        let level = Level::from_str(config.level.trim()).map_err(|_| LoggerError::InvalidLevel {
            logger: label.clone(),
            level: config.level.clone(),
        })?;

        let writer = match &config.file {
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|source| LoggerError::OpenFile {
                        logger: label.clone(),
                        path: path.clone(),
                        source,
                    })?;
                BoxMakeWriter::new(Mutex::new(file))
            }
            None => BoxMakeWriter::new(std::io::stdout),
        };

        let output: Box<dyn Layer<Registry> + Send + Sync> = match config.formatter {
            LogFormat::Json => fmt::layer()
                .json()
                .with_writer(writer)
                .with_ansi(config.color)
                .boxed(),
            LogFormat::Text => fmt::layer()
                .with_writer(writer)
                .with_ansi(config.color)
                .boxed(),
        };

        let subscriber = Registry::default()
            .with(output)
            .with(reporter.map(ReportingLayer::new))
            .with(LevelFilter::from_level(level));

        Ok(Self {
            name: name.map(str::to_string),
            level,
            format: config.formatter,
            dispatch: Dispatch::new(subscriber),
        })
    }

    /// `None` for the default logger
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn format(&self) -> LogFormat {
        self.format
    }

    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Run `f` with this logger receiving every event it emits.
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }

    pub fn debug(&self, message: &str) {
        self.in_scope(|| tracing::debug!(logger = self.label(), "{message}"));
    }

    pub fn info(&self, message: &str) {
        self.in_scope(|| tracing::info!(logger = self.label(), "{message}"));
    }

    pub fn warn(&self, message: &str) {
        self.in_scope(|| tracing::warn!(logger = self.label(), "{message}"));
    }

    pub fn error(&self, message: &str) {
        self.in_scope(|| tracing::error!(logger = self.label(), "{message}"));
    }

    fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("default")
    }
}

/// The default logger and the name-keyed auxiliary loggers
#[derive(Debug, Clone)]
pub struct LoggerRegistry {
    default: Logger,
    named: BTreeMap<String, Logger>,
}

impl LoggerRegistry {
    /// Build every logger described by `config`.
    ///
    /// When a reporter is given, ERROR events of the default logger are
    /// forwarded to it. Opening a log file is the only I/O performed; its
    /// failure aborts the whole registry.
    pub fn init(
        config: &CoreConfig,
        reporter: Option<Arc<dyn ErrorReporter>>,
    ) -> Result<Self, LoggerError> {
        let default = Logger::build(None, &config.logger, reporter)?;

        let mut named = BTreeMap::new();
        for (name, logger_config) in &config.loggers {
            named.insert(name.clone(), Logger::build(Some(name), logger_config, None)?);
        }

        Ok(Self { default, named })
    }

    pub fn default_logger(&self) -> &Logger {
        &self.default
    }

    pub fn get(&self, name: &str) -> Option<&Logger> {
        self.named.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.named.keys().map(String::as_str)
    }

    /// Make the default logger the process-wide `tracing` dispatcher.
    ///
    /// Returns false when another global subscriber was installed first.
    pub fn install_global(&self) -> bool {
        match tracing::dispatcher::set_global_default(self.default.dispatch.clone()) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("Global logger already installed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn logger_config(level: &str, file: PathBuf, formatter: LogFormat) -> LoggerConfig {
        LoggerConfig {
            level: level.to_string(),
            file: Some(file),
            formatter,
            color: false,
        }
    }

    #[test]
    fn test_named_loggers_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let default_path = dir.path().join("app.log");
        let audit_path = dir.path().join("audit.log");

        let mut config = CoreConfig::default();
        config.logger = logger_config("warn", default_path.clone(), LogFormat::Json);
        config
            .loggers
            .insert("audit".to_string(), logger_config("debug", audit_path.clone(), LogFormat::Text));

        let registry = LoggerRegistry::init(&config, None).unwrap();
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["audit"]);

        let default = registry.default_logger();
        assert_eq!(default.name(), None);
        default.info("filtered out");
        default.warn("disk almost full");

        let audit = registry.get("audit").unwrap();
        assert_eq!(audit.level(), Level::DEBUG);
        audit.debug("user 42 signed in");

        let app_log = fs::read_to_string(&default_path).unwrap();
        assert!(!app_log.contains("filtered out"));
        assert!(app_log.contains("disk almost full"));
        assert!(app_log.contains("\"level\":\"WARN\""));

        let audit_log = fs::read_to_string(&audit_path).unwrap();
        assert!(audit_log.contains("user 42 signed in"));
        assert!(!audit_log.contains("disk almost full"));
    }

    #[test]
    fn test_unknown_logger_is_none() {
        let registry = LoggerRegistry::init(&CoreConfig::default(), None).unwrap();
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.default_logger().level(), Level::INFO);
    }

    #[test]
    fn test_invalid_level_is_rejected() {
        let mut config = CoreConfig::default();
        config.logger.level = "loud".to_string();

        let err = LoggerRegistry::init(&config, None).unwrap_err();
        assert!(matches!(err, LoggerError::InvalidLevel { .. }));
    }

    #[test]
    fn test_unopenable_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = CoreConfig::default();
        config.loggers.insert(
            "audit".to_string(),
            logger_config("info", dir.path().join("missing").join("audit.log"), LogFormat::Text),
        );

        let err = LoggerRegistry::init(&config, None).unwrap_err();
        assert!(matches!(err, LoggerError::OpenFile { ref logger, .. } if logger == "audit"));
    }
}
