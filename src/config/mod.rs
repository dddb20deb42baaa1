//! Process settings
//!
//! Settings are loaded once per process from a TOML file chosen by the
//! deployment environment, overlaid with a handful of environment variables,
//! and are read-only afterwards.
//!
//! ```text
//! SERVER_ENV (default "local")
//!     → <config_dir>/<env>.toml
//!     → environment overrides (SERVER_PORT, LOG_LEVEL, ...)
//!     → CoreConfig + optional error reporter
//! ```

mod error;
pub mod schema;

pub use error::ConfigError;
pub use schema::{CoreConfig, LogFormat, LoggerConfig, ReportingConfig, ServerConfig};

use crate::reporter::{ErrorReporter, HttpReporter};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use toml::{Table, Value};

pub const ENV_VAR: &str = "SERVER_ENV";
pub const CONFIG_DIR_VAR: &str = "CONFIG_DIR";
pub const DEFAULT_ENV: &str = "local";
pub const DEFAULT_CONFIG_DIR: &str = "config";

/// Environment variables that override keys of the config file.
const OVERRIDES: &[(&str, &str, Scalar)] = &[
    ("SERVER_HOST", "server.host", Scalar::Str),
    ("SERVER_PORT", "server.port", Scalar::Int),
    ("LOG_LEVEL", "logger.level", Scalar::Str),
    ("LOG_FORMAT", "logger.formatter", Scalar::Str),
    ("LOG_FILE", "logger.file", Scalar::Str),
    ("REPORTING_DSN", "reporting.dsn", Scalar::Str),
];

/// TOML type an override is inserted as.
#[derive(Debug, Clone, Copy)]
enum Scalar {
    Str,
    Int,
}

impl Scalar {
    /// A value that does not fit stays a string, so decoding names the key.
    fn parse(self, raw: &str) -> Value {
        match self {
            Scalar::Int => raw
                .trim()
                .parse::<i64>()
                .map(Value::Integer)
                .unwrap_or_else(|_| Value::String(raw.to_string())),
            Scalar::Str => Value::String(raw.to_string()),
        }
    }
}

/// Immutable process configuration
#[derive(Clone)]
pub struct Settings {
    environment: String,
    source: Option<PathBuf>,
    values: Table,
    core: CoreConfig,
    reporter: Option<Arc<dyn ErrorReporter>>,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("environment", &self.environment)
            .field("source", &self.source)
            .field("core", &self.core)
            .field("reporting", &self.reporter.is_some())
            .finish()
    }
}

impl Settings {
    pub fn loader() -> SettingsLoader {
        SettingsLoader::new()
    }

    /// Deployment environment name
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// File the settings were read from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn core(&self) -> &CoreConfig {
        &self.core
    }

    pub fn server(&self) -> &ServerConfig {
        &self.core.server
    }

    /// Error-reporting client, present only when a DSN is configured
    pub fn reporter(&self) -> Option<Arc<dyn ErrorReporter>> {
        self.reporter.clone()
    }

    /// Whether a dotted key such as `server.port` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    /// Typed lookup of a dotted key.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        self.lookup(key)
            .map(|value| {
                value.clone().try_into().map_err(|source| ConfigError::Decode {
                    key: key.to_string(),
                    source,
                })
            })
            .transpose()
    }

    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T, ConfigError> {
        Ok(self.get(key)?.unwrap_or(default))
    }

    /// Decode the whole configuration into an application schema.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        decode_table(&self.values, "<root>")
    }

    fn lookup(&self, key: &str) -> Option<&Value> {
        let mut parts = key.split('.');
        let mut current = self.values.get(parts.next()?)?;
        for part in parts {
            current = current.as_table()?.get(part)?;
        }
        Some(current)
    }
}

/// Builder that resolves and loads [`Settings`]
///
/// Every input falls back to the process environment, so
/// `SettingsLoader::new().load()` is the production path while tests pin the
/// environment name, directory and variables explicitly.
#[derive(Debug, Clone, Default)]
pub struct SettingsLoader {
    config_dir: Option<PathBuf>,
    environment: Option<String>,
    vars: Option<HashMap<String, String>>,
}

impl SettingsLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory holding `<env>.toml`. The file becomes mandatory.
    pub fn config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = Some(dir.into());
        self
    }

    /// Environment name, instead of reading `SERVER_ENV`.
    pub fn environment(mut self, name: impl Into<String>) -> Self {
        self.environment = Some(name.into());
        self
    }

    /// Variables to use instead of the process environment.
    pub fn vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.vars = Some(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    pub fn load(&self) -> Result<Settings, ConfigError> {
        let vars = match &self.vars {
            Some(vars) => vars.clone(),
            None => std::env::vars().collect(),
        };

        let environment = self
            .environment
            .clone()
            .or_else(|| vars.get(ENV_VAR).cloned())
            .filter(|env| !env.is_empty())
            .unwrap_or_else(|| DEFAULT_ENV.to_string());

        // A directory named by the caller must contain the file; the
        // conventional default may be absent.
        let (dir, required) = match (&self.config_dir, vars.get(CONFIG_DIR_VAR)) {
            (Some(dir), _) => (dir.clone(), true),
            (None, Some(dir)) => (PathBuf::from(dir), true),
            (None, None) => (PathBuf::from(DEFAULT_CONFIG_DIR), false),
        };
        let path = dir.join(format!("{environment}.toml"));

        let (mut values, source) = match std::fs::read_to_string(&path) {
            Ok(content) => {
                let table = content
                    .parse::<Table>()
                    .map_err(|source| ConfigError::Parse {
                        path: path.clone(),
                        source,
                    })?;
                (table, Some(path))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
                tracing::info!(path = ?path, "No config file found, using defaults");
                (Table::new(), None)
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };

        apply_overrides(&mut values, &vars);

        let core: CoreConfig = decode_table(&values, "<root>")?;
        let reporter = match core.reporting.dsn() {
            Some(dsn) => {
                let reporter = HttpReporter::new(
                    dsn,
                    environment.clone(),
                    Duration::from_millis(core.reporting.timeout_ms),
                )?;
                tracing::info!(endpoint = %reporter.endpoint(), "Error reporting enabled");
                Some(Arc::new(reporter) as Arc<dyn ErrorReporter>)
            }
            None => None,
        };

        Ok(Settings {
            environment,
            source,
            values,
            core,
            reporter,
        })
    }

    /// Load settings and decode them into an application schema.
    pub fn load_into<T: DeserializeOwned>(&self) -> Result<(Settings, T), ConfigError> {
        let settings = self.load()?;
        let target = settings.decode()?;
        Ok((settings, target))
    }
}

fn decode_table<T: DeserializeOwned>(table: &Table, key: &str) -> Result<T, ConfigError> {
    Value::Table(table.clone())
        .try_into()
        .map_err(|source| ConfigError::Decode {
            key: key.to_string(),
            source,
        })
}

fn apply_overrides(values: &mut Table, vars: &HashMap<String, String>) {
    for (var, key, kind) in OVERRIDES {
        if let Some(raw) = vars.get(*var) {
            insert_dotted(values, key, kind.parse(raw));
        }
    }
}

fn insert_dotted(table: &mut Table, key: &str, value: Value) {
    match key.split_once('.') {
        None => {
            table.insert(key.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = table
                .entry(head.to_string())
                .or_insert_with(|| Value::Table(Table::new()));
            if !entry.is_table() {
                *entry = Value::Table(Table::new());
            }
            if let Value::Table(inner) = entry {
                insert_dotted(inner, rest, value);
            }
        }
    }
}
