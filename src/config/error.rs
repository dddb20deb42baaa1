use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading settings
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unable to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Unable to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid value for `{key}`: {source}")]
    Decode {
        key: String,
        source: toml::de::Error,
    },

    #[error("Invalid reporting DSN `{dsn}`: {source}")]
    InvalidDsn { dsn: String, source: url::ParseError },

    #[error("Unable to build reporting client: {0}")]
    ReporterClient(#[source] reqwest::Error),
}
