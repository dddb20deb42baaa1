//! Lifecycle-specific error types

use super::ServerState;
use crate::config::ConfigError;
use crate::logger::LoggerError;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while driving the server through its lifecycle
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Settings could not be loaded
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A logger could not be built
    #[error("logger error: {0}")]
    Logger(#[from] LoggerError),

    /// An app's init hook failed; later apps were not initialised
    #[error("init failed for app {app}: {source:#}")]
    AppInit {
        app: String,
        #[source]
        source: anyhow::Error,
    },

    /// The operation is not allowed from the current state
    #[error("cannot {operation} while server is {state}")]
    InvalidState {
        operation: &'static str,
        state: ServerState,
    },

    /// The listening socket could not be opened
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    /// The serve loop stopped with an I/O error
    #[error("server error: {0}")]
    Serve(#[source] io::Error),

    /// In-flight requests did not drain within the grace period
    #[error("graceful shutdown timed out after {0:?}")]
    ShutdownTimeout(Duration),
}

impl LifecycleError {
    pub fn app_init(app: impl Into<String>, source: anyhow::Error) -> Self {
        Self::AppInit {
            app: app.into(),
            source,
        }
    }

    pub fn invalid_state(operation: &'static str, state: ServerState) -> Self {
        Self::InvalidState { operation, state }
    }
}

/// A specialized Result type for lifecycle operations
pub type Result<T> = std::result::Result<T, LifecycleError>;
