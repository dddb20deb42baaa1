//! # apphost
//!
//! An application-server scaffold for Rust.
//!
//! apphost owns the lifecycle of a network-facing process that hosts one or
//! more independently owned sub-applications. It wires up configuration,
//! logging and error reporting, and coordinates start-up and graceful,
//! signal-driven shutdown on top of axum.
//!
//! ## Features
//!
//! - **Lifecycle orchestration**: `Init → Start → Exit` with fail-fast init and best-effort clean-up
//! - **Error listener chain**: every unhandled request error reaches each listener, in order
//! - **Logger registry**: a default logger plus named loggers, each with its own level, format and target
//! - **Environment-based settings**: `SERVER_ENV` selects `<config_dir>/<env>.toml`
//! - **Error reporting**: a configured DSN enables reports for request errors and ERROR logs
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use apphost::prelude::*;
//!
//! struct HelloApp;
//!
//! #[async_trait]
//! impl App for HelloApp {
//!     async fn init(&self) -> anyhow::Result<()> {
//!         Ok(())
//!     }
//!
//!     fn register_route(&self, engine: &mut Engine) {
//!         engine.route("/hello", get(|| async { ApiResponse::success("hello") }));
//!     }
//!
//!     async fn clean(&self) -> anyhow::Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut server = Server::builder().app(Arc::new(HelloApp)).build();
//!     server.init().await?;
//!
//!     Arc::new(server).start().await;
//!     Ok(())
//! }
//! ```

pub mod common;
pub mod config;
pub mod engine;
pub mod error;
pub mod exception;
pub mod lifecycle;
pub mod logger;
pub mod reporter;

// Re-export core types
pub use common::ApiResponse;
pub use config::{Settings, SettingsLoader};
pub use engine::Engine;
pub use error::{HttpError, RequestError, Result};
pub use exception::{ErrorContext, ErrorListener, ErrorListenerChain};
pub use lifecycle::{App, LifecycleError, Server, ServerBuilder, ServerState, Signal};
pub use logger::{Logger, LoggerRegistry};
pub use reporter::{ErrorReport, ErrorReporter};

// Re-export commonly used types from dependencies
pub use async_trait::async_trait;
pub use axum;

/// Prelude module for convenient imports
///
/// ```
/// use apphost::prelude::*;
/// ```
pub mod prelude {
    pub use crate::common::ApiResponse;
    pub use crate::config::{Settings, SettingsLoader};
    pub use crate::engine::{Engine, RequestSnapshot};
    pub use crate::error::{HttpError, RequestError};
    pub use crate::exception::{ErrorContext, ErrorListener, ErrorListenerChain};
    pub use crate::lifecycle::{
        App, LifecycleError, Server, ServerBuilder, ServerState, ShutdownReport, Signal,
    };
    pub use crate::logger::{Logger, LoggerRegistry};
    pub use crate::reporter::{ErrorReport, ErrorReporter};
    pub use async_trait::async_trait;
    pub use axum::{
        Json, Router,
        extract::{Path, Query, State},
        http::StatusCode,
        response::{IntoResponse, Response},
        routing::{delete, get, patch, post, put},
    };
    pub use std::sync::Arc;
}
