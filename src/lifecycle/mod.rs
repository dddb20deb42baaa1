//! Server lifecycle
//!
//! The orchestrator that owns the hosted apps and sequences their hooks.
//!
//! # Lifecycle Phases
//!
//! ```text
//! 1. Settings loading (SERVER_ENV → <config_dir>/<env>.toml)
//!    ↓
//! 2. Logger registry + error listener chain
//!    ↓
//! 3. App::init (each app, registration order)   ← fail-fast
//!    ↓
//! 4. Bind + signal listener
//!    ↓
//! 5. App::register_route (each app, registration order)
//!    ↓
//! [Running...]
//!    ↓
//! 6. Shutdown signal (SIGTERM/SIGINT) or Server::exit
//!    ↓
//! 7. App::clean (each app, registration order)  ← best-effort
//!    ↓
//! 8. Drain in-flight requests within the grace period
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use apphost::prelude::*;
//!
//! struct HealthApp;
//!
//! #[async_trait]
//! impl App for HealthApp {
//!     async fn init(&self) -> anyhow::Result<()> {
//!         tracing::info!("Health app ready");
//!         Ok(())
//!     }
//!
//!     fn register_route(&self, engine: &mut Engine) {
//!         engine.route("/health", get(|| async { "ok" }));
//!     }
//!
//!     async fn clean(&self) -> anyhow::Result<()> {
//!         Ok(())
//!     }
//! }
//! ```

mod error;
mod manager;
mod server;
mod shutdown;
mod state;
mod traits;

pub use error::{LifecycleError, Result};
pub use manager::AppRegistry;
pub use server::{Server, ServerBuilder, ShutdownReport};
pub use shutdown::{FATAL_EXIT_CODE, SIGNAL_EXIT_CODE, Signal, SignalListener, shutdown_signal};
pub use state::ServerState;
pub use traits::App;
