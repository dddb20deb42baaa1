//! App lifecycle contract
//!
//! An app is an independently owned unit of business logic hosted by the
//! [`Server`](super::Server). It contributes routes and its own start-up and
//! clean-up logic.

use crate::engine::Engine;
use async_trait::async_trait;

/// A sub-application hosted by the server
///
/// The server drives every hook in registration order:
///
/// - `init` during `Server::init`, fail-fast: the first error aborts start-up
///   and later apps are never initialised.
/// - `register_route` once during start, before connections are accepted.
/// - `clean` during shutdown, best-effort: every app is cleaned even when an
///   earlier one fails.
///
/// Hooks take `&self`; apps keep mutable state behind their own locks.
///
/// # Example
///
/// ```rust,ignore
/// use apphost::prelude::*;
///
/// struct UsersApp {
///     pool: OnceLock<PgPool>,
/// }
///
/// #[async_trait]
/// impl App for UsersApp {
///     async fn init(&self) -> anyhow::Result<()> {
///         let pool = PgPool::connect("postgres://localhost/users").await?;
///         let _ = self.pool.set(pool);
///         Ok(())
///     }
///
///     fn register_route(&self, engine: &mut Engine) {
///         engine.route("/users/{id}", get(find_user));
///     }
///
///     async fn clean(&self) -> anyhow::Result<()> {
///         if let Some(pool) = self.pool.get() {
///             pool.close().await;
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait App: Send + Sync {
    /// Prepare the app before any route is registered.
    async fn init(&self) -> anyhow::Result<()>;

    /// Add this app's routes to the shared engine.
    fn register_route(&self, engine: &mut Engine);

    /// Release the app's resources during shutdown.
    async fn clean(&self) -> anyhow::Result<()>;
}
