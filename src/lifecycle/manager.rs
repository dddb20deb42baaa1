//! App registry
//!
//! Runs the app hooks in registration order with the policy each phase
//! needs: fail-fast init, best-effort clean.

use super::{App, LifecycleError, Result};
use crate::engine::Engine;
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

struct RegisteredApp {
    name: String,
    app: Arc<dyn App>,
}

/// Ordered set of apps hosted by a server
///
/// # Example
///
/// ```rust,ignore
/// use apphost::lifecycle::AppRegistry;
///
/// let mut registry = AppRegistry::new();
/// registry.register(Arc::new(UsersApp::new()));
/// registry.register_named("billing", Arc::new(BillingApp::new()));
///
/// registry.init_all().await?;
/// // ... server runs ...
/// let failed = registry.clean_all().await;
/// ```
#[derive(Default)]
pub struct AppRegistry {
    apps: Vec<RegisteredApp>,
}

impl AppRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an app under its type name.
    pub fn register<A: App + 'static>(&mut self, app: Arc<A>) {
        let name = short_type_name::<A>();
        self.register_named(name, app);
    }

    pub fn register_named(&mut self, name: impl Into<String>, app: Arc<dyn App>) {
        self.apps.push(RegisteredApp {
            name: name.into(),
            app,
        });
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.apps.iter().map(|a| a.name.as_str()).collect()
    }

    /// Initialise every app in order, stopping at the first failure.
    ///
    /// Apps initialised before the failing one are not rolled back.
    pub async fn init_all(&self) -> Result<()> {
        tracing::info!("Initializing {} apps...", self.apps.len());

        for registered in &self.apps {
            tracing::debug!("Initializing: {}", registered.name);
            registered.app.init().await.map_err(|e| {
                tracing::error!("Init failed for {}: {:#}", registered.name, e);
                LifecycleError::app_init(&registered.name, e)
            })?;
            tracing::debug!("Initialized: {}", registered.name);
        }

        tracing::info!("Init complete ({} apps)", self.apps.len());
        Ok(())
    }

    /// Let every app register its routes, in order.
    pub fn register_routes(&self, engine: &mut Engine) {
        for registered in &self.apps {
            tracing::debug!("Registering routes: {}", registered.name);
            registered.app.register_route(engine);
        }
    }

    /// Clean every app in order, whatever happens to the others.
    ///
    /// Returns the names of the apps whose clean-up failed or panicked.
    pub async fn clean_all(&self) -> Vec<String> {
        tracing::info!("Cleaning {} apps...", self.apps.len());

        let mut failed = Vec::new();
        for registered in &self.apps {
            tracing::debug!("Cleaning: {}", registered.name);
            match AssertUnwindSafe(registered.app.clean()).catch_unwind().await {
                Ok(Ok(())) => tracing::debug!("Cleaned: {}", registered.name),
                Ok(Err(e)) => {
                    // Log error but continue with other apps
                    tracing::error!("Clean failed for {}: {:#}", registered.name, e);
                    failed.push(registered.name.clone());
                }
                Err(_) => {
                    tracing::error!("Clean panicked for {}", registered.name);
                    failed.push(registered.name.clone());
                }
            }
        }

        tracing::info!(
            "Clean complete ({} apps, {} failed)",
            self.apps.len(),
            failed.len()
        );
        failed
    }
}

fn short_type_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}
