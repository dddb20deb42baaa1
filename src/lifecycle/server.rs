//! Server orchestrator
//!
//! Drives the hosted apps through `Init → Start → Exit`:
//!
//! ```text
//! init()   settings → loggers → error listeners → App::init (in order, fail-fast)
//! start()  bind → signal listener → App::register_route (in order) → serve
//! exit()   App::clean (in order, best-effort) → drain within the grace period
//! ```

use super::manager::AppRegistry;
use super::shutdown::{FATAL_EXIT_CODE, SIGNAL_EXIT_CODE, Signal, SignalListener};
use super::{App, LifecycleError, Result, ServerState};
use crate::config::{Settings, SettingsLoader};
use crate::engine::{Engine, ShutdownSwitch};
use crate::exception::{ErrorListener, ErrorListenerChain, ReportingErrorListener};
use crate::logger::LoggerRegistry;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Outcome of the non-terminating part of a shutdown
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Apps whose clean hook failed or panicked, in registration order
    pub failed_apps: Vec<String>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.failed_apps.is_empty()
    }
}

/// The application server
///
/// One instance per process. It is configured through [`ServerBuilder`],
/// initialised with `&mut self`, then shared behind an `Arc` so the serve
/// loop and the shutdown path can run on different tasks.
///
/// # Example
///
/// ```rust,ignore
/// use apphost::prelude::*;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let mut server = Server::builder()
///         .app(Arc::new(UsersApp::default()))
///         .app(Arc::new(BillingApp::default()))
///         .build();
///
///     server.init().await?;
///
///     // Blocks until SIGINT/SIGTERM, then exits the process with status 2.
///     Arc::new(server).start().await;
///     Ok(())
/// }
/// ```
pub struct Server {
    apps: AppRegistry,
    loader: SettingsLoader,
    listeners: ErrorListenerChain,
    handle_signals: bool,
    install_global_logger: bool,
    settings: Option<Settings>,
    loggers: Option<LoggerRegistry>,
    state: watch::Sender<ServerState>,
    switch: ShutdownSwitch,
    started: AtomicBool,
    local_addr: OnceLock<SocketAddr>,
    exit_signal: OnceLock<Signal>,
    signal_task: Mutex<Option<JoinHandle<()>>>,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub fn state(&self) -> ServerState {
        *self.state.borrow()
    }

    /// Watch every state transition.
    pub fn subscribe_state(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    /// Address the server is listening on, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    /// Settings loaded by `init`.
    pub fn settings(&self) -> Option<&Settings> {
        self.settings.as_ref()
    }

    /// Loggers built by `init`.
    pub fn loggers(&self) -> Option<&LoggerRegistry> {
        self.loggers.as_ref()
    }

    /// The error listener chain, in dispatch order.
    pub fn listeners(&self) -> &ErrorListenerChain {
        &self.listeners
    }

    pub fn app_names(&self) -> Vec<&str> {
        self.apps.names()
    }

    /// Append a listener. The chain is frozen once the server is shared.
    pub fn add_error_listener(&mut self, listener: Arc<dyn ErrorListener>) {
        self.listeners.push(listener);
    }

    /// Load settings, build loggers and listeners, then initialise every app.
    ///
    /// Apps are initialised in registration order and the first failure is
    /// returned. Apps initialised before it are not rolled back.
    pub async fn init(&mut self) -> Result<()> {
        let state = self.state();
        if state != ServerState::Created {
            return Err(LifecycleError::invalid_state("init", state));
        }

        let settings = self.loader.load()?;
        let reporter = settings.reporter();

        let loggers = LoggerRegistry::init(settings.core(), reporter.clone())?;
        if self.install_global_logger {
            loggers.install_global();
        }

        tracing::info!(
            environment = settings.environment(),
            source = ?settings.source(),
            reporting = reporter.is_some(),
            "Settings loaded"
        );

        self.apps.init_all().await?;

        if let Some(reporter) = reporter {
            self.listeners
                .push(Arc::new(ReportingErrorListener::new(reporter)));
        }

        self.settings = Some(settings);
        self.loggers = Some(loggers);
        self.state.send_replace(ServerState::Initialized);
        Ok(())
    }

    /// Serve requests until shutdown, exiting the process on failure.
    ///
    /// Returns normally after a programmatic [`exit`](Self::exit). After a
    /// signal-driven exit it never returns: the signal path terminates the
    /// process once cleanup is done.
    pub async fn start(self: &Arc<Self>) {
        if let Err(e) = self.serve().await {
            tracing::error!(error = %e, "Server failed");
            std::process::exit(FATAL_EXIT_CODE);
        }

        if self.exit_signal.get().is_some() {
            std::future::pending::<()>().await;
        }
    }

    /// Bind, register routes and serve until shutdown is requested.
    ///
    /// Same as [`start`](Self::start) but hands every failure back to the
    /// caller instead of terminating the process.
    pub async fn serve(self: &Arc<Self>) -> Result<()> {
        let state = self.state();
        if state != ServerState::Initialized {
            return Err(LifecycleError::invalid_state("start", state));
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(LifecycleError::invalid_state("start", ServerState::Running));
        }

        let address = match &self.settings {
            Some(settings) => settings.server().bind_address(),
            None => return Err(LifecycleError::invalid_state("start", state)),
        };
        let listener = match TcpListener::bind(&address).await {
            Ok(listener) => listener,
            Err(source) => {
                self.state.send_replace(ServerState::Stopped);
                return Err(LifecycleError::Bind { address, source });
            }
        };
        let local_addr = listener.local_addr().map_err(LifecycleError::Serve)?;
        let _ = self.local_addr.set(local_addr);

        if self.handle_signals {
            self.spawn_signal_listener();
        }

        let mut engine = Engine::new();
        self.apps.register_routes(&mut engine);
        let router = engine.into_router(Arc::new(self.listeners.clone()));

        self.switch.mark_serving();
        if !self.transition(ServerState::Initialized, ServerState::Running) {
            // Shutdown won the race before the first accept.
            self.switch.mark_stopped();
            return Ok(());
        }

        tracing::info!(address = %local_addr, "Server listening");

        let result = axum::serve(listener, router)
            .with_graceful_shutdown(self.switch.requested())
            .await;

        self.switch.mark_stopped();
        self.transition(ServerState::Running, ServerState::Stopped);
        tracing::info!("Server stopped accepting connections");

        result.map_err(LifecycleError::Serve)
    }

    /// Clean every app, then stop the serve loop within the grace period.
    ///
    /// Idempotent: only the first call does any work. A timeout leaves the
    /// server in `ShuttingDown` and is returned as an error.
    pub async fn shutdown(&self) -> Result<ShutdownReport> {
        let mut previous = None;
        self.state.send_if_modified(|state| {
            if state.is_terminal() {
                false
            } else {
                previous = Some(*state);
                *state = ServerState::ShuttingDown;
                true
            }
        });
        let Some(previous) = previous else {
            tracing::debug!("Shutdown already in progress");
            return Ok(ShutdownReport::default());
        };

        tracing::info!(from = %previous, "Shutting down");

        let failed_apps = self.apps.clean_all().await;

        let grace = self.grace_period();
        self.switch.shutdown(grace).await?;

        self.state.send_replace(ServerState::Stopped);
        tracing::info!("Graceful shutdown complete");
        Ok(ShutdownReport { failed_apps })
    }

    /// Shut down and apply the process exit policy.
    ///
    /// With `None` the process keeps running and the report is returned.
    /// With a signal the process exits with [`SIGNAL_EXIT_CODE`] after
    /// cleanup. A grace-period timeout is fatal either way.
    pub async fn exit(&self, signal: Option<Signal>) -> ShutdownReport {
        if let Some(signal) = signal {
            let _ = self.exit_signal.set(signal);
            tracing::info!(%signal, "Exiting on signal");
        }

        let report = match self.shutdown().await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(error = %e, "Shutdown failed");
                std::process::exit(FATAL_EXIT_CODE);
            }
        };

        if signal.is_some() {
            std::process::exit(SIGNAL_EXIT_CODE);
        }
        report
    }

    fn grace_period(&self) -> std::time::Duration {
        self.settings
            .as_ref()
            .map(|settings| settings.server().shutdown_timeout())
            .unwrap_or_else(|| crate::config::ServerConfig::default().shutdown_timeout())
    }

    fn transition(&self, from: ServerState, to: ServerState) -> bool {
        self.state.send_if_modified(|state| {
            if *state == from {
                *state = to;
                true
            } else {
                false
            }
        })
    }

    /// Install the signal handlers now, so a signal sent once the server
    /// reports `Running` is never missed, and act on it from a task.
    fn spawn_signal_listener(self: &Arc<Self>) {
        let mut signals = match SignalListener::install() {
            Ok(signals) => signals,
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handlers, signals are ignored");
                return;
            }
        };

        let server: Weak<Self> = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            let signal = signals.recv().await;
            match server.upgrade() {
                Some(server) => {
                    server.exit(Some(signal)).await;
                }
                None => tracing::debug!(%signal, "Server already dropped"),
            }
        });

        if let Ok(mut slot) = self.signal_task.lock() {
            *slot = Some(task);
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if let Ok(slot) = self.signal_task.get_mut() {
            if let Some(task) = slot.take() {
                task.abort();
            }
        }
    }
}

/// Builder for [`Server`]
///
/// # Example
///
/// ```rust,ignore
/// let server = Server::builder()
///     .config_dir("./config")
///     .app(Arc::new(UsersApp::default()))
///     .named_app("billing", Arc::new(BillingApp::default()))
///     .error_listener(Arc::new(AuditListener))
///     .build();
/// ```
pub struct ServerBuilder {
    apps: AppRegistry,
    loader: SettingsLoader,
    listeners: ErrorListenerChain,
    handle_signals: bool,
    install_global_logger: bool,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            apps: AppRegistry::new(),
            loader: SettingsLoader::new(),
            listeners: ErrorListenerChain::new(),
            handle_signals: true,
            install_global_logger: true,
        }
    }

    /// Host an app, registered under its type name.
    pub fn app<A: App + 'static>(mut self, app: Arc<A>) -> Self {
        self.apps.register(app);
        self
    }

    pub fn named_app(mut self, name: impl Into<String>, app: Arc<dyn App>) -> Self {
        self.apps.register_named(name, app);
        self
    }

    pub fn settings_loader(mut self, loader: SettingsLoader) -> Self {
        self.loader = loader;
        self
    }

    pub fn config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.loader = self.loader.config_dir(dir);
        self
    }

    pub fn environment(mut self, name: impl Into<String>) -> Self {
        self.loader = self.loader.environment(name);
        self
    }

    /// Append a listener after the default one.
    pub fn error_listener(mut self, listener: Arc<dyn ErrorListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Replace the built-in default listener.
    pub fn default_error_listener(mut self, listener: Arc<dyn ErrorListener>) -> Self {
        self.listeners.replace_default(listener);
        self
    }

    /// Whether SIGINT/SIGTERM trigger `exit`. On by default.
    pub fn handle_signals(mut self, enabled: bool) -> Self {
        self.handle_signals = enabled;
        self
    }

    /// Whether `init` installs the default logger globally. On by default.
    pub fn install_global_logger(mut self, enabled: bool) -> Self {
        self.install_global_logger = enabled;
        self
    }

    pub fn build(self) -> Server {
        let (state, _) = watch::channel(ServerState::Created);
        Server {
            apps: self.apps,
            loader: self.loader,
            listeners: self.listeners,
            handle_signals: self.handle_signals,
            install_global_logger: self.install_global_logger,
            settings: None,
            loggers: None,
            state,
            switch: ShutdownSwitch::new(),
            started: AtomicBool::new(false),
            local_addr: OnceLock::new(),
            exit_signal: OnceLock::new(),
            signal_task: Mutex::new(None),
        }
    }
}
