//! OS signal handling
//!
//! Turns SIGINT and SIGTERM into a [`Signal`] the server can act on.

use std::io;
use strum_macros::Display;
use tokio::signal;

/// Exit status used when the process stops because of a signal.
pub const SIGNAL_EXIT_CODE: i32 = 2;

/// Exit status used when start-up or shutdown fails fatally.
pub const FATAL_EXIT_CODE: i32 = 1;

/// The termination signals the server reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Signal {
    #[strum(to_string = "SIGINT")]
    Interrupt,
    #[strum(to_string = "SIGTERM")]
    Terminate,
}

/// Handlers for the termination signals, installed up front.
///
/// Once installed, SIGINT and SIGTERM no longer terminate the process; they
/// are only delivered through [`recv`](Self::recv).
pub struct SignalListener {
    #[cfg(unix)]
    interrupt: signal::unix::Signal,
    #[cfg(unix)]
    terminate: signal::unix::Signal,
}

impl SignalListener {
    #[cfg(unix)]
    pub fn install() -> io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    #[cfg(not(unix))]
    pub fn install() -> io::Result<Self> {
        Ok(Self {})
    }

    /// Wait for the next termination signal.
    #[cfg(unix)]
    pub async fn recv(&mut self) -> Signal {
        let signal = tokio::select! {
            _ = self.interrupt.recv() => Signal::Interrupt,
            _ = self.terminate.recv() => Signal::Terminate,
        };
        tracing::info!(%signal, "Received termination signal");
        signal
    }

    /// Wait for the next termination signal.
    #[cfg(not(unix))]
    pub async fn recv(&mut self) -> Signal {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!(signal = %Signal::Interrupt, "Received termination signal");
        Signal::Interrupt
    }
}

/// Wait for the first termination signal delivered to the process.
///
/// Handlers that cannot be installed are logged and the future never
/// resolves.
///
/// # Example
///
/// ```rust,ignore
/// use apphost::lifecycle::shutdown_signal;
///
/// tokio::select! {
///     signal = shutdown_signal() => {
///         println!("Received {signal}");
///     }
///     _ = worker.run() => {}
/// }
/// ```
pub async fn shutdown_signal() -> Signal {
    match SignalListener::install() {
        Ok(mut listener) => listener.recv().await,
        Err(e) => {
            tracing::error!("Failed to install signal handlers: {}", e);
            std::future::pending().await
        }
    }
}
