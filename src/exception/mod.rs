//! Error listener chain
//!
//! Every unhandled request error is delivered to each registered
//! [`ErrorListener`] in registration order. The built-in
//! [`DefaultErrorListener`] comes first and renders the client response;
//! further listeners (error reporting, custom handlers) usually only observe.
//! A listener that fails or panics is logged and skipped, it never stops
//! delivery to the listeners after it.

pub mod http;
mod layer;
pub mod reporting;

pub use http::DefaultErrorListener;
pub use reporting::ReportingErrorListener;

pub(crate) use layer::dispatch_errors;

use crate::engine::RequestSnapshot;
use crate::error::RequestError;
use async_trait::async_trait;
use axum::response::Response;
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// State shared by the listeners handling one error.
pub struct ErrorContext {
    request: RequestSnapshot,
    response: Option<Response>,
}

impl ErrorContext {
    pub fn new(request: RequestSnapshot) -> Self {
        Self {
            request,
            response: None,
        }
    }

    pub fn request(&self) -> &RequestSnapshot {
        &self.request
    }

    /// Set the response sent to the client, replacing any earlier one.
    pub fn set_response(&mut self, response: Response) {
        self.response = Some(response);
    }

    pub fn has_response(&self) -> bool {
        self.response.is_some()
    }
}

/// An observer of unhandled request errors
///
/// # Example
///
/// ```rust,ignore
/// use apphost::prelude::*;
///
/// struct CountingListener(AtomicUsize);
///
/// #[async_trait]
/// impl ErrorListener for CountingListener {
///     async fn on_error(&self, _: &RequestError, _: &mut ErrorContext) -> anyhow::Result<()> {
///         self.0.fetch_add(1, Ordering::Relaxed);
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait ErrorListener: Send + Sync + 'static {
    /// Name used in logs
    fn name(&self) -> &str {
        "listener"
    }

    async fn on_error(&self, error: &RequestError, ctx: &mut ErrorContext) -> anyhow::Result<()>;
}

/// Ordered list of error listeners
#[derive(Clone)]
pub struct ErrorListenerChain {
    listeners: Vec<Arc<dyn ErrorListener>>,
}

impl Default for ErrorListenerChain {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorListenerChain {
    /// A chain holding only the default listener.
    pub fn new() -> Self {
        Self {
            listeners: vec![Arc::new(DefaultErrorListener)],
        }
    }

    /// A chain with no listeners at all.
    pub fn empty() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    pub fn push(&mut self, listener: Arc<dyn ErrorListener>) {
        self.listeners.push(listener);
    }

    /// Swap the first listener for `listener`.
    pub fn replace_default(&mut self, listener: Arc<dyn ErrorListener>) {
        match self.listeners.first_mut() {
            Some(first) => *first = listener,
            None => self.listeners.push(listener),
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.listeners.iter().map(|l| l.name()).collect()
    }

    /// Deliver `error` to every listener and return the response to send.
    ///
    /// Falls back to the default rendering when no listener set a response.
    pub async fn dispatch(&self, error: &RequestError, request: RequestSnapshot) -> Response {
        let mut ctx = ErrorContext::new(request);

        for listener in &self.listeners {
            let outcome = AssertUnwindSafe(listener.on_error(error, &mut ctx))
                .catch_unwind()
                .await;
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(listener = listener.name(), error = %e, "Error listener failed");
                }
                Err(_) => {
                    tracing::error!(listener = listener.name(), "Error listener panicked");
                }
            }
        }

        ctx.response.unwrap_or_else(|| http::render(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use std::sync::Mutex;

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        behaviour: Behaviour,
    }

    enum Behaviour {
        Observe,
        Fail,
        Panic,
        Respond(StatusCode),
    }

    #[async_trait]
    impl ErrorListener for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        async fn on_error(&self, error: &RequestError, ctx: &mut ErrorContext) -> anyhow::Result<()> {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:{}", self.name, error));
            match self.behaviour {
                Behaviour::Observe => Ok(()),
                Behaviour::Fail => anyhow::bail!("listener broke"),
                Behaviour::Panic => panic!("listener exploded"),
                Behaviour::Respond(status) => {
                    ctx.set_response(status.into_response());
                    Ok(())
                }
            }
        }
    }

    fn recorder(
        name: &'static str,
        log: &Arc<Mutex<Vec<String>>>,
        behaviour: Behaviour,
    ) -> Arc<Recorder> {
        Arc::new(Recorder {
            name,
            log: Arc::clone(log),
            behaviour,
        })
    }

    #[tokio::test]
    async fn test_delivers_to_all_in_order_despite_failures() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = ErrorListenerChain::new();
        chain.push(recorder("a", &log, Behaviour::Fail));
        chain.push(recorder("b", &log, Behaviour::Panic));
        chain.push(recorder("c", &log, Behaviour::Observe));

        let error = RequestError::internal("boom");
        let response = chain.dispatch(&error, RequestSnapshot::default()).await;

        assert_eq!(*log.lock().unwrap(), vec!["a:boom", "b:boom", "c:boom"]);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(chain.names(), vec!["default", "a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_replaced_default_renders_response() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = ErrorListenerChain::new();
        chain.replace_default(recorder(
            "custom",
            &log,
            Behaviour::Respond(StatusCode::IM_A_TEAPOT),
        ));

        let error = RequestError::internal("boom");
        let response = chain.dispatch(&error, RequestSnapshot::default()).await;

        assert_eq!(chain.len(), 1);
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
    }

    #[tokio::test]
    async fn test_empty_chain_falls_back_to_default_rendering() {
        let chain = ErrorListenerChain::empty();
        let error = RequestError::http(StatusCode::FORBIDDEN, "nope");

        let response = chain.dispatch(&error, RequestSnapshot::default()).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
