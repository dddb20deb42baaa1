//! Serving engine
//!
//! Apps register their routes on an [`Engine`] during start-up. The engine
//! resolves route conflicts (first registrant wins, per path and method),
//! then becomes the axum router the server binds, wrapped in the default
//! middleware stack:
//!
//! ```text
//! request tracing → CORS → error dispatch → panic recovery → app routes
//! ```

mod shutdown;
mod snapshot;

pub use shutdown::ShutdownSwitch;
pub use snapshot::RequestSnapshot;

use crate::error::{HttpError, RequestError};
use crate::exception::{ErrorListenerChain, dispatch_errors};
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::MethodRouter;
use axum::Router;
use std::any::Any;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// HTTP methods a [`MethodRouter`] can hold an endpoint for, keyed by the
/// name of its field.
const METHOD_FIELDS: &[(&str, &str)] = &[
    ("get", "GET"),
    ("head", "HEAD"),
    ("delete", "DELETE"),
    ("options", "OPTIONS"),
    ("patch", "PATCH"),
    ("post", "POST"),
    ("put", "PUT"),
    ("trace", "TRACE"),
    ("connect", "CONNECT"),
];

#[derive(Debug, Clone)]
struct Claim {
    path: String,
    pattern: String,
    nested: bool,
    /// `None` answers every method.
    methods: Option<Vec<&'static str>>,
}

/// Route-registration surface handed to every app.
#[derive(Default)]
pub struct Engine {
    router: Router,
    claims: Vec<Claim>,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `path`.
    ///
    /// Handlers for other methods of the same path are merged. A path and
    /// method that conflict with an earlier registration are skipped with a
    /// warning; the earlier registrant keeps them.
    pub fn route(&mut self, path: &str, method_router: MethodRouter) -> &mut Self {
        let methods = methods_of(&method_router);
        if self.claim(path, false, methods) {
            self.router = std::mem::take(&mut self.router).route(path, method_router);
        }
        self
    }

    /// Mount `router` under `prefix`, which owns every path below it. The
    /// root is not a valid prefix.
    pub fn nest(&mut self, prefix: &str, router: Router) -> &mut Self {
        let trimmed = prefix.trim_end_matches('/');
        if trimmed.is_empty() {
            tracing::warn!(prefix, "Ignoring nested router: cannot mount at the root");
            return self;
        }
        if self.claim(trimmed, true, None) {
            self.router = std::mem::take(&mut self.router).nest(trimmed, router);
        }
        self
    }

    /// Registered paths and prefixes, in registration order.
    pub fn paths(&self) -> Vec<&str> {
        self.claims.iter().map(|c| c.pattern.as_str()).collect()
    }

    /// Methods registered for `path`, `None` when nothing answers it or a
    /// catch-all handler does.
    pub fn methods(&self, path: &str) -> Option<Vec<&'static str>> {
        let pattern = normalize(path);
        self.claims
            .iter()
            .find(|claim| !claim.nested && claim.pattern == pattern)
            .and_then(|claim| claim.methods.clone())
    }

    fn claim(
        &mut self,
        path: &str,
        nested: bool,
        methods: Option<Vec<&'static str>>,
    ) -> bool {
        if !path.starts_with('/') {
            tracing::warn!(path, "Ignoring route: paths must start with `/`");
            return false;
        }

        let pattern = normalize(path);
        let mut same_path = None;
        for (index, claim) in self.claims.iter().enumerate() {
            let shadowed = (claim.nested && is_under(&pattern, &claim.pattern))
                || (nested && is_under(&claim.pattern, &pattern));
            let clash = claim.pattern == pattern
                && (claim.path != path || overlaps(claim.methods.as_deref(), methods.as_deref()));

            if shadowed || clash {
                tracing::warn!(
                    path,
                    existing = %claim.path,
                    methods = ?methods,
                    "Route conflicts with an earlier registration, keeping the first"
                );
                return false;
            }
            if claim.pattern == pattern {
                same_path = Some(index);
            }
        }

        match same_path {
            Some(index) => {
                if let (Some(existing), Some(added)) = (&mut self.claims[index].methods, methods) {
                    existing.extend(added);
                }
            }
            None => self.claims.push(Claim {
                path: path.to_string(),
                pattern,
                nested,
                methods,
            }),
        }
        true
    }

    /// Final router with the default middleware stack around every route.
    pub(crate) fn into_router(self, listeners: Arc<ErrorListenerChain>) -> Router {
        self.router.fallback(not_found).layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn_with_state(listeners, dispatch_errors))
                .layer(CatchPanicLayer::custom(panic_response)),
        )
    }
}

/// Path parameters compare equal whatever their name.
fn normalize(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if segment.starts_with("{*") {
                "{*}"
            } else if segment.starts_with('{') {
                "{}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn is_under(path: &str, prefix: &str) -> bool {
    path == prefix || path.starts_with(&format!("{prefix}/"))
}

fn overlaps(first: Option<&[&str]>, second: Option<&[&str]>) -> bool {
    match (first, second) {
        (Some(first), Some(second)) => first.iter().any(|method| second.contains(method)),
        _ => true,
    }
}

/// Methods `method_router` has endpoints for, `None` if it has a fallback
/// answering any method.
///
/// axum has no accessor for this, so it is read off the `Debug` output, where
/// an unset endpoint prints as `None` and an unset fallback as `Default(..)`.
/// Output that cannot be read is treated as a catch-all.
fn methods_of(method_router: &MethodRouter) -> Option<Vec<&'static str>> {
    let debug = format!("{method_router:?}");
    let field = |name: &str| {
        debug
            .find(&format!(" {name}: "))
            .map(|at| &debug[at + name.len() + 3..])
    };

    if !field("fallback")?.starts_with("Default(") {
        return None;
    }

    let mut methods = Vec::new();
    for (name, method) in METHOD_FIELDS {
        if !field(name)?.starts_with("None") {
            methods.push(*method);
        }
    }
    Some(methods)
}

async fn not_found() -> RequestError {
    HttpError::from_status(StatusCode::NOT_FOUND).into()
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    RequestError::internal(format!("handler panicked: {detail}")).into_response()
}
