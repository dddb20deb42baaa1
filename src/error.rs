use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RequestError>;

/// An explicit, client-facing HTTP failure.
///
/// Handlers return this when the request itself is at fault (bad input,
/// missing resource). It is rendered with its own status and message and is
/// never sent to the error reporter.
#[derive(Debug, Clone, Error)]
#[error("{status}: {message}")]
pub struct HttpError {
    pub status: StatusCode,
    pub message: String,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Uses the canonical reason phrase as the message.
    pub fn from_status(status: StatusCode) -> Self {
        let message = status.canonical_reason().unwrap_or("Unknown Error");
        Self::new(status, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

/// An unhandled error surfaced while serving a request.
///
/// Returning it from a handler does not render anything by itself: the
/// response only carries the error to the dispatch middleware, which hands it
/// to every registered [`ErrorListener`](crate::exception::ErrorListener).
#[derive(Debug, Error)]
pub enum RequestError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("connection closed: {reason}")]
    ConnectionClosed { reason: String },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl RequestError {
    pub fn http(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Http(HttpError::new(status, message))
    }

    pub fn connection_closed(reason: impl Into<String>) -> Self {
        Self::ConnectionClosed {
            reason: reason.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(anyhow::anyhow!(message.into()))
    }

    /// True for failures that already describe client behaviour.
    pub fn is_client_facing(&self) -> bool {
        matches!(self, Self::Http(_) | Self::ConnectionClosed { .. })
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Http(e) => e.status,
            Self::ConnectionClosed { .. } => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Every message in the cause chain, outermost first.
    pub fn chain(&self) -> Vec<String> {
        match self {
            Self::Internal(e) => e.chain().map(|cause| cause.to_string()).collect(),
            other => vec![other.to_string()],
        }
    }
}

/// Response extension carrying a request error to the dispatch middleware.
#[derive(Clone)]
pub(crate) struct ErrorSlot(pub(crate) Arc<RequestError>);

/// Response extension marking a body an app rendered on purpose, so an error
/// status on it is left alone by the dispatch middleware.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Rendered;

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let mut response = self.status().into_response();
        response.extensions_mut().insert(ErrorSlot(Arc::new(self)));
        response
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        RequestError::Http(self).into_response()
    }
}
