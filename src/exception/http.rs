use super::{ErrorContext, ErrorListener};
use crate::common::ApiResponse;
use crate::error::RequestError;
use async_trait::async_trait;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Renders a generic error response and logs a warning
#[derive(Debug, Default)]
pub struct DefaultErrorListener;

#[async_trait]
impl ErrorListener for DefaultErrorListener {
    fn name(&self) -> &str {
        "default"
    }

    async fn on_error(&self, error: &RequestError, ctx: &mut ErrorContext) -> anyhow::Result<()> {
        tracing::warn!(
            method = %ctx.request().method,
            uri = %ctx.request().uri,
            "error: {}",
            error
        );
        ctx.set_response(render(error));
        Ok(())
    }
}

/// Map an error to the client-visible envelope.
///
/// Client-facing errors keep their status and message; anything else is a
/// bare 500 so internal details never leak.
pub fn render(error: &RequestError) -> Response {
    let (status, message) = match error {
        RequestError::Http(e) => (e.status, e.message.clone()),
        RequestError::ConnectionClosed { .. } => (
            StatusCode::BAD_REQUEST,
            "Bad Request".to_string(),
        ),
        RequestError::Internal(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error".to_string(),
        ),
    };

    ApiResponse::<()>::error(status, message).into_response()
}
