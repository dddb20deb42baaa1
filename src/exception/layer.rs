use super::ErrorListenerChain;
use crate::engine::RequestSnapshot;
use crate::error::{ErrorSlot, HttpError, RequestError, Rendered};
use axum::body::to_bytes;
use axum::extract::{Request, State};
use axum::http::header::ALLOW;
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;

/// Largest framework error body read back as the error message.
const MAX_ERROR_BODY: usize = 64 * 1024;

/// Middleware handing request errors to the listener chain.
///
/// Handlers signal an error by returning a [`RequestError`](crate::error::RequestError),
/// whose response carries it in an extension; the chain then decides what
/// the client actually receives.
///
/// Error statuses produced by the framework itself (a method that is not
/// allowed, an extractor rejection) are turned into an [`HttpError`] with
/// the rejection text as message and dispatched the same way. Responses an
/// app rendered through [`ApiResponse`](crate::common::ApiResponse) pass
/// through untouched.
pub(crate) async fn dispatch_errors(
    State(listeners): State<Arc<ErrorListenerChain>>,
    request: Request,
    next: Next,
) -> Response {
    let (request, snapshot) = match RequestSnapshot::capture(request).await {
        Ok(captured) => captured,
        Err((snapshot, error)) => return listeners.dispatch(&error, snapshot).await,
    };

    let mut response = next.run(request).await;
    if let Some(ErrorSlot(error)) = response.extensions_mut().remove::<ErrorSlot>() {
        return listeners.dispatch(&error, snapshot).await;
    }
    if !is_unhandled(&response) {
        return response;
    }

    let allow = response.headers().get(ALLOW).cloned();
    let error = RequestError::from(framework_error(response).await);
    let mut rendered = listeners.dispatch(&error, snapshot).await;
    if let Some(allow) = allow {
        rendered.headers_mut().insert(ALLOW, allow);
    }
    rendered
}

fn is_unhandled(response: &Response) -> bool {
    let status = response.status();
    (status.is_client_error() || status.is_server_error())
        && response.extensions().get::<Rendered>().is_none()
}

async fn framework_error(response: Response) -> HttpError {
    let status = response.status();
    let message = to_bytes(response.into_body(), MAX_ERROR_BODY)
        .await
        .ok()
        .and_then(|bytes| String::from_utf8(bytes.to_vec()).ok())
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty());

    match message {
        Some(message) => HttpError::new(status, message),
        None => HttpError::from_status(status),
    }
}
