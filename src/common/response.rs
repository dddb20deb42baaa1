use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use crate::error::Rendered;
use serde::Serialize;

/// Standard API response envelope
///
/// Every error rendered by the default error listener uses this shape, and
/// apps may return it from their own handlers for a consistent format.
///
/// # Example
/// ```
/// use apphost::common::ApiResponse;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct User {
///     id: String,
/// }
///
/// async fn get_user(id: String) -> ApiResponse<User> {
///     ApiResponse::success(User { id })
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub code: u16,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    pub result: Option<T>,

    #[serde(skip)]
    pub http_status: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a successful response with data
    ///
    /// Defaults to HTTP 200 OK.
    pub fn success(result: T) -> Self {
        Self {
            code: StatusCode::OK.as_u16(),
            message: None,
            result: Some(result),
            http_status: StatusCode::OK,
        }
    }

    /// Create an error response with no result
    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code: status.as_u16(),
            message: Some(message.into()),
            result: None,
            http_status: status,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let mut response = (self.http_status, Json(self)).into_response();
        response.extensions_mut().insert(Rendered);
        response
    }
}
