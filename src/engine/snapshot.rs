use crate::error::RequestError;
use axum::body::{Body, Bytes};
use axum::extract::Request;
use axum::http::request::Parts;
use axum::http::{HeaderName, Method, header};
use futures_util::{StreamExt, stream};
use serde::Serialize;
use std::collections::BTreeMap;

/// Largest form body kept in a snapshot.
const MAX_FORM_BYTES: usize = 64 * 1024;

const REDACTED_HEADERS: &[&str] = &[
    "authorization",
    "cookie",
    "proxy-authorization",
    "set-cookie",
    "x-api-key",
    "x-auth-token",
    "x-csrf-token",
];

/// Header name fragments that mark a credential.
const REDACTED_FRAGMENTS: &[&str] = &["token", "secret", "password", "api-key", "apikey"];

/// Forensic view of a request, handed to error listeners and reporters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RequestSnapshot {
    pub method: String,
    pub uri: String,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// First value of every url-encoded form key.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub form: BTreeMap<String, String>,
}

impl RequestSnapshot {
    pub fn from_parts(parts: &Parts) -> Self {
        let headers = parts
            .headers
            .iter()
            .filter(|(name, _)| !is_redacted(name))
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.to_string(), value.to_string()))
            })
            .collect();

        Self {
            method: parts.method.to_string(),
            uri: parts.uri.to_string(),
            headers,
            form: BTreeMap::new(),
        }
    }

    /// Snapshot the request, buffering a small form body so it can be both
    /// recorded and handed on to the handler.
    ///
    /// Bodies without a `Content-Length` (chunked uploads) are read up to the
    /// form limit; past it the form is not recorded and the handler still
    /// receives the full body.
    ///
    /// A body that cannot be read means the client went away; the snapshot is
    /// returned with a `ConnectionClosed` error instead of the request.
    pub(crate) async fn capture(
        request: Request,
    ) -> Result<(Request, Self), (Self, RequestError)> {
        let (parts, body) = request.into_parts();
        let mut snapshot = Self::from_parts(&parts);

        if !carries_form(&parts) {
            return Ok((Request::from_parts(parts, body), snapshot));
        }

        let mut rest = body.into_data_stream();
        let mut chunks: Vec<Bytes> = Vec::new();
        let mut size = 0;
        while let Some(chunk) = rest.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => return Err((snapshot, RequestError::connection_closed(e.to_string()))),
            };
            size += chunk.len();
            chunks.push(chunk);

            if size > MAX_FORM_BYTES {
                let read = stream::iter(chunks.into_iter().map(Ok::<_, axum::Error>));
                let body = Body::from_stream(read.chain(rest));
                return Ok((Request::from_parts(parts, body), snapshot));
            }
        }

        let bytes = Bytes::from(chunks.concat());
        snapshot.form = parse_form(&bytes);
        Ok((Request::from_parts(parts, Body::from(bytes)), snapshot))
    }
}

fn is_redacted(name: &HeaderName) -> bool {
    let name = name.as_str();
    REDACTED_HEADERS.contains(&name) || REDACTED_FRAGMENTS.iter().any(|part| name.contains(part))
}

/// A url-encoded body on a method that carries one, whose declared length
/// (if any) fits the form limit.
fn carries_form(parts: &Parts) -> bool {
    if !matches!(parts.method, Method::POST | Method::PUT | Method::PATCH) {
        return false;
    }

    let is_form = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"));

    let fits = match parts.headers.get(header::CONTENT_LENGTH) {
        None => true,
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|value| value.parse::<usize>().ok())
            .is_some_and(|length| length <= MAX_FORM_BYTES),
    };

    is_form && fits
}

fn parse_form(bytes: &Bytes) -> BTreeMap<String, String> {
    let mut form = BTreeMap::new();
    for (key, value) in url::form_urlencoded::parse(bytes) {
        form.entry(key.into_owned()).or_insert_with(|| value.into_owned());
    }
    form
}
