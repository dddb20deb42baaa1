//! Error-reporting boundary
//!
//! An [`ErrorReporter`] forwards failures to an external crash-reporting
//! service. One is only constructed when the configuration carries a
//! reporting DSN; without it reporting is a no-op for the whole process.

mod http;

pub use http::HttpReporter;

use crate::engine::RequestSnapshot;
use crate::error::RequestError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use strum_macros::Display;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single event sent to the reporting service.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub event_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub level: Severity,
    pub message: String,

    /// Cause chain, outermost first.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exception: Vec<String>,

    pub tags: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<RequestSnapshot>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
}

impl ErrorReport {
    pub fn new(level: Severity, message: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            level,
            message: message.into(),
            exception: Vec::new(),
            tags: BTreeMap::new(),
            request: None,
            environment: None,
        }
    }

    pub fn from_error(error: &RequestError) -> Self {
        let mut report = Self::new(Severity::Error, error.to_string());
        report.exception = error.chain();
        report
    }

    /// Report for a request error, with its tags and request snapshot.
    pub fn for_request(
        error: &RequestError,
        tags: BTreeMap<String, String>,
        request: Option<RequestSnapshot>,
    ) -> Self {
        let mut report = Self::from_error(error);
        report.tags.extend(tags);
        report.request = request;
        report
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_request(mut self, request: RequestSnapshot) -> Self {
        self.request = Some(request);
        self
    }
}

/// Client of an external crash-reporting service.
#[async_trait]
pub trait ErrorReporter: Send + Sync + 'static {
    /// Deliver one report.
    async fn capture(&self, report: ErrorReport) -> anyhow::Result<()>;

    /// Report a request error together with its tags and request snapshot.
    async fn capture_error(
        &self,
        error: &RequestError,
        tags: BTreeMap<String, String>,
        request: Option<RequestSnapshot>,
    ) -> anyhow::Result<()> {
        self.capture(ErrorReport::for_request(error, tags, request))
            .await
    }
}
