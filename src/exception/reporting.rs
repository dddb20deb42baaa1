use super::{ErrorContext, ErrorListener};
use crate::error::RequestError;
use crate::reporter::{ErrorReport, ErrorReporter};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Forwards unexpected request errors to the error reporter
///
/// Client-facing failures (explicit HTTP errors, closed connections) are not
/// reported. The response is left untouched, and delivery runs on its own
/// task so the client never waits for the reporting service.
pub struct ReportingErrorListener {
    reporter: Arc<dyn ErrorReporter>,
}

impl ReportingErrorListener {
    pub fn new(reporter: Arc<dyn ErrorReporter>) -> Self {
        Self { reporter }
    }
}

#[async_trait]
impl ErrorListener for ReportingErrorListener {
    fn name(&self) -> &str {
        "reporting"
    }

    async fn on_error(&self, error: &RequestError, ctx: &mut ErrorContext) -> anyhow::Result<()> {
        if error.is_client_facing() {
            return Ok(());
        }

        let request = ctx.request().clone();
        let tags = BTreeMap::from([
            ("endpoint".to_string(), request.uri.clone()),
            ("method".to_string(), request.method.clone()),
        ]);
        let report = ErrorReport::for_request(error, tags, Some(request));

        let reporter = Arc::clone(&self.reporter);
        tokio::spawn(async move {
            if let Err(e) = reporter.capture(report).await {
                tracing::warn!(error = %e, "Failed to report request error");
            }
        });
        Ok(())
    }
}
