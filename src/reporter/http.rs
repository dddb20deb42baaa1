use super::{ErrorReport, ErrorReporter};
use crate::config::ConfigError;
use anyhow::Context;
use async_trait::async_trait;
use std::time::Duration;
use url::Url;

/// Posts every report as JSON to the configured DSN.
#[derive(Debug, Clone)]
pub struct HttpReporter {
    client: reqwest::Client,
    endpoint: Url,
    environment: String,
}

impl HttpReporter {
    pub fn new(
        dsn: &str,
        environment: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let endpoint = Url::parse(dsn).map_err(|source| ConfigError::InvalidDsn {
            dsn: dsn.to_string(),
            source,
        })?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ConfigError::ReporterClient)?;

        Ok(Self {
            client,
            endpoint,
            environment: environment.into(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl ErrorReporter for HttpReporter {
    async fn capture(&self, mut report: ErrorReport) -> anyhow::Result<()> {
        if report.environment.is_none() {
            report.environment = Some(self.environment.clone());
        }

        self.client
            .post(self.endpoint.clone())
            .json(&report)
            .send()
            .await
            .with_context(|| format!("sending report {}", report.event_id))?
            .error_for_status()
            .context("reporting service rejected the report")?;

        tracing::debug!(event_id = %report.event_id, "Error report delivered");
        Ok(())
    }
}
