use crate::reporter::{ErrorReport, ErrorReporter, Severity};
use std::fmt::Debug;
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// Forwards ERROR events to the error reporter.
///
/// Delivery happens on the current tokio runtime; events logged outside a
/// runtime, and events from the reporter itself, are not forwarded.
pub struct ReportingLayer {
    reporter: Arc<dyn ErrorReporter>,
}

impl ReportingLayer {
    pub fn new(reporter: Arc<dyn ErrorReporter>) -> Self {
        Self { reporter }
    }
}

impl<S: Subscriber> Layer<S> for ReportingLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if *metadata.level() != Level::ERROR || metadata.target().starts_with("apphost::reporter")
        {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        let mut report =
            ErrorReport::new(Severity::Error, visitor.message).tag("target", metadata.target());
        report.tags.extend(visitor.fields);

        let reporter = Arc::clone(&self.reporter);
        runtime.spawn(async move {
            if let Err(e) = reporter.capture(report).await {
                tracing::warn!(error = %e, "Failed to report error log");
            }
        });
    }
}

#[derive(Default)]
struct EventVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl Visit for EventVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push((field.name().to_string(), value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields.push((field.name().to_string(), format!("{value:?}")));
        }
    }
}
