use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info, Instrument};

use crate::error::SinkError;
use crate::record::{LogLevel, LogRecord};
use crate::sink::LogSink;
use crate::span::{SpanContext, Tracer};

/// Default name of the span wrapping every shipping attempt.
pub const SHIP_SPAN: &str = "send_logs_to_openobserve";

/// Shipping span name used by the API-gateway handler.
pub const API_SHIP_SPAN: &str = "send_api_logs_to_openobserve";

/// Builds [`LogRecord`]s and hands them to the configured sink, one POST
/// per call.
///
/// Shipping is a side channel: [`LogShipper::send`] returns nothing and
/// never fails. A shipper built without a sink (incomplete config) turns
/// every call into a locally logged no-op.
#[derive(Clone)]
pub struct LogShipper {
    sink: Option<Arc<dyn LogSink>>,
    tracer: Tracer,
    service: String,
    function_name: String,
    span_name: &'static str,
}

impl LogShipper {
    pub fn new(
        sink: Option<Arc<dyn LogSink>>,
        tracer: Tracer,
        service: impl Into<String>,
        function_name: impl Into<String>,
    ) -> Self {
        LogShipper {
            sink,
            tracer,
            service: service.into(),
            function_name: function_name.into(),
            span_name: SHIP_SPAN,
        }
    }

    /// Same sink and identity, shipping under a different span name.
    pub fn with_span_name(mut self, span_name: &'static str) -> Self {
        self.span_name = span_name;
        self
    }

    /// A shipper that never sends anything.
    pub fn disabled(tracer: Tracer, service: impl Into<String>) -> Self {
        Self::new(None, tracer, service, "")
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    /// Ship one record, best effort.
    ///
    /// **Parameters**
    /// - `level`, `message`: envelope fields of the record.
    /// - `metadata`: JSON object flattened into the record; its keys win
    ///   over envelope keys.
    /// - `request_id`: correlation id of the current invocation.
    /// - `parent`: span to nest the shipping span under.
    ///
    /// Outcomes are reported through the shipping span and the local log
    /// only: 2xx marks the span OK, anything else marks it ERROR.
    pub async fn send(
        &self,
        level: LogLevel,
        message: &str,
        metadata: Value,
        request_id: &str,
        parent: Option<&SpanContext>,
    ) {
        let mut span = self.tracer.start_span(self.span_name, parent);
        span.set_attribute("request.id", request_id);
        span.set_attribute("log.level", level.as_str());

        let Some(sink) = self.sink.as_ref() else {
            info!(request_id, "OpenObserve credentials not configured, skipping custom log send");
            span.set_attribute("sink.enabled", false);
            return;
        };
        span.set_attribute("sink.name", sink.name());

        let record = LogRecord::new(
            level,
            message,
            self.service.as_str(),
            self.function_name.as_str(),
            request_id,
            metadata,
        );

        info!(request_id, sink = sink.name(), log_message = message, "sending log record");
        let result = sink
            .send(&record)
            .instrument(span.tracing_span().clone())
            .await;

        match result {
            Ok(()) => {
                info!(request_id, "successfully sent log record");
                span.set_ok();
            }
            Err(err @ SinkError::Http { .. }) => {
                let msg = format!("Failed to send logs to {}: {}", sink.name(), err);
                error!(request_id, error = %err, "{}", msg);
                span.set_error(msg);
            }
            Err(err) => {
                let msg = format!("Error sending logs to {}: {}", sink.name(), err);
                error!(request_id, error = %err, "{}", msg);
                span.record_error(&err);
                span.set_error(msg);
            }
        }
    }
}
