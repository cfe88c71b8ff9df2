use std::sync::Arc;

use tracing::info;

use crate::config::AppConfig;
use crate::metrics::{FacadeRecorder, MetricsRecorder};
use crate::shipper::LogShipper;
use crate::sink::LogSink;
use crate::span::{LogSpanExporter, SpanExporter, Tracer};

/// The instrumentation handles shared by every invocation of the process:
/// span factory, log shipper and metrics recorder.
///
/// Built once at cold start and passed into the handlers; clones share
/// the same underlying handles.
#[derive(Clone)]
pub struct Telemetry {
    pub tracer: Tracer,
    pub shipper: LogShipper,
    pub metrics: Arc<dyn MetricsRecorder>,
}

impl Telemetry {
    pub fn new(tracer: Tracer, shipper: LogShipper, metrics: Arc<dyn MetricsRecorder>) -> Self {
        Telemetry {
            tracer,
            shipper,
            metrics,
        }
    }

    /// Wire up the production stack from resolved configuration: spans to
    /// the local log, metrics to the `metrics` facade, records to
    /// OpenObserve when the sink config is complete.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::with_exporter(config, Arc::new(LogSpanExporter), Arc::new(FacadeRecorder))
    }

    /// Same as [`Telemetry::from_config`] with caller-chosen span exporter
    /// and metrics recorder.
    pub fn with_exporter(
        config: &AppConfig,
        exporter: Arc<dyn SpanExporter>,
        metrics: Arc<dyn MetricsRecorder>,
    ) -> Self {
        let tracer = Tracer::new(config.service_name.as_str(), exporter);
        let shipper = LogShipper::new(
            sink_from_config(config),
            tracer.clone(),
            config.service_name.as_str(),
            config.function_name.as_str(),
        );
        Telemetry::new(tracer, shipper, metrics)
    }
}

/// Build the log sink for `config`, or `None` when shipping is disabled.
#[cfg(feature = "openobserve")]
pub fn sink_from_config(config: &AppConfig) -> Option<Arc<dyn LogSink>> {
    use crate::openobserve::{OpenObserveConfig, OpenObserveSink};

    match OpenObserveConfig::from_sink_config(&config.sink) {
        Some(oo) => {
            info!(url = %oo.url, "OpenObserve log shipping enabled");
            Some(Arc::new(OpenObserveSink::new(oo)) as Arc<dyn LogSink>)
        }
        None => {
            info!("OpenObserve credentials not configured, log shipping disabled");
            None
        }
    }
}

#[cfg(not(feature = "openobserve"))]
pub fn sink_from_config(config: &AppConfig) -> Option<Arc<dyn LogSink>> {
    if config.sink.is_complete() {
        tracing::warn!("openobserve feature is not enabled, log shipping disabled");
    } else {
        info!("OpenObserve credentials not configured, log shipping disabled");
    }
    None
}
