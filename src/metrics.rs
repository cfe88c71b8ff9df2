//! Request counters and duration histograms.
//!
//! Metric names:
//! - `api_requests_total` / `api_response_time_ms`: API gateway handler
//! - `demo_requests_total` / `demo_processing_duration_ms`: event handler
//!
//! Recording goes through the [`MetricsRecorder`] trait. The default
//! [`FacadeRecorder`] forwards to the `metrics` facade, which is a no-op
//! until the application installs an exporter.

use std::sync::{Arc, Mutex};

pub const API_REQUESTS_TOTAL: &str = "api_requests_total";
pub const API_RESPONSE_TIME_MS: &str = "api_response_time_ms";
pub const DEMO_REQUESTS_TOTAL: &str = "demo_requests_total";
pub const DEMO_PROCESSING_DURATION_MS: &str = "demo_processing_duration_ms";

/// Label set attached to one observation.
pub type Tags = Vec<(&'static str, String)>;

/// Success/error classification of one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Error,
}

impl Outcome {
    pub fn as_tag(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Error => "error",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Outcome::Success => 200,
            Outcome::Error => 500,
        }
    }
}

/// Fire-and-forget metric sink.
///
/// Implementations must not panic and must not block; failures belong to
/// the metrics backend and are dropped here.
pub trait MetricsRecorder: Send + Sync {
    /// Add one to the counter `name`.
    fn increment(&self, name: &'static str, tags: &Tags);

    /// Record a duration in milliseconds on the histogram `name`.
    fn observe_duration(&self, name: &'static str, millis: f64, tags: &Tags);
}

/// Forwards to the global `metrics` recorder.
#[derive(Clone, Default)]
pub struct FacadeRecorder;

fn labels(tags: &Tags) -> Vec<::metrics::Label> {
    tags.iter()
        .map(|(key, value)| ::metrics::Label::new(*key, value.clone()))
        .collect()
}

impl MetricsRecorder for FacadeRecorder {
    fn increment(&self, name: &'static str, tags: &Tags) {
        ::metrics::counter!(name, labels(tags)).increment(1);
    }

    fn observe_duration(&self, name: &'static str, millis: f64, tags: &Tags) {
        ::metrics::histogram!(name, labels(tags)).record(millis);
    }
}

/// One recorded observation, as kept by [`InMemoryRecorder`].
#[derive(Debug, Clone, PartialEq)]
pub enum MetricEvent {
    Counter {
        name: &'static str,
        tags: Tags,
    },
    Histogram {
        name: &'static str,
        millis: f64,
        tags: Tags,
    },
}

impl MetricEvent {
    pub fn name(&self) -> &'static str {
        match self {
            MetricEvent::Counter { name, .. } | MetricEvent::Histogram { name, .. } => *name,
        }
    }

    /// Value of the label `key`, if present.
    pub fn tag(&self, key: &str) -> Option<&str> {
        let tags = match self {
            MetricEvent::Counter { tags, .. } | MetricEvent::Histogram { tags, .. } => tags,
        };
        tags.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str())
    }
}

/// Keeps every observation in memory.
#[derive(Clone, Default)]
pub struct InMemoryRecorder {
    events: Arc<Mutex<Vec<MetricEvent>>>,
}

impl InMemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MetricEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn counters(&self, name: &str) -> Vec<MetricEvent> {
        self.events()
            .into_iter()
            .filter(|e| matches!(e, MetricEvent::Counter { .. }) && e.name() == name)
            .collect()
    }

    pub fn histograms(&self, name: &str) -> Vec<MetricEvent> {
        self.events()
            .into_iter()
            .filter(|e| matches!(e, MetricEvent::Histogram { .. }) && e.name() == name)
            .collect()
    }

    fn push(&self, event: MetricEvent) {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).push(event);
    }
}

impl MetricsRecorder for InMemoryRecorder {
    fn increment(&self, name: &'static str, tags: &Tags) {
        self.push(MetricEvent::Counter {
            name,
            tags: tags.clone(),
        });
    }

    fn observe_duration(&self, name: &'static str, millis: f64, tags: &Tags) {
        self.push(MetricEvent::Histogram {
            name,
            millis,
            tags: tags.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facade_recorder_without_exporter_is_silent() {
        let recorder = FacadeRecorder;
        let tags: Tags = vec![("method", "GET".into()), ("outcome", "success".into())];
        recorder.increment(API_REQUESTS_TOTAL, &tags);
        recorder.observe_duration(API_RESPONSE_TIME_MS, 12.0, &tags);
    }

    #[test]
    fn in_memory_recorder_keeps_tags() {
        let recorder = InMemoryRecorder::new();
        recorder.increment(DEMO_REQUESTS_TOTAL, &vec![("outcome", "error".into())]);
        recorder.observe_duration(DEMO_PROCESSING_DURATION_MS, 5.0, &Vec::new());

        let counters = recorder.counters(DEMO_REQUESTS_TOTAL);
        assert_eq!(counters.len(), 1);
        assert_eq!(counters[0].tag("outcome"), Some("error"));
        assert_eq!(recorder.histograms(DEMO_PROCESSING_DURATION_MS).len(), 1);
        assert!(recorder.counters(API_REQUESTS_TOTAL).is_empty());
    }

    #[test]
    fn outcome_maps_to_status() {
        assert_eq!(Outcome::Success.status_code(), 200);
        assert_eq!(Outcome::Error.as_tag(), "error");
    }
}
