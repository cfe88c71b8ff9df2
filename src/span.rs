//! Request-scoped spans with explicit parent linkage.
//!
//! A [`Tracer`] hands out [`ActiveSpan`] guards. Each guard owns its span
//! data and is finalized exactly once: by [`ActiveSpan::end`], by one of
//! the `finish*` helpers, or by `Drop` on any other exit path (early
//! return, `?`, unwinding). Finished spans go to a [`SpanExporter`].
//!
//! Nesting is explicit: children are started with the parent's
//! [`SpanContext`], which is threaded through calls instead of living in
//! thread-local state. Every span also enters a `tracing` span carrying
//! its ids, so local log lines emitted inside it can be correlated.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::Instrument;

use crate::error::error_chain;

/// Identity of a span, handed to children so they can link to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpanContext {
    /// 32 hex chars, shared by every span of one trace.
    pub trace_id: String,
    /// 16 hex chars, unique per span.
    pub span_id: String,
}

impl SpanContext {
    fn root() -> Self {
        SpanContext {
            trace_id: uuid::Uuid::new_v4().simple().to_string(),
            span_id: new_span_id(),
        }
    }

    fn child_of(parent: &SpanContext) -> Self {
        SpanContext {
            trace_id: parent.trace_id.clone(),
            span_id: new_span_id(),
        }
    }
}

fn new_span_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(16);
    id
}

/// Scalar attribute value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::String(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::String(v)
    }
}

impl From<&String> for AttributeValue {
    fn from(v: &String) -> Self {
        AttributeValue::String(v.clone())
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Int(v)
    }
}

impl From<u64> for AttributeValue {
    fn from(v: u64) -> Self {
        AttributeValue::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<usize> for AttributeValue {
    fn from(v: usize) -> Self {
        AttributeValue::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<u16> for AttributeValue {
    fn from(v: u16) -> Self {
        AttributeValue::Int(i64::from(v))
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Float(v)
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Bool(v)
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::String(v) => f.write_str(v),
            AttributeValue::Int(v) => write!(f, "{}", v),
            AttributeValue::Float(v) => write!(f, "{}", v),
            AttributeValue::Bool(v) => write!(f, "{}", v),
        }
    }
}

pub type Attributes = BTreeMap<String, AttributeValue>;

/// Terminal status of a span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SpanStatus {
    /// Nobody set a status before the span ended.
    Unset,
    Ok,
    Error(String),
}

impl SpanStatus {
    pub fn is_error(&self) -> bool {
        matches!(self, SpanStatus::Error(_))
    }
}

/// Point-in-time occurrence inside a span, e.g. a recorded exception.
#[derive(Debug, Clone, Serialize)]
pub struct SpanEvent {
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub attributes: Attributes,
}

/// Immutable record of a span after it ended.
#[derive(Debug, Clone, Serialize)]
pub struct FinishedSpan {
    pub name: &'static str,
    pub context: SpanContext,
    pub parent_span_id: Option<String>,
    pub service_name: String,
    pub start_time: DateTime<Utc>,
    pub duration: Duration,
    pub attributes: Attributes,
    pub events: Vec<SpanEvent>,
    pub status: SpanStatus,
}

impl FinishedSpan {
    /// The recorded `exception` event, if any.
    pub fn exception(&self) -> Option<&SpanEvent> {
        self.events.iter().find(|e| e.name == "exception")
    }
}

/// Destination for finished spans.
///
/// `export` is called synchronously from the guard's finalizer, so
/// implementations must be cheap and must not panic.
pub trait SpanExporter: Send + Sync {
    fn export(&self, span: FinishedSpan);
}

/// Writes one `tracing` debug line per finished span.
#[derive(Clone, Default)]
pub struct LogSpanExporter;

impl SpanExporter for LogSpanExporter {
    fn export(&self, span: FinishedSpan) {
        let status = match &span.status {
            SpanStatus::Unset => "unset",
            SpanStatus::Ok => "ok",
            SpanStatus::Error(_) => "error",
        };
        tracing::debug!(
            name = span.name,
            trace_id = %span.context.trace_id,
            span_id = %span.context.span_id,
            parent_span_id = span.parent_span_id.as_deref().unwrap_or(""),
            duration_ms = duration_ms(span.duration),
            status,
            attributes = span.attributes.len(),
            "span finished"
        );
    }
}

/// Whole milliseconds, saturating at `u64::MAX`.
pub fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Keeps finished spans in memory; handy for tests and local debugging.
#[derive(Clone, Default)]
pub struct InMemorySpanExporter {
    spans: Arc<Mutex<Vec<FinishedSpan>>>,
}

impl InMemorySpanExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything exported so far, in end order.
    pub fn spans(&self) -> Vec<FinishedSpan> {
        self.spans.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn find(&self, name: &str) -> Option<FinishedSpan> {
        self.spans().into_iter().find(|s| s.name == name)
    }
}

impl SpanExporter for InMemorySpanExporter {
    fn export(&self, span: FinishedSpan) {
        self.spans.lock().unwrap_or_else(|e| e.into_inner()).push(span);
    }
}

/// Process-wide span factory. Cheap to clone; clones share counters and
/// the exporter.
#[derive(Clone)]
pub struct Tracer {
    service_name: Arc<str>,
    exporter: Arc<dyn SpanExporter>,
    /// Spans handed out by [`Tracer::start_span`].
    started: Arc<AtomicU64>,
    /// Spans that reached the exporter.
    ended: Arc<AtomicU64>,
}

impl Tracer {
    pub fn new(service_name: impl Into<String>, exporter: Arc<dyn SpanExporter>) -> Self {
        let service_name: String = service_name.into();
        Tracer {
            service_name: Arc::from(service_name),
            exporter,
            started: Arc::new(AtomicU64::new(0)),
            ended: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Start a span, as a root when `parent` is `None`.
    pub fn start_span(&self, name: &'static str, parent: Option<&SpanContext>) -> ActiveSpan {
        let context = match parent {
            Some(parent) => SpanContext::child_of(parent),
            None => SpanContext::root(),
        };
        let parent_span_id = parent.map(|p| p.span_id.clone());

        let tracing_span = tracing::info_span!(
            "span",
            name = name,
            trace_id = %context.trace_id,
            span_id = %context.span_id,
        );

        self.started.fetch_add(1, Ordering::Relaxed);

        ActiveSpan {
            tracer: self.clone(),
            tracing_span,
            context,
            data: Some(SpanData {
                name,
                parent_span_id,
                start_time: Utc::now(),
                started_at: Instant::now(),
                attributes: Attributes::new(),
                events: Vec::new(),
                status: SpanStatus::Unset,
            }),
        }
    }

    /// Run `work` inside a span named `name`.
    ///
    /// The closure receives the new span's context for starting children.
    /// `Ok` marks the span OK; `Err` is recorded as an exception, marks the
    /// span ERROR and is returned unchanged. The span is finalized before
    /// this returns.
    pub async fn in_span<T, E, F, Fut>(
        &self,
        name: &'static str,
        parent: Option<&SpanContext>,
        attributes: Vec<(&'static str, AttributeValue)>,
        work: F,
    ) -> Result<T, E>
    where
        F: FnOnce(SpanContext) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Error + 'static,
    {
        let mut span = self.start_span(name, parent);
        for (key, value) in attributes {
            span.set_attribute(key, value);
        }
        let result = work(span.context().clone())
            .instrument(span.tracing_span().clone())
            .await;
        span.finish(result)
    }

    pub fn started_spans(&self) -> u64 {
        self.started.load(Ordering::Relaxed)
    }

    pub fn ended_spans(&self) -> u64 {
        self.ended.load(Ordering::Relaxed)
    }
}

struct SpanData {
    name: &'static str,
    parent_span_id: Option<String>,
    start_time: DateTime<Utc>,
    started_at: Instant,
    attributes: Attributes,
    events: Vec<SpanEvent>,
    status: SpanStatus,
}

/// Guard for a span in progress.
///
/// Owned exclusively by the frame that started it. Dropping the guard
/// ends the span; ending twice is impossible because `end` consumes it.
pub struct ActiveSpan {
    tracer: Tracer,
    tracing_span: tracing::Span,
    context: SpanContext,
    /// Taken exactly once, on finalize.
    data: Option<SpanData>,
}

impl ActiveSpan {
    pub fn context(&self) -> &SpanContext {
        &self.context
    }

    /// The `tracing` span mirroring this one, for `.instrument(..)`.
    pub fn tracing_span(&self) -> &tracing::Span {
        &self.tracing_span
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<AttributeValue>) {
        if let Some(data) = self.data.as_mut() {
            data.attributes.insert(key.into(), value.into());
        }
    }

    pub fn set_status(&mut self, status: SpanStatus) {
        if let Some(data) = self.data.as_mut() {
            data.status = status;
        }
    }

    pub fn set_ok(&mut self) {
        self.set_status(SpanStatus::Ok);
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.set_status(SpanStatus::Error(message.into()));
    }

    /// Record `err` as an `exception` event and mark the span ERROR with
    /// the error's message.
    pub fn record_error<E>(&mut self, err: &E)
    where
        E: Error + 'static,
    {
        self.record_exception(std::any::type_name::<E>(), err);
        self.set_error(err.to_string());
    }

    /// Record an `exception` event without touching the status.
    pub fn record_exception(&mut self, kind: &str, err: &(dyn Error + 'static)) {
        if let Some(data) = self.data.as_mut() {
            let mut attributes = Attributes::new();
            attributes.insert("exception.type".into(), kind.into());
            attributes.insert("exception.message".into(), err.to_string().into());
            attributes.insert("exception.stacktrace".into(), error_chain(err).into());
            data.events.push(SpanEvent {
                name: "exception".to_string(),
                timestamp: Utc::now(),
                attributes,
            });
        }
    }

    /// Settle the span from `result` and end it, returning `result` as is.
    pub fn finish<T, E>(self, result: Result<T, E>) -> Result<T, E>
    where
        E: Error + 'static,
    {
        self.finish_with(result, |_, _| {})
    }

    /// Like [`finish`](Self::finish), letting the caller attach
    /// result-derived attributes before the span is marked OK.
    pub fn finish_with<T, E, F>(mut self, result: Result<T, E>, on_ok: F) -> Result<T, E>
    where
        E: Error + 'static,
        F: FnOnce(&T, &mut ActiveSpan),
    {
        match &result {
            Ok(value) => {
                on_ok(value, &mut self);
                self.set_ok();
            }
            Err(err) => self.record_error(err),
        }
        result
    }

    /// End the span now.
    pub fn end(self) {}

    fn finalize(&mut self) {
        let Some(mut data) = self.data.take() else {
            return;
        };
        if std::thread::panicking() && data.status == SpanStatus::Unset {
            data.status = SpanStatus::Error("panicked".to_string());
        }
        let finished = FinishedSpan {
            name: data.name,
            context: self.context.clone(),
            parent_span_id: data.parent_span_id,
            service_name: self.tracer.service_name.to_string(),
            start_time: data.start_time,
            duration: data.started_at.elapsed(),
            attributes: data.attributes,
            events: data.events,
            status: data.status,
        };
        self.tracer.exporter.export(finished);
        self.tracer.ended.fetch_add(1, Ordering::Relaxed);
    }
}

impl Drop for ActiveSpan {
    fn drop(&mut self) {
        self.finalize();
    }
}
