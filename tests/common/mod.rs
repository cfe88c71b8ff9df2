//! Test harness shared by the integration tests.
//!
//! Provides:
//! - A telemetry bundle wired to in-memory span/metric collectors
//! - Recording and failing log sinks
//! - A one-shot HTTP stub for observing the real OpenObserve POST

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use lambda_observe::error::SinkError;
use lambda_observe::handler::Orchestrator;
use lambda_observe::init::init_test_logging;
use lambda_observe::metrics::InMemoryRecorder;
use lambda_observe::record::LogRecord;
use lambda_observe::shipper::LogShipper;
use lambda_observe::simulate::SimulationConfig;
use lambda_observe::sink::LogSink;
use lambda_observe::span::{InMemorySpanExporter, Tracer};
use lambda_observe::telemetry::Telemetry;

/// Sink that keeps every record it is asked to send.
#[derive(Clone, Default)]
pub struct RecordingSink {
    pub records: Arc<Mutex<Vec<Map<String, Value>>>>,
}

impl RecordingSink {
    pub fn count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn messages(&self) -> Vec<String> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .map(|r| r["message"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}

#[async_trait]
impl LogSink for RecordingSink {
    async fn send(&self, record: &LogRecord) -> Result<(), SinkError> {
        self.records.lock().unwrap().push(record.to_entry());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Sink that answers every send with an HTTP status error.
#[derive(Clone)]
pub struct StatusSink {
    pub status: u16,
    pub attempts: Arc<Mutex<usize>>,
}

impl StatusSink {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            attempts: Arc::new(Mutex::new(0)),
        }
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }
}

#[async_trait]
impl LogSink for StatusSink {
    async fn send(&self, _record: &LogRecord) -> Result<(), SinkError> {
        *self.attempts.lock().unwrap() += 1;
        Err(SinkError::Http {
            status: self.status,
            body: "service unavailable".to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "status"
    }
}

/// Orchestrator plus handles on everything it emits.
pub struct Harness {
    pub orchestrator: Orchestrator,
    pub tracer: Tracer,
    pub spans: InMemorySpanExporter,
    pub metrics: InMemoryRecorder,
}

impl Harness {
    /// Build a harness whose shipper uses `sink`, or is disabled for `None`.
    pub fn new(sink: Option<Arc<dyn LogSink>>, simulation: SimulationConfig) -> Self {
        init_test_logging();
        let spans = InMemorySpanExporter::new();
        let metrics = InMemoryRecorder::new();
        let tracer = Tracer::new("test-service", Arc::new(spans.clone()));
        let shipper = LogShipper::new(sink, tracer.clone(), "test-service", "test-function");
        let telemetry = Telemetry::new(tracer.clone(), shipper, Arc::new(metrics.clone()));
        let orchestrator = Orchestrator::new(telemetry, simulation, "eu-west-1");
        Self {
            orchestrator,
            tracer,
            spans,
            metrics,
        }
    }
}

/// One HTTP request as seen by [`HttpStub`].
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("request body is JSON")
    }
}

/// Minimal HTTP/1.1 server answering every request with a fixed status.
pub struct HttpStub {
    pub base_url: String,
    pub requests: Arc<Mutex<Vec<CapturedRequest>>>,
    handle: JoinHandle<()>,
}

impl HttpStub {
    pub async fn start(status: u16) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub");
        let addr = listener.local_addr().expect("stub addr");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&requests);

        let handle = tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                let captured = Arc::clone(&captured);
                tokio::spawn(async move {
                    if let Some(request) = read_request(&mut stream).await {
                        captured.lock().unwrap().push(request);
                    }
                    let reason = if status < 300 { "OK" } else { "Error" };
                    let body = if status < 300 { "{\"code\":200}" } else { "stub failure" };
                    let response = format!(
                        "HTTP/1.1 {} {}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                        status,
                        reason,
                        body.len(),
                        body
                    );
                    let _ = stream.write_all(response.as_bytes()).await;
                    let _ = stream.shutdown().await;
                });
            }
        });

        Self {
            base_url: format!("http://{}", addr),
            requests,
            handle,
        }
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for HttpStub {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn read_request(stream: &mut tokio::net::TcpStream) -> Option<CapturedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let request_line = lines.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter(|l| !l.is_empty())
        .filter_map(|l| {
            let (k, v) = l.split_once(':')?;
            Some((k.trim().to_string(), v.trim().to_string()))
        })
        .collect();

    let content_length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buf[header_end..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    Some(CapturedRequest {
        request_line,
        headers,
        body,
    })
}
