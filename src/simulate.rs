//! Stand-ins for the business work the handlers observe.
//!
//! Every operation is a fixed delay plus a fabricated result, wrapped in
//! its own span. [`SimulationConfig`] controls the delays and can make
//! one named operation fail, which is how the failure path is exercised.

use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, Instrument};

use crate::error::{error_chain, OperationError};
use crate::record::{now_timestamp, LogLevel};
use crate::span::{duration_ms, SpanContext};
use crate::telemetry::Telemetry;

pub const EXTERNAL_API_URL: &str = "https://api.example.com/data";
pub const DEMO_TABLE: &str = "demo-table";
pub const DEMO_BUCKET: &str = "demo-bucket";

/// The simulated operations, in the order the handlers run them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulatedOperation {
    ExternalApiCall,
    ApiProcessing,
    PutItem,
    PutObject,
    BusinessLogic,
}

impl SimulatedOperation {
    /// Span name of the operation.
    pub fn span_name(&self) -> &'static str {
        match self {
            SimulatedOperation::ExternalApiCall => "external_api_call",
            SimulatedOperation::ApiProcessing => "process_api_request",
            SimulatedOperation::PutItem => "dynamodb_operation",
            SimulatedOperation::PutObject => "s3_operation",
            SimulatedOperation::BusinessLogic => "process_business_logic",
        }
    }
}

/// Latencies of the simulated operations plus an optional injected fault.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub external_api_delay: Duration,
    pub api_processing_delay: Duration,
    pub put_item_delay: Duration,
    pub put_object_delay: Duration,
    pub business_logic_delay: Duration,
    /// Operation that fails after its delay, with the given reason.
    pub fault: Option<(SimulatedOperation, String)>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            external_api_delay: Duration::from_millis(300),
            api_processing_delay: Duration::from_millis(100),
            put_item_delay: Duration::from_millis(100),
            put_object_delay: Duration::from_millis(150),
            business_logic_delay: Duration::from_millis(200),
            fault: None,
        }
    }
}

impl SimulationConfig {
    /// No delays at all.
    pub fn instant() -> Self {
        Self {
            external_api_delay: Duration::ZERO,
            api_processing_delay: Duration::ZERO,
            put_item_delay: Duration::ZERO,
            put_object_delay: Duration::ZERO,
            business_logic_delay: Duration::ZERO,
            fault: None,
        }
    }

    /// Make `operation` fail with `reason`.
    pub fn failing(mut self, operation: SimulatedOperation, reason: impl Into<String>) -> Self {
        self.fault = Some((operation, reason.into()));
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExternalData {
    pub id: i64,
    pub data: String,
    pub timestamp: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiProcessingResult {
    pub processed_at: String,
    pub external_data: ExternalData,
    pub request_processed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemRecord {
    pub item_id: String,
    pub request_id: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ObjectRecord {
    pub object_key: String,
    pub bucket: String,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BusinessResult {
    pub request_id: String,
    pub processing_time_ms: u64,
    pub result: String,
    pub operations: Vec<&'static str>,
    pub db_result: ItemRecord,
    pub s3_result: ObjectRecord,
}

/// Runs the simulated operations against a shared [`Telemetry`].
#[derive(Clone)]
pub struct SimulatedOps {
    telemetry: Telemetry,
    config: SimulationConfig,
}

impl SimulatedOps {
    pub fn new(telemetry: Telemetry, config: SimulationConfig) -> Self {
        SimulatedOps { telemetry, config }
    }

    async fn pause(&self, delay: Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    fn check(&self, operation: SimulatedOperation) -> Result<(), OperationError> {
        match &self.config.fault {
            Some((failing, reason)) if *failing == operation => Err(OperationError::Failed {
                operation: operation.span_name(),
                reason: reason.clone(),
            }),
            _ => Ok(()),
        }
    }

    /// GET against the example API.
    pub async fn external_api_call(
        &self,
        parent: &SpanContext,
        request_id: &str,
    ) -> Result<ExternalData, OperationError> {
        let op = SimulatedOperation::ExternalApiCall;
        let mut span = self.telemetry.tracer.start_span(op.span_name(), Some(parent));
        span.set_attribute("http.method", "GET");
        span.set_attribute("http.url", EXTERNAL_API_URL);
        span.set_attribute("external.service", "example-api");
        span.set_attribute("request.id", request_id);

        let result = async {
            info!(request_id, url = EXTERNAL_API_URL, "making external API call");
            self.pause(self.config.external_api_delay).await;
            self.check(op)?;
            Ok::<_, OperationError>(ExternalData {
                id: Utc::now().timestamp().rem_euclid(1000),
                data: format!("Sample data for request {}", request_id),
                timestamp: now_timestamp(),
                status: "success".to_string(),
            })
        }
        .instrument(span.tracing_span().clone())
        .await;

        span.finish_with(result, |data, span| {
            span.set_attribute("http.status_code", 200u16);
            span.set_attribute("external.response.id", data.id);
            span.set_attribute("external.response.status", data.status.as_str());
        })
    }

    /// API processing step: fetch external data, then post-process it.
    pub async fn process_api_request(
        &self,
        parent: &SpanContext,
        request_id: &str,
    ) -> Result<ApiProcessingResult, OperationError> {
        let op = SimulatedOperation::ApiProcessing;
        let mut span = self.telemetry.tracer.start_span(op.span_name(), Some(parent));
        span.set_attribute("processing.type", "api_business_logic");
        span.set_attribute("request.id", request_id);

        let result = async {
            info!(request_id, "processing API request");
            let external_data = self.external_api_call(span.context(), request_id).await?;
            self.pause(self.config.api_processing_delay).await;
            self.check(op)?;
            Ok::<_, OperationError>(ApiProcessingResult {
                processed_at: now_timestamp(),
                external_data,
                request_processed: true,
            })
        }
        .instrument(span.tracing_span().clone())
        .await;

        span.finish_with(result, |processed, span| {
            span.set_attribute("processing.success", true);
            span.set_attribute("external.data.id", processed.external_data.id);
        })
    }

    /// Key-value store write.
    pub async fn put_item(
        &self,
        parent: &SpanContext,
        request_id: &str,
    ) -> Result<ItemRecord, OperationError> {
        let op = SimulatedOperation::PutItem;
        let mut span = self.telemetry.tracer.start_span(op.span_name(), Some(parent));
        span.set_attribute("db.system", "dynamodb");
        span.set_attribute("db.operation", "put_item");
        span.set_attribute("db.table", DEMO_TABLE);
        span.set_attribute("request.id", request_id);

        let result = async {
            info!(request_id, table = DEMO_TABLE, "simulating DynamoDB put_item");
            self.pause(self.config.put_item_delay).await;
            self.check(op)?;
            Ok::<_, OperationError>(ItemRecord {
                item_id: format!("item_{}", Utc::now().timestamp()),
                request_id: request_id.to_string(),
                status: "created".to_string(),
            })
        }
        .instrument(span.tracing_span().clone())
        .await;

        span.finish_with(result, |item, span| {
            span.set_attribute("db.item_id", item.item_id.as_str());
            span.set_attribute("db.operation.status", "success");
        })
    }

    /// Blob store write. Key and size are known up front, so they go on
    /// the span at entry.
    pub async fn put_object(
        &self,
        parent: &SpanContext,
        request_id: &str,
    ) -> Result<ObjectRecord, OperationError> {
        let op = SimulatedOperation::PutObject;
        let object_key = format!("logs/{}.json", request_id);
        let size: u64 = 1024;

        self.telemetry
            .tracer
            .in_span(
                op.span_name(),
                Some(parent),
                vec![
                    ("aws.service", "s3".into()),
                    ("aws.operation", "put_object".into()),
                    ("aws.bucket", DEMO_BUCKET.into()),
                    ("request.id", request_id.into()),
                    ("aws.s3.object_key", object_key.as_str().into()),
                    ("aws.s3.object_size", size.into()),
                ],
                |_ctx| async {
                    info!(request_id, bucket = DEMO_BUCKET, key = %object_key, "simulating S3 put_object");
                    self.pause(self.config.put_object_delay).await;
                    self.check(op)?;
                    Ok::<_, OperationError>(ObjectRecord {
                        object_key: object_key.clone(),
                        bucket: DEMO_BUCKET.to_string(),
                        size,
                    })
                },
            )
            .await
    }

    /// Data-processing pipeline: item write, object write, then a final
    /// processing step. Ships its own completion or failure record.
    pub async fn process_business_logic(
        &self,
        parent: &SpanContext,
        request_id: &str,
        input: &Value,
    ) -> Result<BusinessResult, OperationError> {
        let op = SimulatedOperation::BusinessLogic;
        let started = Instant::now();
        let input_size = input.to_string().len();

        let mut span = self.telemetry.tracer.start_span(op.span_name(), Some(parent));
        span.set_attribute("request.id", request_id);
        span.set_attribute("input.type", json_type_name(input));
        span.set_attribute("input.size", input_size);

        let shipper = &self.telemetry.shipper;
        let result = async {
            info!(request_id, "processing business logic");
            let db_result = self.put_item(span.context(), request_id).await?;
            let s3_result = self.put_object(span.context(), request_id).await?;
            self.pause(self.config.business_logic_delay).await;
            self.check(op)?;

            let processing_time_ms = elapsed_ms(started);
            let operations = vec!["dynamodb", "s3", "processing"];
            shipper
                .send(
                    LogLevel::Info,
                    "Business logic processing completed successfully",
                    json!({
                        "processing_time_ms": processing_time_ms,
                        "input_size": input_size,
                        "operations_completed": operations,
                        "db_result": db_result,
                        "s3_result": s3_result,
                    }),
                    request_id,
                    Some(span.context()),
                )
                .await;

            Ok::<_, OperationError>(BusinessResult {
                request_id: request_id.to_string(),
                processing_time_ms,
                result: "Business logic completed successfully".to_string(),
                operations,
                db_result,
                s3_result,
            })
        }
        .instrument(span.tracing_span().clone())
        .await;

        if let Err(err) = &result {
            shipper
                .send(
                    LogLevel::Error,
                    "Business logic processing failed",
                    json!({
                        "error_message": err.to_string(),
                        "error_traceback": error_chain(err),
                        "processing_time_ms": elapsed_ms(started),
                    }),
                    request_id,
                    Some(span.context()),
                )
                .await;
        }

        span.finish_with(result, |done, span| {
            span.set_attribute("processing.duration_ms", done.processing_time_ms);
            span.set_attribute("processing.status", "success");
            span.set_attribute("operations.count", done.operations.len());
        })
    }
}

pub(crate) fn elapsed_ms(started: Instant) -> u64 {
    duration_ms(started.elapsed())
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
