//! Top-level request orchestration.
//!
//! Each invocation walks RECEIVED → PROCESSING → COMPLETED | FAILED and
//! always yields exactly one [`HandlerResponse`]. Business faults end up
//! as a generic 500 whose body never carries the fault text; the detail
//! only reaches the top-level span and the shipped error record.

use std::collections::BTreeMap;
use std::time::Instant;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error, info};

use crate::error::{error_chain, OperationError};
use crate::invocation::{event_source, ApiGatewayRequest, HandlerResponse, RequestContext};
use crate::metrics::{
    Outcome, Tags, API_REQUESTS_TOTAL, API_RESPONSE_TIME_MS, DEMO_PROCESSING_DURATION_MS,
    DEMO_REQUESTS_TOTAL,
};
use crate::record::{now_timestamp, LogLevel};
use crate::shipper::{LogShipper, API_SHIP_SPAN};
use crate::simulate::{elapsed_ms, SimulatedOps, SimulationConfig};
use crate::span::ActiveSpan;
use crate::telemetry::Telemetry;

pub const API_HANDLER_SPAN: &str = "api_gateway_handler";
pub const EVENT_HANDLER_SPAN: &str = "lambda_handler";

/// Body of every failure response.
pub const GENERIC_ERROR: &str = "Internal server error";

/// Lifecycle of one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    Received,
    Processing,
    Completed,
    Failed,
}

impl InvocationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvocationState::Received => "received",
            InvocationState::Processing => "processing",
            InvocationState::Completed => "completed",
            InvocationState::Failed => "failed",
        }
    }
}

fn enter(span: &mut ActiveSpan, state: InvocationState, request_id: &str) {
    span.set_attribute("invocation.state", state.as_str());
    debug!(request_id, state = state.as_str(), "invocation state changed");
}

fn encode<T: Serialize>(what: &'static str, value: &T) -> Result<Value, OperationError> {
    serde_json::to_value(value).map_err(|source| OperationError::Encode { what, source })
}

fn success_headers(request_id: &str, response_time_ms: u64) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    headers.insert("Content-Type".to_string(), "application/json".to_string());
    headers.insert("Access-Control-Allow-Origin".to_string(), "*".to_string());
    headers.insert("X-Request-ID".to_string(), request_id.to_string());
    headers.insert("X-Response-Time".to_string(), format!("{}ms", response_time_ms));
    headers
}

fn failure_response(request_id: &str, cors: bool) -> HandlerResponse {
    let mut headers = BTreeMap::new();
    headers.insert("Content-Type".to_string(), "application/json".to_string());
    headers.insert("X-Request-ID".to_string(), request_id.to_string());
    if cors {
        headers.insert("Access-Control-Allow-Origin".to_string(), "*".to_string());
    }
    let body = json!({
        "error": GENERIC_ERROR,
        "requestId": request_id,
        "timestamp": now_timestamp(),
    });
    HandlerResponse::new(Outcome::Error.status_code(), headers, &body)
}

/// Entry point for both invocation shapes.
///
/// Holds the process-wide [`Telemetry`] and the simulated operations;
/// carries no per-request state, so one instance serves every invocation.
#[derive(Clone)]
pub struct Orchestrator {
    telemetry: Telemetry,
    api_shipper: LogShipper,
    ops: SimulatedOps,
    region: String,
}

impl Orchestrator {
    pub fn new(telemetry: Telemetry, simulation: SimulationConfig, region: impl Into<String>) -> Self {
        let ops = SimulatedOps::new(telemetry.clone(), simulation);
        let api_shipper = telemetry.shipper.clone().with_span_name(API_SHIP_SPAN);
        Orchestrator {
            telemetry,
            api_shipper,
            ops,
            region: region.into(),
        }
    }

    /// Handle an API Gateway proxy request.
    pub async fn handle_api_request(
        &self,
        event: &ApiGatewayRequest,
        ctx: &RequestContext,
    ) -> HandlerResponse {
        let started = Instant::now();
        let request_id = ctx.request_id.as_str();
        let shipper = &self.api_shipper;
        let method = event.method();
        let path = event.path();
        let query_params = event.query_params();
        let user_agent = event.user_agent();
        let source_ip = event.source_ip();

        let mut span = self.telemetry.tracer.start_span(API_HANDLER_SPAN, None);
        span.set_attribute("http.method", method);
        span.set_attribute("http.route", path);
        span.set_attribute("http.scheme", "https");
        span.set_attribute("http.user_agent", user_agent);
        span.set_attribute("http.client_ip", source_ip);
        span.set_attribute("faas.execution", request_id);
        span.set_attribute("faas.id", ctx.function_name.as_str());
        span.set_attribute("cloud.region", self.region.as_str());
        enter(&mut span, InvocationState::Received, request_id);

        info!(request_id, method, path, source_ip, "API request received");
        shipper
            .send(
                LogLevel::Info,
                "API request received",
                json!({
                    "http_method": method,
                    "http_path": path,
                    "query_params": query_params,
                    "user_agent": user_agent,
                    "source_ip": source_ip,
                    "api_gateway_request_id": event.gateway_request_id(),
                    "headers_count": event.headers_count(),
                }),
                request_id,
                Some(span.context()),
            )
            .await;

        enter(&mut span, InvocationState::Processing, request_id);
        let processed = async {
            let result = self.ops.process_api_request(span.context(), request_id).await?;
            let external_data_id = result.external_data.id;
            Ok::<_, OperationError>((encode("processing result", &result)?, external_data_id))
        }
        .await;
        let response_time_ms = elapsed_ms(started);

        let outcome = if processed.is_ok() { Outcome::Success } else { Outcome::Error };
        let tags: Tags = vec![
            ("method", method.to_string()),
            ("path", path.to_string()),
            ("status", outcome.status_code().to_string()),
            ("outcome", outcome.as_tag().to_string()),
        ];
        self.telemetry.metrics.increment(API_REQUESTS_TOTAL, &tags);
        self.telemetry.metrics.observe_duration(
            API_RESPONSE_TIME_MS,
            response_time_ms as f64,
            &vec![("method", method.to_string()), ("path", path.to_string())],
        );

        match processed {
            Ok((processing_result, external_data_id)) => {
                let body = json!({
                    "message": "API request processed successfully",
                    "requestId": request_id,
                    "method": method,
                    "path": path,
                    "queryParams": query_params,
                    "processingResult": processing_result,
                    "responseTime": response_time_ms,
                    "timestamp": now_timestamp(),
                });
                let response = HandlerResponse::new(
                    outcome.status_code(),
                    success_headers(request_id, response_time_ms),
                    &body,
                );

                shipper
                    .send(
                        LogLevel::Info,
                        "API request processed successfully",
                        json!({
                            "response_time_ms": response_time_ms,
                            "status_code": response.status_code,
                            "external_data_id": external_data_id,
                            "response_size": response.body.len(),
                        }),
                        request_id,
                        Some(span.context()),
                    )
                    .await;

                span.set_attribute("http.status_code", response.status_code);
                span.set_attribute("http.response_time_ms", response_time_ms);
                span.set_attribute("api.success", true);
                span.set_ok();
                enter(&mut span, InvocationState::Completed, request_id);
                info!(request_id, response_time_ms, "API request processed successfully");
                response
            }
            Err(err) => {
                error!(request_id, error = %err, response_time_ms, "API request failed");
                shipper
                    .send(
                        LogLevel::Error,
                        "API request failed",
                        json!({
                            "error_message": err.to_string(),
                            "error_traceback": error_chain(&err),
                            "response_time_ms": response_time_ms,
                            "http_method": method,
                            "http_path": path,
                        }),
                        request_id,
                        Some(span.context()),
                    )
                    .await;

                span.set_attribute("http.status_code", outcome.status_code());
                span.record_error(&err);
                enter(&mut span, InvocationState::Failed, request_id);
                failure_response(request_id, true)
            }
        }
    }

    /// Handle a generic event by running the data-processing pipeline.
    pub async fn handle_event(&self, event: &Value, ctx: &RequestContext) -> HandlerResponse {
        let started = Instant::now();
        let request_id = ctx.request_id.as_str();
        let shipper = &self.telemetry.shipper;
        let source = event_source(event);
        let event_size = event.to_string().len();

        let mut span = self.telemetry.tracer.start_span(EVENT_HANDLER_SPAN, None);
        span.set_attribute("faas.execution", request_id);
        span.set_attribute("faas.id", ctx.function_name.as_str());
        span.set_attribute("faas.version", ctx.function_version.as_str());
        span.set_attribute("faas.trigger.source", source);
        span.set_attribute("cloud.account.id", ctx.account_id());
        span.set_attribute("cloud.region", self.region.as_str());
        enter(&mut span, InvocationState::Received, request_id);

        info!(request_id, source, event_size, "Lambda function invoked");
        shipper
            .send(
                LogLevel::Info,
                "Lambda function invocation started",
                json!({
                    "function_name": ctx.function_name,
                    "function_version": ctx.function_version,
                    "remaining_time_ms": ctx.remaining_time_ms(),
                    "event_source": source,
                    "event_size": event_size,
                }),
                request_id,
                Some(span.context()),
            )
            .await;

        enter(&mut span, InvocationState::Processing, request_id);
        let processed = async {
            let result = self
                .ops
                .process_business_logic(span.context(), request_id, event)
                .await?;
            encode("business result", &result)
        }
        .await;
        let response_time_ms = elapsed_ms(started);

        let outcome = if processed.is_ok() { Outcome::Success } else { Outcome::Error };
        let tags: Tags = vec![
            ("function", ctx.function_name.clone()),
            ("status", outcome.status_code().to_string()),
            ("outcome", outcome.as_tag().to_string()),
        ];
        self.telemetry.metrics.increment(DEMO_REQUESTS_TOTAL, &tags);
        self.telemetry.metrics.observe_duration(
            DEMO_PROCESSING_DURATION_MS,
            response_time_ms as f64,
            &vec![("operation", "business_logic".to_string())],
        );

        match processed {
            Ok(result) => {
                shipper
                    .send(
                        LogLevel::Info,
                        "Lambda function execution completed successfully",
                        json!({
                            "result": result,
                            "execution_duration_ms": response_time_ms,
                            "remaining_time_ms": ctx.remaining_time_ms(),
                        }),
                        request_id,
                        Some(span.context()),
                    )
                    .await;

                let body = json!({
                    "message": "Function executed successfully",
                    "requestId": request_id,
                    "result": result,
                    "responseTime": response_time_ms,
                    "timestamp": now_timestamp(),
                });
                let response = HandlerResponse::new(
                    outcome.status_code(),
                    success_headers(request_id, response_time_ms),
                    &body,
                );

                span.set_attribute("lambda.execution.success", true);
                span.set_attribute("response.status_code", response.status_code);
                span.set_ok();
                enter(&mut span, InvocationState::Completed, request_id);
                info!(request_id, response_time_ms, "Lambda function execution completed");
                response
            }
            Err(err) => {
                error!(request_id, error = %err, response_time_ms, "Lambda execution error");
                shipper
                    .send(
                        LogLevel::Error,
                        "Lambda function execution failed",
                        json!({
                            "error_message": err.to_string(),
                            "error_traceback": error_chain(&err),
                            "function_name": ctx.function_name,
                            "execution_duration_ms": response_time_ms,
                        }),
                        request_id,
                        Some(span.context()),
                    )
                    .await;

                span.set_attribute("response.status_code", outcome.status_code());
                span.record_error(&err);
                enter(&mut span, InvocationState::Failed, request_id);
                failure_response(request_id, false)
            }
        }
    }
}
