mod common;

use std::sync::Arc;

use serde_json::json;

use common::{Harness, RecordingSink, StatusSink};
use lambda_observe::handler::{API_HANDLER_SPAN, EVENT_HANDLER_SPAN, GENERIC_ERROR};
use lambda_observe::invocation::{ApiGatewayRequest, RequestContext};
use lambda_observe::metrics::{API_REQUESTS_TOTAL, DEMO_PROCESSING_DURATION_MS, DEMO_REQUESTS_TOTAL};
use lambda_observe::shipper::{API_SHIP_SPAN, SHIP_SPAN};
use lambda_observe::simulate::{SimulatedOperation, SimulationConfig};
use lambda_observe::span::SpanStatus;

fn context(request_id: &str) -> RequestContext {
    RequestContext::new(request_id, "test-function")
        .with_arn("arn:aws:lambda:eu-west-1:123456789012:function:test-function")
}

#[tokio::test]
async fn event_success_returns_result_and_counts_once() {
    let sink = RecordingSink::default();
    let harness = Harness::new(Some(Arc::new(sink.clone())), SimulationConfig::instant());

    let response = harness
        .orchestrator
        .handle_event(&json!({"source": "aws.events", "detail": {}}), &context("req-ok"))
        .await;

    assert!(response.is_success());
    let body = response.json_body();
    assert_eq!(body["requestId"], "req-ok");
    assert!(body["result"].is_object());
    assert_eq!(body["result"]["operations"], json!(["dynamodb", "s3", "processing"]));
    assert_eq!(response.headers["X-Request-ID"], "req-ok");

    let counters = harness.metrics.counters(DEMO_REQUESTS_TOTAL);
    assert_eq!(counters.len(), 1);
    assert_eq!(counters[0].tag("outcome"), Some("success"));
    assert_eq!(counters[0].tag("status"), Some("200"));
    let histograms = harness.metrics.histograms(DEMO_PROCESSING_DURATION_MS);
    assert_eq!(histograms.len(), 1);
    assert_eq!(histograms[0].tag("operation"), Some("business_logic"));

    // invocation started, business logic completed, execution completed
    assert_eq!(
        sink.messages(),
        vec![
            "Lambda function invocation started",
            "Business logic processing completed successfully",
            "Lambda function execution completed successfully",
        ]
    );
    let shipping: Vec<_> = harness
        .spans
        .spans()
        .into_iter()
        .filter(|s| s.name == SHIP_SPAN)
        .collect();
    assert_eq!(shipping.len(), sink.count());
    assert!(shipping.iter().all(|s| s.status == SpanStatus::Ok));

    let top = harness.spans.find(EVENT_HANDLER_SPAN).expect("top span exported");
    assert_eq!(top.status, SpanStatus::Ok);
    assert_eq!(top.attributes["cloud.account.id"].to_string(), "123456789012");
}

#[tokio::test]
async fn api_success_echoes_request() {
    let sink = RecordingSink::default();
    let harness = Harness::new(Some(Arc::new(sink.clone())), SimulationConfig::instant());
    let request = ApiGatewayRequest::from_value(json!({
        "httpMethod": "POST",
        "path": "/orders",
        "queryStringParameters": {"page": "2"},
        "headers": {"user-agent": "curl/8"},
        "requestContext": {"requestId": "gw-1", "identity": {"sourceIp": "10.0.0.1"}},
    }));

    let response = harness
        .orchestrator
        .handle_api_request(&request, &context("req-api"))
        .await;

    assert_eq!(response.status_code, 200);
    let body = response.json_body();
    assert_eq!(body["method"], "POST");
    assert_eq!(body["path"], "/orders");
    assert_eq!(body["queryParams"]["page"], "2");
    assert!(body["processingResult"].is_object());
    assert_eq!(sink.count(), 2);
    let shipping: Vec<_> = harness
        .spans
        .spans()
        .into_iter()
        .filter(|s| s.name == API_SHIP_SPAN)
        .collect();
    assert_eq!(shipping.len(), 2);
    assert!(harness.spans.find(SHIP_SPAN).is_none());

    let counters = harness.metrics.counters(API_REQUESTS_TOTAL);
    assert_eq!(counters.len(), 1);
    assert_eq!(counters[0].tag("method"), Some("POST"));
    assert_eq!(counters[0].tag("path"), Some("/orders"));
    assert_eq!(counters[0].tag("outcome"), Some("success"));

    let top = harness.spans.find(API_HANDLER_SPAN).expect("top span exported");
    let external = harness.spans.find("external_api_call").expect("child span exported");
    assert_eq!(external.context.trace_id, top.context.trace_id);
    assert_eq!(top.attributes["http.user_agent"].to_string(), "curl/8");
}

#[tokio::test]
async fn disabled_sink_still_succeeds() {
    let harness = Harness::new(None, SimulationConfig::instant());

    let response = harness
        .orchestrator
        .handle_event(&json!({}), &context("req-nosink"))
        .await;

    assert_eq!(response.status_code, 200);
    let shipping: Vec<_> = harness
        .spans
        .spans()
        .into_iter()
        .filter(|s| s.name == SHIP_SPAN)
        .collect();
    assert_eq!(shipping.len(), 3);
    assert!(shipping.iter().all(|s| s.status == SpanStatus::Unset));
}

#[tokio::test]
async fn fault_yields_generic_500_without_detail() {
    let sink = RecordingSink::default();
    let simulation = SimulationConfig::instant().failing(SimulatedOperation::PutItem, "table throttled");
    let harness = Harness::new(Some(Arc::new(sink.clone())), simulation);

    let response = harness
        .orchestrator
        .handle_event(&json!({"source": "aws.s3"}), &context("req-fail"))
        .await;

    assert_eq!(response.status_code, 500);
    let body = response.json_body();
    let keys: Vec<&str> = body.as_object().unwrap().keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["error", "requestId", "timestamp"]);
    assert_eq!(body["error"], GENERIC_ERROR);
    assert!(!response.body.contains("table throttled"));

    let top = harness.spans.find(EVENT_HANDLER_SPAN).expect("top span exported");
    assert!(top.status.is_error());
    let exception = top.exception().expect("exception recorded");
    assert!(exception.attributes["exception.message"]
        .to_string()
        .contains("table throttled"));

    let failed = harness.spans.find("dynamodb_operation").expect("failing span exported");
    assert!(failed.status.is_error());
    assert_eq!(harness.tracer.started_spans(), harness.tracer.ended_spans());

    let counters = harness.metrics.counters(DEMO_REQUESTS_TOTAL);
    assert_eq!(counters.len(), 1);
    assert_eq!(counters[0].tag("outcome"), Some("error"));

    let messages = sink.messages();
    assert!(messages.contains(&"Business logic processing failed".to_string()));
    assert!(messages.contains(&"Lambda function execution failed".to_string()));
}

#[tokio::test]
async fn api_fault_in_external_call() {
    let sink = RecordingSink::default();
    let simulation = SimulationConfig::instant().failing(SimulatedOperation::ExternalApiCall, "upstream reset");
    let harness = Harness::new(Some(Arc::new(sink.clone())), simulation);

    let response = harness
        .orchestrator
        .handle_api_request(&ApiGatewayRequest::default(), &context("req-api-fail"))
        .await;

    assert_eq!(response.status_code, 500);
    assert!(!response.body.contains("upstream reset"));
    assert_eq!(response.headers["Access-Control-Allow-Origin"], "*");
    let body = response.json_body();
    let keys: Vec<&str> = body.as_object().unwrap().keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["error", "requestId", "timestamp"]);
    assert_eq!(body["requestId"], "req-api-fail");

    let top = harness.spans.find(API_HANDLER_SPAN).expect("top span exported");
    assert!(top.status.is_error());
    let exception = top.exception().expect("exception recorded");
    assert!(exception.attributes["exception.message"]
        .to_string()
        .contains("upstream reset"));
    for name in ["process_api_request", "external_api_call"] {
        let span = harness.spans.find(name).expect("sub-operation span exported");
        assert!(span.status.is_error(), "{name}");
    }
    assert_eq!(harness.tracer.started_spans(), harness.tracer.ended_spans());

    let records = sink.records.lock().unwrap().clone();
    let failed = records
        .iter()
        .find(|r| r["message"] == "API request failed")
        .expect("failure record shipped");
    assert_eq!(failed["level"], "error");
    assert!(failed["error_message"].as_str().unwrap().contains("upstream reset"));
    assert!(failed["error_traceback"].is_string());

    let counters = harness.metrics.counters(API_REQUESTS_TOTAL);
    assert_eq!(counters.len(), 1);
    assert_eq!(counters[0].tag("outcome"), Some("error"));
    assert_eq!(counters[0].tag("status"), Some("500"));
    assert_eq!(counters[0].tag("method"), Some("UNKNOWN"));
}

#[tokio::test]
async fn loose_api_payload_still_gets_one_response() {
    let harness = Harness::new(None, SimulationConfig::instant());
    let request = ApiGatewayRequest::from_value(json!({
        "httpMethod": "GET",
        "requestContext": null,
        "headers": {"X-Amz-Null": null},
        "queryStringParameters": {"page": 2},
        "body": {"order": 1},
    }));

    let response = harness
        .orchestrator
        .handle_api_request(&request, &context("req-loose"))
        .await;

    assert_eq!(response.status_code, 200);
    assert_eq!(response.json_body()["queryParams"]["page"], "2");
    assert_eq!(harness.metrics.counters(API_REQUESTS_TOTAL).len(), 1);
}

#[tokio::test]
async fn rejected_sink_does_not_affect_outcome() {
    let sink = StatusSink::new(503);
    let harness = Harness::new(Some(Arc::new(sink.clone())), SimulationConfig::instant());

    let response = harness
        .orchestrator
        .handle_event(&json!({}), &context("req-503"))
        .await;

    assert_eq!(response.status_code, 200);
    assert_eq!(sink.attempts(), 3);

    let shipping = harness.spans.find(SHIP_SPAN).expect("shipping span exported");
    assert!(shipping.status.is_error());
    assert!(shipping.exception().is_none());
    assert_eq!(harness.spans.find(EVENT_HANDLER_SPAN).unwrap().status, SpanStatus::Ok);
}
