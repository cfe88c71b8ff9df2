use std::sync::Arc;
use std::time::Instant;

use lambda_observe::config::AppConfig;
use lambda_observe::handler::Orchestrator;
use lambda_observe::invocation::{ApiGatewayRequest, RequestContext};
use lambda_observe::metrics::InMemoryRecorder;
use lambda_observe::noop_sink::NoopSink;
use lambda_observe::shipper::LogShipper;
use lambda_observe::simulate::SimulationConfig;
use lambda_observe::span::{LogSpanExporter, Tracer};
use lambda_observe::telemetry::Telemetry;

#[tokio::main]
async fn main() {
    let config = AppConfig::from_env();
    let tracer = Tracer::new(config.service_name.as_str(), Arc::new(LogSpanExporter));
    let shipper = LogShipper::new(
        Some(Arc::new(NoopSink)),
        tracer.clone(),
        config.service_name.as_str(),
        config.function_name.as_str(),
    );
    let metrics = Arc::new(InMemoryRecorder::new());
    let telemetry = Telemetry::new(tracer.clone(), shipper, metrics.clone());
    let orchestrator = Orchestrator::new(telemetry, SimulationConfig::instant(), "local");

    let request = ApiGatewayRequest {
        http_method: Some("GET".to_string()),
        path: Some("/load".to_string()),
        ..Default::default()
    };

    let n: u64 = 10_000;
    let start = Instant::now();

    for i in 0..n {
        let ctx = RequestContext::new(format!("load-{}", i), "invoke-load");
        let response = orchestrator.handle_api_request(&request, &ctx).await;
        debug_assert_eq!(response.status_code, 200);
    }

    let elapsed = start.elapsed();
    println!("noop sink: handled {} invocations in {:?} (~{:.0} inv/s), {} spans, {} metric events",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64(),
        tracer.ended_spans(),
        metrics.events().len(),
    );
}
