//! Local invocation driver.
//!
//! Reads one event (file or stdin), runs it through the chosen handler
//! with telemetry wired from the environment, and prints the response
//! envelope as JSON on stdout.

use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use serde_json::Value;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

use lambda_observe::config::AppConfig;
use lambda_observe::error::InvocationError;
use lambda_observe::handler::Orchestrator;
use lambda_observe::init::{init_logging, LoggingConfig};
use lambda_observe::invocation::{ApiGatewayRequest, RequestContext};
use lambda_observe::simulate::{SimulatedOperation, SimulationConfig};
use lambda_observe::telemetry::Telemetry;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum HandlerKind {
    /// API Gateway proxy request
    Api,
    /// Generic event through the data-processing pipeline
    Event,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum FaultTarget {
    ExternalApi,
    ApiProcessing,
    PutItem,
    PutObject,
    BusinessLogic,
}

impl From<FaultTarget> for SimulatedOperation {
    fn from(target: FaultTarget) -> Self {
        match target {
            FaultTarget::ExternalApi => SimulatedOperation::ExternalApiCall,
            FaultTarget::ApiProcessing => SimulatedOperation::ApiProcessing,
            FaultTarget::PutItem => SimulatedOperation::PutItem,
            FaultTarget::PutObject => SimulatedOperation::PutObject,
            FaultTarget::BusinessLogic => SimulatedOperation::BusinessLogic,
        }
    }
}

/// Invoke a handler locally with OpenObserve shipping configured from the environment.
#[derive(Parser, Debug)]
#[command(name = "lambda-observe")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Which handler receives the event
    #[arg(long, value_enum, default_value_t = HandlerKind::Api)]
    handler: HandlerKind,

    /// Event JSON file; stdin when omitted
    #[arg(long)]
    event: Option<PathBuf>,

    /// Invocation id; a random UUID when omitted
    #[arg(long)]
    request_id: Option<String>,

    /// Remaining-time budget handed to the handler, in milliseconds
    #[arg(long, default_value_t = 30_000)]
    timeout_ms: u64,

    /// Function ARN (the account id is read from it)
    #[arg(long, env = "AWS_LAMBDA_FUNCTION_ARN", default_value = "")]
    function_arn: String,

    /// Skip the simulated latencies
    #[arg(long)]
    instant: bool,

    /// Make one simulated operation fail
    #[arg(long, value_enum)]
    fail: Option<FaultTarget>,

    /// Emit local logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

async fn read_event(path: Option<&PathBuf>) -> Result<Value, InvocationError> {
    let raw = match path {
        Some(path) => tokio::fs::read_to_string(path).await?,
        None => {
            let mut buf = String::new();
            tokio::io::stdin().read_to_string(&mut buf).await?;
            buf
        }
    };
    if raw.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    Ok(serde_json::from_str(&raw)?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let mut logging = LoggingConfig::from_env();
    logging.json |= cli.json_logs;
    init_logging(logging)?;

    let config = AppConfig::from_env();
    let telemetry = Telemetry::from_config(&config);

    let mut simulation = if cli.instant {
        SimulationConfig::instant()
    } else {
        SimulationConfig::default()
    };
    if let Some(target) = cli.fail {
        simulation = simulation.failing(target.into(), "fault injected from the command line");
    }
    let orchestrator = Orchestrator::new(telemetry, simulation, config.region.as_str());

    let event = read_event(cli.event.as_ref()).await?;
    let request_id = cli
        .request_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let ctx = RequestContext::new(request_id, config.function_name.as_str())
        .with_version(config.function_version.as_str())
        .with_arn(cli.function_arn)
        .with_timeout(Duration::from_millis(cli.timeout_ms));

    info!(request_id = %ctx.request_id, handler = ?cli.handler, "invoking handler");
    let response = match cli.handler {
        HandlerKind::Api => {
            let request = ApiGatewayRequest::from_value(event);
            orchestrator.handle_api_request(&request, &ctx).await
        }
        HandlerKind::Event => orchestrator.handle_event(&event, &ctx).await,
    };

    if !response.is_success() {
        warn!(request_id = %ctx.request_id, status = response.status_code, "handler returned an error response");
    }
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
