//! Environment variable names read by this crate.
//!
//! These are purely helpers; the sink, shipper and handler types take
//! already-resolved configuration and never touch the environment.

/// OpenObserve base URL, e.g. `https://api.openobserve.ai`.
pub const OPENOBSERVE_BASE_ENDPOINT_ENV: &str = "OPENOBSERVE_BASE_ENDPOINT";

/// OpenObserve user (Basic auth principal).
pub const OPENOBSERVE_USERNAME_ENV: &str = "OPENOBSERVE_USERNAME";

/// OpenObserve password or ingestion token (Basic auth secret).
pub const OPENOBSERVE_PASSWORD_ENV: &str = "OPENOBSERVE_PASSWORD";

/// OpenObserve organization the stream lives in.
pub const OPENOBSERVE_ORGANIZATION_ENV: &str = "OPENOBSERVE_ORGANIZATION";

/// Target log stream; falls back to [`DEFAULT_STREAM`].
pub const OPENOBSERVE_STREAM_ENV: &str = "OPENOBSERVE_STREAM";

/// Stream used when `OPENOBSERVE_STREAM` is unset.
pub const DEFAULT_STREAM: &str = "default";

/// Logical service name stamped on every shipped record and span.
pub const SERVICE_NAME_ENV: &str = "OTEL_SERVICE_NAME";

/// Set by the Lambda runtime.
pub const FUNCTION_NAME_ENV: &str = "AWS_LAMBDA_FUNCTION_NAME";

/// Set by the Lambda runtime.
pub const FUNCTION_VERSION_ENV: &str = "AWS_LAMBDA_FUNCTION_VERSION";

/// Set by the Lambda runtime.
pub const REGION_ENV: &str = "AWS_REGION";

/// `json` switches local logs to the JSON formatter.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

/// Read an environment variable, treating unset and empty as absent.
pub fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}
