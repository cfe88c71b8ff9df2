//! Inbound payloads and the response envelope.
//!
//! All inbound fields are optional on the wire; anything missing, `null`
//! or mistyped decodes to an empty or placeholder value instead of failing.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::span::duration_ms;

/// Per-invocation metadata supplied by the runtime. Read-only here.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Correlation key for every log, span and metric of the invocation.
    pub request_id: String,
    pub function_name: String,
    pub function_version: String,
    pub invoked_function_arn: String,
    deadline: Instant,
}

impl RequestContext {
    pub fn new(request_id: impl Into<String>, function_name: impl Into<String>) -> Self {
        RequestContext {
            request_id: request_id.into(),
            function_name: function_name.into(),
            function_version: "$LATEST".to_string(),
            invoked_function_arn: String::new(),
            deadline: Instant::now() + Duration::from_secs(30),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.function_version = version.into();
        self
    }

    pub fn with_arn(mut self, arn: impl Into<String>) -> Self {
        self.invoked_function_arn = arn.into();
        self
    }

    /// Time budget measured from now.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Instant::now() + timeout;
        self
    }

    pub fn remaining_time(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn remaining_time_ms(&self) -> u64 {
        duration_ms(self.remaining_time())
    }

    /// Account id, the fifth `:`-separated field of the function ARN.
    pub fn account_id(&self) -> &str {
        self.invoked_function_arn.split(':').nth(4).unwrap_or("")
    }
}

/// Decode `T`, falling back to its default when the value is `null` or
/// has an unexpected shape.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Keep a field only when it is a JSON string.
fn string_only<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(Some(s)),
        _ => Ok(None),
    }
}

/// Keep a field only when it is a JSON object; values stay untyped.
fn object_only<'de, D>(deserializer: D) -> Result<Option<Map<String, Value>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Object(map) => Ok(Some(map)),
        _ => Ok(None),
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Identity {
    #[serde(deserialize_with = "string_only")]
    pub source_ip: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GatewayRequestContext {
    #[serde(deserialize_with = "string_only")]
    pub request_id: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub identity: Identity,
}

/// API Gateway proxy request.
///
/// Decoding never fails on shape: `null` or mistyped fields read as
/// absent, header and query values keep their raw JSON.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ApiGatewayRequest {
    #[serde(deserialize_with = "string_only")]
    pub http_method: Option<String>,
    #[serde(deserialize_with = "string_only")]
    pub path: Option<String>,
    #[serde(deserialize_with = "object_only")]
    pub query_string_parameters: Option<Map<String, Value>>,
    #[serde(deserialize_with = "object_only")]
    pub headers: Option<Map<String, Value>>,
    #[serde(deserialize_with = "lenient")]
    pub request_context: GatewayRequestContext,
}

impl ApiGatewayRequest {
    /// Decode a proxy event. A payload that is not a JSON object yields
    /// the all-defaults request.
    pub fn from_value(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or_else(|err| {
            warn!(error = %err, "API event is not an object, using defaults");
            Self::default()
        })
    }

    pub fn method(&self) -> &str {
        self.http_method.as_deref().unwrap_or("UNKNOWN")
    }

    pub fn path(&self) -> &str {
        self.path.as_deref().unwrap_or("/")
    }

    /// Query parameters as strings; `null` entries are dropped and other
    /// non-strings are rendered as JSON.
    pub fn query_params(&self) -> BTreeMap<String, String> {
        let Some(params) = self.query_string_parameters.as_ref() else {
            return BTreeMap::new();
        };
        params
            .iter()
            .filter_map(|(k, v)| match v {
                Value::Null => None,
                Value::String(s) => Some((k.clone(), s.clone())),
                other => Some((k.clone(), other.to_string())),
            })
            .collect()
    }

    /// Header lookup; the exact name first, then case-insensitively.
    /// Non-string values count as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        let headers = self.headers.as_ref()?;
        headers.get(name).and_then(Value::as_str).or_else(|| {
            headers
                .iter()
                .filter(|(k, _)| k.eq_ignore_ascii_case(name))
                .find_map(|(_, v)| v.as_str())
        })
    }

    pub fn headers_count(&self) -> usize {
        self.headers.as_ref().map_or(0, Map::len)
    }

    pub fn user_agent(&self) -> &str {
        self.header("User-Agent").unwrap_or("unknown")
    }

    pub fn source_ip(&self) -> &str {
        self.request_context
            .identity
            .source_ip
            .as_deref()
            .unwrap_or("unknown")
    }

    pub fn gateway_request_id(&self) -> &str {
        self.request_context.request_id.as_deref().unwrap_or("")
    }
}

/// Source of a generic event, `"unknown"` when absent or not a string.
pub fn event_source(event: &Value) -> &str {
    event.get("source").and_then(Value::as_str).unwrap_or("unknown")
}

/// Proxy-integration response: status, headers and a JSON-encoded body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl HandlerResponse {
    pub fn new(status_code: u16, headers: BTreeMap<String, String>, body: &Value) -> Self {
        HandlerResponse {
            status_code,
            headers,
            body: body.to_string(),
        }
    }

    /// The body decoded back into JSON; `Null` if it does not parse.
    pub fn json_body(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}
