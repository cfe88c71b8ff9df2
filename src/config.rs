use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::env::{
    DEFAULT_STREAM, FUNCTION_NAME_ENV, FUNCTION_VERSION_ENV, OPENOBSERVE_BASE_ENDPOINT_ENV,
    OPENOBSERVE_ORGANIZATION_ENV, OPENOBSERVE_PASSWORD_ENV, OPENOBSERVE_STREAM_ENV,
    OPENOBSERVE_USERNAME_ENV, REGION_ENV, SERVICE_NAME_ENV,
};

/// Service name used when `OTEL_SERVICE_NAME` is unset.
pub const DEFAULT_SERVICE_NAME: &str = "lambda-openobserve-demo";

/// Connection settings for the OpenObserve log sink.
///
/// Resolved once at startup and read-only afterwards. A config missing
/// any of `endpoint`, `username`, `password` or `organization` is not an
/// error: it simply means shipping is disabled for the life of the
/// process (see [`SinkConfig::is_complete`]).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SinkConfig {
    /// Base URL without path, e.g. "https://api.openobserve.ai".
    pub endpoint: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub organization: Option<String>,
    pub stream: String,
    /// `Basic <base64(username:password)>`, present when both halves are.
    pub auth_header: Option<String>,
}

impl SinkConfig {
    /// Build a config from explicit values, deriving the auth header.
    pub fn new(
        endpoint: Option<String>,
        username: Option<String>,
        password: Option<String>,
        organization: Option<String>,
        stream: Option<String>,
    ) -> Self {
        let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());
        let username = non_empty(username);
        let password = non_empty(password);
        let auth_header = match (&username, &password) {
            (Some(user), Some(pass)) => Some(basic_auth_header(user, pass)),
            _ => None,
        };

        SinkConfig {
            endpoint: non_empty(endpoint),
            username,
            password,
            organization: non_empty(organization),
            stream: non_empty(stream).unwrap_or_else(|| DEFAULT_STREAM.to_string()),
            auth_header,
        }
    }

    /// Resolve the sink config from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve the sink config through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::new(
            lookup(OPENOBSERVE_BASE_ENDPOINT_ENV),
            lookup(OPENOBSERVE_USERNAME_ENV),
            lookup(OPENOBSERVE_PASSWORD_ENV),
            lookup(OPENOBSERVE_ORGANIZATION_ENV),
            lookup(OPENOBSERVE_STREAM_ENV),
        )
    }

    /// Whether every value needed to ship a record is present.
    pub fn is_complete(&self) -> bool {
        self.endpoint.is_some()
            && self.username.is_some()
            && self.password.is_some()
            && self.organization.is_some()
    }

    /// Full ingestion URL, `{endpoint}/api/{organization}/{stream}/_json`.
    ///
    /// Returns `None` while the config is incomplete.
    pub fn ingest_url(&self) -> Option<String> {
        if !self.is_complete() {
            return None;
        }
        let endpoint = self.endpoint.as_deref()?;
        let organization = self.organization.as_deref()?;
        Some(format!(
            "{}/api/{}/{}/_json",
            endpoint.trim_end_matches('/'),
            urlencoding::encode(organization),
            urlencoding::encode(&self.stream),
        ))
    }
}

fn basic_auth_header(username: &str, password: &str) -> String {
    let encoded = STANDARD.encode(format!("{}:{}", username, password));
    format!("Basic {}", encoded)
}

/// Process-wide settings resolved once at cold start.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub sink: SinkConfig,
    pub service_name: String,
    /// Empty outside of a Lambda environment.
    pub function_name: String,
    pub function_version: String,
    pub region: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        AppConfig {
            sink: SinkConfig::from_lookup(&lookup),
            service_name: get(SERVICE_NAME_ENV).unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string()),
            function_name: get(FUNCTION_NAME_ENV).unwrap_or_default(),
            function_version: get(FUNCTION_VERSION_ENV).unwrap_or_else(|| "$LATEST".to_string()),
            region: get(REGION_ENV).unwrap_or_default(),
        }
    }
}
