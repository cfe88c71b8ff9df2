use crate::config::SinkConfig;
use crate::error::SinkError;
use crate::record::LogRecord;
use crate::sink::LogSink;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;

/// Resolved connection settings for [`OpenObserveSink`].
///
/// Only constructible from a complete [`SinkConfig`]; an incomplete one
/// means shipping is disabled and no sink is built at all.
#[derive(Clone, Debug)]
pub struct OpenObserveConfig {
    /// `{endpoint}/api/{organization}/{stream}/_json`
    pub url: String,
    /// Full `Authorization` header value.
    pub auth_header: String,
}

impl OpenObserveConfig {
    pub fn from_sink_config(config: &SinkConfig) -> Option<Self> {
        Some(OpenObserveConfig {
            url: config.ingest_url()?,
            auth_header: config.auth_header.clone()?,
        })
    }
}

/// OpenObserve implementation of [`LogSink`] using the `_json` ingestion API.
///
/// Each record goes out as its own batch-of-one JSON array in a single
/// POST. There is no buffering and no retry.
#[derive(Clone)]
pub struct OpenObserveSink {
    client: Client,
    config: OpenObserveConfig,
}

impl OpenObserveSink {
    /// Construct a new sink with a fresh HTTP client.
    ///
    /// **Parameters**
    /// - `config`: [`OpenObserveConfig`] with the ingestion URL and the
    ///   precomputed Basic auth header.
    pub fn new(config: OpenObserveConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    /// Construct a sink sharing an existing client (and its pool).
    pub fn with_client(client: Client, config: OpenObserveConfig) -> Self {
        Self { client, config }
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }
}

#[async_trait]
impl LogSink for OpenObserveSink {
    async fn send(&self, record: &LogRecord) -> Result<(), SinkError> {
        let body = serde_json::to_vec(&[record])?;
        let resp = self
            .client
            .post(&self.config.url)
            .header(AUTHORIZATION, &self.config.auth_header)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        if resp.status().is_success() {
            Ok(())
        } else {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_else(|_| "<no body>".to_string());
            Err(SinkError::Http { status, body })
        }
    }

    fn name(&self) -> &'static str {
        "openobserve"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_requires_complete_sink_settings() {
        let incomplete = SinkConfig::new(
            Some("http://localhost:5080".into()),
            Some("user".into()),
            Some("pass".into()),
            None,
            None,
        );
        assert!(OpenObserveConfig::from_sink_config(&incomplete).is_none());

        let complete = SinkConfig::new(
            Some("http://localhost:5080".into()),
            Some("user".into()),
            Some("pass".into()),
            Some("default".into()),
            Some("lambda logs".into()),
        );
        let config = OpenObserveConfig::from_sink_config(&complete).unwrap();
        assert_eq!(config.url, "http://localhost:5080/api/default/lambda%20logs/_json");
        assert_eq!(config.auth_header, "Basic dXNlcjpwYXNz");
    }
}
