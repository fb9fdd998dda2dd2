//! Where raw session records come from.
//!
//! The store is written against the [`SessionSource`] trait so tests can
//! drive it with fixture data instead of the network.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::SessionsError;

/// Default dataset location, overridable through configuration.
pub const DEFAULT_SESSIONS_URL: &str =
    "https://lo-interview.s3.us-west-2.amazonaws.com/health_sessions.json";

/// A pluggable origin for the raw session dataset.
#[async_trait]
pub trait SessionSource: Send + Sync {
    /// Fetch the full dataset as raw JSON records.
    async fn fetch(&self) -> Result<Vec<Value>, SessionsError>;
}

/// Fetches the dataset with a single HTTP GET. No automatic retries; the
/// store re-invokes the source if a caller retries after a failure.
pub struct HttpSessionSource {
    client: reqwest::Client,
    url: String,
}

impl HttpSessionSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Default for HttpSessionSource {
    fn default() -> Self {
        Self::new(DEFAULT_SESSIONS_URL)
    }
}

#[async_trait]
impl SessionSource for HttpSessionSource {
    async fn fetch(&self) -> Result<Vec<Value>, SessionsError> {
        tracing::info!("fetching session dataset from {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| SessionsError::Fetch(format!("request to {} failed: {e}", self.url)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SessionsError::Fetch(format!(
                "{} returned status {status}",
                self.url
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SessionsError::Decode(format!("response body is not JSON: {e}")))?;

        match body {
            Value::Array(records) => Ok(records),
            other => Err(SessionsError::Decode(format!(
                "expected a JSON array of records, got {}",
                json_kind(&other)
            ))),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
