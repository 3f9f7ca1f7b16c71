// Webhook delivery client
//
// Handles the outbound HTTP POST of an event payload to one endpoint

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Error types for a single delivery attempt
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    /// No response within the attempt timeout
    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    /// Could not reach the endpoint
    #[error("Connection error: {0}")]
    Connect(String),

    /// Request could not be built or sent
    #[error("Request error: {0}")]
    Request(String),

    /// Endpoint answered with a status treated as failure
    #[error("HTTP {0}")]
    Status(u16),
}

/// Response received from a webhook endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryResponse {
    pub status_code: u16,
    pub body: String,
}

/// Outbound HTTP seam used by the dispatcher
#[async_trait]
pub trait DeliveryClient: Send + Sync {
    /// POST `payload` as JSON to `url`, giving up after `timeout`
    async fn post(
        &self,
        url: &str,
        payload: &serde_json::Value,
        timeout: Duration,
    ) -> Result<DeliveryResponse, TransportError>;
}

/// `reqwest`-backed delivery client
#[derive(Debug, Clone)]
pub struct HttpDeliveryClient {
    client: reqwest::Client,
}

impl HttpDeliveryClient {
    /// Create a new delivery client
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Wrap an existing `reqwest` client (shared connection pool)
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpDeliveryClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeliveryClient for HttpDeliveryClient {
    async fn post(
        &self,
        url: &str,
        payload: &serde_json::Value,
        timeout: Duration,
    ) -> Result<DeliveryResponse, TransportError> {
        let response = self
            .client
            .post(url)
            .timeout(timeout)
            .json(payload)
            .send()
            .await
            .map_err(|e| classify_error(e, timeout))?;

        let status_code = response.status().as_u16();
        // The body is informational; an unreadable body does not fail the delivery
        let body = response.text().await.unwrap_or_default();

        debug!("POST {} -> {} ({} bytes)", url, status_code, body.len());

        Ok(DeliveryResponse { status_code, body })
    }
}

fn classify_error(err: reqwest::Error, timeout: Duration) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(timeout.as_millis() as u64)
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Request(err.to_string())
    }
}

/// Outcome of delivering one event to one subscription
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DeliveryOutcome {
    /// A response was received; the status code is recorded as-is
    Delivered { status_code: u16 },
    /// No usable response
    Failed { error: String },
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }

    /// Metric/log label
    pub fn label(&self) -> &'static str {
        match self {
            DeliveryOutcome::Delivered { .. } => "delivered",
            DeliveryOutcome::Failed { .. } => "failed",
        }
    }
}

/// Per-subscription entry of a dispatch report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryResult {
    #[serde(rename = "webhook_id")]
    pub subscription_id: Uuid,
    #[serde(rename = "url")]
    pub target_url: String,
    #[serde(flatten)]
    pub outcome: DeliveryOutcome,
    /// Attempts made, including retries
    pub attempts: u32,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_delivered_result_serialization() {
        let id = Uuid::new_v4();
        let result = DeliveryResult {
            subscription_id: id,
            target_url: "http://y/hook".to_string(),
            outcome: DeliveryOutcome::Delivered { status_code: 200 },
            attempts: 1,
            duration_ms: 12,
        };

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(
            value,
            json!({
                "webhook_id": id.to_string(),
                "url": "http://y/hook",
                "status_code": 200,
                "attempts": 1,
                "duration_ms": 12
            })
        );
    }

    #[test]
    fn test_failed_result_serialization() {
        let result = DeliveryResult {
            subscription_id: Uuid::new_v4(),
            target_url: "http://x/hook".to_string(),
            outcome: DeliveryOutcome::Failed {
                error: TransportError::Connect("refused".to_string()).to_string(),
            },
            attempts: 1,
            duration_ms: 3,
        };

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["error"], "Connection error: refused");
        assert!(value.get("status_code").is_none());
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(DeliveryOutcome::Delivered { status_code: 500 }.label(), "delivered");
        assert!(DeliveryOutcome::Delivered { status_code: 500 }.is_delivered());
        assert_eq!(
            DeliveryOutcome::Failed { error: "x".to_string() }.label(),
            "failed"
        );
    }

    #[test]
    fn test_transport_error_messages() {
        assert_eq!(TransportError::Timeout(5000).to_string(), "Request timed out after 5000ms");
        assert_eq!(TransportError::Status(503).to_string(), "HTTP 503");
    }
}
