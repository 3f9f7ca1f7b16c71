// Event dispatcher - fans one event out to every active webhook
//
// Each subscription is delivered to independently: a failing endpoint is
// recorded in the report and never stops delivery to the others. Only a
// failure to list the active subscriptions aborts a dispatch.

use crate::metrics;
use crate::webhooks::delivery::{DeliveryClient, DeliveryOutcome, DeliveryResult, TransportError};
use crate::webhooks::registry::{RegistryError, SubscriptionStore};
use crate::webhooks::retry::{calculate_retry_delay, get_attempt_timeout, RetryConfig, RetryDecision};
use crate::webhooks::subscription::Subscription;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Dispatcher configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Timeout for a single delivery attempt in seconds
    pub timeout_secs: u64,
    /// Number of deliveries in flight at once (1 = sequential)
    pub concurrency: usize,
    /// Record non-2xx responses as failures instead of deliveries
    pub fail_on_error_status: bool,
    /// Retry policy for failed attempts
    pub retry: RetryConfig,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 5,
            concurrency: 1,
            fail_on_error_status: false,
            retry: RetryConfig::default(),
        }
    }
}

impl DispatcherConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Dispatch failure; only raised when the registry cannot be read
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Failed to list active webhooks: {0}")]
    Registry(#[from] RegistryError),
}

/// Ordered per-subscription results of one dispatch
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DispatchReport {
    pub results: Vec<DeliveryResult>,
}

impl DispatchReport {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Number of results with a delivered outcome
    pub fn delivered(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_delivered()).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.delivered()
    }
}

/// Webhook event dispatcher
pub struct Dispatcher {
    store: Arc<dyn SubscriptionStore>,
    client: Arc<dyn DeliveryClient>,
    config: DispatcherConfig,
}

impl Dispatcher {
    /// Create a new dispatcher
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        client: Arc<dyn DeliveryClient>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            store,
            client,
            config,
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Deliver `payload` to every active subscription
    ///
    /// The report has exactly one entry per active subscription, in the
    /// order the registry listed them.
    pub async fn dispatch(&self, payload: &serde_json::Value) -> Result<DispatchReport, DispatchError> {
        let subscriptions = self.store.list_active().await.map_err(|e| {
            error!(error = %e, "Could not list active webhooks");
            e
        })?;

        metrics::DISPATCHES_TOTAL.inc();
        info!("Dispatching event to {} active webhooks", subscriptions.len());

        if subscriptions.is_empty() {
            return Ok(DispatchReport::default());
        }

        let results = if self.config.concurrency <= 1 {
            let mut results = Vec::with_capacity(subscriptions.len());
            for subscription in &subscriptions {
                results.push(self.deliver(subscription, payload).await);
            }
            results
        } else {
            // Futures are built up front so the stream holds no borrowing closure,
            // which keeps `dispatch` Send for axum handlers
            let deliveries: Vec<_> = subscriptions
                .iter()
                .map(|subscription| self.deliver(subscription, payload))
                .collect();

            // `buffered` yields in input order regardless of completion order
            stream::iter(deliveries)
                .buffered(self.config.concurrency)
                .collect::<Vec<_>>()
                .await
        };

        let report = DispatchReport { results };
        info!(
            delivered = report.delivered(),
            failed = report.failed(),
            "Dispatch complete"
        );
        Ok(report)
    }

    /// Deliver to one subscription, retrying per the retry policy
    async fn deliver(&self, subscription: &Subscription, payload: &serde_json::Value) -> DeliveryResult {
        let start = Instant::now();
        let mut attempt = 0;

        let outcome = loop {
            debug!(
                "Webhook delivery attempt {} for {}",
                attempt + 1,
                subscription.id
            );

            let timeout = get_attempt_timeout(attempt, self.config.timeout());
            let error = match self
                .client
                .post(&subscription.endpoint_url, payload, timeout)
                .await
            {
                Ok(response)
                    if self.config.fail_on_error_status
                        && !(200..300).contains(&response.status_code) =>
                {
                    TransportError::Status(response.status_code)
                }
                Ok(response) => {
                    info!(
                        webhook_id = %subscription.id,
                        url = %subscription.endpoint_url,
                        status = response.status_code,
                        "Event delivered"
                    );
                    break DeliveryOutcome::Delivered {
                        status_code: response.status_code,
                    };
                }
                Err(e) => e,
            };

            let decision = match &error {
                TransportError::Status(status) if !is_retryable_status(*status) => {
                    RetryDecision::GiveUp
                }
                _ => calculate_retry_delay(attempt, &self.config.retry),
            };

            match decision {
                RetryDecision::Retry(delay_ms) => {
                    warn!(
                        webhook_id = %subscription.id,
                        error = %error,
                        "Delivery attempt {} failed, retrying in {} ms",
                        attempt + 1,
                        delay_ms
                    );
                    attempt += 1;
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                RetryDecision::GiveUp => {
                    error!(
                        webhook_id = %subscription.id,
                        url = %subscription.endpoint_url,
                        error = %error,
                        "Event delivery failed"
                    );
                    break DeliveryOutcome::Failed {
                        error: error.to_string(),
                    };
                }
            }
        };

        let elapsed = start.elapsed();
        metrics::DELIVERIES_TOTAL
            .with_label_values(&[outcome.label()])
            .inc();
        metrics::DELIVERY_DURATION_SECONDS
            .with_label_values(&[outcome.label()])
            .observe(elapsed.as_secs_f64());

        DeliveryResult {
            subscription_id: subscription.id,
            target_url: subscription.endpoint_url.clone(),
            outcome,
            attempts: attempt + 1,
            duration_ms: elapsed.as_millis() as u64,
        }
    }
}

/// Check if an HTTP status code is worth retrying
fn is_retryable_status(status: u16) -> bool {
    matches!(
        status,
        408 | // Request Timeout
        429 | // Too Many Requests
        500 | // Internal Server Error
        502 | // Bad Gateway
        503 | // Service Unavailable
        504   // Gateway Timeout
    )
}
