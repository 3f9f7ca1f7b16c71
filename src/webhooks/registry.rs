// Subscription registry
//
// Manages:
// - Webhook registration and lifecycle
// - Partial updates with validation
// - Active subscription snapshots for dispatch

use crate::webhooks::subscription::{NewSubscription, Subscription, SubscriptionPatch};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Registry error types
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Supplied fields failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// No subscription with this ID
    #[error("Webhook {0} not found")]
    NotFound(Uuid),

    /// Backing store failure
    #[error("Registry failure: {0}")]
    Internal(String),
}

/// Persistence seam for webhook subscriptions
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Register a new subscription
    async fn create(&self, new: NewSubscription) -> Result<Subscription, RegistryError>;

    /// Fetch one subscription
    async fn get(&self, id: Uuid) -> Result<Subscription, RegistryError>;

    /// Merge supplied fields into an existing subscription
    async fn update(&self, id: Uuid, patch: SubscriptionPatch)
        -> Result<Subscription, RegistryError>;

    /// Remove a subscription
    async fn delete(&self, id: Uuid) -> Result<(), RegistryError>;

    /// All subscriptions
    async fn list(&self) -> Result<Vec<Subscription>, RegistryError>;

    /// Subscriptions that should receive events
    async fn list_active(&self) -> Result<Vec<Subscription>, RegistryError>;
}

#[derive(Debug, Default)]
struct Records {
    by_id: HashMap<Uuid, Subscription>,
    /// Registration order, used for stable listing
    order: Vec<Uuid>,
}

impl Records {
    fn ordered(&self) -> impl Iterator<Item = &Subscription> {
        self.order.iter().filter_map(|id| self.by_id.get(id))
    }
}

/// In-memory subscription registry
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistry {
    records: Arc<RwLock<Records>>,
}

impl InMemoryRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered subscriptions
    pub async fn len(&self) -> usize {
        self.records.read().await.by_id.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SubscriptionStore for InMemoryRegistry {
    async fn create(&self, new: NewSubscription) -> Result<Subscription, RegistryError> {
        let subscription = Subscription::from_new(new).map_err(|e| {
            warn!(error = %e, "Rejected webhook registration");
            RegistryError::Validation(e)
        })?;

        let mut records = self.records.write().await;
        records.order.push(subscription.id);
        records.by_id.insert(subscription.id, subscription.clone());
        crate::metrics::WEBHOOKS_REGISTERED.set(records.by_id.len() as i64);

        info!(
            webhook_id = %subscription.id,
            url = %subscription.endpoint_url,
            "Registered webhook"
        );
        Ok(subscription)
    }

    async fn get(&self, id: Uuid) -> Result<Subscription, RegistryError> {
        let records = self.records.read().await;
        records
            .by_id
            .get(&id)
            .cloned()
            .ok_or(RegistryError::NotFound(id))
    }

    async fn update(
        &self,
        id: Uuid,
        patch: SubscriptionPatch,
    ) -> Result<Subscription, RegistryError> {
        let mut records = self.records.write().await;
        let subscription = records
            .by_id
            .get_mut(&id)
            .ok_or(RegistryError::NotFound(id))?;

        subscription.apply(patch).map_err(|e| {
            warn!(webhook_id = %id, error = %e, "Rejected webhook update");
            RegistryError::Validation(e)
        })?;

        info!(
            webhook_id = %id,
            url = %subscription.endpoint_url,
            active = subscription.active,
            "Updated webhook"
        );
        Ok(subscription.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<(), RegistryError> {
        let mut records = self.records.write().await;
        let removed = records
            .by_id
            .remove(&id)
            .ok_or(RegistryError::NotFound(id))?;
        records.order.retain(|existing| *existing != id);
        crate::metrics::WEBHOOKS_REGISTERED.set(records.by_id.len() as i64);

        info!(webhook_id = %id, url = %removed.endpoint_url, "Deleted webhook");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Subscription>, RegistryError> {
        let records = self.records.read().await;
        Ok(records.ordered().cloned().collect())
    }

    async fn list_active(&self) -> Result<Vec<Subscription>, RegistryError> {
        let records = self.records.read().await;
        let active: Vec<Subscription> = records.ordered().filter(|s| s.active).cloned().collect();
        debug!("Found {} active webhooks", active.len());
        Ok(active)
    }
}
