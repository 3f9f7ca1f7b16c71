// Webhook subscriptions and event dispatch
//
// Handles:
// - Webhook registration and management
// - Fan-out of event payloads to active webhooks
// - Per-endpoint delivery with optional retries

pub mod delivery;
pub mod dispatcher;
pub mod registry;
pub mod retry;
pub mod subscription;

#[cfg(test)]
mod proptests;

pub use delivery::{
    DeliveryClient, DeliveryOutcome, DeliveryResponse, DeliveryResult, HttpDeliveryClient,
    TransportError,
};
pub use dispatcher::{DispatchError, DispatchReport, Dispatcher, DispatcherConfig};
pub use registry::{InMemoryRegistry, RegistryError, SubscriptionStore};
pub use subscription::{EventKind, NewSubscription, ResourceModel, Subscription, SubscriptionPatch};
