// WeFeed webhook service - library root
//
// Webhook registration, event fan-out to active webhooks, and the
// one-time code flows backed by the expiring store.

pub mod api;
pub mod cache;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod otp;
pub mod webhooks;

pub use config::Config;
pub use webhooks::{DispatchReport, Dispatcher, InMemoryRegistry, SubscriptionStore};
