//! Property-Based Tests for Event Dispatch
//!
//! - **Report size**: a dispatch yields exactly one result per active
//!   subscription, however many deliveries fail
//! - **Order**: results follow registry order, sequential or concurrent
//! - **Retry bounds**: retry delays never exceed the configured cap
//!
//! ```bash
//! cargo test --lib webhooks::proptests
//! ```

use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;

use crate::webhooks::delivery::TransportError;
use crate::webhooks::dispatcher::tests::{MockClient, Script};
use crate::webhooks::dispatcher::{Dispatcher, DispatcherConfig};
use crate::webhooks::registry::{InMemoryRegistry, SubscriptionStore};
use crate::webhooks::retry::{calculate_retry_delay, RetryConfig, RetryDecision};
use crate::webhooks::subscription::NewSubscription;

/// One generated subscription: (active, delivery fails)
fn arb_subscriptions() -> impl Strategy<Value = Vec<(bool, bool)>> {
    prop::collection::vec((any::<bool>(), any::<bool>()), 0..12)
}

fn run<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_report_has_one_entry_per_active_subscription(
        specs in arb_subscriptions(),
        concurrency in 1usize..5,
    ) {
        run(async move {
            let registry = Arc::new(InMemoryRegistry::new());
            let mut client = MockClient::default();
            let mut expected = Vec::new();

            for (i, (active, fails)) in specs.iter().enumerate() {
                let url = format!("http://host-{}/hook", i);
                let sub = registry
                    .create(NewSubscription {
                        endpoint_url: Some(url.clone()),
                        active: Some(*active),
                        ..Default::default()
                    })
                    .await
                    .unwrap();
                if *fails {
                    client = client.with(&url, Script::Fail(TransportError::Connect("refused".to_string())));
                }
                if *active {
                    expected.push((sub.id, !*fails));
                }
            }

            let config = DispatcherConfig { concurrency, ..Default::default() };
            let dispatcher = Dispatcher::new(registry, Arc::new(client), config);
            let report = dispatcher.dispatch(&json!({"event": "ping"})).await.unwrap();

            let actual: Vec<_> = report
                .results
                .iter()
                .map(|r| (r.subscription_id, r.outcome.is_delivered()))
                .collect();
            assert_eq!(actual, expected);
        });
    }

    #[test]
    fn prop_retry_delay_never_exceeds_cap(
        attempt in 0u32..64,
        base in 0u64..10_000,
        cap in 0u64..120_000,
        jitter in any::<bool>(),
    ) {
        let config = RetryConfig {
            base_delay_ms: base,
            max_retries: 64,
            max_delay_ms: cap,
            use_exponential_backoff: true,
            use_jitter: jitter,
        };
        match calculate_retry_delay(attempt, &config) {
            RetryDecision::Retry(delay) => prop_assert!(delay <= cap),
            RetryDecision::GiveUp => prop_assert!(false, "attempt {} below max_retries", attempt),
        }
    }
}
