// Prometheus metrics for webhook dispatch
//
// Exposed on the /metrics HTTP endpoint:
// - Dispatch calls (counter)
// - Deliveries by outcome (counter)
// - Delivery latency by outcome (histogram)
// - Registered webhooks (gauge)
// - One-time codes issued / verified (counter)

use lazy_static::lazy_static;
use prometheus::core::Collector;
use prometheus::{
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, Registry, TextEncoder,
};
use std::sync::Arc;

lazy_static! {
    pub static ref REGISTRY: Arc<Registry> = Arc::new(Registry::new());

    // Dispatch metrics
    pub static ref DISPATCHES_TOTAL: IntCounter = IntCounter::new(
        "webhook_dispatches_total",
        "Total number of event dispatch calls"
    ).expect("Failed to create dispatches metric");

    pub static ref DELIVERIES_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("webhook_deliveries_total", "Total number of webhook deliveries"),
        &["outcome"]
    ).expect("Failed to create deliveries metric");

    pub static ref DELIVERY_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        prometheus::HistogramOpts::new(
            "webhook_delivery_duration_seconds",
            "Time spent delivering to one webhook, retries included"
        ),
        &["outcome"]
    ).expect("Failed to create delivery duration metric");

    // Registry metrics
    pub static ref WEBHOOKS_REGISTERED: IntGauge = IntGauge::new(
        "webhooks_registered",
        "Number of registered webhooks"
    ).expect("Failed to create registered webhooks metric");

    // One-time code metrics
    pub static ref OTP_ISSUED_TOTAL: IntCounter = IntCounter::new(
        "otp_issued_total",
        "Total number of one-time codes and reset tokens issued"
    ).expect("Failed to create OTP issued metric");

    pub static ref OTP_VERIFICATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("otp_verifications_total", "One-time code verification attempts"),
        &["result"]
    ).expect("Failed to create OTP verification metric");
}

fn register<C: Collector + Clone + 'static>(collector: &C) -> prometheus::Result<()> {
    match REGISTRY.register(Box::new(collector.clone())) {
        Err(prometheus::Error::AlreadyReg) => Ok(()),
        other => other,
    }
}

/// Register all metrics. Safe to call more than once.
pub fn init() -> prometheus::Result<()> {
    register(&*DISPATCHES_TOTAL)?;
    register(&*DELIVERIES_TOTAL)?;
    register(&*DELIVERY_DURATION_SECONDS)?;
    register(&*WEBHOOKS_REGISTERED)?;
    register(&*OTP_ISSUED_TOTAL)?;
    register(&*OTP_VERIFICATIONS_TOTAL)?;
    Ok(())
}

/// Gather all metrics in Prometheus text format
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))?;
    String::from_utf8(buffer).map_err(|e| anyhow::anyhow!("Invalid UTF-8 in metrics: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        assert!(init().is_ok());
        assert!(init().is_ok());
    }

    #[test]
    fn test_delivery_metrics_exported() {
        init().unwrap();
        DELIVERIES_TOTAL.with_label_values(&["delivered"]).inc();
        DISPATCHES_TOTAL.inc();

        let text = gather_metrics().unwrap();
        assert!(text.contains("webhook_deliveries_total"));
        assert!(text.contains("webhook_dispatches_total"));
    }
}
