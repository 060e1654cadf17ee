//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `credit_debits_total` - Successful metered debits
//! - `credit_refunds_total` - Compensating refunds
//! - `credit_payments_total` - Payment credits applied
//! - `credit_failed_payments_total` - Failed payment attempts recorded
//! - `credit_apply_duration_seconds` - Histogram of entry commit latencies

use prometheus::{Histogram, HistogramOpts, IntCounter, Registry};
use std::sync::Arc;

/// Metrics collector
///
/// Collectors are registered on a dedicated registry so that multiple
/// ledger instances (tests, embedded use) do not collide.
#[derive(Clone)]
pub struct Metrics {
    /// Successful metered debits
    pub debits_total: IntCounter,

    /// Compensating refunds
    pub refunds_total: IntCounter,

    /// Payment credits applied
    pub payments_total: IntCounter,

    /// Failed payment attempts recorded
    pub failed_payments_total: IntCounter,

    /// Entry commit latency histogram
    pub apply_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let debits_total =
            IntCounter::new("credit_debits_total", "Successful metered debits")?;
        registry.register(Box::new(debits_total.clone()))?;

        let refunds_total =
            IntCounter::new("credit_refunds_total", "Compensating refunds")?;
        registry.register(Box::new(refunds_total.clone()))?;

        let payments_total =
            IntCounter::new("credit_payments_total", "Payment credits applied")?;
        registry.register(Box::new(payments_total.clone()))?;

        let failed_payments_total = IntCounter::new(
            "credit_failed_payments_total",
            "Failed payment attempts recorded",
        )?;
        registry.register(Box::new(failed_payments_total.clone()))?;

        let apply_duration = Histogram::with_opts(
            HistogramOpts::new(
                "credit_apply_duration_seconds",
                "Histogram of entry commit latencies",
            )
            .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0]),
        )?;
        registry.register(Box::new(apply_duration.clone()))?;

        Ok(Self {
            debits_total,
            refunds_total,
            payments_total,
            failed_payments_total,
            apply_duration,
            registry,
        })
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
