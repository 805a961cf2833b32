//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `payment_history_queries_total{query}` - Completed queries
//! - `payment_history_failures_total{kind}` - Failed queries by error kind
//! - `payment_history_chains_per_query` - Histogram of chains built per query
//!
//! Each collector owns its registry, so independent engines (and tests) never
//! collide on the process-wide default registry.

use prometheus::{Histogram, HistogramOpts, IntCounterVec, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Completed queries by name
    pub queries_total: IntCounterVec,

    /// Failed queries by error kind
    pub failures_total: IntCounterVec,

    /// Chains built per query
    pub chains_per_query: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("chains_observed", &self.chains_per_query.get_sample_count())
            .finish_non_exhaustive()
    }
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let queries_total = IntCounterVec::new(
            Opts::new("payment_history_queries_total", "Total number of completed queries"),
            &["query"],
        )?;
        registry.register(Box::new(queries_total.clone()))?;

        let failures_total = IntCounterVec::new(
            Opts::new("payment_history_failures_total", "Total number of failed queries"),
            &["kind"],
        )?;
        registry.register(Box::new(failures_total.clone()))?;

        let chains_per_query = Histogram::with_opts(
            HistogramOpts::new(
                "payment_history_chains_per_query",
                "Histogram of chains built per query",
            )
            .buckets(vec![0.0, 1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0]),
        )?;
        registry.register(Box::new(chains_per_query.clone()))?;

        Ok(Self {
            queries_total,
            failures_total,
            chains_per_query,
            registry,
        })
    }

    /// Record a completed query
    pub fn record_query(&self, query: &str) {
        self.queries_total.with_label_values(&[query]).inc();
    }

    /// Record a failed query
    pub fn record_failure(&self, kind: &str) {
        self.failures_total.with_label_values(&[kind]).inc();
    }

    /// Record how many chains a query built
    pub fn record_chains(&self, chains: usize) {
        self.chains_per_query.observe(chains as f64);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
