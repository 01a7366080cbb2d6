//! Prometheus metrics for the store write path.

use prometheus_client::metrics::counter::Counter;
use prometheus_client::registry::Registry;

/// Container for all write-path metrics.
///
/// `wal_append_failures_total` is the operational side channel for log
/// append errors: they never fail the in-flight request, so this counter
/// is how reduced recovery fidelity becomes visible to alerting.
pub struct WriteMetrics {
    registry: Registry,

    /// Counter of merges applied to storage.
    pub merges_applied_total: Counter,

    /// Counter of puts applied to storage.
    pub puts_applied_total: Counter,

    /// Counter of writes rejected by the storage engine.
    pub writes_rejected_total: Counter,

    /// Counter of write-ahead log append failures after a successful apply.
    pub wal_append_failures_total: Counter,
}

impl Default for WriteMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl WriteMetrics {
    /// Create a new metrics registry with all metrics registered.
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let merges_applied_total = Counter::default();
        registry.register(
            "merges_applied_total",
            "Total number of merges applied to storage",
            merges_applied_total.clone(),
        );

        let puts_applied_total = Counter::default();
        registry.register(
            "puts_applied_total",
            "Total number of puts applied to storage",
            puts_applied_total.clone(),
        );

        let writes_rejected_total = Counter::default();
        registry.register(
            "writes_rejected_total",
            "Total number of writes rejected by the storage engine",
            writes_rejected_total.clone(),
        );

        let wal_append_failures_total = Counter::default();
        registry.register(
            "wal_append_failures_total",
            "Total number of write-ahead log append failures after a successful apply",
            wal_append_failures_total.clone(),
        );

        Self {
            registry,
            merges_applied_total,
            puts_applied_total,
            writes_rejected_total,
            wal_append_failures_total,
        }
    }

    /// The registry holding all write-path metrics, for exposition.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_start_all_counters_at_zero() {
        let metrics = WriteMetrics::new();

        assert_eq!(metrics.merges_applied_total.get(), 0);
        assert_eq!(metrics.puts_applied_total.get(), 0);
        assert_eq!(metrics.writes_rejected_total.get(), 0);
        assert_eq!(metrics.wal_append_failures_total.get(), 0);
    }
}
