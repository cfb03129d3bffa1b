//! Store metrics tracking using OpenTelemetry.

use opentelemetry::metrics::{Counter, Meter};

/// Metrics collector for container operations.
///
/// # Examples
///
/// ```rust,no_run
/// use dotstore::metrics::StoreMetrics;
/// use opentelemetry::global;
///
/// let metrics = StoreMetrics::new(global::meter("dotstore"));
/// metrics.record_writes(3);
/// ```
#[derive(Clone)]
pub struct StoreMetrics {
    writes: Counter<u64>,
    deliveries: Counter<u64>,
    refreshes: Counter<u64>,
    loads: Counter<u64>,
}

impl StoreMetrics {
    /// Create a new metrics collector with the provided meter.
    pub fn new(meter: Meter) -> Self {
        let writes = meter
            .u64_counter("dotstore.writes")
            .with_description("Number of values written to containers")
            .build();

        let deliveries = meter
            .u64_counter("dotstore.deliveries")
            .with_description("Number of updates pushed to views")
            .build();

        let refreshes = meter
            .u64_counter("dotstore.refreshes")
            .with_description("Number of full view refreshes")
            .build();

        let loads = meter
            .u64_counter("dotstore.loads")
            .with_description("Number of container loads and resets")
            .build();

        Self {
            writes,
            deliveries,
            refreshes,
            loads,
        }
    }

    /// Record values committed by one `set`/`dset`.
    pub fn record_writes(&self, count: usize) {
        self.writes.add(count as u64, &[]);
    }

    /// Record updates pushed to views for one written key.
    pub fn record_deliveries(&self, count: usize) {
        self.deliveries.add(count as u64, &[]);
    }

    /// Record views refreshed after a load or reset.
    pub fn record_refreshes(&self, count: usize) {
        self.refreshes.add(count as u64, &[]);
    }

    /// Record one load or reset.
    pub fn record_load(&self) {
        self.loads.add(1, &[]);
    }
}

impl std::fmt::Debug for StoreMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreMetrics").finish_non_exhaustive()
    }
}
