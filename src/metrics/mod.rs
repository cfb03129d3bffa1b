//! Built-in metrics for store operations.
//!
//! Provides OpenTelemetry counters for:
//! - Values written
//! - Updates delivered to views
//! - View refreshes after load, reset and reload
//! - Loads
//!
//! # Examples
//!
//! ```rust,no_run
//! use dotstore::prelude::*;
//! use dotstore::metrics::StoreMetrics;
//! use opentelemetry::global;
//!
//! # fn example() -> Result<()> {
//! let metrics = StoreMetrics::new(global::meter("my-app"));
//!
//! let container = Container::builder()
//!     .with_file("settings.yaml")
//!     .with_metrics(metrics)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

mod store_metrics;

pub use store_metrics::StoreMetrics;
