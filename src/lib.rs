//! # dotstore
//!
//! Hierarchical key-value store with auto-synchronizing views and scoped
//! overrides.
//!
//! ## Overview
//!
//! `dotstore` keeps values under dotted keys (`"engine.fuel.density"`) in a
//! shared [`Container`](core::Container):
//! - Nested mappings are flattened to dotkeys on the way in
//! - [`View`](core::View)s project one or more prefixes of a container and
//!   stay in sync with every write, in either direction
//! - [`ScopedOverride`](core::ScopedOverride) guards apply temporary values
//!   that are rolled back on every exit path
//! - Containers can be loaded from files and environment variables, then
//!   reset or reloaded
//!
//! ## Quick Start
//!
//! ```rust
//! use dotstore::prelude::*;
//! use serde_json::json;
//!
//! # fn example() -> Result<()> {
//! let container = Container::from_value(json!({
//!     "engine": {"cylinders": 4, "fuel": {"density": 0.74}}
//! }))?;
//!
//! // A view keyed by suffixes below "engine"
//! let engine = View::new(&container, ["engine"])?;
//! assert_eq!(engine.get("fuel.density")?, json!(0.74));
//!
//! // Writes through the container reach the view
//! container.set("engine.cylinders", 6)?;
//! assert_eq!(engine.get("cylinders")?, json!(6));
//!
//! // Temporary values
//! {
//!     let _guard = container.context([("engine.cylinders", 12)])?;
//!     assert_eq!(engine.get("cylinders")?, json!(12));
//! }
//! assert_eq!(engine.get("cylinders")?, json!(6));
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! ## Feature Flags
//!
//! - `namespace` (default): [`features::Namespace`], named shared containers
//! - `factory` (default): [`features::Factory`], constructors picked by name
//! - `metrics`: OpenTelemetry counters for writes, fan-out and refreshes
//!
//! ```toml
//! [dependencies]
//! dotstore = { version = "0.1", features = ["metrics"] }
//! ```

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod core;
pub mod error;
pub mod features;
pub mod sources;

#[cfg(feature = "metrics")]
pub mod metrics;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::core::{
        Container, ContainerBuilder, FlatMap, Prefix, Scoped, ScopedOverride, Store, View,
    };
    pub use crate::error::{Result, StoreError};
}
