//! Source trait.

use crate::error::Result;
use serde_json::{Map, Value};

/// Nested values produced by one source, before flattening into dotkeys.
pub type SourceValues = Map<String, Value>;

/// Something a [`Container`](crate::core::Container) can be loaded from.
///
/// Implement this trait to feed a container from custom places (a database,
/// a remote service, a generated table).
pub trait ConfigSource: Send + Sync {
    /// Load the source as a nested mapping.
    ///
    /// Keys may themselves contain dots; they are flattened like any other
    /// mapping when merged into the container.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read or parsed.
    fn load(&self) -> Result<SourceValues>;

    /// Human-readable name used in logs and errors.
    fn name(&self) -> String;

    /// Priority of this source (higher = takes precedence).
    ///
    /// Default priorities:
    /// - Environment variables: 300
    /// - Files: 100, 110, 120, ... in the order they were added
    /// - In-memory defaults: 0
    fn priority(&self) -> i32 {
        100
    }
}
