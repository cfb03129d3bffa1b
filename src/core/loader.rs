//! Loader that merges several sources into one flat map.

use crate::core::dotkey::{self, FlatMap};
use crate::error::{Result, StoreError};
use crate::sources::ConfigSource;
use serde_json::Value;
use tracing::debug;

/// Loads and merges values from multiple sources.
///
/// Sources are merged in priority order (lowest first); each one is flattened
/// into dotkeys, so a higher priority source overrides individual leaves and
/// leaves the rest of a lower priority mapping in place.
pub(crate) struct SourceLoader {
    sources: Vec<Box<dyn ConfigSource>>,
}

impl SourceLoader {
    pub(crate) fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    pub(crate) fn add_source(&mut self, source: Box<dyn ConfigSource>) {
        self.sources.push(source);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    fn sorted(&self) -> Vec<&dyn ConfigSource> {
        let mut sorted: Vec<&dyn ConfigSource> = self.sources.iter().map(|s| &**s).collect();
        sorted.sort_by_key(|s| s.priority());
        sorted
    }

    /// Load every source and merge the results.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::LoadError`] if there are no sources or a source
    /// fails to load.
    pub(crate) fn load(&self) -> Result<FlatMap> {
        if self.sources.is_empty() {
            return Err(StoreError::LoadError("No sources specified".to_string()));
        }

        let mut merged = FlatMap::new();
        for source in self.sorted() {
            let values = source.load().map_err(|e| {
                StoreError::LoadError(format!("Failed to load source '{}': {}", source.name(), e))
            })?;
            let flat = dotkey::flatten(&Value::Object(values));
            debug!(source = %source.name(), keys = flat.len(), "merged source");
            merged.extend(flat);
        }
        Ok(merged)
    }

    /// Source names in priority order.
    pub(crate) fn source_names(&self) -> Vec<String> {
        self.sorted().iter().map(|s| s.name()).collect()
    }
}

impl Default for SourceLoader {
    fn default() -> Self {
        Self::new()
    }
}
