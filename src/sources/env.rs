//! Environment variable source.

use super::{ConfigSource, SourceValues};
use crate::error::{Result, StoreError};
use config::Environment;

/// Loads values from environment variables sharing a prefix.
///
/// `separator` splits a variable name into key segments, and variable names
/// are lowercased: with prefix `APP` and separator `__`,
/// `APP_ENGINE__CYLINDERS=6` becomes `engine.cylinders = 6`. Numbers and
/// booleans are parsed.
///
/// # Examples
///
/// ```rust
/// use dotstore::sources::EnvSource;
///
/// let source = EnvSource::new("APP", "__");
/// ```
pub struct EnvSource {
    prefix: String,
    separator: String,
    priority: i32,
}

impl EnvSource {
    /// Create an environment source with the default priority (300).
    pub fn new(prefix: impl Into<String>, separator: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            separator: separator.into(),
            priority: 300,
        }
    }

    /// Set the priority for this source.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl ConfigSource for EnvSource {
    fn load(&self) -> Result<SourceValues> {
        let env_source = Environment::with_prefix(&self.prefix)
            .prefix_separator("_")
            .separator(&self.separator)
            .try_parsing(true);

        let parsed = config::Config::builder()
            .add_source(env_source)
            .build()
            .map_err(|e| {
                StoreError::LoadError(format!("Failed to load environment variables: {}", e))
            })?;

        parsed.try_deserialize::<SourceValues>().map_err(|e| {
            StoreError::DeserializationError(format!(
                "Failed to parse environment variables: {}",
                e
            ))
        })
    }

    fn name(&self) -> String {
        format!("env:{}*", self.prefix)
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}
