//! Builder for constructing containers from sources.

use crate::core::{Container, SourceLoader};
use crate::error::Result;
use crate::sources::{ConfigSource, EnvSource, FileSource, ValueSource};
use serde_json::Value;
use std::path::PathBuf;
use tracing::debug;

#[cfg(feature = "metrics")]
use crate::metrics::StoreMetrics;

/// Builder for a [`Container`] loaded from defaults, files and the environment.
///
/// The sources are remembered, so [`Container::reload`] can read them again.
///
/// # Examples
///
/// ```rust,no_run
/// use dotstore::prelude::*;
/// use serde_json::json;
///
/// # fn example() -> Result<()> {
/// let container = Container::builder()
///     .with_values(json!({"engine": {"cylinders": 4}}))
///     .with_file("settings/default.yaml")
///     .with_file("settings/production.yaml")
///     .with_env_overrides("APP", "__")
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ContainerBuilder {
    defaults: Option<Value>,
    file_paths: Vec<PathBuf>,
    env_prefix: Option<String>,
    env_separator: Option<String>,
    custom_sources: Vec<Box<dyn ConfigSource>>,
    #[cfg(feature = "metrics")]
    metrics: Option<StoreMetrics>,
}

impl ContainerBuilder {
    /// Create a builder with no sources.
    pub fn new() -> Self {
        Self {
            defaults: None,
            file_paths: Vec::new(),
            env_prefix: None,
            env_separator: None,
            custom_sources: Vec::new(),
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// Start from an in-memory mapping with the lowest priority.
    pub fn with_values(mut self, values: Value) -> Self {
        self.defaults = Some(values);
        self
    }

    /// Add a YAML, TOML or JSON file.
    ///
    /// Later files override earlier ones.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_paths.push(path.into());
        self
    }

    /// Read environment variables named `{prefix}_{KEY}`, with `separator`
    /// splitting key segments. These take precedence over files.
    ///
    /// ```rust,no_run
    /// use dotstore::prelude::*;
    ///
    /// // APP_ENGINE__CYLINDERS=6 -> engine.cylinders = 6
    /// let builder = Container::builder().with_env_overrides("APP", "__");
    /// ```
    pub fn with_env_overrides(mut self, prefix: &str, separator: &str) -> Self {
        self.env_prefix = Some(prefix.to_string());
        self.env_separator = Some(separator.to_string());
        self
    }

    /// Add a custom source.
    pub fn with_source<S: ConfigSource + 'static>(mut self, source: S) -> Self {
        self.custom_sources.push(Box::new(source));
        self
    }

    /// Record write, fan-out and refresh counts with OpenTelemetry.
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, metrics: StoreMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Load every source and build the container.
    ///
    /// A builder without sources yields an empty container.
    ///
    /// # Errors
    ///
    /// Returns an error if any source fails to load.
    pub fn build(self) -> Result<Container> {
        let mut loader = SourceLoader::new();

        if let Some(values) = self.defaults {
            loader.add_source(Box::new(ValueSource::new(values)));
        }

        for (index, path) in self.file_paths.iter().enumerate() {
            let priority = 100 + (index as i32 * 10);
            loader.add_source(Box::new(FileSource::new(path).with_priority(priority)));
        }

        for source in self.custom_sources {
            loader.add_source(source);
        }

        if let (Some(prefix), Some(separator)) = (self.env_prefix, self.env_separator) {
            loader.add_source(Box::new(EnvSource::new(prefix, separator)));
        }

        let container = if loader.is_empty() {
            Container::new()
        } else {
            debug!(sources = ?loader.source_names(), "building container");
            let values = loader.load()?;
            Container::from_flat(values).with_loader(loader)
        };

        #[cfg(feature = "metrics")]
        let container = match self.metrics {
            Some(metrics) => container.with_metrics(metrics),
            None => container,
        };

        Ok(container)
    }
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    /// Create a builder for a container loaded from sources.
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }
}
