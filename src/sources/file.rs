//! File-backed source.

use super::{ConfigSource, SourceValues};
use crate::error::{Result, StoreError};
use config::File;
use std::path::PathBuf;
use tracing::debug;

/// Loads values from a YAML, TOML or JSON file.
///
/// The format is picked from the file extension.
///
/// # Examples
///
/// ```rust,no_run
/// use dotstore::sources::{ConfigSource, FileSource};
///
/// let source = FileSource::new("settings/vehicle.yaml");
/// let values = source.load().unwrap();
/// ```
pub struct FileSource {
    path: PathBuf,
    priority: i32,
}

impl FileSource {
    /// Create a file source with the default priority (100).
    ///
    /// Supported extensions: `.yaml`, `.yml`, `.toml`, `.json`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            priority: 100,
        }
    }

    /// Set the priority for this source.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    fn validate_extension(&self) -> Result<()> {
        let extension = self
            .path
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| {
                StoreError::LoadError(format!(
                    "Unable to determine file format for: {}",
                    self.path.display()
                ))
            })?;

        match extension {
            "yaml" | "yml" | "toml" | "json" => Ok(()),
            _ => Err(StoreError::LoadError(format!(
                "Unsupported file extension: {}. Supported: .yaml, .yml, .toml, .json",
                extension
            ))),
        }
    }
}

impl ConfigSource for FileSource {
    fn load(&self) -> Result<SourceValues> {
        self.validate_extension()?;

        if !self.path.exists() {
            return Err(StoreError::LoadError(format!(
                "File not found: {}",
                self.path.display()
            )));
        }

        let parsed = config::Config::builder()
            .add_source(File::from(self.path.clone()).required(true))
            .build()
            .map_err(|e| StoreError::LoadError(format!("Failed to load file: {}", e)))?;

        let values = parsed.try_deserialize::<SourceValues>().map_err(|e| {
            StoreError::DeserializationError(format!("Failed to parse file: {}", e))
        })?;
        debug!(path = %self.path.display(), keys = values.len(), "loaded file source");
        Ok(values)
    }

    fn name(&self) -> String {
        format!("file:{}", self.path.display())
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_validate_extension() {
        for name in ["a.yaml", "a.yml", "a.toml", "a.json"] {
            assert!(FileSource::new(name).validate_extension().is_ok(), "{}", name);
        }
        assert!(FileSource::new("a.txt").validate_extension().is_err());
        assert!(FileSource::new("noext").validate_extension().is_err());
    }

    #[test]
    fn test_load_yaml_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("vehicle.yaml");
        fs::write(
            &path,
            r#"
engine:
  cylinders: 4
  fuel:
    density: 0.74
name: runabout
"#,
        )
        .unwrap();

        let values = FileSource::new(&path).load().unwrap();
        assert_eq!(values["name"], json!("runabout"));
        assert_eq!(values["engine"]["cylinders"], json!(4));
        assert_eq!(values["engine"]["fuel"]["density"], json!(0.74));
    }

    #[test]
    fn test_load_toml_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("vehicle.toml");
        fs::write(&path, "[engine]\ncylinders = 6\n").unwrap();

        let values = FileSource::new(&path).load().unwrap();
        assert_eq!(values["engine"]["cylinders"], json!(6));
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = FileSource::new("/nonexistent/vehicle.yaml").load();
        assert!(matches!(result, Err(StoreError::LoadError(_))));
    }

    #[test]
    fn test_priority_and_name() {
        let source = FileSource::new("vehicle.yaml").with_priority(200);
        assert_eq!(source.priority(), 200);
        assert!(source.name().contains("vehicle.yaml"));
    }
}
