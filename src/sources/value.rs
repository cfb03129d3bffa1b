//! In-memory source.

use super::{ConfigSource, SourceValues};
use crate::error::{Result, StoreError};
use serde_json::Value;

/// A fixed mapping, typically the defaults other sources override.
#[derive(Debug, Clone)]
pub struct ValueSource {
    value: Value,
    priority: i32,
}

impl ValueSource {
    /// Wrap a mapping with priority 0.
    pub fn new(value: Value) -> Self {
        Self { value, priority: 0 }
    }

    /// Set the priority for this source.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl ConfigSource for ValueSource {
    fn load(&self) -> Result<SourceValues> {
        match &self.value {
            Value::Object(map) => Ok(map.clone()),
            other => Err(StoreError::InvalidInput(format!(
                "expected a mapping, got {}",
                other
            ))),
        }
    }

    fn name(&self) -> String {
        "values".to_string()
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_load_mapping() {
        let values = ValueSource::new(json!({"a": {"b": 1}})).load().unwrap();
        assert_eq!(values["a"]["b"], json!(1));
    }

    #[test]
    fn test_rejects_non_mapping() {
        let result = ValueSource::new(json!([1, 2])).load();
        assert!(matches!(result, Err(StoreError::InvalidInput(_))));
    }
}
