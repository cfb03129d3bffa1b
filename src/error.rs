//! Error types for dotstore.

/// Result type alias for dotstore operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur when reading, writing or projecting a store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A dotkey was read that the store does not hold.
    #[error("Key not found: \"{0}\"")]
    KeyNotFound(String),

    /// A safe write targeted a dotkey that does not already exist.
    #[error("In safe mode, key \"{0}\" must be present")]
    SafetyViolation(String),

    /// Two prefixes registered on one view supply the same suffix key.
    #[error(
        "Key \"{key}\" defined in \"{prefix}\" when already present in one of: {}",
        quoted(.prefixes)
    )]
    KeyClash {
        /// The suffix key supplied twice
        key: String,
        /// The prefix that introduced the duplicate
        prefix: String,
        /// Every prefix registered on the view at the time
        prefixes: Vec<String>,
    },

    /// A live view could not resolve a key to exactly one of its prefixes.
    #[error(
        "Key \"{key}\" must resolve to exactly one of: {} (matched {})",
        quoted(.prefixes),
        quoted(.matches)
    )]
    AmbiguousOrMissingKey {
        /// The suffix key being written
        key: String,
        /// Prefixes that hold the key in the container
        matches: Vec<String>,
        /// Every prefix registered on the view
        prefixes: Vec<String>,
    },

    /// A scoped override named keys the target does not hold.
    #[error("Cannot override missing keys: {}", quoted(.keys))]
    MissingOverrideKey {
        /// Every missing key, in override order
        keys: Vec<String>,
    },

    /// A dotkey was empty or contained an empty segment.
    #[error("Invalid dotkey: \"{0}\"")]
    InvalidKey(String),

    /// Input had the wrong shape (for example a non-mapping passed to `load`).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A factory was asked for a name it has no constructor for.
    #[error("Unknown name \"{name}\" (known: {})", quoted(.known))]
    UnknownName {
        /// The requested name
        name: String,
        /// Names registered with the factory
        known: Vec<String>,
    },

    /// Failed to load values from a source.
    #[error("Failed to load values: {0}")]
    LoadError(String),

    /// Failed to convert stored values into a typed structure.
    #[error("Failed to deserialize values: {0}")]
    DeserializationError(String),

    /// IO error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

fn quoted(items: &[String]) -> String {
    if items.is_empty() {
        return "none".to_string();
    }
    let inner: Vec<String> = items.iter().map(|item| format!("\"{}\"", item)).collect();
    inner.join("; ")
}

impl StoreError {
    /// The key or keys this error is about, for callers that report them.
    pub fn keys(&self) -> Vec<&str> {
        match self {
            Self::KeyNotFound(key) | Self::SafetyViolation(key) | Self::InvalidKey(key) => {
                vec![key.as_str()]
            }
            Self::KeyClash { key, .. } | Self::AmbiguousOrMissingKey { key, .. } => {
                vec![key.as_str()]
            }
            Self::MissingOverrideKey { keys } => keys.iter().map(String::as_str).collect(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clash_message_lists_prefixes() {
        let err = StoreError::KeyClash {
            key: "x".to_string(),
            prefix: "b".to_string(),
            prefixes: vec!["a".to_string(), "b".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("\"x\""));
        assert!(msg.contains("\"a\"; \"b\""));
    }

    #[test]
    fn test_ambiguous_message_without_matches() {
        let err = StoreError::AmbiguousOrMissingKey {
            key: "z".to_string(),
            matches: Vec::new(),
            prefixes: vec!["a".to_string()],
        };
        assert!(err.to_string().contains("matched none"));
    }

    #[test]
    fn test_keys() {
        let err = StoreError::MissingOverrideKey {
            keys: vec!["a.b".to_string(), "a.c".to_string()],
        };
        assert_eq!(err.keys(), vec!["a.b", "a.c"]);
        assert!(StoreError::LoadError("x".into()).keys().is_empty());
    }
}
