//! Named containers shared across a program.
//!
//! A [`Namespace`] hands out the same [`Container`] every time a name is
//! asked for, so independent parts of a program can find one store without
//! passing it around. The namespace itself is an ordinary value; share it by
//! reference or inside an `Arc`.

use crate::core::Container;
use crate::error::Result;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Registry of containers by name.
///
/// # Examples
///
/// ```rust
/// use dotstore::features::Namespace;
/// use serde_json::json;
///
/// let ns = Namespace::new();
/// let vehicles = ns.get_or_create("vehicles");
/// vehicles.set("truck.wheels", 6).unwrap();
///
/// let again = ns.get_or_create("vehicles");
/// assert_eq!(again.get("truck.wheels").unwrap(), json!(6));
/// ```
#[derive(Default)]
pub struct Namespace {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    containers: BTreeMap<String, Container>,
    next_anonymous: u64,
}

impl Namespace {
    /// Create an empty namespace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a container under `name`, replacing any existing one.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidInput`](crate::error::StoreError::InvalidInput)
    /// if `values` is not a mapping.
    pub fn create(&self, name: impl Into<String>, values: Option<Value>) -> Result<Container> {
        let name = name.into();
        let container = match values {
            Some(values) => Container::from_value(values)?,
            None => Container::new(),
        };
        debug!(name = %name, "created namespaced container");
        self.inner.lock().containers.insert(name, container.clone());
        Ok(container)
    }

    /// The container under `name`, created empty on first use.
    pub fn get_or_create(&self, name: impl Into<String>) -> Container {
        self.inner
            .lock()
            .containers
            .entry(name.into())
            .or_default()
            .clone()
    }

    /// Create an empty container under the next free numeric name.
    ///
    /// Returns the chosen name with the container.
    pub fn anonymous(&self) -> (String, Container) {
        let mut inner = self.inner.lock();
        let name = loop {
            let candidate = inner.next_anonymous.to_string();
            inner.next_anonymous += 1;
            if !inner.containers.contains_key(&candidate) {
                break candidate;
            }
        };
        let container = Container::new();
        inner.containers.insert(name.clone(), container.clone());
        (name, container)
    }

    /// The container under `name`, if any.
    pub fn get(&self, name: &str) -> Option<Container> {
        self.inner.lock().containers.get(name).cloned()
    }

    /// Whether a container exists under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.lock().containers.contains_key(name)
    }

    /// Every registered name, sorted.
    pub fn names(&self) -> Vec<String> {
        self.inner.lock().containers.keys().cloned().collect()
    }

    /// Remove and return the container under `name`.
    ///
    /// Handles already given out keep working; the namespace just forgets it.
    pub fn remove(&self, name: &str) -> Option<Container> {
        self.inner.lock().containers.remove(name)
    }

    /// Number of registered containers.
    pub fn len(&self) -> usize {
        self.inner.lock().containers.len()
    }

    /// Whether the namespace is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().containers.is_empty()
    }
}

impl std::fmt::Debug for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Namespace")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use serde_json::json;

    #[test]
    fn test_create_with_values() {
        let ns = Namespace::new();
        let container = ns.create("test", Some(json!({"a.b": 5, "c.d": 7}))).unwrap();
        assert_eq!(container.get("a.b").unwrap(), json!(5));
        assert_eq!(container.get("c.d").unwrap(), json!(7));
        assert_eq!(container.len(), 2);
    }

    #[test]
    fn test_create_rejects_non_mapping() {
        let ns = Namespace::new();
        assert!(matches!(
            ns.create("test", Some(json!(3))),
            Err(StoreError::InvalidInput(_))
        ));
        assert!(!ns.contains("test"));
    }

    #[test]
    fn test_create_replaces() {
        let ns = Namespace::new();
        ns.create("test", Some(json!({"a": 1}))).unwrap();
        ns.create("test", None).unwrap();
        assert!(ns.get("test").unwrap().is_empty());
    }

    #[test]
    fn test_get_or_create_is_shared() {
        let ns = Namespace::new();
        let first = ns.get_or_create("test");
        let second = ns.get_or_create("test");
        first.set("x", 1).unwrap();
        assert_eq!(second.get("x").unwrap(), json!(1));
        assert_eq!(ns.len(), 1);
    }

    #[test]
    fn test_anonymous_skips_taken_names() {
        let ns = Namespace::new();
        ns.get_or_create("1");
        let (first, _) = ns.anonymous();
        let (second, _) = ns.anonymous();
        assert_eq!(first, "0");
        assert_eq!(second, "2");
        assert_eq!(ns.names(), vec!["0", "1", "2"]);
    }

    #[test]
    fn test_get_and_remove() {
        let ns = Namespace::new();
        assert!(ns.get("missing").is_none());

        let kept = ns.get_or_create("gone");
        kept.set("y", 2).unwrap();
        let removed = ns.remove("gone").unwrap();
        assert_eq!(removed.get("y").unwrap(), json!(2));
        assert!(!ns.contains("gone"));
        assert!(ns.is_empty());
        assert_eq!(kept.get("y").unwrap(), json!(2));
    }
}
