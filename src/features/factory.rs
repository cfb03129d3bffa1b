//! Construct values by a name stored in a container.

use crate::core::Container;
use crate::error::{Result, StoreError};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

type Constructor<T> = Box<dyn Fn() -> T + Send + Sync>;

/// Table of named constructors.
///
/// Pairs well with a container entry that selects an implementation, such as
/// `"engine.kind": "diesel"`.
///
/// # Examples
///
/// ```rust
/// use dotstore::features::Factory;
/// use dotstore::prelude::*;
/// use serde_json::json;
///
/// trait Engine {
///     fn cylinders(&self) -> u8;
/// }
/// struct Diesel;
/// impl Engine for Diesel {
///     fn cylinders(&self) -> u8 { 6 }
/// }
///
/// let mut factory: Factory<Box<dyn Engine>> = Factory::new();
/// factory.register("diesel", || Box::new(Diesel) as Box<dyn Engine>);
///
/// let container = Container::from_value(json!({"engine": {"kind": "diesel"}})).unwrap();
/// let engine = factory.build_from(&container, "engine.kind").unwrap();
/// assert_eq!(engine.cylinders(), 6);
/// ```
pub struct Factory<T> {
    constructors: BTreeMap<String, Constructor<T>>,
}

impl<T> Factory<T> {
    /// Create an empty factory.
    pub fn new() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// Register a constructor under `name`, replacing any previous one.
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.constructors.insert(name.into(), Box::new(constructor));
        self
    }

    /// Build a new value with the constructor registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownName`] if nothing is registered there.
    pub fn build(&self, name: &str) -> Result<T> {
        self.constructors
            .get(name)
            .map(|constructor| constructor())
            .ok_or_else(|| StoreError::UnknownName {
                name: name.to_string(),
                known: self.names(),
            })
    }

    /// Build a value named by the string stored at `dotkey`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::KeyNotFound`] if the container has no such key,
    /// [`StoreError::InvalidInput`] if the value is not a string, and
    /// [`StoreError::UnknownName`] if the name is not registered.
    pub fn build_from(&self, container: &Container, dotkey: &str) -> Result<T> {
        match container.get(dotkey)? {
            Value::String(name) => self.build(&name),
            other => Err(StoreError::InvalidInput(format!(
                "expected a name at \"{}\", got {}",
                dotkey, other
            ))),
        }
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.constructors.keys().cloned().collect()
    }

    /// Whether a constructor is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Factory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Factory")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, PartialEq)]
    enum Gearbox {
        Manual(u8),
        Automatic,
    }

    fn factory() -> Factory<Gearbox> {
        let mut factory = Factory::new();
        factory
            .register("manual", || Gearbox::Manual(5))
            .register("automatic", || Gearbox::Automatic);
        factory
    }

    #[test]
    fn test_build() {
        let factory = factory();
        assert_eq!(factory.build("manual").unwrap(), Gearbox::Manual(5));
        assert!(factory.contains("automatic"));
        assert_eq!(factory.names(), vec!["automatic", "manual"]);
    }

    #[test]
    fn test_unknown_name() {
        match factory().build("cvt") {
            Err(StoreError::UnknownName { name, known }) => {
                assert_eq!(name, "cvt");
                assert_eq!(known, vec!["automatic", "manual"]);
            }
            other => panic!("expected UnknownName, got {:?}", other),
        }
    }

    #[test]
    fn test_build_from_follows_container() {
        let factory = factory();
        let container = Container::from_value(json!({"gearbox": "manual", "gears": 5})).unwrap();
        assert_eq!(
            factory.build_from(&container, "gearbox").unwrap(),
            Gearbox::Manual(5)
        );

        container.set("gearbox", "automatic").unwrap();
        assert_eq!(
            factory.build_from(&container, "gearbox").unwrap(),
            Gearbox::Automatic
        );
    }

    #[test]
    fn test_build_from_errors() {
        let factory = factory();
        let container = Container::from_value(json!({"gears": 5})).unwrap();
        assert!(matches!(
            factory.build_from(&container, "gears"),
            Err(StoreError::InvalidInput(_))
        ));
        assert!(matches!(
            factory.build_from(&container, "gearbox"),
            Err(StoreError::KeyNotFound(_))
        ));
    }
}
