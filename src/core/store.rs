//! The common read/write surface shared by containers and views.

use crate::core::context::ScopedOverride;
use crate::core::dotkey::{self, FlatMap};
use crate::core::{Container, View};
use crate::error::{Result, StoreError};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// A keyed store of values that supports scoped overrides.
///
/// Implemented by [`Container`] (keys are full dotkeys) and [`View`] (keys
/// are suffixes below the view's prefixes). Code that only needs
/// `get`/`set`/`dset`/`context` can take any `Store`.
///
/// # Examples
///
/// ```rust
/// use dotstore::prelude::*;
/// use serde_json::json;
///
/// fn bump<S: Store>(store: &S, key: &str) -> Result<i64> {
///     let current: i64 = store.get_as(key)?;
///     store.set(key, json!(current + 1))?;
///     Ok(current + 1)
/// }
///
/// # fn example() -> Result<()> {
/// let container = Container::from_value(json!({"count": 1}))?;
/// assert_eq!(bump(&container, "count")?, 2);
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
pub trait Store {
    /// Get the value stored under a key.
    fn get(&self, key: &str) -> Result<Value>;

    /// Store a value under a key.
    fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Store several values in one call.
    fn dset(&self, values: FlatMap) -> Result<()>;

    /// Whether a value is stored under a key.
    fn contains_key(&self, key: &str) -> bool;

    /// All keys, in order.
    fn keys(&self) -> Vec<String>;

    /// Copy of every value, keyed the way this store is keyed.
    fn snapshot(&self) -> FlatMap;

    /// Temporarily override existing values until the guard drops.
    fn context(&self, overrides: FlatMap) -> Result<ScopedOverride<'_, Self>>
    where
        Self: Sized,
    {
        ScopedOverride::enter(self, overrides)
    }

    /// Run `body` with overrides applied, restoring the originals afterwards
    /// whether `body` succeeds, fails or panics.
    fn with_context<R, F>(&self, overrides: FlatMap, body: F) -> Result<R>
    where
        Self: Sized,
        F: FnOnce(&Self) -> Result<R>,
    {
        let _guard = ScopedOverride::enter(self, overrides)?;
        body(self)
    }

    /// Get a value converted into `T`.
    fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<T>
    where
        Self: Sized,
    {
        let value = self.get(key)?;
        serde_json::from_value(value).map_err(|e| {
            StoreError::DeserializationError(format!("Failed to convert \"{}\": {}", key, e))
        })
    }

    /// Convert every value into `T`, nesting dotkeys into struct fields.
    fn extract<T: DeserializeOwned>(&self) -> Result<T>
    where
        Self: Sized,
    {
        serde_json::from_value(dotkey::nest(&self.snapshot()))
            .map_err(|e| StoreError::DeserializationError(e.to_string()))
    }
}

impl Store for Container {
    fn get(&self, key: &str) -> Result<Value> {
        Container::get(self, key)
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        Container::set(self, key, value)
    }

    fn dset(&self, values: FlatMap) -> Result<()> {
        Container::dset(self, values)
    }

    fn contains_key(&self, key: &str) -> bool {
        Container::contains_key(self, key)
    }

    fn keys(&self) -> Vec<String> {
        Container::keys(self)
    }

    fn snapshot(&self) -> FlatMap {
        Container::snapshot(self)
    }
}

impl Store for View {
    fn get(&self, key: &str) -> Result<Value> {
        View::get(self, key)
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        View::set(self, key, value)
    }

    fn dset(&self, values: FlatMap) -> Result<()> {
        View::dset(self, values)
    }

    fn contains_key(&self, key: &str) -> bool {
        View::contains_key(self, key)
    }

    fn keys(&self) -> Vec<String> {
        View::keys(self)
    }

    fn snapshot(&self) -> FlatMap {
        View::snapshot(self)
    }
}
