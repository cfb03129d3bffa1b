//! Scoped overrides: temporary values that are always rolled back.

use crate::core::dotkey::FlatMap;
use crate::core::store::Store;
use crate::error::{Result, StoreError};
use std::fmt;
use std::ops::Deref;
use tracing::{debug, warn};

/// Guard holding temporary values in a store.
///
/// Created by [`Container::context`](crate::core::Container::context),
/// [`View::context`](crate::core::View::context) or [`Store::context`].
/// Entering captures the current value of every overridden key and applies
/// the overrides in one `dset`. Dropping the guard writes the captured values
/// back, including when the scope is left through `?` or a panic.
///
/// Guards nest: an inner guard restores the values the outer guard set.
pub struct ScopedOverride<'s, S: Store + ?Sized> {
    store: &'s S,
    originals: FlatMap,
}

impl<'s, S: Store + ?Sized> ScopedOverride<'s, S> {
    /// Apply `overrides` to `store` and return the guard that undoes them.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MissingOverrideKey`] listing every key the store
    /// does not hold; nothing is changed in that case. Errors from applying
    /// the overrides are returned as-is.
    pub fn enter(store: &'s S, overrides: FlatMap) -> Result<Self> {
        let missing: Vec<String> = overrides
            .keys()
            .filter(|key| !store.contains_key(key))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(StoreError::MissingOverrideKey { keys: missing });
        }

        let mut originals = FlatMap::new();
        for key in overrides.keys() {
            originals.insert(key.clone(), store.get(key)?);
        }

        store.dset(overrides)?;
        debug!(keys = originals.len(), "entered scoped override");
        Ok(Self { store, originals })
    }

    /// The values that will be restored when the guard drops.
    pub fn originals(&self) -> &FlatMap {
        &self.originals
    }
}

impl<S: Store + ?Sized> Deref for ScopedOverride<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.store
    }
}

impl<S: Store + ?Sized> Drop for ScopedOverride<'_, S> {
    fn drop(&mut self) {
        let originals = std::mem::take(&mut self.originals);
        let count = originals.len();
        match self.store.dset(originals) {
            Ok(()) => debug!(keys = count, "restored scoped override"),
            Err(e) => warn!(error = %e, "failed to restore scoped override"),
        }
    }
}

impl<S: Store + ?Sized> fmt::Debug for ScopedOverride<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedOverride")
            .field("originals", &self.originals)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Container;
    use serde_json::json;
    use std::panic::{self, AssertUnwindSafe};

    fn container() -> Container {
        Container::from_value(json!({"a": {"b": 6, "c": 7}, "x": "text"})).unwrap()
    }

    #[test]
    fn test_missing_key_changes_nothing() {
        let c = container();
        let before = c.snapshot();
        let result = c.context([("a.b", json!(1)), ("a.zz", json!(2)), ("q", json!(3))]);
        match result {
            Err(StoreError::MissingOverrideKey { keys }) => assert_eq!(keys, vec!["a.zz", "q"]),
            other => panic!("expected MissingOverrideKey, got {:?}", other),
        }
        assert_eq!(c.snapshot(), before);
    }

    #[test]
    fn test_guard_derefs_to_store() {
        let c = container();
        let guard = c.context([("x", "other")]).unwrap();
        assert_eq!(guard.get("x").unwrap(), json!("other"));
        assert_eq!(guard.originals()["x"], json!("text"));
    }

    #[test]
    fn test_restores_after_panic() {
        let c = container();
        let before = c.snapshot();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let _guard = c.context([("a.b", 100)]).unwrap();
            assert_eq!(c.get("a.b").unwrap(), json!(100));
            panic!("boom");
        }));
        assert!(result.is_err());
        assert_eq!(c.snapshot(), before);
    }

    #[test]
    fn test_restores_after_early_return() {
        fn inner(c: &Container) -> Result<()> {
            let _guard = c.context([("a.c", 70)])?;
            c.get("not.there")?;
            Ok(())
        }

        let c = container();
        assert!(inner(&c).is_err());
        assert_eq!(c.get("a.c").unwrap(), json!(7));
    }

    #[test]
    fn test_inner_restores_outer_values() {
        let c = container();
        let outer = c.context([("a.b", 1)]).unwrap();
        {
            let _inner = c.context([("a.b", 2)]).unwrap();
            assert_eq!(c.get("a.b").unwrap(), json!(2));
        }
        assert_eq!(c.get("a.b").unwrap(), json!(1));
        drop(outer);
        assert_eq!(c.get("a.b").unwrap(), json!(6));
    }

    #[test]
    fn test_trait_object_store() {
        let c = container();
        let store: &dyn Store = &c;
        {
            let guard = ScopedOverride::enter(store, FlatMap::from([("x".to_string(), json!(1))]))
                .unwrap();
            assert_eq!(guard.get("x").unwrap(), json!(1));
        }
        assert_eq!(c.get("x").unwrap(), json!("text"));
    }
}
