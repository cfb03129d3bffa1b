//! The authoritative store: flat dotkey map, observer fan-out, load and reset.

use crate::core::context::ScopedOverride;
use crate::core::dotkey::{self, FlatMap, Prefix};
use crate::core::observer::{Observer, ObserverId, ObserverRegistry, Rebinding};
use crate::core::SourceLoader;
use crate::error::{Result, StoreError};
use arc_swap::ArcSwap;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, trace, warn};

#[cfg(feature = "metrics")]
use crate::metrics::StoreMetrics;

/// A hierarchical key-value store shared by reference.
///
/// Values live under full dotkeys (`"engine.fuel.density"`). Nested mappings
/// passed to [`Container::from_value`], [`Container::load`] or
/// [`Container::set`] are flattened on the way in. Every write is fanned out
/// to the [`View`](crate::core::View)s registered on an ancestor prefix of the
/// written key.
///
/// Cloning a `Container` yields another handle to the same store.
///
/// # Examples
///
/// ```rust
/// use dotstore::prelude::*;
/// use serde_json::json;
///
/// # fn example() -> Result<()> {
/// let container = Container::from_value(json!({"A": {"apple": 5, "banana": 7}}))?;
/// assert_eq!(container.get("A.apple")?, json!(5));
///
/// container.set("A.apple", 101)?;
/// assert_eq!(container.get("A.apple")?, json!(101));
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
pub struct Container {
    /// Current values keyed by full dotkey
    data: Arc<RwLock<FlatMap>>,
    /// Values captured at the last load, restored by `reset`
    baseline: Arc<ArcSwap<FlatMap>>,
    /// Weak registrations of observers by prefix
    observers: Arc<Mutex<ObserverRegistry>>,
    /// Sources to re-read on `reload`
    loader: Option<Arc<SourceLoader>>,
    /// Optional metrics collector
    #[cfg(feature = "metrics")]
    metrics: Option<StoreMetrics>,
}

impl Container {
    /// Create an empty container.
    pub fn new() -> Self {
        Self::from_flat(FlatMap::new())
    }

    /// Create a container from a flat or nested mapping.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidInput`] if `value` is not a mapping.
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(Self::from_flat(flatten_mapping(&value)?))
    }

    /// Create a container from already-flat values.
    pub fn from_flat(values: FlatMap) -> Self {
        Self {
            baseline: Arc::new(ArcSwap::from_pointee(values.clone())),
            data: Arc::new(RwLock::new(values)),
            observers: Arc::new(Mutex::new(ObserverRegistry::new())),
            loader: None,
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// Attach the sources this container was built from.
    pub(crate) fn with_loader(mut self, loader: SourceLoader) -> Self {
        self.loader = Some(Arc::new(loader));
        self
    }

    /// Attach a metrics collector.
    #[cfg(feature = "metrics")]
    pub(crate) fn with_metrics(mut self, metrics: StoreMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Get the value stored under a dotkey.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::KeyNotFound`] if no value is stored there. A key
    /// that is only a parent of stored keys (`"a"` when `"a.b"` exists) is not
    /// found; use [`Container::get_dct`] for those.
    pub fn get(&self, dotkey: &str) -> Result<Value> {
        self.data
            .read()
            .get(dotkey)
            .cloned()
            .ok_or_else(|| StoreError::KeyNotFound(dotkey.to_string()))
    }

    /// Get a value by its key segments.
    pub fn lget<S: AsRef<str>>(&self, segments: &[S]) -> Result<Value> {
        self.get(&dotkey::join(segments))
    }

    /// Get several values at once, keyed by dotkey.
    pub fn dget<I, K>(&self, dotkeys: I) -> Result<FlatMap>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let data = self.data.read();
        dotkeys
            .into_iter()
            .map(|key| {
                let key = key.as_ref();
                data.get(key)
                    .cloned()
                    .map(|value| (key.to_string(), value))
                    .ok_or_else(|| StoreError::KeyNotFound(key.to_string()))
            })
            .collect()
    }

    /// Whether a value is stored under a dotkey.
    pub fn contains_key(&self, dotkey: &str) -> bool {
        self.data.read().contains_key(dotkey)
    }

    /// Whether a value is stored at `dotkey` or below it.
    pub fn contains_subtree(&self, dotkey: &str) -> bool {
        !dotkey::subtree(&self.data.read(), dotkey).is_empty()
    }

    /// All stored dotkeys, in order.
    pub fn keys(&self) -> Vec<String> {
        self.data.read().keys().cloned().collect()
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the container holds no values.
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Copy of every stored value, keyed by dotkey.
    pub fn snapshot(&self) -> FlatMap {
        self.data.read().clone()
    }

    /// The stored values as a nested mapping.
    pub fn nested(&self) -> Value {
        dotkey::nest(&self.data.read())
    }

    /// Every value below `prefix`, keyed by the suffix after it.
    ///
    /// The root prefix returns every value unchanged.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dotstore::prelude::*;
    /// use serde_json::json;
    ///
    /// let container = Container::from_value(json!({"d": {"e": 3, "g": {"h": 5}}})).unwrap();
    /// let dct = container.get_dct("d");
    /// assert_eq!(dct["e"], json!(3));
    /// assert_eq!(dct["g.h"], json!(5));
    /// ```
    pub fn get_dct(&self, prefix: impl Into<Prefix>) -> FlatMap {
        let prefix = prefix.into();
        let data = self.data.read();
        match &prefix {
            Prefix::Root => data.clone(),
            Prefix::Key(_) => data
                .iter()
                .filter_map(|(key, value)| {
                    prefix
                        .strip(key)
                        .map(|suffix| (suffix.to_string(), value.clone()))
                })
                .collect(),
        }
    }

    /// Store a value under a dotkey and notify observers.
    ///
    /// The value replaces everything stored at or below the dotkey. A mapping
    /// value is flattened below the dotkey, so writing `{"x": 1}` over the
    /// leaf `"a.b"` leaves only `"a.b.x"`, and writing a scalar over `"a"`
    /// removes `"a.b"`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidKey`] for an empty key or empty segment.
    pub fn set(&self, dotkey: &str, value: impl Into<Value>) -> Result<()> {
        self.write(vec![expand(dotkey, value.into())?], false)
    }

    /// Like [`Container::set`], but the dotkey must already exist, as a value
    /// or as the parent of stored values.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SafetyViolation`] if it does not.
    pub fn safe_set(&self, dotkey: &str, value: impl Into<Value>) -> Result<()> {
        self.write(vec![expand(dotkey, value.into())?], true)
    }

    /// Store a value by its key segments.
    pub fn lset<S: AsRef<str>>(&self, segments: &[S], value: impl Into<Value>) -> Result<()> {
        self.set(&dotkey::join(segments), value)
    }

    /// Like [`Container::lset`], but the key must already exist.
    pub fn safe_lset<S: AsRef<str>>(&self, segments: &[S], value: impl Into<Value>) -> Result<()> {
        self.safe_set(&dotkey::join(segments), value)
    }

    /// Store several values at once.
    ///
    /// Every key is validated before any value is written, and all values are
    /// committed together before observers are notified.
    pub fn dset<I, K, V>(&self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        self.write(expand_all(values)?, false)
    }

    /// Like [`Container::dset`], but every key must already exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SafetyViolation`] for the first missing key; no
    /// value is written in that case.
    pub fn safe_dset<I, K, V>(&self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        self.write(expand_all(values)?, true)
    }

    fn write(&self, writes: Vec<Write>, safe: bool) -> Result<()> {
        let (removed, committed) = {
            let mut data = self.data.write();
            if safe {
                if let Some(write) = writes
                    .iter()
                    .find(|write| dotkey::subtree(&data, &write.key).is_empty())
                {
                    return Err(StoreError::SafetyViolation(write.key.clone()));
                }
            }

            let mut removed = BTreeSet::new();
            let mut committed = Vec::new();
            for write in writes {
                for key in dotkey::subtree(&data, &write.key) {
                    data.remove(&key);
                    removed.insert(key);
                }
                for (key, value) in write.leaves {
                    data.insert(key.clone(), value.clone());
                    committed.push((key, value));
                }
            }
            removed.retain(|key| !data.contains_key(key));
            committed.retain(|(key, value)| data.get(key) == Some(value));
            (removed, committed)
        };

        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            metrics.record_writes(committed.len());
        }

        for key in &removed {
            for (prefix, suffix) in dotkey::ancestors(key) {
                let observers = self.observers.lock().live_at(&prefix);
                for observer in observers {
                    observer.discard(&prefix, &suffix);
                }
            }
        }
        for (key, value) in &committed {
            self.fan_out(key, value);
        }
        Ok(())
    }

    /// Push one committed value to every observer on an ancestor prefix,
    /// nearest ancestor first.
    fn fan_out(&self, key: &str, value: &Value) {
        let mut delivered = 0usize;
        for (prefix, suffix) in dotkey::ancestors(key) {
            let observers = self.observers.lock().live_at(&prefix);
            for observer in observers {
                observer.push(&prefix, &suffix, value);
                delivered += 1;
            }
        }
        trace!(key, delivered, "fanned out write");

        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            metrics.record_deliveries(delivered);
        }
    }

    /// Replace every value with a flat or nested mapping.
    ///
    /// The new values also become the state [`Container::reset`] returns to.
    /// Every registered observer is then fully refreshed, since keys may have
    /// appeared or disappeared.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidInput`] if `value` is not a mapping (the
    /// container is left untouched), or the first error raised by an
    /// observer's refresh (every observer is still refreshed).
    pub fn load(&self, value: Value) -> Result<()> {
        let flat = flatten_mapping(&value)?;
        self.load_flat(flat)
    }

    /// Replace every value with already-flat values.
    pub fn load_flat(&self, values: FlatMap) -> Result<()> {
        debug!(entries = values.len(), "loading container");
        self.baseline.store(Arc::new(values.clone()));
        *self.data.write() = values;
        self.record_load();
        self.refresh_observers()
    }

    /// Restore the values captured by the last load (or construction).
    pub fn reset(&self) -> Result<()> {
        let baseline = self.baseline.load_full();
        debug!(entries = baseline.len(), "resetting container");
        *self.data.write() = (*baseline).clone();
        self.record_load();
        self.refresh_observers()
    }

    fn record_load(&self) {
        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            metrics.record_load();
        }
    }

    /// Re-read the sources this container was built from and load the result.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::LoadError`] if the container was not built from
    /// sources or a source fails to load.
    pub fn reload(&self) -> Result<()> {
        let loader = self
            .loader
            .as_ref()
            .ok_or_else(|| StoreError::LoadError("No sources available for reload".to_string()))?;
        let values = loader.load()?;
        self.load_flat(values)
    }

    fn refresh_observers(&self) -> Result<()> {
        let observers = self.observers.lock().live_all();

        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            metrics.record_refreshes(observers.len());
        }

        let mut first_error = None;
        for observer in observers {
            if let Err(e) = observer.refresh() {
                warn!(error = %e, "observer refresh failed");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Register an observer for every write below `prefix`.
    ///
    /// The observer first pulls `get_dct(prefix)`; if that pull fails the
    /// observer is not registered. The container holds the observer weakly.
    pub fn register_observer<O>(&self, prefix: impl Into<Prefix>, observer: &Arc<O>) -> Result<ObserverId>
    where
        O: Observer + 'static,
    {
        let prefix = prefix.into();
        observer.pull(&prefix, self.get_dct(prefix.clone()))?;
        let weak: Weak<dyn Observer> = Arc::downgrade(observer) as Weak<dyn Observer>;
        debug!(prefix = %prefix, "registered observer");
        Ok(self.observers.lock().insert(prefix, weak))
    }

    /// Remove a registration. Returns whether it was present.
    pub fn unregister_observer(&self, id: ObserverId) -> bool {
        self.observers.lock().remove(id)
    }

    /// Number of registrations whose observer is still alive.
    pub fn observer_count(&self) -> usize {
        self.observers.lock().len()
    }

    /// Temporarily override existing values until the returned guard drops.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MissingOverrideKey`] if any key is absent; no
    /// value changes in that case.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dotstore::prelude::*;
    /// use serde_json::json;
    ///
    /// # fn example() -> Result<()> {
    /// let container = Container::from_value(json!({"a.b": 6, "a.c": 7}))?;
    /// {
    ///     let _guard = container.context([("a.b", 66)])?;
    ///     assert_eq!(container.get("a.b")?, json!(66));
    /// }
    /// assert_eq!(container.get("a.b")?, json!(6));
    /// # Ok(())
    /// # }
    /// # example().unwrap();
    /// ```
    pub fn context<I, K, V>(&self, overrides: I) -> Result<ScopedOverride<'_, Self>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        ScopedOverride::enter(self, collect_flat(overrides))
    }

    /// Union several containers into a new one.
    ///
    /// Later containers win on duplicate keys. Observers registered on the
    /// sources move to the merged container: a [`View`](crate::core::View) on
    /// a source follows the merged container from then on, and its source no
    /// longer notifies it.
    ///
    /// # Errors
    ///
    /// Returns the first error raised while refreshing a moved observer
    /// against the merged values (for example a [`StoreError::KeyClash`]).
    pub fn merge(containers: &[Container]) -> Result<Container> {
        let mut values = FlatMap::new();
        for container in containers {
            values.extend(container.snapshot());
        }
        let merged = Container::from_flat(values);
        merged.adopt_observers(containers.iter().map(|container| (container, None)))?;
        Ok(merged)
    }

    /// Union named containers into a new one, prefixing each source's keys
    /// with its name.
    ///
    /// Observers move as in [`Container::merge`], with their prefixes
    /// renamed the same way (a root registration on source `"c1"` becomes a
    /// registration on `"c1"`).
    pub fn combine<S: AsRef<str>>(named: &[(S, Container)]) -> Result<Container> {
        let mut values = FlatMap::new();
        let mut sources = Vec::with_capacity(named.len());
        for (name, container) in named {
            let name = Prefix::Key(name.as_ref().to_string());
            for (key, value) in container.snapshot() {
                values.insert(name.qualify(&key), value);
            }
            sources.push((container, Some(name)));
        }
        let combined = Container::from_flat(values);
        combined.adopt_observers(sources)?;
        Ok(combined)
    }

    /// Move every live registration of `sources` into this container,
    /// renaming prefixes below the optional name, then rebind and refresh
    /// each moved observer once.
    fn adopt_observers<'a, I>(&self, sources: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a Container, Option<Prefix>)>,
    {
        let mut moved: Vec<(Arc<dyn Observer>, Vec<Rebinding>)> = Vec::new();
        for (source, name) in sources {
            let taken = source.observers.lock().take_all();
            for (prefix, registration) in taken {
                let Some(observer) = registration.observer.upgrade() else {
                    continue;
                };
                let prefix = match (&name, prefix) {
                    (None, prefix) => prefix,
                    (Some(name), Prefix::Root) => name.clone(),
                    (Some(name), Prefix::Key(key)) => Prefix::Key(name.qualify(&key)),
                };
                let to = self
                    .observers
                    .lock()
                    .insert(prefix.clone(), registration.observer);
                let rebinding = Rebinding {
                    from: registration.id,
                    to,
                    prefix,
                };
                match moved.iter_mut().find(|(seen, _)| Arc::ptr_eq(seen, &observer)) {
                    Some((_, rebindings)) => rebindings.push(rebinding),
                    None => moved.push((observer, vec![rebinding])),
                }
            }
        }

        debug!(observers = moved.len(), "moved observers into new container");
        let mut first_error = None;
        for (observer, rebindings) in moved {
            observer.rebind(self, &rebindings);
            if let Err(e) = observer.refresh() {
                warn!(error = %e, "moved observer failed to refresh");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Container {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            baseline: Arc::clone(&self.baseline),
            observers: Arc::clone(&self.observers),
            loader: self.loader.clone(),
            #[cfg(feature = "metrics")]
            metrics: self.metrics.clone(),
        }
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("data", &*self.data.read())
            .finish_non_exhaustive()
    }
}

fn flatten_mapping(value: &Value) -> Result<FlatMap> {
    if !value.is_object() {
        return Err(StoreError::InvalidInput(format!(
            "expected a mapping, got {}",
            value
        )));
    }
    Ok(dotkey::flatten(value))
}

/// One `set`: the subtree at `key` is replaced by `leaves`.
struct Write {
    key: String,
    leaves: Vec<(String, Value)>,
}

/// Validate a dotkey and expand a mapping value into leaf entries.
fn expand(key: &str, value: Value) -> Result<Write> {
    if !dotkey::is_well_formed(key) {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    let leaves = if value.is_object() {
        let mut leaves = FlatMap::new();
        dotkey::flatten_into(&Prefix::Key(key.to_string()), &value, &mut leaves);
        leaves.into_iter().collect()
    } else {
        vec![(key.to_string(), value)]
    };
    Ok(Write {
        key: key.to_string(),
        leaves,
    })
}

fn expand_all<I, K, V>(values: I) -> Result<Vec<Write>>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<Value>,
{
    values
        .into_iter()
        .map(|(key, value)| expand(key.as_ref(), value.into()))
        .collect()
}

pub(crate) fn collect_flat<I, K, V>(values: I) -> FlatMap
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<Value>,
{
    values
        .into_iter()
        .map(|(key, value)| (key.as_ref().to_string(), value.into()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn get_c() -> Container {
        let c = Container::new();
        c.set("a.b", 5).unwrap();
        c.set("b.c", 7).unwrap();
        c
    }

    fn get_c2() -> Container {
        Container::from_value(json!({
            "a": {"b": 1, "c": 2},
            "d": {"e": 3, "f": 4, "g": {"h": 5, "i": 6}}
        }))
        .unwrap()
    }

    #[derive(Default)]
    struct MockObserver {
        pulled: Mutex<Vec<FlatMap>>,
        pushed: Mutex<Vec<(String, String, Value)>>,
        discarded: Mutex<Vec<(String, String)>>,
        rebound: Mutex<Vec<Rebinding>>,
        refreshed: Mutex<usize>,
    }

    impl Observer for MockObserver {
        fn pull(&self, _prefix: &Prefix, entries: FlatMap) -> Result<()> {
            self.pulled.lock().push(entries);
            Ok(())
        }

        fn push(&self, prefix: &Prefix, suffix: &str, value: &Value) {
            self.pushed
                .lock()
                .push((prefix.to_string(), suffix.to_string(), value.clone()));
        }

        fn discard(&self, prefix: &Prefix, suffix: &str) {
            self.discarded
                .lock()
                .push((prefix.to_string(), suffix.to_string()));
        }

        fn refresh(&self) -> Result<()> {
            *self.refreshed.lock() += 1;
            Ok(())
        }

        fn rebind(&self, _container: &Container, moves: &[Rebinding]) {
            self.rebound.lock().extend_from_slice(moves);
        }
    }

    #[test]
    fn test_load_on_init_flat() {
        let c = Container::from_value(json!({"a.b": 6})).unwrap();
        assert_eq!(c.snapshot(), collect_flat([("a.b", 6)]));
    }

    #[test]
    fn test_load_on_init_rejects_scalar() {
        let result = Container::from_value(json!(5));
        assert!(matches!(result, Err(StoreError::InvalidInput(_))));
    }

    #[test]
    fn test_get_missing() {
        let c = get_c();
        assert!(matches!(c.get("a.z"), Err(StoreError::KeyNotFound(k)) if k == "a.z"));
        // Parents are not values
        assert!(c.get("a").is_err());
    }

    #[test]
    fn test_lset_lget() {
        let c = Container::new();
        c.lset(&["a", "b"], 6).unwrap();
        assert_eq!(c.lget(&["a", "b"]).unwrap(), json!(6));
        assert_eq!(c.keys(), vec!["a.b"]);
    }

    #[test]
    fn test_dget() {
        let c = get_c();
        let values = c.dget(["a.b", "b.c"]).unwrap();
        assert_eq!(values, collect_flat([("a.b", 5), ("b.c", 7)]));
        assert!(c.dget(["a.b", "nope"]).is_err());
    }

    #[test]
    fn test_set_invalid_key() {
        let c = Container::new();
        assert!(matches!(c.set("a..b", 1), Err(StoreError::InvalidKey(_))));
        assert!(matches!(c.set("", 1), Err(StoreError::InvalidKey(_))));
    }

    #[test]
    fn test_set_mapping_is_flattened() {
        let c = Container::new();
        c.set("a", json!({"b": 1, "c": {"d": 2}})).unwrap();
        assert_eq!(c.get("a.b").unwrap(), json!(1));
        assert_eq!(c.get("a.c.d").unwrap(), json!(2));
        assert!(!c.contains_key("a"));
    }

    #[test]
    fn test_set_mapping_over_leaf_replaces_it() {
        let c = Container::from_value(json!({"a": {"b": 5, "c": 6}})).unwrap();
        c.set("a.b", json!({"x": 1})).unwrap();
        assert_eq!(c.snapshot(), collect_flat([("a.b.x", 1), ("a.c", 6)]));
        assert!(matches!(c.get("a.b"), Err(StoreError::KeyNotFound(_))));
        assert_eq!(c.nested(), json!({"a": {"b": {"x": 1}, "c": 6}}));
    }

    #[test]
    fn test_set_scalar_over_parent_replaces_subtree() {
        let c = Container::from_value(json!({"a": {"b": 5, "c": {"d": 1}}, "ab": 2})).unwrap();
        c.set("a", 1).unwrap();
        assert_eq!(c.snapshot(), collect_flat([("a", 1), ("ab", 2)]));

        c.set("a", json!({"z": 3})).unwrap();
        assert_eq!(c.snapshot(), collect_flat([("a.z", 3), ("ab", 2)]));
    }

    #[test]
    fn test_dset_later_write_wins_inside_subtree() {
        let c = Container::new();
        c.dset([("a", json!({"b": 1, "c": 2})), ("a.b", json!(3))]).unwrap();
        assert_eq!(c.snapshot(), collect_flat([("a.b", 3), ("a.c", 2)]));
    }

    #[test]
    fn test_replaced_keys_are_discarded_by_observers() {
        let c = Container::from_value(json!({"a": {"b": 5, "c": 6}})).unwrap();
        let observer = Arc::new(MockObserver::default());
        c.register_observer("a", &observer).unwrap();
        c.set("a.b", json!({"x": 1})).unwrap();

        assert_eq!(
            *observer.discarded.lock(),
            vec![("a".to_string(), "b".to_string())]
        );
        assert_eq!(observer.pushed.lock()[0], ("a".to_string(), "b.x".to_string(), json!(1)));

        // Rewriting a leaf in place discards nothing
        c.set("a.c", 7).unwrap();
        assert_eq!(observer.discarded.lock().len(), 1);
    }

    #[test]
    fn test_safe_set() {
        let c = get_c();
        c.safe_set("a.b", 10).unwrap();
        assert_eq!(c.get("a.b").unwrap(), json!(10));
        assert!(matches!(
            c.safe_set("a.new", 1),
            Err(StoreError::SafetyViolation(k)) if k == "a.new"
        ));
        assert!(!c.contains_key("a.new"));

        // A parent of stored values exists too
        c.safe_set("a", json!({"b": 1, "c": 2})).unwrap();
        assert_eq!(c.snapshot(), collect_flat([("a.b", 1), ("a.c", 2), ("b.c", 7)]));
        assert!(c.contains_subtree("b"));
        assert!(!c.contains_subtree("b.c.d"));
    }

    #[test]
    fn test_safe_dset_is_all_or_nothing() {
        let c = get_c();
        let result = c.safe_dset([("a.b", 50), ("missing", 1)]);
        assert!(result.is_err());
        assert_eq!(c.get("a.b").unwrap(), json!(5));
    }

    #[test]
    fn test_get_dct_flat() {
        let c = get_c2();
        assert_eq!(c.get_dct("a"), collect_flat([("b", 1), ("c", 2)]));
    }

    #[test]
    fn test_get_dct_nested() {
        let c = get_c2();
        let expected = collect_flat([("e", 3), ("f", 4), ("g.h", 5), ("g.i", 6)]);
        assert_eq!(c.get_dct("d"), expected);
    }

    #[test]
    fn test_get_dct_root() {
        let c = get_c();
        assert_eq!(c.get_dct(dotkey::normalize_root(None)), c.snapshot());
        assert_eq!(c.get_dct("."), c.snapshot());
    }

    #[test]
    fn test_nested() {
        let c = get_c();
        assert_eq!(c.nested(), json!({"a": {"b": 5}, "b": {"c": 7}}));
    }

    #[test]
    fn test_register_observer_pulls() {
        let c = get_c2();
        let observer = Arc::new(MockObserver::default());
        c.register_observer("a", &observer).unwrap();

        assert_eq!(observer.pulled.lock()[0], collect_flat([("b", 1), ("c", 2)]));
        assert_eq!(c.observer_count(), 1);
    }

    #[test]
    fn test_update_observers() {
        let c = Container::new();
        let observer = Arc::new(MockObserver::default());
        c.register_observer("a", &observer).unwrap();
        c.set("a.test_key", 4).unwrap();

        let pushed = observer.pushed.lock();
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0], ("a".to_string(), "test_key".to_string(), json!(4)));
    }

    #[test]
    fn test_fan_out_order_nearest_first() {
        let c = Container::new();
        let observer = Arc::new(MockObserver::default());
        c.register_observer(Prefix::Root, &observer).unwrap();
        c.register_observer("a", &observer).unwrap();
        c.register_observer("a.b", &observer).unwrap();
        c.set("a.b.c", 1).unwrap();

        let suffixes: Vec<String> = observer.pushed.lock().iter().map(|p| p.1.clone()).collect();
        assert_eq!(suffixes, vec!["c", "b.c", "a.b.c"]);
    }

    #[test]
    fn test_unrelated_prefix_not_notified() {
        let c = Container::new();
        let observer = Arc::new(MockObserver::default());
        c.register_observer("ab", &observer).unwrap();
        c.set("a.b", 1).unwrap();
        assert!(observer.pushed.lock().is_empty());
    }

    #[test]
    fn test_refresh_observer_on_load() {
        let c = Container::from_value(json!({"a.b": 6})).unwrap();
        let observer = Arc::new(MockObserver::default());
        c.register_observer("a", &observer).unwrap();
        c.load(json!({"a.b": 7, "a.e": 45})).unwrap();

        assert_eq!(*observer.refreshed.lock(), 1);
        assert!(observer.pushed.lock().is_empty());
        assert_eq!(c.get("a.e").unwrap(), json!(45));
    }

    #[test]
    fn test_load_rejects_scalar_and_keeps_state() {
        let c = get_c();
        assert!(c.load(json!([1, 2])).is_err());
        assert_eq!(c.get("a.b").unwrap(), json!(5));
    }

    #[test]
    fn test_reset() {
        let c = get_c2();
        c.set("a.b", 100).unwrap();
        c.set("z", 1).unwrap();
        c.reset().unwrap();
        assert_eq!(c.get("a.b").unwrap(), json!(1));
        assert!(!c.contains_key("z"));

        c.load(json!({"x": 1})).unwrap();
        c.set("x", 2).unwrap();
        c.reset().unwrap();
        assert_eq!(c.snapshot(), collect_flat([("x", 1)]));
    }

    #[test]
    fn test_reload_without_sources() {
        let c = Container::new();
        assert!(matches!(c.reload(), Err(StoreError::LoadError(_))));
    }

    #[test]
    fn test_dropped_observer_is_pruned() {
        let c = Container::new();
        let observer = Arc::new(MockObserver::default());
        c.register_observer("a", &observer).unwrap();
        drop(observer);

        c.set("a.b", 1).unwrap();
        assert_eq!(c.observer_count(), 0);
    }

    #[test]
    fn test_unregister_observer() {
        let c = Container::new();
        let observer = Arc::new(MockObserver::default());
        let id = c.register_observer("a", &observer).unwrap();
        assert!(c.unregister_observer(id));
        c.set("a.b", 1).unwrap();
        assert!(observer.pushed.lock().is_empty());
    }

    #[test]
    fn test_combine() {
        let c1 = Container::from_value(json!({"b": 5})).unwrap();
        let c2 = Container::from_value(json!({"d": 7})).unwrap();
        let c = Container::combine(&[("c1", c1), ("c2", c2)]).unwrap();
        assert_eq!(c.snapshot(), collect_flat([("c1.b", 5), ("c2.d", 7)]));
    }

    #[test]
    fn test_combine_reprefixes_observers() {
        let c1 = Container::from_value(json!({"a.b": 5})).unwrap();
        let observer = Arc::new(MockObserver::default());
        let from = c1.register_observer("a", &observer).unwrap();

        let c = Container::combine(&[("c1", c1.clone())]).unwrap();
        assert_eq!(c1.observer_count(), 0);
        assert_eq!(c.observer_count(), 1);
        {
            let rebound = observer.rebound.lock();
            assert_eq!(rebound.len(), 1);
            assert_eq!(rebound[0].from, from);
            assert_eq!(rebound[0].prefix, Prefix::from("c1.a"));
        }
        assert_eq!(*observer.refreshed.lock(), 1);

        c.set("c1.a.b", 6).unwrap();
        assert_eq!(observer.pushed.lock()[0].1, "b");
    }

    #[test]
    fn test_combine_root_registration_becomes_name() {
        let c1 = Container::from_value(json!({"b": 5})).unwrap();
        let observer = Arc::new(MockObserver::default());
        c1.register_observer(Prefix::Root, &observer).unwrap();

        let _c = Container::combine(&[("c1", c1)]).unwrap();
        assert_eq!(observer.rebound.lock()[0].prefix, Prefix::from("c1"));
    }

    #[test]
    fn test_merge() {
        let c1 = Container::from_value(json!({"a.b": 5})).unwrap();
        let b1 = Arc::new(MockObserver::default());
        c1.register_observer("a", &b1).unwrap();
        let c2 = Container::from_value(json!({"c.d": 7})).unwrap();
        let b2 = Arc::new(MockObserver::default());
        c2.register_observer("c", &b2).unwrap();

        let c = Container::merge(&[c1.clone(), c2.clone()]).unwrap();
        assert_eq!(c.snapshot(), collect_flat([("a.b", 5), ("c.d", 7)]));
        assert_eq!(c.observer_count(), 2);
        assert_eq!(c1.observer_count() + c2.observer_count(), 0);

        c.set("c.d", 8).unwrap();
        assert_eq!(b2.pushed.lock()[0].2, json!(8));
        assert!(b1.pushed.lock().is_empty());

        // The sources no longer notify moved observers
        c2.set("c.d", 9).unwrap();
        assert_eq!(b2.pushed.lock().len(), 1);
    }

    #[test]
    fn test_merge_later_container_wins() {
        let c1 = Container::from_value(json!({"a.b": 5, "x": 1})).unwrap();
        let c2 = Container::from_value(json!({"a.b": 6})).unwrap();
        let c = Container::merge(&[c1, c2]).unwrap();
        assert_eq!(c.snapshot(), collect_flat([("a.b", 6), ("x", 1)]));
    }

    #[test]
    fn test_context_nesting() {
        let c = Container::from_value(json!({"a.b": 6, "a.c": 7})).unwrap();
        let original = c.snapshot();
        {
            let _outer = c.context([("a.b", 66)]).unwrap();
            let expected1 = collect_flat([("a.b", 66), ("a.c", 7)]);
            assert_eq!(c.snapshot(), expected1);
            {
                let _inner = c.context([("a.c", 77)]).unwrap();
                assert_eq!(c.snapshot(), collect_flat([("a.b", 66), ("a.c", 77)]));
            }
            assert_eq!(c.snapshot(), expected1);
        }
        assert_eq!(c.snapshot(), original);
    }

    #[test]
    fn test_context_with_mapping_override_restores_leaf() {
        let c = Container::from_value(json!({"a": {"b": 5}})).unwrap();
        let original = c.snapshot();
        {
            let _guard = c.context([("a.b", json!({"x": 1}))]).unwrap();
            assert_eq!(c.snapshot(), collect_flat([("a.b.x", 1)]));
        }
        assert_eq!(c.snapshot(), original);
    }

    #[test]
    fn test_clone_shares_state() {
        let c = get_c();
        let c2 = c.clone();
        c2.set("a.b", 42).unwrap();
        assert_eq!(c.get("a.b").unwrap(), json!(42));
    }
}
