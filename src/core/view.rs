//! Cached projections of a container below one or more prefixes.
//!
//! A view registered at `"A"` over a container holding `"A.apple"` exposes the
//! key `"apple"`. While live, the view follows every change to the container;
//! while frozen it keeps its last contents and writes stay local.

use crate::core::container::collect_flat;
use crate::core::context::ScopedOverride;
use crate::core::dotkey::{self, FlatMap, Prefix};
use crate::core::observer::{Observer, ObserverId, Rebinding};
use crate::core::Container;
use crate::error::{Result, StoreError};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// A type whose settings live under its own path in a container.
///
/// [`View::for_type`] registers the type's dotkey (see [`type_dotkey`])
/// followed by the dotkeys returned from [`Scoped::bases`], so settings shared
/// by a family of types can live under the family's path.
///
/// # Examples
///
/// ```rust
/// use dotstore::core::{type_dotkey, Scoped};
///
/// struct Vehicle;
/// struct Truck;
///
/// impl Scoped for Vehicle {}
///
/// impl Scoped for Truck {
///     fn bases() -> Vec<String> {
///         vec![type_dotkey::<Vehicle>()]
///     }
/// }
/// ```
pub trait Scoped: 'static {
    /// Dotkeys of the types this one derives its settings from.
    fn bases() -> Vec<String> {
        Vec::new()
    }
}

/// Dotkey for a type: its module path without the crate name.
///
/// `my_app::vehicles::Truck` becomes `"vehicles.Truck"`. Generic arguments are
/// ignored.
pub fn type_dotkey<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let path = full.split('<').next().unwrap_or(full);
    let segments: Vec<&str> = path.split("::").collect();
    match segments.split_first() {
        Some((_, rest)) if !rest.is_empty() => dotkey::join(rest),
        _ => dotkey::join(&segments),
    }
}

/// The type's own dotkey followed by its bases.
pub fn type_prefixes<T: Scoped>() -> Vec<String> {
    let mut prefixes = vec![type_dotkey::<T>()];
    prefixes.extend(T::bases());
    prefixes
}

/// Mutable view state, guarded by one lock.
struct ViewState {
    prefixes: Vec<Prefix>,
    /// Registration ids, parallel to `prefixes`
    registrations: Vec<ObserverId>,
    cache: FlatMap,
    /// Which prefix supplied each cached key
    origins: HashMap<String, Prefix>,
    live: bool,
}

impl ViewState {
    fn clash(&self, key: &str, prefix: &Prefix) -> StoreError {
        let mut prefixes: Vec<String> = self.prefixes.iter().map(ToString::to_string).collect();
        let incoming = prefix.to_string();
        if !prefixes.contains(&incoming) {
            prefixes.push(incoming.clone());
        }
        StoreError::KeyClash {
            key: key.to_string(),
            prefix: incoming,
            prefixes,
        }
    }
}

/// The part of a view the container observes.
struct ViewShared {
    /// Replaced when the view's registrations move to a merged container
    container: RwLock<Container>,
    state: Mutex<ViewState>,
}

impl ViewShared {
    fn container(&self) -> Container {
        self.container.read().clone()
    }
}

impl Observer for ViewShared {
    fn pull(&self, prefix: &Prefix, entries: FlatMap) -> Result<()> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if let Some(key) = entries.keys().find(|key| state.cache.contains_key(*key)) {
            return Err(state.clash(key, prefix));
        }
        for (key, value) in entries {
            state.origins.insert(key.clone(), prefix.clone());
            state.cache.insert(key, value);
        }
        state.prefixes.push(prefix.clone());
        Ok(())
    }

    fn push(&self, prefix: &Prefix, suffix: &str, value: &Value) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if !state.live {
            return;
        }
        match state.origins.get(suffix) {
            Some(owner) if owner != prefix => {
                warn!(key = suffix, owner = %owner, prefix = %prefix, "ignoring clashing update");
                return;
            }
            Some(_) => {}
            None => {
                state.origins.insert(suffix.to_string(), prefix.clone());
            }
        }
        state.cache.insert(suffix.to_string(), value.clone());
    }

    fn discard(&self, prefix: &Prefix, suffix: &str) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if !state.live || state.origins.get(suffix) != Some(prefix) {
            return;
        }
        state.origins.remove(suffix);
        state.cache.remove(suffix);
    }

    fn refresh(&self) -> Result<()> {
        let prefixes = {
            let state = self.state.lock();
            if !state.live {
                return Ok(());
            }
            state.prefixes.clone()
        };

        let container = self.container();
        let mut cache = FlatMap::new();
        let mut origins = HashMap::new();
        for prefix in &prefixes {
            for (key, value) in container.get_dct(prefix.clone()) {
                if cache.contains_key(&key) {
                    let state = self.state.lock();
                    return Err(state.clash(&key, prefix));
                }
                origins.insert(key.clone(), prefix.clone());
                cache.insert(key, value);
            }
        }

        let mut state = self.state.lock();
        debug!(keys = cache.len(), "refreshed view");
        state.cache = cache;
        state.origins = origins;
        Ok(())
    }

    fn rebind(&self, container: &Container, moves: &[Rebinding]) {
        {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            for (id, prefix) in state.registrations.iter_mut().zip(state.prefixes.iter_mut()) {
                if let Some(rebinding) = moves.iter().find(|r| r.from == *id) {
                    *id = rebinding.to;
                    *prefix = rebinding.prefix.clone();
                }
            }
        }
        *self.container.write() = container.clone();
    }
}

/// A read/write projection of a [`Container`].
///
/// Keys are suffixes below the registered prefixes. The suffixes supplied by
/// different prefixes must not overlap ([`StoreError::KeyClash`]).
///
/// # Examples
///
/// ```rust
/// use dotstore::prelude::*;
/// use serde_json::json;
///
/// # fn example() -> Result<()> {
/// let container = Container::from_value(json!({"A": {"x": 1}, "B": {"y": 2}}))?;
/// let view = View::new(&container, ["A", "B"])?;
/// assert_eq!(view.get("x")?, json!(1));
/// assert_eq!(view.get("y")?, json!(2));
///
/// // Live views forward writes to the container
/// view.set("x", 10)?;
/// assert_eq!(container.get("A.x")?, json!(10));
///
/// // Frozen views keep their contents
/// view.set_live(false)?;
/// container.set("B.y", 20)?;
/// assert_eq!(view.get("y")?, json!(2));
/// view.set_live(true)?;
/// assert_eq!(view.get("y")?, json!(20));
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
pub struct View {
    shared: Arc<ViewShared>,
}

impl View {
    /// Start building a view over `container`.
    pub fn builder(container: &Container) -> ViewBuilder<'_> {
        ViewBuilder::new(container)
    }

    /// Create a live view over the given prefixes (root if empty).
    pub fn new<I, S>(container: &Container, prefixes: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::builder(container).with_prefixes(prefixes).build()
    }

    /// Create a live view over the whole container.
    pub fn root(container: &Container) -> Result<Self> {
        Self::builder(container).with_prefix(Prefix::Root).build()
    }

    /// Create a live view over a type's own prefix and its bases.
    pub fn for_type<T: Scoped>(container: &Container) -> Result<Self> {
        Self::builder(container).for_type::<T>().build()
    }

    /// Register one more prefix, pulling its values.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::KeyClash`] if the prefix supplies a key the view
    /// already has; the view is unchanged in that case.
    pub fn add_prefix(&self, prefix: impl Into<Prefix>) -> Result<()> {
        let id = self
            .shared
            .container()
            .register_observer(prefix, &self.shared)?;
        self.shared.state.lock().registrations.push(id);
        Ok(())
    }

    /// The registered prefixes, in registration order.
    pub fn prefixes(&self) -> Vec<Prefix> {
        self.shared.state.lock().prefixes.clone()
    }

    /// The container this view projects.
    ///
    /// This changes when [`Container::merge`] or [`Container::combine`] moves
    /// the view onto a new container.
    pub fn container(&self) -> Container {
        self.shared.container()
    }

    /// Whether the view follows its container.
    pub fn live(&self) -> bool {
        self.shared.state.lock().live
    }

    /// Freeze (`false`) or reactivate (`true`) the view.
    ///
    /// Reactivating discards the cache and performs a full [`View::refresh`].
    ///
    /// # Errors
    ///
    /// Returns the refresh error when reactivating fails; a frozen view then
    /// stays frozen with its previous cache.
    pub fn set_live(&self, live: bool) -> Result<()> {
        let was_live = std::mem::replace(&mut self.shared.state.lock().live, live);
        if live {
            if let Err(e) = self.refresh() {
                self.shared.state.lock().live = was_live;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Rebuild the cache from the container. Does nothing while frozen.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::KeyClash`] if the container now supplies a key
    /// through two prefixes; the previous cache is kept in that case.
    pub fn refresh(&self) -> Result<()> {
        Observer::refresh(&*self.shared)
    }

    /// Get a cached value.
    pub fn get(&self, key: &str) -> Result<Value> {
        self.shared
            .state
            .lock()
            .cache
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::KeyNotFound(key.to_string()))
    }

    /// Whether the view has a key.
    pub fn contains_key(&self, key: &str) -> bool {
        self.shared.state.lock().cache.contains_key(key)
    }

    /// All keys, in order.
    pub fn keys(&self) -> Vec<String> {
        self.shared.state.lock().cache.keys().cloned().collect()
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.shared.state.lock().cache.len()
    }

    /// Whether the view has no keys.
    pub fn is_empty(&self) -> bool {
        self.shared.state.lock().cache.is_empty()
    }

    /// Copy of every cached value.
    pub fn snapshot(&self) -> FlatMap {
        self.shared.state.lock().cache.clone()
    }

    /// Write a value.
    ///
    /// A live view forwards the write to the container under the one prefix
    /// that holds `key`; the cache then updates through the container's
    /// notification. A frozen view only changes its cache.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AmbiguousOrMissingKey`] if a live view finds the
    /// key under no prefix or under more than one.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        self.dset([(key, value.into())])
    }

    /// Write several values. A live view resolves every key before writing any.
    pub fn dset<I, K, V>(&self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let values = collect_flat(values);
        if self.live() {
            let mut resolved = FlatMap::new();
            for (key, value) in values {
                resolved.insert(self.resolve(&key)?, value);
            }
            self.shared.container().dset(resolved)
        } else {
            if let Some(key) = values.keys().find(|key| !dotkey::is_well_formed(key)) {
                return Err(StoreError::InvalidKey(key.clone()));
            }
            let mut guard = self.shared.state.lock();
            let state = &mut *guard;
            for (key, value) in values {
                for stale in dotkey::subtree(&state.cache, &key) {
                    state.cache.remove(&stale);
                    state.origins.remove(&stale);
                }
                dotkey::flatten_into(&Prefix::Key(key), &value, &mut state.cache);
            }
            Ok(())
        }
    }

    /// Full container dotkey for a view key, if exactly one prefix holds it
    /// (as a value or as the parent of values).
    pub fn resolve(&self, key: &str) -> Result<String> {
        let prefixes = self.prefixes();
        let container = self.shared.container();
        let matches: Vec<&Prefix> = prefixes
            .iter()
            .filter(|prefix| container.contains_subtree(&prefix.qualify(key)))
            .collect();
        match matches.as_slice() {
            [prefix] => Ok(prefix.qualify(key)),
            _ => Err(StoreError::AmbiguousOrMissingKey {
                key: key.to_string(),
                matches: matches.iter().map(ToString::to_string).collect(),
                prefixes: prefixes.iter().map(ToString::to_string).collect(),
            }),
        }
    }

    /// Temporarily override existing keys of this view until the guard drops.
    pub fn context<I, K, V>(&self, overrides: I) -> Result<ScopedOverride<'_, Self>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        ScopedOverride::enter(self, collect_flat(overrides))
    }
}

impl Drop for View {
    fn drop(&mut self) {
        let ids = std::mem::take(&mut self.shared.state.lock().registrations);
        let container = self.shared.container();
        for id in ids {
            container.unregister_observer(id);
        }
    }
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("View")
            .field("prefixes", &state.prefixes)
            .field("live", &state.live)
            .field("cache", &state.cache)
            .finish()
    }
}

/// Builder for [`View`].
pub struct ViewBuilder<'c> {
    container: &'c Container,
    prefixes: Vec<Prefix>,
    live: bool,
}

impl<'c> ViewBuilder<'c> {
    /// Create a builder for a live view with no prefixes yet.
    pub fn new(container: &'c Container) -> Self {
        Self {
            container,
            prefixes: Vec::new(),
            live: true,
        }
    }

    /// Add a prefix. `""`, `"."` and [`Prefix::Root`] select the whole container.
    pub fn with_prefix(mut self, prefix: impl Into<Prefix>) -> Self {
        self.prefixes.push(prefix.into());
        self
    }

    /// Add several prefixes.
    pub fn with_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.prefixes
            .extend(prefixes.into_iter().map(|p| Prefix::from(p.as_ref())));
        self
    }

    /// Add the prefixes derived from a type (see [`type_prefixes`]).
    pub fn for_type<T: Scoped>(self) -> Self {
        self.with_prefixes(type_prefixes::<T>())
    }

    /// Start live (the default) or frozen.
    pub fn live(mut self, live: bool) -> Self {
        self.live = live;
        self
    }

    /// Register every prefix, pulling the initial values.
    ///
    /// With no prefixes the view covers the whole container.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::KeyClash`] if two prefixes supply the same key.
    pub fn build(self) -> Result<View> {
        let prefixes = if self.prefixes.is_empty() {
            vec![Prefix::Root]
        } else {
            self.prefixes
        };

        let view = View {
            shared: Arc::new(ViewShared {
                container: RwLock::new(self.container.clone()),
                state: Mutex::new(ViewState {
                    prefixes: Vec::new(),
                    registrations: Vec::new(),
                    cache: FlatMap::new(),
                    origins: HashMap::new(),
                    live: self.live,
                }),
            }),
        };
        for prefix in prefixes {
            view.add_prefix(prefix)?;
        }
        Ok(view)
    }
}
