//! Observer protocol between a container and the projections it feeds.

use crate::core::dotkey::{FlatMap, Prefix};
use crate::core::Container;
use crate::error::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// Something that mirrors part of a container and wants to hear about changes.
///
/// Implemented by [`View`](crate::core::View). Observers are held weakly: the
/// container never keeps one alive.
pub trait Observer: Send + Sync {
    /// Initial pull for a newly registered prefix.
    ///
    /// `entries` is the container's `get_dct(prefix)`. Returning an error
    /// aborts the registration.
    fn pull(&self, prefix: &Prefix, entries: FlatMap) -> Result<()>;

    /// Incremental update: `suffix` below `prefix` now holds `value`.
    fn push(&self, prefix: &Prefix, suffix: &str, value: &Value);

    /// Incremental update: `suffix` below `prefix` was removed because a
    /// write replaced the subtree holding it.
    fn discard(&self, prefix: &Prefix, suffix: &str);

    /// Full resynchronization after the container's key set may have changed.
    fn refresh(&self) -> Result<()>;

    /// The registrations listed in `moves` now belong to `container`.
    ///
    /// Called by [`Container::merge`] and [`Container::combine`] before a
    /// [`refresh`](Observer::refresh), so an observer that reads from its
    /// container can follow the new one.
    fn rebind(&self, container: &Container, moves: &[Rebinding]);
}

/// Handle identifying one registration with one container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

/// One registration moved from a source container into a merged one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rebinding {
    /// Id in the source container
    pub from: ObserverId,
    /// Id in the new container
    pub to: ObserverId,
    /// Prefix in the new container
    pub prefix: Prefix,
}

/// One weak registration.
#[derive(Clone)]
pub(crate) struct Registration {
    pub(crate) id: ObserverId,
    pub(crate) observer: Weak<dyn Observer>,
}

/// Registrations indexed by normalized prefix.
#[derive(Default)]
pub(crate) struct ObserverRegistry {
    by_prefix: HashMap<Prefix, Vec<Registration>>,
    next_id: u64,
}

impl ObserverRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, prefix: Prefix, observer: Weak<dyn Observer>) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.by_prefix
            .entry(prefix)
            .or_default()
            .push(Registration { id, observer });
        id
    }

    /// Remove a registration. Returns whether it was present.
    pub(crate) fn remove(&mut self, id: ObserverId) -> bool {
        let mut found = false;
        self.by_prefix.retain(|_, registrations| {
            let before = registrations.len();
            registrations.retain(|r| r.id != id);
            found |= registrations.len() != before;
            !registrations.is_empty()
        });
        found
    }

    /// Live observers registered exactly at `prefix`; dead ones are dropped.
    pub(crate) fn live_at(&mut self, prefix: &Prefix) -> Vec<Arc<dyn Observer>> {
        let Some(registrations) = self.by_prefix.get_mut(prefix) else {
            return Vec::new();
        };
        let mut live = Vec::with_capacity(registrations.len());
        registrations.retain(|r| match r.observer.upgrade() {
            Some(observer) => {
                live.push(observer);
                true
            }
            None => false,
        });
        if registrations.is_empty() {
            self.by_prefix.remove(prefix);
        }
        live
    }

    /// Every live observer, each once, after pruning dead registrations.
    pub(crate) fn live_all(&mut self) -> Vec<Arc<dyn Observer>> {
        self.prune();
        let mut seen: Vec<Arc<dyn Observer>> = Vec::new();
        for registration in self.by_prefix.values().flatten() {
            if let Some(observer) = registration.observer.upgrade() {
                if !seen.iter().any(|s| Arc::ptr_eq(s, &observer)) {
                    seen.push(observer);
                }
            }
        }
        seen
    }

    pub(crate) fn prune(&mut self) {
        self.by_prefix.retain(|_, registrations| {
            registrations.retain(|r| r.observer.strong_count() > 0);
            !registrations.is_empty()
        });
    }

    pub(crate) fn len(&mut self) -> usize {
        self.prune();
        self.by_prefix.values().map(Vec::len).sum()
    }

    /// Remove every live registration, for moving into another registry.
    pub(crate) fn take_all(&mut self) -> Vec<(Prefix, Registration)> {
        self.prune();
        let mut out = Vec::new();
        for (prefix, registrations) in self.by_prefix.drain() {
            for registration in registrations {
                out.push((prefix.clone(), registration));
            }
        }
        out.sort_by_key(|(_, registration)| registration.id);
        out
    }
}
