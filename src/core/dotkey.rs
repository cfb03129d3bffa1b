//! Dotkey codec: splitting, joining and walking dot-delimited keys.
//!
//! A dotkey such as `"engine.fuel.density"` addresses a position in an implied
//! hierarchy. The store keeps every value under its full dotkey (the flat
//! representation); [`flatten`] and [`nest`] convert to and from nested
//! mappings.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound;

/// Separator between dotkey segments.
pub const SEPARATOR: char = '.';

/// Flat representation: full dotkey to leaf value, ordered by key.
pub type FlatMap = BTreeMap<String, Value>;

/// A registration scope: either the whole store or every key below a dotkey.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Prefix {
    /// No prefix; the whole store.
    Root,
    /// Keys beginning with this dotkey plus the separator.
    Key(String),
}

impl Prefix {
    /// Strip this prefix from a full dotkey, returning the suffix.
    ///
    /// Returns `None` when the dotkey is not strictly below the prefix.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dotstore::core::Prefix;
    ///
    /// let prefix = Prefix::from("a.b");
    /// assert_eq!(prefix.strip("a.b.c"), Some("c"));
    /// assert_eq!(prefix.strip("a.bc"), None);
    /// assert_eq!(Prefix::Root.strip("a.b"), Some("a.b"));
    /// ```
    pub fn strip<'k>(&self, dotkey: &'k str) -> Option<&'k str> {
        match self {
            Prefix::Root => Some(dotkey),
            Prefix::Key(prefix) => dotkey
                .strip_prefix(prefix.as_str())
                .and_then(|rest| rest.strip_prefix(SEPARATOR))
                .filter(|suffix| !suffix.is_empty()),
        }
    }

    /// Build the full dotkey for a suffix under this prefix.
    pub fn qualify(&self, suffix: &str) -> String {
        match self {
            Prefix::Root => suffix.to_string(),
            Prefix::Key(prefix) => format!("{}{}{}", prefix, SEPARATOR, suffix),
        }
    }

    /// Whether this is the root prefix.
    pub fn is_root(&self) -> bool {
        matches!(self, Prefix::Root)
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prefix::Root => f.write_str("__ROOT__"),
            Prefix::Key(prefix) => f.write_str(prefix),
        }
    }
}

impl From<&str> for Prefix {
    fn from(dotkey: &str) -> Self {
        normalize_root(Some(dotkey))
    }
}

impl From<String> for Prefix {
    fn from(dotkey: String) -> Self {
        match dotkey.as_str() {
            "" | "." => Prefix::Root,
            _ => Prefix::Key(dotkey),
        }
    }
}

impl From<Option<&str>> for Prefix {
    fn from(dotkey: Option<&str>) -> Self {
        normalize_root(dotkey)
    }
}

/// Split a dotkey into its segments.
pub fn split(dotkey: &str) -> Vec<&str> {
    dotkey.split(SEPARATOR).collect()
}

/// Join segments into a dotkey.
pub fn join<S: AsRef<str>>(segments: &[S]) -> String {
    let mut out = String::new();
    for (i, segment) in segments.iter().enumerate() {
        if i > 0 {
            out.push(SEPARATOR);
        }
        out.push_str(segment.as_ref());
    }
    out
}

/// Whether a dotkey is non-empty and has no empty segments.
pub fn is_well_formed(dotkey: &str) -> bool {
    !dotkey.is_empty() && dotkey.split(SEPARATOR).all(|segment| !segment.is_empty())
}

/// Map `None`, `""` and `"."` to [`Prefix::Root`]; anything else is a key prefix.
pub fn normalize_root(dotkey: Option<&str>) -> Prefix {
    match dotkey {
        None | Some("") | Some(".") => Prefix::Root,
        Some(dotkey) => Prefix::Key(dotkey.to_string()),
    }
}

/// Every strict ancestor of a dotkey paired with the remaining suffix.
///
/// Ordered from the nearest ancestor down to [`Prefix::Root`]; the key itself
/// is not included.
///
/// # Examples
///
/// ```rust
/// use dotstore::core::{dotkey, Prefix};
///
/// let chain = dotkey::ancestors("a.b.c");
/// assert_eq!(chain, vec![
///     (Prefix::from("a.b"), "c".to_string()),
///     (Prefix::from("a"), "b.c".to_string()),
///     (Prefix::Root, "a.b.c".to_string()),
/// ]);
/// ```
pub fn ancestors(dotkey: &str) -> Vec<(Prefix, String)> {
    let mut chain: Vec<(Prefix, String)> = dotkey
        .rmatch_indices(SEPARATOR)
        .map(|(i, _)| {
            (
                Prefix::Key(dotkey[..i].to_string()),
                dotkey[i + 1..].to_string(),
            )
        })
        .collect();
    chain.push((Prefix::Root, dotkey.to_string()));
    chain
}

/// Stored keys equal to `dotkey` or below it, in order.
///
/// ```rust
/// use dotstore::core::{dotkey, FlatMap};
/// use serde_json::json;
///
/// let flat: FlatMap = [("a.b", 1), ("a-b", 2), ("a.b.c", 3), ("a.bc", 4)]
///     .into_iter()
///     .map(|(k, v)| (k.to_string(), json!(v)))
///     .collect();
/// assert_eq!(dotkey::subtree(&flat, "a.b"), vec!["a.b", "a.b.c"]);
/// ```
pub fn subtree(flat: &FlatMap, dotkey: &str) -> Vec<String> {
    flat.range::<str, _>((Bound::Included(dotkey), Bound::Unbounded))
        .map(|(key, _)| key)
        .take_while(|key| key.starts_with(dotkey))
        .filter(|key| key.len() == dotkey.len() || key[dotkey.len()..].starts_with(SEPARATOR))
        .cloned()
        .collect()
}

/// Flatten a nested mapping into dotkeys.
///
/// Non-mapping values are leaves and pass through unchanged. A non-mapping
/// `value` yields a single entry under `prefix` (or nothing at the root).
pub fn flatten(value: &Value) -> FlatMap {
    let mut out = FlatMap::new();
    flatten_into(&Prefix::Root, value, &mut out);
    out
}

/// Flatten `value` under `prefix`, adding the leaves to `out`.
pub fn flatten_into(prefix: &Prefix, value: &Value, out: &mut FlatMap) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                flatten_into(&Prefix::Key(prefix.qualify(key)), child, out);
            }
        }
        leaf => {
            if let Prefix::Key(key) = prefix {
                out.insert(key.clone(), leaf.clone());
            }
        }
    }
}

/// Build a single nested chain `{s0: {s1: ... value}}` from segments.
pub fn nest_one<S: AsRef<str>>(segments: &[S], value: Value) -> Value {
    segments.iter().rev().fold(value, |inner, segment| {
        let mut map = Map::new();
        map.insert(segment.as_ref().to_string(), inner);
        Value::Object(map)
    })
}

/// Rebuild the nested mapping for a flat one.
///
/// When a key is both a leaf and a parent (`"a"` and `"a.b"`), the deeper
/// entries win.
pub fn nest(flat: &FlatMap) -> Value {
    let mut root = Map::new();
    for (dotkey, value) in flat {
        let segments = split(dotkey);
        let (last, parents) = match segments.split_last() {
            Some(parts) => parts,
            None => continue,
        };
        let mut node = &mut root;
        for segment in parents {
            let child = node
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            node = match child {
                Value::Object(map) => map,
                _ => unreachable!("child was just made an object"),
            };
        }
        if !node.get(*last).is_some_and(Value::is_object) {
            node.insert(last.to_string(), value.clone());
        }
    }
    Value::Object(root)
}
