//! Deferred construction parameters.

use std::collections::BTreeMap;

/// Positional and named parameters handed to a body on its first activation.
///
/// A flowlet keeps its own copy so they stay readable after the body starts.
///
/// ```rust
/// use flowlet::Params;
///
/// let params = Params::new().arg(1).arg(2).kwarg("scale", 10);
/// assert_eq!(params.args, vec![1, 2]);
/// assert_eq!(params.get("scale"), Some(&10));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Params<V> {
    pub args: Vec<V>,
    pub kwargs: BTreeMap<String, V>,
}

impl<V> Default for Params<V> {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            kwargs: BTreeMap::new(),
        }
    }
}

impl<V> Params<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, value: V) -> Self {
        self.args.push(value);
        self
    }

    pub fn kwarg(mut self, name: impl Into<String>, value: V) -> Self {
        self.kwargs.insert(name.into(), value);
        self
    }

    /// Positional argument `index`, if supplied.
    pub fn nth(&self, index: usize) -> Option<&V> {
        self.args.get(index)
    }

    /// Named argument `name`, if supplied.
    pub fn get(&self, name: &str) -> Option<&V> {
        self.kwargs.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty() && self.kwargs.is_empty()
    }
}

impl<V> From<Vec<V>> for Params<V> {
    fn from(args: Vec<V>) -> Self {
        Self {
            args,
            kwargs: BTreeMap::new(),
        }
    }
}

impl<V> FromIterator<V> for Params<V> {
    fn from_iter<T: IntoIterator<Item = V>>(iter: T) -> Self {
        Self::from(iter.into_iter().collect::<Vec<_>>())
    }
}
