//! Typed configuration registry.
//!
//! A [`Configuration`] maps zero-sized key types to values. Every key declares
//! its default, so reading a key that was never set is always defined.
//!
//! # Example
//!
//! ```ignore
//! use wirecall::config::{ConfigKey, Configuration};
//!
//! struct TenantId;
//!
//! impl ConfigKey for TenantId {
//!     type Value = Option<String>;
//!     fn default_value() -> Self::Value { None }
//! }
//!
//! let mut config = Configuration::new();
//! assert_eq!(config.get::<TenantId>(), None);
//! config.set::<TenantId>(Some("acme".into()));
//! assert_eq!(config.get::<TenantId>().as_deref(), Some("acme"));
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

/// A configuration slot.
///
/// Keys are types, so they are process-wide singletons owned by whichever
/// crate declares them.
pub trait ConfigKey: 'static {
    /// The value stored under this key.
    type Value: Clone + Send + Sync + 'static;

    /// The value read when the key was never set.
    fn default_value() -> Self::Value;
}

/// A heterogeneous, copy-on-write map of configuration values.
///
/// Cloning is cheap (values are shared) and the clone is fully independent:
/// setting a key on a clone never affects the original. Sessions rely on
/// this to give each request its own override scope.
#[derive(Clone, Default)]
pub struct Configuration {
    values: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Configuration {
    /// Create an empty configuration where every key reads its default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the value for `K`, or its default when unset.
    pub fn get<K: ConfigKey>(&self) -> K::Value {
        self.values
            .get(&TypeId::of::<K>())
            .and_then(|value| value.downcast_ref::<K::Value>())
            .cloned()
            .unwrap_or_else(K::default_value)
    }

    /// Set the value for `K`, replacing any previous value.
    pub fn set<K: ConfigKey>(&mut self, value: K::Value) {
        self.values.insert(TypeId::of::<K>(), Arc::new(value));
    }

    /// Builder-style [`set`](Self::set).
    pub fn with<K: ConfigKey>(mut self, value: K::Value) -> Self {
        self.set::<K>(value);
        self
    }

    /// Update the value for `K` in place, starting from its current value.
    pub fn update<K, F>(&mut self, f: F)
    where
        K: ConfigKey,
        F: FnOnce(&mut K::Value),
    {
        let mut value = self.get::<K>();
        f(&mut value);
        self.set::<K>(value);
    }

    /// Returns whether `K` was explicitly set.
    pub fn contains<K: ConfigKey>(&self) -> bool {
        self.values.contains_key(&TypeId::of::<K>())
    }

    /// Reset `K` to its default.
    pub fn remove<K: ConfigKey>(&mut self) {
        self.values.remove(&TypeId::of::<K>());
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl std::fmt::Debug for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Configuration")
            .field("keys", &self.values.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Limit;

    impl ConfigKey for Limit {
        type Value = u32;
        fn default_value() -> Self::Value {
            7
        }
    }

    struct Tags;

    impl ConfigKey for Tags {
        type Value = Vec<&'static str>;
        fn default_value() -> Self::Value {
            Vec::new()
        }
    }

    #[test]
    fn test_unset_key_reads_default() {
        let config = Configuration::new();
        assert_eq!(config.get::<Limit>(), 7);
        assert!(!config.contains::<Limit>());
        assert!(config.is_empty());
    }

    #[test]
    fn test_set_and_get() {
        let mut config = Configuration::new();
        config.set::<Limit>(3);
        assert_eq!(config.get::<Limit>(), 3);
        assert!(config.contains::<Limit>());

        config.remove::<Limit>();
        assert_eq!(config.get::<Limit>(), 7);
    }

    #[test]
    fn test_child_scope_does_not_leak() {
        let parent = Configuration::new().with::<Limit>(1);
        let mut child = parent.clone();
        child.set::<Limit>(2);
        child.update::<Tags, _>(|tags| tags.push("child"));

        assert_eq!(parent.get::<Limit>(), 1);
        assert!(parent.get::<Tags>().is_empty());
        assert_eq!(child.get::<Limit>(), 2);
        assert_eq!(child.get::<Tags>(), vec!["child"]);
    }

    #[test]
    fn test_keys_are_independent() {
        let config = Configuration::new()
            .with::<Limit>(9)
            .with::<Tags>(vec!["a"]);
        assert_eq!(config.len(), 2);
        assert_eq!(config.get::<Limit>(), 9);
        assert_eq!(config.get::<Tags>(), vec!["a"]);
    }
}
