//! Key-value storage for scripts.
//!
//! Three independent tiers exist, each a map from string keys to JSON values:
//!
//! | Tier | Shared by | [`Store`] methods |
//! |------|-----------|-------------------|
//! | script | all instances running the same script | `set`, `get`, `unset`, `get_keys`, `get_all` |
//! | global | every script on every instance | `set_global`, ... |
//! | instance | one script on one instance | `set_instance`, ... |
//!
//! Writes are last-write-wins; there are no transactions. The [`Store`]
//! facade never returns errors to scripts: failed writes yield `false` and
//! failed reads behave like missing keys, with the cause logged.

mod file;
mod memory;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::warn;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

use crate::error::StoreResult;

/// Which tier a [`Store`] operation addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Shared by all instances of the calling script.
    Script,
    /// Shared by all scripts.
    Global,
    /// Private to the calling script on the current instance.
    Instance,
}

/// A resolved storage namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Namespace {
    Script(String),
    Global,
    Instance { script: String, instance: String },
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Script(script) => write!(f, "script:{script}"),
            Self::Global => f.write_str("global"),
            Self::Instance { script, instance } => write!(f, "instance:{instance}:{script}"),
        }
    }
}

/// Storage backend shared by every [`Store`] of a runtime.
///
/// Keys within a namespace are kept sorted.
pub trait StoreBackend: Send + Sync + 'static {
    /// Inserts or replaces `key`.
    fn set(&self, ns: &Namespace, key: &str, value: Value) -> StoreResult<()>;

    /// Reads `key`.
    fn get(&self, ns: &Namespace, key: &str) -> StoreResult<Option<Value>>;

    /// Removes `key`, returning whether it existed.
    fn unset(&self, ns: &Namespace, key: &str) -> StoreResult<bool>;

    /// Lists the keys of a namespace in sorted order.
    fn keys(&self, ns: &Namespace) -> StoreResult<Vec<String>>;

    /// Returns every entry of a namespace.
    fn all(&self, ns: &Namespace) -> StoreResult<Map<String, Value>>;
}

/// A shared storage backend.
pub type BoxedStoreBackend = Arc<dyn StoreBackend>;

/// The store facade handed to one script on one instance.
#[derive(Clone)]
pub struct Store {
    backend: BoxedStoreBackend,
    script: Arc<str>,
    instance: Arc<str>,
}

impl Store {
    /// Binds `backend` to `script` running on `instance`.
    pub fn new(
        backend: BoxedStoreBackend,
        script: impl Into<Arc<str>>,
        instance: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            backend,
            script: script.into(),
            instance: instance.into(),
        }
    }

    /// Resolves `scope` for this script and instance.
    pub fn namespace(&self, scope: Scope) -> Namespace {
        match scope {
            Scope::Script => Namespace::Script(self.script.to_string()),
            Scope::Global => Namespace::Global,
            Scope::Instance => Namespace::Instance {
                script: self.script.to_string(),
                instance: self.instance.to_string(),
            },
        }
    }

    /// Stores `value` under `key` in `scope`.
    ///
    /// Returns `false` if the value cannot be represented as JSON or the
    /// backend rejects the write.
    pub fn set_in<T: Serialize + ?Sized>(&self, scope: Scope, key: &str, value: &T) -> bool {
        let ns = self.namespace(scope);
        let result = serde_json::to_value(value)
            .map_err(Into::into)
            .and_then(|value| self.backend.set(&ns, key, value));
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(namespace = %ns, key, error = %e, "Store write failed");
                false
            }
        }
    }

    /// Reads `key` from `scope`.
    pub fn get_in(&self, scope: Scope, key: &str) -> Option<Value> {
        let ns = self.namespace(scope);
        self.backend.get(&ns, key).unwrap_or_else(|e| {
            warn!(namespace = %ns, key, error = %e, "Store read failed");
            None
        })
    }

    /// Reads `key` from `scope` and deserializes it.
    ///
    /// Returns `None` when the key is missing or holds a different shape.
    pub fn get_in_as<T: DeserializeOwned>(&self, scope: Scope, key: &str) -> Option<T> {
        self.get_in(scope, key)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    /// Removes `key` from `scope`. Returns `true` if the key existed.
    pub fn unset_in(&self, scope: Scope, key: &str) -> bool {
        let ns = self.namespace(scope);
        self.backend.unset(&ns, key).unwrap_or_else(|e| {
            warn!(namespace = %ns, key, error = %e, "Store delete failed");
            false
        })
    }

    /// Lists the keys of `scope`.
    pub fn keys_in(&self, scope: Scope) -> Vec<String> {
        let ns = self.namespace(scope);
        self.backend.keys(&ns).unwrap_or_else(|e| {
            warn!(namespace = %ns, error = %e, "Store listing failed");
            Vec::new()
        })
    }

    /// Returns every entry of `scope`.
    pub fn all_in(&self, scope: Scope) -> Map<String, Value> {
        let ns = self.namespace(scope);
        self.backend.all(&ns).unwrap_or_else(|e| {
            warn!(namespace = %ns, error = %e, "Store listing failed");
            Map::new()
        })
    }

    // ---- script tier ---------------------------------------------------------

    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        self.set_in(Scope::Script, key, value)
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.get_in(Scope::Script, key)
    }

    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_in_as(Scope::Script, key)
    }

    pub fn unset(&self, key: &str) -> bool {
        self.unset_in(Scope::Script, key)
    }

    pub fn get_keys(&self) -> Vec<String> {
        self.keys_in(Scope::Script)
    }

    pub fn get_all(&self) -> Map<String, Value> {
        self.all_in(Scope::Script)
    }

    // ---- global tier ---------------------------------------------------------

    pub fn set_global<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        self.set_in(Scope::Global, key, value)
    }

    pub fn get_global(&self, key: &str) -> Option<Value> {
        self.get_in(Scope::Global, key)
    }

    pub fn unset_global(&self, key: &str) -> bool {
        self.unset_in(Scope::Global, key)
    }

    pub fn get_keys_global(&self) -> Vec<String> {
        self.keys_in(Scope::Global)
    }

    pub fn get_all_global(&self) -> Map<String, Value> {
        self.all_in(Scope::Global)
    }

    // ---- instance tier -------------------------------------------------------

    pub fn set_instance<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        self.set_in(Scope::Instance, key, value)
    }

    pub fn get_instance(&self, key: &str) -> Option<Value> {
        self.get_in(Scope::Instance, key)
    }

    pub fn unset_instance(&self, key: &str) -> bool {
        self.unset_in(Scope::Instance, key)
    }

    pub fn get_keys_instance(&self) -> Vec<String> {
        self.keys_in(Scope::Instance)
    }

    pub fn get_all_instance(&self) -> Map<String, Value> {
        self.all_in(Scope::Instance)
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("script", &self.script)
            .field("instance", &self.instance)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stores() -> (Store, Store, Store) {
        let backend: BoxedStoreBackend = Arc::new(MemoryStore::new());
        (
            Store::new(Arc::clone(&backend), "radio", "i1"),
            Store::new(Arc::clone(&backend), "radio", "i2"),
            Store::new(backend, "quotes", "i1"),
        )
    }

    #[test]
    fn test_set_get_unset() {
        let (store, _, _) = stores();
        assert!(store.set("volume", &42));
        assert_eq!(store.get("volume"), Some(json!(42)));
        assert!(store.unset("volume"));
        assert_eq!(store.get("volume"), None);
        assert!(!store.unset("volume"));
    }

    #[test]
    fn test_tiers_are_independent() {
        let (store, _, _) = stores();
        store.set("k", &"script");
        store.set_global("k", &"global");
        store.set_instance("k", &"instance");

        assert_eq!(store.get("k"), Some(json!("script")));
        assert_eq!(store.get_global("k"), Some(json!("global")));
        assert_eq!(store.get_instance("k"), Some(json!("instance")));

        store.unset_global("k");
        assert_eq!(store.get("k"), Some(json!("script")));
        assert_eq!(store.get_instance("k"), Some(json!("instance")));
    }

    #[test]
    fn test_sharing_rules() {
        let (radio_i1, radio_i2, quotes_i1) = stores();
        radio_i1.set("shared", &1);
        radio_i1.set_instance("local", &2);
        radio_i1.set_global("everyone", &3);

        assert_eq!(radio_i2.get("shared"), Some(json!(1)));
        assert_eq!(radio_i2.get_instance("local"), None);
        assert_eq!(quotes_i1.get("shared"), None);
        assert_eq!(quotes_i1.get_instance("local"), None);
        assert_eq!(quotes_i1.get_global("everyone"), Some(json!(3)));
    }

    #[test]
    fn test_last_write_wins_and_sorted_keys() {
        let (store, _, _) = stores();
        store.set("b", &1);
        store.set("a", &1);
        store.set("b", &2);

        assert_eq!(store.get_keys(), vec!["a", "b"]);
        assert_eq!(store.get_all().get("b"), Some(&json!(2)));
    }

    #[test]
    fn test_typed_access() {
        let (store, _, _) = stores();
        store.set("queue", &vec!["x", "y"]);
        let queue: Vec<String> = store.get_as("queue").unwrap();
        assert_eq!(queue, vec!["x", "y"]);
        assert_eq!(store.get_as::<u32>("queue"), None);
    }

    #[test]
    fn test_unserializable_value_is_rejected() {
        let (store, _, _) = stores();
        let mut bad = std::collections::HashMap::new();
        bad.insert(vec![1_u8], "composite keys are not JSON");
        assert!(!store.set("bad", &bad));
        assert_eq!(store.get("bad"), None);
    }
}
