use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;
use serde_json::{Map, Value};

use super::{Namespace, StoreBackend};
use crate::error::StoreResult;

/// Volatile backend; contents are lost when the runtime stops.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<HashMap<Namespace, BTreeMap<String, Value>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoreBackend for MemoryStore {
    fn set(&self, ns: &Namespace, key: &str, value: Value) -> StoreResult<()> {
        self.data
            .write()
            .entry(ns.clone())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    fn get(&self, ns: &Namespace, key: &str) -> StoreResult<Option<Value>> {
        Ok(self.data.read().get(ns).and_then(|map| map.get(key).cloned()))
    }

    fn unset(&self, ns: &Namespace, key: &str) -> StoreResult<bool> {
        Ok(self
            .data
            .write()
            .get_mut(ns)
            .is_some_and(|map| map.remove(key).is_some()))
    }

    fn keys(&self, ns: &Namespace) -> StoreResult<Vec<String>> {
        Ok(self
            .data
            .read()
            .get(ns)
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn all(&self, ns: &Namespace) -> StoreResult<Map<String, Value>> {
        Ok(self
            .data
            .read()
            .get(ns)
            .map(|map| map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }
}
