//! Values scripts publish for each other.
//!
//! Each instance keeps its own registry: a script's export on one instance is
//! invisible on the others, matching the fact that each instance runs its own
//! copy of the script.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

type Exported = Arc<dyn Any + Send + Sync>;

/// Exports of the scripts on one instance.
#[derive(Default)]
pub struct ExportRegistry {
    entries: RwLock<HashMap<String, Exported>>,
}

impl ExportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes `value` for `script`, replacing any earlier export.
    pub fn export<T: Any + Send + Sync>(&self, script: &str, value: T) {
        debug!(script, type_name = std::any::type_name::<T>(), "Script exported value");
        self.entries
            .write()
            .insert(script.to_string(), Arc::new(value));
    }

    /// Returns the export of `script` if it has type `T`.
    pub fn get<T: Any + Send + Sync>(&self, script: &str) -> Option<Arc<T>> {
        let exported = self.entries.read().get(script).cloned()?;
        exported.downcast::<T>().ok()
    }

    /// Removes the export of `script`.
    pub fn remove(&self, script: &str) -> bool {
        self.entries.write().remove(script).is_some()
    }

    /// Scripts that currently export something.
    pub fn scripts(&self) -> Vec<String> {
        let mut names: Vec<_> = self.entries.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for ExportRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportRegistry")
            .field("scripts", &self.scripts())
            .finish()
    }
}
