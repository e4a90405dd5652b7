//! Registry of the instances a runtime manages.
//!
//! Lookups are synchronous so that bridge callbacks, which run outside any
//! instance, can route events to an instance by id.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::{RuntimeError, RuntimeResult};
use crate::instance::{Instance, InstanceStatus};

/// Instances by id.
#[derive(Default)]
pub struct InstanceRegistry {
    instances: RwLock<HashMap<String, Arc<Instance>>>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an instance; ids are unique.
    pub fn register(&self, instance: Arc<Instance>) -> RuntimeResult<()> {
        let mut instances = self.instances.write();
        let id = instance.id().to_string();
        if instances.contains_key(&id) {
            return Err(RuntimeError::InstanceExists(id));
        }
        info!(instance = %id, backend = %instance.backend(), "Registered instance");
        instances.insert(id, instance);
        Ok(())
    }

    /// Removes and returns an instance. Stopping it is up to the caller.
    pub fn unregister(&self, id: &str) -> RuntimeResult<Arc<Instance>> {
        let removed = self.instances.write().remove(id);
        match removed {
            Some(instance) => {
                debug!(instance = %id, "Unregistered instance");
                Ok(instance)
            }
            None => Err(RuntimeError::InstanceNotFound(id.to_string())),
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<Instance>> {
        self.instances.read().get(id).cloned()
    }

    /// Returns all instance ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.instances.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn all(&self) -> Vec<Arc<Instance>> {
        self.instances.read().values().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.instances.read().len()
    }

    /// Removes every instance and returns them.
    pub fn drain(&self) -> Vec<Arc<Instance>> {
        self.instances.write().drain().map(|(_, i)| i).collect()
    }

    pub fn stats(&self) -> RegistryStats {
        let instances = self.instances.read();
        let mut stats = RegistryStats {
            total: instances.len(),
            ..Default::default()
        };
        for instance in instances.values() {
            match instance.status() {
                InstanceStatus::Starting => stats.starting += 1,
                InstanceStatus::Running => stats.running += 1,
                InstanceStatus::Stopping | InstanceStatus::Stopped => stats.stopped += 1,
            }
            stats.scripts += instance.scripts().len();
        }
        stats
    }
}

impl std::fmt::Debug for InstanceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceRegistry")
            .field("instances", &self.ids())
            .finish()
    }
}

/// Statistics about the instance registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub total: usize,
    pub starting: usize,
    pub running: usize,
    /// Stopping or stopped.
    pub stopped: usize,
    /// Scripts loaded across all instances.
    pub scripts: usize,
}

impl std::fmt::Display for RegistryStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Instances: {} total ({} starting, {} running, {} stopped), {} scripts loaded",
            self.total, self.starting, self.running, self.stopped, self.scripts
        )
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use lyre_core::BackendKind;
    use lyre_framework::OfflineHost;
    use semver::Version;

    use super::*;

    fn spawn(id: &str) -> Arc<Instance> {
        let (services, scheduler) = Arc::new(OfflineHost::new()).services(id, BackendKind::Discord);
        Instance::spawn(services, scheduler)
    }

    #[tokio::test]
    async fn test_register_and_lookup() {
        let registry = InstanceRegistry::new();
        registry.register(spawn("b")).unwrap();
        registry.register(spawn("a")).unwrap();

        assert!(matches!(
            registry.register(spawn("a")),
            Err(RuntimeError::InstanceExists(id)) if id == "a"
        ));
        assert_eq!(registry.ids(), vec!["a", "b"]);
        assert_eq!(registry.get("b").unwrap().backend(), BackendKind::Discord);
        assert!(registry.get("c").is_none());

        registry.unregister("a").unwrap();
        assert!(matches!(
            registry.unregister("a"),
            Err(RuntimeError::InstanceNotFound(_))
        ));
        assert_eq!(registry.count(), 1);
    }

    #[tokio::test]
    async fn test_stats() {
        let registry = InstanceRegistry::new();
        let running = spawn("running");
        running.load(Vec::new(), Version::new(1, 0, 0)).await;
        let stopped = spawn("stopped");
        stopped.stop(Duration::from_millis(200)).await;

        registry.register(running).unwrap();
        registry.register(stopped).unwrap();
        registry.register(spawn("starting")).unwrap();

        let stats = registry.stats();
        assert_eq!(
            stats,
            RegistryStats {
                total: 3,
                starting: 1,
                running: 1,
                stopped: 1,
                scripts: 0,
            }
        );
        assert_eq!(
            stats.to_string(),
            "Instances: 3 total (1 starting, 1 running, 1 stopped), 0 scripts loaded"
        );
        assert_eq!(registry.drain().len(), 3);
        assert_eq!(registry.count(), 0);
    }
}
