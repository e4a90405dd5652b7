//! The context a script runs in.
//!
//! [`InstanceServices`] bundles everything one instance shares among its
//! scripts. [`ScriptContext`] binds it to a single script and hands out the
//! capability facades. Restricted facades are decided once, when the context
//! is created; a script that did not declare a module never sees it.

use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use lyre_core::{
    BackendKind, BoxedStoreBackend, BroadcastHub, CapabilityContext, EventBus, Format,
    HostBundle, HttpClientOptions, SchedulerHandle, Store, WsCommand,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::exports::ExportRegistry;
use crate::facade::{Audio, Backend, Db, Engine, Events, Helpers, Http, Media, Net, Ws};
use crate::manifest::{Manifest, Module};

/// Per-instance services shared by every script on the instance.
#[derive(Clone)]
pub struct InstanceServices {
    pub instance_id: Arc<str>,
    pub backend_kind: BackendKind,
    pub host: HostBundle,
    pub bus: Arc<EventBus>,
    pub scheduler: SchedulerHandle,
    pub hub: BroadcastHub,
    pub store: BoxedStoreBackend,
    pub capabilities: CapabilityContext,
    pub http_options: HttpClientOptions,
    pub exports: Arc<ExportRegistry>,
    /// Command channel of the websocket server, when one is running.
    pub ws: Option<mpsc::UnboundedSender<WsCommand>>,
}

impl fmt::Debug for InstanceServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceServices")
            .field("instance_id", &self.instance_id)
            .field("backend_kind", &self.backend_kind)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

/// Everything one script on one instance can reach.
///
/// Cloning is cheap; every clone refers to the same script.
#[derive(Clone)]
pub struct ScriptContext {
    script: Arc<str>,
    manifest: Arc<Manifest>,
    settings: Arc<Value>,
    services: InstanceServices,
    modules: Arc<BTreeSet<Module>>,
}

impl ScriptContext {
    /// Creates a context for `script`.
    ///
    /// `modules` are the restricted modules the script both declared and was
    /// granted.
    pub fn new(
        script: impl Into<Arc<str>>,
        manifest: Arc<Manifest>,
        settings: Value,
        services: InstanceServices,
        modules: BTreeSet<Module>,
    ) -> Self {
        Self {
            script: script.into(),
            manifest,
            settings: Arc::new(settings),
            services,
            modules: Arc::new(modules),
        }
    }

    /// Script identifier.
    pub fn name(&self) -> &str {
        &self.script
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn instance_id(&self) -> &str {
        &self.services.instance_id
    }

    pub fn services(&self) -> &InstanceServices {
        &self.services
    }

    /// The script's settings: configured values over manifest defaults.
    pub fn settings(&self) -> &Value {
        &self.settings
    }

    /// Deserializes the settings into `T`.
    pub fn settings_as<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        T::deserialize(self.settings.as_ref())
    }

    /// Whether a restricted module is available to this script.
    pub fn has_module(&self, module: Module) -> bool {
        !module.is_restricted() || self.modules.contains(&module)
    }

    pub fn engine(&self) -> Engine {
        Engine::new(self.clone())
    }

    pub fn store(&self) -> Store {
        Store::new(
            Arc::clone(&self.services.store),
            Arc::clone(&self.script),
            Arc::clone(&self.services.instance_id),
        )
    }

    pub fn backend(&self) -> Backend {
        Backend::new(&self.services)
    }

    pub fn media(&self) -> Media {
        Media::new(&self.services)
    }

    pub fn audio(&self) -> Audio {
        Audio::new(&self.services)
    }

    pub fn format(&self) -> Format {
        Format::new(self.services.backend_kind)
    }

    pub fn helpers(&self) -> Helpers {
        Helpers
    }

    pub fn events(&self) -> Events {
        Events::new(self)
    }

    pub fn http(&self) -> Http {
        Http::new(&self.services)
    }

    /// Raw sockets; `None` unless declared and granted.
    pub fn net(&self) -> Option<Net> {
        self.modules
            .contains(&Module::Net)
            .then(|| Net::new(&self.services))
    }

    /// Databases; `None` unless declared and granted.
    pub fn db(&self) -> Option<Db> {
        self.modules
            .contains(&Module::Db)
            .then(|| Db::new(&self.services))
    }

    /// The instance websocket endpoint; `None` unless declared and granted.
    pub fn ws(&self) -> Option<Ws> {
        self.modules
            .contains(&Module::Ws)
            .then(|| Ws::new(&self.services))
    }

    /// Returns the value another script on this instance exported as `T`.
    ///
    /// Exports are made while scripts run their main functions, so this is
    /// reliable from the `load` event on.
    pub fn import<T: Any + Send + Sync>(&self, script: &str) -> Option<Arc<T>> {
        self.services.exports.get::<T>(script)
    }
}

impl fmt::Debug for ScriptContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptContext")
            .field("script", &self.script)
            .field("instance", &self.services.instance_id)
            .field("modules", &self.modules)
            .finish()
    }
}
