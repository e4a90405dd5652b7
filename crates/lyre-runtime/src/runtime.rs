//! Main runtime orchestration.
//!
//! The runtime owns everything instances share: the broadcast hub, the
//! script store, the bridge capabilities and the websocket server. It starts
//! one [`Instance`] per configured bot instance and loads the known scripts
//! onto it.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use lyre_runtime::LyreRuntime;
//!
//! let runtime = LyreRuntime::builder()
//!     .config_file("config/lyre.toml")
//!     .build()?;
//! runtime.register_script(&GREETER);
//! runtime.attach_host("main", HostBundle::from_shared(my_host));
//! runtime.run().await?;
//! ```

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use futures::future::join_all;
use lyre_core::{
    BoxedStoreBackend, BroadcastHub, CapabilityContext, Event, EventBus, HostBundle,
    JsonFileStore, MemoryStore, Scheduler, WsEventSink, WsFailure, WsMessage, WsServerEvent,
    WsServerHandle,
};
use lyre_framework::{
    ExportRegistry, InstanceServices, Module, OfflineHost, ScriptDescriptor, registered_scripts,
};
use parking_lot::{Mutex, RwLock};
use semver::Version;
use serde_json::Value;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigLoader, ConfigResult, InstanceConfig, LyreConfig, StoreKind};
use crate::error::{RuntimeError, RuntimeResult};
use crate::instance::{Instance, LoadSummary, ScriptPlan};
use crate::logging;
use crate::registry::{InstanceRegistry, RegistryStats};

/// The Lyre runtime.
///
/// ```rust,ignore
/// let runtime = LyreRuntime::new();
/// runtime.register_script(&GREETER);
/// runtime.run().await?;
/// ```
pub struct LyreRuntime {
    config: LyreConfig,
    capabilities: CapabilityContext,
    engine: Version,
    /// Scripts handed over with [`register_script`](Self::register_script).
    scripts: RwLock<Vec<&'static ScriptDescriptor>>,
    /// Hosts waiting for their instance to start.
    hosts: RwLock<HashMap<String, HostBundle>>,
    registry: Arc<InstanceRegistry>,
    hub: BroadcastHub,
    store: Mutex<Option<BoxedStoreBackend>>,
    ws_server: Mutex<Option<WsServerHandle>>,
    running: tokio::sync::RwLock<bool>,
}

impl LyreRuntime {
    /// Creates a runtime from `lyre.toml` in the current directory, or from
    /// defaults when loading fails.
    pub fn new() -> Self {
        let config = ConfigLoader::new()
            .with_current_dir()
            .load()
            .unwrap_or_else(|e| {
                eprintln!("Warning: Failed to load config ({e}), using defaults");
                LyreConfig::default()
            });

        Self::from_config(&config)
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from configuration.
    ///
    /// Initializes logging and collects every linked bridge capability.
    pub fn from_config(config: &LyreConfig) -> Self {
        logging::init_from_config(&config.logging);

        let capabilities = CapabilityContext::collect_all();
        info!(
            log_level = %config.logging.level,
            instances = config.instances.len(),
            capabilities = ?capabilities.available(),
            "Runtime initialized from configuration"
        );

        Self {
            config: config.clone(),
            capabilities,
            engine: engine_version(),
            scripts: RwLock::new(Vec::new()),
            hosts: RwLock::new(HashMap::new()),
            registry: Arc::new(InstanceRegistry::new()),
            hub: BroadcastHub::new(),
            store: Mutex::new(None),
            ws_server: Mutex::new(None),
            running: tokio::sync::RwLock::new(false),
        }
    }

    /// Replaces the collected bridge capabilities.
    pub fn with_capabilities(mut self, capabilities: CapabilityContext) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Sets the version scripts' `engine` requirements are checked against.
    pub fn with_engine_version(mut self, version: Version) -> Self {
        self.engine = version;
        self
    }

    pub fn config(&self) -> &LyreConfig {
        &self.config
    }

    pub fn capabilities(&self) -> CapabilityContext {
        self.capabilities
    }

    pub fn engine_version(&self) -> &Version {
        &self.engine
    }

    /// Adds a script to load on every instance that allows it.
    ///
    /// Scripts registered here load before globally registered ones, in
    /// registration order. A second script with the same name is ignored.
    pub fn register_script(&self, descriptor: &'static ScriptDescriptor) {
        let mut scripts = self.scripts.write();
        if scripts.iter().any(|d| d.name == descriptor.name) {
            warn!(script = descriptor.name, "Script already registered, ignoring");
            return;
        }
        debug!(script = descriptor.name, "Registered script");
        scripts.push(descriptor);
    }

    /// Every known script in load order.
    pub fn scripts(&self) -> Vec<&'static ScriptDescriptor> {
        let mut scripts = self.scripts.read().clone();
        for descriptor in registered_scripts() {
            if !scripts.iter().any(|d| d.name == descriptor.name) {
                scripts.push(descriptor);
            }
        }
        scripts
    }

    /// Sets the host of instance `id`. Must happen before the instance starts.
    ///
    /// Instances without a host run against an [`OfflineHost`].
    pub fn attach_host(&self, id: impl Into<String>, host: HostBundle) {
        self.hosts.write().insert(id.into(), host);
    }

    pub fn instance(&self, id: &str) -> Option<Arc<Instance>> {
        self.registry.get(id)
    }

    pub fn instance_ids(&self) -> Vec<String> {
        self.registry.ids()
    }

    pub fn stats(&self) -> RegistryStats {
        self.registry.stats()
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Address of the websocket server, when it is running.
    pub fn ws_local_addr(&self) -> Option<String> {
        self.ws_server.lock().as_ref().map(|h| h.local_addr.clone())
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Raises `event` on instance `id`.
    ///
    /// This is how hosts deliver built-in events such as `chat` or `track`.
    pub fn raise(&self, id: &str, event: Event) -> RuntimeResult<()> {
        let instance = self
            .registry
            .get(id)
            .ok_or_else(|| RuntimeError::InstanceNotFound(id.to_string()))?;
        if instance.raise(event) {
            Ok(())
        } else {
            Err(RuntimeError::InstanceStopped(id.to_string()))
        }
    }

    /// Decodes a JSON payload for event `name` and raises it on instance `id`.
    pub fn raise_json(&self, id: &str, name: &str, data: Value) -> RuntimeResult<()> {
        let event = Event::decode(name, data).map_err(|e| RuntimeError::InvalidEvent {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        self.raise(id, event)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Starts the websocket server and every enabled instance.
    pub async fn start(&self) -> RuntimeResult<()> {
        let mut running = self.running.write().await;
        if *running {
            warn!("Runtime is already running");
            return Ok(());
        }

        info!(engine = %self.engine, "Starting Lyre runtime");
        self.start_ws_server().await?;

        for config in self.config.instances.iter().filter(|i| i.enabled) {
            self.add_instance(config).await?;
        }
        for config in self.config.instances.iter().filter(|i| !i.enabled) {
            debug!(instance = %config.id, "Instance disabled, skipping");
        }

        *running = true;
        info!(stats = %self.registry.stats(), "Runtime started");
        Ok(())
    }

    /// Starts one instance and loads its scripts.
    pub async fn add_instance(&self, config: &InstanceConfig) -> RuntimeResult<LoadSummary> {
        if self.registry.get(&config.id).is_some() {
            return Err(RuntimeError::InstanceExists(config.id.clone()));
        }

        let host = self.hosts.write().remove(&config.id).unwrap_or_else(|| {
            warn!(instance = %config.id, "No host attached, using offline host");
            HostBundle::from_shared(Arc::new(OfflineHost::new()))
        });
        apply_host_settings(config, &host);

        let scheduler = Scheduler::with_token(config.id.as_str(), CancellationToken::new());
        let services = InstanceServices {
            instance_id: Arc::from(config.id.as_str()),
            backend_kind: config.backend,
            host,
            bus: Arc::new(EventBus::new(config.id.as_str())),
            scheduler: scheduler.handle(),
            hub: self.hub.clone(),
            store: self.store()?,
            capabilities: self.capabilities,
            http_options: self.config.network.http_options(),
            exports: Arc::new(ExportRegistry::new()),
            ws: self.ws_server.lock().as_ref().map(WsServerHandle::commander),
        };

        let instance = Instance::spawn(services, scheduler);
        self.registry.register(Arc::clone(&instance))?;
        Ok(instance.load(self.plans_for(config), self.engine.clone()).await)
    }

    /// Raises `unload` on instance `id` and stops it.
    pub async fn remove_instance(&self, id: &str) -> RuntimeResult<()> {
        let instance = self.registry.unregister(id)?;
        instance.stop(self.config.runtime.unload_timeout()).await;
        Ok(())
    }

    /// Stops every instance, then the websocket server.
    pub async fn stop(&self) -> RuntimeResult<()> {
        let mut running = self.running.write().await;
        if !*running {
            warn!("Runtime is not running");
            return Ok(());
        }

        info!("Stopping Lyre runtime");
        let timeout = self.config.runtime.unload_timeout();
        let instances = self.registry.drain();
        join_all(instances.iter().map(|i| i.stop(timeout))).await;

        if let Some(handle) = self.ws_server.lock().take() {
            handle.stop();
        }

        *running = false;
        info!("Runtime stopped");
        Ok(())
    }

    /// Runs until Ctrl+C or SIGTERM.
    pub async fn run(&self) -> RuntimeResult<()> {
        self.start().await?;
        info!("Lyre runtime is now running. Press Ctrl+C to stop.");
        wait_for_shutdown().await;
        self.stop().await
    }

    /// Runs until `shutdown` completes.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        self.start().await?;
        shutdown.await;
        self.stop().await
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn store(&self) -> RuntimeResult<BoxedStoreBackend> {
        let mut store = self.store.lock();
        if let Some(store) = store.as_ref() {
            return Ok(Arc::clone(store));
        }
        let opened = open_store(self.config.runtime.store, &self.config.runtime.data_dir)?;
        *store = Some(Arc::clone(&opened));
        Ok(opened)
    }

    async fn start_ws_server(&self) -> RuntimeResult<()> {
        let Some(addr) = self.config.web.ws_listen.clone() else {
            return Ok(());
        };
        let Some(serve) = self.capabilities.ws_server() else {
            warn!(%addr, "Websocket server configured but no ws-server capability is linked");
            return Ok(());
        };

        let registry = Arc::clone(&self.registry);
        let sink: WsEventSink = Arc::new(move |event| route_ws_event(&registry, event));
        let path = self.config.web.ws_path.clone();
        let handle = serve(addr, path.clone(), sink).await?;

        info!(addr = %handle.local_addr, %path, "Websocket server listening");
        *self.ws_server.lock() = Some(handle);
        Ok(())
    }

    /// Scripts for `config`'s instance, in load order.
    fn plans_for(&self, config: &InstanceConfig) -> Vec<ScriptPlan> {
        let known = self.scripts();
        let selected: Vec<&'static ScriptDescriptor> = match &config.scripts {
            Some(names) => names
                .iter()
                .filter_map(|name| {
                    let found = known.iter().find(|d| d.name == name.as_str()).copied();
                    if found.is_none() {
                        warn!(instance = %config.id, script = %name, "Unknown script in allow-list");
                    }
                    found
                })
                .collect(),
            None => known,
        };

        selected
            .into_iter()
            .map(|descriptor| ScriptPlan {
                descriptor,
                granted: self.granted(descriptor.name),
                settings: self.config.scripts.settings_for(descriptor.name).cloned(),
            })
            .collect()
    }

    fn granted(&self, script: &str) -> BTreeSet<Module> {
        self.config
            .scripts
            .privileges
            .get(script)
            .into_iter()
            .flatten()
            .filter_map(|m| m.parse().ok())
            .collect()
    }
}

impl Default for LyreRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LyreRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LyreRuntime")
            .field("engine", &self.engine)
            .field("capabilities", &self.capabilities.available())
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

fn engine_version() -> Version {
    Version::parse(env!("CARGO_PKG_VERSION")).unwrap_or_else(|_| Version::new(0, 0, 0))
}

fn open_store(kind: StoreKind, data_dir: &Path) -> RuntimeResult<BoxedStoreBackend> {
    Ok(match kind {
        StoreKind::Memory => Arc::new(MemoryStore::new()),
        StoreKind::File => Arc::new(JsonFileStore::open(data_dir)?),
    })
}

fn apply_host_settings(config: &InstanceConfig, host: &HostBundle) {
    if let Some(nick) = &config.nick
        && let Err(e) = host.engine.set_nick(nick)
    {
        warn!(instance = %config.id, %nick, error = %e, "Host rejected configured nick");
    }
    if let Some(level) = config.log_level
        && let Err(e) = host.engine.set_instance_log_level(level)
    {
        warn!(instance = %config.id, level, error = %e, "Host rejected configured log level");
    }
}

/// Splits a websocket server event into its instance and script event.
fn ws_event(event: WsServerEvent) -> (String, Event) {
    match event {
        WsServerEvent::Connect {
            instance,
            connection_id,
        } => (instance, Event::WsConnect(connection_id)),
        WsServerEvent::Close {
            instance,
            connection_id,
        } => (instance, Event::WsClose(connection_id)),
        WsServerEvent::Error {
            instance,
            connection_id,
            error,
        } => (
            instance,
            Event::WsError(WsFailure {
                id: connection_id,
                error,
            }),
        ),
        WsServerEvent::Data {
            instance,
            connection_id,
            message_type,
            data,
        } => (
            instance,
            Event::WsData(WsMessage {
                id: connection_id,
                message_type: message_type.as_u8(),
                data,
            }),
        ),
    }
}

fn route_ws_event(registry: &InstanceRegistry, event: WsServerEvent) {
    let (id, event) = ws_event(event);
    match registry.get(&id) {
        Some(instance) => {
            instance.raise(event);
        }
        None => debug!(instance = %id, event_name = %event.name(), "Websocket event for unknown instance"),
    }
}

/// Waits for Ctrl+C or SIGTERM.
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = wait_for_ctrl_c() => {}
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM, shutting down");
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to register SIGTERM handler");
                wait_for_ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    wait_for_ctrl_c().await;
}

async fn wait_for_ctrl_c() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => error!(error = %e, "Failed to listen for Ctrl+C, shutting down"),
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for creating a [`LyreRuntime`] with custom configuration.
///
/// ```rust,ignore
/// let runtime = LyreRuntime::builder()
///     .config_file("config/lyre.toml")
///     .profile("production")
///     .build()?;
/// ```
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
        }
    }

    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn with_env(mut self) -> Self {
        self.config_loader = self.config_loader.with_env();
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    pub fn merge(mut self, config: LyreConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    pub fn build(self) -> ConfigResult<LyreRuntime> {
        let config = self.config_loader.load()?;
        Ok(LyreRuntime::from_config(&config))
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::LazyLock;
    use std::time::Duration;

    use lyre_core::{Bytes, EngineHost, WsMessageType};
    use lyre_framework::{BoxError, Manifest, ScriptContext};
    use serde_json::json;

    use super::*;
    use crate::config::ScriptsConfig;
    use crate::instance::InstanceStatus;

    static RECORD: LazyLock<Mutex<Vec<String>>> = LazyLock::new(|| Mutex::new(Vec::new()));

    fn recorded(prefix: &str) -> Vec<String> {
        RECORD
            .lock()
            .iter()
            .filter_map(|e| e.strip_prefix(prefix).map(str::to_string))
            .collect()
    }

    async fn wait_for(prefix: &str, len: usize) -> Vec<String> {
        for _ in 0..100 {
            let entries = recorded(prefix);
            if entries.len() >= len {
                return entries;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        recorded(prefix)
    }

    fn echo_manifest() -> Manifest {
        Manifest::new("Echo", "1.0.0").engine(">= 0.1")
    }

    async fn echo_main(ctx: ScriptContext) -> Result<(), BoxError> {
        let instance = ctx.instance_id().to_string();
        let events = ctx.events();

        let relay = events.clone();
        events.on("shout", move |event: Arc<Event>| {
            let relay = relay.clone();
            async move {
                let data = event.data().cloned().unwrap_or_default();
                relay.broadcast("hello", data).await;
            }
        });
        for name in ["hello", "load", "unload", "ws.data"] {
            let instance = instance.clone();
            events.on(name, move |event: Arc<Event>| {
                let entry = format!("{instance}:{} {}", event.name(), event.to_value());
                async move { RECORD.lock().push(entry) }
            });
        }

        let store = ctx.store();
        events.on("load", move |_event: Arc<Event>| {
            let store = store.clone();
            async move {
                store.set_global("started", &true);
            }
        });
        Ok(())
    }

    static ECHO: ScriptDescriptor = lyre_framework::define_script! {
        name: "echo",
        manifest: echo_manifest,
        main: echo_main,
    };

    fn socket_manifest() -> Manifest {
        Manifest::new("Socket", "1.0.0").requires(lyre_framework::Module::Net)
    }

    async fn socket_main(ctx: ScriptContext) -> Result<(), BoxError> {
        match ctx.net() {
            Some(_) => Ok(()),
            None => Err("net unavailable".into()),
        }
    }

    static SOCKET: ScriptDescriptor = lyre_framework::define_script! {
        name: "socket",
        manifest: socket_manifest,
        main: socket_main,
    };

    fn runtime(instances: &[&str], scripts: ScriptsConfig) -> LyreRuntime {
        let config = LyreConfig {
            instances: instances
                .iter()
                .map(|id| InstanceConfig::new(*id).scripts(["echo", "socket"]))
                .collect(),
            scripts,
            ..Default::default()
        };
        let runtime = LyreRuntime::from_config(&config).with_capabilities(CapabilityContext::new());
        runtime.register_script(&ECHO);
        runtime.register_script(&SOCKET);
        runtime
    }

    #[tokio::test]
    async fn test_start_raise_stop() {
        let runtime = runtime(&["rt-a"], ScriptsConfig::default());
        runtime.start().await.unwrap();
        assert!(runtime.is_running().await);

        let instance = runtime.instance("rt-a").unwrap();
        assert_eq!(instance.status(), InstanceStatus::Running);
        assert_eq!(instance.scripts(), vec!["echo"]);
        assert_eq!(recorded("rt-a:"), vec!["load null"]);

        runtime
            .raise("rt-a", Event::custom("hello", json!("there")))
            .unwrap();
        assert_eq!(wait_for("rt-a:", 2).await[1], "hello \"there\"");

        runtime.stop().await.unwrap();
        assert!(!runtime.is_running().await);
        assert_eq!(recorded("rt-a:").last().map(String::as_str), Some("unload null"));
        assert!(runtime.instance("rt-a").is_none());
        assert_eq!(instance.status(), InstanceStatus::Stopped);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_other_instances() {
        let runtime = runtime(&["bc-a", "bc-b"], ScriptsConfig::default());
        runtime.start().await.unwrap();

        runtime
            .raise("bc-a", Event::custom("shout", json!({ "n": 1 })))
            .unwrap();

        let a = wait_for("bc-a:hello", 1).await;
        let b = wait_for("bc-b:hello", 1).await;
        assert_eq!(a, vec![" {\"n\":1}"]);
        assert_eq!(b, vec![" {\"n\":1}"]);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(recorded("bc-a:hello").len(), 1);
        runtime.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_privileges_gate_loading() {
        let denied = runtime(&["pv-a"], ScriptsConfig::default());
        denied.start().await.unwrap();
        assert_eq!(denied.instance("pv-a").unwrap().scripts(), vec!["echo"]);
        denied.stop().await.unwrap();

        let granted = runtime(&["pv-b"], ScriptsConfig::default().grant("socket", &["net"]));
        granted.start().await.unwrap();
        assert_eq!(
            granted.instance("pv-b").unwrap().scripts(),
            vec!["echo", "socket"]
        );
        granted.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_engine_version_is_checked() {
        let runtime = runtime(&["ev-a"], ScriptsConfig::default())
            .with_engine_version(Version::new(0, 0, 1));
        runtime.start().await.unwrap();
        assert!(runtime.instance("ev-a").unwrap().scripts().is_empty());
        runtime.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_raise_errors() {
        let runtime = runtime(&["er-a"], ScriptsConfig::default());
        runtime.start().await.unwrap();

        assert!(matches!(
            runtime.raise("missing", Event::Load),
            Err(RuntimeError::InstanceNotFound(_))
        ));
        assert!(matches!(
            runtime.raise_json("er-a", "chat", json!(42)),
            Err(RuntimeError::InvalidEvent { .. })
        ));
        runtime.raise_json("er-a", "hello", json!([1, 2])).unwrap();
        assert_eq!(wait_for("er-a:hello", 1).await, vec![" [1,2]"]);

        runtime.stop().await.unwrap();
        assert!(matches!(
            runtime.raise("er-a", Event::Load),
            Err(RuntimeError::InstanceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_dynamic_instances() {
        let runtime = runtime(&[], ScriptsConfig::default());
        runtime.start().await.unwrap();

        let config = InstanceConfig::new("dy-a").scripts(["echo", "nonexistent"]);
        let summary = runtime.add_instance(&config).await.unwrap();
        assert_eq!(summary.loaded, vec!["echo"]);
        assert!(matches!(
            runtime.add_instance(&config).await,
            Err(RuntimeError::InstanceExists(_))
        ));
        assert_eq!(runtime.instance_ids(), vec!["dy-a"]);

        runtime.remove_instance("dy-a").await.unwrap();
        assert_eq!(recorded("dy-a:").last().map(String::as_str), Some("unload null"));
        assert_eq!(runtime.stats().total, 0);
        runtime.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_file_store_and_host_settings() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");

        let mut instance = InstanceConfig::new("fs-a").scripts(["echo"]);
        instance.nick = Some("DJ Lyre".into());
        instance.log_level = Some(7);
        let mut config = LyreConfig {
            instances: vec![instance],
            ..Default::default()
        };
        config.runtime.store = StoreKind::File;
        config.runtime.data_dir = data_dir.clone();

        let host = Arc::new(OfflineHost::new());
        let runtime = LyreRuntime::from_config(&config).with_capabilities(CapabilityContext::new());
        runtime.register_script(&ECHO);
        runtime.attach_host("fs-a", HostBundle::from_shared(Arc::clone(&host)));
        runtime.start().await.unwrap();

        assert_eq!(host.nick(), "DJ Lyre");
        assert_eq!(host.instance_log_level(), 7);
        assert!(data_dir.join("global.json").exists());
        runtime.stop().await.unwrap();
    }

    #[test]
    fn test_ws_event_mapping() {
        let (instance, event) = ws_event(WsServerEvent::Data {
            instance: "main".into(),
            connection_id: "ws-1".into(),
            message_type: WsMessageType::Binary,
            data: Bytes::from(vec![1, 2]),
        });
        assert_eq!(instance, "main");
        assert_eq!(
            event,
            Event::WsData(WsMessage {
                id: "ws-1".into(),
                message_type: 2,
                data: Bytes::from(vec![1, 2]),
            })
        );

        let (_, event) = ws_event(WsServerEvent::Error {
            instance: "main".into(),
            connection_id: "ws-2".into(),
            error: "reset".into(),
        });
        assert_eq!(event.name(), "ws.error");
    }

    #[tokio::test]
    async fn test_ws_events_route_to_instance() {
        let runtime = runtime(&["ws-a"], ScriptsConfig::default());
        runtime.start().await.unwrap();

        route_ws_event(
            &runtime.registry,
            WsServerEvent::Data {
                instance: "ws-a".into(),
                connection_id: "ws-7".into(),
                message_type: WsMessageType::Text,
                data: Bytes::from("hi"),
            },
        );
        route_ws_event(
            &runtime.registry,
            WsServerEvent::Connect {
                instance: "nobody".into(),
                connection_id: "ws-8".into(),
            },
        );

        let entries = wait_for("ws-a:ws.data", 1).await;
        assert_eq!(entries.len(), 1);
        assert!(entries[0].contains("ws-7"));
        runtime.stop().await.unwrap();
    }
}
