//! Running bot instances.
//!
//! An [`Instance`] owns the scheduler and broadcast forwarder of one bot
//! instance and drives its script lifecycle: load every script in order,
//! raise `load`, forward host events, and on stop raise `unload` before
//! cancelling the scheduler.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use lyre_core::{BackendKind, Event, Scheduler};
use lyre_framework::{InstanceServices, Module, ScriptDescriptor, load_script};
use parking_lot::{Mutex, RwLock};
use semver::Version;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Lifecycle state of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceStatus {
    /// Scripts are being loaded.
    Starting,
    Running,
    /// `unload` has been raised.
    Stopping,
    Stopped,
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Starting => write!(f, "Starting"),
            Self::Running => write!(f, "Running"),
            Self::Stopping => write!(f, "Stopping"),
            Self::Stopped => write!(f, "Stopped"),
        }
    }
}

/// A script to load together with what the configuration says about it.
#[derive(Debug, Clone)]
pub struct ScriptPlan {
    pub descriptor: &'static ScriptDescriptor,
    /// Restricted modules granted to the script.
    pub granted: BTreeSet<Module>,
    pub settings: Option<Value>,
}

impl ScriptPlan {
    pub fn new(descriptor: &'static ScriptDescriptor) -> Self {
        Self {
            descriptor,
            granted: BTreeSet::new(),
            settings: None,
        }
    }
}

/// Outcome of loading an instance's scripts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub loaded: Vec<&'static str>,
    /// Scripts that do not support the instance backend.
    pub skipped: Vec<&'static str>,
    pub failed: Vec<&'static str>,
}

/// One running bot instance.
pub struct Instance {
    services: InstanceServices,
    token: CancellationToken,
    status: RwLock<InstanceStatus>,
    scripts: RwLock<Vec<&'static str>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Instance {
    /// Starts the scheduler of `services` and attaches it to the broadcast hub.
    ///
    /// `scheduler` must be the one `services.scheduler` belongs to.
    pub fn spawn(services: InstanceServices, scheduler: Scheduler) -> Arc<Self> {
        let token = scheduler.cancellation_token();
        let forwarder = services.hub.attach(
            Arc::clone(&services.bus),
            services.scheduler.clone(),
            token.clone(),
        );
        let runner = tokio::spawn(scheduler.run());

        debug!(instance = %services.instance_id, backend = %services.backend_kind, "Instance spawned");
        Arc::new(Self {
            services,
            token,
            status: RwLock::new(InstanceStatus::Starting),
            scripts: RwLock::new(Vec::new()),
            tasks: Mutex::new(vec![runner, forwarder]),
        })
    }

    pub fn id(&self) -> &str {
        &self.services.instance_id
    }

    pub fn backend(&self) -> BackendKind {
        self.services.backend_kind
    }

    pub fn services(&self) -> &InstanceServices {
        &self.services
    }

    pub fn status(&self) -> InstanceStatus {
        *self.status.read()
    }

    pub fn is_running(&self) -> bool {
        self.status() == InstanceStatus::Running
    }

    /// Names of the scripts loaded on this instance, in load order.
    pub fn scripts(&self) -> Vec<&'static str> {
        self.scripts.read().clone()
    }

    fn set_status(&self, status: InstanceStatus) {
        let mut guard = self.status.write();
        let old_status = *guard;
        *guard = status;
        debug!(
            instance = %self.id(),
            old_status = %old_status,
            new_status = %status,
            "Instance status changed"
        );
    }

    /// Loads `plans` in order as one scheduler job, then raises `load`.
    ///
    /// Resolves once the `load` handlers have run.
    pub async fn load(&self, plans: Vec<ScriptPlan>, engine: Version) -> LoadSummary {
        let (tx, rx) = oneshot::channel();
        let services = self.services.clone();

        let accepted = self.services.scheduler.spawn(async move {
            let mut summary = LoadSummary::default();
            for plan in plans {
                let name = plan.descriptor.name;
                let loaded = load_script(
                    plan.descriptor,
                    &services,
                    &plan.granted,
                    plan.settings.as_ref(),
                    &engine,
                )
                .await;
                match loaded {
                    Ok(Some(_)) => summary.loaded.push(name),
                    Ok(None) => summary.skipped.push(name),
                    Err(e) => {
                        error!(instance = %services.instance_id, script = name, error = %e, "Failed to load script");
                        summary.failed.push(name);
                    }
                }
            }
            services.bus.emit(Event::Load).await;
            let _ = tx.send(summary);
        });

        let summary = if accepted {
            rx.await.unwrap_or_else(|_| {
                warn!(instance = %self.id(), "Script loading was aborted");
                LoadSummary::default()
            })
        } else {
            LoadSummary::default()
        };

        self.scripts.write().clone_from(&summary.loaded);
        self.set_status(InstanceStatus::Running);
        info!(
            instance = %self.id(),
            loaded = summary.loaded.len(),
            skipped = summary.skipped.len(),
            failed = summary.failed.len(),
            "Instance started"
        );
        summary
    }

    /// Queues `event` for this instance's handlers.
    ///
    /// Returns `false` once the instance has stopped.
    pub fn raise(&self, event: Event) -> bool {
        trace!(instance = %self.id(), event_name = %event.name(), "Raising event");
        let bus = Arc::clone(&self.services.bus);
        self.services.scheduler.spawn(async move {
            bus.emit(event).await;
        })
    }

    /// Raises `unload`, waits up to `timeout` for its handlers and stops the
    /// scheduler.
    pub async fn stop(&self, timeout: Duration) {
        {
            let status = self.status();
            if matches!(status, InstanceStatus::Stopping | InstanceStatus::Stopped) {
                debug!(instance = %self.id(), %status, "Instance already stopping");
                return;
            }
        }
        self.set_status(InstanceStatus::Stopping);

        let (tx, rx) = oneshot::channel();
        let bus = Arc::clone(&self.services.bus);
        let queued = self.services.scheduler.spawn(async move {
            bus.emit(Event::Unload).await;
            let _ = tx.send(());
        });
        if queued && tokio::time::timeout(timeout, rx).await.is_err() {
            warn!(instance = %self.id(), ?timeout, "Unload handlers did not finish in time");
        }

        self.token.cancel();
        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            let abort = task.abort_handle();
            if tokio::time::timeout(timeout, task).await.is_err() {
                warn!(instance = %self.id(), "Aborting instance task");
                abort.abort();
            }
        }

        self.set_status(InstanceStatus::Stopped);
        info!(instance = %self.id(), "Instance stopped");
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("id", &self.id())
            .field("status", &self.status())
            .field("scripts", &*self.scripts.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::LazyLock;

    use lyre_framework::{BoxError, Manifest, OfflineHost, ScriptContext};
    use serde_json::json;

    use super::*;

    static RECORD: LazyLock<Mutex<Vec<String>>> = LazyLock::new(|| Mutex::new(Vec::new()));

    fn record(entry: String) {
        RECORD.lock().push(entry);
    }

    fn recorded(prefix: &str) -> Vec<String> {
        RECORD
            .lock()
            .iter()
            .filter_map(|e| e.strip_prefix(prefix).map(str::to_string))
            .collect()
    }

    fn first_manifest() -> Manifest {
        Manifest::new("First", "1.0.0")
    }

    async fn first_main(ctx: ScriptContext) -> Result<(), BoxError> {
        let instance = ctx.instance_id().to_string();
        record(format!("{instance}:main first"));
        for name in ["load", "unload", "ping"] {
            let instance = instance.clone();
            ctx.events().on(name, move |event: Arc<Event>| {
                let instance = instance.clone();
                async move { record(format!("{instance}:first {}", event.name())) }
            });
        }
        Ok(())
    }

    static FIRST: ScriptDescriptor = lyre_framework::define_script! {
        name: "first",
        manifest: first_manifest,
        main: first_main,
    };

    fn second_manifest() -> Manifest {
        Manifest::new("Second", "1.0.0")
    }

    async fn second_main(ctx: ScriptContext) -> Result<(), BoxError> {
        record(format!("{}:main second", ctx.instance_id()));
        Ok(())
    }

    static SECOND: ScriptDescriptor = lyre_framework::define_script! {
        name: "second",
        manifest: second_manifest,
        main: second_main,
    };

    fn failing_manifest() -> Manifest {
        Manifest::new("Failing", "1.0.0")
    }

    async fn failing_main(_ctx: ScriptContext) -> Result<(), BoxError> {
        Err("missing api key".into())
    }

    static FAILING: ScriptDescriptor = lyre_framework::define_script! {
        name: "failing",
        manifest: failing_manifest,
        main: failing_main,
    };

    fn discord_manifest() -> Manifest {
        Manifest::new("Discord only", "1.0.0").backends([BackendKind::Discord])
    }

    async fn discord_main(_ctx: ScriptContext) -> Result<(), BoxError> {
        Ok(())
    }

    static DISCORD_ONLY: ScriptDescriptor = lyre_framework::define_script! {
        name: "discord-only",
        manifest: discord_manifest,
        main: discord_main,
    };

    fn spawn(id: &str) -> Arc<Instance> {
        let (services, scheduler) = Arc::new(OfflineHost::new()).services(id, BackendKind::Ts3);
        Instance::spawn(services, scheduler)
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

    #[tokio::test]
    async fn test_lifecycle_order() {
        let instance = spawn("life");
        assert_eq!(instance.status(), InstanceStatus::Starting);

        let plans = [&FIRST, &FAILING, &DISCORD_ONLY, &SECOND]
            .into_iter()
            .map(ScriptPlan::new)
            .collect();
        let summary = instance.load(plans, Version::new(1, 0, 0)).await;

        assert_eq!(summary.loaded, vec!["first", "second"]);
        assert_eq!(summary.skipped, vec!["discord-only"]);
        assert_eq!(summary.failed, vec!["failing"]);
        assert_eq!(instance.scripts(), vec!["first", "second"]);
        assert!(instance.is_running());
        assert_eq!(
            recorded("life:"),
            vec!["main first", "main second", "first load"]
        );

        assert!(instance.raise(Event::custom("ping", json!(1))));
        assert_eq!(wait_for("life:", 4).await[3], "first ping");

        instance.stop(Duration::from_secs(1)).await;
        assert_eq!(instance.status(), InstanceStatus::Stopped);
        assert_eq!(recorded("life:").last().map(String::as_str), Some("first unload"));
        assert!(!instance.raise(Event::custom("ping", json!(2))));
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let instance = spawn("twice");
        instance.load(vec![ScriptPlan::new(&FIRST)], Version::new(1, 0, 0)).await;

        instance.stop(Duration::from_secs(1)).await;
        instance.stop(Duration::from_secs(1)).await;

        let unloads = recorded("twice:")
            .into_iter()
            .filter(|e| e == "first unload")
            .count();
        assert_eq!(unloads, 1);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(InstanceStatus::Running.to_string(), "Running");
        assert_eq!(InstanceStatus::Stopping.to_string(), "Stopping");
    }
}
