//! The per-instance event registry.
//!
//! An [`EventBus`] maps event names to an ordered list of handlers. Every
//! script loaded into an instance registers on the same bus, and each
//! registration remembers the script that made it so that broadcasts can be
//! scoped to one script and a script's handlers can be dropped when it
//! unloads.
//!
//! # Dispatch rules
//!
//! 1. Handlers run in registration order, one after the other.
//! 2. Every handler receives the same `Arc<Event>`.
//! 3. A handler that returns an error or panics is logged and skipped; the
//!    remaining handlers still run.
//! 4. The handler list is snapshotted before the first invocation, so
//!    handlers registered during a dispatch only see later events.
//! 5. Names without handlers are accepted and simply reach nobody.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::RwLock;
use tracing::{Instrument, debug_span, error, trace};

use super::handler::{BoxedHandler, EventHandler, panic_message};
use crate::foundation::event::Event;

/// One `on(name, handler)` call.
#[derive(Clone)]
struct Registration {
    script: Arc<str>,
    handler: BoxedHandler,
}

/// Outcome of a single dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Handlers that were invoked.
    pub invoked: usize,
    /// Handlers that returned an error or panicked.
    pub failed: usize,
}

impl DispatchReport {
    /// Returns `true` when at least one handler was invoked.
    pub fn reached_anyone(&self) -> bool {
        self.invoked > 0
    }
}

/// Ordered, failure-isolated event registry for one instance.
pub struct EventBus {
    instance: Arc<str>,
    handlers: RwLock<HashMap<String, Vec<Registration>>>,
}

impl EventBus {
    /// Creates an empty bus for `instance`.
    pub fn new(instance: impl Into<Arc<str>>) -> Self {
        Self {
            instance: instance.into(),
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the id of the instance this bus belongs to.
    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Registers `handler` for `name` on behalf of `script`.
    ///
    /// Handlers accumulate; registering the same closure twice makes it run
    /// twice.
    pub fn on<H: EventHandler>(&self, script: &str, name: impl Into<String>, handler: H) {
        self.on_boxed(script, name, Arc::new(handler));
    }

    /// Registers an already shared handler.
    pub fn on_boxed(&self, script: &str, name: impl Into<String>, handler: BoxedHandler) {
        let name = name.into();
        trace!(instance = %self.instance, script, event_name = %name, "Registered handler");
        self.handlers
            .write()
            .entry(name)
            .or_default()
            .push(Registration {
                script: Arc::from(script),
                handler,
            });
    }

    /// Removes every handler `script` registered for `name`.
    ///
    /// Returns the number of removed handlers.
    pub fn off(&self, script: &str, name: &str) -> usize {
        let mut handlers = self.handlers.write();
        let Some(list) = handlers.get_mut(name) else {
            return 0;
        };
        let before = list.len();
        list.retain(|reg| &*reg.script != script);
        let removed = before - list.len();
        if list.is_empty() {
            handlers.remove(name);
        }
        removed
    }

    /// Removes every handler registered by `script`.
    pub fn remove_script(&self, script: &str) -> usize {
        let mut handlers = self.handlers.write();
        let mut removed = 0;
        handlers.retain(|_, list| {
            let before = list.len();
            list.retain(|reg| &*reg.script != script);
            removed += before - list.len();
            !list.is_empty()
        });
        removed
    }

    /// Returns how many handlers are registered for `name`.
    pub fn handler_count(&self, name: &str) -> usize {
        self.handlers.read().get(name).map_or(0, Vec::len)
    }

    /// Returns the names that currently have handlers, sorted.
    pub fn event_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Dispatches `event` to every handler registered for its name.
    pub async fn emit(&self, event: Event) -> DispatchReport {
        self.dispatch(Arc::new(event), None).await
    }

    /// Dispatches a shared event.
    ///
    /// With `only_script` set, handlers registered by other scripts are
    /// skipped. This is how broadcasts from a remote instance reach only the
    /// script that sent them.
    pub async fn dispatch(&self, event: Arc<Event>, only_script: Option<&str>) -> DispatchReport {
        let name = event.name().into_owned();
        let snapshot: Vec<Registration> = {
            let handlers = self.handlers.read();
            match handlers.get(&name) {
                Some(list) => list
                    .iter()
                    .filter(|reg| only_script.is_none_or(|s| &*reg.script == s))
                    .cloned()
                    .collect(),
                None => Vec::new(),
            }
        };

        let span = debug_span!("dispatch", instance = %self.instance, event_name = %name);
        invoke_all(snapshot, event).instrument(span).await
    }
}

async fn invoke_all(snapshot: Vec<Registration>, event: Arc<Event>) -> DispatchReport {
    let mut report = DispatchReport::default();

    for (index, reg) in snapshot.into_iter().enumerate() {
        report.invoked += 1;
        let handler = reg.handler;
        let event = Arc::clone(&event);
        let outcome = AssertUnwindSafe(async move { handler.call(event).await })
            .catch_unwind()
            .await;

        match outcome {
            Ok(None) => {}
            Ok(Some(message)) => {
                report.failed += 1;
                error!(script = %reg.script, handler = index, error = %message, "Event handler failed");
            }
            Err(payload) => {
                report.failed += 1;
                error!(
                    script = %reg.script,
                    handler = index,
                    panic = %panic_message(payload.as_ref()),
                    "Event handler panicked"
                );
            }
        }
    }

    report
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("instance", &self.instance)
            .field("events", &self.handlers.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &'static str) -> impl EventHandler {
        let log = Arc::clone(log);
        move |event: Arc<Event>| {
            let log = Arc::clone(&log);
            async move {
                log.lock().push(format!("{tag}:{}", event.to_value()));
            }
        }
    }

    #[tokio::test]
    async fn test_handlers_run_in_registration_order() {
        let bus = EventBus::new("i1");
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.on("s", "ping", recorder(&log, "h1"));
        bus.on("s", "ping", recorder(&log, "h2"));

        let report = bus.emit(Event::custom("ping", json!(7))).await;

        assert_eq!(report, DispatchReport { invoked: 2, failed: 0 });
        assert_eq!(*log.lock(), vec!["h1:7", "h2:7"]);
    }

    #[tokio::test]
    async fn test_emit_only_reaches_matching_name() {
        let bus = EventBus::new("i1");
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.on("s", "a", recorder(&log, "a"));
        bus.on("s", "b", recorder(&log, "b"));

        bus.emit(Event::custom("a", json!(null))).await;

        assert_eq!(*log.lock(), vec!["a:null"]);
    }

    #[tokio::test]
    async fn test_failing_handler_does_not_stop_siblings() {
        let bus = EventBus::new("i1");
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.on("s", "x", |_event: Arc<Event>| async { Err::<(), _>("nope") });
        bus.on("s", "x", |_event: Arc<Event>| async {
            if true {
                panic!("handler exploded");
            }
        });
        bus.on("s", "x", recorder(&log, "last"));

        let report = bus.emit(Event::custom("x", json!(1))).await;

        assert_eq!(report.invoked, 3);
        assert_eq!(report.failed, 2);
        assert_eq!(*log.lock(), vec!["last:1"]);
    }

    #[tokio::test]
    async fn test_unknown_name_is_legal() {
        let bus = EventBus::new("i1");
        let report = bus.emit(Event::custom("nobody-listens", json!({}))).await;
        assert!(!report.reached_anyone());
    }

    #[tokio::test]
    async fn test_same_handler_twice_runs_twice() {
        let bus = EventBus::new("i1");
        let log = Arc::new(Mutex::new(Vec::new()));
        let handler: BoxedHandler = Arc::new(recorder(&log, "dup"));
        bus.on_boxed("s", "e", Arc::clone(&handler));
        bus.on_boxed("s", "e", handler);

        bus.emit(Event::custom("e", json!(0))).await;

        assert_eq!(log.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_registration_during_dispatch_applies_to_next_event() {
        let bus = Arc::new(EventBus::new("i1"));
        let log = Arc::new(Mutex::new(Vec::new()));
        let inner_bus = Arc::clone(&bus);
        let inner_log = Arc::clone(&log);
        bus.on("s", "grow", move |_event: Arc<Event>| {
            let bus = Arc::clone(&inner_bus);
            let log = Arc::clone(&inner_log);
            async move {
                bus.on("s", "grow", recorder(&log, "late"));
            }
        });

        let first = bus.emit(Event::custom("grow", json!(1))).await;
        assert_eq!(first.invoked, 1);
        assert!(log.lock().is_empty());

        let second = bus.emit(Event::custom("grow", json!(2))).await;
        assert_eq!(second.invoked, 2);
        assert_eq!(*log.lock(), vec!["late:2"]);
    }

    #[tokio::test]
    async fn test_scoped_dispatch_and_removal() {
        let bus = EventBus::new("i1");
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.on("alpha", "sync", recorder(&log, "alpha"));
        bus.on("beta", "sync", recorder(&log, "beta"));

        let event = Arc::new(Event::custom("sync", json!("x")));
        bus.dispatch(Arc::clone(&event), Some("beta")).await;
        assert_eq!(*log.lock(), vec!["beta:\"x\""]);

        assert_eq!(bus.remove_script("beta"), 1);
        assert_eq!(bus.handler_count("sync"), 1);
        assert_eq!(bus.off("alpha", "sync"), 1);
        assert!(bus.event_names().is_empty());
    }
}
