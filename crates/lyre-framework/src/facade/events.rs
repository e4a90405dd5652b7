use std::sync::Arc;

use lyre_core::{BroadcastHub, DispatchReport, Envelope, Event, EventBus, EventHandler};
use serde_json::Value;
use tracing::trace;

use crate::context::ScriptContext;

/// Event registration and emission for one script.
///
/// Handlers are tagged with the owning script so broadcasts from other
/// instances reach only the same script there.
#[derive(Clone)]
pub struct Events {
    script: Arc<str>,
    instance: Arc<str>,
    bus: Arc<EventBus>,
    hub: BroadcastHub,
}

impl Events {
    pub(crate) fn new(ctx: &ScriptContext) -> Self {
        let services = ctx.services();
        Self {
            script: Arc::from(ctx.name()),
            instance: Arc::clone(&services.instance_id),
            bus: Arc::clone(&services.bus),
            hub: services.hub.clone(),
        }
    }

    /// Registers `handler` for `name`. Registering twice runs it twice.
    pub fn on<H: EventHandler>(&self, name: impl Into<String>, handler: H) {
        self.bus.on(&self.script, name, handler);
    }

    /// Removes this script's handlers for `name`.
    pub fn off(&self, name: &str) -> usize {
        self.bus.off(&self.script, name)
    }

    pub fn handler_count(&self, name: &str) -> usize {
        self.bus.handler_count(name)
    }

    /// Dispatches an event to the handlers on this instance.
    ///
    /// A built-in name with a payload of the right shape is decoded into the
    /// matching variant; anything else becomes a custom event.
    pub async fn emit(&self, name: &str, data: Value) -> DispatchReport {
        self.emit_event(Event::from_parts(name, data)).await
    }

    pub async fn emit_event(&self, event: Event) -> DispatchReport {
        self.bus.emit(event).await
    }

    /// Emits locally, then forwards the event to this script on every other
    /// instance.
    ///
    /// Returns the local dispatch report.
    pub async fn broadcast(&self, name: &str, data: Value) -> DispatchReport {
        let event = Arc::new(Event::from_parts(name, data));
        let report = self.bus.dispatch(Arc::clone(&event), None).await;
        let receivers = self.hub.publish(Envelope {
            origin: Arc::clone(&self.instance),
            script: Arc::clone(&self.script),
            event,
        });
        trace!(script = %self.script, event_name = name, receivers, "Broadcast sent");
        report
    }
}
