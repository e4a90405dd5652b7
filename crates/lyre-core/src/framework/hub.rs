//! Cross-instance broadcast delivery.
//!
//! A [`BroadcastHub`] is shared by every instance of a runtime. Each attached
//! instance owns an unbounded queue; publishing copies the envelope into the
//! queue of every other instance and never waits. A forwarder task per
//! instance turns queued envelopes into jobs on its own scheduler. Delivery is
//! eventual and unordered across instances, and nothing is dropped while the
//! receiving instance runs.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::bus::EventBus;
use super::scheduler::SchedulerHandle;
use crate::foundation::event::Event;

/// A broadcast on its way to other instances.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Instance that published the broadcast.
    pub origin: Arc<str>,
    /// Script that published the broadcast.
    pub script: Arc<str>,
    pub event: Arc<Event>,
}

#[derive(Debug)]
struct Subscriber {
    instance: Arc<str>,
    tx: mpsc::UnboundedSender<Envelope>,
}

/// Fan-out connecting the instances of one runtime.
#[derive(Debug, Clone, Default)]
pub struct BroadcastHub {
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an envelope for every instance except its origin.
    ///
    /// Returns the number of instances it was queued for.
    pub fn publish(&self, envelope: Envelope) -> usize {
        trace!(
            origin = %envelope.origin,
            script = %envelope.script,
            event_name = %envelope.event.name(),
            "Publishing broadcast"
        );
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|s| !s.tx.is_closed());
        subscribers
            .iter()
            .filter(|s| s.instance != envelope.origin)
            .filter(|s| s.tx.send(envelope.clone()).is_ok())
            .count()
    }

    /// Returns the number of attached instances.
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|s| !s.tx.is_closed());
        subscribers.len()
    }

    /// Starts forwarding broadcasts from other instances onto `scheduler`.
    ///
    /// Each envelope is dispatched to the handlers its publishing script
    /// registered on `bus`. The task ends when `token` is cancelled or the
    /// scheduler stops; the instance is detached from the hub then.
    pub fn attach(
        &self,
        bus: Arc<EventBus>,
        scheduler: SchedulerHandle,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(Subscriber {
            instance: Arc::from(bus.instance()),
            tx,
        });

        tokio::spawn(async move {
            loop {
                let envelope = tokio::select! {
                    _ = token.cancelled() => break,
                    received = rx.recv() => match received {
                        Some(envelope) => envelope,
                        None => break,
                    },
                };

                let bus = Arc::clone(&bus);
                let accepted = scheduler.spawn(async move {
                    bus.dispatch(envelope.event, Some(&*envelope.script)).await;
                });
                if !accepted {
                    break;
                }
            }
            debug!(instance = %bus.instance(), "Broadcast forwarder stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::scheduler::Scheduler;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::time::Duration;

    struct Node {
        bus: Arc<EventBus>,
        token: CancellationToken,
    }

    fn node(hub: &BroadcastHub, id: &str, log: &Arc<Mutex<Vec<String>>>, script: &str) -> Node {
        let bus = Arc::new(EventBus::new(id));
        let scheduler = Scheduler::new(id);
        let token = scheduler.cancellation_token();
        let tag = id.to_string();
        let sink = Arc::clone(log);
        bus.on(script, "sync", move |event: Arc<Event>| {
            let sink = Arc::clone(&sink);
            let tag = tag.clone();
            async move { sink.lock().push(format!("{tag}:{}", event.to_value())) }
        });
        hub.attach(Arc::clone(&bus), scheduler.handle(), token.clone());
        tokio::spawn(scheduler.run());
        Node { bus, token }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_remote_delivery_skips_origin() {
        let hub = BroadcastHub::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let a = node(&hub, "a", &log, "s");
        let b = node(&hub, "b", &log, "s");
        assert_eq!(hub.subscriber_count(), 2);

        let queued = hub.publish(Envelope {
            origin: Arc::from("a"),
            script: Arc::from("s"),
            event: Arc::new(Event::custom("sync", json!(1))),
        });
        settle().await;

        assert_eq!(queued, 1);
        assert_eq!(*log.lock(), vec!["b:1"]);
        a.token.cancel();
        b.token.cancel();
        assert_eq!(a.bus.instance(), "a");
    }

    #[tokio::test]
    async fn test_remote_delivery_is_scoped_to_script() {
        let hub = BroadcastHub::default();
        let log = Arc::new(Mutex::new(Vec::new()));
        let _a = node(&hub, "a", &log, "s");
        let _b = node(&hub, "b", &log, "other");

        hub.publish(Envelope {
            origin: Arc::from("a"),
            script: Arc::from("s"),
            event: Arc::new(Event::custom("sync", json!(2))),
        });
        settle().await;

        assert!(log.lock().is_empty());
    }

    #[tokio::test]
    async fn test_burst_is_delivered_in_full() {
        let hub = BroadcastHub::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let b = node(&hub, "b", &log, "s");

        for i in 0..1000 {
            hub.publish(Envelope {
                origin: Arc::from("a"),
                script: Arc::from("s"),
                event: Arc::new(Event::custom("sync", json!(i))),
            });
        }
        for _ in 0..100 {
            if log.lock().len() == 1000 {
                break;
            }
            settle().await;
        }

        let log = log.lock();
        assert_eq!(log.len(), 1000);
        assert_eq!(log[0], "b:0");
        assert_eq!(log[999], "b:999");
        b.token.cancel();
    }

    #[tokio::test]
    async fn test_stopped_instance_is_detached() {
        let hub = BroadcastHub::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let b = node(&hub, "b", &log, "s");
        assert_eq!(hub.subscriber_count(), 1);

        b.token.cancel();
        settle().await;
        assert_eq!(hub.subscriber_count(), 0);
    }
}
