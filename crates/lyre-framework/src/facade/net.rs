use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use lyre_core::{
    Bytes, CapabilityContext, ConnectParams, NetCommand, NetEvent, NetEventSink, NetLink,
    SchedulerHandle, TransportError, WriteFormat, helpers,
};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use super::deliver;
use crate::context::InstanceServices;

type Listener<A> = Arc<dyn Fn(A) -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Default)]
struct Listeners {
    data: Vec<Listener<Bytes>>,
    close: Vec<Listener<()>>,
    error: Vec<Listener<String>>,
}

/// Raw TCP, UDP and websocket client connections.
#[derive(Clone)]
pub struct Net {
    capabilities: CapabilityContext,
    scheduler: SchedulerHandle,
}

impl Net {
    pub(crate) fn new(services: &InstanceServices) -> Self {
        Self {
            capabilities: services.capabilities,
            scheduler: services.scheduler.clone(),
        }
    }

    /// Opens a connection and returns its client at once.
    ///
    /// Returns `None` without invoking `callback` when `params` are invalid.
    /// Otherwise `callback` runs exactly once: with `None` once connected, or
    /// with the error text. Writes issued before the connection is up are
    /// buffered.
    pub fn connect<F, Fut>(&self, params: ConnectParams, callback: F) -> Option<NetClient>
    where
        F: FnOnce(Option<String>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if let Err(e) = params.validate() {
            debug!(error = %e, "Rejected connection parameters");
            return None;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let listeners = Arc::new(Mutex::new(Listeners::default()));
        let link = NetLink {
            commands: rx,
            events: event_sink(Arc::clone(&listeners), self.scheduler.clone()),
        };

        let open = self.capabilities.net();
        let scheduler = self.scheduler.clone();
        tokio::spawn(async move {
            let target = params.target();
            let result = match open {
                Some(open) => open(params, link).await,
                None => Err(TransportError::NotAvailable { capability: "net" }),
            };
            let error = result.err().map(|e| {
                debug!(%target, error = %e, "Connection failed");
                e.to_string()
            });
            deliver(&scheduler, error, callback);
        });

        Some(NetClient {
            commands: tx,
            listeners,
        })
    }
}

/// Routes transport events to the registered listeners as scheduler jobs.
///
/// Listeners are read when the job runs, so one registered by an earlier job
/// still sees events raised before it was added.
fn event_sink(listeners: Arc<Mutex<Listeners>>, scheduler: SchedulerHandle) -> NetEventSink {
    Arc::new(move |event: NetEvent| {
        let listeners = Arc::clone(&listeners);
        scheduler.spawn(async move {
            let job = {
                let listeners = listeners.lock();
                match event {
                    NetEvent::Data(data) => run_all(listeners.data.clone(), data),
                    NetEvent::Close => run_all(listeners.close.clone(), ()),
                    NetEvent::Error(error) => run_all(listeners.error.clone(), error),
                }
            };
            job.await;
        });
    })
}

fn run_all<A: Clone + Send + 'static>(handlers: Vec<Listener<A>>, arg: A) -> BoxFuture<'static, ()> {
    Box::pin(async move {
        for handler in handlers {
            handler(arg.clone()).await;
        }
    })
}

fn listener<A, F, Fut>(handler: F) -> Listener<A>
where
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |arg| Box::pin(handler(arg)))
}

/// One raw connection opened by [`Net::connect`].
#[derive(Clone)]
pub struct NetClient {
    commands: mpsc::UnboundedSender<NetCommand>,
    listeners: Arc<Mutex<Listeners>>,
}

impl NetClient {
    /// Queues `data` for sending, decoding it first for
    /// [`WriteFormat::Hex`] and [`WriteFormat::Base64`].
    ///
    /// Returns `false` for undecodable input or a closed connection.
    pub fn write(&self, data: impl AsRef<[u8]>, format: WriteFormat) -> bool {
        let data = data.as_ref();
        let payload = match format {
            WriteFormat::Raw => Ok(data.to_vec()),
            WriteFormat::Hex | WriteFormat::Base64 => {
                let Ok(text) = std::str::from_utf8(data) else {
                    return false;
                };
                let decoded = if format == WriteFormat::Hex {
                    helpers::hex_decode_bytes(text)
                } else {
                    helpers::base64_decode_bytes(text)
                };
                decoded.map(Bytes::into_vec)
            }
        };
        match payload {
            Ok(bytes) => self.commands.send(NetCommand::Write(bytes)).is_ok(),
            Err(e) => {
                debug!(error = %e, "Dropped undecodable write");
                false
            }
        }
    }

    pub fn on_data<F, Fut>(&self, handler: F)
    where
        F: Fn(Bytes) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.listeners.lock().data.push(listener(handler));
    }

    pub fn on_close<F, Fut>(&self, handler: F)
    where
        F: Fn(()) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.listeners.lock().close.push(listener(handler));
    }

    pub fn on_error<F, Fut>(&self, handler: F)
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.listeners.lock().error.push(listener(handler));
    }

    /// Closes the connection; `close` listeners fire once the transport
    /// reports it.
    pub fn close(&self) -> bool {
        self.commands.send(NetCommand::Close).is_ok()
    }
}
