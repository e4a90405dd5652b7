//! Websocket server capability implementation.
//!
//! One axum server per runtime accepts connections on `<path>/{instance}`.
//! The instance segment decides which instance's `ws.*` events a connection
//! raises and which broadcasts it receives.
//!
//! ```text
//! 0.0.0.0:8087
//! ├── GET /api/v1/ws/instance-a  → connection ws-1 (instance-a)
//! └── GET /api/v1/ws/instance-b  → connection ws-2 (instance-b)
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Router;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use futures::{FutureExt, SinkExt, StreamExt};
use lyre_core::linkme::distributed_slice;
use lyre_core::{
    Bytes, TransportError, TransportResult, WS_SERVE_REGISTRY, WsCommand, WsEventSink,
    WsMessageType, WsServeFn, WsServerEvent, WsServerHandle,
};
use parking_lot::RwLock;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// An outgoing frame for one connection.
enum Outbound {
    Frame(Message),
    Close,
}

struct Connection {
    instance: String,
    tx: mpsc::UnboundedSender<Outbound>,
}

/// Runtime state shared between the axum handler and the command loop.
struct ServerState {
    sink: WsEventSink,
    /// Active connections: connection id → owning instance and send channel.
    connections: RwLock<HashMap<String, Connection>>,
    next_id: AtomicU64,
    shutdown: CancellationToken,
}

impl ServerState {
    fn next_connection_id(&self) -> String {
        format!("ws-{}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn send(&self, connection_id: &str, outbound: Outbound) -> bool {
        match self.connections.read().get(connection_id) {
            Some(connection) => connection.tx.send(outbound).is_ok(),
            None => {
                debug!(connection_id, "Unknown websocket connection");
                false
            }
        }
    }

    fn handle_command(&self, command: WsCommand) {
        match command {
            WsCommand::Write {
                connection_id,
                message_type,
                data,
            } => {
                self.send(&connection_id, Outbound::Frame(frame(message_type, data)));
            }
            WsCommand::Broadcast {
                instance,
                message_type,
                data,
            } => {
                let connections = self.connections.read();
                let mut sent = 0;
                for connection in connections.values().filter(|c| c.instance == instance) {
                    let message = frame(message_type, data.clone());
                    if connection.tx.send(Outbound::Frame(message)).is_ok() {
                        sent += 1;
                    }
                }
                debug!(%instance, sent, "Broadcast websocket message");
            }
            WsCommand::Close { connection_id } => {
                self.send(&connection_id, Outbound::Close);
            }
        }
    }
}

fn frame(message_type: WsMessageType, data: Bytes) -> Message {
    match message_type {
        WsMessageType::Text => Message::Text(data.to_string().into()),
        WsMessageType::Binary => Message::Binary(data.into_vec().into()),
    }
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

/// Starts the websocket server on `addr`.
///
/// Clients connect to `<path>/<instance>`. Commands sent through the
/// returned handle's commander are applied until the handle is dropped.
///
/// This function is registered as the `WsServeFn` capability.
pub async fn ws_serve(
    addr: String,
    path: String,
    sink: WsEventSink,
) -> TransportResult<WsServerHandle> {
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| TransportError::ConnectionFailed {
            target: addr.clone(),
            reason: e.to_string(),
        })?;
    let actual_addr = listener.local_addr()?;

    let state = Arc::new(ServerState {
        sink,
        connections: RwLock::new(HashMap::new()),
        next_id: AtomicU64::new(0),
        shutdown: CancellationToken::new(),
    });
    let route = format!("{}/{{instance}}", normalize_path(&path));
    let router = Router::new()
        .route(&route, get(ws_upgrade))
        .with_state(Arc::clone(&state));

    let (command_tx, mut command_rx) = mpsc::unbounded_channel::<WsCommand>();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let commands_state = Arc::clone(&state);
    tokio::spawn(async move {
        loop {
            tokio::select! {
                command = command_rx.recv() => match command {
                    Some(command) => commands_state.handle_command(command),
                    None => break,
                },
                () = commands_state.shutdown.cancelled() => break,
            }
        }
    });

    info!(addr = %actual_addr, %route, "Websocket server listening");
    tokio::spawn(async move {
        let server = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        );
        tokio::select! {
            result = server => {
                if let Err(e) = result {
                    error!(error = %e, "Websocket server error");
                }
            }
            _ = shutdown_rx => {
                info!(addr = %actual_addr, "Websocket server shutting down");
            }
        }
        state.shutdown.cancel();
    });

    Ok(WsServerHandle::new(
        actual_addr.to_string(),
        command_tx,
        shutdown_tx,
    ))
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(instance): Path<String>,
) -> impl IntoResponse {
    debug!(remote_addr = %addr, %instance, "New websocket connection request");
    ws.on_upgrade(move |socket| handle_socket(state, instance, socket))
}

async fn handle_socket(state: Arc<ServerState>, instance: String, socket: WebSocket) {
    let connection_id = state.next_connection_id();
    let (tx, mut rx) = mpsc::unbounded_channel();
    state.connections.write().insert(
        connection_id.clone(),
        Connection {
            instance: instance.clone(),
            tx,
        },
    );
    info!(%instance, %connection_id, "Websocket connection established");
    (state.sink)(WsServerEvent::Connect {
        instance: instance.clone(),
        connection_id: connection_id.clone(),
    });

    let (mut ws_tx, mut ws_rx) = socket.split();
    loop {
        tokio::select! {
            () = state.shutdown.cancelled() => {
                let _ = ws_tx.close().await;
                break;
            }
            outbound = rx.recv() => match outbound {
                Some(Outbound::Frame(message)) => {
                    if let Err(e) = ws_tx.send(message).await {
                        warn!(%connection_id, error = %e, "Failed to send message");
                        (state.sink)(WsServerEvent::Error {
                            instance: instance.clone(),
                            connection_id: connection_id.clone(),
                            error: e.to_string(),
                        });
                        break;
                    }
                }
                Some(Outbound::Close) | None => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            },
            inbound = ws_rx.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    (state.sink)(WsServerEvent::Data {
                        instance: instance.clone(),
                        connection_id: connection_id.clone(),
                        message_type: WsMessageType::Text,
                        data: Bytes::from(text.as_str()),
                    });
                }
                Some(Ok(Message::Binary(data))) => {
                    (state.sink)(WsServerEvent::Data {
                        instance: instance.clone(),
                        connection_id: connection_id.clone(),
                        message_type: WsMessageType::Binary,
                        data: Bytes::from(&data[..]),
                    });
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                Some(Ok(Message::Close(_))) | None => {
                    debug!(%connection_id, "Websocket connection closed by client");
                    break;
                }
                Some(Err(e)) => {
                    warn!(%connection_id, error = %e, "Websocket error");
                    (state.sink)(WsServerEvent::Error {
                        instance: instance.clone(),
                        connection_id: connection_id.clone(),
                        error: e.to_string(),
                    });
                    break;
                }
            },
        }
    }

    state.connections.write().remove(&connection_id);
    info!(%instance, %connection_id, "Websocket connection closed");
    (state.sink)(WsServerEvent::Close {
        instance,
        connection_id,
    });
}

#[distributed_slice(WS_SERVE_REGISTRY)]
#[linkme(crate = lyre_core::linkme)]
static WS_SERVE: WsServeFn = |addr, path, sink| ws_serve(addr, path, sink).boxed();

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;
    use tokio_tungstenite::connect_async;
    use tokio_tungstenite::tungstenite::Message as ClientMessage;

    use super::*;

    fn sink() -> (WsEventSink, mpsc::UnboundedReceiver<WsServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink: WsEventSink = Arc::new(move |event| {
            let _ = tx.send(event);
        });
        (sink, rx)
    }

    async fn next(events: &mut mpsc::UnboundedReceiver<WsServerEvent>) -> WsServerEvent {
        timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap()
    }

    async fn connected(events: &mut mpsc::UnboundedReceiver<WsServerEvent>) -> String {
        match next(events).await {
            WsServerEvent::Connect { connection_id, .. } => connection_id,
            other => panic!("expected connect, got {other:?}"),
        }
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/api/v1/ws/"), "/api/v1/ws");
        assert_eq!(normalize_path("scripts"), "/scripts");
        assert_eq!(normalize_path("/"), "");
    }

    #[tokio::test]
    async fn test_connection_lifecycle() {
        let (sink, mut events) = sink();
        let handle = ws_serve("127.0.0.1:0".into(), "/scripts/".into(), sink)
            .await
            .unwrap();
        let url = format!("ws://{}/scripts/radio", handle.local_addr);
        let (mut client, _) = connect_async(url.as_str()).await.unwrap();
        let id = connected(&mut events).await;

        client
            .send(ClientMessage::Text("hello".into()))
            .await
            .unwrap();
        assert_eq!(
            next(&mut events).await,
            WsServerEvent::Data {
                instance: "radio".into(),
                connection_id: id.clone(),
                message_type: WsMessageType::Text,
                data: Bytes::from("hello"),
            }
        );

        let commander = handle.commander();
        commander
            .send(WsCommand::Write {
                connection_id: id.clone(),
                message_type: WsMessageType::Binary,
                data: Bytes::from(vec![7, 8]),
            })
            .unwrap();
        let received = timeout(Duration::from_secs(5), client.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(received.into_data().to_vec(), vec![7, 8]);

        commander
            .send(WsCommand::Close {
                connection_id: id.clone(),
            })
            .unwrap();
        assert_eq!(
            next(&mut events).await,
            WsServerEvent::Close {
                instance: "radio".into(),
                connection_id: id,
            }
        );
    }

    #[tokio::test]
    async fn test_broadcast_is_per_instance() {
        let (sink, mut events) = sink();
        let handle = ws_serve("127.0.0.1:0".into(), "ws".into(), sink)
            .await
            .unwrap();
        let (mut first, _) = connect_async(format!("ws://{}/ws/a", handle.local_addr).as_str())
            .await
            .unwrap();
        connected(&mut events).await;
        let (mut second, _) = connect_async(format!("ws://{}/ws/b", handle.local_addr).as_str())
            .await
            .unwrap();
        connected(&mut events).await;

        handle
            .commander()
            .send(WsCommand::Broadcast {
                instance: "b".into(),
                message_type: WsMessageType::Text,
                data: Bytes::from("only b"),
            })
            .unwrap();

        let received = timeout(Duration::from_secs(5), second.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(received.into_text().unwrap().as_str(), "only b");
        assert!(
            timeout(Duration::from_millis(100), first.next())
                .await
                .is_err()
        );
    }
}
