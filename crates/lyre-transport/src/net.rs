//! Raw connection capability: TCP, UDP and websocket clients.
//!
//! [`net_connect`] resolves once the connection is up and leaves a pump task
//! behind that moves [`NetCommand`]s onto the wire and incoming data into the
//! link's event sink. Every pump ends with exactly one [`NetEvent::Close`].

use std::net::SocketAddr;

use futures::{FutureExt, SinkExt, StreamExt};
use lyre_core::linkme::distributed_slice;
use lyre_core::{
    Bytes, ConnectParams, NET_CONNECT_REGISTRY, NetCommand, NetConnectFn, NetEvent, NetEventSink,
    NetLink, NetProtocol, TransportError, TransportResult,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, trace, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const READ_BUFFER: usize = 64 * 1024;

fn failed(target: &str, reason: impl ToString) -> TransportError {
    TransportError::ConnectionFailed {
        target: target.to_string(),
        reason: reason.to_string(),
    }
}

/// Opens the connection described by `params` and drives it from `link`.
///
/// This function is registered as the `NetConnectFn` capability.
pub async fn net_connect(params: ConnectParams, link: NetLink) -> TransportResult<()> {
    params.validate()?;
    let target = params.target();
    info!(protocol = ?params.protocol, %target, "Opening connection");

    let NetLink { commands, events } = link;
    let host = params.host.as_deref().unwrap_or_default();
    let port = params.port.unwrap_or_default();
    match params.protocol {
        NetProtocol::Tcp => {
            let stream = TcpStream::connect((host, port))
                .await
                .map_err(|e| failed(&target, e))?;
            tokio::spawn(pump_tcp(stream, commands, events, target));
        }
        NetProtocol::Udp => {
            let socket = connect_udp(host, port, &target).await?;
            tokio::spawn(pump_udp(socket, commands, events, target));
        }
        NetProtocol::Ws => {
            let (stream, _response) = connect_async(target.as_str())
                .await
                .map_err(|e| failed(&target, e))?;
            tokio::spawn(pump_ws(stream, commands, events, target));
        }
    }
    Ok(())
}

async fn connect_udp(host: &str, port: u16, target: &str) -> TransportResult<UdpSocket> {
    let remote = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| failed(target, e))?
        .next()
        .ok_or_else(|| failed(target, "no address found"))?;
    let local: SocketAddr = if remote.is_ipv4() {
        ([0, 0, 0, 0], 0).into()
    } else {
        ([0u16; 8], 0).into()
    };
    let socket = UdpSocket::bind(local).await.map_err(|e| failed(target, e))?;
    socket
        .connect(remote)
        .await
        .map_err(|e| failed(target, e))?;
    Ok(socket)
}

async fn pump_tcp(
    stream: TcpStream,
    mut commands: mpsc::UnboundedReceiver<NetCommand>,
    events: NetEventSink,
    target: String,
) {
    let (mut reader, mut writer) = stream.into_split();
    let mut buf = vec![0u8; READ_BUFFER];
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(NetCommand::Write(data)) => {
                    if let Err(e) = writer.write_all(&data).await {
                        warn!(%target, error = %e, "Write failed");
                        events(NetEvent::Error(e.to_string()));
                        break;
                    }
                }
                Some(NetCommand::Close) | None => break,
            },
            read = reader.read(&mut buf) => match read {
                Ok(0) => {
                    debug!(%target, "Remote closed connection");
                    break;
                }
                Ok(n) => {
                    trace!(%target, len = n, "Received");
                    events(NetEvent::Data(Bytes::from(&buf[..n])));
                }
                Err(e) => {
                    warn!(%target, error = %e, "Read failed");
                    events(NetEvent::Error(e.to_string()));
                    break;
                }
            },
        }
    }
    let _ = writer.shutdown().await;
    info!(%target, "Connection closed");
    events(NetEvent::Close);
}

async fn pump_udp(
    socket: UdpSocket,
    mut commands: mpsc::UnboundedReceiver<NetCommand>,
    events: NetEventSink,
    target: String,
) {
    let mut buf = vec![0u8; READ_BUFFER];
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(NetCommand::Write(data)) => {
                    if let Err(e) = socket.send(&data).await {
                        warn!(%target, error = %e, "Send failed");
                        events(NetEvent::Error(e.to_string()));
                    }
                }
                Some(NetCommand::Close) | None => break,
            },
            received = socket.recv(&mut buf) => match received {
                Ok(n) => {
                    trace!(%target, len = n, "Received datagram");
                    events(NetEvent::Data(Bytes::from(&buf[..n])));
                }
                // ICMP errors surface here; the socket stays usable.
                Err(e) => {
                    debug!(%target, error = %e, "Receive failed");
                    events(NetEvent::Error(e.to_string()));
                }
            },
        }
    }
    info!(%target, "Socket closed");
    events(NetEvent::Close);
}

async fn pump_ws(
    stream: WsStream,
    mut commands: mpsc::UnboundedReceiver<NetCommand>,
    events: NetEventSink,
    target: String,
) {
    let (mut ws_tx, mut ws_rx) = stream.split();
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(NetCommand::Write(data)) => {
                    let message = match String::from_utf8(data) {
                        Ok(text) => Message::Text(text.into()),
                        Err(e) => Message::Binary(e.into_bytes().into()),
                    };
                    if let Err(e) = ws_tx.send(message).await {
                        warn!(%target, error = %e, "Failed to send message");
                        events(NetEvent::Error(e.to_string()));
                        break;
                    }
                }
                Some(NetCommand::Close) | None => {
                    let _ = ws_tx.close().await;
                    break;
                }
            },
            message = ws_rx.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    events(NetEvent::Data(Bytes::from(text.as_bytes())));
                }
                Some(Ok(Message::Binary(data))) => {
                    events(NetEvent::Data(Bytes::from(&data[..])));
                }
                Some(Ok(Message::Ping(data))) => {
                    trace!(%target, "Received ping, sending pong");
                    let _ = ws_tx.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Pong(_) | Message::Frame(_))) => {}
                Some(Ok(Message::Close(_))) | None => {
                    debug!(%target, "Server closed connection");
                    break;
                }
                Some(Err(e)) => {
                    warn!(%target, error = %e, "WebSocket error");
                    events(NetEvent::Error(e.to_string()));
                    break;
                }
            },
        }
    }
    info!(%target, "WebSocket closed");
    events(NetEvent::Close);
}

#[distributed_slice(NET_CONNECT_REGISTRY)]
#[linkme(crate = lyre_core::linkme)]
static NET_CONNECT: NetConnectFn = |params, link| net_connect(params, link).boxed();

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::net::TcpListener;
    use tokio::time::timeout;

    use super::*;

    fn link() -> (
        mpsc::UnboundedSender<NetCommand>,
        NetLink,
        mpsc::UnboundedReceiver<NetEvent>,
    ) {
        let (command_tx, commands) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let events: NetEventSink = Arc::new(move |event| {
            let _ = event_tx.send(event);
        });
        (command_tx, NetLink { commands, events }, event_rx)
    }

    async fn next(events: &mut mpsc::UnboundedReceiver<NetEvent>) -> NetEvent {
        timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_tcp_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 64];
            let n = socket.read(&mut buf).await.unwrap();
            socket.write_all(&buf[..n]).await.unwrap();
        });

        let (commands, link, mut events) = link();
        net_connect(ConnectParams::tcp("127.0.0.1", port), link)
            .await
            .unwrap();

        commands.send(NetCommand::Write(b"ping".to_vec())).unwrap();
        assert_eq!(next(&mut events).await, NetEvent::Data(Bytes::from("ping")));
        // The echo server hangs up after one message.
        assert_eq!(next(&mut events).await, NetEvent::Close);
    }

    #[tokio::test]
    async fn test_udp_round_trip() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = server.local_addr().unwrap().port();
        tokio::spawn(async move {
            let mut buf = [0u8; 64];
            let (n, peer) = server.recv_from(&mut buf).await.unwrap();
            server.send_to(&buf[..n], peer).await.unwrap();
        });

        let (commands, link, mut events) = link();
        net_connect(ConnectParams::udp("127.0.0.1", port), link)
            .await
            .unwrap();

        commands.send(NetCommand::Write(vec![1, 2, 3])).unwrap();
        assert_eq!(next(&mut events).await, NetEvent::Data(Bytes::from(vec![1, 2, 3])));
        commands.send(NetCommand::Close).unwrap();
        assert_eq!(next(&mut events).await, NetEvent::Close);
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let (_commands, link, _events) = link();
        let err = net_connect(ConnectParams::tcp("127.0.0.1", port), link)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::ConnectionFailed { .. }));
    }

    #[tokio::test]
    async fn test_invalid_params() {
        let (_commands, link, _events) = link();
        let err = net_connect(ConnectParams::ws("http://example.com"), link)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::InvalidParams(_)));
    }
}
