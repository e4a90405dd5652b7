//! Capability facades handed to scripts.
//!
//! Synchronous facades ([`Engine`], [`Backend`], [`Media`], [`Audio`]) wrap
//! the host traits and never fail loudly: operations return `bool` or
//! `Option`. Bridge facades ([`Http`], [`Net`], [`Db`], [`Ws`]) return at
//! once and deliver their outcome through a callback that runs exactly once,
//! as a job on the instance scheduler.

mod audio;
mod backend;
mod db;
mod engine;
mod events;
mod http;
mod media;
mod net;
mod ws;

use std::future::Future;

use lyre_core::{Bytes, CodecError, SchedulerHandle, helpers};

pub use audio::Audio;
pub use backend::Backend;
pub use db::{Db, DbConn};
pub use engine::{Engine, MAX_LOG_LEVEL};
pub use events::Events;
pub use http::Http;
pub use media::Media;
pub use net::{Net, NetClient};
pub use ws::Ws;

/// Posts `callback(arg)` onto the scheduler.
///
/// Returns `false` when the instance has stopped and the callback was dropped.
pub(crate) fn deliver<A, F, Fut>(scheduler: &SchedulerHandle, arg: A, callback: F) -> bool
where
    A: Send + 'static,
    F: FnOnce(A) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    scheduler.spawn(async move { callback(arg).await })
}

/// Script access to [`lyre_core::helpers`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Helpers;

impl Helpers {
    pub fn get_random(&self, max: i64) -> i64 {
        helpers::get_random(max)
    }

    pub fn to_string(&self, bytes: &Bytes) -> String {
        helpers::to_string(bytes)
    }

    pub fn base64_encode(&self, input: impl AsRef<[u8]>) -> String {
        helpers::base64_encode(input)
    }

    pub fn base64_decode(&self, input: &str) -> Result<String, CodecError> {
        helpers::base64_decode(input)
    }

    pub fn hex_encode(&self, input: impl AsRef<[u8]>) -> String {
        helpers::hex_encode(input)
    }

    pub fn hex_decode(&self, input: &str) -> Result<String, CodecError> {
        helpers::hex_decode(input)
    }

    pub fn md5_sum(&self, input: impl AsRef<[u8]>) -> String {
        helpers::md5_sum(input)
    }

    pub fn sha1_sum(&self, input: impl AsRef<[u8]>) -> String {
        helpers::sha1_sum(input)
    }

    pub fn sha256_sum(&self, input: impl AsRef<[u8]>) -> String {
        helpers::sha256_sum(input)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use lyre_core::{
        BackendKind, BoxFuture, BoxedDbConnection, CapabilityContext, ChannelInfo, ChannelParams,
        ClientInfo, Column, ConnectParams, DbConnection, DbParams, DbValue, Event, HttpClientOptions,
        HttpRequest, HttpResponse, NetCommand, NetEvent, NetLink, Row, TransportError,
        TransportResult, WriteFormat, WsCommand, WsMessageType,
    };
    use parking_lot::Mutex;
    use serde_json::{Value, json};
    use tokio::sync::{mpsc, oneshot};
    use tokio::time::timeout;

    use super::{Audio, Backend, Db, Http, MAX_LOG_LEVEL, Net, Ws};
    use crate::context::{InstanceServices, ScriptContext};
    use crate::manifest::Manifest;
    use crate::offline::OfflineHost;

    const WAIT: Duration = Duration::from_secs(2);

    /// Services on a running scheduler.
    fn running(host: OfflineHost, backend: BackendKind) -> InstanceServices {
        let (services, scheduler) = Arc::new(host).services("i1", backend);
        tokio::spawn(scheduler.run());
        services
    }

    fn context(services: InstanceServices, script: &str) -> ScriptContext {
        ScriptContext::new(
            script,
            Arc::new(Manifest::new(script, "1.0.0")),
            Value::Null,
            services,
            BTreeSet::new(),
        )
    }

    fn echo_http(
        request: HttpRequest,
        options: HttpClientOptions,
    ) -> BoxFuture<'static, TransportResult<HttpResponse>> {
        Box::pin(async move {
            Ok(HttpResponse {
                data: request.url.into(),
                headers: [("user-agent".to_string(), options.user_agent)].into(),
                status: "200 OK".to_string(),
                status_code: 200,
            })
        })
    }

    fn echo_net(_params: ConnectParams, link: NetLink) -> BoxFuture<'static, TransportResult<()>> {
        let NetLink {
            mut commands,
            events,
        } = link;
        tokio::spawn(async move {
            while let Some(command) = commands.recv().await {
                match command {
                    NetCommand::Write(bytes) => events(NetEvent::Data(bytes.into())),
                    NetCommand::Close => break,
                }
            }
            events(NetEvent::Close);
        });
        Box::pin(async { Ok(()) })
    }

    fn greeting_net(_params: ConnectParams, link: NetLink) -> BoxFuture<'static, TransportResult<()>> {
        (link.events)(NetEvent::Data(b"hello".to_vec().into()));
        Box::pin(async { Ok(()) })
    }

    #[derive(Default)]
    struct CountingDb {
        executed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DbConnection for CountingDb {
        async fn query(&self, _sql: &str, _params: &[DbValue]) -> TransportResult<Vec<Row>> {
            let count = self.executed.lock().len() as i64;
            Ok(vec![Row::from([("n".to_string(), Column::Integer(count))])])
        }

        async fn exec(&self, sql: &str, _params: &[DbValue]) -> TransportResult<u64> {
            if sql.starts_with("DROP") {
                return Err(TransportError::Database("not allowed".to_string()));
            }
            self.executed.lock().push(sql.to_string());
            Ok(1)
        }
    }

    fn counting_db(_params: DbParams) -> BoxFuture<'static, TransportResult<BoxedDbConnection>> {
        Box::pin(async { Ok(Arc::new(CountingDb::default()) as BoxedDbConnection) })
    }

    #[tokio::test]
    async fn test_http_callback_receives_response() {
        let mut services = running(OfflineHost::new(), BackendKind::Ts3);
        services.capabilities = CapabilityContext::new().with_http(echo_http);
        let queued = services.scheduler.jobs_queued();

        let (tx, rx) = oneshot::channel();
        Http::new(&services).simple_request(HttpRequest::get("http://example.com/a"), |result| async move {
            let _ = tx.send(result);
        });

        let response = timeout(WAIT, rx).await.unwrap().unwrap().unwrap();
        assert_eq!(response.status_code, 200);
        assert_eq!(response.data.as_str(), Some("http://example.com/a"));
        assert!(response.headers["user-agent"].starts_with("lyre/"));
        assert_eq!(services.scheduler.jobs_queued(), queued + 1);
    }

    #[tokio::test]
    async fn test_http_without_transport_reports_error() {
        let services = running(OfflineHost::new(), BackendKind::Ts3);
        let (tx, rx) = oneshot::channel();
        Http::new(&services).simple_request(HttpRequest::get("http://example.com"), |result| async move {
            let _ = tx.send(result);
        });

        let err = timeout(WAIT, rx).await.unwrap().unwrap().unwrap_err();
        assert!(err.contains("'http' not available"));
    }

    #[tokio::test]
    async fn test_net_rejects_invalid_params() {
        let services = running(OfflineHost::new(), BackendKind::Ts3);
        let called = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&called);
        let client = Net::new(&services).connect(ConnectParams::default(), move |_| async move {
            *flag.lock() = true;
        });
        assert!(client.is_none());
        tokio::task::yield_now().await;
        assert!(!*called.lock());
    }

    #[tokio::test]
    async fn test_net_round_trip() {
        let mut services = running(OfflineHost::new(), BackendKind::Ts3);
        services.capabilities = CapabilityContext::new().with_net(echo_net);

        let (connected_tx, connected_rx) = oneshot::channel();
        let client = Net::new(&services)
            .connect(ConnectParams::tcp("localhost", 7000), |error| async move {
                let _ = connected_tx.send(error);
            })
            .unwrap();

        let (data_tx, mut data_rx) = mpsc::unbounded_channel();
        client.on_data(move |bytes: lyre_core::Bytes| {
            let data_tx = data_tx.clone();
            async move {
                let _ = data_tx.send(bytes.into_vec());
            }
        });
        let (close_tx, mut close_rx) = mpsc::unbounded_channel();
        client.on_close(move |()| {
            let close_tx = close_tx.clone();
            async move {
                let _ = close_tx.send(());
            }
        });

        assert_eq!(timeout(WAIT, connected_rx).await.unwrap().unwrap(), None);
        assert!(client.write("6869", WriteFormat::Hex));
        assert!(!client.write("not hex", WriteFormat::Hex));
        assert!(client.write("aGk=", WriteFormat::Base64));
        assert!(client.write("raw", WriteFormat::Raw));

        for expected in [&b"hi"[..], b"hi", b"raw"] {
            let got = timeout(WAIT, data_rx.recv()).await.unwrap().unwrap();
            assert_eq!(got, expected);
        }

        assert!(client.close());
        timeout(WAIT, close_rx.recv()).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_net_listener_added_before_job_runs_sees_event() {
        let (mut services, scheduler) =
            Arc::new(OfflineHost::new()).services("i1", BackendKind::Ts3);
        services.capabilities = CapabilityContext::new().with_net(greeting_net);
        let queued = services.scheduler.jobs_queued();

        let client = Net::new(&services)
            .connect(ConnectParams::tcp("localhost", 7000), |_| async {})
            .unwrap();
        timeout(WAIT, async {
            while services.scheduler.jobs_queued() < queued + 2 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        let (data_tx, mut data_rx) = mpsc::unbounded_channel();
        client.on_data(move |bytes: lyre_core::Bytes| {
            let data_tx = data_tx.clone();
            async move {
                let _ = data_tx.send(bytes.into_vec());
            }
        });
        tokio::spawn(scheduler.run());

        let got = timeout(WAIT, data_rx.recv()).await.unwrap().unwrap();
        assert_eq!(got, b"hello");
    }

    #[tokio::test]
    async fn test_db_statements_run_in_issue_order() {
        let mut services = running(OfflineHost::new(), BackendKind::Ts3);
        services.capabilities = CapabilityContext::new().with_db(counting_db);

        let (connected_tx, connected_rx) = oneshot::channel();
        let conn = Db::new(&services)
            .connect(DbParams::sqlite(), |error| async move {
                let _ = connected_tx.send(error);
            })
            .unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        assert!(conn.exec_silent("INSERT INTO t VALUES (1)", vec![]));
        let exec_tx = tx.clone();
        conn.exec("INSERT INTO t VALUES (?)", vec![DbValue::from(2_i64)], |result| async move {
            let _ = exec_tx.send(format!("exec {result:?}"));
        });
        let fail_tx = tx.clone();
        conn.exec("DROP TABLE t", vec![], |result| async move {
            let _ = fail_tx.send(format!("drop {}", result.is_err()));
        });
        conn.query("SELECT COUNT(*) AS n FROM t", vec![], move |result| async move {
            let n = result.ok().and_then(|rows| rows[0]["n"].as_i64());
            let _ = tx.send(format!("query {n:?}"));
        });

        assert_eq!(timeout(WAIT, connected_rx).await.unwrap().unwrap(), None);
        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(timeout(WAIT, rx.recv()).await.unwrap().unwrap());
        }
        assert_eq!(seen, vec!["exec Ok(1)", "drop true", "query Some(2)"]);
    }

    #[tokio::test]
    async fn test_db_without_driver_fails_every_statement() {
        let services = running(OfflineHost::new(), BackendKind::Ts3);
        let (connected_tx, connected_rx) = oneshot::channel();
        let conn = Db::new(&services)
            .connect(DbParams::sqlite(), |error| async move {
                let _ = connected_tx.send(error);
            })
            .unwrap();
        let (tx, rx) = oneshot::channel();
        conn.query("SELECT 1", vec![], |result| async move {
            let _ = tx.send(result);
        });

        let error = timeout(WAIT, connected_rx).await.unwrap().unwrap().unwrap();
        assert!(error.contains("'db' not available"));
        assert_eq!(timeout(WAIT, rx).await.unwrap().unwrap(), Err(error));
    }

    #[tokio::test]
    async fn test_ws_commands() {
        let mut services = running(OfflineHost::new(), BackendKind::Ts3);
        assert!(!Ws::new(&services).broadcast(1, "nobody listens"));

        let (tx, mut rx) = mpsc::unbounded_channel();
        services.ws = Some(tx);
        let ws = Ws::new(&services);
        assert!(!ws.write("c1", 3, "bad type"));
        assert!(ws.write("c1", 2, vec![1_u8, 2]));
        assert!(ws.broadcast(1, "hello"));

        assert_eq!(
            rx.recv().await,
            Some(WsCommand::Write {
                connection_id: "c1".to_string(),
                message_type: WsMessageType::Binary,
                data: vec![1_u8, 2].into(),
            })
        );
        assert!(matches!(
            rx.recv().await,
            Some(WsCommand::Broadcast { instance, message_type: WsMessageType::Text, .. }) if instance == "i1"
        ));
    }

    #[tokio::test]
    async fn test_broadcast_reaches_same_script_on_other_instances() {
        let first = running(OfflineHost::new(), BackendKind::Ts3);
        let (mut second, scheduler) =
            Arc::new(OfflineHost::new()).services("i2", BackendKind::Discord);
        second.hub = first.hub.clone();
        let forwarder = second.hub.attach(
            Arc::clone(&second.bus),
            second.scheduler.clone(),
            scheduler.cancellation_token(),
        );
        tokio::spawn(scheduler.run());

        let (tx, mut rx) = mpsc::unbounded_channel();
        for (services, script) in [(&first, "radio"), (&second, "radio"), (&second, "other")] {
            let tx = tx.clone();
            let label = format!("{}/{script}", services.instance_id);
            context(services.clone(), script).events().on("tick", move |event: Arc<Event>| {
                let tx = tx.clone();
                let label = label.clone();
                async move {
                    let _ = tx.send((label, event.data().cloned()));
                }
            });
        }

        let report = context(first.clone(), "radio")
            .events()
            .broadcast("tick", json!(7))
            .await;
        assert_eq!(report.invoked, 1);

        let mut seen = Vec::new();
        for _ in 0..2 {
            seen.push(timeout(WAIT, rx.recv()).await.unwrap().unwrap());
        }
        assert_eq!(
            seen,
            vec![
                ("i1/radio".to_string(), Some(json!(7))),
                ("i2/radio".to_string(), Some(json!(7))),
            ]
        );
        assert!(timeout(Duration::from_millis(50), rx.recv()).await.is_err());
        forwarder.abort();
    }

    #[tokio::test]
    async fn test_emit_decodes_builtin_payloads() {
        let services = running(OfflineHost::new(), BackendKind::Ts3);
        let events = context(services, "s").events();
        let (tx, mut rx) = mpsc::unbounded_channel();
        events.on("chat", move |event: Arc<Event>| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(event.message().map(|m| m.text.clone()));
            }
        });

        let payload = json!({
            "text": "!play",
            "client": ClientInfo::new("2", "uid", "alice"),
            "mode": 1,
        });
        assert_eq!(events.emit("chat", payload).await.invoked, 1);
        assert_eq!(rx.recv().await, Some(Some("!play".to_string())));

        assert_eq!(events.emit("chat", json!("not a message")).await.invoked, 1);
        assert_eq!(rx.recv().await, Some(None));
        assert_eq!(events.off("chat"), 1);
        assert_eq!(events.handler_count("chat"), 0);
    }

    #[tokio::test]
    async fn test_emit_passes_payload_unchanged() {
        let services = running(OfflineHost::new(), BackendKind::Ts3);
        let events = context(services, "s").events();
        let (tx, mut rx) = mpsc::unbounded_channel();
        for name in ["connect", "chat"] {
            let tx = tx.clone();
            events.on(name, move |event: Arc<Event>| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send((event.to_value(), event.message().map(|m| m.text.clone())));
                }
            });
        }

        events.emit("connect", json!({"x": 1})).await;
        assert_eq!(rx.recv().await, Some((json!({"x": 1}), None)));

        let chat = json!({"text": "hi", "client": {"id": "1"}, "extra": 42});
        events.emit("chat", chat.clone()).await;
        assert_eq!(rx.recv().await, Some((chat, Some("hi".to_string()))));

        let report = events.broadcast("connect", json!([1, 2])).await;
        assert_eq!(report.invoked, 1);
        assert_eq!(rx.recv().await, Some((json!([1, 2]), None)));
    }

    #[tokio::test]
    async fn test_backend_lookups() {
        let mut bot = ClientInfo::new("1", "uid-bot", "lyre");
        bot.audio_channel = Some("10".to_string());
        let host = OfflineHost::new()
            .with_bot_client(bot)
            .with_client(ClientInfo::new("2", "uid-alice", "Alice"))
            .with_channel(ChannelInfo::new("10", "Lobby"))
            .with_channel(ChannelInfo::new("11", "lobby"))
            .with_channel(ChannelInfo::new("12", "Music Lobby"));
        let services = running(host, BackendKind::Ts3);
        let backend = Backend::new(&services);

        assert_eq!(backend.bot_client_id().as_deref(), Some("1"));
        assert_eq!(backend.current_channel().map(|c| c.id.clone()).as_deref(), Some("10"));
        assert_eq!(backend.channel_by_name("lobby").map(|c| c.id.clone()).as_deref(), Some("11"));
        assert_eq!(backend.channel_by_name("LOBBY").map(|c| c.id.clone()).as_deref(), Some("10"));
        assert_eq!(backend.channels_by_name("lobby").len(), 3);
        assert_eq!(backend.client_by_uid("uid-alice").map(|c| c.name.clone()).as_deref(), Some("Alice"));
        assert!(backend.client_by_name("alice").is_none());

        assert!(backend.create_channel(&ChannelParams::named("Orphan")).is_none());
        let created = backend
            .create_channel(&ChannelParams::named("Child").parent("10"))
            .unwrap();
        assert_eq!(created.parent.as_deref(), Some("10"));
        assert_eq!(backend.channel_count(), 4);
    }

    #[tokio::test]
    async fn test_value_validation() {
        let services = running(OfflineHost::new(), BackendKind::Ts3);
        let audio = Audio::new(&services);
        assert!(audio.set_volume(100));
        assert!(!audio.set_volume(101));
        assert!(!audio.set_volume(-1));
        assert_eq!(audio.volume(), 100);
        assert!(audio.set_audio_return_channel(3));
        assert!(!audio.set_audio_return_channel(4));

        let engine = context(services, "s").engine();
        assert!(engine.set_instance_log_level(MAX_LOG_LEVEL));
        assert!(!engine.set_instance_log_level(MAX_LOG_LEVEL + 1));
        assert_eq!(engine.instance_log_level(), MAX_LOG_LEVEL);
        assert!(!engine.set_nick("  "));
    }
}
