//! Bridge capabilities: outbound HTTP, raw sockets, databases and the
//! websocket server.
//!
//! Each capability is a plain function pointer registered by a transport
//! crate into a `linkme` distributed slice. The core only defines the shapes;
//! [`CapabilityContext::collect_all`] picks up whatever was linked in, and a
//! missing capability surfaces to scripts as a
//! [`TransportError::NotAvailable`] in their callback.
//!
//! Streaming capabilities (net, ws) talk to their owner through channels: the
//! owner sends commands down an unbounded sender and receives events through a
//! sink closure that transports call from their own tasks.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use linkme::distributed_slice;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use crate::error::{TransportError, TransportResult};
use crate::foundation::bytes::Bytes;

// =============================================================================
// HTTP
// =============================================================================

/// An outbound HTTP request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpRequest {
    /// Request method; `GET` when empty.
    pub method: String,
    pub url: String,
    /// Timeout in milliseconds; the configured default applies when unset.
    pub timeout: Option<u64>,
    pub body: Option<Bytes>,
    pub headers: HashMap<String, String>,
}

impl Default for HttpRequest {
    fn default() -> Self {
        Self {
            method: "GET".to_string(),
            url: String::new(),
            timeout: None,
            body: None,
            headers: HashMap::new(),
        }
    }
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn post(url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            method: "POST".to_string(),
            url: url.into(),
            body: Some(body.into()),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, millis: u64) -> Self {
        self.timeout = Some(millis);
        self
    }
}

/// The response to an [`HttpRequest`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpResponse {
    pub data: Bytes,
    pub headers: HashMap<String, String>,
    /// Status line text, e.g. `"200 OK"`.
    pub status: String,
    pub status_code: u16,
}

/// Client-wide HTTP settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpClientOptions {
    pub default_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpClientOptions {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(10),
            user_agent: concat!("lyre/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

// =============================================================================
// Net
// =============================================================================

/// Socket protocol for [`ConnectParams`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetProtocol {
    #[default]
    Tcp,
    Udp,
    Ws,
}

/// Where a raw connection goes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectParams {
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Websocket url; required for [`NetProtocol::Ws`].
    pub url: Option<String>,
    pub protocol: NetProtocol,
}

impl ConnectParams {
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: Some(host.into()),
            port: Some(port),
            ..Default::default()
        }
    }

    pub fn udp(host: impl Into<String>, port: u16) -> Self {
        Self {
            protocol: NetProtocol::Udp,
            ..Self::tcp(host, port)
        }
    }

    pub fn ws(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            protocol: NetProtocol::Ws,
            ..Default::default()
        }
    }

    /// Checks that the fields required by the protocol are present.
    pub fn validate(&self) -> TransportResult<()> {
        match self.protocol {
            NetProtocol::Ws => match self.url.as_deref() {
                Some(url) if url.starts_with("ws://") || url.starts_with("wss://") => Ok(()),
                Some(url) => Err(TransportError::InvalidParams(format!(
                    "'{url}' is not a websocket url"
                ))),
                None => Err(TransportError::InvalidParams("missing url".into())),
            },
            NetProtocol::Tcp | NetProtocol::Udp => match (&self.host, self.port) {
                (Some(host), Some(port)) if !host.is_empty() && port != 0 => Ok(()),
                _ => Err(TransportError::InvalidParams(
                    "host and port are required".into(),
                )),
            },
        }
    }

    /// Human-readable target for logs and errors.
    pub fn target(&self) -> String {
        match self.protocol {
            NetProtocol::Ws => self.url.clone().unwrap_or_default(),
            _ => format!(
                "{}:{}",
                self.host.as_deref().unwrap_or_default(),
                self.port.unwrap_or_default()
            ),
        }
    }
}

/// How the payload of a write is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteFormat {
    #[default]
    Raw,
    Hex,
    Base64,
}

/// A command for an open raw connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetCommand {
    Write(Vec<u8>),
    Close,
}

/// Something that happened on a raw connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetEvent {
    Data(Bytes),
    Close,
    Error(String),
}

/// Receives [`NetEvent`]s from transport tasks.
pub type NetEventSink = Arc<dyn Fn(NetEvent) + Send + Sync>;

/// Both ends a transport needs to drive one raw connection.
pub struct NetLink {
    pub commands: mpsc::UnboundedReceiver<NetCommand>,
    pub events: NetEventSink,
}

impl fmt::Debug for NetLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetLink").finish_non_exhaustive()
    }
}

// =============================================================================
// Database
// =============================================================================

/// Supported database drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbDriver {
    /// In-memory SQLite.
    Sqlite3,
    Mysql,
    Postgres,
}

/// Database connection parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbParams {
    pub driver: DbDriver,
    pub host: String,
    pub port: Option<u16>,
    pub username: String,
    pub password: String,
    pub database: String,
}

impl Default for DbParams {
    fn default() -> Self {
        Self {
            driver: DbDriver::Sqlite3,
            host: String::new(),
            port: None,
            username: String::new(),
            password: String::new(),
            database: String::new(),
        }
    }
}

impl DbParams {
    pub fn sqlite() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> TransportResult<()> {
        match self.driver {
            DbDriver::Sqlite3 => Ok(()),
            DbDriver::Mysql | DbDriver::Postgres if self.host.is_empty() => {
                Err(TransportError::InvalidParams("missing host".into()))
            }
            DbDriver::Mysql | DbDriver::Postgres => Ok(()),
        }
    }
}

/// A bound query parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum DbValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Bytes(Bytes),
}

impl From<i64> for DbValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for DbValue {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<&str> for DbValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for DbValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Bytes> for DbValue {
    fn from(v: Bytes) -> Self {
        Self::Bytes(v)
    }
}

impl<T: Into<DbValue>> From<Option<T>> for DbValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// A result column. Text columns arrive as [`Column::Bytes`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Column {
    Null,
    Integer(i64),
    Real(f64),
    Bytes(Bytes),
}

impl Column {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Real(v) => Some(*v),
            Self::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Bytes(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// One result row, keyed by column name.
pub type Row = BTreeMap<String, Column>;

/// An open database connection.
#[async_trait]
pub trait DbConnection: Send + Sync {
    /// Runs a statement that returns rows.
    async fn query(&self, sql: &str, params: &[DbValue]) -> TransportResult<Vec<Row>>;

    /// Runs a statement and returns the number of affected rows.
    async fn exec(&self, sql: &str, params: &[DbValue]) -> TransportResult<u64>;
}

/// Shared database connection.
pub type BoxedDbConnection = Arc<dyn DbConnection>;

// =============================================================================
// Websocket server
// =============================================================================

/// Frame type of a websocket message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WsMessageType {
    Text = 1,
    Binary = 2,
}

impl WsMessageType {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for WsMessageType {
    type Error = TransportError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Text),
            2 => Ok(Self::Binary),
            other => Err(TransportError::InvalidParams(format!(
                "unknown websocket message type {other}"
            ))),
        }
    }
}

/// A command for the websocket server.
#[derive(Debug, Clone, PartialEq)]
pub enum WsCommand {
    Write {
        connection_id: String,
        message_type: WsMessageType,
        data: Bytes,
    },
    /// Sends to every connection of one instance.
    Broadcast {
        instance: String,
        message_type: WsMessageType,
        data: Bytes,
    },
    Close {
        connection_id: String,
    },
}

/// Something that happened on the websocket server.
///
/// Every connection belongs to the instance named in its request path.
#[derive(Debug, Clone, PartialEq)]
pub enum WsServerEvent {
    Connect {
        instance: String,
        connection_id: String,
    },
    Close {
        instance: String,
        connection_id: String,
    },
    Error {
        instance: String,
        connection_id: String,
        error: String,
    },
    Data {
        instance: String,
        connection_id: String,
        message_type: WsMessageType,
        data: Bytes,
    },
}

impl WsServerEvent {
    /// The instance the connection belongs to.
    pub fn instance(&self) -> &str {
        match self {
            Self::Connect { instance, .. }
            | Self::Close { instance, .. }
            | Self::Error { instance, .. }
            | Self::Data { instance, .. } => instance,
        }
    }
}

/// Receives [`WsServerEvent`]s from the server tasks.
pub type WsEventSink = Arc<dyn Fn(WsServerEvent) + Send + Sync>;

/// Handle to a running websocket server.
///
/// Dropping the handle stops the server.
#[derive(Debug)]
pub struct WsServerHandle {
    /// Address the server is bound to.
    pub local_addr: String,
    commands: mpsc::UnboundedSender<WsCommand>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl WsServerHandle {
    pub fn new(
        local_addr: impl Into<String>,
        commands: mpsc::UnboundedSender<WsCommand>,
        shutdown_tx: oneshot::Sender<()>,
    ) -> Self {
        Self {
            local_addr: local_addr.into(),
            commands,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Returns a sender for server commands.
    pub fn commander(&self) -> mpsc::UnboundedSender<WsCommand> {
        self.commands.clone()
    }

    pub fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for WsServerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

// =============================================================================
// Capability Function Types
// =============================================================================

/// Performs one HTTP request.
pub type HttpRequestFn =
    fn(HttpRequest, HttpClientOptions) -> BoxFuture<'static, TransportResult<HttpResponse>>;

/// Opens a raw connection and drives it from `link` until closed.
///
/// Resolves once the connection is established (or failed); the I/O keeps
/// running on a spawned task afterwards.
pub type NetConnectFn = fn(ConnectParams, NetLink) -> BoxFuture<'static, TransportResult<()>>;

/// Opens a database connection.
pub type DbConnectFn = fn(DbParams) -> BoxFuture<'static, TransportResult<BoxedDbConnection>>;

/// Starts the websocket server.
///
/// Parameters: `(addr, path, sink)`. Clients connect to `<path>/<instance>`.
pub type WsServeFn =
    fn(String, String, WsEventSink) -> BoxFuture<'static, TransportResult<WsServerHandle>>;

// =============================================================================
// Capability Registries (linkme distributed slices)
// =============================================================================

#[distributed_slice]
pub static HTTP_REQUEST_REGISTRY: [HttpRequestFn];

#[distributed_slice]
pub static NET_CONNECT_REGISTRY: [NetConnectFn];

#[distributed_slice]
pub static DB_CONNECT_REGISTRY: [DbConnectFn];

#[distributed_slice]
pub static WS_SERVE_REGISTRY: [WsServeFn];

// =============================================================================
// Capability Context
// =============================================================================

/// The bridge implementations available to a runtime.
#[derive(Copy, Clone, Default)]
pub struct CapabilityContext {
    http: Option<HttpRequestFn>,
    net: Option<NetConnectFn>,
    db: Option<DbConnectFn>,
    ws_server: Option<WsServeFn>,
}

impl CapabilityContext {
    /// Creates a context without any capability.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a context from every registered capability.
    ///
    /// If several providers registered the same capability, a warning is
    /// logged and the first one is used.
    pub fn collect_all() -> Self {
        fn load<T: Copy>(registry: &[T], name: &str) -> Option<T> {
            match registry.len() {
                0 => None,
                1 => Some(registry[0]),
                n => {
                    warn!(
                        count = n,
                        capability = name,
                        "Multiple capability providers registered, using first"
                    );
                    Some(registry[0])
                }
            }
        }

        Self {
            http: load(&HTTP_REQUEST_REGISTRY, "http"),
            net: load(&NET_CONNECT_REGISTRY, "net"),
            db: load(&DB_CONNECT_REGISTRY, "db"),
            ws_server: load(&WS_SERVE_REGISTRY, "ws_server"),
        }
    }

    pub fn with_http(mut self, f: HttpRequestFn) -> Self {
        self.http = Some(f);
        self
    }

    pub fn with_net(mut self, f: NetConnectFn) -> Self {
        self.net = Some(f);
        self
    }

    pub fn with_db(mut self, f: DbConnectFn) -> Self {
        self.db = Some(f);
        self
    }

    pub fn with_ws_server(mut self, f: WsServeFn) -> Self {
        self.ws_server = Some(f);
        self
    }

    pub fn http(&self) -> Option<HttpRequestFn> {
        self.http
    }

    pub fn net(&self) -> Option<NetConnectFn> {
        self.net
    }

    pub fn db(&self) -> Option<DbConnectFn> {
        self.db
    }

    pub fn ws_server(&self) -> Option<WsServeFn> {
        self.ws_server
    }

    /// Names of the capabilities present, for diagnostics.
    pub fn available(&self) -> Vec<&'static str> {
        [
            ("http", self.http.is_some()),
            ("net", self.net.is_some()),
            ("db", self.db.is_some()),
            ("ws_server", self.ws_server.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, present)| present.then_some(name))
        .collect()
    }
}

impl fmt::Debug for CapabilityContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityContext")
            .field("available", &self.available())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_params_validation() {
        assert!(ConnectParams::tcp("localhost", 80).validate().is_ok());
        assert!(ConnectParams::udp("localhost", 0).validate().is_err());
        assert!(ConnectParams::ws("wss://example.com").validate().is_ok());
        assert!(ConnectParams::ws("http://example.com").validate().is_err());
        assert!(
            ConnectParams {
                protocol: NetProtocol::Ws,
                ..Default::default()
            }
            .validate()
            .is_err()
        );
    }

    #[test]
    fn test_ws_message_type() {
        assert_eq!(WsMessageType::try_from(1).unwrap(), WsMessageType::Text);
        assert_eq!(WsMessageType::Binary.as_u8(), 2);
        assert!(WsMessageType::try_from(9).is_err());
    }

    #[test]
    fn test_db_params() {
        assert!(DbParams::sqlite().validate().is_ok());
        let pg = DbParams {
            driver: DbDriver::Postgres,
            ..Default::default()
        };
        assert!(pg.validate().is_err());
        assert_eq!(DbValue::from(None::<i64>), DbValue::Null);
    }

    #[test]
    fn test_context_builder() {
        fn fake_http(
            _: HttpRequest,
            _: HttpClientOptions,
        ) -> BoxFuture<'static, TransportResult<HttpResponse>> {
            Box::pin(async { Ok(HttpResponse::default()) })
        }

        let ctx = CapabilityContext::new().with_http(fake_http);
        assert!(ctx.http().is_some());
        assert!(ctx.db().is_none());
        assert_eq!(ctx.available(), vec!["http"]);
    }
}
