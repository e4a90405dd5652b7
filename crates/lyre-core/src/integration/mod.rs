//! Integration layer - the seams to the outside world.
//!
//! - [`host`]: traits the host application implements
//! - [`capability`]: bridge capabilities provided by transport crates

pub mod capability;
pub mod host;

pub use capability::{
    BoxedDbConnection, CapabilityContext, Column, ConnectParams, DB_CONNECT_REGISTRY,
    DbConnectFn, DbConnection, DbDriver, DbParams, DbValue, HTTP_REQUEST_REGISTRY,
    HttpClientOptions, HttpRequest, HttpRequestFn, HttpResponse, NET_CONNECT_REGISTRY,
    NetCommand, NetConnectFn, NetEvent, NetEventSink, NetLink, NetProtocol, Row,
    WS_SERVE_REGISTRY, WriteFormat, WsCommand, WsEventSink, WsMessageType, WsServeFn,
    WsServerEvent, WsServerHandle,
};
pub use host::{AudioHost, BackendHost, EngineHost, HostBundle, KickScope, MediaHost};
