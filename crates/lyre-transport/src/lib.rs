//! # Lyre Transport
//!
//! Bridge capability implementations for the Lyre scripting host.
//!
//! This crate provides the concrete implementations of the capabilities
//! defined in `lyre-core`. Each one registers itself into the matching
//! `linkme` slice, so linking the crate is all a runtime needs to do;
//! [`lyre_core::CapabilityContext::collect_all`] picks them up.
//!
//! ## Features
//!
//! - `http-client`: outbound HTTP requests (reqwest)
//! - `net`: raw TCP, UDP and websocket client connections (tokio, tokio-tungstenite)
//! - `ws-server`: the script-facing websocket server (axum)
//! - `db`: SQLite, MySQL and PostgreSQL connections (sqlx)
//! - `full`: all of the above
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  Script facades     │  (Http, Net, Db, Ws)
//! ├─────────────────────┤
//! │  lyre-core          │  (capability shapes + registries)
//! ├─────────────────────┤
//! │  lyre-transport     │  <- This crate (implementations)
//! ├─────────────────────┤
//! │  Network / drivers  │
//! └─────────────────────┘
//! ```
//!
//! | Capability | Registry | Function |
//! |------------|----------|----------|
//! | HTTP | `HTTP_REQUEST_REGISTRY` | [`http_request`] |
//! | Net | `NET_CONNECT_REGISTRY` | [`net_connect`] |
//! | Database | `DB_CONNECT_REGISTRY` | [`db_connect`] |
//! | Websocket server | `WS_SERVE_REGISTRY` | [`ws_serve`] |

#[cfg(feature = "http-client")]
pub mod http;

#[cfg(feature = "net")]
pub mod net;

#[cfg(feature = "db")]
pub mod db;

#[cfg(feature = "ws-server")]
pub mod ws_server;

#[cfg(feature = "http-client")]
pub use http::http_request;

#[cfg(feature = "net")]
pub use net::net_connect;

#[cfg(feature = "db")]
pub use db::db_connect;

#[cfg(feature = "ws-server")]
pub use ws_server::ws_serve;
