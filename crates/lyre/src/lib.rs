//! # Lyre
//!
//! A scripting host for chat and music bots.
//!
//! ## Overview
//!
//! Lyre runs scripts against one or more bot instances. Each script declares
//! a manifest, registers event handlers and talks to the bot through
//! capability modules: the chat backend, media, audio, storage, HTTP and the
//! privileged `net`, `db` and `ws` bridges.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────┐  raise   ┌──────────────────────────────┐     ┌──────────────┐
//! │  Host   │─────────▶│ Instance "main"  (scheduler) │────▶│ script "a"   │
//! │ (TS3 /  │          │   event bus, store, exports  │────▶│ script "b"   │
//! │ Discord)│          └──────────────────────────────┘     └──────────────┘
//! └─────────┘                     ▲ broadcast hub ▼
//!                      ┌──────────────────────────────┐
//!                      │ Instance "second" ...        │
//!                      └──────────────────────────────┘
//! ```
//!
//! - **Runtime**: loads configuration, starts instances and bridges
//! - **Instance**: a serial scheduler that runs every handler of one bot
//! - **Scripts**: a manifest plus an async main registering handlers
//! - **Bridges**: HTTP, sockets, databases and the websocket endpoint
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use lyre::prelude::*;
//!
//! fn manifest() -> Manifest {
//!     Manifest::new("Greeter", "1.0.0").description("Greets users")
//! }
//!
//! async fn main(ctx: ScriptContext) -> Result<(), BoxError> {
//!     let backend = ctx.backend();
//!     ctx.events().on("chat", move |event: Arc<Event>| {
//!         let backend = backend.clone();
//!         async move {
//!             if let Some(msg) = event.message() {
//!                 backend.chat(&format!("Hello, {}!", msg.client.name));
//!             }
//!         }
//!     });
//!     Ok(())
//! }
//!
//! pub static GREETER: ScriptDescriptor = define_script! {
//!     name: "greeter",
//!     manifest: manifest,
//!     main: main,
//! };
//!
//! #[tokio::main]
//! async fn run() -> anyhow::Result<()> {
//!     let runtime = LyreRuntime::builder().build()?;
//!     runtime.register_script(&GREETER);
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` (default), `yaml-config`: configuration file formats
//! - `json-log`: JSON log output
//! - `http-client`, `net`, `ws-server`, `db`: individual bridges
//! - `full-transport` (default): every bridge

pub use lyre_core as core;
pub use lyre_framework as framework;
pub use lyre_runtime as runtime;
pub use lyre_transport as transport;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use lyre::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use lyre_runtime::{LyreConfig, LyreRuntime, RuntimeError};

    // Script model and facades
    pub use lyre_framework::prelude::*;
    pub use lyre_framework::{Backend, Engine, Events, Media, OfflineHost};

    // Host integration
    pub use lyre_core::{EngineHost, HostBundle};
}
