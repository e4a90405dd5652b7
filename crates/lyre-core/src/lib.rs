//! # Lyre Core
//!
//! The non-host-specific heart of the Lyre scripting host.
//!
//! ## Architecture Layers
//!
//! ### Foundation Layer
//!
//! The data flowing through the system:
//! - **Events**: the closed event catalog plus script-defined events ([`Event`])
//! - **Entity records**: clients, channels, tracks, ... ([`ClientInfo`], [`TrackInfo`])
//! - **Binary payloads**: [`Bytes`]
//!
//! ### Framework Layer
//!
//! Dispatch and execution:
//! - **Event bus**: per-instance `on` / `emit` ([`EventBus`])
//! - **Scheduler**: one cooperative job queue per instance ([`Scheduler`])
//! - **Broadcast hub**: cross-instance delivery ([`BroadcastHub`])
//!
//! ### Integration Layer
//!
//! - **Host traits**: what the bot application implements ([`EngineHost`], ...)
//! - **Capabilities**: HTTP, sockets, databases, websocket server ([`CapabilityContext`])
//!
//! Alongside the layers sit the [`store`], [`helpers`] and [`format`] modules.
//!
//! ## Dispatch Flow
//!
//! ```text
//! ┌──────────┐  raise   ┌───────────┐  job   ┌──────────┐
//! │   Host   │─────────▶│ Scheduler │───────▶│ EventBus │──▶ handlers
//! └──────────┘          └───────────┘        └──────────┘
//!                             ▲
//!        BroadcastHub ────────┘ (other instances)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use lyre_core::{Event, EventBus};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let bus = EventBus::new("instance-1");
//! bus.on("greeter", "hello", |event: Arc<Event>| async move {
//!     assert_eq!(event.data(), Some(&json!("world")));
//! });
//!
//! let report = bus.emit(Event::custom("hello", json!("world"))).await;
//! assert_eq!(report.invoked, 1);
//! # });
//! ```

pub mod error;
pub mod format;
pub mod foundation;
pub mod framework;
pub mod helpers;
pub mod integration;
pub mod store;

pub use futures::future::BoxFuture;

#[doc(hidden)]
pub use linkme;

pub use error::{
    CodecError, HostError, HostResult, StoreError, StoreResult, TransportError, TransportResult,
};
pub use format::Format;
pub use foundation::*;
pub use framework::{
    BoxedHandler, BroadcastHub, DispatchReport, Envelope, EventBus,
    EventHandler, HandlerOutput, Scheduler, SchedulerHandle,
};
pub use integration::*;
pub use store::{
    BoxedStoreBackend, JsonFileStore, MemoryStore, Namespace, Scope, Store, StoreBackend,
};

/// Prelude for common imports.
pub mod prelude {
    pub use super::foundation::*;
    pub use super::framework::{DispatchReport, EventBus, Scheduler, SchedulerHandle};
    pub use super::{Format, Store};
}
