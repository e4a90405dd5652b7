//! # Lyre Framework
//!
//! The script-facing layer of the Lyre scripting host.
//!
//! This layer provides:
//! - Manifests and module privileges ([`manifest`])
//! - Script descriptors, the global registry and the loader ([`script`])
//! - The per-script [`ScriptContext`] and its capability facades ([`facade`])
//! - Actionable entity handles such as [`Client`] and [`Channel`] ([`entity`])
//! - Cross-script exports ([`exports`])
//! - An in-memory host for demos and tests ([`offline`])
//!
//! Scripts are written as an async main function that registers handlers:
//!
//! ```rust,ignore
//! async fn main(ctx: ScriptContext) -> Result<(), BoxError> {
//!     let backend = ctx.backend();
//!     ctx.events().on("poke", move |event: Arc<Event>| {
//!         let backend = backend.clone();
//!         async move {
//!             if let Some(msg) = event.message() {
//!                 backend.chat(&format!("{} poked me", msg.client.name));
//!             }
//!         }
//!     });
//!     Ok(())
//! }
//! ```

pub mod context;
pub mod entity;
pub mod error;
pub mod exports;
pub mod facade;
pub mod manifest;
pub mod offline;
pub mod script;

pub use context::{InstanceServices, ScriptContext};
pub use entity::{
    Channel, ChannelGroup, Client, Permission, Playlist, PlaylistTrack, ServerGroup, Track, User,
};
pub use error::{BoxError, ScriptError, ScriptResult};
pub use exports::ExportRegistry;
pub use facade::{
    Audio, Backend, Db, DbConn, Engine, Events, Helpers, Http, MAX_LOG_LEVEL, Media, Net,
    NetClient, Ws,
};
pub use manifest::{Manifest, Module, ScriptVar, VarType};
pub use offline::OfflineHost;
pub use script::{
    LYRE_SCRIPT_API_VERSION, LoadedScript, SCRIPT_REGISTRY, ScriptDescriptor, ScriptMain,
    load_script, registered_scripts,
};

#[doc(hidden)]
pub mod __private {
    pub use futures::future::BoxFuture;
    pub use linkme;
}

/// Common imports for writing scripts.
pub mod prelude {
    pub use std::sync::Arc;

    pub use lyre_core::{
        BackendKind, Bytes, ChannelParams, ConnectParams, DbParams, DbValue, Event,
        HttpRequest, HttpResponse, Row, WriteFormat,
    };
    pub use serde_json::{Value, json};

    pub use crate::context::ScriptContext;
    pub use crate::entity::{Channel, Client, Track};
    pub use crate::error::BoxError;
    pub use crate::manifest::{Manifest, Module, ScriptVar};
    pub use crate::script::ScriptDescriptor;
    pub use crate::{define_script, register_script};
}
