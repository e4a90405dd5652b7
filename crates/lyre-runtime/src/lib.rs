//! Lyre Runtime - Orchestration layer for the Lyre scripting host.
//!
//! This crate provides:
//! - Instance management (`Instance`, `InstanceRegistry`)
//! - Runtime orchestration (`LyreRuntime`)
//! - Layered configuration (`ConfigLoader`)
//! - Logging configuration
//!
//! # Bridge Capabilities
//!
//! The runtime collects every bridge compiled into `lyre-transport`, chosen
//! with cargo features:
//!
//! - `http-client`: outbound HTTP for the `http` module
//! - `net`: TCP, UDP and websocket clients for the `net` module
//! - `ws-server`: the websocket endpoint of the `ws` module
//! - `db`: SQLite, MySQL and PostgreSQL for the `db` module
//!
//! ```ignore
//! use lyre_runtime::LyreRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = LyreRuntime::builder().config_file("lyre.toml").build()?;
//!     runtime.register_script(&GREETER);
//!
//!     // Run until Ctrl+C
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Delivering Host Events
//!
//! Hosts hand built-in events to an instance with [`LyreRuntime::raise`], or
//! with [`LyreRuntime::raise_json`] when the payload arrives as JSON:
//!
//! ```ignore
//! runtime.raise_json("main", "chat", payload)?;
//! ```

// Linked for its bridge registrations.
extern crate lyre_transport as _;

pub mod config;
pub mod error;
pub mod instance;
pub mod logging;
pub mod registry;
pub mod runtime;

// Re-exports
pub use config::{ConfigError, ConfigLoader, ConfigResult, InstanceConfig, LyreConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use instance::{Instance, InstanceStatus, LoadSummary, ScriptPlan};
pub use logging::{LoggingBuilder, SpanEvents};
pub use registry::{InstanceRegistry, RegistryStats};
pub use runtime::{LyreRuntime, RuntimeBuilder};

// Re-export tracing for use by scripts and hosts
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
///
/// Provides the logging macros plus `instrument` and `Level`.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
