//! Configuration module for the Lyre runtime.
//!
//! Layered loading with figment, the schema of `lyre.toml` / `lyre.yaml`
//! and the checks applied before a runtime starts.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    InstanceConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, LyreConfig, NetworkConfig,
    RuntimeConfig, ScriptsConfig, SpanEventConfig, StoreKind, WebConfig,
};
pub use validation::validate_config;
