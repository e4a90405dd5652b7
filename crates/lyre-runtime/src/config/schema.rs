//! Configuration schema definitions.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::Duration;

use lyre_core::{BackendKind, HttpClientOptions};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LyreConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub runtime: RuntimeConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    /// The script websocket endpoint.
    #[serde(default)]
    pub web: WebConfig,

    /// Bot instances to start.
    #[serde(default)]
    pub instances: Vec<InstanceConfig>,

    #[serde(default)]
    pub scripts: ScriptsConfig,
}

impl LyreConfig {
    /// Returns the configuration of instance `id`.
    pub fn instance(&self, id: &str) -> Option<&InstanceConfig> {
        self.instances.iter().find(|i| i.id == id)
    }
}

// =============================================================================
// Logging
// =============================================================================

/// Log level names accepted in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output format of log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    #[cfg(feature = "json-log")]
    Json,
}

/// Where log lines go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    /// The file named by `logging.file_path`.
    File,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    #[serde(default)]
    pub file_path: Option<PathBuf>,

    /// Per-target levels, e.g. `lyre_transport = "debug"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,

    /// Level of `engine.log` output on the 0 to 11 scale scripts use.
    #[serde(default)]
    pub script_level: Option<u8>,

    #[serde(default)]
    pub span_events: SpanEventConfig,

    #[serde(default)]
    pub thread_ids: bool,

    /// Include file names and line numbers.
    #[serde(default)]
    pub file_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            format: LogFormat::default(),
            output: LogOutput::default(),
            file_path: None,
            filters: HashMap::new(),
            script_level: None,
            span_events: SpanEventConfig::default(),
            thread_ids: false,
            file_location: false,
        }
    }
}

// =============================================================================
// Runtime
// =============================================================================

/// Backend used for script storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Memory,
    /// JSON files under `runtime.data_dir`.
    File,
}

/// Runtime-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default)]
    pub store: StoreKind,

    /// How long `unload` handlers may run before the scheduler is cancelled.
    #[serde(default = "default_unload_timeout_ms")]
    pub unload_timeout_ms: u64,
}

impl RuntimeConfig {
    pub fn unload_timeout(&self) -> Duration {
        Duration::from_millis(self.unload_timeout_ms)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            store: StoreKind::default(),
            unload_timeout_ms: default_unload_timeout_ms(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_unload_timeout_ms() -> u64 {
    5000
}

// =============================================================================
// Network
// =============================================================================

/// Settings of the outbound HTTP bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Timeout for requests that do not set their own.
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,

    /// Overrides the `lyre/<version>` user agent.
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl NetworkConfig {
    pub fn http_options(&self) -> HttpClientOptions {
        let defaults = HttpClientOptions::default();
        HttpClientOptions {
            default_timeout: Duration::from_millis(self.http_timeout_ms),
            user_agent: self.user_agent.clone().unwrap_or(defaults.user_agent),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            http_timeout_ms: default_http_timeout_ms(),
            user_agent: None,
        }
    }
}

fn default_http_timeout_ms() -> u64 {
    30000
}

// =============================================================================
// Web
// =============================================================================

/// The websocket server scripts with the `ws` module talk through.
///
/// Clients connect to `ws://<ws_listen><ws_path>/<instance id>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// Listen address; the server is off when unset.
    #[serde(default)]
    pub ws_listen: Option<String>,

    #[serde(default = "default_ws_path")]
    pub ws_path: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            ws_listen: None,
            ws_path: default_ws_path(),
        }
    }
}

fn default_ws_path() -> String {
    "/ws".to_string()
}

// =============================================================================
// Instances
// =============================================================================

/// One bot instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceConfig {
    pub id: String,

    #[serde(default)]
    pub backend: BackendKind,

    /// Nickname applied to the host when the instance starts.
    #[serde(default)]
    pub nick: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Scripts to load, in load order. All known scripts when unset.
    #[serde(default)]
    pub scripts: Option<Vec<String>>,

    /// Instance log level (0 to 11) handed to the host.
    #[serde(default)]
    pub log_level: Option<u8>,
}

impl InstanceConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            backend: BackendKind::default(),
            nick: None,
            enabled: true,
            scripts: None,
            log_level: None,
        }
    }

    pub fn backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn scripts<I, S>(mut self, scripts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scripts = Some(scripts.into_iter().map(Into::into).collect());
        self
    }

    /// Whether `script` may load on this instance.
    pub fn allows(&self, script: &str) -> bool {
        self.scripts
            .as_ref()
            .is_none_or(|list| list.iter().any(|s| s == script))
    }
}

fn default_true() -> bool {
    true
}

// =============================================================================
// Scripts
// =============================================================================

/// Per-script privileges and settings, keyed by script name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptsConfig {
    /// Restricted modules granted to each script, e.g. `myscript = ["net", "db"]`.
    #[serde(default)]
    pub privileges: BTreeMap<String, Vec<String>>,

    /// Settings objects handed to each script.
    #[serde(default)]
    pub settings: BTreeMap<String, Value>,
}

impl ScriptsConfig {
    pub fn grant(mut self, script: impl Into<String>, modules: &[&str]) -> Self {
        self.privileges.insert(
            script.into(),
            modules.iter().map(|m| m.to_string()).collect(),
        );
        self
    }

    pub fn settings_for(&self, script: &str) -> Option<&Value> {
        self.settings.get(script)
    }
}
