//! Error types for the Lyre framework.

use thiserror::Error;

use crate::manifest::Module;

/// Boxed error returned by a script's main function.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Reasons a script fails to load on an instance.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// The manifest's `engine` requirement excludes the running version.
    #[error("script '{script}' requires engine {required}, running {actual}")]
    EngineMismatch {
        script: String,
        required: String,
        actual: String,
    },

    /// The manifest declares a restricted module the configuration does not grant.
    #[error("script '{script}' requires module '{module}' which is not granted")]
    PrivilegeDenied { script: String, module: Module },

    /// The manifest is malformed.
    #[error("script '{script}' has an invalid manifest: {reason}")]
    InvalidManifest { script: String, reason: String },

    /// The script's main function returned an error.
    #[error("script '{script}' failed during startup: {source}")]
    Main {
        script: String,
        #[source]
        source: BoxError,
    },
}

impl ScriptError {
    /// Name of the script the error belongs to.
    pub fn script(&self) -> &str {
        match self {
            Self::EngineMismatch { script, .. }
            | Self::PrivilegeDenied { script, .. }
            | Self::InvalidManifest { script, .. }
            | Self::Main { script, .. } => script,
        }
    }

    pub(crate) fn invalid(script: &str, reason: impl Into<String>) -> Self {
        Self::InvalidManifest {
            script: script.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for script loading.
pub type ScriptResult<T> = Result<T, ScriptError>;
