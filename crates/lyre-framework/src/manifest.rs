//! Script manifests.
//!
//! A [`Manifest`] describes a script to the host: what it is, which backends
//! it supports, which restricted modules it needs and which settings the
//! operator can configure.
//!
//! ```rust
//! use lyre_framework::manifest::{Manifest, Module, ScriptVar};
//! use lyre_core::BackendKind;
//!
//! let manifest = Manifest::new("Radio", "1.2.0")
//!     .author("Jane <jane@example.com>")
//!     .backends([BackendKind::Ts3, BackendKind::Discord])
//!     .requires(Module::Net)
//!     .var(ScriptVar::string("station", "Stream url").default_value("http://radio"));
//!
//! assert!(manifest.declares(Module::Net));
//! assert_eq!(manifest.default_settings()["station"], "http://radio");
//! ```

use std::fmt;
use std::str::FromStr;

use lyre_core::BackendKind;
use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ScriptError, ScriptResult};

// =============================================================================
// Modules
// =============================================================================

/// A module a script can list in `required_modules`.
///
/// Only [`Net`](Module::Net), [`Db`](Module::Db) and [`Ws`](Module::Ws) are
/// restricted; the others are accepted for compatibility and always
/// available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Module {
    Net,
    Db,
    Ws,
    Http,
    Fs,
    Graphics,
    Crypto,
}

impl Module {
    pub const ALL: [Module; 7] = [
        Self::Net,
        Self::Db,
        Self::Ws,
        Self::Http,
        Self::Fs,
        Self::Graphics,
        Self::Crypto,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Net => "net",
            Self::Db => "db",
            Self::Ws => "ws",
            Self::Http => "http",
            Self::Fs => "fs",
            Self::Graphics => "graphics",
            Self::Crypto => "crypto",
        }
    }

    /// Whether access must be granted by configuration.
    pub fn is_restricted(&self) -> bool {
        matches!(self, Self::Net | Self::Db | Self::Ws)
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Module {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown module '{s}'"))
    }
}

// =============================================================================
// Script variables
// =============================================================================

/// Input widget of a [`ScriptVar`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VarType {
    #[default]
    String,
    Strings,
    Number,
    Checkbox,
    Select,
    Password,
    Multiline,
    Channel,
    Track,
    Tracks,
    Array,
}

/// An operator-configurable setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptVar {
    pub name: String,
    pub title: String,
    #[serde(rename = "type")]
    pub var_type: VarType,
    #[serde(default)]
    pub default: Option<Value>,
    /// Choices for [`VarType::Select`].
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
}

impl ScriptVar {
    pub fn new(name: impl Into<String>, title: impl Into<String>, var_type: VarType) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            var_type,
            default: None,
            options: Vec::new(),
            placeholder: None,
        }
    }

    pub fn string(name: impl Into<String>, title: impl Into<String>) -> Self {
        Self::new(name, title, VarType::String)
    }

    pub fn number(name: impl Into<String>, title: impl Into<String>) -> Self {
        Self::new(name, title, VarType::Number)
    }

    pub fn checkbox(name: impl Into<String>, title: impl Into<String>) -> Self {
        Self::new(name, title, VarType::Checkbox)
    }

    pub fn select<I, S>(name: impl Into<String>, title: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            options: options.into_iter().map(Into::into).collect(),
            ..Self::new(name, title, VarType::Select)
        }
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn placeholder(mut self, text: impl Into<String>) -> Self {
        self.placeholder = Some(text.into());
        self
    }
}

// =============================================================================
// Manifest
// =============================================================================

/// Metadata and requirements of a script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub name: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub description: String,
    pub version: String,
    /// Runs on every instance without the option to disable it.
    #[serde(default)]
    pub autorun: bool,
    /// Supported backends. Empty means TeamSpeak only.
    #[serde(default)]
    pub backends: Vec<BackendKind>,
    #[serde(default)]
    pub enable_web: bool,
    /// Semver requirement on the engine version, e.g. `">= 0.9.16"`.
    #[serde(default)]
    pub engine: Option<String>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub required_modules: Vec<Module>,
    #[serde(default)]
    pub vars: Vec<ScriptVar>,
    /// Phrases for speech recognition.
    #[serde(default)]
    pub voice_commands: Vec<String>,
}

impl Manifest {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            author: String::new(),
            description: String::new(),
            version: version.into(),
            autorun: false,
            backends: Vec::new(),
            enable_web: false,
            engine: None,
            hidden: false,
            required_modules: Vec::new(),
            vars: Vec::new(),
            voice_commands: Vec::new(),
        }
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn autorun(mut self) -> Self {
        self.autorun = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn enable_web(mut self) -> Self {
        self.enable_web = true;
        self
    }

    pub fn backends(mut self, backends: impl IntoIterator<Item = BackendKind>) -> Self {
        self.backends = backends.into_iter().collect();
        self
    }

    pub fn engine(mut self, requirement: impl Into<String>) -> Self {
        self.engine = Some(requirement.into());
        self
    }

    pub fn requires(mut self, module: Module) -> Self {
        if !self.required_modules.contains(&module) {
            self.required_modules.push(module);
        }
        self
    }

    pub fn var(mut self, var: ScriptVar) -> Self {
        self.vars.push(var);
        self
    }

    pub fn voice_command(mut self, phrase: impl Into<String>) -> Self {
        self.voice_commands.push(phrase.into());
        self
    }

    /// Whether `module` is listed in `required_modules`.
    pub fn declares(&self, module: Module) -> bool {
        self.required_modules.contains(&module)
    }

    /// Restricted modules listed in `required_modules`.
    pub fn restricted_modules(&self) -> impl Iterator<Item = Module> + '_ {
        self.required_modules
            .iter()
            .copied()
            .filter(Module::is_restricted)
    }

    /// Whether the script may run on `backend`.
    pub fn supports_backend(&self, backend: BackendKind) -> bool {
        if self.backends.is_empty() {
            backend == BackendKind::Ts3
        } else {
            self.backends.contains(&backend)
        }
    }

    /// Parses the `engine` requirement, if any.
    pub fn engine_requirement(&self) -> Result<Option<VersionReq>, semver::Error> {
        self.engine.as_deref().map(parse_requirement).transpose()
    }

    /// Checks structural rules for the script identified by `script`.
    pub fn validate(&self, script: &str) -> ScriptResult<()> {
        if self.name.trim().is_empty() {
            return Err(ScriptError::invalid(script, "name must not be empty"));
        }
        if self.version.trim().is_empty() {
            return Err(ScriptError::invalid(script, "version must not be empty"));
        }
        if self.hidden && !self.vars.is_empty() {
            return Err(ScriptError::invalid(script, "hidden scripts cannot have vars"));
        }
        if let Err(e) = self.engine_requirement() {
            return Err(ScriptError::invalid(
                script,
                format!("invalid engine requirement: {e}"),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for var in &self.vars {
            if !seen.insert(var.name.as_str()) {
                return Err(ScriptError::invalid(
                    script,
                    format!("duplicate var '{}'", var.name),
                ));
            }
        }
        Ok(())
    }

    /// Fails with [`ScriptError::EngineMismatch`] unless `engine` satisfies the
    /// requirement.
    pub fn check_engine(&self, script: &str, engine: &Version) -> ScriptResult<()> {
        match self.engine_requirement() {
            Ok(Some(req)) if !req.matches(engine) => Err(ScriptError::EngineMismatch {
                script: script.to_string(),
                required: req.to_string(),
                actual: engine.to_string(),
            }),
            Ok(_) => Ok(()),
            Err(e) => Err(ScriptError::invalid(
                script,
                format!("invalid engine requirement: {e}"),
            )),
        }
    }

    /// Settings object holding every var's default.
    pub fn default_settings(&self) -> Map<String, Value> {
        self.vars
            .iter()
            .filter_map(|var| Some((var.name.clone(), var.default.clone()?)))
            .collect()
    }

    /// Overlays `configured` onto the defaults.
    ///
    /// Non-object configuration is ignored.
    pub fn resolve_settings(&self, configured: Option<&Value>) -> Value {
        let mut settings = self.default_settings();
        if let Some(Value::Object(map)) = configured {
            for (key, value) in map {
                settings.insert(key.clone(), value.clone());
            }
        }
        Value::Object(settings)
    }
}

/// Parses a requirement, accepting the spaced operator form (`">= 0.9.16"`).
fn parse_requirement(raw: &str) -> Result<VersionReq, semver::Error> {
    let compact: String = raw
        .split(',')
        .map(|part| part.split_whitespace().collect::<String>())
        .collect::<Vec<_>>()
        .join(", ");
    VersionReq::parse(&compact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_module_parsing() {
        assert_eq!("NET".parse::<Module>().unwrap(), Module::Net);
        assert!("gpu".parse::<Module>().is_err());
        assert!(Module::Db.is_restricted());
        assert!(!Module::Http.is_restricted());
    }

    #[test]
    fn test_backend_support_defaults_to_ts3() {
        let manifest = Manifest::new("x", "1.0");
        assert!(manifest.supports_backend(BackendKind::Ts3));
        assert!(!manifest.supports_backend(BackendKind::Discord));

        let manifest = manifest.backends([BackendKind::Discord]);
        assert!(!manifest.supports_backend(BackendKind::Ts3));
        assert!(manifest.supports_backend(BackendKind::Discord));
    }

    #[test]
    fn test_engine_requirement() {
        let manifest = Manifest::new("x", "1.0").engine(">= 0.9.16");
        assert!(manifest.check_engine("x", &Version::new(1, 0, 0)).is_ok());
        assert!(matches!(
            manifest.check_engine("x", &Version::new(0, 9, 0)),
            Err(ScriptError::EngineMismatch { .. })
        ));

        let broken = Manifest::new("x", "1.0").engine("not a version");
        assert!(matches!(
            broken.validate("x"),
            Err(ScriptError::InvalidManifest { .. })
        ));
    }

    #[test]
    fn test_validation() {
        assert!(Manifest::new("", "1.0").validate("x").is_err());
        let hidden = Manifest::new("x", "1.0")
            .hidden()
            .var(ScriptVar::string("a", "A"));
        assert!(hidden.validate("x").is_err());
        let dup = Manifest::new("x", "1.0")
            .var(ScriptVar::string("a", "A"))
            .var(ScriptVar::number("a", "B"));
        assert!(dup.validate("x").is_err());
    }

    #[test]
    fn test_settings_resolution() {
        let manifest = Manifest::new("x", "1.0")
            .var(ScriptVar::string("greeting", "Greeting").default_value("hi"))
            .var(ScriptVar::number("volume", "Volume").default_value(50))
            .var(ScriptVar::string("token", "Token"));

        let settings = manifest.resolve_settings(Some(&json!({ "volume": 80, "extra": true })));
        assert_eq!(
            settings,
            json!({ "greeting": "hi", "volume": 80, "extra": true })
        );
        assert_eq!(
            manifest.resolve_settings(Some(&json!("nonsense"))),
            json!({ "greeting": "hi", "volume": 50 })
        );
    }

    #[test]
    fn test_manifest_wire_format() {
        let manifest: Manifest = serde_json::from_value(json!({
            "name": "Demo",
            "version": "1.0",
            "requiredModules": ["net", "http"],
            "backends": ["discord"],
        }))
        .unwrap();
        assert!(manifest.declares(Module::Net));
        assert_eq!(manifest.restricted_modules().collect::<Vec<_>>(), vec![Module::Net]);
    }
}
