//! Script descriptors and the global script registry.
//!
//! A script is a manifest plus an async main function. Scripts are described
//! by a static, `Copy` [`ScriptDescriptor`], usually produced by
//! [`define_script!`](crate::define_script). Descriptors can be handed to the
//! runtime explicitly or registered globally with
//! [`register_script!`](crate::register_script), which places them in the
//! [`SCRIPT_REGISTRY`] distributed slice.

mod loader;
mod macros;

use futures::future::BoxFuture;
use linkme::distributed_slice;

pub use loader::{LoadedScript, load_script};

use crate::context::ScriptContext;
use crate::error::BoxError;
use crate::manifest::Manifest;

/// Current script API version (1.0).
pub const LYRE_SCRIPT_API_VERSION: u32 = 0x0001_0000;

/// Signature of a script's main function.
pub type ScriptMain = fn(ScriptContext) -> BoxFuture<'static, Result<(), BoxError>>;

/// A static descriptor of one script.
#[derive(Debug, Clone, Copy)]
pub struct ScriptDescriptor {
    /// API version the descriptor was compiled against.
    pub api_version: u32,
    /// Script identifier, used for privileges, settings and storage.
    pub name: &'static str,
    /// Builds the manifest.
    pub manifest: fn() -> Manifest,
    /// Entry point, run once per instance.
    pub main: ScriptMain,
}

impl ScriptDescriptor {
    /// The major part must match and the descriptor's minor part must not be
    /// newer than the framework's.
    pub fn is_compatible(&self) -> bool {
        let host_major = LYRE_SCRIPT_API_VERSION >> 16;
        let host_minor = LYRE_SCRIPT_API_VERSION & 0xFFFF;
        self.api_version >> 16 == host_major && self.api_version & 0xFFFF <= host_minor
    }
}

/// Scripts registered with [`register_script!`](crate::register_script).
#[distributed_slice]
pub static SCRIPT_REGISTRY: [&'static ScriptDescriptor];

/// Returns every globally registered script, sorted by name.
pub fn registered_scripts() -> Vec<&'static ScriptDescriptor> {
    let mut scripts: Vec<_> = SCRIPT_REGISTRY.iter().copied().collect();
    scripts.sort_by_key(|d| d.name);
    scripts
}
