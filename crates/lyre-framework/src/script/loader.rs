use std::collections::BTreeSet;
use std::sync::Arc;

use semver::Version;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::ScriptDescriptor;
use crate::context::{InstanceServices, ScriptContext};
use crate::error::{ScriptError, ScriptResult};
use crate::manifest::{Manifest, Module};

/// A script whose main function completed on an instance.
#[derive(Debug, Clone)]
pub struct LoadedScript {
    pub name: &'static str,
    pub manifest: Arc<Manifest>,
    pub context: ScriptContext,
}

/// Loads `descriptor` onto the instance behind `services`.
///
/// Checks run in order: API version, manifest shape, engine requirement,
/// backend support, module privileges. A script that does not support the
/// instance backend is skipped with `Ok(None)`. When main fails, the
/// handlers and export it left behind are removed again.
pub async fn load_script(
    descriptor: &ScriptDescriptor,
    services: &InstanceServices,
    granted: &BTreeSet<Module>,
    settings: Option<&Value>,
    engine: &Version,
) -> ScriptResult<Option<LoadedScript>> {
    let name = descriptor.name;
    if !descriptor.is_compatible() {
        return Err(ScriptError::invalid(
            name,
            format!("unsupported script API version {:#010x}", descriptor.api_version),
        ));
    }

    let manifest = (descriptor.manifest)();
    manifest.validate(name)?;
    manifest.check_engine(name, engine)?;

    if !manifest.supports_backend(services.backend_kind) {
        debug!(
            instance = %services.instance_id,
            script = name,
            backend = services.backend_kind.as_str(),
            "Script does not support backend, skipping"
        );
        return Ok(None);
    }

    let mut modules = BTreeSet::new();
    for module in manifest.restricted_modules() {
        if !granted.contains(&module) {
            warn!(instance = %services.instance_id, script = name, %module, "Module not granted");
            return Err(ScriptError::PrivilegeDenied {
                script: name.to_string(),
                module,
            });
        }
        modules.insert(module);
    }

    let settings = manifest.resolve_settings(settings);
    let manifest = Arc::new(manifest);
    let context = ScriptContext::new(
        name,
        Arc::clone(&manifest),
        settings,
        services.clone(),
        modules,
    );

    if let Err(source) = (descriptor.main)(context.clone()).await {
        let removed = services.bus.remove_script(name);
        services.exports.remove(name);
        debug!(script = name, removed, "Cleaned up after failed main");
        return Err(ScriptError::Main {
            script: name.to_string(),
            source,
        });
    }

    info!(
        instance = %services.instance_id,
        script = name,
        version = %manifest.version,
        "Loaded script"
    );
    Ok(Some(LoadedScript {
        name,
        manifest,
        context,
    }))
}
