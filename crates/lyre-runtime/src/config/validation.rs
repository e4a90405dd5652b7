//! Configuration validation utilities.

use std::collections::HashSet;
use std::net::SocketAddr;

use lyre_framework::{MAX_LOG_LEVEL, Module};

use super::error::{ConfigError, ConfigResult};
use super::schema::{InstanceConfig, LyreConfig, ScriptsConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &LyreConfig) -> ConfigResult<()> {
    validate_log_level(config.logging.script_level, "logging.script_level")?;
    validate_timeouts(config)?;
    validate_web(config)?;
    validate_instances(&config.instances)?;
    validate_scripts(&config.scripts)?;
    Ok(())
}

fn validate_log_level(level: Option<u8>, field: &str) -> ConfigResult<()> {
    match level {
        Some(level) if level > MAX_LOG_LEVEL => Err(ConfigError::validation(format!(
            "{field} must be between 0 and {MAX_LOG_LEVEL}, got {level}"
        ))),
        _ => Ok(()),
    }
}

fn validate_timeouts(config: &LyreConfig) -> ConfigResult<()> {
    if config.network.http_timeout_ms == 0 {
        return Err(ConfigError::validation(
            "network.http_timeout_ms must be greater than 0",
        ));
    }
    if config.runtime.unload_timeout_ms == 0 {
        return Err(ConfigError::validation(
            "runtime.unload_timeout_ms must be greater than 0",
        ));
    }
    Ok(())
}

fn validate_web(config: &LyreConfig) -> ConfigResult<()> {
    if let Some(addr) = &config.web.ws_listen {
        addr.parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidAddress {
                addr: addr.clone(),
                reason: e.to_string(),
            })?;
    }
    if !config.web.ws_path.starts_with('/') {
        return Err(ConfigError::validation("web.ws_path must start with '/'"));
    }
    Ok(())
}

fn validate_instances(instances: &[InstanceConfig]) -> ConfigResult<()> {
    let mut seen_ids = HashSet::new();

    for instance in instances {
        if instance.id.is_empty() {
            return Err(ConfigError::missing_field("instances.id"));
        }
        if instance.id.contains(|c: char| c.is_whitespace() || c == '/') {
            return Err(ConfigError::validation(format!(
                "Instance ID '{}' cannot contain whitespace or '/'",
                instance.id
            )));
        }
        if !seen_ids.insert(instance.id.as_str()) {
            return Err(ConfigError::DuplicateInstanceId(instance.id.clone()));
        }
        validate_log_level(instance.log_level, "instances.log_level")?;
    }

    Ok(())
}

fn validate_scripts(scripts: &ScriptsConfig) -> ConfigResult<()> {
    for (script, modules) in &scripts.privileges {
        for module in modules {
            module
                .parse::<Module>()
                .map_err(|_| ConfigError::UnknownModule {
                    script: script.clone(),
                    module: module.clone(),
                })?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_empty_config() {
        assert!(validate_config(&LyreConfig::default()).is_ok());
    }

    #[test]
    fn test_validate_instance_ids() {
        let mut config = LyreConfig {
            instances: vec![InstanceConfig::new("")],
            ..Default::default()
        };
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { .. })
        ));

        config.instances = vec![InstanceConfig::new("two words")];
        assert!(validate_config(&config).is_err());

        config.instances = vec![InstanceConfig::new("a"), InstanceConfig::new("a")];
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::DuplicateInstanceId(_))
        ));
    }

    #[test]
    fn test_validate_log_levels() {
        let mut config = LyreConfig::default();
        config.logging.script_level = Some(11);
        assert!(validate_config(&config).is_ok());

        config.logging.script_level = Some(12);
        assert!(validate_config(&config).is_err());

        config.logging.script_level = None;
        let mut instance = InstanceConfig::new("a");
        instance.log_level = Some(40);
        config.instances = vec![instance];
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_timeouts() {
        let mut config = LyreConfig::default();
        config.network.http_timeout_ms = 0;
        assert!(validate_config(&config).is_err());

        let mut config = LyreConfig::default();
        config.runtime.unload_timeout_ms = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_web() {
        let mut config = LyreConfig::default();
        config.web.ws_listen = Some("localhost".into());
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidAddress { .. })
        ));

        config.web.ws_listen = Some("127.0.0.1:8180".into());
        config.web.ws_path = "ws".into();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_privileges() {
        let config = LyreConfig {
            scripts: ScriptsConfig::default().grant("radio", &["net", "db"]),
            ..Default::default()
        };
        assert!(validate_config(&config).is_ok());

        let config = LyreConfig {
            scripts: ScriptsConfig::default().grant("radio", &["net", "teleport"]),
            ..Default::default()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnknownModule { ref module, .. } if module == "teleport"
        ));
    }
}
