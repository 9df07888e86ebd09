//! Post-merge configuration validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Smallest memory limit that fits one WASM page.
const MIN_MEMORY_BYTES: u64 = 64 * 1024;

/// Upper bound on a single macro call (10 minutes).
const MAX_EXECUTION_MS: u64 = 600_000;

/// Validate a fully merged configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_registry(config)?;
    validate_modules(config)?;
    validate_editor(config)?;
    validate_logging(config)?;
    Ok(())
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_owned(),
        message: message.into(),
    }
}

fn validate_registry(config: &Config) -> ConfigResult<()> {
    let r = &config.registry;
    if r.root.as_os_str().is_empty() {
        return Err(invalid("registry.root", "must not be empty"));
    }
    if r.index.is_empty() || r.index.contains(['/', '\\']) {
        return Err(invalid(
            "registry.index",
            format!("'{}' must be a plain file name", r.index),
        ));
    }
    Ok(())
}

fn validate_modules(config: &Config) -> ConfigResult<()> {
    let m = &config.modules;
    if m.max_memory_bytes < MIN_MEMORY_BYTES {
        return Err(invalid(
            "modules.max_memory_bytes",
            format!("must be at least {MIN_MEMORY_BYTES}"),
        ));
    }
    if m.max_execution_ms == 0 || m.max_execution_ms > MAX_EXECUTION_MS {
        return Err(invalid(
            "modules.max_execution_ms",
            format!("must be between 1 and {MAX_EXECUTION_MS}"),
        ));
    }
    Ok(())
}

fn validate_editor(config: &Config) -> ConfigResult<()> {
    let valid_languages = ["rust", "plain"];
    if !valid_languages.contains(&config.editor.language.as_str()) {
        return Err(invalid(
            "editor.language",
            format!(
                "unsupported language '{}'; expected one of: {}",
                config.editor.language,
                valid_languages.join(", ")
            ),
        ));
    }
    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.logging.level.as_str()) {
        return Err(invalid(
            "logging.level",
            format!(
                "unsupported log level '{}'; expected one of: {}",
                config.logging.level,
                valid_levels.join(", ")
            ),
        ));
    }

    let valid_formats = ["pretty", "compact", "json"];
    if !valid_formats.contains(&config.logging.format.as_str()) {
        return Err(invalid(
            "logging.format",
            format!(
                "unsupported log format '{}'; expected one of: {}",
                config.logging.format,
                valid_formats.join(", ")
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn index_must_be_a_file_name() {
        let mut config = Config::default();
        config.registry.index = "../targets.toml".to_owned();
        let err = validate(&config).unwrap_err();
        assert!(
            matches!(err, ConfigError::ValidationError { ref field, .. } if field == "registry.index")
        );
    }

    #[test]
    fn tiny_memory_limit_is_rejected() {
        let mut config = Config::default();
        config.modules.max_memory_bytes = 1024;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut config = Config::default();
        config.modules.max_execution_ms = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn unknown_language_is_rejected() {
        let mut config = Config::default();
        config.editor.language = "cobol".to_owned();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn unknown_log_format_is_rejected() {
        let mut config = Config::default();
        config.logging.format = "xml".to_owned();
        assert!(validate(&config).is_err());
    }
}
