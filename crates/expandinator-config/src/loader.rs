//! Config file discovery and layered loading.
//!
//! Implements the `Config::load()` algorithm:
//! 1. Parse `defaults.toml` → base
//! 2. Merge `~/.expandinator/config.toml` (user)
//! 3. Merge `{workspace}/.expandinator/config.toml` (workspace)
//! 4. Apply `EXPANDINATOR_*` env fallbacks for fields no file has set
//! 5. Deserialize merged tree → `Config`
//! 6. Resolve a relative `registry.root` against the workspace
//! 7. Validate

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: usize = 1_048_576;

/// Directory name holding config files under home and workspace roots.
pub const CONFIG_DIR_NAME: &str = ".expandinator";

/// Env var → dotted config path. Values only fill fields no file has set.
const ENV_FALLBACKS: &[(&str, &str)] = &[
    ("EXPANDINATOR_REGISTRY_ROOT", "registry.root"),
    ("EXPANDINATOR_LOG_LEVEL", "logging.level"),
    ("EXPANDINATOR_LOG_FORMAT", "logging.format"),
];

/// A loaded configuration plus the files it came from.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// The merged, validated configuration.
    pub config: Config,
    /// Config files that contributed, lowest precedence first.
    pub loaded_files: Vec<PathBuf>,
}

/// Load configuration with layered file precedence.
///
/// `workspace_root` enables the workspace layer and anchors a relative
/// `registry.root`. `home_override` replaces the detected home directory.
///
/// # Errors
///
/// Returns a [`ConfigError`] if any config file is malformed, or if the
/// final merged configuration fails validation.
pub fn load(
    workspace_root: Option<&Path>,
    home_override: Option<&Path>,
) -> ConfigResult<ResolvedConfig> {
    let env: HashMap<String, String> = ENV_FALLBACKS
        .iter()
        .filter_map(|(var, _)| std::env::var(var).ok().map(|v| ((*var).to_owned(), v)))
        .collect();
    let home = match home_override {
        Some(h) => h.to_path_buf(),
        None => home_directory()?,
    };
    load_layers(workspace_root, &home, &env)
}

/// [`load`] with explicit home directory and environment.
///
/// # Errors
///
/// See [`load`].
pub fn load_layers(
    workspace_root: Option<&Path>,
    home: &Path,
    env: &HashMap<String, String>,
) -> ConfigResult<ResolvedConfig> {
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;

    let mut file_fields = HashSet::new();
    let mut loaded_files = Vec::new();

    let mut layers = vec![home.join(CONFIG_DIR_NAME).join("config.toml")];
    if let Some(ws) = workspace_root {
        layers.push(ws.join(CONFIG_DIR_NAME).join("config.toml"));
    }

    for path in layers {
        if let Some(overlay) = try_load_file(&path)? {
            deep_merge(&mut merged, &overlay, "", &mut file_fields);
            info!(path = %path.display(), "loaded config file");
            loaded_files.push(path);
        }
    }

    let applied = apply_env_fallbacks(&mut merged, &file_fields, env);
    if applied > 0 {
        debug!(count = applied, "applied environment variable fallbacks");
    }

    let mut config: Config =
        merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError {
                path: "<merged config>".to_owned(),
                source: e,
            })?;

    if let Some(ws) = workspace_root
        && config.registry.root.is_relative()
    {
        config.registry.root = ws.join(&config.registry.root);
    }

    validate::validate(&config)?;

    Ok(ResolvedConfig {
        config,
        loaded_files,
    })
}

/// Load a config from a single file (no layering).
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
/// validation.
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    let value = try_load_file(path)?.ok_or_else(|| ConfigError::ReadError {
        path: path.display().to_string(),
        source: std::io::Error::from(std::io::ErrorKind::NotFound),
    })?;
    let config: Config = value
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::ParseError {
            path: path.display().to_string(),
            source: e,
        })?;
    validate::validate(&config)?;
    Ok(config)
}

/// Try to load a file, returning `None` if the file doesn't exist.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.display().to_string(),
                source: e,
            });
        },
    };

    if content.len() > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {} bytes, exceeding the {MAX_CONFIG_FILE_SIZE} byte limit",
                content.len()
            ),
        });
    }

    let value: toml::Value = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(Some(value))
}

/// Recursively merge `overlay` into `base`, recording every leaf path the
/// overlay sets. Tables merge per key; scalars and arrays replace.
fn deep_merge(
    base: &mut toml::Value,
    overlay: &toml::Value,
    prefix: &str,
    set_fields: &mut HashSet<String>,
) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                match base_table.get_mut(key) {
                    Some(base_val) => deep_merge(base_val, overlay_val, &path, set_fields),
                    None => {
                        base_table.insert(key.clone(), overlay_val.clone());
                        set_fields.insert(path);
                    },
                }
            }
        },
        (base, overlay) => {
            *base = overlay.clone();
            set_fields.insert(prefix.to_owned());
        },
    }
}

fn apply_env_fallbacks(
    merged: &mut toml::Value,
    file_fields: &HashSet<String>,
    env: &HashMap<String, String>,
) -> usize {
    let mut applied = 0usize;
    for (var, field) in ENV_FALLBACKS {
        let Some(value) = env.get(*var) else {
            continue;
        };
        if file_fields.contains(*field) {
            continue;
        }
        let Some((section, key)) = field.split_once('.') else {
            continue;
        };
        if let Some(table) = merged.get_mut(section).and_then(toml::Value::as_table_mut) {
            table.insert(key.to_owned(), toml::Value::String(value.clone()));
            applied = applied.saturating_add(1);
        }
    }
    applied
}

/// Determine the user's home directory.
fn home_directory() -> ConfigResult<PathBuf> {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .ok_or(ConfigError::NoHomeDir)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(root: &Path, content: &str) {
        let dir = root.join(CONFIG_DIR_NAME);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("config.toml"), content).unwrap();
    }

    #[test]
    fn defaults_deserialize_to_default_config() {
        let config: Config = toml::from_str(DEFAULTS_TOML).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn defaults_only_without_files() {
        let home = tempfile::tempdir().unwrap();
        let resolved = load_layers(None, home.path(), &HashMap::new()).unwrap();
        assert!(resolved.loaded_files.is_empty());
        assert_eq!(resolved.config.registry.index, "targets.toml");
        assert_eq!(resolved.config.modules.max_execution_ms, 5_000);
    }

    #[test]
    fn workspace_overrides_user() {
        let home = tempfile::tempdir().unwrap();
        let ws = tempfile::tempdir().unwrap();
        write_config(
            home.path(),
            "[logging]\nlevel = \"debug\"\n[modules]\nwasi = false\n",
        );
        write_config(ws.path(), "[logging]\nlevel = \"warn\"\n");

        let resolved = load_layers(Some(ws.path()), home.path(), &HashMap::new()).unwrap();
        assert_eq!(resolved.loaded_files.len(), 2);
        assert_eq!(resolved.config.logging.level, "warn");
        assert!(!resolved.config.modules.wasi);
        assert_eq!(resolved.config.logging.format, "compact");
    }

    #[test]
    fn relative_registry_root_resolves_against_workspace() {
        let home = tempfile::tempdir().unwrap();
        let ws = tempfile::tempdir().unwrap();
        let resolved = load_layers(Some(ws.path()), home.path(), &HashMap::new()).unwrap();
        assert_eq!(resolved.config.registry.root, ws.path().join("out"));
    }

    #[test]
    fn env_fills_fields_files_left_unset() {
        let home = tempfile::tempdir().unwrap();
        write_config(home.path(), "[logging]\nlevel = \"error\"\n");
        let env = HashMap::from([
            ("EXPANDINATOR_LOG_LEVEL".to_owned(), "trace".to_owned()),
            ("EXPANDINATOR_LOG_FORMAT".to_owned(), "json".to_owned()),
        ]);

        let resolved = load_layers(None, home.path(), &env).unwrap();
        assert_eq!(resolved.config.logging.level, "error");
        assert_eq!(resolved.config.logging.format, "json");
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let home = tempfile::tempdir().unwrap();
        write_config(home.path(), "[registry\nroot = ");
        let err = load_layers(None, home.path(), &HashMap::new()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn invalid_merged_value_fails_validation() {
        let home = tempfile::tempdir().unwrap();
        write_config(home.path(), "[logging]\nformat = \"xml\"\n");
        let err = load_layers(None, home.path(), &HashMap::new()).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[test]
    fn load_file_reads_a_single_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("playground.toml");
        std::fs::write(&path, "[registry]\nrequire_hash = true\n").unwrap();
        let config = load_file(&path).unwrap();
        assert!(config.registry.require_hash);
        assert_eq!(config.registry.index, "targets.toml");
    }
}
