//! Building a playground from configuration.

use std::path::Path;
use std::sync::Arc;

use expandinator_config::{Config, ConfigError};
use expandinator_registry::{DirectorySource, TargetRegistry, WasmLimits};
use tracing::info;

use crate::editor::{Language, TextDocumentFactory};
use crate::error::PlaygroundResult;
use crate::playground::{Playground, PlaygroundOptions};

/// Registry source described by the `[registry]` and `[modules]` sections.
#[must_use]
pub fn directory_source(config: &Config) -> DirectorySource {
    let limits = WasmLimits {
        max_memory_bytes: config.modules.max_memory_bytes,
        max_execution_time: config.modules.max_execution_time(),
        wasi: config.modules.wasi,
    };
    DirectorySource::new(&config.registry.root)
        .with_index_file(&config.registry.index)
        .with_limits(limits)
        .require_hash(config.registry.require_hash)
}

/// Playground options described by the `[editor]` section.
///
/// # Errors
///
/// Returns [`ConfigError::ValidationError`] for an unsupported language.
pub fn playground_options(config: &Config) -> PlaygroundResult<PlaygroundOptions> {
    let language: Language =
        config
            .editor
            .language
            .parse()
            .map_err(|message| ConfigError::ValidationError {
                field: "editor.language".to_owned(),
                message,
            })?;
    Ok(PlaygroundOptions {
        language,
        indent_with_tab: config.editor.indent_with_tab,
        ..PlaygroundOptions::default()
    })
}

impl Playground {
    /// Connect to the configured output directory and create a playground
    /// with in-memory editor panes.
    ///
    /// # Errors
    ///
    /// Returns an error if the editor options are invalid or the target index
    /// cannot be read.
    pub async fn from_config(config: &Config) -> PlaygroundResult<Self> {
        let options = playground_options(config)?;
        let source = directory_source(config);
        info!(root = %source.root().display(), "Connecting to target directory");
        let registry = TargetRegistry::connect(Arc::new(source)).await?;
        Ok(Self::new(registry, &TextDocumentFactory, options))
    }

    /// Load layered configuration for `workspace_root` and build from it.
    ///
    /// # Errors
    ///
    /// Returns configuration errors and the errors of
    /// [`Playground::from_config`].
    pub async fn from_workspace(workspace_root: &Path) -> PlaygroundResult<Self> {
        let resolved = Config::load(Some(workspace_root))?;
        Self::from_config(&resolved.config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlaygroundError;

    #[test]
    fn options_follow_editor_section() {
        let mut config = Config::default();
        config.editor.language = "plain".into();
        config.editor.indent_with_tab = false;
        let options = playground_options(&config).unwrap();
        assert_eq!(options.language, Language::Plain);
        assert!(!options.indent_with_tab);
    }

    #[test]
    fn unsupported_language_names_the_field() {
        let mut config = Config::default();
        config.editor.language = "cobol".into();
        let err = playground_options(&config).unwrap_err();
        assert!(matches!(
            err,
            PlaygroundError::Config(ConfigError::ValidationError { ref field, .. })
                if field == "editor.language"
        ));
    }

    #[test]
    fn source_uses_registry_root() {
        let mut config = Config::default();
        config.registry.root = "/srv/expandinator/out".into();
        assert_eq!(
            directory_source(&config).root(),
            Path::new("/srv/expandinator/out")
        );
    }

    #[tokio::test]
    async fn missing_index_is_a_registry_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.registry.root = dir.path().to_path_buf();
        let err = Playground::from_config(&config).await.unwrap_err();
        assert!(matches!(err, PlaygroundError::Registry(_)));
    }

    #[tokio::test]
    async fn empty_index_yields_only_the_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("targets.toml"), "").unwrap();
        let mut config = Config::default();
        config.registry.root = dir.path().to_path_buf();

        let playground = Playground::from_config(&config).await.unwrap();
        let options = playground.target_options();
        assert_eq!(options.len(), 1);
        assert!(options[0].value.is_none());
    }
}
