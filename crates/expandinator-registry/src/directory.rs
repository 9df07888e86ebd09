//! Targets served from an output directory.
//!
//! Layout:
//!
//! ```text
//! out/
//!   targets.toml                 ordered [[target]] tables
//!   serde_derive-1-0-136.json    {"#[derive(Serialize)]": "expand_derive_serialize", ...}
//!   serde_derive-1-0-136.wasm
//! ```
//!
//! Each `[[target]]` names its `label`, the `artifact` stem shared by the
//! metadata and module files, and optionally the blake3 `hash` of the module.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{LoadError, LoadResult, RegistryError, RegistryResult};
use crate::module::ModuleArtifact;
use crate::source::TargetSource;
use crate::target::{MacroSet, TargetLabel};
use crate::wasm::{WasmArtifact, WasmLimits, verify_hash};

/// Default index file name inside the output directory.
pub const INDEX_FILE_NAME: &str = "targets.toml";

/// One `[[target]]` table of the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Display label, e.g. `serde_derive 1`.
    pub label: TargetLabel,
    /// File stem of `<artifact>.json` and `<artifact>.wasm`.
    pub artifact: String,
    /// Expected blake3 digest of the module, hex encoded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

/// The parsed `targets.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetIndex {
    /// Targets in display order.
    #[serde(default, rename = "target")]
    pub targets: Vec<IndexEntry>,
}

impl TargetIndex {
    /// Parse an index document.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Index`] if the document is malformed, an
    /// artifact stem escapes the directory, or a label repeats.
    pub fn parse(path: &Path, content: &str) -> RegistryResult<Self> {
        let index: Self = toml::from_str(content).map_err(|e| RegistryError::Index {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut seen = std::collections::HashSet::new();
        for entry in &index.targets {
            if !is_plain_stem(&entry.artifact) {
                return Err(RegistryError::Index {
                    path: path.to_path_buf(),
                    message: format!("invalid artifact name: {}", entry.artifact),
                });
            }
            if !seen.insert(&entry.label) {
                return Err(RegistryError::Index {
                    path: path.to_path_buf(),
                    message: format!("duplicate target label: {}", entry.label),
                });
            }
        }
        Ok(index)
    }
}

fn is_plain_stem(stem: &str) -> bool {
    !stem.is_empty()
        && stem
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && !stem.starts_with('.')
}

/// A target source reading from an output directory on disk.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
    index_file: String,
    limits: WasmLimits,
    require_hash: bool,
}

impl DirectorySource {
    /// Read targets from `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            index_file: INDEX_FILE_NAME.to_string(),
            limits: WasmLimits::default(),
            require_hash: false,
        }
    }

    /// Use a non-default index file name.
    #[must_use]
    pub fn with_index_file(mut self, name: impl Into<String>) -> Self {
        self.index_file = name.into();
        self
    }

    /// Resource limits for activated modules.
    #[must_use]
    pub fn with_limits(mut self, limits: WasmLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Reject modules without a recorded digest.
    #[must_use]
    pub fn require_hash(mut self, require: bool) -> Self {
        self.require_hash = require;
        self
    }

    /// Output directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn read_index(&self) -> RegistryResult<TargetIndex> {
        let path = self.root.join(&self.index_file);
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| RegistryError::Index {
                path: path.clone(),
                message: e.to_string(),
            })?;
        TargetIndex::parse(&path, &content)
    }

    async fn entry(&self, target: &TargetLabel) -> RegistryResult<IndexEntry> {
        self.read_index()
            .await?
            .targets
            .into_iter()
            .find(|e| &e.label == target)
            .ok_or_else(|| RegistryError::NotFound(target.clone()))
    }
}

#[async_trait]
impl TargetSource for DirectorySource {
    async fn list_targets(&self) -> RegistryResult<Vec<TargetLabel>> {
        let index = self.read_index().await?;
        info!(
            root = %self.root.display(),
            count = index.targets.len(),
            "Loaded target index"
        );
        Ok(index.targets.into_iter().map(|e| e.label).collect())
    }

    async fn fetch_macros(&self, target: &TargetLabel) -> RegistryResult<MacroSet> {
        let entry = self.entry(target).await?;
        let path = self.root.join(format!("{}.json", entry.artifact));
        debug!(path = %path.display(), "Reading macro metadata");
        let json = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| RegistryError::Fetch {
                target: target.clone(),
                message: format!("{}: {e}", path.display()),
            })?;
        MacroSet::from_json(target, &json)
    }

    async fn fetch_module(&self, target: &TargetLabel) -> LoadResult<Box<dyn ModuleArtifact>> {
        let entry = self.entry(target).await.map_err(|e| match e {
            RegistryError::NotFound(t) => LoadError::NotFound(t),
            other => LoadError::Fetch {
                target: target.clone(),
                message: other.to_string(),
            },
        })?;
        let path = self.root.join(format!("{}.wasm", entry.artifact));
        debug!(path = %path.display(), "Reading module");
        let bytes = tokio::fs::read(&path).await.map_err(|e| LoadError::Fetch {
            target: target.clone(),
            message: format!("{}: {e}", path.display()),
        })?;

        verify_hash(target, &bytes, entry.hash.as_deref(), self.require_hash)?;

        Ok(Box::new(WasmArtifact::new(target.clone(), bytes, self.limits)))
    }
}
