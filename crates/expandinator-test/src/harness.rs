//! Test harness helpers.

use std::path::{Path, PathBuf};

use expandinator_registry::{INDEX_FILE_NAME, IndexEntry, TargetIndex, TargetLabel};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

/// Set up test logging with the given filter.
///
/// Safe to call from several tests; only the first call installs a
/// subscriber.
pub fn setup_test_logging(filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_test_writer()
        .try_init();
}

/// Set up test logging with the default filter (warn level).
pub fn setup_test_logging_default() {
    setup_test_logging("warn");
}

/// A temporary output directory laid out for `DirectorySource`.
///
/// Files are written as targets are added; the index is rewritten on every
/// addition so the directory is always consistent.
#[derive(Debug)]
pub struct OutputDir {
    dir: TempDir,
    index: TargetIndex,
}

impl OutputDir {
    /// Create an empty output directory with an empty index.
    ///
    /// # Panics
    ///
    /// Panics if the directory or index cannot be written.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        let out = Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
            index: TargetIndex::default(),
        };
        out.write_index();
        out
    }

    /// Add a target with metadata JSON and module bytes.
    ///
    /// # Panics
    ///
    /// Panics if a file cannot be written.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn with_target(
        mut self,
        label: TargetLabel,
        artifact: &str,
        macros_json: &str,
        module: &[u8],
        hash: Option<&str>,
    ) -> Self {
        std::fs::write(self.path().join(format!("{artifact}.json")), macros_json)
            .expect("Failed to write macro metadata");
        std::fs::write(self.path().join(format!("{artifact}.wasm")), module)
            .expect("Failed to write module");
        self.index.targets.push(IndexEntry {
            label,
            artifact: artifact.to_string(),
            hash: hash.map(str::to_string),
        });
        self.write_index();
        self
    }

    /// Root of the output directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of the index file.
    #[must_use]
    pub fn index_path(&self) -> PathBuf {
        self.path().join(INDEX_FILE_NAME)
    }

    #[allow(clippy::expect_used)]
    fn write_index(&self) {
        let content = toml::to_string(&self.index).expect("Failed to serialize index");
        std::fs::write(self.index_path(), content).expect("Failed to write index");
    }
}

impl Default for OutputDir {
    fn default() -> Self {
        Self::new()
    }
}
