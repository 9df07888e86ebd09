//! Configuration types for the playground.
//!
//! Every struct implements [`Default`] with the same values as the embedded
//! `defaults.toml`, so a bare `[section]` header yields a working section.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where targets are discovered.
    pub registry: RegistrySection,
    /// Limits applied to activated macro modules.
    pub modules: ModulesSection,
    /// Behaviour options for the editor panes.
    pub editor: EditorSection,
    /// Logging level, format, and per-crate directives.
    pub logging: LoggingSection,
}

// ---------------------------------------------------------------------------
// RegistrySection
// ---------------------------------------------------------------------------

/// Target registry location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySection {
    /// Output directory holding the index, metadata, and modules. Relative
    /// paths resolve against the workspace root.
    pub root: PathBuf,
    /// Index file name inside `root`.
    pub index: String,
    /// Reject modules whose index entry carries no blake3 digest.
    pub require_hash: bool,
}

impl Default for RegistrySection {
    fn default() -> Self {
        Self {
            root: PathBuf::from("out"),
            index: "targets.toml".to_owned(),
            require_hash: false,
        }
    }
}

// ---------------------------------------------------------------------------
// ModulesSection
// ---------------------------------------------------------------------------

/// Resource limits for WASM macro modules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModulesSection {
    /// Maximum linear memory per module, in bytes.
    pub max_memory_bytes: u64,
    /// Maximum wall time of one macro call, in milliseconds.
    pub max_execution_ms: u64,
    /// Link WASI imports into each module.
    pub wasi: bool,
}

impl Default for ModulesSection {
    fn default() -> Self {
        Self {
            max_memory_bytes: 64 * 1024 * 1024,
            max_execution_ms: 5_000,
            wasi: true,
        }
    }
}

impl ModulesSection {
    /// Execution limit as a [`Duration`].
    #[must_use]
    pub fn max_execution_time(&self) -> Duration {
        Duration::from_millis(self.max_execution_ms)
    }
}

// ---------------------------------------------------------------------------
// EditorSection
// ---------------------------------------------------------------------------

/// Editor pane options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorSection {
    /// Highlighting language of both panes.
    pub language: String,
    /// Whether Tab indents instead of moving focus.
    pub indent_with_tab: bool,
}

impl Default for EditorSection {
    fn default() -> Self {
        Self {
            language: "rust".to_owned(),
            indent_with_tab: true,
        }
    }
}

// ---------------------------------------------------------------------------
// LoggingSection
// ---------------------------------------------------------------------------

/// Logging and tracing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global log level filter (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`).
    pub level: String,
    /// Output format: `"pretty"`, `"compact"`, or `"json"`.
    pub format: String,
    /// Per-crate tracing directives (e.g. `["expandinator_registry=debug"]`).
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            directives: Vec::new(),
        }
    }
}
