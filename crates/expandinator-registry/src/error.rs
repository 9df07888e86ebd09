//! Registry, module loading, and expansion error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::target::{MacroId, TargetLabel};

/// Errors from target and macro metadata lookups.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// The requested target is not part of the registry.
    #[error("target not found: {0}")]
    NotFound(TargetLabel),

    /// The target list or macro metadata could not be fetched.
    #[error("failed to fetch metadata for {target}: {message}")]
    Fetch {
        /// Target whose metadata was requested.
        target: TargetLabel,
        /// Transport failure reason.
        message: String,
    },

    /// Macro metadata was fetched but is not a valid macro set.
    #[error("malformed macro metadata for {target}: {message}")]
    Metadata {
        /// Target whose metadata is malformed.
        target: TargetLabel,
        /// Decode failure reason.
        message: String,
    },

    /// The target index itself could not be read or parsed.
    #[error("invalid target index at {path}: {message}")]
    Index {
        /// Path to the index file.
        path: PathBuf,
        /// Parse error message.
        message: String,
    },

    /// A label failed validation.
    #[error("invalid label: {0}")]
    InvalidLabel(String),
}

/// Errors from obtaining and activating a target's module.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    /// The requested target is not part of the registry.
    #[error("target not found: {0}")]
    NotFound(TargetLabel),

    /// The raw module could not be fetched.
    #[error("failed to fetch module for {target}: {message}")]
    Fetch {
        /// Target whose module was requested.
        target: TargetLabel,
        /// Transport failure reason.
        message: String,
    },

    /// The module was fetched but failed to activate.
    #[error("failed to activate module for {target}: {message}")]
    Activation {
        /// Target whose module failed to activate.
        target: TargetLabel,
        /// Activation failure reason.
        message: String,
    },

    /// The module bytes do not match the digest recorded in the index.
    #[error("module hash mismatch for {target}: expected {expected}, got {actual}")]
    HashMismatch {
        /// Target whose module failed verification.
        target: TargetLabel,
        /// Digest recorded in the index.
        expected: String,
        /// Digest of the fetched bytes.
        actual: String,
    },
}

/// Errors raised while invoking a macro on a loaded module.
#[derive(Debug, Clone, Error)]
pub enum ExpansionError {
    /// The module does not export the requested macro.
    #[error("macro {0} is not exported by this module")]
    UnknownMacro(MacroId),

    /// The macro ran and reported a failure (malformed input, trap, timeout).
    #[error("{message}")]
    Failed {
        /// Macro that failed.
        macro_id: MacroId,
        /// Failure reported by the module.
        message: String,
    },

    /// The macro panicked on the worker thread.
    #[error("macro {0} panicked")]
    Panicked(MacroId),
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Result type for module loading.
pub type LoadResult<T> = Result<T, LoadError>;

/// Result type for macro invocation.
pub type ExpansionResult<T> = Result<T, ExpansionError>;
