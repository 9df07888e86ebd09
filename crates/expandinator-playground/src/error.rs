//! Playground and editor error types.

use expandinator_config::ConfigError;
use expandinator_registry::{MacroId, RegistryError, TargetLabel};
use thiserror::Error;

/// Errors from editing a document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditorError {
    /// A user edit was sent to a non-editable surface.
    #[error("editor '{mount}' is read-only")]
    ReadOnly {
        /// Mount point of the surface.
        mount: String,
    },

    /// The edit range is out of bounds or not on a character boundary.
    #[error("invalid range {start}..{end} for document of length {len}")]
    InvalidRange {
        /// Range start (byte offset).
        start: usize,
        /// Range end (byte offset).
        end: usize,
        /// Document length in bytes.
        len: usize,
    },
}

/// Errors from handling a playground event.
#[derive(Debug, Error)]
pub enum PlaygroundError {
    /// A macro was chosen while no target is selected.
    #[error("no target selected")]
    NoTarget,

    /// A macro was chosen before the target's macro list resolved.
    #[error("macros for {0} are not loaded")]
    MacrosNotReady(TargetLabel),

    /// The chosen macro is not part of the current target's set.
    #[error("{target} has no macro {macro_id}")]
    UnknownMacro {
        /// Currently selected target.
        target: TargetLabel,
        /// Rejected macro.
        macro_id: MacroId,
    },

    /// Registry lookup failed (e.g. unknown target).
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Editor rejected an edit.
    #[error(transparent)]
    Editor(#[from] EditorError),

    /// Configuration could not be loaded or applied.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for editor operations.
pub type EditorResult<T> = Result<T, EditorError>;

/// Result type for playground operations.
pub type PlaygroundResult<T> = Result<T, PlaygroundError>;
