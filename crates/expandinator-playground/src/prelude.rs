//! Prelude module - commonly used types for convenient import.
//!
//! Use `use expandinator_playground::prelude::*;` to import all essential types.

// Errors
pub use crate::{EditorError, PlaygroundError, PlaygroundResult};

// Playground
pub use crate::{Playground, PlaygroundEvent, PlaygroundOptions, ViewUpdate};

// Selection and output
pub use crate::{MacroOptions, ModuleStatus, SelectionController, SelectorOption};

// Editors
pub use crate::{EditorSurface, TextDocument, TextDocumentFactory};
