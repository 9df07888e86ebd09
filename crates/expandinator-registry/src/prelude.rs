//! Prelude module - commonly used types for convenient import.
//!
//! Use `use expandinator_registry::prelude::*;` to import all essential types.

// Errors
pub use crate::{ExpansionError, LoadError, RegistryError};

// Identifiers and metadata
pub use crate::{MacroEntry, MacroId, MacroSet, TargetLabel};

// Registry and loading
pub use crate::{MacroModule, ModuleLoader, ModuleSlot, TargetRegistry, TargetSource};

// Sources
pub use crate::{DirectorySource, StaticSource};
