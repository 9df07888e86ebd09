//! Expandinator Registry - target discovery and macro module loading.
//!
//! This crate provides:
//! - [`TargetRegistry`]: the ordered target list and memoized macro metadata
//! - [`ModuleLoader`]: per-target module slots, activated at most once
//! - [`TargetSource`] implementations for bundled targets ([`StaticSource`])
//!   and output directories of WASM modules ([`DirectorySource`])
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use expandinator_registry::{
//!     FnModule, MacroSet, ModuleLoader, StaticSource, TargetLabel, TargetRegistry,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let source = StaticSource::new().with_target(
//!     TargetLabel::new("demo 1")?,
//!     MacroSet::from_pairs([("#[derive(Shout)]", "expand_shout")])?,
//!     FnModule::new().with_macro("expand_shout", |s| Ok(s.to_uppercase())),
//! );
//!
//! let registry = TargetRegistry::connect(Arc::new(source)).await?;
//! let loader = ModuleLoader::new(&registry);
//!
//! let target = &registry.targets()[0];
//! let macros = registry.macros(target).await?;
//! let module = loader.load(target).await?;
//! let entry = macros.by_label("#[derive(Shout)]").unwrap();
//! assert_eq!(module.expand(&entry.id, "struct a;")?, "STRUCT A;");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod directory;
mod error;
mod loader;
mod module;
mod registry;
mod source;
mod target;
mod wasm;

pub use directory::{DirectorySource, INDEX_FILE_NAME, IndexEntry, TargetIndex};
pub use error::{
    ExpansionError, ExpansionResult, LoadError, LoadResult, RegistryError, RegistryResult,
};
pub use loader::{ModuleLoader, ModuleSlot};
pub use module::{FnModule, MacroFn, MacroModule, ModuleArtifact};
pub use registry::TargetRegistry;
pub use source::{StaticSource, TargetSource};
pub use target::{MacroEntry, MacroId, MacroSet, TargetLabel};
pub use wasm::{ACTIVATE_EXPORT, WasmArtifact, WasmLimits, WasmModule, verify_hash};
