//! Expandinator Playground - selection state, expansion driver, and editor
//! panes.
//!
//! A [`Playground`] keeps an input pane, a read-only output pane, a target
//! selector, and a macro selector consistent while the user changes them:
//!
//! - selecting a target clears the macro, then fetches the target's macro
//!   list and module in the background
//! - selecting a macro or editing the input re-runs the macro over the whole
//!   input document on a blocking worker
//! - results of superseded selections and calls are discarded
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use expandinator_playground::{Playground, PlaygroundOptions, TextDocumentFactory};
//! use expandinator_registry::{FnModule, MacroId, MacroSet, StaticSource, TargetLabel, TargetRegistry};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let source = StaticSource::new().with_target(
//!     TargetLabel::new("demo 1")?,
//!     MacroSet::from_pairs([("#[derive(Shout)]", "expand_shout")])?,
//!     FnModule::new().with_macro("expand_shout", |s| Ok(s.to_uppercase())),
//! );
//! let registry = TargetRegistry::connect(Arc::new(source)).await?;
//! let mut playground =
//!     Playground::new(registry, &TextDocumentFactory, PlaygroundOptions::default());
//!
//! playground.select_target(Some(TargetLabel::new("demo 1")?))?;
//! playground.settle().await;
//! playground.select_macro(Some(&MacroId::new("expand_shout")))?;
//! playground.set_input("struct a;")?;
//! playground.settle().await;
//! assert_eq!(playground.output_text(), "STRUCT A;");
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

mod driver;
mod editor;
mod error;
mod events;
mod playground;
mod selection;
mod session;
mod view;

pub use driver::{
    ExpansionDriver, ExpansionPlan, ExpansionRequest, INITIAL_OUTPUT, SELECT_MACRO_PLACEHOLDER,
    invoke, loading_placeholder, metadata_failure, module_failure, render_diagnostic,
};
pub use editor::{
    EditorFactory, EditorOptions, EditorSurface, Language, TextDocument, TextDocumentFactory,
};
pub use error::{EditorError, EditorResult, PlaygroundError, PlaygroundResult};
pub use events::{Completion, PlaygroundEvent, ViewUpdate};
pub use playground::{
    DEFAULT_UPDATE_CAPACITY, INPUT_MOUNT, OUTPUT_MOUNT, Playground, PlaygroundOptions,
};
pub use selection::{MacroOptions, ModuleStatus, SelectionController, SelectionEpoch};
pub use session::{directory_source, playground_options};
pub use view::{
    FAILED_MACROS_LABEL, LOADING_MACROS_LABEL, SELECT_MACRO_LABEL, SELECT_TARGET_LABEL,
    SelectorOption, macro_options, target_options,
};
