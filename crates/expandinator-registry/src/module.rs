//! Invocable module handles and the artifacts they are activated from.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{ExpansionError, ExpansionResult, LoadResult};
use crate::target::MacroId;

/// A loaded, activated module exposing macro functions by export name.
///
/// Implementations must be callable from blocking worker threads, so any
/// interior mutability has to be synchronized.
pub trait MacroModule: Send + Sync {
    /// Whether the module exports `macro_id`.
    fn exports(&self, macro_id: &MacroId) -> bool;

    /// Run `macro_id` over `input` and return the expanded source text.
    ///
    /// # Errors
    ///
    /// Returns [`ExpansionError::UnknownMacro`] if the export is missing, or
    /// [`ExpansionError::Failed`] if the macro rejects the input.
    fn expand(&self, macro_id: &MacroId, input: &str) -> ExpansionResult<String>;
}

/// A raw module as fetched from a target source, before activation.
#[async_trait]
pub trait ModuleArtifact: Send {
    /// Run the activation step and produce the ready handle.
    async fn activate(self: Box<Self>) -> LoadResult<Arc<dyn MacroModule>>;
}

/// Signature of an in-process macro function.
pub type MacroFn = Arc<dyn Fn(&str) -> Result<String, String> + Send + Sync>;

/// A module backed by in-process closures.
///
/// Used for bundled targets and in tests.
#[derive(Clone, Default)]
pub struct FnModule {
    functions: HashMap<MacroId, MacroFn>,
}

impl FnModule {
    /// Create a module without macros.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `f` under the export name `id`.
    #[must_use]
    pub fn with_macro<F>(mut self, id: impl Into<String>, f: F) -> Self
    where
        F: Fn(&str) -> Result<String, String> + Send + Sync + 'static,
    {
        self.functions.insert(MacroId::new(id), Arc::new(f));
        self
    }
}

impl MacroModule for FnModule {
    fn exports(&self, macro_id: &MacroId) -> bool {
        self.functions.contains_key(macro_id)
    }

    fn expand(&self, macro_id: &MacroId, input: &str) -> ExpansionResult<String> {
        let f = self
            .functions
            .get(macro_id)
            .ok_or_else(|| ExpansionError::UnknownMacro(macro_id.clone()))?;
        f(input).map_err(|message| ExpansionError::Failed {
            macro_id: macro_id.clone(),
            message,
        })
    }
}

#[async_trait]
impl ModuleArtifact for FnModule {
    async fn activate(self: Box<Self>) -> LoadResult<Arc<dyn MacroModule>> {
        Ok(Arc::new(*self))
    }
}

impl fmt::Debug for FnModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnModule")
            .field("exports", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fn_module_dispatches_by_export_name() {
        let module = FnModule::new()
            .with_macro("upper", |s| Ok(s.to_uppercase()))
            .with_macro("reject", |_| Err("expected `)`".to_string()));

        assert!(module.exports(&MacroId::new("upper")));
        assert_eq!(module.expand(&MacroId::new("upper"), "ab").unwrap(), "AB");

        let err = module.expand(&MacroId::new("reject"), "foo!(").unwrap_err();
        assert!(matches!(err, ExpansionError::Failed { .. }));
        assert_eq!(err.to_string(), "expected `)`");
    }

    #[test]
    fn missing_export_is_unknown_macro() {
        let module = FnModule::new();
        let err = module.expand(&MacroId::new("nope"), "").unwrap_err();
        assert!(matches!(err, ExpansionError::UnknownMacro(_)));
    }
}
