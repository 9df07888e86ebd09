//! Expansion driver: decides what the output pane shows.
//!
//! Every trigger asks the driver for an [`ExpansionPlan`]. Either the output
//! is a placeholder known at once, or a macro call has to run on a blocking
//! worker. Calls are numbered and only the newest one may write the output.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use expandinator_registry::{ExpansionError, ExpansionResult, MacroEntry, MacroId, MacroModule};
use tracing::trace;

use crate::selection::{MacroOptions, ModuleStatus, SelectionController};

/// Output document before the first trigger.
pub const INITIAL_OUTPUT: &str = "// enter input and the macro will be expanded";

/// Output while no macro is selected.
pub const SELECT_MACRO_PLACEHOLDER: &str =
    "// enter input and pick a macro and the macro will be expanded";

/// Output while the selected macro's module is still loading.
#[must_use]
pub fn loading_placeholder(target: &impl std::fmt::Display) -> String {
    format!("// loading {target}...")
}

/// Output when the target's module could not be loaded.
#[must_use]
pub fn module_failure(target: &impl std::fmt::Display, reason: &str) -> String {
    format!("// failed to load {target}: {reason}")
}

/// Output when the target's macro list could not be loaded.
#[must_use]
pub fn metadata_failure(target: &impl std::fmt::Display, reason: &str) -> String {
    format!("// failed to load macros for {target}: {reason}")
}

/// Render a macro failure as a comment block.
#[must_use]
pub fn render_diagnostic(macro_label: &str, error: &ExpansionError) -> String {
    let mut out = format!("// expansion of {macro_label} failed:");
    let message = error.to_string();
    let mut lines = message.lines().peekable();
    if lines.peek().is_none() {
        out.push_str("\n// (no message)");
    }
    for line in lines {
        out.push_str("\n// ");
        out.push_str(line);
    }
    out
}

/// Call `macro_id` on `module`, turning a panic into an error.
///
/// # Errors
///
/// Returns [`ExpansionError::UnknownMacro`] if the module lacks the export,
/// [`ExpansionError::Panicked`] if the call panics, or the module's error.
pub fn invoke(module: &dyn MacroModule, macro_id: &MacroId, input: &str) -> ExpansionResult<String> {
    if !module.exports(macro_id) {
        return Err(ExpansionError::UnknownMacro(macro_id.clone()));
    }
    panic::catch_unwind(AssertUnwindSafe(|| module.expand(macro_id, input)))
        .unwrap_or_else(|_| Err(ExpansionError::Panicked(macro_id.clone())))
}

/// A macro call to run off the event context.
pub struct ExpansionRequest {
    /// Sequence number assigned by the driver.
    pub seq: u64,
    /// Module of the current target.
    pub module: Arc<dyn MacroModule>,
    /// Selected macro.
    pub entry: MacroEntry,
    /// Full input document.
    pub input: String,
}

impl ExpansionRequest {
    /// Run the call and produce the output text, a diagnostic on failure.
    #[must_use]
    pub fn run(&self) -> String {
        match invoke(self.module.as_ref(), &self.entry.id, &self.input) {
            Ok(text) => text,
            Err(e) => render_diagnostic(&self.entry.label, &e),
        }
    }
}

impl std::fmt::Debug for ExpansionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpansionRequest")
            .field("seq", &self.seq)
            .field("entry", &self.entry)
            .field("input_len", &self.input.len())
            .finish_non_exhaustive()
    }
}

/// What to do in response to a trigger.
#[derive(Debug)]
pub enum ExpansionPlan {
    /// Write this text to the output now.
    Placeholder(String),
    /// Run the call and write its result if it is still the newest.
    Invoke(ExpansionRequest),
}

/// Sequences expansion requests.
#[derive(Debug, Default)]
pub struct ExpansionDriver {
    next_seq: u64,
    latest: Option<u64>,
}

impl ExpansionDriver {
    /// Create a driver with no requests issued.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide the output for the current selection and input.
    ///
    /// A placeholder plan also retires any call still in flight.
    pub fn plan(&mut self, selection: &SelectionController, input: &str) -> ExpansionPlan {
        let Some(target) = selection.target() else {
            return self.placeholder(SELECT_MACRO_PLACEHOLDER);
        };
        if let MacroOptions::Failed(reason) = selection.macro_options() {
            return self.placeholder(metadata_failure(target, reason));
        }
        let Some(entry) = selection.selected_macro() else {
            return self.placeholder(SELECT_MACRO_PLACEHOLDER);
        };
        if let Some(ModuleStatus::Failed(reason)) = selection.module_status() {
            return self.placeholder(module_failure(target, &reason));
        }
        let Some(module) = selection.module() else {
            return self.placeholder(loading_placeholder(target));
        };

        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.latest = Some(seq);
        trace!(seq, macro_id = %entry.id, input_len = input.len(), "Planned expansion");
        ExpansionPlan::Invoke(ExpansionRequest {
            seq,
            module,
            entry: entry.clone(),
            input: input.to_owned(),
        })
    }

    /// Whether `seq` is the newest outstanding call.
    #[must_use]
    pub fn is_latest(&self, seq: u64) -> bool {
        self.latest == Some(seq)
    }

    fn placeholder(&mut self, text: impl Into<String>) -> ExpansionPlan {
        self.latest = None;
        ExpansionPlan::Placeholder(text.into())
    }
}

#[cfg(test)]
mod tests {
    use expandinator_registry::{
        FnModule, MacroSet, ModuleLoader, StaticSource, TargetLabel, TargetRegistry,
    };

    use super::*;

    fn module() -> FnModule {
        FnModule::new()
            .with_macro("debug_expand", |input| {
                if input.ends_with('(') {
                    Err("unexpected end of input\nexpected `)`".into())
                } else {
                    Ok("EXPANDED".into())
                }
            })
            .with_macro("boom", |_| panic!("macro bug"))
    }

    async fn ready_selection(macro_id: &str) -> SelectionController {
        let t1 = TargetLabel::from_static("T1");
        let set = MacroSet::from_pairs([("Debug", "debug_expand"), ("Boom", "boom")]).unwrap();
        let source = StaticSource::new().with_target(t1.clone(), set, module());
        let registry = TargetRegistry::connect(Arc::new(source)).await.unwrap();
        let loader = ModuleLoader::new(&registry);
        loader.load(&t1).await.unwrap();

        let mut selection = SelectionController::new();
        let cached = registry.macros(&t1).await.unwrap();
        selection.select_target(t1.clone(), Some(cached), loader.slot(&t1).unwrap());
        selection.select_macro(Some(&MacroId::new(macro_id))).unwrap();
        selection
    }

    fn run(plan: ExpansionPlan) -> String {
        match plan {
            ExpansionPlan::Invoke(request) => request.run(),
            ExpansionPlan::Placeholder(text) => panic!("expected invoke, got {text}"),
        }
    }

    #[test]
    fn no_target_yields_select_placeholder() {
        let mut driver = ExpansionDriver::new();
        let plan = driver.plan(&SelectionController::new(), "foo!()");
        assert!(matches!(plan, ExpansionPlan::Placeholder(ref t) if t == SELECT_MACRO_PLACEHOLDER));
    }

    #[tokio::test]
    async fn ready_macro_is_invoked() {
        let selection = ready_selection("debug_expand").await;
        let mut driver = ExpansionDriver::new();
        assert_eq!(run(driver.plan(&selection, "foo!()")), "EXPANDED");
    }

    #[tokio::test]
    async fn repeated_expansion_is_identical() {
        let selection = ready_selection("debug_expand").await;
        let mut driver = ExpansionDriver::new();
        let first = run(driver.plan(&selection, "foo!()"));
        let second = run(driver.plan(&selection, "foo!()"));
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn failure_renders_each_line_as_comment() {
        let selection = ready_selection("debug_expand").await;
        let mut driver = ExpansionDriver::new();
        assert_eq!(
            run(driver.plan(&selection, "foo!(")),
            "// expansion of Debug failed:\n// unexpected end of input\n// expected `)`"
        );
    }

    #[tokio::test]
    async fn panic_is_contained() {
        let selection = ready_selection("boom").await;
        let mut driver = ExpansionDriver::new();
        assert_eq!(
            run(driver.plan(&selection, "")),
            "// expansion of Boom failed:\n// macro boom panicked"
        );
    }

    #[tokio::test]
    async fn only_newest_call_is_latest() {
        let selection = ready_selection("debug_expand").await;
        let mut driver = ExpansionDriver::new();
        let ExpansionPlan::Invoke(first) = driver.plan(&selection, "a") else {
            panic!("expected invoke");
        };
        let ExpansionPlan::Invoke(second) = driver.plan(&selection, "ab") else {
            panic!("expected invoke");
        };
        assert!(!driver.is_latest(first.seq));
        assert!(driver.is_latest(second.seq));

        driver.plan(&SelectionController::new(), "ab");
        assert!(!driver.is_latest(second.seq));
    }

    #[test]
    fn missing_export_is_reported() {
        let err = invoke(&FnModule::new(), &MacroId::new("nope"), "").unwrap_err();
        assert!(matches!(err, ExpansionError::UnknownMacro(_)));
    }
}
