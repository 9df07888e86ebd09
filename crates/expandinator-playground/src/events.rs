//! Messages flowing into and out of the playground.

use std::ops::Range;
use std::sync::Arc;

use expandinator_registry::{MacroId, MacroSet, TargetLabel};
use serde::{Deserialize, Serialize};

use crate::selection::{ModuleStatus, SelectionEpoch};
use crate::view::SelectorOption;

/// A user intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaygroundEvent {
    /// A target was picked, `None` for the placeholder option.
    SelectTarget(Option<TargetLabel>),
    /// A macro was picked, `None` for the placeholder option.
    SelectMacro(Option<MacroId>),
    /// The input document was edited.
    EditInput {
        /// Replaced byte range.
        range: Range<usize>,
        /// Inserted text.
        text: String,
    },
}

/// Result of async work, tagged with the selection it was started for.
#[derive(Debug)]
pub enum Completion {
    /// Macro metadata of `target` resolved.
    Macros {
        /// Selection epoch at request time.
        epoch: SelectionEpoch,
        /// Requested target.
        target: TargetLabel,
        /// Fetched set or failure reason.
        result: Result<Arc<MacroSet>, String>,
    },
    /// Module of `target` finished loading.
    Module {
        /// Selection epoch at request time.
        epoch: SelectionEpoch,
        /// Requested target.
        target: TargetLabel,
        /// Failure reason, if loading failed.
        result: Result<(), String>,
    },
    /// A macro call finished.
    Expansion {
        /// Selection epoch at request time.
        epoch: SelectionEpoch,
        /// Driver sequence number.
        seq: u64,
        /// Expanded text or diagnostic.
        output: String,
    },
}

/// Notification for hosts rendering the playground.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ViewUpdate {
    /// The target selector changed.
    TargetOptions(Vec<SelectorOption>),
    /// The macro selector changed.
    MacroOptions(Vec<SelectorOption>),
    /// Module state of the current target changed.
    Module(Option<ModuleStatus>),
    /// The output document was replaced.
    Output(String),
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn view_updates_serialize_as_tagged_json() {
        let output = serde_json::to_value(ViewUpdate::Output("// loading T1...".into())).unwrap();
        assert_eq!(output, json!({"kind": "output", "data": "// loading T1..."}));

        let failed = ViewUpdate::Module(Some(ModuleStatus::Failed("trap".into())));
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            json!({"kind": "module", "data": {"status": "failed", "reason": "trap"}})
        );
    }

    #[test]
    fn hosts_can_read_selector_updates_back() {
        let raw = r#"{"kind":"macro_options","data":[
            {"label":"Select a macro","value":null,"selected":false},
            {"label":"Debug","value":"debug_expand","selected":true}
        ]}"#;
        let update: ViewUpdate = serde_json::from_str(raw).unwrap();
        let ViewUpdate::MacroOptions(options) = update else {
            panic!("expected macro options, got: {update:?}");
        };
        assert_eq!(options[1].value.as_deref(), Some("debug_expand"));
        assert!(options[1].selected);
    }
}
