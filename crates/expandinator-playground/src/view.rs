//! Selector contents for rendering hosts.

use expandinator_registry::{MacroId, TargetLabel};
use serde::{Deserialize, Serialize};

use crate::selection::MacroOptions;

/// Placeholder of the target selector.
pub const SELECT_TARGET_LABEL: &str = "Select a crate";
/// Placeholder of the macro selector.
pub const SELECT_MACRO_LABEL: &str = "Select a macro";
/// Placeholder while macro metadata loads.
pub const LOADING_MACROS_LABEL: &str = "Loading macros...";
/// Placeholder when macro metadata failed to load.
pub const FAILED_MACROS_LABEL: &str = "Failed to load macros";

/// One entry of a selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorOption {
    /// Displayed text.
    pub label: String,
    /// Value sent back on selection, `None` for a placeholder.
    pub value: Option<String>,
    /// Whether this option is the current selection.
    pub selected: bool,
}

impl SelectorOption {
    fn placeholder(label: &str, selected: bool) -> Self {
        Self {
            label: label.to_owned(),
            value: None,
            selected,
        }
    }
}

/// Target selector: placeholder, then every target in index order.
#[must_use]
pub fn target_options(targets: &[TargetLabel], current: Option<&TargetLabel>) -> Vec<SelectorOption> {
    std::iter::once(SelectorOption::placeholder(
        SELECT_TARGET_LABEL,
        current.is_none(),
    ))
    .chain(targets.iter().map(|t| SelectorOption {
        label: t.to_string(),
        value: Some(t.to_string()),
        selected: current == Some(t),
    }))
    .collect()
}

/// Macro selector for the given option state.
#[must_use]
pub fn macro_options(options: &MacroOptions, current: Option<&MacroId>) -> Vec<SelectorOption> {
    match options {
        MacroOptions::Idle => vec![SelectorOption::placeholder(SELECT_MACRO_LABEL, true)],
        MacroOptions::Loading => vec![SelectorOption::placeholder(LOADING_MACROS_LABEL, true)],
        MacroOptions::Failed(_) => vec![SelectorOption::placeholder(FAILED_MACROS_LABEL, true)],
        MacroOptions::Ready(set) => {
            // Several labels may share an export; the first one is the selection.
            let chosen = current.and_then(|id| set.by_id(id));
            std::iter::once(SelectorOption::placeholder(
                SELECT_MACRO_LABEL,
                current.is_none(),
            ))
            .chain(set.iter().map(|entry| SelectorOption {
                label: entry.label.clone(),
                value: Some(entry.id.to_string()),
                selected: chosen.is_some_and(|c| std::ptr::eq(c, entry)),
            }))
            .collect()
        },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use expandinator_registry::MacroSet;

    use super::*;

    #[test]
    fn target_placeholder_comes_first() {
        let targets = [
            TargetLabel::from_static("serde_derive 1"),
            TargetLabel::from_static("thiserror-impl 1"),
        ];
        let options = target_options(&targets, Some(&targets[1]));
        let labels: Vec<_> = options.iter().map(|o| o.label.as_str()).collect();
        assert_eq!(labels, ["Select a crate", "serde_derive 1", "thiserror-impl 1"]);
        assert!(options[0].value.is_none());
        assert!(options[2].selected);
        assert!(!options[0].selected);
    }

    #[test]
    fn ready_macros_keep_metadata_order() {
        let set = MacroSet::from_pairs([
            ("#[derive(Serialize)]", "expand_serialize"),
            ("#[derive(Deserialize)]", "expand_deserialize"),
        ])
        .unwrap();
        let options = macro_options(
            &MacroOptions::Ready(Arc::new(set)),
            Some(&MacroId::new("expand_deserialize")),
        );
        assert_eq!(options.len(), 3);
        assert_eq!(options[0].label, "Select a macro");
        assert_eq!(options[1].value.as_deref(), Some("expand_serialize"));
        assert!(options[2].selected);
    }

    #[test]
    fn loading_shows_single_placeholder() {
        let options = macro_options(&MacroOptions::Loading, None);
        assert_eq!(options.len(), 1);
        assert_eq!(options[0].label, "Loading macros...");
    }

    #[test]
    fn shared_export_selects_only_the_first_label() {
        let set = MacroSet::from_pairs([
            ("Debug", "derive_debug"),
            ("Debug (alias)", "derive_debug"),
        ])
        .unwrap();
        let options = macro_options(
            &MacroOptions::Ready(Arc::new(set)),
            Some(&MacroId::new("derive_debug")),
        );
        let selected: Vec<_> = options
            .iter()
            .filter(|o| o.selected)
            .map(|o| o.label.as_str())
            .collect();
        assert_eq!(selected, ["Debug"]);
    }
}
