//! Fixture targets shared by playground and integration tests.

use expandinator_registry::{FnModule, MacroSet, StaticSource, TargetLabel};

use crate::mocks::GatedSource;

/// Output of the `debug_expand` fixture macro on balanced input.
pub const EXPANDED: &str = "EXPANDED";

/// First fixture target.
#[must_use]
pub fn t1() -> TargetLabel {
    TargetLabel::from_static("T1")
}

/// Second fixture target.
#[must_use]
pub fn t2() -> TargetLabel {
    TargetLabel::from_static("T2")
}

/// `{"Debug": "debug_expand"}`.
#[must_use]
pub fn debug_macros() -> MacroSet {
    MacroSet::from_pairs([("Debug", "debug_expand")]).unwrap_or_default()
}

/// `{"Clone": "clone_expand", "Copy": "copy_expand"}`.
#[must_use]
pub fn clone_macros() -> MacroSet {
    MacroSet::from_pairs([("Clone", "clone_expand"), ("Copy", "copy_expand")]).unwrap_or_default()
}

/// Module of `T1`: `debug_expand` returns [`EXPANDED`] and rejects input
/// with unbalanced parentheses.
#[must_use]
pub fn debug_module() -> FnModule {
    FnModule::new().with_macro("debug_expand", |input| {
        let open = input.matches('(').count();
        let close = input.matches(')').count();
        if open == close {
            Ok(EXPANDED.to_string())
        } else {
            Err(format!(
                "unexpected end of input\n{open} `(` but {close} `)`"
            ))
        }
    })
}

/// Module of `T2`: both macros echo their input with a marker comment.
#[must_use]
pub fn clone_module() -> FnModule {
    FnModule::new()
        .with_macro("clone_expand", |input| Ok(format!("// clone\n{input}")))
        .with_macro("copy_expand", |input| Ok(format!("// copy\n{input}")))
}

/// `T1` and `T2` as an immediately available source.
#[must_use]
pub fn scenario_source() -> StaticSource {
    StaticSource::new()
        .with_target(t1(), debug_macros(), debug_module())
        .with_target(t2(), clone_macros(), clone_module())
}

/// `T1` and `T2` behind closed gates.
#[must_use]
pub fn gated_scenario_source() -> GatedSource {
    GatedSource::new()
        .with_target(t1(), debug_macros(), debug_module())
        .with_target(t2(), clone_macros(), clone_module())
}

#[cfg(test)]
mod tests {
    use expandinator_registry::{MacroId, MacroModule};

    use super::*;

    #[test]
    fn debug_module_rejects_unbalanced_input() {
        let module = debug_module();
        let id = MacroId::new("debug_expand");
        assert_eq!(module.expand(&id, "foo!()").unwrap(), EXPANDED);
        assert!(module.expand(&id, "foo!(").is_err());
    }

    #[test]
    fn fixture_sets_are_complete() {
        assert_eq!(debug_macros().len(), 1);
        assert_eq!(clone_macros().len(), 2);
    }
}
