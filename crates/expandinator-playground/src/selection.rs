//! Two-level selection state: target, then macro.

use std::fmt;
use std::sync::Arc;

use expandinator_registry::{MacroEntry, MacroId, MacroModule, MacroSet, ModuleSlot, TargetLabel};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PlaygroundError, PlaygroundResult};

/// Generation counter of the target selection.
///
/// Bumped on every target change. Async results carry the epoch they were
/// started under and are dropped when it is no longer current.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SelectionEpoch(u64);

impl SelectionEpoch {
    #[must_use]
    fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for SelectionEpoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State of the current target's macro list.
#[derive(Debug, Clone, Default)]
pub enum MacroOptions {
    /// No target selected.
    #[default]
    Idle,
    /// Metadata requested, not yet resolved.
    Loading,
    /// Metadata available.
    Ready(Arc<MacroSet>),
    /// Metadata could not be fetched or decoded.
    Failed(String),
}

impl MacroOptions {
    /// The macro set, when resolved.
    #[must_use]
    pub fn set(&self) -> Option<&Arc<MacroSet>> {
        match self {
            Self::Ready(set) => Some(set),
            _ => None,
        }
    }
}

/// Load state of the current target's module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum ModuleStatus {
    /// Load in progress.
    Pending,
    /// Module activated and invocable.
    Ready,
    /// Fetch or activation failed.
    Failed(String),
}

/// Selection of target and macro, with the state derived from it.
///
/// Changing the target always clears the macro before anything else, so a
/// macro of the previous target can never be invoked against the new one.
#[derive(Default)]
pub struct SelectionController {
    target: Option<TargetLabel>,
    selected: Option<MacroEntry>,
    epoch: SelectionEpoch,
    options: MacroOptions,
    slot: Option<Arc<ModuleSlot>>,
    module_failure: Option<String>,
}

impl SelectionController {
    /// Start with nothing selected.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch to `target`.
    ///
    /// `cached` is the target's macro set if it is already resolved, `slot` the
    /// loader's cache entry for its module. Returns the new epoch, which async
    /// work for this selection must carry.
    pub fn select_target(
        &mut self,
        target: TargetLabel,
        cached: Option<Arc<MacroSet>>,
        slot: Arc<ModuleSlot>,
    ) -> SelectionEpoch {
        self.selected = None;
        self.epoch = self.epoch.next();
        self.options = cached.map_or(MacroOptions::Loading, MacroOptions::Ready);
        self.slot = Some(slot);
        self.module_failure = None;
        debug!(target_label = %target, epoch = %self.epoch, "Target selected");
        self.target = Some(target);
        self.epoch
    }

    /// Return to the "no target" state.
    pub fn clear_target(&mut self) -> SelectionEpoch {
        self.selected = None;
        self.epoch = self.epoch.next();
        self.options = MacroOptions::Idle;
        self.slot = None;
        self.module_failure = None;
        self.target = None;
        self.epoch
    }

    /// Select a macro of the current target, or clear the macro with `None`.
    ///
    /// # Errors
    ///
    /// Rejects the selection, leaving state unchanged, when no target is
    /// selected, its macros are not resolved, or `macro_id` is not in the set.
    pub fn select_macro(&mut self, macro_id: Option<&MacroId>) -> PlaygroundResult<()> {
        let Some(macro_id) = macro_id else {
            self.selected = None;
            return Ok(());
        };
        let target = self.target.as_ref().ok_or(PlaygroundError::NoTarget)?;
        let set = self
            .options
            .set()
            .ok_or_else(|| PlaygroundError::MacrosNotReady(target.clone()))?;
        let entry = set
            .by_id(macro_id)
            .ok_or_else(|| PlaygroundError::UnknownMacro {
                target: target.clone(),
                macro_id: macro_id.clone(),
            })?;
        self.selected = Some(entry.clone());
        Ok(())
    }

    /// Record the outcome of a macro metadata fetch started under `epoch`.
    ///
    /// Returns `false` and changes nothing if `epoch` is stale.
    pub fn resolve_macros(
        &mut self,
        epoch: SelectionEpoch,
        result: Result<Arc<MacroSet>, String>,
    ) -> bool {
        if epoch != self.epoch || self.target.is_none() {
            return false;
        }
        self.options = match result {
            Ok(set) => MacroOptions::Ready(set),
            Err(reason) => MacroOptions::Failed(reason),
        };
        true
    }

    /// Record the outcome of a module load started under `epoch`.
    ///
    /// Returns `false` and changes nothing if `epoch` is stale.
    pub fn resolve_module(&mut self, epoch: SelectionEpoch, result: Result<(), String>) -> bool {
        if epoch != self.epoch || self.target.is_none() {
            return false;
        }
        self.module_failure = result.err();
        true
    }

    /// Selected target.
    #[must_use]
    pub fn target(&self) -> Option<&TargetLabel> {
        self.target.as_ref()
    }

    /// Selected macro.
    #[must_use]
    pub fn selected_macro(&self) -> Option<&MacroEntry> {
        self.selected.as_ref()
    }

    /// Epoch of the current selection.
    #[must_use]
    pub fn epoch(&self) -> SelectionEpoch {
        self.epoch
    }

    /// Macro options of the selected target.
    #[must_use]
    pub fn macro_options(&self) -> &MacroOptions {
        &self.options
    }

    /// Module state of the current target, `None` without a target.
    #[must_use]
    pub fn module_status(&self) -> Option<ModuleStatus> {
        let slot = self.slot.as_ref()?;
        Some(if slot.is_ready() {
            ModuleStatus::Ready
        } else if let Some(reason) = &self.module_failure {
            ModuleStatus::Failed(reason.clone())
        } else {
            ModuleStatus::Pending
        })
    }

    /// The module of the current target once activated.
    #[must_use]
    pub fn module(&self) -> Option<Arc<dyn MacroModule>> {
        self.slot.as_ref()?.get()
    }

    /// Whether a macro is selected and its module can be called.
    #[must_use]
    pub fn is_invocable(&self) -> bool {
        self.selected.is_some() && self.module().is_some()
    }
}

impl fmt::Debug for SelectionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectionController")
            .field("target", &self.target)
            .field("selected", &self.selected)
            .field("epoch", &self.epoch)
            .field("options", &self.options)
            .field("module", &self.module_status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use expandinator_registry::{FnModule, ModuleLoader, StaticSource, TargetRegistry};

    use super::*;

    async fn loader() -> (TargetRegistry, ModuleLoader) {
        let source = StaticSource::new()
            .with_target(
                TargetLabel::from_static("T1"),
                MacroSet::from_pairs([("Debug", "debug_expand")]).unwrap(),
                FnModule::new().with_macro("debug_expand", |_| Ok("EXPANDED".into())),
            )
            .with_target(
                TargetLabel::from_static("T2"),
                MacroSet::from_pairs([("Clone", "clone_expand")]).unwrap(),
                FnModule::new(),
            );
        let registry = TargetRegistry::connect(Arc::new(source)).await.unwrap();
        let loader = ModuleLoader::new(&registry);
        (registry, loader)
    }

    fn debug_set() -> Arc<MacroSet> {
        Arc::new(MacroSet::from_pairs([("Debug", "debug_expand")]).unwrap())
    }

    #[tokio::test]
    async fn initial_state_is_idle() {
        let controller = SelectionController::new();
        assert!(controller.target().is_none());
        assert!(controller.selected_macro().is_none());
        assert!(matches!(controller.macro_options(), MacroOptions::Idle));
        assert!(controller.module_status().is_none());
        assert!(!controller.is_invocable());
    }

    #[tokio::test]
    async fn target_change_clears_macro_and_bumps_epoch() {
        let (_registry, loader) = loader().await;
        let t1 = TargetLabel::from_static("T1");
        let t2 = TargetLabel::from_static("T2");
        let mut controller = SelectionController::new();

        let e1 = controller.select_target(t1.clone(), Some(debug_set()), loader.slot(&t1).unwrap());
        controller
            .select_macro(Some(&MacroId::new("debug_expand")))
            .unwrap();
        assert!(controller.selected_macro().is_some());

        let e2 = controller.select_target(t2.clone(), None, loader.slot(&t2).unwrap());
        assert!(e2 > e1);
        assert!(controller.selected_macro().is_none());
        assert!(matches!(controller.macro_options(), MacroOptions::Loading));
        assert_eq!(controller.module_status(), Some(ModuleStatus::Pending));
    }

    #[tokio::test]
    async fn macro_outside_set_is_rejected_without_change() {
        let (_registry, loader) = loader().await;
        let t1 = TargetLabel::from_static("T1");
        let mut controller = SelectionController::new();

        assert!(matches!(
            controller.select_macro(Some(&MacroId::new("debug_expand"))),
            Err(PlaygroundError::NoTarget)
        ));

        let epoch = controller.select_target(t1.clone(), None, loader.slot(&t1).unwrap());
        assert!(matches!(
            controller.select_macro(Some(&MacroId::new("debug_expand"))),
            Err(PlaygroundError::MacrosNotReady(_))
        ));

        assert!(controller.resolve_macros(epoch, Ok(debug_set())));
        controller
            .select_macro(Some(&MacroId::new("debug_expand")))
            .unwrap();
        let err = controller
            .select_macro(Some(&MacroId::new("clone_expand")))
            .unwrap_err();
        assert!(matches!(err, PlaygroundError::UnknownMacro { .. }));
        assert_eq!(
            controller.selected_macro().map(|e| e.id.as_str()),
            Some("debug_expand")
        );
    }

    #[tokio::test]
    async fn stale_results_are_ignored() {
        let (_registry, loader) = loader().await;
        let t1 = TargetLabel::from_static("T1");
        let t2 = TargetLabel::from_static("T2");
        let mut controller = SelectionController::new();

        let old = controller.select_target(t1.clone(), None, loader.slot(&t1).unwrap());
        let current = controller.select_target(t2.clone(), None, loader.slot(&t2).unwrap());

        assert!(!controller.resolve_macros(old, Ok(debug_set())));
        assert!(!controller.resolve_module(old, Err("boom".into())));
        assert!(matches!(controller.macro_options(), MacroOptions::Loading));
        assert_eq!(controller.module_status(), Some(ModuleStatus::Pending));

        assert!(controller.resolve_module(current, Err("boom".into())));
        assert_eq!(
            controller.module_status(),
            Some(ModuleStatus::Failed("boom".into()))
        );
    }

    #[tokio::test]
    async fn ready_slot_makes_selection_invocable() {
        let (_registry, loader) = loader().await;
        let t1 = TargetLabel::from_static("T1");
        loader.load(&t1).await.unwrap();

        let mut controller = SelectionController::new();
        controller.select_target(t1.clone(), Some(debug_set()), loader.slot(&t1).unwrap());
        assert_eq!(controller.module_status(), Some(ModuleStatus::Ready));
        assert!(!controller.is_invocable());

        controller
            .select_macro(Some(&MacroId::new("debug_expand")))
            .unwrap();
        assert!(controller.is_invocable());

        controller.select_macro(None).unwrap();
        assert!(!controller.is_invocable());
    }

    #[tokio::test]
    async fn clearing_target_returns_to_idle() {
        let (_registry, loader) = loader().await;
        let t1 = TargetLabel::from_static("T1");
        let mut controller = SelectionController::new();
        let before = controller.select_target(t1.clone(), Some(debug_set()), loader.slot(&t1).unwrap());

        let after = controller.clear_target();
        assert!(after > before);
        assert!(controller.target().is_none());
        assert!(matches!(controller.macro_options(), MacroOptions::Idle));
        assert!(!controller.resolve_macros(after, Ok(debug_set())));
    }
}
