//! Module loader: per-target module slots with activate-once semantics.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::error::{LoadError, LoadResult};
use crate::module::MacroModule;
use crate::registry::TargetRegistry;
use crate::source::TargetSource;
use crate::target::TargetLabel;

/// Cache entry holding the activated module of one target.
///
/// The slot is created empty for every registered target and filled at most
/// once. Holders of the slot observe the module as soon as it resolves.
pub struct ModuleSlot {
    target: TargetLabel,
    module: OnceCell<Arc<dyn MacroModule>>,
}

impl ModuleSlot {
    fn new(target: TargetLabel) -> Self {
        Self {
            target,
            module: OnceCell::new(),
        }
    }

    /// Target this slot belongs to.
    #[must_use]
    pub fn target(&self) -> &TargetLabel {
        &self.target
    }

    /// The activated module, if loading has completed.
    #[must_use]
    pub fn get(&self) -> Option<Arc<dyn MacroModule>> {
        self.module.get().map(Arc::clone)
    }

    /// Whether the module has activated.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.module.initialized()
    }
}

impl std::fmt::Debug for ModuleSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleSlot")
            .field("target", &self.target)
            .field("ready", &self.is_ready())
            .finish()
    }
}

/// Obtains and activates target modules, memoized per target.
pub struct ModuleLoader {
    source: Arc<dyn TargetSource>,
    slots: HashMap<TargetLabel, Arc<ModuleSlot>>,
}

impl ModuleLoader {
    /// Create a loader with one empty slot per registry target.
    #[must_use]
    pub fn new(registry: &TargetRegistry) -> Self {
        let slots = registry
            .targets()
            .iter()
            .map(|t| (t.clone(), Arc::new(ModuleSlot::new(t.clone()))))
            .collect();
        Self {
            source: registry.source(),
            slots,
        }
    }

    /// The cache entry of `target`.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::NotFound`] for a target outside the registry.
    pub fn slot(&self, target: &TargetLabel) -> LoadResult<Arc<ModuleSlot>> {
        self.slots
            .get(target)
            .map(Arc::clone)
            .ok_or_else(|| LoadError::NotFound(target.clone()))
    }

    /// Fetch and activate the module of `target`, or return the cached one.
    ///
    /// Concurrent first calls share one fetch and one activation. A failure
    /// leaves the slot empty so a later call retries.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::NotFound`] for an unknown target, or the fetch or
    /// activation error.
    pub async fn load(&self, target: &TargetLabel) -> LoadResult<Arc<dyn MacroModule>> {
        let slot = self.slot(target)?;
        if let Some(module) = slot.get() {
            debug!(target_label = %target, "Module cache hit");
            return Ok(module);
        }

        let module = slot
            .module
            .get_or_try_init(|| async {
                let artifact = self.source.fetch_module(target).await?;
                let module = artifact.activate().await?;
                info!(target_label = %target, "Module ready");
                Ok::<_, LoadError>(module)
            })
            .await
            .inspect_err(|e| warn!(target_label = %target, error = %e, "Module load failed"))?;
        Ok(Arc::clone(module))
    }
}

impl std::fmt::Debug for ModuleLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleLoader")
            .field("slots", &self.slots.len())
            .field(
                "ready",
                &self.slots.values().filter(|s| s.is_ready()).count(),
            )
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::error::RegistryResult;
    use crate::module::{FnModule, ModuleArtifact};
    use crate::target::{MacroId, MacroSet};

    #[derive(Default)]
    struct CountingSource {
        fetches: AtomicUsize,
        activations: Arc<AtomicUsize>,
        fail_activation: bool,
    }

    struct CountingArtifact {
        activations: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl ModuleArtifact for CountingArtifact {
        async fn activate(self: Box<Self>) -> LoadResult<Arc<dyn MacroModule>> {
            self.activations.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(LoadError::Activation {
                    target: TargetLabel::from_static("t"),
                    message: "unreachable instruction".into(),
                });
            }
            Ok(Arc::new(
                FnModule::new().with_macro("id", |s| Ok(s.to_string())),
            ))
        }
    }

    #[async_trait]
    impl TargetSource for CountingSource {
        async fn list_targets(&self) -> RegistryResult<Vec<TargetLabel>> {
            Ok(vec![TargetLabel::from_static("t")])
        }

        async fn fetch_macros(&self, _target: &TargetLabel) -> RegistryResult<MacroSet> {
            Ok(MacroSet::default())
        }

        async fn fetch_module(
            &self,
            _target: &TargetLabel,
        ) -> LoadResult<Box<dyn ModuleArtifact>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            Ok(Box::new(CountingArtifact {
                activations: Arc::clone(&self.activations),
                fail: self.fail_activation,
            }))
        }
    }

    async fn loader(source: Arc<CountingSource>) -> ModuleLoader {
        let registry = TargetRegistry::connect(source).await.unwrap();
        ModuleLoader::new(&registry)
    }

    #[tokio::test]
    async fn module_is_activated_once() {
        let source = Arc::new(CountingSource::default());
        let loader = loader(source.clone()).await;
        let t = TargetLabel::from_static("t");

        let slot = loader.slot(&t).unwrap();
        assert!(!slot.is_ready());

        let (a, b) = tokio::join!(loader.load(&t), loader.load(&t));
        let (a, b) = (a.unwrap(), b.unwrap());
        assert!(Arc::ptr_eq(&a, &b));
        assert!(slot.is_ready());
        assert!(slot.get().unwrap().exports(&MacroId::new("id")));

        loader.load(&t).await.unwrap();
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(source.activations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn activation_failure_leaves_slot_empty() {
        let source = Arc::new(CountingSource {
            fail_activation: true,
            ..CountingSource::default()
        });
        let loader = loader(source.clone()).await;
        let t = TargetLabel::from_static("t");

        let err = loader.load(&t).await.err().unwrap();
        assert!(matches!(err, LoadError::Activation { .. }));
        assert!(!loader.slot(&t).unwrap().is_ready());

        assert!(loader.load(&t).await.is_err());
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unknown_target_has_no_slot() {
        let loader = loader(Arc::new(CountingSource::default())).await;
        let missing = TargetLabel::from_static("missing");
        assert!(matches!(loader.slot(&missing), Err(LoadError::NotFound(_))));
        assert!(matches!(
            loader.load(&missing).await,
            Err(LoadError::NotFound(_))
        ));
    }
}
