//! Target sources: where target lists, macro metadata, and modules come from.

use async_trait::async_trait;

use crate::error::{LoadError, LoadResult, RegistryError, RegistryResult};
use crate::module::{FnModule, ModuleArtifact};
use crate::target::{MacroSet, TargetLabel};

/// Transport for the target registry.
///
/// A source may serve bundled data or fetch on demand; the registry and the
/// module loader add memoization on top, so implementations should not cache.
#[async_trait]
pub trait TargetSource: Send + Sync {
    /// All targets, in display order.
    async fn list_targets(&self) -> RegistryResult<Vec<TargetLabel>>;

    /// Macro metadata for one target.
    async fn fetch_macros(&self, target: &TargetLabel) -> RegistryResult<MacroSet>;

    /// The raw, not yet activated module of one target.
    async fn fetch_module(&self, target: &TargetLabel) -> LoadResult<Box<dyn ModuleArtifact>>;
}

#[derive(Debug, Clone)]
struct StaticTarget {
    label: TargetLabel,
    macros: MacroSet,
    module: FnModule,
}

/// A source whose targets are compiled into the host.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    targets: Vec<StaticTarget>,
}

impl StaticSource {
    /// Create an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a target. If a label is registered twice, the first wins.
    #[must_use]
    pub fn with_target(mut self, label: TargetLabel, macros: MacroSet, module: FnModule) -> Self {
        self.targets.push(StaticTarget {
            label,
            macros,
            module,
        });
        self
    }

    fn find(&self, target: &TargetLabel) -> Option<&StaticTarget> {
        self.targets.iter().find(|t| &t.label == target)
    }
}

#[async_trait]
impl TargetSource for StaticSource {
    async fn list_targets(&self) -> RegistryResult<Vec<TargetLabel>> {
        let mut labels: Vec<TargetLabel> = Vec::with_capacity(self.targets.len());
        for t in &self.targets {
            if !labels.contains(&t.label) {
                labels.push(t.label.clone());
            }
        }
        Ok(labels)
    }

    async fn fetch_macros(&self, target: &TargetLabel) -> RegistryResult<MacroSet> {
        self.find(target)
            .map(|t| t.macros.clone())
            .ok_or_else(|| RegistryError::NotFound(target.clone()))
    }

    async fn fetch_module(&self, target: &TargetLabel) -> LoadResult<Box<dyn ModuleArtifact>> {
        self.find(target)
            .map(|t| Box::new(t.module.clone()) as Box<dyn ModuleArtifact>)
            .ok_or_else(|| LoadError::NotFound(target.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::MacroId;

    fn source() -> StaticSource {
        StaticSource::new()
            .with_target(
                TargetLabel::from_static("b 1"),
                MacroSet::from_pairs([("B", "expand_b")]).unwrap(),
                FnModule::new().with_macro("expand_b", |s| Ok(s.to_string())),
            )
            .with_target(
                TargetLabel::from_static("a 1"),
                MacroSet::default(),
                FnModule::new(),
            )
    }

    #[tokio::test]
    async fn lists_targets_in_registration_order() {
        let labels = source().list_targets().await.unwrap();
        assert_eq!(
            labels,
            vec![TargetLabel::from_static("b 1"), TargetLabel::from_static("a 1")]
        );
    }

    #[tokio::test]
    async fn unknown_target_is_not_found() {
        let src = source();
        let missing = TargetLabel::from_static("missing 0");
        assert!(matches!(
            src.fetch_macros(&missing).await,
            Err(RegistryError::NotFound(_))
        ));
        assert!(matches!(
            src.fetch_module(&missing).await,
            Err(LoadError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn fetched_module_activates_to_its_functions() {
        let artifact = source()
            .fetch_module(&TargetLabel::from_static("b 1"))
            .await
            .unwrap();
        let module = artifact.activate().await.unwrap();
        assert!(module.exports(&MacroId::new("expand_b")));
    }
}
