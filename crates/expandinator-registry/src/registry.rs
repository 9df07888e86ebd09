//! Target registry: the ordered target list plus memoized macro metadata.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::error::{RegistryError, RegistryResult};
use crate::source::TargetSource;
use crate::target::{MacroSet, TargetLabel};

/// Session-lifetime view of a [`TargetSource`].
///
/// The target list is fetched once in [`TargetRegistry::connect`]. Macro
/// metadata is fetched on first request per target and shared afterwards;
/// concurrent first requests wait on the same fetch. A failed fetch leaves the
/// entry empty so the next request retries.
pub struct TargetRegistry {
    source: Arc<dyn TargetSource>,
    targets: Vec<TargetLabel>,
    macros: HashMap<TargetLabel, OnceCell<Arc<MacroSet>>>,
}

impl TargetRegistry {
    /// Fetch the target list and build the registry.
    ///
    /// # Errors
    ///
    /// Returns the source's error if the target list cannot be fetched.
    pub async fn connect(source: Arc<dyn TargetSource>) -> RegistryResult<Self> {
        let targets = source.list_targets().await?;
        let mut macros = HashMap::with_capacity(targets.len());
        let mut ordered = Vec::with_capacity(targets.len());
        for label in targets {
            if macros.insert(label.clone(), OnceCell::new()).is_none() {
                ordered.push(label);
            }
        }
        info!(count = ordered.len(), "Target registry connected");
        Ok(Self {
            source,
            targets: ordered,
            macros,
        })
    }

    /// All targets, in display order.
    #[must_use]
    pub fn targets(&self) -> &[TargetLabel] {
        &self.targets
    }

    /// Whether `target` is offered.
    #[must_use]
    pub fn contains(&self, target: &TargetLabel) -> bool {
        self.macros.contains_key(target)
    }

    /// The source this registry reads from.
    #[must_use]
    pub fn source(&self) -> Arc<dyn TargetSource> {
        Arc::clone(&self.source)
    }

    /// Macro set of `target`, fetched at most once on success.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] for a target outside the registry,
    /// or the source's error if the fetch fails.
    pub async fn macros(&self, target: &TargetLabel) -> RegistryResult<Arc<MacroSet>> {
        let cell = self
            .macros
            .get(target)
            .ok_or_else(|| RegistryError::NotFound(target.clone()))?;

        if let Some(set) = cell.get() {
            debug!(target_label = %target, "Macro metadata cache hit");
            return Ok(Arc::clone(set));
        }

        let set = cell
            .get_or_try_init(|| async {
                debug!(target_label = %target, "Fetching macro metadata");
                self.source.fetch_macros(target).await.map(Arc::new)
            })
            .await?;
        Ok(Arc::clone(set))
    }

    /// The macro set of `target` if it has already been fetched.
    #[must_use]
    pub fn cached_macros(&self, target: &TargetLabel) -> Option<Arc<MacroSet>> {
        self.macros.get(target)?.get().map(Arc::clone)
    }
}

impl std::fmt::Debug for TargetRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetRegistry")
            .field("targets", &self.targets)
            .field(
                "loaded",
                &self.macros.values().filter(|c| c.initialized()).count(),
            )
            .finish_non_exhaustive()
    }
}
