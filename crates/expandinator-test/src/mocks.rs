//! Mock target sources.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::watch;

use expandinator_registry::{
    FnModule, LoadError, LoadResult, MacroModule, MacroSet, ModuleArtifact, RegistryError,
    RegistryResult, TargetLabel, TargetSource,
};

/// A latch that fetches wait on until it is opened.
#[derive(Debug)]
struct Gate(watch::Sender<bool>);

impl Gate {
    fn new(open: bool) -> Self {
        Self(watch::channel(open).0)
    }

    async fn pass(&self) {
        let mut rx = self.0.subscribe();
        let _ = rx.wait_for(|open| *open).await;
    }

    fn open(&self) {
        self.0.send_replace(true);
    }
}

#[derive(Debug)]
struct GatedTarget {
    macros: MacroSet,
    module: FnModule,
    macro_gate: Gate,
    module_gate: Gate,
    macro_fetches: AtomicUsize,
    module_fetches: AtomicUsize,
    macro_failure: Mutex<Option<MacroFailure>>,
    module_failure: Mutex<Option<ModuleFailure>>,
}

#[derive(Debug, Clone)]
enum MacroFailure {
    Error(String),
    Panic(String),
}

#[derive(Debug, Clone)]
enum ModuleFailure {
    Fetch(String),
    Activation(String),
    Panic(String),
}

/// Target source whose fetches block until released by the test.
///
/// Every target has one gate for macro metadata and one for the module.
/// Gates start closed unless the source is built with
/// [`GatedSource::ungated`]. Fetch counters and injectable failures make
/// memoization and retry behaviour observable.
#[derive(Debug, Default)]
pub struct GatedSource {
    order: Vec<TargetLabel>,
    targets: HashMap<TargetLabel, GatedTarget>,
    open_by_default: bool,
}

impl GatedSource {
    /// Create a source whose gates start closed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a source whose gates start open.
    #[must_use]
    pub fn ungated() -> Self {
        Self {
            open_by_default: true,
            ..Self::default()
        }
    }

    /// Add a target.
    #[must_use]
    pub fn with_target(mut self, label: TargetLabel, macros: MacroSet, module: FnModule) -> Self {
        let open = self.open_by_default;
        self.order.push(label.clone());
        self.targets.insert(
            label,
            GatedTarget {
                macros,
                module,
                macro_gate: Gate::new(open),
                module_gate: Gate::new(open),
                macro_fetches: AtomicUsize::new(0),
                module_fetches: AtomicUsize::new(0),
                macro_failure: Mutex::new(None),
                module_failure: Mutex::new(None),
            },
        );
        self
    }

    /// Let pending and future macro fetches of `target` complete.
    pub fn release_macros(&self, target: &TargetLabel) {
        if let Some(t) = self.targets.get(target) {
            t.macro_gate.open();
        }
    }

    /// Let pending and future module fetches of `target` complete.
    pub fn release_module(&self, target: &TargetLabel) {
        if let Some(t) = self.targets.get(target) {
            t.module_gate.open();
        }
    }

    /// Release both gates of `target`.
    pub fn release(&self, target: &TargetLabel) {
        self.release_macros(target);
        self.release_module(target);
    }

    /// Release every gate.
    pub fn release_all(&self) {
        for t in self.targets.values() {
            t.macro_gate.open();
            t.module_gate.open();
        }
    }

    /// Make macro fetches of `target` fail until [`GatedSource::clear_failures`].
    pub fn fail_macros(&self, target: &TargetLabel, message: impl Into<String>) {
        self.set_macro_failure(target, MacroFailure::Error(message.into()));
    }

    /// Make macro fetches of `target` panic, as a buggy transport would.
    pub fn panic_macros(&self, target: &TargetLabel, message: impl Into<String>) {
        self.set_macro_failure(target, MacroFailure::Panic(message.into()));
    }

    /// Make module fetches of `target` fail.
    pub fn fail_module_fetch(&self, target: &TargetLabel, message: impl Into<String>) {
        self.set_module_failure(target, ModuleFailure::Fetch(message.into()));
    }

    /// Make module activation of `target` fail.
    pub fn fail_activation(&self, target: &TargetLabel, message: impl Into<String>) {
        self.set_module_failure(target, ModuleFailure::Activation(message.into()));
    }

    /// Make module fetches of `target` panic.
    pub fn panic_module_fetch(&self, target: &TargetLabel, message: impl Into<String>) {
        self.set_module_failure(target, ModuleFailure::Panic(message.into()));
    }

    /// Remove injected failures of `target`.
    pub fn clear_failures(&self, target: &TargetLabel) {
        if let Some(t) = self.targets.get(target) {
            if let Ok(mut guard) = t.macro_failure.lock() {
                *guard = None;
            }
            if let Ok(mut guard) = t.module_failure.lock() {
                *guard = None;
            }
        }
    }

    /// Number of macro fetches started for `target`.
    #[must_use]
    pub fn macro_fetches(&self, target: &TargetLabel) -> usize {
        self.targets
            .get(target)
            .map_or(0, |t| t.macro_fetches.load(Ordering::SeqCst))
    }

    /// Number of module fetches started for `target`.
    #[must_use]
    pub fn module_fetches(&self, target: &TargetLabel) -> usize {
        self.targets
            .get(target)
            .map_or(0, |t| t.module_fetches.load(Ordering::SeqCst))
    }

    fn set_macro_failure(&self, target: &TargetLabel, failure: MacroFailure) {
        if let Some(t) = self.targets.get(target)
            && let Ok(mut guard) = t.macro_failure.lock()
        {
            *guard = Some(failure);
        }
    }

    fn set_module_failure(&self, target: &TargetLabel, failure: ModuleFailure) {
        if let Some(t) = self.targets.get(target)
            && let Ok(mut guard) = t.module_failure.lock()
        {
            *guard = Some(failure);
        }
    }
}

#[async_trait]
impl TargetSource for GatedSource {
    async fn list_targets(&self) -> RegistryResult<Vec<TargetLabel>> {
        Ok(self.order.clone())
    }

    async fn fetch_macros(&self, target: &TargetLabel) -> RegistryResult<MacroSet> {
        let t = self
            .targets
            .get(target)
            .ok_or_else(|| RegistryError::NotFound(target.clone()))?;
        t.macro_fetches.fetch_add(1, Ordering::SeqCst);
        t.macro_gate.pass().await;

        let failure = t.macro_failure.lock().ok().and_then(|g| g.clone());
        match failure {
            Some(MacroFailure::Error(message)) => Err(RegistryError::Fetch {
                target: target.clone(),
                message,
            }),
            Some(MacroFailure::Panic(message)) => panic!("{message}"),
            None => Ok(t.macros.clone()),
        }
    }

    async fn fetch_module(&self, target: &TargetLabel) -> LoadResult<Box<dyn ModuleArtifact>> {
        let t = self
            .targets
            .get(target)
            .ok_or_else(|| LoadError::NotFound(target.clone()))?;
        t.module_fetches.fetch_add(1, Ordering::SeqCst);
        t.module_gate.pass().await;

        let failure = t.module_failure.lock().ok().and_then(|g| g.clone());
        match failure {
            Some(ModuleFailure::Fetch(message)) => Err(LoadError::Fetch {
                target: target.clone(),
                message,
            }),
            Some(ModuleFailure::Activation(message)) => Ok(Box::new(FailingArtifact {
                target: target.clone(),
                message,
            })),
            Some(ModuleFailure::Panic(message)) => panic!("{message}"),
            None => Ok(Box::new(t.module.clone())),
        }
    }
}

/// Artifact whose activation always fails.
#[derive(Debug)]
pub struct FailingArtifact {
    /// Target the artifact belongs to.
    pub target: TargetLabel,
    /// Activation failure reason.
    pub message: String,
}

#[async_trait]
impl ModuleArtifact for FailingArtifact {
    async fn activate(self: Box<Self>) -> LoadResult<Arc<dyn MacroModule>> {
        Err(LoadError::Activation {
            target: self.target,
            message: self.message,
        })
    }
}
