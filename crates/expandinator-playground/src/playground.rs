//! The playground: two panes, two selectors, and the pipeline between them.

use std::ops::Range;
use std::sync::Arc;

use expandinator_registry::{MacroId, ModuleLoader, RegistryError, TargetLabel, TargetRegistry};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, trace, warn};

use crate::driver::{ExpansionDriver, ExpansionPlan, INITIAL_OUTPUT};
use crate::editor::{EditorFactory, EditorOptions, EditorSurface, Language};
use crate::error::PlaygroundResult;
use crate::events::{Completion, PlaygroundEvent, ViewUpdate};
use crate::selection::{ModuleStatus, SelectionController, SelectionEpoch};
use crate::view::{self, SelectorOption};

/// Mount point of the input pane.
pub const INPUT_MOUNT: &str = "input";
/// Mount point of the output pane.
pub const OUTPUT_MOUNT: &str = "output";

/// Default capacity of the view update channel.
pub const DEFAULT_UPDATE_CAPACITY: usize = 256;

/// Construction options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaygroundOptions {
    /// Highlighting language of both panes.
    pub language: Language,
    /// Whether Tab indents in the input pane.
    pub indent_with_tab: bool,
    /// Capacity of the [`ViewUpdate`] broadcast channel.
    pub update_capacity: usize,
}

impl Default for PlaygroundOptions {
    fn default() -> Self {
        Self {
            language: Language::Rust,
            indent_with_tab: true,
            update_capacity: DEFAULT_UPDATE_CAPACITY,
        }
    }
}

/// Macro expansion playground.
///
/// Owned by one task and mutated through `&mut self`. Metadata fetches,
/// module loads, and macro calls run as spawned tasks and report back as
/// [`Completion`]s, which are applied by [`Playground::process_next`],
/// [`Playground::settle`], or [`Playground::run`]. Completions from an
/// earlier selection are discarded.
///
/// Methods that start async work must be called within a tokio runtime.
pub struct Playground {
    registry: Arc<TargetRegistry>,
    loader: Arc<ModuleLoader>,
    selection: SelectionController,
    driver: ExpansionDriver,
    input: Box<dyn EditorSurface>,
    output: Box<dyn EditorSurface>,
    completion_tx: mpsc::UnboundedSender<Completion>,
    completion_rx: mpsc::UnboundedReceiver<Completion>,
    in_flight: usize,
    updates: broadcast::Sender<ViewUpdate>,
}

impl Playground {
    /// Create a playground over `registry`, with panes from `editors`.
    #[must_use]
    pub fn new(
        registry: TargetRegistry,
        editors: &dyn EditorFactory,
        options: PlaygroundOptions,
    ) -> Self {
        let loader = ModuleLoader::new(&registry);
        let input = editors.create(
            INPUT_MOUNT,
            "",
            EditorOptions::input(options.language, options.indent_with_tab),
        );
        let output = editors.create(
            OUTPUT_MOUNT,
            INITIAL_OUTPUT,
            EditorOptions::output(options.language),
        );
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let (updates, _) = broadcast::channel(options.update_capacity.max(1));

        info!(targets = registry.targets().len(), "Playground ready");
        Self {
            registry: Arc::new(registry),
            loader: Arc::new(loader),
            selection: SelectionController::new(),
            driver: ExpansionDriver::new(),
            input,
            output,
            completion_tx,
            completion_rx,
            in_flight: 0,
            updates,
        }
    }

    /// Subscribe to view updates.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ViewUpdate> {
        self.updates.subscribe()
    }

    /// Targets offered by this playground.
    #[must_use]
    pub fn registry(&self) -> &TargetRegistry {
        &self.registry
    }

    /// Current selection state.
    #[must_use]
    pub fn selection(&self) -> &SelectionController {
        &self.selection
    }

    /// The input pane.
    #[must_use]
    pub fn input(&self) -> &dyn EditorSurface {
        self.input.as_ref()
    }

    /// The read-only output pane.
    #[must_use]
    pub fn output(&self) -> &dyn EditorSurface {
        self.output.as_ref()
    }


    /// Current input text.
    #[must_use]
    pub fn input_text(&self) -> String {
        self.input.text()
    }

    /// Current output text.
    #[must_use]
    pub fn output_text(&self) -> String {
        self.output.text()
    }

    /// Number of spawned tasks whose completion has not been applied yet.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.in_flight
    }

    /// Options of the target selector, placeholder first.
    #[must_use]
    pub fn target_options(&self) -> Vec<SelectorOption> {
        view::target_options(self.registry.targets(), self.selection.target())
    }

    /// Options of the macro selector for the current target.
    #[must_use]
    pub fn macro_options(&self) -> Vec<SelectorOption> {
        view::macro_options(
            self.selection.macro_options(),
            self.selection.selected_macro().map(|e| &e.id),
        )
    }

    /// Handle one user intent.
    ///
    /// # Errors
    ///
    /// Returns the rejection of an invalid selection or edit. State is
    /// unchanged in that case.
    pub fn dispatch(&mut self, event: PlaygroundEvent) -> PlaygroundResult<()> {
        match event {
            PlaygroundEvent::SelectTarget(target) => self.select_target(target),
            PlaygroundEvent::SelectMacro(macro_id) => self.select_macro(macro_id.as_ref()),
            PlaygroundEvent::EditInput { range, text } => self.edit_input(range, &text),
        }
    }

    /// Change the target, or clear it with `None`.
    ///
    /// The macro selection is cleared before this returns. Macro metadata and
    /// the module are requested unless already cached.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] for a target outside the registry.
    pub fn select_target(&mut self, target: Option<TargetLabel>) -> PlaygroundResult<()> {
        let Some(target) = target else {
            self.selection.clear_target();
            self.publish_selectors();
            self.expand();
            return Ok(());
        };

        let slot = self
            .loader
            .slot(&target)
            .map_err(|_| RegistryError::NotFound(target.clone()))?;
        let cached = self.registry.cached_macros(&target);
        let needs_macros = cached.is_none();
        let epoch = self.selection.select_target(target.clone(), cached, slot);

        if needs_macros {
            self.spawn_macro_fetch(epoch, target.clone());
        }
        if self.selection.module_status() != Some(ModuleStatus::Ready) {
            self.spawn_module_load(epoch, target);
        }

        self.publish_selectors();
        self.expand();
        Ok(())
    }

    /// Change the macro, or clear it with `None`.
    ///
    /// # Errors
    ///
    /// See [`SelectionController::select_macro`].
    pub fn select_macro(&mut self, macro_id: Option<&MacroId>) -> PlaygroundResult<()> {
        self.selection.select_macro(macro_id)?;
        self.publish(ViewUpdate::MacroOptions(self.macro_options()));
        self.expand();
        Ok(())
    }

    /// Apply a user edit to the input pane.
    ///
    /// # Errors
    ///
    /// Returns the editor's rejection of the edit.
    pub fn edit_input(&mut self, range: Range<usize>, text: &str) -> PlaygroundResult<()> {
        let before = self.input.revision();
        self.input.apply_user_edit(range, text)?;
        if self.input.revision() != before {
            trace!(revision = self.input.revision(), "Input changed");
            self.expand();
        }
        Ok(())
    }

    /// Forward a user edit to the output pane.
    ///
    /// Only the driver writes the output, so this always fails for the
    /// built-in read-only pane.
    ///
    /// # Errors
    ///
    /// Returns the editor's rejection of the edit.
    pub fn edit_output(&mut self, range: Range<usize>, text: &str) -> PlaygroundResult<()> {
        self.output.apply_user_edit(range, text)?;
        Ok(())
    }

    /// Replace the whole input document as a user edit.
    ///
    /// # Errors
    ///
    /// Returns the editor's rejection of the edit.
    pub fn set_input(&mut self, text: &str) -> PlaygroundResult<()> {
        let len = self.input.text().len();
        self.edit_input(0..len, text)
    }

    /// Re-run the driver for the current selection and input.
    pub fn expand(&mut self) {
        let input = self.input.text();
        match self.driver.plan(&self.selection, &input) {
            ExpansionPlan::Placeholder(text) => self.write_output(&text),
            ExpansionPlan::Invoke(request) => {
                let epoch = self.selection.epoch();
                let tx = self.completion_tx.clone();
                self.in_flight = self.in_flight.saturating_add(1);
                tokio::spawn(async move {
                    let seq = request.seq;
                    let output = match tokio::task::spawn_blocking(move || request.run()).await {
                        Ok(output) => output,
                        Err(e) => {
                            warn!(seq, error = %e, "Expansion worker failed");
                            format!("// expansion failed:\n// {e}")
                        },
                    };
                    let _ = tx.send(Completion::Expansion { epoch, seq, output });
                });
            },
        }
    }

    /// Wait for the next completion and apply it.
    ///
    /// Returns `false` without waiting when nothing is in flight.
    pub async fn process_next(&mut self) -> bool {
        if self.in_flight == 0 {
            return false;
        }
        match self.completion_rx.recv().await {
            Some(completion) => {
                self.apply(completion);
                true
            },
            None => false,
        }
    }

    /// Apply completions until nothing is in flight.
    pub async fn settle(&mut self) {
        while self.process_next().await {}
    }

    /// Process user intents from `events` and completions until `events`
    /// closes.
    pub async fn run(&mut self, mut events: mpsc::Receiver<PlaygroundEvent>) {
        info!("Playground event loop started");
        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else {
                        break;
                    };
                    if let Err(e) = self.dispatch(event) {
                        warn!(error = %e, "Rejected playground event");
                    }
                },
                Some(completion) = self.completion_rx.recv() => {
                    self.apply(completion);
                },
            }
        }
        info!("Playground event loop stopped");
    }

    fn apply(&mut self, completion: Completion) {
        self.in_flight = self.in_flight.saturating_sub(1);
        match completion {
            Completion::Macros {
                epoch,
                target,
                result,
            } => {
                if let Err(reason) = &result {
                    warn!(target_label = %target, error = %reason, "Macro metadata unavailable");
                }
                if self.selection.resolve_macros(epoch, result) {
                    self.publish(ViewUpdate::MacroOptions(self.macro_options()));
                    self.expand();
                } else {
                    debug!(target_label = %target, epoch = %epoch, "Dropping stale macro metadata");
                }
            },
            Completion::Module {
                epoch,
                target,
                result,
            } => {
                if let Err(reason) = &result {
                    warn!(target_label = %target, error = %reason, "Module unavailable");
                }
                if self.selection.resolve_module(epoch, result) {
                    self.publish(ViewUpdate::Module(self.selection.module_status()));
                    self.expand();
                } else {
                    debug!(target_label = %target, epoch = %epoch, "Dropping stale module result");
                }
            },
            Completion::Expansion { epoch, seq, output } => {
                if epoch == self.selection.epoch() && self.driver.is_latest(seq) {
                    self.write_output(&output);
                } else {
                    debug!(seq, epoch = %epoch, "Dropping stale expansion");
                }
            },
        }
    }

    fn spawn_macro_fetch(&mut self, epoch: SelectionEpoch, target: TargetLabel) {
        let registry = Arc::clone(&self.registry);
        let tx = self.completion_tx.clone();
        self.in_flight = self.in_flight.saturating_add(1);
        tokio::spawn(async move {
            let fetch_target = target.clone();
            let fetch = tokio::spawn(async move {
                registry
                    .macros(&fetch_target)
                    .await
                    .map_err(|e| e.to_string())
            });
            let result = match fetch.await {
                Ok(result) => result,
                Err(e) => {
                    warn!(target_label = %target, error = %e, "Macro fetch task failed");
                    Err(format!("fetch task failed: {e}"))
                },
            };
            let _ = tx.send(Completion::Macros {
                epoch,
                target,
                result,
            });
        });
    }

    fn spawn_module_load(&mut self, epoch: SelectionEpoch, target: TargetLabel) {
        let loader = Arc::clone(&self.loader);
        let tx = self.completion_tx.clone();
        self.in_flight = self.in_flight.saturating_add(1);
        tokio::spawn(async move {
            let load_target = target.clone();
            let load = tokio::spawn(async move {
                loader
                    .load(&load_target)
                    .await
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            });
            let result = match load.await {
                Ok(result) => result,
                Err(e) => {
                    warn!(target_label = %target, error = %e, "Module load task failed");
                    Err(format!("load task failed: {e}"))
                },
            };
            let _ = tx.send(Completion::Module {
                epoch,
                target,
                result,
            });
        });
    }

    fn write_output(&mut self, text: &str) {
        if self.output.text() == text {
            return;
        }
        match self.output.replace_all(text) {
            Ok(()) => self.publish(ViewUpdate::Output(text.to_owned())),
            Err(e) => warn!(error = %e, "Failed to write output document"),
        }
    }

    fn publish_selectors(&self) {
        self.publish(ViewUpdate::TargetOptions(self.target_options()));
        self.publish(ViewUpdate::MacroOptions(self.macro_options()));
        self.publish(ViewUpdate::Module(self.selection.module_status()));
    }

    fn publish(&self, update: ViewUpdate) {
        if self.updates.send(update).is_err() {
            trace!("No view subscribers");
        }
    }
}

impl std::fmt::Debug for Playground {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Playground")
            .field("registry", &self.registry)
            .field("selection", &self.selection)
            .field("in_flight", &self.in_flight)
            .finish_non_exhaustive()
    }
}
