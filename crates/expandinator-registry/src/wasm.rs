//! WebAssembly macro modules backed by Extism.
//!
//! A target module is a `.wasm` binary whose exports are macro functions:
//! each takes the source text as UTF-8 input and returns the expanded text as
//! UTF-8 output. Activation compiles and instantiates the plugin, then calls
//! the optional [`ACTIVATE_EXPORT`] once before the handle is handed out.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use extism::{Manifest, PluginBuilder, Wasm};
use tracing::{debug, info, warn};

use crate::error::{ExpansionError, ExpansionResult, LoadError, LoadResult};
use crate::module::{MacroModule, ModuleArtifact};
use crate::target::{MacroId, TargetLabel};

/// Export called once during activation when the module provides it.
pub const ACTIVATE_EXPORT: &str = "activate";

/// WASM pages are 64 KiB each.
const WASM_PAGE_SIZE: u64 = 64 * 1024;

/// Resource limits applied to every activated module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WasmLimits {
    /// Maximum linear memory in bytes.
    pub max_memory_bytes: u64,
    /// Maximum wall time of a single macro call.
    pub max_execution_time: Duration,
    /// Whether to link WASI imports.
    pub wasi: bool,
}

impl Default for WasmLimits {
    fn default() -> Self {
        Self {
            max_memory_bytes: 64 * 1024 * 1024,
            max_execution_time: Duration::from_secs(5),
            wasi: true,
        }
    }
}

impl WasmLimits {
    fn max_pages(&self) -> u32 {
        u32::try_from(self.max_memory_bytes / WASM_PAGE_SIZE).unwrap_or(u32::MAX)
    }
}

/// Raw module bytes fetched for a target.
pub struct WasmArtifact {
    target: TargetLabel,
    bytes: Vec<u8>,
    limits: WasmLimits,
}

impl WasmArtifact {
    /// Wrap module bytes for `target`.
    #[must_use]
    pub fn new(target: TargetLabel, bytes: Vec<u8>, limits: WasmLimits) -> Self {
        Self {
            target,
            bytes,
            limits,
        }
    }
}

impl std::fmt::Debug for WasmArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WasmArtifact")
            .field("target", &self.target)
            .field("len", &self.bytes.len())
            .field("limits", &self.limits)
            .finish()
    }
}

#[async_trait]
impl ModuleArtifact for WasmArtifact {
    async fn activate(self: Box<Self>) -> LoadResult<Arc<dyn MacroModule>> {
        let WasmArtifact {
            target,
            bytes,
            limits,
        } = *self;

        info!(target_label = %target, size = bytes.len(), "Activating WASM module");

        // Compilation is CPU-bound; keep it off the event context.
        let build_target = target.clone();
        let plugin = tokio::task::spawn_blocking(move || build_plugin(&build_target, bytes, limits))
            .await
            .map_err(|e| LoadError::Activation {
                target: target.clone(),
                message: format!("activation task failed: {e}"),
            })??;

        Ok(Arc::new(WasmModule {
            target,
            plugin: Mutex::new(plugin),
        }))
    }
}

fn build_plugin(
    target: &TargetLabel,
    bytes: Vec<u8>,
    limits: WasmLimits,
) -> LoadResult<extism::Plugin> {
    let manifest = Manifest::new([Wasm::data(bytes)])
        .with_timeout(limits.max_execution_time)
        .with_memory_max(limits.max_pages());

    let mut plugin = PluginBuilder::new(manifest)
        .with_wasi(limits.wasi)
        .build()
        .map_err(|e| LoadError::Activation {
            target: target.clone(),
            message: format!("failed to build Extism plugin: {e}"),
        })?;

    if plugin.function_exists(ACTIVATE_EXPORT) {
        plugin
            .call::<&str, String>(ACTIVATE_EXPORT, "")
            .map_err(|e| LoadError::Activation {
                target: target.clone(),
                message: format!("{ACTIVATE_EXPORT} export failed: {e}"),
            })?;
        debug!(target_label = %target, "Ran module activation export");
    }

    Ok(plugin)
}

/// An activated WASM module.
pub struct WasmModule {
    target: TargetLabel,
    plugin: Mutex<extism::Plugin>,
}

impl MacroModule for WasmModule {
    fn exports(&self, macro_id: &MacroId) -> bool {
        lock_instance(&self.target, &self.plugin).function_exists(macro_id.as_str())
    }

    fn expand(&self, macro_id: &MacroId, input: &str) -> ExpansionResult<String> {
        let mut plugin = lock_instance(&self.target, &self.plugin);

        if !plugin.function_exists(macro_id.as_str()) {
            return Err(ExpansionError::UnknownMacro(macro_id.clone()));
        }

        plugin
            .call::<&str, String>(macro_id.as_str(), input)
            .map_err(|e| {
                warn!(target_label = %self.target, macro_id = %macro_id, error = %e, "Macro call failed");
                ExpansionError::Failed {
                    macro_id: macro_id.clone(),
                    message: e.to_string(),
                }
            })
    }
}

/// Lock a module instance, taking it back if an earlier call panicked.
fn lock_instance<'a, T>(target: &TargetLabel, instance: &'a Mutex<T>) -> MutexGuard<'a, T> {
    instance.lock().unwrap_or_else(|poisoned| {
        warn!(target_label = %target, "Recovering module instance after a panicked call");
        instance.clear_poison();
        poisoned.into_inner()
    })
}

impl std::fmt::Debug for WasmModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WasmModule")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

/// Verify module bytes against a blake3 digest from the index.
///
/// With no expected digest the check passes unless `require_hash` is set.
///
/// # Errors
///
/// Returns [`LoadError::HashMismatch`] on a digest mismatch, or
/// [`LoadError::Fetch`] if a digest is required but absent.
pub fn verify_hash(
    target: &TargetLabel,
    bytes: &[u8],
    expected: Option<&str>,
    require_hash: bool,
) -> LoadResult<()> {
    match expected {
        Some(expected_hex) => {
            let actual = blake3::hash(bytes).to_hex().to_string();
            if !actual.eq_ignore_ascii_case(expected_hex) {
                return Err(LoadError::HashMismatch {
                    target: target.clone(),
                    expected: expected_hex.to_string(),
                    actual,
                });
            }
            debug!(target_label = %target, "Module hash verified");
        },
        None if require_hash => {
            return Err(LoadError::Fetch {
                target: target.clone(),
                message: "module hash required but not recorded in the index".into(),
            });
        },
        None => {
            debug!(target_label = %target, "No module hash recorded; integrity not verified");
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> TargetLabel {
        TargetLabel::from_static("serde_derive 1")
    }

    #[test]
    fn hash_match_passes() {
        let data = b"\0asm\x01\0\0\0";
        let expected = blake3::hash(data).to_hex().to_string();
        assert!(verify_hash(&target(), data, Some(&expected), true).is_ok());
    }

    #[test]
    fn hash_mismatch_is_reported() {
        let err = verify_hash(&target(), b"abc", Some("00"), false).unwrap_err();
        match err {
            LoadError::HashMismatch {
                expected, actual, ..
            } => {
                assert_eq!(expected, "00");
                assert_eq!(actual, blake3::hash(b"abc").to_hex().to_string());
            },
            other => panic!("expected HashMismatch, got: {other:?}"),
        }
    }

    #[test]
    fn missing_hash_only_fails_when_required() {
        assert!(verify_hash(&target(), b"abc", None, false).is_ok());
        assert!(matches!(
            verify_hash(&target(), b"abc", None, true),
            Err(LoadError::Fetch { .. })
        ));
    }

    #[test]
    fn panicked_call_does_not_lock_out_later_calls() {
        let instance = Arc::new(Mutex::new(0_u32));
        let poisoner = Arc::clone(&instance);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("guest trap");
        })
        .join();
        assert!(instance.is_poisoned());

        *lock_instance(&target(), &instance) = 7;
        assert_eq!(*lock_instance(&target(), &instance), 7);
        assert!(!instance.is_poisoned());
    }

    #[test]
    fn memory_limit_converts_to_pages() {
        let limits = WasmLimits {
            max_memory_bytes: 2 * WASM_PAGE_SIZE,
            ..WasmLimits::default()
        };
        assert_eq!(limits.max_pages(), 2);
        assert_eq!(WasmLimits::default().max_pages(), 1024);
    }

    #[tokio::test]
    async fn garbage_bytes_fail_activation() {
        let artifact = Box::new(WasmArtifact::new(
            target(),
            b"definitely not wasm".to_vec(),
            WasmLimits::default(),
        ));
        let err = artifact.activate().await.err().unwrap();
        assert!(matches!(err, LoadError::Activation { .. }));
    }
}
