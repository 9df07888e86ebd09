//! Prelude module - commonly used test helpers.

pub use crate::fixtures::{
    EXPANDED, clone_macros, clone_module, debug_macros, debug_module, gated_scenario_source,
    scenario_source, t1, t2,
};
pub use crate::harness::{OutputDir, setup_test_logging, setup_test_logging_default};
pub use crate::mocks::{FailingArtifact, GatedSource};
