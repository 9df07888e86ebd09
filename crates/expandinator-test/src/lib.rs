//! Expandinator Test - shared test utilities.
//!
//! Mock target sources, fixture targets, and harness helpers used as a
//! dev-dependency by the playground and integration tests.
//!
//! ```toml
//! [dev-dependencies]
//! expandinator-test.workspace = true
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use expandinator_registry::TargetRegistry;
//! use expandinator_test::{gated_scenario_source, t1};
//!
//! let source = Arc::new(gated_scenario_source());
//! let registry = TargetRegistry::connect(source.clone()).await?;
//! let pending = registry.macros(&t1());
//! source.release(&t1());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

pub mod fixtures;
pub mod harness;
pub mod mocks;

pub use fixtures::*;
pub use harness::*;
pub use mocks::*;
