//! Logging setup for the expansion playground.
//!
//! # Example
//!
//! ```rust,no_run
//! use expandinator_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), expandinator_telemetry::TelemetryError> {
//! let config = LogConfig::new("debug")
//!     .with_format(LogFormat::Pretty)
//!     .with_directive("extism=warn");
//!
//! setup_logging(&config)?;
//! tracing::info!("Playground starting");
//! # Ok(())
//! # }
//! ```
//!
//! With the `config` feature, a [`LogConfig`] converts from the `[logging]`
//! section of the playground configuration.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{LogConfig, LogFormat, LogTarget, setup_default_logging, setup_logging};
