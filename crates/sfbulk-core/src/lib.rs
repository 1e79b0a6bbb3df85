//! sfbulk-core: shared plumbing for the sfbulk loader.
//!
//! This crate holds the pieces that are not specific to the upload pipeline:
//!
//! - `config/` - CLI arguments, YAML loading and environment variable interpolation
//! - `error` - configuration error types
//! - `metrics/` - internal events recorded through the `metrics` facade
//! - `tracing` - subscriber initialization for the CLI

pub mod config;
pub mod error;
pub mod metrics;
pub mod tracing;

pub use config::{CliArgs, interpolate, interpolate_with, is_yaml_file, load_yaml};
pub use error::ConfigError;
pub use tracing::init_tracing;
