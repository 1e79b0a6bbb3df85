//! Configuration error types.

use std::path::PathBuf;

use snafu::prelude::*;

/// Errors raised while loading or validating a job configuration.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[snafu(display("Failed to read configuration file {}: {source}", path.display()))]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Unsupported config file format.
    #[snafu(display("Unsupported config format for {}: only .yaml/.yml supported", path.display()))]
    UnsupportedFormat { path: PathBuf },

    /// Environment variable interpolation failed.
    #[snafu(display("Environment variable interpolation failed:\n{message}"))]
    EnvInterpolation { message: String },

    /// Failed to parse YAML configuration.
    #[snafu(display("Failed to parse YAML: {source}"))]
    YamlParse { source: serde_yaml::Error },

    /// Target object name is empty.
    #[snafu(display("Object name cannot be empty"))]
    EmptyObject,

    /// Upsert was requested without a key field.
    #[snafu(display("action_type 'upsert' requires a non-empty upsert_key"))]
    MissingUpsertKey,

    /// Schema has no columns.
    #[snafu(display("Schema must have at least one column"))]
    EmptySchema,

    /// Two schema columns share a name.
    #[snafu(display("Schema column '{name}' is declared more than once"))]
    DuplicateColumn { name: String },

    /// No input partitions were configured.
    #[snafu(display("At least one input path is required"))]
    NoInputs,

    /// Batch size outside the accepted range.
    #[snafu(display("batch_size must be between 1 and {max}, got {size}"))]
    InvalidBatchSize { size: usize, max: usize },

    /// A required authentication setting is empty.
    #[snafu(display("Authentication setting '{field}' cannot be empty"))]
    MissingCredential { field: &'static str },
}
