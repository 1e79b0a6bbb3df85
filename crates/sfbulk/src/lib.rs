//! sfbulk: batch loader for Salesforce objects.
//!
//! This crate handles:
//! - Reading NDJSON partitions and typing them with a declared schema
//! - Converting rows into remote objects, widening integers to doubles
//! - Writing fixed-size batches through the sObject Collections API
//! - Classifying faults into fatal aborts and per-row failures
//! - Per-worker JSON-lines error files, merged once every worker is done

pub mod classifier;
pub mod config;
pub mod connection;
pub mod error;
pub mod error_log;
pub mod mapper;
pub mod pipeline;
pub mod record;
pub mod source;

// Re-export commonly used items
pub use config::JobConfig;
pub use error::JobError;
pub use pipeline::{JobReport, JobSettings, run_job};

// Re-export from sfbulk-core
pub use sfbulk_core::{CliArgs, init_tracing};
