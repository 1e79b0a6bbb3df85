//! Error types for the sfbulk loader.

use std::path::PathBuf;

use snafu::prelude::*;

use crate::connection::Fault;
use crate::record::ColumnType;

pub use sfbulk_core::error::ConfigError;

/// Errors raised while reading input records.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SourceError {
    /// Failed to open an input file.
    #[snafu(display("Failed to open input {}: {source}", path.display()))]
    OpenInput {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to read a line from an input file.
    #[snafu(display("Failed to read input {}: {source}", path.display()))]
    ReadInput {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Line is not valid JSON.
    #[snafu(display("Invalid JSON in {} line {line}: {source}", path.display()))]
    ParseLine {
        path: PathBuf,
        line: usize,
        source: serde_json::Error,
    },

    /// Line is valid JSON but not an object.
    #[snafu(display("Expected a JSON object in {} line {line}", path.display()))]
    NotAnObject { path: PathBuf, line: usize },

    /// Column value does not match its declared type.
    #[snafu(display(
        "Column '{column}' in {} line {line} is not a valid {expected:?}",
        path.display()
    ))]
    TypeMismatch {
        path: PathBuf,
        line: usize,
        column: String,
        expected: ColumnType,
    },
}

/// Errors raised by the per-worker error file and by aggregation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ErrorLogError {
    /// Failed to create the error file directory.
    #[snafu(display("Failed to create directory {}: {source}", path.display()))]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to open an error file.
    #[snafu(display("Failed to open error file {}: {source}", path.display()))]
    OpenFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write to an error file.
    #[snafu(display("Failed to write error file {}: {source}", path.display()))]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to serialize an error record.
    #[snafu(display("Failed to serialize error record: {source}"))]
    SerializeRecord { source: serde_json::Error },

    /// Failed to list per-worker error files.
    #[snafu(display("Failed to list directory {}: {source}", path.display()))]
    ListDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to delete an error file.
    #[snafu(display("Failed to remove {}: {source}", path.display()))]
    RemoveFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The configured base path has no file name component.
    #[snafu(display("Error file path {} has no file name", path.display()))]
    InvalidBasePath { path: PathBuf },
}

/// Errors raised while establishing or closing a remote session.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConnectionError {
    /// Failed to build the HTTP client.
    #[snafu(display("Failed to build HTTP client: {source}"))]
    HttpClient { source: reqwest::Error },

    /// Login request failed at the transport level.
    #[snafu(display("Login request failed: {source}"))]
    LoginRequest { source: reqwest::Error },

    /// Login was rejected by the remote API.
    #[snafu(display("Login rejected ({code}): {message}"))]
    LoginFault { code: String, message: String },

    /// Login response is not well-formed XML.
    #[snafu(display("Failed to read login response: {source}"))]
    LoginXml { source: quick_xml::Error },

    /// Login response did not contain the expected session fields.
    #[snafu(display("Malformed login response: {message}"))]
    MalformedLogin { message: String },

    /// A configured or returned URL could not be parsed.
    #[snafu(display("Invalid URL '{url}': {source}"))]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },

    /// Logout request failed.
    #[snafu(display("Logout failed: {source}"))]
    Logout { source: reqwest::Error },
}

/// Errors that end a single worker.
///
/// Only `Aborted` is meant to reach the job as a hard failure; the other
/// variants are local and mark the worker failed.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum WorkerError {
    /// The remote API returned a fault that makes the session unusable.
    #[snafu(display("Aborted by fatal fault {}: {}", fault.code, fault.message))]
    Aborted { fault: Fault },

    /// The remote API returned a different number of results than records sent.
    #[snafu(display("Remote returned {actual} results for a batch of {expected}"))]
    ResultCountMismatch { expected: usize, actual: usize },

    /// Reading the input failed.
    #[snafu(display("Input error: {source}"))]
    Source { source: SourceError },
}

impl WorkerError {
    pub fn is_abort(&self) -> bool {
        matches!(self, WorkerError::Aborted { .. })
    }
}

/// Top-level job errors.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum JobError {
    /// Configuration error.
    #[snafu(display("Configuration error: {source}"))]
    Config { source: ConfigError },

    /// Authentication settings could not be turned into a connector.
    #[snafu(display("Authentication setup failed: {source}"))]
    Auth { source: ConnectionError },

    /// An input partition could not be opened.
    #[snafu(display("Input error: {source}"))]
    Input { source: SourceError },

    /// A worker could not open its connection.
    #[snafu(display("Worker {task_index} failed to connect: {source}"))]
    Connect {
        task_index: usize,
        source: ConnectionError,
    },

    /// A worker hit a fatal fault.
    #[snafu(display("Worker {task_index} aborted: {source}"))]
    WorkerAborted {
        task_index: usize,
        source: WorkerError,
    },

    /// Task join error.
    #[snafu(display("Task join error: {source}"))]
    TaskJoin { source: tokio::task::JoinError },

    /// The job finished with failed records and is configured to raise.
    #[snafu(display("There are {count} failures"))]
    Failures { count: u64 },
}

impl From<ConfigError> for JobError {
    fn from(source: ConfigError) -> Self {
        JobError::Config { source }
    }
}

impl From<SourceError> for WorkerError {
    fn from(source: SourceError) -> Self {
        WorkerError::Source { source }
    }
}
