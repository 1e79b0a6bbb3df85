//! Remote write contract.
//!
//! A [`RemoteConnection`] accepts a batch of remote objects and reports either
//! one result per object or a single fault for the whole call. The rest of the
//! pipeline only depends on this contract; [`rest`] provides the Salesforce
//! implementation and [`auth`] the session factory.

pub mod auth;
pub mod rest;
mod results;

use std::fmt;

use async_trait::async_trait;

use crate::error::ConnectionError;
use crate::mapper::RemoteObject;

pub use auth::{AuthMethod, Session};
pub use rest::{SalesforceConnection, SalesforceConnector};
pub use results::{ApiError, SaveResult, UpsertResult};

/// Fault code used when the request never produced a response.
pub const TRANSPORT_ERROR: &str = "TRANSPORT_ERROR";

/// Write action, fixed for the whole job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionType {
    /// Create new objects.
    Insert,
    /// Modify existing objects; each record carries its identifier.
    Update,
    /// Create or update, matched on an external id field.
    Upsert { key: String },
}

impl ActionType {
    pub fn name(&self) -> &'static str {
        match self {
            ActionType::Insert => "insert",
            ActionType::Update => "update",
            ActionType::Upsert { .. } => "upsert",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionType::Upsert { key } => write!(f, "upsert({key})"),
            other => f.write_str(other.name()),
        }
    }
}

/// One field-level error reported for a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub code: String,
    pub message: String,
    pub fields: Vec<String>,
}

impl FieldError {
    pub fn new(code: impl Into<String>, message: impl Into<String>, fields: Vec<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            fields,
        }
    }
}

/// Result for one record of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordResult {
    pub success: bool,
    pub errors: Vec<FieldError>,
}

impl RecordResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            errors: Vec::new(),
        }
    }

    pub fn failed(errors: Vec<FieldError>) -> Self {
        Self {
            success: false,
            errors,
        }
    }
}

/// A failure covering a whole write call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub code: String,
    pub message: String,
}

impl Fault {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// What a write call returned.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// Index-aligned with the batch that was sent.
    Results(Vec<RecordResult>),
    Fault(Fault),
}

/// An authenticated session able to write batches.
#[async_trait]
pub trait RemoteConnection: Send + Sync {
    /// Send one batch. Transport problems are reported as a fault.
    async fn write(&self, action: &ActionType, batch: &[RemoteObject]) -> WriteOutcome;

    /// Release the session.
    async fn close(&self) -> Result<(), ConnectionError>;
}

/// Opens one connection per worker.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn RemoteConnection>, ConnectionError>;
}
