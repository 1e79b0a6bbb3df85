//! Failure classification for write outcomes.
//!
//! A fault in the abort set ends the worker. Any other fault fails every row
//! of its batch. Per-record results fail only the rejected rows.

use crate::connection::{Fault, FieldError, RecordResult, WriteOutcome};
use crate::error::WorkerError;

/// Fault codes after which the session cannot be used again.
pub const ABORT_CODES: &[&str] = &["INVALID_SESSION_ID", "INVALID_OPERATION_WITH_EXPIRED_PASSWORD"];

pub fn is_fatal(code: &str) -> bool {
    ABORT_CODES.contains(&code)
}

/// Why one row failed. Several field errors are combined into one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureDetail {
    errors: Vec<FieldError>,
}

impl FailureDetail {
    pub fn new(errors: Vec<FieldError>) -> Self {
        Self { errors }
    }

    pub fn from_fault(fault: &Fault) -> Self {
        Self::new(vec![FieldError::new(&fault.code, &fault.message, Vec::new())])
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Error codes joined with commas.
    pub fn code(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.code.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// One line per error, with the affected fields when there are any.
    pub fn message(&self) -> String {
        self.errors
            .iter()
            .map(|e| {
                if e.fields.is_empty() {
                    e.message.clone()
                } else {
                    format!("{} [fields: {}]", e.message, e.fields.join(", "))
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Every affected field, first occurrence order.
    pub fn affected_fields(&self) -> Vec<String> {
        let mut fields: Vec<String> = Vec::new();
        for field in self.errors.iter().flat_map(|e| &e.fields) {
            if !fields.contains(field) {
                fields.push(field.clone());
            }
        }
        fields
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Success,
    Failure(FailureDetail),
}

impl Verdict {
    pub fn is_failure(&self) -> bool {
        matches!(self, Verdict::Failure(_))
    }
}

/// A classified write outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
    /// One verdict per record, index-aligned with the batch.
    Rows(Vec<Verdict>),
    /// A non-fatal fault; every record of the batch failed with it.
    BatchFault { fault: Fault, verdicts: Vec<Verdict> },
    /// A fatal fault. Nothing is recorded per row.
    Abort(Fault),
}

impl Classified {
    /// Verdicts to record, empty for an abort.
    pub fn verdicts(&self) -> &[Verdict] {
        match self {
            Classified::Rows(verdicts) | Classified::BatchFault { verdicts, .. } => verdicts,
            Classified::Abort(_) => &[],
        }
    }

    pub fn failure_count(&self) -> usize {
        self.verdicts().iter().filter(|v| v.is_failure()).count()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Classify the outcome of writing a batch of `batch_len` records.
    ///
    /// A results array whose length differs from the batch is a
    /// [`WorkerError::ResultCountMismatch`].
    pub fn classify(&self, batch_len: usize, outcome: WriteOutcome) -> Result<Classified, WorkerError> {
        match outcome {
            WriteOutcome::Results(results) => {
                if results.len() != batch_len {
                    return Err(WorkerError::ResultCountMismatch {
                        expected: batch_len,
                        actual: results.len(),
                    });
                }
                Ok(Classified::Rows(results.into_iter().map(verdict).collect()))
            }
            WriteOutcome::Fault(fault) if is_fatal(&fault.code) => Ok(Classified::Abort(fault)),
            WriteOutcome::Fault(fault) => {
                let detail = FailureDetail::from_fault(&fault);
                let verdicts = vec![Verdict::Failure(detail); batch_len];
                Ok(Classified::BatchFault { fault, verdicts })
            }
        }
    }
}

fn verdict(result: RecordResult) -> Verdict {
    if result.success {
        Verdict::Success
    } else {
        Verdict::Failure(FailureDetail::new(result.errors))
    }
}
