//! Internal events for sfbulk metrics.
//!
//! Every event carries an `object` label naming the target object so that
//! several jobs reporting to one recorder stay distinguishable.

use metrics::counter;
use tracing::trace;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

/// Records handed to the remote API in one write call.
pub struct RecordsSubmitted {
    pub count: u64,
    pub object: String,
}

impl InternalEvent for RecordsSubmitted {
    fn emit(self) {
        trace!(count = self.count, object = %self.object, "Records submitted");
        counter!("sfbulk_records_submitted_total", "object" => self.object).increment(self.count);
    }
}

/// Records rejected by the remote API or lost to a batch fault.
pub struct RecordsFailed {
    pub count: u64,
    pub object: String,
}

impl InternalEvent for RecordsFailed {
    fn emit(self) {
        trace!(count = self.count, object = %self.object, "Records failed");
        counter!("sfbulk_records_failed_total", "object" => self.object).increment(self.count);
    }
}

/// Write calls issued.
pub struct BatchesSent {
    pub count: u64,
    pub object: String,
}

impl InternalEvent for BatchesSent {
    fn emit(self) {
        trace!(count = self.count, object = %self.object, "Batches sent");
        counter!("sfbulk_batches_sent_total", "object" => self.object).increment(self.count);
    }
}

/// Whether a batch fault stopped the worker or only failed its batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultSeverity {
    Fatal,
    Recoverable,
}

impl FaultSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultSeverity::Fatal => "fatal",
            FaultSeverity::Recoverable => "recoverable",
        }
    }
}

/// A write call that failed as a whole.
pub struct BatchFaulted {
    pub code: String,
    pub severity: FaultSeverity,
    pub object: String,
}

impl InternalEvent for BatchFaulted {
    fn emit(self) {
        trace!(
            code = %self.code,
            severity = self.severity.as_str(),
            object = %self.object,
            "Batch faulted"
        );
        counter!(
            "sfbulk_batch_faults_total",
            "code" => self.code,
            "severity" => self.severity.as_str(),
            "object" => self.object
        )
        .increment(1);
    }
}

/// A worker stopped before the end of its partition.
pub struct WorkerAborted {
    pub task_index: usize,
    pub object: String,
}

impl InternalEvent for WorkerAborted {
    fn emit(self) {
        trace!(task = self.task_index, object = %self.object, "Worker aborted");
        counter!("sfbulk_workers_aborted_total", "object" => self.object).increment(1);
    }
}

/// Lines copied into the aggregated error file.
pub struct ErrorLinesMerged {
    pub count: u64,
}

impl InternalEvent for ErrorLinesMerged {
    fn emit(self) {
        trace!(count = self.count, "Error lines merged");
        counter!("sfbulk_error_lines_merged_total").increment(self.count);
    }
}
