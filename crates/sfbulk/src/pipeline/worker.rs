//! One worker: batch, write, classify, log.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use snafu::prelude::*;
use tracing::{debug, error, info, warn};

use sfbulk_core::emit;
use sfbulk_core::metrics::events::{
    BatchFaulted, BatchesSent, FaultSeverity, RecordsFailed, RecordsSubmitted, WorkerAborted,
};

use super::JobSettings;
use crate::classifier::{Classified, ErrorClassifier, FailureDetail, Verdict};
use crate::connection::RemoteConnection;
use crate::error::{AbortedSnafu, WorkerError};
use crate::error_log::{ErrorLog, ErrorRecord};
use crate::mapper::{FieldMapper, RemoteObject};
use crate::source::RecordSource;

/// Prefix of the log line written for every failed row.
pub const FAILURE_LOG_PREFIX: &str = "[sfbulk failure]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Streaming,
    /// End of input reached, sending the partial batch.
    Flushing,
    Done,
    Aborted,
}

/// Result of one worker's run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSummary {
    pub task_index: usize,
    pub failed: bool,
    pub failure_count: u64,
}

/// Mutable state owned by a single run.
struct WorkerContext {
    failure_count: u64,
    error_log: ErrorLog,
    batch: Vec<RemoteObject>,
    /// Input position of `batch[0]`.
    batch_start: usize,
    state: WorkerState,
}

impl WorkerContext {
    fn new(error_log: ErrorLog, capacity: usize) -> Self {
        Self {
            failure_count: 0,
            error_log,
            batch: Vec::with_capacity(capacity),
            batch_start: 0,
            state: WorkerState::Streaming,
        }
    }
}

/// Streams one partition to the remote API in fixed-size batches.
pub struct BatchUploader {
    task_index: usize,
    settings: Arc<JobSettings>,
    mapper: FieldMapper,
    classifier: ErrorClassifier,
    connection: Box<dyn RemoteConnection>,
}

impl BatchUploader {
    pub fn new(
        task_index: usize,
        settings: Arc<JobSettings>,
        connection: Box<dyn RemoteConnection>,
    ) -> Self {
        let mapper = FieldMapper::new(&settings.object, settings.null_policy);
        Self {
            task_index,
            settings,
            mapper,
            classifier: ErrorClassifier,
            connection,
        }
    }

    /// Upload every record of `source`.
    ///
    /// The error log and the connection are closed on every path. A fatal
    /// fault is returned as [`WorkerError::Aborted`]; any other worker error
    /// is logged and reported as a failed summary.
    pub async fn run(
        self,
        mut source: Box<dyn RecordSource>,
        error_log: ErrorLog,
    ) -> Result<WorkerSummary, WorkerError> {
        let mut ctx = WorkerContext::new(error_log, self.settings.batch_size);
        let result = self.process(source.as_mut(), &mut ctx).await;

        let WorkerContext {
            failure_count,
            error_log,
            mut state,
            ..
        } = ctx;

        if let Err(e) = error_log.close().await {
            error!(task = self.task_index, error = %e, "Failed to close error file");
        }
        if let Err(e) = self.connection.close().await {
            warn!(task = self.task_index, error = %e, "Failed to close connection");
        }

        let summary = WorkerSummary {
            task_index: self.task_index,
            failed: failure_count > 0,
            failure_count,
        };

        match result {
            Ok(()) => {
                info!(
                    task = self.task_index,
                    failures = failure_count,
                    state = ?state,
                    "Worker finished"
                );
                Ok(summary)
            }
            Err(e) if e.is_abort() => {
                state = WorkerState::Aborted;
                error!(task = self.task_index, state = ?state, error = %e, "Worker aborted");
                emit!(WorkerAborted {
                    task_index: self.task_index,
                    object: self.settings.object.clone(),
                });
                Err(e)
            }
            Err(e) => {
                error!(
                    task = self.task_index,
                    failures = failure_count,
                    state = ?state,
                    error = %e,
                    "Worker stopped early"
                );
                Ok(WorkerSummary {
                    failed: true,
                    ..summary
                })
            }
        }
    }

    async fn process(
        &self,
        source: &mut dyn RecordSource,
        ctx: &mut WorkerContext,
    ) -> Result<(), WorkerError> {
        ctx.state = WorkerState::Streaming;

        while let Some(next) = source.next_record().await {
            let record = match next {
                Ok(record) => record,
                Err(e) => {
                    // Rows already read still go out.
                    self.flush(ctx).await?;
                    return Err(e.into());
                }
            };

            ctx.batch.push(self.mapper.convert(&record));
            if ctx.batch.len() >= self.settings.batch_size {
                self.flush(ctx).await?;
            }
        }

        ctx.state = WorkerState::Flushing;
        self.flush(ctx).await?;
        ctx.state = WorkerState::Done;
        Ok(())
    }

    async fn flush(&self, ctx: &mut WorkerContext) -> Result<(), WorkerError> {
        if ctx.batch.is_empty() {
            return Ok(());
        }

        let batch = std::mem::take(&mut ctx.batch);
        let batch_start = ctx.batch_start;
        ctx.batch_start += batch.len();

        let object = &self.settings.object;
        debug!(task = self.task_index, batch = batch.len(), start = batch_start, "Sending batch");
        emit!(BatchesSent {
            count: 1,
            object: object.clone(),
        });
        emit!(RecordsSubmitted {
            count: batch.len() as u64,
            object: object.clone(),
        });

        let outcome = self.connection.write(&self.settings.action, &batch).await;
        let verdicts = match self.classifier.classify(batch.len(), outcome)? {
            Classified::Rows(verdicts) => verdicts,
            Classified::BatchFault { fault, verdicts } => {
                warn!(
                    task = self.task_index,
                    code = %fault.code,
                    message = %fault.message,
                    batch = batch.len(),
                    "Batch failed"
                );
                emit!(BatchFaulted {
                    code: fault.code,
                    severity: FaultSeverity::Recoverable,
                    object: object.clone(),
                });
                verdicts
            }
            Classified::Abort(fault) => {
                emit!(BatchFaulted {
                    code: fault.code.clone(),
                    severity: FaultSeverity::Fatal,
                    object: object.clone(),
                });
                return AbortedSnafu { fault }.fail();
            }
        };

        let mut failed = 0;
        for (offset, (remote, verdict)) in batch.iter().zip(&verdicts).enumerate() {
            if let Verdict::Failure(detail) = verdict {
                self.record_failure(ctx, batch_start + offset, remote, detail).await;
                failed += 1;
            }
        }

        if failed > 0 {
            emit!(RecordsFailed {
                count: failed,
                object: object.clone(),
            });
        }
        Ok(())
    }

    async fn record_failure(
        &self,
        ctx: &mut WorkerContext,
        record_index: usize,
        remote: &RemoteObject,
        detail: &FailureDetail,
    ) {
        ctx.failure_count += 1;
        let snapshot = remote.snapshot();

        let errors: Vec<_> = detail
            .errors()
            .iter()
            .map(|e| json!({ "code": e.code, "message": e.message, "fields": e.fields }))
            .collect();
        error!(
            task = self.task_index,
            "{} {}",
            FAILURE_LOG_PREFIX,
            json!({ "object": snapshot, "errors": errors })
        );

        ctx.error_log
            .append(ErrorRecord {
                record_data: snapshot,
                error_code: detail.code(),
                error_message: detail.message(),
                affected_fields: detail.affected_fields(),
                timestamp: Utc::now(),
                task_index: self.task_index,
                record_index: Some(record_index),
            })
            .await;
    }
}
