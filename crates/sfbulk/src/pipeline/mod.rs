//! Job coordination.
//!
//! Every input partition gets its own worker with its own connection and
//! error file. Workers share nothing while writing; once all of them have
//! finished, their error files are merged and the summaries rolled up.

mod worker;

use std::path::PathBuf;
use std::sync::Arc;

use snafu::prelude::*;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::connection::{ActionType, Connector};
use crate::error::{ConnectSnafu, FailuresSnafu, JobError};
use crate::error_log::{ErrorLog, aggregate};
use crate::mapper::NullPolicy;
use crate::source::RecordSource;

pub use worker::{BatchUploader, FAILURE_LOG_PREFIX, WorkerState, WorkerSummary};

/// Largest batch the collections endpoint accepts.
pub const MAX_BATCH_SIZE: usize = 200;

/// Settings shared by every worker of a job.
#[derive(Debug, Clone)]
pub struct JobSettings {
    /// Target object type.
    pub object: String,
    pub action: ActionType,
    pub batch_size: usize,
    pub null_policy: NullPolicy,
    /// Base path for error files. `None` disables them.
    pub error_file: Option<PathBuf>,
    /// Return [`JobError::Failures`] when any worker failed.
    pub throw_if_failed: bool,
}

/// Rolled-up outcome of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    /// Per-worker summaries in task order.
    pub workers: Vec<WorkerSummary>,
    pub failures: u64,
    pub failed: bool,
    /// Lines written to the merged error file.
    pub merged_lines: usize,
}

impl JobReport {
    pub fn from_summaries(mut workers: Vec<WorkerSummary>, merged_lines: usize) -> Self {
        workers.sort_by_key(|summary| summary.task_index);
        let failures = workers.iter().map(|summary| summary.failure_count).sum();
        let failed = workers.iter().any(|summary| summary.failed);
        Self {
            workers,
            failures,
            failed,
            merged_lines,
        }
    }
}

/// Run one worker per source and wait for all of them.
///
/// Error files are merged even when a worker aborted. The first hard error,
/// by task index, is returned after the merge.
pub async fn run_job(
    settings: Arc<JobSettings>,
    connector: Arc<dyn Connector>,
    sources: Vec<Box<dyn RecordSource>>,
) -> Result<JobReport, JobError> {
    let mut handles: JoinSet<(usize, Result<WorkerSummary, JobError>)> = JoinSet::new();

    for (task_index, source) in sources.into_iter().enumerate() {
        let settings = settings.clone();
        let connector = connector.clone();
        handles.spawn(async move {
            let result = run_worker(task_index, settings, connector, source).await;
            (task_index, result)
        });
    }

    info!(
        workers = handles.len(),
        object = %settings.object,
        action = %settings.action,
        "Spawned workers"
    );

    let mut summaries = Vec::new();
    let mut errors: Vec<(usize, JobError)> = Vec::new();
    while let Some(joined) = handles.join_next().await {
        match joined {
            Ok((_, Ok(summary))) => summaries.push(summary),
            Ok((task_index, Err(e))) => {
                error!(task = task_index, error = %e, "Worker failed");
                errors.push((task_index, e));
            }
            Err(e) => {
                error!(error = %e, "Worker task panicked");
                errors.push((usize::MAX, JobError::TaskJoin { source: e }));
            }
        }
    }

    let merged_lines = match &settings.error_file {
        Some(base) => match aggregate(base).await {
            Ok(summary) => summary.lines,
            Err(e) => {
                error!(error = %e, "Failed to merge error files");
                0
            }
        },
        None => 0,
    };

    if let Some((_, e)) = errors.into_iter().min_by_key(|(task_index, _)| *task_index) {
        return Err(e);
    }

    let report = JobReport::from_summaries(summaries, merged_lines);
    info!(
        workers = report.workers.len(),
        failures = report.failures,
        failed = report.failed,
        "Job finished"
    );

    if settings.throw_if_failed && report.failed {
        return FailuresSnafu {
            count: report.failures,
        }
        .fail();
    }
    Ok(report)
}

async fn run_worker(
    task_index: usize,
    settings: Arc<JobSettings>,
    connector: Arc<dyn Connector>,
    source: Box<dyn RecordSource>,
) -> Result<WorkerSummary, JobError> {
    let connection = connector
        .connect()
        .await
        .context(ConnectSnafu { task_index })?;
    let error_log = ErrorLog::open(settings.error_file.as_deref(), task_index).await;

    BatchUploader::new(task_index, settings, connection)
        .run(source, error_log)
        .await
        .map_err(|source| JobError::WorkerAborted { task_index, source })
}
