//! Per-worker error file writer.

use std::path::{Path, PathBuf};

use snafu::prelude::*;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info};

use super::types::{ErrorRecord, task_file_path};
use crate::error::{
    CreateDirSnafu, ErrorLogError, OpenFileSnafu, RemoveFileSnafu, SerializeRecordSnafu,
    WriteFileSnafu,
};

/// Buffered records are written out every this many appends.
pub const FLUSH_INTERVAL: usize = 100;

struct FileSink {
    path: PathBuf,
    file: File,
    buffer: Vec<ErrorRecord>,
}

/// Append-only error file owned by one worker.
///
/// Without a target path the log is a no-op and never touches the
/// filesystem. With a target, a file that ends up with no records is removed
/// on [`close`](ErrorLog::close).
pub struct ErrorLog {
    task_index: usize,
    sink: Option<FileSink>,
    appended: usize,
}

impl ErrorLog {
    /// A log that discards everything.
    pub fn disabled(task_index: usize) -> Self {
        Self {
            task_index,
            sink: None,
            appended: 0,
        }
    }

    /// Open the log for `task_index`, or a disabled log when `base` is `None`.
    ///
    /// A file that cannot be created is logged and the worker continues with
    /// a disabled log.
    pub async fn open(base: Option<&Path>, task_index: usize) -> Self {
        let Some(base) = base else {
            return Self::disabled(task_index);
        };

        match Self::try_open(base, task_index).await {
            Ok(log) => log,
            Err(e) => {
                error!(task = task_index, error = %e, "Failed to open error file, failures will not be written");
                Self::disabled(task_index)
            }
        }
    }

    /// Create `<base>_task<NNN>.jsonl` and its parent directories.
    pub async fn try_open(base: &Path, task_index: usize) -> Result<Self, ErrorLogError> {
        let path = task_file_path(base, task_index);

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .context(CreateDirSnafu { path: parent })?;
        }

        let file = File::create(&path).await.context(OpenFileSnafu { path: &path })?;
        debug!(task = task_index, path = %path.display(), "Opened error file");

        Ok(Self {
            task_index,
            sink: Some(FileSink {
                path,
                file,
                buffer: Vec::new(),
            }),
            appended: 0,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.sink.as_ref().map(|sink| sink.path.as_path())
    }

    /// Buffer a record, writing the buffer out every [`FLUSH_INTERVAL`] records.
    pub async fn append(&mut self, record: ErrorRecord) {
        let Some(sink) = self.sink.as_mut() else {
            return;
        };

        sink.buffer.push(record);
        self.appended += 1;

        if sink.buffer.len() >= FLUSH_INTERVAL
            && let Err(e) = self.flush().await
        {
            error!(task = self.task_index, error = %e, "Failed to flush error file");
        }
    }

    /// Write buffered records to the file.
    pub async fn flush(&mut self) -> Result<(), ErrorLogError> {
        let Some(sink) = self.sink.as_mut() else {
            return Ok(());
        };
        if sink.buffer.is_empty() {
            return Ok(());
        }

        let mut ndjson = String::new();
        for record in &sink.buffer {
            let line = serde_json::to_string(record).context(SerializeRecordSnafu)?;
            ndjson.push_str(&line);
            ndjson.push('\n');
        }

        sink.file
            .write_all(ndjson.as_bytes())
            .await
            .context(WriteFileSnafu { path: &sink.path })?;
        sink.file
            .flush()
            .await
            .context(WriteFileSnafu { path: &sink.path })?;

        // Cleared only once written; close() retries what is left.
        let count = sink.buffer.len();
        sink.buffer.clear();
        debug!(task = self.task_index, count, "Flushed error records");
        Ok(())
    }

    /// Flush pending records and release the file, removing it when empty.
    ///
    /// Returns the number of records appended.
    pub async fn close(mut self) -> Result<usize, ErrorLogError> {
        let flushed = self.flush().await;

        let Some(sink) = self.sink.take() else {
            return Ok(self.appended);
        };
        let FileSink { path, file, .. } = sink;
        drop(file);

        if self.appended == 0 {
            fs::remove_file(&path)
                .await
                .context(RemoveFileSnafu { path: &path })?;
            debug!(task = self.task_index, "Removed empty error file");
        } else {
            info!(
                task = self.task_index,
                count = self.appended,
                path = %path.display(),
                "Wrote error records"
            );
        }

        flushed.map(|_| self.appended)
    }
}
