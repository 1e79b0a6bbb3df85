//! Merging of per-worker error files.

use std::path::{Path, PathBuf};

use snafu::prelude::*;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use sfbulk_core::emit;
use sfbulk_core::metrics::events::ErrorLinesMerged;

use super::types::task_file_prefix;
use crate::error::{
    ErrorLogError, InvalidBasePathSnafu, ListDirSnafu, OpenFileSnafu, RemoveFileSnafu,
    WriteFileSnafu,
};

/// What a merge produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateSummary {
    /// Per-worker files found.
    pub files: usize,
    /// Lines written to the merged file.
    pub lines: usize,
    /// The merged file, when it was kept.
    pub output: Option<PathBuf>,
}

/// Merge every `<base>_task*` file into `base`.
///
/// Files are read in lexical name order, which is worker order thanks to the
/// zero-padded index. Blank lines are dropped. Every per-worker file is
/// removed once the merge is written, and the merged file is removed again
/// when it received no lines. A per-worker file that cannot be read or
/// removed is skipped. When writing the merged file fails, the partial file
/// is removed and the per-worker files are left in place.
pub async fn aggregate(base: &Path) -> Result<AggregateSummary, ErrorLogError> {
    let prefix = task_file_prefix(base).context(InvalidBasePathSnafu { path: base })?;
    let dir = match base.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut parts = Vec::new();
    let mut entries = match fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(AggregateSummary::default());
        }
        Err(e) => return Err(e).context(ListDirSnafu { path: &dir }),
    };
    while let Some(entry) = entries.next_entry().await.context(ListDirSnafu { path: &dir })? {
        if entry
            .file_name()
            .as_encoded_bytes()
            .starts_with(prefix.as_encoded_bytes())
        {
            parts.push(entry.path());
        }
    }
    parts.sort();

    let mut summary = AggregateSummary {
        files: parts.len(),
        ..Default::default()
    };
    if parts.is_empty() {
        return Ok(summary);
    }

    let mut output = File::create(base).await.context(OpenFileSnafu { path: base })?;
    let merged = merge_parts(&mut output, base, &parts).await;
    drop(output);

    let lines = match merged {
        Ok(lines) => lines,
        Err(e) => {
            // Parts stay on disk.
            if let Err(remove) = fs::remove_file(base).await {
                warn!(path = %base.display(), error = %remove, "Failed to remove partial merged file");
            }
            return Err(e);
        }
    };
    summary.lines = lines;

    for part in &parts {
        if let Err(e) = fs::remove_file(part).await {
            warn!(path = %part.display(), error = %e, "Failed to remove error file");
        }
    }

    if summary.lines == 0 {
        fs::remove_file(base)
            .await
            .context(RemoveFileSnafu { path: base })?;
        info!(files = summary.files, "No error records, merged file removed");
    } else {
        emit!(ErrorLinesMerged {
            count: summary.lines as u64
        });
        info!(
            files = summary.files,
            lines = summary.lines,
            path = %base.display(),
            "Merged error files"
        );
        summary.output = Some(base.to_path_buf());
    }

    Ok(summary)
}

/// Append the non-blank lines of every part to `base`.
async fn merge_parts(
    output: &mut File,
    base: &Path,
    parts: &[PathBuf],
) -> Result<usize, ErrorLogError> {
    let mut lines = 0;

    for part in parts {
        let contents = match fs::read_to_string(part).await {
            Ok(contents) => contents,
            Err(e) => {
                warn!(path = %part.display(), error = %e, "Failed to read error file, skipping");
                continue;
            }
        };

        let mut chunk = String::new();
        for line in contents.lines().filter(|line| !line.trim().is_empty()) {
            chunk.push_str(line);
            chunk.push('\n');
            lines += 1;
        }
        output
            .write_all(chunk.as_bytes())
            .await
            .context(WriteFileSnafu { path: base })?;
    }

    output.flush().await.context(WriteFileSnafu { path: base })?;
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_log::task_file_path;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_merges_in_worker_order() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("errors.jsonl");
        std::fs::write(task_file_path(&base, 2), "{\"c\":1}\n{\"c\":2}\n").unwrap();
        std::fs::write(task_file_path(&base, 0), "{\"a\":1}\n").unwrap();
        std::fs::write(task_file_path(&base, 1), "").unwrap();

        let summary = aggregate(&base).await.unwrap();
        assert_eq!(summary.files, 3);
        assert_eq!(summary.lines, 3);
        assert_eq!(summary.output.as_deref(), Some(base.as_path()));

        let merged = std::fs::read_to_string(&base).unwrap();
        assert_eq!(merged, "{\"a\":1}\n{\"c\":1}\n{\"c\":2}\n");
        for i in 0..3 {
            assert!(!task_file_path(&base, i).exists());
        }
    }

    #[tokio::test]
    async fn test_unreadable_part_is_skipped() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("errors.jsonl");
        std::fs::write(task_file_path(&base, 0), "{\"a\":1}\n").unwrap();
        std::fs::create_dir(task_file_path(&base, 1)).unwrap();
        std::fs::write(task_file_path(&base, 2), "{\"c\":1}\n").unwrap();

        let summary = aggregate(&base).await.unwrap();
        assert_eq!(summary.files, 3);
        assert_eq!(summary.lines, 2);

        let merged = std::fs::read_to_string(&base).unwrap();
        assert_eq!(merged, "{\"a\":1}\n{\"c\":1}\n");
        assert!(!task_file_path(&base, 0).exists());
        assert!(!task_file_path(&base, 2).exists());
        assert!(task_file_path(&base, 1).is_dir());
    }

    #[tokio::test]
    async fn test_failed_merge_keeps_parts() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("errors.jsonl");
        std::fs::write(task_file_path(&base, 0), "{\"a\":1}\n").unwrap();
        std::fs::create_dir(&base).unwrap();

        let err = aggregate(&base).await.unwrap_err();
        assert!(matches!(err, ErrorLogError::OpenFile { .. }));
        assert!(task_file_path(&base, 0).exists());
    }

    #[tokio::test]
    async fn test_all_empty_leaves_no_output() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("errors.jsonl");
        std::fs::write(task_file_path(&base, 0), "").unwrap();
        std::fs::write(task_file_path(&base, 1), "\n\n").unwrap();

        let summary = aggregate(&base).await.unwrap();
        assert_eq!(summary.lines, 0);
        assert!(summary.output.is_none());
        assert!(!base.exists());
        assert!(!task_file_path(&base, 0).exists());
        assert!(!task_file_path(&base, 1).exists());
    }

    #[tokio::test]
    async fn test_no_parts_creates_nothing() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("errors.jsonl");
        std::fs::write(dir.path().join("other_task000.jsonl"), "{}\n").unwrap();

        let summary = aggregate(&base).await.unwrap();
        assert_eq!(summary, AggregateSummary::default());
        assert!(!base.exists());
        assert!(dir.path().join("other_task000.jsonl").exists());
    }

    #[tokio::test]
    async fn test_missing_directory_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("never/created/errors.jsonl");
        let summary = aggregate(&base).await.unwrap();
        assert_eq!(summary.files, 0);
    }
}
