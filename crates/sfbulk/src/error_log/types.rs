//! Error file line format and naming.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One failed row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Field values as sent, explicit nulls kept.
    pub record_data: IndexMap<String, Option<String>>,
    /// Error codes, comma separated when a row had several.
    pub error_code: String,
    /// Error messages, one per line.
    pub error_message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub affected_fields: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub task_index: usize,
    /// Position of the row in its worker's input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_index: Option<usize>,
}

/// File name prefix shared by every per-worker file of `base`.
pub fn task_file_prefix(base: &Path) -> Option<OsString> {
    let mut prefix = base.file_name()?.to_os_string();
    prefix.push("_task");
    Some(prefix)
}

/// Path of the per-worker error file for `task_index`.
pub fn task_file_path(base: &Path, task_index: usize) -> PathBuf {
    let mut path = base.as_os_str().to_os_string();
    path.push(format!("_task{task_index:03}.jsonl"));
    PathBuf::from(path)
}
