//! Structured per-worker error files.
//!
//! Each worker writes the rows it failed to `<base>_task<NNN>.jsonl`, one JSON
//! object per line. After every worker has finished, [`aggregate`] merges the
//! per-worker files into `<base>` in worker order.

mod aggregate;
mod types;
mod writer;

pub use aggregate::{AggregateSummary, aggregate};
pub use types::{ErrorRecord, task_file_path, task_file_prefix};
pub use writer::{ErrorLog, FLUSH_INTERVAL};
