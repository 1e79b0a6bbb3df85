//! Record sources.
//!
//! A source yields the records of one input partition in order. Each worker
//! owns exactly one source.

mod ndjson;

use std::collections::VecDeque;

use async_trait::async_trait;

use crate::error::SourceError;
use crate::record::Record;

pub use ndjson::{NdjsonSource, coerce_line};

#[async_trait]
pub trait RecordSource: Send {
    /// The next record, or `None` at the end of the partition.
    async fn next_record(&mut self) -> Option<Result<Record, SourceError>>;
}

/// Records held in memory.
#[derive(Debug, Default)]
pub struct MemorySource {
    records: VecDeque<Result<Record, SourceError>>,
}

impl MemorySource {
    pub fn new(records: impl IntoIterator<Item = Record>) -> Self {
        Self {
            records: records.into_iter().map(Ok).collect(),
        }
    }

    /// A source that yields `records` and then `error`.
    pub fn failing_after(records: impl IntoIterator<Item = Record>, error: SourceError) -> Self {
        let mut source = Self::new(records);
        source.records.push_back(Err(error));
        source
    }
}

#[async_trait]
impl RecordSource for MemorySource {
    async fn next_record(&mut self) -> Option<Result<Record, SourceError>> {
        self.records.pop_front()
    }
}
