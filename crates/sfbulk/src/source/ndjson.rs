//! Newline-delimited JSON input files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as Json;
use snafu::prelude::*;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tracing::debug;

use super::RecordSource;
use crate::error::{
    NotAnObjectSnafu, OpenInputSnafu, ParseLineSnafu, ReadInputSnafu, SourceError,
    TypeMismatchSnafu,
};
use crate::record::{ColumnType, Record, Schema, Value};

/// Reads one JSON object per line and types it with the job schema.
pub struct NdjsonSource {
    path: PathBuf,
    schema: Arc<Schema>,
    lines: Lines<BufReader<File>>,
    line: usize,
}

impl NdjsonSource {
    pub async fn open(path: &Path, schema: Arc<Schema>) -> Result<Self, SourceError> {
        let file = File::open(path).await.context(OpenInputSnafu { path })?;
        debug!(path = %path.display(), "Opened input");
        Ok(Self {
            path: path.to_path_buf(),
            schema,
            lines: BufReader::new(file).lines(),
            line: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RecordSource for NdjsonSource {
    async fn next_record(&mut self) -> Option<Result<Record, SourceError>> {
        loop {
            let text = match self.lines.next_line().await {
                Ok(Some(text)) => text,
                Ok(None) => return None,
                Err(e) => return Some(Err(e).context(ReadInputSnafu { path: &self.path })),
            };
            self.line += 1;

            if text.trim().is_empty() {
                continue;
            }
            return Some(coerce_line(&text, &self.schema, &self.path, self.line));
        }
    }
}

/// Parse one line and coerce it to the schema.
///
/// Keys missing from the object and JSON nulls become null values. Keys not
/// in the schema are ignored.
pub fn coerce_line(
    text: &str,
    schema: &Schema,
    path: &Path,
    line: usize,
) -> Result<Record, SourceError> {
    let parsed: Json = serde_json::from_str(text).context(ParseLineSnafu { path, line })?;
    let Json::Object(mut object) = parsed else {
        return NotAnObjectSnafu { path, line }.fail();
    };

    schema
        .columns
        .iter()
        .map(|column| {
            let value = match object.remove(&column.name) {
                None | Some(Json::Null) => None,
                Some(json) => Some(coerce(json, column.column_type).context(TypeMismatchSnafu {
                    path,
                    line,
                    column: &column.name,
                    expected: column.column_type,
                })?),
            };
            Ok::<_, SourceError>((column.name.clone(), value))
        })
        .collect()
}

fn coerce(json: Json, column_type: ColumnType) -> Option<Value> {
    match (column_type, json) {
        (ColumnType::Boolean, Json::Bool(b)) => Some(Value::Boolean(b)),
        (ColumnType::Integer, Json::Number(n)) => n.as_i64().map(Value::Integer),
        (ColumnType::Float, Json::Number(n)) => n.as_f64().map(Value::Float),
        (ColumnType::String, Json::String(s)) => Some(Value::String(s)),
        (ColumnType::Timestamp, Json::String(s)) => DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|ts| Value::Timestamp(ts.with_timezone(&Utc))),
        (ColumnType::Timestamp, Json::Number(n)) => n
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .map(Value::Timestamp),
        (ColumnType::Json, json) => Some(Value::Json(json)),
        _ => None,
    }
}
