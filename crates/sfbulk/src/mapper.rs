//! Conversion of input records into remote objects.
//!
//! The remote API models every numeric field as a double, so integers are
//! widened before they are sent. Sending the integer form silently corrupts
//! values on update and upsert.

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;

use crate::record::{Record, Value};

/// How null column values are sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NullPolicy {
    /// Leave the field out of the object; the remote value is untouched.
    #[default]
    IgnoreNulls,
    /// List the field in `fields_to_null`; the remote value is cleared.
    ExplicitNull,
}

impl NullPolicy {
    pub fn from_ignore_nulls(ignore_nulls: bool) -> Self {
        if ignore_nulls {
            NullPolicy::IgnoreNulls
        } else {
            NullPolicy::ExplicitNull
        }
    }
}

/// A value in the remote API's native representation.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteValue {
    String(String),
    Double(f64),
    Boolean(bool),
    DateTime(DateTime<Utc>),
}

impl RemoteValue {
    /// Text form used in error snapshots.
    pub fn render(&self) -> String {
        match self {
            RemoteValue::String(s) => s.clone(),
            RemoteValue::Double(d) => format!("{d:?}"),
            RemoteValue::Boolean(b) => b.to_string(),
            RemoteValue::DateTime(ts) => ts.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// One row converted for the remote API.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteObject {
    object_type: String,
    fields: IndexMap<String, RemoteValue>,
    fields_to_null: Vec<String>,
    /// Every source column in record order, including nulls left out of the request.
    columns: Vec<String>,
}

impl RemoteObject {
    pub fn new(object_type: impl Into<String>) -> Self {
        Self {
            object_type: object_type.into(),
            fields: IndexMap::new(),
            fields_to_null: Vec::new(),
            columns: Vec::new(),
        }
    }

    pub fn object_type(&self) -> &str {
        &self.object_type
    }

    pub fn fields(&self) -> &IndexMap<String, RemoteValue> {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&RemoteValue> {
        self.fields.get(name)
    }

    pub fn fields_to_null(&self) -> &[String] {
        &self.fields_to_null
    }

    pub fn set(&mut self, name: impl Into<String>, value: RemoteValue) {
        let name = name.into();
        self.add_column(&name);
        self.fields.insert(name, value);
    }

    pub fn set_null(&mut self, name: impl Into<String>) {
        let name = name.into();
        self.add_column(&name);
        self.fields_to_null.push(name);
    }

    /// Note a null column that is not sent.
    pub fn skip_null(&mut self, name: impl Into<String>) {
        self.add_column(&name.into());
    }

    fn add_column(&mut self, name: &str) {
        if !self.columns.iter().any(|column| column == name) {
            self.columns.push(name.to_string());
        }
    }

    /// Every column to text in record order, nulls kept as `None`.
    pub fn snapshot(&self) -> IndexMap<String, Option<String>> {
        self.columns
            .iter()
            .map(|name| (name.clone(), self.fields.get(name).map(RemoteValue::render)))
            .collect()
    }
}

/// Converts records for one target object under a fixed null policy.
#[derive(Debug, Clone)]
pub struct FieldMapper {
    object_type: String,
    null_policy: NullPolicy,
}

impl FieldMapper {
    pub fn new(object_type: impl Into<String>, null_policy: NullPolicy) -> Self {
        Self {
            object_type: object_type.into(),
            null_policy,
        }
    }

    pub fn convert(&self, record: &Record) -> RemoteObject {
        let mut object = RemoteObject::new(&self.object_type);

        for (name, value) in record.iter() {
            match value {
                Some(value) => object.set(name, convert_value(value)),
                None if self.null_policy == NullPolicy::ExplicitNull => object.set_null(name),
                None => object.skip_null(name),
            }
        }

        object
    }
}

fn convert_value(value: &Value) -> RemoteValue {
    match value {
        Value::Boolean(b) => RemoteValue::Boolean(*b),
        Value::Integer(i) => RemoteValue::Double(*i as f64),
        Value::Float(f) => RemoteValue::Double(*f),
        Value::String(s) => RemoteValue::String(s.clone()),
        Value::Timestamp(ts) => {
            // Millisecond precision, UTC.
            let millis = ts.timestamp_millis();
            RemoteValue::DateTime(DateTime::from_timestamp_millis(millis).unwrap_or(*ts))
        }
        Value::Json(json) => RemoteValue::String(json.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Record {
        Record::new()
            .with("Name", Some(Value::String("Acme".into())))
            .with("Employees", Some(Value::Integer(42)))
            .with("Score", Some(Value::Float(1.1)))
            .with("Active", Some(Value::Boolean(true)))
            .with(
                "Opened",
                Some(Value::Timestamp(
                    DateTime::from_timestamp(100, 123_456_789).unwrap(),
                )),
            )
            .with("Meta", Some(Value::Json(json!({"tier": "gold"}))))
            .with("Phone", None)
            .with("Fax", None)
    }

    #[test]
    fn test_integer_is_sent_as_double() {
        let object = FieldMapper::new("Account", NullPolicy::IgnoreNulls).convert(&sample());
        assert_eq!(object.field("Employees"), Some(&RemoteValue::Double(42.0)));
        assert_eq!(object.field("Score"), Some(&RemoteValue::Double(1.1)));
    }

    #[test]
    fn test_passthrough_and_json() {
        let object = FieldMapper::new("Account", NullPolicy::IgnoreNulls).convert(&sample());
        assert_eq!(object.object_type(), "Account");
        assert_eq!(
            object.field("Name"),
            Some(&RemoteValue::String("Acme".into()))
        );
        assert_eq!(object.field("Active"), Some(&RemoteValue::Boolean(true)));
        assert_eq!(
            object.field("Meta"),
            Some(&RemoteValue::String(r#"{"tier":"gold"}"#.into()))
        );
    }

    #[test]
    fn test_timestamp_truncated_to_millis_utc() {
        let object = FieldMapper::new("Account", NullPolicy::IgnoreNulls).convert(&sample());
        let Some(RemoteValue::DateTime(ts)) = object.field("Opened") else {
            panic!("expected a datetime");
        };
        assert_eq!(ts.timestamp_millis(), 100_123);
        assert_eq!(ts.timestamp_subsec_nanos(), 123_000_000);
    }

    #[test]
    fn test_ignore_nulls_omits_fields() {
        let object = FieldMapper::new("Account", NullPolicy::IgnoreNulls).convert(&sample());
        assert!(object.fields_to_null().is_empty());
        assert!(object.field("Phone").is_none());
        assert_eq!(object.fields().len(), 6);
    }

    #[test]
    fn test_explicit_null_lists_fields() {
        let object = FieldMapper::new("Account", NullPolicy::ExplicitNull).convert(&sample());
        assert_eq!(object.fields_to_null(), ["Phone", "Fax"]);
        assert!(object.field("Phone").is_none());
        assert!(object.field("Fax").is_none());
    }

    #[test]
    fn test_conversion_is_idempotent() {
        let mapper = FieldMapper::new("Account", NullPolicy::ExplicitNull);
        let record = sample();
        assert_eq!(mapper.convert(&record), mapper.convert(&record));
    }

    #[test]
    fn test_snapshot_renders_text_and_keeps_nulls() {
        let object = FieldMapper::new("Account", NullPolicy::ExplicitNull).convert(&sample());
        let snapshot = object.snapshot();
        assert_eq!(snapshot["Employees"].as_deref(), Some("42.0"));
        assert_eq!(snapshot["Active"].as_deref(), Some("true"));
        assert_eq!(snapshot["Opened"].as_deref(), Some("1970-01-01T00:01:40.123Z"));
        assert_eq!(snapshot["Phone"], None);
        assert!(snapshot.contains_key("Fax"));
    }

    #[test]
    fn test_snapshot_keeps_record_order_under_both_policies() {
        let record = Record::new()
            .with("Fax", None)
            .with("Name", Some(Value::String("Acme".into())))
            .with("Phone", None);

        for policy in [NullPolicy::IgnoreNulls, NullPolicy::ExplicitNull] {
            let snapshot = FieldMapper::new("Account", policy).convert(&record).snapshot();
            let columns: Vec<&str> = snapshot.keys().map(String::as_str).collect();
            assert_eq!(columns, vec!["Fax", "Name", "Phone"], "{policy:?}");
            assert_eq!(snapshot["Fax"], None);
            assert_eq!(snapshot["Name"].as_deref(), Some("Acme"));
        }
    }
}
