//! Job configuration.

mod auth;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use sfbulk_core::config::{load_yaml, parse_yaml};

use crate::connection::ActionType;
use crate::error::ConfigError;
use crate::mapper::NullPolicy;
use crate::pipeline::{JobSettings, MAX_BATCH_SIZE};
use crate::record::Schema;

pub use auth::AuthConfig;

/// Write action as written in the job file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Insert,
    Update,
    Upsert,
}

/// Input partitions, one worker per path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputConfig {
    #[serde(default)]
    pub paths: Vec<PathBuf>,
}

/// A complete job file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobConfig {
    /// Target object type, e.g. `Account`.
    pub object: String,
    pub action_type: ActionKind,
    /// External id field matched on upsert.
    #[serde(default = "default_upsert_key")]
    pub upsert_key: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Leave null columns out instead of clearing the remote field.
    #[serde(default = "default_true")]
    pub ignore_nulls: bool,
    #[serde(default = "default_true")]
    pub throw_if_failed: bool,
    /// Base path of the error files; none are written when unset.
    #[serde(default)]
    pub error_records_detail_output_file: Option<PathBuf>,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    pub auth: AuthConfig,
    #[serde(default)]
    pub input: InputConfig,
    pub schema: Schema,
}

fn default_upsert_key() -> String {
    "key".to_string()
}

fn default_batch_size() -> usize {
    MAX_BATCH_SIZE
}

fn default_true() -> bool {
    true
}

fn default_api_version() -> String {
    "46.0".to_string()
}

impl JobConfig {
    /// Load a job file. Non-empty `inputs` replace `input.paths`.
    pub fn load(path: &Path, inputs: &[PathBuf]) -> Result<Self, ConfigError> {
        let config: Self = load_yaml(path)?;
        config.with_inputs(inputs).validated()
    }

    /// Parse a job from YAML text and validate it.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        parse_yaml::<Self>(contents)?.validated()
    }

    fn with_inputs(mut self, inputs: &[PathBuf]) -> Self {
        if !inputs.is_empty() {
            self.input.paths = inputs.to_vec();
        }
        self
    }

    fn validated(self) -> Result<Self, ConfigError> {
        self.validate()?;
        Ok(self)
    }

    /// Check every setting before any worker starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.object.trim().is_empty() {
            return Err(ConfigError::EmptyObject);
        }
        if self.action_type == ActionKind::Upsert && self.upsert_key.trim().is_empty() {
            return Err(ConfigError::MissingUpsertKey);
        }
        if !(1..=MAX_BATCH_SIZE).contains(&self.batch_size) {
            return Err(ConfigError::InvalidBatchSize {
                size: self.batch_size,
                max: MAX_BATCH_SIZE,
            });
        }
        if self.schema.is_empty() {
            return Err(ConfigError::EmptySchema);
        }
        if let Some(name) = self.schema.duplicate_column() {
            return Err(ConfigError::DuplicateColumn {
                name: name.to_string(),
            });
        }
        if self.input.paths.is_empty() {
            return Err(ConfigError::NoInputs);
        }
        self.auth.validate()
    }

    pub fn action(&self) -> ActionType {
        match self.action_type {
            ActionKind::Insert => ActionType::Insert,
            ActionKind::Update => ActionType::Update,
            ActionKind::Upsert => ActionType::Upsert {
                key: self.upsert_key.clone(),
            },
        }
    }

    pub fn settings(&self) -> JobSettings {
        JobSettings {
            object: self.object.clone(),
            action: self.action(),
            batch_size: self.batch_size,
            null_policy: NullPolicy::from_ignore_nulls(self.ignore_nulls),
            error_file: self.error_records_detail_output_file.clone(),
            throw_if_failed: self.throw_if_failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ColumnType;
    use std::io::Write;
    use tempfile::TempDir;

    const MINIMAL: &str = r#"
object: Account
action_type: insert
auth:
  method: oauth
  server_url: https://acme.my.example.com
  access_token: token
input:
  paths: [accounts.jsonl]
schema:
  columns:
    - {name: Name, type: string}
    - {name: Employees, type: long}
"#;

    #[test]
    fn test_defaults() {
        let config = JobConfig::parse(MINIMAL).unwrap();
        assert_eq!(config.upsert_key, "key");
        assert_eq!(config.batch_size, 200);
        assert!(config.ignore_nulls);
        assert!(config.throw_if_failed);
        assert_eq!(config.api_version, "46.0");
        assert!(config.error_records_detail_output_file.is_none());
        assert_eq!(config.schema.columns[1].column_type, ColumnType::Integer);

        let settings = config.settings();
        assert_eq!(settings.action, ActionType::Insert);
        assert_eq!(settings.null_policy, NullPolicy::IgnoreNulls);
    }

    #[test]
    fn test_upsert_action_carries_key() {
        let yaml = MINIMAL.replace(
            "action_type: insert",
            "action_type: upsert\nupsert_key: External_Id__c\nignore_nulls: false",
        );
        let config = JobConfig::parse(&yaml).unwrap();
        let settings = config.settings();
        assert_eq!(
            settings.action,
            ActionType::Upsert {
                key: "External_Id__c".into()
            }
        );
        assert_eq!(settings.null_policy, NullPolicy::ExplicitNull);
    }

    #[test]
    fn test_validation_failures() {
        let cases = [
            ("object: Account", "object: ''"),
            ("action_type: insert", "action_type: upsert\nupsert_key: ' '"),
            ("action_type: insert", "action_type: insert\nbatch_size: 201"),
            ("action_type: insert", "action_type: insert\nbatch_size: 0"),
            ("paths: [accounts.jsonl]", "paths: []"),
            ("    - {name: Employees, type: long}", "    - {name: Name, type: long}"),
        ];
        for (from, to) in cases {
            let yaml = MINIMAL.replace(from, to);
            assert!(JobConfig::parse(&yaml).is_err(), "expected failure for {to}");
        }

        let yaml = MINIMAL.replace("action_type: insert", "action_type: insert\nbatch_size: 500");
        let err = JobConfig::parse(&yaml).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidBatchSize { size: 500, max: 200 }
        ));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let yaml = format!("{MINIMAL}retries: 3\n");
        assert!(matches!(
            JobConfig::parse(&yaml),
            Err(ConfigError::YamlParse { .. })
        ));
    }

    #[test]
    fn test_load_with_input_override() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("job.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "{}", MINIMAL.replace("paths: [accounts.jsonl]", "paths: []")).unwrap();

        assert!(matches!(
            JobConfig::load(&path, &[]),
            Err(ConfigError::NoInputs)
        ));

        let inputs = vec![PathBuf::from("a.jsonl"), PathBuf::from("b.jsonl")];
        let config = JobConfig::load(&path, &inputs).unwrap();
        assert_eq!(config.input.paths, inputs);
    }
}
