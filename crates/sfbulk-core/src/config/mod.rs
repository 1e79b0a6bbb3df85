//! Job configuration loading.
//!
//! A job is described by a single YAML file. Environment variables are
//! expanded before parsing so credentials can stay out of the file.

mod path;
mod vars;

pub use path::{CliArgs, is_yaml_file};
pub use vars::{interpolate, interpolate_with};

use std::path::Path;

use serde::de::DeserializeOwned;
use snafu::prelude::*;

use crate::error::{ConfigError, ReadFileSnafu, YamlParseSnafu};

/// Read a YAML file, expand environment variables and deserialize it.
pub fn load_yaml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !is_yaml_file(path) {
        return Err(ConfigError::UnsupportedFormat {
            path: path.to_path_buf(),
        });
    }

    let contents = std::fs::read_to_string(path).context(ReadFileSnafu { path })?;
    parse_yaml(&contents)
}

/// Expand environment variables in `contents` and deserialize the result.
pub fn parse_yaml<T: DeserializeOwned>(contents: &str) -> Result<T, ConfigError> {
    let text = interpolate(contents).map_err(|missing| ConfigError::EnvInterpolation {
        message: missing.join("\n"),
    })?;

    serde_yaml::from_str(&text).context(YamlParseSnafu)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::Write;
    use tempfile::TempDir;

    #[derive(Debug, Deserialize)]
    struct Sample {
        object: String,
        #[serde(default)]
        batch_size: Option<usize>,
    }

    #[test]
    fn test_load_yaml_reads_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("job.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "object: Account\nbatch_size: 50").unwrap();

        let sample: Sample = load_yaml(&path).unwrap();
        assert_eq!(sample.object, "Account");
        assert_eq!(sample.batch_size, Some(50));
    }

    #[test]
    fn test_load_yaml_rejects_other_extensions() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("job.toml");
        std::fs::write(&path, "object = 'Account'").unwrap();

        let err = load_yaml::<Sample>(&path).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_load_yaml_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = load_yaml::<Sample>(&dir.path().join("absent.yml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_parse_yaml_reports_bad_yaml() {
        let err = parse_yaml::<Sample>("object: [unclosed").unwrap_err();
        assert!(matches!(err, ConfigError::YamlParse { .. }));
    }
}
