//! Command line arguments.

use std::path::{Path, PathBuf};

use clap::Parser;

/// Check if a path has a YAML extension.
pub fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext == "yaml" || ext == "yml")
        .unwrap_or(false)
}

#[derive(Parser, Debug)]
#[command(version, about = "Push NDJSON records into Salesforce objects in batches")]
pub struct CliArgs {
    /// Path to the job configuration file
    #[arg(short, long)]
    pub config: PathBuf,

    /// Input NDJSON file, one worker per file (overrides `input.paths`)
    #[arg(short, long = "input")]
    pub inputs: Vec<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_yaml_file() {
        assert!(is_yaml_file(Path::new("job.yaml")));
        assert!(is_yaml_file(Path::new("conf/job.yml")));
        assert!(!is_yaml_file(Path::new("job.json")));
        assert!(!is_yaml_file(Path::new("job")));
    }

    #[test]
    fn test_cli_args_inputs() {
        let args = CliArgs::parse_from([
            "sfbulk", "-c", "job.yaml", "-i", "a.ndjson", "--input", "b.ndjson",
        ]);
        assert_eq!(args.config, PathBuf::from("job.yaml"));
        assert_eq!(
            args.inputs,
            vec![PathBuf::from("a.ndjson"), PathBuf::from("b.ndjson")]
        );
    }
}
