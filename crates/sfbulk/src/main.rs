//! sfbulk CLI: push NDJSON records into a Salesforce object.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use sfbulk::connection::{Connector, SalesforceConnector};
use sfbulk::error::{AuthSnafu, InputSnafu, JobError};
use sfbulk::source::{NdjsonSource, RecordSource};
use sfbulk::{CliArgs, JobConfig, JobReport, init_tracing, run_job};
use snafu::ResultExt;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args = CliArgs::parse();

    match run(&args).await {
        Ok(report) => {
            println!(
                "{} worker(s), {} failure(s), {} line(s) in the error file",
                report.workers.len(),
                report.failures,
                report.merged_lines
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Job failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &CliArgs) -> Result<JobReport, JobError> {
    let config = JobConfig::load(&args.config, &args.inputs)?;

    info!(
        object = %config.object,
        action = %config.action(),
        inputs = config.input.paths.len(),
        "Loaded job from {}",
        args.config.display()
    );

    let schema = Arc::new(config.schema.clone());
    let mut sources: Vec<Box<dyn RecordSource>> = Vec::with_capacity(config.input.paths.len());
    for path in &config.input.paths {
        let source = NdjsonSource::open(path, schema.clone())
            .await
            .context(InputSnafu)?;
        sources.push(Box::new(source));
    }

    let connector: Arc<dyn Connector> = Arc::new(
        SalesforceConnector::new(
            config.auth.auth_method(&config.api_version),
            &config.object,
            &config.api_version,
        )
        .context(AuthSnafu)?,
    );

    run_job(Arc::new(config.settings()), connector, sources).await
}
