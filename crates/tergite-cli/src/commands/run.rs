//! Run command implementation.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use console::style;

use tergite_compile::RunOptions;
use tergite_hal::BackendCapabilities;

use super::common::{Session, load_experiments};
use super::wait::{poll, report};

/// Poll limit of `run --wait`.
const RUN_WAIT_TIMEOUT: Duration = Duration::from_secs(3600);

/// Execute the run command.
pub async fn execute(
    session: &Session,
    backend_name: &str,
    input: &Path,
    shots: u32,
    wait: bool,
) -> Result<()> {
    println!(
        "{} Loading experiments from {}",
        style("→").cyan().bold(),
        style(input.display()).green()
    );
    let experiments = load_experiments(input)?;
    println!("  Experiments: {}", experiments.len());

    let provider = session.provider()?;
    let backend = provider.get_backend(backend_name).await?;

    println!(
        "{} Submitting {} shots to {}",
        style("→").cyan().bold(),
        shots,
        style(backend.name()).bold()
    );

    let job = backend
        .run(&experiments, &RunOptions::with_shots(shots))
        .await
        .with_context(|| format!("Failed to run on '{backend_name}'"))?;

    println!(
        "{} Submitted job {}",
        style("✓").green().bold(),
        style(job.job_id()).cyan()
    );
    if let Some(date) = job.calibration_date() {
        println!("  Calibration: {date}");
    }
    if let Some(url) = job.upload_url() {
        println!("  Upload URL: {url}");
    }

    if !wait {
        println!(
            "\n  Use 'tergite wait {}' to follow the job.",
            job.job_id()
        );
        return Ok(());
    }

    let status = poll(&job, RUN_WAIT_TIMEOUT, Duration::from_secs(2)).await?;
    report(&job, status).await
}
