//! Wait command implementation.
//!
//! Poll a job until it reaches a terminal state, then print results.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use tergite_hal::{HalError, Job, JobResult, JobStatus};

use super::common::{Session, print_results};

/// Poll `job` with a spinner until it is terminal or `timeout` has elapsed.
pub async fn poll(job: &Job, timeout: Duration, interval: Duration) -> Result<JobStatus> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.set_message("Waiting for job to complete...");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let start = Instant::now();
    loop {
        let status = match job.status().await {
            Ok(status) => status,
            Err(e) => {
                spinner.finish_and_clear();
                return Err(e.into());
            }
        };
        spinner.set_message(format!("Status: {status} ..."));

        if status.is_terminal() {
            spinner.finish_and_clear();
            return Ok(status);
        }

        if start.elapsed() > timeout {
            spinner.finish_and_clear();
            anyhow::bail!(
                "Timeout after {}s. Job {} is still {}. Use 'tergite status {}' to check later.",
                timeout.as_secs(),
                job.job_id(),
                status,
                job.job_id()
            );
        }

        tokio::time::sleep(interval).await;
    }
}

/// Print the counts of a terminal job, or why it has none.
pub async fn report(job: &Job, status: JobStatus) -> Result<()> {
    let result = job.result().await;
    show_outcome(job.job_id(), status, result)
}

/// Print a fetched result. A failed fetch is an error.
fn show_outcome(
    job_id: &str,
    status: JobStatus,
    result: Result<Option<JobResult>, HalError>,
) -> Result<()> {
    let result = result.with_context(|| format!("Failed to fetch the result of job {job_id}"))?;
    match result {
        Some(result) => {
            if !status.is_success() {
                println!(
                    "{} Job finished with status: {}",
                    style("✗").red().bold(),
                    style(status).red()
                );
            }
            print_results(&result);
        }
        None => println!(
            "{} Job {} has no result yet ({})",
            style("→").cyan().bold(),
            job_id,
            status
        ),
    }
    Ok(())
}

/// Execute the wait command.
pub async fn execute(session: &Session, job_id: &str, timeout: u64, interval: u64) -> Result<()> {
    let provider = session.provider()?;
    let job = provider.job(job_id).await?;

    println!(
        "{} Waiting for job {} (timeout: {}s)",
        style("→").cyan().bold(),
        style(job_id).dim(),
        timeout
    );

    let status = poll(
        &job,
        Duration::from_secs(timeout),
        Duration::from_secs(interval.max(1)),
    )
    .await?;
    report(&job, status).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_result_fetch_is_an_error() {
        let fetch = Err(HalError::Configuration("logfile unavailable".into()));
        let err = show_outcome("j1", JobStatus::Done, fetch).unwrap_err();
        assert_eq!(
            format!("{err:#}"),
            "Failed to fetch the result of job j1: Configuration error: logfile unavailable"
        );
    }

    #[test]
    fn test_pending_result_is_not_an_error() {
        assert!(show_outcome("j1", JobStatus::Running, Ok(None)).is_ok());
    }
}
