//! Status command implementation.

use anyhow::Result;
use console::style;

use tergite_hal::JobStatus;

use super::common::Session;

fn styled(status: JobStatus) -> console::StyledObject<JobStatus> {
    match status {
        JobStatus::Done => style(status).green(),
        JobStatus::Error | JobStatus::Cancelled => style(status).red(),
        _ => style(status).yellow(),
    }
}

/// Execute the status command.
pub async fn execute(session: &Session, job_id: &str) -> Result<()> {
    let provider = session.provider()?;
    let job = provider.job(job_id).await?;
    let status = job.status().await?;
    let remote = job.remote_data().await?;

    println!("{} Job {}", style("→").cyan().bold(), style(job_id).bold());
    println!("  Status: {}", styled(status));
    println!("  Backend: {}", job.backend_name());
    if let Some(date) = &remote.calibration_date {
        println!("  Calibration: {date}");
    }
    if let Some(created) = &remote.created_at {
        println!("  Created: {created}");
    }
    if let Some(updated) = &remote.updated_at {
        println!("  Updated: {updated}");
    }
    if let Some(reason) = &remote.failure_reason {
        println!("  Failure: {}", style(reason).red());
    }
    if let Some(reason) = &remote.cancellation_reason {
        println!("  Cancelled: {reason}");
    }
    Ok(())
}
