//! Cancel command implementation.

use anyhow::Result;
use console::style;

use super::common::Session;

/// Execute the cancel command.
///
/// Cancellation goes to the job's upload URL, which the service only hands
/// out at registration, so the caller has to supply it.
pub async fn execute(session: &Session, job_id: &str, upload_url: &str) -> Result<()> {
    let provider = session.provider()?;

    println!(
        "{} Cancelling job {}",
        style("→").cyan().bold(),
        style(job_id).dim()
    );
    provider.api().cancel_job(upload_url, job_id).await?;

    println!(
        "{} Cancellation requested for {}",
        style("✓").green().bold(),
        style(job_id).cyan()
    );
    Ok(())
}
