//! Logfile command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use console::style;

use super::common::Session;

/// Execute the logfile command.
pub async fn execute(session: &Session, job_id: &str, output_dir: Option<PathBuf>) -> Result<()> {
    let provider = session.provider()?;
    let mut job = provider.job(job_id).await?;
    if let Some(dir) = output_dir {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        job = job.with_logfile_dir(dir);
    }

    match job.logfile().await? {
        Some(path) => println!(
            "{} Logfile written to {}",
            style("✓").green().bold(),
            style(path.display()).green()
        ),
        None => println!(
            "{} Job {} has no logfile yet ({})",
            style("→").cyan().bold(),
            style(job_id).dim(),
            job.status().await?
        ),
    }
    Ok(())
}
