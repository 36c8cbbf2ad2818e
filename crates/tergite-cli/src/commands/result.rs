//! Result command implementation.

use anyhow::Result;
use console::style;

use super::common::{Session, print_results};

/// Execute the result command.
pub async fn execute(session: &Session, job_id: &str, format: &str) -> Result<()> {
    let provider = session.provider()?;
    let job = provider.job(job_id).await?;
    let status = job.status().await?;

    let Some(result) = job.result().await? else {
        println!(
            "{} Job {} is {}. Results are available once it has finished.",
            style("→").cyan().bold(),
            style(job_id).dim(),
            style(status).yellow()
        );
        return Ok(());
    };

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        "table" => {
            println!(
                "{} Job {} on {} ({})",
                style("→").cyan().bold(),
                style(job_id).bold(),
                result.backend_name,
                status
            );
            print_results(&result);
        }
        other => anyhow::bail!("Unknown format: '{other}'. Available: table, json"),
    }
    Ok(())
}
