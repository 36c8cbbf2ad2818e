//! Shared helpers for CLI commands.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use console::style;
use serde_json::Value;

use tergite_compile::{Circuit, Experiment};
use tergite_hal::{AccountStore, JobResult, Provider, ProviderFactory};

/// Global options every command runs with.
#[derive(Debug, Clone, Default)]
pub struct Session {
    rc_file: Option<PathBuf>,
    service: Option<String>,
}

impl Session {
    pub fn new(rc_file: Option<PathBuf>, service: Option<String>) -> Self {
        Self { rc_file, service }
    }

    /// The account store at `--rc-file`, or the default location.
    pub fn store(&self) -> Result<AccountStore> {
        match &self.rc_file {
            Some(path) => Ok(AccountStore::new(path)),
            None => AccountStore::default_location().context("Could not locate the account file"),
        }
    }

    /// A factory with every saved account loaded.
    pub fn factory(&self) -> Result<ProviderFactory> {
        let mut factory = ProviderFactory::new(self.store()?);
        factory
            .load_accounts()
            .with_context(|| format!("Failed to load {}", factory.store().path().display()))?;
        Ok(factory)
    }

    /// The provider selected by `--service`.
    pub fn provider(&self) -> Result<Arc<Provider>> {
        let factory = self.factory()?;
        let provider = factory.get_provider(self.service.as_deref()).with_context(|| {
            format!(
                "Save an account first with `tergite account save` (looked in {})",
                factory.store().path().display()
            )
        })?;
        match &self.service {
            Some(wanted) if provider.service_name() != wanted => anyhow::bail!(
                "No account named '{wanted}'. Saved accounts: {}",
                factory.providers().join(", ")
            ),
            _ => Ok(provider),
        }
    }
}

/// Load experiments from a JSON file.
///
/// The file holds one experiment or an array of them. An entry with a `kind`
/// field is a tagged [`Experiment`]; any other entry is read as a [`Circuit`].
pub fn load_experiments(path: &Path) -> Result<Vec<Experiment>> {
    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }

    let source = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    let value: Value = serde_json::from_str(&source)
        .with_context(|| format!("Invalid JSON in {}", path.display()))?;

    let entries = match value {
        Value::Array(entries) => entries,
        single => vec![single],
    };
    if entries.is_empty() {
        anyhow::bail!("No experiments in {}", path.display());
    }

    entries
        .into_iter()
        .enumerate()
        .map(|(i, entry)| {
            let experiment = if entry.get("kind").is_some() {
                serde_json::from_value::<Experiment>(entry)
            } else {
                serde_json::from_value::<Circuit>(entry).map(Experiment::from)
            };
            experiment.with_context(|| format!("Experiment {i} in {} is invalid", path.display()))
        })
        .collect()
}

/// Print the counts of every experiment of a job result (shared by run,
/// result, wait).
pub fn print_results(result: &JobResult) {
    for experiment in &result.results {
        println!(
            "\n{} {} ({} shots):",
            style("✓").green().bold(),
            style(&experiment.header.name).bold(),
            experiment.shots
        );

        let counts = &experiment.data.counts;
        let sorted = counts.sorted();
        let total = counts.total_shots() as f64;

        for (outcome, count) in sorted.iter().take(16) {
            let prob = **count as f64 / total * 100.0;
            let bar_len = (prob / 2.0).round() as usize;
            let bar: String = "█".repeat(bar_len);

            println!(
                "  {}: {:>6} ({:>5.2}%) {}",
                style(outcome).cyan(),
                count,
                prob,
                style(bar).green()
            );
        }

        if sorted.len() > 16 {
            println!("  ... and {} more outcomes", sorted.len() - 16);
        }
    }

    if !result.success {
        println!(
            "\n  {} job '{}' did not complete successfully",
            style("!").yellow().bold(),
            result.job_id
        );
    }
}
