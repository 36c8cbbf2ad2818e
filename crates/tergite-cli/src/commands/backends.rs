//! Backends command implementation.

use anyhow::Result;
use console::style;

use tergite_hal::{Backend, BackendCapabilities, BackendFilter};

use super::common::Session;

/// List the backends of the selected service.
pub async fn execute(session: &Session, pulse: bool, online: bool) -> Result<()> {
    let provider = session.provider()?;

    let mut filter = BackendFilter::new();
    if pulse {
        filter = filter.open_pulse(true);
    }
    if online {
        filter = filter.online(true);
    }

    println!(
        "{} Backends of {}",
        style("→").cyan().bold(),
        style(provider.service_name()).bold()
    );
    println!();

    let backends = provider.backends(&filter).await?;
    if backends.is_empty() {
        println!("  No backends match.");
    }

    for backend in &backends {
        let config = backend.config();
        let kind = match &**backend {
            Backend::OpenPulse(_) => "openpulse",
            Backend::OpenQasm(_) => "openqasm",
        };
        println!(
            "  {} {} ({})",
            if config.is_online() {
                style("●").green()
            } else {
                style("○").red()
            },
            style(backend.name()).bold(),
            kind
        );
        println!("    Version: {}", backend.version());
        println!("    Qubits: {}", backend.num_qubits());
        println!("    Gates: {}", config.basis_gates().join(", "));
        if config.is_simulator() {
            println!("    Simulator");
        }
        if !config.characterized() {
            println!("    Status: not characterized");
        }
        println!();
    }

    let malformed = provider.malformed_backends().await?;
    if !malformed.is_empty() {
        let mut names: Vec<_> = malformed.keys().collect();
        names.sort();
        for name in names {
            println!(
                "  {} {} skipped: {}",
                style("○").dim(),
                style(name).dim(),
                malformed[name]
            );
        }
    }

    Ok(())
}
