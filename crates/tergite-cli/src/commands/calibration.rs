//! Calibration command implementation.

use anyhow::Result;
use console::style;

use tergite_compile::CalibrationValue;
use tergite_hal::BackendCapabilities;

use super::common::Session;

fn show(value: Option<&CalibrationValue>) -> String {
    match value {
        Some(v) => match v.as_f64() {
            Some(n) if v.unit.is_empty() => format!("{n:.4}"),
            Some(n) => format!("{n:.4e} {}", v.unit),
            None => "-".to_string(),
        },
        None => "-".to_string(),
    }
}

/// Fetch the latest calibration of a backend and print its summary.
pub async fn execute(session: &Session, backend_name: &str) -> Result<()> {
    let provider = session.provider()?;
    let backend = provider.get_backend(backend_name).await?;

    let Some(pulse) = backend.as_open_pulse() else {
        anyhow::bail!("Backend '{backend_name}' is not an OpenPulse backend");
    };

    println!(
        "{} Fetching calibration of {}",
        style("→").cyan().bold(),
        style(backend.name()).bold()
    );

    let target = pulse.refresh_target().await?;
    let Some(calibration) = pulse.device_calibration().await? else {
        println!("  Backend is not characterized; no calibration available.");
        return Ok(());
    };

    println!();
    println!("  Last calibrated: {}", style(&calibration.last_calibrated).yellow());
    println!("  Instructions: {}", target.len());
    println!();

    println!("  {}", style("Qubits").bold());
    for (i, qubit) in calibration.qubits.iter().enumerate() {
        println!(
            "    q{i}: freq {}  pi amp {}  readout error {}",
            show(qubit.frequency.as_ref()),
            show(qubit.pi_pulse_amplitude.as_ref()),
            show(qubit.readout_assignment_error.as_ref())
        );
    }

    if let Some(resonators) = &calibration.resonators {
        println!("  {}", style("Resonators").bold());
        for (i, resonator) in resonators.iter().enumerate() {
            println!(
                "    r{i}: freq {}  amp {}",
                show(resonator.frequency.as_ref()),
                show(resonator.pulse_amplitude.as_ref())
            );
        }
    }

    if let Some(couplers) = &calibration.couplers {
        println!("  {}", style("Couplers").bold());
        for (i, coupler) in couplers.iter().enumerate() {
            println!(
                "    c{i}: cz amp {}  dc bias {}",
                show(coupler.cz_pulse_amplitude.as_ref()),
                show(coupler.cz_pulse_dc_bias.as_ref())
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_show_values() {
        assert_eq!(show(Some(&CalibrationValue::number(0.25, ""))), "0.2500");
        assert_eq!(show(Some(&CalibrationValue::number(4.8e9, "Hz"))), "4.8000e9 Hz");
        assert_eq!(show(None), "-");
    }
}
