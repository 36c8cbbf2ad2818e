//! Tergite CLI - run pulse-level experiments on Tergite quantum computers.

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::common::Session;

#[derive(Parser)]
#[command(name = "tergite")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Service to use (defaults to the first saved account)
    #[arg(long, global = true, env = "TERGITE_SERVICE")]
    service: Option<String>,

    /// Account file (defaults to ~/.qiskit/tergiterc)
    #[arg(long, global = true, env = "TERGITERC")]
    rc_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage saved service accounts
    Account {
        #[command(subcommand)]
        action: AccountAction,
    },

    /// List the backends of a service
    Backends {
        /// Only OpenPulse backends
        #[arg(long)]
        pulse: bool,

        /// Only online backends
        #[arg(long)]
        online: bool,
    },

    /// Show the latest calibration of a backend
    Calibration {
        /// Backend name
        backend: String,
    },

    /// Compile and submit a circuit or schedule
    Run {
        /// Backend name
        backend: String,

        /// Experiment file (JSON circuit or schedule)
        input: PathBuf,

        /// Number of shots
        #[arg(short, long, default_value = "2000")]
        shots: u32,

        /// Wait for the job to finish and print its counts
        #[arg(short, long)]
        wait: bool,
    },

    /// Show the status of a job
    Status {
        /// Job ID
        job_id: String,
    },

    /// Wait for a job to reach a final state
    Wait {
        /// Job ID
        job_id: String,

        /// Timeout in seconds
        #[arg(short, long, default_value = "3600")]
        timeout: u64,

        /// Poll interval in seconds
        #[arg(long, default_value = "2")]
        interval: u64,
    },

    /// Show the result of a finished job
    Result {
        /// Job ID
        job_id: String,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Cancel a job
    Cancel {
        /// Job ID
        job_id: String,

        /// Upload URL returned when the job was registered
        #[arg(long)]
        upload_url: String,
    },

    /// Download the logfile of a finished job
    Logfile {
        /// Job ID
        job_id: String,

        /// Directory to write the logfile to
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum AccountAction {
    /// Save an account to the account file
    Save {
        /// Service name
        service_name: String,

        /// Base URL of the service
        #[arg(long)]
        url: String,

        /// API token
        #[arg(long, env = "TERGITE_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },

    /// List saved accounts
    List,

    /// Delete a saved account
    Delete {
        /// Service name
        service_name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();

    let session = Session::new(cli.rc_file, cli.service);

    let result = match cli.command {
        Commands::Account { action } => match action {
            AccountAction::Save {
                service_name,
                url,
                token,
            } => commands::account::save(&session, &service_name, &url, token.as_deref()),
            AccountAction::List => commands::account::list(&session),
            AccountAction::Delete { service_name } => {
                commands::account::delete(&session, &service_name)
            }
        },
        Commands::Backends { pulse, online } => {
            commands::backends::execute(&session, pulse, online).await
        }
        Commands::Calibration { backend } => {
            commands::calibration::execute(&session, &backend).await
        }
        Commands::Run {
            backend,
            input,
            shots,
            wait,
        } => commands::run::execute(&session, &backend, &input, shots, wait).await,
        Commands::Status { job_id } => commands::status::execute(&session, &job_id).await,
        Commands::Wait {
            job_id,
            timeout,
            interval,
        } => commands::wait::execute(&session, &job_id, timeout, interval).await,
        Commands::Result { job_id, format } => {
            commands::result::execute(&session, &job_id, &format).await
        }
        Commands::Cancel { job_id, upload_url } => {
            commands::cancel::execute(&session, &job_id, &upload_url).await
        }
        Commands::Logfile { job_id, output_dir } => {
            commands::logfile::execute(&session, &job_id, output_dir).await
        }
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}
