use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use appointment_queue::config::AppConfig;
use appointment_queue::display::{print_report, write_report_to_file};
use appointment_queue::logging::setup_logging;
use appointment_queue::parser::load_events;
use appointment_queue::queue::open_queue_store;
use appointment_queue::records::MemoryRecordStore;
use appointment_queue::replay::replay;
use appointment_queue::{web, AppointmentCoordinator, QueueStore};

#[derive(Parser)]
#[command(name = "appointment-queue", version, about = "Hospital appointment queue service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP service (default)
    Serve {
        /// Overrides PORT
        #[arg(long)]
        port: Option<u16>,
        /// Overrides BIND_ADDRESS
        #[arg(long)]
        bind: Option<String>,
    },
    /// Replay a CSV event log offline and print the resulting queues
    Replay {
        events: PathBuf,
        /// Also write the report to this file
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::from_env().context("loading configuration")?;
    setup_logging(&config.logging).map_err(|e| anyhow::anyhow!(e))?;

    match cli.command.unwrap_or(Command::Serve { port: None, bind: None }) {
        Command::Serve { port, bind } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(bind) = bind {
                config.server.bind_address = bind;
            }

            let queues = open_queue_store(&config.queue_store).context("opening queue store")?;
            let records = Arc::new(MemoryRecordStore::new());
            let coordinator = AppointmentCoordinator::new(records, queues.clone());

            info!("Access the service at http://localhost:{}", config.server.port);
            let served = web::start_server(&config.server, coordinator).await;

            if let Err(e) = queues.close().await {
                warn!(error = %e, "queue store did not close cleanly");
            }
            served?;
        }
        Command::Replay { events, out } => {
            info!(path = %events.display(), "loading event log");
            let log = load_events(&events)
                .with_context(|| format!("reading {}", events.display()))?;
            let outcome = replay(log).await?;

            print_report(&outcome);
            if let Some(out) = out {
                write_report_to_file(&outcome, &out)
                    .map_err(|e| anyhow::anyhow!("writing {}: {}", out.display(), e))?;
                println!("Report saved to {}", out.display());
            }
        }
    }

    Ok(())
}
