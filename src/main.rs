use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use opsflow_rs::opsflow::config::CoordinatorConfig;
use opsflow_rs::opsflow::scheduler::Scheduler;
use opsflow_rs::opsflow::server;
use opsflow_rs::opsflow::workflow::{ExecutionMode, WorkflowCoordinator};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML file overriding environment configuration
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the workflow once and print the result as JSON
    Run {
        /// Execution mode (sequential or graph)
        #[arg(short, long)]
        mode: Option<ExecutionMode>,
    },
    /// Run the workflow on a fixed interval
    Daemon {
        /// Seconds between runs
        #[arg(short, long)]
        interval: Option<u64>,

        /// Also serve the HTTP API on this port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Serve the HTTP API only
    Serve {
        #[arg(short, long, default_value_t = 8080)]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = CoordinatorConfig::load(args.config.as_deref())
        .context("Failed to load configuration")?;

    match args.command {
        Commands::Run { mode } => {
            if let Some(mode) = mode {
                config.mode = mode;
            }
            let coordinator = WorkflowCoordinator::from_config(config)?;
            let result = coordinator.run_workflow().await;
            println!("{}", serde_json::to_string_pretty(&result)?);
            if !result.is_completed() {
                std::process::exit(1);
            }
        }
        Commands::Daemon { interval, port } => {
            if let Some(secs) = interval {
                config.interval = Duration::from_secs(secs);
            }
            let interval = config.interval;
            let coordinator = Arc::new(WorkflowCoordinator::from_config(config)?);
            let shutdown = shutdown_signal();

            let server = port.map(|port| {
                let coordinator = coordinator.clone();
                let rx = shutdown.clone();
                tokio::spawn(async move {
                    if let Err(e) = server::serve(coordinator, port, wait_for(rx)).await {
                        log::error!("HTTP server failed: {}", e);
                    }
                })
            });

            log::info!("Starting scheduler, interval {}s", interval.as_secs());
            let cycles = Scheduler::new(coordinator, interval)
                .run(wait_for(shutdown))
                .await;
            log::info!("Scheduler stopped after {} runs", cycles);

            if let Some(handle) = server {
                handle.await?;
            }
        }
        Commands::Serve { port } => {
            let coordinator = Arc::new(WorkflowCoordinator::from_config(config)?);
            server::serve(coordinator, port, wait_for(shutdown_signal()))
                .await
                .context("HTTP server failed")?;
        }
    }

    Ok(())
}

/// Flips to `true` on Ctrl-C
fn shutdown_signal() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C: {}", e);
            // Keep the sender alive so receivers never see a closed channel
            std::future::pending::<()>().await;
        }
        log::info!("Received Ctrl-C");
        let _ = tx.send(true);
    });
    rx
}

async fn wait_for(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}
