//! activity-relay-rs entry point.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use relay_common::{FileSettings, RelayConfig, RelayError, generate_actor_key, write_actor_key};
use relay_queue::JobDispatchServer;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "activity-relay", version)]
#[command(about = "Validate relay configuration and bootstrap the job dispatcher")]
struct Cli {
    /// Settings file (YAML, TOML or JSON). Environment variables override it.
    #[arg(short, long, env = "RELAY_CONFIG", default_value = "config.yml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate the configuration and print it.
    Check,

    /// Validate the configuration, connect the job dispatcher and hold the
    /// broker session until shutdown.
    Bootstrap {
        /// Module name shown in the welcome message.
        #[arg(long, default_value = "dispatcher")]
        module: String,
    },

    /// Write a new RSA actor key.
    Keygen {
        /// Destination PEM file.
        #[arg(long)]
        out: PathBuf,

        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

async fn load_config(path: &Path) -> Result<Arc<RelayConfig>, RelayError> {
    let settings = FileSettings::from_file(path)?;
    let config = RelayConfig::load(&settings).await?;
    Ok(Arc::new(config))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Check => {
            let config = load_config(&cli.config).await?;
            println!("{}", config.dump_welcome_message("check"));
            info!("Configuration is valid");
        }
        Command::Bootstrap { module } => {
            let config = load_config(&cli.config).await?;
            println!("{}", config.dump_welcome_message(&module));

            let dispatcher = JobDispatchServer::new(&config).await?;
            info!(
                tasks = ?dispatcher.registered_tasks(),
                job_concurrency = dispatcher.job_concurrency(),
                "Job dispatcher bootstrapped"
            );

            shutdown_signal().await;
            drop(dispatcher);
            info!("Shutdown complete");
        }
        Command::Keygen { out, force } => {
            if out.exists() && !force {
                anyhow::bail!("{} already exists, pass --force to overwrite", out.display());
            }

            let key = generate_actor_key()?;
            write_actor_key(&out, &key)
                .await
                .with_context(|| format!("writing {}", out.display()))?;
            info!(path = %out.display(), "Wrote actor key");
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "activity_relay=info,relay_common=info,relay_queue=info".into()
            }),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        match e.downcast_ref::<RelayError>() {
            Some(relay_error) => {
                error!(code = relay_error.error_code(), error = %relay_error, "Startup failed");
                if relay_error.is_broker_error() {
                    warn!("Check that the broker named by REDIS_URL is running and reachable");
                }
            }
            None => error!(error = %e, "Startup failed"),
        }
        return Err(e);
    }

    Ok(())
}
