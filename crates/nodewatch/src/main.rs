//! nodewatch daemon entry point.

use std::path::PathBuf;
use std::sync::Arc;

use alerters::Dispatcher;
use anyhow::{bail, Context, Result};
use clap::Parser;
use config::Config;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use nodewatch::cluster::KubeNodeFetcher;
use nodewatch::schedule::Watcher;
use nodewatch::server::{self, ServerState};

/// Watch Kubernetes node health and alert on status transitions.
#[derive(Parser)]
#[command(name = "nodewatch")]
#[command(about = "Watch Kubernetes node health and alert on status transitions")]
#[command(version)]
struct Cli {
    /// Path to the config file (YAML or JSON)
    #[arg(long, default_value = "nodewatch.yaml")]
    config: PathBuf,

    /// Run a single poll pass and exit
    #[arg(long)]
    once: bool,

    /// Port for the health listener (overrides the config file)
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("nodewatch=info".parse()?))
        .init();

    let cli = Cli::parse();

    let config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;

    info!(
        rules = config.node_alerts.len(),
        interval_secs = config.poll_interval_secs,
        "Configuration loaded"
    );

    let client = kube::Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let fetcher = Arc::new(KubeNodeFetcher::new(client));
    let dispatcher = Arc::new(Dispatcher::from_config(&config.alerters));
    if dispatcher.channel_count() == 0 {
        warn!("No alerter channels configured; alerts will be dropped");
    }

    let watcher = Watcher::new(fetcher, dispatcher, config.clone());

    if cli.once {
        let errors = watcher.poll_all().await;
        if errors > 0 {
            bail!("{errors} rule(s) failed with fetch errors");
        }
        return Ok(());
    }

    if let Some(port) = cli.port.or(config.health_port) {
        let state = Arc::new(ServerState {
            status: watcher.status(),
            poll_interval_secs: config.poll_interval_secs,
            rule_count: config.node_alerts.len(),
        });
        let router = server::build_router(state);
        tokio::spawn(async move {
            if let Err(e) = server::serve(router, port).await {
                error!(error = %e, "Health listener failed");
            }
        });
    }

    watcher.run().await;

    Ok(())
}
