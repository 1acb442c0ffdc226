use anyhow::{Context, Result};
use clap::Parser;
use futures::future::join_all;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use converge::modules::{self, ResourceAdapter};
use converge::retry::RetryPolicy;
use converge::telemetry;
use converge::utils::Config;

mod cli;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    if let Err(e) = telemetry::init_telemetry() {
        eprintln!("Failed to initialize telemetry: {}", e);
    }

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let result = run(&cli, config, cancel).await;
    telemetry::shutdown_telemetry();
    result
}

async fn run(cli: &Cli, config: Config, cancel: CancellationToken) -> Result<()> {
    let retry = config.retry.to_retry_policy()?.with_cancellation(cancel.clone());
    let mut wait_config = config.wait.to_wait_config(cancel)?;

    match &cli.command {
        Commands::Config => {
            print!("{}", config.to_yaml()?);
            Ok(())
        }
        Commands::Wait { kind, condition, ids, timeout, interval } => {
            if let Some(timeout) = timeout {
                wait_config = wait_config.with_timeout(*timeout);
            }
            if let Some(interval) = interval {
                wait_config = wait_config.with_poll_interval(*interval);
            }
            info!("{}", config);

            let adapters = load_adapters(cli, &config, &retry).await;
            let adapter = modules::find_adapter(&adapters, kind)?;
            // Reject a bad condition before any polling starts.
            adapter.transitions(condition)?;

            let results = join_all(ids.iter().map(|id| {
                let wait_config = &wait_config;
                async move { (id, adapter.wait(id, condition, wait_config).await) }
            }))
            .await;
            report(results)
        }
        Commands::Delete { kind, ids, timeout } => {
            if let Some(timeout) = timeout {
                wait_config = wait_config.with_timeout(*timeout);
            }
            info!("{}", config);

            let adapters = load_adapters(cli, &config, &retry).await;
            let adapter = modules::find_adapter(&adapters, kind)?;

            let results = join_all(ids.iter().map(|id| {
                let (wait_config, retry) = (&wait_config, &retry);
                async move { (id, adapter.delete(id, wait_config, retry).await) }
            }))
            .await;
            report(results)
        }
    }
}

async fn load_adapters(
    cli: &Cli,
    config: &Config,
    retry: &RetryPolicy,
) -> Vec<Box<dyn ResourceAdapter>> {
    let region = cli.region.as_deref().or(config.region.as_deref());
    let sdk_config = modules::aws::utils::get_aws_config(region).await;
    modules::aws::adapters(&sdk_config, retry)
}

/// Prints one JSON line per id and fails if any id did not converge.
fn report(results: Vec<(&String, Result<serde_json::Value>)>) -> Result<()> {
    let mut failed = 0;
    for (id, result) in results {
        let line = match result {
            Ok(outputs) => json!({ "id": id, "ok": true, "result": outputs }),
            Err(e) => {
                failed += 1;
                error!("{}: {:#}", id, e);
                json!({ "id": id, "ok": false, "error": format!("{:#}", e) })
            }
        };
        println!("{}", line);
    }

    if failed > 0 {
        anyhow::bail!("{} resource(s) did not converge", failed);
    }
    Ok(())
}

fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling waits");
            cancel.cancel();
        }
    });
}
