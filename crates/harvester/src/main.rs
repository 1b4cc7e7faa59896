use std::sync::Arc;

use anyhow::{Context, Result};
use common::{config::AppConfig, logging, AppError};
use gh_transport::{GithubTransport, ReqwestExecutor};
use harvester::{open_sink, HarvestStatus, Harvester, RepoTarget};
use prometheus::Encoder;
use tokio::sync::watch;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_logging("info");
    let config = AppConfig::load().map_err(AppError::Config)?;
    let target = RepoTarget::from_config(&config.github, &config.repository)
        .context("invalid GitHub endpoint")?;

    let exec = Arc::new(ReqwestExecutor::new(&config.github.user_agent).map_err(AppError::http)?);
    let transport = Arc::new(
        GithubTransport::new(exec, config.github.token.expose(), &config.github.user_agent)
            .map_err(AppError::http)?,
    );
    let sink = open_sink(&config.output)
        .await
        .with_context(|| format!("opening {}", config.output.path))?;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing in-flight work");
            let _ = cancel_tx.send(true);
        }
    });

    info!(
        repository = %target.full_name(),
        strategy = config.harvest.strategy.as_str(),
        output = %config.output.path,
        "harvester started"
    );
    let harvester = Harvester::new(config.harvest.clone(), target, transport, sink);
    let report = harvester.run(cancel_rx).await;

    if let Some(path) = &config.observability.metrics_path {
        write_metrics(path)?;
    }

    match report.status {
        HarvestStatus::Completed(total) => {
            info!(total, "all records written");
            Ok(())
        }
        HarvestStatus::PartiallyCompleted(total, reason) => {
            warn!(total, reason = %reason, "output is incomplete");
            Ok(())
        }
        HarvestStatus::Failed(reason) => Err(AppError::harvest(reason).into()),
    }
}

fn write_metrics(path: &str) -> Result<()> {
    let encoder = prometheus::TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .context("encoding metrics")?;
    std::fs::write(path, buffer).with_context(|| format!("writing metrics to {path}"))?;
    Ok(())
}
