mod cli;

use crate::cli::{LogFormat, CLI};
use anyhow::Context;
use clap::Parser;
use snip_shortener::{deletion, UrlService};
use snip_storage::{BackendKind, Repository};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CLI::try_parse()?;
    init_tracing(cli.log_format);

    let settings = cli.into_settings()?;

    info!(
        storage_backend = %BackendKind::select(&settings.storage),
        base_url = %settings.base_url,
        delete_queue_capacity = settings.delete_queue_capacity,
        "starting snip server"
    );

    let repository = snip_storage::selector::open(&settings.storage)
        .await
        .context("failed to open storage backend")?;

    let (queue, worker) = deletion::channel(repository.clone(), settings.delete_queue_capacity);
    let worker = worker.spawn();
    let service = UrlService::new(repository.clone(), queue, settings.base_url);

    service.ping().await.context("storage backend is not reachable")?;
    let stats = service.stats().await.context("failed to read storage stats")?;
    info!(urls = stats.urls, owners = stats.owners, "storage ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown signal received");

    // Dropping the last queue handle lets the worker drain and exit.
    drop(service);
    if let Err(e) = worker.await {
        warn!(error = %e, "deletion worker terminated abnormally");
    }

    repository.close().await;
    info!("snip server stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
