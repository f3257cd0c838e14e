//! Mode handlers: wiring, startup checks, and execution.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use relay_commit::{DocumentSink, IntervalPacer, NoopPacer};
use relay_enrich::{ImageApiClient, ImageEnricher};
use relay_notify::{NotificationFanout, ResponderDirectory};
use relay_pipeline::{PipelineConfig, RelayPipeline};
use relay_source::{HttpSourceClient, SourceReader};
use relay_stats::{SnapshotStore, StatisticsRefresher, StatusSource};
use relay_store::{HttpBlobStore, HttpDocStore, HttpPushChannel};
use relay_types::Settings;

/// Initialize the tracing subscriber.
///
/// The CLI flag wins over the configured level; `RUST_LOG` wins over both.
pub fn init_tracing(settings: &Settings, cli_level: Option<&str>) {
    let level = cli_level.unwrap_or(&settings.log_level);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Construct the pipeline from resolved settings.
pub fn build_pipeline(settings: &Settings) -> Result<RelayPipeline> {
    let source = HttpSourceClient::new(&settings.source).context("source client")?;
    let reader = SourceReader::new(
        Arc::new(source),
        settings.source.index.clone(),
        settings.source.page_size,
    );

    let fetcher = ImageApiClient::new(&settings.image).context("image client")?;
    let blobs = HttpBlobStore::new(&settings.blob).context("blob client")?;
    let enricher = ImageEnricher::new(
        Arc::new(fetcher),
        Arc::new(blobs),
        settings.blob.prefix.clone(),
    );

    let store = Arc::new(HttpDocStore::new(&settings.docstore).context("document store client")?);
    let sink: Arc<dyn DocumentSink> = store.clone();
    let directory: Arc<dyn ResponderDirectory> = store.clone();
    let status_source: Arc<dyn StatusSource> = store.clone();
    let snapshots: Arc<dyn SnapshotStore> = store;

    let channel = HttpPushChannel::new(&settings.push).context("push client")?;
    let fanout = NotificationFanout::new(
        directory,
        Arc::new(channel),
        Arc::new(IntervalPacer::from_millis(settings.push.pause_ms)),
        settings.push.batch_size,
    );

    let refresher = StatisticsRefresher::new(status_source, snapshots);

    let config = PipelineConfig::default()
        .with_batch_size(settings.pipeline.batch_size)
        .with_window_minutes(settings.pipeline.window_minutes)
        .with_polling_interval(Duration::from_secs(settings.pipeline.polling_interval_secs));

    Ok(RelayPipeline::new(
        reader,
        enricher,
        sink,
        Arc::new(IntervalPacer::from_millis(settings.pipeline.commit_pause_ms)),
        fanout,
        refresher,
        settings.docstore.events_collection.clone(),
        config,
    ))
}

/// Verify both stores are reachable before starting a run.
async fn check_connectivity(pipeline: &RelayPipeline) -> Result<()> {
    let health = pipeline.health_check().await;
    if !health.source {
        bail!("source store is unreachable");
    }
    if !health.docstore {
        bail!("document store is unreachable");
    }
    Ok(())
}

/// Run the pipeline continuously until a shutdown signal.
pub async fn run_continuous(settings: Settings, interval_override: Option<u64>) -> Result<()> {
    let mut settings = settings;
    if let Some(interval) = interval_override {
        settings.pipeline.polling_interval_secs = interval;
        settings.validate()?;
    }

    let mut pipeline = build_pipeline(&settings)?;
    check_connectivity(&pipeline).await?;

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    pipeline.run_continuous(cancel).await;

    let stats = pipeline.stats();
    info!(
        cycles = stats.total_processed,
        successful = stats.total_successful,
        failed = stats.total_failed,
        "Pipeline shut down"
    );
    Ok(())
}

/// One recent-window or custom-query pass.
pub async fn run_single(
    settings: Settings,
    minutes_back: Option<i64>,
    query: Option<String>,
    limit: Option<usize>,
) -> Result<()> {
    let mut pipeline = build_pipeline(&settings)?;
    check_connectivity(&pipeline).await?;

    let committed = match query {
        Some(raw) => {
            let filter: serde_json::Value =
                serde_json::from_str(&raw).context("parsing --query as JSON")?;
            pipeline.run_query(filter, limit).await?
        }
        None => pipeline.run_single(minutes_back, limit).await?,
    };

    info!(committed = committed, "Single execution completed");
    log_stats(&pipeline);
    Ok(())
}

/// Relay everything the source holds.
pub async fn run_full_sync(settings: Settings, limit: Option<usize>) -> Result<()> {
    let mut pipeline = build_pipeline(&settings)?;
    check_connectivity(&pipeline).await?;

    let committed = pipeline.run_full_sync(limit).await?;
    info!(committed = committed, "Full sync completed");
    log_stats(&pipeline);
    Ok(())
}

/// Check connectivity of every collaborator.
pub async fn run_health_check(settings: Settings) -> Result<()> {
    let pipeline = build_pipeline(&settings)?;
    let health = pipeline.health_check().await;

    info!(
        source = health.source,
        docstore = health.docstore,
        running = health.running,
        overall = health.overall(),
        "Health check results"
    );

    if !health.overall() {
        error!("Some systems are unhealthy");
        bail!("health check failed");
    }
    info!("All systems healthy");
    Ok(())
}

/// Clear responders previously flagged with invalid tokens.
///
/// Maintenance operation; never runs as part of a pipeline cycle.
pub async fn run_cleanup_tokens(settings: Settings) -> Result<()> {
    let store = Arc::new(HttpDocStore::new(&settings.docstore).context("document store client")?);
    let directory: Arc<dyn ResponderDirectory> = store;
    let channel = HttpPushChannel::new(&settings.push).context("push client")?;

    let fanout = NotificationFanout::new(
        directory,
        Arc::new(channel),
        Arc::new(NoopPacer),
        settings.push.batch_size,
    );

    let cleaned = fanout.cleanup_invalid_tokens().await?;
    info!(cleaned = cleaned, "Token cleanup completed");
    Ok(())
}

/// Print the resolved configuration.
pub fn print_config(settings: &Settings) {
    println!("Configuration check:");
    println!("  source:        {}", settings.source.url());
    println!("  source index:  {}", settings.source.index);
    println!("  docstore:      {}", settings.docstore.base_url);
    println!("  collection:    {}", settings.docstore.events_collection);
    println!("  blob bucket:   {}", settings.blob.bucket);
    println!("  image api:     {}", settings.image.base_url);
    println!("  push endpoint: {}", settings.push.endpoint);
    println!(
        "  polling interval: {}s",
        settings.pipeline.polling_interval_secs
    );
    println!("  batch size:    {}", settings.pipeline.batch_size);
    println!("  log level:     {}", settings.log_level);
}

fn log_stats(pipeline: &RelayPipeline) {
    let stats = pipeline.stats();
    info!(
        total_processed = stats.total_processed,
        total_successful = stats.total_successful,
        total_failed = stats.total_failed,
        success_rate = format!("{:.1}%", stats.success_rate()),
        last_error = stats.last_error.as_deref().unwrap_or(""),
        "Pipeline statistics"
    );
}

fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal, stopping after the current cycle");
            cancel.cancel();
        }
    });
}
