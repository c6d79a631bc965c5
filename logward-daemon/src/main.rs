use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use logward_collector::CollectorService;
use logward_core::config::LogwardConfig;
use logward_core::sink::MemorySink;

use logward_daemon::cli::DaemonCli;
use logward_daemon::logging;

#[tokio::main]
async fn main() -> Result<()> {
    let args = DaemonCli::parse();

    // Load configuration, then layer CLI overrides on top
    let mut config = LogwardConfig::load(&args.config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load config '{}': {}", args.config.display(), e))?;
    if let Some(level) = &args.log_level {
        config.general.log_level = level.clone();
    }
    if let Some(format) = &args.log_format {
        config.general.log_format = format.clone();
    }
    if let Some(interval) = args.poll_interval_secs {
        config.collector.poll_interval_secs = interval;
    }
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {}", e))?;

    if args.validate {
        println!("configuration OK: {}", args.config.display());
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    logward_core::metrics::describe_all();

    tracing::info!(
        config = %args.config.display(),
        sources = config.sources.len(),
        "logward-daemon starting"
    );

    // No durable store is wired in this build; the memory sink keeps
    // the sink path exercised and queryable
    let sink = Arc::new(MemorySink::new());
    let mut service = CollectorService::from_config(&config, sink);

    service
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("failed to start collector: {}", e))?;
    tracing::info!("collector started");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");

    if let Err(e) = service.stop().await {
        tracing::error!(error = %e, "failed to stop collector");
    }

    tracing::info!("logward-daemon shut down");
    Ok(())
}
