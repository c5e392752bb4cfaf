use anyhow::{Context, Result};

use cliprelay::config::Config;
use cliprelay::scheduler::Relay;

/// Start every source supervisor and run until Ctrl-C
pub async fn run(config: Config, initial_fetch: bool) -> Result<()> {
    let mut relay = Relay::build(&config)
        .await
        .context("Failed to build source supervisors")?;

    for supervisor in relay.supervisors() {
        let source = supervisor.source();
        tracing::info!(
            source = %source.name,
            fetch = %source.fetch_schedule,
            publish = ?source.publish_schedules.iter().map(|s| s.expression()).collect::<Vec<_>>(),
            max_candidates = source.max_candidates,
            "Tracking source"
        );
    }

    if initial_fetch {
        tracing::info!("Running initial fetch for all sources");
        relay.fetch_all().await;
    }

    relay.start().await.context("Failed to start trigger clock")?;
    tracing::info!(
        sources = relay.supervisors().len(),
        jobs = relay.jobs().len(),
        "Relay running, press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    tracing::info!("Shutdown requested");
    relay.shutdown().await.context("Failed to stop trigger clock")?;

    Ok(())
}
