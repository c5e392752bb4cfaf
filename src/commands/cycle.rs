use anyhow::{Context, Result};
use std::sync::Arc;

use cliprelay::config::Config;
use cliprelay::models::{FetchReport, PublishOutcome};
use cliprelay::scheduler::{build_supervisors, SourceSupervisor};

async fn supervisor_for(config: &Config, source: &str) -> Result<Arc<SourceSupervisor>> {
    let supervisors = build_supervisors(config)
        .await
        .context("Failed to build source supervisors")?;

    supervisors
        .into_iter()
        .find(|s| s.name() == source)
        .with_context(|| format!("Unknown source: {source}"))
}

/// Run one fetch cycle for `source` and print what it did
pub async fn fetch(config: Config, source: String) -> Result<()> {
    let supervisor = supervisor_for(&config, &source).await?;

    println!("Fetching clips for: {source}");
    println!("=====================");

    let report = supervisor
        .try_fetch_cycle()
        .await
        .with_context(|| format!("Fetch cycle failed for {source}"))?
        .unwrap_or_default();

    print_report(&report);

    let queued = supervisor.queued_ids().await;
    if !queued.is_empty() {
        println!("\nQueued for publishing");
        println!("---------------------");
        for id in queued {
            println!("  {id}");
        }
    }

    Ok(())
}

/// Rebuild the queue with one fetch cycle, then run one publish cycle
pub async fn publish(config: Config, source: String) -> Result<()> {
    let supervisor = supervisor_for(&config, &source).await?;

    println!("Publishing next clip for: {source}");
    println!("===============================");

    if let Some(report) = supervisor.fetch_cycle().await {
        print_report(&report);
    }

    let outcome = supervisor.publish_cycle().await;
    println!();
    match &outcome {
        PublishOutcome::Published { clip_id, post_id } => {
            println!("Published {clip_id} as post {post_id}");
        }
        PublishOutcome::PublishedUnrecorded { clip_id, post_id } => {
            println!("Published {clip_id} as post {post_id}, but the ledger write failed");
        }
        PublishOutcome::DuplicateDiscarded { clip_id } => {
            println!("Discarded {clip_id}: already published");
        }
        PublishOutcome::QueueEmpty => println!("Nothing to publish"),
        PublishOutcome::AlreadyPublishing => println!("A publish is already in flight"),
        PublishOutcome::Dropped { clip_id, state } => {
            println!("Dropped {clip_id}: rejected while {state}");
        }
        PublishOutcome::Failed { clip_id, state } => {
            anyhow::bail!("Publishing {clip_id} failed while {state}");
        }
    }

    Ok(())
}

fn print_report(report: &FetchReport) {
    println!("\nFetch Summary");
    println!("=============");
    println!("Listed: {}", report.listed);
    println!("Selected: {}", report.selected);
    println!("Already published: {}", report.already_published);
    println!("Already queued: {}", report.already_queued);
    println!("Downloaded: {}", report.downloaded);
    println!("Reused: {}", report.reused);
    println!("Failed: {}", report.failed);
    println!("Enqueued: {}", report.enqueued);
}
