//! Source supervisor
//!
//! Owns everything one tracked source needs: its candidate fetcher,
//! downloader, publish queue and publisher, plus a handle on the ledger.
//! Fetch and publish cycles are the trigger boundary: every component error
//! is caught and logged here and never reaches the trigger clock or another
//! source.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::error::SchedulerResult;
use super::trigger::{CronTrigger, TriggerKind};
use crate::clips::CandidateFetcher;
use crate::download::Downloader;
use crate::error::{RelayErrorTrait, Result};
use crate::models::{FetchReport, PublishOutcome, TrackedSource};
use crate::publish::publisher::InFlight;
use crate::publish::{PublishQueue, Publisher, SocialClient};
use crate::storage::Ledger;

/// Per-source state and cycle logic
pub struct SourceSupervisor {
    source: TrackedSource,
    fetcher: CandidateFetcher,
    downloader: Downloader,
    ledger: Arc<Ledger>,
    queue: Arc<Mutex<PublishQueue>>,
    publisher: Publisher,
    fetching: AtomicBool,
}

impl SourceSupervisor {
    pub fn new(
        source: TrackedSource,
        fetcher: CandidateFetcher,
        downloader: Downloader,
        ledger: Arc<Ledger>,
        client: Arc<dyn SocialClient>,
        max_post_chars: usize,
    ) -> Self {
        let queue = Arc::new(Mutex::new(PublishQueue::new()));
        let publisher = Publisher::new(
            source.name.clone(),
            Arc::clone(&queue),
            Arc::clone(&ledger),
            client,
            max_post_chars,
        );

        Self {
            source,
            fetcher,
            downloader,
            ledger,
            queue,
            publisher,
            fetching: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.source.name
    }

    pub fn source(&self) -> &TrackedSource {
        &self.source
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    pub fn downloader(&self) -> &Downloader {
        &self.downloader
    }

    pub async fn queue_len(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// Queued clip ids, head first
    pub async fn queued_ids(&self) -> Vec<String> {
        self.queue.lock().await.ids()
    }

    /// Run one fetch cycle, logging any failure.
    ///
    /// Returns `None` when the cycle failed or another fetch was in flight.
    pub async fn fetch_cycle(&self) -> Option<FetchReport> {
        match self.try_fetch_cycle().await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(
                    source = %self.source.name,
                    category = e.category().as_str(),
                    recoverable = e.is_recoverable(),
                    error = %e,
                    "Fetch cycle abandoned"
                );
                None
            }
        }
    }

    /// Run one fetch cycle: list, rank, skip known ids, download, enqueue.
    ///
    /// Download failures are counted and logged per candidate; only a listing
    /// failure aborts the cycle. `Ok(None)` means a fetch was already running.
    pub async fn try_fetch_cycle(&self) -> Result<Option<FetchReport>> {
        let Some(_guard) = InFlight::acquire(&self.fetching) else {
            tracing::debug!(source = %self.source.name, "Fetch already in flight, skipping trigger");
            return Ok(None);
        };

        self.run_fetch().await.map(Some)
    }

    async fn run_fetch(&self) -> Result<FetchReport> {
        let name = self.source.name.as_str();
        let batch = self.fetcher.fetch_candidates(&self.source).await?;

        let mut report = FetchReport {
            listed: batch.listed,
            selected: batch.candidates.len(),
            ..FetchReport::default()
        };

        for clip in batch.candidates {
            if self.ledger.contains(&clip.id).await {
                report.already_published += 1;
                tracing::debug!(source = %name, clip_id = %clip.id, "Already published, skipping");
                continue;
            }

            if self.queue.lock().await.has_seen(&clip.id) {
                report.already_queued += 1;
                tracing::debug!(source = %name, clip_id = %clip.id, "Already queued, skipping");
                continue;
            }

            match self.downloader.download(name, &clip).await {
                Ok(result) => {
                    if result.reused {
                        report.reused += 1;
                    } else {
                        report.downloaded += 1;
                    }
                    if self.queue.lock().await.push(result.clip) {
                        report.enqueued += 1;
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        source = %name,
                        clip_id = %clip.id,
                        category = e.category().as_str(),
                        recoverable = e.is_recoverable(),
                        error = %e,
                        "Download failed, clip dropped"
                    );
                }
            }
        }

        let queue_len = self.queue_len().await;
        tracing::info!(
            source = %name,
            listed = report.listed,
            selected = report.selected,
            already_published = report.already_published,
            already_queued = report.already_queued,
            downloaded = report.downloaded,
            reused = report.reused,
            failed = report.failed,
            enqueued = report.enqueued,
            queue_len,
            "Fetch cycle complete"
        );

        Ok(report)
    }

    /// Run exactly one publisher cycle
    pub async fn publish_cycle(&self) -> PublishOutcome {
        self.publisher.publish_next().await
    }

    /// Register this source's fetch and publish schedules on `trigger`
    pub async fn register(self: &Arc<Self>, trigger: &mut CronTrigger) -> SchedulerResult<()> {
        let this = Arc::clone(self);
        trigger
            .register(
                &self.source.name,
                TriggerKind::Fetch,
                &self.source.fetch_schedule,
                move || {
                    let this = Arc::clone(&this);
                    async move {
                        this.fetch_cycle().await;
                    }
                },
            )
            .await?;

        for schedule in &self.source.publish_schedules {
            let this = Arc::clone(self);
            trigger
                .register(&self.source.name, TriggerKind::Publish, schedule, move || {
                    let this = Arc::clone(&this);
                    async move {
                        this.publish_cycle().await;
                    }
                })
                .await?;
        }

        Ok(())
    }
}
