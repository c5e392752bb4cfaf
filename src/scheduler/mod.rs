//! Scheduling for fetch and publish windows
//!
//! Each tracked source gets a [`SourceSupervisor`] with one fetch schedule
//! and one or more publish schedules. All of them share a single
//! [`CronTrigger`] clock, but every firing runs on its own task, so sources
//! never wait on each other.
//!
//! # Modules
//!
//! - [`schedule`] - 5-field cron expressions ([`CronSchedule`])
//! - [`trigger`] - timer firings over `tokio-cron-scheduler`
//! - [`supervisor`] - per-source fetch and publish cycles
//! - [`error`] - scheduler errors
//!
//! # Quick Start
//!
//! ```ignore
//! use cliprelay::config::Config;
//! use cliprelay::scheduler::Relay;
//!
//! let config = Config::load(Path::new("config.toml"))?;
//! let mut relay = Relay::build(&config).await?;
//! relay.start().await?;
//! tokio::signal::ctrl_c().await?;
//! relay.shutdown().await?;
//! ```

pub mod error;
pub mod schedule;
pub mod supervisor;
pub mod trigger;

pub use error::{SchedulerError, SchedulerResult};
pub use schedule::CronSchedule;
pub use supervisor::SourceSupervisor;
pub use trigger::{CronTrigger, RegisteredJob, TriggerKind};

use std::sync::Arc;

use crate::clips::{CandidateFetcher, TwitchClient};
use crate::config::Config;
use crate::download::Downloader;
use crate::error::Result;
use crate::models::TrackedSource;
use crate::publish::{SocialClient, XClient};
use crate::storage::{Ledger, StorageLayout};

/// Build one supervisor per configured source.
///
/// The HTTP connection pool and the social client are shared. Each source
/// gets its own upstream client (and token cache) and publish queue. With
/// `shared_ledger` every supervisor holds the same [`Ledger`] handle, so
/// appends from different sources are serialized by its lock.
pub async fn build_supervisors(config: &Config) -> Result<Vec<Arc<SourceSupervisor>>> {
    let layout = StorageLayout::new(&config.storage.root);
    let http = config.http.build_client()?;
    let social: Arc<dyn SocialClient> =
        Arc::new(XClient::with_client(http.clone(), config.social.clone()));

    let shared_ledger = if config.storage.shared_ledger {
        let ledger = Ledger::open(layout.ledger_path(None)).await?;
        tracing::info!(path = %ledger.path().display(), entries = ledger.len().await, "Opened shared ledger");
        Some(Arc::new(ledger))
    } else {
        None
    };

    let mut supervisors = Vec::with_capacity(config.sources.len());
    for source_config in &config.sources {
        let ledger = match &shared_ledger {
            Some(ledger) => Arc::clone(ledger),
            None => {
                let ledger = Ledger::open(layout.ledger_path(Some(&source_config.name))).await?;
                tracing::info!(
                    source = %source_config.name,
                    path = %ledger.path().display(),
                    entries = ledger.len().await,
                    "Opened source ledger"
                );
                Arc::new(ledger)
            }
        };

        let api = Arc::new(TwitchClient::with_client(
            http.clone(),
            config.upstream.clone(),
        ));
        let fetcher = CandidateFetcher::with_window_hours(api, config.upstream.window_hours);
        let downloader =
            Downloader::with_client(http.clone(), layout.clone(), config.download.retry());

        let source = TrackedSource::new(
            source_config.name.clone(),
            source_config.fetch_schedule.clone(),
            source_config.publish_schedules.clone(),
            source_config.max_candidates,
        );

        supervisors.push(Arc::new(SourceSupervisor::new(
            source,
            fetcher,
            downloader,
            ledger,
            Arc::clone(&social),
            config.social.max_post_chars,
        )));
    }

    Ok(supervisors)
}

/// All supervisors registered on one trigger clock
pub struct Relay {
    trigger: CronTrigger,
    supervisors: Vec<Arc<SourceSupervisor>>,
}

impl Relay {
    /// Build supervisors for every source and register their schedules
    pub async fn build(config: &Config) -> Result<Self> {
        let supervisors = build_supervisors(config).await?;
        Self::with_supervisors(supervisors).await
    }

    /// Register already-built supervisors on a fresh trigger clock
    pub async fn with_supervisors(supervisors: Vec<Arc<SourceSupervisor>>) -> Result<Self> {
        let mut trigger = CronTrigger::new().await?;
        for supervisor in &supervisors {
            supervisor.register(&mut trigger).await?;
        }
        Ok(Self {
            trigger,
            supervisors,
        })
    }

    pub fn supervisors(&self) -> &[Arc<SourceSupervisor>] {
        &self.supervisors
    }

    pub fn supervisor(&self, name: &str) -> Option<&Arc<SourceSupervisor>> {
        self.supervisors.iter().find(|s| s.name() == name)
    }

    pub fn jobs(&self) -> &[RegisteredJob] {
        self.trigger.jobs()
    }

    /// Run one fetch cycle for every source concurrently
    pub async fn fetch_all(&self) {
        let cycles = self.supervisors.iter().map(|s| s.fetch_cycle());
        futures::future::join_all(cycles).await;
    }

    pub async fn start(&mut self) -> Result<()> {
        self.trigger.start().await?;
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.trigger.shutdown().await?;
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.trigger.is_running()
    }
}
