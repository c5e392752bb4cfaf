//! Timer firings for fetch and publish windows
//!
//! [`CronTrigger`] owns a process-wide `tokio-cron-scheduler` instance and
//! turns each registered [`CronSchedule`] into a job. Every firing spawns its
//! action on a separate task, so a long fetch for one source never delays a
//! publish firing for another. Overlap within one source is handled by the
//! supervisor's single-flight guards, not here.

use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

use super::error::{SchedulerError, SchedulerResult};
use super::schedule::CronSchedule;

/// What a firing triggers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerKind {
    Fetch,
    Publish,
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Publish => "publish",
        }
    }
}

/// A registered job, kept for logging and removal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredJob {
    pub id: Uuid,
    pub source: String,
    pub kind: TriggerKind,
    pub schedule: CronSchedule,
}

/// Process-wide cron clock shared by every source supervisor
pub struct CronTrigger {
    scheduler: JobScheduler,
    jobs: Vec<RegisteredJob>,
    started: bool,
}

impl CronTrigger {
    /// Create a stopped trigger with no jobs
    pub async fn new() -> SchedulerResult<Self> {
        let scheduler = JobScheduler::new().await?;
        Ok(Self {
            scheduler,
            jobs: Vec::new(),
            started: false,
        })
    }

    /// Register `action` to run on every firing of `schedule`
    pub async fn register<F, Fut>(
        &mut self,
        source: &str,
        kind: TriggerKind,
        schedule: &CronSchedule,
        action: F,
    ) -> SchedulerResult<Uuid>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let action = Arc::new(action);
        let source_name = source.to_string();

        let job = Job::new_async(schedule.job_expression().as_str(), move |_id, _scheduler| {
            let action = Arc::clone(&action);
            let source_name = source_name.clone();
            Box::pin(async move {
                tracing::debug!(source = %source_name, kind = kind.as_str(), "Trigger fired");
                tokio::spawn(async move { action().await });
            })
        })
        .map_err(|e| SchedulerError::job_registration(source, e.to_string()))?;

        let id = self
            .scheduler
            .add(job)
            .await
            .map_err(|e| SchedulerError::job_registration(source, e.to_string()))?;

        tracing::info!(
            source = %source,
            kind = kind.as_str(),
            schedule = %schedule,
            job_id = %id,
            "Registered trigger"
        );

        self.jobs.push(RegisteredJob {
            id,
            source: source.to_string(),
            kind,
            schedule: schedule.clone(),
        });

        Ok(id)
    }

    /// Jobs registered so far
    pub fn jobs(&self) -> &[RegisteredJob] {
        &self.jobs
    }

    /// Start firing registered jobs
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.started {
            return Ok(());
        }
        self.scheduler.start().await?;
        self.started = true;
        tracing::info!(jobs = self.jobs.len(), "Trigger clock started");
        Ok(())
    }

    /// Stop firing; actions already running are left to finish on their own
    pub async fn shutdown(&mut self) -> SchedulerResult<()> {
        if !self.started {
            return Ok(());
        }
        self.scheduler.shutdown().await?;
        self.started = false;
        tracing::info!("Trigger clock stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.started
    }
}
