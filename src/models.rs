// Core data structures for the clip relay

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tokio::sync::OnceCell;

use crate::scheduler::schedule::CronSchedule;

/// A monitored channel whose clips are candidates for publication.
///
/// Created once at startup from static configuration. The only mutable part
/// is the broadcaster id, which is resolved on first use and then reused for
/// the lifetime of the process.
#[derive(Debug)]
pub struct TrackedSource {
    /// Channel login name (also used as the media directory name)
    pub name: String,

    /// Schedule for fetch windows
    pub fetch_schedule: CronSchedule,

    /// Schedules for publish windows (one item per firing)
    pub publish_schedules: Vec<CronSchedule>,

    /// Maximum number of candidates downloaded per fetch window
    pub max_candidates: usize,

    broadcaster_id: OnceCell<String>,
}

impl TrackedSource {
    /// Create a new tracked source with an unresolved broadcaster id
    pub fn new(
        name: impl Into<String>,
        fetch_schedule: CronSchedule,
        publish_schedules: Vec<CronSchedule>,
        max_candidates: usize,
    ) -> Self {
        Self {
            name: name.into(),
            fetch_schedule,
            publish_schedules,
            max_candidates,
            broadcaster_id: OnceCell::new(),
        }
    }

    /// Cached broadcaster id, if already resolved
    pub fn cached_broadcaster_id(&self) -> Option<&str> {
        self.broadcaster_id.get().map(String::as_str)
    }

    /// Resolve the broadcaster id once and cache it.
    ///
    /// Concurrent callers wait on the same initialization; a failed
    /// resolution leaves the cell empty so the next fetch window retries.
    pub async fn broadcaster_id_or_resolve<F, Fut, E>(&self, resolve: F) -> Result<&str, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<String, E>>,
    {
        self.broadcaster_id
            .get_or_try_init(resolve)
            .await
            .map(String::as_str)
    }
}

/// A candidate clip as reported by the upstream API. Never mutated locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clip {
    /// Platform-assigned unique id
    pub id: String,

    pub title: String,

    #[serde(rename = "view_count")]
    pub views: u64,

    /// Thumbnail reference; the media URL is derived from it
    pub thumbnail_url: String,

    /// Display name of the owning channel
    #[serde(default)]
    pub broadcaster_name: String,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A clip whose media has been fully written to local storage.
///
/// Only constructed by the downloader after the file size matched the
/// length reported by the media server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedClip {
    pub clip: Clip,
    pub path: PathBuf,
    pub size: u64,
}

impl DownloadedClip {
    pub fn id(&self) -> &str {
        &self.clip.id
    }
}

/// In-flight publish state for the queue head
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PublishState {
    Idle,
    CheckingLedger,
    UploadingMedia,
    Posting,
    Done,
    Failed,
}

impl PublishState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::CheckingLedger => "checking_ledger",
            Self::UploadingMedia => "uploading_media",
            Self::Posting => "posting",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PublishState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a single publish trigger did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Another publish for the same source was already in flight
    AlreadyPublishing,

    /// Nothing queued
    QueueEmpty,

    /// Queue head was already in the ledger and has been discarded
    DuplicateDiscarded { clip_id: String },

    /// Queue head was posted, recorded and dequeued
    Published { clip_id: String, post_id: String },

    /// Posted, but the ledger append failed; the head was still dequeued
    PublishedUnrecorded { clip_id: String, post_id: String },

    /// Upload or post was rejected by the publish API; the head was dropped
    Dropped { clip_id: String, state: PublishState },

    /// Transient failure; the head stays queued for the next trigger
    Failed { clip_id: String, state: PublishState },
}

impl PublishOutcome {
    /// Whether a post was created on this trigger
    pub fn is_published(&self) -> bool {
        matches!(
            self,
            Self::Published { .. } | Self::PublishedUnrecorded { .. }
        )
    }
}

/// Summary of one fetch window
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FetchReport {
    /// Clips returned by the upstream listing
    pub listed: usize,

    /// Candidates left after ranking and truncation
    pub selected: usize,

    /// Candidates skipped because they were already published
    pub already_published: usize,

    /// Candidates skipped because they are already waiting in the queue
    pub already_queued: usize,

    /// Downloads that reused an existing complete file
    pub reused: usize,

    /// Downloads that transferred the media
    pub downloaded: usize,

    /// Candidates dropped because of download errors
    pub failed: usize,

    /// Items appended to the publish queue
    pub enqueued: usize,
}
