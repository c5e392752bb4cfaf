//! Candidate fetcher
//!
//! Lists clips for one tracked source over a trailing window and returns the
//! most-viewed ones. The broadcaster id is resolved on first use and cached
//! on the [`TrackedSource`] for the rest of the process lifetime.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use super::api::ClipApi;
use super::ranking::select_top;
use crate::models::{Clip, TrackedSource};
use crate::utils::error::FetchError;

/// Ranked candidates from one listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateBatch {
    /// Number of clips the upstream listing returned
    pub listed: usize,

    /// Top candidates by view count, at most `max_candidates`
    pub candidates: Vec<Clip>,
}

/// Lists and ranks candidate clips for tracked sources
pub struct CandidateFetcher {
    api: Arc<dyn ClipApi>,
    window: Duration,
}

impl CandidateFetcher {
    /// Create a fetcher over `api` looking back `window`
    pub fn new(api: Arc<dyn ClipApi>, window: Duration) -> Self {
        Self { api, window }
    }

    /// Create a fetcher with a window of `hours`
    pub fn with_window_hours(api: Arc<dyn ClipApi>, hours: u32) -> Self {
        Self::new(api, Duration::hours(i64::from(hours)))
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Fetch candidates for the window ending now
    pub async fn fetch_candidates(
        &self,
        source: &TrackedSource,
    ) -> Result<CandidateBatch, FetchError> {
        self.fetch_candidates_at(source, Utc::now()).await
    }

    /// Fetch candidates for the window ending at `now`
    pub async fn fetch_candidates_at(
        &self,
        source: &TrackedSource,
        now: DateTime<Utc>,
    ) -> Result<CandidateBatch, FetchError> {
        let broadcaster_id = source
            .broadcaster_id_or_resolve(|| self.api.resolve_broadcaster_id(&source.name))
            .await?;

        let started_at = now - self.window;
        let clips = self.api.list_clips(broadcaster_id, started_at, now).await?;
        let listed = clips.len();
        let candidates = select_top(clips, source.max_candidates);

        tracing::info!(
            source = %source.name,
            broadcaster_id = %broadcaster_id,
            listed = listed,
            selected = candidates.len(),
            "Ranked candidate clips"
        );

        Ok(CandidateBatch { listed, candidates })
    }
}
