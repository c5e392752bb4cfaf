//! Publisher state machine
//!
//! One [`Publisher`] per tracked source. Each call to
//! [`Publisher::publish_next`] handles at most the current queue head:
//!
//! 1. Empty queue: nothing to do
//! 2. Peek the head without removing it
//! 3. Claim the ledger; head already recorded: discard it and stop
//! 4. Upload the media; on failure leave the head in place
//! 5. Create the post; on failure leave the head in place
//! 6. Record the id in the ledger, then pop the head
//!
//! The ledger claim is held from step 3 through step 6, so no other handle
//! on the same ledger file can publish the same clip in between. A 4xx
//! answer at step 4 or 5 is final for that clip: the head is dropped
//! instead of blocking the queue.
//!
//! Step 6 records before popping. If the process dies between the two, the
//! head is found in the ledger on the next trigger and discarded at step 3.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

use super::client::SocialClient;
use super::queue::PublishQueue;
use crate::error::{ErrorCategory, RelayErrorTrait};
use crate::models::{PublishOutcome, PublishState};
use crate::storage::Ledger;
use crate::utils::error::PublishError;
use crate::utils::{format_bytes, truncate_text};

/// Clears the in-flight flag when a publish attempt ends, however it ends
pub(crate) struct InFlight<'a> {
    flag: &'a AtomicBool,
    state: Option<&'a watch::Sender<PublishState>>,
}

impl<'a> InFlight<'a> {
    pub(crate) fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag, state: None })
    }

    /// Also reset `state` to idle on release
    fn reporting(mut self, state: &'a watch::Sender<PublishState>) -> Self {
        self.state = Some(state);
        self
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Some(state) = self.state {
            state.send_replace(PublishState::Idle);
        }
        self.flag.store(false, Ordering::Release);
    }
}

/// Publishes queued clips for one source, one per trigger
pub struct Publisher {
    source: String,
    queue: Arc<Mutex<PublishQueue>>,
    ledger: Arc<Ledger>,
    client: Arc<dyn SocialClient>,
    max_post_chars: usize,
    publishing: AtomicBool,
    state: watch::Sender<PublishState>,
}

impl Publisher {
    pub fn new(
        source: impl Into<String>,
        queue: Arc<Mutex<PublishQueue>>,
        ledger: Arc<Ledger>,
        client: Arc<dyn SocialClient>,
        max_post_chars: usize,
    ) -> Self {
        let (state, _) = watch::channel(PublishState::Idle);
        Self {
            source: source.into(),
            queue,
            ledger,
            client,
            max_post_chars,
            publishing: AtomicBool::new(false),
            state,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether a publish attempt is currently running
    pub fn is_publishing(&self) -> bool {
        self.publishing.load(Ordering::Acquire)
    }

    /// Observe the state of the in-flight attempt
    pub fn subscribe(&self) -> watch::Receiver<PublishState> {
        self.state.subscribe()
    }

    /// Run one publish cycle
    pub async fn publish_next(&self) -> PublishOutcome {
        let Some(_guard) = InFlight::acquire(&self.publishing).map(|g| g.reporting(&self.state))
        else {
            tracing::debug!(source = %self.source, "Publish already in flight, skipping trigger");
            return PublishOutcome::AlreadyPublishing;
        };

        let head = match self.queue.lock().await.peek() {
            Some(head) => head.clone(),
            None => {
                tracing::info!(source = %self.source, "Publish queue empty");
                return PublishOutcome::QueueEmpty;
            }
        };
        let clip_id = head.id().to_string();

        self.state.send_replace(PublishState::CheckingLedger);
        let mut claim = match self.ledger.claim().await {
            Ok(claim) => claim,
            Err(e) => {
                self.state.send_replace(PublishState::Failed);
                tracing::error!(
                    source = %self.source,
                    clip_id = %clip_id,
                    error = %e,
                    "Ledger unavailable, clip stays queued"
                );
                return PublishOutcome::Failed {
                    clip_id,
                    state: PublishState::CheckingLedger,
                };
            }
        };

        if claim.contains(&clip_id).await {
            let mut queue = self.queue.lock().await;
            queue.pop_if(&clip_id);
            queue.forget(&clip_id);
            tracing::info!(
                source = %self.source,
                clip_id = %clip_id,
                "Clip already published, discarded from queue"
            );
            return PublishOutcome::DuplicateDiscarded { clip_id };
        }

        self.state.send_replace(PublishState::UploadingMedia);
        tracing::info!(
            source = %self.source,
            clip_id = %clip_id,
            size = %format_bytes(head.size),
            path = %head.path.display(),
            "Uploading media"
        );

        let media = match self.client.upload_media(&head.path).await {
            Ok(media) => media,
            Err(e) => {
                return self
                    .give_up(clip_id, PublishState::UploadingMedia, &e)
                    .await
            }
        };

        self.state.send_replace(PublishState::Posting);
        let text = truncate_text(&head.clip.title, self.max_post_chars);

        let post = match self.client.create_post(&text, &media).await {
            Ok(post) => post,
            Err(e) => return self.give_up(clip_id, PublishState::Posting, &e).await,
        };

        self.state.send_replace(PublishState::Done);
        let post_id = post.to_string();

        let recorded = claim.record(&clip_id).await;
        drop(claim);

        let mut queue = self.queue.lock().await;
        queue.pop_if(&clip_id);

        match recorded {
            Ok(()) => {
                queue.forget(&clip_id);
                tracing::info!(
                    source = %self.source,
                    clip_id = %clip_id,
                    post_id = %post_id,
                    "Clip published"
                );
                PublishOutcome::Published { clip_id, post_id }
            }
            Err(e) => {
                tracing::error!(
                    source = %self.source,
                    clip_id = %clip_id,
                    post_id = %post_id,
                    error = %e,
                    "Clip published but not recorded in ledger"
                );
                PublishOutcome::PublishedUnrecorded { clip_id, post_id }
            }
        }
    }

    /// Rejections drop the head; anything else leaves it for the next trigger
    async fn give_up(&self, clip_id: String, state: PublishState, e: &PublishError) -> PublishOutcome {
        self.state.send_replace(PublishState::Failed);

        if e.category() == ErrorCategory::UpstreamRejection {
            self.queue.lock().await.pop_if(&clip_id);
            tracing::error!(
                source = %self.source,
                clip_id = %clip_id,
                step = %state,
                error = %e,
                "Publish API rejected clip, dropped from queue"
            );
            return PublishOutcome::Dropped { clip_id, state };
        }

        tracing::error!(
            source = %self.source,
            clip_id = %clip_id,
            step = %state,
            category = e.category().as_str(),
            recoverable = e.is_recoverable(),
            error = %e,
            "Publish step failed, clip stays queued"
        );
        PublishOutcome::Failed { clip_id, state }
    }
}
