//! Per-source FIFO of downloaded clips awaiting publication

use std::collections::{HashSet, VecDeque};

use crate::models::DownloadedClip;

/// Publish queue for one tracked source.
///
/// Items are only removed from the head, and only by the publisher. A clip id
/// is accepted at most once until the publisher [`forget`](Self::forget)s
/// it, so a clip that was dropped or dequeued after a failed ledger write is
/// not enqueued again by a later fetch.
#[derive(Debug, Default)]
pub struct PublishQueue {
    items: VecDeque<DownloadedClip>,
    seen: HashSet<String>,
}

impl PublishQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `clip` unless its id has been queued before. Returns whether it was added.
    pub fn push(&mut self, clip: DownloadedClip) -> bool {
        if !self.seen.insert(clip.id().to_string()) {
            return false;
        }
        self.items.push_back(clip);
        true
    }

    /// Oldest queued clip
    pub fn peek(&self) -> Option<&DownloadedClip> {
        self.items.front()
    }

    /// Remove the head only if it is still `clip_id`
    pub fn pop_if(&mut self, clip_id: &str) -> Option<DownloadedClip> {
        match self.items.front() {
            Some(head) if head.id() == clip_id => self.items.pop_front(),
            _ => None,
        }
    }

    /// Stop tracking `clip_id` once the ledger covers it
    pub fn forget(&mut self, clip_id: &str) {
        if self.items.iter().all(|c| c.id() != clip_id) {
            self.seen.remove(clip_id);
        }
    }

    /// Whether `clip_id` was ever accepted by this queue
    pub fn has_seen(&self, clip_id: &str) -> bool {
        self.seen.contains(clip_id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Queued ids, head first
    pub fn ids(&self) -> Vec<String> {
        self.items.iter().map(|c| c.id().to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Clip;

    fn downloaded(id: &str) -> DownloadedClip {
        DownloadedClip {
            clip: Clip {
                id: id.to_string(),
                title: format!("title {id}"),
                views: 1,
                thumbnail_url: format!("https://cdn/{id}-preview-480x272.jpg"),
                broadcaster_name: "xqc".to_string(),
                created_at: None,
            },
            path: format!("vids/xqc/{id}.mp4").into(),
            size: 10,
        }
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = PublishQueue::new();
        assert!(queue.push(downloaded("a")));
        assert!(queue.push(downloaded("b")));

        assert_eq!(queue.ids(), vec!["a", "b"]);
        assert_eq!(queue.peek().unwrap().id(), "a");
        assert_eq!(queue.pop_if("a").unwrap().id(), "a");
        assert_eq!(queue.peek().unwrap().id(), "b");
    }

    #[test]
    fn test_pop_if_requires_matching_head() {
        let mut queue = PublishQueue::new();
        queue.push(downloaded("a"));
        queue.push(downloaded("b"));

        assert!(queue.pop_if("b").is_none());
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_duplicate_push_rejected_even_after_pop() {
        let mut queue = PublishQueue::new();
        assert!(queue.push(downloaded("a")));
        assert!(!queue.push(downloaded("a")));
        assert_eq!(queue.len(), 1);

        queue.pop_if("a");
        assert!(queue.is_empty());
        assert!(queue.has_seen("a"));
        assert!(!queue.push(downloaded("a")));
    }

    #[test]
    fn test_forget_only_releases_dequeued_ids() {
        let mut queue = PublishQueue::new();
        queue.push(downloaded("a"));
        queue.push(downloaded("b"));

        // Still waiting, so it stays tracked
        queue.forget("b");
        assert!(queue.has_seen("b"));

        queue.pop_if("a");
        queue.forget("a");
        assert!(!queue.has_seen("a"));
        assert!(queue.push(downloaded("a")));
    }
}
