//! Candidate ranking
//!
//! Clips are ordered by descending view count. The sort is stable, so clips
//! with equal views keep the order the upstream API returned them in.

use crate::models::Clip;

/// Keep the `k` most-viewed clips, ties in upstream order
pub fn select_top(mut clips: Vec<Clip>, k: usize) -> Vec<Clip> {
    clips.sort_by(|a, b| b.views.cmp(&a.views));
    clips.truncate(k);
    clips
}
