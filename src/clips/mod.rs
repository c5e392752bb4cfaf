//! Candidate clip discovery
//!
//! - [`api`] - upstream clip-listing client and the [`ClipApi`] seam
//! - [`ranking`] - top-K selection by view count
//! - [`fetcher`] - per-source candidate fetching with broadcaster id caching

pub mod api;
pub mod fetcher;
pub mod ranking;

pub use api::{ClipApi, TwitchClient};
pub use fetcher::{CandidateBatch, CandidateFetcher};
pub use ranking::select_top;
