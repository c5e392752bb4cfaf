//! cliprelay - publish-once relay for stream clips
//!
//! Periodically lists the most-viewed clips of each tracked channel,
//! downloads the best ones and republishes them to a social-media account,
//! never posting the same clip twice, even across restarts.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`clips`] - Upstream clip listing and top-K candidate selection
//! - [`download`] - Resumable media download with size verification
//! - [`publish`] - Publish queue, social-media client and publisher
//! - [`scheduler`] - Cron schedules, trigger clock and source supervisors
//! - [`storage`] - Media layout and the published-clip ledger
//! - [`models`] - Core data structures and types
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use cliprelay::config::Config;
//! use cliprelay::scheduler::Relay;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(Path::new("config.toml"))?;
//!     let mut relay = Relay::build(&config).await?;
//!     relay.start().await?;
//!     tokio::signal::ctrl_c().await?;
//!     relay.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod clips;
pub mod config;
pub mod download;
pub mod error;
pub mod models;
pub mod publish;
pub mod scheduler;
pub mod storage;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::clips::{CandidateFetcher, ClipApi, TwitchClient};
    pub use crate::config::Config;
    pub use crate::download::Downloader;
    pub use crate::error::{Error, ErrorCategory, RelayErrorTrait, Result};
    pub use crate::models::{Clip, DownloadedClip, FetchReport, PublishOutcome, TrackedSource};
    pub use crate::publish::{PublishQueue, Publisher, SocialClient, XClient};
    pub use crate::scheduler::{CronSchedule, Relay, SourceSupervisor};
    pub use crate::storage::{Ledger, StorageLayout};
}

// Direct re-exports for convenience
pub use models::{Clip, DownloadedClip, PublishOutcome, PublishState, TrackedSource};
