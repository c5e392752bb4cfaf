//! Local storage: media layout and the published-clip ledger
//!
//! Media lives under `<root>/vids/<source>/<clip id>.mp4`. The ledger is
//! `<root>/postedClips.txt` when shared by every source, or
//! `<root>/postedClips.<source>.txt` when each source keeps its own.

pub mod ledger;

use std::path::{Path, PathBuf};

use crate::utils::sanitize_filename;

pub use ledger::Ledger;

/// Extension used for downloaded media
pub const MEDIA_EXTENSION: &str = "mp4";

/// Suffix for in-progress downloads
pub const PARTIAL_SUFFIX: &str = "part";

/// Filesystem layout rooted at one directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one source's media
    pub fn media_dir(&self, source: &str) -> PathBuf {
        self.root.join("vids").join(sanitize_filename(source))
    }

    /// Final path of a clip's media file
    pub fn media_path(&self, source: &str, clip_id: &str) -> PathBuf {
        self.media_dir(source)
            .join(format!("{}.{MEDIA_EXTENSION}", sanitize_filename(clip_id)))
    }

    /// Path the body is streamed to before it is verified and renamed
    pub fn partial_path(&self, source: &str, clip_id: &str) -> PathBuf {
        self.media_dir(source).join(format!(
            "{}.{MEDIA_EXTENSION}.{PARTIAL_SUFFIX}",
            sanitize_filename(clip_id)
        ))
    }

    /// Ledger path; `None` selects the ledger shared by all sources
    pub fn ledger_path(&self, source: Option<&str>) -> PathBuf {
        match source {
            None => self.root.join("postedClips.txt"),
            Some(name) => self
                .root
                .join(format!("postedClips.{}.txt", sanitize_filename(name))),
        }
    }
}
