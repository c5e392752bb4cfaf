//! Clip media downloader
//!
//! This module streams a clip's media to local storage with:
//! - Media URL derivation from the clip's thumbnail reference
//! - Skip-if-complete: an existing file whose size matches the server's
//!   `Content-Length` is accepted without transferring the body
//! - Streaming into a `.part` file that is renamed only after its size is
//!   verified, so a short file never reaches the final path
//! - Exponential backoff on network errors and 5xx; 4xx is final
//! - Progress published on a `watch` channel (informational only)

use reqwest::header::CONTENT_LENGTH;
use reqwest::{Client, Response};
use std::path::Path;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;

use crate::config::HttpConfig;
use crate::models::{Clip, DownloadedClip};
use crate::storage::{StorageLayout, MEDIA_EXTENSION};
use crate::utils::error::DownloadError;
use crate::utils::format_bytes;
use crate::utils::retry::{with_retry_if, RetryConfig};

/// Marker that separates the media stem from the thumbnail suffix
const PREVIEW_MARKER: &str = "-preview";

/// Derive the media URL from a thumbnail URL.
///
/// `https://host/AT-cm%7C123-preview-480x272.jpg` becomes
/// `https://host/AT-cm%7C123.mp4`: everything from the first `-preview`
/// onwards is replaced by the media extension.
pub fn media_url(thumbnail_url: &str) -> Result<String, DownloadError> {
    match thumbnail_url.split_once(PREVIEW_MARKER) {
        Some((stem, _)) if !stem.is_empty() => Ok(format!("{stem}.{MEDIA_EXTENSION}")),
        _ => Err(DownloadError::UnresolvableMediaUrl(thumbnail_url.to_string())),
    }
}

/// Snapshot of an in-flight download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadProgress {
    pub clip_id: String,
    pub downloaded: u64,
    pub total: Option<u64>,
}

impl DownloadProgress {
    /// Completed fraction, when the total is known
    pub fn fraction(&self) -> Option<f64> {
        self.total
            .filter(|total| *total > 0)
            .map(|total| self.downloaded as f64 / total as f64)
    }
}

/// A finished download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadResult {
    pub clip: DownloadedClip,

    /// The file already existed with the expected size
    pub reused: bool,

    /// HTTP GET attempts made (0 when the HEAD request proved the file complete)
    pub attempts: u32,
}

enum Transfer {
    Reused(u64),
    Written(u64),
}

/// Streams clip media into the storage layout
pub struct Downloader {
    client: Client,
    layout: StorageLayout,
    retry: RetryConfig,
    progress: watch::Sender<Option<DownloadProgress>>,
}

impl Downloader {
    /// Create a downloader with its own keep-alive client
    pub fn new(
        layout: StorageLayout,
        http: &HttpConfig,
        retry: RetryConfig,
    ) -> Result<Self, DownloadError> {
        let client = http.build_client()?;
        Ok(Self::with_client(client, layout, retry))
    }

    /// Create a downloader on top of an existing HTTP client
    pub fn with_client(client: Client, layout: StorageLayout, retry: RetryConfig) -> Self {
        let (progress, _) = watch::channel(None);
        Self {
            client,
            layout,
            retry,
            progress,
        }
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Observe progress of the current download
    pub fn subscribe(&self) -> watch::Receiver<Option<DownloadProgress>> {
        self.progress.subscribe()
    }

    /// Download `clip` for `source`, deriving the URL from its thumbnail
    pub async fn download(&self, source: &str, clip: &Clip) -> Result<DownloadResult, DownloadError> {
        let url = media_url(&clip.thumbnail_url)?;
        self.download_from(source, clip, &url).await
    }

    /// Download `clip` for `source` from an explicit media URL
    pub async fn download_from(
        &self,
        source: &str,
        clip: &Clip,
        url: &str,
    ) -> Result<DownloadResult, DownloadError> {
        let final_path = self.layout.media_path(source, &clip.id);
        let partial_path = self.layout.partial_path(source, &clip.id);
        let media_dir = self.layout.media_dir(source);

        fs::create_dir_all(&media_dir)
            .await
            .map_err(|e| DownloadError::io(&media_dir, e))?;

        let existing = fs::metadata(&final_path)
            .await
            .ok()
            .filter(|m| m.is_file())
            .map(|m| m.len());

        if let Some(existing) = existing {
            if self.head_length(url).await == Some(existing) {
                tracing::info!(
                    source = %source,
                    clip_id = %clip.id,
                    size = %format_bytes(existing),
                    "Media already complete, skipping download"
                );
                return Ok(self.finish(clip, &final_path, existing, true, 0));
            }
        }

        let mut attempts = 0;
        let transfer = with_retry_if(
            &self.retry,
            |attempt| {
                attempts = attempt + 1;
                self.fetch_once(url, &clip.id, &final_path, &partial_path, existing)
            },
            DownloadError::is_retryable,
        )
        .await?;

        let (size, reused) = match transfer {
            Transfer::Reused(size) => (size, true),
            Transfer::Written(size) => (size, false),
        };

        tracing::info!(
            source = %source,
            clip_id = %clip.id,
            size = %format_bytes(size),
            attempts = attempts,
            reused = reused,
            "Download complete"
        );

        Ok(self.finish(clip, &final_path, size, reused, attempts))
    }

    fn finish(
        &self,
        clip: &Clip,
        path: &Path,
        size: u64,
        reused: bool,
        attempts: u32,
    ) -> DownloadResult {
        DownloadResult {
            clip: DownloadedClip {
                clip: clip.clone(),
                path: path.to_path_buf(),
                size,
            },
            reused,
            attempts,
        }
    }

    /// Content length from a HEAD request, if the server gives a usable one
    async fn head_length(&self, url: &str) -> Option<u64> {
        match self.client.head(url).send().await {
            Ok(response) if response.status().is_success() => header_content_length(&response),
            Ok(response) => {
                tracing::debug!(url = %url, status = %response.status(), "HEAD response not usable");
                None
            }
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "HEAD request failed");
                None
            }
        }
    }

    /// One GET attempt: verify status, reuse or stream, verify size, rename
    async fn fetch_once(
        &self,
        url: &str,
        clip_id: &str,
        final_path: &Path,
        partial_path: &Path,
        existing: Option<u64>,
    ) -> Result<Transfer, DownloadError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if status.is_server_error() {
            return Err(DownloadError::ServerError(status.as_u16()));
        }
        if !status.is_success() {
            return Err(DownloadError::Rejected(status.as_u16()));
        }

        let expected = header_content_length(&response);

        // HEAD was unusable but the GET headers already prove the file complete
        if let (Some(expected), Some(existing)) = (expected, existing) {
            if expected == existing {
                return Ok(Transfer::Reused(existing));
            }
        }

        let written = match self
            .stream_to_file(response, clip_id, partial_path, expected)
            .await
        {
            Ok(written) => written,
            Err(e) => {
                remove_partial(partial_path).await;
                return Err(e);
            }
        };

        match expected {
            Some(expected) if written != expected => {
                remove_partial(partial_path).await;
                return Err(DownloadError::SizeMismatch {
                    path: final_path.to_path_buf(),
                    expected,
                    actual: written,
                });
            }
            Some(_) => {}
            None => {
                tracing::warn!(
                    clip_id = %clip_id,
                    size = written,
                    "Media server sent no Content-Length, size cannot be verified"
                );
            }
        }

        fs::rename(partial_path, final_path)
            .await
            .map_err(|e| DownloadError::io(final_path, e))?;

        Ok(Transfer::Written(written))
    }

    async fn stream_to_file(
        &self,
        mut response: Response,
        clip_id: &str,
        partial_path: &Path,
        expected: Option<u64>,
    ) -> Result<u64, DownloadError> {
        let mut file = File::create(partial_path)
            .await
            .map_err(|e| DownloadError::io(partial_path, e))?;

        let mut written = 0u64;
        let mut last_decile = 0;
        self.report(clip_id, written, expected);

        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk)
                .await
                .map_err(|e| DownloadError::io(partial_path, e))?;
            written += chunk.len() as u64;
            self.report(clip_id, written, expected);

            if let Some(total) = expected.filter(|t| *t > 0) {
                let decile = (written.saturating_mul(10) / total).min(10);
                if decile > last_decile {
                    last_decile = decile;
                    tracing::debug!(clip_id = %clip_id, percent = decile * 10, "Downloading");
                }
            }
        }

        file.flush()
            .await
            .map_err(|e| DownloadError::io(partial_path, e))?;
        file.sync_all()
            .await
            .map_err(|e| DownloadError::io(partial_path, e))?;

        Ok(written)
    }

    fn report(&self, clip_id: &str, downloaded: u64, total: Option<u64>) {
        self.progress.send_replace(Some(DownloadProgress {
            clip_id: clip_id.to_string(),
            downloaded,
            total,
        }));
    }
}

/// `Content-Length` read straight from the headers (HEAD responses have no body hint)
fn header_content_length(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

async fn remove_partial(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove partial download");
        }
    }
}
