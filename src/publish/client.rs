//! Social-media publish API client
//!
//! Two operations are exposed through [`SocialClient`]: upload a local media
//! file and create a post that references it. [`XClient`] implements them
//! against the X API v2 chunked media upload:
//!
//! 1. `POST /2/media/upload/initialize` with the byte count and media type
//! 2. `POST /2/media/upload/{id}/append` once per segment (multipart)
//! 3. `POST /2/media/upload/{id}/finalize`
//! 4. `GET /2/media/upload?command=STATUS` until processing succeeds
//!
//! followed by `POST /2/tweets` for the post itself.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::config::{HttpConfig, SocialConfig};
use crate::utils::error::PublishError;

/// Opaque media reference returned by an upload
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaId(pub String);

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a created post
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PostId(pub String);

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Destination for published clips
#[async_trait]
pub trait SocialClient: Send + Sync {
    /// Upload the media file at `path`
    async fn upload_media(&self, path: &Path) -> Result<MediaId, PublishError>;

    /// Create a post with `text` and the uploaded media
    async fn create_post(&self, text: &str, media: &MediaId) -> Result<PostId, PublishError>;
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct UploadData {
    id: String,
    #[serde(default)]
    processing_info: Option<ProcessingInfo>,
}

#[derive(Debug, Clone, Deserialize)]
struct ProcessingInfo {
    state: String,
    #[serde(default)]
    check_after_secs: Option<u64>,
    #[serde(default)]
    error: Option<ProcessingError>,
}

#[derive(Debug, Clone, Deserialize)]
struct ProcessingError {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusData {
    #[serde(default)]
    processing_info: Option<ProcessingInfo>,
}

#[derive(Debug, Deserialize)]
struct PostData {
    id: String,
}

/// X API v2 client authenticated with a user-context bearer token
pub struct XClient {
    client: Client,
    config: SocialConfig,
}

impl XClient {
    /// Create a client with its own keep-alive connection pool
    pub fn new(config: SocialConfig, http: &HttpConfig) -> Result<Self, PublishError> {
        let client = http.build_client()?;
        Ok(Self::with_client(client, config))
    }

    /// Create a client on top of an existing HTTP client
    pub fn with_client(client: Client, config: SocialConfig) -> Self {
        Self { client, config }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base.trim_end_matches('/'), path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.bearer_auth(&self.config.access_token)
    }

    async fn initialize(&self, total_bytes: u64) -> Result<String, PublishError> {
        let response = self
            .authorized(self.client.post(self.url("2/media/upload/initialize")))
            .json(&json!({
                "media_type": "video/mp4",
                "media_category": "tweet_video",
                "total_bytes": total_bytes,
            }))
            .send()
            .await?;

        let body: Envelope<UploadData> = check_status(response).await?.json().await?;
        Ok(body.data.id)
    }

    async fn append(&self, media_id: &str, index: usize, segment: Vec<u8>) -> Result<(), PublishError> {
        let part = Part::bytes(segment)
            .file_name("segment")
            .mime_str("application/octet-stream")?;
        let form = Form::new()
            .text("segment_index", index.to_string())
            .part("media", part);

        let response = self
            .authorized(
                self.client
                    .post(self.url(&format!("2/media/upload/{media_id}/append"))),
            )
            .multipart(form)
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }

    async fn finalize(&self, media_id: &str) -> Result<Option<ProcessingInfo>, PublishError> {
        let response = self
            .authorized(
                self.client
                    .post(self.url(&format!("2/media/upload/{media_id}/finalize"))),
            )
            .send()
            .await?;

        let body: Envelope<UploadData> = check_status(response).await?.json().await?;
        Ok(body.data.processing_info)
    }

    async fn status(&self, media_id: &str) -> Result<Option<ProcessingInfo>, PublishError> {
        let response = self
            .authorized(self.client.get(self.url("2/media/upload")))
            .query(&[("command", "STATUS"), ("media_id", media_id)])
            .send()
            .await?;

        let body: Envelope<StatusData> = check_status(response).await?.json().await?;
        Ok(body.data.processing_info)
    }

    /// Poll until the server finishes transcoding the uploaded media
    async fn await_processing(
        &self,
        media_id: &str,
        mut info: Option<ProcessingInfo>,
    ) -> Result<(), PublishError> {
        let mut polls = 0;

        while let Some(current) = info {
            match current.state.as_str() {
                "succeeded" => return Ok(()),
                "failed" => {
                    let message = current
                        .error
                        .and_then(|e| e.message)
                        .unwrap_or_else(|| "unknown processing error".to_string());
                    return Err(PublishError::MediaProcessing(message));
                }
                state => {
                    if polls >= self.config.max_status_polls {
                        return Err(PublishError::MediaProcessing(format!(
                            "still {state} after {polls} status checks"
                        )));
                    }
                    polls += 1;
                    let wait = current.check_after_secs.unwrap_or(1);
                    tracing::debug!(media_id = %media_id, state = %state, wait_secs = wait, "Media processing");
                    tokio::time::sleep(Duration::from_secs(wait)).await;
                    info = self.status(media_id).await?;
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl SocialClient for XClient {
    async fn upload_media(&self, path: &Path) -> Result<MediaId, PublishError> {
        let mut file = File::open(path)
            .await
            .map_err(|e| PublishError::io(path, e))?;
        let total_bytes = file
            .metadata()
            .await
            .map_err(|e| PublishError::io(path, e))?
            .len();

        let media_id = self.initialize(total_bytes).await?;
        let chunk_size = self.config.chunk_size_bytes.max(1);

        let mut index = 0;
        loop {
            let segment = read_segment(&mut file, chunk_size)
                .await
                .map_err(|e| PublishError::io(path, e))?;
            if segment.is_empty() {
                break;
            }
            self.append(&media_id, index, segment).await?;
            index += 1;
        }

        tracing::debug!(media_id = %media_id, segments = index, "Media segments uploaded");

        let info = self.finalize(&media_id).await?;
        self.await_processing(&media_id, info).await?;

        Ok(MediaId(media_id))
    }

    async fn create_post(&self, text: &str, media: &MediaId) -> Result<PostId, PublishError> {
        let response = self
            .authorized(self.client.post(self.url("2/tweets")))
            .json(&json!({
                "text": text,
                "media": { "media_ids": [media.0] },
            }))
            .send()
            .await?;

        let body: Envelope<PostData> = check_status(response).await?.json().await?;
        if body.data.id.is_empty() {
            return Err(PublishError::UnexpectedResponse(
                "post created without an id".to_string(),
            ));
        }
        Ok(PostId(body.data.id))
    }
}

/// Read up to `size` bytes, returning fewer only at end of file
async fn read_segment(file: &mut File, size: usize) -> std::io::Result<Vec<u8>> {
    let mut buf = vec![0u8; size];
    let mut filled = 0;
    while filled < size {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buf.truncate(filled);
    Ok(buf)
}

/// Map non-success statuses onto the error taxonomy
async fn check_status(response: Response) -> Result<Response, PublishError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::UNAUTHORIZED {
        return Err(PublishError::Unauthorized(status.as_u16()));
    }

    if status.is_server_error() {
        return Err(PublishError::ServerError(status.as_u16()));
    }

    let body = response.text().await.unwrap_or_default();
    Err(PublishError::Rejected {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_finalize_response() {
        let json = r#"{"data": {"id": "1880028106020515840", "media_key": "7_1880028106020515840",
            "processing_info": {"state": "pending", "check_after_secs": 1}}}"#;
        let body: Envelope<UploadData> = serde_json::from_str(json).unwrap();
        assert_eq!(body.data.id, "1880028106020515840");
        let info = body.data.processing_info.unwrap();
        assert_eq!(info.state, "pending");
        assert_eq!(info.check_after_secs, Some(1));
    }

    #[test]
    fn test_parse_status_failure() {
        let json = r#"{"data": {"processing_info": {"state": "failed",
            "error": {"code": 1, "name": "InvalidMedia", "message": "Unsupported codec"}}}}"#;
        let body: Envelope<StatusData> = serde_json::from_str(json).unwrap();
        let info = body.data.processing_info.unwrap();
        assert_eq!(info.error.unwrap().message.as_deref(), Some("Unsupported codec"));
    }

    #[tokio::test]
    async fn test_read_segment_splits_file() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&[7u8; 10]).unwrap();

        let mut file = File::open(tmp.path()).await.unwrap();
        assert_eq!(read_segment(&mut file, 4).await.unwrap().len(), 4);
        assert_eq!(read_segment(&mut file, 4).await.unwrap().len(), 4);
        assert_eq!(read_segment(&mut file, 4).await.unwrap().len(), 2);
        assert!(read_segment(&mut file, 4).await.unwrap().is_empty());
    }

    #[test]
    fn test_ids_display() {
        assert_eq!(MediaId("m1".into()).to_string(), "m1");
        assert_eq!(PostId("p1".into()).to_string(), "p1");
    }
}
