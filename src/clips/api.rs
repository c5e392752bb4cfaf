//! Upstream clip-listing API client
//!
//! Talks to a Helix-style API: an app access token from a client-credentials
//! exchange, a user lookup to turn a login into a broadcaster id, and a
//! paginated clip listing for a time window.
//!
//! Each client caches its own token. An HTTP 401 from the API, or a token
//! past its advertised lifetime, triggers exactly one refresh; if that
//! refresh fails or the replayed request is refused again the call fails
//! with [`FetchError::Auth`] and the cycle is abandoned.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::config::{HttpConfig, UpstreamConfig};
use crate::models::Clip;
use crate::utils::error::FetchError;

/// Tokens are refreshed this long before their advertised expiry
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Source of candidate clips
#[async_trait]
pub trait ClipApi: Send + Sync {
    /// Look up the broadcaster id for a channel login
    async fn resolve_broadcaster_id(&self, login: &str) -> Result<String, FetchError>;

    /// List clips created in `[started_at, ended_at]`, in upstream order
    async fn list_clips(
        &self,
        broadcaster_id: &str,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
    ) -> Result<Vec<Clip>, FetchError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct DataResponse<T> {
    data: Vec<T>,
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Debug, Default, Deserialize)]
struct Pagination {
    #[serde(default)]
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct User {
    id: String,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Option<Instant>,
}

impl CachedToken {
    fn is_expired(&self) -> bool {
        self.expires_at
            .map(|at| Instant::now() + EXPIRY_MARGIN >= at)
            .unwrap_or(false)
    }
}

/// Twitch Helix client with its own cached app token
pub struct TwitchClient {
    client: Client,
    config: UpstreamConfig,
    token: Mutex<Option<CachedToken>>,
}

impl TwitchClient {
    /// Create a client with its own keep-alive connection pool
    pub fn new(config: UpstreamConfig, http: &HttpConfig) -> Result<Self, FetchError> {
        let client = http.build_client()?;
        Ok(Self::with_client(client, config))
    }

    /// Create a client on top of an existing HTTP client
    pub fn with_client(client: Client, config: UpstreamConfig) -> Self {
        Self {
            client,
            config,
            token: Mutex::new(None),
        }
    }

    /// Exchange client credentials for a fresh app token
    async fn request_token(&self) -> Result<CachedToken, FetchError> {
        let url = format!("{}/oauth2/token", self.config.auth_base.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await
            .map_err(|e| FetchError::Auth(format!("token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Auth(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Auth(format!("malformed token response: {e}")))?;

        tracing::debug!(expires_in = ?token.expires_in, "Obtained app access token");

        Ok(CachedToken {
            value: token.access_token,
            expires_at: token
                .expires_in
                .map(|secs| Instant::now() + Duration::from_secs(secs)),
        })
    }

    /// Current token, fetching one if none is cached or it has expired
    async fn current_token(&self) -> Result<String, FetchError> {
        let mut guard = self.token.lock().await;
        match guard.as_ref() {
            Some(token) if !token.is_expired() => Ok(token.value.clone()),
            _ => {
                let token = self.request_token().await?;
                let value = token.value.clone();
                *guard = Some(token);
                Ok(value)
            }
        }
    }

    /// Replace the cached token after the API rejected `stale`
    async fn refresh_token(&self, stale: &str) -> Result<String, FetchError> {
        let mut guard = self.token.lock().await;

        // Another request may already have refreshed it
        if let Some(token) = guard.as_ref() {
            if token.value != stale && !token.is_expired() {
                return Ok(token.value.clone());
            }
        }

        *guard = None;
        let token = self.request_token().await?;
        let value = token.value.clone();
        *guard = Some(token);
        tracing::info!("Refreshed app access token");
        Ok(value)
    }

    fn authorized(&self, builder: RequestBuilder, token: &str) -> RequestBuilder {
        builder
            .header("Client-Id", &self.config.client_id)
            .bearer_auth(token)
    }

    /// GET with auth, refreshing the token once on 401
    async fn get_authorized(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Response, FetchError> {
        let url = format!("{}/{}", self.config.api_base.trim_end_matches('/'), path);

        let token = self.current_token().await?;
        let response = self
            .authorized(self.client.get(&url).query(query), &token)
            .send()
            .await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return check_status(response).await;
        }

        tracing::warn!(url = %url, "Access token rejected, refreshing once");
        let token = self.refresh_token(&token).await?;

        let response = self
            .authorized(self.client.get(&url).query(query), &token)
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(FetchError::Auth(
                "request refused after token refresh".to_string(),
            ));
        }

        check_status(response).await
    }
}

/// Map non-success statuses onto the error taxonomy
async fn check_status(response: Response) -> Result<Response, FetchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status.is_server_error() {
        return Err(FetchError::ServerError(status.as_u16()));
    }

    let body = response.text().await.unwrap_or_default();
    Err(FetchError::Rejected {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl ClipApi for TwitchClient {
    async fn resolve_broadcaster_id(&self, login: &str) -> Result<String, FetchError> {
        let response = self
            .get_authorized("users", &[("login", login.to_string())])
            .await?;

        let users: DataResponse<User> = response.json().await?;

        users
            .data
            .into_iter()
            .next()
            .map(|u| u.id)
            .ok_or_else(|| FetchError::UnknownBroadcaster(login.to_string()))
    }

    async fn list_clips(
        &self,
        broadcaster_id: &str,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
    ) -> Result<Vec<Clip>, FetchError> {
        let mut clips = Vec::new();
        let mut cursor: Option<String> = None;

        for page in 0..self.config.max_pages {
            let mut query = vec![
                ("broadcaster_id", broadcaster_id.to_string()),
                (
                    "started_at",
                    started_at.to_rfc3339_opts(SecondsFormat::Secs, true),
                ),
                (
                    "ended_at",
                    ended_at.to_rfc3339_opts(SecondsFormat::Secs, true),
                ),
                ("first", self.config.page_size.to_string()),
            ];
            if let Some(after) = &cursor {
                query.push(("after", after.clone()));
            }

            let response = self.get_authorized("clips", &query).await?;
            let body: DataResponse<Clip> = response.json().await?;

            tracing::debug!(
                broadcaster_id = %broadcaster_id,
                page = page,
                clips = body.data.len(),
                "Fetched clip page"
            );

            let page_was_empty = body.data.is_empty();
            clips.extend(body.data);

            cursor = body
                .pagination
                .and_then(|p| p.cursor)
                .filter(|c| !c.is_empty());

            if cursor.is_none() || page_was_empty {
                break;
            }
        }

        Ok(clips)
    }
}
