//! Common test utilities

use serde_json::{json, Value};

use cliprelay::config::{SocialConfig, UpstreamConfig};
use cliprelay::models::Clip;
use cliprelay::utils::retry::RetryConfig;

/// Create a clip whose thumbnail points at `base`
#[allow(dead_code)]
pub fn create_clip(base: &str, id: &str, views: u64) -> Clip {
    Clip {
        id: id.to_string(),
        title: format!("Clip {id}"),
        views,
        thumbnail_url: format!("{base}/media/{id}-preview-480x272.jpg"),
        broadcaster_name: "xqc".to_string(),
        created_at: None,
    }
}

/// Upstream clip payload as the listing API returns it
#[allow(dead_code)]
pub fn clip_json(base: &str, id: &str, views: u64) -> Value {
    json!({
        "id": id,
        "url": format!("https://clips.twitch.tv/{id}"),
        "broadcaster_id": "71092938",
        "broadcaster_name": "xQc",
        "title": format!("Clip {id}"),
        "view_count": views,
        "created_at": "2024-05-01T12:00:00Z",
        "thumbnail_url": format!("{base}/media/{id}-preview-480x272.jpg"),
    })
}

/// Retry policy with millisecond delays so retry tests stay fast
#[allow(dead_code)]
pub fn fast_retry() -> RetryConfig {
    RetryConfig::with_delays(3, 5, 20)
}

/// Upstream settings pointing at a mock server
#[allow(dead_code)]
pub fn upstream_config(base: &str) -> UpstreamConfig {
    UpstreamConfig {
        client_id: "client-id".to_string(),
        client_secret: "client-secret".to_string(),
        api_base: format!("{base}/helix"),
        auth_base: base.to_string(),
        ..Default::default()
    }
}

/// Social settings pointing at a mock server
#[allow(dead_code)]
pub fn social_config(base: &str) -> SocialConfig {
    SocialConfig {
        access_token: "user-token".to_string(),
        api_base: base.to_string(),
        chunk_size_bytes: 4,
        max_status_polls: 3,
        ..Default::default()
    }
}
