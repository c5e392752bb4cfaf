//! Configuration management for cliprelay
//!
//! Settings come from a TOML file, then environment variables are applied on
//! top. Credentials are normally supplied only through the environment.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::scheduler::schedule::CronSchedule;
use crate::utils::retry::RetryConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Local storage layout
    pub storage: StorageConfig,

    /// Outbound HTTP settings shared by every client
    pub http: HttpConfig,

    /// Download retry policy
    pub download: DownloadConfig,

    /// Upstream clip-listing API
    pub upstream: UpstreamConfig,

    /// Social-media publish API
    pub social: SocialConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Tracked sources
    pub sources: Vec<SourceConfig>,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory for `vids/` and the ledger
    pub root: PathBuf,

    /// One ledger for every source (true) or one per source (false)
    pub shared_ledger: bool,
}

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Upper bound for every outbound request, in seconds
    pub timeout_secs: u64,

    /// How long idle keep-alive connections stay pooled, in seconds
    pub pool_idle_timeout_secs: u64,

    /// User agent string
    pub user_agent: String,
}

/// Download retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Retries after the first attempt
    pub max_retries: u32,

    /// Base delay for exponential backoff
    pub base_delay_ms: u64,

    /// Cap for the backoff delay
    pub max_delay_ms: u64,
}

/// Upstream clip API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub client_id: String,

    pub client_secret: String,

    /// Helix API base URL
    pub api_base: String,

    /// OAuth server base URL
    pub auth_base: String,

    /// Length of the trailing window queried for clips
    pub window_hours: u32,

    /// Clips requested per page
    pub page_size: u32,

    /// Maximum pages followed per listing
    pub max_pages: u32,
}

/// Social-media publish API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SocialConfig {
    /// OAuth 2.0 user-context access token
    pub access_token: String,

    /// API base URL (media upload and posts)
    pub api_base: String,

    /// Size of each media upload segment
    pub chunk_size_bytes: usize,

    /// Post text is truncated to this many characters
    pub max_post_chars: usize,

    /// How many times media processing status is polled before giving up
    pub max_status_polls: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

/// One tracked source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Channel login name
    pub name: String,

    /// When to look for new clips
    #[serde(default = "default_fetch_schedule")]
    pub fetch_schedule: CronSchedule,

    /// When to publish (one item per firing)
    #[serde(default = "default_publish_schedules")]
    pub publish_schedules: Vec<CronSchedule>,

    /// Candidates downloaded per fetch window
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
}

fn default_fetch_schedule() -> CronSchedule {
    CronSchedule::parse("0 * * * *").expect("valid default fetch schedule")
}

fn default_publish_schedules() -> Vec<CronSchedule> {
    vec![CronSchedule::parse("30 * * * *").expect("valid default publish schedule")]
}

fn default_max_candidates() -> usize {
    1
}

impl SourceConfig {
    /// Source with the default hourly fetch and publish windows
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fetch_schedule: default_fetch_schedule(),
            publish_schedules: default_publish_schedules(),
            max_candidates: default_max_candidates(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            shared_ledger: true,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 360,
            pool_idle_timeout_secs: 90,
            user_agent: format!("cliprelay/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        let retry = RetryConfig::default();
        Self {
            max_retries: retry.max_retries,
            base_delay_ms: retry.base_delay_ms,
            max_delay_ms: retry.max_delay_ms,
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            api_base: String::from("https://api.twitch.tv/helix"),
            auth_base: String::from("https://id.twitch.tv"),
            window_hours: 24,
            page_size: 100,
            max_pages: 5,
        }
    }
}

impl Default for SocialConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            api_base: String::from("https://api.x.com"),
            chunk_size_bytes: 4 * 1024 * 1024,
            max_post_chars: 280,
            max_status_polls: 30,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load the file if it exists, apply the environment, and validate
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            Self::default()
        };

        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay environment variables onto this configuration
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(v) = std::env::var("TWITCH_CLIENT_ID") {
            self.upstream.client_id = v;
        }
        if let Ok(v) = std::env::var("TWITCH_CLIENT_SECRET") {
            self.upstream.client_secret = v;
        }
        if let Ok(v) = std::env::var("SOCIAL_ACCESS_TOKEN") {
            self.social.access_token = v;
        }
        if let Ok(v) = std::env::var("CLIPRELAY_ROOT") {
            self.storage.root = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("CLIPRELAY_HTTP_TIMEOUT") {
            self.http.timeout_secs = v
                .parse()
                .with_context(|| format!("CLIPRELAY_HTTP_TIMEOUT is not a number: {v}"))?;
        }
        if let Ok(v) = std::env::var("CLIPRELAY_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Ok(v) = std::env::var("CLIPRELAY_LOG_FORMAT") {
            self.logging.format = v;
        }

        // Comma-separated logins, added with default schedules
        if let Ok(v) = std::env::var("CLIPRELAY_SOURCES") {
            for name in v.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                if !self.sources.iter().any(|s| s.name == name) {
                    self.sources.push(SourceConfig::with_defaults(name));
                }
            }
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            anyhow::bail!("at least one source must be configured");
        }

        let mut names = HashSet::new();
        for source in &self.sources {
            if source.name.trim().is_empty() {
                anyhow::bail!("source name must not be empty");
            }
            if !names.insert(source.name.as_str()) {
                anyhow::bail!("duplicate source name: {}", source.name);
            }
            if source.max_candidates == 0 {
                anyhow::bail!("max_candidates must be greater than 0 for {}", source.name);
            }
            if source.publish_schedules.is_empty() {
                anyhow::bail!("{} needs at least one publish schedule", source.name);
            }
        }

        if self.http.timeout_secs == 0 {
            anyhow::bail!("http.timeout_secs must be greater than 0");
        }

        if self.upstream.window_hours == 0 {
            anyhow::bail!("upstream.window_hours must be greater than 0");
        }

        if self.upstream.page_size == 0 || self.upstream.page_size > 100 {
            anyhow::bail!("upstream.page_size must be between 1 and 100");
        }

        if self.upstream.max_pages == 0 {
            anyhow::bail!("upstream.max_pages must be greater than 0");
        }

        for (key, value) in [
            ("upstream.api_base", &self.upstream.api_base),
            ("upstream.auth_base", &self.upstream.auth_base),
            ("social.api_base", &self.social.api_base),
        ] {
            let parsed = url::Url::parse(value)
                .with_context(|| format!("{key} is not a valid URL: {value}"))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                anyhow::bail!("{key} must be an http(s) URL: {value}");
            }
        }

        if self.social.chunk_size_bytes == 0 {
            anyhow::bail!("social.chunk_size_bytes must be greater than 0");
        }

        if self.social.max_post_chars == 0 {
            anyhow::bail!("social.max_post_chars must be greater than 0");
        }

        Ok(())
    }

    /// Warn about credentials a live run needs
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.upstream.client_id.is_empty() {
            missing.push("TWITCH_CLIENT_ID");
        }
        if self.upstream.client_secret.is_empty() {
            missing.push("TWITCH_CLIENT_SECRET");
        }
        if self.social.access_token.is_empty() {
            missing.push("SOCIAL_ACCESS_TOKEN");
        }
        missing
    }

    /// Find a source by name
    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.name == name)
    }
}

impl HttpConfig {
    /// Get request timeout as Duration
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Build a keep-alive client with the configured timeout
    pub fn build_client(&self) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.timeout())
            .pool_idle_timeout(Duration::from_secs(self.pool_idle_timeout_secs))
            .tcp_keepalive(Duration::from_secs(60))
            .user_agent(&self.user_agent)
            .build()
    }
}

impl DownloadConfig {
    pub fn retry(&self) -> RetryConfig {
        RetryConfig::with_delays(self.max_retries, self.base_delay_ms, self.max_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_source() -> Config {
        Config {
            sources: vec![SourceConfig::with_defaults("xqc")],
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config_with_source_is_valid() {
        assert!(with_source().validate().is_ok());
    }

    #[test]
    fn test_no_sources_is_invalid() {
        assert!(Config::default().validate().is_err());
    }

    #[test]
    fn test_duplicate_source_names() {
        let mut config = with_source();
        config.sources.push(SourceConfig::with_defaults("xqc"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_candidates_is_invalid() {
        let mut config = with_source();
        config.sources[0].max_candidates = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_request_timeout_conversion() {
        let config = Config::default();
        assert_eq!(config.http.timeout(), Duration::from_secs(360));
    }

    #[test]
    fn test_download_retry_defaults() {
        let retry = DownloadConfig::default().retry();
        assert_eq!(retry.max_retries, 3);
        assert_eq!(retry.base_delay_ms, 1000);
    }

    #[test]
    fn test_parse_toml_sources() {
        let toml = r#"
            [storage]
            root = "/srv/relay"
            shared_ledger = false

            [[sources]]
            name = "xqc"
            fetch_schedule = "0 */2 * * *"
            publish_schedules = ["15 9 * * *", "15 18 * * *"]
            max_candidates = 3

            [[sources]]
            name = "shroud"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.storage.root, PathBuf::from("/srv/relay"));
        assert!(!config.storage.shared_ledger);
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].publish_schedules.len(), 2);
        assert_eq!(config.sources[0].max_candidates, 3);
        assert_eq!(config.sources[1].max_candidates, 1);
        assert_eq!(config.sources[1].fetch_schedule.expression(), "0 * * * *");
        assert_eq!(config.upstream.window_hours, 24);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_base_url() {
        let mut config = with_source();
        config.social.api_base = "not a url".to_string();
        assert!(config.validate().is_err());

        config.social.api_base = "ftp://api.x.com".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_schedule_fails_to_parse() {
        let toml = r#"
            [[sources]]
            name = "xqc"
            fetch_schedule = "every hour"
        "#;
        assert!(toml::from_str::<Config>(toml).is_err());
    }
}
