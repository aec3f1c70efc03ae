//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Minimum pause between feed page requests.
pub const MIN_PAGE_DELAY_MS: u64 = 500;

/// Minimum pause between two outbound deliveries.
pub const MIN_SEND_DELAY_MS: u64 = 2_000;

/// Root application configuration.
///
/// Built once at startup and treated as immutable afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Source account credentials and the timeline to follow
    #[serde(default)]
    pub account: AccountConfig,

    /// Feed source (XRPC) behavior
    #[serde(default)]
    pub source: SourceConfig,

    /// Outbound delivery settings
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Poll loop scheduling
    #[serde(default)]
    pub poll: PollConfig,

    /// Persisted state location
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    ///
    /// A missing file is the normal case for environment-only setups and is
    /// only reported at debug level.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            log::debug!("No config file at {:?}; using defaults", path);
            return Self::default();
        }
        Self::load(path).unwrap_or_else(|e| {
            log::warn!("Config load failed from {:?}: {}. Using defaults.", path, e);
            Self::default()
        })
    }

    /// Apply `SKYRELAY_*` overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides resolved through `lookup`.
    ///
    /// Empty values are ignored so an exported-but-blank variable does not
    /// wipe a value from the file.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(env::IDENTIFIER) {
            self.account.identifier = v;
        }
        if let Some(v) = get(env::PASSWORD) {
            self.account.password = v;
        }
        if let Some(v) = get(env::ACTOR) {
            self.account.actor = Some(v);
        }
        if let Some(v) = get(env::WEBHOOK_URL) {
            self.delivery.webhook_url = Some(v);
        }
        if let Some(v) = get(env::STATE_FILE) {
            self.storage.state_file = PathBuf::from(v);
        }
        if let Some(v) = get(env::POLL_INTERVAL_SECS) {
            match v.trim().parse() {
                Ok(secs) => self.poll.interval_secs = secs,
                Err(_) => log::warn!("Ignoring invalid {}: {}", env::POLL_INTERVAL_SECS, v),
            }
        }
    }

    /// Validate configuration values for basic sanity.
    ///
    /// Credentials are only required when `needs_credentials` is set, so
    /// commands that never contact the source can run without them.
    pub fn validate(&self, needs_credentials: bool) -> Result<()> {
        if needs_credentials {
            if self.account.identifier.trim().is_empty() {
                return Err(AppError::validation(format!(
                    "account.identifier is empty (set it or {})",
                    env::IDENTIFIER
                )));
            }
            if self.account.password.is_empty() {
                return Err(AppError::validation(format!(
                    "account.password is empty (set it or {})",
                    env::PASSWORD
                )));
            }
        }
        url::Url::parse(&self.source.service_url)
            .map_err(|e| AppError::validation(format!("source.service_url: {e}")))?;
        url::Url::parse(&self.source.viewer_url)
            .map_err(|e| AppError::validation(format!("source.viewer_url: {e}")))?;
        if !(1..=100).contains(&self.source.page_size) {
            return Err(AppError::validation("source.page_size must be in 1..=100"));
        }
        if self.source.page_delay_ms < MIN_PAGE_DELAY_MS {
            return Err(AppError::validation(format!(
                "source.page_delay_ms must be >= {MIN_PAGE_DELAY_MS}"
            )));
        }
        if self.source.timeout_secs == 0 {
            return Err(AppError::validation("source.timeout_secs must be > 0"));
        }
        if self.source.user_agent.trim().is_empty() {
            return Err(AppError::validation("source.user_agent is empty"));
        }
        if self.delivery.send_delay_ms < MIN_SEND_DELAY_MS {
            return Err(AppError::validation(format!(
                "delivery.send_delay_ms must be >= {MIN_SEND_DELAY_MS}"
            )));
        }
        if let Some(webhook) = self.delivery.webhook_url.as_deref() {
            let parsed = url::Url::parse(webhook)
                .map_err(|e| AppError::validation(format!("delivery.webhook_url: {e}")))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(AppError::validation(
                    "delivery.webhook_url must be http(s)",
                ));
            }
        }
        if self.poll.interval_secs == 0 {
            return Err(AppError::validation("poll.interval_secs must be > 0"));
        }
        if self.storage.state_file.as_os_str().is_empty() {
            return Err(AppError::validation("storage.state_file is empty"));
        }
        Ok(())
    }
}

/// Environment variable names for overrides.
pub mod env {
    pub const IDENTIFIER: &str = "SKYRELAY_IDENTIFIER";
    pub const PASSWORD: &str = "SKYRELAY_PASSWORD";
    pub const ACTOR: &str = "SKYRELAY_ACTOR";
    pub const WEBHOOK_URL: &str = "SKYRELAY_WEBHOOK_URL";
    pub const STATE_FILE: &str = "SKYRELAY_STATE_FILE";
    pub const POLL_INTERVAL_SECS: &str = "SKYRELAY_POLL_INTERVAL_SECS";
}

/// Source account settings.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Login identifier (handle or email)
    #[serde(default)]
    pub identifier: String,

    /// App password
    #[serde(default)]
    pub password: String,

    /// Timeline to follow; defaults to the logged-in account
    #[serde(default)]
    pub actor: Option<String>,
}

impl std::fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountConfig")
            .field("identifier", &self.identifier)
            .field("password", &"<redacted>")
            .field("actor", &self.actor)
            .finish()
    }
}

/// Feed source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// XRPC service (PDS or entryway) base URL
    #[serde(default = "defaults::service_url")]
    pub service_url: String,

    /// Web viewer base URL used to build post and profile links
    #[serde(default = "defaults::viewer_url")]
    pub viewer_url: String,

    /// Posts requested per page
    #[serde(default = "defaults::page_size")]
    pub page_size: u32,

    /// Delay between page requests in milliseconds
    #[serde(default = "defaults::page_delay")]
    pub page_delay_ms: u64,

    /// Extra attempts for a failing page before the cycle is abandoned
    #[serde(default = "defaults::page_retries")]
    pub page_retries: u8,

    /// Author feed filter passed to the source
    #[serde(default = "defaults::feed_filter")]
    pub feed_filter: String,

    /// Relay reposts as well as original posts
    #[serde(default)]
    pub include_reposts: bool,

    /// Maximum pages per cycle (0 = follow the timeline to its end)
    #[serde(default)]
    pub max_pages: usize,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,
}

impl SourceConfig {
    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn max_pages(&self) -> Option<usize> {
        (self.max_pages > 0).then_some(self.max_pages)
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            service_url: defaults::service_url(),
            viewer_url: defaults::viewer_url(),
            page_size: defaults::page_size(),
            page_delay_ms: defaults::page_delay(),
            page_retries: defaults::page_retries(),
            feed_filter: defaults::feed_filter(),
            include_reposts: false,
            max_pages: 0,
            timeout_secs: defaults::timeout(),
            user_agent: defaults::user_agent(),
        }
    }
}

/// Outbound delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Webhook target; when absent posts are printed to the console instead
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Delay between deliveries in milliseconds
    #[serde(default = "defaults::send_delay")]
    pub send_delay_ms: u64,

    /// Extra attempts for a failing webhook request
    #[serde(default)]
    pub retries: u8,

    /// Username shown for webhook messages
    #[serde(default)]
    pub username: Option<String>,
}

impl DeliveryConfig {
    pub fn send_delay(&self) -> Duration {
        Duration::from_millis(self.send_delay_ms)
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            send_delay_ms: defaults::send_delay(),
            retries: 0,
            username: None,
        }
    }
}

/// Poll loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Sleep between cycles in seconds
    #[serde(default = "defaults::interval")]
    pub interval_secs: u64,
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: defaults::interval(),
        }
    }
}

/// Persisted state settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// File holding the `last_sent_at` watermark
    #[serde(default = "defaults::state_file")]
    pub state_file: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_file: defaults::state_file(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Source defaults
    pub fn service_url() -> String {
        "https://bsky.social".into()
    }
    pub fn viewer_url() -> String {
        "https://bsky.app".into()
    }
    pub fn page_size() -> u32 {
        30
    }
    pub fn page_delay() -> u64 {
        1_000
    }
    pub fn page_retries() -> u8 {
        2
    }
    pub fn feed_filter() -> String {
        "posts_and_author_threads".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn user_agent() -> String {
        concat!("skyrelay/", env!("CARGO_PKG_VERSION")).into()
    }

    // Delivery defaults
    pub fn send_delay() -> u64 {
        2_000
    }

    // Poll defaults
    pub fn interval() -> u64 {
        300
    }

    // Storage defaults
    pub fn state_file() -> PathBuf {
        PathBuf::from("last_sent_at.txt")
    }
}
