use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::Platform;

/// Application settings: config file, then environment, then CLI overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub vk_token: Option<String>,
    pub youtube_api_key: Option<String>,
    pub webdriver_url: Option<String>,
    pub translate_url: Option<String>,
    pub store_path: Option<PathBuf>,
}

impl Config {
    pub const DEFAULT_STORE_PATH: &'static str = "comments_db.json";
    pub const DEFAULT_WEBDRIVER_URL: &'static str = "http://localhost:9515";

    /// Load `path` if it exists, then apply environment overrides.
    ///
    /// A missing file is silent; an unreadable or malformed one is logged and
    /// ignored.
    pub fn load(path: impl AsRef<Path>) -> Self {
        // Load .env file if present (development)
        let _ = dotenv();

        let mut config = Self::from_file(path.as_ref()).unwrap_or_default();
        config.apply_env();
        config
    }

    fn from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }
        let parsed = fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|text| serde_json::from_str::<Self>(&text).map_err(|e| e.to_string()));
        match parsed {
            Ok(config) => Some(config),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not load config file");
                None
            }
        }
    }

    fn apply_env(&mut self) {
        if let Ok(token) = env::var("VK_TOKEN") {
            self.vk_token = Some(token);
        }
        if let Ok(key) = env::var("YOUTUBE_API_KEY") {
            self.youtube_api_key = Some(key);
        }
        if let Ok(url) = env::var("WEBDRIVER_URL") {
            self.webdriver_url = Some(url);
        }
        if let Ok(url) = env::var("TRANSLATE_URL") {
            self.translate_url = Some(url);
        }
        if let Ok(path) = env::var("COMMENTS_DB") {
            self.store_path = Some(PathBuf::from(path));
        }
    }

    pub fn store_path(&self) -> PathBuf {
        self.store_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(Self::DEFAULT_STORE_PATH))
    }

    pub fn webdriver_url(&self) -> &str {
        self.webdriver_url
            .as_deref()
            .unwrap_or(Self::DEFAULT_WEBDRIVER_URL)
    }
}

/// Tuning and locators for one feed harvest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestConfig {
    pub platform: Platform,
    /// Pause after navigation before touching the page.
    pub initial_wait: Duration,
    /// Small scrolls issued up front to trigger the feed's lazy loading.
    pub nudge_count: u32,
    pub nudge_pixels: u32,
    pub nudge_pause: Duration,
    /// Bound on waiting for the feed container to appear.
    pub feed_timeout: Duration,
    /// Pause once the feed container is present.
    pub feed_settle: Duration,
    pub scroll_pause: Duration,
    pub slow_mode: bool,
    pub slow_mode_delta: Duration,
    /// Consecutive cycles without new comments before giving up.
    pub stall_limit: u32,
    pub max_comments: Option<usize>,
    pub feed_locator: String,
    pub thread_locator: String,
    pub disabled_locator: String,
    /// Lowercase phrases marking a "comments are turned off" banner.
    pub disabled_phrases: Vec<String>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            platform: Platform::Youtube,
            initial_wait: Duration::from_secs(4),
            nudge_count: 5,
            nudge_pixels: 400,
            nudge_pause: Duration::from_millis(300),
            feed_timeout: Duration::from_secs(30),
            feed_settle: Duration::from_secs(3),
            scroll_pause: Duration::from_secs(2),
            slow_mode: true,
            slow_mode_delta: Duration::from_secs(1),
            stall_limit: 3,
            max_comments: None,
            feed_locator: "ytd-comments".to_string(),
            thread_locator: "ytd-comment-thread-renderer".to_string(),
            disabled_locator: "ytd-message-renderer".to_string(),
            disabled_phrases: vec![
                "disabled".to_string(),
                "turned off".to_string(),
                "отключен".to_string(),
            ],
        }
    }
}

impl HarvestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// No waits at all. For scripted sessions in tests.
    pub fn immediate() -> Self {
        Self {
            initial_wait: Duration::ZERO,
            nudge_pause: Duration::ZERO,
            feed_timeout: Duration::ZERO,
            feed_settle: Duration::ZERO,
            scroll_pause: Duration::ZERO,
            slow_mode: false,
            ..Self::default()
        }
    }

    /// Zero means unbounded.
    pub fn with_max_comments(mut self, max: usize) -> Self {
        self.max_comments = (max > 0).then_some(max);
        self
    }

    pub fn with_scroll_pause(mut self, pause: Duration) -> Self {
        self.scroll_pause = pause;
        self
    }

    pub fn with_slow_mode(mut self, slow: bool) -> Self {
        self.slow_mode = slow;
        self
    }

    pub fn with_stall_limit(mut self, limit: u32) -> Self {
        self.stall_limit = limit;
        self
    }

    pub fn with_feed_timeout(mut self, timeout: Duration) -> Self {
        self.feed_timeout = timeout;
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Pause after each scroll, including the slow-mode delta.
    pub fn cycle_pause(&self) -> Duration {
        if self.slow_mode {
            self.scroll_pause + self.slow_mode_delta
        } else {
            self.scroll_pause
        }
    }

    pub fn is_disabled_message(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.disabled_phrases
            .iter()
            .any(|phrase| text.contains(phrase.as_str()))
    }
}
