//! REST clients for platforms that expose comments over an HTTP API.
//!
//! Each client is bound to one target (a post, a video) and pages through
//! the platform's endpoint, mapping every item into a [`CreateComment`].

pub mod vk;
pub mod youtube;

pub use vk::VkClient;
pub use youtube::{extract_video_id, YoutubeClient};

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ClientResult;
use crate::types::CreateComment;

/// Pause between consecutive page requests.
pub const DEFAULT_REQUEST_PAUSE: Duration = Duration::from_millis(350);

/// A paginated source of comments for one target.
#[async_trait]
pub trait CommentSource: Send + Sync {
    /// Fetch up to `max_comments` comments (all of them when `None`).
    async fn fetch_comments(&self, max_comments: Option<usize>) -> ClientResult<Vec<CreateComment>>;
}

/// Build the shared HTTP client for platform APIs.
pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

pub(crate) async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}
