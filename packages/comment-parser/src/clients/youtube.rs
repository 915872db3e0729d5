//! YouTube Data API v3 `commentThreads` client.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use super::{http_client, pause, CommentSource, DEFAULT_REQUEST_PAUSE};
use crate::error::{ClientError, ClientResult};
use crate::types::{CreateComment, Platform};

const API_URL: &str = "https://www.googleapis.com/youtube/v3/commentThreads";
const MAX_PAGE_SIZE: usize = 100;

/// Video id (11 characters after `v=` or a path separator) from a video URL.
pub fn extract_video_id(url: &str) -> Option<String> {
    let from_query = Url::parse(url).ok().and_then(|parsed| {
        parsed
            .query_pairs()
            .find(|(key, _)| key == "v")
            .map(|(_, value)| value.into_owned())
    });
    if let Some(id) = from_query.filter(|id| is_video_id(id)) {
        return Some(id);
    }

    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"(?:v=|/)([0-9A-Za-z_-]{11})").expect("video id pattern is valid")
    });
    pattern
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn is_video_id(candidate: &str) -> bool {
    candidate.len() == 11
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    #[serde(default)]
    items: Vec<Thread>,
    next_page_token: Option<String>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Thread {
    snippet: ThreadSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreadSnippet {
    top_level_comment: TopLevelComment,
}

#[derive(Debug, Deserialize)]
struct TopLevelComment {
    snippet: CommentSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentSnippet {
    #[serde(default)]
    text_display: String,
    author_display_name: Option<String>,
    #[serde(default)]
    published_at: String,
    #[serde(default)]
    like_count: u64,
}

/// Top-level comment threads of one video, ordered by relevance.
pub struct YoutubeClient {
    client: reqwest::Client,
    api_key: String,
    video_id: String,
    request_pause: Duration,
}

impl YoutubeClient {
    pub fn new(api_key: impl Into<String>, video_id: impl Into<String>) -> Self {
        Self {
            client: http_client(),
            api_key: api_key.into(),
            video_id: video_id.into(),
            request_pause: DEFAULT_REQUEST_PAUSE,
        }
    }

    pub fn with_request_pause(mut self, pause: Duration) -> Self {
        self.request_pause = pause;
        self
    }

    async fn fetch_page(&self, page_size: usize, page_token: Option<&str>) -> ClientResult<Envelope> {
        let page_size = page_size.to_string();
        let mut query = vec![
            ("part", "snippet"),
            ("videoId", self.video_id.as_str()),
            ("key", self.api_key.as_str()),
            ("maxResults", page_size.as_str()),
            ("order", "relevance"),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }

        // Error payloads arrive with a 4xx status; decode them rather than
        // failing on the status alone.
        let body = self
            .client
            .get(API_URL)
            .query(&query)
            .send()
            .await?
            .text()
            .await?;
        let envelope = decode(&body)?;
        if let Some(error) = &envelope.error {
            return Err(ClientError::Api {
                platform: "youtube",
                message: error.message.clone(),
            });
        }
        Ok(envelope)
    }
}

#[async_trait]
impl CommentSource for YoutubeClient {
    async fn fetch_comments(&self, max_comments: Option<usize>) -> ClientResult<Vec<CreateComment>> {
        let url = watch_url(&self.video_id);
        let mut comments = Vec::new();
        let mut page_token: Option<String> = None;

        info!(video_id = %self.video_id, "Fetching YouTube comments");
        loop {
            let remaining = max_comments.map(|max| max.saturating_sub(comments.len()));
            if remaining == Some(0) {
                break;
            }
            if page_token.is_some() {
                pause(self.request_pause).await;
            }

            let page_size = remaining.unwrap_or(MAX_PAGE_SIZE).min(MAX_PAGE_SIZE);
            let envelope = self.fetch_page(page_size, page_token.as_deref()).await?;
            if envelope.items.is_empty() {
                break;
            }

            let mapped = map_threads(envelope.items, &url);
            debug!(page = mapped.len(), total = comments.len() + mapped.len(), "YouTube page fetched");
            comments.extend(mapped);
            if let Some(max) = max_comments {
                comments.truncate(max);
            }

            match envelope.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        info!(total = comments.len(), "YouTube comments collected");
        Ok(comments)
    }
}

/// Map threads to records, skipping blank comments.
fn map_threads(threads: Vec<Thread>, url: &str) -> Vec<CreateComment> {
    threads
        .into_iter()
        .map(|thread| thread.snippet.top_level_comment.snippet)
        .filter(|snippet| !snippet.text_display.trim().is_empty())
        .map(|snippet| {
            CreateComment::new(url, snippet.text_display, Platform::Youtube)
                .with_likes(snippet.like_count)
                .with_date(snippet.published_at)
                .with_author(
                    snippet
                        .author_display_name
                        .unwrap_or_else(|| "Unknown".to_string()),
                )
        })
        .collect()
}

fn decode(body: &str) -> ClientResult<Envelope> {
    serde_json::from_str(body).map_err(|e| ClientError::Decode {
        platform: "youtube",
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_video_id() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            extract_video_id("https://youtu.be/dQw4w9WgXcQ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?feature=share&v=a_b-c1d2e3f").as_deref(),
            Some("a_b-c1d2e3f")
        );
        assert_eq!(extract_video_id("not a video"), None);
    }

    #[test]
    fn test_threads_map_to_comments() {
        let envelope: Envelope = serde_json::from_value(json!({
            "items": [
                { "snippet": { "topLevelComment": { "snippet": {
                    "textDisplay": "Test YouTube comment",
                    "authorDisplayName": "TestUser",
                    "publishedAt": "2024-01-01T00:00:00Z",
                    "likeCount": 10
                } } } },
                { "snippet": { "topLevelComment": { "snippet": { "textDisplay": "   " } } } },
                { "snippet": { "topLevelComment": { "snippet": { "textDisplay": "anon" } } } }
            ],
            "nextPageToken": "abc"
        }))
        .unwrap();
        assert_eq!(envelope.next_page_token.as_deref(), Some("abc"));

        let comments = map_threads(envelope.items, &watch_url("dQw4w9WgXcQ"));
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].content, "Test YouTube comment");
        assert_eq!(comments[0].author, "TestUser");
        assert_eq!(comments[0].likes, 10);
        assert_eq!(comments[0].date, "2024-01-01T00:00:00Z");
        assert_eq!(comments[0].url, "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
        assert_eq!(comments[1].author, "Unknown");
    }

    #[test]
    fn test_error_payload_decodes() {
        let envelope: Envelope =
            serde_json::from_value(json!({ "error": { "message": "Invalid API key" } })).unwrap();
        assert!(envelope.items.is_empty());
        assert_eq!(envelope.error.unwrap().message, "Invalid API key");
    }
}
