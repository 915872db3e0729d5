//! VK `wall.getComments` client.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, TimeZone};
use serde::Deserialize;
use tracing::{debug, info};

use super::{http_client, pause, CommentSource, DEFAULT_REQUEST_PAUSE};
use crate::error::{ClientError, ClientResult};
use crate::types::{CreateComment, Platform};

const API_URL: &str = "https://api.vk.com/method/wall.getComments";
const API_VERSION: &str = "5.131";
const PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct Envelope {
    response: Option<Page>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error_msg: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Page {
    #[serde(default)]
    items: Vec<WallComment>,
}

#[derive(Debug, Clone, Deserialize)]
struct WallComment {
    from_id: Option<i64>,
    #[serde(default)]
    text: String,
    #[serde(default)]
    date: i64,
    likes: Option<Likes>,
}

#[derive(Debug, Clone, Deserialize)]
struct Likes {
    #[serde(default)]
    count: u64,
}

/// Comments of one wall post.
pub struct VkClient {
    client: reqwest::Client,
    token: String,
    owner_id: String,
    post_id: String,
    request_pause: Duration,
}

impl VkClient {
    pub fn new(
        token: impl Into<String>,
        owner_id: impl Into<String>,
        post_id: impl Into<String>,
    ) -> Self {
        Self {
            client: http_client(),
            token: token.into(),
            owner_id: owner_id.into(),
            post_id: post_id.into(),
            request_pause: DEFAULT_REQUEST_PAUSE,
        }
    }

    pub fn with_request_pause(mut self, pause: Duration) -> Self {
        self.request_pause = pause;
        self
    }

    pub fn post_url(&self) -> String {
        format!("https://vk.com/wall{}_{}", self.owner_id, self.post_id)
    }

    async fn fetch_page(&self, offset: usize) -> ClientResult<Vec<WallComment>> {
        let offset = offset.to_string();
        let count = PAGE_SIZE.to_string();
        let body = self
            .client
            .get(API_URL)
            .query(&[
                ("owner_id", self.owner_id.as_str()),
                ("post_id", self.post_id.as_str()),
                ("access_token", self.token.as_str()),
                ("v", API_VERSION),
                ("count", count.as_str()),
                ("offset", offset.as_str()),
                ("extended", "1"),
                ("fields", "first_name,last_name"),
            ])
            .send()
            .await?
            .text()
            .await?;
        let envelope = decode(&body)?;
        page_items(envelope)
    }
}

#[async_trait]
impl CommentSource for VkClient {
    async fn fetch_comments(&self, max_comments: Option<usize>) -> ClientResult<Vec<CreateComment>> {
        let post_url = self.post_url();
        let mut collected: Vec<WallComment> = Vec::new();
        let mut offset = 0;

        info!(owner_id = %self.owner_id, post_id = %self.post_id, "Fetching VK comments");
        loop {
            if offset > 0 {
                pause(self.request_pause).await;
            }
            let items = self.fetch_page(offset).await?;
            if items.is_empty() {
                break;
            }
            collected.extend(items);
            debug!(offset, collected = collected.len(), "VK page fetched");

            if let Some(max) = max_comments {
                if collected.len() >= max {
                    collected.truncate(max);
                    break;
                }
            }
            offset += PAGE_SIZE;
        }

        info!(total = collected.len(), "VK comments collected");
        Ok(collected
            .into_iter()
            .map(|comment| to_create(comment, &post_url))
            .collect())
    }
}

fn page_items(envelope: Envelope) -> ClientResult<Vec<WallComment>> {
    if let Some(error) = envelope.error {
        return Err(ClientError::Api {
            platform: "vk",
            message: error
                .error_msg
                .unwrap_or_else(|| "Unknown error".to_string()),
        });
    }
    Ok(envelope.response.unwrap_or_default().items)
}

fn to_create(comment: WallComment, post_url: &str) -> CreateComment {
    let author = comment
        .from_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "Unknown".to_string());
    CreateComment::new(post_url, comment.text, Platform::Vk)
        .with_likes(comment.likes.map(|l| l.count).unwrap_or(0))
        .with_date(format_date(comment.date))
        .with_author(author)
}

/// Local time of a unix timestamp; empty for zero.
fn format_date(timestamp: i64) -> String {
    if timestamp == 0 {
        return String::new();
    }
    Local
        .timestamp_opt(timestamp, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

fn decode(body: &str) -> ClientResult<Envelope> {
    serde_json::from_str(body).map_err(|e| ClientError::Decode {
        platform: "vk",
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(value: serde_json::Value) -> Envelope {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_page_maps_to_comments() {
        let items = page_items(envelope(json!({
            "response": {
                "items": [
                    { "id": 1, "from_id": 123, "text": "Test comment", "date": 1640995200, "likes": { "count": 5 } }
                ]
            }
        })))
        .unwrap();
        assert_eq!(items.len(), 1);

        let comment = to_create(items[0].clone(), "https://vk.com/wall-1_2");
        assert_eq!(comment.url, "https://vk.com/wall-1_2");
        assert_eq!(comment.content, "Test comment");
        assert_eq!(comment.likes, 5);
        assert_eq!(comment.author, "123");
        assert_eq!(comment.source, Platform::Vk);
        assert_eq!(comment.date.len(), "2022-01-01 00:00:00".len());
    }

    #[test]
    fn test_api_error_is_surfaced() {
        let err = page_items(envelope(json!({ "error": { "error_msg": "Invalid token" } })))
            .unwrap_err();
        assert!(matches!(err, ClientError::Api { platform: "vk", ref message } if message == "Invalid token"));
    }

    #[test]
    fn test_sparse_item_defaults() {
        let items = page_items(envelope(json!({ "response": { "items": [ {} ] } }))).unwrap();
        let comment = to_create(items[0].clone(), "u");
        assert_eq!(comment.author, "Unknown");
        assert_eq!(comment.likes, 0);
        assert_eq!(comment.date, "");
        assert_eq!(comment.content, "");
    }

    #[test]
    fn test_non_json_body_is_decode_error() {
        let err = decode("<html>rate limited</html>").unwrap_err();
        assert!(matches!(err, ClientError::Decode { platform: "vk", .. }));
    }

    #[test]
    fn test_post_url() {
        let client = VkClient::new("t", "-42", "7");
        assert_eq!(client.post_url(), "https://vk.com/wall-42_7");
    }
}
