use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Platform a comment was collected from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Telegram,
    Vk,
    Youtube,
    Test,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Telegram => "telegram",
            Platform::Vk => "vk",
            Platform::Youtube => "youtube",
            Platform::Test => "test",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unique identifier of a stored comment
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommentId(pub String);

impl CommentId {
    pub fn new() -> Self {
        Self(Uuid::now_v7().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CommentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CommentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for CommentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Fields persisted for one comment, as laid out in the backing table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub url: String,
    pub content: String,
    pub likes: u64,
    /// Source-defined format; not normalized across platforms.
    pub date: String,
    pub source: Platform,
}

/// A persisted comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub url: String,
    pub content: String,
    pub likes: u64,
    pub date: String,
    pub source: Platform,
}

impl Comment {
    pub fn from_record(id: CommentId, record: CommentRecord) -> Self {
        Self {
            id,
            url: record.url,
            content: record.content,
            likes: record.likes,
            date: record.date,
            source: record.source,
        }
    }
}

/// Input to the store's create operation.
///
/// `author` is accepted from every source but the durable schema has no
/// author column, so it is dropped on insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateComment {
    pub url: String,
    pub content: String,
    pub likes: u64,
    pub date: String,
    pub source: Platform,
    pub author: String,
}

impl CreateComment {
    pub fn new(url: impl Into<String>, content: impl Into<String>, source: Platform) -> Self {
        Self {
            url: url.into(),
            content: content.into(),
            likes: 0,
            date: String::new(),
            source,
            author: String::new(),
        }
    }

    pub fn with_likes(mut self, likes: u64) -> Self {
        self.likes = likes;
        self
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = date.into();
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub(crate) fn into_record(self) -> CommentRecord {
        CommentRecord {
            url: self.url,
            content: self.content,
            likes: self.likes,
            date: self.date,
            source: self.source,
        }
    }
}
