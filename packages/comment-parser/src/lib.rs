//! Comment Harvesting Library
//!
//! Collects user comments from online platforms and persists them in one
//! uniform record format.
//!
//! # Overview
//!
//! - REST clients page through platform APIs (VK, YouTube Data API)
//! - A browser-driven harvester scrolls lazily loaded feeds, extracts each
//!   thread through ordered selector strategies, and deduplicates across passes
//! - Every discovered comment is persisted through a keyed record store
//!
//! # Usage
//!
//! ```rust,ignore
//! use comment_parser::{FeedHarvester, HarvestConfig, JsonCommentStore};
//! use comment_parser::browser::{WebDriverOptions, WebDriverSession};
//!
//! let store = JsonCommentStore::open("comments_db.json");
//! let session = WebDriverSession::connect(&WebDriverOptions::default())?;
//!
//! let harvest = FeedHarvester::new(HarvestConfig::new().with_max_comments(200))
//!     .harvest(session, "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
//!
//! let report = comment_parser::ingest_harvest(&store, harvest);
//! println!("saved {} of {}", report.persisted, report.extracted);
//! ```
//!
//! # Modules
//!
//! - [`store`] - Record store backends (JSON file, memory)
//! - [`selectors`] - Fallback extraction strategies for thread elements
//! - [`browser`] - Browser session capability and WebDriver binding
//! - [`harvester`] - Scroll-and-extract feed harvester
//! - [`translate`] - Language detection and translation
//! - [`ingest`] - Source-to-store driver
//! - [`clients`] - REST platform clients
//! - [`testing`] - Mock implementations for testing

pub mod browser;
pub mod clients;
pub mod config;
pub mod error;
pub mod harvester;
pub mod ingest;
pub mod selectors;
pub mod store;
pub mod testing;
pub mod translate;
pub mod types;

// Re-export core types at crate root
pub use browser::BrowserSession;
pub use clients::{extract_video_id, CommentSource, VkClient, YoutubeClient};
pub use config::{Config, HarvestConfig};
pub use error::{ClientError, HarvestError, SessionError, StoreError, TranslateError};
pub use harvester::{FeedHarvester, Harvest, HarvestedComment};
pub use ingest::{ingest, ingest_harvest, IngestReport};
pub use selectors::{SelectorChain, SelectorStrategy};
pub use store::{repair_encoding, CommentStore, JsonCommentStore, MemoryCommentStore};
pub use translate::{translate_or_passthrough, LibreTranslator, Translator};
pub use types::{Comment, CommentId, CommentRecord, CreateComment, Platform};
