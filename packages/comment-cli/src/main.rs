//! Command-line entry point for collecting and managing stored comments.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use comment_parser::browser::{WebDriverOptions, WebDriverSession};
use comment_parser::clients::youtube::watch_url;
use comment_parser::{
    extract_video_id, ingest, ingest_harvest, repair_encoding, CommentId, CommentSource,
    CommentStore, Config, FeedHarvester, HarvestConfig, JsonCommentStore, LibreTranslator,
    VkClient, YoutubeClient,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Comments fetched through the Data API when no bound is given.
const DEFAULT_API_MAX_COMMENTS: usize = 100;

#[derive(Parser)]
#[command(name = "comment-parser")]
#[command(about = "Collect comments from VK and YouTube into a JSON table")]
struct Cli {
    /// Settings file (JSON)
    #[arg(long, global = true, default_value = "config.json")]
    config: PathBuf,

    /// Comment table, overrides the configured path
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect comments of a YouTube video
    Youtube {
        #[arg(long)]
        video_url: String,

        /// Data API key; without one the comments are read through a browser
        #[arg(long)]
        api_key: Option<String>,

        #[arg(long)]
        max_comments: Option<usize>,

        /// Run the browser without a window
        #[arg(long)]
        headless: bool,

        /// Translate comments into this language (e.g. "ru")
        #[arg(long)]
        translate_to: Option<String>,

        /// Seconds to wait after each scroll
        #[arg(long)]
        scroll_pause: Option<f64>,

        /// Skip the extra per-scroll delay
        #[arg(long)]
        no_slow_mode: bool,
    },

    /// Collect comments of a VK wall post
    Vk {
        #[arg(long, allow_hyphen_values = true)]
        owner_id: String,

        #[arg(long)]
        post_id: String,

        #[arg(long)]
        token: Option<String>,

        #[arg(long)]
        max_comments: Option<usize>,
    },

    /// Print every stored comment
    List,

    /// Print one stored comment
    Get { id: String },

    /// Delete a stored comment
    Delete { id: String },

    /// Rewrite a comment table as readable UTF-8
    FixJson { path: Option<PathBuf> },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,comment_parser=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(&cli.config);
    if let Some(store) = cli.store {
        config.store_path = Some(store);
    }
    let store_path = config.store_path();

    match cli.command {
        Commands::Youtube {
            video_url,
            api_key,
            max_comments,
            headless,
            translate_to,
            scroll_pause,
            no_slow_mode,
        } => {
            let video_id = extract_video_id(&video_url)
                .with_context(|| format!("Could not find a video id in {video_url}"))?;

            let saved = match api_key.or(config.youtube_api_key.clone()) {
                Some(key) => {
                    info!(video_id = %video_id, "Using YouTube Data API");
                    let client = YoutubeClient::new(key, &video_id);
                    let comments = client
                        .fetch_comments(Some(max_comments.unwrap_or(DEFAULT_API_MAX_COMMENTS)))
                        .await
                        .context("YouTube API request failed")?;
                    let store = JsonCommentStore::open(&store_path);
                    ingest(&store, comments)
                }
                None => {
                    info!(video_id = %video_id, "No API key, reading comments through the browser");
                    let mut harvest_config = HarvestConfig::new()
                        .with_max_comments(max_comments.unwrap_or(0))
                        .with_slow_mode(!no_slow_mode);
                    if let Some(secs) = scroll_pause {
                        if !secs.is_finite() || secs < 0.0 {
                            bail!("--scroll-pause must be a non-negative number of seconds");
                        }
                        harvest_config =
                            harvest_config.with_scroll_pause(Duration::from_secs_f64(secs));
                    }

                    let mut harvester = FeedHarvester::new(harvest_config);
                    if let Some(target) = translate_to {
                        let translate_url = config.translate_url.clone().context(
                            "--translate-to needs TRANSLATE_URL or translate_url in the config file",
                        )?;
                        let translator = LibreTranslator::new(translate_url)?;
                        harvester = harvester.with_translation(Arc::new(translator), target);
                    }

                    let options = WebDriverOptions::new(config.webdriver_url()).headless(headless);
                    let page = watch_url(&video_id);
                    let store = JsonCommentStore::open(&store_path);

                    // The WebDriver binding blocks; keep it off the runtime threads.
                    let report = tokio::task::spawn_blocking(move || -> Result<_> {
                        let session = WebDriverSession::connect(&options)
                            .context("Could not start a browser session")?;
                        Ok(ingest_harvest(&store, harvester.harvest(session, page)))
                    })
                    .await
                    .context("Harvest task panicked")??;

                    if report.failed {
                        tracing::warn!(
                            extracted = report.extracted,
                            "Browser session failed before the feed was exhausted"
                        );
                    }
                    report.persisted
                }
            };
            println!("Saved {saved} comments to {}", store_path.display());
        }

        Commands::Vk {
            owner_id,
            post_id,
            token,
            max_comments,
        } => {
            let Some(token) = token.or(config.vk_token.clone()) else {
                bail!("A VK token is required (--token, VK_TOKEN or vk_token in the config file)");
            };
            let client = VkClient::new(token, owner_id, post_id);
            let comments = client
                .fetch_comments(max_comments)
                .await
                .context("VK API request failed")?;
            if comments.is_empty() {
                info!(post = %client.post_url(), "No comments found");
            }
            let store = JsonCommentStore::open(&store_path);
            let saved = ingest(&store, comments);
            println!("Saved {saved} comments to {}", store_path.display());
        }

        Commands::List => {
            let store = JsonCommentStore::open(&store_path);
            let comments = store
                .load_all()
                .with_context(|| format!("Failed to read {}", store_path.display()))?;
            for comment in &comments {
                println!("{}", serde_json::to_string(comment)?);
            }
            info!(count = comments.len(), "Listed comments");
        }

        Commands::Get { id } => {
            let store = JsonCommentStore::open(&store_path);
            match store.get(&CommentId::from(id.clone())) {
                Some(comment) => println!("{}", serde_json::to_string_pretty(&comment)?),
                None => bail!("No comment with id {id}"),
            }
        }

        Commands::Delete { id } => {
            let store = JsonCommentStore::open(&store_path);
            if !store.delete(&CommentId::from(id.clone())) {
                bail!("Failed to delete comment {id}");
            }
            println!("Deleted {id}");
        }

        Commands::FixJson { path } => {
            let path = path.unwrap_or(store_path);
            let records = repair_encoding(&path)
                .with_context(|| format!("Failed to rewrite {}", path.display()))?;
            println!("Rewrote {} ({records} records)", path.display());
        }
    }

    Ok(())
}
