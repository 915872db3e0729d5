//! Testing utilities including mock implementations.
//!
//! These let applications exercise the harvester and translation paths
//! without a real browser or translation service.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use crate::browser::{BrowserSession, SCROLL_HEIGHT_SCRIPT, SCROLL_TO_BOTTOM_SCRIPT};
use crate::config::HarvestConfig;
use crate::error::{SessionError, SessionResult, TranslateError};
use crate::selectors::ElementQuery;
use crate::translate::Translator;

// ============================================================================
// Scripted browser
// ============================================================================

/// A comment thread element in a scripted feed.
///
/// Fields are keyed by the locator that finds them; the helpers use the
/// first YouTube selector strategy.
#[derive(Debug, Clone)]
pub struct ScriptedThread {
    id: Option<String>,
    fields: HashMap<String, String>,
}

impl ScriptedThread {
    pub fn new(id: Option<&str>, text: &str) -> Self {
        Self {
            id: id.map(String::from),
            fields: HashMap::new(),
        }
        .with_field("yt-attributed-string#content-text", text)
    }

    pub fn with_field(mut self, locator: &str, text: &str) -> Self {
        self.fields.insert(locator.to_string(), text.to_string());
        self
    }

    pub fn with_author(self, author: &str) -> Self {
        self.with_field("yt-formatted-string#author-text", author)
    }

    pub fn with_likes(self, likes: &str) -> Self {
        self.with_field("span#vote-count-middle", likes)
    }

    pub fn with_published(self, published: &str) -> Self {
        self.with_field("a#published-time-text", published)
    }
}

/// Element handles handed out by [`ScriptedBrowser`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedElement {
    Feed,
    Banner,
    Thread(usize),
    Field(usize, String),
}

/// Browser interactions in the order a [`ScriptedBrowser`] received them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserEvent {
    Navigate,
    Nudge,
    FeedLookup,
    Scroll,
    Close,
}

#[derive(Debug, Default)]
struct LogState {
    events: Vec<BrowserEvent>,
    navigations: Vec<String>,
    nudges: usize,
    scrolls: usize,
    close_calls: usize,
}

/// Shared record of what a [`ScriptedBrowser`] was asked to do.
///
/// Stays readable after the browser has been moved into a harvest.
#[derive(Debug, Clone, Default)]
pub struct BrowserLog(Arc<Mutex<LogState>>);

impl BrowserLog {
    pub fn events(&self) -> Vec<BrowserEvent> {
        self.0.lock().unwrap().events.clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.0.lock().unwrap().navigations.clone()
    }

    pub fn nudges(&self) -> usize {
        self.0.lock().unwrap().nudges
    }

    /// Scroll-to-bottom commands received.
    pub fn scrolls(&self) -> usize {
        self.0.lock().unwrap().scrolls
    }

    pub fn close_calls(&self) -> usize {
        self.0.lock().unwrap().close_calls
    }

    pub fn is_closed(&self) -> bool {
        self.close_calls() > 0
    }
}

/// Mock browser session serving a feed that grows cycle by cycle.
///
/// Each scroll-to-bottom reveals the next scripted batch of threads and sets
/// the page height. Once the script runs out the height stays put, unless
/// `with_endless_growth` is set.
pub struct ScriptedBrowser {
    script: VecDeque<(Vec<ScriptedThread>, u64)>,
    threads: Vec<ScriptedThread>,
    height: u64,
    growth: Option<u64>,
    feed_present: bool,
    banner: Option<String>,
    fail_navigation: bool,
    fail_after_scrolls: Option<usize>,
    failing_thread: Option<String>,
    feed_locator: String,
    thread_locator: String,
    banner_locator: String,
    closed: bool,
    log: BrowserLog,
}

impl Default for ScriptedBrowser {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedBrowser {
    pub fn new() -> Self {
        let defaults = HarvestConfig::default();
        Self {
            script: VecDeque::new(),
            threads: Vec::new(),
            height: 0,
            growth: None,
            feed_present: true,
            banner: None,
            fail_navigation: false,
            fail_after_scrolls: None,
            failing_thread: None,
            feed_locator: defaults.feed_locator,
            thread_locator: defaults.thread_locator,
            banner_locator: defaults.disabled_locator,
            closed: false,
            log: BrowserLog::default(),
        }
    }

    pub fn with_initial_height(mut self, height: u64) -> Self {
        self.height = height;
        self
    }

    /// Threads rendered before any scroll.
    pub fn with_initial_threads(mut self, threads: Vec<ScriptedThread>) -> Self {
        self.threads.extend(threads);
        self
    }

    /// Next scroll reveals `threads` and sets the page height to `height`.
    pub fn with_cycle(mut self, threads: Vec<ScriptedThread>, height: u64) -> Self {
        self.script.push_back((threads, height));
        self
    }

    /// After the script runs out, every scroll grows the page by `step`.
    pub fn with_endless_growth(mut self, step: u64) -> Self {
        self.growth = Some(step);
        self
    }

    pub fn without_feed(mut self) -> Self {
        self.feed_present = false;
        self
    }

    pub fn with_banner(mut self, text: &str) -> Self {
        self.banner = Some(text.to_string());
        self
    }

    pub fn failing_navigation(mut self) -> Self {
        self.fail_navigation = true;
        self
    }

    /// Scans fault once `scrolls` scroll-to-bottom commands have been seen.
    pub fn failing_after_scrolls(mut self, scrolls: usize) -> Self {
        self.fail_after_scrolls = Some(scrolls);
        self
    }

    /// Child lookups inside the thread with native id `id` fault.
    pub fn failing_on_thread(mut self, id: &str) -> Self {
        self.failing_thread = Some(id.to_string());
        self
    }

    pub fn log(&self) -> BrowserLog {
        self.log.clone()
    }

    fn ensure_open(&self) -> SessionResult<()> {
        if self.closed {
            return Err(SessionError::Closed);
        }
        Ok(())
    }

    fn record(&self, event: BrowserEvent) {
        self.log.0.lock().unwrap().events.push(event);
    }

    fn advance(&mut self) {
        self.record(BrowserEvent::Scroll);
        self.log.0.lock().unwrap().scrolls += 1;
        if let Some((threads, height)) = self.script.pop_front() {
            self.threads.extend(threads);
            self.height = height;
        } else if let Some(step) = self.growth {
            self.height += step;
        }
    }

    fn disconnected() -> SessionError {
        SessionError::Protocol {
            error: "disconnected".to_string(),
            message: "browser went away".to_string(),
        }
    }
}

impl ElementQuery for ScriptedBrowser {
    type Element = ScriptedElement;

    fn find_child(
        &mut self,
        parent: &ScriptedElement,
        locator: &str,
    ) -> SessionResult<Option<ScriptedElement>> {
        self.ensure_open()?;
        let ScriptedElement::Thread(index) = parent else {
            return Ok(None);
        };
        if self.failing_thread.is_some() && self.threads[*index].id == self.failing_thread {
            return Err(Self::disconnected());
        }
        Ok(self.threads[*index]
            .fields
            .contains_key(locator)
            .then(|| ScriptedElement::Field(*index, locator.to_string())))
    }

    fn text(&mut self, element: &ScriptedElement) -> SessionResult<String> {
        self.ensure_open()?;
        Ok(match element {
            ScriptedElement::Banner => self.banner.clone().unwrap_or_default(),
            ScriptedElement::Field(index, locator) => self.threads[*index]
                .fields
                .get(locator)
                .cloned()
                .unwrap_or_default(),
            _ => String::new(),
        })
    }

    fn attribute(
        &mut self,
        element: &ScriptedElement,
        name: &str,
    ) -> SessionResult<Option<String>> {
        self.ensure_open()?;
        match element {
            ScriptedElement::Thread(index) if name == "id" => Ok(self.threads[*index].id.clone()),
            _ => Ok(None),
        }
    }
}

impl BrowserSession for ScriptedBrowser {
    fn navigate(&mut self, url: &str) -> SessionResult<()> {
        self.ensure_open()?;
        if self.fail_navigation {
            return Err(Self::disconnected());
        }
        self.record(BrowserEvent::Navigate);
        self.log.0.lock().unwrap().navigations.push(url.to_string());
        Ok(())
    }

    fn execute(&mut self, script: &str) -> SessionResult<Value> {
        self.ensure_open()?;
        if script == SCROLL_HEIGHT_SCRIPT {
            return Ok(json!(self.height));
        }
        if script == SCROLL_TO_BOTTOM_SCRIPT {
            self.advance();
        } else if script.starts_with("window.scrollBy") {
            self.record(BrowserEvent::Nudge);
            self.log.0.lock().unwrap().nudges += 1;
        }
        Ok(Value::Null)
    }

    fn find_all(&mut self, locator: &str) -> SessionResult<Vec<ScriptedElement>> {
        self.ensure_open()?;
        if locator == self.feed_locator {
            self.record(BrowserEvent::FeedLookup);
            return Ok(if self.feed_present {
                vec![ScriptedElement::Feed]
            } else {
                Vec::new()
            });
        }
        if locator == self.banner_locator {
            return Ok(self
                .banner
                .as_ref()
                .map(|_| vec![ScriptedElement::Banner])
                .unwrap_or_default());
        }
        if locator == self.thread_locator {
            if let Some(limit) = self.fail_after_scrolls {
                if self.log.scrolls() >= limit {
                    return Err(Self::disconnected());
                }
            }
            return Ok((0..self.threads.len()).map(ScriptedElement::Thread).collect());
        }
        Ok(Vec::new())
    }

    fn close(&mut self) -> SessionResult<()> {
        self.closed = true;
        self.record(BrowserEvent::Close);
        self.log.0.lock().unwrap().close_calls += 1;
        Ok(())
    }
}

// ============================================================================
// Translator
// ============================================================================

/// Deterministic translator.
///
/// Detects every text as one fixed language and translates only the texts
/// registered with `with_translation`; anything else fails.
pub struct MockTranslator {
    detected: Option<String>,
    translations: HashMap<String, String>,
    translate_calls: AtomicUsize,
}

impl MockTranslator {
    pub fn new(detected: &str) -> Self {
        Self {
            detected: Some(detected.to_string()),
            translations: HashMap::new(),
            translate_calls: AtomicUsize::new(0),
        }
    }

    /// Detection always fails.
    pub fn failing_detection() -> Self {
        Self {
            detected: None,
            translations: HashMap::new(),
            translate_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_translation(mut self, from: &str, to: &str) -> Self {
        self.translations.insert(from.to_string(), to.to_string());
        self
    }

    pub fn translate_calls(&self) -> usize {
        self.translate_calls.load(Ordering::SeqCst)
    }
}

impl Translator for MockTranslator {
    fn detect(&self, _text: &str) -> Result<String, TranslateError> {
        self.detected
            .clone()
            .ok_or_else(|| TranslateError::EmptyResult("detection disabled".to_string()))
    }

    fn translate(&self, text: &str, _target: &str) -> Result<String, TranslateError> {
        self.translate_calls.fetch_add(1, Ordering::SeqCst);
        self.translations
            .get(text)
            .cloned()
            .ok_or_else(|| TranslateError::EmptyResult(format!("no translation for {text:?}")))
    }
}
