//! Incremental scroll-and-extract harvesting of a lazily loaded comment feed.
//!
//! A [`Harvest`] is a pull-based iterator. Each `next()` either hands out an
//! already extracted comment or drives one more cycle against the browser:
//!
//! 1. open: navigate, nudge the page to trigger lazy loading, wait (bounded)
//!    for the feed container, bail out if a "comments disabled" banner shows;
//! 2. cycle: scroll to the bottom, pause, scan every thread element through
//!    the [`SelectorChain`], keep only ids not seen before;
//! 3. stop when the scroll height did not change during a cycle, when
//!    `stall_limit` consecutive cycles found nothing new, or when
//!    `max_comments` is reached.
//!
//! The session is closed on every exit path: natural completion, a session
//! fault, or the consumer dropping the iterator early.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::browser::BrowserSession;
use crate::config::HarvestConfig;
use crate::error::{HarvestError, HarvestResult, SessionError};
use crate::selectors::SelectorChain;
use crate::translate::{translate_or_passthrough, Translator};
use crate::types::{CreateComment, Platform};

/// A comment extracted from the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestedComment {
    /// Native thread id, or `comment_{n}` when the element has none.
    pub id: String,
    pub url: String,
    pub content: String,
    pub author: String,
    pub date: String,
    pub likes: u64,
    pub source: Platform,
}

impl HarvestedComment {
    pub fn into_create(self) -> CreateComment {
        CreateComment {
            url: self.url,
            content: self.content,
            likes: self.likes,
            date: self.date,
            source: self.source,
            author: self.author,
        }
    }
}

impl From<HarvestedComment> for CreateComment {
    fn from(comment: HarvestedComment) -> Self {
        comment.into_create()
    }
}

#[derive(Clone)]
struct TranslationStep {
    translator: Arc<dyn Translator>,
    target: String,
}

/// Builds harvests from a shared configuration.
#[derive(Clone)]
pub struct FeedHarvester {
    config: HarvestConfig,
    chain: SelectorChain,
    translation: Option<TranslationStep>,
}

impl FeedHarvester {
    pub fn new(config: HarvestConfig) -> Self {
        Self {
            config,
            chain: SelectorChain::youtube(),
            translation: None,
        }
    }

    pub fn with_chain(mut self, chain: SelectorChain) -> Self {
        self.chain = chain;
        self
    }

    /// Pass every emitted comment through `translator` into `target`.
    pub fn with_translation(
        mut self,
        translator: Arc<dyn Translator>,
        target: impl Into<String>,
    ) -> Self {
        self.translation = Some(TranslationStep {
            translator,
            target: target.into(),
        });
        self
    }

    /// Start a harvest of `url`. Takes ownership of `session`; nothing touches
    /// the browser until the first `next()`.
    pub fn harvest<S: BrowserSession>(&self, session: S, url: impl Into<String>) -> Harvest<S> {
        Harvest {
            session: Some(session),
            url: url.into(),
            config: self.config.clone(),
            chain: self.chain.clone(),
            translation: self.translation.clone(),
            state: SessionState::default(),
            pending: VecDeque::new(),
            fault: None,
            phase: Phase::Start,
        }
    }
}

/// Per-invocation bookkeeping. Never shared between harvests.
#[derive(Debug, Default)]
struct SessionState {
    seen: HashSet<String>,
    last_height: u64,
    stalls: u32,
    yielded: usize,
    cycles: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Start,
    Scanning,
    Done,
}

/// Why a cycle ended the harvest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    HeightUnchanged,
    Stalled,
    LimitReached,
}

/// Lazy, deduplicated sequence of comments from one page.
pub struct Harvest<S: BrowserSession> {
    session: Option<S>,
    url: String,
    config: HarvestConfig,
    chain: SelectorChain,
    translation: Option<TranslationStep>,
    state: SessionState,
    pending: VecDeque<HarvestedComment>,
    /// Fault held back until the comments queued before it are handed out.
    fault: Option<HarvestError>,
    phase: Phase,
}

impl<S: BrowserSession> Harvest<S> {
    /// Comments emitted or queued so far.
    pub fn yielded(&self) -> usize {
        self.state.yielded
    }

    /// Completed scroll cycles.
    pub fn cycles(&self) -> usize {
        self.state.cycles
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done && self.pending.is_empty() && self.fault.is_none()
    }

    fn session(&mut self) -> HarvestResult<&mut S> {
        self.session
            .as_mut()
            .ok_or(HarvestError::Session(SessionError::Closed))
    }

    /// Returns `false` when the page has no usable comment feed.
    fn open(&mut self) -> HarvestResult<bool> {
        let url = self.url.clone();
        let config = self.config.clone();
        let session = self.session()?;

        info!(url = %url, "Opening page");
        session.navigate(&url)?;
        pause(config.initial_wait);

        for _ in 0..config.nudge_count {
            session.scroll_by(config.nudge_pixels)?;
            pause(config.nudge_pause);
        }

        if !session.wait_for(&config.feed_locator, config.feed_timeout)? {
            info!(url = %url, locator = %config.feed_locator, "Comments section not found");
            return Ok(false);
        }
        debug!(locator = %config.feed_locator, "Comments section found");
        pause(config.feed_settle);

        if let Some(banner) = session.find_all(&config.disabled_locator)?.first() {
            let text = session.text(banner)?;
            if config.is_disabled_message(&text) {
                info!(url = %url, "Comments are disabled for this page");
                return Ok(false);
            }
        }

        let height = session.scroll_height()?;
        self.state.last_height = height;
        Ok(true)
    }

    /// One scroll + scan + stall check.
    fn cycle(&mut self) -> HarvestResult<Option<Stop>> {
        let config = self.config.clone();
        self.state.cycles += 1;
        let cycle = self.state.cycles;

        {
            let session = self.session()?;
            session.scroll_to_bottom()?;
        }
        pause(config.cycle_pause());

        let (new_in_cycle, limit_hit) = self.scan()?;
        debug!(
            cycle,
            new = new_in_cycle,
            total = self.state.yielded,
            "Scan cycle complete"
        );
        if limit_hit {
            info!(max = ?config.max_comments, "Comment limit reached");
            return Ok(Some(Stop::LimitReached));
        }

        let height = self.session()?.scroll_height()?;
        if new_in_cycle == 0 {
            self.state.stalls += 1;
        } else {
            self.state.stalls = 0;
        }

        if height == self.state.last_height {
            return Ok(Some(Stop::HeightUnchanged));
        }
        if self.state.stalls >= config.stall_limit {
            return Ok(Some(Stop::Stalled));
        }
        self.state.last_height = height;
        Ok(None)
    }

    /// Extract every visible thread, queueing the unseen ones.
    ///
    /// Returns the number of new comments and whether the limit was hit.
    fn scan(&mut self) -> HarvestResult<(usize, bool)> {
        let thread_locator = self.config.thread_locator.clone();
        let max = self.config.max_comments;
        let platform = self.config.platform;

        let Some(session) = self.session.as_mut() else {
            return Err(HarvestError::Session(SessionError::Closed));
        };
        let elements = session.find_all(&thread_locator)?;
        debug!(count = elements.len(), "Thread elements visible");

        let mut new_in_cycle = 0;
        for element in &elements {
            let Some(thread) = self.chain.extract(session, element)? else {
                continue;
            };

            let id = thread
                .native_id
                .unwrap_or_else(|| format!("comment_{}", self.state.yielded));
            if !self.state.seen.insert(id.clone()) {
                continue;
            }

            self.state.yielded += 1;
            new_in_cycle += 1;
            self.pending.push_back(HarvestedComment {
                id,
                url: self.url.clone(),
                content: thread.text,
                author: thread.author,
                date: thread.published,
                likes: thread.likes,
                source: platform,
            });

            if max.is_some_and(|max| self.state.yielded >= max) {
                return Ok((new_in_cycle, true));
            }
        }
        Ok((new_in_cycle, false))
    }

    fn emit(&self, mut comment: HarvestedComment) -> HarvestedComment {
        if let Some(step) = &self.translation {
            comment.content =
                translate_or_passthrough(step.translator.as_ref(), &comment.content, &step.target);
        }
        comment
    }

    /// Enter the terminal phase and release the browser.
    fn finish(&mut self) {
        self.phase = Phase::Done;
        self.release();
    }

    fn release(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.close() {
                warn!(error = %e, "Failed to close browser session");
            }
        }
    }
}

impl<S: BrowserSession> Iterator for Harvest<S> {
    type Item = HarvestResult<HarvestedComment>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(comment) = self.pending.pop_front() {
                return Some(Ok(self.emit(comment)));
            }
            if let Some(fault) = self.fault.take() {
                return Some(Err(fault));
            }

            let finished = match self.phase {
                Phase::Done => return None,
                Phase::Start => self.open().map(|ready| {
                    if ready {
                        self.phase = Phase::Scanning;
                    }
                    !ready
                }),
                Phase::Scanning => self.cycle().map(|stop| {
                    if let Some(reason) = stop {
                        debug!(reason = ?reason, "Feed exhausted");
                    }
                    stop.is_some()
                }),
            };

            match finished {
                Ok(false) => {}
                Ok(true) => {
                    info!(
                        url = %self.url,
                        yielded = self.state.yielded,
                        cycles = self.state.cycles,
                        "Harvest completed"
                    );
                    self.finish();
                }
                Err(e) => {
                    warn!(url = %self.url, error = %e, "Harvest aborted");
                    self.fault = Some(e);
                    self.finish();
                }
            }
        }
    }
}

impl<S: BrowserSession> Drop for Harvest<S> {
    fn drop(&mut self) {
        self.release();
    }
}

fn pause(duration: Duration) {
    if !duration.is_zero() {
        std::thread::sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedBrowser, ScriptedThread};

    fn thread(id: &str, text: &str) -> ScriptedThread {
        ScriptedThread::new(Some(id), text)
    }

    #[test]
    fn test_nothing_happens_before_first_pull() {
        let browser = ScriptedBrowser::new().with_cycle(vec![thread("a", "one")], 100);
        let log = browser.log();
        let harvest = FeedHarvester::new(HarvestConfig::immediate()).harvest(browser, "https://x");
        assert!(log.navigations().is_empty());
        drop(harvest);
        assert!(log.is_closed());
    }

    #[test]
    fn test_same_id_seen_twice_is_yielded_once() {
        let browser = ScriptedBrowser::new()
            .with_initial_height(100)
            .with_cycle(vec![thread("a", "one"), thread("b", "two")], 200)
            .with_cycle(vec![thread("a", "one again"), thread("c", "three")], 300)
            .with_cycle(vec![], 300);
        let harvest = FeedHarvester::new(HarvestConfig::immediate()).harvest(browser, "https://x");

        let ids: Vec<_> = harvest.map(|c| c.unwrap().id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_missing_native_id_uses_yield_counter() {
        let browser = ScriptedBrowser::new()
            .with_initial_height(100)
            .with_cycle(
                vec![
                    ScriptedThread::new(None, "first"),
                    ScriptedThread::new(None, "second"),
                ],
                100,
            );
        let harvest = FeedHarvester::new(HarvestConfig::immediate()).harvest(browser, "https://x");
        let ids: Vec<_> = harvest.map(|c| c.unwrap().id).collect();
        assert_eq!(ids, vec!["comment_0", "comment_1"]);
    }

    #[test]
    fn test_blank_threads_are_skipped() {
        let browser = ScriptedBrowser::new().with_initial_height(100).with_cycle(
            vec![thread("a", "   "), thread("b", "real")],
            100,
        );
        let harvest = FeedHarvester::new(HarvestConfig::immediate()).harvest(browser, "https://x");
        let comments: Vec<_> = harvest.map(|c| c.unwrap()).collect();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].content, "real");
    }

    #[test]
    fn test_fault_is_held_until_queued_comments_are_out() {
        let browser = ScriptedBrowser::new()
            .with_initial_height(100)
            .with_cycle(vec![thread("a", "one"), thread("b", "two")], 200)
            .failing_on_thread("b");
        let mut harvest = FeedHarvester::new(HarvestConfig::immediate()).harvest(browser, "https://x");

        assert_eq!(harvest.next().unwrap().unwrap().id, "a");
        assert!(!harvest.is_done());
        assert!(matches!(harvest.next(), Some(Err(HarvestError::Session(_)))));
        assert!(harvest.is_done());
        assert!(harvest.next().is_none());
    }

    #[test]
    fn test_translation_applied_on_emit() {
        let translator = Arc::new(
            crate::testing::MockTranslator::new("en").with_translation("hello", "привет"),
        );
        let browser = ScriptedBrowser::new().with_initial_height(100).with_cycle(
            vec![thread("a", "hello"), thread("b", "untranslatable")],
            100,
        );
        let harvest = FeedHarvester::new(HarvestConfig::immediate())
            .with_translation(translator, "ru")
            .harvest(browser, "https://x");

        let contents: Vec<_> = harvest.map(|c| c.unwrap().content).collect();
        assert_eq!(contents, vec!["привет", "untranslatable"]);
    }

    #[test]
    fn test_records_carry_page_url_and_platform() {
        let browser = ScriptedBrowser::new().with_initial_height(100).with_cycle(
            vec![thread("a", "hi")
                .with_author("@alice")
                .with_likes("1,024")
                .with_published("3 hours ago")],
            100,
        );
        let mut harvest = FeedHarvester::new(HarvestConfig::immediate())
            .harvest(browser, "https://www.youtube.com/watch?v=abcdefghijk");

        let comment = harvest.next().unwrap().unwrap();
        assert_eq!(comment.url, "https://www.youtube.com/watch?v=abcdefghijk");
        assert_eq!(comment.author, "@alice");
        assert_eq!(comment.likes, 1024);
        assert_eq!(comment.date, "3 hours ago");
        assert_eq!(comment.source, Platform::Youtube);

        let create = comment.into_create();
        assert_eq!(create.author, "@alice");
    }
}
