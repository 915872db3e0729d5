//! Browser session capability used by the feed harvester.
//!
//! The harvester only needs a handful of operations: navigate, run a script,
//! wait for and enumerate elements, read element text/attributes, and close.
//! `WebDriverSession` binds them to a W3C WebDriver endpoint such as
//! chromedriver; `testing::ScriptedBrowser` provides a scripted feed.

pub mod webdriver;

pub use webdriver::{WebDriverOptions, WebDriverSession};

use std::time::{Duration, Instant};

use crate::error::SessionResult;
use crate::selectors::ElementQuery;

/// Script returning the page's current scroll height.
pub const SCROLL_HEIGHT_SCRIPT: &str = "return document.documentElement.scrollHeight";

/// Script scrolling to the current bottom of the page.
pub const SCROLL_TO_BOTTOM_SCRIPT: &str =
    "window.scrollTo({top: document.documentElement.scrollHeight, behavior: 'smooth'});";

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// A live browser session exclusively owned by one harvest.
pub trait BrowserSession: ElementQuery {
    /// Load `url` in the current window.
    fn navigate(&mut self, url: &str) -> SessionResult<()>;

    /// Run a synchronous script and return its JSON result.
    fn execute(&mut self, script: &str) -> SessionResult<serde_json::Value>;

    /// All elements in the document matching `locator`.
    fn find_all(&mut self, locator: &str) -> SessionResult<Vec<Self::Element>>;

    /// Release the session. Must be safe to call more than once.
    fn close(&mut self) -> SessionResult<()>;

    /// Wait until at least one element matches `locator`.
    ///
    /// Returns `Ok(false)` when the timeout elapses first.
    fn wait_for(&mut self, locator: &str, timeout: Duration) -> SessionResult<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if !self.find_all(locator)?.is_empty() {
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            std::thread::sleep(WAIT_POLL_INTERVAL.min(deadline - now));
        }
    }

    /// Current document scroll height in pixels.
    fn scroll_height(&mut self) -> SessionResult<u64> {
        let value = self.execute(SCROLL_HEIGHT_SCRIPT)?;
        Ok(value
            .as_u64()
            .or_else(|| value.as_f64().map(|h| h.max(0.0) as u64))
            .unwrap_or(0))
    }

    /// Scroll to the current bottom of the page.
    fn scroll_to_bottom(&mut self) -> SessionResult<()> {
        self.execute(SCROLL_TO_BOTTOM_SCRIPT).map(|_| ())
    }

    /// Scroll down by `pixels` from the current position.
    fn scroll_by(&mut self, pixels: u32) -> SessionResult<()> {
        self.execute(&format!("window.scrollBy(0, {pixels});"))
            .map(|_| ())
    }
}
