//! W3C WebDriver binding for [`BrowserSession`].
//!
//! Talks JSON over HTTP to a running driver (chromedriver by default on
//! `http://localhost:9515`). Uses the blocking reqwest client, so sessions
//! must be created and driven off the async runtime (e.g. inside
//! `tokio::task::spawn_blocking`).

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::BrowserSession;
use crate::error::{SessionError, SessionResult};
use crate::selectors::ElementQuery;

/// Key under which WebDriver returns element references.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Browser launch options.
#[derive(Debug, Clone)]
pub struct WebDriverOptions {
    pub endpoint: String,
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    pub user_agent: String,
    pub language: String,
    /// Attempts at creating the session before giving up.
    pub setup_attempts: u32,
    pub setup_retry_pause: Duration,
    pub request_timeout: Duration,
}

impl Default for WebDriverOptions {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9515".to_string(),
            headless: false,
            window_width: 1920,
            window_height: 1080,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            language: "en-US".to_string(),
            setup_attempts: 2,
            setup_retry_pause: Duration::from_secs(3),
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl WebDriverOptions {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    fn capabilities(&self) -> Value {
        let mut args = vec![
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--disable-blink-features=AutomationControlled".to_string(),
            "--disable-gpu".to_string(),
            format!("--lang={}", self.language),
            format!("--window-size={},{}", self.window_width, self.window_height),
            format!("user-agent={}", self.user_agent),
        ];
        if self.headless {
            args.push("--headless=new".to_string());
        }
        json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": args }
                }
            }
        })
    }
}

/// Reference to an element in the remote document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebElement(pub String);

/// A WebDriver session. Deleted on `close` or, failing that, on drop.
pub struct WebDriverSession {
    client: Client,
    endpoint: String,
    session_id: Option<String>,
}

impl WebDriverSession {
    /// Create a session, retrying per `options.setup_attempts`.
    pub fn connect(options: &WebDriverOptions) -> SessionResult<Self> {
        let client = Client::builder()
            .timeout(options.request_timeout)
            .build()
            .map_err(|e| SessionError::Transport(Box::new(e)))?;
        let endpoint = options.endpoint.trim_end_matches('/').to_string();

        let attempts = options.setup_attempts.max(1);
        let mut last_error = None;
        for attempt in 1..=attempts {
            info!(endpoint = %endpoint, attempt, attempts, "Creating browser session");
            match create_session(&client, &endpoint, options) {
                Ok(session_id) => {
                    let mut session = Self {
                        client,
                        endpoint,
                        session_id: Some(session_id),
                    };
                    session.set_window_rect(options.window_width, options.window_height)?;
                    info!(session_id = %session.id(), "Browser session ready");
                    return Ok(session);
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Browser session setup failed");
                    last_error = Some(e);
                    if attempt < attempts {
                        std::thread::sleep(options.setup_retry_pause);
                    }
                }
            }
        }
        Err(SessionError::Setup(
            last_error.map(|e| e.to_string()).unwrap_or_default(),
        ))
    }

    fn id(&self) -> &str {
        self.session_id.as_deref().unwrap_or("<closed>")
    }

    fn session_url(&self, path: &str) -> SessionResult<String> {
        let id = self.session_id.as_deref().ok_or(SessionError::Closed)?;
        Ok(format!("{}/session/{}{}", self.endpoint, id, path))
    }

    fn command(&self, method: Method, path: &str, body: Option<Value>) -> SessionResult<Value> {
        let url = self.session_url(path)?;
        send(&self.client, method, &url, body)
    }

    fn set_window_rect(&mut self, width: u32, height: u32) -> SessionResult<()> {
        self.command(
            Method::POST,
            "/window/rect",
            Some(json!({ "width": width, "height": height })),
        )
        .map(|_| ())
    }
}

impl ElementQuery for WebDriverSession {
    type Element = WebElement;

    fn find_child(
        &mut self,
        parent: &WebElement,
        locator: &str,
    ) -> SessionResult<Option<WebElement>> {
        let result = self.command(
            Method::POST,
            &format!("/element/{}/element", parent.0),
            Some(json!({ "using": "css selector", "value": locator })),
        );
        match result {
            Ok(value) => element_ref(&value).map(Some),
            Err(e) if is_locator_miss(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn text(&mut self, element: &WebElement) -> SessionResult<String> {
        match self.command(Method::GET, &format!("/element/{}/text", element.0), None) {
            Ok(value) => Ok(value.as_str().unwrap_or_default().to_string()),
            // Element re-rendered since it was found: treat as empty.
            Err(e) if is_locator_miss(&e) => Ok(String::new()),
            Err(e) => Err(e),
        }
    }

    fn attribute(&mut self, element: &WebElement, name: &str) -> SessionResult<Option<String>> {
        match self.command(
            Method::GET,
            &format!("/element/{}/attribute/{}", element.0, name),
            None,
        ) {
            Ok(value) => Ok(value.as_str().map(String::from)),
            Err(e) if is_locator_miss(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl BrowserSession for WebDriverSession {
    fn navigate(&mut self, url: &str) -> SessionResult<()> {
        debug!(url = %url, "Navigating");
        self.command(Method::POST, "/url", Some(json!({ "url": url })))
            .map(|_| ())
    }

    fn execute(&mut self, script: &str) -> SessionResult<Value> {
        self.command(
            Method::POST,
            "/execute/sync",
            Some(json!({ "script": script, "args": [] })),
        )
    }

    fn find_all(&mut self, locator: &str) -> SessionResult<Vec<WebElement>> {
        let value = self.command(
            Method::POST,
            "/elements",
            Some(json!({ "using": "css selector", "value": locator })),
        )?;
        let items = value.as_array().ok_or_else(|| {
            SessionError::UnexpectedResponse(format!("expected element list, got {value}"))
        })?;
        items.iter().map(element_ref).collect()
    }

    fn close(&mut self) -> SessionResult<()> {
        let Some(id) = self.session_id.take() else {
            return Ok(());
        };
        let url = format!("{}/session/{}", self.endpoint, id);
        send(&self.client, Method::DELETE, &url, None)?;
        info!(session_id = %id, "Browser session closed");
        Ok(())
    }
}

impl Drop for WebDriverSession {
    fn drop(&mut self) {
        if self.session_id.is_some() {
            if let Err(e) = self.close() {
                warn!(error = %e, "Failed to close browser session on drop");
            }
        }
    }
}

fn create_session(
    client: &Client,
    endpoint: &str,
    options: &WebDriverOptions,
) -> SessionResult<String> {
    let value = send(
        client,
        Method::POST,
        &format!("{endpoint}/session"),
        Some(options.capabilities()),
    )?;
    value
        .get("sessionId")
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| SessionError::UnexpectedResponse(format!("no sessionId in {value}")))
}

/// Send a command and unwrap the `value` envelope.
fn send(client: &Client, method: Method, url: &str, body: Option<Value>) -> SessionResult<Value> {
    let mut request = client.request(method, url);
    if let Some(body) = body {
        request = request.json(&body);
    }
    let response = request
        .send()
        .map_err(|e| SessionError::Transport(Box::new(e)))?;
    let status = response.status();
    let payload: Value = response
        .json()
        .map_err(|e| SessionError::Transport(Box::new(e)))?;
    unwrap_value(status.is_success(), payload)
}

fn unwrap_value(success: bool, mut payload: Value) -> SessionResult<Value> {
    let value = payload.get_mut("value").map(Value::take).unwrap_or(Value::Null);
    if let Some(error) = value.get("error").and_then(Value::as_str) {
        return Err(SessionError::Protocol {
            error: error.to_string(),
            message: value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        });
    }
    if !success {
        return Err(SessionError::UnexpectedResponse(format!(
            "error status without error body: {value}"
        )));
    }
    Ok(value)
}

fn element_ref(value: &Value) -> SessionResult<WebElement> {
    value
        .get(ELEMENT_KEY)
        .and_then(Value::as_str)
        .map(|id| WebElement(id.to_string()))
        .ok_or_else(|| SessionError::UnexpectedResponse(format!("not an element: {value}")))
}

/// Lookups that failed because the element is not (or no longer) there.
fn is_locator_miss(error: &SessionError) -> bool {
    matches!(
        error,
        SessionError::Protocol { error, .. }
            if error == "no such element" || error == "stale element reference"
    )
}
