//! Page driver capability and its implementations.
//!
//! The fetcher only needs three things from a browser: go to an address, read
//! back the current markup, and halt outstanding resource loads. `WebDriverSession`
//! provides them over the W3C WebDriver protocol against an already-running
//! driver endpoint (chromedriver etc.); `HttpDriver` is a plain GET for pages
//! that don't need script rendering.

use reqwest::Method;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

use crate::config::BrowserConfig;
use crate::error::Result as CrateResult;

/// W3C element reference key
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WebDriver error '{error}': {message}")]
    WebDriver { error: String, message: String },

    #[error("HTTP status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Unexpected driver response: {0}")]
    Protocol(String),

    #[error("No page has been loaded")]
    NoPage,

    #[error("{0} is not supported by this driver")]
    Unsupported(&'static str),
}

/// What the retrying fetcher drives
#[allow(async_fn_in_trait)]
pub trait PageDriver {
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError>;

    async fn current_markup(&mut self) -> Result<String, DriverError>;

    async fn stop_loading(&mut self) -> Result<(), DriverError>;

    /// Click the element with the given DOM id on the current page
    async fn click(&mut self, _element_id: &str) -> Result<(), DriverError> {
        Err(DriverError::Unsupported("clicking page elements"))
    }

    /// Release the underlying session. Called exactly once, on every exit path.
    async fn quit(&mut self) -> Result<(), DriverError> {
        Ok(())
    }
}

/// Lend a driver without giving up ownership
impl<D: PageDriver> PageDriver for &mut D {
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
        (**self).navigate(url).await
    }

    async fn current_markup(&mut self) -> Result<String, DriverError> {
        (**self).current_markup().await
    }

    async fn stop_loading(&mut self) -> Result<(), DriverError> {
        (**self).stop_loading().await
    }

    async fn click(&mut self, element_id: &str) -> Result<(), DriverError> {
        (**self).click(element_id).await
    }

    async fn quit(&mut self) -> Result<(), DriverError> {
        (**self).quit().await
    }
}

// ── WebDriver ────────────────────────────────────────────────────────────────

pub struct WebDriverSession {
    client: reqwest::Client,
    endpoint: String,
    session_id: String,
    closed: bool,
}

impl WebDriverSession {
    /// Open a new browser session on `browser.webdriver_url`
    pub async fn start(
        browser: &BrowserConfig,
        page_load_timeout: Duration,
    ) -> Result<Self, DriverError> {
        let client = reqwest::Client::builder()
            .timeout(page_load_timeout + Duration::from_secs(30))
            .build()?;
        let endpoint = browser.webdriver_url.trim_end_matches('/').to_string();

        let resp = client
            .post(format!("{}/session", endpoint))
            .json(&new_session_body(browser, page_load_timeout))
            .send()
            .await?;
        let value = unwrap_response(resp).await?;

        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| DriverError::Protocol(format!("no sessionId in {}", value)))?
            .to_string();

        tracing::info!(session = %session_id, endpoint = %endpoint, "Browser session started");
        Ok(Self {
            client,
            endpoint,
            session_id,
            closed: false,
        })
    }

    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, DriverError> {
        let url = format!("{}/session/{}{}", self.endpoint, self.session_id, path);
        let mut req = self.client.request(method, &url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let resp = req.send().await?;
        unwrap_response(resp).await
    }
}

fn new_session_body(browser: &BrowserConfig, page_load_timeout: Duration) -> Value {
    json!({
        "capabilities": {
            "alwaysMatch": {
                "browserName": "chrome",
                "pageLoadStrategy": browser.page_load_strategy,
                "timeouts": { "pageLoad": page_load_timeout.as_millis() as u64 },
                "goog:chromeOptions": { "args": browser.chrome_args() },
            }
        }
    })
}

/// Status check plus the W3C `{"value": ...}` envelope
async fn unwrap_response(resp: reqwest::Response) -> Result<Value, DriverError> {
    let status = resp.status();
    let body: Value = resp.json().await?;
    let value = body.get("value").cloned().unwrap_or(Value::Null);

    if !status.is_success() {
        let field = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string()
        };
        return Err(DriverError::WebDriver {
            error: field("error"),
            message: field("message"),
        });
    }

    // Legacy JSON-wire servers put sessionId next to value
    if let (Some(id), Value::Object(mut map)) = (body.get("sessionId"), value.clone()) {
        if !map.contains_key("sessionId") {
            map.insert("sessionId".to_string(), id.clone());
            return Ok(Value::Object(map));
        }
    }
    Ok(value)
}

impl PageDriver for WebDriverSession {
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
        self.command(Method::POST, "/url", Some(json!({ "url": url })))
            .await
            .map(|_| ())
    }

    async fn current_markup(&mut self) -> Result<String, DriverError> {
        match self.command(Method::GET, "/source", None).await? {
            Value::String(source) => Ok(source),
            other => Err(DriverError::Protocol(format!("page source was {}", other))),
        }
    }

    async fn stop_loading(&mut self) -> Result<(), DriverError> {
        self.command(
            Method::POST,
            "/execute/sync",
            Some(json!({ "script": "window.stop();", "args": [] })),
        )
        .await
        .map(|_| ())
    }

    async fn click(&mut self, element_id: &str) -> Result<(), DriverError> {
        let selector = format!("[id=\"{}\"]", element_id);
        let found = self
            .command(
                Method::POST,
                "/element",
                Some(json!({ "using": "css selector", "value": selector })),
            )
            .await?;
        let reference = element_reference(&found)
            .ok_or_else(|| DriverError::Protocol(format!("no element reference in {}", found)))?
            .to_string();

        self.command(Method::POST, &format!("/element/{}/click", reference), Some(json!({})))
            .await
            .map(|_| ())
    }

    async fn quit(&mut self) -> Result<(), DriverError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let url = format!("{}/session/{}", self.endpoint, self.session_id);
        let resp = self.client.delete(&url).send().await?;
        unwrap_response(resp).await?;
        tracing::info!(session = %self.session_id, "Browser session closed");
        Ok(())
    }
}

/// Element id from a find-element response (W3C key, or the legacy `ELEMENT`)
fn element_reference(value: &Value) -> Option<&str> {
    value
        .get(ELEMENT_KEY)
        .or_else(|| value.get("ELEMENT"))
        .and_then(Value::as_str)
}

impl Drop for WebDriverSession {
    fn drop(&mut self) {
        if !self.closed {
            tracing::warn!(session = %self.session_id, "Browser session dropped without quit");
        }
    }
}

// ── Plain HTTP ───────────────────────────────────────────────────────────────

pub struct HttpDriver {
    client: reqwest::Client,
    page: Option<String>,
}

impl HttpDriver {
    pub fn new(browser: &BrowserConfig, timeout: Duration) -> Result<Self, DriverError> {
        let mut builder = reqwest::Client::builder().timeout(timeout);
        if let Some(ua) = browser.user_agent.as_deref() {
            builder = builder.user_agent(ua);
        }
        if let Some(proxy) = browser.proxy_server.as_deref().filter(|p| !p.is_empty()) {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }
        Ok(Self {
            client: builder.build()?,
            page: None,
        })
    }
}

impl PageDriver for HttpDriver {
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
        self.page = None;
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(DriverError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        self.page = Some(resp.text().await?);
        Ok(())
    }

    async fn current_markup(&mut self) -> Result<String, DriverError> {
        self.page.clone().ok_or(DriverError::NoPage)
    }

    async fn stop_loading(&mut self) -> Result<(), DriverError> {
        // body is already complete
        Ok(())
    }
}

// ── Runtime choice ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    WebDriver,
    Http,
}

/// Driver picked on the command line
pub enum BrowserDriver {
    WebDriver(WebDriverSession),
    Http(HttpDriver),
}

impl BrowserDriver {
    pub async fn start(
        kind: DriverKind,
        browser: &BrowserConfig,
        page_load_timeout: Duration,
    ) -> CrateResult<Self> {
        let driver = match kind {
            DriverKind::WebDriver => {
                Self::WebDriver(WebDriverSession::start(browser, page_load_timeout).await?)
            }
            DriverKind::Http => Self::Http(HttpDriver::new(browser, page_load_timeout)?),
        };
        Ok(driver)
    }
}

impl PageDriver for BrowserDriver {
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
        match self {
            Self::WebDriver(d) => d.navigate(url).await,
            Self::Http(d) => d.navigate(url).await,
        }
    }

    async fn current_markup(&mut self) -> Result<String, DriverError> {
        match self {
            Self::WebDriver(d) => d.current_markup().await,
            Self::Http(d) => d.current_markup().await,
        }
    }

    async fn stop_loading(&mut self) -> Result<(), DriverError> {
        match self {
            Self::WebDriver(d) => d.stop_loading().await,
            Self::Http(d) => d.stop_loading().await,
        }
    }

    async fn click(&mut self, element_id: &str) -> Result<(), DriverError> {
        match self {
            Self::WebDriver(d) => d.click(element_id).await,
            Self::Http(d) => d.click(element_id).await,
        }
    }

    async fn quit(&mut self) -> Result<(), DriverError> {
        match self {
            Self::WebDriver(d) => d.quit().await,
            Self::Http(d) => d.quit().await,
        }
    }
}
