//! [`SearchDriver`] over the W3C WebDriver protocol.
//!
//! Talks JSON to a running `chromedriver` / `geckodriver` with `reqwest`.
//! One WebDriver session backs the whole run; every [`SessionHandle`] is a
//! window handle inside it. The driver tracks which window is focused and
//! switches before each command.
//!
//! Page interaction goes through the scripts in [`scripts`]. Row
//! extraction returns raw cells and the page text; the reported total is
//! parsed here with the configured `page.total_patterns`.
//!
//! Print-triggered downloads land in `webdriver.download_dir` (configured as
//! the browser's download directory) and are moved to the artifact path once
//! the browser finishes writing them.

pub mod scripts;

use anyhow::Context;
use async_trait::async_trait;
use base64::Engine;
use indexmap::IndexMap;
use regex::Regex;
use reqwest::Method;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::{Config, PageConfig};
use crate::error::DriverError;
use crate::models::{ExtractedBatch, PageSignals, Row, RowHints};
use crate::traits::{DetailOpening, SearchDriver, SessionCookie, SessionHandle};

/// Key under which WebDriver serializes element references.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecc";

const POLL: Duration = Duration::from_millis(250);

/// Suffixes of files a browser is still writing.
const PARTIAL_SUFFIXES: [&str; 4] = [".crdownload", ".part", ".tmp", ".download"];

/// Readiness reported by `GET /status`.
#[derive(Debug, Clone)]
pub struct EndpointStatus {
    pub ready: bool,
    pub message: String,
}

pub struct WebDriverDriver {
    http: reqwest::Client,
    endpoint: String,
    browser: String,
    headless: bool,
    download_dir: PathBuf,
    load_timeout: Duration,
    page: PageConfig,
    totals: Vec<Regex>,
    session_id: Mutex<Option<String>>,
    focused: Mutex<Option<String>>,
}

impl WebDriverDriver {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(config.webdriver.request_timeout_secs);
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        let totals = config
            .page
            .total_patterns
            .iter()
            .map(|p| Regex::new(p).with_context(|| format!("invalid total pattern '{}'", p)))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let download_dir = absolute(&config.webdriver.download_dir)?;

        Ok(Self {
            http,
            endpoint: config.webdriver.endpoint.trim_end_matches('/').to_string(),
            browser: config.webdriver.browser.to_lowercase(),
            headless: config.webdriver.headless,
            download_dir,
            load_timeout: timeout,
            page: config.page.clone(),
            totals,
            session_id: Mutex::new(None),
            focused: Mutex::new(None),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Queries `GET /status` without creating a session.
    pub async fn status(&self) -> Result<EndpointStatus, DriverError> {
        let url = format!("{}/status", self.endpoint);
        let value = self
            .send(Method::GET, url, None)
            .await
            .map_err(|e| DriverError::Unavailable(format!("{}: {}", self.endpoint, e)))?;
        Ok(EndpointStatus {
            ready: value.get("ready").and_then(Value::as_bool).unwrap_or(false),
            message: value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
        })
    }

    // ── transport ──────────────────────────────────────────────────────

    async fn send(
        &self,
        method: Method,
        url: String,
        body: Option<Value>,
    ) -> Result<Value, DriverError> {
        let mut request = self.http.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await?;
        let status = response.status();
        let json: Value = response.json().await?;
        let value = json.get("value").cloned().unwrap_or(Value::Null);
        if !status.is_success() {
            return Err(protocol_error(&value));
        }
        Ok(value)
    }

    async fn session_id(&self) -> Result<String, DriverError> {
        self.session_id
            .lock()
            .await
            .clone()
            .ok_or_else(|| DriverError::Unavailable("no active webdriver session".into()))
    }

    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, DriverError> {
        let sid = self.session_id().await?;
        let url = format!("{}/session/{}{}", self.endpoint, sid, path);
        self.send(method, url, body).await
    }

    async fn focus(&self, session: &SessionHandle) -> Result<(), DriverError> {
        let mut focused = self.focused.lock().await;
        if focused.as_deref() != Some(session.id()) {
            self.command(
                Method::POST,
                "/window",
                Some(json!({ "handle": session.id() })),
            )
            .await?;
            *focused = Some(session.id().to_string());
        }
        Ok(())
    }

    async fn execute(
        &self,
        session: &SessionHandle,
        script: &str,
        args: Value,
    ) -> Result<Value, DriverError> {
        self.focus(session).await?;
        self.command(
            Method::POST,
            "/execute/sync",
            Some(json!({ "script": script, "args": args })),
        )
        .await
    }

    async fn window_handles(&self) -> Result<Vec<String>, DriverError> {
        let value = self.command(Method::GET, "/window/handles", None).await?;
        Ok(value
            .as_array()
            .map(|a| a.iter().filter_map(|h| h.as_str().map(String::from)).collect())
            .unwrap_or_default())
    }

    // ── elements ───────────────────────────────────────────────────────

    async fn first_visible(
        &self,
        session: &SessionHandle,
        selectors: &[String],
        require_enabled: bool,
    ) -> Result<Option<String>, DriverError> {
        let value = self
            .execute(session, scripts::FIRST_VISIBLE, json!([selectors, require_enabled]))
            .await?;
        Ok(element_id(&value))
    }

    async fn element_command(
        &self,
        element: &str,
        action: &str,
        body: Value,
    ) -> Result<Value, DriverError> {
        let path = format!("/element/{}/{}", element, action);
        self.command(Method::POST, &path, Some(body)).await
    }

    async fn search_enabled(&self, session: &SessionHandle) -> Result<bool, DriverError> {
        Ok(self
            .first_visible(session, &self.page.search_button_selectors, true)
            .await?
            .is_some())
    }

    async fn drag_slider(&self, session: &SessionHandle, handle: &str) -> Result<(), DriverError> {
        let travel = self
            .execute(
                session,
                "const h = arguments[0]; const t = h.parentElement; \
                 return Math.round(t ? t.getBoundingClientRect().width : 300);",
                json!([{ ELEMENT_KEY: handle }]),
            )
            .await?
            .as_i64()
            .unwrap_or(300);

        let actions = json!({
            "actions": [{
                "type": "pointer",
                "id": "mouse",
                "parameters": { "pointerType": "mouse" },
                "actions": [
                    { "type": "pointerMove", "duration": 0, "origin": { ELEMENT_KEY: handle }, "x": 0, "y": 0 },
                    { "type": "pointerDown", "button": 0 },
                    { "type": "pointerMove", "duration": 400, "origin": "pointer", "x": travel, "y": 0 },
                    { "type": "pointerUp", "button": 0 }
                ]
            }]
        });
        self.command(Method::POST, "/actions", Some(actions)).await?;
        self.command(Method::DELETE, "/actions", None).await?;
        Ok(())
    }

    /// Waits for `document.readyState == "complete"` in `session`. Errors
    /// count as "not ready yet".
    async fn wait_ready(&self, session: &SessionHandle, deadline: Instant) -> bool {
        loop {
            match self.execute(session, scripts::READY_STATE, json!([])).await {
                Ok(state) if state.as_str() == Some("complete") => return true,
                Ok(_) => {}
                Err(e) => debug!(context = session.id(), error = %e, "readyState probe failed"),
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(POLL).await;
        }
    }

    /// Closes windows that appeared since `before`, then refocuses `session`.
    async fn close_stray_windows(&self, session: &SessionHandle, before: &[String]) {
        let Ok(now) = self.window_handles().await else {
            return;
        };
        for handle in now.into_iter().filter(|h| !before.contains(h)) {
            if let Err(e) = self.close_context(SessionHandle::new(handle)).await {
                debug!(error = %e, "failed to close stray window");
            }
        }
        if let Err(e) = self.focus(session).await {
            debug!(error = %e, "failed to refocus listing");
        }
    }
}

#[async_trait]
impl SearchDriver for WebDriverDriver {
    async fn start(&self) -> Result<SessionHandle, DriverError> {
        std::fs::create_dir_all(&self.download_dir)?;
        let caps = capabilities(&self.browser, self.headless, &self.download_dir);
        let url = format!("{}/session", self.endpoint);
        let value = match self.send(Method::POST, url, Some(caps)).await {
            Ok(v) => v,
            Err(DriverError::Http(e)) => {
                return Err(DriverError::Unavailable(format!("{}: {}", self.endpoint, e)))
            }
            Err(DriverError::Protocol(m)) => return Err(DriverError::Unavailable(m)),
            Err(e) => return Err(e),
        };
        let sid = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| DriverError::Protocol("new session response has no sessionId".into()))?
            .to_string();
        info!(session = %sid, browser = %self.browser, headless = self.headless, "webdriver session started");
        *self.session_id.lock().await = Some(sid);

        let ms = self.load_timeout.as_millis() as u64;
        self.command(
            Method::POST,
            "/timeouts",
            Some(json!({ "pageLoad": ms, "script": ms })),
        )
        .await?;

        let handle = self.command(Method::GET, "/window", None).await?;
        let handle = handle
            .as_str()
            .ok_or_else(|| DriverError::Protocol("window handle is not a string".into()))?
            .to_string();
        *self.focused.lock().await = Some(handle.clone());
        Ok(SessionHandle::new(handle))
    }

    async fn shutdown(&self, session: SessionHandle) -> Result<(), DriverError> {
        drop(session);
        let sid = self.session_id.lock().await.take();
        *self.focused.lock().await = None;
        if let Some(sid) = sid {
            let url = format!("{}/session/{}", self.endpoint, sid);
            self.send(Method::DELETE, url, None).await?;
            info!(session = %sid, "webdriver session closed");
        }
        Ok(())
    }

    async fn navigate(&self, session: &SessionHandle, url: &str) -> Result<(), DriverError> {
        self.focus(session).await?;
        self.command(Method::POST, "/url", Some(json!({ "url": url })))
            .await?;
        Ok(())
    }

    async fn current_url(&self, session: &SessionHandle) -> Result<String, DriverError> {
        self.focus(session).await?;
        let value = self.command(Method::GET, "/url", None).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn fill_search_field(
        &self,
        session: &SessionHandle,
        text: &str,
    ) -> Result<(), DriverError> {
        let Some(input) = self
            .first_visible(session, &self.page.search_input_selectors, false)
            .await?
        else {
            return Err(DriverError::ControlsMissing("no visible search input".into()));
        };
        self.element_command(&input, "click", json!({})).await?;
        self.element_command(&input, "clear", json!({})).await?;
        self.element_command(&input, "value", json!({ "text": text }))
            .await?;
        Ok(())
    }

    async fn dispatch_input_events(&self, session: &SessionHandle) -> Result<(), DriverError> {
        self.execute(
            session,
            scripts::DISPATCH_INPUT_EVENTS,
            json!([self.page.search_input_selectors]),
        )
        .await?;
        Ok(())
    }

    async fn select_record_type(
        &self,
        session: &SessionHandle,
        label_substring: &str,
    ) -> Result<bool, DriverError> {
        let value = self
            .execute(session, scripts::SELECT_OPTION, json!([label_substring]))
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn unlock_search(
        &self,
        session: &SessionHandle,
        timeout: Duration,
    ) -> Result<bool, DriverError> {
        if self.search_enabled(session).await? {
            return Ok(true);
        }
        for selector in &self.page.slider_selectors {
            let Some(handle) = self
                .first_visible(session, std::slice::from_ref(selector), false)
                .await?
            else {
                continue;
            };
            if let Err(e) = self.drag_slider(session, &handle).await {
                debug!(selector = %selector, error = %e, "slider drag failed");
                continue;
            }
            tokio::time::sleep(timeout).await;
            if self.search_enabled(session).await? {
                return Ok(true);
            }
        }
        self.wait_for_search_enabled(session, timeout).await
    }

    async fn wait_for_search_enabled(
        &self,
        session: &SessionHandle,
        timeout: Duration,
    ) -> Result<bool, DriverError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.search_enabled(session).await? {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(POLL).await;
        }
    }

    async fn submit_search(
        &self,
        session: &SessionHandle,
        allow_force_submit: bool,
    ) -> Result<(), DriverError> {
        if let Some(button) = self
            .first_visible(session, &self.page.search_button_selectors, true)
            .await?
        {
            self.element_command(&button, "click", json!({})).await?;
            return Ok(());
        }
        if allow_force_submit {
            let forced = self
                .execute(
                    session,
                    scripts::FORCE_SUBMIT,
                    json!([
                        self.page.search_button_selectors,
                        self.page.search_input_selectors
                    ]),
                )
                .await?;
            if forced.as_bool() == Some(true) {
                debug!("search submitted through the form");
                return Ok(());
            }
        }
        let state = self
            .execute(
                session,
                scripts::SUBMIT_STATE,
                json!([self.page.search_button_selectors]),
            )
            .await?;
        Err(DriverError::ControlsMissing(
            state.as_str().unwrap_or("search button unusable").to_string(),
        ))
    }

    async fn wait_for_results_ready(
        &self,
        session: &SessionHandle,
        timeout: Duration,
    ) -> Result<bool, DriverError> {
        let deadline = Instant::now() + timeout;
        loop {
            let ready = self
                .execute(
                    session,
                    scripts::RESULTS_READY,
                    json!([self.page.no_results_markers]),
                )
                .await?;
            if ready.as_bool() == Some(true) {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(POLL).await;
        }
    }

    async fn extract_rows(&self, session: &SessionHandle) -> Result<ExtractedBatch, DriverError> {
        let value = self
            .execute(
                session,
                scripts::EXTRACT_ROWS,
                json!([self.page.detail_control_markers]),
            )
            .await?;
        parse_extraction(&value, &self.totals)
    }

    async fn resolve_detail_from_row(
        &self,
        session: &SessionHandle,
        row_index: usize,
        timeout: Duration,
    ) -> Result<DetailOpening, DriverError> {
        let before_handles = self.window_handles().await?;
        let before_url = self.current_url(session).await?;

        let clicked = self
            .execute(
                session,
                scripts::CLICK_ROW_DETAIL,
                json!([row_index, self.page.detail_control_markers]),
            )
            .await?;
        if clicked.get("ok").and_then(Value::as_bool) != Some(true) {
            let reason = clicked
                .get("reason")
                .and_then(Value::as_str)
                .unwrap_or("click-failed");
            return Ok(DetailOpening::NoEffect(reason.to_string()));
        }

        let deadline = Instant::now() + timeout;
        loop {
            let handles = self.window_handles().await?;
            if let Some(new) = handles.into_iter().find(|h| !before_handles.contains(h)) {
                let context = SessionHandle::new(new);
                self.wait_ready(&context, deadline).await;
                return Ok(DetailOpening::NewContext(context));
            }
            if self.current_url(session).await? != before_url {
                self.wait_ready(session, deadline).await;
                return Ok(DetailOpening::InPlace);
            }
            if Instant::now() >= deadline {
                return Ok(DetailOpening::NoEffect("no new context or navigation".into()));
            }
            tokio::time::sleep(POLL).await;
        }
    }

    async fn open_context(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<SessionHandle, DriverError> {
        let value = self
            .command(Method::POST, "/window/new", Some(json!({ "type": "tab" })))
            .await?;
        let handle = value
            .get("handle")
            .and_then(Value::as_str)
            .ok_or_else(|| DriverError::Protocol("new window response has no handle".into()))?;
        let context = SessionHandle::new(handle);

        let navigated = match self.focus(&context).await {
            Ok(()) => self
                .command(Method::POST, "/url", Some(json!({ "url": url })))
                .await
                .map(|_| ()),
            Err(e) => Err(e),
        };
        if let Err(e) = navigated {
            if let Err(close) = self.close_context(context).await {
                debug!(error = %close, "failed to close context after navigation error");
            }
            return Err(e);
        }
        self.wait_ready(&context, Instant::now() + timeout).await;
        Ok(context)
    }

    async fn close_context(&self, context: SessionHandle) -> Result<(), DriverError> {
        self.focus(&context).await?;
        let result = self.command(Method::DELETE, "/window", None).await;
        *self.focused.lock().await = None;
        result.map(|_| ())
    }

    async fn restore_listing(
        &self,
        session: &SessionHandle,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        self.focus(session).await?;
        self.command(Method::POST, "/back", Some(json!({}))).await?;
        if !self.wait_for_results_ready(session, timeout).await? {
            debug!("listing not ready after navigating back");
        }
        Ok(())
    }

    async fn session_cookies(&self, session: &SessionHandle) -> Result<Vec<SessionCookie>, DriverError> {
        self.focus(session).await?;
        let value = self.command(Method::GET, "/cookie", None).await?;
        Ok(parse_cookies(&value))
    }

    async fn page_signals(
        &self,
        session: &SessionHandle,
        weak_visual_selectors: &[String],
    ) -> Result<PageSignals, DriverError> {
        let value = self
            .execute(session, scripts::PAGE_SIGNALS, json!([weak_visual_selectors]))
            .await?;
        Ok(PageSignals {
            url: value
                .get("url")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            text: value
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            has_weak_visual_marker: value.get("visual").and_then(Value::as_bool).unwrap_or(false),
        })
    }

    async fn discover_embedded_document_links(
        &self,
        session: &SessionHandle,
        markers: &[String],
    ) -> Result<Vec<String>, DriverError> {
        let value = self
            .execute(session, scripts::EMBEDDED_LINKS, json!([markers]))
            .await?;
        Ok(value
            .as_array()
            .map(|a| a.iter().filter_map(|u| u.as_str().map(String::from)).collect())
            .unwrap_or_default())
    }

    async fn trigger_print_download(
        &self,
        session: &SessionHandle,
        destination: &Path,
        timeout: Duration,
    ) -> Result<bool, DriverError> {
        let controls = self
            .execute(
                session,
                scripts::PRINT_CONTROLS,
                json!([
                    self.page.print_control_selectors,
                    self.page.print_control_texts
                ]),
            )
            .await?;
        let ids: Vec<String> = controls
            .as_array()
            .map(|a| a.iter().filter_map(element_id).collect())
            .unwrap_or_default();

        for id in ids {
            let windows = self.window_handles().await?;
            let before = snapshot(&self.download_dir)?;
            if let Err(e) = self.element_command(&id, "click", json!({})).await {
                debug!(error = %e, "print control click failed");
                continue;
            }
            let found = wait_for_download(&self.download_dir, &before, timeout).await?;
            self.close_stray_windows(session, &windows).await;
            if let Some(file) = found {
                move_into(&file, destination)?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn render_current_page_to_document(
        &self,
        session: &SessionHandle,
        destination: &Path,
    ) -> Result<bool, DriverError> {
        self.focus(session).await?;
        let value = self
            .command(
                Method::POST,
                "/print",
                Some(json!({ "background": true, "orientation": "portrait" })),
            )
            .await?;
        let Some(encoded) = value.as_str() else {
            return Ok(false);
        };
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| DriverError::Protocol(format!("print payload is not base64: {}", e)))?;
        if bytes.is_empty() {
            return Ok(false);
        }
        write_atomically(destination, &bytes)?;
        Ok(true)
    }
}

// ── pure helpers ──────────────────────────────────────────────────────

fn absolute(path: &Path) -> anyhow::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

fn element_id(value: &Value) -> Option<String> {
    value
        .get(ELEMENT_KEY)
        .and_then(Value::as_str)
        .map(String::from)
}

/// Reads the `GET /cookie` payload; entries without a name are dropped.
pub fn parse_cookies(value: &Value) -> Vec<SessionCookie> {
    let field = |c: &Value, key: &str| c.get(key).and_then(Value::as_str).unwrap_or("").to_string();
    value
        .as_array()
        .map(|a| {
            a.iter()
                .filter(|c| !field(c, "name").is_empty())
                .map(|c| SessionCookie::new(field(c, "name"), field(c, "value"), field(c, "domain")))
                .collect()
        })
        .unwrap_or_default()
}

/// Maps a WebDriver error payload onto [`DriverError`]. A dead session is
/// reported as [`DriverError::Unavailable`] so the run stops.
fn protocol_error(value: &Value) -> DriverError {
    let code = value
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown error");
    let message = value.get("message").and_then(Value::as_str).unwrap_or("");
    let detail = format!("{}: {}", code, message);
    match code {
        "invalid session id" | "session not created" => DriverError::Unavailable(detail),
        _ => DriverError::Protocol(detail),
    }
}

/// New-session capabilities for `browser` with downloads routed to `dir`.
pub fn capabilities(browser: &str, headless: bool, dir: &Path) -> Value {
    let dir = dir.to_string_lossy();
    if browser == "firefox" {
        let args: Vec<&str> = if headless { vec!["-headless"] } else { vec![] };
        json!({
            "capabilities": { "alwaysMatch": {
                "browserName": "firefox",
                "moz:firefoxOptions": {
                    "args": args,
                    "prefs": {
                        "browser.download.folderList": 2,
                        "browser.download.dir": dir,
                        "browser.download.useDownloadDir": true,
                        "browser.helperApps.neverAsk.saveToDisk": "application/pdf,application/octet-stream",
                        "pdfjs.disabled": true
                    }
                }
            }}
        })
    } else {
        let mut args = vec!["--window-size=1400,1000"];
        if headless {
            args.push("--headless=new");
        }
        json!({
            "capabilities": { "alwaysMatch": {
                "browserName": "chrome",
                "goog:chromeOptions": {
                    "args": args,
                    "prefs": {
                        "download.default_directory": dir,
                        "download.prompt_for_download": false,
                        "plugins.always_open_pdf_externally": true
                    }
                }
            }}
        })
    }
}

/// First capture of the first matching pattern, as a count.
pub fn reported_total(text: &str, patterns: &[Regex]) -> Option<usize> {
    patterns.iter().find_map(|re| {
        re.captures(text)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
    })
}

/// Turns the `EXTRACT_ROWS` payload into a batch.
pub fn parse_extraction(value: &Value, totals: &[Regex]) -> Result<ExtractedBatch, DriverError> {
    let raw_rows = value
        .get("rows")
        .and_then(Value::as_array)
        .ok_or_else(|| DriverError::Protocol("row extraction returned no rows array".into()))?;

    let mut rows = Vec::with_capacity(raw_rows.len());
    for raw in raw_rows {
        let mut fields = IndexMap::new();
        let cells = raw.get("cells").and_then(Value::as_array);
        for (idx, cell) in cells.into_iter().flatten().enumerate() {
            let (Some(label), Some(text)) = (
                cell.get(0).and_then(Value::as_str),
                cell.get(1).and_then(Value::as_str),
            ) else {
                continue;
            };
            let label = if fields.contains_key(label) {
                format!("{}_{}", label, idx + 1)
            } else {
                label.to_string()
            };
            fields.insert(label, text.to_string());
        }

        let detail = raw.get("detail").filter(|d| d.is_object());
        let hint = |key: &str| {
            detail
                .and_then(|d| d.get(key))
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string()
        };
        let hints = RowHints {
            detail_url: hint("url"),
            detail_href: hint("href"),
            detail_text: hint("text"),
            detail_script: hint("onclick"),
            position: raw.get("index").and_then(Value::as_u64).unwrap_or(0) as usize,
        };
        rows.push(Row::new(fields, hints));
    }

    let body = value.get("bodyText").and_then(Value::as_str).unwrap_or("");
    let url = value.get("url").and_then(Value::as_str).unwrap_or("");
    Ok(ExtractedBatch::new(rows, reported_total(body, totals)).with_listing_url(url))
}

fn snapshot(dir: &Path) -> Result<HashSet<PathBuf>, DriverError> {
    let mut seen = HashSet::new();
    for entry in std::fs::read_dir(dir)? {
        seen.insert(entry?.path());
    }
    Ok(seen)
}

fn is_partial(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    PARTIAL_SUFFIXES.iter().any(|s| name.ends_with(s))
}

/// Polls `dir` for a completed, non-empty file absent from `before`.
async fn wait_for_download(
    dir: &Path,
    before: &HashSet<PathBuf>,
    timeout: Duration,
) -> Result<Option<PathBuf>, DriverError> {
    let deadline = Instant::now() + timeout;
    loop {
        let mut pending = false;
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if before.contains(&path) {
                continue;
            }
            if is_partial(&path) {
                pending = true;
                continue;
            }
            if std::fs::metadata(&path).map(|m| m.is_file() && m.len() > 0)? {
                return Ok(Some(path));
            }
        }
        if Instant::now() >= deadline {
            if pending {
                debug!(dir = %dir.display(), "download still in progress at deadline");
            }
            return Ok(None);
        }
        tokio::time::sleep(POLL).await;
    }
}

fn part_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}

fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

fn write_atomically(destination: &Path, bytes: &[u8]) -> std::io::Result<()> {
    ensure_parent(destination)?;
    let part = part_path(destination);
    std::fs::write(&part, bytes)?;
    std::fs::rename(&part, destination)
}

/// Moves a finished download to `destination`, copying across filesystems.
fn move_into(source: &Path, destination: &Path) -> std::io::Result<()> {
    ensure_parent(destination)?;
    if std::fs::rename(source, destination).is_ok() {
        return Ok(());
    }
    let part = part_path(destination);
    std::fs::copy(source, &part)?;
    std::fs::rename(&part, destination)?;
    std::fs::remove_file(source)
}
