//! Collaborator traits consumed by the explorer and the retrieval chain.
//!
//! The harvester never talks to a browser or the network directly. It goes
//! through three seams:
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │               Explorer                   │
//! │  search → extract → classify → merge     │
//! └──────┬──────────────────┬────────────────┘
//!        │                  │
//!        ▼                  ▼
//! ┌─────────────┐   ┌──────────────────┐   ┌─────────────────┐
//! │SearchDriver │   │ ArtifactChain    │──▶│ DocumentFetcher │
//! │ (WebDriver) │◀──│ tiers A / B / C  │   │   (reqwest)     │
//! └─────────────┘   └──────────────────┘   └─────────────────┘
//! ```
//!
//! Every driver call takes an explicit [`SessionHandle`]. The primary handle
//! comes from [`SearchDriver::start`]; secondary handles come from
//! [`SearchDriver::open_context`] or a [`DetailOpening::NewContext`] and are
//! consumed by [`SearchDriver::close_context`].

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

use crate::classifier::PageClassifier;
use crate::error::DriverError;
use crate::models::{ExtractedBatch, PageClass, PageSignals};

// ═══════════════════════════════════════════════════════════════════════
// Session handles
// ═══════════════════════════════════════════════════════════════════════

/// Opaque reference to one browsing context (a tab or window).
///
/// Deliberately not `Clone`: a secondary context has exactly one owner, and
/// closing it consumes the handle.
#[derive(Debug, PartialEq, Eq)]
pub struct SessionHandle {
    id: String,
}

impl SessionHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Outcome of activating a row's "open detail" control.
#[derive(Debug)]
pub enum DetailOpening {
    /// The control opened a new context, owned by the caller from now on.
    NewContext(SessionHandle),
    /// The listing session itself navigated to the detail view.
    InPlace,
    /// Nothing observable happened within the wait.
    NoEffect(String),
}

/// Response of a raw (non-rendered) fetch.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub url: String,
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
}

impl FetchedDocument {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A cookie held by a browsing context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    /// Cookie domain as the browser reports it; may carry a leading `.`.
    pub domain: String,
}

impl SessionCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
        }
    }

    /// Whether a request to `host` would carry this cookie.
    pub fn matches_host(&self, host: &str) -> bool {
        let domain = self.domain.trim_start_matches('.').to_lowercase();
        let host = host.to_lowercase();
        domain.is_empty() || host == domain || host.ends_with(&format!(".{}", domain))
    }
}

/// `Cookie` header value for a request to `url`, built from the cookies
/// whose domain covers the URL's host. `None` when nothing applies.
pub fn cookie_header(cookies: &[SessionCookie], url: &str) -> Option<String> {
    let host = url::Url::parse(url).ok()?.host_str()?.to_string();
    let pairs: Vec<String> = cookies
        .iter()
        .filter(|c| c.matches_host(&host))
        .map(|c| format!("{}={}", c.name, c.value))
        .collect();
    if pairs.is_empty() {
        None
    } else {
        Some(pairs.join("; "))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// SearchDriver
// ═══════════════════════════════════════════════════════════════════════

/// Form/session automation against the search origin.
///
/// Implementations own the browser. The harvester drives them from a single
/// task, one call at a time; no method is ever invoked concurrently.
///
/// Methods with default bodies describe capabilities an origin may not need
/// (no unlock gesture, no record-type selector).
#[async_trait]
pub trait SearchDriver: Send + Sync {
    /// Opens the primary session used for searching.
    async fn start(&self) -> Result<SessionHandle, DriverError>;

    /// Tears down the primary session and the browser behind it.
    async fn shutdown(&self, session: SessionHandle) -> Result<(), DriverError>;

    async fn navigate(&self, session: &SessionHandle, url: &str) -> Result<(), DriverError>;

    async fn current_url(&self, session: &SessionHandle) -> Result<String, DriverError>;

    /// Puts `text` into the search field. Fails with
    /// [`DriverError::ControlsMissing`] when no field is found.
    async fn fill_search_field(&self, session: &SessionHandle, text: &str)
        -> Result<(), DriverError>;

    /// Fires the input/change/keyup events some pages listen for.
    async fn dispatch_input_events(&self, session: &SessionHandle) -> Result<(), DriverError>;

    /// Selects the first record-type option whose label contains
    /// `label_substring`. Returns whether one was found.
    async fn select_record_type(
        &self,
        _session: &SessionHandle,
        _label_substring: &str,
    ) -> Result<bool, DriverError> {
        Ok(false)
    }

    /// Performs any gesture needed to enable the search control.
    async fn unlock_search(
        &self,
        _session: &SessionHandle,
        _timeout: Duration,
    ) -> Result<bool, DriverError> {
        Ok(true)
    }

    /// Polls until the search control becomes enabled.
    async fn wait_for_search_enabled(
        &self,
        _session: &SessionHandle,
        _timeout: Duration,
    ) -> Result<bool, DriverError> {
        Ok(true)
    }

    async fn submit_search(
        &self,
        session: &SessionHandle,
        allow_force_submit: bool,
    ) -> Result<(), DriverError>;

    /// Waits until a result table or a "no results" marker shows up.
    /// Returns `false` when the wait ran out.
    async fn wait_for_results_ready(
        &self,
        session: &SessionHandle,
        timeout: Duration,
    ) -> Result<bool, DriverError>;

    async fn extract_rows(&self, session: &SessionHandle) -> Result<ExtractedBatch, DriverError>;

    /// Activates the detail control of the listing row at `row_index`
    /// (1-based) and reports what happened within `timeout`.
    async fn resolve_detail_from_row(
        &self,
        session: &SessionHandle,
        row_index: usize,
        timeout: Duration,
    ) -> Result<DetailOpening, DriverError>;

    /// Opens `url` in a fresh context.
    async fn open_context(&self, url: &str, timeout: Duration)
        -> Result<SessionHandle, DriverError>;

    async fn close_context(&self, context: SessionHandle) -> Result<(), DriverError>;

    /// Navigates the listing session back and waits for results again.
    async fn restore_listing(
        &self,
        session: &SessionHandle,
        timeout: Duration,
    ) -> Result<(), DriverError>;

    /// Cookies of the context behind `session`, so raw fetches can carry
    /// the browser's login or search state.
    async fn session_cookies(&self, _session: &SessionHandle) -> Result<Vec<SessionCookie>, DriverError> {
        Ok(Vec::new())
    }

    /// Observations used for page classification.
    async fn page_signals(
        &self,
        session: &SessionHandle,
        weak_visual_selectors: &[String],
    ) -> Result<PageSignals, DriverError>;

    async fn classify_current_page(
        &self,
        session: &SessionHandle,
        classifier: &PageClassifier,
    ) -> Result<PageClass, DriverError> {
        let signals = self
            .page_signals(session, classifier.weak_visual_selectors())
            .await?;
        Ok(classifier.classify(&signals))
    }

    /// Absolute URLs of links, frames and embedded objects that mention one
    /// of `markers`, de-duplicated in document order.
    async fn discover_embedded_document_links(
        &self,
        session: &SessionHandle,
        markers: &[String],
    ) -> Result<Vec<String>, DriverError>;

    /// Clicks a print/download control and saves the resulting download to
    /// `destination`. Returns `false` when no control produced a file.
    async fn trigger_print_download(
        &self,
        session: &SessionHandle,
        destination: &Path,
        timeout: Duration,
    ) -> Result<bool, DriverError>;

    /// Renders the current view into `destination`.
    async fn render_current_page_to_document(
        &self,
        session: &SessionHandle,
        destination: &Path,
    ) -> Result<bool, DriverError>;
}

// ═══════════════════════════════════════════════════════════════════════
// DocumentFetcher
// ═══════════════════════════════════════════════════════════════════════

/// Raw network fetch, bypassing the browser's renderer.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// Fetches `url`, sending `cookie` as the `Cookie` header when given.
    /// Network failures and timeouts yield `None`.
    async fn raw_fetch(&self, url: &str, cookie: Option<&str>, timeout: Duration) -> Option<FetchedDocument>;
}

// ═══════════════════════════════════════════════════════════════════════
// OperatorAssist
// ═══════════════════════════════════════════════════════════════════════

/// Human-in-the-loop hook for search gates the driver cannot pass alone.
#[async_trait]
pub trait OperatorAssist: Send + Sync {
    /// Blocks until the operator signals that the gate was handled for `term`.
    async fn wait_for_operator(&self, term: &str) -> anyhow::Result<()>;
}
