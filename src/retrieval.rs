//! Tiered artifact retrieval.
//!
//! Each unique record gets at most one artifact file. The chain works through
//! progressively more expensive strategies and stops at the first success:
//!
//! | Tier | Strategy | Needs a rendered view |
//! |------|----------|-----------------------|
//! | A | `direct-fetch`: raw fetch of the row's detail link | no |
//! | B | open the detail view (new context or row click), then classify it | produces it |
//! | C.i | `detail-url`: raw fetch of the view's own URL | yes |
//! | C.ii | `embedded-link`: raw fetch of linked/framed documents | yes |
//! | C.iii | `print-download`: click a print control, capture the download | yes |
//! | C.iv | `page-render`: render the view itself (opt-in) | yes |
//!
//! The destination file name is a pure function of the record, so an
//! existing file short-circuits the whole chain before any driver or network
//! call.

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, warn};

use crate::canon::{first_value_by_markers, sanitize_filename, Vocabulary};
use crate::classifier::PageClassifier;
use crate::config::Config;
use crate::models::{PageClass, Row, RowHints};
use crate::traits::{
    cookie_header, DetailOpening, DocumentFetcher, FetchedDocument, SearchDriver, SessionHandle,
};

/// Reason tags reported with every retrieval outcome.
pub mod reason {
    pub const EXISTS: &str = "exists";
    pub const DIRECT_FETCH: &str = "direct-fetch";
    pub const DETAIL_URL: &str = "detail-url";
    pub const EMBEDDED_LINK: &str = "embedded-link";
    pub const PRINT_DOWNLOAD: &str = "print-download";
    pub const PAGE_RENDER: &str = "page-render";

    pub const NO_DETAIL_CONTROL: &str = "no-detail-control";
    pub const NO_ROW_POSITION: &str = "no-row-position";
    pub const NOT_DETAIL_PAGE: &str = "not-detail-page";
    pub const NOT_A_DOCUMENT: &str = "not-a-document";
    pub const NO_EMBEDDED_LINK: &str = "no-embedded-link";
    pub const NO_PRINT_CONTROL: &str = "no-print-control";
    pub const RENDER_FAILED: &str = "render-failed";
    pub const NO_ARTIFACT_MODE: &str = "no-artifact-mode";
    pub const DRIVER_ERROR: &str = "driver-error";
}

/// Seed used in the file-name digest when no detail URL could be resolved.
pub const ROW_CLICK_SENTINEL: &str = "row-click-fallback";

#[derive(Debug, Clone)]
pub struct RetrievalSettings {
    pub artifact_dir: PathBuf,
    pub extension: String,
    pub content_type_marker: String,
    pub link_markers: Vec<String>,
    pub timeout: Duration,
    pub render_fallback: bool,
}

impl RetrievalSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            artifact_dir: config.output.artifact_dir.clone(),
            extension: config.artifacts.extension.trim_start_matches('.').to_string(),
            content_type_marker: config.artifacts.content_type_marker.to_lowercase(),
            link_markers: config
                .artifacts
                .link_markers
                .iter()
                .map(|m| m.to_lowercase())
                .collect(),
            timeout: config.artifact_timeout(),
            render_fallback: config.artifacts.render_fallback,
        }
    }

    fn is_target_type(&self, content_type: &str) -> bool {
        content_type.to_lowercase().contains(&self.content_type_marker)
    }

    fn names_target_extension(&self, url: &str) -> bool {
        url.to_lowercase().contains(&format!(".{}", self.extension))
    }
}

/// `(success, reason tag)` for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalOutcome {
    pub saved: bool,
    pub reason: &'static str,
}

impl RetrievalOutcome {
    pub fn saved(reason: &'static str) -> Self {
        Self {
            saved: true,
            reason,
        }
    }

    pub fn failed(reason: &'static str) -> Self {
        Self {
            saved: false,
            reason,
        }
    }
}

/// One unique record handed to the chain.
#[derive(Debug, Clone, Copy)]
pub struct ArtifactRequest<'a> {
    pub key: &'a str,
    pub row: &'a Row,
    /// URL of the listing the row was extracted from.
    pub listing_url: &'a str,
}

// ═══════════════════════════════════════════════════════════════════════
// Detail URL resolution
// ═══════════════════════════════════════════════════════════════════════

fn join_url(base: &str, candidate: &str) -> Option<String> {
    match url::Url::parse(base) {
        Ok(base) => base.join(candidate).ok().map(String::from),
        Err(_) => url::Url::parse(candidate).ok().map(String::from),
    }
}

fn same_page(a: &str, b: &str) -> bool {
    a.trim_end_matches('/') == b.trim_end_matches('/')
}

/// Empty, `/`, `#`, or a link back to the listing itself.
fn is_placeholder_url(candidate: &str, base: &str) -> bool {
    let candidate = candidate.trim();
    if candidate.is_empty() || candidate == "/" || candidate == "#" {
        return true;
    }
    match join_url(base, candidate) {
        Some(resolved) => same_page(&resolved, base),
        None => false,
    }
}

fn literal_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"['"]([^'"]+)['"]"#).expect("literal pattern compiles"))
}

/// Pulls a URL out of an inline script such as
/// `window.open('/adatlap?id=7', '_blank')`.
///
/// Only absolute or root-relative literals, or literals mentioning a
/// document marker, are accepted.
pub fn url_from_script(script: &str, base: &str, markers: &[String]) -> Option<String> {
    for caps in literal_regex().captures_iter(script) {
        let token = caps[1].trim();
        if token.is_empty() || token == "/" || token == "#" {
            continue;
        }
        if token.starts_with("http://") || token.starts_with("https://") || token.starts_with('/') {
            match join_url(base, token) {
                Some(resolved) if !same_page(&resolved, base) => return Some(resolved),
                _ => continue,
            }
        }
        let lowered = token.to_lowercase();
        if markers.iter().any(|m| lowered.contains(m.as_str())) {
            if let Some(resolved) = join_url(base, token) {
                return Some(resolved);
            }
        }
    }
    None
}

/// Step 0: the best detail URL the row's hints offer, if any.
pub fn resolve_detail_url(hints: &RowHints, listing_url: &str, markers: &[String]) -> Option<String> {
    let direct = hints.detail_url.trim();
    if !direct.is_empty() && !is_placeholder_url(direct, listing_url) {
        return Some(direct.to_string());
    }

    let href = hints.detail_href.trim();
    if !href.is_empty()
        && !href.to_lowercase().starts_with("javascript:")
        && !is_placeholder_url(href, listing_url)
    {
        if let Some(joined) = join_url(listing_url, href) {
            return Some(joined);
        }
    }

    url_from_script(&hints.detail_script, listing_url, markers)
}

/// Deterministic artifact location:
/// `<identifier>_<name>_<10 hex of sha256(key|url)>.<ext>`.
pub fn artifact_path(
    dir: &Path,
    row: &Row,
    key: &str,
    detail_url: Option<&str>,
    vocabulary: &Vocabulary,
    extension: &str,
) -> PathBuf {
    let reg_id = first_value_by_markers(row, vocabulary.identifier_markers()).unwrap_or("id");
    let name = first_value_by_markers(row, vocabulary.name_markers()).unwrap_or("record");

    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hasher.update(b"|");
    hasher.update(detail_url.unwrap_or(ROW_CLICK_SENTINEL).as_bytes());
    let digest = hex::encode(hasher.finalize());

    dir.join(format!(
        "{}_{}_{}.{}",
        sanitize_filename(reg_id),
        sanitize_filename(name),
        &digest[..10],
        extension
    ))
}

/// Writes through a sibling `.part` file so an interrupted write never
/// satisfies the existence gate.
async fn persist(destination: &Path, body: &[u8]) -> Result<()> {
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut partial = destination.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);
    tokio::fs::write(&partial, body).await?;
    tokio::fs::rename(&partial, destination).await?;
    Ok(())
}

async fn ensure_parent(destination: &Path) -> Result<()> {
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
// Tiers
// ═══════════════════════════════════════════════════════════════════════

enum TierResult {
    Saved,
    Declined(&'static str),
}

struct TierContext<'a> {
    driver: &'a dyn SearchDriver,
    fetcher: &'a dyn DocumentFetcher,
    settings: &'a RetrievalSettings,
    classifier: &'a PageClassifier,
    detail_url: Option<&'a str>,
    destination: &'a Path,
    listing: &'a SessionHandle,
    view: Option<&'a SessionHandle>,
}

impl TierContext<'_> {
    /// Cookie header for `url`, taken from the detail view when one is open
    /// and from the listing session otherwise.
    async fn cookie_for(&self, url: &str) -> Option<String> {
        let session = self.view.unwrap_or(self.listing);
        match self.driver.session_cookies(session).await {
            Ok(cookies) => cookie_header(&cookies, url),
            Err(e) => {
                debug!(url, error = %e, "could not read session cookies; fetching without");
                None
            }
        }
    }

    /// Raw-fetches `url` and persists it when it is the target format.
    async fn fetch_document(&self, url: &str, allow_extension_match: bool) -> Result<bool> {
        let cookie = self.cookie_for(url).await;
        let Some(doc) = self
            .fetcher
            .raw_fetch(url, cookie.as_deref(), self.settings.timeout)
            .await
        else {
            return Ok(false);
        };
        if !self.accepts(&doc, allow_extension_match) {
            debug!(url, content_type = %doc.content_type, status = doc.status, "not a target document");
            return Ok(false);
        }
        persist(self.destination, &doc.body).await?;
        Ok(true)
    }

    fn accepts(&self, doc: &FetchedDocument, allow_extension_match: bool) -> bool {
        doc.is_success()
            && (self.settings.is_target_type(&doc.content_type)
                || (allow_extension_match && self.settings.names_target_extension(&doc.url)))
    }
}

/// One strategy in the fallback chain.
#[async_trait]
trait Tier: Send + Sync {
    /// Reason tag reported when this tier saves the artifact.
    fn name(&self) -> &'static str;

    async fn attempt(&self, cx: &TierContext<'_>) -> Result<TierResult>;
}

struct DirectFetch;

#[async_trait]
impl Tier for DirectFetch {
    fn name(&self) -> &'static str {
        reason::DIRECT_FETCH
    }

    async fn attempt(&self, cx: &TierContext<'_>) -> Result<TierResult> {
        let Some(url) = cx.detail_url else {
            return Ok(TierResult::Declined(reason::NO_ARTIFACT_MODE));
        };
        if cx.fetch_document(url, false).await? {
            Ok(TierResult::Saved)
        } else {
            Ok(TierResult::Declined(reason::NOT_A_DOCUMENT))
        }
    }
}

struct DetailUrlFetch;

#[async_trait]
impl Tier for DetailUrlFetch {
    fn name(&self) -> &'static str {
        reason::DETAIL_URL
    }

    async fn attempt(&self, cx: &TierContext<'_>) -> Result<TierResult> {
        let Some(view) = cx.view else {
            return Ok(TierResult::Declined(reason::NOT_A_DOCUMENT));
        };
        let url = cx.driver.current_url(view).await?;
        if !url.trim().is_empty() && cx.fetch_document(&url, true).await? {
            return Ok(TierResult::Saved);
        }
        Ok(TierResult::Declined(reason::NOT_A_DOCUMENT))
    }
}

struct EmbeddedLinks;

#[async_trait]
impl Tier for EmbeddedLinks {
    fn name(&self) -> &'static str {
        reason::EMBEDDED_LINK
    }

    async fn attempt(&self, cx: &TierContext<'_>) -> Result<TierResult> {
        let Some(view) = cx.view else {
            return Ok(TierResult::Declined(reason::NO_EMBEDDED_LINK));
        };
        let links = cx
            .driver
            .discover_embedded_document_links(view, &cx.settings.link_markers)
            .await?;
        for link in &links {
            if cx.fetch_document(link, true).await? {
                return Ok(TierResult::Saved);
            }
        }
        Ok(TierResult::Declined(reason::NO_EMBEDDED_LINK))
    }
}

struct PrintDownload;

#[async_trait]
impl Tier for PrintDownload {
    fn name(&self) -> &'static str {
        reason::PRINT_DOWNLOAD
    }

    async fn attempt(&self, cx: &TierContext<'_>) -> Result<TierResult> {
        let Some(view) = cx.view else {
            return Ok(TierResult::Declined(reason::NO_PRINT_CONTROL));
        };
        ensure_parent(cx.destination).await?;
        if cx
            .driver
            .trigger_print_download(view, cx.destination, cx.settings.timeout)
            .await?
        {
            Ok(TierResult::Saved)
        } else {
            Ok(TierResult::Declined(reason::NO_PRINT_CONTROL))
        }
    }
}

struct PageRender;

#[async_trait]
impl Tier for PageRender {
    fn name(&self) -> &'static str {
        reason::PAGE_RENDER
    }

    async fn attempt(&self, cx: &TierContext<'_>) -> Result<TierResult> {
        let Some(view) = cx.view else {
            return Ok(TierResult::Declined(reason::RENDER_FAILED));
        };
        // The view may have changed under the print attempt.
        if cx.driver.classify_current_page(view, cx.classifier).await? != PageClass::LikelyDetail {
            return Ok(TierResult::Declined(reason::NOT_DETAIL_PAGE));
        }
        ensure_parent(cx.destination).await?;
        if cx
            .driver
            .render_current_page_to_document(view, cx.destination)
            .await?
        {
            Ok(TierResult::Saved)
        } else {
            Ok(TierResult::Declined(reason::RENDER_FAILED))
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Chain
// ═══════════════════════════════════════════════════════════════════════

/// A detail view and who is responsible for cleaning it up.
enum DetailView<'l> {
    /// Secondary context opened for this retrieval; must be closed.
    Owned(SessionHandle),
    /// The listing session navigated in place; must be restored.
    InPlace(&'l SessionHandle),
}

impl DetailView<'_> {
    fn session(&self) -> &SessionHandle {
        match self {
            DetailView::Owned(handle) => handle,
            DetailView::InPlace(listing) => listing,
        }
    }
}

pub struct ArtifactChain {
    driver: Arc<dyn SearchDriver>,
    fetcher: Arc<dyn DocumentFetcher>,
    settings: RetrievalSettings,
    classifier: PageClassifier,
    vocabulary: Vocabulary,
    before_view: Vec<Box<dyn Tier>>,
    on_view: Vec<Box<dyn Tier>>,
}

impl ArtifactChain {
    pub fn new(
        driver: Arc<dyn SearchDriver>,
        fetcher: Arc<dyn DocumentFetcher>,
        settings: RetrievalSettings,
        classifier: PageClassifier,
        vocabulary: Vocabulary,
    ) -> Self {
        let mut on_view: Vec<Box<dyn Tier>> = vec![
            Box::new(DetailUrlFetch),
            Box::new(EmbeddedLinks),
            Box::new(PrintDownload),
        ];
        if settings.render_fallback {
            on_view.push(Box::new(PageRender));
        }
        Self {
            driver,
            fetcher,
            settings,
            classifier,
            vocabulary,
            before_view: vec![Box::new(DirectFetch)],
            on_view,
        }
    }

    pub fn settings(&self) -> &RetrievalSettings {
        &self.settings
    }

    /// Where the artifact for `request` lives (or would live).
    pub fn destination(&self, request: &ArtifactRequest<'_>) -> PathBuf {
        let detail_url = self.detail_url(request);
        self.destination_with(request, detail_url.as_deref())
    }

    fn detail_url(&self, request: &ArtifactRequest<'_>) -> Option<String> {
        resolve_detail_url(
            &request.row.hints,
            request.listing_url,
            &self.settings.link_markers,
        )
    }

    fn destination_with(&self, request: &ArtifactRequest<'_>, detail_url: Option<&str>) -> PathBuf {
        artifact_path(
            &self.settings.artifact_dir,
            request.row,
            request.key,
            detail_url,
            &self.vocabulary,
            &self.settings.extension,
        )
    }

    /// Retrieves the artifact for one record. Never fails: every error is
    /// reduced to an outcome with a reason tag.
    pub async fn retrieve(
        &self,
        request: &ArtifactRequest<'_>,
        listing: &SessionHandle,
    ) -> RetrievalOutcome {
        let detail_url = self.detail_url(request);
        let destination = self.destination_with(request, detail_url.as_deref());

        if tokio::fs::try_exists(&destination).await.unwrap_or(false) {
            return RetrievalOutcome::saved(reason::EXISTS);
        }

        let mut cx = TierContext {
            driver: self.driver.as_ref(),
            fetcher: self.fetcher.as_ref(),
            settings: &self.settings,
            classifier: &self.classifier,
            detail_url: detail_url.as_deref(),
            destination: &destination,
            listing,
            view: None,
        };
        let mut last = reason::NO_ARTIFACT_MODE;

        if let Some(outcome) = run_tiers(&self.before_view, &cx, &mut last).await {
            return outcome;
        }

        let view = match self.open_view(request, detail_url.as_deref(), listing).await {
            Ok(view) => view,
            Err(outcome) => return outcome,
        };

        cx.view = Some(view.session());
        let outcome = match self
            .driver
            .classify_current_page(view.session(), &self.classifier)
            .await
        {
            Ok(PageClass::LikelyDetail) => run_tiers(&self.on_view, &cx, &mut last)
                .await
                .unwrap_or(RetrievalOutcome::failed(last)),
            Ok(class) => {
                debug!(key = request.key, ?class, "opened view is not a detail page");
                RetrievalOutcome::failed(reason::NOT_DETAIL_PAGE)
            }
            Err(e) => {
                warn!(key = request.key, error = %e, "page classification failed");
                RetrievalOutcome::failed(reason::DRIVER_ERROR)
            }
        };

        self.release_view(view, listing).await;
        outcome
    }

    /// Tier B: a rendered detail view, or a terminal outcome.
    async fn open_view<'l>(
        &self,
        request: &ArtifactRequest<'_>,
        detail_url: Option<&str>,
        listing: &'l SessionHandle,
    ) -> Result<DetailView<'l>, RetrievalOutcome> {
        if let Some(url) = detail_url {
            return match self.driver.open_context(url, self.settings.timeout).await {
                Ok(handle) => Ok(DetailView::Owned(handle)),
                Err(e) => {
                    warn!(key = request.key, url, error = %e, "could not open detail context");
                    Err(RetrievalOutcome::failed(reason::DRIVER_ERROR))
                }
            };
        }

        let position = request.row.hints.position;
        if position == 0 {
            return Err(RetrievalOutcome::failed(reason::NO_ROW_POSITION));
        }

        match self
            .driver
            .resolve_detail_from_row(listing, position, self.settings.timeout)
            .await
        {
            Ok(DetailOpening::NewContext(handle)) => Ok(DetailView::Owned(handle)),
            Ok(DetailOpening::InPlace) => Ok(DetailView::InPlace(listing)),
            Ok(DetailOpening::NoEffect(why)) => {
                debug!(key = request.key, why = %why, "detail control had no effect");
                Err(RetrievalOutcome::failed(reason::NO_DETAIL_CONTROL))
            }
            Err(e) => {
                warn!(key = request.key, error = %e, "detail control failed");
                Err(RetrievalOutcome::failed(reason::DRIVER_ERROR))
            }
        }
    }

    async fn release_view(&self, view: DetailView<'_>, listing: &SessionHandle) {
        match view {
            DetailView::Owned(handle) => {
                if let Err(e) = self.driver.close_context(handle).await {
                    warn!(error = %e, "failed to close detail context");
                }
            }
            DetailView::InPlace(_) => self.restore(listing).await,
        }
    }

    async fn restore(&self, listing: &SessionHandle) {
        if let Err(e) = self
            .driver
            .restore_listing(listing, self.settings.timeout)
            .await
        {
            warn!(error = %e, "failed to restore listing after in-place detail view");
        }
    }
}

async fn run_tiers(
    tiers: &[Box<dyn Tier>],
    cx: &TierContext<'_>,
    last: &mut &'static str,
) -> Option<RetrievalOutcome> {
    for tier in tiers {
        match tier.attempt(cx).await {
            Ok(TierResult::Saved) => return Some(RetrievalOutcome::saved(tier.name())),
            Ok(TierResult::Declined(why)) => *last = why,
            Err(e) => {
                warn!(tier = tier.name(), error = %e, "retrieval tier failed");
                *last = reason::DRIVER_ERROR;
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    const BASE: &str = "https://kereso.example.hu/";

    fn markers() -> Vec<String> {
        vec!["adatlap".into(), "pdf".into(), "print".into()]
    }

    #[test]
    fn direct_url_preferred() {
        let hints = RowHints {
            detail_url: "https://kereso.example.hu/adatlap/9".into(),
            detail_href: "/other".into(),
            ..Default::default()
        };
        assert_eq!(
            resolve_detail_url(&hints, BASE, &markers()).as_deref(),
            Some("https://kereso.example.hu/adatlap/9")
        );
    }

    #[test]
    fn self_referential_links_are_ignored() {
        let hints = RowHints {
            detail_url: "https://kereso.example.hu".into(),
            detail_href: "#".into(),
            ..Default::default()
        };
        assert_eq!(resolve_detail_url(&hints, BASE, &markers()), None);
    }

    #[test]
    fn javascript_href_falls_through_to_script() {
        let hints = RowHints {
            detail_href: "javascript:void(0)".into(),
            detail_script: "window.open('/adatlap?id=42', '_blank')".into(),
            ..Default::default()
        };
        assert_eq!(
            resolve_detail_url(&hints, BASE, &markers()).as_deref(),
            Some("https://kereso.example.hu/adatlap?id=42")
        );
    }

    #[test]
    fn script_literals_need_a_url_shape_or_marker() {
        assert_eq!(url_from_script("show('details', 3)", BASE, &markers()), None);
        assert_eq!(
            url_from_script("openDoc(\"print.aspx?x=1\")", BASE, &markers()).as_deref(),
            Some("https://kereso.example.hu/print.aspx?x=1")
        );
        assert_eq!(url_from_script("go('/')", BASE, &markers()), None);
    }

    #[test]
    fn relative_href_is_joined() {
        let hints = RowHints {
            detail_href: "adatlap.php?id=5".into(),
            ..Default::default()
        };
        assert_eq!(
            resolve_detail_url(&hints, BASE, &markers()).as_deref(),
            Some("https://kereso.example.hu/adatlap.php?id=5")
        );
    }

    #[test]
    fn artifact_path_is_deterministic_and_url_sensitive() {
        let mut fields = IndexMap::new();
        fields.insert("Pecsétszám".to_string(), "A/12".to_string());
        fields.insert("Név".to_string(), "Dr. Kiss Anna".to_string());
        let row = Row::new(fields, RowHints::default());
        let vocab = Vocabulary::default();
        let dir = Path::new("out");

        let a = artifact_path(dir, &row, "id:A/12", None, &vocab, "pdf");
        let b = artifact_path(dir, &row, "id:A/12", None, &vocab, "pdf");
        let c = artifact_path(dir, &row, "id:A/12", Some("https://x/1"), &vocab, "pdf");
        assert_eq!(a, b);
        assert_ne!(a, c);

        let name = a.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("A_12_Dr._Kiss_Anna_"));
        assert!(name.ends_with(".pdf"));
        let digest = name
            .trim_start_matches("A_12_Dr._Kiss_Anna_")
            .trim_end_matches(".pdf");
        assert_eq!(digest.len(), 10);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn persist_leaves_no_partial_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dest = tmp.path().join("nested").join("doc.pdf");
        persist(&dest, b"%PDF-1.4").await.unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"%PDF-1.4");
        assert!(!tmp.path().join("nested").join("doc.pdf.part").exists());
    }
}
