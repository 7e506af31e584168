//! In-memory collaborators shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use cap_harvest::config::Config;
use cap_harvest::error::DriverError;
use cap_harvest::models::{ExtractedBatch, PageSignals, Row, RowHints};
use cap_harvest::traits::{
    DetailOpening, DocumentFetcher, FetchedDocument, SearchDriver, SessionCookie, SessionHandle,
};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const LISTING_URL: &str = "https://kereso.example.hu/lista";

/// Config tuned for tests: no delays, tiny waits.
pub fn test_config(dir: &Path) -> Config {
    let mut cfg = Config::minimal();
    cfg.target.url = LISTING_URL.to_string();
    cfg.target.record_type = None;
    cfg.explore.alphabet = "ab".to_string();
    cfg.explore.query_delay_ms = 0;
    cfg.explore.results_wait_ms = 10;
    cfg.unlock.manual_assist = false;
    cfg.artifacts.timeout_ms = 50;
    cfg.output.json = dir.join("records.json");
    cfg.output.csv = dir.join("records.csv");
    cfg.output.overflow_json = dir.join("overflow.json");
    cfg.output.artifact_dir = dir.join("artifacts");
    cfg
}

pub fn row(fields: &[(&str, &str)]) -> Row {
    row_at(fields, 0)
}

pub fn row_at(fields: &[(&str, &str)], position: usize) -> Row {
    let fields: IndexMap<String, String> = fields
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Row::new(
        fields,
        RowHints {
            position,
            ..Default::default()
        },
    )
}

/// `n` rows with distinct registration numbers, prefixed by `tag`.
pub fn numbered_rows(tag: &str, n: usize) -> Vec<Row> {
    (1..=n)
        .map(|i| {
            row_at(
                &[
                    ("Nyilvántartási szám", &format!("{}-{}", tag, i)),
                    ("Név", &format!("{} {}", tag, i)),
                ],
                i,
            )
        })
        .collect()
}

#[derive(Clone)]
pub enum Scripted {
    Rows {
        rows: Vec<Row>,
        total: Option<usize>,
    },
    /// Recoverable driver error.
    Fail,
    /// Fatal driver error.
    Fatal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Click {
    NewContext,
    InPlace,
    NoEffect,
    Error,
}

#[derive(Debug, Default)]
pub struct Log {
    pub searched: Vec<String>,
    /// Browser interactions; cookie reads are counted separately.
    pub calls: usize,
    pub cookie_reads: usize,
    pub opened: Vec<String>,
    pub closed: Vec<String>,
    pub restored: usize,
    pub clicked_rows: Vec<usize>,
    pub print_attempts: usize,
    pub renders: usize,
}

pub struct FakeDriver {
    results: HashMap<String, Scripted>,
    /// Answer for terms without a scripted result; empty listing when unset.
    fallback: Option<Scripted>,
    pub locked: bool,
    pub click: Click,
    pub detail_page: bool,
    pub view_url: String,
    pub embedded: Vec<String>,
    pub print_bytes: Option<Vec<u8>>,
    pub render_ok: bool,
    pub cookies: Vec<SessionCookie>,
    /// Fires the token once this many searches have been extracted.
    pub cancel_after: Option<(usize, CancellationToken)>,
    current: Mutex<String>,
    next_context: Mutex<usize>,
    pub log: Mutex<Log>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self {
            results: HashMap::new(),
            fallback: None,
            locked: false,
            click: Click::NoEffect,
            detail_page: true,
            view_url: String::new(),
            embedded: Vec::new(),
            print_bytes: None,
            render_ok: false,
            cookies: Vec::new(),
            cancel_after: None,
            current: Mutex::new(String::new()),
            next_context: Mutex::new(0),
            log: Mutex::new(Log::default()),
        }
    }

    pub fn rows(mut self, term: &str, rows: Vec<Row>, total: Option<usize>) -> Self {
        self.results
            .insert(term.to_string(), Scripted::Rows { rows, total });
        self
    }

    pub fn script(mut self, term: &str, scripted: Scripted) -> Self {
        self.results.insert(term.to_string(), scripted);
        self
    }

    pub fn fallback(mut self, scripted: Scripted) -> Self {
        self.fallback = Some(scripted);
        self
    }

    pub fn searched(&self) -> Vec<String> {
        self.log.lock().unwrap().searched.clone()
    }

    pub fn calls(&self) -> usize {
        self.log.lock().unwrap().calls
    }

    fn touch(&self) {
        self.log.lock().unwrap().calls += 1;
    }
}

#[async_trait]
impl SearchDriver for FakeDriver {
    async fn start(&self) -> Result<SessionHandle, DriverError> {
        self.touch();
        Ok(SessionHandle::new("listing"))
    }

    async fn shutdown(&self, _session: SessionHandle) -> Result<(), DriverError> {
        self.touch();
        Ok(())
    }

    async fn navigate(&self, _session: &SessionHandle, _url: &str) -> Result<(), DriverError> {
        self.touch();
        Ok(())
    }

    async fn current_url(&self, session: &SessionHandle) -> Result<String, DriverError> {
        self.touch();
        if session.id() == "listing" {
            Ok(LISTING_URL.to_string())
        } else {
            Ok(self.view_url.clone())
        }
    }

    async fn fill_search_field(
        &self,
        _session: &SessionHandle,
        text: &str,
    ) -> Result<(), DriverError> {
        self.touch();
        *self.current.lock().unwrap() = text.to_string();
        Ok(())
    }

    async fn dispatch_input_events(&self, _session: &SessionHandle) -> Result<(), DriverError> {
        self.touch();
        Ok(())
    }

    async fn unlock_search(
        &self,
        _session: &SessionHandle,
        _timeout: Duration,
    ) -> Result<bool, DriverError> {
        self.touch();
        Ok(!self.locked)
    }

    async fn submit_search(
        &self,
        _session: &SessionHandle,
        _allow_force_submit: bool,
    ) -> Result<(), DriverError> {
        self.touch();
        Ok(())
    }

    async fn wait_for_results_ready(
        &self,
        _session: &SessionHandle,
        _timeout: Duration,
    ) -> Result<bool, DriverError> {
        self.touch();
        Ok(true)
    }

    async fn extract_rows(&self, _session: &SessionHandle) -> Result<ExtractedBatch, DriverError> {
        self.touch();
        let term = self.current.lock().unwrap().clone();
        let searched = {
            let mut log = self.log.lock().unwrap();
            log.searched.push(term.clone());
            log.searched.len()
        };
        if let Some((after, token)) = &self.cancel_after {
            if searched >= *after {
                token.cancel();
            }
        }
        match self.results.get(&term).or(self.fallback.as_ref()) {
            Some(Scripted::Rows { rows, total }) => {
                Ok(ExtractedBatch::new(rows.clone(), *total).with_listing_url(LISTING_URL))
            }
            Some(Scripted::Fail) => Err(DriverError::Protocol("stale element".into())),
            Some(Scripted::Fatal) => Err(DriverError::ControlsMissing("search button".into())),
            None => Ok(ExtractedBatch::new(Vec::new(), None).with_listing_url(LISTING_URL)),
        }
    }

    async fn resolve_detail_from_row(
        &self,
        _session: &SessionHandle,
        row_index: usize,
        _timeout: Duration,
    ) -> Result<DetailOpening, DriverError> {
        self.touch();
        self.log.lock().unwrap().clicked_rows.push(row_index);
        match self.click {
            Click::NewContext => {
                let mut next = self.next_context.lock().unwrap();
                *next += 1;
                let id = format!("popup-{}", next);
                self.log.lock().unwrap().opened.push(id.clone());
                Ok(DetailOpening::NewContext(SessionHandle::new(id)))
            }
            Click::InPlace => Ok(DetailOpening::InPlace),
            Click::NoEffect => Ok(DetailOpening::NoEffect("nothing happened".into())),
            Click::Error => Err(DriverError::Protocol("detached".into())),
        }
    }

    async fn open_context(
        &self,
        url: &str,
        _timeout: Duration,
    ) -> Result<SessionHandle, DriverError> {
        self.touch();
        let mut next = self.next_context.lock().unwrap();
        *next += 1;
        let id = format!("tab-{}", next);
        self.log
            .lock()
            .unwrap()
            .opened
            .push(format!("{} {}", id, url));
        Ok(SessionHandle::new(id))
    }

    async fn close_context(&self, context: SessionHandle) -> Result<(), DriverError> {
        self.touch();
        self.log
            .lock()
            .unwrap()
            .closed
            .push(context.id().to_string());
        Ok(())
    }

    async fn restore_listing(
        &self,
        _session: &SessionHandle,
        _timeout: Duration,
    ) -> Result<(), DriverError> {
        self.touch();
        self.log.lock().unwrap().restored += 1;
        Ok(())
    }

    async fn session_cookies(&self, _session: &SessionHandle) -> Result<Vec<SessionCookie>, DriverError> {
        self.log.lock().unwrap().cookie_reads += 1;
        Ok(self.cookies.clone())
    }

    async fn page_signals(
        &self,
        _session: &SessionHandle,
        _weak_visual_selectors: &[String],
    ) -> Result<PageSignals, DriverError> {
        self.touch();
        let text = if self.detail_page {
            "Kiss Anna adatlapja"
        } else {
            "Név típusa: Tisztelt Ügyfelünk"
        };
        Ok(PageSignals {
            url: self.view_url.clone(),
            text: text.to_string(),
            has_weak_visual_marker: false,
        })
    }

    async fn discover_embedded_document_links(
        &self,
        _session: &SessionHandle,
        _markers: &[String],
    ) -> Result<Vec<String>, DriverError> {
        self.touch();
        Ok(self.embedded.clone())
    }

    async fn trigger_print_download(
        &self,
        _session: &SessionHandle,
        destination: &Path,
        _timeout: Duration,
    ) -> Result<bool, DriverError> {
        self.touch();
        self.log.lock().unwrap().print_attempts += 1;
        match &self.print_bytes {
            Some(bytes) => {
                std::fs::write(destination, bytes)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn render_current_page_to_document(
        &self,
        _session: &SessionHandle,
        destination: &Path,
    ) -> Result<bool, DriverError> {
        self.touch();
        self.log.lock().unwrap().renders += 1;
        if self.render_ok {
            std::fs::write(destination, b"%PDF-render")?;
        }
        Ok(self.render_ok)
    }
}

/// Serves canned documents by URL and records every request.
#[derive(Default)]
pub struct FakeFetcher {
    documents: HashMap<String, FetchedDocument>,
    pub requested: Mutex<Vec<String>>,
    /// `Cookie` header sent with each request, in request order.
    pub cookies: Mutex<Vec<Option<String>>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(mut self, url: &str, content_type: &str, body: &[u8]) -> Self {
        self.documents.insert(
            url.to_string(),
            FetchedDocument {
                url: url.to_string(),
                status: 200,
                content_type: content_type.to_string(),
                body: body.to_vec(),
            },
        );
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }

    pub fn sent_cookies(&self) -> Vec<Option<String>> {
        self.cookies.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentFetcher for FakeFetcher {
    async fn raw_fetch(
        &self,
        url: &str,
        cookie: Option<&str>,
        _timeout: Duration,
    ) -> Option<FetchedDocument> {
        self.requested.lock().unwrap().push(url.to_string());
        self.cookies.lock().unwrap().push(cookie.map(String::from));
        self.documents.get(url).cloned()
    }
}
