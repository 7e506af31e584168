//! Artifact retrieval chain against in-memory collaborators.

mod common;

use cap_harvest::canon::{canonical_key, Vocabulary};
use cap_harvest::classifier::PageClassifier;
use cap_harvest::config::Config;
use cap_harvest::models::Row;
use cap_harvest::retrieval::{reason, ArtifactChain, ArtifactRequest, RetrievalSettings};
use cap_harvest::traits::{SessionCookie, SessionHandle};
use common::{row_at, test_config, Click, FakeDriver, FakeFetcher, LISTING_URL};
use std::sync::Arc;
use tempfile::TempDir;

const DOC_URL: &str = "https://kereso.example.hu/adatlap/7.pdf";

fn record(position: usize) -> Row {
    row_at(
        &[("Nyilvántartási szám", "7"), ("Név", "Kiss Anna")],
        position,
    )
}

fn chain(driver: &Arc<FakeDriver>, fetcher: &Arc<FakeFetcher>, cfg: &Config) -> ArtifactChain {
    ArtifactChain::new(
        driver.clone(),
        fetcher.clone(),
        RetrievalSettings::from_config(cfg),
        PageClassifier::from_config(&cfg.classifier),
        Vocabulary::from_config(&cfg.vocabulary),
    )
}

fn key_of(row: &Row) -> String {
    canonical_key(row, &Vocabulary::default())
}

#[tokio::test]
async fn existing_artifact_short_circuits_everything() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(tmp.path());
    let driver = Arc::new(FakeDriver::new());
    let fetcher = Arc::new(FakeFetcher::new());
    let chain = chain(&driver, &fetcher, &cfg);

    let mut row = record(1);
    row.hints.detail_url = DOC_URL.to_string();
    let key = key_of(&row);
    let request = ArtifactRequest {
        key: &key,
        row: &row,
        listing_url: LISTING_URL,
    };
    let destination = chain.destination(&request);
    std::fs::create_dir_all(destination.parent().unwrap()).unwrap();
    std::fs::write(&destination, b"%PDF-old").unwrap();

    let outcome = chain
        .retrieve(&request, &SessionHandle::new("listing"))
        .await;

    assert!(outcome.saved);
    assert_eq!(outcome.reason, reason::EXISTS);
    assert_eq!(driver.calls(), 0);
    assert_eq!(driver.log.lock().unwrap().cookie_reads, 0);
    assert!(fetcher.requests().is_empty());
    assert_eq!(std::fs::read(&destination).unwrap(), b"%PDF-old");
}

#[tokio::test]
async fn direct_fetch_needs_no_browser() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(tmp.path());
    let driver = Arc::new(FakeDriver::new());
    let fetcher = Arc::new(FakeFetcher::new().serve(DOC_URL, "application/pdf", b"%PDF-1.7"));
    let chain = chain(&driver, &fetcher, &cfg);

    let mut row = record(1);
    row.hints.detail_href = "/adatlap/7.pdf".to_string();
    let key = key_of(&row);
    let request = ArtifactRequest {
        key: &key,
        row: &row,
        listing_url: LISTING_URL,
    };
    let listing = SessionHandle::new("listing");

    let outcome = chain.retrieve(&request, &listing).await;
    assert!(outcome.saved);
    assert_eq!(outcome.reason, reason::DIRECT_FETCH);
    assert_eq!(driver.calls(), 0);
    assert_eq!(std::fs::read(chain.destination(&request)).unwrap(), b"%PDF-1.7");

    // A second attempt is idempotent.
    let again = chain.retrieve(&request, &listing).await;
    assert_eq!(again.reason, reason::EXISTS);
    assert_eq!(fetcher.requests().len(), 1);
}

#[tokio::test]
async fn html_detail_link_falls_through_to_embedded_document() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(tmp.path());
    let detail = "https://kereso.example.hu/adatlap?id=7";
    let mut fake = FakeDriver::new();
    fake.view_url = detail.to_string();
    fake.embedded = vec![DOC_URL.to_string()];
    let driver = Arc::new(fake);
    let fetcher = Arc::new(
        FakeFetcher::new()
            .serve(detail, "text/html; charset=utf-8", b"<html>")
            .serve(DOC_URL, "application/pdf", b"%PDF-1.7"),
    );
    let chain = chain(&driver, &fetcher, &cfg);

    let mut row = record(1);
    row.hints.detail_url = detail.to_string();
    let key = key_of(&row);
    let request = ArtifactRequest {
        key: &key,
        row: &row,
        listing_url: LISTING_URL,
    };

    let outcome = chain
        .retrieve(&request, &SessionHandle::new("listing"))
        .await;

    assert!(outcome.saved);
    assert_eq!(outcome.reason, reason::EMBEDDED_LINK);
    // direct-fetch, detail-url, embedded-link in that order.
    assert_eq!(fetcher.requests(), vec![detail, detail, DOC_URL]);
    let log = driver.log.lock().unwrap();
    assert_eq!(log.opened, vec![format!("tab-1 {}", detail)]);
    assert_eq!(log.closed, vec!["tab-1"]);
}

#[tokio::test]
async fn secondary_context_is_closed_when_view_is_not_a_detail_page() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(tmp.path());
    let mut fake = FakeDriver::new();
    fake.click = Click::NewContext;
    fake.detail_page = false;
    let driver = Arc::new(fake);
    let fetcher = Arc::new(FakeFetcher::new());
    let chain = chain(&driver, &fetcher, &cfg);

    let row = record(2);
    let key = key_of(&row);
    let request = ArtifactRequest {
        key: &key,
        row: &row,
        listing_url: LISTING_URL,
    };

    let outcome = chain
        .retrieve(&request, &SessionHandle::new("listing"))
        .await;

    assert!(!outcome.saved);
    assert_eq!(outcome.reason, reason::NOT_DETAIL_PAGE);
    let log = driver.log.lock().unwrap();
    assert_eq!(log.clicked_rows, vec![2]);
    assert_eq!(log.opened, vec!["popup-1"]);
    assert_eq!(log.closed, vec!["popup-1"]);
    assert_eq!(log.restored, 0);
}

#[tokio::test]
async fn secondary_context_is_closed_when_every_tier_fails() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(tmp.path());
    let mut fake = FakeDriver::new();
    fake.click = Click::NewContext;
    let driver = Arc::new(fake);
    let fetcher = Arc::new(FakeFetcher::new());
    let chain = chain(&driver, &fetcher, &cfg);

    let row = record(1);
    let key = key_of(&row);
    let request = ArtifactRequest {
        key: &key,
        row: &row,
        listing_url: LISTING_URL,
    };

    let outcome = chain
        .retrieve(&request, &SessionHandle::new("listing"))
        .await;

    assert!(!outcome.saved);
    assert_eq!(outcome.reason, reason::NO_PRINT_CONTROL);
    let log = driver.log.lock().unwrap();
    assert_eq!(log.closed, vec!["popup-1"]);
    assert_eq!(log.print_attempts, 1);
    assert_eq!(log.renders, 0);
}

#[tokio::test]
async fn in_place_view_is_restored_after_print_download() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(tmp.path());
    let mut fake = FakeDriver::new();
    fake.click = Click::InPlace;
    fake.print_bytes = Some(b"%PDF-print".to_vec());
    let driver = Arc::new(fake);
    let fetcher = Arc::new(FakeFetcher::new());
    let chain = chain(&driver, &fetcher, &cfg);

    let row = record(3);
    let key = key_of(&row);
    let request = ArtifactRequest {
        key: &key,
        row: &row,
        listing_url: LISTING_URL,
    };

    let outcome = chain
        .retrieve(&request, &SessionHandle::new("listing"))
        .await;

    assert!(outcome.saved);
    assert_eq!(outcome.reason, reason::PRINT_DOWNLOAD);
    assert_eq!(
        std::fs::read(chain.destination(&request)).unwrap(),
        b"%PDF-print"
    );
    let log = driver.log.lock().unwrap();
    assert_eq!(log.restored, 1);
    assert!(log.closed.is_empty());
}

#[tokio::test]
async fn page_render_runs_last_and_only_when_enabled() {
    let tmp = TempDir::new().unwrap();
    let mut cfg = test_config(tmp.path());
    cfg.artifacts.render_fallback = true;
    let mut fake = FakeDriver::new();
    fake.click = Click::InPlace;
    fake.render_ok = true;
    let driver = Arc::new(fake);
    let fetcher = Arc::new(FakeFetcher::new());
    let chain = chain(&driver, &fetcher, &cfg);

    let row = record(1);
    let key = key_of(&row);
    let request = ArtifactRequest {
        key: &key,
        row: &row,
        listing_url: LISTING_URL,
    };

    let outcome = chain
        .retrieve(&request, &SessionHandle::new("listing"))
        .await;

    assert!(outcome.saved);
    assert_eq!(outcome.reason, reason::PAGE_RENDER);
    let log = driver.log.lock().unwrap();
    assert_eq!(log.print_attempts, 1);
    assert_eq!(log.renders, 1);
    assert_eq!(log.restored, 1);
}

#[tokio::test]
async fn unresponsive_detail_control_is_reported() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(tmp.path());
    let driver = Arc::new(FakeDriver::new());
    let fetcher = Arc::new(FakeFetcher::new());
    let chain = chain(&driver, &fetcher, &cfg);

    let row = record(1);
    let key = key_of(&row);
    let request = ArtifactRequest {
        key: &key,
        row: &row,
        listing_url: LISTING_URL,
    };
    let listing = SessionHandle::new("listing");

    let outcome = chain.retrieve(&request, &listing).await;
    assert!(!outcome.saved);
    assert_eq!(outcome.reason, reason::NO_DETAIL_CONTROL);
    {
        let log = driver.log.lock().unwrap();
        assert_eq!(log.restored, 0);
        assert!(log.opened.is_empty());
    }

    let unpositioned = record(0);
    let key = key_of(&unpositioned);
    let request = ArtifactRequest {
        key: &key,
        row: &unpositioned,
        listing_url: LISTING_URL,
    };
    let outcome = chain.retrieve(&request, &listing).await;
    assert_eq!(outcome.reason, reason::NO_ROW_POSITION);
}

#[tokio::test]
async fn driver_failure_while_opening_view_is_contained() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(tmp.path());
    let mut fake = FakeDriver::new();
    fake.click = Click::Error;
    let driver = Arc::new(fake);
    let fetcher = Arc::new(FakeFetcher::new());
    let chain = chain(&driver, &fetcher, &cfg);

    let row = record(1);
    let key = key_of(&row);
    let request = ArtifactRequest {
        key: &key,
        row: &row,
        listing_url: LISTING_URL,
    };

    let outcome = chain
        .retrieve(&request, &SessionHandle::new("listing"))
        .await;

    assert!(!outcome.saved);
    assert_eq!(outcome.reason, reason::DRIVER_ERROR);
    assert!(!chain.destination(&request).exists());
}

#[tokio::test]
async fn raw_fetches_carry_the_browser_session_cookie() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(tmp.path());
    let mut fake = FakeDriver::new();
    fake.cookies = vec![
        SessionCookie::new("JSESSIONID", "s3ss10n", "kereso.example.hu"),
        SessionCookie::new("ad", "1", "ads.example.com"),
    ];
    let driver = Arc::new(fake);
    let fetcher = Arc::new(FakeFetcher::new().serve(DOC_URL, "application/pdf", b"%PDF-1.7"));
    let chain = chain(&driver, &fetcher, &cfg);

    let mut row = record(1);
    row.hints.detail_url = DOC_URL.to_string();
    let key = key_of(&row);
    let request = ArtifactRequest {
        key: &key,
        row: &row,
        listing_url: LISTING_URL,
    };

    let outcome = chain
        .retrieve(&request, &SessionHandle::new("listing"))
        .await;

    assert_eq!(outcome.reason, reason::DIRECT_FETCH);
    assert_eq!(
        fetcher.sent_cookies(),
        vec![Some("JSESSIONID=s3ss10n".to_string())]
    );
    assert_eq!(driver.log.lock().unwrap().cookie_reads, 1);
}

#[tokio::test]
async fn detail_view_url_is_fetched_when_it_names_the_document() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(tmp.path());
    let detail = "https://kereso.example.hu/adatlap?id=7";
    let mut fake = FakeDriver::new();
    fake.view_url = DOC_URL.to_string();
    let driver = Arc::new(fake);
    let fetcher = Arc::new(
        FakeFetcher::new()
            .serve(detail, "text/html", b"<html>")
            .serve(DOC_URL, "application/octet-stream", b"%PDF-1.5"),
    );
    let chain = chain(&driver, &fetcher, &cfg);

    let mut row = record(1);
    row.hints.detail_url = detail.to_string();
    let key = key_of(&row);
    let request = ArtifactRequest {
        key: &key,
        row: &row,
        listing_url: LISTING_URL,
    };

    let outcome = chain
        .retrieve(&request, &SessionHandle::new("listing"))
        .await;

    assert!(outcome.saved);
    assert_eq!(outcome.reason, reason::DETAIL_URL);
    assert_eq!(fetcher.requests(), vec![detail, DOC_URL]);
    assert_eq!(std::fs::read(chain.destination(&request)).unwrap(), b"%PDF-1.5");
    let log = driver.log.lock().unwrap();
    assert_eq!(log.closed, vec!["tab-1"]);
    assert_eq!(log.print_attempts, 0);
}
