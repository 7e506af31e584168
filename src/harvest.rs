//! `harvest run`: wires the WebDriver session, explorer, retrieval chain and
//! output sink together.
//!
//! Partial state is flushed on every exit path once the search page is open,
//! including Ctrl-C and fatal driver errors.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::assist::StdinAssist;
use crate::canon::Vocabulary;
use crate::classifier::PageClassifier;
use crate::config::Config;
use crate::explorer::{ExploreSettings, Explorer};
use crate::fetch::HttpFetcher;
use crate::models::RunSummary;
use crate::progress::ProgressMode;
use crate::retrieval::{ArtifactChain, RetrievalSettings};
use crate::sink::{self, SinkPaths, SinkReport};
use crate::traits::{SearchDriver, SessionHandle};
use crate::webdriver::WebDriverDriver;

/// Exit status after an interrupted but flushed run.
pub const EXIT_INTERRUPTED: i32 = 130;

/// Command-line overrides for `harvest run`.
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub alphabet: Option<String>,
    pub max_depth: Option<usize>,
    pub split_threshold: Option<usize>,
    pub download_artifacts: Option<bool>,
    pub db_only: bool,
    pub max_artifacts_per_query: Option<usize>,
    pub headless: bool,
}

impl RunOverrides {
    /// Applies the overrides and re-validates.
    pub fn apply(&self, config: &mut Config) -> Result<()> {
        if let Some(alphabet) = &self.alphabet {
            config.explore.alphabet = alphabet.clone();
        }
        if let Some(depth) = self.max_depth {
            config.explore.max_depth = depth;
        }
        if let Some(threshold) = self.split_threshold {
            config.explore.split_threshold = threshold;
        }
        if let Some(enabled) = self.download_artifacts {
            config.artifacts.enabled = enabled;
        }
        if self.db_only {
            config.artifacts.enabled = false;
        }
        if let Some(cap) = self.max_artifacts_per_query {
            config.artifacts.max_per_query = cap;
        }
        if self.headless {
            config.webdriver.headless = true;
        }
        config.validate()
    }
}

#[derive(Debug, Clone)]
pub struct HarvestOutcome {
    pub summary: RunSummary,
    /// `None` when the run was interrupted before its first search.
    pub sink: Option<SinkReport>,
}

/// Seeds and runs `explorer` on an already started session, then flushes
/// the record store and overflow audit to `paths`.
///
/// Once a term has been searched the flush always happens, even when the run
/// ends with a fatal error; the error is returned afterwards. A failed page
/// open, or an interrupt before the first search, leaves existing output
/// untouched.
pub async fn crawl(
    explorer: &mut Explorer,
    session: &SessionHandle,
    alphabet: &[char],
    paths: &SinkPaths,
    cancel: &CancellationToken,
) -> Result<HarvestOutcome> {
    explorer.seed(alphabet);
    explorer
        .prepare(session)
        .await
        .context("failed to open the search page")?;
    let result = explorer.run(session, cancel).await;

    if explorer.visited() == 0 {
        if let Ok(summary) = &result {
            if summary.interrupted {
                info!("interrupted before the first search; existing output left untouched");
                return Ok(HarvestOutcome {
                    summary: summary.clone(),
                    sink: None,
                });
            }
        }
    }

    let sink = sink::persist(explorer.store(), explorer.overflows(), paths)
        .context("failed to write harvested records")?;
    info!(
        records = sink.records,
        columns = sink.columns,
        overflow = sink.overflow_written,
        "dataset flushed"
    );

    Ok(HarvestOutcome {
        summary: result?,
        sink: Some(sink),
    })
}

/// Runs a full harvest against the configured origin. Returns the process
/// exit status.
pub async fn run_harvest(config: &Config, progress: ProgressMode) -> Result<i32> {
    let webdriver = Arc::new(WebDriverDriver::from_config(config)?);
    let driver: Arc<dyn SearchDriver> = webdriver.clone();
    let vocabulary = Vocabulary::from_config(&config.vocabulary);

    let mut explorer = Explorer::new(
        driver.clone(),
        ExploreSettings::from_config(config),
        vocabulary.clone(),
    )
    .with_progress(progress.reporter());
    if config.unlock.manual_assist {
        explorer = explorer.with_assist(Arc::new(StdinAssist));
    }
    if config.artifacts.enabled {
        let chain = ArtifactChain::new(
            driver.clone(),
            Arc::new(HttpFetcher::new()?),
            RetrievalSettings::from_config(config),
            PageClassifier::from_config(&config.classifier),
            vocabulary,
        );
        explorer = explorer.with_artifacts(chain);
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let session = driver.start().await.with_context(|| {
        format!("failed to start a browser session at {}", webdriver.endpoint())
    })?;
    let paths = SinkPaths::from_config(config);
    let outcome = crawl(&mut explorer, &session, &config.alphabet(), &paths, &cancel).await;

    if let Err(e) = driver.shutdown(session).await {
        warn!(error = %e, "failed to close the browser session");
    }

    let outcome = outcome?;
    print_summary(&outcome, &paths, config);

    Ok(if outcome.summary.interrupted {
        EXIT_INTERRUPTED
    } else {
        0
    })
}

fn print_summary(outcome: &HarvestOutcome, paths: &SinkPaths, config: &Config) {
    let s = &outcome.summary;
    if s.interrupted && outcome.sink.is_none() {
        println!("harvest interrupted before the first search (nothing written)");
        return;
    }
    if s.interrupted {
        println!("harvest interrupted (partial results saved)");
    } else {
        println!("harvest complete");
    }
    println!("  queries: {}", s.terms_searched);
    println!("  expanded: {}", s.terms_expanded);
    if s.terms_skipped > 0 || s.search_errors > 0 {
        println!("  skipped: {}  errors: {}", s.terms_skipped, s.search_errors);
    }
    println!("  unique records: {}", s.unique_records);
    if config.artifacts.enabled {
        println!(
            "  artifacts: {} ok, {} failed ({})",
            s.artifacts_saved,
            s.artifacts_failed,
            config.output.artifact_dir.display()
        );
    }
    println!("  json: {}", paths.json.display());
    println!("  csv: {}", paths.csv.display());
    if outcome.sink.as_ref().is_some_and(|r| r.overflow_written) {
        println!(
            "  overflow terms: {} ({})",
            s.overflow_terms,
            paths.overflow.display()
        );
    }
}
