//! Breadth-first exploration of the query space.
//!
//! The origin returns at most `split_threshold` rows per query. Every term is
//! searched once; a truncated result set is thrown away and replaced by one
//! child term per alphabet character, until the term reaches `max_depth`.
//! Terms still truncated at that depth are merged anyway and recorded as
//! overflow.
//!
//! ```text
//!  queue ──▶ search ──▶ extract ──▶ classify ─┬─ accept   ──▶ merge ──▶ artifacts
//!    ▲                                        ├─ overflow ──▶ merge + audit
//!    └──────────── term + c for c in alphabet ┘ expand
//! ```

use anyhow::Result;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::canon::{canonical_key, first_value_by_markers, RecordStore, Vocabulary};
use crate::config::Config;
use crate::error::DriverError;
use crate::models::{ExtractedBatch, OverflowEntry, Row, RunSummary, Term};
use crate::progress::{NoProgress, ProgressEvent, ProgressReporter, TermVerdict};
use crate::retrieval::{ArtifactChain, ArtifactRequest};
use crate::traits::{OperatorAssist, SearchDriver, SessionHandle};

#[derive(Debug, Clone)]
pub struct ExploreSettings {
    pub target_url: String,
    pub record_type: Option<String>,
    /// Expansion alphabet, already de-duplicated.
    pub alphabet: Vec<char>,
    pub max_depth: usize,
    pub split_threshold: usize,
    pub query_delay: Duration,
    pub results_wait: Duration,
    pub allow_force_submit: bool,
    pub unlock_wait: Duration,
    pub manual_assist: bool,
    pub manual_attempts: u32,
    pub manual_wait: Duration,
    /// 0 means no cap.
    pub max_artifacts_per_query: usize,
}

impl ExploreSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            target_url: config.target.url.clone(),
            record_type: config
                .target
                .record_type
                .clone()
                .filter(|r| !r.trim().is_empty()),
            alphabet: config.alphabet(),
            max_depth: config.explore.max_depth,
            split_threshold: config.explore.split_threshold,
            query_delay: config.query_delay(),
            results_wait: config.results_wait(),
            allow_force_submit: config.explore.allow_force_submit,
            unlock_wait: Duration::from_millis(config.unlock.auto_wait_ms),
            manual_assist: config.unlock.manual_assist,
            manual_attempts: config.unlock.manual_attempts,
            manual_wait: Duration::from_millis(config.unlock.manual_wait_ms),
            max_artifacts_per_query: config.artifacts.max_per_query,
        }
    }
}

/// `true` when a result set is known or suspected to be cut off.
pub fn is_truncated(row_count: usize, reported_total: Option<usize>, threshold: usize) -> bool {
    row_count >= threshold || reported_total.is_some_and(|total| total > row_count)
}

/// Pure transition for one searched term.
pub fn classify(
    row_count: usize,
    reported_total: Option<usize>,
    threshold: usize,
    depth: usize,
    max_depth: usize,
) -> TermVerdict {
    if !is_truncated(row_count, reported_total, threshold) {
        TermVerdict::Accept
    } else if depth < max_depth {
        TermVerdict::Expand
    } else {
        TermVerdict::Overflow
    }
}

/// What happened to one dequeued term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Searched {
        verdict: TermVerdict,
        row_count: usize,
        reported_total: Option<usize>,
        new_records: usize,
    },
    /// The search gate could not be passed; the term is not retried.
    Skipped,
    /// A recoverable driver error; the term is not retried.
    SearchFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermReport {
    pub term: Term,
    pub outcome: StepOutcome,
}

pub struct Explorer {
    driver: Arc<dyn SearchDriver>,
    settings: ExploreSettings,
    vocabulary: Vocabulary,
    chain: Option<ArtifactChain>,
    assist: Option<Arc<dyn OperatorAssist>>,
    progress: Box<dyn ProgressReporter>,
    queue: VecDeque<Term>,
    visited: HashSet<Term>,
    store: RecordStore,
    overflows: Vec<OverflowEntry>,
    summary: RunSummary,
}

impl Explorer {
    pub fn new(driver: Arc<dyn SearchDriver>, settings: ExploreSettings, vocabulary: Vocabulary) -> Self {
        Self {
            driver,
            settings,
            vocabulary,
            chain: None,
            assist: None,
            progress: Box::new(NoProgress),
            queue: VecDeque::new(),
            visited: HashSet::new(),
            store: RecordStore::new(),
            overflows: Vec::new(),
            summary: RunSummary::default(),
        }
    }

    /// Enables artifact retrieval for newly discovered records.
    pub fn with_artifacts(mut self, chain: ArtifactChain) -> Self {
        self.chain = Some(chain);
        self
    }

    pub fn with_assist(mut self, assist: Arc<dyn OperatorAssist>) -> Self {
        self.assist = Some(assist);
        self
    }

    pub fn with_progress(mut self, progress: Box<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Enqueues each distinct character of `alphabet` as a depth-1 term.
    pub fn seed(&mut self, alphabet: &[char]) {
        let mut seen = HashSet::new();
        for &c in alphabet {
            let term = Term::new(c.to_string());
            if seen.insert(term.clone()) && !self.visited.contains(&term) {
                self.queue.push_back(term);
            }
        }
    }

    /// Opens the search page and applies the record-type filter.
    pub async fn prepare(&self, session: &SessionHandle) -> Result<()> {
        self.driver.navigate(session, &self.settings.target_url).await?;
        if let Some(record_type) = &self.settings.record_type {
            if !self.driver.select_record_type(session, record_type).await? {
                warn!(record_type = %record_type, "record type option not found; searching all types");
            }
        }
        Ok(())
    }

    /// Processes the next unvisited term. `None` once the queue is drained.
    pub async fn step(&mut self, session: &SessionHandle) -> Result<Option<TermReport>> {
        let term = loop {
            match self.queue.pop_front() {
                None => return Ok(None),
                Some(t) if self.visited.contains(&t) => continue,
                Some(t) => break t,
            }
        };
        self.visited.insert(term.clone());
        debug!(term = %term, depth = term.depth(), "searching");

        let outcome = match self.search(session, &term).await {
            Ok(Some(batch)) => self.absorb(session, &term, batch).await,
            Ok(None) => {
                self.summary.terms_skipped += 1;
                StepOutcome::Skipped
            }
            Err(e) if e.is_fatal() => {
                return Err(anyhow::Error::new(e).context(format!("search for '{}' failed", term)));
            }
            Err(e) => {
                warn!(term = %term, error = %e, "search failed; term will not be retried");
                self.summary.search_errors += 1;
                StepOutcome::SearchFailed
            }
        };

        tokio::time::sleep(self.settings.query_delay).await;
        Ok(Some(TermReport { term, outcome }))
    }

    /// Steps until the queue is empty or `cancel` fires.
    pub async fn run(&mut self, session: &SessionHandle, cancel: &CancellationToken) -> Result<RunSummary> {
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                step = self.step(session) => Some(step),
            };
            match next {
                None => {
                    info!(queued = self.queue.len(), "interrupted; stopping term loop");
                    self.summary.interrupted = true;
                    break;
                }
                Some(step) => {
                    if step?.is_none() {
                        break;
                    }
                }
            }
        }
        Ok(self.summary())
    }

    async fn search(
        &self,
        session: &SessionHandle,
        term: &Term,
    ) -> Result<Option<ExtractedBatch>, DriverError> {
        let driver = self.driver.as_ref();
        driver.fill_search_field(session, term.as_str()).await?;
        driver.dispatch_input_events(session).await?;

        if !driver.unlock_search(session, self.settings.unlock_wait).await?
            && !self.assisted_unlock(session, term).await?
        {
            warn!(term = %term, "search control stayed locked; skipping term");
            return Ok(None);
        }

        driver
            .submit_search(session, self.settings.allow_force_submit)
            .await?;
        if !driver
            .wait_for_results_ready(session, self.settings.results_wait)
            .await?
        {
            debug!(term = %term, "no results marker before timeout; extracting anyway");
        }
        driver.extract_rows(session).await.map(Some)
    }

    /// Hands the gate to the operator. Returns whether searching may proceed.
    async fn assisted_unlock(&self, session: &SessionHandle, term: &Term) -> Result<bool, DriverError> {
        let Some(assist) = self.assist.as_ref().filter(|_| self.settings.manual_assist) else {
            return Ok(false);
        };
        for attempt in 1..=self.settings.manual_attempts {
            if let Err(e) = assist.wait_for_operator(term.as_str()).await {
                warn!(term = %term, error = %e, "operator assist unavailable");
                return Ok(false);
            }
            if self
                .driver
                .wait_for_search_enabled(session, self.settings.manual_wait)
                .await?
            {
                return Ok(true);
            }
            warn!(term = %term, attempt, "search control still disabled after operator assist");
        }
        // Submission may still go through via forced submit.
        Ok(true)
    }

    async fn absorb(&mut self, session: &SessionHandle, term: &Term, batch: ExtractedBatch) -> StepOutcome {
        self.summary.terms_searched += 1;
        let ExtractedBatch {
            rows,
            row_count,
            reported_total,
            listing_url,
        } = batch;

        let verdict = classify(
            row_count,
            reported_total,
            self.settings.split_threshold,
            term.depth(),
            self.settings.max_depth,
        );

        let mut new_records = 0;
        match verdict {
            TermVerdict::Expand => {
                for &c in &self.settings.alphabet {
                    self.queue.push_back(term.extend(c));
                }
                self.summary.terms_expanded += 1;
            }
            TermVerdict::Overflow => {
                warn!(term = %term, rows = row_count, total = ?reported_total, "truncated at max depth");
                self.overflows.push(OverflowEntry {
                    term: term.as_str().to_string(),
                    row_count,
                    total_hits: reported_total,
                });
                new_records = self.merge(session, term, rows, &listing_url).await;
            }
            TermVerdict::Accept => {
                new_records = self.merge(session, term, rows, &listing_url).await;
            }
        }

        self.progress.report(ProgressEvent::Term {
            term: term.as_str().to_string(),
            rows: row_count,
            reported_total,
            verdict,
            queued: self.queue.len(),
        });

        StepOutcome::Searched {
            verdict,
            row_count,
            reported_total,
            new_records,
        }
    }

    /// Merges rows under `term`; newly seen records go to artifact retrieval.
    async fn merge(&mut self, session: &SessionHandle, term: &Term, rows: Vec<Row>, listing_url: &str) -> usize {
        let mut fresh: Vec<(String, Row)> = Vec::new();
        for mut row in rows {
            row.origin = Some(term.clone());
            let key = canonical_key(&row, &self.vocabulary);
            if self.store.merge(key.clone(), row.clone()) {
                fresh.push((key, row));
            }
        }
        let new_records = fresh.len();

        let Some(chain) = &self.chain else {
            return new_records;
        };
        let cap = match self.settings.max_artifacts_per_query {
            0 => fresh.len(),
            n => n,
        };
        for (key, row) in fresh.iter().take(cap) {
            let request = ArtifactRequest {
                key,
                row,
                listing_url,
            };
            let outcome = chain.retrieve(&request, session).await;
            let label = first_value_by_markers(row, self.vocabulary.identifier_markers())
                .unwrap_or("-")
                .to_string();
            if outcome.saved {
                self.summary.artifacts_saved += 1;
                info!(term = %term, record = %label, reason = outcome.reason, "artifact saved");
            } else {
                self.summary.artifacts_failed += 1;
                warn!(term = %term, record = %label, reason = outcome.reason, "artifact failed");
            }
            self.progress.report(ProgressEvent::Artifact {
                label,
                saved: outcome.saved,
                reason: outcome.reason.to_string(),
            });
        }
        new_records
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn overflows(&self) -> &[OverflowEntry] {
        &self.overflows
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn visited(&self) -> usize {
        self.visited.len()
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            unique_records: self.store.len(),
            overflow_terms: self.overflows.len(),
            ..self.summary.clone()
        }
    }
}
