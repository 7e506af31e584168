//! Harvest progress reporting.
//!
//! Reports each searched term and each artifact outcome as it happens, so the
//! operator can follow the crawl. Progress is emitted on **stderr** so stdout
//! stays reserved for the end-of-run summary.

use std::io::Write;

/// What the explorer decided for a searched term.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TermVerdict {
    Accept,
    Expand,
    Overflow,
}

impl TermVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            TermVerdict::Accept => "accept",
            TermVerdict::Expand => "expand",
            TermVerdict::Overflow => "overflow",
        }
    }
}

/// A single progress event.
#[derive(Clone, Debug)]
pub enum ProgressEvent {
    /// A term was searched and classified.
    Term {
        term: String,
        rows: usize,
        reported_total: Option<usize>,
        verdict: TermVerdict,
        queued: usize,
    },
    /// Artifact retrieval finished for one record.
    Artifact {
        label: String,
        saved: bool,
        reason: String,
    },
}

/// Reports harvest progress. Implementations write to stderr (human or JSON).
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Human-friendly progress: `[search] 'ab'  rows=100 total=137  expand  (queued 1,204)`.
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        let line = match &event {
            ProgressEvent::Term {
                term,
                rows,
                reported_total,
                verdict,
                queued,
            } => {
                let total = reported_total
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "-".to_string());
                format!(
                    "[search] '{}'  rows={} total={}  {}  (queued {})\n",
                    term,
                    rows,
                    total,
                    verdict.as_str(),
                    format_number(*queued as u64)
                )
            }
            ProgressEvent::Artifact {
                label,
                saved,
                reason,
            } => {
                let tag = if *saved { "ok" } else { "fail" };
                format!("    [artifact:{}] {} ({})\n", tag, label, reason)
            }
        };
        emit(&line);
    }
}

/// One JSON object per event, newline-delimited, for log collectors.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let obj = match &event {
            ProgressEvent::Term {
                term,
                rows,
                reported_total,
                verdict,
                queued,
            } => serde_json::json!({
                "event": "term",
                "term": term,
                "rows": rows,
                "reported_total": reported_total,
                "verdict": verdict.as_str(),
                "queued": queued
            }),
            ProgressEvent::Artifact {
                label,
                saved,
                reason,
            } => serde_json::json!({
                "event": "artifact",
                "record": label,
                "saved": saved,
                "reason": reason
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            emit(&format!("{}\n", line));
        }
    }
}

/// Used for `--progress off`.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Formats a count with thousands separators: `1234567` -> `1,234,567`.
pub fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let lead = digits.len() % 3;
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, d) in digits.char_indices() {
        if i != 0 && (i + 3 - lead) % 3 == 0 {
            out.push(',');
        }
        out.push(d);
    }
    out
}

fn emit(line: &str) {
    let mut stderr = std::io::stderr().lock();
    let _ = stderr.write_all(line.as_bytes());
    let _ = stderr.flush();
}

/// Selected with `harvest run --progress`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// `human` when stderr is a terminal, `off` when it is piped.
    pub fn default_for_tty() -> Self {
        match atty::is(atty::Stream::Stderr) {
            true => ProgressMode::Human,
            false => ProgressMode::Off,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "off" => Some(ProgressMode::Off),
            "human" => Some(ProgressMode::Human),
            "json" => Some(ProgressMode::Json),
            _ => None,
        }
    }

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
