//! Core data models used throughout the harvester.
//!
//! These types represent the search terms, listing rows, and audit entries
//! that flow between the driver, the explorer, and the output sink.

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;

/// A search prefix over the configured alphabet. Depth is its length in
/// characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Term(String);

impl Term {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.chars().count()
    }

    /// Returns a new term one character deeper.
    pub fn extend(&self, c: char) -> Term {
        let mut next = String::with_capacity(self.0.len() + c.len_utf8());
        next.push_str(&self.0);
        next.push(c);
        Term(next)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Retrieval hints attached to a listing row by the driver.
///
/// None of these participate in the canonical key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowHints {
    /// Detail link already resolved against the listing URL, if any.
    pub detail_url: String,
    /// Raw `href` attribute of the detail control.
    pub detail_href: String,
    /// Visible text of the detail control.
    pub detail_text: String,
    /// Inline `onclick` script of the detail control.
    pub detail_script: String,
    /// 1-based position within the listing it was extracted from.
    pub position: usize,
}

/// One result row as extracted from a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    /// Column label → cell value, in table order.
    pub fields: IndexMap<String, String>,
    pub hints: RowHints,
    /// Term under which the row was last merged.
    pub origin: Option<Term>,
}

/// Column names used when hints are flattened into output documents.
pub const HINT_COLUMNS: [&str; 6] = [
    "_detail_text",
    "_detail_href",
    "_detail_onclick",
    "_detail_url",
    "_row_index",
    "_query",
];

impl Row {
    pub fn new(fields: IndexMap<String, String>, hints: RowHints) -> Self {
        Self {
            fields,
            hints,
            origin: None,
        }
    }

    /// Flattens fields and hints into a single ordered column map.
    pub fn flatten(&self) -> IndexMap<String, String> {
        let mut out = self.fields.clone();
        out.insert("_detail_text".into(), self.hints.detail_text.clone());
        out.insert("_detail_href".into(), self.hints.detail_href.clone());
        out.insert("_detail_onclick".into(), self.hints.detail_script.clone());
        out.insert("_detail_url".into(), self.hints.detail_url.clone());
        out.insert("_row_index".into(), self.hints.position.to_string());
        out.insert(
            "_query".into(),
            self.origin
                .as_ref()
                .map(|t| t.as_str().to_string())
                .unwrap_or_default(),
        );
        out
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + HINT_COLUMNS.len()))?;
        for (label, value) in &self.fields {
            map.serialize_entry(label, value)?;
        }
        map.serialize_entry("_detail_text", &self.hints.detail_text)?;
        map.serialize_entry("_detail_href", &self.hints.detail_href)?;
        map.serialize_entry("_detail_onclick", &self.hints.detail_script)?;
        map.serialize_entry("_detail_url", &self.hints.detail_url)?;
        map.serialize_entry("_row_index", &self.hints.position)?;
        map.serialize_entry("_query", &self.origin.as_ref().map(Term::as_str))?;
        map.end()
    }
}

/// Rows returned by one search, plus the total the origin claims to have.
#[derive(Debug, Clone, Default)]
pub struct ExtractedBatch {
    pub rows: Vec<Row>,
    pub row_count: usize,
    pub reported_total: Option<usize>,
    /// URL of the listing the rows came from; base for relative detail links.
    pub listing_url: String,
}

impl ExtractedBatch {
    pub fn new(rows: Vec<Row>, reported_total: Option<usize>) -> Self {
        let row_count = rows.len();
        Self {
            rows,
            row_count,
            reported_total,
            listing_url: String::new(),
        }
    }

    pub fn with_listing_url(mut self, url: impl Into<String>) -> Self {
        self.listing_url = url.into();
        self
    }
}

/// A truncated term that could not be narrowed further.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct OverflowEntry {
    pub term: String,
    pub row_count: usize,
    pub total_hits: Option<usize>,
}

/// Raw observations about the view currently shown in a session.
#[derive(Debug, Clone, Default)]
pub struct PageSignals {
    pub url: String,
    pub text: String,
    pub has_weak_visual_marker: bool,
}

/// Tri-state verdict on whether a view is a record's detail page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageClass {
    LikelyDetail,
    LikelyListing,
    Unknown,
}

/// End-of-run counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub terms_searched: usize,
    pub terms_expanded: usize,
    pub terms_skipped: usize,
    pub search_errors: usize,
    pub unique_records: usize,
    pub artifacts_saved: usize,
    pub artifacts_failed: usize,
    pub overflow_terms: usize,
    pub interrupted: bool,
}
