//! Row identity and the deduplicating record store.
//!
//! A listing row is identified by a registry identifier when one is present
//! (`id:<value>`). Otherwise the key falls back to the display name plus a
//! key-sorted serialization of every data column, so two rows with the same
//! cells produce the same key regardless of column order.

use indexmap::IndexMap;
use std::collections::BTreeMap;

use crate::config::VocabularyConfig;
use crate::models::Row;

/// Label vocabularies used to pick identity columns.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    identifier: Vec<String>,
    name: Vec<String>,
}

impl Vocabulary {
    pub fn new(identifier: Vec<String>, name: Vec<String>) -> Self {
        Self {
            identifier: identifier.iter().map(|m| m.to_lowercase()).collect(),
            name: name.iter().map(|m| m.to_lowercase()).collect(),
        }
    }

    pub fn from_config(config: &VocabularyConfig) -> Self {
        Self::new(config.identifier.clone(), config.name.clone())
    }

    pub fn identifier_markers(&self) -> &[String] {
        &self.identifier
    }

    pub fn name_markers(&self) -> &[String] {
        &self.name
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::from_config(&VocabularyConfig::default())
    }
}

fn label_matches(label: &str, markers: &[String]) -> bool {
    let label = label.to_lowercase();
    markers.iter().any(|m| label.contains(m.as_str()))
}

/// First non-empty value whose column label contains one of `markers`.
pub fn first_value_by_markers<'a>(row: &'a Row, markers: &[String]) -> Option<&'a str> {
    row.fields
        .iter()
        .filter(|(label, _)| label_matches(label, markers))
        .map(|(_, value)| value.trim())
        .find(|value| !value.is_empty())
}

/// Derives the canonical key of a row.
pub fn canonical_key(row: &Row, vocabulary: &Vocabulary) -> String {
    if let Some(id) = first_value_by_markers(row, vocabulary.identifier_markers()) {
        return format!("id:{}", id);
    }

    let name = first_value_by_markers(row, vocabulary.name_markers()).unwrap_or("");
    let sorted: BTreeMap<&str, &str> = row
        .fields
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    // A map of strings always serializes.
    let serialized = serde_json::to_string(&sorted).unwrap_or_default();
    format!("name:{}|row:{}", name, serialized)
}

/// Canonical key → latest row, iterated in first-insertion order.
#[derive(Debug, Default)]
pub struct RecordStore {
    records: IndexMap<String, Row>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `row` under `key`, replacing any earlier row but keeping the
    /// key's original position. Returns `true` when the key is new.
    pub fn merge(&mut self, key: String, row: Row) -> bool {
        // IndexMap::insert keeps the slot of an existing key.
        self.records.insert(key, row).is_none()
    }

    pub fn get(&self, key: &str) -> Option<&Row> {
        self.records.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Row)> {
        self.records.iter()
    }

    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.records.values()
    }
}

/// Makes a value safe to use as a file name component.
pub fn sanitize_filename(value: &str) -> String {
    let mut cleaned = String::with_capacity(value.len());
    let mut in_run = false;
    for c in value.chars() {
        if c.is_alphanumeric() || c == '_' || c == '-' || c == '.' {
            cleaned.push(c);
            in_run = false;
        } else if !in_run {
            cleaned.push('_');
            in_run = true;
        }
    }
    let trimmed: String = cleaned
        .trim_matches(|c| c == '.' || c == '_')
        .chars()
        .take(90)
        .collect();
    if trimmed.is_empty() {
        "unknown".to_string()
    } else {
        trimmed
    }
}
