//! Persist the harvested dataset.
//!
//! Writes three documents:
//! - `records.json`: canonical key → row, in first-discovery order;
//! - `records.csv`: one line per record, columns in first-discovery order;
//! - `overflow_terms.json`: truncated terms that could not be split further
//!   (only when there are any).

use anyhow::{Context, Result};
use indexmap::{IndexMap, IndexSet};
use std::path::{Path, PathBuf};

use crate::canon::RecordStore;
use crate::config::Config;
use crate::models::{OverflowEntry, Row};

#[derive(Debug, Clone)]
pub struct SinkPaths {
    pub json: PathBuf,
    pub csv: PathBuf,
    pub overflow: PathBuf,
}

impl SinkPaths {
    pub fn from_config(config: &Config) -> Self {
        Self {
            json: config.output.json.clone(),
            csv: config.output.csv.clone(),
            overflow: config.output.overflow_json.clone(),
        }
    }
}

/// What was written, for the end-of-run summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkReport {
    pub records: usize,
    pub columns: usize,
    pub overflow_written: bool,
}

pub fn persist(store: &RecordStore, overflows: &[OverflowEntry], paths: &SinkPaths) -> Result<SinkReport> {
    write_json(store, &paths.json)?;
    let columns = write_csv(store, &paths.csv)?;
    let overflow_written = if overflows.is_empty() {
        false
    } else {
        write_overflow(overflows, &paths.overflow)?;
        true
    };
    Ok(SinkReport {
        records: store.len(),
        columns,
        overflow_written,
    })
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
    }
    Ok(())
}

pub fn write_json(store: &RecordStore, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    let doc: IndexMap<&str, &Row> = store.iter().map(|(k, row)| (k.as_str(), row)).collect();
    let json = serde_json::to_string_pretty(&doc)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Union of every row's columns (hint columns included), first-seen order.
pub fn columns<'a>(rows: impl Iterator<Item = &'a Row>) -> Vec<String> {
    let mut seen: IndexSet<String> = IndexSet::new();
    for row in rows {
        for label in row.flatten().into_keys() {
            seen.insert(label);
        }
    }
    seen.into_iter().collect()
}

/// Returns the number of columns written.
pub fn write_csv(store: &RecordStore, path: &Path) -> Result<usize> {
    ensure_parent(path)?;
    let columns = columns(store.rows());

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    if !columns.is_empty() {
        writer.write_record(&columns)?;
    }
    for row in store.rows() {
        let flat = row.flatten();
        writer.write_record(
            columns
                .iter()
                .map(|c| flat.get(c).map(String::as_str).unwrap_or("")),
        )?;
    }
    writer.flush()?;
    Ok(columns.len())
}

pub fn write_overflow(overflows: &[OverflowEntry], path: &Path) -> Result<()> {
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(overflows)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
