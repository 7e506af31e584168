//! # cap-harvest
//!
//! Exhaustive harvesting of keyword-search listings that cap how many rows a
//! single query may return.
//!
//! The harvester searches every prefix over a configured alphabet. When a
//! result set is truncated, the prefix is replaced by one longer prefix per
//! alphabet character until the results fit (or a depth bound is hit and the
//! prefix is recorded for audit). Rows from every query are merged into one
//! deduplicated record store keyed by a stable identity, and an optional
//! tiered chain fetches one document artifact per record.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌────────────┐   ┌──────────────┐
//! │  WebDriver   │◀──│  Explorer  │──▶│ RecordStore  │──▶ JSON / CSV
//! │ chromedriver │   │ BFS prefix │   │ canonical key│
//! └──────────────┘   └─────┬──────┘   └──────────────┘
//!                          │ new records
//!                          ▼
//!                   ┌──────────────┐
//!                   │ArtifactChain │──▶ artifact files
//!                   │ tiers A/B/C  │
//!                   └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! chromedriver --port=9515 &
//! harvest init                  # write config/harvest.toml
//! harvest check                 # validate config, probe the driver
//! harvest run --max-depth 3 --download-artifacts
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Terms, rows, batches, summaries |
//! | [`canon`] | Canonical keys and the record store |
//! | [`classifier`] | Detail/listing page classification |
//! | [`explorer`] | Breadth-first prefix exploration |
//! | [`retrieval`] | Tiered artifact retrieval |
//! | [`sink`] | JSON, CSV and overflow output |
//! | [`traits`] | Driver, fetcher and operator seams |
//! | [`webdriver`] | W3C WebDriver implementation of the driver |
//! | [`fetch`] | `reqwest` document fetcher |
//! | [`progress`] | Progress reporting |
//! | [`harvest`] | `harvest run` wiring |

pub mod assist;
pub mod canon;
pub mod check;
pub mod classifier;
pub mod config;
pub mod error;
pub mod explorer;
pub mod fetch;
pub mod harvest;
pub mod models;
pub mod progress;
pub mod retrieval;
pub mod sink;
pub mod traits;
pub mod webdriver;
