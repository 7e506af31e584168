//! Errors raised at the driver seam.
//!
//! Everything above the driver works in `anyhow::Result`; this enum exists so
//! the explorer can tell a broken search surface apart from a flaky request.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    /// The automation backend could not be reached or refused a session.
    #[error("automation backend unavailable: {0}")]
    Unavailable(String),

    /// A control the search depends on is missing from the page.
    #[error("search controls not found: {0}")]
    ControlsMissing(String),

    #[error("timed out after {waited:?} waiting for {what}")]
    Timeout { waited: Duration, what: &'static str },

    #[error("webdriver protocol error: {0}")]
    Protocol(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DriverError {
    /// Fatal errors abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DriverError::Unavailable(_) | DriverError::ControlsMissing(_)
        )
    }
}
