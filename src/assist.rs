//! Terminal-based [`OperatorAssist`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::io::{BufRead, Write};

use crate::traits::OperatorAssist;

/// Prompts on stderr and waits for Enter on stdin.
pub struct StdinAssist;

#[async_trait]
impl OperatorAssist for StdinAssist {
    async fn wait_for_operator(&self, term: &str) -> Result<()> {
        let prompt = format!(
            "\n[{}] Unlock the search control in the browser, then press Enter to continue...",
            term
        );
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut stderr = std::io::stderr().lock();
            writeln!(stderr, "{}", prompt)?;
            stderr.flush()?;
            let mut line = String::new();
            let read = std::io::stdin().lock().read_line(&mut line)?;
            if read == 0 {
                anyhow::bail!("stdin closed");
            }
            Ok(())
        })
        .await
        .context("operator prompt task panicked")?
    }
}
