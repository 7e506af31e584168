use anyhow::{bail, Result};

use crate::config::Config;
use crate::webdriver::WebDriverDriver;

/// Prints the resolved settings and probes the WebDriver endpoint.
pub async fn run_check(config: &Config) -> Result<()> {
    let alphabet: String = config.alphabet().into_iter().collect();

    println!("{:<22} {}", "target", config.target.url);
    println!(
        "{:<22} {}",
        "record type",
        config.target.record_type.as_deref().unwrap_or("(any)")
    );
    println!("{:<22} {} ({} chars)", "alphabet", alphabet, alphabet.chars().count());
    println!("{:<22} {}", "max depth", config.explore.max_depth);
    println!("{:<22} {}", "split threshold", config.explore.split_threshold);
    println!(
        "{:<22} {}",
        "artifacts",
        if config.artifacts.enabled {
            config.output.artifact_dir.display().to_string()
        } else {
            "disabled".to_string()
        }
    );
    println!("{:<22} {}", "records json", config.output.json.display());
    println!("{:<22} {}", "records csv", config.output.csv.display());

    let driver = WebDriverDriver::from_config(config)?;
    match driver.status().await {
        Ok(status) if status.ready => {
            println!("{:<22} {} READY", "webdriver", driver.endpoint());
        }
        Ok(status) => {
            println!("{:<22} {} NOT READY", "webdriver", driver.endpoint());
            bail!("WebDriver endpoint is not ready: {}", status.message);
        }
        Err(e) => {
            println!("{:<22} {} UNREACHABLE", "webdriver", driver.endpoint());
            bail!("{}", e);
        }
    }

    println!("ok");
    Ok(())
}
