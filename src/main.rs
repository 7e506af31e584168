//! # cap-harvest CLI (`harvest`)
//!
//! ## Usage
//!
//! ```bash
//! harvest --config ./config/harvest.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `harvest init` | Write an example configuration file |
//! | `harvest check` | Validate configuration and probe the WebDriver endpoint |
//! | `harvest run` | Crawl the search origin and write the dataset |
//!
//! ## Examples
//!
//! ```bash
//! # Full crawl with artifacts, JSON progress for log collection
//! harvest run --download-artifacts --progress json
//!
//! # Records only, shallower partitioning
//! harvest run --db-only --max-depth 2 --alphabet abc
//! ```
//!
//! Logging goes to stderr and is controlled with `RUST_LOG`
//! (default `info`).

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cap_harvest::{check, config, harvest, progress::ProgressMode};

/// cap-harvest: exhaustive harvesting of capped keyword-search listings.
#[derive(Parser)]
#[command(
    name = "harvest",
    about = "Exhaustive harvesting of capped keyword-search listings",
    version,
    long_about = "Searches every prefix over an alphabet, splits truncated result sets into \
    longer prefixes, merges all rows into one deduplicated dataset, and optionally saves one \
    document artifact per record."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/harvest.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write an example configuration file at `--config`.
    Init,

    /// Validate configuration and probe the WebDriver endpoint.
    Check,

    /// Crawl the search origin.
    ///
    /// Flags override the matching configuration keys. Ctrl-C stops the
    /// crawl, saves what was collected and exits with status 130.
    Run {
        /// Expansion alphabet.
        #[arg(long)]
        alphabet: Option<String>,

        /// Maximum prefix length.
        #[arg(long)]
        max_depth: Option<usize>,

        /// Row count at which a result set counts as truncated.
        #[arg(long)]
        split_threshold: Option<usize>,

        /// Retrieve one artifact per new record.
        #[arg(long, action = ArgAction::SetTrue, conflicts_with = "no_download_artifacts")]
        download_artifacts: bool,

        /// Do not retrieve artifacts.
        #[arg(long, action = ArgAction::SetTrue)]
        no_download_artifacts: bool,

        /// Collect records only; implies --no-download-artifacts.
        #[arg(long)]
        db_only: bool,

        /// Cap artifact attempts per query (0 = unlimited).
        #[arg(long)]
        max_artifacts_per_query: Option<usize>,

        /// Run the browser headless.
        #[arg(long)]
        headless: bool,

        /// Progress output: `human`, `json` or `off`. Defaults to `human`
        /// when stderr is a terminal.
        #[arg(long, value_parser = parse_progress)]
        progress: Option<ProgressMode>,
    },
}

fn parse_progress(s: &str) -> Result<ProgressMode, String> {
    ProgressMode::parse(s).ok_or_else(|| format!("invalid progress mode '{}': use human, json or off", s))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    // Commands that don't require config
    if let Commands::Init = cli.command {
        config::scaffold_config(&cli.config)?;
        println!("Wrote {}", cli.config.display());
        return Ok(());
    }

    let mut cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => unreachable!(),
        Commands::Check => {
            check::run_check(&cfg).await?;
        }
        Commands::Run {
            alphabet,
            max_depth,
            split_threshold,
            download_artifacts,
            no_download_artifacts,
            db_only,
            max_artifacts_per_query,
            headless,
            progress,
        } => {
            let overrides = harvest::RunOverrides {
                alphabet,
                max_depth,
                split_threshold,
                download_artifacts: match (download_artifacts, no_download_artifacts) {
                    (true, _) => Some(true),
                    (_, true) => Some(false),
                    _ => None,
                },
                db_only,
                max_artifacts_per_query,
                headless,
            };
            overrides.apply(&mut cfg)?;

            let mode = progress.unwrap_or_else(ProgressMode::default_for_tty);
            let code = harvest::run_harvest(&cfg, mode).await?;
            if code != 0 {
                std::process::exit(code);
            }
        }
    }

    Ok(())
}
