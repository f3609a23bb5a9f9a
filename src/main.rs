//! # cvf_scrape
//!
//! Scrapes a conference's proceedings from the CVF open access archive and
//! writes every paper to a BibTeX file and an RSS feed.
//!
//! ## Usage
//!
//! ```sh
//! cvf_scrape --conference ICCV --year 2023 --max-papers 200 -o ./out
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture:
//! 1. **Configuration**: Merge CLI flags over the YAML file and validate
//! 2. **Discovery**: Find the per-day section listings on the conference page
//! 3. **Listing**: Collect paper titles and links, up to the paper cap
//! 4. **Cooking**: Fetch each paper page (with retries) and extract metadata
//! 5. **Output**: Append each paper to `<CONF><YEAR>.bib` and `<CONF><YEAR>.xml`
//!    as soon as it is ready

use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod error;
mod fetch;
mod models;
mod outputs;
mod pipeline;
mod sanitize;
mod scrapers;
mod utils;

use cli::Cli;
use fetch::HttpFetcher;
use outputs::{OutputFiles, feed::FeedChannel};
use pipeline::Scraper;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("cvf_scrape starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    // ---- Resolve configuration (no network activity before this passes) ----
    let settings = match config::load_settings(&args) {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };
    let ctx = settings.context;
    info!(
        conference = %ctx.conference,
        year = ctx.year,
        base_url = %ctx.base_url,
        max_papers = ctx.max_papers,
        batch_size = ctx.batch_size,
        retries = ctx.retries,
        retry_delay = ?ctx.retry_delay,
        concurrency = ctx.concurrency,
        "Resolved configuration"
    );

    // ---- Output files ----
    if let Err(e) = ensure_writable_dir(&settings.output_dir).await {
        error!(
            path = %settings.output_dir.display(),
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }
    let outputs = OutputFiles::new(&settings.output_dir, &ctx.filename_base());
    outputs.start(&FeedChannel::for_context(&ctx)).await?;

    // ---- Scrape ----
    let scraper = Scraper::new(HttpFetcher::new()?, ctx);
    let stats = match scraper.run(&outputs).await {
        Ok(stats) => stats,
        Err(e) => {
            error!(error = %e, "Scrape aborted");
            return Err(e.into());
        }
    };

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        persisted = stats.persisted(),
        degraded = stats.degraded,
        bib = %outputs.bib_path().display(),
        feed = %outputs.feed_path().display(),
        "Execution complete"
    );

    Ok(())
}
