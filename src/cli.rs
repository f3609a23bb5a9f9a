//! Command-line interface definitions for cvf_scrape.
//!
//! Every run setting can come from a flag or from the YAML file given with
//! `--config`. Flags win over the file; see [`crate::config`] for defaults.

use clap::Parser;

/// Command-line arguments for cvf_scrape.
///
/// # Examples
///
/// ```sh
/// # Scrape the first 100 ICCV 2023 papers into ./out
/// cvf_scrape --conference iccv --year 2023 --max-papers 100
///
/// # Take everything from a config file, but override the output directory
/// cvf_scrape -c cvpr2024.yaml -o /tmp/bib
/// ```
#[derive(Parser, Debug, Default)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML config file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Conference acronym, e.g. CVPR or ICCV (case-insensitive)
    #[arg(long)]
    pub conference: Option<String>,

    /// Conference year
    #[arg(short, long)]
    pub year: Option<i32>,

    /// Maximum number of papers to scrape
    #[arg(short, long)]
    pub max_papers: Option<usize>,

    /// Number of papers per processing batch
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// Detail page fetch attempts per paper
    #[arg(short, long)]
    pub retries: Option<u32>,

    /// Seconds to wait between detail page fetch attempts
    #[arg(long)]
    pub retry_delay_secs: Option<u64>,

    /// Detail pages fetched concurrently within a batch (output order is unaffected)
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Output directory for the .bib and .xml files
    #[arg(short, long)]
    pub output_dir: Option<String>,
}
