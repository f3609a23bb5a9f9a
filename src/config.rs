//! Run configuration: YAML file loading, CLI overrides, and validation.
//!
//! Settings are layered as defaults < YAML file < command-line flags. The
//! result is a validated [`RunContext`] (everything the pipeline needs)
//! plus the output directory. Validation happens before any network
//! activity, so a bad configuration never produces partial output.
//!
//! # File Format
//!
//! ```yaml
//! conference: ICCV
//! year: 2023
//! max_papers: 200
//! batch_size: 10
//! retries: 3
//! retry_delay_secs: 5
//! section_timeout_secs: 5
//! detail_timeout_secs: 20
//! concurrency: 1
//! output_dir: out
//! ```
//!
//! Only `conference` and `year` are required (from either source).

use crate::cli::Cli;
use crate::error::{ConfigError, ScrapeError};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// The proceedings archive every URL is built from.
pub const WEBSITE_ROOT: &str = "http://openaccess.thecvf.com/";

pub const DEFAULT_MAX_PAPERS: usize = 5000;
pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);
pub const DEFAULT_SECTION_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_DETAIL_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_CONCURRENCY: usize = 1;
pub const DEFAULT_OUTPUT_DIR: &str = "out";

/// Settings as read from the YAML file. Every key is optional.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub conference: Option<String>,
    pub year: Option<i32>,
    pub max_papers: Option<usize>,
    pub batch_size: Option<usize>,
    pub retries: Option<u32>,
    pub retry_delay_secs: Option<u64>,
    pub section_timeout_secs: Option<u64>,
    pub detail_timeout_secs: Option<u64>,
    pub concurrency: Option<usize>,
    pub output_dir: Option<String>,
}

/// Read and parse a YAML config file.
#[instrument(level = "info")]
pub fn load_config(path: &str) -> Result<FileConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_string(),
        source,
    })?;
    let config = parse_config(&text).map_err(|source| ConfigError::Parse {
        path: path.to_string(),
        source,
    })?;
    debug!(?config, "Loaded config file");
    Ok(config)
}

fn parse_config(text: &str) -> Result<FileConfig, serde_yaml::Error> {
    if text.trim().is_empty() {
        return Ok(FileConfig::default());
    }
    serde_yaml::from_str(text)
}

/// Everything a scrape run needs to know. Built once, read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    /// Uppercased conference acronym, e.g. `ICCV`.
    pub conference: String,
    pub year: i32,
    /// The conference root page, e.g. `http://openaccess.thecvf.com/ICCV2023`.
    pub base_url: Url,
    /// The archive root every relative link is resolved against.
    pub website_root: Url,
    /// Upper bound on the number of papers scraped.
    pub max_papers: usize,
    pub batch_size: usize,
    /// Detail page fetch attempts per paper (not additional retries).
    pub retries: u32,
    /// Fixed pause between detail page fetch attempts.
    pub retry_delay: Duration,
    /// Timeout for the root page and section listings.
    pub section_timeout: Duration,
    /// Timeout for each detail page fetch attempt.
    pub detail_timeout: Duration,
    /// Detail pages in flight at once.
    pub concurrency: usize,
}

impl RunContext {
    /// A context with default limits for `conference` and `year`.
    ///
    /// Fails if the conference is not an alphanumeric acronym, or if it is
    /// ICCV and the year is even.
    pub fn new(conference: &str, year: i32) -> Result<Self, ConfigError> {
        let conference = conference.trim().to_uppercase();
        if conference.is_empty() || !conference.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::Invalid {
                field: "conference",
                reason: format!("expected an alphanumeric acronym, got {conference:?}"),
            });
        }
        if conference == "ICCV" && year % 2 == 0 {
            return Err(ConfigError::InvalidYear { conference, year });
        }

        let invalid_url = |e: url::ParseError| ConfigError::Invalid {
            field: "conference",
            reason: e.to_string(),
        };
        let website_root = Url::parse(WEBSITE_ROOT).map_err(invalid_url)?;
        let base_url = website_root
            .join(&format!("{conference}{year}"))
            .map_err(invalid_url)?;

        Ok(Self {
            conference,
            year,
            base_url,
            website_root,
            max_papers: DEFAULT_MAX_PAPERS,
            batch_size: DEFAULT_BATCH_SIZE,
            retries: DEFAULT_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            section_timeout: DEFAULT_SECTION_TIMEOUT,
            detail_timeout: DEFAULT_DETAIL_TIMEOUT,
            concurrency: DEFAULT_CONCURRENCY,
        })
    }

    /// File stem shared by both outputs, e.g. `ICCV2023`.
    pub fn filename_base(&self) -> String {
        format!("{}{}", self.conference, self.year)
    }

    fn validate_limits(&self) -> Result<(), ConfigError> {
        let positive = [
            ("batch_size", self.batch_size as u64),
            ("retries", u64::from(self.retries)),
            ("concurrency", self.concurrency as u64),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be at least 1".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// A validated run configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub context: RunContext,
    pub output_dir: PathBuf,
}

/// Merge CLI flags over file values over defaults, then validate.
pub fn resolve(cli: &Cli, file: FileConfig) -> Result<Settings, ConfigError> {
    let conference = cli
        .conference
        .clone()
        .or(file.conference)
        .ok_or(ConfigError::Missing("conference"))?;
    let year = cli.year.or(file.year).ok_or(ConfigError::Missing("year"))?;

    let mut context = RunContext::new(&conference, year)?;
    context.max_papers = cli.max_papers.or(file.max_papers).unwrap_or(context.max_papers);
    context.batch_size = cli.batch_size.or(file.batch_size).unwrap_or(context.batch_size);
    context.retries = cli.retries.or(file.retries).unwrap_or(context.retries);
    context.concurrency = cli.concurrency.or(file.concurrency).unwrap_or(context.concurrency);
    if let Some(secs) = cli.retry_delay_secs.or(file.retry_delay_secs) {
        context.retry_delay = Duration::from_secs(secs);
    }
    if let Some(secs) = file.section_timeout_secs {
        context.section_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = file.detail_timeout_secs {
        context.detail_timeout = Duration::from_secs(secs);
    }
    context.validate_limits()?;

    let output_dir = cli
        .output_dir
        .clone()
        .or(file.output_dir)
        .unwrap_or_else(|| DEFAULT_OUTPUT_DIR.to_string());

    Ok(Settings {
        context,
        output_dir: PathBuf::from(output_dir),
    })
}

/// Load the file named by `--config`, if any, and resolve it against the
/// command line.
pub fn load_settings(cli: &Cli) -> Result<Settings, ScrapeError> {
    let file = match cli.config.as_deref() {
        Some(path) => load_config(path)?,
        None => FileConfig::default(),
    };
    Ok(resolve(cli, file)?)
}
