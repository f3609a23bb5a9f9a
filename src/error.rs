//! Error types for configuration, fetching, and the scrape run.
//!
//! Only a bad configuration ([`ScrapeError::Config`]), output files that
//! cannot be initialized ([`ScrapeError::Io`]) and a failed root-page fetch
//! ([`ScrapeError::Discovery`]) end a run. Every other failure is logged
//! and absorbed by the pipeline.

use thiserror::Error;

/// A single page fetch failed.
///
/// Every variant carries the URL so the caller can log it without keeping
/// its own copy around.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Connection refused or reset, DNS failure, TLS error, body decode error.
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The per-call timeout elapsed.
    #[error("request to {url} timed out")]
    Timeout { url: String },

    /// The server answered with a non-2xx status.
    #[error("{url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
}

impl FetchError {
    /// The URL whose fetch failed.
    pub fn url(&self) -> &str {
        match self {
            FetchError::Transport { url, .. }
            | FetchError::Timeout { url }
            | FetchError::Status { url, .. } => url,
        }
    }
}

/// Invalid or incomplete run configuration. Always fatal, and always
/// raised before any network activity.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// A required setting was given neither on the command line nor in the file.
    #[error("missing required setting `{0}`")]
    Missing(&'static str),

    /// ICCV is held in odd years only.
    #[error("{conference} is held in odd years only, got {year}")]
    InvalidYear { conference: String, year: i32 },

    #[error("invalid value for `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

/// Run-terminating failures of the scrape pipeline.
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The conference root page could not be fetched; nothing was scraped.
    #[error("failed to fetch conference root page: {0}")]
    Discovery(#[source] FetchError),

    /// The output files could not be initialized.
    #[error("failed to initialize output files: {0}")]
    Io(#[from] std::io::Error),
}
