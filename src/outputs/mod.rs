//! Append-only output files.
//!
//! A run writes two files side by side:
//!
//! ```text
//! output_dir/
//! ├── ICCV2023.bib   # one BibTeX entry per paper, blank-line separated
//! └── ICCV2023.xml   # RSS 2.0 feed, one <item> per paper
//! ```
//!
//! Both are truncated when the run starts. Each record is appended to both
//! files as soon as it is built, reopening the files every time, so a run
//! killed halfway leaves every finished record on disk.
//!
//! # Submodules
//!
//! - [`feed`]: RSS header and footer

pub mod feed;

use crate::error::ScrapeError;
use crate::models::Record;
use feed::FeedChannel;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, instrument};

/// The citation and feed files of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFiles {
    bib_path: PathBuf,
    feed_path: PathBuf,
}

impl OutputFiles {
    /// `<dir>/<base>.bib` and `<dir>/<base>.xml`. Nothing is touched on disk.
    pub fn new(dir: &Path, base: &str) -> Self {
        Self {
            bib_path: dir.join(format!("{base}.bib")),
            feed_path: dir.join(format!("{base}.xml")),
        }
    }

    pub fn bib_path(&self) -> &Path {
        &self.bib_path
    }

    pub fn feed_path(&self) -> &Path {
        &self.feed_path
    }

    /// Truncate both files and write the feed header.
    ///
    /// # Errors
    ///
    /// [`ScrapeError::Io`] if either file cannot be written.
    #[instrument(level = "info", skip_all, fields(bib = %self.bib_path.display(), feed = %self.feed_path.display()))]
    pub async fn start(&self, channel: &FeedChannel) -> Result<(), ScrapeError> {
        let header = feed::header(channel).map_err(io::Error::other)?;
        fs::write(&self.bib_path, "").await?;
        fs::write(&self.feed_path, header).await?;
        info!("Initialized output files");
        Ok(())
    }

    /// Append one record to both files.
    ///
    /// A failed write is logged and does not prevent the other file from
    /// being written. Returns the number of failed writes (0, 1 or 2).
    pub async fn append_record(&self, record: &Record) -> usize {
        let writes = [
            (&self.bib_path, record.to_bib() + "\n\n"),
            (&self.feed_path, record.to_feed_item() + "\n"),
        ];

        let mut failures = 0;
        for (path, content) in writes {
            if let Err(e) = append(path, &content).await {
                error!(path = %path.display(), title = %record.title, error = %e, "Failed to append record");
                failures += 1;
            }
        }
        failures
    }

    /// Append the feed footer. Call once, after the last record.
    #[instrument(level = "info", skip_all, fields(feed = %self.feed_path.display()))]
    pub async fn finish(&self) -> io::Result<()> {
        append(&self.feed_path, feed::FOOTER).await?;
        info!("Closed feed");
        Ok(())
    }
}

async fn append(path: &Path, content: &str) -> io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(content.as_bytes()).await?;
    file.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunContext;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("cvf_scrape_{name}_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn channel() -> FeedChannel {
        FeedChannel::for_context(&RunContext::new("CVPR", 2024).unwrap())
    }

    #[test]
    fn test_paths() {
        let files = OutputFiles::new(Path::new("out"), "CVPR2024");
        assert_eq!(files.bib_path(), Path::new("out/CVPR2024.bib"));
        assert_eq!(files.feed_path(), Path::new("out/CVPR2024.xml"));
    }

    #[tokio::test]
    async fn test_start_truncates_previous_run() {
        let dir = scratch_dir("truncate");
        let files = OutputFiles::new(&dir, "CVPR2024");
        std::fs::write(files.bib_path(), "stale").unwrap();
        std::fs::write(files.feed_path(), "stale").unwrap();

        files.start(&channel()).await.unwrap();

        assert_eq!(std::fs::read_to_string(files.bib_path()).unwrap(), "");
        let feed = std::fs::read_to_string(files.feed_path()).unwrap();
        assert!(feed.starts_with("<?xml"));
        assert!(!feed.contains("stale"));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_append_records_and_finish() {
        let dir = scratch_dir("append");
        let files = OutputFiles::new(&dir, "CVPR2024");
        files.start(&channel()).await.unwrap();

        let first = Record::degraded("First", "http://openaccess.thecvf.com/a.html");
        let second = Record::degraded("Second", "http://openaccess.thecvf.com/b.html");
        assert_eq!(files.append_record(&first).await, 0);
        assert_eq!(files.append_record(&second).await, 0);
        files.finish().await.unwrap();

        let bib = std::fs::read_to_string(files.bib_path()).unwrap();
        assert_eq!(bib, format!("{}\n\n{}\n\n", first.to_bib(), second.to_bib()));

        let feed = std::fs::read_to_string(files.feed_path()).unwrap();
        let first_at = feed.find("<title>First</title>").unwrap();
        let second_at = feed.find("<title>Second</title>").unwrap();
        assert!(first_at < second_at);
        assert!(feed.ends_with(feed::FOOTER));
        assert_eq!(feed.matches("</rss>").count(), 1);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_start_into_missing_dir_fails() {
        let files = OutputFiles::new(Path::new("/nonexistent/cvf_scrape"), "CVPR2024");
        let err = files.start(&channel()).await.unwrap_err();
        assert!(matches!(err, ScrapeError::Io(_)));
    }

    #[tokio::test]
    async fn test_append_failure_is_counted() {
        let files = OutputFiles::new(Path::new("/nonexistent/cvf_scrape"), "X2024");
        let failures = files.append_record(&Record::degraded("T", "u")).await;
        assert_eq!(failures, 2);
    }
}
