//! The scrape pipeline: discover, list, cook, persist.
//!
//! A run moves through these stages:
//!
//! 1. **Discovering**: fetch the conference root page and collect its
//!    section listing links, minus a trailing aggregate "all" link
//! 2. **Listing**: fetch each section in order and queue its entries until
//!    `max_papers` entries are queued
//! 3. **Extracting / Persisting**: drain the queue in batches of
//!    `batch_size`; each entry's detail page is fetched (with a fixed-delay
//!    retry) and turned into a [`Record`], which is appended to both output
//!    files right away
//! 4. **Done**: the feed footer is appended
//!
//! Only a failed root-page fetch ends a run early. A section that cannot be
//! fetched contributes no entries, and an entry whose detail page never
//! loads still yields a degraded record, so every queued entry produces
//! exactly one persisted record.
//!
//! Detail pages are fetched one at a time unless `concurrency` is raised.
//! Even then results are persisted in queue order.

use crate::config::RunContext;
use crate::error::{FetchError, ScrapeError};
use crate::fetch::PageFetcher;
use crate::models::{ListingEntry, Record, SectionLink};
use crate::outputs::OutputFiles;
use crate::sanitize::sanitize;
use crate::scrapers::cvf::{self, ListingCounts};
use crate::utils::truncate_for_log;
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::ops::Add;
use std::pin::pin;
use std::time::Instant;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

/// What a run did, for the end-of-run summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Section listings discovered (after dropping the "all" link).
    pub sections: usize,
    /// Listing entries parsed and skipped across all fetched sections.
    pub listing: ListingCounts,
    /// Entries queued for detail fetching, after the cap.
    pub queued: usize,
    /// Records built from a fetched detail page.
    pub cooked: usize,
    /// Records built after every detail fetch attempt failed.
    pub degraded: usize,
    /// Individual file appends that failed.
    pub write_failures: usize,
}

impl RunStats {
    /// Records handed to the output files.
    pub fn persisted(&self) -> usize {
        self.cooked + self.degraded
    }
}

impl Add for RunStats {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            sections: self.sections + other.sections,
            listing: self.listing + other.listing,
            queued: self.queued + other.queued,
            cooked: self.cooked + other.cooked,
            degraded: self.degraded + other.degraded,
            write_failures: self.write_failures + other.write_failures,
        }
    }
}

/// Listing entries waiting for their detail page, in discovery order.
#[derive(Debug, Default)]
pub struct WorkQueue {
    entries: VecDeque<ListingEntry>,
}

impl WorkQueue {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = ListingEntry>) {
        self.entries.extend(entries);
    }

    /// Remove and return up to `size` entries from the front.
    pub fn next_batch(&mut self, size: usize) -> Vec<ListingEntry> {
        let take = size.min(self.entries.len());
        self.entries.drain(..take).collect()
    }
}

/// The result of cooking one listing entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cooked {
    /// The detail page was fetched and parsed.
    Full(Record),
    /// Every fetch attempt failed; only the title and PDF link are set.
    Degraded(Record),
}

impl Cooked {
    pub fn record(&self) -> &Record {
        match self {
            Cooked::Full(record) | Cooked::Degraded(record) => record,
        }
    }
}

/// Scrapes one conference through a [`PageFetcher`].
#[derive(Debug)]
pub struct Scraper<F> {
    fetcher: F,
    ctx: RunContext,
}

impl<F: PageFetcher> Scraper<F> {
    pub fn new(fetcher: F, ctx: RunContext) -> Self {
        Self { fetcher, ctx }
    }

    /// Run the whole pipeline, appending every record to `outputs` and
    /// closing the feed at the end.
    ///
    /// `outputs` must already be started (see [`OutputFiles::start`]).
    ///
    /// # Errors
    ///
    /// [`ScrapeError::Discovery`] if the conference root page cannot be
    /// fetched. Nothing is written in that case.
    #[instrument(level = "info", skip_all, fields(base_url = %self.ctx.base_url))]
    pub async fn run(&self, outputs: &OutputFiles) -> Result<RunStats, ScrapeError> {
        let t0 = Instant::now();

        let sections = self.discover().await?;
        let (mut queue, listing) = self.collect_listing(&sections).await;
        let mut stats = RunStats {
            sections: sections.len(),
            listing,
            queued: queue.len(),
            ..RunStats::default()
        };

        let batch_size = self.ctx.batch_size.max(1);
        let total_batches = queue.len().div_ceil(batch_size);
        let mut batch_index = 0;
        while !queue.is_empty() {
            let batch = queue.next_batch(batch_size);
            batch_index += 1;
            info!(batch = batch_index, total_batches, size = batch.len(), "Processing batch");
            stats = stats + self.process_batch(&batch, outputs).await;
        }

        if let Err(e) = outputs.finish().await {
            error!(error = %e, "Failed to append feed footer");
            stats.write_failures += 1;
        }

        let elapsed = t0.elapsed();
        info!(
            sections = stats.sections,
            listed = stats.listing.found,
            listing_failed = stats.listing.failed,
            queued = stats.queued,
            cooked = stats.cooked,
            degraded = stats.degraded,
            write_failures = stats.write_failures,
            secs = elapsed.as_secs(),
            "Scrape complete"
        );
        Ok(stats)
    }

    /// Fetch the root page and return its section links.
    async fn discover(&self) -> Result<Vec<SectionLink>, ScrapeError> {
        let url = self.ctx.base_url.as_str();
        info!(%url, "Fetching conference root page");

        let html = self
            .fetcher
            .fetch(url, self.ctx.section_timeout)
            .await
            .map_err(|e| {
                error!(url = e.url(), error = %e, "Conference root page unavailable; aborting");
                ScrapeError::Discovery(e)
            })?;

        let sections = cvf::drop_trailing_all_link(cvf::parse_section_links(
            &html,
            &self.ctx.website_root,
        ));
        info!(count = sections.len(), "Discovered sections");
        for section in &sections {
            debug!(label = %section.label, url = %section.url, "Section");
        }
        Ok(sections)
    }

    /// Queue listing entries section by section until the cap is reached.
    async fn collect_listing(&self, sections: &[SectionLink]) -> (WorkQueue, ListingCounts) {
        let cap = self.ctx.max_papers;
        let mut queue = WorkQueue::default();
        let mut counts = ListingCounts::default();

        for section in sections {
            if queue.len() >= cap {
                info!(cap, "Paper cap reached; skipping remaining sections");
                break;
            }
            let (entries, section_counts) = self.list_section(section).await;
            counts = counts + section_counts;
            let room = cap - queue.len();
            if entries.len() > room {
                debug!(url = %section.url, kept = room, dropped = entries.len() - room, "Truncating section to cap");
            }
            queue.extend(entries.into_iter().take(room));
        }

        info!(queued = queue.len(), found = counts.found, failed = counts.failed, "Listing complete");
        (queue, counts)
    }

    async fn list_section(&self, section: &SectionLink) -> (Vec<ListingEntry>, ListingCounts) {
        let url = section.url.as_str();
        match self.fetcher.fetch(url, self.ctx.section_timeout).await {
            Ok(html) => {
                let (entries, counts) = cvf::parse_listing(&html, url);
                info!(%url, label = %section.label, found = counts.found, failed = counts.failed, "Listed section");
                (entries, counts)
            }
            Err(e) => {
                error!(%url, error = %e, "Section fetch failed; skipping section");
                (Vec::new(), ListingCounts::default())
            }
        }
    }

    /// Cook and persist one batch, in order.
    async fn process_batch(&self, batch: &[ListingEntry], outputs: &OutputFiles) -> RunStats {
        let mut stats = RunStats::default();
        let mut cooked = pin!(
            stream::iter(batch)
                .map(|entry| self.cook(entry))
                .buffered(self.ctx.concurrency.max(1))
        );

        while let Some(outcome) = cooked.next().await {
            match &outcome {
                Cooked::Full(_) => stats.cooked += 1,
                Cooked::Degraded(_) => stats.degraded += 1,
            }
            stats.write_failures += outputs.append_record(outcome.record()).await;
        }
        stats
    }

    /// Turn a listing entry into a record, falling back to a degraded
    /// record when the detail page cannot be fetched.
    #[instrument(level = "info", skip_all, fields(title = %truncate_for_log(&entry.title, 80)))]
    pub async fn cook(&self, entry: &ListingEntry) -> Cooked {
        let url = cvf::resolve(&self.ctx.website_root, &entry.link);

        match self.fetch_detail(&url, &entry.title).await {
            Ok(html) => {
                let fields = cvf::extract_detail(&html, &self.ctx.website_root);
                let record = Record {
                    title: sanitize(&entry.title),
                    abstract_text: fields.abstract_text,
                    authors: fields.authors,
                    pdf_url: fields.pdf_url,
                    supp_url: fields.supp_url,
                    citation: fields.citation,
                };

                if let Some(citation) = record.citation_fields() {
                    debug!(
                        booktitle = ?citation.booktitle,
                        month = ?citation.month,
                        year = ?citation.year,
                        pages = ?citation.pages,
                        start_page = ?citation.start_page,
                        end_page = ?citation.end_page,
                        "Parsed citation fields"
                    );
                }
                debug!(
                    authors = record.authors.len(),
                    has_pdf = record.pdf_url.is_some(),
                    has_supp = record.supp_url.is_some(),
                    has_citation = record.citation.is_some(),
                    abstract_preview = %truncate_for_log(record.abstract_text.as_deref().unwrap_or_default(), 120),
                    "Cooked paper"
                );
                Cooked::Full(record)
            }
            Err(e) => {
                warn!(%url, error = %e, "Writing degraded record");
                Cooked::Degraded(Record::degraded(sanitize(&entry.title), url))
            }
        }
    }

    /// Fetch a detail page, making up to `retries` attempts with a fixed
    /// `retry_delay` between them. Returns the last error if all fail.
    async fn fetch_detail(&self, url: &str, title: &str) -> Result<String, FetchError> {
        let attempts = self.ctx.retries.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.fetcher.fetch(url, self.ctx.detail_timeout).await {
                Ok(html) => {
                    if attempt > 1 {
                        info!(attempt, %url, "Detail page fetched after retry");
                    }
                    return Ok(html);
                }
                Err(e) if attempt >= attempts => {
                    error!(attempt, max = attempts, %url, %title, error = %e, "All detail fetch attempts failed");
                    return Err(e);
                }
                Err(e) => {
                    warn!(
                        attempt,
                        max = attempts,
                        %url,
                        %title,
                        delay = ?self.ctx.retry_delay,
                        error = %e,
                        "Detail fetch failed; retrying"
                    );
                    sleep(self.ctx.retry_delay).await;
                }
            }
        }
    }
}
