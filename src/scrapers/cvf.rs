//! CVF open access archive parsers.
//!
//! This module understands the three kinds of pages on
//! [openaccess.thecvf.com](http://openaccess.thecvf.com):
//!
//! - the conference **root page** (`/ICCV2023`), whose `dd > a` links lead
//!   to per-day section listings plus an aggregate "all" listing
//! - a **section listing**, where each paper is a `dt.ptitle` holding a link
//!   to its detail page
//! - a paper's **detail page**, with the author byline, abstract, PDF and
//!   supplemental links, and a BibTeX block
//!
//! All functions here are pure: they take HTML text and return extracted
//! values. Fetching and retrying live in [`crate::pipeline`].

use crate::models::{ListingEntry, SectionLink};
use crate::sanitize::sanitize;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::ops::Add;
use tracing::{debug, warn};
use url::Url;

struct CvfSelectors {
    section_link: Selector,
    listing_entry: Selector,
    anchor: Selector,
    authors: Selector,
    abstract_text: Selector,
    citation: Selector,
}

static SELECTORS: Lazy<CvfSelectors> = Lazy::new(|| CvfSelectors {
    section_link: Selector::parse("dd > a").expect("Failed to parse section link selector"),
    listing_entry: Selector::parse("dt.ptitle").expect("Failed to parse listing entry selector"),
    anchor: Selector::parse("a").expect("Failed to parse anchor selector"),
    authors: Selector::parse("#authors > b > i").expect("Failed to parse authors selector"),
    abstract_text: Selector::parse("#abstract").expect("Failed to parse abstract selector"),
    citation: Selector::parse("div.bibref.pre-white-space")
        .expect("Failed to parse citation selector"),
});

/// Collect the section listing links from the conference root page.
///
/// Hrefs are resolved against `website_root`. Anchors without an `href`,
/// or whose `href` cannot be resolved, are skipped.
pub fn parse_section_links(html: &str, website_root: &Url) -> Vec<SectionLink> {
    let document = Html::parse_document(html);
    let mut links = Vec::new();

    for anchor in document.select(&SELECTORS.section_link) {
        let label = element_text(&anchor).trim().to_string();
        let Some(href) = anchor.value().attr("href") else {
            warn!(%label, "Section link without href; skipping");
            continue;
        };
        match website_root.join(href) {
            Ok(url) => links.push(SectionLink { label, url }),
            Err(e) => warn!(%href, error = %e, "Unresolvable section link; skipping"),
        }
    }

    debug!(count = links.len(), "Parsed section links");
    links
}

/// Drop the aggregate "all" listing if it is the last section link.
///
/// The "all" listing repeats every paper of the per-day listings. Only the
/// last link is inspected, since that is where the archive places it.
pub fn drop_trailing_all_link(mut links: Vec<SectionLink>) -> Vec<SectionLink> {
    if links.last().is_some_and(is_all_link) {
        if let Some(dropped) = links.pop() {
            debug!(url = %dropped.url, "Dropped aggregate 'all' section link");
        }
    }
    links
}

/// Whether a section link points at the aggregate listing: its label is
/// "all" (or "all papers"), or its last query value or path segment is
/// "all". Case-insensitive.
pub fn is_all_link(link: &SectionLink) -> bool {
    let label = link.label.trim();
    let target = link
        .url
        .query()
        .unwrap_or_else(|| link.url.path())
        .trim_end_matches('/');
    let tail = target.rsplit(['=', '/']).next().unwrap_or_default();

    label.eq_ignore_ascii_case("all")
        || label.eq_ignore_ascii_case("all papers")
        || tail.eq_ignore_ascii_case("all")
}

/// Outcome counts of parsing one or more listing pages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListingCounts {
    /// Entries parsed successfully.
    pub found: usize,
    /// Entries skipped because their anchor or `href` was missing.
    pub failed: usize,
}

impl Add for ListingCounts {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            found: self.found + other.found,
            failed: self.failed + other.failed,
        }
    }
}

/// Extract the papers listed on a section page, in document order.
///
/// Each `dt.ptitle` contributes its first anchor's text and `href`. Entries
/// missing either are counted in [`ListingCounts::failed`] and skipped.
pub fn parse_listing(html: &str, source_url: &str) -> (Vec<ListingEntry>, ListingCounts) {
    let document = Html::parse_document(html);
    let mut entries = Vec::new();
    let mut counts = ListingCounts::default();

    for (index, container) in document.select(&SELECTORS.listing_entry).enumerate() {
        let anchor = container.select(&SELECTORS.anchor).next();
        match anchor.and_then(|a| a.value().attr("href").map(|href| (a, href))) {
            Some((anchor, href)) => {
                entries.push(ListingEntry::new(element_text(&anchor), href));
                counts.found += 1;
            }
            None => {
                warn!(%source_url, index, "Listing entry without a linked title; skipping");
                counts.failed += 1;
            }
        }
    }

    debug!(%source_url, found = counts.found, failed = counts.failed, "Parsed listing");
    (entries, counts)
}

/// Fields extracted from a paper's detail page. Every field is best-effort.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailFields {
    pub authors: Vec<String>,
    pub abstract_text: Option<String>,
    pub pdf_url: Option<String>,
    pub supp_url: Option<String>,
    pub citation: Option<String>,
}

/// Extract authors, abstract, links and the BibTeX block from a detail page.
///
/// - Authors come from `#authors > b > i`, split on commas and sanitized.
///   Names that sanitize to nothing are dropped.
/// - The abstract is the sanitized text of `#abstract`.
/// - The first anchor whose text mentions "pdf" is the PDF link; the first
///   other anchor mentioning "supplemental" or "supp" is the supplemental
///   link. Both are resolved against `website_root`.
/// - The BibTeX block is the trimmed text of `div.bibref.pre-white-space`.
pub fn extract_detail(html: &str, website_root: &Url) -> DetailFields {
    let document = Html::parse_document(html);

    let authors = document
        .select(&SELECTORS.authors)
        .next()
        .map(|byline| {
            element_text(&byline)
                .split(',')
                .map(sanitize)
                .filter(|name| !name.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let abstract_text = document
        .select(&SELECTORS.abstract_text)
        .next()
        .map(|node| sanitize(&element_text(&node)));

    let mut pdf_url = None;
    let mut supp_url = None;
    for anchor in document.select(&SELECTORS.anchor) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let text = element_text(&anchor).to_lowercase();
        if text.contains("pdf") {
            pdf_url.get_or_insert_with(|| resolve(website_root, href));
        } else if text.contains("supplemental") || text.contains("supp") {
            supp_url.get_or_insert_with(|| resolve(website_root, href));
        }
    }

    let citation = document
        .select(&SELECTORS.citation)
        .next()
        .map(|node| element_text(&node).trim().to_string())
        .filter(|block| !block.is_empty());

    DetailFields {
        authors,
        abstract_text,
        pdf_url,
        supp_url,
        citation,
    }
}

/// Resolve an href against the website root, falling back to plain
/// concatenation when the href is not a valid URL reference.
pub fn resolve(website_root: &Url, href: &str) -> String {
    match website_root.join(href) {
        Ok(url) => url.to_string(),
        Err(_) => format!("{website_root}{href}"),
    }
}

fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect()
}
