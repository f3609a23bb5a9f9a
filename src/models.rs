//! Data models for scraped papers and their rendered forms.
//!
//! This module defines the structures that flow through the pipeline:
//! - [`SectionLink`]: A per-day (or per-session) listing page found on the root page
//! - [`ListingEntry`]: One paper's title and detail-page link from a listing page
//! - [`Record`]: The extracted metadata of one paper, ready to persist
//! - [`CitationFields`]: Selected fields read back out of a BibTeX block
//!
//! A [`Record`] renders itself into a BibTeX entry ([`Record::to_bib`]) and an
//! RSS `<item>` ([`Record::to_feed_item`]). Text fields are expected to be
//! sanitized already; rendering does no escaping of its own.

use itertools::Itertools;
use url::Url;

/// A listing page discovered on the conference root page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionLink {
    /// The anchor's visible text, e.g. `"Day 1: 2023-10-04"` or `"All Papers"`.
    pub label: String,
    /// The listing page, resolved against the website root.
    pub url: Url,
}

/// One paper as it appears on a section listing page.
///
/// Entries are short-lived: they are queued for the detail-fetch stage and
/// dropped once their [`Record`] is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    /// The anchor text of the paper title, unsanitized.
    pub title: String,
    /// The detail-page href exactly as it appears in the listing.
    pub link: String,
}

impl ListingEntry {
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
        }
    }
}

/// The extracted metadata of one paper.
///
/// Built once per listing entry, either from a successfully fetched detail
/// page or, after every fetch attempt failed, as a degraded record holding
/// only the title and a PDF link (see [`Record::degraded`]).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    /// The paper title.
    pub title: String,
    /// The abstract; absent on degraded records.
    pub abstract_text: Option<String>,
    /// Author names in byline order.
    pub authors: Vec<String>,
    /// Absolute URL of the paper PDF.
    pub pdf_url: Option<String>,
    /// Absolute URL of the supplemental material.
    pub supp_url: Option<String>,
    /// The BibTeX block published on the detail page, verbatim.
    pub citation: Option<String>,
}

impl Record {
    /// A record for an entry whose detail page could not be fetched.
    pub fn degraded(title: impl Into<String>, pdf_url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            pdf_url: Some(pdf_url.into()),
            ..Self::default()
        }
    }

    /// Render the record as a BibTeX entry.
    ///
    /// When the detail page published a citation block, that block is kept
    /// as-is, minus its final closing brace. A `note` line for the
    /// supplemental material and a `url` line for the PDF are appended when
    /// present, then the closing brace is restored. Otherwise a minimal
    /// `@article` entry is built from the title, authors, abstract and PDF
    /// link.
    pub fn to_bib(&self) -> String {
        match &self.citation {
            Some(citation) => self.annotate_citation(citation),
            None => self.synthesize_citation(),
        }
    }

    fn annotate_citation(&self, citation: &str) -> String {
        let body = citation.trim_end();
        let body = body.strip_suffix('}').map_or(body, str::trim_end);

        let mut entry = body.to_string();
        if let Some(supp) = &self.supp_url {
            push_field(&mut entry, &format!("note={{Supplemental material: {supp}}}"));
        }
        if let Some(pdf) = &self.pdf_url {
            push_field(&mut entry, &format!("url={{ {pdf} }}"));
        }
        entry.push_str("\n}");
        entry
    }

    fn synthesize_citation(&self) -> String {
        let authors = self.authors.iter().map(|a| format_author(a)).join(" and ");
        format!(
            "@article{{{key},\n  title={{ {title} }},\n  author={{ {authors} }},\n  abstract={{ {abstract_text} }},\n  url={{ {url} }}\n}}",
            key = self.citation_key(),
            title = self.title,
            abstract_text = self.abstract_text.as_deref().unwrap_or_default(),
            url = self.pdf_url.as_deref().unwrap_or_default(),
        )
    }

    /// `Lastname_Firstword`, built from the first author and the title.
    fn citation_key(&self) -> String {
        let last_name = self
            .authors
            .first()
            .and_then(|a| a.split_whitespace().last())
            .map(alphanumeric)
            .filter(|s| !s.is_empty());
        let title_word = self
            .title
            .split_whitespace()
            .map(alphanumeric)
            .find(|s| !s.is_empty());

        match (last_name, title_word) {
            (Some(name), Some(word)) => format!("{name}_{word}"),
            (Some(part), None) | (None, Some(part)) => part,
            (None, None) => "paper".to_string(),
        }
    }

    /// Render the record as an RSS `<item>`.
    ///
    /// Missing links or abstracts render as empty elements.
    pub fn to_feed_item(&self) -> String {
        [
            "<item>".to_string(),
            format!("    <title>{}</title>", self.title),
            format!("    <link>{}</link>", self.pdf_url.as_deref().unwrap_or_default()),
            format!(
                "    <description>{}</description>",
                self.abstract_text.as_deref().unwrap_or_default()
            ),
            "</item>".to_string(),
        ]
        .join("\n")
    }

    /// Venue, date and page fields read from the citation block, if any.
    pub fn citation_fields(&self) -> Option<CitationFields> {
        self.citation.as_deref().map(CitationFields::parse)
    }
}

fn push_field(entry: &mut String, field: &str) {
    if !entry.ends_with(',') {
        entry.push(',');
    }
    entry.push_str("\n  ");
    entry.push_str(field);
}

fn alphanumeric(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

/// Reformat `"First Middle Last"` as `"Last, First Middle"`.
///
/// Names with a single token are returned unchanged.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(format_author("Kaiming He"), "He, Kaiming");
/// assert_eq!(format_author("Plato"), "Plato");
/// ```
pub fn format_author(author: &str) -> String {
    let parts: Vec<&str> = author.split_whitespace().collect();
    match parts.split_last() {
        Some((last, first)) if !first.is_empty() => format!("{}, {}", last, first.join(" ")),
        _ => author.to_string(),
    }
}

/// Fields read back out of a published BibTeX block.
///
/// The blocks on the proceedings site are hand-authored and inconsistent,
/// so parsing is line-oriented and tolerant: on each line the first `=`
/// separates key from value, and the value is stripped of surrounding
/// whitespace, braces and commas. Lines without `=` and unknown keys are
/// ignored.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CitationFields {
    pub booktitle: Option<String>,
    pub month: Option<String>,
    pub year: Option<String>,
    pub pages: Option<String>,
    pub start_page: Option<String>,
    pub end_page: Option<String>,
}

impl CitationFields {
    pub fn parse(block: &str) -> Self {
        let mut fields = Self::default();
        for line in block.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value
                .trim()
                .trim_matches(|c: char| c == '{' || c == '}' || c == ',')
                .trim()
                .to_string();

            match key.trim().to_ascii_lowercase().as_str() {
                "booktitle" => fields.booktitle = Some(value),
                "month" => fields.month = Some(value),
                "year" => fields.year = Some(value),
                "pages" => {
                    if let Some((start, end)) = value.split_once('-') {
                        fields.start_page = Some(start.trim().to_string());
                        fields.end_page = Some(end.trim_start_matches('-').trim().to_string());
                    }
                    fields.pages = Some(value);
                }
                _ => {}
            }
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CITATION: &str = "@InProceedings{He_2023_ICCV,\n    author    = {He, Kaiming and Girshick, Ross},\n    title     = {Deep Things},\n    booktitle = {Proceedings of the IEEE/CVF International Conference on Computer Vision (ICCV)},\n    month     = {October},\n    year      = {2023},\n    pages     = {100-110}\n}";

    fn full_record() -> Record {
        Record {
            title: "Deep Things".to_string(),
            abstract_text: Some("We study things.".to_string()),
            authors: vec!["Kaiming He".to_string(), "Ross Girshick".to_string()],
            pdf_url: Some("http://openaccess.thecvf.com/content/ICCV2023/papers/He.pdf".to_string()),
            supp_url: Some("http://openaccess.thecvf.com/content/ICCV2023/supplemental/He_supp.pdf".to_string()),
            citation: Some(CITATION.to_string()),
        }
    }

    #[test]
    fn test_format_author() {
        assert_eq!(format_author("Kaiming He"), "He, Kaiming");
        assert_eq!(format_author("Jean Claude Van Damme"), "Damme, Jean Claude Van");
        assert_eq!(format_author("Plato"), "Plato");
        assert_eq!(format_author(""), "");
    }

    #[test]
    fn test_to_bib_keeps_citation_verbatim() {
        let bib = full_record().to_bib();
        let body = CITATION.strip_suffix("\n}").unwrap();

        assert!(bib.starts_with(body));
        assert_eq!(
            &bib[body.len()..],
            ",\n  note={Supplemental material: http://openaccess.thecvf.com/content/ICCV2023/supplemental/He_supp.pdf}\
             ,\n  url={ http://openaccess.thecvf.com/content/ICCV2023/papers/He.pdf }\n}"
        );
        assert!(bib.ends_with("}\n}"));
        assert_eq!(bib.matches('{').count(), bib.matches('}').count());
    }

    #[test]
    fn test_to_bib_without_links_is_unchanged() {
        let record = Record {
            pdf_url: None,
            supp_url: None,
            ..full_record()
        };
        assert_eq!(record.to_bib(), CITATION);
    }

    #[test]
    fn test_to_bib_does_not_double_trailing_comma() {
        let record = Record {
            supp_url: None,
            citation: Some("@misc{k,\n  title = {A},\n}".to_string()),
            ..full_record()
        };
        assert_eq!(
            record.to_bib(),
            "@misc{k,\n  title = {A},\n  url={ http://openaccess.thecvf.com/content/ICCV2023/papers/He.pdf }\n}"
        );
    }

    #[test]
    fn test_to_bib_escaped_brace_still_closes_once() {
        let record = Record {
            supp_url: None,
            pdf_url: Some("http://x/p.pdf".to_string()),
            citation: Some("@misc{k,\n  title = {A \\{ B},\n  year = {2023}\n}".to_string()),
            ..full_record()
        };
        let bib = record.to_bib();
        assert_eq!(
            bib,
            "@misc{k,\n  title = {A \\{ B},\n  year = {2023},\n  url={ http://x/p.pdf }\n}"
        );
        assert_eq!(bib.matches("\n}").count(), 1);
    }

    #[test]
    fn test_to_bib_block_without_closing_brace_is_closed() {
        let record = Record {
            pdf_url: None,
            supp_url: None,
            citation: Some("@misc{k,\n  title = {A},".to_string()),
            ..full_record()
        };
        assert_eq!(record.to_bib(), "@misc{k,\n  title = {A},\n}");
    }

    #[test]
    fn test_to_bib_synthesized() {
        let record = Record {
            supp_url: None,
            citation: None,
            ..full_record()
        };
        assert_eq!(
            record.to_bib(),
            "@article{He_Deep,\n  title={ Deep Things },\n  author={ He, Kaiming and Girshick, Ross },\n  abstract={ We study things. },\n  url={ http://openaccess.thecvf.com/content/ICCV2023/papers/He.pdf }\n}"
        );
    }

    #[test]
    fn test_to_bib_degraded() {
        let record = Record::degraded("Deep Things", "http://openaccess.thecvf.com/content/x.html");
        assert_eq!(record.abstract_text, None);
        assert!(record.authors.is_empty());
        assert_eq!(record.citation, None);
        assert_eq!(
            record.to_bib(),
            "@article{Deep,\n  title={ Deep Things },\n  author={  },\n  abstract={  },\n  url={ http://openaccess.thecvf.com/content/x.html }\n}"
        );
    }

    #[test]
    fn test_citation_key_fallback() {
        let record = Record::default();
        assert!(record.to_bib().starts_with("@article{paper,"));
    }

    #[test]
    fn test_to_feed_item() {
        assert_eq!(
            full_record().to_feed_item(),
            "<item>\n    <title>Deep Things</title>\n    <link>http://openaccess.thecvf.com/content/ICCV2023/papers/He.pdf</link>\n    <description>We study things.</description>\n</item>"
        );
    }

    #[test]
    fn test_to_feed_item_degraded_has_empty_description() {
        let item = Record::degraded("T", "http://x/y").to_feed_item();
        assert!(item.contains("<link>http://x/y</link>"));
        assert!(item.contains("<description></description>"));
    }

    #[test]
    fn test_citation_fields_parse() {
        let fields = full_record().citation_fields().unwrap();
        assert_eq!(
            fields.booktitle.as_deref(),
            Some("Proceedings of the IEEE/CVF International Conference on Computer Vision (ICCV)")
        );
        assert_eq!(fields.month.as_deref(), Some("October"));
        assert_eq!(fields.year.as_deref(), Some("2023"));
        assert_eq!(fields.pages.as_deref(), Some("100-110"));
        assert_eq!(fields.start_page.as_deref(), Some("100"));
        assert_eq!(fields.end_page.as_deref(), Some("110"));
    }

    #[test]
    fn test_citation_fields_tolerates_noise() {
        let fields = CitationFields::parse(
            "@inproceedings{x,\ntitle = {A = B},\nPAGES={7--9},\nnonsense line\nyear=2021\n}",
        );
        assert_eq!(fields.year.as_deref(), Some("2021"));
        assert_eq!(fields.start_page.as_deref(), Some("7"));
        assert_eq!(fields.end_page.as_deref(), Some("9"));
        assert_eq!(fields.booktitle, None);
        assert_eq!(fields.month, None);
    }

    #[test]
    fn test_no_citation_fields_without_block() {
        assert_eq!(Record::degraded("T", "u").citation_fields(), None);
    }
}
