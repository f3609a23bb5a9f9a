//! RSS 2.0 feed framing.
//!
//! The feed file is written in three phases: [`header`] once at startup,
//! one `<item>` per record (rendered by [`crate::models::Record::to_feed_item`]),
//! then [`FOOTER`] once after the last batch. Until the footer is written
//! the file is not well-formed XML; a missing footer means the run did not
//! finish.

use crate::config::RunContext;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesStart, BytesText, Event};
use std::error::Error;

/// Closes the `<channel>` and `<rss>` elements opened by [`header`].
pub const FOOTER: &str = "</channel>\n</rss>\n";

/// Channel metadata written into the feed header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedChannel {
    pub title: String,
    pub link: String,
    pub description: String,
}

impl FeedChannel {
    pub fn for_context(ctx: &RunContext) -> Self {
        Self {
            title: format!("{} {}", ctx.conference, ctx.year),
            link: ctx.website_root.to_string(),
            description: format!(
                "Papers from the {} {} open access proceedings",
                ctx.conference, ctx.year
            ),
        }
    }
}

/// XML declaration, `<rss version="2.0">`, `<channel>` and the channel's
/// title, link and description, followed by a newline.
pub fn header(channel: &FeedChannel) -> Result<String, Box<dyn Error + Send + Sync>> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(
        BytesStart::new("rss").with_attributes([("version", "2.0")]),
    ))?;
    writer.write_event(Event::Start(BytesStart::new("channel")))?;
    writer
        .create_element("title")
        .write_text_content(BytesText::new(&channel.title))?;
    writer
        .create_element("link")
        .write_text_content(BytesText::new(&channel.link))?;
    writer
        .create_element("description")
        .write_text_content(BytesText::new(&channel.description))?;

    let mut header = String::from_utf8(writer.into_inner())?;
    header.push('\n');
    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> FeedChannel {
        FeedChannel::for_context(&RunContext::new("ICCV", 2023).unwrap())
    }

    #[test]
    fn test_channel_for_context() {
        let channel = channel();
        assert_eq!(channel.title, "ICCV 2023");
        assert_eq!(channel.link, "http://openaccess.thecvf.com/");
    }

    #[test]
    fn test_header_preamble() {
        let header = header(&channel()).unwrap();
        assert!(header.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(header.contains("<rss version=\"2.0\">"));
        assert!(header.contains("<channel>"));
        assert!(header.contains("<title>ICCV 2023</title>"));
        assert!(header.contains("<link>http://openaccess.thecvf.com/</link>"));
        assert!(header.ends_with("</description>\n"));
        assert!(!header.contains("</channel>"));
    }

    #[test]
    fn test_header_plus_footer_is_well_formed() {
        let doc = header(&channel()).unwrap() + FOOTER;
        let mut reader = quick_xml::Reader::from_str(&doc);
        loop {
            match reader.read_event() {
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => panic!("malformed feed: {e}"),
            }
        }
    }
}
