//! Text cleanup for scraped titles, author names, and abstracts.
//!
//! The output is markup-safe printable ASCII: it can be dropped into the
//! feed file without further escaping. Non-ASCII characters (diacritics in
//! author names, typographic quotes) are replaced by spaces, so the
//! transformation is lossy.

use once_cell::sync::Lazy;
use regex::Regex;

/// A right single quotation mark whose UTF-8 bytes were decoded as
/// Windows-1252.
const MISDECODED_RSQUO: &str = "\u{e2}\u{20ac}\u{2122}";

/// Entity references an `&` may already start; such an `&` is left alone.
const ENTITIES: [&str; 5] = ["&amp;", "&lt;", "&gt;", "&quot;", "&apos;"];

/// Any run of characters outside `!`..=`~`, spaces included.
static NON_PRINTABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^!-~]+").expect("Failed to compile non-printable regex"));

/// Clean a scraped string.
///
/// Steps, in order:
/// 1. the mis-decoded `â€™` sequence becomes a plain apostrophe
/// 2. `&`, `<`, `>`, `"` and `'` are replaced with entity references
/// 3. every run of characters outside printable ASCII collapses to one space
/// 4. leading and trailing whitespace is trimmed
///
/// `sanitize(&sanitize(x)) == sanitize(x)` holds for every input.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(sanitize("  Fast & <Robust>\n"), "Fast &amp; &lt;Robust&gt;");
/// ```
pub fn sanitize(text: &str) -> String {
    let text = text.replace(MISDECODED_RSQUO, "'");
    let escaped = escape_markup(&text);
    NON_PRINTABLE.replace_all(&escaped, " ").trim().to_string()
}

fn escape_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, c) in text.char_indices() {
        match c {
            '&' if ENTITIES.iter().any(|e| text[i..].starts_with(e)) => out.push('&'),
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escapes_markup_characters() {
        assert_eq!(
            sanitize(r#"A & B <c> "d" 'e'"#),
            "A &amp; B &lt;c&gt; &quot;d&quot; &apos;e&apos;"
        );
    }

    #[test]
    fn test_collapses_whitespace_and_trims() {
        assert_eq!(
            sanitize("\n   Learning\t\tto   See\r\n in the Dark  "),
            "Learning to See in the Dark"
        );
    }

    #[test]
    fn test_strips_non_ascii() {
        assert_eq!(sanitize("Jos\u{e9} Garc\u{ed}a"), "Jos Garc a");
        assert_eq!(sanitize("caf\u{e9}"), "caf");
        assert_eq!(sanitize("a\u{0}\u{7}b"), "a b");
    }

    #[test]
    fn test_replaces_misdecoded_apostrophe() {
        assert_eq!(sanitize("It\u{e2}\u{20ac}\u{2122}s"), "It&apos;s");
    }

    #[test]
    fn test_keeps_existing_entities() {
        assert_eq!(sanitize("Tom &amp; Jerry"), "Tom &amp; Jerry");
        assert_eq!(sanitize("&amp"), "&amp;amp");
        assert_eq!(sanitize("&ampersand"), "&amp;ampersand");
    }

    #[test]
    fn test_empty_and_blank() {
        assert_eq!(sanitize(""), "");
        assert_eq!(sanitize(" \n\t "), "");
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "",
            "plain",
            "  spaced   out  ",
            "A & B",
            "&amp; already",
            "&amp",
            "<tag attr=\"x\">",
            "It\u{e2}\u{20ac}\u{2122}s",
            "Ren\u{e9} Descartes, \u{00c5}ngstr\u{f6}m",
            "&&&;;&lt",
            "'quoted' \"double\"",
            "\u{1F600} emoji & <stuff>",
        ];
        for sample in samples {
            let once = sanitize(sample);
            assert_eq!(sanitize(&once), once, "not idempotent for {sample:?}");
        }
    }
}
