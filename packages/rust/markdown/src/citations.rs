//! Markdown preparation passes for citation-aware rendering.
//!
//! Each pass is a function `&str -> String` (or a predicate) applied before
//! the text reaches the converter.

use std::sync::LazyLock;

use regex::Regex;

/// Document metadata prepended to every render.
pub const PREAMBLE: &str = "---\nlink-citations: true\ntop-level-division: section\n...\n\n";

/// Heading under which the converter places the generated bibliography.
pub const REFERENCES_HEADING: &str = "### References";

/// True when the text holds at least one in-text citation marker.
///
/// A marker is `@` preceded by an optional `-` (author suppression), which in
/// turn follows the start of text, whitespace, or `[`.
pub(crate) fn has_citation_markers(md: &str) -> bool {
    static MARKER_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?:^|[\s\[])-?@").expect("valid regex"));

    MARKER_RE.is_match(md)
}

/// Prepend the metadata preamble.
pub(crate) fn with_preamble(md: &str) -> String {
    format!("{PREAMBLE}{md}")
}

/// Append the references heading so the bibliography lands at the end.
pub(crate) fn with_references_heading(md: &str) -> String {
    format!("{md}\n\n{REFERENCES_HEADING}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bracketed_citation_is_a_marker() {
        assert!(has_citation_markers("See [@smith2020]"));
        assert!(has_citation_markers("See [-@smith2020, p. 4]"));
    }

    #[test]
    fn bare_citation_is_a_marker() {
        assert!(has_citation_markers("As @doe2019 argues"));
        assert!(has_citation_markers("@doe2019 argues"));
        assert!(has_citation_markers("line one\n-@doe2019 again"));
    }

    #[test]
    fn email_and_plain_text_are_not_markers() {
        assert!(!has_citation_markers("No citations here"));
        assert!(!has_citation_markers("Write to jane@example.edu"));
        assert!(!has_citation_markers(""));
    }

    #[test]
    fn preamble_comes_first() {
        let out = with_preamble("Body");
        assert!(out.starts_with("---\nlink-citations: true\n"));
        assert!(out.contains("top-level-division: section"));
        assert!(out.ends_with("...\n\nBody"));
    }

    #[test]
    fn heading_is_appended_after_blank_line() {
        assert_eq!(
            with_references_heading("Text [@a]"),
            "Text [@a]\n\n### References"
        );
    }
}
