//! Composed product description
//!
//! Builds the HTML body shown on the storefront from the three extracted
//! text fields. The function is pure: identical input gives byte-identical
//! output, so a record can always re-derive its description.

/// Fixed heading of the advantages section
pub const ADVANTAGES_HEADING: &str = "Ihre Vorteile";

/// Site-wide company blurbs that appear on every detail page and must never
/// reach a product description. Matched as case-insensitive substrings.
pub const BOILERPLATE_PATTERNS: &[&str] = &[
    "über wilo",
    "wilo ist ein führender",
    "about wilo",
    "wilo is a leading",
];

pub fn is_boilerplate(text: &str) -> bool {
    let lowered = text.to_lowercase();
    BOILERPLATE_PATTERNS.iter().any(|p| lowered.contains(p))
}

/// Compose the description document.
///
/// Sections, each only when its input is non-empty: an intro block for the
/// short text, the advantages list, then one paragraph per blank-line
/// separated chunk of the long text.
pub fn compose(short: &str, advantages: &[String], long: &str) -> String {
    let mut parts = Vec::new();

    let short = short.trim();
    if !short.is_empty() {
        parts.push(format!(
            "<div class='product-intro'>{}</div>",
            escape_html(short)
        ));
    }

    let advantages: Vec<&str> = advantages
        .iter()
        .map(|a| a.trim())
        .filter(|a| !a.is_empty())
        .collect();
    if !advantages.is_empty() {
        parts.push(format!("<h3>{ADVANTAGES_HEADING}</h3>"));
        parts.push("<ul>".to_string());
        for advantage in advantages {
            parts.push(format!("<li>{}</li>", escape_html(advantage)));
        }
        parts.push("</ul>".to_string());
    }

    for paragraph in long.split("\n\n").map(str::trim) {
        if paragraph.is_empty() || is_boilerplate(paragraph) {
            continue;
        }
        parts.push(format!("<p>{}</p>", escape_html(paragraph)));
    }

    parts.join("\n")
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn intro_only_when_advantages_and_long_are_empty() {
        let html = compose("Hocheffiziente Nassläufer-Pumpe", &[], "");
        assert_eq!(html, "<div class='product-intro'>Hocheffiziente Nassläufer-Pumpe</div>");
        assert!(!html.contains(ADVANTAGES_HEADING));
    }

    #[test]
    fn full_document_layout() {
        let html = compose(
            "Short text",
            &["Advantage one is long enough".to_string()],
            "First paragraph\n\nSecond paragraph",
        );
        assert_eq!(
            html,
            "<div class='product-intro'>Short text</div>\n\
             <h3>Ihre Vorteile</h3>\n<ul>\n<li>Advantage one is long enough</li>\n</ul>\n\
             <p>First paragraph</p>\n<p>Second paragraph</p>"
        );
    }

    #[test]
    fn boilerplate_paragraphs_are_dropped() {
        let html = compose(
            "",
            &[],
            "Real content\n\nÜber Wilo: Wilo ist ein führender Hersteller von Pumpen",
        );
        assert_eq!(html, "<p>Real content</p>");
    }

    #[test]
    fn empty_input_yields_empty_document() {
        assert_eq!(compose("", &[], ""), "");
        assert_eq!(compose("  ", &["   ".to_string()], "\n\n"), "");
    }

    #[test]
    fn markup_in_text_is_escaped() {
        assert_eq!(compose("a < b & c", &[], ""), "<div class='product-intro'>a &lt; b &amp; c</div>");
    }

    #[test]
    fn boilerplate_match_is_case_insensitive() {
        assert!(is_boilerplate("ABOUT WILO and more"));
        assert!(!is_boilerplate("Pumpen für Heizung"));
    }

    proptest! {
        #[test]
        fn compose_is_idempotent(
            short in ".{0,40}",
            advantages in proptest::collection::vec(".{0,30}", 0..4),
            long in ".{0,80}",
        ) {
            prop_assert_eq!(
                compose(&short, &advantages, &long),
                compose(&short, &advantages, &long)
            );
        }
    }
}
