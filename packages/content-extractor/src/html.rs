//! HTML front-end: regex-based tag stripping and heading-hierarchy
//! tracking. No network I/O — a pure function over already
//! fetched bytes.

use regex::Regex;
use std::sync::OnceLock;

use crate::error::{ExtractError, Result};
use crate::fragments::build_fragments;
use crate::types::{ExtractedContent, HeadingLevel};

fn script_style_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<(script|style|noscript|template)[^>]*>.*?</\1>").unwrap()
    })
}

fn comment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<!--.*?-->").unwrap())
}

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<h([1-6])[^>]*>(.*?)</h\1>").unwrap())
}

fn block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<(p|li|td|th|blockquote|figcaption|pre|code)[^>]*>(.*?)</\1>").unwrap()
    })
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]+>").unwrap())
}

fn entity_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"&(amp|lt|gt|quot|#39|nbsp);").unwrap())
}

fn decode_entities(input: &str) -> String {
    entity_re()
        .replace_all(input, |caps: &regex::Captures| match &caps[1] {
            "amp" => "&",
            "lt" => "<",
            "gt" => ">",
            "quot" => "\"",
            "#39" => "'",
            "nbsp" => " ",
            _ => "",
        })
        .to_string()
}

fn strip_tags(fragment_html: &str) -> String {
    let no_tags = tag_re().replace_all(fragment_html, " ");
    let decoded = decode_entities(&no_tags);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn tag_kind(tag: &str) -> crate::types::FragmentType {
    use crate::types::FragmentType::*;
    match tag {
        "li" => List,
        "td" | "th" => Table,
        "blockquote" => Quote,
        "figcaption" => Figure,
        "pre" | "code" => Code,
        _ => Paragraph,
    }
}

/// Extract text, heading hierarchy, and fragments from an HTML
/// document. Fragments shorter than [`MIN_FRAGMENT_LEN`] are dropped.
pub fn extract_html(bytes: &[u8]) -> Result<ExtractedContent> {
    let raw = String::from_utf8_lossy(bytes);
    if raw.trim().is_empty() {
        return Err(ExtractError::Empty);
    }

    let cleaned = comment_re().replace_all(&raw, "");
    let cleaned = script_style_re().replace_all(&cleaned, "");

    // Walk headings and blocks in document order by collecting all
    // matches and sorting by start offset, reconstructing the heading
    // stack as we go.
    #[derive(Debug)]
    enum Node<'a> {
        Heading(u8, &'a str),
        Block(&'a str, &'a str),
    }

    let mut nodes: Vec<(usize, Node)> = Vec::new();
    for cap in heading_re().captures_iter(&cleaned) {
        let m = cap.get(0).unwrap();
        let level: u8 = cap[1].parse().unwrap_or(1);
        nodes.push((m.start(), Node::Heading(level, cap.get(2).unwrap().as_str())));
    }
    for cap in block_re().captures_iter(&cleaned) {
        let m = cap.get(0).unwrap();
        nodes.push((
            m.start(),
            Node::Block(cap.get(1).unwrap().as_str(), cap.get(2).unwrap().as_str()),
        ));
    }
    nodes.sort_by_key(|(pos, _)| *pos);

    let mut heading_stack: Vec<HeadingLevel> = Vec::new();
    let mut raw_fragments: Vec<(String, Option<String>, Vec<HeadingLevel>, crate::types::FragmentType)> =
        Vec::new();

    for (_, node) in nodes {
        match node {
            Node::Heading(level, html) => {
                let text = strip_tags(html);
                if text.is_empty() {
                    continue;
                }
                heading_stack.retain(|h| h.level < level);
                heading_stack.push(HeadingLevel {
                    level,
                    text: text.clone(),
                });
                raw_fragments.push((
                    text,
                    heading_stack.last().map(|h| h.text.clone()),
                    heading_stack.clone(),
                    crate::types::FragmentType::Heading,
                ));
            }
            Node::Block(tag, html) => {
                let text = strip_tags(html);
                if text.is_empty() {
                    continue;
                }
                raw_fragments.push((
                    text,
                    heading_stack.last().map(|h| h.text.clone()),
                    heading_stack.clone(),
                    tag_kind(tag),
                ));
            }
        }
    }

    let full_heading_hierarchy: Vec<HeadingLevel> = raw_fragments
        .iter()
        .filter(|(_, _, _, t)| matches!(t, crate::types::FragmentType::Heading))
        .map(|(text, _, hier, _)| hier.last().cloned().unwrap_or(HeadingLevel {
            level: 1,
            text: text.clone(),
        }))
        .collect();

    let fragments = build_fragments(raw_fragments);
    let text = fragments
        .iter()
        .map(|f| f.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    if fragments.is_empty() && text.is_empty() {
        return Err(ExtractError::Empty);
    }

    Ok(ExtractedContent {
        text,
        heading_hierarchy: full_heading_hierarchy,
        fragments,
        detected_language: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_headings_and_paragraphs() {
        let html = r#"
            <html><body>
            <h1>Title</h1>
            <p>This is a long enough paragraph to survive the minimum fragment length filter applied by the extractor.</p>
            <h2>Subsection</h2>
            <p>Another sufficiently long paragraph under the subsection heading for context tracking purposes.</p>
            </body></html>
        "#;
        let content = extract_html(html.as_bytes()).unwrap();
        assert!(content.text.contains("long enough paragraph"));
        assert_eq!(content.fragments.last().unwrap().heading_context.as_deref(), Some("Subsection"));
    }

    #[test]
    fn drops_script_and_style() {
        let html = "<html><script>evil()</script><style>.a{}</style><p>Visible content that is long enough to not be dropped by the minimum length filter.</p></html>";
        let content = extract_html(html.as_bytes()).unwrap();
        assert!(!content.text.contains("evil"));
    }

    #[test]
    fn empty_document_errors() {
        assert!(matches!(extract_html(b"   "), Err(ExtractError::Empty)));
    }

    #[test]
    fn short_fragments_are_dropped() {
        let html = "<html><p>too short</p></html>";
        let content = extract_html(html.as_bytes()).unwrap();
        assert!(content.fragments.is_empty());
    }
}
