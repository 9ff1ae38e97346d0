//! Pure `(bytes, content_type) -> (text, headings, fragments)`
//! extraction. No network I/O; the fetcher crate owns retrieval.

pub mod error;
pub mod fragments;
pub mod html;
pub mod pdf;
pub mod types;

pub use error::{ExtractError, Result};
pub use types::{ExtractedContent, ExtractedFragment, FragmentType, HeadingLevel};

/// Dispatch extraction by content type. Anything not recognized as
/// HTML or PDF is rejected rather than guessed at.
pub fn extract(bytes: &[u8], content_type: &str) -> Result<ExtractedContent> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_ascii_lowercase();

    match mime.as_str() {
        "text/html" | "application/xhtml+xml" => html::extract_html(bytes),
        "application/pdf" => pdf::extract_pdf(bytes),
        other => Err(error::ExtractError::UnsupportedContentType(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_content_type() {
        let result = extract(b"whatever", "image/png");
        assert!(matches!(result, Err(ExtractError::UnsupportedContentType(_))));
    }

    #[test]
    fn dispatches_html() {
        let html = "<html><p>A paragraph long enough to clear the minimum fragment length threshold used by the extractor.</p></html>";
        let result = extract(html.as_bytes(), "text/html; charset=utf-8").unwrap();
        assert!(!result.fragments.is_empty());
    }
}
