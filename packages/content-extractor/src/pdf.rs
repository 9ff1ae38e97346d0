//! PDF front-end: text-only extraction, no layout reconstruction or
//! OCR.

use crate::error::{ExtractError, Result};
use crate::fragments::build_fragments;
use crate::types::{ExtractedContent, FragmentType};

/// Extract text from a PDF and split it into paragraph-sized fragments
/// on blank-line boundaries, since PDF extraction does not preserve a
/// heading hierarchy the way HTML does.
pub fn extract_pdf(bytes: &[u8]) -> Result<ExtractedContent> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| ExtractError::Pdf(e.to_string()))?;

    if text.trim().is_empty() {
        return Err(ExtractError::Empty);
    }

    let raw: Vec<_> = text
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            let normalized = p.split_whitespace().collect::<Vec<_>>().join(" ");
            (normalized, None, Vec::new(), FragmentType::Paragraph)
        })
        .collect();

    let fragments = build_fragments(raw);
    if fragments.is_empty() {
        return Err(ExtractError::Empty);
    }

    let full_text = fragments
        .iter()
        .map(|f| f.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    Ok(ExtractedContent {
        text: full_text,
        heading_hierarchy: Vec::new(),
        fragments,
        detected_language: None,
    })
}
