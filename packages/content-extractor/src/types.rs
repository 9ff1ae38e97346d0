//! Fragment and heading types produced by the extractor.

use serde::{Deserialize, Serialize};

/// One level of a document's heading hierarchy at the point a fragment
/// was found (e.g. `[(1, "Methods"), (2, "Data collection")]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingLevel {
    pub level: u8,
    pub text: String,
}

/// The structural role of a fragment within its source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FragmentType {
    Paragraph,
    Heading,
    List,
    Table,
    Quote,
    Figure,
    Code,
}

/// A bounded text segment extracted from a page, carrying heading
/// context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedFragment {
    pub text: String,
    pub heading_context: Option<String>,
    pub heading_hierarchy: Vec<HeadingLevel>,
    pub element_index: usize,
    pub fragment_type: FragmentType,
}

/// The result of extracting one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedContent {
    pub text: String,
    pub heading_hierarchy: Vec<HeadingLevel>,
    pub fragments: Vec<ExtractedFragment>,
    pub detected_language: Option<String>,
}
