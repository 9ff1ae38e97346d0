//! Shared fragment post-processing: minimum length filtering.

use crate::types::{ExtractedFragment, FragmentType, HeadingLevel};

/// Fragments shorter than this are dropped as boilerplate noise.
pub const MIN_FRAGMENT_LEN: usize = 100;

pub(crate) fn build_fragments(
    raw: Vec<(String, Option<String>, Vec<HeadingLevel>, FragmentType)>,
) -> Vec<ExtractedFragment> {
    raw.into_iter()
        .enumerate()
        .filter(|(_, (text, _, _, kind))| {
            matches!(kind, FragmentType::Heading) || text.len() >= MIN_FRAGMENT_LEN
        })
        .map(|(index, (text, heading_context, heading_hierarchy, fragment_type))| {
            ExtractedFragment {
                text,
                heading_context,
                heading_hierarchy,
                element_index: index,
                fragment_type,
            }
        })
        .collect()
}
