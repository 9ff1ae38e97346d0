//! URL canonicalization used as the deduplication key.

use url::Url;

/// Known tracking query parameters stripped before dedup.
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "gclid",
    "fbclid",
    "mc_cid",
    "mc_eid",
    "ref",
];

/// Canonicalize a URL: lower-case the host, strip tracking params,
/// drop a trailing slash on non-root paths, and expand DOI aliases.
pub fn canonicalize(raw: &str) -> Result<String, url::ParseError> {
    if let Some(doi) = extract_doi(raw) {
        return Ok(format!("https://doi.org/{doi}"));
    }

    let mut url = Url::parse(raw)?;

    if let Some(host) = url.host_str() {
        let lower = host.to_ascii_lowercase();
        let _ = url.set_host(Some(&lower));
    }

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !TRACKING_PARAMS.contains(&k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(&pairs);
    }

    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        url.set_path(path.trim_end_matches('/'));
    }

    url.set_fragment(None);

    Ok(url.to_string())
}

/// Pull a DOI out of a raw string, whether it is a bare DOI
/// (`10.1000/xyz`) or a `doi.org` / `dx.doi.org` URL.
pub fn extract_doi(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.starts_with("10.") && trimmed.contains('/') {
        return Some(trimmed.to_string());
    }
    if let Ok(url) = Url::parse(trimmed) {
        if matches!(url.host_str(), Some(h) if h.ends_with("doi.org")) {
            let path = url.path().trim_start_matches('/');
            if !path.is_empty() {
                return Some(path.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tracking_params() {
        let canon =
            canonicalize("https://Example.com/Article/?utm_source=x&id=42").unwrap();
        assert_eq!(canon, "https://example.com/Article?id=42");
    }

    #[test]
    fn strips_trailing_slash_on_non_root() {
        let canon = canonicalize("https://example.com/a/b/").unwrap();
        assert_eq!(canon, "https://example.com/a/b");
    }

    #[test]
    fn keeps_root_slash() {
        let canon = canonicalize("https://example.com/").unwrap();
        assert_eq!(canon, "https://example.com/");
    }

    #[test]
    fn expands_bare_doi() {
        let canon = canonicalize("10.1038/nphys1170").unwrap();
        assert_eq!(canon, "https://doi.org/10.1038/nphys1170");
    }

    #[test]
    fn expands_doi_url() {
        let canon = canonicalize("https://dx.doi.org/10.1038/nphys1170").unwrap();
        assert_eq!(canon, "https://doi.org/10.1038/nphys1170");
    }
}
