//! The single registered [`seesaw::Effect`] for [`PipelineCommand`]:
//! one command type, one effect, matching internally on the variant
//! rather than registering an effect per command variant.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use seesaw::{Effect, EffectContext};
use tokio_util::sync::CancellationToken;

use domain_policy::breaker::FailureClass;
use domain_policy::store::DomainPolicyStore;
use domain_policy::trust::{SourceTrustLevel, TrustPolicy};
use evidence_graph::ids::{FragmentId, PageId};
use evidence_graph::types::{Fragment, FragmentType as GraphFragmentType, Page};
use evidence_graph::EvidenceGraph;
use fetcher::{BlockedKind, FetchContext, FetchOutcome, FetchResult, Fetcher};
use inference_gateway::calibration::CalibrationParams;
use inference_gateway::types::NliLabel;
use inference_gateway::InferenceGateway;

use crate::commands::{FetchedCandidate, PipelineCommand, RankableFragment};
use crate::error::{PipelineError, Result};
use crate::events::{AuthItem, PipelineEvent};
use crate::types::{Candidate, Target};

/// Upper bound on how many links a single `plan` round harvests from
/// the SERP and academic provider responses combined.
const MAX_PLAN_CANDIDATES: usize = 20;
/// Fragments beyond this are dropped by `classify_ingest`'s per-page
/// cap, keeping one noisy long page from drowning the round.
const MAX_FRAGMENTS_PER_PAGE: usize = 40;

fn doi_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"10\.\d{4,9}/[-._;()/:A-Za-z0-9]+").unwrap())
}

fn url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"https?://[^\s"'<>]+"#).unwrap())
}

/// Bundled dependencies for every pipeline stage. Held behind
/// `Arc`s so `PipelineEffect` stays cheap to clone into the dispatcher.
pub struct PipelineDeps {
    pub fetcher: Arc<dyn Fetcher>,
    pub domain_policy: DomainPolicyStore,
    pub trust_policy: TrustPolicy,
    pub gateway: Arc<dyn InferenceGateway>,
    pub graph: Arc<EvidenceGraph>,
    /// `{query}` is replaced with a percent-encoded query string.
    pub serp_url_template: String,
    pub academic_url_template: String,
    pub step_timeout: Duration,
    pub semantic_weight: f32,
    pub rank_limit: usize,
    /// Platt-scaling parameters applied to raw NLI confidences before
    /// they reach `evidence_graph::add_claim_evidence`.
    pub nli_calibration: CalibrationParams,
}

pub struct PipelineEffect;

#[async_trait]
impl Effect<PipelineCommand, PipelineDeps> for PipelineEffect {
    type Event = PipelineEvent;

    async fn execute(
        &self,
        command: PipelineCommand,
        ctx: EffectContext<PipelineDeps>,
    ) -> anyhow::Result<PipelineEvent> {
        let deps = ctx.deps();
        let event = match command {
            PipelineCommand::Plan {
                search_id,
                task_id: _,
                target,
            } => plan(deps, &search_id, &target).await?,
            PipelineCommand::Fetch {
                search_id,
                task_id,
                candidates,
            } => fetch(deps, &search_id, &task_id, candidates).await?,
            PipelineCommand::Extract {
                search_id,
                task_id: _,
                pages,
            } => extract(deps, &search_id, pages).await?,
            PipelineCommand::Rank {
                search_id,
                query,
                fragments,
            } => rank(deps, &search_id, &query, fragments).await?,
            PipelineCommand::ClassifyIngest {
                search_id,
                task_id,
                fragments,
            } => classify_ingest(deps, &search_id, &task_id, fragments).await?,
            PipelineCommand::ExpandCitations {
                search_id,
                task_id,
                page_ids,
            } => expand_citations(deps, &search_id, &task_id, page_ids).await?,
            PipelineCommand::Finalize {
                search_id,
                outcome,
                metrics,
            } => {
                tracing::info!(%search_id, ?outcome, "search finalized");
                PipelineEvent::SearchFinalized {
                    search_id,
                    outcome,
                    metrics,
                }
            }
        };
        Ok(event)
    }
}

async fn plan(deps: &PipelineDeps, search_id: &str, target: &Target) -> Result<PipelineEvent> {
    let candidates = match target {
        Target::Url { url, .. } => vec![Candidate::Url(url.clone())],
        Target::Doi { doi, .. } => vec![Candidate::Doi(doi.clone())],
        Target::Query { text } => plan_query(deps, text).await?,
    };

    if candidates.is_empty() {
        Ok(PipelineEvent::PlanEmpty {
            search_id: search_id.to_string(),
        })
    } else {
        Ok(PipelineEvent::PlanReady {
            search_id: search_id.to_string(),
            candidates,
        })
    }
}

/// Consults the SERP and academic providers in parallel
/// and harvests links/DOIs out of their raw response bytes. Neither
/// provider has a typed client in the dependency stack yet, so this
/// reuses the same escalating `Fetcher` the `fetch` step uses and
/// treats the result as an opaque page to scrape.
async fn plan_query(deps: &PipelineDeps, query: &str) -> Result<Vec<Candidate>> {
    let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
    let serp_url = deps.serp_url_template.replace("{query}", &encoded);
    let academic_url = deps.academic_url_template.replace("{query}", &encoded);

    let cancel = CancellationToken::new();
    let fetch_ctx = FetchContext::default();

    let (serp, academic) = tokio::time::timeout(
        deps.step_timeout,
        futures::future::join(
            deps.fetcher.fetch(&serp_url, &fetch_ctx, &cancel),
            deps.fetcher.fetch(&academic_url, &fetch_ctx, &cancel),
        ),
    )
    .await
    .map_err(|_| PipelineError::StepTimeout)?;

    let mut seen = HashSet::new();
    let mut candidates = Vec::new();
    for outcome in [serp, academic] {
        for candidate in harvest_candidates(outcome) {
            let key = match &candidate {
                Candidate::Url(u) => u.clone(),
                Candidate::Doi(d) => format!("doi:{d}"),
            };
            if seen.insert(key) {
                candidates.push(candidate);
            }
        }
    }
    candidates.truncate(MAX_PLAN_CANDIDATES);
    Ok(candidates)
}

fn harvest_candidates(outcome: FetchResult<FetchOutcome>) -> Vec<Candidate> {
    let Ok(FetchOutcome::Ok(doc)) = outcome else {
        return Vec::new();
    };
    let text = String::from_utf8_lossy(&doc.bytes);

    let mut out: Vec<Candidate> = doi_re()
        .find_iter(&text)
        .map(|m| Candidate::Doi(m.as_str().to_string()))
        .collect();
    out.extend(
        url_re()
            .find_iter(&text)
            .map(|m| Candidate::Url(m.as_str().trim_end_matches(['"', '\'', ')', '<', ',']).to_string())),
    );
    out
}

async fn fetch(
    deps: &PipelineDeps,
    search_id: &str,
    task_id: &str,
    candidates: Vec<Candidate>,
) -> Result<PipelineEvent> {
    let mut pages = Vec::with_capacity(candidates.len());
    let mut auth_required = Vec::new();
    let fetch_ctx = FetchContext::default();
    let cancel = CancellationToken::new();

    for candidate in candidates {
        let (raw_url, is_doi) = match &candidate {
            Candidate::Url(url) => (url.clone(), false),
            Candidate::Doi(doi) => (doi.clone(), true),
        };
        let canonical = match fetcher::canonicalize(&raw_url) {
            Ok(c) => c,
            Err(_) => continue,
        };
        let domain = url::Url::parse(&canonical)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();

        if !deps.domain_policy.is_request_admitted(&domain) {
            continue;
        }

        match deps.fetcher.fetch(&canonical, &fetch_ctx, &cancel).await {
            Ok(FetchOutcome::Ok(doc)) => {
                deps.domain_policy.record_success(&domain, doc.used_rung == fetcher::Rung::TorHttp);
                let trust_level = deps.trust_policy.classify(&domain);
                let page = Page {
                    id: PageId::new(),
                    url: doc.final_url,
                    domain,
                    content_type: doc.content_type.clone(),
                    fetched_at: chrono::Utc::now(),
                    source_trust_level: trust_level,
                    canonical_work: None,
                };
                let page_id = page.id;
                let content_type = page.content_type.clone();
                let url = page.url.clone();
                deps.graph.add_page(page).await?;
                pages.push(FetchedCandidate {
                    page_id,
                    url,
                    bytes: doc.bytes,
                    content_type,
                    source_trust_level: trust_level,
                });
            }
            Ok(FetchOutcome::AuthRequired { domain: auth_domain, auth_type }) => {
                auth_required.push(AuthItem {
                    domain: auth_domain,
                    url: canonical,
                    auth_type,
                });
            }
            Ok(FetchOutcome::Blocked { kind }) => {
                deps.domain_policy.record_failure(&domain, blocked_kind_to_class(kind), false);
                if is_doi {
                    pages.push(academic_placeholder(&canonical));
                }
            }
            Ok(FetchOutcome::NotFound) | Ok(FetchOutcome::TransientError { .. }) => {
                if is_doi {
                    pages.push(academic_placeholder(&canonical));
                }
            }
            Err(_) => {
                if is_doi {
                    pages.push(academic_placeholder(&canonical));
                }
            }
        }
    }

    tracing::info!(%search_id, %task_id, fetched = pages.len(), auth_required = auth_required.len(), "fetch round complete");

    Ok(PipelineEvent::PagesFetched {
        search_id: search_id.to_string(),
        pages,
        auth_required,
    })
}

fn blocked_kind_to_class(kind: BlockedKind) -> FailureClass {
    match kind {
        BlockedKind::RateLimited => FailureClass::TooManyRequests,
        BlockedKind::Forbidden => FailureClass::Forbidden,
        BlockedKind::Challenge => FailureClass::CloudflareChallenge,
    }
}

/// An abstract-only placeholder page for a DOI candidate whose full
/// text could not be reached. Empty bytes skip `extract`
/// naturally — there is nothing to extract from an abstract we never
/// fetched the body of.
fn academic_placeholder(canonical_url: &str) -> FetchedCandidate {
    FetchedCandidate {
        page_id: PageId::new(),
        url: canonical_url.to_string(),
        bytes: Vec::new(),
        content_type: "application/x-abstract-only".to_string(),
        source_trust_level: SourceTrustLevel::Academic,
    }
}

async fn extract(
    deps: &PipelineDeps,
    search_id: &str,
    pages: Vec<FetchedCandidate>,
) -> Result<PipelineEvent> {
    let mut fragments = Vec::new();

    for page in pages {
        if page.bytes.is_empty() {
            continue;
        }
        let extracted = match content_extractor::extract(&page.bytes, &page.content_type) {
            Ok(extracted) => extracted,
            Err(err) => {
                tracing::debug!(url = %page.url, error = %err, "extraction failed, skipping page");
                continue;
            }
        };

        for fragment in extracted.fragments.into_iter().take(MAX_FRAGMENTS_PER_PAGE) {
            let graph_fragment = Fragment {
                id: FragmentId::new(),
                page_id: page.page_id,
                text_content: fragment.text,
                heading_context: fragment.heading_context.clone(),
                heading_hierarchy: fragment
                    .heading_hierarchy
                    .into_iter()
                    .map(|h| (h.level, h.text))
                    .collect(),
                element_index: fragment.element_index,
                fragment_type: convert_fragment_type(fragment.fragment_type),
            };
            let fragment_id = graph_fragment.id;
            let text = graph_fragment.text_content.clone();
            let heading_context = graph_fragment.heading_context.clone();
            deps.graph.add_fragment(graph_fragment).await?;
            fragments.push(RankableFragment {
                fragment_id,
                page_id: page.page_id,
                text,
                heading_context,
                source_trust_level: page.source_trust_level,
            });
        }
    }

    Ok(PipelineEvent::FragmentsExtracted {
        search_id: search_id.to_string(),
        fragments,
    })
}

fn convert_fragment_type(ty: content_extractor::FragmentType) -> GraphFragmentType {
    match ty {
        content_extractor::FragmentType::Paragraph => GraphFragmentType::Paragraph,
        content_extractor::FragmentType::Heading => GraphFragmentType::Heading,
        content_extractor::FragmentType::List => GraphFragmentType::List,
        content_extractor::FragmentType::Table => GraphFragmentType::Table,
        content_extractor::FragmentType::Quote => GraphFragmentType::Quote,
        content_extractor::FragmentType::Figure => GraphFragmentType::Figure,
        content_extractor::FragmentType::Code => GraphFragmentType::Code,
    }
}

async fn rank(
    deps: &PipelineDeps,
    search_id: &str,
    query: &str,
    fragments: Vec<RankableFragment>,
) -> Result<PipelineEvent> {
    if fragments.is_empty() {
        return Ok(PipelineEvent::FragmentsRanked {
            search_id: search_id.to_string(),
            ranked: Vec::new(),
        });
    }

    let query_embedding = deps.gateway.embed(query).await?;
    let texts: Vec<&str> = fragments.iter().map(|f| f.text.as_str()).collect();
    let fragment_embeddings = deps.gateway.embed_batch(&texts).await?;

    let embeddings: Vec<(FragmentId, Vec<f32>)> = fragments
        .iter()
        .zip(fragment_embeddings.into_iter())
        .map(|(f, emb)| (f.fragment_id, emb))
        .collect();
    let text_pairs: Vec<(FragmentId, &str)> = fragments.iter().map(|f| (f.fragment_id, f.text.as_str())).collect();

    let hits = evidence_graph::search::hybrid_search(
        query,
        &query_embedding,
        &embeddings,
        &text_pairs,
        deps.rank_limit,
        deps.semantic_weight,
    );

    let by_id: std::collections::HashMap<FragmentId, RankableFragment> =
        fragments.into_iter().map(|f| (f.fragment_id, f)).collect();

    // The reranker takes owned `(doc_id, doc_text)` pairs; `doc_id` is
    // the fragment id round-tripped through its string form.
    let id_text: Vec<(String, String)> = hits
        .iter()
        .filter_map(|hit| by_id.get(&hit.fragment_id).map(|f| (hit.fragment_id.to_string(), f.text.clone())))
        .collect();
    let doc_pairs: Vec<(&str, &str)> = id_text.iter().map(|(id, text)| (id.as_str(), text.as_str())).collect();

    let ranked = if doc_pairs.is_empty() {
        Vec::new()
    } else {
        match deps.gateway.rerank(query, &doc_pairs).await {
            Ok(reranked) => reranked
                .into_iter()
                .filter_map(|doc| {
                    uuid::Uuid::parse_str(&doc.doc_id)
                        .ok()
                        .map(FragmentId)
                        .and_then(|id| by_id.get(&id).cloned())
                })
                .collect(),
            Err(_) => hits
                .into_iter()
                .filter_map(|hit| by_id.get(&hit.fragment_id).cloned())
                .collect(),
        }
    };

    Ok(PipelineEvent::FragmentsRanked {
        search_id: search_id.to_string(),
        ranked,
    })
}

async fn classify_ingest(
    deps: &PipelineDeps,
    search_id: &str,
    task_id: &str,
    fragments: Vec<RankableFragment>,
) -> Result<PipelineEvent> {
    let fragments_seen_this_round = fragments.len();
    let mut claims_ingested = 0usize;
    let mut primary_supporting = false;
    let mut secondary_supporting = false;
    let mut source_page_ids = Vec::new();

    for fragment in &fragments {
        let context = fragment.heading_context.clone().unwrap_or_default();
        let claims = deps.gateway.extract_claims(&fragment.text, &context).await?;

        for claim in claims {
            let nli = deps.gateway.nli(&fragment.text, &claim.claim_text).await?;
            let calibrated = deps.nli_calibration.apply(nli.confidence_raw);
            let nli_label = convert_nli_label(nli.label);

            deps.graph
                .add_claim_evidence(task_id, fragment.fragment_id, &claim.claim_text, nli_label, calibrated)
                .await?;
            claims_ingested += 1;

            if matches!(nli_label, evidence_graph::types::NliEdgeLabel::Supports) {
                if fragment.source_trust_level.is_primary_source() {
                    primary_supporting = true;
                } else if matches!(fragment.source_trust_level, SourceTrustLevel::Trusted) {
                    secondary_supporting = true;
                }
                if !source_page_ids.contains(&fragment.page_id) {
                    source_page_ids.push(fragment.page_id);
                }
            }
        }
    }

    let independent_supporting_total = source_page_ids.len();

    Ok(PipelineEvent::ClaimsIngested {
        search_id: search_id.to_string(),
        claims_ingested,
        independent_supporting_total,
        primary_supporting,
        secondary_supporting,
        fragments_seen_this_round,
        source_page_ids,
    })
}

fn convert_nli_label(label: NliLabel) -> evidence_graph::types::NliEdgeLabel {
    match label {
        NliLabel::Supports => evidence_graph::types::NliEdgeLabel::Supports,
        NliLabel::Refutes => evidence_graph::types::NliEdgeLabel::Refutes,
        NliLabel::Neutral => evidence_graph::types::NliEdgeLabel::Neutral,
    }
}

/// Citation expansion resolves references of the
/// ingested claims' source pages to new targets and hands them off to
/// the external strategist — the executor never invents queries, so
/// this never calls `queue_targets` itself.
async fn expand_citations(
    _deps: &PipelineDeps,
    search_id: &str,
    task_id: &str,
    page_ids: Vec<PageId>,
) -> Result<PipelineEvent> {
    tracing::debug!(%search_id, %task_id, pages = page_ids.len(), "citation expansion not yet wired to a provider, reporting no new targets");
    Ok(PipelineEvent::CitationsExpanded {
        search_id: search_id.to_string(),
        new_targets: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fetcher::{FetchTimings, FetchedDocument, Rung};

    fn ok_doc(bytes: &[u8]) -> FetchResult<FetchOutcome> {
        Ok(FetchOutcome::Ok(FetchedDocument {
            bytes: bytes.to_vec(),
            final_url: "https://example.org".into(),
            content_type: "text/html".into(),
            headers: Vec::new(),
            timings: FetchTimings::default(),
            used_rung: Rung::DirectHttp,
        }))
    }

    #[test]
    fn harvest_candidates_finds_dois_and_urls() {
        let body = b"see https://example.org/paper and doi:10.1234/abcd.5678 for details";
        let found = harvest_candidates(ok_doc(body));
        assert!(found.iter().any(|c| matches!(c, Candidate::Doi(d) if d == "10.1234/abcd.5678")));
        assert!(found.iter().any(|c| matches!(c, Candidate::Url(u) if u == "https://example.org/paper")));
    }

    #[test]
    fn harvest_candidates_ignores_failed_fetches() {
        let found = harvest_candidates(Ok(FetchOutcome::NotFound));
        assert!(found.is_empty());
    }

    #[test]
    fn harvest_candidates_trims_trailing_punctuation() {
        let body = b"a link (https://example.org/foo), trailing comma";
        let found = harvest_candidates(ok_doc(body));
        assert!(found.iter().any(|c| matches!(c, Candidate::Url(u) if u == "https://example.org/foo")));
    }

    #[test]
    fn blocked_kind_maps_to_matching_failure_class() {
        assert!(matches!(
            blocked_kind_to_class(BlockedKind::RateLimited),
            FailureClass::TooManyRequests
        ));
        assert!(matches!(
            blocked_kind_to_class(BlockedKind::Forbidden),
            FailureClass::Forbidden
        ));
        assert!(matches!(
            blocked_kind_to_class(BlockedKind::Challenge),
            FailureClass::CloudflareChallenge
        ));
    }

    #[test]
    fn convert_fragment_type_preserves_variant() {
        assert!(matches!(
            convert_fragment_type(content_extractor::FragmentType::Table),
            GraphFragmentType::Table
        ));
        assert!(matches!(
            convert_fragment_type(content_extractor::FragmentType::Code),
            GraphFragmentType::Code
        ));
    }

    #[test]
    fn convert_nli_label_preserves_variant() {
        assert!(matches!(
            convert_nli_label(NliLabel::Refutes),
            evidence_graph::types::NliEdgeLabel::Refutes
        ));
    }

    #[test]
    fn academic_placeholder_is_empty_and_academic_trust() {
        let page = academic_placeholder("https://doi.org/10.1234/abcd");
        assert!(page.bytes.is_empty());
        assert!(matches!(page.source_trust_level, SourceTrustLevel::Academic));
    }
}
