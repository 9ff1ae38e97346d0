//! In-memory evidence graph with a durable Postgres mirror and
//! Bayesian per-claim confidence aggregation.
//!
//! Calibration of NLI confidences (Platt scaling against the
//! gateway's `calibration_params`) happens upstream, in the pipeline
//! that calls [`EvidenceGraph::add_claim_evidence`] — by the time a
//! confidence value reaches this crate it is already the number the
//! aggregation math should use.

pub mod aggregation;
pub mod arena;
pub mod dedup;
pub mod error;
pub mod ids;
pub mod search;
pub mod store;
pub mod types;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use aggregation::EvidenceInput;
use arena::GraphArena;
use error::{GraphError, Result};
use ids::{ClaimId, EdgeId, FragmentId, PageId, WorkId};
use store::GraphStore;
use types::{
    Claim, ClaimAdoptionStatus, ClaimConfidence, ClaimConfidenceSource, Contradiction, Edge,
    EdgeRelation, Fragment, NliEdgeLabel, Page, Work,
};

/// Ties the hot in-memory arena to its durable mirror and exposes the
/// claim/citation/aggregation operations the pipeline and control
/// surface call.
pub struct EvidenceGraph {
    arena: RwLock<GraphArena>,
    store: GraphStore,
}

impl EvidenceGraph {
    pub fn new(store: GraphStore) -> Self {
        Self {
            arena: RwLock::new(GraphArena::new()),
            store,
        }
    }

    /// Reconstruct the arena for a task by replaying its claims and
    /// incoming edges from the durable store.
    #[instrument(skip(self))]
    pub async fn reload_task(&self, task_id: &str) -> Result<()> {
        let claims = self.store.claims_for_task(task_id).await?;
        let mut arena = self.arena.write().await;
        for claim in claims {
            arena.insert_claim(claim);
        }
        Ok(())
    }

    /// Creates the claim if no near-duplicate already exists for this
    /// task, else attaches the new edge to the existing claim.
    #[instrument(skip(self, claim_text))]
    pub async fn add_claim_evidence(
        &self,
        task_id: &str,
        fragment_id: FragmentId,
        claim_text: &str,
        nli_label: NliEdgeLabel,
        nli_confidence_raw: f32,
    ) -> Result<(ClaimId, EdgeId)> {
        let mut arena = self.arena.write().await;

        let existing = arena
            .claims_for_task(task_id)
            .find(|claim| dedup::is_near_duplicate(&claim.claim_text, claim_text))
            .map(|claim| claim.id);

        let claim_id = match existing {
            Some(id) => id,
            None => {
                let claim = Claim {
                    id: ClaimId::new(),
                    task_id: task_id.to_string(),
                    claim_text: claim_text.to_string(),
                    llm_claim_confidence_raw: nli_confidence_raw,
                    bayes_claim_confidence: 0.5,
                    claim_confidence_source: ClaimConfidenceSource::LlmFallback,
                    claim_adoption_status: ClaimAdoptionStatus::Adopted,
                };
                let id = claim.id;
                self.store.store_claim(&claim).await?;
                arena.insert_claim(claim);
                debug!(%task_id, claim_id = %id, "created new claim");
                id
            }
        };

        let fragment_id_str = fragment_id.to_string();
        let existing_edge = arena
            .edges_into(&claim_id.to_string())
            .into_iter()
            .find(|edge| {
                edge.source_id == fragment_id_str
                    && matches!(
                        edge.relation,
                        EdgeRelation::FragmentToClaim { nli_edge_label, .. } if nli_edge_label == nli_label
                    )
            })
            .map(|edge| edge.id);

        let edge_id = match existing_edge {
            Some(id) => id,
            None => {
                let edge = Edge {
                    id: EdgeId::new(),
                    source_id: fragment_id_str,
                    target_id: claim_id.to_string(),
                    relation: EdgeRelation::FragmentToClaim {
                        nli_edge_label: nli_label,
                        nli_edge_confidence_raw: nli_confidence_raw,
                    },
                    created_at: Utc::now(),
                };
                let id = arena.insert_edge(edge.clone());
                self.store.store_edge(&edge).await?;
                id
            }
        };

        drop(arena);
        let aggregated = self.calculate_claim_confidence(claim_id).await?;
        let mut arena = self.arena.write().await;
        if let Some(claim) = arena.claim_mut(claim_id) {
            claim.bayes_claim_confidence = aggregated.bayes_claim_confidence;
            claim.claim_confidence_source = aggregated.claim_confidence_source;
        }
        let claim = arena
            .claim(claim_id)
            .cloned()
            .ok_or_else(|| GraphError::ClaimNotFound(claim_id.to_string()))?;
        drop(arena);
        self.store.store_claim(&claim).await?;

        Ok((claim_id, edge_id))
    }

    /// Writes a fetched page through to the arena and its durable
    /// mirror. Idempotent keying (content-hash dedup against a page
    /// already fetched for this URL) is the fetcher's concern, not
    /// the graph's; by the time a page reaches here it's new.
    #[instrument(skip(self, page))]
    pub async fn add_page(&self, page: Page) -> Result<PageId> {
        let id = page.id;
        self.store.store_page(&page).await?;
        self.arena.write().await.insert_page(page);
        Ok(id)
    }

    /// Writes an extracted fragment through to the arena and its
    /// durable mirror.
    #[instrument(skip(self, fragment))]
    pub async fn add_fragment(&self, fragment: Fragment) -> Result<FragmentId> {
        let id = fragment.id;
        self.store.store_fragment(&fragment).await?;
        self.arena.write().await.insert_fragment(fragment);
        Ok(id)
    }

    /// Writes a resolved work (DOI-identified paper) through to the
    /// arena and its durable mirror.
    #[instrument(skip(self, work))]
    pub async fn add_work(&self, work: Work) -> Result<WorkId> {
        let id = work.id;
        self.store.store_work(&work).await?;
        self.arena.write().await.insert_work(work);
        Ok(id)
    }

    /// Adds a `cites` edge between two pages, if both already exist in
    /// the arena.
    #[instrument(skip(self, context))]
    pub async fn add_citation(
        &self,
        from_page: PageId,
        to_page: PageId,
        context: Option<String>,
    ) -> Result<EdgeId> {
        let arena = self.arena.read().await;
        arena.require_page(from_page)?;
        arena.require_page(to_page)?;
        drop(arena);

        let edge = Edge {
            id: EdgeId::new(),
            source_id: from_page.to_string(),
            target_id: to_page.to_string(),
            relation: EdgeRelation::Cites {
                citation_context: context,
            },
            created_at: Utc::now(),
        };
        let mut arena = self.arena.write().await;
        let edge_id = arena.insert_edge(edge.clone());
        drop(arena);
        self.store.store_edge(&edge).await?;
        Ok(edge_id)
    }

    /// Recomputes a claim's Bayesian confidence from its current
    /// incoming edges.
    #[instrument(skip(self))]
    pub async fn calculate_claim_confidence(&self, claim_id: ClaimId) -> Result<ClaimConfidence> {
        let arena = self.arena.read().await;
        let claim = arena.require_claim(claim_id)?;
        let incoming = arena.edges_into(&claim_id.to_string());

        let mut evidence_ids = Vec::with_capacity(incoming.len());
        let mut inputs = Vec::with_capacity(incoming.len());
        for edge in &incoming {
            evidence_ids.push(edge.id);
            if let EdgeRelation::FragmentToClaim {
                nli_edge_label,
                nli_edge_confidence_raw,
            } = &edge.relation
            {
                // The fragment's owning page is the canonical source
                // key, so two fragments cited out of the same page
                // collapse to one independent source; canonical-work
                // collapsing across pages happens once pages carry a
                // resolved `canonical_work`, looked up by the pipeline
                // before calling `add_claim_evidence`.
                let source_key = edge
                    .source_id
                    .parse::<uuid::Uuid>()
                    .ok()
                    .and_then(|uuid| arena.fragment(FragmentId(uuid)))
                    .map(|fragment| fragment.page_id.to_string())
                    .unwrap_or_else(|| edge.source_id.clone());
                inputs.push(EvidenceInput {
                    source_key,
                    label: *nli_edge_label,
                    confidence_raw: *nli_edge_confidence_raw,
                });
            }
        }

        let result = aggregation::aggregate(&inputs, claim.llm_claim_confidence_raw);

        Ok(ClaimConfidence {
            claim_id,
            bayes_claim_confidence: result.bayes_claim_confidence,
            llm_claim_confidence_raw: claim.llm_claim_confidence_raw,
            claim_confidence_source: result.claim_confidence_source,
            independent_sources: result.independent_sources,
            supports_count: result.supports_count,
            refutes_count: result.refutes_count,
            neutral_count: result.neutral_count,
            alpha: result.alpha,
            beta: result.beta,
            evidence: evidence_ids,
        })
    }

    /// Claims in `task_id` with both supporting and refuting edges.
    #[instrument(skip(self))]
    pub async fn find_contradictions(&self, task_id: &str) -> Result<Vec<Contradiction>> {
        let arena = self.arena.read().await;
        let claim_ids: Vec<ClaimId> = arena.claims_for_task(task_id).map(|c| c.id).collect();
        drop(arena);

        let mut contradictions = Vec::new();
        for claim_id in claim_ids {
            let confidence = self.calculate_claim_confidence(claim_id).await?;
            if confidence.supports_count > 0 && confidence.refutes_count > 0 {
                contradictions.push(Contradiction {
                    claim_id,
                    supporting: confidence.supports_count,
                    refuting: confidence.refutes_count,
                });
            }
        }
        Ok(contradictions)
    }

    /// Claims recorded for a task, read straight from the durable
    /// store (used by `vector_search`/`feedback` callers that don't
    /// need the arena's aggregation state).
    pub async fn claims_for_task(&self, task_id: &str) -> Result<Vec<Claim>> {
        self.store.claims_for_task(task_id).await
    }

    /// A single fragment's text and metadata, by id.
    pub async fn load_fragment(&self, id: FragmentId) -> Result<Fragment> {
        self.store.load_fragment(id).await
    }

    /// A single claim, by id, read straight from the durable store.
    pub async fn load_claim(&self, id: ClaimId) -> Result<Claim> {
        self.store.load_claim(id).await
    }
}
