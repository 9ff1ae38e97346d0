//! In-memory graph storage: an arena of nodes keyed by string id, with
//! edges as typed tuples. The graph is an index, not a pointer web —
//! no `Rc`/`RefCell` cycles.

use indexmap::IndexMap;

use crate::error::{GraphError, Result};
use crate::ids::{ClaimId, EdgeId, FragmentId, PageId, WorkId};
use crate::types::{Claim, Edge, Fragment, Page, Work};

/// An append-mostly index over the pages, fragments, claims, edges,
/// and works that make up one task's evidence graph.
///
/// Every cross-node reference is an ID, looked up through this arena,
/// rather than an owned pointer — nodes can be dropped and reinserted
/// freely without invalidating references held elsewhere.
#[derive(Debug, Default)]
pub struct GraphArena {
    pages: IndexMap<PageId, Page>,
    fragments: IndexMap<FragmentId, Fragment>,
    claims: IndexMap<ClaimId, Claim>,
    edges: IndexMap<EdgeId, Edge>,
    works: IndexMap<WorkId, Work>,
    /// Edges grouped by their target node id, for fast `edges_into`.
    edges_by_target: IndexMap<String, Vec<EdgeId>>,
}

impl GraphArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_page(&mut self, page: Page) -> PageId {
        let id = page.id;
        self.pages.insert(id, page);
        id
    }

    pub fn insert_fragment(&mut self, fragment: Fragment) -> FragmentId {
        let id = fragment.id;
        self.fragments.insert(id, fragment);
        id
    }

    pub fn insert_claim(&mut self, claim: Claim) -> ClaimId {
        let id = claim.id;
        self.claims.insert(id, claim);
        id
    }

    pub fn insert_work(&mut self, work: Work) -> WorkId {
        let id = work.id;
        self.works.insert(id, work);
        id
    }

    pub fn insert_edge(&mut self, edge: Edge) -> EdgeId {
        let id = edge.id;
        self.edges_by_target
            .entry(edge.target_id.clone())
            .or_default()
            .push(id);
        self.edges.insert(id, edge);
        id
    }

    pub fn page(&self, id: PageId) -> Option<&Page> {
        self.pages.get(&id)
    }

    pub fn fragment(&self, id: FragmentId) -> Option<&Fragment> {
        self.fragments.get(&id)
    }

    pub fn claim(&self, id: ClaimId) -> Option<&Claim> {
        self.claims.get(&id)
    }

    pub fn claim_mut(&mut self, id: ClaimId) -> Option<&mut Claim> {
        self.claims.get_mut(&id)
    }

    pub fn work(&self, id: WorkId) -> Option<&Work> {
        self.works.get(&id)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(&id)
    }

    /// All edges whose `target_id` matches the given node id string.
    pub fn edges_into(&self, target_id: &str) -> Vec<&Edge> {
        self.edges_by_target
            .get(target_id)
            .into_iter()
            .flatten()
            .filter_map(|edge_id| self.edges.get(edge_id))
            .collect()
    }

    pub fn claims_for_task<'a>(&'a self, task_id: &'a str) -> impl Iterator<Item = &'a Claim> {
        self.claims.values().filter(move |c| c.task_id == task_id)
    }

    pub fn all_claims(&self) -> impl Iterator<Item = &Claim> {
        self.claims.values()
    }

    pub fn all_pages(&self) -> impl Iterator<Item = &Page> {
        self.pages.values()
    }

    pub fn all_fragments(&self) -> impl Iterator<Item = &Fragment> {
        self.fragments.values()
    }

    pub fn require_page(&self, id: PageId) -> Result<&Page> {
        self.page(id)
            .ok_or_else(|| GraphError::PageNotFound(id.to_string()))
    }

    pub fn require_claim(&self, id: ClaimId) -> Result<&Claim> {
        self.claim(id)
            .ok_or_else(|| GraphError::ClaimNotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClaimAdoptionStatus, ClaimConfidenceSource, EdgeRelation, NliEdgeLabel};
    use chrono::Utc;
    use domain_policy::SourceTrustLevel;

    fn sample_page() -> Page {
        Page {
            id: PageId::new(),
            url: "https://example.org/article".into(),
            domain: "example.org".into(),
            content_type: "text/html".into(),
            fetched_at: Utc::now(),
            source_trust_level: SourceTrustLevel::Trusted,
            canonical_work: None,
        }
    }

    fn sample_claim(task_id: &str) -> Claim {
        Claim {
            id: ClaimId::new(),
            task_id: task_id.into(),
            claim_text: "The sky is blue.".into(),
            llm_claim_confidence_raw: 0.6,
            bayes_claim_confidence: 0.6,
            claim_confidence_source: ClaimConfidenceSource::LlmFallback,
            claim_adoption_status: ClaimAdoptionStatus::Adopted,
        }
    }

    #[test]
    fn inserts_and_looks_up_by_id() {
        let mut arena = GraphArena::new();
        let page = sample_page();
        let id = arena.insert_page(page);
        assert!(arena.page(id).is_some());
        assert!(arena.require_page(id).is_ok());
    }

    #[test]
    fn missing_claim_is_an_error() {
        let arena = GraphArena::new();
        assert!(arena.require_claim(ClaimId::new()).is_err());
    }

    #[test]
    fn edges_into_groups_by_target() {
        let mut arena = GraphArena::new();
        let claim = sample_claim("task-1");
        let claim_id = arena.insert_claim(claim);
        let fragment_id = FragmentId::new();

        let edge = Edge {
            id: EdgeId::new(),
            source_id: fragment_id.to_string(),
            target_id: claim_id.to_string(),
            relation: EdgeRelation::FragmentToClaim {
                nli_edge_label: NliEdgeLabel::Supports,
                nli_edge_confidence_raw: 0.9,
            },
            created_at: Utc::now(),
        };
        arena.insert_edge(edge);

        let incoming = arena.edges_into(&claim_id.to_string());
        assert_eq!(incoming.len(), 1);
    }

    #[test]
    fn claims_for_task_filters_by_task_id() {
        let mut arena = GraphArena::new();
        arena.insert_claim(sample_claim("task-1"));
        arena.insert_claim(sample_claim("task-2"));
        let task_one: Vec<_> = arena.claims_for_task("task-1").collect();
        assert_eq!(task_one.len(), 1);
    }

    #[test]
    fn two_fragments_on_one_page_resolve_to_the_same_page_id() {
        let mut arena = GraphArena::new();
        let page_id = arena.insert_page(sample_page());

        let fragment_a = Fragment {
            id: FragmentId::new(),
            page_id,
            text_content: "First paragraph.".into(),
            heading_context: None,
            heading_hierarchy: Vec::new(),
            element_index: 0,
            fragment_type: crate::types::FragmentType::Paragraph,
        };
        let fragment_b = Fragment {
            id: FragmentId::new(),
            page_id,
            text_content: "Second paragraph.".into(),
            heading_context: None,
            heading_hierarchy: Vec::new(),
            element_index: 1,
            fragment_type: crate::types::FragmentType::Paragraph,
        };
        let id_a = arena.insert_fragment(fragment_a);
        let id_b = arena.insert_fragment(fragment_b);

        // Two distinct fragments, same owning page: resolving each
        // fragment id to its page id (what claim-confidence
        // aggregation keys `EvidenceInput::source_key` on) collapses
        // them to a single source rather than counting two.
        let page_of_a = arena.fragment(id_a).unwrap().page_id;
        let page_of_b = arena.fragment(id_b).unwrap().page_id;
        assert_eq!(page_of_a, page_of_b);
        assert_ne!(id_a, id_b);
    }
}
