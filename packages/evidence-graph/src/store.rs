//! Durable PostgreSQL mirror of the in-memory [`crate::arena::GraphArena`].
//!
//! The arena is the hot path; this store exists so a task's graph
//! survives a process restart and so `query_view` can be served
//! without rehydrating the whole arena.

use chrono::{DateTime, Utc};
use serde_json::Value as Json;
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use tracing::instrument;
use uuid::Uuid;

use crate::error::{GraphError, Result};
use crate::ids::{ClaimId, EdgeId, FragmentId, PageId, WorkId};
use crate::types::{
    Claim, ClaimAdoptionStatus, ClaimConfidenceSource, Edge, EdgeRelation, Fragment,
    FragmentType, NliEdgeLabel, Page, Work,
};
use domain_policy::SourceTrustLevel;

/// Durable store for the evidence graph, backed by Postgres.
pub struct GraphStore {
    pool: PgPool,
}

impl GraphStore {
    pub async fn from_pool(pool: PgPool) -> Result<Self> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    #[instrument(skip(self))]
    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pages (
                id UUID PRIMARY KEY,
                url TEXT NOT NULL,
                domain TEXT NOT NULL,
                content_type TEXT NOT NULL,
                fetched_at TIMESTAMPTZ NOT NULL,
                source_trust_level TEXT NOT NULL,
                canonical_work UUID
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_pages_domain ON pages(domain)")
            .execute(&self.pool)
            .await
            .ok();

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS fragments (
                id UUID PRIMARY KEY,
                page_id UUID NOT NULL REFERENCES pages(id),
                text_content TEXT NOT NULL,
                heading_context TEXT,
                heading_hierarchy JSONB NOT NULL DEFAULT '[]',
                element_index BIGINT NOT NULL,
                fragment_type TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS claims (
                id UUID PRIMARY KEY,
                task_id TEXT NOT NULL,
                claim_text TEXT NOT NULL,
                llm_claim_confidence_raw REAL NOT NULL,
                bayes_claim_confidence REAL NOT NULL,
                claim_confidence_source TEXT NOT NULL,
                claim_adoption_status TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_claims_task_id ON claims(task_id)")
            .execute(&self.pool)
            .await
            .ok();

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS edges (
                id UUID PRIMARY KEY,
                source_id TEXT NOT NULL,
                target_id TEXT NOT NULL,
                relation_kind TEXT NOT NULL,
                relation_body JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_edges_target_id ON edges(target_id)")
            .execute(&self.pool)
            .await
            .ok();

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS works (
                id UUID PRIMARY KEY,
                doi TEXT,
                year INT,
                venue TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }

    pub async fn store_page(&self, page: &Page) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO pages (id, url, domain, content_type, fetched_at, source_trust_level, canonical_work)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                url = EXCLUDED.url,
                domain = EXCLUDED.domain,
                content_type = EXCLUDED.content_type,
                fetched_at = EXCLUDED.fetched_at,
                source_trust_level = EXCLUDED.source_trust_level,
                canonical_work = EXCLUDED.canonical_work
            "#,
        )
        .bind(page.id.0)
        .bind(&page.url)
        .bind(&page.domain)
        .bind(&page.content_type)
        .bind(page.fetched_at)
        .bind(trust_level_to_str(page.source_trust_level))
        .bind(page.canonical_work.map(|w| w.0))
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    pub async fn load_page(&self, id: PageId) -> Result<Page> {
        let row = sqlx::query_as::<_, PageRow>("SELECT * FROM pages WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?
            .ok_or_else(|| GraphError::PageNotFound(id.to_string()))?;
        row.try_into()
    }

    pub async fn load_claim(&self, id: ClaimId) -> Result<Claim> {
        let row = sqlx::query_as::<_, ClaimRow>("SELECT * FROM claims WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?
            .ok_or_else(|| GraphError::ClaimNotFound(id.to_string()))?;
        row.try_into()
    }

    pub async fn load_fragment(&self, id: FragmentId) -> Result<Fragment> {
        let row = sqlx::query_as::<_, FragmentRow>("SELECT * FROM fragments WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?
            .ok_or_else(|| GraphError::FragmentNotFound(id.to_string()))?;
        row.try_into()
    }

    pub async fn store_fragment(&self, fragment: &Fragment) -> Result<()> {
        let hierarchy = serde_json::to_value(&fragment.heading_hierarchy).unwrap_or(Json::Null);
        sqlx::query(
            r#"
            INSERT INTO fragments (id, page_id, text_content, heading_context, heading_hierarchy, element_index, fragment_type)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(fragment.id.0)
        .bind(fragment.page_id.0)
        .bind(&fragment.text_content)
        .bind(&fragment.heading_context)
        .bind(hierarchy)
        .bind(fragment.element_index as i64)
        .bind(fragment_type_to_str(fragment.fragment_type))
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    pub async fn store_claim(&self, claim: &Claim) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO claims (id, task_id, claim_text, llm_claim_confidence_raw, bayes_claim_confidence, claim_confidence_source, claim_adoption_status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                bayes_claim_confidence = EXCLUDED.bayes_claim_confidence,
                claim_confidence_source = EXCLUDED.claim_confidence_source,
                claim_adoption_status = EXCLUDED.claim_adoption_status
            "#,
        )
        .bind(claim.id.0)
        .bind(&claim.task_id)
        .bind(&claim.claim_text)
        .bind(claim.llm_claim_confidence_raw)
        .bind(claim.bayes_claim_confidence)
        .bind(claim_confidence_source_to_str(claim.claim_confidence_source))
        .bind(claim_adoption_status_to_str(claim.claim_adoption_status))
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    pub async fn store_edge(&self, edge: &Edge) -> Result<()> {
        let (kind, body) = match &edge.relation {
            EdgeRelation::FragmentToClaim {
                nli_edge_label,
                nli_edge_confidence_raw,
            } => (
                "fragment_to_claim",
                serde_json::json!({
                    "nli_edge_label": nli_edge_label_to_str(*nli_edge_label),
                    "nli_edge_confidence_raw": nli_edge_confidence_raw,
                }),
            ),
            EdgeRelation::Cites { citation_context } => (
                "cites",
                serde_json::json!({ "citation_context": citation_context }),
            ),
        };

        sqlx::query(
            r#"
            INSERT INTO edges (id, source_id, target_id, relation_kind, relation_body, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(edge.id.0)
        .bind(&edge.source_id)
        .bind(&edge.target_id)
        .bind(kind)
        .bind(body)
        .bind(edge.created_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    pub async fn store_work(&self, work: &Work) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO works (id, doi, year, venue)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET doi = EXCLUDED.doi, year = EXCLUDED.year, venue = EXCLUDED.venue
            "#,
        )
        .bind(work.id.0)
        .bind(&work.doi)
        .bind(work.year)
        .bind(&work.venue)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    pub async fn edges_into(&self, target_id: &str) -> Result<Vec<EdgeRow>> {
        let rows = sqlx::query_as::<_, EdgeRow>("SELECT * FROM edges WHERE target_id = $1")
            .bind(target_id)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(rows)
    }

    pub async fn claims_for_task(&self, task_id: &str) -> Result<Vec<Claim>> {
        let rows = sqlx::query_as::<_, ClaimRow>("SELECT * FROM claims WHERE task_id = $1")
            .bind(task_id)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;
        rows.into_iter().map(Claim::try_from).collect()
    }
}

fn storage_err(err: sqlx::Error) -> GraphError {
    GraphError::Storage(Box::new(err))
}

fn trust_level_to_str(level: SourceTrustLevel) -> &'static str {
    match level {
        SourceTrustLevel::Primary => "primary",
        SourceTrustLevel::Government => "government",
        SourceTrustLevel::Academic => "academic",
        SourceTrustLevel::Trusted => "trusted",
        SourceTrustLevel::Low => "low",
        SourceTrustLevel::Unverified => "unverified",
        SourceTrustLevel::Blocked => "blocked",
    }
}

fn trust_level_from_str(s: &str) -> SourceTrustLevel {
    match s {
        "primary" => SourceTrustLevel::Primary,
        "government" => SourceTrustLevel::Government,
        "academic" => SourceTrustLevel::Academic,
        "trusted" => SourceTrustLevel::Trusted,
        "low" => SourceTrustLevel::Low,
        "blocked" => SourceTrustLevel::Blocked,
        _ => SourceTrustLevel::Unverified,
    }
}

fn fragment_type_to_str(kind: FragmentType) -> &'static str {
    match kind {
        FragmentType::Paragraph => "paragraph",
        FragmentType::Heading => "heading",
        FragmentType::List => "list",
        FragmentType::Table => "table",
        FragmentType::Quote => "quote",
        FragmentType::Figure => "figure",
        FragmentType::Code => "code",
    }
}

fn fragment_type_from_str(s: &str) -> FragmentType {
    match s {
        "heading" => FragmentType::Heading,
        "list" => FragmentType::List,
        "table" => FragmentType::Table,
        "quote" => FragmentType::Quote,
        "figure" => FragmentType::Figure,
        "code" => FragmentType::Code,
        _ => FragmentType::Paragraph,
    }
}

fn claim_confidence_source_to_str(source: ClaimConfidenceSource) -> &'static str {
    match source {
        ClaimConfidenceSource::BayesianAggregate => "bayesian_aggregate",
        ClaimConfidenceSource::LlmFallback => "llm_fallback",
    }
}

fn claim_confidence_source_from_str(s: &str) -> ClaimConfidenceSource {
    match s {
        "bayesian_aggregate" => ClaimConfidenceSource::BayesianAggregate,
        _ => ClaimConfidenceSource::LlmFallback,
    }
}

fn claim_adoption_status_to_str(status: ClaimAdoptionStatus) -> &'static str {
    match status {
        ClaimAdoptionStatus::Adopted => "adopted",
        ClaimAdoptionStatus::Rejected => "rejected",
        ClaimAdoptionStatus::Restored => "restored",
    }
}

fn claim_adoption_status_from_str(s: &str) -> ClaimAdoptionStatus {
    match s {
        "rejected" => ClaimAdoptionStatus::Rejected,
        "restored" => ClaimAdoptionStatus::Restored,
        _ => ClaimAdoptionStatus::Adopted,
    }
}

fn nli_edge_label_to_str(label: NliEdgeLabel) -> &'static str {
    match label {
        NliEdgeLabel::Supports => "supports",
        NliEdgeLabel::Refutes => "refutes",
        NliEdgeLabel::Neutral => "neutral",
    }
}

#[derive(Debug, FromRow)]
pub struct PageRow {
    id: Uuid,
    url: String,
    domain: String,
    content_type: String,
    fetched_at: DateTime<Utc>,
    source_trust_level: String,
    canonical_work: Option<Uuid>,
}

impl TryFrom<PageRow> for Page {
    type Error = GraphError;

    fn try_from(row: PageRow) -> Result<Self> {
        Ok(Page {
            id: PageId(row.id),
            url: row.url,
            domain: row.domain,
            content_type: row.content_type,
            fetched_at: row.fetched_at,
            source_trust_level: trust_level_from_str(&row.source_trust_level),
            canonical_work: row.canonical_work.map(WorkId),
        })
    }
}

#[derive(Debug, FromRow)]
pub struct FragmentRow {
    id: Uuid,
    page_id: Uuid,
    text_content: String,
    heading_context: Option<String>,
    heading_hierarchy: Json,
    element_index: i64,
    fragment_type: String,
}

impl TryFrom<FragmentRow> for Fragment {
    type Error = GraphError;

    fn try_from(row: FragmentRow) -> Result<Self> {
        Ok(Fragment {
            id: FragmentId(row.id),
            page_id: PageId(row.page_id),
            text_content: row.text_content,
            heading_context: row.heading_context,
            heading_hierarchy: serde_json::from_value(row.heading_hierarchy).unwrap_or_default(),
            element_index: row.element_index as usize,
            fragment_type: fragment_type_from_str(&row.fragment_type),
        })
    }
}

#[derive(Debug, FromRow)]
pub struct ClaimRow {
    id: Uuid,
    task_id: String,
    claim_text: String,
    llm_claim_confidence_raw: f32,
    bayes_claim_confidence: f32,
    claim_confidence_source: String,
    claim_adoption_status: String,
}

impl TryFrom<ClaimRow> for Claim {
    type Error = GraphError;

    fn try_from(row: ClaimRow) -> Result<Self> {
        Ok(Claim {
            id: ClaimId(row.id),
            task_id: row.task_id,
            claim_text: row.claim_text,
            llm_claim_confidence_raw: row.llm_claim_confidence_raw,
            bayes_claim_confidence: row.bayes_claim_confidence,
            claim_confidence_source: claim_confidence_source_from_str(&row.claim_confidence_source),
            claim_adoption_status: claim_adoption_status_from_str(&row.claim_adoption_status),
        })
    }
}

#[derive(Debug, FromRow)]
pub struct EdgeRow {
    pub id: Uuid,
    pub source_id: String,
    pub target_id: String,
    pub relation_kind: String,
    pub relation_body: Json,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<EdgeRow> for Edge {
    type Error = GraphError;

    fn try_from(row: EdgeRow) -> Result<Self> {
        let relation = match row.relation_kind.as_str() {
            "cites" => EdgeRelation::Cites {
                citation_context: row
                    .relation_body
                    .get("citation_context")
                    .and_then(|v| v.as_str())
                    .map(String::from),
            },
            _ => {
                let label_str = row
                    .relation_body
                    .get("nli_edge_label")
                    .and_then(|v| v.as_str())
                    .unwrap_or("neutral");
                let nli_edge_label = match label_str {
                    "supports" => NliEdgeLabel::Supports,
                    "refutes" => NliEdgeLabel::Refutes,
                    _ => NliEdgeLabel::Neutral,
                };
                let nli_edge_confidence_raw = row
                    .relation_body
                    .get("nli_edge_confidence_raw")
                    .and_then(|v| v.as_f64())
                    .unwrap_or(0.0) as f32;
                EdgeRelation::FragmentToClaim {
                    nli_edge_label,
                    nli_edge_confidence_raw,
                }
            }
        };

        Ok(Edge {
            id: EdgeId(row.id),
            source_id: row.source_id,
            target_id: row.target_id,
            relation,
            created_at: row.created_at,
        })
    }
}
