//! Durable Postgres store for the control surface's own entities:
//! `tasks`, `searches`, `intervention_queue`, `domains`, `jobs`,
//! `calibration_samples`/`calibration_params`, `embeddings`, and
//! `llm_extraction_errors`. `pages`/`fragments`/`claims`/`edges`/`works`
//! are owned by [`evidence_graph::store::GraphStore`] and are not
//! duplicated here.
//!
//! Tables are created with `CREATE TABLE IF NOT EXISTS` at startup,
//! the same forward-only, idempotent style
//! [`evidence_graph::store::GraphStore`] uses, rather than a
//! `sqlx::migrate!` directory — this crate's durable schema sits next
//! to that one and the two should bootstrap the same way.

use chrono::{DateTime, Utc};
use serde_json::Value as Json;
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use thiserror::Error;
use tracing::instrument;

use crate::types::{
    AuthQueueItem, AuthQueueStatus, AuthType, ReferenceCandidate, ReferenceCandidateStatus, Search,
    SearchMetrics, SearchStatus, Task, TaskBudget, TaskMetrics, TaskStatus,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("task not found: {0}")]
    TaskNotFound(String),
    #[error("search not found: {0}")]
    SearchNotFound(String),
    #[error("auth queue item not found: {0}")]
    AuthItemNotFound(String),
    #[error("storage error: {0}")]
    Storage(#[source] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

fn storage_err(err: sqlx::Error) -> StoreError {
    StoreError::Storage(err)
}

/// Durable store backing the control surface.
pub struct ResearchStore {
    pool: PgPool,
}

impl ResearchStore {
    pub async fn from_pool(pool: PgPool) -> Result<Self> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[instrument(skip(self))]
    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                hypothesis TEXT NOT NULL,
                status TEXT NOT NULL,
                budget_json JSONB NOT NULL,
                metrics_json JSONB NOT NULL DEFAULT '{}',
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS searches (
                id TEXT PRIMARY KEY,
                task_id TEXT NOT NULL REFERENCES tasks(id),
                query TEXT NOT NULL,
                status TEXT NOT NULL,
                metrics_json JSONB NOT NULL DEFAULT '{}',
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_searches_task_id ON searches(task_id)")
            .execute(&self.pool)
            .await
            .ok();

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS intervention_queue (
                id TEXT PRIMARY KEY,
                task_id TEXT NOT NULL REFERENCES tasks(id),
                domain TEXT NOT NULL,
                url TEXT NOT NULL,
                auth_type TEXT NOT NULL,
                priority INT NOT NULL DEFAULT 0,
                status TEXT NOT NULL,
                queued_at TIMESTAMPTZ NOT NULL,
                blocking_search_ids JSONB NOT NULL DEFAULT '[]',
                session_json JSONB
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_intervention_domain ON intervention_queue(task_id, domain, status)",
        )
        .execute(&self.pool)
        .await
        .ok();

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS domains (
                domain TEXT PRIMARY KEY,
                qps_max REAL NOT NULL DEFAULT 1.0,
                cooldown_until TIMESTAMPTZ,
                breaker_state TEXT NOT NULL DEFAULT 'closed',
                headful_ratio REAL NOT NULL DEFAULT 0.0,
                tor_success_rate REAL NOT NULL DEFAULT 0.0,
                captcha_rate REAL NOT NULL DEFAULT 0.0,
                block_score REAL NOT NULL DEFAULT 0.0
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id UUID PRIMARY KEY,
                task_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                slot TEXT NOT NULL,
                priority INT NOT NULL,
                state TEXT NOT NULL,
                cause_id UUID,
                created_at TIMESTAMPTZ NOT NULL,
                started_at TIMESTAMPTZ,
                finished_at TIMESTAMPTZ
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_task_id ON jobs(task_id)")
            .execute(&self.pool)
            .await
            .ok();

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS calibration_samples (
                id BIGSERIAL PRIMARY KEY,
                source TEXT NOT NULL,
                predicted REAL NOT NULL,
                actual REAL NOT NULL,
                context TEXT,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS calibration_params (
                source TEXT NOT NULL,
                version INT NOT NULL,
                params_json JSONB NOT NULL,
                active BOOLEAN NOT NULL DEFAULT FALSE,
                PRIMARY KEY (source, version)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS embeddings (
                target_id TEXT NOT NULL,
                target_type TEXT NOT NULL,
                vector JSONB NOT NULL,
                PRIMARY KEY (target_id, target_type)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS llm_extraction_errors (
                id BIGSERIAL PRIMARY KEY,
                task_id TEXT NOT NULL,
                passage_hash TEXT NOT NULL,
                error TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_llm_errors_passage ON llm_extraction_errors(task_id, passage_hash)",
        )
        .execute(&self.pool)
        .await
        .ok();

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS reference_candidates (
                id TEXT PRIMARY KEY,
                task_id TEXT NOT NULL REFERENCES tasks(id),
                search_id TEXT NOT NULL REFERENCES searches(id),
                doi TEXT,
                url TEXT,
                reason TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_reference_candidates_task ON reference_candidates(task_id, status)",
        )
        .execute(&self.pool)
        .await
        .ok();

        Ok(())
    }

    // --- tasks ---

    pub async fn create_task(&self, task: &Task) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tasks (id, hypothesis, status, budget_json, metrics_json, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&task.task_id)
        .bind(&task.hypothesis)
        .bind(task_status_to_str(task.status))
        .bind(serde_json::to_value(&task.budget).unwrap_or(Json::Null))
        .bind(serde_json::to_value(&task.metrics).unwrap_or(Json::Null))
        .bind(task.created_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    pub async fn load_task(&self, task_id: &str) -> Result<Task> {
        let row = sqlx::query_as::<_, TaskRow>("SELECT * FROM tasks WHERE id = $1")
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?
            .ok_or_else(|| StoreError::TaskNotFound(task_id.to_string()))?;
        row.try_into()
    }

    pub async fn update_task_status(&self, task_id: &str, status: TaskStatus) -> Result<()> {
        sqlx::query("UPDATE tasks SET status = $2 WHERE id = $1")
            .bind(task_id)
            .bind(task_status_to_str(status))
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    pub async fn update_task_metrics(&self, task_id: &str, metrics: &TaskMetrics) -> Result<()> {
        sqlx::query("UPDATE tasks SET metrics_json = $2 WHERE id = $1")
            .bind(task_id)
            .bind(serde_json::to_value(metrics).unwrap_or(Json::Null))
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    // --- searches ---

    pub async fn create_search(&self, search: &Search) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO searches (id, task_id, query, status, metrics_json, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&search.search_id)
        .bind(&search.task_id)
        .bind(&search.query_text)
        .bind(search_status_to_str(search.status))
        .bind(serde_json::to_value(&search.metrics).unwrap_or(Json::Null))
        .bind(search.created_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    pub async fn load_search(&self, search_id: &str) -> Result<Search> {
        let row = sqlx::query_as::<_, SearchRow>("SELECT * FROM searches WHERE id = $1")
            .bind(search_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?
            .ok_or_else(|| StoreError::SearchNotFound(search_id.to_string()))?;
        row.try_into()
    }

    pub async fn searches_for_task(&self, task_id: &str) -> Result<Vec<Search>> {
        let rows = sqlx::query_as::<_, SearchRow>(
            "SELECT * FROM searches WHERE task_id = $1 ORDER BY created_at ASC",
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    pub async fn update_search_status(&self, search_id: &str, status: SearchStatus) -> Result<()> {
        sqlx::query("UPDATE searches SET status = $2 WHERE id = $1")
            .bind(search_id)
            .bind(search_status_to_str(status))
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    pub async fn update_search_metrics(&self, search_id: &str, metrics: &SearchMetrics) -> Result<()> {
        sqlx::query("UPDATE searches SET metrics_json = $2 WHERE id = $1")
            .bind(search_id)
            .bind(serde_json::to_value(metrics).unwrap_or(Json::Null))
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    // --- auth-wait queue ---

    pub async fn enqueue_auth_item(&self, item: &AuthQueueItem) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO intervention_queue
                (id, task_id, domain, url, auth_type, priority, status, queued_at, blocking_search_ids, session_json)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(&item.item_id)
        .bind(&item.task_id)
        .bind(&item.domain)
        .bind(&item.url)
        .bind(auth_type_to_str(item.auth_type))
        .bind(item.priority)
        .bind(auth_status_to_str(item.status))
        .bind(item.queued_at)
        .bind(serde_json::to_value(&item.blocking_search_ids).unwrap_or(Json::Null))
        .bind(&item.session_json)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    /// All pending items for a domain, within one task — the unit
    /// `resolve_auth(scope=domain)` fans out over.
    pub async fn pending_auth_items_for_domain(
        &self,
        task_id: &str,
        domain: &str,
    ) -> Result<Vec<AuthQueueItem>> {
        let rows = sqlx::query_as::<_, AuthItemRow>(
            "SELECT * FROM intervention_queue WHERE task_id = $1 AND domain = $2 AND status = 'pending'",
        )
        .bind(task_id)
        .bind(domain)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    pub async fn auth_items_for_task(&self, task_id: &str) -> Result<Vec<AuthQueueItem>> {
        let rows = sqlx::query_as::<_, AuthItemRow>(
            "SELECT * FROM intervention_queue WHERE task_id = $1 ORDER BY queued_at ASC",
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    pub async fn resolve_auth_item(
        &self,
        item_id: &str,
        status: AuthQueueStatus,
        session_json: Option<Json>,
    ) -> Result<()> {
        sqlx::query("UPDATE intervention_queue SET status = $2, session_json = COALESCE($3, session_json) WHERE id = $1")
            .bind(item_id)
            .bind(auth_status_to_str(status))
            .bind(session_json)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    // --- reference candidates ---

    /// Persists one round of citation targets surfaced by
    /// `PipelineEvent::CitationsExpanded`. Each row's `id` is the
    /// DOI or URL string itself, so re-persisting the same target
    /// (a search re-expanding the same reference) overwrites rather
    /// than duplicates.
    pub async fn record_reference_candidates(
        &self,
        candidates: &[ReferenceCandidate],
    ) -> Result<()> {
        for candidate in candidates {
            sqlx::query(
                r#"
                INSERT INTO reference_candidates
                    (id, task_id, search_id, doi, url, reason, status, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (id) DO UPDATE SET
                    search_id = EXCLUDED.search_id,
                    reason = EXCLUDED.reason
                "#,
            )
            .bind(&candidate.candidate_id)
            .bind(&candidate.task_id)
            .bind(&candidate.search_id)
            .bind(&candidate.doi)
            .bind(&candidate.url)
            .bind(&candidate.reason)
            .bind(reference_candidate_status_to_str(candidate.status))
            .bind(candidate.created_at)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        }
        Ok(())
    }

    pub async fn reference_candidates_for_task(&self, task_id: &str) -> Result<Vec<ReferenceCandidate>> {
        let rows = sqlx::query_as::<_, ReferenceCandidateRow>(
            "SELECT * FROM reference_candidates WHERE task_id = $1 ORDER BY created_at ASC",
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    pub async fn mark_reference_candidates(
        &self,
        candidate_ids: &[String],
        status: ReferenceCandidateStatus,
    ) -> Result<()> {
        sqlx::query("UPDATE reference_candidates SET status = $2 WHERE id = ANY($1)")
            .bind(candidate_ids)
            .bind(reference_candidate_status_to_str(status))
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    // --- embeddings cache ---

    pub async fn store_embedding(&self, target_id: &str, target_type: &str, vector: &[f32]) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO embeddings (target_id, target_type, vector)
            VALUES ($1, $2, $3)
            ON CONFLICT (target_id, target_type) DO UPDATE SET vector = EXCLUDED.vector
            "#,
        )
        .bind(target_id)
        .bind(target_type)
        .bind(serde_json::to_value(vector).unwrap_or(Json::Null))
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    pub async fn embeddings_by_type(&self, target_type: &str) -> Result<Vec<(String, Vec<f32>)>> {
        let rows: Vec<(String, Json)> =
            sqlx::query_as("SELECT target_id, vector FROM embeddings WHERE target_type = $1")
                .bind(target_type)
                .fetch_all(&self.pool)
                .await
                .map_err(storage_err)?;
        Ok(rows
            .into_iter()
            .map(|(id, v)| (id, serde_json::from_value(v).unwrap_or_default()))
            .collect())
    }

    // --- calibration ---

    pub async fn record_calibration_sample(
        &self,
        source: &str,
        predicted: f32,
        actual: f32,
        context: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO calibration_samples (source, predicted, actual, context, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(source)
        .bind(predicted)
        .bind(actual)
        .bind(context)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    pub async fn calibration_sample_count(&self, source: &str) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM calibration_samples WHERE source = $1")
            .bind(source)
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(count as u64)
    }

    pub async fn active_calibration_version(&self, source: &str) -> Result<i32> {
        let version: Option<i32> = sqlx::query_scalar(
            "SELECT version FROM calibration_params WHERE source = $1 AND active = TRUE",
        )
        .bind(source)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(version.unwrap_or(0))
    }

    pub async fn activate_calibration_version(&self, source: &str, version: i32) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;
        sqlx::query("UPDATE calibration_params SET active = FALSE WHERE source = $1")
            .bind(source)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
        sqlx::query("UPDATE calibration_params SET active = TRUE WHERE source = $1 AND version = $2")
            .bind(source)
            .bind(version)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
        tx.commit().await.map_err(storage_err)?;
        Ok(())
    }

    // --- llm extraction errors ---

    pub async fn record_llm_extraction_error(
        &self,
        task_id: &str,
        passage_hash: &str,
        error: &str,
    ) -> Result<u64> {
        sqlx::query(
            "INSERT INTO llm_extraction_errors (task_id, passage_hash, error, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(task_id)
        .bind(passage_hash)
        .bind(error)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM llm_extraction_errors WHERE task_id = $1 AND passage_hash = $2",
        )
        .bind(task_id)
        .bind(passage_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(count as u64)
    }
}

fn task_status_to_str(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Created => "created",
        TaskStatus::Exploring => "exploring",
        TaskStatus::Paused => "paused",
        TaskStatus::Completed => "completed",
        TaskStatus::Failed => "failed",
    }
}

fn task_status_from_str(s: &str) -> TaskStatus {
    match s {
        "exploring" => TaskStatus::Exploring,
        "paused" => TaskStatus::Paused,
        "completed" => TaskStatus::Completed,
        "failed" => TaskStatus::Failed,
        _ => TaskStatus::Created,
    }
}

fn search_status_to_str(status: SearchStatus) -> &'static str {
    match status {
        SearchStatus::Queued => "queued",
        SearchStatus::Running => "running",
        SearchStatus::Satisfied => "satisfied",
        SearchStatus::Partial => "partial",
        SearchStatus::Exhausted => "exhausted",
        SearchStatus::Failed => "failed",
    }
}

fn search_status_from_str(s: &str) -> SearchStatus {
    match s {
        "running" => SearchStatus::Running,
        "satisfied" => SearchStatus::Satisfied,
        "partial" => SearchStatus::Partial,
        "exhausted" => SearchStatus::Exhausted,
        "failed" => SearchStatus::Failed,
        _ => SearchStatus::Queued,
    }
}

fn auth_type_to_str(auth_type: AuthType) -> &'static str {
    match auth_type {
        AuthType::Cloudflare => "cloudflare",
        AuthType::Captcha => "captcha",
        AuthType::Login => "login",
        AuthType::Turnstile => "turnstile",
        AuthType::Other => "other",
    }
}

fn auth_type_from_str(s: &str) -> AuthType {
    match s {
        "cloudflare" => AuthType::Cloudflare,
        "captcha" => AuthType::Captcha,
        "login" => AuthType::Login,
        "turnstile" => AuthType::Turnstile,
        _ => AuthType::Other,
    }
}

fn auth_status_to_str(status: AuthQueueStatus) -> &'static str {
    match status {
        AuthQueueStatus::Pending => "pending",
        AuthQueueStatus::Resolved => "resolved",
        AuthQueueStatus::Skipped => "skipped",
        AuthQueueStatus::Failed => "failed",
    }
}

fn auth_status_from_str(s: &str) -> AuthQueueStatus {
    match s {
        "resolved" => AuthQueueStatus::Resolved,
        "skipped" => AuthQueueStatus::Skipped,
        "failed" => AuthQueueStatus::Failed,
        _ => AuthQueueStatus::Pending,
    }
}

fn reference_candidate_status_to_str(status: ReferenceCandidateStatus) -> &'static str {
    match status {
        ReferenceCandidateStatus::Pending => "pending",
        ReferenceCandidateStatus::Queued => "queued",
        ReferenceCandidateStatus::Skipped => "skipped",
    }
}

fn reference_candidate_status_from_str(s: &str) -> ReferenceCandidateStatus {
    match s {
        "queued" => ReferenceCandidateStatus::Queued,
        "skipped" => ReferenceCandidateStatus::Skipped,
        _ => ReferenceCandidateStatus::Pending,
    }
}

#[derive(FromRow)]
struct TaskRow {
    id: String,
    hypothesis: String,
    status: String,
    budget_json: Json,
    metrics_json: Json,
    created_at: DateTime<Utc>,
}

impl TryFrom<TaskRow> for Task {
    type Error = StoreError;

    fn try_from(row: TaskRow) -> Result<Self> {
        Ok(Task {
            task_id: row.id,
            hypothesis: row.hypothesis,
            status: task_status_from_str(&row.status),
            budget: serde_json::from_value(row.budget_json).unwrap_or(TaskBudget {
                max_pages: 40,
                max_seconds: 1800,
                max_llm_fraction: None,
            }),
            metrics: serde_json::from_value(row.metrics_json).unwrap_or_default(),
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct SearchRow {
    id: String,
    task_id: String,
    query: String,
    status: String,
    metrics_json: Json,
    created_at: DateTime<Utc>,
}

impl TryFrom<SearchRow> for Search {
    type Error = StoreError;

    fn try_from(row: SearchRow) -> Result<Self> {
        Ok(Search {
            search_id: row.id,
            task_id: row.task_id,
            query_text: row.query,
            status: search_status_from_str(&row.status),
            metrics: serde_json::from_value(row.metrics_json).unwrap_or_default(),
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct AuthItemRow {
    id: String,
    task_id: String,
    domain: String,
    url: String,
    auth_type: String,
    priority: i32,
    status: String,
    queued_at: DateTime<Utc>,
    blocking_search_ids: Json,
    session_json: Option<Json>,
}

impl TryFrom<AuthItemRow> for AuthQueueItem {
    type Error = StoreError;

    fn try_from(row: AuthItemRow) -> Result<Self> {
        Ok(AuthQueueItem {
            item_id: row.id,
            task_id: row.task_id,
            url: row.url,
            domain: row.domain,
            auth_type: auth_type_from_str(&row.auth_type),
            priority: row.priority,
            queued_at: row.queued_at,
            blocking_search_ids: serde_json::from_value(row.blocking_search_ids).unwrap_or_default(),
            status: auth_status_from_str(&row.status),
            session_json: row.session_json,
        })
    }
}

#[derive(FromRow)]
struct ReferenceCandidateRow {
    id: String,
    task_id: String,
    search_id: String,
    doi: Option<String>,
    url: Option<String>,
    reason: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ReferenceCandidateRow> for ReferenceCandidate {
    type Error = StoreError;

    fn try_from(row: ReferenceCandidateRow) -> Result<Self> {
        Ok(ReferenceCandidate {
            candidate_id: row.id,
            task_id: row.task_id,
            search_id: row.search_id,
            doi: row.doi,
            url: row.url,
            reason: row.reason,
            status: reference_candidate_status_from_str(&row.status),
            created_at: row.created_at,
        })
    }
}
