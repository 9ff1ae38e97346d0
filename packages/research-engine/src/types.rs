//! Durable entity shapes and the request/response DTOs every
//! control-surface handler takes and returns. All are plain
//! serde records — allow-list validation happens at construction, not
//! by trusting an open-ended JSON blob.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Created,
    Exploring,
    Paused,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskBudget {
    pub max_pages: u32,
    pub max_seconds: u64,
    pub max_llm_fraction: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TaskMetrics {
    pub pages_used: u32,
    pub total_claims: u64,
    pub llm_millis_used: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub hypothesis: String,
    pub status: TaskStatus,
    pub budget: TaskBudget,
    pub created_at: DateTime<Utc>,
    pub metrics: TaskMetrics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    Queued,
    Running,
    Satisfied,
    Partial,
    Exhausted,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SearchMetrics {
    pub pages_fetched: u32,
    pub useful_fragments: u32,
    pub harvest_rate: f32,
    pub satisfaction_score: f32,
    pub novelty_score: f32,
    pub has_primary_source: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Search {
    pub search_id: String,
    pub task_id: String,
    pub query_text: String,
    pub status: SearchStatus,
    pub metrics: SearchMetrics,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    Cloudflare,
    Captcha,
    Login,
    Turnstile,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthQueueStatus {
    Pending,
    Resolved,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthQueueItem {
    pub item_id: String,
    pub task_id: String,
    pub url: String,
    pub domain: String,
    pub auth_type: AuthType,
    pub priority: i32,
    pub queued_at: DateTime<Utc>,
    pub blocking_search_ids: Vec<String>,
    pub status: AuthQueueStatus,
    pub session_json: Option<serde_json::Value>,
}

// --- control-surface request/response DTOs ---

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTaskRequest {
    pub hypothesis: String,
    pub max_pages: Option<u32>,
    pub max_seconds: Option<u64>,
    pub max_llm_fraction: Option<f32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateTaskResponse {
    pub ok: bool,
    pub task_id: String,
}

/// One of the three shapes `queue_targets` accepts. Raw
/// strings are never accepted.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetRequest {
    Query { text: String },
    Url { url: String, reason: String },
    Doi { doi: String, reason: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueTargetsRequest {
    pub task_id: String,
    pub targets: Vec<TargetRequest>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueTargetsResponse {
    pub ok: bool,
    pub search_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceCandidateStatus {
    Pending,
    Queued,
    Skipped,
}

/// One citation target surfaced by `PipelineEvent::CitationsExpanded`,
/// held here until `queue_reference_candidates` decides what to do
/// with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceCandidate {
    pub candidate_id: String,
    pub task_id: String,
    pub search_id: String,
    pub doi: Option<String>,
    pub url: Option<String>,
    pub reason: String,
    pub status: ReferenceCandidateStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueReferenceCandidatesRequest {
    pub task_id: String,
    pub include_ids: Option<Vec<String>>,
    pub exclude_ids: Option<Vec<String>>,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueReferenceCandidatesResponse {
    pub ok: bool,
    pub queued: Vec<String>,
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusDetail {
    Summary,
    Full,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetStatusRequest {
    pub task_id: String,
    #[serde(default = "default_status_detail")]
    pub detail: StatusDetail,
}

fn default_status_detail() -> StatusDetail {
    StatusDetail::Summary
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct Milestones {
    pub target_queue_drained: bool,
    pub nli_verification_done: bool,
    pub citation_chase_ready: bool,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct PhaseJobCounts {
    pub exploration: u64,
    pub verification: u64,
    pub citation: u64,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct AuthQueueSummary {
    pub pending: u64,
    pub stale: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GetStatusResponse {
    pub ok: bool,
    pub task: Task,
    pub searches: Vec<Search>,
    pub milestones: Milestones,
    pub phase_job_counts: PhaseJobCounts,
    pub waiting_for: Vec<String>,
    pub auth_queue: AuthQueueSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopMode {
    Graceful,
    Immediate,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopScope {
    SearchQueueOnly,
    AllJobs,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StopTaskRequest {
    pub task_id: String,
    pub reason: String,
    pub mode: StopMode,
    pub scope: StopScope,
}

#[derive(Debug, Clone, Serialize)]
pub struct StopTaskResponse {
    pub ok: bool,
    pub status: TaskStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorSearchTargetType {
    Fragment,
    Claim,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VectorSearchRequest {
    pub task_id: String,
    pub query: String,
    pub top_k: usize,
    pub target_type: VectorSearchTargetType,
}

#[derive(Debug, Clone, Serialize)]
pub struct VectorSearchHit {
    pub target_id: String,
    pub score: f32,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VectorSearchResponse {
    pub ok: bool,
    pub hits: Vec<VectorSearchHit>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryViewRequest {
    pub view_name: String,
    pub task_id: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryViewResponse {
    pub ok: bool,
    pub rows: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveAuthScope {
    Item,
    Domain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveAuthAction {
    Resolved,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolveAuthRequest {
    pub task_id: String,
    pub scope: ResolveAuthScope,
    pub action: ResolveAuthAction,
    /// Required when `scope == item`.
    pub item_id: Option<String>,
    /// Required when `scope == domain`.
    pub domain: Option<String>,
    pub session_json: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolveAuthResponse {
    pub ok: bool,
    pub unblocked_item_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetAuthQueueRequest {
    pub task_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GetAuthQueueResponse {
    pub ok: bool,
    pub items: Vec<AuthQueueItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackRequest {
    pub task_id: String,
    pub claim_id: Option<String>,
    pub search_id: Option<String>,
    pub rating: i32,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedbackResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalibrationMetricsRequest {
    pub source: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CalibrationMetricsResponse {
    pub ok: bool,
    pub active_version: i32,
    pub sample_count: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalibrationRollbackRequest {
    pub source: String,
    pub to_version: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CalibrationRollbackResponse {
    pub ok: bool,
    pub active_version: i32,
}
