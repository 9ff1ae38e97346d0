//! Plain async handlers behind the control surface. Each takes
//! an [`EngineContext`] and a request DTO and returns a response DTO
//! or a [`ControlError`] — the HTTP layer in `bin/server.rs` is a thin
//! wrapper that only does (de)serialization and status-code mapping.

use std::sync::OnceLock;

use chrono::Utc;
use regex::Regex;
use uuid::Uuid;

use evidence_graph::ids::{ClaimId, FragmentId};
use evidence_graph::search::{cosine_similarity, hybrid_search};
use pipeline::Target;
use scheduler::job::{Job, JobKind};

use crate::auth_queue::session_for_domain;
use crate::error::{ControlError, ErrorCode, Result};
use crate::executor::SearchJobPayload;
use crate::state::EngineContext;
use crate::types::*;

fn url_domain(url: &str) -> Option<String> {
    url.split("://")
        .nth(1)
        .and_then(|rest| rest.split('/').next())
        .map(|host| host.to_lowercase())
}

/// Same shape `pipeline::effects` uses to spot a DOI inside fetched
/// text, reused here so a candidate whose kind wasn't recorded as
/// `Doi` (e.g. a caller-supplied `include_id`) still routes through
/// the academic fast path when it looks like one.
fn doi_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^10\.\d{4,9}/[-._;()/:A-Za-z0-9]+$").unwrap())
}

pub async fn create_task(ctx: &EngineContext, req: CreateTaskRequest) -> Result<CreateTaskResponse> {
    if req.hypothesis.trim().is_empty() {
        return Err(ControlError::new(ErrorCode::InvalidParams));
    }
    let task_id = Uuid::now_v7().to_string();
    let max_pages = req.max_pages.unwrap_or(ctx.config.default_task_max_pages);
    let max_seconds = req.max_seconds.unwrap_or(ctx.config.default_task_max_seconds);
    let task = Task {
        task_id: task_id.clone(),
        hypothesis: req.hypothesis,
        status: TaskStatus::Created,
        budget: TaskBudget {
            max_pages,
            max_seconds,
            max_llm_fraction: req.max_llm_fraction,
        },
        created_at: Utc::now(),
        metrics: TaskMetrics::default(),
    };
    ctx.store.create_task(&task).await?;
    ctx.scheduler
        .register_task_budget(task_id.clone(), max_pages, max_seconds.saturating_mul(1000));
    Ok(CreateTaskResponse { ok: true, task_id })
}

async fn queue_one_target(
    ctx: &EngineContext,
    task_id: &str,
    target: Target,
) -> Result<String> {
    let search_id = Uuid::now_v7().to_string();
    let query_text = match &target {
        Target::Query { text } => text.clone(),
        Target::Url { url, .. } => url.clone(),
        Target::Doi { doi, .. } => doi.clone(),
    };
    let search = Search {
        search_id: search_id.clone(),
        task_id: task_id.to_string(),
        query_text,
        status: SearchStatus::Queued,
        metrics: SearchMetrics::default(),
        created_at: Utc::now(),
    };
    ctx.store.create_search(&search).await?;

    let payload = SearchJobPayload {
        search_id: search_id.clone(),
        target: target.clone(),
    };
    let payload_json = serde_json::to_value(&payload)
        .map_err(|e| ControlError::with_detail(ErrorCode::Internal, e))?;
    let mut job = Job::new(task_id, JobKind::Serp, payload_json).with_search_id(search_id.clone());
    if let Target::Url { url, .. } = &target {
        if let Some(domain) = url_domain(url) {
            job = job.with_domain(domain);
        }
    }
    ctx.scheduler.submit(job).await;
    Ok(search_id)
}

pub async fn queue_targets(ctx: &EngineContext, req: QueueTargetsRequest) -> Result<QueueTargetsResponse> {
    ctx.store.load_task(&req.task_id).await?;
    let mut search_ids = Vec::with_capacity(req.targets.len());
    for target_req in req.targets {
        let target = match target_req {
            TargetRequest::Query { text } => Target::Query { text },
            TargetRequest::Url { url, reason } => Target::Url { url, reason },
            TargetRequest::Doi { doi, reason } => Target::Doi { doi, reason },
        };
        search_ids.push(queue_one_target(ctx, &req.task_id, target).await?);
    }
    ctx.store
        .update_task_status(&req.task_id, TaskStatus::Exploring)
        .await?;
    Ok(QueueTargetsResponse { ok: true, search_ids })
}

/// Queues citation targets `SearchResultTap` recorded from
/// `PipelineEvent::CitationsExpanded` against this task, honoring the
/// request's allow/deny lists and `dry_run`. DOI-shaped candidates are
/// queued as `Target::Doi` so they take the academic fast path;
/// everything else queues as `Target::Url`.
pub async fn queue_reference_candidates(
    ctx: &EngineContext,
    req: QueueReferenceCandidatesRequest,
) -> Result<QueueReferenceCandidatesResponse> {
    ctx.store.load_task(&req.task_id).await?;
    let mut queued = Vec::new();
    let mut skipped = Vec::new();

    let candidates = ctx.store.reference_candidates_for_task(&req.task_id).await?;
    let include = req.include_ids;
    let exclude: Vec<String> = req.exclude_ids.unwrap_or_default();

    let mut queued_ids = Vec::new();
    let mut skipped_ids = Vec::new();

    for candidate in candidates {
        if candidate.status != ReferenceCandidateStatus::Pending {
            continue;
        }
        let candidate_id = candidate.candidate_id.clone();
        if let Some(include) = &include {
            if !include.contains(&candidate_id) {
                continue;
            }
        }
        if exclude.contains(&candidate_id) {
            skipped.push(candidate_id.clone());
            skipped_ids.push(candidate_id);
            continue;
        }
        if req.dry_run {
            queued.push(candidate_id);
            continue;
        }

        let target = match (&candidate.doi, &candidate.url) {
            (Some(doi), _) => Target::Doi {
                doi: doi.clone(),
                reason: candidate.reason.clone(),
            },
            (None, Some(url)) if doi_re().is_match(url) => Target::Doi {
                doi: url.clone(),
                reason: candidate.reason.clone(),
            },
            (None, Some(url)) => Target::Url {
                url: url.clone(),
                reason: candidate.reason.clone(),
            },
            (None, None) => {
                skipped.push(candidate_id.clone());
                skipped_ids.push(candidate_id);
                continue;
            }
        };
        queue_one_target(ctx, &req.task_id, target).await?;
        queued.push(candidate_id.clone());
        queued_ids.push(candidate_id);
    }

    if !queued_ids.is_empty() {
        ctx.store
            .mark_reference_candidates(&queued_ids, ReferenceCandidateStatus::Queued)
            .await?;
    }
    if !skipped_ids.is_empty() {
        ctx.store
            .mark_reference_candidates(&skipped_ids, ReferenceCandidateStatus::Skipped)
            .await?;
    }

    Ok(QueueReferenceCandidatesResponse {
        ok: true,
        queued,
        skipped,
    })
}

pub async fn get_status(ctx: &EngineContext, req: GetStatusRequest) -> Result<GetStatusResponse> {
    let task = ctx.store.load_task(&req.task_id).await?;
    let searches = ctx.store.searches_for_task(&req.task_id).await?;

    let milestones = Milestones {
        target_queue_drained: searches
            .iter()
            .all(|s| !matches!(s.status, SearchStatus::Queued | SearchStatus::Running)),
        nli_verification_done: searches.iter().any(|s| s.metrics.useful_fragments > 0),
        citation_chase_ready: matches!(task.status, TaskStatus::Exploring | TaskStatus::Completed),
    };

    let stats = ctx.scheduler.stats();
    let phase_job_counts = PhaseJobCounts {
        exploration: *stats.get("queued").unwrap_or(&0),
        verification: *stats.get("running").unwrap_or(&0),
        citation: *stats.get("completed").unwrap_or(&0),
    };

    let stale = ctx
        .auth_queue
        .stale_items(&req.task_id, ctx.config.auth_wait_stale_after)
        .await?;
    let waiting_for = stale.iter().map(|item| item.domain.clone()).collect();

    let all_auth = ctx.auth_queue.items_for_task(&req.task_id).await?;
    let pending = all_auth
        .iter()
        .filter(|i| i.status == AuthQueueStatus::Pending)
        .count() as u64;

    let searches = if req.detail == StatusDetail::Summary {
        searches.into_iter().take(10).collect()
    } else {
        searches
    };

    Ok(GetStatusResponse {
        ok: true,
        task,
        searches,
        milestones,
        phase_job_counts,
        waiting_for,
        auth_queue: AuthQueueSummary {
            pending,
            stale: stale.len() as u64,
        },
    })
}

pub async fn stop_task(ctx: &EngineContext, req: StopTaskRequest) -> Result<StopTaskResponse> {
    let _ = ctx.store.load_task(&req.task_id).await?;

    let drain_scope = match req.scope {
        StopScope::SearchQueueOnly => scheduler::DrainScope::SearchQueueOnly,
        StopScope::AllJobs => scheduler::DrainScope::AllJobs,
    };

    match req.mode {
        // The scheduler exposes per-handle cancellation, not a bulk
        // cancel; immediate/full stop modes skip the wait rather than
        // forcing every in-flight job down, and let them finish on
        // their own.
        StopMode::Immediate | StopMode::Full => {}
        StopMode::Graceful => {
            ctx.scheduler.drain(drain_scope).await;
        }
    }

    let status = TaskStatus::Paused;
    ctx.store.update_task_status(&req.task_id, status).await?;
    tracing::info!(task_id = %req.task_id, reason = %req.reason, mode = ?req.mode, "task stopped");
    Ok(StopTaskResponse { ok: true, status })
}

pub async fn vector_search(ctx: &EngineContext, req: VectorSearchRequest) -> Result<VectorSearchResponse> {
    let query_embedding = ctx
        .gateway
        .embed(&req.query)
        .await
        .map_err(|e| ControlError::with_detail(ErrorCode::PipelineError, e))?;

    let hits = match req.target_type {
        VectorSearchTargetType::Claim => {
            let claims = ctx.graph.claims_for_task(&req.task_id).await?;
            let embeddings = ctx.store.embeddings_by_type("claim").await?;
            let mut scored: Vec<(String, f32, String)> = claims
                .into_iter()
                .filter_map(|claim| {
                    let id = claim.id.to_string();
                    embeddings
                        .iter()
                        .find(|(eid, _)| *eid == id)
                        .map(|(_, vec)| (id, cosine_similarity(&query_embedding, vec), claim.claim_text))
                })
                .collect();
            scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            scored
                .into_iter()
                .take(req.top_k)
                .map(|(id, score, text)| VectorSearchHit {
                    target_id: id,
                    score,
                    text,
                })
                .collect()
        }
        VectorSearchTargetType::Fragment => {
            let embeddings = ctx.store.embeddings_by_type("fragment").await?;
            let mut texts: Vec<(FragmentId, String)> = Vec::with_capacity(embeddings.len());
            let mut embedding_pairs = Vec::with_capacity(embeddings.len());
            for (id_str, vector) in embeddings {
                let Ok(uuid) = id_str.parse::<Uuid>() else { continue };
                let fragment_id = FragmentId(uuid);
                if let Ok(fragment) = ctx.graph.load_fragment(fragment_id).await {
                    texts.push((fragment_id, fragment.text_content));
                    embedding_pairs.push((fragment_id, vector));
                }
            }
            let text_refs: Vec<(FragmentId, &str)> =
                texts.iter().map(|(id, t)| (*id, t.as_str())).collect();
            let ranked = hybrid_search(
                &req.query,
                &query_embedding,
                &embedding_pairs,
                &text_refs,
                req.top_k,
                0.6,
            );
            ranked
                .into_iter()
                .filter_map(|hit| {
                    texts
                        .iter()
                        .find(|(id, _)| *id == hit.fragment_id)
                        .map(|(id, text)| VectorSearchHit {
                            target_id: id.to_string(),
                            score: hit.score,
                            text: text.clone(),
                        })
                })
                .collect()
        }
    };

    Ok(VectorSearchResponse { ok: true, hits })
}

/// Named read-only views over the task's durable state. The view
/// name is an allow-listed identifier, not an arbitrary query string.
pub async fn query_view(ctx: &EngineContext, req: QueryViewRequest) -> Result<QueryViewResponse> {
    let task_id = req
        .task_id
        .ok_or_else(|| ControlError::new(ErrorCode::InvalidParams))?;
    let limit = req.limit.unwrap_or(50).max(1) as usize;

    let rows = match req.view_name.as_str() {
        "searches" => {
            let searches = ctx.store.searches_for_task(&task_id).await?;
            searches
                .into_iter()
                .take(limit)
                .filter_map(|s| serde_json::to_value(s).ok())
                .collect()
        }
        "auth_queue" => {
            let items = ctx.auth_queue.items_for_task(&task_id).await?;
            items
                .into_iter()
                .take(limit)
                .filter_map(|i| serde_json::to_value(i).ok())
                .collect()
        }
        "contradictions" => {
            let contradictions = ctx.graph.find_contradictions(&task_id).await?;
            contradictions
                .into_iter()
                .take(limit)
                .filter_map(|c| serde_json::to_value(c).ok())
                .collect()
        }
        _ => return Err(ControlError::new(ErrorCode::InvalidParams)),
    };

    Ok(QueryViewResponse { ok: true, rows })
}

pub async fn resolve_auth(ctx: &EngineContext, req: ResolveAuthRequest) -> Result<ResolveAuthResponse> {
    let status = match req.action {
        ResolveAuthAction::Resolved => AuthQueueStatus::Resolved,
        ResolveAuthAction::Skipped => AuthQueueStatus::Skipped,
        ResolveAuthAction::Failed => AuthQueueStatus::Failed,
    };

    let unblocked_item_ids = match req.scope {
        ResolveAuthScope::Item => {
            let item_id = req
                .item_id
                .ok_or_else(|| ControlError::new(ErrorCode::InvalidParams))?;
            ctx.auth_queue
                .resolve_item(&item_id, status, req.session_json)
                .await?
        }
        ResolveAuthScope::Domain => {
            let domain = req
                .domain
                .ok_or_else(|| ControlError::new(ErrorCode::InvalidParams))?;
            ctx.auth_queue
                .resolve_domain(&req.task_id, &domain, status, req.session_json)
                .await?
        }
    };

    Ok(ResolveAuthResponse {
        ok: true,
        unblocked_item_ids,
    })
}

pub async fn get_auth_queue(ctx: &EngineContext, req: GetAuthQueueRequest) -> Result<GetAuthQueueResponse> {
    let items = ctx.auth_queue.items_for_task(&req.task_id).await?;
    Ok(GetAuthQueueResponse { ok: true, items })
}

/// Human feedback on a claim or search is recorded
/// as a calibration sample: a 1..5 rating against the claim's current
/// confidence, or against a search's satisfaction score.
pub async fn feedback(ctx: &EngineContext, req: FeedbackRequest) -> Result<FeedbackResponse> {
    if !(1..=5).contains(&req.rating) {
        return Err(ControlError::new(ErrorCode::InvalidParams));
    }
    let actual = (req.rating as f32 - 1.0) / 4.0;

    if let Some(claim_id) = &req.claim_id {
        let Ok(uuid) = claim_id.parse::<Uuid>() else {
            return Err(ControlError::new(ErrorCode::InvalidParams));
        };
        let claim = ctx.graph.load_claim(ClaimId(uuid)).await?;
        ctx.store
            .record_calibration_sample("nli", claim.bayes_claim_confidence, actual, req.note.as_deref())
            .await?;
    }
    if let Some(search_id) = &req.search_id {
        let search = ctx.store.load_search(search_id).await?;
        ctx.store
            .record_calibration_sample(
                "satisfaction",
                search.metrics.satisfaction_score,
                actual,
                req.note.as_deref(),
            )
            .await?;
    }

    Ok(FeedbackResponse { ok: true })
}

pub async fn calibration_metrics(
    ctx: &EngineContext,
    req: CalibrationMetricsRequest,
) -> Result<CalibrationMetricsResponse> {
    let active_version = ctx.store.active_calibration_version(&req.source).await?;
    let sample_count = ctx.store.calibration_sample_count(&req.source).await?;
    Ok(CalibrationMetricsResponse {
        ok: true,
        active_version,
        sample_count,
    })
}

pub async fn calibration_rollback(
    ctx: &EngineContext,
    req: CalibrationRollbackRequest,
) -> Result<CalibrationRollbackResponse> {
    ctx.store
        .activate_calibration_version(&req.source, req.to_version)
        .await?;
    tracing::warn!(source = %req.source, to_version = req.to_version, "calibration params rolled back");
    Ok(CalibrationRollbackResponse {
        ok: true,
        active_version: req.to_version,
    })
}

/// Looks up a previously-resolved domain session, for handlers that
/// need to hand the pipeline a reusable cookie jar rather than wait on
/// the auth queue again.
pub async fn reuse_domain_session(
    ctx: &EngineContext,
    task_id: &str,
    domain: &str,
) -> Result<Option<serde_json::Value>> {
    session_for_domain(&ctx.store, task_id, domain).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_domain_strips_scheme_and_path() {
        assert_eq!(
            url_domain("https://arxiv.org/abs/1234.5678"),
            Some("arxiv.org".to_string())
        );
        assert_eq!(
            url_domain("http://EXAMPLE.com/page?q=1"),
            Some("example.com".to_string())
        );
    }

    #[test]
    fn test_url_domain_bare_host_has_no_scheme_separator() {
        assert_eq!(url_domain("example.com/page"), None);
    }

    #[test]
    fn test_url_domain_no_path() {
        assert_eq!(url_domain("https://example.com"), Some("example.com".to_string()));
    }
}
