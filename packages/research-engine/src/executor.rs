//! Bridges the scheduler's slot-admission loop to the pipeline's
//! per-search machine: a `Serp` job is the unit the scheduler admits;
//! once admitted, this executor
//! drives the whole plan→fetch→extract→rank→classify→finalize chain
//! inline by awaiting the pipeline engine's own correlation, so the
//! pipeline's internal fetch/rank/classify steps are never re-wrapped
//! in their own scheduler jobs.

use std::sync::Arc;

use async_trait::async_trait;
use seesaw::EngineHandle;
use tokio_util::sync::CancellationToken;

use pipeline::{PipelineEvent, Target};
use scheduler::error::{Result, SchedulerError};
use scheduler::job::{Job, JobKind};
use scheduler::JobExecutor;

/// Payload shape for a `JobKind::Serp` job — one queued search.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SearchJobPayload {
    pub search_id: String,
    pub target: Target,
}

pub struct PipelineJobExecutor {
    pipeline: Arc<EngineHandle>,
}

impl PipelineJobExecutor {
    pub fn new(pipeline: Arc<EngineHandle>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl JobExecutor for PipelineJobExecutor {
    async fn execute(&self, job: &Job, cancel: CancellationToken) -> Result<Vec<Job>> {
        if job.kind != JobKind::Serp {
            // Embed/rerank/extract/llm legs run as part of the
            // pipeline's own correlated chain, not as standalone
            // scheduler jobs (see module docs); nothing else to do.
            return Ok(Vec::new());
        }

        let payload: SearchJobPayload = serde_json::from_value(job.payload.clone())
            .map_err(|e| SchedulerError::ExecutionFailed(e.to_string()))?;

        if cancel.is_cancelled() {
            return Err(SchedulerError::Cancelled);
        }

        self.pipeline
            .emit_and_await(PipelineEvent::SearchQueued {
                search_id: payload.search_id,
                task_id: job.task_id.clone(),
                target: payload.target,
            })
            .await
            .map_err(|e| SchedulerError::ExecutionFailed(e.to_string()))?;

        Ok(Vec::new())
    }
}
