//! Read-model [`seesaw::EventTap`] over [`PipelineEvent`]: updates this
//! crate's own `searches`/`intervention_queue` rows from the facts the
//! pipeline commits, without inserting this crate into the pipeline's
//! decide/execute loop (taps observe, they don't decide or mutate the
//! pipeline's own state — see `seesaw::tap`'s doc comment).

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use seesaw::{EventTap, TapContext};

use crate::auth_queue::AuthWaitQueue;
use crate::store::ResearchStore;
use crate::types::{AuthType, ReferenceCandidate, ReferenceCandidateStatus, SearchStatus};
use pipeline::{PipelineEvent, SearchOutcome, Target};

pub struct SearchResultTap {
    store: Arc<ResearchStore>,
    auth_queue: Arc<AuthWaitQueue>,
}

impl SearchResultTap {
    pub fn new(store: Arc<ResearchStore>, auth_queue: Arc<AuthWaitQueue>) -> Self {
        Self { store, auth_queue }
    }
}

fn convert_auth_type(auth_type: fetcher::AuthType) -> AuthType {
    match auth_type {
        fetcher::AuthType::Cloudflare => AuthType::Cloudflare,
        fetcher::AuthType::Captcha => AuthType::Captcha,
        fetcher::AuthType::Login => AuthType::Login,
        fetcher::AuthType::Turnstile => AuthType::Turnstile,
        fetcher::AuthType::Other => AuthType::Other,
    }
}

fn convert_outcome(outcome: SearchOutcome) -> SearchStatus {
    match outcome {
        SearchOutcome::Satisfied => SearchStatus::Satisfied,
        SearchOutcome::Exhausted => SearchStatus::Exhausted,
        SearchOutcome::Partial => SearchStatus::Partial,
    }
}

#[async_trait]
impl EventTap<PipelineEvent> for SearchResultTap {
    async fn on_event(&self, event: &PipelineEvent, _ctx: &TapContext) -> anyhow::Result<()> {
        match event {
            PipelineEvent::PagesFetched {
                search_id,
                pages,
                auth_required,
            } => {
                if let Ok(mut search) = self.store.load_search(search_id).await {
                    search.metrics.pages_fetched += pages.len() as u32;
                    self.store
                        .update_search_metrics(search_id, &search.metrics)
                        .await
                        .ok();
                }
                for item in auth_required {
                    if let Ok(search) = self.store.load_search(search_id).await {
                        self.auth_queue
                            .enqueue(
                                &search.task_id,
                                &item.domain,
                                &item.url,
                                convert_auth_type(item.auth_type),
                                search_id,
                            )
                            .await
                            .ok();
                    }
                }
            }
            PipelineEvent::ClaimsIngested {
                search_id,
                independent_supporting_total,
                ..
            } => {
                if let Ok(mut search) = self.store.load_search(search_id).await {
                    search.metrics.useful_fragments =
                        (*independent_supporting_total) as u32;
                    self.store
                        .update_search_metrics(search_id, &search.metrics)
                        .await
                        .ok();
                }
            }
            PipelineEvent::CitationsExpanded {
                search_id,
                new_targets,
            } => {
                let Ok(search) = self.store.load_search(search_id).await else {
                    return Ok(());
                };
                let candidates: Vec<ReferenceCandidate> = new_targets
                    .iter()
                    .filter_map(|target| match target {
                        Target::Url { url, reason } => Some(ReferenceCandidate {
                            candidate_id: url.clone(),
                            task_id: search.task_id.clone(),
                            search_id: search_id.clone(),
                            doi: None,
                            url: Some(url.clone()),
                            reason: reason.clone(),
                            status: ReferenceCandidateStatus::Pending,
                            created_at: Utc::now(),
                        }),
                        Target::Doi { doi, reason } => Some(ReferenceCandidate {
                            candidate_id: doi.clone(),
                            task_id: search.task_id.clone(),
                            search_id: search_id.clone(),
                            doi: Some(doi.clone()),
                            url: None,
                            reason: reason.clone(),
                            status: ReferenceCandidateStatus::Pending,
                            created_at: Utc::now(),
                        }),
                        Target::Query { .. } => None,
                    })
                    .collect();
                if !candidates.is_empty() {
                    self.store.record_reference_candidates(&candidates).await.ok();
                }
            }
            PipelineEvent::SearchFinalized {
                search_id,
                outcome,
                metrics,
            } => {
                let status = convert_outcome(*outcome);
                self.store.update_search_status(search_id, status).await.ok();
                if let Ok(mut search) = self.store.load_search(search_id).await {
                    search.metrics.pages_fetched = metrics.pages_fetched;
                    search.metrics.harvest_rate = metrics.harvest_rate;
                    search.metrics.novelty_score = metrics.novelty_score;
                    search.metrics.has_primary_source = metrics.has_primary_source;
                    if matches!(outcome, SearchOutcome::Satisfied) {
                        search.metrics.satisfaction_score = 1.0;
                    }
                    self.store
                        .update_search_metrics(search_id, &search.metrics)
                        .await
                        .ok();
                }
            }
            _ => {}
        }
        Ok(())
    }
}
