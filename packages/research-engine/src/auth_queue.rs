//! Auth-wait queue: a blocked fetch becomes a deferred item
//! here rather than a failure. `resolve` fans a domain-level
//! resolution out to every pending item of that host, and installs
//! the provided session for the rungs that reuse it.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::error::{ControlError, ErrorCode, Result};
use crate::store::ResearchStore;
use crate::types::{AuthQueueItem, AuthQueueStatus, AuthType};

/// Thin domain layer over [`ResearchStore`]'s `intervention_queue`
/// rows, giving domain-level fan-out resolution a single call site.
pub struct AuthWaitQueue {
    store: Arc<ResearchStore>,
}

impl AuthWaitQueue {
    pub fn new(store: Arc<ResearchStore>) -> Self {
        Self { store }
    }

    /// Called when the pipeline reports an `AuthRequired` outcome
    /// from the fetch step. The current rung is already released by
    /// the caller; this only records the deferral.
    pub async fn enqueue(
        &self,
        task_id: &str,
        domain: &str,
        url: &str,
        auth_type: AuthType,
        blocking_search_id: &str,
    ) -> Result<AuthQueueItem> {
        let item = AuthQueueItem {
            item_id: Uuid::now_v7().to_string(),
            task_id: task_id.to_string(),
            url: url.to_string(),
            domain: domain.to_string(),
            auth_type,
            priority: 0,
            queued_at: Utc::now(),
            blocking_search_ids: vec![blocking_search_id.to_string()],
            status: AuthQueueStatus::Pending,
            session_json: None,
        };
        self.store.enqueue_auth_item(&item).await?;
        Ok(item)
    }

    /// Resolves a single item.
    pub async fn resolve_item(
        &self,
        item_id: &str,
        status: AuthQueueStatus,
        session_json: Option<serde_json::Value>,
    ) -> Result<Vec<String>> {
        self.store
            .resolve_auth_item(item_id, status, session_json)
            .await?;
        Ok(vec![item_id.to_string()])
    }

    /// Resolves every pending item of `domain` within `task_id`.
    /// Returns the unblocked item ids.
    pub async fn resolve_domain(
        &self,
        task_id: &str,
        domain: &str,
        status: AuthQueueStatus,
        session_json: Option<serde_json::Value>,
    ) -> Result<Vec<String>> {
        let pending = self.store.pending_auth_items_for_domain(task_id, domain).await?;
        let mut unblocked = Vec::with_capacity(pending.len());
        for item in pending {
            self.store
                .resolve_auth_item(&item.item_id, status, session_json.clone())
                .await?;
            unblocked.push(item.item_id);
        }
        Ok(unblocked)
    }

    pub async fn items_for_task(&self, task_id: &str) -> Result<Vec<AuthQueueItem>> {
        Ok(self.store.auth_items_for_task(task_id).await?)
    }

    /// Pending items untouched for longer than `stale_after` — what
    /// `get_status.waiting_for` surfaces.
    pub async fn stale_items(&self, task_id: &str, stale_after: Duration) -> Result<Vec<AuthQueueItem>> {
        let now = Utc::now();
        let items = self.store.auth_items_for_task(task_id).await?;
        Ok(items
            .into_iter()
            .filter(|item| item.status == AuthQueueStatus::Pending)
            .filter(|item| {
                now.signed_duration_since(item.queued_at)
                    .to_std()
                    .map(|age| age >= stale_after)
                    .unwrap_or(false)
            })
            .collect())
    }
}

/// Looks up the reusable session cookies installed by a prior
/// domain-level `resolve_auth`, if any.
pub async fn session_for_domain(
    store: &ResearchStore,
    task_id: &str,
    domain: &str,
) -> Result<Option<serde_json::Value>> {
    let items = store.auth_items_for_task(task_id).await?;
    Ok(items
        .into_iter()
        .filter(|item| item.domain == domain && item.status == AuthQueueStatus::Resolved)
        .filter_map(|item| item.session_json)
        .last())
}

pub(crate) fn require_domain(domain: Option<String>) -> Result<String> {
    domain.ok_or_else(|| ControlError::new(ErrorCode::InvalidParams))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_domain_some() {
        assert_eq!(require_domain(Some("example.com".to_string())).unwrap(), "example.com");
    }

    #[test]
    fn test_require_domain_none_is_invalid_params() {
        let err = require_domain(None).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParams);
    }
}
