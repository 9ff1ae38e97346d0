//! Job definitions and priority ordering.

use seesaw::Command;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Resource slot a job contends for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Slot {
    /// embed / rerank / LLM / NLI — capacity 1, mutually exclusive with
    /// `BrowserHeadful`.
    Gpu,
    /// Headful browser rendering — capacity 1, mutually exclusive with
    /// `Gpu`.
    BrowserHeadful,
    /// HTTP fetch concurrency — capacity 4 globally, 1 per domain.
    NetworkClient,
    /// BM25 / rule-based NLI — capacity equal to available cores.
    CpuNlp,
}

/// Job kind, which determines both its slot and its priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobKind {
    Serp,
    Prefetch,
    Extract,
    Embed,
    Rerank,
    LlmFast,
    LlmSlow,
    /// Follow-up chain job queued after a `search_queue` completes.
    VerifyNli,
    CitationGraph,
}

impl JobKind {
    /// Higher runs sooner.
    pub fn priority(self) -> i32 {
        match self {
            JobKind::Serp => 100,
            JobKind::Prefetch => 90,
            JobKind::Extract => 80,
            JobKind::Embed => 70,
            JobKind::Rerank => 60,
            JobKind::LlmFast => 50,
            JobKind::LlmSlow => 40,
            // Chain jobs run in the background without starving the
            // strategist's own priority lanes.
            JobKind::VerifyNli => 30,
            JobKind::CitationGraph => 20,
        }
    }

    pub fn slot(self) -> Slot {
        match self {
            JobKind::Serp | JobKind::Prefetch | JobKind::Extract => Slot::NetworkClient,
            JobKind::Embed | JobKind::Rerank | JobKind::LlmFast | JobKind::LlmSlow => Slot::Gpu,
            JobKind::VerifyNli => Slot::CpuNlp,
            JobKind::CitationGraph => Slot::CpuNlp,
        }
    }
}

/// A unit of scheduled work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub task_id: String,
    pub search_id: Option<String>,
    pub kind: JobKind,
    /// Target domain, required for `NetworkClient` jobs (per-domain cap
    /// and breaker check apply only to those).
    pub domain: Option<String>,
    pub payload: serde_json::Value,
}

impl Job {
    pub fn new(task_id: impl Into<String>, kind: JobKind, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::now_v7(),
            task_id: task_id.into(),
            search_id: None,
            kind,
            domain: None,
            payload,
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_search_id(mut self, search_id: impl Into<String>) -> Self {
        self.search_id = Some(search_id.into());
        self
    }

    pub fn priority(&self) -> i32 {
        self.kind.priority()
    }

    pub fn slot(&self) -> Slot {
        self.kind.slot()
    }
}

impl Command for Job {
    // Scheduler jobs run inline under a slot permit; durable background
    // jobs (the job queue itself) is `research_engine`'s concern, not
    // this crate's.
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_order_matches_spec_table() {
        assert!(JobKind::Serp.priority() > JobKind::Prefetch.priority());
        assert!(JobKind::Prefetch.priority() > JobKind::Extract.priority());
        assert!(JobKind::Extract.priority() > JobKind::Embed.priority());
        assert!(JobKind::Embed.priority() > JobKind::Rerank.priority());
        assert!(JobKind::Rerank.priority() > JobKind::LlmFast.priority());
        assert!(JobKind::LlmFast.priority() > JobKind::LlmSlow.priority());
    }

    #[test]
    fn gpu_jobs_share_the_exclusive_slot() {
        assert_eq!(JobKind::Embed.slot(), Slot::Gpu);
        assert_eq!(JobKind::Rerank.slot(), Slot::Gpu);
        assert_eq!(JobKind::LlmFast.slot(), Slot::Gpu);
    }
}
