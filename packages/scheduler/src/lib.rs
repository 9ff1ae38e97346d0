//! Slot-admission job scheduler: priority dequeue, per-slot
//! concurrency caps, mutual exclusion, budget guards, and chain jobs.

pub mod budget;
pub mod error;
pub mod events;
pub mod job;
pub mod queue;
pub mod slots;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use seesaw::EventBus;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use budget::TaskBudget;
use domain_policy::DomainPolicyStore;
use error::{Result, SchedulerError};
use events::ScheduleEvent;
use job::{Job, Slot};
use queue::{Admission, JobQueue, PopResult};
use slots::SlotAdmission;

/// Observed lifecycle state of a submitted job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

/// Handle returned from [`Scheduler::submit`], watchable for status
/// changes and usable to request cancellation.
#[derive(Clone)]
pub struct JobHandle {
    pub job_id: Uuid,
    status: watch::Receiver<JobStatus>,
    cancel: CancellationToken,
}

impl JobHandle {
    pub fn status(&self) -> JobStatus {
        *self.status.borrow()
    }

    pub async fn wait_terminal(&mut self) -> JobStatus {
        loop {
            let status = *self.status.borrow();
            if matches!(status, JobStatus::Completed | JobStatus::Failed) {
                return status;
            }
            if self.status.changed().await.is_err() {
                return *self.status.borrow();
            }
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// Aggregate counts across the scheduler's lifetime, for observability.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    pub queued: AtomicU64,
    pub running: AtomicU64,
    pub completed: AtomicU64,
    pub failed: AtomicU64,
}

/// Selector for [`Scheduler::drain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainScope {
    SearchQueueOnly,
    AllJobs,
}

/// Executes an admitted job. Implemented by the pipeline crate; the
/// scheduler knows nothing about what a `FETCH` or `LLM_FAST` job
/// actually does.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    /// Runs `job` to completion, returning any chain jobs it wants
    /// enqueued as a result (e.g. `search_queue` completion enqueuing
    /// `verify_nli` and `citation_graph`).
    async fn execute(&self, job: &Job, cancel: CancellationToken) -> Result<Vec<Job>>;
}

struct JobState {
    status_tx: watch::Sender<JobStatus>,
    cancel: CancellationToken,
}

/// Ties the priority queue, slot admission, budget guards, and domain
/// breaker together into a single admission loop.
pub struct Scheduler<E: JobExecutor> {
    queue: Mutex<JobQueue>,
    slots: SlotAdmission,
    domain_policy: DomainPolicyStore,
    budgets: DashMap<String, Arc<TaskBudget>>,
    jobs: DashMap<Uuid, JobState>,
    executor: Arc<E>,
    events: EventBus,
    stats: Arc<SchedulerStats>,
}

impl<E: JobExecutor + 'static> Scheduler<E> {
    pub fn new(executor: E) -> Arc<Self> {
        Arc::new(Self {
            queue: Mutex::new(JobQueue::new()),
            slots: SlotAdmission::with_defaults(),
            domain_policy: DomainPolicyStore::new(),
            budgets: DashMap::new(),
            jobs: DashMap::new(),
            executor: Arc::new(executor),
            events: EventBus::new(),
            stats: Arc::new(SchedulerStats::default()),
        })
    }

    pub fn register_task_budget(&self, task_id: impl Into<String>, max_pages: u32, llm_millis_budget: u64) {
        self.budgets
            .insert(task_id.into(), Arc::new(TaskBudget::new(max_pages, llm_millis_budget)));
    }

    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<seesaw::EventEnvelope> {
        self.events.subscribe()
    }

    pub fn stats(&self) -> HashMap<&'static str, u64> {
        HashMap::from([
            ("queued", self.stats.queued.load(Ordering::Relaxed)),
            ("running", self.stats.running.load(Ordering::Relaxed)),
            ("completed", self.stats.completed.load(Ordering::Relaxed)),
            ("failed", self.stats.failed.load(Ordering::Relaxed)),
        ])
    }

    /// Enqueue a job and return a handle observing its lifecycle.
    #[instrument(skip(self, job), fields(job_id = %job.id, kind = ?job.kind))]
    pub async fn submit(self: &Arc<Self>, job: Job) -> JobHandle {
        let (status_tx, status_rx) = watch::channel(JobStatus::Queued);
        let cancel = CancellationToken::new();
        self.jobs.insert(
            job.id,
            JobState {
                status_tx,
                cancel: cancel.clone(),
            },
        );
        self.stats.queued.fetch_add(1, Ordering::Relaxed);

        let handle = JobHandle {
            job_id: job.id,
            status: status_rx,
            cancel: cancel.clone(),
        };

        self.queue.lock().await.push(job);
        self.try_drain_one();

        handle
    }

    pub fn cancel(&self, handle: &JobHandle) {
        handle.cancel();
    }

    /// Wait for queued/running work to settle under the given scope.
    /// `search_queue_only` is a future extension point once the
    /// pipeline tags jobs by their owning search; today both variants
    /// wait for the whole queue to drain.
    pub async fn drain(self: &Arc<Self>, _scope: DrainScope) {
        loop {
            let pending = self.queue.lock().await.len();
            let running = self.stats.running.load(Ordering::Relaxed);
            if pending == 0 && running == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.try_drain_one();
        }
    }

    /// Attempts to dequeue and admit one job, spawning its execution
    /// if admission succeeds. Called opportunistically on submit and
    /// from the background drain loop; a production deployment would
    /// instead run this from a single owning task woken by a
    /// notify-on-push channel.
    fn try_drain_one(self: &Arc<Self>) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut queue = this.queue.lock().await;
            let popped = queue.pop_admissible(|job| this.can_admit(job));
            drop(queue);

            match popped {
                PopResult::Admitted(job) => {
                    this.stats.queued.fetch_sub(1, Ordering::Relaxed);
                    this.spawn_job(job);
                }
                PopResult::Rejected(job, err) => {
                    this.stats.queued.fetch_sub(1, Ordering::Relaxed);
                    this.reject_job(job, err);
                }
                PopResult::Empty => {}
            }
        });
    }

    /// Budget breaches are permanent for the rest of the task's run —
    /// the job is dequeued and failed with the triggering error rather
    /// than left parked, so callers observe `BUDGET_EXHAUSTED` instead
    /// of a job that silently never runs.
    fn reject_job(&self, job: Job, err: SchedulerError) {
        warn!(job_id = %job.id, task_id = %job.task_id, error = %err, "job rejected at admission");
        self.events.emit(ScheduleEvent::BudgetWarning {
            task_id: job.task_id.clone(),
        });
        self.stats.failed.fetch_add(1, Ordering::Relaxed);
        self.set_status(job.id, JobStatus::Failed);
        self.jobs.remove(&job.id);
    }

    fn can_admit(&self, job: &Job) -> Admission {
        if let Some(budget) = self.budgets.get(&job.task_id) {
            let budget_ok = match job.kind {
                job::JobKind::Prefetch | job::JobKind::Serp | job::JobKind::Extract => {
                    budget.admits_fetch()
                }
                job::JobKind::LlmFast | job::JobKind::LlmSlow => budget.admits_llm(),
                _ => true,
            };
            if !budget_ok {
                return Admission::Reject(SchedulerError::BudgetExhausted(job.task_id.clone()));
            }
        }

        if job.slot() == Slot::NetworkClient {
            if let Some(domain) = &job.domain {
                if !self.domain_policy.is_request_admitted(domain) {
                    debug!(
                        job_id = %job.id,
                        domain,
                        error = %SchedulerError::BreakerOpen,
                        "deferring job"
                    );
                    return Admission::Defer;
                }
            }
        }

        Admission::Admit
    }

    fn spawn_job(self: &Arc<Self>, job: Job) {
        let Some(state) = self.jobs.get(&job.id).map(|entry| entry.cancel.clone()) else {
            return;
        };

        let Some(permit) = self.slots.try_acquire(job.slot(), job.domain.as_deref()) else {
            // Lost the race between `can_admit` and acquisition; put it
            // back for the next drain pass.
            let this = Arc::clone(self);
            tokio::spawn(async move {
                this.queue.lock().await.push(job);
                this.stats.queued.fetch_add(1, Ordering::Relaxed);
            });
            return;
        };

        if let Some(domain) = &job.domain {
            self.events.emit(ScheduleEvent::SearchStarted {
                search_id: job.search_id.clone().unwrap_or_else(|| domain.clone()),
            });
        }

        self.stats.running.fetch_add(1, Ordering::Relaxed);
        self.set_status(job.id, JobStatus::Running);

        let this = Arc::clone(self);
        tokio::spawn(async move {
            let _permit = permit;
            let result = this.executor.execute(&job, state).await;
            this.stats.running.fetch_sub(1, Ordering::Relaxed);

            match result {
                Ok(followups) => {
                    this.stats.completed.fetch_add(1, Ordering::Relaxed);
                    this.set_status(job.id, JobStatus::Completed);
                    if let Some(domain) = &job.domain {
                        this.domain_policy.record_success(domain, false);
                    }
                    if let Some(search_id) = &job.search_id {
                        this.events.emit(ScheduleEvent::SearchCompleted {
                            search_id: search_id.clone(),
                        });
                    }
                    for followup in followups {
                        this.queue.lock().await.push(followup);
                        this.stats.queued.fetch_add(1, Ordering::Relaxed);
                    }
                    this.try_drain_one();
                }
                Err(SchedulerError::Fatal(reason)) => {
                    warn!(job_id = %job.id, %reason, "fatal error, halting owning search");
                    this.stats.failed.fetch_add(1, Ordering::Relaxed);
                    this.set_status(job.id, JobStatus::Failed);
                }
                Err(err) => {
                    debug!(job_id = %job.id, error = %err, "job failed");
                    this.stats.failed.fetch_add(1, Ordering::Relaxed);
                    this.set_status(job.id, JobStatus::Failed);
                    this.try_drain_one();
                }
            }
            this.jobs.remove(&job.id);
        });
    }

    fn set_status(&self, job_id: Uuid, status: JobStatus) {
        if let Some(state) = self.jobs.get(&job_id) {
            let _ = state.status_tx.send(status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    struct CountingExecutor {
        runs: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl JobExecutor for CountingExecutor {
        async fn execute(&self, _job: &Job, _cancel: CancellationToken) -> Result<Vec<Job>> {
            self.runs.fetch_add(1, Ordering::Relaxed);
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn submitted_job_runs_to_completion() {
        let runs = Arc::new(AtomicUsize::new(0));
        let scheduler = Scheduler::new(CountingExecutor { runs: runs.clone() });

        let mut handle = scheduler
            .submit(Job::new("task-1", job::JobKind::Serp, json!({})))
            .await;

        let status = handle.wait_terminal().await;
        assert_eq!(status, JobStatus::Completed);
        assert_eq!(runs.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn budget_exhaustion_rejects_fetch_jobs() {
        struct FailOnRun;
        #[async_trait]
        impl JobExecutor for FailOnRun {
            async fn execute(&self, _job: &Job, _cancel: CancellationToken) -> Result<Vec<Job>> {
                panic!("should never run once budget is exhausted");
            }
        }

        let scheduler = Scheduler::new(FailOnRun);
        scheduler.register_task_budget("task-1", 0, 10_000);

        let mut handle = scheduler
            .submit(Job::new("task-1", job::JobKind::Prefetch, json!({})))
            .await;

        let status = handle.wait_terminal().await;
        assert_eq!(status, JobStatus::Failed);

        let stats = scheduler.stats();
        assert_eq!(*stats.get("running").unwrap(), 0);
        assert_eq!(*stats.get("queued").unwrap(), 0);
        assert_eq!(*stats.get("failed").unwrap(), 1);
    }

    #[tokio::test]
    async fn chain_jobs_are_enqueued_after_completion() {
        struct ChainingExecutor;
        #[async_trait]
        impl JobExecutor for ChainingExecutor {
            async fn execute(&self, job: &Job, _cancel: CancellationToken) -> Result<Vec<Job>> {
                if job.kind == job::JobKind::Serp {
                    Ok(vec![Job::new(
                        job.task_id.clone(),
                        job::JobKind::VerifyNli,
                        json!({}),
                    )])
                } else {
                    Ok(Vec::new())
                }
            }
        }

        let scheduler = Scheduler::new(ChainingExecutor);
        let mut handle = scheduler
            .submit(Job::new("task-1", job::JobKind::Serp, json!({})))
            .await;
        handle.wait_terminal().await;

        scheduler.drain(DrainScope::AllJobs).await;
        let stats = scheduler.stats();
        assert_eq!(*stats.get("completed").unwrap(), 2);
    }
}
