//! Strict-priority queue with FIFO tiebreak.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use crate::error::SchedulerError;
use crate::job::Job;

/// Outcome of evaluating one job against admission rules.
pub enum Admission {
    /// Slot/budget/breaker all clear; dequeue and run it.
    Admit,
    /// Not admissible right now but may become so later (slot
    /// saturated, breaker open); leave it at its place in the queue.
    Defer,
    /// Can never be admitted as things stand (budget exhausted);
    /// dequeue it and fail it rather than parking it forever.
    Reject(SchedulerError),
}

/// Outcome of a [`JobQueue::pop_admissible`] call.
pub enum PopResult {
    Admitted(Job),
    Rejected(Job, SchedulerError),
    Empty,
}

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

struct QueuedJob {
    job: Job,
    priority: i32,
    sequence: u64,
}

impl PartialEq for QueuedJob {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}
impl Eq for QueuedJob {}

impl Ord for QueuedJob {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; higher priority wins, and for equal
        // priority the earlier sequence number (FIFO) wins, so we
        // reverse the sequence comparison.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for QueuedJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Priority queue of [`Job`]s, ordered by `(priority desc, submission
/// order asc)`.
#[derive(Default)]
pub struct JobQueue {
    heap: BinaryHeap<QueuedJob>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, job: Job) {
        let priority = job.priority();
        let sequence = SEQUENCE.fetch_add(1, AtomicOrdering::Relaxed);
        self.heap.push(QueuedJob {
            job,
            priority,
            sequence,
        });
    }

    pub fn pop(&mut self) -> Option<Job> {
        self.heap.pop().map(|entry| entry.job)
    }

    /// Remove and return the highest-priority job `admit` finds
    /// admissible or outright rejects, leaving merely-deferred jobs in
    /// place. Used when the head of the queue can't run yet (e.g. its
    /// slot is saturated) but a lower-priority job for a different
    /// slot can run, or can never run (budget exhausted) and should be
    /// dequeued and failed instead of parked forever.
    pub fn pop_admissible(&mut self, mut admit: impl FnMut(&Job) -> Admission) -> PopResult {
        let mut deferred = Vec::new();
        let mut result = PopResult::Empty;

        while let Some(entry) = self.heap.pop() {
            match admit(&entry.job) {
                Admission::Admit => {
                    result = PopResult::Admitted(entry.job);
                    break;
                }
                Admission::Reject(err) => {
                    result = PopResult::Rejected(entry.job, err);
                    break;
                }
                Admission::Defer => deferred.push(entry),
            }
        }

        for entry in deferred {
            self.heap.push(entry);
        }

        result
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobKind;
    use serde_json::json;

    #[test]
    fn pops_in_strict_priority_order() {
        let mut queue = JobQueue::new();
        queue.push(Job::new("task-1", JobKind::LlmSlow, json!({})));
        queue.push(Job::new("task-1", JobKind::Serp, json!({})));
        queue.push(Job::new("task-1", JobKind::Extract, json!({})));

        assert_eq!(queue.pop().unwrap().kind, JobKind::Serp);
        assert_eq!(queue.pop().unwrap().kind, JobKind::Extract);
        assert_eq!(queue.pop().unwrap().kind, JobKind::LlmSlow);
    }

    #[test]
    fn equal_priority_is_fifo() {
        let mut queue = JobQueue::new();
        let first = Job::new("task-1", JobKind::Extract, json!({"n": 1}));
        let second = Job::new("task-1", JobKind::Extract, json!({"n": 2}));
        let first_id = first.id;
        let second_id = second.id;
        queue.push(first);
        queue.push(second);

        assert_eq!(queue.pop().unwrap().id, first_id);
        assert_eq!(queue.pop().unwrap().id, second_id);
    }

    #[test]
    fn pop_admissible_skips_inadmissible_head() {
        let mut queue = JobQueue::new();
        queue.push(Job::new("task-1", JobKind::Serp, json!({})));
        queue.push(Job::new("task-1", JobKind::Extract, json!({})));

        let popped = queue.pop_admissible(|job| {
            if job.kind == JobKind::Extract {
                Admission::Admit
            } else {
                Admission::Defer
            }
        });
        match popped {
            PopResult::Admitted(job) => assert_eq!(job.kind, JobKind::Extract),
            _ => panic!("expected the extract job to be admitted"),
        }
        // Serp job remains at the head for next time.
        assert_eq!(queue.pop().unwrap().kind, JobKind::Serp);
    }

    #[test]
    fn pop_admissible_dequeues_and_reports_rejection() {
        let mut queue = JobQueue::new();
        queue.push(Job::new("task-1", JobKind::Serp, json!({})));

        let popped = queue.pop_admissible(|_job| {
            Admission::Reject(SchedulerError::BudgetExhausted("task-1".to_string()))
        });
        match popped {
            PopResult::Rejected(job, SchedulerError::BudgetExhausted(task_id)) => {
                assert_eq!(job.kind, JobKind::Serp);
                assert_eq!(task_id, "task-1");
            }
            _ => panic!("expected the job to be rejected with BudgetExhausted"),
        }
        // The rejected job is gone from the queue, not deferred.
        assert!(queue.is_empty());
    }
}
