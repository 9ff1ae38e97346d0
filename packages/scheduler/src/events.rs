//! Scheduler-emitted facts, carried on seesaw's
//! [`seesaw::EventBus`].

use uuid::Uuid;

#[derive(Debug, Clone)]
pub enum ScheduleEvent {
    SearchStarted { search_id: String },
    SearchCompleted { search_id: String },
    BudgetWarning { task_id: String },
    AuthRequired { domain: String, job_id: Uuid },
}
