//! Wires every upstream crate into the one `Arc`-shared context the
//! control surface runs its handlers against.

use std::sync::Arc;

use evidence_graph::EvidenceGraph;
use inference_gateway::InferenceGateway;
use scheduler::Scheduler;
use seesaw::EngineHandle;

use crate::auth_queue::AuthWaitQueue;
use crate::config::Config;
use crate::executor::PipelineJobExecutor;
use crate::store::ResearchStore;

/// Everything a control-surface handler needs: the durable stores, the
/// admission-gated job scheduler, and the pipeline engine handle the
/// scheduler's executor drives.
#[derive(Clone)]
pub struct EngineContext {
    pub config: Arc<Config>,
    pub store: Arc<ResearchStore>,
    pub graph: Arc<EvidenceGraph>,
    pub auth_queue: Arc<AuthWaitQueue>,
    pub scheduler: Arc<Scheduler<PipelineJobExecutor>>,
    pub pipeline: Arc<EngineHandle>,
    pub gateway: Arc<dyn InferenceGateway>,
}

impl EngineContext {
    /// `graph` is the same instance wired into the pipeline's
    /// [`pipeline::PipelineDeps`] — the control surface and the
    /// pipeline's effects share one in-memory arena, never two.
    pub fn new(
        config: Arc<Config>,
        store: Arc<ResearchStore>,
        graph: Arc<EvidenceGraph>,
        pipeline: EngineHandle,
        gateway: Arc<dyn InferenceGateway>,
    ) -> Self {
        let pipeline = Arc::new(pipeline);
        let auth_queue = Arc::new(AuthWaitQueue::new(store.clone()));
        let executor = PipelineJobExecutor::new(pipeline.clone());
        let scheduler = Scheduler::new(executor);
        Self {
            config,
            store,
            graph,
            auth_queue,
            scheduler,
            pipeline,
            gateway,
        }
    }
}
