use crate::analytics::{AnalyticsAggregator, WorkflowAnalytics};
use crate::cancellation::CancellationToken;
use crate::executor::{NoopExecutor, TaskExecutor};
use crate::graph::{GraphValidator, Topology};
use crate::progress::{ProgressTracker, WorkflowStatusReport};
use crate::registry::AgentRegistry;
use crate::scheduler::Scheduler;
use crate::store::{InMemoryWorkflowStore, Transition, WorkflowStore};
use crate::types::{CreateWorkflowRequest, Workflow, WorkflowStatus};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use strata_core::{StrataError, StrataResult};
use tokio::sync::RwLock;
use tracing::{debug, error, info};
use uuid::Uuid;

/// The workflow orchestration engine.
///
/// Owns the injected store, executor and agent registry, and exposes the
/// create → start → observe lifecycle used by the gateway and the CLI.
pub struct WorkflowEngine {
    store: Arc<dyn WorkflowStore>,
    scheduler: Scheduler,
    validator: GraphValidator,
    progress: ProgressTracker,
    analytics: AnalyticsAggregator,
    topologies: Arc<RwLock<HashMap<Uuid, Arc<Topology>>>>,
    active_runs: Arc<RwLock<HashMap<Uuid, CancellationToken>>>,
}

impl WorkflowEngine {
    pub fn new(store: Arc<dyn WorkflowStore>, executor: Arc<dyn TaskExecutor>) -> Self {
        Self {
            scheduler: Scheduler::new(store.clone(), executor),
            store,
            validator: GraphValidator::new(),
            progress: ProgressTracker::new(),
            analytics: AnalyticsAggregator::default(),
            topologies: Arc::new(RwLock::new(HashMap::new())),
            active_runs: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// In-memory store with an executor that always succeeds.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryWorkflowStore::new()), Arc::new(NoopExecutor))
    }

    pub fn with_registry(mut self, registry: Arc<dyn AgentRegistry>) -> Self {
        self.scheduler = self.scheduler.with_registry(registry);
        self
    }

    pub fn with_bottleneck_limit(mut self, limit: usize) -> Self {
        self.analytics = AnalyticsAggregator::new(limit);
        self
    }

    /// Validate and persist a new `pending` workflow.
    ///
    /// Nothing is stored when validation fails.
    pub async fn create(&self, request: CreateWorkflowRequest) -> StrataResult<Workflow> {
        let topology = self.validator.validate(&request.tasks)?;
        let workflow = Workflow::from_request(request);
        self.store.insert(&workflow).await?;
        self.topologies
            .write()
            .await
            .insert(workflow.id, Arc::new(topology));

        info!(
            workflow_id = %workflow.id,
            name = %workflow.name,
            mode = %workflow.mode,
            tasks = workflow.task_count(),
            "Workflow created"
        );
        Ok(workflow)
    }

    /// All workflows, oldest first, optionally restricted to one status.
    pub async fn list(&self, status: Option<WorkflowStatus>) -> StrataResult<Vec<Workflow>> {
        let mut workflows: Vec<Workflow> = self
            .store
            .list()
            .await?
            .into_iter()
            .filter(|w| status.map_or(true, |s| w.status == s))
            .collect();
        workflows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(workflows)
    }

    pub async fn get(&self, id: Uuid) -> StrataResult<Workflow> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| StrataError::NotFound(format!("workflow {id}")))
    }

    /// Run a `pending` workflow to a terminal status and return the final record.
    ///
    /// Claiming the workflow and running it happen on their own tokio task:
    /// dropping the returned future (a disconnected HTTP client, say) does
    /// not stop the run, and the workflow still settles. Task failures are reported in the returned record, not
    /// as errors.
    pub async fn start(&self, id: Uuid) -> StrataResult<Workflow> {
        let workflow = self.get(id).await?;
        if workflow.status != WorkflowStatus::Pending {
            return Err(not_startable(id, workflow.status));
        }
        let topology = self.topology(&workflow).await?;

        let store = Arc::clone(&self.store);
        let scheduler = self.scheduler.clone();
        let active_runs = Arc::clone(&self.active_runs);
        let topologies = Arc::clone(&self.topologies);
        let run = tokio::spawn(async move {
            let token = CancellationToken::new();
            match active_runs.write().await.entry(id) {
                Entry::Occupied(_) => return Err(not_startable(id, WorkflowStatus::Running)),
                Entry::Vacant(slot) => {
                    slot.insert(token.clone());
                }
            }

            let running = match store
                .compare_and_set_status(id, WorkflowStatus::Pending, WorkflowStatus::Running)
                .await
            {
                Ok(Transition::Applied(workflow)) => workflow,
                Ok(Transition::Rejected(status)) => {
                    active_runs.write().await.remove(&id);
                    return Err(not_startable(id, status));
                }
                Ok(Transition::Missing) => {
                    active_runs.write().await.remove(&id);
                    return Err(StrataError::NotFound(format!("workflow {id}")));
                }
                Err(e) => {
                    active_runs.write().await.remove(&id);
                    return Err(e);
                }
            };

            info!(workflow_id = %id, "Workflow started");
            let result = scheduler.run(running, &topology, &token).await;
            active_runs.write().await.remove(&id);
            topologies.write().await.remove(&id);

            match &result {
                Ok(finished) => info!(workflow_id = %id, status = %finished.status, "Workflow finished"),
                Err(e) => error!(workflow_id = %id, error = %e, "Workflow run aborted"),
            }
            result
        });

        run.await
            .map_err(|e| StrataError::Internal(format!("run of workflow {id} aborted: {e}")))?
    }

    /// Cooperatively cancel a workflow.
    ///
    /// A running workflow stops launching tasks and settles once in-flight
    /// tasks finish; the returned snapshot may still show it `running`. A
    /// pending workflow is settled as `cancelled` immediately.
    pub async fn cancel(&self, id: Uuid) -> StrataResult<Workflow> {
        if self.signal_active_run(id).await {
            return self.signalled_snapshot(id).await;
        }

        match self
            .store
            .compare_and_set_status(id, WorkflowStatus::Pending, WorkflowStatus::Cancelled)
            .await?
        {
            Transition::Applied(workflow) => {
                self.topologies.write().await.remove(&id);
                info!(workflow_id = %id, "Pending workflow cancelled");
                Ok(workflow)
            }
            Transition::Missing => Err(StrataError::NotFound(format!("workflow {id}"))),
            Transition::Rejected(status) if status.is_terminal() => Err(already_finished(status)),
            Transition::Rejected(status) => {
                // Lost a race with `start`; its token is registered before the CAS.
                if self.signal_active_run(id).await {
                    return self.signalled_snapshot(id).await;
                }
                Err(StrataError::InvalidState(format!(
                    "workflow {id} is {status} but has no active run in this process"
                )))
            }
        }
    }

    pub async fn status(&self, id: Uuid) -> StrataResult<WorkflowStatusReport> {
        let workflow = self.get(id).await?;
        Ok(self.progress.status(&workflow))
    }

    pub async fn analytics(&self) -> StrataResult<WorkflowAnalytics> {
        let workflows = self.store.list().await?;
        debug!(
            workflows = workflows.len(),
            bottleneck_limit = self.analytics.bottleneck_limit(),
            "Aggregating workflow analytics"
        );
        Ok(self.analytics.aggregate(&workflows))
    }

    async fn signal_active_run(&self, id: Uuid) -> bool {
        match self.active_runs.read().await.get(&id) {
            Some(token) => {
                token.cancel();
                info!(workflow_id = %id, "Cancellation requested");
                true
            }
            None => false,
        }
    }

    /// The run may have written its terminal record just before releasing its token.
    async fn signalled_snapshot(&self, id: Uuid) -> StrataResult<Workflow> {
        let workflow = self.get(id).await?;
        if workflow.status.is_terminal() {
            return Err(already_finished(workflow.status));
        }
        Ok(workflow)
    }

    async fn topology(&self, workflow: &Workflow) -> StrataResult<Arc<Topology>> {
        if let Some(topology) = self.topologies.read().await.get(&workflow.id) {
            return Ok(topology.clone());
        }
        let topology = Arc::new(self.validator.validate(&workflow.tasks)?);
        self.topologies
            .write()
            .await
            .insert(workflow.id, topology.clone());
        Ok(topology)
    }
}

fn already_finished(status: WorkflowStatus) -> StrataError {
    StrataError::InvalidState(format!("workflow is already finished (status: {status})"))
}

fn not_startable(id: Uuid, status: WorkflowStatus) -> StrataError {
    StrataError::InvalidState(format!(
        "can only start pending workflows (workflow {id} is {status})"
    ))
}
