use crate::cancellation::CancellationToken;
use crate::executor::TaskExecutor;
use crate::graph::Topology;
use crate::registry::AgentRegistry;
use crate::runner::{TaskOutcome, TaskRunner};
use crate::store::WorkflowStore;
use crate::types::{TaskStatus, Workflow, WorkflowStatus};
use chrono::Utc;
use std::sync::Arc;
use strata_core::{StrataError, StrataResult};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Drives a running workflow to a terminal status.
///
/// The scheduler is the only writer of the workflow record while it runs:
/// runners report back through a [`JoinSet`] and every state change is
/// applied here, then persisted as a whole-record snapshot.
#[derive(Clone)]
pub struct Scheduler {
    store: Arc<dyn WorkflowStore>,
    runner: TaskRunner,
    registry: Option<Arc<dyn AgentRegistry>>,
}

/// Per-run bookkeeping indexed like the topology.
struct RunState {
    status: Vec<TaskStatus>,
    remaining: Vec<usize>,
    in_flight: JoinSet<(usize, TaskOutcome)>,
}

impl Scheduler {
    pub fn new(store: Arc<dyn WorkflowStore>, executor: Arc<dyn TaskExecutor>) -> Self {
        Self {
            store,
            runner: TaskRunner::new(executor),
            registry: None,
        }
    }

    pub fn with_registry(mut self, registry: Arc<dyn AgentRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Run `workflow` (already marked running) until no task can make progress.
    ///
    /// A task is launched only once all of its dependencies are completed.
    /// Dependents of a failed task stay pending; independent branches still
    /// run to the end before the workflow settles as failed. Once `cancel`
    /// fires, nothing new is launched and in-flight tasks are allowed to finish.
    ///
    /// If the store rejects a write mid-run, in-flight runners are aborted,
    /// their tasks and the workflow are marked failed in a last best-effort
    /// write, and the store error is returned.
    pub async fn run(
        &self,
        mut workflow: Workflow,
        topology: &Topology,
        cancel: &CancellationToken,
    ) -> StrataResult<Workflow> {
        let n = topology.len();
        if n != workflow.tasks.len()
            || workflow
                .tasks
                .iter()
                .enumerate()
                .any(|(i, t)| topology.id(i) != t.id)
        {
            return Err(StrataError::InvalidState(format!(
                "topology does not match workflow {}",
                workflow.id
            )));
        }

        let status: Vec<TaskStatus> = workflow
            .tasks
            .iter()
            .map(|t| {
                workflow
                    .task_states
                    .get(&t.id)
                    .map_or(TaskStatus::Pending, |s| s.status)
            })
            .collect();
        let remaining: Vec<usize> = (0..n)
            .map(|i| {
                topology
                    .predecessors(i)
                    .iter()
                    .filter(|&&p| status[p] != TaskStatus::Completed)
                    .count()
            })
            .collect();
        let mut run = RunState {
            status,
            remaining,
            in_flight: JoinSet::new(),
        };

        info!(
            workflow_id = %workflow.id,
            mode = %workflow.mode,
            tasks = n,
            "Scheduler: workflow started"
        );

        if let Err(e) = self.drive(&mut workflow, topology, cancel, &mut run).await {
            self.abandon(&mut workflow, topology, &mut run, &e).await;
            return Err(e);
        }

        let final_status = settle(&run.status, cancel.is_cancelled());
        if final_status == WorkflowStatus::Failed && !run.status.contains(&TaskStatus::Failed) {
            warn!(workflow_id = %workflow.id, "Scheduler: no runnable tasks left but workflow incomplete");
        }
        workflow.transition_to(final_status);
        if let Err(e) = self.store.update(&workflow).await {
            self.abandon(&mut workflow, topology, &mut run, &e).await;
            return Err(e);
        }

        info!(
            workflow_id = %workflow.id,
            status = %final_status,
            completed = run.status.iter().filter(|s| **s == TaskStatus::Completed).count(),
            failed = run.status.iter().filter(|s| **s == TaskStatus::Failed).count(),
            "Scheduler: workflow finished"
        );

        Ok(workflow)
    }

    async fn drive(
        &self,
        workflow: &mut Workflow,
        topology: &Topology,
        cancel: &CancellationToken,
        run: &mut RunState,
    ) -> StrataResult<()> {
        let strategy = workflow.mode.strategy();
        let n = topology.len();
        let mut cancel_seen = false;

        loop {
            if !cancel.is_cancelled() {
                let ready: Vec<usize> = (0..n)
                    .filter(|&i| run.status[i] == TaskStatus::Pending && run.remaining[i] == 0)
                    .collect();
                let launch = strategy.select(&ready, run.in_flight.len());

                if !launch.is_empty() {
                    for &idx in &launch {
                        run.status[idx] = TaskStatus::Running;
                        let agent = self.assign_agent(workflow, idx).await;
                        let task = workflow.tasks[idx].clone();
                        if let Some(state) = workflow.task_states.get_mut(&task.id) {
                            state.status = TaskStatus::Running;
                            state.started_at = Some(Utc::now());
                            state.assigned_agent = agent.clone();
                        }
                        info!(workflow_id = %workflow.id, task_id = %task.id, "Dispatching task");

                        let runner = self.runner.clone();
                        let workflow_id = workflow.id;
                        run.in_flight.spawn(async move {
                            (idx, runner.run(workflow_id, &task, agent).await)
                        });
                    }
                    self.store.update(workflow).await?;
                }
            }

            if run.in_flight.is_empty() {
                break;
            }

            let joined = tokio::select! {
                joined = run.in_flight.join_next() => joined,
                () = cancel.cancelled(), if !cancel_seen => {
                    cancel_seen = true;
                    info!(
                        workflow_id = %workflow.id,
                        in_flight = run.in_flight.len(),
                        "Scheduler: cancellation observed, draining in-flight tasks"
                    );
                    continue;
                }
            };
            let Some(joined) = joined else {
                break;
            };
            let (idx, outcome) = joined.map_err(|e| {
                StrataError::Internal(format!("task runner of workflow {} died: {e}", workflow.id))
            })?;

            run.status[idx] = outcome.status;
            let task_id = topology.id(idx).to_string();
            if let Some(state) = workflow.task_states.get_mut(&task_id) {
                state.status = outcome.status;
                state.attempts = outcome.attempts;
                state.last_error = outcome.last_error;
                state.completed_at = Some(outcome.completed_at);
            }
            if outcome.status == TaskStatus::Completed {
                for &next in topology.successors(idx) {
                    run.remaining[next] -= 1;
                }
            }
            self.store.update(workflow).await?;
        }

        Ok(())
    }

    /// Stop every in-flight runner and leave a failed record behind.
    async fn abandon(
        &self,
        workflow: &mut Workflow,
        topology: &Topology,
        run: &mut RunState,
        cause: &StrataError,
    ) {
        run.in_flight.abort_all();
        while run.in_flight.join_next().await.is_some() {}

        let now = Utc::now();
        for (idx, status) in run.status.iter_mut().enumerate() {
            if *status != TaskStatus::Running {
                continue;
            }
            *status = TaskStatus::Failed;
            if let Some(state) = workflow.task_states.get_mut(topology.id(idx)) {
                state.status = TaskStatus::Failed;
                state.last_error = Some(format!("run aborted: {cause}"));
                state.completed_at = Some(now);
            }
        }
        workflow.transition_to(WorkflowStatus::Failed);

        error!(workflow_id = %workflow.id, error = %cause, "Scheduler: run abandoned");
        if let Err(e) = self.store.update(workflow).await {
            error!(
                workflow_id = %workflow.id,
                error = %e,
                "Scheduler: could not persist abandoned run"
            );
        }
    }

    async fn assign_agent(&self, workflow: &Workflow, idx: usize) -> Option<String> {
        let task = &workflow.tasks[idx];
        let capability = task.required_capability.as_deref()?;
        let registry = self.registry.as_ref()?;
        let agent = registry.resolve(capability).await;
        if agent.is_none() {
            warn!(
                workflow_id = %workflow.id,
                task_id = %task.id,
                capability,
                "No agent advertises required capability, running unassigned"
            );
        }
        agent
    }
}

fn settle(status: &[TaskStatus], cancelled: bool) -> WorkflowStatus {
    if status.iter().all(|s| *s == TaskStatus::Completed) {
        WorkflowStatus::Completed
    } else if status.contains(&TaskStatus::Failed) {
        WorkflowStatus::Failed
    } else if cancelled {
        WorkflowStatus::Cancelled
    } else {
        WorkflowStatus::Failed
    }
}
