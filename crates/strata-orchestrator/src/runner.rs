use crate::executor::{TaskExecutor, TaskInvocation};
use crate::types::{Task, TaskStatus};
use chrono::{DateTime, Utc};
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;
use tracing::{info, warn};
use uuid::Uuid;

/// Terminal result of running one task through its retry policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutcome {
    /// Either [`TaskStatus::Completed`] or [`TaskStatus::Failed`].
    pub status: TaskStatus,
    /// Number of executor invocations made.
    pub attempts: u32,
    /// Reason of the most recent failed attempt, kept even if a later retry succeeded.
    pub last_error: Option<String>,
    pub completed_at: DateTime<Utc>,
}

/// Executes a single task to completion or permanent failure.
///
/// Retries follow the task's [`RetryPolicy`](crate::types::RetryPolicy);
/// backoff waits are tokio timers so other in-flight tasks keep running.
#[derive(Clone)]
pub struct TaskRunner {
    executor: Arc<dyn TaskExecutor>,
}

impl TaskRunner {
    pub fn new(executor: Arc<dyn TaskExecutor>) -> Self {
        Self { executor }
    }

    pub async fn run(
        &self,
        workflow_id: Uuid,
        task: &Task,
        assigned_agent: Option<String>,
    ) -> TaskOutcome {
        let policy = task.retry_policy;
        let mut last_error = None;

        for attempt in 1..=policy.max_attempts {
            let invocation = TaskInvocation {
                workflow_id,
                task_id: task.id.clone(),
                task_name: task.name.clone(),
                attempt,
                assigned_agent: assigned_agent.clone(),
            };

            match self.attempt(&invocation, task.timeout_ms).await {
                Ok(()) => {
                    info!(
                        workflow_id = %workflow_id,
                        task_id = %task.id,
                        attempt,
                        "Task completed"
                    );
                    return TaskOutcome {
                        status: TaskStatus::Completed,
                        attempts: attempt,
                        last_error,
                        completed_at: Utc::now(),
                    };
                }
                Err(reason) => {
                    if attempt < policy.max_attempts {
                        let delay = policy.backoff_ms(attempt);
                        warn!(
                            workflow_id = %workflow_id,
                            task_id = %task.id,
                            attempt,
                            delay_ms = delay,
                            error = %reason,
                            "Task attempt failed, backing off"
                        );
                        if delay > 0 {
                            tokio::time::sleep(Duration::from_millis(delay)).await;
                        }
                    } else {
                        warn!(
                            workflow_id = %workflow_id,
                            task_id = %task.id,
                            attempt,
                            error = %reason,
                            "Task failed permanently"
                        );
                    }
                    last_error = Some(reason);
                }
            }
        }

        TaskOutcome {
            status: TaskStatus::Failed,
            attempts: policy.max_attempts,
            last_error,
            completed_at: Utc::now(),
        }
    }

    /// One executor invocation on its own tokio task.
    ///
    /// A panic inside the executor surfaces as a failed attempt. On timeout
    /// the attempt task is aborted.
    async fn attempt(&self, invocation: &TaskInvocation, timeout_ms: Option<u64>) -> Result<(), String> {
        let executor = Arc::clone(&self.executor);
        let owned = invocation.clone();
        let handle = tokio::spawn(async move { executor.execute(&owned).await });
        let _abort = AbortOnDrop(handle.abort_handle());

        let joined = match timeout_ms {
            Some(ms) => match tokio::time::timeout(Duration::from_millis(ms), handle).await {
                Ok(joined) => joined,
                Err(_) => return Err(format!("timed out after {ms}ms")),
            },
            None => handle.await,
        };

        match joined {
            Ok(result) => result,
            Err(e) if e.is_panic() => Err(format!(
                "task runner aborted: executor panicked: {}",
                panic_message(e.into_panic())
            )),
            Err(e) => Err(format!("task runner aborted: {e}")),
        }
    }
}

/// Aborts the attempt task if the runner stops waiting for it.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
