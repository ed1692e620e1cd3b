use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Duration;
use uuid::Uuid;

/// Everything an executor learns about one attempt of one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInvocation {
    pub workflow_id: Uuid,
    pub task_id: String,
    pub task_name: String,
    /// 1-based attempt number.
    pub attempt: u32,
    pub assigned_agent: Option<String>,
}

/// The pluggable unit of work behind every task.
///
/// Called once per attempt. An `Err` carries the failure reason that ends up
/// in the task's `lastError`; it is never surfaced to the caller of `start`.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, invocation: &TaskInvocation) -> Result<(), String>;
}

/// Executor that succeeds immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopExecutor;

#[async_trait]
impl TaskExecutor for NoopExecutor {
    async fn execute(&self, _invocation: &TaskInvocation) -> Result<(), String> {
        Ok(())
    }
}

/// Executor standing in for real platform work: sleeps for a fixed latency
/// and always fails the task ids it was told to fail.
#[derive(Debug, Clone, Default)]
pub struct SimulatedExecutor {
    latency: Duration,
    fail_tasks: HashSet<String>,
}

impl SimulatedExecutor {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            fail_tasks: HashSet::new(),
        }
    }

    pub fn with_failing<I, S>(mut self, task_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fail_tasks.extend(task_ids.into_iter().map(Into::into));
        self
    }
}

#[async_trait]
impl TaskExecutor for SimulatedExecutor {
    async fn execute(&self, invocation: &TaskInvocation) -> Result<(), String> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.fail_tasks.contains(&invocation.task_id) {
            return Err(format!(
                "simulated failure for task '{}' (attempt {})",
                invocation.task_id, invocation.attempt
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn invocation(task_id: &str) -> TaskInvocation {
        TaskInvocation {
            workflow_id: Uuid::new_v4(),
            task_id: task_id.to_string(),
            task_name: task_id.to_uppercase(),
            attempt: 1,
            assigned_agent: None,
        }
    }

    #[tokio::test]
    async fn test_noop_succeeds() {
        assert!(NoopExecutor.execute(&invocation("a")).await.is_ok());
    }

    #[tokio::test]
    async fn test_simulated_fails_configured_tasks() {
        let exec = SimulatedExecutor::new(Duration::ZERO).with_failing(["bad"]);
        assert!(exec.execute(&invocation("good")).await.is_ok());
        let err = exec.execute(&invocation("bad")).await.unwrap_err();
        assert!(err.contains("simulated failure"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_latency_uses_timer() {
        let exec = SimulatedExecutor::new(Duration::from_secs(5));
        let start = tokio::time::Instant::now();
        exec.execute(&invocation("a")).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(5));
    }
}
